//! Transport-neutral replies: text plus rows of buttons.

use crate::domain::{RackName, StoreCode};
use crate::flows::callback::{CallbackAction, CallbackData};
use crate::flows::states::{Command, OperationKind};
use crate::inventory::{PluAddOutcome, PluDeleteOutcome, RackAddOutcome, RackDeleteOutcome};

const STORE_BUTTONS_PER_ROW: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ButtonTarget {
    Callback(CallbackData),
    WebApp(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuButton {
    pub label: String,
    pub target: ButtonTarget,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Reply {
    pub text: String,
    pub keyboard: Vec<Vec<MenuButton>>,
}

impl Reply {
    /// Every callback payload carried by the keyboard, row by row.
    pub fn callbacks(&self) -> impl Iterator<Item = &CallbackData> {
        self.keyboard.iter().flatten().filter_map(|button| match &button.target {
            ButtonTarget::Callback(data) => Some(data),
            ButtonTarget::WebApp(_) => None,
        })
    }
}

pub struct ReplyBuilder {
    lines: Vec<String>,
    keyboard: Vec<Vec<MenuButton>>,
}

impl ReplyBuilder {
    pub fn new(text: impl Into<String>) -> Self {
        Self { lines: vec![text.into()], keyboard: Vec::new() }
    }

    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut builder = RowBuilder::default();
        build(&mut builder);
        if !builder.buttons.is_empty() {
            self.keyboard.push(builder.buttons);
        }
        self
    }

    pub fn cancel_row(self) -> Self {
        self.row(|row| {
            row.callback("Cancel", CallbackData::new(CallbackAction::Cancel));
        })
    }

    pub fn build(self) -> Reply {
        let text =
            self.lines.into_iter().filter(|line| !line.is_empty()).collect::<Vec<_>>().join("\n");
        Reply { text, keyboard: self.keyboard }
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<MenuButton>,
}

impl RowBuilder {
    pub fn callback(&mut self, label: impl Into<String>, data: CallbackData) -> &mut Self {
        self.buttons.push(MenuButton { label: label.into(), target: ButtonTarget::Callback(data) });
        self
    }

    pub fn web_app(&mut self, label: impl Into<String>, url: impl Into<String>) -> &mut Self {
        self.buttons.push(MenuButton { label: label.into(), target: ButtonTarget::WebApp(url.into()) });
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MenuOptions {
    pub web_app_url: Option<String>,
}

pub fn main_menu(options: &MenuOptions, header: Option<&str>) -> Reply {
    let start = |kind: OperationKind| CallbackData::new(CallbackAction::Start(kind));
    let mut builder = ReplyBuilder::new(header.unwrap_or_default()).line("Choose an action:");
    for pair in OperationKind::ALL.chunks(2) {
        builder = builder.row(|row| {
            for kind in pair {
                row.callback(kind.label(), start(*kind));
            }
        });
    }
    if let Some(url) = &options.web_app_url {
        builder = builder.row(|row| {
            row.web_app("Open app", url.clone());
        });
    }
    builder.build()
}

pub fn store_code_prompt() -> Reply {
    ReplyBuilder::new("Send the new store code: exactly 4 letters or digits, e.g. AB12.")
        .cancel_row()
        .build()
}

pub fn store_choice(operation: OperationKind, stores: &[StoreCode]) -> Reply {
    let mut builder = ReplyBuilder::new(format!("{}: choose a store.", operation.label()))
        .line("You can also type the store code.");
    for chunk in stores.chunks(STORE_BUTTONS_PER_ROW) {
        builder = builder.row(|row| {
            for store in chunk {
                let data = CallbackData::new(CallbackAction::PickStore(operation))
                    .with_store(store.clone());
                row.callback(store.as_str(), data);
            }
        });
    }
    builder.cancel_row().build()
}

pub fn rack_names_prompt(store: &StoreCode, existing: &[RackName]) -> Reply {
    let existing = if existing.is_empty() {
        "No racks yet.".to_owned()
    } else {
        format!("Existing racks: {}", join(existing))
    };
    ReplyBuilder::new(format!("Send the new rack names for store {store}, separated by commas."))
        .line(existing)
        .cancel_row()
        .build()
}

pub fn rack_choice(operation: OperationKind, store: &StoreCode, racks: &[RackName]) -> Reply {
    let hint = if operation == OperationKind::DeleteRack {
        "Pick a rack, or send several names separated by commas."
    } else {
        "Pick a rack, or type its name."
    };
    let mut builder =
        ReplyBuilder::new(format!("{}: choose a rack in store {store}.", operation.label()))
            .line(hint);
    for rack in racks {
        let data = CallbackData::new(CallbackAction::PickRack(operation))
            .with_store(store.clone())
            .with_rack(rack.clone());
        builder = builder.row(|row| {
            row.callback(rack.as_str(), data);
        });
    }
    builder.cancel_row().build()
}

pub fn plu_codes_prompt(operation: OperationKind, store: &StoreCode, rack: &RackName) -> Reply {
    let verb = if operation == OperationKind::DeletePlu { "remove from" } else { "add to" };
    ReplyBuilder::new(format!("Send the PLU codes to {verb} rack {rack} in store {store}."))
        .line("Separate codes with commas, periods or spaces.")
        .cancel_row()
        .build()
}

pub fn confirmation(command: &Command) -> Reply {
    let question = match command {
        Command::DeleteStore { store } => {
            format!("Delete store {store} with all of its racks and PLUs? This cannot be undone.")
        }
        Command::DeleteRacks { store, racks } => {
            format!("Delete rack(s) {} from store {store}? Their rows will be cleared.", join(racks))
        }
        Command::DeletePlus { store, rack, codes } => {
            format!("Remove PLU(s) {} from rack {rack} in store {store}?", join(codes))
        }
        other => format!("{} for store {}?", other.kind().label(), other.store()),
    };
    ReplyBuilder::new(question)
        .row(|row| {
            row.callback("Confirm", CallbackData::new(CallbackAction::Confirm(command.kind())))
                .callback("Cancel", CallbackData::new(CallbackAction::Decline));
        })
        .build()
}

/// Corrective message for rejected input; the user can retry or cancel.
pub fn retry_prompt(message: &str) -> Reply {
    ReplyBuilder::new(message).line("Please try again.").cancel_row().build()
}

pub fn store_created(store: &StoreCode) -> String {
    format!("Store {store} created.")
}

pub fn store_deleted(store: &StoreCode) -> String {
    format!("Store {store} deleted.")
}

pub fn rack_add_report(store: &StoreCode, outcome: &RackAddOutcome) -> String {
    let mut lines = vec![format!("Store {store}:")];
    push_items(&mut lines, "Racks added", &outcome.added);
    push_items(&mut lines, "Already exist", &outcome.existing);
    push_items(&mut lines, "Failed", &outcome.failed);
    lines.join("\n")
}

pub fn rack_delete_report(store: &StoreCode, outcome: &RackDeleteOutcome) -> String {
    let mut lines = vec![format!("Store {store}:")];
    push_items(&mut lines, "Racks deleted", &outcome.deleted);
    push_items(&mut lines, "Not found", &outcome.not_found);
    push_items(&mut lines, "Failed", &outcome.failed);
    lines.join("\n")
}

pub fn plu_add_report(store: &StoreCode, rack: &RackName, outcome: &PluAddOutcome) -> String {
    let mut lines = vec![format!("Rack {rack} in store {store}:")];
    push_items(&mut lines, "PLUs added", &outcome.added);
    push_items(&mut lines, "Duplicates skipped", &outcome.duplicates);
    push_items(&mut lines, "Failed", &outcome.failed);
    lines.join("\n")
}

pub fn plu_delete_report(store: &StoreCode, rack: &RackName, outcome: &PluDeleteOutcome) -> String {
    let mut lines = vec![format!("Rack {rack} in store {store}:")];
    push_items(&mut lines, "PLUs deleted", &outcome.deleted);
    push_items(&mut lines, "Not found", &outcome.not_found);
    push_items(&mut lines, "Failed", &outcome.failed);
    lines.join("\n")
}

fn push_items<T: std::fmt::Display>(lines: &mut Vec<String>, title: &str, items: &[T]) {
    if !items.is_empty() {
        lines.push(format!("{title}: {}", join(items)));
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::{confirmation, main_menu, plu_add_report, rack_choice, store_choice, ButtonTarget, MenuOptions};
    use crate::domain::{PluCode, RackName, StoreCode};
    use crate::flows::callback::CallbackAction;
    use crate::flows::states::{Command, OperationKind};
    use crate::inventory::PluAddOutcome;

    fn store(code: &str) -> StoreCode {
        StoreCode::parse(code).expect("valid store")
    }

    #[test]
    fn main_menu_lists_six_actions_and_optional_web_app() {
        let plain = main_menu(&MenuOptions::default(), None);
        assert_eq!(plain.callbacks().count(), 6);
        assert_eq!(plain.text, "Choose an action:");

        let with_app = main_menu(
            &MenuOptions { web_app_url: Some("https://example.test/app".to_owned()) },
            Some("Store AB12 created."),
        );
        assert!(with_app.text.starts_with("Store AB12 created."));
        let last = with_app.keyboard.last().and_then(|row| row.first()).expect("web app row");
        assert_eq!(last.target, ButtonTarget::WebApp("https://example.test/app".to_owned()));
    }

    #[test]
    fn store_choice_embeds_the_operation_and_store() {
        let reply = store_choice(OperationKind::DeleteStore, &[store("AB12"), store("CD34")]);
        let picks = reply
            .callbacks()
            .filter(|data| data.action == CallbackAction::PickStore(OperationKind::DeleteStore))
            .map(|data| data.store.clone().expect("store attached"))
            .collect::<Vec<_>>();
        assert_eq!(picks, vec![store("AB12"), store("CD34")]);
        assert!(reply.callbacks().any(|data| data.action == CallbackAction::Cancel));
    }

    #[test]
    fn rack_buttons_carry_store_and_rack() {
        let rack = RackName::parse("Rak Satu").expect("valid rack");
        let reply = rack_choice(OperationKind::AddPlu, &store("AB12"), std::slice::from_ref(&rack));
        let first = reply.callbacks().next().expect("rack button");
        assert_eq!(first.rack.as_ref(), Some(&rack));
        assert_eq!(first.store.as_ref(), Some(&store("AB12")));
    }

    #[test]
    fn confirmation_offers_confirm_for_the_same_kind() {
        let reply = confirmation(&Command::DeleteStore { store: store("AB12") });
        let actions = reply.callbacks().map(|data| data.action).collect::<Vec<_>>();
        assert_eq!(
            actions,
            vec![CallbackAction::Confirm(OperationKind::DeleteStore), CallbackAction::Decline]
        );
    }

    #[test]
    fn reports_itemise_every_bucket() {
        let code = |value: &str| PluCode::parse(value).expect("valid code");
        let outcome = PluAddOutcome {
            added: vec![code("A1"), code("B2")],
            duplicates: vec![code("A1")],
            failed: Vec::new(),
        };
        let rack = RackName::parse("Rak Satu").expect("valid rack");
        let report = plu_add_report(&store("AB12"), &rack, &outcome);
        assert_eq!(
            report,
            "Rack Rak Satu in store AB12:\nPLUs added: A1, B2\nDuplicates skipped: A1"
        );
    }
}
