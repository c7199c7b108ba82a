use std::sync::Arc;

use rackbot_core::config::{AppConfig, LoadOptions};
use rackbot_core::{InventoryError, InventoryService};
use rackbot_sheets::{GoogleSheetsBackend, RetryPolicy, SheetInventory};
use serde::Serialize;

use crate::commands::{block_on, CommandResult, EXIT_BACKEND_FAILED, EXIT_CONFIG_INVALID};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSummary {
    pub store: String,
    pub racks: Vec<String>,
}

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "stores",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_INVALID,
            )
        }
    };
    let backend = match GoogleSheetsBackend::from_config(&config.sheets) {
        Ok(backend) => backend,
        Err(error) => {
            return CommandResult::failure(
                "stores",
                "backend_setup",
                error.to_string(),
                EXIT_BACKEND_FAILED,
            )
        }
    };
    let inventory = SheetInventory::new(Arc::new(backend), RetryPolicy::from(&config.retry))
        .with_products_table(config.sheets.products_table.clone());

    match block_on(collect(&inventory)) {
        Ok(Ok(summaries)) => CommandResult::success(render(&summaries, json_output)),
        Ok(Err(error)) => CommandResult::failure(
            "stores",
            "inventory",
            error.to_string(),
            EXIT_BACKEND_FAILED,
        ),
        Err(error) => {
            CommandResult::failure("stores", "runtime", format!("{error:#}"), EXIT_BACKEND_FAILED)
        }
    }
}

/// Every store with its racks in sheet order. Read-only.
pub async fn collect<S>(inventory: &S) -> Result<Vec<StoreSummary>, InventoryError>
where
    S: InventoryService + ?Sized,
{
    let mut summaries = Vec::new();
    for store in inventory.list_stores().await? {
        let racks = inventory.list_racks(&store).await?;
        summaries.push(StoreSummary {
            store: store.to_string(),
            racks: racks.iter().map(ToString::to_string).collect(),
        });
    }
    Ok(summaries)
}

pub fn render(summaries: &[StoreSummary], json_output: bool) -> String {
    if json_output {
        return serde_json::to_string_pretty(summaries).unwrap_or_else(|error| {
            format!("{{\"error\":\"store listing serialization failed: {error}\"}}")
        });
    }
    if summaries.is_empty() {
        return "no stores yet".to_string();
    }

    let mut lines = vec![format!("{} store(s):", summaries.len())];
    for summary in summaries {
        let racks = if summary.racks.is_empty() {
            "(no racks)".to_string()
        } else {
            summary.racks.join(", ")
        };
        lines.push(format!("- {}: {racks}", summary.store));
    }
    lines.join("\n")
}
