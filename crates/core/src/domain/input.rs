//! Free-text list grammar used by the conversation prompts.

use crate::domain::{PluCode, RackName};
use crate::errors::DomainError;

/// Rack names may contain spaces, so only commas separate them.
pub fn parse_rack_names(text: &str) -> Result<Vec<RackName>, DomainError> {
    let mut names: Vec<RackName> = Vec::new();
    for token in text.split(',').map(str::trim).filter(|token| !token.is_empty()) {
        let name = RackName::parse(token)?;
        if !names.contains(&name) {
            names.push(name);
        }
    }

    if names.is_empty() {
        return Err(DomainError::EmptyList);
    }
    Ok(names)
}

/// Codes are separated by commas, periods, semicolons or whitespace. Repeats are kept so
/// the repository can report them.
pub fn parse_plu_codes(text: &str) -> Result<Vec<PluCode>, DomainError> {
    let codes = text
        .split(|ch: char| ch == ',' || ch == '.' || ch == ';' || ch.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(PluCode::parse)
        .collect::<Result<Vec<_>, _>>()?;

    if codes.is_empty() {
        return Err(DomainError::EmptyList);
    }
    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::{parse_plu_codes, parse_rack_names};
    use crate::errors::DomainError;

    #[test]
    fn rack_names_split_on_commas_only() {
        let names = parse_rack_names("Rak Satu, Rak Dua,,Rak Satu").expect("valid list");
        let names = names.iter().map(|name| name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["Rak Satu", "Rak Dua"]);
    }

    #[test]
    fn plu_codes_accept_mixed_separators() {
        let codes = parse_plu_codes("a1, b2.C3 d4;e5\nA1").expect("valid list");
        let codes = codes.iter().map(|code| code.as_str()).collect::<Vec<_>>();
        assert_eq!(codes, vec!["A1", "B2", "C3", "D4", "E5", "A1"]);
    }

    #[test]
    fn blank_lists_are_rejected() {
        assert_eq!(parse_rack_names(" , ,"), Err(DomainError::EmptyList));
        assert_eq!(parse_plu_codes(" .. "), Err(DomainError::EmptyList));
    }

    #[test]
    fn one_bad_entry_rejects_the_input() {
        assert!(matches!(
            parse_plu_codes("A1, B#2"),
            Err(DomainError::InvalidPluCode(code)) if code == "B#2"
        ));
        assert!(parse_rack_names("Rak Satu, Rak_Dua").is_err());
    }
}
