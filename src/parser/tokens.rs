use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

/// The closed answer vocabulary of the form's checkbox grids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoricalToken {
    Yes,
    No,
    Nonexistent,
}

impl CategoricalToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoricalToken::Yes => "Yes",
            CategoricalToken::No => "No",
            CategoricalToken::Nonexistent => "Nonexistent",
        }
    }

    /// Normalize `raw` and accept it only if it lands in the vocabulary.
    pub fn parse(raw: &str, index: u32) -> Result<Self> {
        match normalize_token(raw).as_str() {
            "Yes" => Ok(CategoricalToken::Yes),
            "No" => Ok(CategoricalToken::No),
            "Nonexistent" => Ok(CategoricalToken::Nonexistent),
            other => Err(ExtractError::IntegrityViolation {
                index,
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for CategoricalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical spelling of an answer token.
///
/// Case-insensitive; synonyms of "does not apply" fold to `Nonexistent`.
/// Anything else comes back title-cased.
pub fn normalize_token(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.to_lowercase().as_str() {
        "yes" => "Yes".to_string(),
        "no" => "No".to_string(),
        "nonexistent" | "non-existent" | "does not exist" | "n/a" | "na" | "not applicable" => {
            "Nonexistent".to_string()
        }
        _ => title_case(trimmed),
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_idempotent_and_closed() {
        for raw in ["yes", "YES", "No ", "n/a", "does not exist"] {
            let once = normalize_token(raw);
            assert_eq!(normalize_token(&once), once);
            assert!(["Yes", "No", "Nonexistent"].contains(&once.as_str()), "{}", once);
        }
    }

    #[test]
    fn synonyms_fold_to_nonexistent() {
        for raw in ["N/A", "na", "Non-Existent", "Not Applicable", "DOES NOT EXIST"] {
            assert_eq!(normalize_token(raw), "Nonexistent");
        }
    }

    #[test]
    fn unknown_tokens_are_title_cased() {
        assert_eq!(normalize_token("  maybe later "), "Maybe Later");
        assert_eq!(normalize_token("PARTIAL-credit"), "Partial-Credit");
    }

    #[test]
    fn parse_rejects_foreign_values() {
        assert_eq!(CategoricalToken::parse("nO", 1).unwrap(), CategoricalToken::No);
        let err = CategoricalToken::parse("Maybe", 4).unwrap_err();
        match err {
            ExtractError::IntegrityViolation { index, value } => {
                assert_eq!(index, 4);
                assert_eq!(value, "Maybe");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
