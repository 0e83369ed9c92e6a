//! Validated identifier tokens.
//!
//! Identifiers name variables, choices, categories and items. The lexical
//! form follows the schema's restricted name syntax: a letter or underscore,
//! followed by letters, digits, `_`, `-` or `.`. Comparison is exact and
//! case-sensitive.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lexical failure when constructing an [`Identifier`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("identifier must not be empty")]
    Empty,
    #[error("invalid identifier '{literal}': character '{found}' not allowed at position {position}")]
    InvalidCharacter {
        literal: String,
        found: char,
        position: usize,
    },
}

/// An immutable, lexically valid identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validate and wrap a string.
    pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
        let value = value.into();
        validate(&value)?;
        Ok(Identifier(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a dotted reference such as `Q01.SCORE` into its item part and
    /// variable part. Returns `None` for undotted identifiers.
    pub fn split_dotted(&self) -> Option<(&str, &str)> {
        self.0.split_once('.')
    }
}

fn validate(value: &str) -> Result<(), IdentifierError> {
    let mut chars = value.chars().enumerate();
    match chars.next() {
        None => return Err(IdentifierError::Empty),
        Some((_, c)) if c.is_alphabetic() || c == '_' => {}
        Some((position, found)) => {
            return Err(IdentifierError::InvalidCharacter {
                literal: value.to_string(),
                found,
                position,
            })
        }
    }
    for (position, c) in chars {
        if !(c.is_alphanumeric() || c == '_' || c == '-' || c == '.') {
            return Err(IdentifierError::InvalidCharacter {
                literal: value.to_string(),
                found: c,
                position,
            });
        }
    }
    Ok(())
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::new(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::new(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = IdentifierError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Identifier::new(value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}

impl Borrow<str> for Identifier {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_schema_names() {
        for ok in ["RESPONSE", "_x", "choice-A", "Q01.SCORE", "a1_b2", "été"] {
            assert!(Identifier::new(ok).is_ok(), "{ok} should be valid");
        }
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(Identifier::new(""), Err(IdentifierError::Empty));
        assert!(matches!(
            Identifier::new("1abc"),
            Err(IdentifierError::InvalidCharacter { position: 0, .. })
        ));
        assert!(matches!(
            Identifier::new("a b"),
            Err(IdentifierError::InvalidCharacter {
                found: ' ',
                position: 1,
                ..
            })
        ));
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let lower = Identifier::new("a").unwrap();
        let upper = Identifier::new("A").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn dotted_split() {
        let id = Identifier::new("Q01.SCORE").unwrap();
        assert_eq!(id.split_dotted(), Some(("Q01", "SCORE")));
        assert_eq!(Identifier::new("SCORE").unwrap().split_dotted(), None);
    }

    #[test]
    fn serde_validates() {
        let ok: Identifier = serde_json::from_str("\"RESPONSE\"").unwrap();
        assert_eq!(ok.as_str(), "RESPONSE");
        assert!(serde_json::from_str::<Identifier>("\"9x\"").is_err());
    }
}
