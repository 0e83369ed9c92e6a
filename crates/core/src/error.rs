use crate::identifier::Identifier;
use crate::value::BaseType;

/// A literal could not be read as a value of the requested base type.
///
/// Carries the offending literal and the lexical grammar that was expected so
/// callers can report the failure without the original source text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse '{literal}' as {base_type}: expected {expected}")]
pub struct ParseError {
    pub literal: String,
    pub base_type: BaseType,
    pub expected: &'static str,
}

impl ParseError {
    pub fn new(literal: &str, base_type: BaseType, expected: &'static str) -> Self {
        ParseError {
            literal: literal.to_string(),
            base_type,
            expected,
        }
    }
}

/// Errors raised while reading or converting the serialized value form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueFormatError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("value with {count} entries is missing a baseType")]
    MissingBaseType { count: usize },
    #[error("cardinality {0} requires at most one value")]
    TooManyValues(String),
    #[error("file literal supplied for non-file base type {0}")]
    UnexpectedFile(BaseType),
}

/// Inconsistencies in an item model that make it unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("invalid value for '{identifier}': {source}")]
    Value {
        identifier: Identifier,
        #[source]
        source: ParseError,
    },
    #[error("declaration '{0}' has no baseType")]
    MissingBaseType(Identifier),
    #[error("declaration '{identifier}' has single cardinality but {count} values")]
    TooManyValues { identifier: Identifier, count: usize },
    #[error("record value for '{0}' needs fieldIdentifier and baseType on every entry")]
    RecordFieldMissing(Identifier),
    #[error("'{0}' is declared more than once")]
    DuplicateDeclaration(Identifier),
    #[error("'{0}' is a reserved built-in variable")]
    ReservedIdentifier(Identifier),
}
