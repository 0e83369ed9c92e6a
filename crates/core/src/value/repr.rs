//! Serialized form of [`Value`].
//!
//! ```json
//! {}                                                     // Null
//! {"baseType": "integer", "values": ["3"]}               // single
//! {"cardinality": "multiple", "baseType": "identifier", "values": ["A", "B"]}
//! {"cardinality": "record", "fields": {"x": {"baseType": "float", "value": "1.5"}}}
//! ```
//!
//! Every scalar travels as its canonical lexical form; file values travel as
//! an object with base64 `data`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{BaseType, Cardinality, FileValue, SingleValue, Value};
use crate::error::ValueFormatError;
use crate::identifier::Identifier;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValueRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cardinality: Option<Cardinality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_type: Option<BaseType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    values: Vec<LiteralRepr>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    fields: BTreeMap<Identifier, FieldRepr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum LiteralRepr {
    Text(String),
    File(FileValue),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldRepr {
    base_type: BaseType,
    value: LiteralRepr,
}

impl LiteralRepr {
    fn from_single(value: &SingleValue) -> Self {
        match value {
            SingleValue::File(file) => LiteralRepr::File(file.clone()),
            other => LiteralRepr::Text(other.to_string()),
        }
    }

    fn into_single(self, base_type: BaseType) -> Result<SingleValue, ValueFormatError> {
        match self {
            LiteralRepr::Text(text) => Ok(SingleValue::parse(base_type, &text)?),
            LiteralRepr::File(file) if base_type == BaseType::File => Ok(SingleValue::File(file)),
            LiteralRepr::File(_) => Err(ValueFormatError::UnexpectedFile(base_type)),
        }
    }
}

impl From<Value> for ValueRepr {
    fn from(value: Value) -> Self {
        let mut repr = ValueRepr {
            cardinality: value.cardinality(),
            base_type: value.base_type(),
            ..ValueRepr::default()
        };
        if let Value::Record(record) = &value {
            repr.fields = record
                .iter()
                .map(|(name, field)| {
                    (
                        name.clone(),
                        FieldRepr {
                            base_type: field.base_type(),
                            value: LiteralRepr::from_single(field),
                        },
                    )
                })
                .collect();
        } else {
            repr.values = value.items().iter().map(LiteralRepr::from_single).collect();
        }
        repr
    }
}

impl TryFrom<ValueRepr> for Value {
    type Error = ValueFormatError;

    fn try_from(repr: ValueRepr) -> Result<Self, Self::Error> {
        if !repr.fields.is_empty() || repr.cardinality == Some(Cardinality::Record) {
            let mut fields = Vec::with_capacity(repr.fields.len());
            for (name, field) in repr.fields {
                fields.push((name, field.value.into_single(field.base_type)?));
            }
            return Ok(Value::record(fields));
        }
        if repr.values.is_empty() {
            return Ok(Value::Null);
        }
        let base_type = repr.base_type.ok_or(ValueFormatError::MissingBaseType {
            count: repr.values.len(),
        })?;
        let cardinality = repr.cardinality.unwrap_or(Cardinality::Single);
        if cardinality == Cardinality::Single && repr.values.len() > 1 {
            return Err(ValueFormatError::TooManyValues(cardinality.to_string()));
        }
        let items = repr
            .values
            .into_iter()
            .map(|literal| literal.into_single(base_type))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::from_items(cardinality, base_type, items))
    }
}
