//! Raw candidate responses and their conversion to typed values.

use qti_core::model::VariableDeclaration;
use qti_core::{BaseType, Cardinality, FileValue, SingleValue, Value};
use serde::{Deserialize, Serialize};

/// Response data as submitted by a delivery layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// A single entered value.
    String(String),
    /// One string per selected choice or entered value.
    Strings(Vec<String>),
    /// An uploaded file.
    File(FileValue),
}

impl From<&str> for ResponseData {
    fn from(value: &str) -> Self {
        ResponseData::String(value.to_string())
    }
}

impl From<Vec<&str>> for ResponseData {
    fn from(values: Vec<&str>) -> Self {
        ResponseData::Strings(values.into_iter().map(str::to_string).collect())
    }
}

/// Convert raw data to a value of the declared type. Blank strings are
/// treated as "no answer"; a response with no answers is Null.
pub(crate) fn parse_response(
    declaration: &VariableDeclaration,
    data: &ResponseData,
) -> Result<Value, String> {
    let cardinality = declaration.cardinality;
    if cardinality == Cardinality::Record {
        return Err("record responses cannot be bound from raw data".into());
    }
    let base_type = declaration
        .base_type
        .ok_or_else(|| "declaration has no base type".to_string())?;

    match data {
        ResponseData::File(file) => {
            if base_type == BaseType::File && cardinality == Cardinality::Single {
                Ok(Value::Single(SingleValue::File(file.clone())))
            } else {
                Err(format!(
                    "file data supplied for a {} {} response",
                    cardinality, base_type
                ))
            }
        }
        _ if base_type == BaseType::File => Err("file response requires file data".into()),
        ResponseData::String(string) => {
            parse_strings(cardinality, base_type, std::slice::from_ref(string))
        }
        ResponseData::Strings(strings) => parse_strings(cardinality, base_type, strings),
    }
}

fn parse_strings(
    cardinality: Cardinality,
    base_type: BaseType,
    strings: &[String],
) -> Result<Value, String> {
    let answers: Vec<&String> = strings.iter().filter(|s| !s.trim().is_empty()).collect();
    if cardinality == Cardinality::Single && answers.len() > 1 {
        return Err(format!(
            "single response received {} values",
            answers.len()
        ));
    }
    let items = answers
        .into_iter()
        .map(|s| SingleValue::parse(base_type, s).map_err(|e| e.to_string()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Value::from_items(cardinality, base_type, items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::Identifier;

    fn decl(cardinality: Cardinality, base_type: BaseType) -> VariableDeclaration {
        VariableDeclaration::new(
            Identifier::new("RESPONSE").unwrap(),
            cardinality,
            Some(base_type),
        )
    }

    #[test]
    fn single_string_and_blank() {
        let d = decl(Cardinality::Single, BaseType::String);
        assert_eq!(
            parse_response(&d, &"hello".into()).unwrap(),
            Value::string("hello")
        );
        assert!(parse_response(&d, &"".into()).unwrap().is_null());
    }

    #[test]
    fn multiple_identifiers() {
        let d = decl(Cardinality::Multiple, BaseType::Identifier);
        let v = parse_response(&d, &vec!["A", "C"].into()).unwrap();
        assert_eq!(v.len(), 2);
        assert!(parse_response(&d, &ResponseData::Strings(vec![]))
            .unwrap()
            .is_null());
    }

    #[test]
    fn reads_bare_string_or_list_from_json() {
        let bare: ResponseData = serde_json::from_str(r#""B""#).unwrap();
        assert_eq!(bare, ResponseData::String("B".into()));
        let list: ResponseData = serde_json::from_str(r#"["B", "C"]"#).unwrap();
        assert_eq!(list, vec!["B", "C"].into());

        let d = decl(Cardinality::Single, BaseType::Identifier);
        assert_eq!(
            parse_response(&d, &bare).unwrap(),
            parse_response(&d, &ResponseData::Strings(vec!["B".into()])).unwrap()
        );
    }

    #[test]
    fn rejects_unparseable_and_misplaced_data() {
        let int = decl(Cardinality::Single, BaseType::Integer);
        assert!(parse_response(&int, &"abc".into()).is_err());
        assert!(parse_response(&int, &vec!["1", "2"].into()).is_err());
        let file = FileValue {
            content_type: "text/plain".into(),
            file_name: None,
            data: b"x".to_vec(),
        };
        assert!(parse_response(&int, &ResponseData::File(file.clone())).is_err());
        let upload = decl(Cardinality::Single, BaseType::File);
        assert!(parse_response(&upload, &ResponseData::File(file)).is_ok());
        assert!(parse_response(&upload, &"x".into()).is_err());
    }
}
