//! Single (scalar) values and their lexical forms.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::BaseType;
use crate::error::ParseError;
use crate::identifier::Identifier;

const INTEGER_GRAMMAR: &str = "an optionally signed decimal integer, e.g. -12";
const FLOAT_GRAMMAR: &str = "an xsd:double such as 1, -0.5, 2.5E3, INF or NaN";
const BOOLEAN_GRAMMAR: &str = "one of true, false, 1, 0";
const IDENTIFIER_GRAMMAR: &str = "a name starting with a letter or '_'";
const POINT_GRAMMAR: &str = "two integers separated by whitespace, e.g. '10 20'";
const PAIR_GRAMMAR: &str = "two identifiers separated by whitespace, e.g. 'A B'";
const FILE_GRAMMAR: &str = "binary file content (no lexical form)";

/// An uploaded file held as a response value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileValue {
    pub content_type: String,
    pub file_name: Option<String>,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// A value of single cardinality.
#[derive(Debug, Clone)]
pub enum SingleValue {
    Identifier(Identifier),
    Boolean(bool),
    Integer(i32),
    Float(f64),
    String(String),
    Point { x: i32, y: i32 },
    /// Unordered pair: `A B` equals `B A`.
    Pair(Identifier, Identifier),
    DirectedPair(Identifier, Identifier),
    /// Seconds.
    Duration(f64),
    File(FileValue),
    Uri(String),
}

impl SingleValue {
    pub fn base_type(&self) -> BaseType {
        match self {
            SingleValue::Identifier(_) => BaseType::Identifier,
            SingleValue::Boolean(_) => BaseType::Boolean,
            SingleValue::Integer(_) => BaseType::Integer,
            SingleValue::Float(_) => BaseType::Float,
            SingleValue::String(_) => BaseType::String,
            SingleValue::Point { .. } => BaseType::Point,
            SingleValue::Pair(..) => BaseType::Pair,
            SingleValue::DirectedPair(..) => BaseType::DirectedPair,
            SingleValue::Duration(_) => BaseType::Duration,
            SingleValue::File(_) => BaseType::File,
            SingleValue::Uri(_) => BaseType::Uri,
        }
    }

    /// Parse a literal according to the lexical rules of `base_type`.
    ///
    /// Surrounding whitespace is ignored for every type except string and
    /// uri, which are taken verbatim.
    pub fn parse(base_type: BaseType, literal: &str) -> Result<SingleValue, ParseError> {
        let trimmed = literal.trim();
        match base_type {
            BaseType::String => Ok(SingleValue::String(literal.to_string())),
            BaseType::Uri => Ok(SingleValue::Uri(literal.to_string())),
            BaseType::Identifier => Identifier::new(trimmed)
                .map(SingleValue::Identifier)
                .map_err(|_| ParseError::new(literal, base_type, IDENTIFIER_GRAMMAR)),
            BaseType::Boolean => match trimmed {
                "true" | "1" => Ok(SingleValue::Boolean(true)),
                "false" | "0" => Ok(SingleValue::Boolean(false)),
                _ => Err(ParseError::new(literal, base_type, BOOLEAN_GRAMMAR)),
            },
            BaseType::Integer => parse_integer(trimmed)
                .map(SingleValue::Integer)
                .ok_or_else(|| ParseError::new(literal, base_type, INTEGER_GRAMMAR)),
            BaseType::Float => parse_double(trimmed)
                .map(SingleValue::Float)
                .ok_or_else(|| ParseError::new(literal, base_type, FLOAT_GRAMMAR)),
            BaseType::Duration => parse_double(trimmed)
                .map(SingleValue::Duration)
                .ok_or_else(|| ParseError::new(literal, base_type, FLOAT_GRAMMAR)),
            BaseType::Point => {
                let parts: Vec<&str> = trimmed.split_whitespace().collect();
                match parts.as_slice() {
                    [x, y] => match (parse_integer(x), parse_integer(y)) {
                        (Some(x), Some(y)) => Ok(SingleValue::Point { x, y }),
                        _ => Err(ParseError::new(literal, base_type, POINT_GRAMMAR)),
                    },
                    _ => Err(ParseError::new(literal, base_type, POINT_GRAMMAR)),
                }
            }
            BaseType::Pair | BaseType::DirectedPair => {
                let parts: Vec<&str> = trimmed.split_whitespace().collect();
                let (first, second) = match parts.as_slice() {
                    [a, b] => match (Identifier::new(*a), Identifier::new(*b)) {
                        (Ok(a), Ok(b)) => (a, b),
                        _ => return Err(ParseError::new(literal, base_type, PAIR_GRAMMAR)),
                    },
                    _ => return Err(ParseError::new(literal, base_type, PAIR_GRAMMAR)),
                };
                if base_type == BaseType::Pair {
                    Ok(SingleValue::Pair(first, second))
                } else {
                    Ok(SingleValue::DirectedPair(first, second))
                }
            }
            BaseType::File => Err(ParseError::new(literal, base_type, FILE_GRAMMAR)),
        }
    }

    /// Numeric view with integer widening. `None` for non-numeric values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SingleValue::Integer(i) => Some(f64::from(*i)),
            SingleValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i32> {
        match self {
            SingleValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SingleValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match self {
            SingleValue::Identifier(id) => Some(id),
            _ => None,
        }
    }

    /// Textual content of string and uri values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SingleValue::String(s) | SingleValue::Uri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<f64> {
        match self {
            SingleValue::Duration(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SingleValue::Integer(_) | SingleValue::Float(_))
    }

    /// Widen an integer to a float; other values are returned unchanged.
    pub fn widen_to_float(self) -> SingleValue {
        match self {
            SingleValue::Integer(i) => SingleValue::Float(f64::from(i)),
            other => other,
        }
    }
}

impl PartialEq for SingleValue {
    fn eq(&self, other: &Self) -> bool {
        use SingleValue::*;
        match (self, other) {
            (Identifier(a), Identifier(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => same_double(*a, *b),
            (String(a), String(b)) => a == b,
            (Point { x: ax, y: ay }, Point { x: bx, y: by }) => ax == bx && ay == by,
            (Pair(a1, a2), Pair(b1, b2)) => (a1 == b1 && a2 == b2) || (a1 == b2 && a2 == b1),
            (DirectedPair(a1, a2), DirectedPair(b1, b2)) => a1 == b1 && a2 == b2,
            (Duration(a), Duration(b)) => same_double(*a, *b),
            (File(a), File(b)) => a == b,
            (Uri(a), Uri(b)) => a == b,
            _ => false,
        }
    }
}

/// NaN equals NaN so every parsed literal equals its own parse.
fn same_double(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl fmt::Display for SingleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SingleValue::Identifier(id) => write!(f, "{}", id),
            SingleValue::Boolean(b) => write!(f, "{}", b),
            SingleValue::Integer(i) => write!(f, "{}", i),
            SingleValue::Float(v) | SingleValue::Duration(v) => f.write_str(&format_double(*v)),
            SingleValue::String(s) | SingleValue::Uri(s) => f.write_str(s),
            SingleValue::Point { x, y } => write!(f, "{} {}", x, y),
            SingleValue::Pair(a, b) | SingleValue::DirectedPair(a, b) => write!(f, "{} {}", a, b),
            SingleValue::File(file) => match &file.file_name {
                Some(name) => write!(f, "{} ({})", name, file.content_type),
                None => write!(f, "<{} bytes of {}>", file.data.len(), file.content_type),
            },
        }
    }
}

/// Canonical xsd:double lexical form, readable by [`SingleValue::parse`].
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "INF".to_string()
        } else {
            "-INF".to_string()
        }
    } else {
        format!("{}", value)
    }
}

fn parse_integer(s: &str) -> Option<i32> {
    let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse::<i32>().ok()
}

fn parse_double(s: &str) -> Option<f64> {
    match s {
        "INF" | "+INF" => return Some(f64::INFINITY),
        "-INF" => return Some(f64::NEG_INFINITY),
        "NaN" => return Some(f64::NAN),
        _ => {}
    }
    if !is_decimal_lexical(s) {
        return None;
    }
    let value = s.parse::<f64>().ok()?;
    // +0.0 and -0.0 share one canonical zero
    Some(if value == 0.0 { 0.0 } else { value })
}

/// `(+|-)? (digits (. digits?)? | . digits) ((e|E) (+|-)? digits)?`
fn is_decimal_lexical(s: &str) -> bool {
    let body = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(int_part) || !frac_part.map_or(true, all_digits) {
        return false;
    }
    if int_part.is_empty() && frac_part.map_or(true, str::is_empty) {
        return false;
    }
    match exponent {
        None => true,
        Some(exp) => {
            let exp_digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !exp_digits.is_empty() && all_digits(exp_digits)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn signed_zero_is_canonical() {
        let zeros: Vec<SingleValue> = ["0", "+0.0", "-0.0", "0.0", "-0"]
            .iter()
            .map(|s| SingleValue::parse(BaseType::Float, s).unwrap())
            .collect();
        for z in &zeros {
            assert_eq!(z, &SingleValue::Float(0.0));
            assert_eq!(z.to_string(), "0");
        }
    }

    #[test]
    fn float_lexical_forms() {
        assert_eq!(
            SingleValue::parse(BaseType::Float, "1").unwrap(),
            SingleValue::parse(BaseType::Float, "1.0").unwrap()
        );
        assert_eq!(
            SingleValue::parse(BaseType::Float, "2.5E3").unwrap(),
            SingleValue::Float(2500.0)
        );
        assert_eq!(
            SingleValue::parse(BaseType::Float, ".5").unwrap(),
            SingleValue::Float(0.5)
        );
        assert_eq!(
            SingleValue::parse(BaseType::Float, "-INF").unwrap(),
            SingleValue::Float(f64::NEG_INFINITY)
        );
        for bad in ["", ".", "1e", "abc", "inf", "1.2.3", "--1", "1 2"] {
            let err = SingleValue::parse(BaseType::Float, bad).unwrap_err();
            assert_eq!(err.literal, bad);
            assert_eq!(err.base_type, BaseType::Float);
        }
    }

    #[test]
    fn nan_literal_equals_itself() {
        let nan = SingleValue::parse(BaseType::Float, "NaN").unwrap();
        assert_eq!(nan, SingleValue::parse(BaseType::Float, "NaN").unwrap());
        assert_eq!(nan.to_string(), "NaN");
        assert_ne!(nan, SingleValue::Float(0.0));
        assert_eq!(
            SingleValue::parse(BaseType::Duration, "NaN").unwrap(),
            SingleValue::Duration(f64::NAN)
        );
    }

    #[test]
    fn integer_signs() {
        assert_eq!(
            SingleValue::parse(BaseType::Integer, "+42").unwrap(),
            SingleValue::Integer(42)
        );
        assert_eq!(
            SingleValue::parse(BaseType::Integer, "-7").unwrap(),
            SingleValue::Integer(-7)
        );
        assert!(SingleValue::parse(BaseType::Integer, "1.0").is_err());
        assert!(SingleValue::parse(BaseType::Integer, "+").is_err());
        assert!(SingleValue::parse(BaseType::Integer, "99999999999").is_err());
    }

    #[test]
    fn pair_is_unordered_directed_pair_is_not() {
        let p1 = SingleValue::parse(BaseType::Pair, "A B").unwrap();
        let p2 = SingleValue::parse(BaseType::Pair, "B A").unwrap();
        assert_eq!(p1, p2);
        let d1 = SingleValue::DirectedPair(id("A"), id("B"));
        let d2 = SingleValue::DirectedPair(id("B"), id("A"));
        assert_ne!(d1, d2);
        assert_ne!(p1, d1);
    }

    #[test]
    fn point_and_boolean() {
        assert_eq!(
            SingleValue::parse(BaseType::Point, " 10   -3 ").unwrap(),
            SingleValue::Point { x: 10, y: -3 }
        );
        assert!(SingleValue::parse(BaseType::Point, "10").is_err());
        assert_eq!(
            SingleValue::parse(BaseType::Boolean, "1").unwrap(),
            SingleValue::Boolean(true)
        );
        assert!(SingleValue::parse(BaseType::Boolean, "yes").is_err());
    }

    #[test]
    fn file_has_no_lexical_form() {
        let err = SingleValue::parse(BaseType::File, "data").unwrap_err();
        assert_eq!(err.expected, FILE_GRAMMAR);
    }

    #[test]
    fn string_is_verbatim() {
        assert_eq!(
            SingleValue::parse(BaseType::String, "  padded ").unwrap(),
            SingleValue::String("  padded ".to_string())
        );
    }
}
