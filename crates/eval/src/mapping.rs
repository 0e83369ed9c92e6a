//! Map-response scoring.
//!
//! A response is scored against its declaration's [`Mapping`] (value keys)
//! or [`AreaMapping`] (hotspot areas). Single responses take the first
//! matching entry. Container responses add each entry at most once, however
//! many elements hit it, plus the default for every element that hits no
//! entry. The total is clamped to the mapping's bounds; a Null response
//! scores the clamped default.

use qti_core::model::mapping::{clamp_to_bounds, AreaMapping, MapEntry, Mapping};
use qti_core::{BaseType, SingleValue, Value};

/// Score `response` against a value mapping. `base_type` is the response
/// declaration's base type, used to read the map keys.
pub fn map_response(mapping: &Mapping, base_type: BaseType, response: &Value) -> f64 {
    let clamp = |v: f64| clamp_to_bounds(v, mapping.lower_bound, mapping.upper_bound);
    match response {
        Value::Single(item) => {
            let hit = mapping
                .map_entries
                .iter()
                .find(|entry| entry_matches(entry, base_type, item));
            clamp(hit.map_or(mapping.default_value, |e| e.mapped_value))
        }
        Value::Multiple(_) | Value::Ordered(_) => {
            let items = response.items();
            let total = sum_once(
                items,
                mapping.map_entries.iter().map(|e| e.mapped_value),
                |index, item| entry_matches(&mapping.map_entries[index], base_type, item),
                mapping.default_value,
            );
            clamp(total)
        }
        Value::Null | Value::Record(_) => clamp(mapping.default_value),
    }
}

/// Score a point response against an area mapping.
pub fn map_response_point(mapping: &AreaMapping, response: &Value) -> f64 {
    let clamp = |v: f64| clamp_to_bounds(v, mapping.lower_bound, mapping.upper_bound);
    let in_area = |index: usize, item: &SingleValue| match item {
        SingleValue::Point { x, y } => {
            let entry = &mapping.area_map_entries[index];
            entry.shape.is_inside(&entry.coords, *x, *y)
        }
        _ => false,
    };
    match response {
        Value::Single(item) => {
            let hit = (0..mapping.area_map_entries.len()).find(|i| in_area(*i, item));
            clamp(hit.map_or(mapping.default_value, |i| {
                mapping.area_map_entries[i].mapped_value
            }))
        }
        Value::Multiple(_) | Value::Ordered(_) => clamp(sum_once(
            response.items(),
            mapping.area_map_entries.iter().map(|e| e.mapped_value),
            in_area,
            mapping.default_value,
        )),
        Value::Null | Value::Record(_) => clamp(mapping.default_value),
    }
}

fn sum_once(
    items: &[SingleValue],
    entry_values: impl Iterator<Item = f64>,
    matches: impl Fn(usize, &SingleValue) -> bool,
    default_value: f64,
) -> f64 {
    let mut unmatched = vec![true; items.len()];
    let mut total = 0.0;
    for (index, mapped_value) in entry_values.enumerate() {
        let mut counted = false;
        for (position, item) in items.iter().enumerate() {
            if matches(index, item) {
                if !counted {
                    total += mapped_value;
                    counted = true;
                }
                unmatched[position] = false;
            }
        }
    }
    let misses = unmatched.iter().filter(|u| **u).count();
    total + default_value * misses as f64
}

fn entry_matches(entry: &MapEntry, base_type: BaseType, item: &SingleValue) -> bool {
    if entry.case_sensitive {
        SingleValue::parse(base_type, &entry.map_key).is_ok_and(|key| &key == item)
    } else {
        entry.map_key.trim().to_lowercase() == item.to_string().to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qti_core::model::mapping::AreaMapEntry;
    use qti_core::model::Shape;
    use qti_core::Identifier;

    fn entry(key: &str, value: f64) -> MapEntry {
        MapEntry {
            map_key: key.to_string(),
            mapped_value: value,
            case_sensitive: true,
        }
    }

    fn abcd() -> Mapping {
        Mapping {
            lower_bound: None,
            upper_bound: None,
            default_value: 0.0,
            map_entries: vec![
                entry("A", 0.0),
                entry("B", 1.0),
                entry("C", 0.5),
                entry("D", 0.0),
            ],
        }
    }

    fn ids(names: &[&str]) -> Vec<SingleValue> {
        names
            .iter()
            .map(|n| SingleValue::Identifier(Identifier::new(*n).unwrap()))
            .collect()
    }

    #[test]
    fn single_takes_mapped_value() {
        let v = Value::Single(ids(&["C"]).remove(0));
        assert_eq!(map_response(&abcd(), BaseType::Identifier, &v), 0.5);
    }

    #[test]
    fn container_sums_each_entry_once() {
        let m = abcd();
        let cb = Value::multiple(BaseType::Identifier, ids(&["C", "B"]));
        let bbc = Value::ordered(BaseType::Identifier, ids(&["B", "B", "C"]));
        assert_eq!(map_response(&m, BaseType::Identifier, &cb), 1.5);
        assert_eq!(map_response(&m, BaseType::Identifier, &bbc), 1.5);
    }

    #[test]
    fn unmatched_elements_take_default() {
        let mut m = abcd();
        m.default_value = -1.0;
        m.map_entries.retain(|e| e.map_key != "D");
        let v = Value::multiple(BaseType::Identifier, ids(&["B", "D", "D"]));
        assert_eq!(map_response(&m, BaseType::Identifier, &v), -1.0);
    }

    #[test]
    fn null_scores_default_within_bounds() {
        let mut m = abcd();
        m.default_value = -2.0;
        m.lower_bound = Some(0.0);
        assert_eq!(map_response(&m, BaseType::Identifier, &Value::Null), 0.0);
    }

    #[test]
    fn upper_bound_caps_total() {
        let mut m = abcd();
        m.upper_bound = Some(1.0);
        let v = Value::multiple(BaseType::Identifier, ids(&["B", "C"]));
        assert_eq!(map_response(&m, BaseType::Identifier, &v), 1.0);
    }

    #[test]
    fn case_insensitive_string_keys() {
        let m = Mapping {
            lower_bound: None,
            upper_bound: None,
            default_value: 0.0,
            map_entries: vec![MapEntry {
                map_key: "Paris".into(),
                mapped_value: 2.0,
                case_sensitive: false,
            }],
        };
        assert_eq!(map_response(&m, BaseType::String, &Value::string("PARIS")), 2.0);
        let mut strict = m.clone();
        strict.map_entries[0].case_sensitive = true;
        assert_eq!(map_response(&strict, BaseType::String, &Value::string("PARIS")), 0.0);
    }

    #[test]
    fn area_mapping_counts_each_area_once() {
        let m = AreaMapping {
            lower_bound: None,
            upper_bound: None,
            default_value: 0.0,
            area_map_entries: vec![
                AreaMapEntry {
                    shape: Shape::Rect,
                    coords: vec![0, 0, 10, 10],
                    mapped_value: 2.0,
                },
                AreaMapEntry {
                    shape: Shape::Circle,
                    coords: vec![50, 50, 5],
                    mapped_value: 3.0,
                },
            ],
        };
        let points = Value::multiple(
            BaseType::Point,
            vec![
                SingleValue::Point { x: 1, y: 1 },
                SingleValue::Point { x: 2, y: 2 },
                SingleValue::Point { x: 52, y: 50 },
            ],
        );
        assert_eq!(map_response_point(&m, &points), 5.0);
        let miss = Value::Single(SingleValue::Point { x: 30, y: 30 });
        assert_eq!(map_response_point(&m, &miss), 0.0);
    }
}
