//! Evaluate predicates against JSON records.
//!
//! Used by stores that scan records instead of delegating to an engine with
//! its own query language. Paths are dotted data paths; a segment that lands
//! on an array fans out over its elements, so `points.location` reaches the
//! location of every entry in `points`.

use chrono::{DateTime, FixedOffset};
use regex::RegexBuilder;
use serde_json::Value;
use std::cmp::Ordering;

use super::error::StoreError;
use crate::models::Record;
use crate::query::{Constraint, Operator, Predicate};

/// Mean earth radius in metres
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Whether `record` satisfies `predicate`
pub fn matches(record: &Record, predicate: &Predicate) -> Result<bool, StoreError> {
    match predicate {
        Predicate::Leaf(constraint) => evaluate_constraint(record, constraint),
        Predicate::And(children) => {
            for child in children {
                if !matches(record, child)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Predicate::Or(children) => {
            for child in children {
                if matches(record, child)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
    }
}

/// Every value reachable at a dotted path
pub fn resolve_path<'a>(record: &'a Record, path: &str) -> Vec<&'a Value> {
    let segments: Vec<&str> = path.split('.').collect();
    let mut found = Vec::new();
    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = record.get(*head) {
            collect_values(value, rest, &mut found);
        }
    }
    found
}

fn collect_values<'a>(value: &'a Value, segments: &[&str], found: &mut Vec<&'a Value>) {
    let Some((head, rest)) = segments.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Value::Object(map) => {
            if let Some(next) = map.get(*head) {
                collect_values(next, rest, found);
            }
        }
        Value::Array(items) => match head.parse::<usize>() {
            Ok(index) => {
                if let Some(item) = items.get(index) {
                    collect_values(item, rest, found);
                }
            }
            Err(_) => {
                for item in items {
                    collect_values(item, segments, found);
                }
            }
        },
        _ => {}
    }
}

fn evaluate_constraint(record: &Record, constraint: &Constraint) -> Result<bool, StoreError> {
    let candidates = resolve_path(record, &constraint.path);
    let operand = &constraint.value;

    let matched = match constraint.operator {
        Operator::Equals => equals_any(&candidates, operand),
        Operator::NotEquals => !equals_any(&candidates, operand),
        Operator::In => as_list(operand).iter().any(|option| equals_any(&candidates, option)),
        Operator::NotIn => !as_list(operand).iter().any(|option| equals_any(&candidates, option)),
        Operator::All => {
            let options = as_list(operand);
            !options.is_empty() && options.iter().all(|option| equals_any(&candidates, option))
        }
        Operator::GreaterThan => compares(&candidates, operand, |o| o == Ordering::Greater),
        Operator::GreaterThanEqual => compares(&candidates, operand, |o| o != Ordering::Less),
        Operator::LessThan => compares(&candidates, operand, |o| o == Ordering::Less),
        Operator::LessThanEqual => compares(&candidates, operand, |o| o != Ordering::Greater),
        Operator::Contains => contains(&candidates, operand),
        Operator::Like => like(&candidates, operand, constraint)?,
        Operator::Near => {
            let query = NearQuery::parse(operand)
                .ok_or_else(|| invalid(constraint, "expected [longitude, latitude, maxDistance?, minDistance?]"))?;
            candidates
                .iter()
                .filter_map(|candidate| point_of(candidate))
                .any(|point| query.accepts(point))
        }
        Operator::Within | Operator::Intersects => {
            let polygons = polygons_of(operand)
                .ok_or_else(|| invalid(constraint, "expected a GeoJSON Polygon or MultiPolygon"))?;
            candidates
                .iter()
                .filter_map(|candidate| point_of(candidate))
                .any(|point| polygons.iter().any(|polygon| point_in_polygon(point, polygon)))
        }
    };

    Ok(matched)
}

fn invalid(constraint: &Constraint, reason: &str) -> StoreError {
    StoreError::invalid_operand(&constraint.path, constraint.operator, reason)
}

/// List operand; a comma-separated string counts as a list
fn as_list(operand: &Value) -> Vec<Value> {
    match operand {
        Value::Array(items) => items.clone(),
        Value::String(csv) if csv.contains(',') => csv
            .split(',')
            .map(|item| Value::String(item.trim().to_string()))
            .collect(),
        single => vec![single.clone()],
    }
}

/// Equality with "any element" semantics for list values
///
/// `null` also matches a missing path.
fn equals_any(candidates: &[&Value], operand: &Value) -> bool {
    if operand.is_null() {
        return candidates.is_empty() || candidates.iter().any(|c| c.is_null());
    }
    candidates.iter().any(|candidate| match candidate {
        Value::Array(items) => {
            loose_eq(candidate, operand) || items.iter().any(|item| loose_eq(item, operand))
        }
        _ => loose_eq(candidate, operand),
    })
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    left == right || compare_values(left, right) == Some(Ordering::Equal)
}

fn compares(candidates: &[&Value], operand: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    candidates
        .iter()
        .flat_map(|candidate| match candidate {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            single => vec![*single],
        })
        .any(|value| compare_values(value, operand).map(&accept).unwrap_or(false))
}

/// Order two scalar values
///
/// Numbers compare numerically, and so does a numeric string against a
/// number. RFC 3339 timestamps compare chronologically, other strings
/// lexically. Mixed or structured values are unordered.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_number() || right.is_number() {
        if let (Some(a), Some(b)) = (as_number(left), as_number(right)) {
            return a.partial_cmp(&b);
        }
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => match (parse_date(a), parse_date(b)) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.cmp(b)),
        },
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn contains(candidates: &[&Value], operand: &Value) -> bool {
    let Some(needle) = operand.as_str() else {
        return equals_any(candidates, operand);
    };
    let needle = needle.to_lowercase();
    candidates
        .iter()
        .flat_map(|candidate| match candidate {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            single => vec![*single],
        })
        .filter_map(|value| value.as_str())
        .any(|haystack| haystack.to_lowercase().contains(&needle))
}

/// Every whitespace-separated word must occur, case-insensitively
fn like(candidates: &[&Value], operand: &Value, constraint: &Constraint) -> Result<bool, StoreError> {
    let pattern = text_of(operand).ok_or_else(|| invalid(constraint, "expected text"))?;

    let words = pattern
        .split_whitespace()
        .map(|word| {
            RegexBuilder::new(&regex::escape(word))
                .case_insensitive(true)
                .build()
                .map_err(|e| invalid(constraint, &e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(candidates
        .iter()
        .filter_map(|candidate| text_of(candidate))
        .any(|text| words.iter().all(|word| word.is_match(&text))))
}

/// `[longitude, latitude]` of a stored point
///
/// Accepts the bare coordinate pair and the GeoJSON `Point` object.
pub fn point_of(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::Array(pair) if pair.len() == 2 => Some((pair[0].as_f64()?, pair[1].as_f64()?)),
        Value::Object(map) => point_of(map.get("coordinates")?),
        _ => None,
    }
}

/// Great-circle distance in metres between two `[longitude, latitude]` points
pub fn haversine_distance(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lng1, lat1) = (from.0.to_radians(), from.1.to_radians());
    let (lng2, lat2) = (to.0.to_radians(), to.1.to_radians());
    let d_lat = lat2 - lat1;
    let d_lng = lng2 - lng1;

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}

/// Parsed `near` operand
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearQuery {
    pub origin: (f64, f64),
    pub max_distance: Option<f64>,
    pub min_distance: Option<f64>,
}

impl NearQuery {
    /// `[lng, lat, max?, min?]` or the comma-separated string form
    pub fn parse(operand: &Value) -> Option<Self> {
        let parts: Vec<Option<f64>> = match operand {
            Value::Array(items) => items.iter().map(as_number).collect(),
            Value::String(csv) => csv
                .split(',')
                .map(|part| {
                    let part = part.trim();
                    if part.is_empty() || part == "null" {
                        None
                    } else {
                        part.parse::<f64>().ok()
                    }
                })
                .collect(),
            _ => return None,
        };

        Some(Self {
            origin: ((*parts.first()?)?, (*parts.get(1)?)?),
            max_distance: parts.get(2).copied().flatten(),
            min_distance: parts.get(3).copied().flatten(),
        })
    }

    pub fn accepts(&self, point: (f64, f64)) -> bool {
        let distance = haversine_distance(self.origin, point);
        self.max_distance.map_or(true, |max| distance <= max)
            && self.min_distance.map_or(true, |min| distance >= min)
    }
}

/// Origin of the first `near` constraint in a predicate
pub fn near_origin(predicate: &Predicate) -> Option<(String, (f64, f64))> {
    predicate
        .flatten()
        .into_iter()
        .filter(|constraint| constraint.operator == Operator::Near)
        .find_map(|constraint| {
            NearQuery::parse(&constraint.value).map(|query| (constraint.path.clone(), query.origin))
        })
}

type Ring = Vec<(f64, f64)>;

/// Outer rings of a GeoJSON Polygon / MultiPolygon operand
fn polygons_of(operand: &Value) -> Option<Vec<Ring>> {
    let geometry = operand.as_object()?;
    let coordinates = geometry.get("coordinates")?;

    match geometry.get("type")?.as_str()? {
        "Polygon" => Some(vec![ring_of(coordinates.as_array()?.first()?)?]),
        "MultiPolygon" => coordinates
            .as_array()?
            .iter()
            .map(|polygon| ring_of(polygon.as_array()?.first()?))
            .collect(),
        _ => None,
    }
}

fn ring_of(value: &Value) -> Option<Ring> {
    value.as_array()?.iter().map(point_of).collect()
}

/// Ray casting; points on an edge count as inside
fn point_in_polygon(point: (f64, f64), ring: &[(f64, f64)]) -> bool {
    let (x, y) = point;
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);

    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];

        let cross = (x - xi) * (yj - yi) - (y - yi) * (xj - xi);
        let within_x = x >= xi.min(xj) && x <= xi.max(xj);
        let within_y = y >= yi.min(yj) && y <= yi.max(yj);
        if cross.abs() < f64::EPSILON && within_x && within_y {
            return true;
        }

        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    fn check(record: &Record, predicate: Value) -> bool {
        matches(record, &Predicate::from_value(&predicate).unwrap()).unwrap()
    }

    #[test]
    fn test_nested_array_paths_fan_out() {
        let doc = record(json!({ "points": [{ "location": [1, 2] }, { "location": [3, 4] }] }));
        let values = resolve_path(&doc, "points.location");
        assert_eq!(values, vec![&json!([1, 2]), &json!([3, 4])]);
        assert_eq!(resolve_path(&doc, "points.1.location"), vec![&json!([3, 4])]);
        assert!(resolve_path(&doc, "points.missing").is_empty());
    }

    #[test]
    fn test_equality_operators() {
        let doc = record(json!({ "status": "draft", "tags": ["a", "b"], "views": 10 }));

        assert!(check(&doc, json!({ "status": { "equals": "draft" } })));
        assert!(check(&doc, json!({ "status": { "not_equals": "published" } })));
        assert!(check(&doc, json!({ "tags": { "equals": "b" } })));
        assert!(check(&doc, json!({ "views": { "equals": 10.0 } })));
        assert!(check(&doc, json!({ "status": { "in": ["published", "draft"] } })));
        assert!(check(&doc, json!({ "status": { "not_in": ["published"] } })));
        assert!(check(&doc, json!({ "status": { "in": "published,draft" } })));
        assert!(check(&doc, json!({ "tags": { "all": ["a", "b"] } })));
        assert!(!check(&doc, json!({ "tags": { "all": ["a", "c"] } })));
        assert!(check(&doc, json!({ "missing": { "equals": null } })));
        assert!(!check(&doc, json!({ "status": { "equals": null } })));
    }

    #[test]
    fn test_numeric_text_compares_as_text() {
        let doc = record(json!({ "slug": "007", "code": "1e3", "views": 7 }));

        assert!(check(&doc, json!({ "slug": { "equals": "007" } })));
        assert!(!check(&doc, json!({ "slug": { "equals": "7" } })));
        assert!(!check(&doc, json!({ "code": { "equals": "1000" } })));
        assert!(!check(&doc, json!({ "slug": { "in": ["7", "07"] } })));
        assert!(check(&doc, json!({ "slug": { "not_in": ["7"] } })));
        assert!(check(&doc, json!({ "slug": { "less_than": "7" } })));
        assert!(check(&doc, json!({ "views": { "equals": "7" } })));
        assert!(check(&doc, json!({ "slug": { "equals": 7 } })));
    }

    #[test]
    fn test_date_comparison_ignores_fraction_format() {
        let doc = record(json!({ "updatedAt": "2024-01-01T00:00:00.500Z" }));
        assert!(check(&doc, json!({ "updatedAt": { "greater_than": "2024-01-01T00:00:00Z" } })));
        assert!(!check(&doc, json!({ "updatedAt": { "greater_than": "2024-01-01T00:00:00.500Z" } })));
        assert!(check(&doc, json!({ "updatedAt": { "greater_than_equal": "2024-01-01T00:00:00.500Z" } })));
        assert!(!check(&doc, json!({ "updatedAt": { "less_than": "2024-01-01T01:00:00+01:00" } })));
    }

    #[test]
    fn test_like_requires_every_word() {
        let doc = record(json!({ "title": "Hello Brave New World" }));
        assert!(check(&doc, json!({ "title": { "like": "world hello" } })));
        assert!(!check(&doc, json!({ "title": { "like": "hello moon" } })));
        assert!(!check(&doc, json!({ "title": { "like": "(brave" } })));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let doc = record(json!({ "title": "Rust Programming", "tags": ["Systems", "web"] }));
        assert!(check(&doc, json!({ "title": { "contains": "PROG" } })));
        assert!(check(&doc, json!({ "tags": { "contains": "sys" } })));
        assert!(!check(&doc, json!({ "tags": { "contains": "mobile" } })));
    }

    #[test]
    fn test_near_with_distance_bounds() {
        let doc = record(json!({ "location": [10.0, 20.0] }));
        assert!(check(&doc, json!({ "location": { "near": [10.0, 20.0, 1000] } })));
        assert!(check(&doc, json!({ "location": { "near": "10.01,20,5000" } })));
        assert!(!check(&doc, json!({ "location": { "near": [11.0, 20.0, 1000] } })));
        assert!(!check(&doc, json!({ "location": { "near": [10.0, 20.0, null, 10] } })));
    }

    #[test]
    fn test_invalid_near_operand() {
        let doc = record(json!({ "location": [10.0, 20.0] }));
        let predicate = Predicate::from_value(&json!({ "location": { "near": "nowhere" } })).unwrap();
        assert!(matches!(
            matches(&doc, &predicate),
            Err(StoreError::InvalidOperand { operator: Operator::Near, .. })
        ));
    }

    #[test]
    fn test_within_polygon() {
        let square = json!({
            "type": "Polygon",
            "coordinates": [[[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]]]
        });
        let inside = record(json!({ "location": [5, 5] }));
        let edge = record(json!({ "location": { "type": "Point", "coordinates": [10, 5] } }));
        let outside = record(json!({ "location": [15, 5] }));

        assert!(check(&inside, json!({ "location": { "within": square.clone() } })));
        assert!(check(&edge, json!({ "location": { "intersects": square.clone() } })));
        assert!(!check(&outside, json!({ "location": { "within": square } })));
    }

    #[test]
    fn test_and_or_combinations() {
        let doc = record(json!({ "a": 1, "b": 2 }));
        assert!(check(&doc, json!({ "or": [{ "a": { "equals": 5 } }, { "b": { "equals": 2 } }] })));
        assert!(!check(&doc, json!({ "and": [{ "a": { "equals": 1 } }, { "b": { "equals": 3 } }] })));
        assert!(check(&doc, json!({ "and": [] })));
        assert!(!check(&doc, json!({ "or": [] })));
    }

    #[test]
    fn test_haversine_one_degree_of_latitude() {
        let distance = haversine_distance((0.0, 0.0), (0.0, 1.0));
        assert!((distance - 111_195.0).abs() < 100.0, "got {}", distance);
    }

    #[test]
    fn test_near_origin() {
        let predicate = Predicate::from_value(&json!({
            "and": [{ "title": { "equals": "x" } }, { "location": { "near": [1, 2, 100] } }]
        }))
        .unwrap();
        assert_eq!(near_origin(&predicate), Some(("location".to_string(), (1.0, 2.0))));
    }
}
