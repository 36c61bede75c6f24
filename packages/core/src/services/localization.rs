//! Localized Field Values
//!
//! A localized field is stored as a map from locale to value:
//!
//! ```json
//! { "title": { "en": "Hello", "de": "Hallo" } }
//! ```
//!
//! Reads pick one locale (falling back to another when the value is
//! missing); writes wrap the incoming value under the request locale while
//! keeping the other locales already stored. Paths are dotted and fan out
//! over arrays, so `items.label` addresses the label of every item.

use serde_json::{Map, Value};

use crate::models::Record;

/// Locale value that returns every locale unchanged
pub const ALL_LOCALES: &str = "all";

fn is_locale_map(map: &Map<String, Value>, locales: &[String]) -> bool {
    !map.is_empty() && map.keys().all(|key| locales.iter().any(|locale| locale == key))
}

/// Replace every localized value in `record` by its `locale` value
///
/// A missing or null value falls back to `fallback`, and to null after that.
/// Values that are not locale maps are left alone.
pub fn localize_record(
    record: &mut Record,
    paths: &[String],
    locales: &[String],
    locale: &str,
    fallback: Option<&str>,
) {
    if locale == ALL_LOCALES {
        return;
    }
    for path in paths {
        let segments: Vec<&str> = path.split('.').collect();
        if let Some((head, rest)) = segments.split_first() {
            if let Some(value) = record.get_mut(*head) {
                pick_locale(value, rest, locales, locale, fallback);
            }
        }
    }
}

fn pick_locale(value: &mut Value, segments: &[&str], locales: &[String], locale: &str, fallback: Option<&str>) {
    let Some((head, rest)) = segments.split_first() else {
        if let Value::Object(map) = value {
            if is_locale_map(map, locales) {
                let chosen = map
                    .get(locale)
                    .filter(|v| !v.is_null())
                    .or_else(|| fallback.and_then(|f| map.get(f)))
                    .cloned()
                    .unwrap_or(Value::Null);
                *value = chosen;
            }
        }
        return;
    };

    match value {
        Value::Object(map) => {
            if let Some(child) = map.get_mut(*head) {
                pick_locale(child, rest, locales, locale, fallback);
            }
        }
        Value::Array(items) => {
            for item in items {
                pick_locale(item, segments, locales, locale, fallback);
            }
        }
        _ => {}
    }
}

/// Wrap the localized values of `incoming` under `locale`
///
/// Other locales are carried over from `existing`, the record as currently
/// stored. Array items are paired with existing items by position.
pub fn merge_localized(
    existing: Option<&Record>,
    mut incoming: Record,
    paths: &[String],
    locales: &[String],
    locale: &str,
) -> Record {
    for path in paths {
        let segments: Vec<&str> = path.split('.').collect();
        if let Some((head, rest)) = segments.split_first() {
            let stored = existing.and_then(|record| record.get(*head));
            if let Some(value) = incoming.get_mut(*head) {
                wrap_locale(value, stored, rest, locales, locale);
            }
        }
    }
    incoming
}

fn wrap_locale(value: &mut Value, stored: Option<&Value>, segments: &[&str], locales: &[String], locale: &str) {
    let Some((head, rest)) = segments.split_first() else {
        let mut localized = match stored {
            Some(Value::Object(map)) if is_locale_map(map, locales) => map.clone(),
            _ => Map::new(),
        };
        localized.insert(locale.to_string(), value.take());
        *value = Value::Object(localized);
        return;
    };

    match value {
        Value::Object(map) => {
            if let Some(child) = map.get_mut(*head) {
                wrap_locale(child, stored.and_then(|s| s.get(*head)), rest, locales, locale);
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                wrap_locale(item, stored.and_then(|s| s.get(index)), segments, locales, locale);
            }
        }
        _ => {}
    }
}
