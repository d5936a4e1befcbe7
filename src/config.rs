//! Configuration documents sent by the server.
//!
//! A document is either a single layout (`{"size": "3x4", "buttons": [...]}`)
//! or a list of named layouts the user picks from. Structural checks are left
//! to the layout engine so that resolution only fails on malformed JSON.

use crate::error::ConfigError;
use serde_json::{Map, Value};

/// Result of resolving a raw payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The document is a single layout and becomes active directly
    Active(LayoutConfig),
    /// The document is a list; the user has to pick one entry
    SelectionRequired(NamedConfigs),
}

/// Parse a raw `config:` payload.
pub fn resolve(raw: &str) -> Result<Resolution, ConfigError> {
    let value: Value = serde_json::from_str(raw)?;
    Ok(match value {
        Value::Array(entries) => Resolution::SelectionRequired(NamedConfigs { entries }),
        other => Resolution::Active(LayoutConfig::new(other)),
    })
}

/// An ordered list of `{ "name": ..., <layout fields> }` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedConfigs {
    entries: Vec<Value>,
}

impl NamedConfigs {
    /// Picker options: `(entry index, name)` for every entry with a string name.
    pub fn names(&self) -> Vec<(usize, &str)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(i, entry)| entry.get("name").and_then(Value::as_str).map(|n| (i, n)))
            .collect()
    }

    /// First entry whose name matches.
    pub fn select(&self, name: &str) -> Option<LayoutConfig> {
        self.entries
            .iter()
            .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name))
            .map(|entry| LayoutConfig::new(entry.clone()))
    }

    /// Entry by position in the original list (picker handlers use this so
    /// duplicate names stay distinguishable).
    pub fn select_index(&self, index: usize) -> Option<LayoutConfig> {
        self.entries.get(index).map(|entry| LayoutConfig::new(entry.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A loosely-typed layout document.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    value: Value,
}

impl LayoutConfig {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Display name when the layout came from a named list
    pub fn name(&self) -> Option<&str> {
        self.value.get("name").and_then(Value::as_str)
    }

    /// Raw `size` value, whatever its type
    pub fn size(&self) -> Option<&Value> {
        self.value.get("size")
    }

    /// Page background colour
    pub fn background(&self) -> Option<&str> {
        self.value.as_object().and_then(|obj| non_blank(obj, "bg"))
    }

    pub fn rotation(&self) -> Option<&str> {
        self.value.get("rotation").and_then(Value::as_str)
    }

    /// The `buttons` array, or `None` when absent or not an array
    pub fn buttons(&self) -> Option<Vec<ButtonSpec<'_>>> {
        self.value
            .get("buttons")
            .and_then(Value::as_array)
            .map(|buttons| buttons.iter().map(ButtonSpec::new).collect())
    }
}

/// View over one entry of `buttons`.
///
/// Every accessor applies the same rule: a string field counts only when it
/// is a string that is non-blank after trimming.
#[derive(Debug, Clone, Copy)]
pub struct ButtonSpec<'a> {
    fields: Option<&'a Map<String, Value>>,
}

impl<'a> ButtonSpec<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self { fields: value.as_object() }
    }

    fn string(&self, keys: &[&str]) -> Option<&'a str> {
        let fields = self.fields?;
        keys.iter().find_map(|key| non_blank(fields, key))
    }

    pub fn macro_name(&self) -> Option<&'a str> {
        self.string(&["macro"])
    }

    pub fn text(&self) -> Option<&'a str> {
        self.string(&["text"])
    }

    pub fn fg(&self) -> Option<&'a str> {
        self.string(&["fg"])
    }

    pub fn bg(&self) -> Option<&'a str> {
        self.string(&["bg"])
    }

    pub fn active(&self) -> Option<&'a str> {
        self.string(&["active"])
    }

    pub fn radius(&self) -> Option<&'a str> {
        self.string(&["radius"])
    }

    pub fn img_width(&self) -> Option<&'a str> {
        self.string(&["img-width", "imgWidth"])
    }

    pub fn img_height(&self) -> Option<&'a str> {
        self.string(&["img-height", "imgHeight"])
    }

    pub fn img_radius(&self) -> Option<&'a str> {
        self.string(&["img-radius", "imgRadius"])
    }

    /// Numeric `scale`; strings such as `"1.5"` do not count
    pub fn scale(&self) -> Option<f64> {
        self.fields?.get("scale").and_then(Value::as_f64)
    }
}

fn non_blank<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn object_becomes_active_directly() {
        let res = resolve(r#"{"size":"1x1","buttons":[{"macro":"x"}]}"#).unwrap();
        match res {
            Resolution::Active(cfg) => assert_eq!(cfg.size(), Some(&json!("1x1"))),
            other => panic!("expected active config, got {:?}", other),
        }
    }

    #[test]
    fn array_requires_selection() {
        let raw = r#"[{"name":"Home","size":"1x1","buttons":[{"macro":"x"}]},
                      {"name":"Work","size":"1x2","buttons":[{"macro":"y"},{"macro":"z"}]}]"#;
        let Resolution::SelectionRequired(list) = resolve(raw).unwrap() else {
            panic!("expected a selection");
        };
        assert_eq!(list.names(), vec![(0, "Home"), (1, "Work")]);

        let work = list.select("Work").unwrap();
        assert_eq!(work.size(), Some(&json!("1x2")));
        let macros: Vec<_> = work.buttons().unwrap().iter().filter_map(|b| b.macro_name()).collect();
        assert_eq!(macros, vec!["y", "z"]);

        assert!(list.select("Garden").is_none());
        assert_eq!(list.select_index(0).unwrap().name(), Some("Home"));
    }

    #[test]
    fn unnamed_entries_are_not_offered() {
        let Resolution::SelectionRequired(list) = resolve(r#"[{"size":"1x1"},{"name":7},{"name":"B"}]"#).unwrap() else {
            panic!("expected a selection");
        };
        assert_eq!(list.len(), 3);
        assert_eq!(list.names(), vec![(2, "B")]);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(resolve("{\"size\": "), Err(ConfigError::Parse(_))));
        assert!(matches!(resolve(""), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn incomplete_document_still_resolves() {
        assert!(matches!(resolve("{}"), Ok(Resolution::Active(_))));
        assert!(matches!(resolve("42"), Ok(Resolution::Active(_))));
    }

    #[test]
    fn resolving_twice_is_identical() {
        let raw = r##"{"size":"2x2","bg":"#000","buttons":[{"macro":"a"}]}"##;
        assert_eq!(resolve(raw).unwrap(), resolve(raw).unwrap());
    }

    #[test]
    fn blank_and_mistyped_fields_are_ignored() {
        let value = json!({"macro": "m", "text": "  ", "fg": 12, "bg": "#111",
                           "img-width": "50%", "imgHeight": "20px", "scale": "2"});
        let spec = ButtonSpec::new(&value);
        assert_eq!(spec.macro_name(), Some("m"));
        assert_eq!(spec.text(), None);
        assert_eq!(spec.fg(), None);
        assert_eq!(spec.bg(), Some("#111"));
        assert_eq!(spec.img_width(), Some("50%"));
        assert_eq!(spec.img_height(), Some("20px"));
        assert_eq!(spec.scale(), None);
    }

    #[test]
    fn page_background_requires_non_blank_string() {
        assert_eq!(LayoutConfig::new(json!({"bg": "#123456"})).background(), Some("#123456"));
        assert_eq!(LayoutConfig::new(json!({"bg": " "})).background(), None);
        assert_eq!(LayoutConfig::new(json!({"bg": 3})).background(), None);
    }
}
