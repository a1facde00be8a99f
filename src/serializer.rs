//! Canonical aptly config rendering
//!
//! The structured half of the config is emitted as single-line JSON with
//! keys sorted at every level, so the same table always renders to the
//! same bytes and the config file only changes when a value does.

use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// Desired aptly config: structured values plus an optional raw override
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    pub structured: toml::Table,
    /// Replaces the structured fields entirely when present
    pub raw_override: Option<String>,
}

impl ConfigDocument {
    pub fn new(structured: toml::Table) -> Self {
        Self {
            structured,
            raw_override: None,
        }
    }

    pub fn with_override(mut self, contents: impl Into<String>) -> Self {
        self.raw_override = Some(contents.into());
        self
    }
}

/// Render the document: the override verbatim, or canonical JSON plus `\n`
pub fn serialize(doc: &ConfigDocument) -> Result<String> {
    if let Some(raw) = &doc.raw_override {
        return Ok(raw.clone());
    }

    let json = table_to_json(&doc.structured, "")?;
    Ok(format!("{json}\n"))
}

fn table_to_json(table: &toml::Table, prefix: &str) -> Result<Value> {
    let mut entries: Vec<(&String, &toml::Value)> = table.iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    let mut map = Map::new();
    for (key, value) in entries {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        map.insert(key.clone(), to_json(value, &path)?);
    }
    Ok(Value::Object(map))
}

fn to_json(value: &toml::Value, path: &str) -> Result<Value> {
    match value {
        toml::Value::String(s) => Ok(Value::String(s.clone())),
        toml::Value::Integer(i) => Ok(Value::from(*i)),
        toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
        toml::Value::Float(f) => Number::from_f64(*f)
            .map(Value::Number)
            .ok_or_else(|| Error::NotSerializable {
                path: path.to_string(),
                reason: format!("non-finite number {f}"),
            }),
        toml::Value::Datetime(dt) => Err(Error::NotSerializable {
            path: path.to_string(),
            reason: format!("datetime {dt} has no JSON form"),
        }),
        toml::Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| to_json(item, &format!("{path}.{i}")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        toml::Value::Table(table) => table_to_json(table, path),
    }
}
