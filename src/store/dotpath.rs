//! Dot-path update engine used by `apply_updates` (spec §4.2).
//!
//! By default, writing to a path whose current value is a JSON array
//! appends; a caller-supplied `replace` marker replaces instead. A path
//! whose current value is a scalar (or absent) is always set directly —
//! "append" has no meaning there.

use serde_json::Value;

/// A single dot-path write.
#[derive(Debug, Clone)]
pub struct Update {
    pub path: String,
    pub value: Value,
    pub replace: bool,
}

impl Update {
    pub fn append(path: impl Into<String>, value: Value) -> Self {
        Self { path: path.into(), value, replace: false }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self { path: path.into(), value, replace: true }
    }
}

/// Apply one update to `root`, creating intermediate objects as needed.
pub fn apply(root: &mut Value, update: &Update) -> Result<(), String> {
    let segments: Vec<&str> = update.path.split('.').collect();
    if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(format!("invalid dot path: {:?}", update.path));
    }
    let parent = navigate_create(root, &segments[..segments.len() - 1])?;
    let key = segments[segments.len() - 1];
    let obj = parent
        .as_object_mut()
        .ok_or_else(|| format!("path parent is not an object: {:?}", update.path))?;

    let entry = obj.entry(key.to_string()).or_insert(Value::Null);
    if update.replace {
        *entry = update.value.clone();
        return Ok(());
    }

    match entry {
        Value::Array(existing) => {
            if let Value::Array(new_items) = &update.value {
                existing.extend(new_items.clone());
            } else {
                existing.push(update.value.clone());
            }
        }
        Value::Null => {
            *entry = update.value.clone();
        }
        _ => {
            *entry = update.value.clone();
        }
    }
    Ok(())
}

fn navigate_create<'a>(root: &'a mut Value, segments: &[&str]) -> Result<&'a mut Value, String> {
    let mut current = root;
    for seg in segments {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        let obj = current.as_object_mut().unwrap();
        current = obj
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    Ok(current)
}

/// Read a value at a dot path, if present.
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for seg in path.split('.') {
        current = current.as_object()?.get(seg)?;
    }
    Some(current)
}
