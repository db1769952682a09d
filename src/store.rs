use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};

use camino::Utf8Path;
use serde_json::{Map, Value};

use crate::error::BapError;

#[derive(Debug, Clone, Default)]
pub struct Store {
    root: Arc<Mutex<Value>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            root: Arc::new(Mutex::new(Value::Object(Map::new()))),
        }
    }

    pub fn get(&self, path: &str) -> Option<Value> {
        let root = self.lock();
        lookup(&root, path).filter(|v| !v.is_null()).cloned()
    }

    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).unwrap_or(default)
    }

    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get(path).and_then(|v| v.as_str().map(str::to_string))
    }

    pub fn get_strings(&self, path: &str) -> Vec<String> {
        match self.get(path) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s],
            _ => Vec::new(),
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn put(&self, path: &str, value: impl Into<Value>) {
        let mut root = self.lock();
        *slot(&mut root, path) = value.into();
    }

    /// Grow the list at `path`. An array value appends each of its elements;
    /// null and empty-string elements are dropped. With `unique`, elements
    /// already present are not added again.
    pub fn append(&self, path: &str, value: impl Into<Value>, unique: bool) {
        let value = value.into();
        let mut root = self.lock();
        let target = slot(&mut root, path);

        if !target.is_array() {
            let previous = std::mem::take(target);
            *target = Value::Array(if previous.is_null() {
                Vec::new()
            } else {
                vec![previous]
            });
        }
        let Value::Array(list) = target else {
            unreachable!("target was just made an array");
        };

        let items = match value {
            Value::Array(items) => items,
            single => vec![single],
        };
        for item in items {
            if item.is_null() || item.as_str() == Some("") {
                continue;
            }
            if unique && list.contains(&item) {
                continue;
            }
            list.push(item);
        }
    }

    pub fn as_json(&self) -> Value {
        self.lock().clone()
    }

    pub fn write_json(&self, path: &Utf8Path) -> Result<(), BapError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| BapError::Filesystem(err.to_string()))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        let content = serde_json::to_vec_pretty(&self.as_json())?;
        fs::write(tmp_path.as_std_path(), &content)
            .map_err(|err| BapError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| BapError::Filesystem(err.to_string()))?;
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Value> {
        self.root.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |node, key| node.as_object()?.get(key))
}

fn slot<'a>(root: &'a mut Value, path: &str) -> &'a mut Value {
    segments(path).fold(root, |node, key| {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        let Value::Object(map) = node else {
            unreachable!("node was just made an object");
        };
        map.entry(key.to_string()).or_insert(Value::Null)
    })
}
