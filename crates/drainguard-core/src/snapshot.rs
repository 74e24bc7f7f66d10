//! Loading pod and budget snapshots from files.
//!
//! A snapshot file is YAML or JSON and holds either a bare sequence of
//! objects, a Kubernetes `List` (anything with an `items` array, such as the
//! output of `kubectl get pods -o yaml`), or a single object.

use crate::error::{DrainguardError, Result};
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::path::Path;

/// Parse snapshot text into a list of objects
pub fn parse_items<T: DeserializeOwned>(data: &str) -> Result<Vec<T>> {
    let value: Value = serde_yaml::from_str(data).map_err(|e| {
        DrainguardError::serialization_error(
            format!("Failed to parse snapshot: {}", e),
            Some(Box::new(e)),
        )
    })?;

    let items = match value {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items,
        Value::Mapping(mut map) => match map.remove("items") {
            Some(Value::Sequence(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(_) => {
                return Err(DrainguardError::serialization_error(
                    "Snapshot `items` field is not a sequence",
                    None,
                ))
            }
            None => vec![Value::Mapping(map)],
        },
        other => {
            return Err(DrainguardError::serialization_error(
                format!("Snapshot must be a sequence or mapping, got {:?}", other),
                None,
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            serde_yaml::from_value(item).map_err(|e| {
                DrainguardError::serialization_error(
                    format!("Failed to decode snapshot item {}: {}", idx, e),
                    Some(Box::new(e)),
                )
            })
        })
        .collect()
}

/// Read a snapshot file into a list of objects
pub fn load_items<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| DrainguardError::io(path.display().to_string(), e))?;
    parse_items(&data)
}
