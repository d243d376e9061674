use serde_json::Value;
use std::path::Path;

use crate::error::{SpecError, SpecResult};
use crate::models::{AnnotationEntry, ParameterEntry};

/// Ordered key/value set; a repeated key keeps its first position and takes the new value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeyValues(Vec<(String, Value)>);

impl KeyValues {
    pub fn insert(&mut self, key: String, value: Value) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_parameters(self) -> Vec<ParameterEntry> {
        self.0.into_iter().map(|(k, v)| ParameterEntry::new(k, v)).collect()
    }

    pub fn into_annotations(self) -> Vec<AnnotationEntry> {
        self.0.into_iter().map(|(k, v)| AnnotationEntry::new(k, v)).collect()
    }
}

/// Parse flat `KEY VALUE KEY VALUE ...` flag values. Values that parse as JSON are kept as JSON.
pub fn from_flag_values(values: &[String]) -> SpecResult<KeyValues> {
    if values.len() % 2 != 0 {
        return Err(SpecError::UnpairedValues);
    }
    let mut out = KeyValues::default();
    for pair in values.chunks_exact(2) {
        let value = serde_json::from_str(&pair[1]).unwrap_or_else(|_| Value::String(pair[1].clone()));
        out.insert(pair[0].clone(), value);
    }
    Ok(out)
}

pub fn from_file(path: &Path) -> SpecResult<KeyValues> {
    let txt = std::fs::read_to_string(path).map_err(|source| SpecError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: Value = serde_json::from_str(&txt).map_err(|source| SpecError::ParamFile {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Object(map) = doc else {
        return Err(SpecError::ParamFileNotObject { path: path.to_path_buf() });
    };
    let mut out = KeyValues::default();
    for (k, v) in map {
        out.insert(k, v);
    }
    Ok(out)
}

/// Inline values first, then the file; file values replace inline ones with the same key.
/// Returns `None` when nothing was supplied.
pub fn merged(values: &[String], file: Option<&Path>) -> SpecResult<Option<KeyValues>> {
    let mut out = from_flag_values(values)?;
    if let Some(path) = file {
        for (k, v) in from_file(path)?.0 {
            out.insert(k, v);
        }
    }
    Ok((!out.is_empty()).then_some(out))
}
