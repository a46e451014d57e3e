//! Request input as seen by the validator: posted fields plus normalized
//! file uploads in one flat map.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Upload after normalization. Only valid uploads survive normalization, so
/// `is_valid` is informational for downstream consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub temp_path: PathBuf,
    pub is_valid: bool,
}

impl UploadedFile {
    /// Lowercased extension of the client file name.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        if ext.is_empty() { None } else { Some(ext.to_ascii_lowercase()) }
    }

    pub fn size_kb(&self) -> f64 { self.size_bytes as f64 / 1024.0 }
}

/// Upload as handed over by the HTTP layer, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFile {
    pub client_name: String,
    pub client_mime_type: String,
    pub size_bytes: u64,
    pub temp_path: PathBuf,
    /// Transport error reported by the HTTP layer (partial upload, too large...).
    pub error: Option<String>,
}

impl RawFile {
    pub fn is_valid(&self) -> bool {
        self.error.is_none() && !self.temp_path.as_os_str().is_empty()
    }

    fn normalize(&self) -> Option<UploadedFile> {
        if !self.is_valid() { return None; }
        Some(UploadedFile {
            name: self.client_name.clone(),
            mime_type: self.client_mime_type.clone(),
            size_bytes: self.size_bytes,
            temp_path: self.temp_path.clone(),
            is_valid: true,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawUpload {
    Single(RawFile),
    Multiple(Vec<RawFile>),
}

/// One input field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputValue {
    File(UploadedFile),
    Files(Vec<UploadedFile>),
    Json(Value),
}

impl InputValue {
    pub fn null() -> Self { InputValue::Json(Value::Null) }

    pub fn as_json(&self) -> Option<&Value> {
        match self { InputValue::Json(v) => Some(v), _ => None }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(|v| v.as_str())
    }

    pub fn as_file(&self) -> Option<&UploadedFile> {
        match self { InputValue::File(f) => Some(f), _ => None }
    }

    pub fn is_null(&self) -> bool { matches!(self, InputValue::Json(Value::Null)) }

    /// Null, a blank string, or an empty collection.
    pub fn is_blank(&self) -> bool {
        match self {
            InputValue::Json(Value::Null) => true,
            InputValue::Json(Value::String(s)) => s.trim().is_empty(),
            InputValue::Json(Value::Array(a)) => a.is_empty(),
            InputValue::Json(Value::Object(o)) => o.is_empty(),
            InputValue::Json(_) => false,
            InputValue::File(_) => false,
            InputValue::Files(fs) => fs.is_empty(),
        }
    }

    /// Scalar rendering used by string-shaped rules (`in`, `regex`, `starts_with`...).
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            InputValue::Json(Value::String(s)) => Some(s.clone()),
            InputValue::Json(Value::Number(n)) => Some(n.to_string()),
            InputValue::Json(Value::Bool(b)) => Some(if *b { "1".into() } else { "0".into() }),
            _ => None,
        }
    }
}

impl From<Value> for InputValue {
    fn from(v: Value) -> Self { InputValue::Json(v) }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self { InputValue::Json(Value::String(s.to_string())) }
}

impl From<UploadedFile> for InputValue {
    fn from(f: UploadedFile) -> Self { InputValue::File(f) }
}

pub type InputMap = BTreeMap<String, InputValue>;

/// Everything the HTTP layer extracted from one request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawInput {
    pub fields: BTreeMap<String, Value>,
    pub files: BTreeMap<String, RawUpload>,
}

impl RawInput {
    pub fn new() -> Self { Self::default() }

    pub fn field<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn file<K: Into<String>>(mut self, key: K, upload: RawUpload) -> Self {
        self.files.insert(key.into(), upload);
        self
    }

    /// Posted fields merged with normalized uploads; an upload wins over a
    /// posted field of the same name.
    pub fn collect(&self) -> InputMap {
        let mut out: InputMap = self.fields.iter().map(|(k, v)| (k.clone(), InputValue::Json(v.clone()))).collect();
        out.extend(normalize_files(&self.files));
        out
    }
}

/// Single uploads become a record or null when invalid; multi-file fields
/// keep only their valid entries.
pub fn normalize_files(files: &BTreeMap<String, RawUpload>) -> InputMap {
    files
        .iter()
        .map(|(name, upload)| {
            let value = match upload {
                RawUpload::Single(f) => f.normalize().map(InputValue::File).unwrap_or_else(InputValue::null),
                RawUpload::Multiple(list) => InputValue::Files(list.iter().filter_map(RawFile::normalize).collect()),
            };
            (name.clone(), value)
        })
        .collect()
}
