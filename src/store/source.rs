use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{MigrateError, Result};
use crate::legacy::{LegacyRecord, kind_of};
use crate::store::Source;

/// A `mongoexport` dump: one `<collection>.json` (JSON array or one document per line)
/// or `<collection>.jsonl` file per collection.
pub struct JsonDirSource {
    root: PathBuf,
}

impl JsonDirSource {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(MigrateError::Source(format!(
                "dump directory {} does not exist",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_file(&self, collection: &str) -> Option<PathBuf> {
        ["json", "jsonl"]
            .iter()
            .map(|ext| self.root.join(format!("{collection}.{ext}")))
            .find(|path| path.is_file())
    }
}

impl Source for JsonDirSource {
    fn read_collection(&self, collection: &str) -> Result<Vec<LegacyRecord>> {
        let Some(path) = self.collection_file(collection) else {
            warn!(collection, root = %self.root.display(), "collection not found in dump, treating as empty");
            return Ok(Vec::new());
        };

        let data = fs::read_to_string(&path)?;
        let documents = parse_documents(&data)
            .map_err(|reason| MigrateError::Source(format!("{}: {reason}", path.display())))?;
        debug!(collection, path = %path.display(), documents = documents.len(), "read collection");

        documents
            .into_iter()
            .enumerate()
            .map(|(index, doc)| {
                into_record(doc).map_err(|reason| {
                    MigrateError::Source(format!("{}: document {}: {reason}", path.display(), index + 1))
                })
            })
            .collect()
    }
}

/// Accepts a top-level JSON array or newline-delimited documents. Blank lines are
/// skipped.
fn parse_documents(data: &str) -> std::result::Result<Vec<Value>, String> {
    if data.trim_start().starts_with('[') {
        return match serde_json::from_str::<Value>(data) {
            Ok(Value::Array(items)) => Ok(items),
            Ok(other) => Err(format!("expected a JSON array, found {}", kind_of(&other))),
            Err(err) => Err(err.to_string()),
        };
    }

    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line).map_err(|err| format!("line {}: {err}", n + 1))
        })
        .collect()
}

fn into_record(doc: Value) -> std::result::Result<LegacyRecord, String> {
    match doc {
        Value::Object(fields) => Ok(LegacyRecord::new(fields)),
        other => Err(format!("expected an object, found {}", kind_of(&other))),
    }
}

/// In-process collections, keyed by collection name.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    collections: BTreeMap<String, Vec<Value>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(mut self, collection: &str, documents: Vec<Value>) -> Self {
        self.insert(collection, documents);
        self
    }

    pub fn insert(&mut self, collection: &str, documents: Vec<Value>) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
    }
}

impl Source for MemorySource {
    fn read_collection(&self, collection: &str) -> Result<Vec<LegacyRecord>> {
        let Some(documents) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        documents
            .iter()
            .cloned()
            .map(|doc| {
                into_record(doc)
                    .map_err(|reason| MigrateError::Source(format!("{collection}: {reason}")))
            })
            .collect()
    }
}
