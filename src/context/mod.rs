use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::navigation::NavigationQuery;

pub const KEY_DATA: &str = "data";
pub const KEY_REF: &str = "ref";
pub const KEY_USER_ID: &str = "user_id";
pub const KEY_SERIES: &str = "series";
pub const KEY_SAMPLE: &str = "sample";
pub const KEY_SUBSYSTEM: &str = "subsystem";
pub const KEY_EXTERNAL_QUERY: &str = "external_query";

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("failed to read context store: {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write context store: {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("context store is corrupt: {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode navigation query: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

/// The comparison a gallery page was produced for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryContext {
    pub data_run: String,
    pub ref_run: String,
    pub user_id: String,
    pub series: String,
    pub sample: String,
    pub subsystem: String,
}

impl QueryContext {
    /// Positional list: `data,ref,user_id,series,sample,subsystem`.
    pub fn from_query_list(list: &str) -> Self {
        let mut fields = list.split(',').map(|s| s.trim().to_string());
        let mut next = || fields.next().unwrap_or_default();
        Self {
            data_run: next(),
            ref_run: next(),
            user_id: next(),
            series: next(),
            sample: next(),
            subsystem: next(),
        }
    }

    pub fn has_comparison(&self) -> bool {
        !self.data_run.is_empty() && !self.ref_run.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

impl From<&NavigationQuery> for QueryContext {
    fn from(query: &NavigationQuery) -> Self {
        Self {
            data_run: query.data_info.clone(),
            ref_run: query.ref_info.clone(),
            user_id: query.user_id.to_string(),
            series: query.series.clone(),
            sample: query.sample.clone(),
            subsystem: query.subsystem.clone(),
        }
    }
}

/// Key/value storage that survives between page loads.
pub trait ContextStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), ContextError>;
    fn remove(&mut self, key: &str) -> Result<(), ContextError>;
}

#[derive(Clone, Debug, Default)]
pub struct MemoryContextStore {
    values: BTreeMap<String, String>,
}

impl MemoryContextStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContextStore for MemoryContextStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ContextError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), ContextError> {
        self.values.remove(key);
        Ok(())
    }
}

/// A JSON object on disk. Every write rewrites the whole file.
#[derive(Clone, Debug)]
pub struct FileContextStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileContextStore {
    pub fn open(path: &Path) -> Result<Self, ContextError> {
        let values = match std::fs::read_to_string(path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => {
                serde_json::from_str(&contents).map_err(|e| ContextError::Corrupt {
                    path: path.display().to_string(),
                    source: e,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(ContextError::Read {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), ContextError> {
        let write_err = |e| ContextError::Write {
            path: self.path.display().to_string(),
            source: e,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let contents = serde_json::to_string_pretty(&self.values)
            .map_err(|e| ContextError::Encode { source: e })?;
        std::fs::write(&self.path, contents).map_err(write_err)
    }
}

impl ContextStore for FileContextStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ContextError> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), ContextError> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

pub fn persist(store: &mut dyn ContextStore, ctx: &QueryContext) -> Result<(), ContextError> {
    store.set(KEY_DATA, &ctx.data_run)?;
    store.set(KEY_REF, &ctx.ref_run)?;
    store.set(KEY_USER_ID, &ctx.user_id)?;
    store.set(KEY_SERIES, &ctx.series)?;
    store.set(KEY_SAMPLE, &ctx.sample)?;
    store.set(KEY_SUBSYSTEM, &ctx.subsystem)?;
    Ok(())
}

/// `None` unless a data run was persisted earlier.
pub fn restore(store: &dyn ContextStore) -> Option<QueryContext> {
    let data_run = store.get(KEY_DATA)?;
    let field = |key: &str| store.get(key).unwrap_or_default();
    Some(QueryContext {
        data_run,
        ref_run: field(KEY_REF),
        user_id: field(KEY_USER_ID),
        series: field(KEY_SERIES),
        sample: field(KEY_SAMPLE),
        subsystem: field(KEY_SUBSYSTEM),
    })
}

pub fn submit(store: &mut dyn ContextStore, query: &NavigationQuery) -> Result<(), ContextError> {
    let encoded = serde_json::to_string(query).map_err(|e| ContextError::Encode { source: e })?;
    store.set(KEY_EXTERNAL_QUERY, &encoded)
}

/// Reads and clears the submitted query. A value that no longer parses is
/// dropped as well.
pub fn take_submitted(store: &mut dyn ContextStore) -> Result<Option<NavigationQuery>, ContextError> {
    let Some(raw) = store.get(KEY_EXTERNAL_QUERY) else {
        return Ok(None);
    };
    store.remove(KEY_EXTERNAL_QUERY)?;
    Ok(serde_json::from_str(&raw).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "plotgallery-{tag}-{}-{nanos}/state.json",
            std::process::id()
        ))
    }

    fn sample_ctx() -> QueryContext {
        QueryContext::from_query_list("300811,301531,1510000000,Run2017,SingleMuon,CSC")
    }

    #[test]
    fn query_list_is_positional() {
        let ctx = sample_ctx();
        assert_eq!(ctx.data_run, "300811");
        assert_eq!(ctx.ref_run, "301531");
        assert_eq!(ctx.user_id, "1510000000");
        assert_eq!(ctx.series, "Run2017");
        assert_eq!(ctx.sample, "SingleMuon");
        assert_eq!(ctx.subsystem, "CSC");
        assert!(ctx.has_comparison());
    }

    #[test]
    fn short_query_list_leaves_rest_empty() {
        let ctx = QueryContext::from_query_list("300811");
        assert_eq!(ctx.data_run, "300811");
        assert!(ctx.ref_run.is_empty());
        assert!(ctx.subsystem.is_empty());
        assert!(!ctx.has_comparison());
        assert!(QueryContext::from_query_list("").is_empty());
    }

    #[test]
    fn restore_requires_data_key() {
        let mut store = MemoryContextStore::new();
        assert!(restore(&store).is_none());
        store.set(KEY_REF, "1").unwrap();
        assert!(restore(&store).is_none());
        persist(&mut store, &sample_ctx()).unwrap();
        assert_eq!(restore(&store), Some(sample_ctx()));
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = temp_store_path("reopen");
        {
            let mut store = FileContextStore::open(&path).unwrap();
            persist(&mut store, &sample_ctx()).unwrap();
        }
        let store = FileContextStore::open(&path).unwrap();
        assert_eq!(restore(&store), Some(sample_ctx()));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn file_store_rejects_garbage() {
        let path = temp_store_path("garbage");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileContextStore::open(&path),
            Err(ContextError::Corrupt { .. })
        ));
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn submitted_query_is_taken_once() {
        let mut store = MemoryContextStore::new();
        let query = NavigationQuery::for_run(&sample_ctx(), 300812, 42);
        submit(&mut store, &query).unwrap();
        assert_eq!(take_submitted(&mut store).unwrap(), Some(query));
        assert_eq!(take_submitted(&mut store).unwrap(), None);
    }
}
