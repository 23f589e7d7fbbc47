// src/registry/store.rs

//! JSON persistence for the registry.
//!
//! The document maps record id to record:
//!
//! ```json
//! {
//!     "hello/97dd2ae": {
//!         "id": "hello/97dd2ae",
//!         "name": "hello",
//!         "revision": "97dd2ae",
//!         "status": "completed",
//!         "location": "/src/hello"
//!     }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use crate::registry::record::{ProgramKey, ProgramRecord};

/// Read the document at `path`.
///
/// Missing, unreadable or malformed documents yield `None`; the caller
/// starts empty instead of failing.
pub fn load(path: &Path) -> Option<BTreeMap<ProgramKey, ProgramRecord>> {
    if !path.exists() {
        return None;
    }

    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "registry unreadable; starting empty");
            return None;
        }
    };

    let document: BTreeMap<String, ProgramRecord> = match serde_json::from_str(&contents) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "registry malformed; starting empty");
            return None;
        }
    };

    // Keys are rebuilt from the records themselves; the document ids are
    // informational only.
    Some(
        document
            .into_values()
            .map(|mut record| {
                let key = record.key();
                record.id = key.id();
                (key, record)
            })
            .collect(),
    )
}

/// Serialise `records` as the full document.
pub fn encode(records: &BTreeMap<ProgramKey, ProgramRecord>) -> Result<String> {
    let document: BTreeMap<String, &ProgramRecord> = records
        .values()
        .map(|record| (record.id.clone(), record))
        .collect();
    serde_json::to_string_pretty(&document).context("serialising registry")
}

/// Write the whole registry to `path`: temp file, fsync, rename.
pub fn save(path: &Path, records: &BTreeMap<ProgramKey, ProgramRecord>) -> Result<()> {
    let contents = encode(records)?;
    write_atomic(path, contents.as_bytes())
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating dir {}", parent.display()))?;
        }
    }

    let tmp = temp_path(path);
    {
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("creating temp registry {}", tmp.display()))?;
        file.write_all(contents)
            .with_context(|| format!("writing temp registry {}", tmp.display()))?;
        file.sync_all()
            .with_context(|| format!("flushing temp registry {}", tmp.display()))?;
    }

    fs::rename(&tmp, path).with_context(|| {
        format!(
            "moving registry into place ({} -> {})",
            tmp.display(),
            path.display()
        )
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "registry.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
