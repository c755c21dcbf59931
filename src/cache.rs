//! Stage cache (spec.md §5: "each stage write is atomic"). Each pipeline
//! stage's output is serialized with `postcard` and written under a
//! content-addressed file name (a `blake3` hash of the serialized bytes
//! plus a caller-supplied stage key), so a re-run with unchanged upstream
//! state finds the cache and skips recomputation.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{IoError, PanelResult};
use crate::io::StorageLocation;

/// Serializes `value`, derives its cache file name from `stage` plus the
/// content hash of the serialized bytes, and writes it atomically. Returns
/// the file name so the caller can record it (e.g. in a run manifest).
pub fn put<T: Serialize>(location: &StorageLocation, stage: &str, value: &T) -> PanelResult<String> {
    let bytes = postcard::to_allocvec(value).map_err(IoError::Postcard)?;
    let file_name = cache_file_name(stage, &bytes);
    location.write_atomic(&file_name, &bytes)?;
    Ok(file_name)
}

/// Reads and deserializes the cache entry for `stage`/`content`, returning
/// `Ok(None)` when no such entry exists rather than an error, since a
/// cache miss is an expected, non-fatal outcome (spec.md §7).
pub fn get<T: DeserializeOwned>(location: &StorageLocation, stage: &str, content: &[u8]) -> PanelResult<Option<T>> {
    let file_name = cache_file_name(stage, content);
    if !location.exists(&file_name) {
        return Ok(None);
    }
    let bytes = location.read(&file_name)?;
    let value = postcard::from_bytes(&bytes).map_err(IoError::Postcard)?;
    Ok(Some(value))
}

fn cache_file_name(stage: &str, bytes: &[u8]) -> String {
    let hash = blake3::hash(bytes);
    format!("{stage}.{}.cache", hash.to_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        year: i32,
        value: f64,
    }

    fn tempdir() -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("vc-panel-cache-test-{}-{}", std::process::id(), line!()));
        dir
    }

    #[test]
    fn put_then_get_roundtrips() {
        let dir = tempdir();
        let location = StorageLocation::new(&dir);
        let value = Sample { year: 2015, value: 3.5 };
        let file_name = put(&location, "centrality", &value).unwrap();
        assert!(location.exists(&file_name));

        let bytes = postcard::to_allocvec(&value).unwrap();
        let loaded: Option<Sample> = get(&location, "centrality", &bytes).unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[test]
    fn get_is_none_on_cache_miss() {
        let dir = tempdir();
        let location = StorageLocation::new(&dir);
        let loaded: Option<Sample> = get(&location, "centrality", b"nonexistent").unwrap();
        assert_eq!(loaded, None);
    }
}
