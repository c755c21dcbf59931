//! Local, atomic file writing for stage caches and panel output (spec.md
//! §5: "each stage write is atomic (temp-file + rename)"). Adapted from
//! the teacher's `StorageLocation::Local` branch; the cloud-storage
//! variant has no use here and was dropped (see DESIGN.md).

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::error::{IoError, PanelResult};

/// A directory that stage caches and panel output are written into. Every
/// write lands in a sibling temp file first, then is renamed into place,
/// so a crash mid-write never leaves a half-written file at the target
/// path.
#[derive(Debug, Clone)]
pub struct StorageLocation<'a> {
    pub dir: &'a Path,
}

impl<'a> StorageLocation<'a> {
    pub fn new(dir: &'a Path) -> Self {
        StorageLocation { dir }
    }

    /// Writes `bytes` atomically to `file_name` under this location,
    /// creating the directory if absent.
    pub fn write_atomic(&self, file_name: &str, bytes: &[u8]) -> PanelResult<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(self.dir)
                .map_err(|e| IoError::WriterCreation(self.dir.display().to_string(), e.to_string()))?;
        }

        let final_path = self.dir.join(file_name);
        let tmp_path = self.tmp_path(file_name);

        {
            let file = File::create(&tmp_path)
                .map_err(|e| IoError::WriterCreation(tmp_path.display().to_string(), e.to_string()))?;
            let mut writer = BufWriter::new(file);
            writer.write_all(bytes).map_err(IoError::from)?;
            writer.flush().map_err(IoError::from)?;
        }

        std::fs::rename(&tmp_path, &final_path).map_err(IoError::from)?;
        Ok(())
    }

    pub fn read(&self, file_name: &str) -> PanelResult<Vec<u8>> {
        let path = self.dir.join(file_name);
        std::fs::read(&path).map_err(|e| IoError::from(e).into())
    }

    pub fn exists(&self, file_name: &str) -> bool {
        self.dir.join(file_name).exists()
    }

    fn tmp_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(format!(".{file_name}.tmp"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_roundtrips() {
        let dir = tempdir();
        let location = StorageLocation::new(&dir);
        location.write_atomic("out.bin", b"hello").unwrap();
        assert_eq!(location.read("out.bin").unwrap(), b"hello");
        assert!(location.exists("out.bin"));
    }

    fn tempdir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("vc-panel-io-test-{}", std::process::id()));
        dir
    }
}
