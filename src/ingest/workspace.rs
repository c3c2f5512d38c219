// src/ingest/workspace.rs
use anyhow::{Context, Result};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use tracing::{debug, info};

use super::InputBlob;

/// Per-run scratch directory. Removed when dropped, on success and on error alike.
#[derive(Debug)]
pub struct RunWorkspace {
    dir: TempDir,
    staged: usize,
}

impl RunWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("headcount-")
            .tempdir()
            .context("creating run workspace")?;
        debug!(path = %dir.path().display(), "workspace created");
        Ok(Self { dir, staged: 0 })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `blob` under `inputs/`, returning where it landed.
    pub fn stage(&mut self, blob: &InputBlob) -> Result<PathBuf> {
        let inputs = self.dir.path().join("inputs");
        fs::create_dir_all(&inputs).with_context(|| format!("creating {:?}", inputs))?;

        // index prefix keeps same-named uploads apart
        let path = inputs.join(format!("{:03}_{}", self.staged, file_component(&blob.name)));
        fs::write(&path, &blob.bytes).with_context(|| format!("staging {:?}", path))?;
        self.staged += 1;
        Ok(path)
    }

    /// Write the artifact into the workspace, then copy it to `dest_dir/file_name`.
    pub fn deliver(&self, bytes: &[u8], dest_dir: &Path, file_name: &str) -> Result<PathBuf> {
        // 1) artifact inside the workspace
        let local = self.dir.path().join(file_name);
        fs::write(&local, bytes).with_context(|| format!("writing {:?}", local))?;

        // 2) copy next to the destination, then rename over it
        fs::create_dir_all(dest_dir).with_context(|| format!("creating {:?}", dest_dir))?;
        let dest = dest_dir.join(file_name);
        let tmp_path = dest_dir.join(format!(".{}.tmp", file_name));
        {
            let mut tmp = fs::File::create(&tmp_path)
                .with_context(|| format!("creating {:?}", tmp_path))?;
            tmp.write_all(bytes)
                .with_context(|| format!("writing {:?}", tmp_path))?;
        }
        if let Err(e) = fs::rename(&tmp_path, &dest) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).with_context(|| format!("renaming {:?} -> {:?}", tmp_path, dest));
        }

        info!(path = %dest.display(), size = bytes.len(), "artifact delivered");
        Ok(dest)
    }
}

/// Last path component, with anything path-like stripped.
fn file_component(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match last {
        "" | "." | ".." => "input".to_string(),
        s => s.to_string(),
    }
}
