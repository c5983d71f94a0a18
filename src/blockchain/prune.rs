use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use log::info;

use super::{Blockchain, ChainError};

/// Archive labels become file name prefixes, so they must not name a path.
pub fn is_valid_archive_label(label: &str) -> bool {
    !label.is_empty() && !label.contains(['/', '\\']) && !label.contains("..")
}

impl Blockchain {
    /// Keep only the newest `retain_count` blocks in memory. The older ones
    /// are written as pretty JSON to `<archive_dir>/<label>_<millis>.json`
    /// first; if that fails the chain is left as it was.
    ///
    /// Returns how many blocks were archived.
    pub fn prune_and_archive(&mut self, retain_count: usize, label: &str) -> Result<usize, ChainError> {
        if !is_valid_archive_label(label) {
            return Err(ChainError::InvalidLabel(label.to_string()));
        }
        let total = self.chain.len();
        if total <= retain_count {
            return Ok(0);
        }
        let cut = total - retain_count;

        let data = serde_json::to_vec_pretty(&self.chain[..cut])?;
        let path = self.archive_path(label);
        let mut file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        file.write_all(&data)?;
        file.sync_all()?;

        self.chain.drain(..cut);
        info!("PRUNE - archived {} blocks to {}", cut, path.display());
        Ok(cut)
    }

    fn archive_path(&self, label: &str) -> PathBuf {
        self.archive_dir()
            .join(format!("{}_{}.json", label, Utc::now().timestamp_millis()))
    }
}
