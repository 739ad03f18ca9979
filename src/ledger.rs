use crate::config::StateFile;
use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

/// Info hashes that have already been handed to the daemon.
///
/// Grows for the life of the feed; nothing is ever evicted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupLedger {
    hashes: BTreeSet<String>,
}

impl DedupLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty ledger, for forgetting everything submitted so far.
    pub fn reset() -> Self {
        Self::default()
    }

    pub fn is_known(&self, identity: &str) -> bool {
        self.hashes.contains(identity)
    }

    /// Records `identity`. Returns false if it was already known.
    pub fn mark_known(&mut self, identity: impl Into<String>) -> bool {
        self.hashes.insert(identity.into())
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.hashes.iter().map(String::as_str)
    }

    /// Reads the hashes stored in the state file at `path`; a missing file is an empty ledger.
    pub fn load(path: &Path) -> Result<Self> {
        let ledger = StateFile::load(path)?.hashes;
        debug!(path = %path.display(), hashes = ledger.len(), "ledger loaded");
        Ok(ledger)
    }

    /// Replaces the hashes stored at `path`, keeping the file's other settings.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut state = StateFile::load(path)?;
        state.hashes = self.clone();
        state.save(path)?;
        debug!(path = %path.display(), hashes = self.len(), "ledger saved");
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for DedupLedger {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            hashes: iter.into_iter().map(Into::into).collect(),
        }
    }
}
