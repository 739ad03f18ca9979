use crate::feed::FeedSource;
use crate::ledger::DedupLedger;
use crate::transmission::{RpcTransport, TransmissionClient};
use crate::types::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub seen: usize,
    pub added: usize,
    pub ignored: usize,
}

/// Drives one poll of the feed: check the daemon, submit unseen episodes, record them.
pub struct Poller<F, T> {
    feed: F,
    client: TransmissionClient<T>,
    ledger: DedupLedger,
    ledger_path: Option<PathBuf>,
}

impl<F: FeedSource, T: RpcTransport> Poller<F, T> {
    pub fn new(feed: F, client: TransmissionClient<T>, ledger: DedupLedger) -> Self {
        Self {
            feed,
            client,
            ledger,
            ledger_path: None,
        }
    }

    /// Persist the ledger to `path` after every submission and at the end of the run.
    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger_path = Some(path.into());
        self
    }

    pub fn ledger(&self) -> &DedupLedger {
        &self.ledger
    }

    pub fn into_ledger(self) -> DedupLedger {
        self.ledger
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    pub fn client(&self) -> &TransmissionClient<T> {
        &self.client
    }

    /// A failed submission aborts the run. Episodes submitted before it stay recorded.
    pub async fn run(&mut self) -> Result<RunStats> {
        info!("Connecting to transmission at '{}'", self.client.url());
        if let Err(e) = self.client.check_connection().await {
            error!(url = %self.client.url(), error = %e, "Transmission connection check failed");
            return Err(e);
        }
        let download_dir = self.client.get_download_dir().await?;
        debug!(download_dir = %download_dir, "Resolved default download directory");

        let items = match self.feed.fetch_items().await {
            Ok(items) => items,
            Err(e) => {
                error!(feed = %self.feed.location(), error = %e, "Feed fetch failed");
                return Err(e);
            }
        };

        let mut stats = RunStats::default();
        for item in &items {
            stats.seen += 1;

            if self.ledger.is_known(&item.info_hash) {
                debug!("Ignoring episode for '{}' as hash is in set", item);
                stats.ignored += 1;
                continue;
            }

            info!("Downloading '{}'", item);
            let show_dir = item.directory_name();
            let download_path = if show_dir.is_empty() {
                download_dir.clone()
            } else {
                Path::new(&download_dir).join(show_dir).to_string_lossy().into_owned()
            };
            if let Err(e) = self.client.add_torrent(&item.link, Some(&download_path)).await {
                error!(
                    identity = %item.info_hash,
                    title = %item.title,
                    link = %item.link,
                    error = %e,
                    "Submission failed, aborting run"
                );
                return Err(e);
            }

            self.ledger.mark_known(item.info_hash.clone());
            stats.added += 1;
            self.persist()?;
        }

        info!(
            seen = stats.seen,
            added = stats.added,
            ignored = stats.ignored,
            "Processed {} episodes: {} added, {} ignored",
            stats.seen,
            stats.added,
            stats.ignored
        );
        self.persist()?;
        Ok(stats)
    }

    fn persist(&self) -> Result<()> {
        match &self.ledger_path {
            Some(path) => self.ledger.save(path),
            None => Ok(()),
        }
    }
}
