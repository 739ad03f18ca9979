pub mod types;
pub mod config;
pub mod ledger;
pub mod fetcher;
pub mod feed;
pub mod transmission;
pub mod poller;

pub use types::*;
pub use config::{RunConfig, StateFile};
pub use ledger::DedupLedger;
pub use fetcher::Fetcher;
pub use feed::{FeedItem, FeedSource, RawFeedEntry, ShowRssFeed};
pub use transmission::{HttpTransport, RpcTransport, SessionInfo, SubmissionResult, TransmissionClient};
pub use poller::{Poller, RunStats};
