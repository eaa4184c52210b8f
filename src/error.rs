use std::path::PathBuf;

use thiserror::Error;

use crate::config::TargetError;
use crate::fetch::FetchError;

/// Failures while processing one node. The driver logs these and moves on.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{url}: {reason}")]
    Parse { url: String, reason: String },
    #[error("failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures that end a whole target.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Target(#[from] TargetError),
    #[error("nothing discovered under {title} ({url}); check the target or the site layout")]
    NothingDiscovered { title: String, url: String },
    #[error(transparent)]
    Output(#[from] ScrapeError),
}
