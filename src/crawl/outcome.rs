use crate::feed::FetchError;
use crate::storage::StoredNewsItem;

use super::validate::EntryFailure;

pub const STATUS_OK: &str = "OK";
pub const STATUS_EMPTY_FEED: &str = "Feed looks empty";
pub const STATUS_UNKNOWN_FORMAT: &str = "Unknown feed type.";

/// What happened to one entry that reached the decision loop.
#[derive(Debug)]
pub enum EntryResult {
    Created(StoredNewsItem),
    Duplicate,
    Failed(EntryFailure),
}

/// Per-entry results of one crawl, folded together.
///
/// Failure reasons keep the order in which they were first seen so that
/// ties in [`CrawlOutcome::most_common_failure`] go to the earliest reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlOutcome {
    extracted: usize,
    total_seen: usize,
    created: usize,
    duplicates: usize,
    failures: Vec<(EntryFailure, usize)>,
}

impl CrawlOutcome {
    /// `extracted` counts every entry in the document; `total_seen` only
    /// those left after the recency filter.
    pub fn new(extracted: usize, total_seen: usize) -> Self {
        Self {
            extracted,
            total_seen,
            ..Self::default()
        }
    }

    pub fn record(mut self, result: &EntryResult) -> Self {
        match result {
            EntryResult::Created(_) => self.created += 1,
            EntryResult::Duplicate => self.duplicates += 1,
            EntryResult::Failed(failure) => {
                match self.failures.iter_mut().find(|(seen, _)| seen == failure) {
                    Some((_, count)) => *count += 1,
                    None => self.failures.push((failure.clone(), 1)),
                }
            }
        }
        self
    }

    pub fn extracted(&self) -> usize {
        self.extracted
    }

    pub fn total_seen(&self) -> usize {
        self.total_seen
    }

    pub fn created(&self) -> usize {
        self.created
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn failed(&self) -> usize {
        self.failures.iter().map(|(_, count)| count).sum()
    }

    /// Failure tally as `(reason, count)` in first-seen order.
    pub fn failures(&self) -> &[(EntryFailure, usize)] {
        &self.failures
    }

    /// Highest count wins; equal counts go to the reason seen first.
    pub fn most_common_failure(&self) -> Option<&EntryFailure> {
        let mut best: Option<&(EntryFailure, usize)> = None;
        for candidate in &self.failures {
            if best.map_or(true, |(_, count)| candidate.1 > *count) {
                best = Some(candidate);
            }
        }
        best.map(|(failure, _)| failure)
    }
}

/// How a crawl ended. Only [`CrawlTermination::status`] turns this into the
/// string stored on the feed source.
#[derive(Debug)]
pub enum CrawlTermination {
    Completed(CrawlOutcome),
    Transport(FetchError),
    RedirectForbidden { from: String, to: String },
    UnknownFormat,
    /// Storage or other unexpected failure, carrying its message.
    Internal(String),
}

impl CrawlTermination {
    pub fn status(&self) -> String {
        match self {
            CrawlTermination::Internal(message) => message.clone(),
            CrawlTermination::RedirectForbidden { from, to } => {
                format!("redirection forbidden: {from} -> {to}")
            }
            CrawlTermination::UnknownFormat => STATUS_UNKNOWN_FORMAT.to_string(),
            CrawlTermination::Transport(err) => err.to_string(),
            CrawlTermination::Completed(outcome) => {
                if outcome.extracted() == 0 {
                    return STATUS_EMPTY_FEED.to_string();
                }
                match outcome.most_common_failure() {
                    Some(failure) if outcome.created() == 0 => failure.to_string(),
                    _ => STATUS_OK.to_string(),
                }
            }
        }
    }
}
