use futures::stream::{self, StreamExt};
use std::sync::Arc;

use super::dedup::{is_duplicate, DedupKey};
use super::outcome::{CrawlOutcome, CrawlTermination, EntryResult};
use super::validate::{check_fields, check_probe, EntryFailure};
use super::{NewsStore, SearchIndex};
use crate::config::Config;
use crate::feed::{
    extract_entries, sniff, FeedFormat, FeedTransport, FetchError, FetchOptions, HttpFetcher,
    HttpLinkProber, LinkProber, RawFeedEntry,
};
use crate::storage::{Database, DatabaseError, FeedSource, NewNewsItem, StoredNewsItem};
use crate::util::{is_protocol_change, same_location};

/// Knobs for one importer, usually derived from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    pub fetch: FetchOptions,
    pub probe_concurrency: usize,
    pub crawl_concurrency: usize,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            probe_concurrency: 8,
            crawl_concurrency: 4,
        }
    }
}

impl From<&Config> for ImportSettings {
    fn from(config: &Config) -> Self {
        Self {
            fetch: config.fetch_options(),
            probe_concurrency: config.probe_concurrency,
            crawl_concurrency: config.crawl_concurrency,
        }
    }
}

/// Runs crawls of feed sources against its collaborators.
///
/// Holds no per-crawl state; one importer can crawl many sources at once.
#[derive(Clone)]
pub struct Importer {
    transport: Arc<dyn FeedTransport>,
    prober: Arc<dyn LinkProber>,
    store: Arc<dyn NewsStore>,
    index: Arc<dyn SearchIndex>,
    settings: ImportSettings,
}

impl Importer {
    pub fn new(
        transport: Arc<dyn FeedTransport>,
        prober: Arc<dyn LinkProber>,
        store: Arc<dyn NewsStore>,
        index: Arc<dyn SearchIndex>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            transport,
            prober,
            store,
            index,
            settings,
        }
    }

    /// Production wiring: reqwest fetcher and prober, SQLite store and index.
    pub fn from_config(config: &Config, db: Database) -> Result<Self, FetchError> {
        let transport = HttpFetcher::new(&config.user_agent)?;
        let prober = HttpLinkProber::new(
            &config.user_agent,
            config.probe_timeout(),
            config.max_redirects,
        )?;
        let db = Arc::new(db);
        Ok(Self::new(
            Arc::new(transport),
            Arc::new(prober),
            db.clone(),
            db,
            ImportSettings::from(config),
        ))
    }

    /// Crawl one feed source.
    ///
    /// Never fails: every outcome, errors included, ends up as the source's
    /// `last_crawl_status`.
    pub async fn import(&self, source: &FeedSource, ignore_older_items: bool) {
        let termination = self.crawl(source, ignore_older_items).await;
        let status = termination.status();

        match &termination {
            CrawlTermination::Completed(outcome) => tracing::info!(
                feed_id = source.id,
                url = %source.url,
                status = %status,
                extracted = outcome.extracted(),
                considered = outcome.total_seen(),
                created = outcome.created(),
                duplicates = outcome.duplicates(),
                failed = outcome.failed(),
                "Crawl finished"
            ),
            _ => tracing::warn!(
                feed_id = source.id,
                url = %source.url,
                status = %status,
                "Crawl aborted"
            ),
        }

        if let Err(e) = self.store.set_last_crawl_status(source.id, &status).await {
            tracing::warn!(feed_id = source.id, error = %e, "Failed to record crawl status");
        }
    }

    /// Crawl many sources concurrently, each independently of the others.
    pub async fn import_all(&self, sources: Vec<FeedSource>, ignore_older_items: bool) {
        let total = sources.len();
        stream::iter(sources)
            .map(|source| async move { self.import(&source, ignore_older_items).await })
            .buffer_unordered(self.settings.crawl_concurrency.max(1))
            .collect::<Vec<()>>()
            .await;
        tracing::info!(sources = total, "Batch crawl finished");
    }

    /// The outer boundary: storage failures become `Internal` here and
    /// nowhere else.
    pub(crate) async fn crawl(&self, source: &FeedSource, ignore_older_items: bool) -> CrawlTermination {
        match self.try_crawl(source, ignore_older_items).await {
            Ok(termination) => termination,
            Err(e) => {
                tracing::warn!(feed_id = source.id, error = %e, "Crawl failed unexpectedly");
                CrawlTermination::Internal(e.to_string())
            }
        }
    }

    async fn try_crawl(
        &self,
        source: &FeedSource,
        ignore_older_items: bool,
    ) -> Result<CrawlTermination, DatabaseError> {
        self.store.touch_last_crawled_at(source.id).await?;

        let cutoff = if ignore_older_items {
            self.store.latest_published_at(source.id).await?
        } else {
            None
        };

        let document = match self.transport.fetch(&source.url, &self.settings.fetch).await {
            Ok(document) => document,
            Err(e) => return Ok(CrawlTermination::Transport(e)),
        };

        if !same_location(&source.url, &document.final_url) {
            if !is_protocol_change(&source.url, &document.final_url) {
                return Ok(CrawlTermination::RedirectForbidden {
                    from: source.url.clone(),
                    to: document.final_url,
                });
            }
            tracing::info!(
                feed_id = source.id,
                from = %source.url,
                to = %document.final_url,
                "Feed moved to other protocol, updating URL"
            );
            match self.store.update_url(source.id, &document.final_url).await {
                Ok(()) => {}
                // The document is still this source's feed; keep the old URL.
                Err(DatabaseError::UrlTaken(url)) => tracing::warn!(
                    feed_id = source.id,
                    url = %url,
                    "Redirect target already registered as another source, keeping URL"
                ),
                Err(e) => return Err(e),
            }
        }

        if !document.is_success() {
            return Ok(CrawlTermination::Transport(FetchError::HttpStatus(document.status)));
        }

        let sniffed = sniff(&document.body);
        let (format, root) = match (sniffed.format, sniffed.root) {
            (FeedFormat::Unknown, _) | (_, None) => return Ok(CrawlTermination::UnknownFormat),
            (format, Some(root)) => (format, root),
        };

        let entries = extract_entries(format, &root);
        tracing::debug!(
            feed_id = source.id,
            format = %format,
            entries = entries.len(),
            "Extracted entries"
        );

        let outcome = self.process_entries(source.id, entries, cutoff).await?;
        Ok(CrawlTermination::Completed(outcome))
    }

    async fn process_entries(
        &self,
        feed_source_id: i64,
        entries: Vec<RawFeedEntry>,
        cutoff: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<CrawlOutcome, DatabaseError> {
        let extracted = entries.len();
        let candidates: Vec<RawFeedEntry> = entries
            .into_iter()
            .filter(|entry| match (cutoff, entry.published_at) {
                (Some(cutoff), Some(published)) => published > cutoff,
                _ => true,
            })
            .collect();

        let checked: Vec<Result<NewNewsItem, EntryFailure>> =
            candidates.iter().map(check_fields).collect();

        // Probes for entries that passed the field checks run concurrently;
        // all of them finish before any entry is decided.
        let probes: Vec<Option<String>> = stream::iter(checked.iter())
            .map(|check| async move {
                match check {
                    Ok(item) => Some(self.prober.probe(&item.link).await),
                    Err(_) => None,
                }
            })
            .buffered(self.settings.probe_concurrency.max(1))
            .collect()
            .await;

        let mut outcome = CrawlOutcome::new(extracted, candidates.len());
        let mut fresh: Vec<StoredNewsItem> = Vec::new();

        for (check, probe) in checked.into_iter().zip(probes) {
            let result = self.decide(feed_source_id, check, probe.as_deref()).await?;
            if let EntryResult::Failed(failure) = &result {
                tracing::debug!(feed_id = feed_source_id, reason = %failure, "Skipping entry");
            }
            outcome = outcome.record(&result);
            if let EntryResult::Created(item) = result {
                fresh.push(item);
            }
        }

        if !fresh.is_empty() {
            self.index.index(&fresh).await?;
        }

        Ok(outcome)
    }

    /// Validation, then the duplicate check, then creation.
    async fn decide(
        &self,
        feed_source_id: i64,
        check: Result<NewNewsItem, EntryFailure>,
        probe: Option<&str>,
    ) -> Result<EntryResult, DatabaseError> {
        let item = match check {
            Ok(item) => item,
            Err(failure) => return Ok(EntryResult::Failed(failure)),
        };
        if let Err(failure) = probe.map_or(Ok(()), check_probe) {
            return Ok(EntryResult::Failed(failure));
        }

        let key = DedupKey::new(item.guid.as_deref(), &item.link);
        if is_duplicate(self.store.as_ref(), feed_source_id, &key).await? {
            return Ok(EntryResult::Duplicate);
        }

        // The unique index settles a race with an overlapping crawl.
        Ok(match self.store.create_item(feed_source_id, &item).await? {
            Some(stored) => EntryResult::Created(stored),
            None => EntryResult::Duplicate,
        })
    }
}
