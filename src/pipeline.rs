//! One relay run: fetch, normalize, filter against dedup state, deliver, persist.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::{DeliveryError, PipelineError};
use crate::message::format_message;
use crate::post::{normalize_at, NormalizedPost, RawPost};
use crate::sink::DeliverySink;
use crate::source::{FeedOrder, FetchRequest, FetchSource};
use crate::state::{DedupPolicy, DedupStore};

/// Per-account settings for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOptions {
    /// Account handle without the leading `@`.
    pub account: String,
    pub limit: u32,
    pub include_replies: bool,
    /// Platform name used in the message header.
    pub platform_label: String,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Raw payloads returned by the source.
    pub fetched: usize,
    /// Payloads that produced a record.
    pub normalized: usize,
    /// Page posts without a permalink yet.
    pub skipped_unidentifiable: usize,
    /// Payloads that could not be decoded.
    pub skipped_malformed: usize,
    /// Posts processed this run, oldest first.
    pub new_posts: Vec<NormalizedPost>,
    /// Posts accepted by the sink.
    pub delivered: usize,
    /// Posts the sink failed to accept (seen-set policy only).
    pub delivery_failures: usize,
}

/// Orchestrates one pass over a source for one account.
pub struct Pipeline {
    options: RelayOptions,
    source: Box<dyn FetchSource>,
    sink: Option<Box<dyn DeliverySink>>,
}

impl Pipeline {
    /// Build a pipeline. Without a sink, new posts are only reported and the
    /// last-id pointer stays where it is.
    #[must_use]
    pub fn new(
        options: RelayOptions,
        source: Box<dyn FetchSource>,
        sink: Option<Box<dyn DeliverySink>>,
    ) -> Self {
        Self {
            options,
            source,
            sink,
        }
    }

    /// Run the pipeline once against `store`.
    ///
    /// State is loaded at the start. A fetch failure returns before anything is
    /// marked or saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails, if a last-id delivery fails, or if
    /// the dedup state cannot be written.
    pub async fn run(&self, store: &mut dyn DedupStore) -> Result<RunReport, PipelineError> {
        store.load().await;

        let request = FetchRequest {
            account: self.options.account.clone(),
            limit: self.options.limit,
            include_replies: self.options.include_replies,
        };
        let raw = self.source.fetch(&request).await?;
        debug!(source = self.source.name(), count = raw.len(), "Fetched raw posts");

        let mut report = RunReport {
            fetched: raw.len(),
            ..RunReport::default()
        };

        // One slot per raw payload, oldest first; skipped payloads are `None`
        let mut slots = normalize_batch(&raw, Utc::now(), &mut report);
        if self.source.order() == FeedOrder::NewestFirst {
            slots.reverse();
        }

        match store.policy() {
            DedupPolicy::SeenSet => {
                let mut batch_ids = HashSet::new();
                let posts: Vec<NormalizedPost> = slots
                    .into_iter()
                    .flatten()
                    .filter(|post| batch_ids.insert(post.id.clone()))
                    .collect();
                self.relay_all_new(posts, store, &mut report).await?;
            }
            DedupPolicy::LastId => {
                let latest = match slots.pop() {
                    Some(Some(post)) => Some(post),
                    Some(None) => {
                        debug!("Newest post could not be identified; pointer unchanged");
                        None
                    }
                    None => None,
                };
                self.relay_latest(latest, store, &mut report).await?;
            }
        }

        info!(
            account = %self.options.account,
            fetched = report.fetched,
            new = report.new_posts.len(),
            delivered = report.delivered,
            delivery_failures = report.delivery_failures,
            skipped = report.skipped_malformed + report.skipped_unidentifiable,
            "Run complete"
        );

        Ok(report)
    }

    /// Seen-set policy: every unseen post, oldest first, saved once at the end.
    ///
    /// Posts are marked even when delivery fails so a broken webhook cannot
    /// cause the same batch to be re-sent forever.
    async fn relay_all_new(
        &self,
        posts: Vec<NormalizedPost>,
        store: &mut dyn DedupStore,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let new_posts: Vec<NormalizedPost> =
            posts.into_iter().filter(|post| store.is_new(&post.id)).collect();

        for post in new_posts {
            match self.deliver(&post).await {
                Ok(true) => report.delivered += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(id = %post.id, error = %e, "Delivery failed; post recorded as seen");
                    report.delivery_failures += 1;
                }
            }
            store.mark_seen(&post.id);
            report.new_posts.push(post);
        }

        store.save().await?;
        Ok(())
    }

    /// Last-id policy: only the newest raw post, and the pointer moves only
    /// after the sink accepted it.
    ///
    /// `latest` is `None` when the feed is empty or its newest payload was
    /// skipped; an older post never stands in for it.
    async fn relay_latest(
        &self,
        latest: Option<NormalizedPost>,
        store: &mut dyn DedupStore,
        report: &mut RunReport,
    ) -> Result<(), PipelineError> {
        let Some(latest) = latest.filter(|post| store.is_new(&post.id)) else {
            debug!("No new latest post");
            store.save().await?;
            return Ok(());
        };

        if self.deliver(&latest).await? {
            report.delivered += 1;
            store.mark_seen(&latest.id);
        } else {
            debug!(id = %latest.id, "No sink configured; pointer left unchanged");
        }
        store.save().await?;
        report.new_posts.push(latest);
        Ok(())
    }

    /// Send one post to the sink. `Ok(false)` when no sink is configured.
    async fn deliver(&self, post: &NormalizedPost) -> Result<bool, DeliveryError> {
        let Some(sink) = &self.sink else {
            return Ok(false);
        };

        let message = format_message(post, &self.options.platform_label, &self.options.account);
        sink.deliver(&message).await?;
        info!(id = %post.id, "Delivered post");
        Ok(true)
    }
}

/// Normalize every payload in source order, counting the ones that had to be
/// skipped. Skipped payloads keep their position as `None`.
fn normalize_batch(
    raw: &[RawPost],
    fetched_at: DateTime<Utc>,
    report: &mut RunReport,
) -> Vec<Option<NormalizedPost>> {
    let mut slots = Vec::with_capacity(raw.len());

    for payload in raw {
        let slot = match normalize_at(payload, fetched_at) {
            Ok(Some(post)) => Some(post),
            Ok(None) => {
                debug!(format = %payload.format(), "Skipping post without identity");
                report.skipped_unidentifiable += 1;
                None
            }
            Err(e) => {
                warn!(format = %payload.format(), error = %e, "Skipping malformed post");
                report.skipped_malformed += 1;
                None
            }
        };
        slots.push(slot);
    }

    report.normalized = slots.iter().flatten().count();
    if !raw.is_empty() && report.normalized == 0 {
        warn!(
            fetched = raw.len(),
            "No fetched post could be normalized; the source format may have changed"
        );
    }

    slots
}
