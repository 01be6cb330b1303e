//! Concurrent fan-out over a request sequence
//!
//! A batch launches one fetch per request and waits for all of them to
//! settle. Individual failures never cancel or delay siblings; they only
//! leave their entry without payload. With a concurrency cap, a freed slot is
//! refilled as soon as any fetch settles. Results come back in request order
//! no matter which fetch finishes first.

use crate::diagnostics::{Code, LogSink, Severity};
use crate::fetch::{ImageFetcher, ResourceFetcher};
use crate::types::{BatchResult, Entry, Event, FetchRequest};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::future::Future;
use tokio::sync::broadcast;

const MODULE: &str = "batch";

/// Runs many fetches concurrently and collects every outcome
#[derive(Clone, Debug)]
pub struct BatchLoader {
    max_concurrent: Option<usize>,
    log: LogSink,
    events: Option<broadcast::Sender<Event>>,
}

impl BatchLoader {
    /// Create a loader; `None` means no cap on in-flight fetches
    pub fn new(max_concurrent: Option<usize>, log: LogSink) -> Self {
        Self {
            max_concurrent,
            log,
            events: None,
        }
    }

    /// Publish batch progress on a broadcast channel
    pub fn with_events(mut self, events: broadcast::Sender<Event>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events {
            // No receivers is fine
            tx.send(event).ok();
        }
    }

    /// Fetch every request as raw bytes
    pub async fn load_resources(
        &self,
        fetcher: &ResourceFetcher,
        requests: &[FetchRequest],
    ) -> BatchResult<Bytes> {
        self.load(requests, |request| fetcher.fetch(request)).await
    }

    /// Fetch and decode every request as an image
    pub async fn load_images(
        &self,
        fetcher: &ImageFetcher,
        requests: &[FetchRequest],
    ) -> BatchResult<DynamicImage> {
        self.load(requests, |request| fetcher.fetch(request)).await
    }

    /// Run `fetch` for every request and gather the entries in request order
    ///
    /// `fetch` must itself never fail; it resolves every request to an
    /// [`Entry`], with or without payload.
    pub async fn load<P, F, Fut>(&self, requests: &[FetchRequest], fetch: F) -> BatchResult<P>
    where
        F: Fn(FetchRequest) -> Fut,
        Fut: Future<Output = Entry<P>>,
    {
        let total = requests.len();
        self.emit(Event::BatchStarted { total });

        let limit = self.max_concurrent.unwrap_or(total).max(1);
        tracing::debug!(total, limit, "starting batch");

        // Unordered so a slow request only holds its own slot
        let mut settled: Vec<(usize, Entry<P>)> =
            stream::iter(requests.iter().cloned().enumerate())
                .map(|(index, request)| {
                    let pending = fetch(request);
                    async move {
                        let entry = pending.await;
                        self.emit(Event::EntryResolved {
                            index,
                            filename: entry.filename().to_string(),
                            ok: entry.is_resolved(),
                        });
                        (index, entry)
                    }
                })
                .buffer_unordered(limit)
                .collect()
                .await;
        settled.sort_unstable_by_key(|(index, _)| *index);
        let entries: BatchResult<P> = settled.into_iter().map(|(_, entry)| entry).collect();

        let succeeded = entries.iter().filter(|e| e.is_resolved()).count();
        let failed = total - succeeded;
        let severity = if failed == 0 {
            Severity::Info
        } else {
            Severity::Warn
        };
        self.log.record(
            severity,
            MODULE,
            Code::BatchSummary,
            format!("{} of {} requests succeeded, {} failed", succeeded, total, failed),
        );
        self.emit(Event::BatchFinished { succeeded, failed });

        entries
    }
}
