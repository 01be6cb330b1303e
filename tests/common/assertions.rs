//! Event and log assertions shared by integration tests

use bundle_dl::{Code, Event, LogSink};
use tokio::sync::broadcast;

/// Drain every event already sent on `events`
pub fn drain_events(events: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Variant names of `events`, for order assertions
pub fn event_names(events: &[Event]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            Event::BatchStarted { .. } => "batch_started",
            Event::EntryResolved { .. } => "entry_resolved",
            Event::BatchFinished { .. } => "batch_finished",
            Event::Encoded { .. } => "encoded",
            Event::CaptureRequested { .. } => "capture_requested",
            Event::CaptureFinished { .. } => "capture_finished",
            Event::ArchiveBuilt { .. } => "archive_built",
            Event::Saved { .. } => "saved",
            Event::NothingToSave { .. } => "nothing_to_save",
        })
        .collect()
}

/// Assert that `log` holds a record with `code` whose message mentions `needle`
pub fn assert_logged(log: &LogSink, code: Code, needle: &str) {
    let records = log.records();
    assert!(
        records
            .iter()
            .any(|r| r.code == code && r.message.contains(needle)),
        "no {code:?} record mentioning {needle:?} in:\n{}",
        log.format()
    );
}
