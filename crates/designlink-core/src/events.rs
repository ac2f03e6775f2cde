//! Progress Sink Trait
//!
//! This module provides the `ProgressSink` trait the extractor reports
//! progress through. Implementations can print to the console (CLI), forward
//! into a channel, call a closure, or discard events.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::progress::{ProgressEvent, Stage};

/// Receiver of progress notifications
///
/// Emission failures are logged by the extractor and never abort a run.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Emit one progress event
    async fn emit_progress(&self, event: &ProgressEvent) -> Result<(), String>;

    /// Emit a human-readable warning (a fallback, a degraded stage)
    async fn emit_warning(&self, _message: &str) -> Result<(), String> {
        Ok(())
    }
}

/// No-op sink for callers that do not care about progress
#[derive(Default, Clone)]
pub struct NoOpProgressSink;

#[async_trait]
impl ProgressSink for NoOpProgressSink {
    async fn emit_progress(&self, _event: &ProgressEvent) -> Result<(), String> {
        Ok(())
    }
}

/// Console sink for CLI mode - writes to stderr so stdout stays clean
#[derive(Default, Clone)]
pub struct ConsoleProgressSink {
    /// Whether to print in JSON format
    pub json_output: bool,
}

impl ConsoleProgressSink {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }
}

#[async_trait]
impl ProgressSink for ConsoleProgressSink {
    async fn emit_progress(&self, event: &ProgressEvent) -> Result<(), String> {
        if self.json_output {
            let payload = serde_json::to_string(event).map_err(|e| e.to_string())?;
            eprintln!(r#"{{"event":"progress","payload":{payload}}}"#);
        } else {
            let marker = if event.stage == Stage::Complete {
                "✓"
            } else {
                "…"
            };
            eprintln!(
                "[{}] {} {:>3}% {} - {}",
                format_elapsed(event.duration),
                marker,
                event.percentage,
                event.stage,
                event.message
            );
        }
        Ok(())
    }

    async fn emit_warning(&self, message: &str) -> Result<(), String> {
        if self.json_output {
            let payload = serde_json::to_string(message).map_err(|e| e.to_string())?;
            eprintln!(r#"{{"event":"warning","payload":{payload}}}"#);
        } else {
            eprintln!("warning: {message}");
        }
        Ok(())
    }
}

/// Forwards events into an unbounded channel
#[derive(Clone)]
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ProgressSink for ChannelProgressSink {
    async fn emit_progress(&self, event: &ProgressEvent) -> Result<(), String> {
        self.tx
            .send(event.clone())
            .map_err(|_| "progress receiver dropped".to_string())
    }
}

/// Adapts a plain callback into a sink
pub struct FnProgressSink<F>(pub F);

#[async_trait]
impl<F> ProgressSink for FnProgressSink<F>
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    async fn emit_progress(&self, event: &ProgressEvent) -> Result<(), String> {
        (self.0)(event);
        Ok(())
    }
}

fn format_elapsed(millis: u64) -> String {
    let secs = millis / 1000;
    format!("{:02}:{:02}.{:03}", secs / 60, secs % 60, millis % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn event(stage: Stage) -> ProgressEvent {
        ProgressEvent {
            stage,
            percentage: 10,
            message: "working".to_string(),
            duration: 42,
        }
    }

    #[tokio::test]
    async fn test_noop_sink() {
        let sink = NoOpProgressSink;
        assert!(sink.emit_progress(&event(Stage::Variables)).await.is_ok());
        assert!(sink.emit_warning("ignored").await.is_ok());
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (sink, mut rx) = ChannelProgressSink::new();
        sink.emit_progress(&event(Stage::Code)).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().stage, Stage::Code);

        drop(rx);
        assert!(sink.emit_progress(&event(Stage::Code)).await.is_err());
    }

    #[tokio::test]
    async fn test_fn_sink() {
        let seen = Arc::new(AtomicU32::new(0));
        let counter = seen.clone();
        let sink = FnProgressSink(move |_: &ProgressEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sink.emit_progress(&event(Stage::Components)).await.unwrap();
        sink.emit_progress(&event(Stage::Complete)).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "00:00.000");
        assert_eq!(format_elapsed(61_500), "01:01.500");
    }
}
