use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc::UnboundedSender;

use super::job::{Delivery, LocalJob};
use crate::cache::TtlCache;
use super::supervisor::JobEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewTask,
    Evaluate,
}

/// One job event in the line-delimited JSON stream read by `serve`.
///
/// ```json
/// {"event":"new_task","id":"42","name":"deepLuck","requirement":{"birth_date":"1990-05-15"},"client":"0xBuyer"}
/// {"event":"evaluate","id":"42"}
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventLine {
    pub event: EventKind,
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// A JSON object, or a string holding one.
    #[serde(default)]
    pub requirement: serde_json::Value,
    #[serde(default)]
    pub client: String,
    #[serde(default)]
    pub provider: String,
}

impl EventLine {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line).context("Invalid job event")
    }

    fn requirement_text(&self) -> String {
        match &self.requirement {
            serde_json::Value::Null => "{}".to_string(),
            serde_json::Value::String(raw) => raw.clone(),
            other => other.to_string(),
        }
    }
}

/// Turns event lines into [`JobEvent`]s, keeping each job alive until it is
/// evaluated or `ttl` passes.
pub struct JobRegistry {
    jobs: TtlCache<String, Arc<LocalJob>>,
    deliveries: Option<UnboundedSender<Delivery>>,
}

impl JobRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            jobs: TtlCache::with_system_clock(ttl),
            deliveries: None,
        }
    }

    /// Forward every delivered payload to `sink`.
    pub fn with_delivery_sink(mut self, sink: UnboundedSender<Delivery>) -> Self {
        self.deliveries = Some(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn build_job(&self, line: &EventLine) -> Arc<LocalJob> {
        let mut job = LocalJob::new(line.id.clone(), line.name.clone(), line.requirement_text())
            .with_client(line.client.clone())
            .with_provider(line.provider.clone());
        if let Some(sink) = &self.deliveries {
            job = job.with_delivery_sink(sink.clone());
        }
        Arc::new(job)
    }

    pub fn event_for(&mut self, line: &EventLine) -> JobEvent {
        match line.event {
            EventKind::NewTask => {
                self.jobs.purge_expired();
                let job = self.build_job(line);
                self.jobs.insert(line.id.clone(), job.clone());
                JobEvent::NewTask(job)
            }
            EventKind::Evaluate => {
                // An evaluate for a job we never saw is served from its own fields
                let job = match self.jobs.invalidate(&line.id) {
                    Some(job) => job,
                    None => self.build_job(line),
                };
                JobEvent::Evaluate(job)
            }
        }
    }
}

/// Read event lines from `reader` until EOF and send them to `sender`.
///
/// Blank lines are ignored and malformed ones are logged and skipped.
/// Returns how many events were forwarded.
pub async fn forward_events<R>(
    reader: R,
    registry: &mut JobRegistry,
    sender: &UnboundedSender<JobEvent>,
) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    while let Some(line) = lines.next_line().await.context("Failed to read job events")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = match EventLine::parse(line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "Skipping job event");
                continue;
            }
        };
        if sender.send(registry.event_for(&event)).is_err() {
            tracing::info!("Supervisor stopped, no longer reading job events");
            break;
        }
        forwarded += 1;
    }
    Ok(forwarded)
}
