use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use super::job::MarketplaceJob;
use super::seller::{JobOutcome, Seller};

/// A marketplace callback, as delivered to the seller.
#[derive(Clone)]
pub enum JobEvent {
    NewTask(Arc<dyn MarketplaceJob>),
    Evaluate(Arc<dyn MarketplaceJob>),
}

impl JobEvent {
    pub fn job(&self) -> &dyn MarketplaceJob {
        match self {
            JobEvent::NewTask(job) | JobEvent::Evaluate(job) => job.as_ref(),
        }
    }
}

impl fmt::Debug for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            JobEvent::NewTask(_) => "NewTask",
            JobEvent::Evaluate(_) => "Evaluate",
        };
        f.debug_tuple(kind).field(&self.job().id()).finish()
    }
}

/// Where job events come from.
pub trait JobSource {
    /// Events available since the last poll. `Ok(None)` means the source is closed.
    fn poll(&mut self) -> Result<Option<Vec<JobEvent>>>;
}

/// Job source fed through a channel, e.g. by an SDK callback thread.
pub struct ChannelSource {
    receiver: mpsc::UnboundedReceiver<JobEvent>,
}

impl ChannelSource {
    pub fn channel() -> (mpsc::UnboundedSender<JobEvent>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }
}

impl JobSource for ChannelSource {
    fn poll(&mut self) -> Result<Option<Vec<JobEvent>>> {
        let mut events = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) => return Ok(Some(events)),
                Err(TryRecvError::Disconnected) if events.is_empty() => return Ok(None),
                Err(TryRecvError::Disconnected) => return Ok(Some(events)),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub ticks: u64,
    pub events: u64,
    pub delivered: u64,
    pub job_errors: u64,
    pub poll_errors: u64,
    /// Held results dropped because the buyer never paid.
    pub expired: u64,
}

async fn dispatch(seller: &Seller, event: &JobEvent) -> Result<JobOutcome> {
    match event {
        JobEvent::NewTask(job) => seller.on_new_task(job.as_ref()).await,
        JobEvent::Evaluate(job) => seller.on_evaluate(job.as_ref()).await,
    }
}

/// Poll `source` every `interval` and hand each event to `seller`.
///
/// Every tick also drops held results that outlived the seller's pending TTL.
/// Failures are logged and counted; the loop only ends when the source closes.
pub async fn run_supervised<S: JobSource>(
    source: &mut S,
    seller: &Seller,
    interval: Duration,
) -> SupervisorStats {
    let mut stats = SupervisorStats::default();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        stats.ticks += 1;
        stats.expired += seller.purge_expired() as u64;

        let events = match source.poll() {
            Ok(Some(events)) => events,
            Ok(None) => {
                tracing::info!(?stats, "Job source closed, stopping");
                return stats;
            }
            Err(e) => {
                stats.poll_errors += 1;
                tracing::error!(error = %e, "Failed to poll job source");
                continue;
            }
        };

        for event in &events {
            stats.events += 1;
            match dispatch(seller, event).await {
                Ok(JobOutcome::Delivered { .. }) => stats.delivered += 1,
                Ok(outcome) => tracing::debug!(job_id = %event.job().id(), ?outcome, "Job handled"),
                Err(e) => {
                    stats.job_errors += 1;
                    tracing::error!(job_id = %event.job().id(), error = ?e, "Job failed");
                }
            }
        }
    }
}
