use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

/// Lifecycle phase of a marketplace job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    Request,
    Negotiation,
    Transaction,
    Evaluation,
    Completed,
    Rejected,
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobPhase::Request => "REQUEST",
            JobPhase::Negotiation => "NEGOTIATION",
            JobPhase::Transaction => "TRANSACTION",
            JobPhase::Evaluation => "EVALUATION",
            JobPhase::Completed => "COMPLETED",
            JobPhase::Rejected => "REJECTED",
        };
        f.write_str(name)
    }
}

/// The slice of a marketplace job this agent relies on.
///
/// Implementations wrap whatever SDK object delivers the job. Side-effecting
/// calls report failure through `Result` so the seller can retry or log.
pub trait MarketplaceJob: Send + Sync {
    fn id(&self) -> String;
    fn name(&self) -> String;
    fn phase(&self) -> JobPhase;
    /// Raw requirement payload, usually a JSON object.
    fn requirement(&self) -> String;
    fn client_address(&self) -> String;
    /// Empty when the job does not name a provider.
    fn provider_address(&self) -> String;

    fn accept(&self, memo: &str) -> Result<()>;
    fn reject(&self, reason: &str) -> Result<()>;
    fn deliver(&self, payload: &str) -> Result<()>;
    fn evaluate(&self, accepted: bool, reason: &str) -> Result<()>;
}

/// A call made on a [`LocalJob`], in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobCall {
    Accept(String),
    Reject(String),
    Deliver(String),
    Evaluate { accepted: bool, reason: String },
}

/// A delivered payload, forwarded out of a [`LocalJob`] as it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub job_id: String,
    pub payload: String,
}

/// In-process job, used to run the seller flow without a marketplace.
#[derive(Debug)]
pub struct LocalJob {
    id: String,
    name: String,
    requirement: String,
    client_address: String,
    provider_address: String,
    phase: Mutex<JobPhase>,
    calls: Mutex<Vec<JobCall>>,
    accept_failures: Mutex<VecDeque<String>>,
    deliveries: Option<UnboundedSender<Delivery>>,
}

impl LocalJob {
    pub fn new(id: impl Into<String>, name: impl Into<String>, requirement: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            requirement: requirement.into(),
            client_address: String::new(),
            provider_address: String::new(),
            phase: Mutex::new(JobPhase::Request),
            calls: Mutex::new(Vec::new()),
            accept_failures: Mutex::new(VecDeque::new()),
            deliveries: None,
        }
    }

    pub fn with_client(mut self, address: impl Into<String>) -> Self {
        self.client_address = address.into();
        self
    }

    pub fn with_provider(mut self, address: impl Into<String>) -> Self {
        self.provider_address = address.into();
        self
    }

    /// Also send every delivered payload to `sink`.
    pub fn with_delivery_sink(mut self, sink: UnboundedSender<Delivery>) -> Self {
        self.deliveries = Some(sink);
        self
    }

    /// Make the next `accept` calls fail with these messages, in order.
    pub fn with_accept_failures<I, S>(self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(errors.into_iter().map(Into::into));
        self
    }

    pub fn calls(&self) -> Vec<JobCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The last payload passed to `deliver`, if any.
    pub fn delivered(&self) -> Option<String> {
        self.calls().into_iter().rev().find_map(|call| match call {
            JobCall::Deliver(payload) => Some(payload),
            _ => None,
        })
    }

    fn record(&self, call: JobCall, phase: JobPhase) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }
}

impl MarketplaceJob for LocalJob {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn phase(&self) -> JobPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn requirement(&self) -> String {
        self.requirement.clone()
    }

    fn client_address(&self) -> String {
        self.client_address.clone()
    }

    fn provider_address(&self) -> String {
        self.provider_address.clone()
    }

    fn accept(&self, memo: &str) -> Result<()> {
        let failure = self
            .accept_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(message) = failure {
            return Err(anyhow!(message));
        }
        self.record(JobCall::Accept(memo.to_string()), JobPhase::Transaction);
        Ok(())
    }

    fn reject(&self, reason: &str) -> Result<()> {
        self.record(JobCall::Reject(reason.to_string()), JobPhase::Rejected);
        Ok(())
    }

    fn deliver(&self, payload: &str) -> Result<()> {
        self.record(JobCall::Deliver(payload.to_string()), JobPhase::Evaluation);
        if let Some(sink) = &self.deliveries {
            sink.send(Delivery {
                job_id: self.id.clone(),
                payload: payload.to_string(),
            })
            .map_err(|_| anyhow!("Delivery sink for job {} is closed", self.id))?;
        }
        Ok(())
    }

    fn evaluate(&self, accepted: bool, reason: &str) -> Result<()> {
        let phase = if accepted {
            JobPhase::Completed
        } else {
            JobPhase::Rejected
        };
        self.record(
            JobCall::Evaluate {
                accepted,
                reason: reason.to_string(),
            },
            phase,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_job_tracks_phase() {
        let job = LocalJob::new("1", "dailyLuck", "{}");
        assert_eq!(job.phase(), JobPhase::Request);

        job.accept("ok").unwrap();
        assert_eq!(job.phase(), JobPhase::Transaction);
        job.deliver("{\"a\":1}").unwrap();
        assert_eq!(job.phase(), JobPhase::Evaluation);
        job.evaluate(true, "done").unwrap();
        assert_eq!(job.phase(), JobPhase::Completed);

        assert_eq!(job.delivered().as_deref(), Some("{\"a\":1}"));
        assert_eq!(job.calls().len(), 3);
    }

    #[test]
    fn test_accept_failures_are_consumed_in_order() {
        let job = LocalJob::new("1", "dailyLuck", "{}").with_accept_failures(["nonce too low"]);
        let err = job.accept("first").unwrap_err();
        assert_eq!(err.to_string(), "nonce too low");
        assert!(job.accept("second").is_ok());
        assert_eq!(job.calls(), vec![JobCall::Accept("second".to_string())]);
    }

    #[test]
    fn test_delivery_sink_receives_payload() {
        let (sender, mut receiver) = tokio::sync::mpsc::unbounded_channel();
        let job = LocalJob::new("7", "dailyLuck", "{}").with_delivery_sink(sender);
        job.deliver("{\"ok\":true}").unwrap();
        assert_eq!(
            receiver.try_recv().unwrap(),
            Delivery {
                job_id: "7".to_string(),
                payload: "{\"ok\":true}".to_string()
            }
        );

        drop(receiver);
        assert!(job.deliver("{}").is_err());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(JobPhase::Negotiation.to_string(), "NEGOTIATION");
        assert_eq!(
            serde_json::to_string(&JobPhase::Evaluation).unwrap(),
            "\"EVALUATION\""
        );
    }
}
