use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, Retry};

use super::job::MarketplaceJob;
use crate::cache::{Clock, SystemClock, TtlCache, DEFAULT_TTL};
use crate::engine::validation::DATE_FORMAT;
use crate::engine::ScoreEngine;
use crate::sales::SalesLedger;
use crate::service::{
    handle, ReferenceBirth, Requirement, ServiceContext, ServiceKind, ServiceOutcome, ServicePrices,
};

/// How hard to try when the marketplace refuses an accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_millis: u64,
    pub max_delay: Duration,
    pub attempts: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_millis: 100,
            max_delay: Duration::from_secs(5),
            attempts: 3,
        }
    }
}

impl RetryPolicy {
    fn strategy(&self) -> impl Iterator<Item = Duration> {
        // The first attempt is not a retry
        ExponentialBackoff::from_millis(self.base_millis)
            .max_delay(self.max_delay)
            .take(self.attempts.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// We are the buyer, e.g. a job opened by our own marketing wallet.
    SelfSent,
    /// The job names some other provider.
    OtherProvider,
}

/// What the seller did with a job event.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Skipped(SkipReason),
    Rejected {
        reason: String,
    },
    /// Accepted and computed; `error` is set when the handler produced an error payload.
    Accepted {
        service: ServiceKind,
        error: Option<String>,
    },
    Delivered {
        service: ServiceKind,
        recomputed: bool,
    },
    EvaluationRejected {
        reason: String,
    },
}

#[derive(Debug, Clone)]
struct PendingDelivery {
    service: ServiceKind,
    outcome: ServiceOutcome,
}

fn already_signed(error: &anyhow::Error) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("signed") || message.contains("already")
}

/// Drives the two marketplace callbacks: a new task and its evaluation.
pub struct Seller {
    engine: ScoreEngine,
    wallet: Option<String>,
    prices: ServicePrices,
    reference: ReferenceBirth,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    ledger: Option<Mutex<SalesLedger>>,
    /// Results waiting for payment; a buyer that never pays lets its entry expire.
    pending: TtlCache<String, PendingDelivery>,
}

impl Seller {
    pub fn new(engine: ScoreEngine) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            engine,
            wallet: None,
            prices: ServicePrices::default(),
            reference: ReferenceBirth::default(),
            retry: RetryPolicy::default(),
            pending: TtlCache::new(DEFAULT_TTL, clock.clone()),
            clock,
            ledger: None,
        }
    }

    /// Our own wallet address. Without it no job is skipped.
    pub fn with_wallet(mut self, wallet: impl Into<String>) -> Self {
        let wallet = wallet.into();
        self.wallet = (!wallet.trim().is_empty()).then(|| wallet.trim().to_string());
        self
    }

    pub fn with_prices(mut self, prices: ServicePrices) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_reference(mut self, reference: ReferenceBirth) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the clock. Call before any job is handled; held results are dropped.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.pending = TtlCache::new(self.pending.ttl(), clock.clone());
        self.clock = clock;
        self
    }

    /// How long a computed result waits for the evaluation callback.
    pub fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending = TtlCache::new(ttl, self.clock.clone());
        self
    }

    pub fn with_ledger(mut self, ledger: SalesLedger) -> Self {
        self.ledger = Some(Mutex::new(ledger));
        self
    }

    /// Number of computed results waiting for their evaluation callback.
    pub fn pending_deliveries(&self) -> usize {
        self.pending.len()
    }

    /// Drop held results whose buyer never came back, returning how many went.
    pub fn purge_expired(&self) -> usize {
        let purged = self.pending.purge_expired();
        if purged > 0 {
            tracing::debug!(purged, "Expired pending deliveries");
        }
        purged
    }

    /// Total sales in the attached ledger, if any.
    pub fn recorded_sales(&self) -> Option<u64> {
        self.ledger.as_ref().map(|ledger| {
            ledger
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .log()
                .total_sales
        })
    }

    fn is_own(&self, address: &str) -> bool {
        self.wallet
            .as_deref()
            .is_some_and(|wallet| wallet.eq_ignore_ascii_case(address.trim()))
    }

    fn skip_reason(&self, job: &dyn MarketplaceJob) -> Option<SkipReason> {
        self.wallet.as_ref()?;
        if self.is_own(&job.client_address()) {
            return Some(SkipReason::SelfSent);
        }
        let provider = job.provider_address();
        if !provider.trim().is_empty() && !self.is_own(&provider) {
            return Some(SkipReason::OtherProvider);
        }
        None
    }

    fn requirement_of(&self, job: &dyn MarketplaceJob) -> Requirement {
        let today = self.clock.now().date_naive().format(DATE_FORMAT).to_string();
        Requirement::parse(&job.requirement()).with_default_target(&today)
    }

    fn compute(&self, service: ServiceKind, requirement: &Requirement) -> ServiceOutcome {
        let context = ServiceContext {
            now: self.clock.now(),
            reference: &self.reference,
            prices: &self.prices,
        };
        handle(service, &self.engine, requirement, &context)
    }

    async fn accept_with_retry(&self, job: &dyn MarketplaceJob, memo: &str) -> Result<()> {
        let job_id = job.id();
        let job_id = job_id.as_str();
        Retry::spawn(self.retry.strategy(), || async move {
            match job.accept(memo) {
                Ok(()) => Ok(()),
                Err(e) if already_signed(&e) => {
                    tracing::debug!(job_id, "Job already signed, continuing");
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "Accept attempt failed");
                    Err(e)
                }
            }
        })
        .await
        .with_context(|| format!("Failed to accept job {}", job_id))
    }

    fn record_sale(&self, job: &dyn MarketplaceJob, service: ServiceKind, requirement: &Requirement) {
        let Some(ledger) = &self.ledger else {
            return;
        };
        let mut ledger = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let result = ledger.record(
            &job.id(),
            service,
            &job.client_address(),
            service.price_for(&self.prices, requirement),
            self.clock.now(),
        );
        // A ledger failure must not fail the job
        if let Err(e) = result {
            tracing::warn!(job_id = %job.id(), error = %e, "Failed to record sale");
        }
    }

    /// A buyer opened a job: accept it, compute the result, and hold it for delivery.
    pub async fn on_new_task(&self, job: &dyn MarketplaceJob) -> Result<JobOutcome> {
        let job_id = job.id();

        if let Some(reason) = self.skip_reason(job) {
            tracing::info!(job_id = %job_id, ?reason, "Skipping job");
            return Ok(JobOutcome::Skipped(reason));
        }

        let requirement = self.requirement_of(job);
        let name = job.name();
        tracing::info!(job_id = %job_id, service = %name, phase = %job.phase(), "New job");

        let Some(service) = ServiceKind::route(&name, &requirement) else {
            let reason = format!("Unknown service: {}", name);
            job.reject(&reason)
                .with_context(|| format!("Failed to reject job {}", job_id))?;
            return Ok(JobOutcome::Rejected { reason });
        };

        self.accept_with_retry(job, &format!("Trinity {} accepted", service))
            .await?;

        let outcome = self.compute(service, &requirement);
        let error = match &outcome {
            ServiceOutcome::Failed { error } => Some(error.clone()),
            _ => None,
        };

        self.pending
            .insert(job_id.clone(), PendingDelivery { service, outcome });

        if error.is_none() {
            self.record_sale(job, service, &requirement);
        }

        Ok(JobOutcome::Accepted { service, error })
    }

    /// The buyer paid: deliver the held result and close the job.
    pub async fn on_evaluate(&self, job: &dyn MarketplaceJob) -> Result<JobOutcome> {
        let job_id = job.id();
        let pending = self.pending.get(&job_id);

        let (delivery, recomputed) = match pending {
            Some(delivery) => (delivery, false),
            None => {
                tracing::debug!(job_id = %job_id, "No stored result, computing now");
                let requirement = self.requirement_of(job);
                let Some(service) = ServiceKind::route(&job.name(), &requirement) else {
                    let reason = "Unknown service".to_string();
                    job.evaluate(false, &reason)
                        .with_context(|| format!("Failed to evaluate job {}", job_id))?;
                    return Ok(JobOutcome::EvaluationRejected { reason });
                };
                let outcome = self.compute(service, &requirement);
                (PendingDelivery { service, outcome }, true)
            }
        };

        job.deliver(&delivery.outcome.to_json())
            .with_context(|| format!("Failed to deliver job {}", job_id))?;
        job.evaluate(
            true,
            &format!("Trinity {} delivered successfully", delivery.service),
        )
        .with_context(|| format!("Failed to evaluate job {}", job_id))?;

        self.pending.invalidate(&job_id);

        tracing::info!(job_id = %job_id, service = %delivery.service, "Job delivered");
        Ok(JobOutcome::Delivered {
            service: delivery.service,
            recomputed,
        })
    }
}
