//! Bulk dispatch of one send operation across many contacts.
//!
//! Every target gets exactly one [`DispatchResult`], in input order, whatever
//! happens to the other targets. In concurrent mode an optional deadline
//! bounds the whole run: targets still in flight when it passes are reported
//! as timed out. Their sends are detached rather than aborted; a send
//! finishing after the deadline is dropped and never reaches the returned
//! summary.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::amount::TokenAmount;
use crate::error::{CoreError, Result, error_chain};
use crate::services::MessageRelay;
use crate::types::{Contact, MessageContent};

/// One recipient of a bulk send
pub type DispatchTarget = Contact;

/// Operation applied to each target
#[async_trait]
pub trait SendOperation: Send + Sync {
    /// Send to one target and return an opaque token (e.g. a task id)
    async fn send(&self, target: &DispatchTarget) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// One send at a time, in input order
    #[default]
    Sequential,
    /// All sends started at once
    Concurrent,
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

impl std::str::FromStr for DispatchMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => Err(CoreError::validation(format!(
                "unknown dispatch mode \"{other}\" (expected sequential or concurrent)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    pub mode: DispatchMode,
    /// Deadline for the whole run; only applies to concurrent mode
    pub timeout: Option<Duration>,
    /// Cap on sends in flight at once in concurrent mode; unbounded when `None`
    pub max_in_flight: Option<usize>,
}

impl DispatchOptions {
    pub fn sequential() -> Self {
        Self::default()
    }

    pub fn concurrent(timeout: Option<Duration>) -> Self {
        Self {
            mode: DispatchMode::Concurrent,
            timeout,
            max_in_flight: None,
        }
    }

    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }
}

/// How a single send ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DispatchOutcome {
    Sent { task_id: String },
    Failed { reason: String },
    TimedOut,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::Sent { task_id } => Some(task_id),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Sent { .. } => None,
            Self::Failed { reason } => Some(reason),
            Self::TimedOut => Some("timed out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub target: String,
    #[serde(flatten)]
    pub outcome: DispatchOutcome,
    #[serde(rename = "elapsedMs", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Aggregate of one dispatch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(rename = "minElapsedMs", serialize_with = "serialize_millis")]
    pub min_elapsed: Duration,
    #[serde(rename = "avgElapsedMs", serialize_with = "serialize_millis")]
    pub avg_elapsed: Duration,
    #[serde(rename = "maxElapsedMs", serialize_with = "serialize_millis")]
    pub max_elapsed: Duration,
    #[serde(rename = "totalElapsedMs", serialize_with = "serialize_millis")]
    pub total_elapsed: Duration,
    pub results: Vec<DispatchResult>,
}

impl DispatchSummary {
    /// Timing statistics cover settled sends only; timed-out targets are
    /// counted as failures but have no elapsed time of their own.
    pub fn from_results(results: Vec<DispatchResult>, total_elapsed: Duration) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let settled: Vec<Duration> = results
            .iter()
            .filter(|r| r.outcome != DispatchOutcome::TimedOut)
            .map(|r| r.elapsed)
            .collect();

        let (min_elapsed, avg_elapsed, max_elapsed) = if settled.is_empty() {
            (Duration::ZERO, Duration::ZERO, Duration::ZERO)
        } else {
            let sum: Duration = settled.iter().sum();
            (
                settled.iter().copied().min().unwrap_or_default(),
                sum / settled.len() as u32,
                settled.iter().copied().max().unwrap_or_default(),
            )
        };

        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            min_elapsed,
            avg_elapsed,
            max_elapsed,
            total_elapsed,
            results,
        }
    }

    pub fn timed_out(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == DispatchOutcome::TimedOut)
            .count()
    }
}

fn serialize_millis<S: serde::Serializer>(
    value: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_millis() as u64)
}

pub struct Dispatcher {
    options: DispatchOptions,
}

impl Dispatcher {
    pub fn new(options: DispatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DispatchOptions {
        &self.options
    }

    /// Run `operation` once per target. Send failures are recorded in the
    /// summary and never returned as errors; only an empty target list is.
    pub async fn dispatch(
        &self,
        targets: &[DispatchTarget],
        operation: Arc<dyn SendOperation>,
    ) -> Result<DispatchSummary> {
        if targets.is_empty() {
            return Err(CoreError::validation("no dispatch targets"));
        }

        info!(
            targets = targets.len(),
            mode = %self.options.mode,
            timeout_ms = ?self.options.timeout.map(|t| t.as_millis()),
            "Starting dispatch"
        );

        let started = Instant::now();
        let results = match self.options.mode {
            DispatchMode::Sequential => self.run_sequential(targets, operation.as_ref()).await,
            DispatchMode::Concurrent => self.run_concurrent(targets, operation, started).await,
        };
        let summary = DispatchSummary::from_results(results, started.elapsed());

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            timed_out = summary.timed_out(),
            elapsed_ms = summary.total_elapsed.as_millis() as u64,
            "Dispatch finished"
        );

        Ok(summary)
    }

    async fn run_sequential(
        &self,
        targets: &[DispatchTarget],
        operation: &dyn SendOperation,
    ) -> Vec<DispatchResult> {
        if self.options.timeout.is_some() {
            debug!("Dispatch timeout ignored in sequential mode");
        }
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            results.push(send_one(operation, target).await);
        }
        results
    }

    async fn run_concurrent(
        &self,
        targets: &[DispatchTarget],
        operation: Arc<dyn SendOperation>,
        started: Instant,
    ) -> Vec<DispatchResult> {
        let (tx, mut rx) = mpsc::unbounded_channel::<(usize, DispatchResult)>();
        let limiter = self
            .options
            .max_in_flight
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        for (index, target) in targets.iter().cloned().enumerate() {
            let operation = Arc::clone(&operation);
            let limiter = limiter.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                let result = send_one(operation.as_ref(), &target).await;
                // Fails only once the dispatch has returned; the late result is dropped.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<DispatchResult>> = (0..targets.len()).map(|_| None).collect();
        let collect = async {
            while let Some((index, result)) = rx.recv().await {
                slots[index] = Some(result);
            }
        };

        let deadline_hit = match self.options.timeout {
            Some(limit) => {
                let hit = tokio::time::timeout(limit, collect).await.is_err();
                if hit {
                    let pending = slots.iter().filter(|s| s.is_none()).count();
                    warn!(
                        pending,
                        timeout_ms = limit.as_millis() as u64,
                        "Dispatch deadline reached, reporting pending sends as timed out"
                    );
                }
                hit
            }
            None => {
                collect.await;
                false
            }
        };

        let waited = started.elapsed();
        slots
            .into_iter()
            .zip(targets)
            .map(|(slot, target)| {
                slot.unwrap_or_else(|| DispatchResult {
                    target: target.address.clone(),
                    outcome: if deadline_hit {
                        DispatchOutcome::TimedOut
                    } else {
                        // Task dropped before reporting, e.g. the runtime shut down.
                        DispatchOutcome::Failed {
                            reason: "send task ended without a result".to_string(),
                        }
                    },
                    elapsed: waited,
                })
            })
            .collect()
    }
}

async fn send_one(operation: &dyn SendOperation, target: &DispatchTarget) -> DispatchResult {
    let started = Instant::now();
    let attempt = AssertUnwindSafe(operation.send(target)).catch_unwind().await;
    let outcome = match attempt {
        Ok(Ok(task_id)) => {
            debug!(target = %target.address, task_id = %task_id, "Send succeeded");
            DispatchOutcome::Sent { task_id }
        }
        Ok(Err(e)) => {
            let reason = error_chain(&e);
            warn!(target = %target.address, error = %reason, "Send failed");
            DispatchOutcome::Failed { reason }
        }
        Err(payload) => {
            let reason = format!("send panicked: {}", panic_message(payload.as_ref()));
            warn!(target = %target.address, error = %reason, "Send panicked");
            DispatchOutcome::Failed { reason }
        }
    };
    DispatchResult {
        target: target.address.clone(),
        outcome,
        elapsed: started.elapsed(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Sends one message through a relay per target
pub struct RelaySendOperation {
    relay: Arc<dyn MessageRelay>,
    content: MessageContent,
    max_price: TokenAmount,
}

impl RelaySendOperation {
    pub fn new(relay: Arc<dyn MessageRelay>, content: MessageContent, max_price: TokenAmount) -> Self {
        Self {
            relay,
            content,
            max_price,
        }
    }
}

#[async_trait]
impl SendOperation for RelaySendOperation {
    async fn send(&self, target: &DispatchTarget) -> Result<String> {
        self.relay
            .send(&target.address, &self.content, self.max_price)
            .await
    }
}
