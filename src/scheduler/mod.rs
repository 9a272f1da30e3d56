//! Batch completion scheduler.
//!
//! On every tick, moves all pending jobs to completed and writes one audit
//! line per transitioned job. Ticks run inline in a single loop, so a slow
//! tick delays the next one instead of overlapping it.

pub mod audit;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::error::SchedulerError;
use crate::jobs::model::Job;
use crate::jobs::store::JobStore;

pub use audit::{AuditSink, FileAuditLog, completion_line};

/// When ticks fire.
#[derive(Debug, Clone)]
pub enum TickSchedule {
    /// Fixed period between ticks.
    Interval(Duration),
    /// Cron expression, evaluated in UTC (seconds field first).
    Cron(Box<cron::Schedule>),
}

impl TickSchedule {
    pub fn interval(period: Duration) -> Result<Self, SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::InvalidSchedule {
                expr: format!("{period:?}"),
                reason: "interval must be greater than zero".to_string(),
            });
        }
        Ok(TickSchedule::Interval(period))
    }

    pub fn cron(expr: &str) -> Result<Self, SchedulerError> {
        let schedule =
            cron::Schedule::from_str(expr).map_err(|e| SchedulerError::InvalidSchedule {
                expr: expr.to_string(),
                reason: e.to_string(),
            })?;
        Ok(TickSchedule::Cron(Box::new(schedule)))
    }
}

/// Ages pending jobs into completed and records the audit trail.
pub struct CompletionScheduler {
    store: Arc<JobStore>,
    audit: Arc<dyn AuditSink>,
    /// Audit lines whose append failed, written ahead of the next tick's lines.
    unwritten: Mutex<Vec<String>>,
}

impl CompletionScheduler {
    pub fn new(store: Arc<JobStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            unwritten: Mutex::new(Vec::new()),
        }
    }

    /// Run one tick. Returns the jobs it completed.
    ///
    /// If the audit append fails, the lines are kept and retried on the next
    /// tick, before that tick's own lines.
    pub async fn tick(&self) -> Result<Vec<Job>, SchedulerError> {
        let completed = self.store.complete_pending_jobs().await?;

        let mut lines = self.unwritten.lock().await;
        if completed.is_empty() && lines.is_empty() {
            return Ok(completed);
        }

        let now = Utc::now();
        for job in &completed {
            let line = completion_line(now, job.id);
            info!("{line}");
            lines.push(line);
        }

        if let Err(e) = self.audit.append(&lines).await {
            warn!(backlog = lines.len(), "Audit lines kept for the next tick");
            return Err(SchedulerError::Audit(e));
        }
        lines.clear();

        Ok(completed)
    }

    /// Run one tick, logging instead of returning failures.
    pub async fn run_tick(&self) {
        if let Err(e) = self.tick().await {
            error!(error = %e, "Completion tick failed");
        }
    }
}

/// Spawn the scheduler loop. Each tick finishes before the next is considered.
pub fn spawn_completion_loop(
    scheduler: Arc<CompletionScheduler>,
    schedule: TickSchedule,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match schedule {
            TickSchedule::Interval(period) => {
                info!("Completion loop started (interval: {:?})", period);

                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // Skip immediate first tick
                ticker.tick().await;

                loop {
                    ticker.tick().await;
                    scheduler.run_tick().await;
                }
            }
            TickSchedule::Cron(schedule) => {
                info!("Completion loop started (cron: {})", schedule);

                let mut last = Utc::now();
                loop {
                    let Some(next) = schedule.after(&last).next() else {
                        warn!("Cron schedule has no upcoming fire times, stopping");
                        break;
                    };
                    let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                    tokio::time::sleep(wait).await;

                    scheduler.run_tick().await;

                    // Fire times missed while the tick ran are skipped.
                    last = next.max(Utc::now());
                }
            }
        }
    })
}
