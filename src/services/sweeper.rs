use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tokio::time::MissedTickBehavior;

use crate::db::queries;
use crate::models::{Booking, BookingStatus, PaymentStatus};
use crate::services::lifecycle;

const MAX_REPORTED_CODES: usize = 20;
const DEFAULT_BATCH_LIMIT: i64 = 500;

#[derive(Debug, Clone)]
pub struct SweepParams {
    pub now: DateTime<Utc>,
    pub dry_run: bool,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub cancelled: usize,
    pub skipped: usize,
    pub failed: usize,
    pub dry_run: bool,
    pub candidate_codes: Vec<String>,
    pub cancelled_codes: Vec<String>,
}

/// Holds the single-run flag; released on drop, including when a pass panics.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Cancels pending bookings that were never paid within the timeout,
/// measured from creation.
pub struct Sweeper {
    db: Arc<Mutex<Connection>>,
    timeout: chrono::Duration,
    running: AtomicBool,
}

impl Sweeper {
    pub fn new(db: Arc<Mutex<Connection>>, timeout: chrono::Duration) -> Self {
        Self {
            db,
            timeout,
            running: AtomicBool::new(false),
        }
    }

    pub fn timeout(&self) -> chrono::Duration {
        self.timeout
    }

    /// Runs one pass. Returns `Ok(None)` if a pass is already in progress in
    /// this process.
    pub fn run(&self, params: SweepParams) -> anyhow::Result<Option<SweepReport>> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::info!("sweep: previous pass still running, skipping");
            return Ok(None);
        };
        self.sweep(&params).map(Some)
    }

    fn sweep(&self, params: &SweepParams) -> anyhow::Result<SweepReport> {
        let cutoff = params.now - self.timeout;
        let limit = params
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_BATCH_LIMIT);

        let candidates = {
            let db = self.lock()?;
            queries::list_expired_unpaid(&db, &cutoff, limit)?
        };

        let mut report = SweepReport {
            scanned: candidates.len(),
            dry_run: params.dry_run,
            ..Default::default()
        };

        for booking in candidates {
            if report.candidate_codes.len() < MAX_REPORTED_CODES {
                report.candidate_codes.push(booking.booking_code.clone());
            }
            if params.dry_run {
                continue;
            }

            let code = booking.booking_code.clone();
            match self.expire_one(booking, params.now) {
                Ok(true) => {
                    report.cancelled += 1;
                    if report.cancelled_codes.len() < MAX_REPORTED_CODES {
                        report.cancelled_codes.push(code);
                    }
                }
                Ok(false) => {
                    tracing::info!(booking_code = %code, "sweep: booking changed since selection, left as is");
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(booking_code = %code, error = %e, "sweep: failed to expire booking");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            cancelled = report.cancelled,
            skipped = report.skipped,
            failed = report.failed,
            dry_run = report.dry_run,
            "sweep: completed"
        );
        Ok(report)
    }

    /// Cancel one selected booking. The write only lands if it is still
    /// pending and unpaid, so a payment recorded after selection wins.
    fn expire_one(&self, mut booking: Booking, now: DateTime<Utc>) -> anyhow::Result<bool> {
        let elapsed = (now - booking.created_at).num_minutes();
        let reason = format!(
            "payment not received within {} minutes of booking (created {} minutes ago)",
            self.timeout.num_minutes(),
            elapsed
        );
        lifecycle::transition(&mut booking, BookingStatus::Cancelled, now, Some(reason))?;

        let db = self.lock()?;
        queries::update_booking_guarded(&db, &booking, BookingStatus::Pending, PaymentStatus::Unpaid)
    }

    pub async fn run_forever(self: Arc<Self>, interval: Duration) {
        tracing::info!(
            interval_secs = interval.as_secs(),
            timeout_minutes = self.timeout.num_minutes(),
            "sweep: loop started"
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let sweeper = Arc::clone(&self);
            let pass = tokio::task::spawn_blocking(move || {
                sweeper.run(SweepParams {
                    now: Utc::now(),
                    dry_run: false,
                    limit: None,
                })
            })
            .await;

            match pass {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "sweep: pass failed"),
                Err(e) => tracing::error!(error = %e, "sweep: task panicked"),
            }
        }
    }

    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| anyhow!("database mutex poisoned"))
    }
}
