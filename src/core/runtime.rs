//! Scheduler: fixed-interval trading cycles and a once-daily summary
//!
//! Both triggers share one coordinator behind a mutex, so a daily run never
//! interleaves with a trading cycle. The first error from either trigger
//! stops the scheduler and is returned to the caller.

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, TimeZone, Utc};
use tokio::signal;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{error, info};

use crate::config::constants::{cycle_interval, daily_summary_hour};
use crate::core::coordinator::CycleCoordinator;
use crate::error::Result;

pub type SharedCoordinator = Arc<Mutex<CycleCoordinator>>;

/// Time left until the next `hour:00` UTC strictly after `now`
pub fn until_next_daily_run(now: DateTime<Utc>, hour: u32) -> Duration {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or_default();
    let mut next = Utc.from_utc_datetime(&now.date_naive().and_time(at));
    if next <= now {
        next += ChronoDuration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Interval trigger; returns on shutdown or on the first failed cycle
pub async fn cycle_task(
    coordinator: SharedCoordinator,
    period: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = period.as_secs(), "Cycle task started");

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Cycle task shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                let mut coordinator = coordinator.lock().await;
                coordinator.run_cycle().await?;
            }
        }
    }
}

/// Daily trigger at `hour:00` UTC
pub async fn daily_task(
    coordinator: SharedCoordinator,
    hour: u32,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    info!(hour_utc = hour, "Daily task started");
    loop {
        let wait = until_next_daily_run(Utc::now(), hour);
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Daily task shutting down");
                return Ok(());
            }
            _ = sleep(wait) => {
                let mut coordinator = coordinator.lock().await;
                coordinator.run_daily().await?;
            }
        }
    }
}

/// Run both triggers until Ctrl+C or the first fatal error
pub async fn run(coordinator: CycleCoordinator) -> Result<()> {
    let coordinator: SharedCoordinator = Arc::new(Mutex::new(coordinator));
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("[SHUTDOWN] Graceful shutdown initiated");
                let _ = shutdown_signal.send(());
            }
            Err(err) => error!(error = %err, "Failed to listen for Ctrl+C signal"),
        }
    });

    let mut cycles = tokio::spawn(cycle_task(
        coordinator.clone(),
        cycle_interval(),
        shutdown_tx.subscribe(),
    ));
    let mut daily = tokio::spawn(daily_task(
        coordinator,
        daily_summary_hour(),
        shutdown_tx.subscribe(),
    ));

    let first = tokio::select! {
        res = &mut cycles => res,
        res = &mut daily => res,
    };
    let _ = shutdown_tx.send(());
    let outcome = first.map_err(std::io::Error::from)?;

    // Let the other trigger finish its current run before returning
    let _ = cycles.await;
    let _ = daily.await;
    outcome
}
