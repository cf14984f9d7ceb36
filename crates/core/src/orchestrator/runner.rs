//! Poll-loop implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditHandle};
use crate::config::DaemonConfig;
use crate::lock::ExecutionLock;
use crate::metrics::{CYCLES_TOTAL, CYCLE_DURATION, STALE_LOCKS_REAPED};
use crate::recipe::Recipe;

use super::types::{CycleOutcome, OrchestratorError};

/// Drives recipes through repeated processing cycles.
///
/// One instance per daemon. The loop body is the same code path as
/// [`Orchestrator::run_cycle`], so single-shot invocations and the poll
/// loop cannot drift apart.
pub struct Orchestrator {
    recipes: Arc<Vec<Recipe>>,
    lock: ExecutionLock,
    poll_interval: Duration,
    max_consecutive_lock_failures: u32,
    audit: Option<AuditHandle>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Orchestrator {
    /// Create a new orchestrator from daemon configuration.
    pub fn new(config: &DaemonConfig, recipes: Vec<Recipe>, audit: Option<AuditHandle>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            recipes: Arc::new(recipes),
            lock: ExecutionLock::new(config.lock_path()),
            poll_interval: config.poll_interval(),
            max_consecutive_lock_failures: config.max_consecutive_lock_failures,
            audit,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the poll loop (spawns a background task).
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!(
            recipes = self.recipes.len(),
            interval_secs = self.poll_interval.as_secs(),
            "Starting orchestrator"
        );
        self.spawn_cycle_loop();
    }

    /// Stop the poll loop gracefully.
    ///
    /// A cycle already in flight finishes; only the next tick is cancelled.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping orchestrator");
        let _ = self.shutdown_tx.send(());

        // Give the loop a moment to observe the signal
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("Orchestrator stopped");
    }

    /// Run one cycle immediately, outside the poll loop.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, OrchestratorError> {
        Self::cycle(&self.recipes, &self.lock, self.audit.as_ref()).await
    }

    fn spawn_cycle_loop(&self) {
        let running = Arc::clone(&self.running);
        let recipes = Arc::clone(&self.recipes);
        let lock = self.lock.clone();
        let audit = self.audit.clone();
        let interval = self.poll_interval;
        let max_failures = self.max_consecutive_lock_failures;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("Cycle loop started");
            let mut consecutive_failures: u32 = 0;

            // Cycle first, sleep after: a freshly started daemon polls
            // immediately.
            loop {
                if !running.load(Ordering::Relaxed) {
                    break;
                }

                match Self::cycle(&recipes, &lock, audit.as_ref()).await {
                    Ok(_) => consecutive_failures = 0,
                    Err(e) => {
                        consecutive_failures += 1;
                        warn!(consecutive = consecutive_failures, "Cycle failed: {e}");
                        if max_failures > 0 && consecutive_failures >= max_failures {
                            error!(
                                "Giving up after {consecutive_failures} consecutive lock failures"
                            );
                            running.store(false, Ordering::SeqCst);
                            break;
                        }
                    }
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Cycle loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("Cycle loop stopped");
        });
    }

    async fn cycle(
        recipes: &[Recipe],
        lock: &ExecutionLock,
        audit: Option<&AuditHandle>,
    ) -> Result<CycleOutcome, OrchestratorError> {
        match Self::locked_cycle(recipes, lock, audit).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                CYCLES_TOTAL.with_label_values(&["failed"]).inc();
                Err(e)
            }
        }
    }

    /// One tick: reap a stale lock, take the lock, run every recipe,
    /// release the lock.
    async fn locked_cycle(
        recipes: &[Recipe],
        lock: &ExecutionLock,
        audit: Option<&AuditHandle>,
    ) -> Result<CycleOutcome, OrchestratorError> {
        let cycle_id = Uuid::new_v4().to_string();

        if lock.reap_if_stale()? {
            warn!(lock = %lock.path().display(), "Reaped stale execution lock");
            STALE_LOCKS_REAPED.inc();
            if let Some(audit) = audit {
                audit
                    .emit(AuditEvent::StaleLockReaped {
                        lock_path: lock.path().display().to_string(),
                    })
                    .await;
            }
        }

        if lock.is_locked() {
            info!(cycle_id, "Execution lock held by a live process, skipping cycle");
            CYCLES_TOTAL.with_label_values(&["skipped"]).inc();
            if let Some(audit) = audit {
                audit
                    .emit(AuditEvent::CycleSkipped {
                        cycle_id,
                        reason: "execution lock held".to_string(),
                    })
                    .await;
            }
            return Ok(CycleOutcome::Skipped);
        }

        lock.create()?;

        info!(cycle_id, recipes = recipes.len(), "Cycle started");
        if let Some(audit) = audit {
            audit
                .emit(AuditEvent::CycleStarted {
                    cycle_id: cycle_id.clone(),
                })
                .await;
        }

        let started = Instant::now();
        let mut reports = Vec::with_capacity(recipes.len());
        for recipe in recipes {
            reports.push(recipe.execute_cycle().await);
        }
        let outcome = CycleOutcome::Completed(reports);
        let elapsed = started.elapsed();

        CYCLES_TOTAL.with_label_values(&["completed"]).inc();
        CYCLE_DURATION
            .with_label_values(&[])
            .observe(elapsed.as_secs_f64());
        info!(
            cycle_id,
            runs_processed = outcome.processed(),
            runs_failed = outcome.failed(),
            duration_ms = elapsed.as_millis() as u64,
            "Cycle completed"
        );
        if let Some(audit) = audit {
            audit
                .emit(AuditEvent::CycleCompleted {
                    cycle_id,
                    runs_processed: outcome.processed(),
                    runs_failed: outcome.failed(),
                    duration_ms: elapsed.as_millis() as u64,
                })
                .await;
        }

        lock.unlock()?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{create_audit_system, AuditFilter, AuditStore, SqliteAuditStore};
    use std::fs;
    use tempfile::TempDir;

    fn daemon_config(dir: &TempDir) -> DaemonConfig {
        DaemonConfig {
            var_dir: dir.path().to_path_buf(),
            poll_interval_secs: 3600,
            ..DaemonConfig::default()
        }
    }

    #[tokio::test]
    async fn test_cycle_locks_and_unlocks() {
        let dir = TempDir::new().unwrap();
        let orch = Orchestrator::new(&daemon_config(&dir), vec![], None);

        let outcome = orch.run_cycle().await.unwrap();

        assert!(!outcome.was_skipped());
        assert!(!dir.path().join("flowline.lock").exists());
    }

    #[tokio::test]
    async fn test_live_lock_skips_cycle_and_stays() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("flowline.lock");
        // Our own PID is always alive, so this reads as a held lock.
        fs::write(&lock_path, std::process::id().to_string()).unwrap();

        let orch = Orchestrator::new(&daemon_config(&dir), vec![], None);
        let outcome = orch.run_cycle().await.unwrap();

        assert!(outcome.was_skipped());
        assert!(lock_path.exists());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_stale_lock_reaped_then_cycle_runs() {
        let dir = TempDir::new().unwrap();
        let lock_path = dir.path().join("flowline.lock");
        // Above PID_MAX_LIMIT, never a live process.
        fs::write(&lock_path, "3999999999").unwrap();

        let orch = Orchestrator::new(&daemon_config(&dir), vec![], None);
        let outcome = orch.run_cycle().await.unwrap();

        assert!(!outcome.was_skipped());
        assert!(!lock_path.exists());
    }

    #[tokio::test]
    async fn test_cycle_events_journaled() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteAuditStore::in_memory().unwrap());
        let (handle, writer) = create_audit_system(store.clone(), 16);
        let writer_task = tokio::spawn(writer.run());

        let orch = Orchestrator::new(&daemon_config(&dir), vec![], Some(handle));
        orch.run_cycle().await.unwrap();

        drop(orch);
        writer_task.await.unwrap();

        let records = store.query(&AuditFilter::new()).unwrap();
        let types: Vec<&str> = records.iter().map(|r| r.event_type.as_str()).collect();
        assert!(types.contains(&"cycle_started"));
        assert!(types.contains(&"cycle_completed"));
        assert!(!types.contains(&"cycle_skipped"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_stale_reap_journaled() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("flowline.lock"), "3999999999").unwrap();

        let store = Arc::new(SqliteAuditStore::in_memory().unwrap());
        let (handle, writer) = create_audit_system(store.clone(), 16);
        let writer_task = tokio::spawn(writer.run());

        let orch = Orchestrator::new(&daemon_config(&dir), vec![], Some(handle));
        orch.run_cycle().await.unwrap();

        drop(orch);
        writer_task.await.unwrap();

        let records = store
            .query(&AuditFilter::new().with_event_type("stale_lock_reaped"))
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let dir = TempDir::new().unwrap();
        let orch = Orchestrator::new(&daemon_config(&dir), vec![], None);

        assert!(!orch.is_running());
        orch.start();
        assert!(orch.is_running());

        // Double start is a warning, not an error.
        orch.start();
        assert!(orch.is_running());

        orch.stop().await;
        assert!(!orch.is_running());

        // Double stop likewise.
        orch.stop().await;
    }
}
