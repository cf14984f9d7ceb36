//! One processing stage over discovered runs.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::types::{RunDisposition, RunReport, SkipReason, StepReport};
use crate::audit::{AuditEvent, AuditHandle};
use crate::ledger::RunLedger;
use crate::metrics::{STEP_RUNS, STEP_RUN_DURATION};
use crate::processor::RunProcessor;
use crate::run::{RunHandle, RunId};
use crate::runconfig::{RunConfigResolver, RunConfiguration};
use crate::runid::RunIdPolicy;
use crate::storage::StorageRef;

/// Suffix of the per-run claim marker created in the output storage.
const CLAIM_SUFFIX: &str = ".lock";

/// A named processing stage: resolver, processor, run-id policy, output
/// storage, and its own run ledger.
///
/// The claim marker plus the post-claim ledger re-check guard against a
/// second orchestrator instance racing the same run; the marker lives
/// only for the duration of one attempt.
pub struct Step {
    name: String,
    processor: Arc<dyn RunProcessor>,
    resolver: Arc<dyn RunConfigResolver>,
    policy: Arc<dyn RunIdPolicy>,
    output_storage: StorageRef,
    ledger: RunLedger,
    conf: RunConfiguration,
}

impl Step {
    pub fn new(
        name: impl Into<String>,
        processor: Arc<dyn RunProcessor>,
        resolver: Arc<dyn RunConfigResolver>,
        policy: Arc<dyn RunIdPolicy>,
        output_storage: StorageRef,
        ledger: RunLedger,
    ) -> Self {
        Self {
            name: name.into(),
            processor,
            resolver,
            policy,
            output_storage,
            ledger,
            conf: RunConfiguration::new(),
        }
    }

    /// Step-local configuration merged under each run's resolved one.
    pub fn with_conf(mut self, conf: RunConfiguration) -> Self {
        self.conf = conf;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    pub fn output_storage(&self) -> &StorageRef {
        &self.output_storage
    }

    /// Walks every candidate through this step once.
    ///
    /// The ledger is loaded once up front; runs already recorded there are
    /// filtered silently and do not appear in the report.
    pub async fn process_all(
        &self,
        recipe: &str,
        candidates: &[RunHandle],
        audit: Option<&AuditHandle>,
    ) -> StepReport {
        let done: HashSet<RunId> = match self.ledger.load() {
            Ok(done) => done,
            Err(e) => {
                // Without the ledger nothing can be safely processed.
                warn!(recipe, step = %self.name, error = %e, "ledger unreadable, step idle this cycle");
                return StepReport {
                    step: self.name.clone(),
                    runs: candidates
                        .iter()
                        .map(|run| RunReport {
                            run_id: run.run_id.clone(),
                            disposition: RunDisposition::Failed {
                                error: e.to_string(),
                            },
                        })
                        .collect(),
                };
            }
        };

        let mut runs = Vec::new();
        for run in candidates {
            if done.contains(&run.run_id) {
                debug!(recipe, step = %self.name, run_id = %run.run_id, "already recorded");
                continue;
            }
            let disposition = self.process_run(recipe, run, audit).await;
            let result = match &disposition {
                RunDisposition::Processed { .. } => "processed",
                RunDisposition::Skipped { .. } => "skipped",
                RunDisposition::Failed { .. } => "failed",
            };
            STEP_RUNS
                .with_label_values(&[recipe, &self.name, result])
                .inc();
            runs.push(RunReport {
                run_id: run.run_id.clone(),
                disposition,
            });
        }

        StepReport {
            step: self.name.clone(),
            runs,
        }
    }

    async fn process_run(
        &self,
        recipe: &str,
        run: &RunHandle,
        audit: Option<&AuditHandle>,
    ) -> RunDisposition {
        let claim = self.claim_path(&run.run_id);
        match OpenOptions::new().write(true).create_new(true).open(&claim) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                debug!(recipe, step = %self.name, run_id = %run.run_id, "claim held elsewhere");
                return RunDisposition::Skipped {
                    reason: SkipReason::ClaimHeld,
                };
            }
            Err(e) => {
                warn!(recipe, step = %self.name, run_id = %run.run_id, error = %e, "cannot create claim marker");
                return RunDisposition::Failed {
                    error: format!("cannot create claim marker {}: {}", claim.display(), e),
                };
            }
        }
        if let Some(audit) = audit {
            audit
                .emit(AuditEvent::RunClaimed {
                    recipe: recipe.to_string(),
                    step: self.name.clone(),
                    run_id: run.run_id.to_string(),
                })
                .await;
        }

        let disposition = self.process_claimed(recipe, run, audit).await;
        self.release_claim(&claim);
        disposition
    }

    /// The run is claimed; run it through resolution, the processor, and
    /// the ledger. The caller releases the claim in every outcome.
    async fn process_claimed(
        &self,
        recipe: &str,
        run: &RunHandle,
        audit: Option<&AuditHandle>,
    ) -> RunDisposition {
        // Fresh ledger read: a concurrent instance may have recorded the
        // run between the cycle-start load and our claim.
        match self.ledger.contains(&run.run_id) {
            Ok(false) => {}
            Ok(true) => {
                debug!(recipe, step = %self.name, run_id = %run.run_id, "recorded since cycle start");
                return RunDisposition::Skipped {
                    reason: SkipReason::AlreadyRecorded,
                };
            }
            Err(e) => {
                return RunDisposition::Failed {
                    error: e.to_string(),
                }
            }
        }

        let resolved = match self.resolver.resolve(run).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(recipe, step = %self.name, run_id = %run.run_id, resolver = self.resolver.name(), error = %e, "run configuration resolution failed");
                if let Some(audit) = audit {
                    audit
                        .emit(AuditEvent::ConfigResolutionFailed {
                            recipe: recipe.to_string(),
                            step: self.name.clone(),
                            run_id: run.run_id.to_string(),
                            resolver: self.resolver.name().to_string(),
                            error: e.to_string(),
                        })
                        .await;
                }
                return RunDisposition::Failed {
                    error: e.to_string(),
                };
            }
        };

        let mut conf = self.conf.clone();
        conf.merge(&resolved);
        conf.set("step.name", &self.name);
        conf.set("output.storage", &self.output_storage.name);
        conf.set("output.technology", self.output_storage.technology.label());

        // A policy failure is a static misconfiguration; fail before the
        // processor touches anything.
        let output_run_id = match self.policy.output_run_id(&run.run_id, &conf) {
            Ok(id) => id,
            Err(e) => {
                return self
                    .fail_step(recipe, run, audit, format!("run id policy: {}", e))
                    .await;
            }
        };

        let started = Instant::now();
        match self.processor.process(run, &conf, &self.output_storage).await {
            Ok(outcome) => {
                if let Err(e) = self.ledger.add(&run.run_id) {
                    // Processed but unrecorded: the run will be retried,
                    // which idempotent processors must tolerate.
                    return self.fail_step(recipe, run, audit, e.to_string()).await;
                }
                let duration_ms = started.elapsed().as_millis() as u64;
                STEP_RUN_DURATION
                    .with_label_values(&[recipe, &self.name])
                    .observe(started.elapsed().as_secs_f64());
                info!(
                    recipe,
                    step = %self.name,
                    run_id = %run.run_id,
                    output_run_id = %output_run_id,
                    duration_ms,
                    "run processed and recorded"
                );
                if let Some(audit) = audit {
                    audit
                        .emit(AuditEvent::StepCompleted {
                            recipe: recipe.to_string(),
                            step: self.name.clone(),
                            run_id: run.run_id.to_string(),
                            output: outcome.output.as_ref().map(|p| p.display().to_string()),
                            duration_ms,
                        })
                        .await;
                    audit
                        .emit(AuditEvent::RunRecorded {
                            recipe: recipe.to_string(),
                            step: self.name.clone(),
                            run_id: run.run_id.to_string(),
                            output_run_id: output_run_id.to_string(),
                        })
                        .await;
                }
                RunDisposition::Processed {
                    output: outcome.output,
                }
            }
            Err(e) => self.fail_step(recipe, run, audit, e.to_string()).await,
        }
    }

    async fn fail_step(
        &self,
        recipe: &str,
        run: &RunHandle,
        audit: Option<&AuditHandle>,
        error: String,
    ) -> RunDisposition {
        warn!(recipe, step = %self.name, run_id = %run.run_id, error = %error, "step failed, run stays eligible for retry");
        if let Some(audit) = audit {
            audit
                .emit(AuditEvent::StepFailed {
                    recipe: recipe.to_string(),
                    step: self.name.clone(),
                    run_id: run.run_id.to_string(),
                    error: error.clone(),
                })
                .await;
        }
        RunDisposition::Failed { error }
    }

    fn claim_path(&self, run_id: &RunId) -> PathBuf {
        self.output_storage
            .entry_path(&format!("{}{}", run_id.as_str(), CLAIM_SUFFIX))
    }

    fn release_claim(&self, claim: &PathBuf) {
        match std::fs::remove_file(claim) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(step = %self.name, claim = %claim.display(), error = %e, "cannot remove claim marker");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{ProcessOutcome, ProcessorError};
    use crate::runconfig::{EmptyResolver, ResolverError};
    use crate::runid::DefaultRunIdPolicy;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const RUN: &str = "240115_NB500892_0123_AHABCDEFXX";

    struct RecordingProcessor {
        confs: Mutex<Vec<RunConfiguration>>,
        fail: bool,
    }

    impl RecordingProcessor {
        fn ok() -> Self {
            Self {
                confs: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                confs: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.confs.lock().unwrap().len()
        }

        fn last_conf(&self) -> RunConfiguration {
            self.confs.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl RunProcessor for RecordingProcessor {
        fn name(&self) -> &str {
            "recording"
        }

        async fn process(
            &self,
            run: &RunHandle,
            conf: &RunConfiguration,
            output: &StorageRef,
        ) -> Result<ProcessOutcome, ProcessorError> {
            self.confs.lock().unwrap().push(conf.clone());
            if self.fail {
                return Err(ProcessorError::input_missing(&run.run_id, &run.location));
            }
            Ok(ProcessOutcome::at(output.entry_path(run.run_id.as_str())))
        }
    }

    struct FailingResolver;

    #[async_trait]
    impl RunConfigResolver for FailingResolver {
        fn name(&self) -> &str {
            "failing"
        }

        async fn resolve(&self, run: &RunHandle) -> Result<RunConfiguration, ResolverError> {
            Err(ResolverError::not_found(&run.run_id, "no sheet"))
        }
    }

    struct Fixture {
        _input: TempDir,
        output: TempDir,
        var: TempDir,
        run: RunHandle,
    }

    fn fixture() -> Fixture {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let var = TempDir::new().unwrap();
        let storage = StorageRef::new("seq1", input.path());
        let location = input.path().join(RUN);
        std::fs::create_dir_all(&location).unwrap();
        let run = RunHandle::new(RunId::new(RUN), &storage, location, false);
        Fixture {
            _input: input,
            output,
            var,
            run,
        }
    }

    fn step_with(fx: &Fixture, processor: Arc<dyn RunProcessor>) -> Step {
        Step::new(
            "sync",
            processor,
            Arc::new(EmptyResolver::new()),
            Arc::new(DefaultRunIdPolicy::new()),
            StorageRef::new("work", fx.output.path()),
            RunLedger::new(fx.var.path().join("test-sync.done")),
        )
    }

    #[tokio::test]
    async fn test_successful_run_is_recorded() {
        let fx = fixture();
        let processor = Arc::new(RecordingProcessor::ok());
        let step = step_with(&fx, processor.clone());

        let report = step.process_all("hiseq", &[fx.run.clone()], None).await;

        assert_eq!(report.processed(), 1);
        assert_eq!(processor.calls(), 1);
        assert!(step.ledger().contains(&fx.run.run_id).unwrap());
        // Claim marker is gone after the attempt.
        assert!(!fx.output.path().join(format!("{RUN}.lock")).exists());
    }

    #[tokio::test]
    async fn test_recorded_run_is_filtered_silently() {
        let fx = fixture();
        let processor = Arc::new(RecordingProcessor::ok());
        let step = step_with(&fx, processor.clone());
        step.ledger().add(&fx.run.run_id).unwrap();

        let report = step.process_all("hiseq", &[fx.run.clone()], None).await;

        assert!(report.runs.is_empty());
        assert_eq!(processor.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_run_stays_out_of_ledger() {
        let fx = fixture();
        let processor = Arc::new(RecordingProcessor::failing());
        let step = step_with(&fx, processor.clone());

        let report = step.process_all("hiseq", &[fx.run.clone()], None).await;

        assert_eq!(report.failed(), 1);
        assert!(!step.ledger().contains(&fx.run.run_id).unwrap());
        assert!(!fx.output.path().join(format!("{RUN}.lock")).exists());

        // Retried on the next cycle.
        let report = step.process_all("hiseq", &[fx.run.clone()], None).await;
        assert_eq!(report.failed(), 1);
        assert_eq!(processor.calls(), 2);
    }

    #[tokio::test]
    async fn test_held_claim_skips_run() {
        let fx = fixture();
        let processor = Arc::new(RecordingProcessor::ok());
        let step = step_with(&fx, processor.clone());
        std::fs::write(fx.output.path().join(format!("{RUN}.lock")), "").unwrap();

        let report = step.process_all("hiseq", &[fx.run.clone()], None).await;

        assert_eq!(report.skipped(), 1);
        assert_eq!(processor.calls(), 0);
        assert!(!step.ledger().contains(&fx.run.run_id).unwrap());
        // A foreign claim is never removed.
        assert!(fx.output.path().join(format!("{RUN}.lock")).exists());
    }

    #[tokio::test]
    async fn test_resolver_failure_fails_only_that_run() {
        let fx = fixture();
        let processor = Arc::new(RecordingProcessor::ok());
        let step = Step::new(
            "sync",
            processor.clone(),
            Arc::new(FailingResolver),
            Arc::new(DefaultRunIdPolicy::new()),
            StorageRef::new("work", fx.output.path()),
            RunLedger::new(fx.var.path().join("test-sync.done")),
        );

        let report = step.process_all("hiseq", &[fx.run.clone()], None).await;

        assert_eq!(report.failed(), 1);
        assert_eq!(processor.calls(), 0);
        assert!(!fx.output.path().join(format!("{RUN}.lock")).exists());
    }

    #[tokio::test]
    async fn test_merged_conf_is_stamped() {
        let fx = fixture();
        let processor = Arc::new(RecordingProcessor::ok());
        let mut base = RunConfiguration::new();
        base.set("rsync.bwlimit", "10000");
        let step = step_with(&fx, processor.clone()).with_conf(base);

        step.process_all("hiseq", &[fx.run.clone()], None).await;

        let conf = processor.last_conf();
        assert_eq!(conf.get("rsync.bwlimit"), Some("10000"));
        assert_eq!(conf.get("step.name"), Some("sync"));
        assert_eq!(conf.get("output.storage"), Some("work"));
        assert_eq!(conf.get("output.technology"), Some("local"));
    }

    #[tokio::test]
    async fn test_bad_policy_template_fails_before_processing() {
        let fx = fixture();
        let processor = Arc::new(RecordingProcessor::ok());
        let step = Step::new(
            "sync",
            processor.clone(),
            Arc::new(EmptyResolver::new()),
            Arc::new(DefaultRunIdPolicy::with_template("${no.such.var}")),
            StorageRef::new("work", fx.output.path()),
            RunLedger::new(fx.var.path().join("test-sync.done")),
        );

        let report = step.process_all("hiseq", &[fx.run.clone()], None).await;

        assert_eq!(report.failed(), 1);
        assert_eq!(processor.calls(), 0);
        assert!(!step.ledger().contains(&fx.run.run_id).unwrap());
    }
}
