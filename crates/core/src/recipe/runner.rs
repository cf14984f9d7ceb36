//! Recipe assembly and cycle execution.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::registry::StorageRegistry;
use super::step::Step;
use super::types::{CycleReport, DiscoveryFailure, RecipeError};
use crate::audit::{AuditEvent, AuditHandle};
use crate::discovery::{DiscoveryRegistry, RunDiscovery};
use crate::metrics::DISCOVERY_ERRORS;
use crate::run::{RunHandle, RunId};
use crate::storage::StorageRef;

/// One discovery provider bound to one storage within a recipe.
pub struct ProviderBinding {
    discovery: Arc<dyn RunDiscovery>,
    scan_in_progress: bool,
}

impl ProviderBinding {
    pub fn provider_name(&self) -> &str {
        self.discovery.name()
    }

    pub fn storage_name(&self) -> &str {
        &self.discovery.storage().name
    }

    pub fn scan_in_progress(&self) -> bool {
        self.scan_in_progress
    }
}

/// Named storages, discovery bindings, and an ordered step list.
///
/// Built once at startup from configuration; `execute_cycle` is the only
/// runtime entry point. Step order is composition order, so a sync step
/// placed before a demux step sees the same candidate list first.
pub struct Recipe {
    name: String,
    description: String,
    storages: StorageRegistry,
    providers: Vec<ProviderBinding>,
    steps: Vec<Step>,
    audit: Option<AuditHandle>,
}

impl std::fmt::Debug for Recipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recipe")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("storages", &self.storages)
            .field("providers", &self.providers.len())
            .field("steps", &self.steps.len())
            .field("audit", &self.audit.is_some())
            .finish()
    }
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            storages: StorageRegistry::new(),
            providers: Vec::new(),
            steps: Vec::new(),
            audit: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_audit(mut self, audit: AuditHandle) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn storages(&self) -> &StorageRegistry {
        &self.storages
    }

    pub fn providers(&self) -> &[ProviderBinding] {
        &self.providers
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn add_storage(&mut self, storage: StorageRef) -> Result<(), RecipeError> {
        self.storages.register(storage)
    }

    /// Registers every storage of a multi-root expansion.
    pub fn add_storages(&mut self, storages: Vec<StorageRef>) -> Result<(), RecipeError> {
        for storage in storages {
            self.storages.register(storage)?;
        }
        Ok(())
    }

    /// Binds a discovery provider to a registered storage.
    ///
    /// `scan_in_progress` selects which listing feeds the steps: live-sync
    /// recipes watch in-progress runs, everything downstream watches
    /// completed ones.
    pub fn add_provider(
        &mut self,
        provider_name: &str,
        storage_name: &str,
        scan_in_progress: bool,
        discoveries: &DiscoveryRegistry,
    ) -> Result<(), RecipeError> {
        let storage = self
            .storages
            .get(storage_name)
            .ok_or_else(|| RecipeError::unknown_storage(storage_name))?
            .clone();
        let discovery = discoveries
            .create(provider_name, storage)
            .ok_or_else(|| RecipeError::unknown_provider(provider_name))?;
        if !discovery.can_provide() {
            return Err(RecipeError::ProviderUnavailable {
                provider: provider_name.to_string(),
                storage: storage_name.to_string(),
            });
        }
        self.providers.push(ProviderBinding {
            discovery,
            scan_in_progress,
        });
        Ok(())
    }

    pub fn add_step(&mut self, step: Step) -> Result<(), RecipeError> {
        if self.steps.iter().any(|s| s.name() == step.name()) {
            return Err(RecipeError::duplicate_step(step.name()));
        }
        self.steps.push(step);
        Ok(())
    }

    /// Lists candidates across every binding, deduplicated by run id.
    ///
    /// The first storage to list a run id wins; later sightings of the
    /// same id are dropped. An unavailable storage contributes nothing
    /// this cycle but is reported, never treated as an empty listing.
    async fn discover(&self) -> (Vec<RunHandle>, Vec<DiscoveryFailure>) {
        let mut seen: HashSet<RunId> = HashSet::new();
        let mut candidates = Vec::new();
        let mut failures = Vec::new();

        for binding in &self.providers {
            let listing = if binding.scan_in_progress {
                binding.discovery.list_in_progress().await
            } else {
                binding.discovery.list_completed().await
            };
            match listing {
                Ok(runs) => {
                    for run in runs {
                        if seen.insert(run.run_id.clone()) {
                            candidates.push(run);
                        } else {
                            debug!(
                                recipe = %self.name,
                                run_id = %run.run_id,
                                storage = %run.storage.name,
                                "duplicate run id, first listing wins"
                            );
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        recipe = %self.name,
                        provider = binding.provider_name(),
                        storage = binding.storage_name(),
                        error = %e,
                        "storage unavailable this cycle"
                    );
                    DISCOVERY_ERRORS
                        .with_label_values(&[&self.name, binding.provider_name()])
                        .inc();
                    failures.push(DiscoveryFailure {
                        provider: binding.provider_name().to_string(),
                        storage: binding.storage_name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        (candidates, failures)
    }

    /// Runs one full poll cycle: discovery, then every step in order.
    pub async fn execute_cycle(&self) -> CycleReport {
        let (candidates, unavailable) = self.discover().await;

        if let Some(audit) = &self.audit {
            for failure in &unavailable {
                audit
                    .emit(AuditEvent::DiscoveryUnavailable {
                        recipe: self.name.clone(),
                        provider: failure.provider.clone(),
                        storage: failure.storage.clone(),
                        error: failure.error.clone(),
                    })
                    .await;
            }
        }

        debug!(
            recipe = %self.name,
            discovered = candidates.len(),
            unavailable = unavailable.len(),
            "discovery pass finished"
        );

        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let report = step
                .process_all(&self.name, &candidates, self.audit.as_ref())
                .await;
            steps.push(report);
        }

        let report = CycleReport {
            recipe: self.name.clone(),
            discovered: candidates.len(),
            unavailable,
            steps,
        };
        if report.processed() > 0 || report.failed() > 0 {
            info!(
                recipe = %self.name,
                processed = report.processed(),
                failed = report.failed(),
                "cycle finished"
            );
        }
        report
    }
}
