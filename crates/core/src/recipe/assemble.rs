//! Builds runnable recipes from configuration.
//!
//! Multi-root storages expand into one registered storage per root; a
//! provider bound to such a storage is bound to every expanded name, while
//! a step output storage must expand to exactly one.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::audit::AuditHandle;
use crate::config::{Config, RecipeConfig, SampleSheetConfig, StepConfig};
use crate::discovery::DiscoveryRegistry;
use crate::ledger::RunLedger;
use crate::processor::ProcessorRegistry;
use crate::runconfig::{EmptyResolver, RunConfigResolver, SampleSheetResolver};
use crate::runid::DefaultRunIdPolicy;
use crate::storage::{expand_roots, StorageRef};

use super::{Recipe, RecipeError, Step};

const RESOLVER_EMPTY: &str = "empty";
const RESOLVER_SAMPLESHEET: &str = "illumina_samplesheet";

/// Builds every configured recipe, in declaration order.
pub fn build_recipes(
    config: &Config,
    discoveries: &DiscoveryRegistry,
    processors: &ProcessorRegistry,
    audit: Option<&AuditHandle>,
) -> Result<Vec<Recipe>, RecipeError> {
    config
        .recipes
        .iter()
        .map(|recipe| build_recipe(recipe, &config.daemon.var_dir, discoveries, processors, audit))
        .collect()
}

fn build_recipe(
    conf: &RecipeConfig,
    var_dir: &Path,
    discoveries: &DiscoveryRegistry,
    processors: &ProcessorRegistry,
    audit: Option<&AuditHandle>,
) -> Result<Recipe, RecipeError> {
    if conf.steps.is_empty() {
        return Err(RecipeError::NoSteps {
            name: conf.name.clone(),
        });
    }

    let mut recipe = Recipe::new(&conf.name).with_description(&conf.description);
    if let Some(audit) = audit {
        recipe = recipe.with_audit(audit.clone());
    }

    // declared storage name -> its expanded refs
    let mut expanded: HashMap<&str, Vec<StorageRef>> = HashMap::new();
    for storage in &conf.storages {
        let mut refs = expand_roots(&storage.name, &storage.roots, storage.technology);
        if let Some(sequencer) = &storage.sequencer {
            for r in &mut refs {
                r.sequencer = sequencer.clone();
            }
        }
        recipe.add_storages(refs.clone())?;
        expanded.insert(&storage.name, refs);
    }

    for provider in &conf.providers {
        let storages = expanded
            .get(provider.storage.as_str())
            .ok_or_else(|| RecipeError::unknown_storage(&provider.storage))?;
        for storage in storages {
            recipe.add_provider(
                &provider.name,
                &storage.name,
                provider.scan_in_progress,
                discoveries,
            )?;
        }
    }

    for step in &conf.steps {
        recipe.add_step(build_step(step, &conf.name, var_dir, &expanded, processors)?)?;
    }

    Ok(recipe)
}

fn build_step(
    conf: &StepConfig,
    recipe_name: &str,
    var_dir: &Path,
    expanded: &HashMap<&str, Vec<StorageRef>>,
    processors: &ProcessorRegistry,
) -> Result<Step, RecipeError> {
    let processor = processors
        .get(&conf.processor)
        .ok_or_else(|| RecipeError::unknown_processor(&conf.processor))?;

    let output = match expanded.get(conf.output_storage.as_str()) {
        None => return Err(RecipeError::unknown_storage(&conf.output_storage)),
        Some(refs) if refs.len() > 1 => {
            return Err(RecipeError::MultiRootOutput {
                step: conf.name.clone(),
                storage: conf.output_storage.clone(),
            });
        }
        Some(refs) => refs[0].clone(),
    };

    let resolver: Arc<dyn RunConfigResolver> = match conf.resolver.as_str() {
        RESOLVER_EMPTY => Arc::new(EmptyResolver::new()),
        RESOLVER_SAMPLESHEET => {
            let sheet = conf
                .samplesheet
                .as_ref()
                .ok_or_else(|| RecipeError::missing_sample_sheet(&conf.name))?;
            Arc::new(sample_sheet_resolver(sheet))
        }
        other => return Err(RecipeError::unknown_resolver(other)),
    };

    let policy = match &conf.run_id_template {
        Some(template) => DefaultRunIdPolicy::with_template(template),
        None => DefaultRunIdPolicy::new(),
    };

    let ledger = RunLedger::new(var_dir.join(format!("{recipe_name}-{}.done", conf.name)));

    let step = Step::new(
        &conf.name,
        processor,
        resolver,
        Arc::new(policy),
        output,
        ledger,
    );

    Ok(if conf.conf.is_empty() {
        step
    } else {
        step.with_conf(conf.conf.iter().collect())
    })
}

fn sample_sheet_resolver(conf: &SampleSheetConfig) -> SampleSheetResolver {
    let mut resolver = SampleSheetResolver::new(&conf.dir);
    if let Some(prefix) = &conf.prefix {
        resolver = resolver.with_prefix(prefix);
    }
    if let Some(extension) = &conf.extension {
        resolver = resolver.with_extension(extension);
    }
    if let Some(enabled) = conf.search_run_dir_first {
        resolver = resolver.with_search_run_dir_first(enabled);
    }
    resolver
}
