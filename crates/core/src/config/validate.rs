use std::collections::HashSet;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - poll interval and audit buffer are not 0
/// - at least one recipe, with unique names
/// - every recipe declares storages, providers and steps, uniquely named
/// - providers and steps reference declared storages
/// - step output storages have exactly one root
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.daemon.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "daemon.poll_interval_secs cannot be 0".to_string(),
        ));
    }
    if config.daemon.audit_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "daemon.audit_buffer cannot be 0".to_string(),
        ));
    }

    if config.recipes.is_empty() {
        return Err(ConfigError::ValidationError(
            "at least one [[recipe]] is required".to_string(),
        ));
    }

    let mut recipe_names = HashSet::new();
    for recipe in &config.recipes {
        if !recipe_names.insert(recipe.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate recipe name \"{}\"",
                recipe.name
            )));
        }
        validate_recipe(recipe)?;
    }

    Ok(())
}

fn validate_recipe(recipe: &super::RecipeConfig) -> Result<(), ConfigError> {
    let name = &recipe.name;

    if recipe.storages.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "recipe \"{name}\" declares no storages"
        )));
    }
    if recipe.providers.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "recipe \"{name}\" declares no providers"
        )));
    }
    if recipe.steps.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "recipe \"{name}\" declares no steps"
        )));
    }

    let mut storage_names = HashSet::new();
    for storage in &recipe.storages {
        if !storage_names.insert(storage.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "recipe \"{name}\": duplicate storage \"{}\"",
                storage.name
            )));
        }
        if storage.root_segments().is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "recipe \"{name}\": storage \"{}\" has no roots",
                storage.name
            )));
        }
    }

    for provider in &recipe.providers {
        if !storage_names.contains(provider.storage.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "recipe \"{name}\": provider \"{}\" references unknown storage \"{}\"",
                provider.name, provider.storage
            )));
        }
    }

    let mut step_names = HashSet::new();
    for step in &recipe.steps {
        if !step_names.insert(step.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "recipe \"{name}\": duplicate step \"{}\"",
                step.name
            )));
        }
        let output = recipe
            .storages
            .iter()
            .find(|s| s.name == step.output_storage);
        match output {
            None => {
                return Err(ConfigError::ValidationError(format!(
                    "recipe \"{name}\": step \"{}\" references unknown storage \"{}\"",
                    step.name, step.output_storage
                )));
            }
            Some(storage) if storage.root_segments().len() > 1 => {
                return Err(ConfigError::ValidationError(format!(
                    "recipe \"{name}\": step \"{}\" output storage \"{}\" must have a single root",
                    step.name, step.output_storage
                )));
            }
            Some(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::Config;

    fn config(toml: &str) -> Config {
        toml::from_str(toml).unwrap()
    }

    const VALID: &str = r#"
[[recipe]]
name = "sync"

[[recipe.storage]]
name = "bcl"
roots = "/mnt/a:/mnt/b"

[[recipe.storage]]
name = "work"
roots = "/data/work"

[[recipe.provider]]
name = "illumina_bcl"
storage = "bcl"

[[recipe.step]]
name = "sync"
processor = "rsync"
output_storage = "work"
"#;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&config(VALID)).is_ok());
    }

    #[test]
    fn test_validate_poll_interval_zero_fails() {
        let toml = format!("[daemon]\npoll_interval_secs = 0\n{VALID}");
        let result = validate_config(&config(&toml));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_no_recipes_fails() {
        let result = validate_config(&config(""));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_duplicate_recipe_name_fails() {
        let toml = format!("{VALID}\n{VALID}");
        let result = validate_config(&config(&toml));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("duplicate recipe name"));
    }

    #[test]
    fn test_validate_unknown_provider_storage_fails() {
        let toml = VALID.replace("storage = \"bcl\"", "storage = \"nope\"");
        let result = validate_config(&config(&toml));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("unknown storage \"nope\""));
    }

    #[test]
    fn test_validate_multi_root_output_fails() {
        let toml = VALID.replace("output_storage = \"work\"", "output_storage = \"bcl\"");
        let result = validate_config(&config(&toml));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("single root"));
    }

    #[test]
    fn test_validate_empty_roots_fails() {
        let toml = VALID.replace("roots = \"/data/work\"", "roots = \" : \"");
        let result = validate_config(&config(&toml));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("no roots"));
    }

    #[test]
    fn test_validate_missing_steps_fails() {
        let toml = r#"
[[recipe]]
name = "sync"

[[recipe.storage]]
name = "bcl"
roots = "/mnt/a"

[[recipe.provider]]
name = "illumina_bcl"
storage = "bcl"
"#;
        let result = validate_config(&config(toml));
        let err = result.unwrap_err();
        assert!(err.to_string().contains("no steps"));
    }
}
