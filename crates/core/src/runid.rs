//! Run-id assignment policy.
//!
//! When a step produces output data, the id of the produced run is derived
//! from the input run id through a policy. The default policy evaluates a
//! template with `${variable}` placeholders against the merged step + run
//! configuration, with `original.run.id` always bound to the input id.

use thiserror::Error;

use crate::run::RunId;
use crate::runconfig::RunConfiguration;

/// Variable implicitly bound to the input run id.
pub const ORIGINAL_RUN_ID_VAR: &str = "original.run.id";

const DEFAULT_TEMPLATE: &str = "${original.run.id}";

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("unknown variable ${{{variable}}} in run id template {template:?}")]
    UnknownVariable { template: String, variable: String },

    #[error("malformed run id template {template:?}: {detail}")]
    Malformed { template: String, detail: String },

    #[error("run id template {template:?} produced an empty id")]
    EmptyResult { template: String },
}

/// Policy computing the output run id of a step.
pub trait RunIdPolicy: Send + Sync {
    fn name(&self) -> &str;

    fn output_run_id(
        &self,
        original: &RunId,
        conf: &RunConfiguration,
    ) -> Result<RunId, PolicyError>;
}

/// Template-based policy; the default template echoes the input id.
#[derive(Debug, Clone)]
pub struct DefaultRunIdPolicy {
    template: String,
}

impl DefaultRunIdPolicy {
    pub fn new() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    fn malformed(&self, detail: &str) -> PolicyError {
        PolicyError::Malformed {
            template: self.template.clone(),
            detail: detail.to_string(),
        }
    }
}

impl Default for DefaultRunIdPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RunIdPolicy for DefaultRunIdPolicy {
    fn name(&self) -> &str {
        "template"
    }

    fn output_run_id(
        &self,
        original: &RunId,
        conf: &RunConfiguration,
    ) -> Result<RunId, PolicyError> {
        let mut result = String::new();
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '$' {
                result.push(c);
                continue;
            }

            match chars.next() {
                Some('{') => {}
                _ => return Err(self.malformed("'$' not followed by '{'")),
            }

            let mut variable = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => variable.push(c),
                    None => return Err(self.malformed("unterminated '${'")),
                }
            }

            if variable == ORIGINAL_RUN_ID_VAR {
                result.push_str(original.as_str());
            } else if let Some(value) = conf.get(&variable) {
                result.push_str(value);
            } else {
                return Err(PolicyError::UnknownVariable {
                    template: self.template.clone(),
                    variable,
                });
            }
        }

        if result.trim().is_empty() {
            return Err(PolicyError::EmptyResult {
                template: self.template.clone(),
            });
        }

        Ok(RunId::new(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RunId {
        RunId::new("240115_NB500892_0123_AHABCDEFXX")
    }

    #[test]
    fn test_default_template_echoes_input() {
        let policy = DefaultRunIdPolicy::new();
        let out = policy
            .output_run_id(&run(), &RunConfiguration::new())
            .unwrap();
        assert_eq!(out, run());
    }

    #[test]
    fn test_literal_text_around_placeholder() {
        let policy = DefaultRunIdPolicy::with_template("${original.run.id}-fastq");
        let out = policy
            .output_run_id(&run(), &RunConfiguration::new())
            .unwrap();
        assert_eq!(out.as_str(), "240115_NB500892_0123_AHABCDEFXX-fastq");
    }

    #[test]
    fn test_variable_from_configuration() {
        let conf: RunConfiguration = [("suffix", "qc")].into_iter().collect();
        let policy = DefaultRunIdPolicy::with_template("${original.run.id}_${suffix}");
        let out = policy.output_run_id(&run(), &conf).unwrap();
        assert_eq!(out.as_str(), "240115_NB500892_0123_AHABCDEFXX_qc");
    }

    #[test]
    fn test_unknown_variable_fails() {
        let policy = DefaultRunIdPolicy::with_template("${nope}");
        let err = policy
            .output_run_id(&run(), &RunConfiguration::new())
            .unwrap_err();
        assert!(matches!(
            err,
            PolicyError::UnknownVariable { variable, .. } if variable == "nope"
        ));
    }

    #[test]
    fn test_malformed_templates_fail() {
        for template in ["$x", "tail$", "${open"] {
            let err = DefaultRunIdPolicy::with_template(template)
                .output_run_id(&run(), &RunConfiguration::new())
                .unwrap_err();
            assert!(matches!(err, PolicyError::Malformed { .. }), "{template}");
        }
    }

    #[test]
    fn test_empty_result_fails() {
        let conf: RunConfiguration = [("blank", "")].into_iter().collect();
        let err = DefaultRunIdPolicy::with_template("${blank}")
            .output_run_id(&run(), &conf)
            .unwrap_err();
        assert!(matches!(err, PolicyError::EmptyResult { .. }));
    }
}
