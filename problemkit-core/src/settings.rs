use std::{fs, path::Path, time::Duration};

use serde_derive::{Deserialize, Serialize};

use crate::error::CoreError;

pub const PROBLEM_YAML: &str = "problem.yaml";

/// When `--table` is set, the number of identical verdict profiles needed
/// before they are flagged as a group.
pub const DEFAULT_TABLE_THRESHOLD: usize = 4;

pub const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationMode {
    #[default]
    #[serde(rename = "default")]
    Default,
    #[serde(rename = "custom")]
    Custom,
    #[serde(rename = "custom interactive")]
    CustomInteractive,
}

/// The subset of [`Settings`] the default output validator looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CompareSettings {
    pub case_sensitive: bool,
    pub space_change_sensitive: bool,
    pub floatabs: Option<f64>,
    pub floatrel: Option<f64>,
}

impl CompareSettings {
    pub fn has_float_tolerance(&self) -> bool {
        self.floatabs.is_some() || self.floatrel.is_some()
    }
}

/// Problem settings from `problem.yaml`, merged with the options of the
/// current invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds.
    pub timelimit: f64,
    pub validation: ValidationMode,
    pub validator_flags: Option<String>,
    pub case_sensitive: bool,
    pub space_change_sensitive: bool,
    pub floatabs: Option<f64>,
    pub floatrel: Option<f64>,

    #[serde(skip)]
    pub lazy: bool,
    #[serde(skip)]
    pub table: bool,
    #[serde(skip)]
    pub table_threshold: usize,
    #[serde(skip)]
    pub force: bool,
    #[serde(skip)]
    pub samples: bool,
    /// Explicit submissions to run, relative to the problem directory.
    #[serde(skip)]
    pub submissions: Vec<String>,
    /// Submission used to produce answers, relative to the problem directory.
    #[serde(skip)]
    pub submission: Option<String>,
    #[serde(skip)]
    pub jobs: usize,
    #[serde(skip)]
    pub verbose: u8,
    /// Wall clock limit of a single generator run.
    #[serde(skip)]
    pub generator_timeout: Duration,
    /// Path of the checktestdata binary.
    #[serde(skip)]
    pub checktestdata: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timelimit: 1.0,
            validation: ValidationMode::Default,
            validator_flags: None,
            case_sensitive: false,
            space_change_sensitive: false,
            floatabs: None,
            floatrel: None,
            lazy: true,
            table: false,
            table_threshold: DEFAULT_TABLE_THRESHOLD,
            force: false,
            samples: false,
            submissions: vec![],
            submission: None,
            jobs: default_jobs(),
            verbose: 0,
            generator_timeout: DEFAULT_GENERATOR_TIMEOUT,
            checktestdata: None,
        }
    }
}

pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Settings {
    /// Read `problem.yaml` from the problem directory. A missing file gives
    /// the defaults.
    pub fn load(problem_dir: &Path) -> Result<Self, CoreError> {
        let yaml_path = problem_dir.join(PROBLEM_YAML);
        let mut settings = if yaml_path.is_file() {
            let content = fs::read_to_string(&yaml_path)?;
            if content.trim().is_empty() {
                Settings::default()
            } else {
                serde_yaml::from_str::<Settings>(&content)?
            }
        } else {
            log::debug!("{:?} not found, using default settings", yaml_path);
            Settings::default()
        };
        settings.apply_validator_flags()?;
        settings.time_limit()?;
        log::debug!("loaded settings: {:?}", settings);
        Ok(settings)
    }

    /// Fold `validator_flags` into the typed comparison fields.
    pub fn apply_validator_flags(&mut self) -> Result<(), CoreError> {
        let flags = match &self.validator_flags {
            Some(flags) => flags.clone(),
            None => return Ok(()),
        };
        let mut tokens = flags.split_whitespace();
        while let Some(flag) = tokens.next() {
            match flag {
                "case_sensitive" => self.case_sensitive = true,
                "space_change_sensitive" => self.space_change_sensitive = true,
                "float_absolute_tolerance" => {
                    self.floatabs = Some(parse_tolerance(flag, tokens.next())?)
                }
                "float_relative_tolerance" => {
                    self.floatrel = Some(parse_tolerance(flag, tokens.next())?)
                }
                "float_tolerance" => {
                    let tolerance = parse_tolerance(flag, tokens.next())?;
                    self.floatabs = Some(tolerance);
                    self.floatrel = Some(tolerance);
                }
                other => log::debug!("ignoring validator flag {}", other),
            }
        }
        Ok(())
    }

    /// `timelimit` as a duration. Negative values count as zero; values too
    /// large for a `Duration` are an error.
    pub fn time_limit(&self) -> Result<Duration, CoreError> {
        Duration::try_from_secs_f64(self.timelimit.max(0.0)).map_err(|e| {
            CoreError::AnyhowError(anyhow::anyhow!("timelimit {}: {}", self.timelimit, e))
        })
    }

    pub fn compare_settings(&self) -> CompareSettings {
        CompareSettings {
            case_sensitive: self.case_sensitive,
            space_change_sensitive: self.space_change_sensitive,
            floatabs: self.floatabs,
            floatrel: self.floatrel,
        }
    }

    /// Flags handed to custom output validators.
    pub fn validator_flag_args(&self) -> Vec<String> {
        let mut flags = vec![];
        if self.space_change_sensitive {
            flags.push("space_change_sensitive".to_owned());
        }
        if self.case_sensitive {
            flags.push("case_sensitive".to_owned());
        }
        flags
    }
}

fn parse_tolerance(flag: &str, value: Option<&str>) -> Result<f64, CoreError> {
    let value = value.ok_or_else(|| anyhow::anyhow!("{} needs a value", flag))?;
    value
        .parse::<f64>()
        .map_err(|e| CoreError::AnyhowError(anyhow::anyhow!("{} {}: {}", flag, value, e)))
}

#[cfg(test)]
pub mod settings_tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.timelimit, 1.0);
        assert_eq!(settings.validation, ValidationMode::Default);
        assert!(settings.lazy);
        assert!(!settings.compare_settings().has_float_tolerance());
    }

    #[test]
    fn test_parse_problem_yaml() {
        let mut settings: Settings = serde_yaml::from_str(
            "name: Hello\ntimelimit: 2\nvalidation: custom interactive\n\
             validator_flags: case_sensitive float_tolerance 1e-6\n",
        )
        .unwrap();
        settings.apply_validator_flags().unwrap();
        assert_eq!(settings.timelimit, 2.0);
        assert_eq!(settings.validation, ValidationMode::CustomInteractive);
        assert!(settings.case_sensitive);
        assert!(!settings.space_change_sensitive);
        assert_eq!(settings.floatabs, Some(1e-6));
        assert_eq!(settings.floatrel, Some(1e-6));
    }

    #[test]
    fn test_separate_tolerances() {
        let mut settings = Settings {
            validator_flags: Some(
                "float_absolute_tolerance 0.5 space_change_sensitive float_relative_tolerance 0.01"
                    .to_owned(),
            ),
            ..Default::default()
        };
        settings.apply_validator_flags().unwrap();
        assert_eq!(settings.floatabs, Some(0.5));
        assert_eq!(settings.floatrel, Some(0.01));
        assert!(settings.space_change_sensitive);
        assert_eq!(
            settings.validator_flag_args(),
            vec!["space_change_sensitive".to_owned()]
        );
    }

    #[test]
    fn test_unrepresentable_time_limit() {
        let settings: Settings = serde_yaml::from_str("timelimit: .inf\n").unwrap();
        assert!(settings.time_limit().is_err());
        let settings = Settings {
            timelimit: -3.0,
            ..Default::default()
        };
        assert_eq!(settings.time_limit().unwrap(), Duration::ZERO);

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(PROBLEM_YAML), "timelimit: 1e300\n").unwrap();
        assert!(Settings::load(dir.path()).is_err());
    }

    #[test]
    fn test_missing_tolerance_value() {
        let mut settings = Settings {
            validator_flags: Some("float_tolerance".to_owned()),
            ..Default::default()
        };
        assert!(settings.apply_validator_flags().is_err());
    }
}
