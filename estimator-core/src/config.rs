use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ids::ProjectId;
use crate::time_material::{ProjectSettings, YearSpan};

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api";

pub const API_URL_VAR: &str = "ESTIMATOR_API_URL";
pub const PROJECT_ID_VAR: &str = "ESTIMATOR_PROJECT_ID";
pub const MARGIN_GOAL_VAR: &str = "ESTIMATOR_MARGIN_GOAL";

/// Client configuration: TOML file first, then environment overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    pub project_id: Option<String>,
    pub default_margin_goal: f64,
    /// `YYYY-MM-DD` or RFC 3339.
    pub project_start: Option<String>,
    pub project_end: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            project_id: None,
            default_margin_goal: 0.0,
            project_start: None,
            project_end: None,
        }
    }
}

impl ClientConfig {
    /// Read `path` if given, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_env_overrides(&Self::env_values())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    fn env_values() -> HashMap<String, String> {
        [API_URL_VAR, PROJECT_ID_VAR, MARGIN_GOAL_VAR]
            .into_iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Apply overrides from `values`; empty values are ignored.
    pub fn with_env_overrides(mut self, values: &HashMap<String, String>) -> Result<Self> {
        fn read<'a>(values: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
            values
                .get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        }

        if let Some(url) = read(values, API_URL_VAR) {
            self.api_url = url.to_string();
        }
        if let Some(project) = read(values, PROJECT_ID_VAR) {
            self.project_id = Some(project.to_string());
        }
        if let Some(margin) = read(values, MARGIN_GOAL_VAR) {
            self.default_margin_goal = margin
                .parse()
                .with_context(|| format!("{} must be a number, got '{}'", MARGIN_GOAL_VAR, margin))?;
        }
        Ok(self)
    }

    pub fn year_span(&self) -> YearSpan {
        YearSpan::parse(self.project_start.as_deref(), self.project_end.as_deref())
    }

    pub fn project_settings(&self) -> ProjectSettings {
        ProjectSettings {
            span: self.year_span(),
            default_margin_goal: self.default_margin_goal,
        }
    }

    pub fn project_id(&self) -> Result<ProjectId> {
        let raw = self
            .project_id
            .as_deref()
            .ok_or_else(|| anyhow!("no project configured; set project_id or {}", PROJECT_ID_VAR))?;
        let project = ProjectId::new(raw);
        if !project.is_well_formed() {
            return Err(anyhow!("project id '{}' is not well-formed", raw));
        }
        Ok(project)
    }
}
