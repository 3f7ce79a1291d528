use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::error::{ConnectorError, ConnectorResult};

pub const CONTROLLER_SECRET_KEY: &str = "DC_CONTROLLER_SECRET";
pub const DB_PASSWORD_KEY: &str = "DB_PASSWORD";

/// Credentials kept out of the versioned YAML config.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secrets {
    pub controller_secret: Option<String>,
    pub db_password: Option<String>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(v: &Option<String>) -> &'static str {
            if v.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("Secrets")
            .field("controller_secret", &redact(&self.controller_secret))
            .field("db_password", &redact(&self.db_password))
            .finish()
    }
}

impl Secrets {
    /// Read secrets from `env_file` (dotenv format), falling back to the
    /// process environment for keys the file does not set.
    pub fn load(env_file: Option<&Path>) -> ConnectorResult<Self> {
        let file_vars = match env_file {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };
        Ok(Self::resolve(&file_vars, |key| std::env::var(key).ok()))
    }

    fn resolve(file_vars: &HashMap<String, String>, env: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |key: &str| {
            file_vars
                .get(key)
                .cloned()
                .or_else(|| env(key))
                .filter(|v| !v.trim().is_empty())
        };
        Self {
            controller_secret: lookup(CONTROLLER_SECRET_KEY),
            db_password: lookup(DB_PASSWORD_KEY),
        }
    }
}

fn read_env_file(path: &Path) -> ConnectorResult<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path)
        .map_err(|e| ConnectorError::Secrets(format!("Cannot read {}: {e}", path.display())))?;

    let mut vars = HashMap::new();
    for item in iter {
        let (key, value) = item
            .map_err(|e| ConnectorError::Secrets(format!("Invalid {}: {e}", path.display())))?;
        vars.insert(key, value);
    }
    tracing::debug!(path = %path.display(), keys = vars.len(), "Loaded env file");
    Ok(vars)
}
