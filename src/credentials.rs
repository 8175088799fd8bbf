// src/credentials.rs

//! Pre-flight resolution of credentials supplied through the environment.

use std::collections::HashMap;

use crate::error::{AppError, Result};

/// Credential values resolved once, before any network activity.
#[derive(Clone, Default)]
pub struct Credentials {
    values: HashMap<String, String>,
}

impl Credentials {
    /// Resolve `names` from the process environment.
    pub fn from_env(collector: &str, names: &[String]) -> Result<Self> {
        Self::resolve(collector, names, |name| std::env::var(name).ok())
    }

    /// Resolve `names` through `lookup`; every absent or blank value is
    /// reported together.
    pub fn resolve<F>(collector: &str, names: &[String], lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = HashMap::new();
        let mut missing = Vec::new();

        for name in names {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => {
                    values.insert(name.clone(), value);
                }
                _ => missing.push(name.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(AppError::MissingCredential {
                collector: collector.to_string(),
                names: missing,
            });
        }

        Ok(Self { values })
    }

    /// Fetch a value that was part of the resolved set.
    pub fn get(&self, name: &str) -> Result<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| AppError::config(format!("credential {name} was not resolved")))
    }

}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("Credentials").field("names", &names).finish()
    }
}

/// Shorten a secret for log output.
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}...")
}
