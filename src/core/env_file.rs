/// Per-service `.env` loading
///
/// Each service gets a fresh `EnvFile` scoped to its own iteration, so a
/// prior service's DB_NAME/DB_USER can never leak into the next one's
/// inference. The process environment is never touched.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    vars: HashMap<String, String>,
}

impl EnvFile {
    /// Load `{dir}/.env` if present; a missing file yields an empty context
    pub fn load(dir: &Path) -> Result<Self> {
        let env_path = dir.join(".env");
        if !env_path.exists() {
            return Ok(Self::default());
        }

        // from_path_iter reads pairs without mutating the process env
        let iter = dotenv::from_path_iter(&env_path)
            .with_context(|| format!("Failed to open {}", env_path.display()))?;

        let mut vars = HashMap::new();
        for item in iter {
            // Malformed lines are skipped, matching how lax these homelab
            // .env files are in practice
            if let Ok((key, value)) = item {
                vars.insert(key, value);
            }
        }

        Ok(Self { vars })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.as_str())
    }

    /// First non-empty value among the given keys
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.is_empty())
    }

    /// Resolve a compose environment value: the exact form `${VAR}` is looked
    /// up here, anything else is taken literally. An unknown variable
    /// resolves to None.
    pub fn resolve(&self, value: &str) -> Option<String> {
        if let Some(var) = value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
            self.get(var).map(|v| v.to_string())
        } else {
            Some(value.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }
}
