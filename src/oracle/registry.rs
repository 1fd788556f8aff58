use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::FaceOracle;

/// Oracle handle shared between requests.
///
/// Wrapped in `Mutex` because `FaceOracle::verify` takes `&mut self`.
pub type SharedOracle = Arc<Mutex<dyn FaceOracle>>;

/// Registry of named face oracles.
pub struct OracleRegistry {
    oracles: HashMap<String, SharedOracle>,
    default_name: Option<String>,
}

impl OracleRegistry {
    pub fn new() -> Self {
        Self {
            oracles: HashMap::new(),
            default_name: None,
        }
    }

    /// Register an oracle. The first registered oracle becomes the default.
    pub fn register<O: FaceOracle + 'static>(&mut self, oracle: O) {
        let name = oracle.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.oracles.insert(name, Arc::new(Mutex::new(oracle)));
    }

    /// Set default oracle by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.oracles.contains_key(name) {
            return Err(anyhow!("oracle '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// Get oracle by name.
    pub fn get(&self, name: &str) -> Option<SharedOracle> {
        self.oracles.get(name).cloned()
    }

    /// Get default oracle.
    pub fn default_oracle(&self) -> Option<SharedOracle> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Resolve an oracle by name and warm it up before first use.
    pub fn select(&self, name: &str) -> Result<SharedOracle> {
        let oracle = self.get(name).ok_or_else(|| {
            anyhow!(
                "oracle '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            )
        })?;
        oracle
            .lock()
            .map_err(|_| anyhow!("oracle lock poisoned"))?
            .warm_up()?;
        Ok(oracle)
    }

    /// List registered oracles, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.oracles.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for OracleRegistry {
    fn default() -> Self {
        Self::new()
    }
}
