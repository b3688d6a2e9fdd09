//! Catalog and preference sources consumed by the selector.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;
use switchboard_core::{Candidate, IgnoreRwLock as _};

use crate::{Result, RoutingError};

/// Supplies the active model candidates.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Every active candidate, in catalog order.
    ///
    /// # Errors
    /// Returns an error if the catalog cannot be read.
    async fn active_candidates(&self) -> Result<Vec<Candidate>>;
}

/// Supplies stored user preferences.
#[async_trait]
pub trait PreferenceSource: Send + Sync {
    /// Preferences of `user_id`, if any are stored.
    ///
    /// # Errors
    /// Returns an error if the preference store cannot be read.
    async fn preferences(&self, user_id: &str) -> Result<Option<UserPreferences>>;
}

/// Strategy preferences stored for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    /// Usage mode; `"free"` forces the free strategy.
    pub usage_mode: Option<String>,
    /// Strategy per category name; `"global"` defers to the global strategy.
    pub category_strategies: HashMap<String, String>,
    /// Strategy used when no category preference applies.
    pub global_strategy: Option<String>,
    /// Legacy strategy per calling function name.
    pub function_strategies: HashMap<String, String>,
}

impl UserPreferences {
    /// Whether the user opted into free-only usage.
    pub fn is_free_mode(&self) -> bool {
        self.usage_mode
            .as_deref()
            .is_some_and(|mode| mode.eq_ignore_ascii_case("free"))
    }
}

/// Fixed candidate list, typically loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    /// Candidates in catalog order.
    candidates: Vec<Candidate>,
}

impl StaticCatalog {
    /// Catalog serving `candidates`.
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    /// Loads a JSON array of candidates.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            RoutingError::Catalog(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_json(&content)
    }

    /// Parses a JSON array of candidates.
    ///
    /// # Errors
    /// Returns an error if the JSON is not an array of candidates.
    pub fn from_json(content: &str) -> Result<Self> {
        let candidates: Vec<Candidate> = serde_json::from_str(content)
            .map_err(|err| RoutingError::Catalog(format!("invalid catalog: {err}")))?;
        tracing::debug!("Loaded {} catalog candidates", candidates.len());
        Ok(Self::new(candidates))
    }

    /// Served candidates.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn active_candidates(&self) -> Result<Vec<Candidate>> {
        Ok(self.candidates.clone())
    }
}

/// Preferences held in memory.
#[derive(Debug, Default)]
pub struct InMemoryPreferences {
    /// Preferences keyed by user id.
    users: RwLock<HashMap<String, UserPreferences>>,
}

impl InMemoryPreferences {
    /// Stores the preferences of `user_id`.
    pub fn set(&self, user_id: impl Into<String>, preferences: UserPreferences) {
        self.users
            .write_ignore_poison()
            .insert(user_id.into(), preferences);
    }

    /// Builder form of [`Self::set`].
    #[must_use]
    pub fn with_user(self, user_id: impl Into<String>, preferences: UserPreferences) -> Self {
        self.set(user_id, preferences);
        self
    }
}

#[async_trait]
impl PreferenceSource for InMemoryPreferences {
    async fn preferences(&self, user_id: &str) -> Result<Option<UserPreferences>> {
        Ok(self.users.read_ignore_poison().get(user_id).cloned())
    }
}
