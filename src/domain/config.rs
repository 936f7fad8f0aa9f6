use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::storage::{CollectionPath, InvalidPathError};

/// Configuration for a catalog.
///
/// Controls which collections the catalog lives in, whether administrator
/// sign-in is possible, and whether an empty catalog is seeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Config {
    /// Application identifier.
    ///
    /// Collections are stored under `artifacts/{app_id}/public/data/`, so
    /// several catalogs can share one store.
    app_id: String,

    /// Hex-encoded SHA-256 digest of the administrator token.
    ///
    /// If this is unset, nobody can sign in as an administrator.
    admin_token_sha256: Option<String>,

    /// Whether to fill an empty catalog with a default set of titles.
    pub seed_catalog: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            admin_token_sha256: None,
            seed_catalog: true,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file: {e}"))
    }

    /// Loads the configuration, falling back to defaults only if the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, String> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("No config file at {}; using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Saves the configuration to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), String> {
        let content =
            toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize config: {e}"))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {e}"))?;
        }
        std::fs::write(path, content).map_err(|e| format!("Failed to write config file: {e}"))
    }

    /// Returns the application identifier.
    #[must_use]
    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    /// Sets the application identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier cannot be used as a path segment.
    pub fn set_app_id(&mut self, app_id: String) -> Result<(), InvalidPathError> {
        let path = CollectionPath::new(app_id.clone())?;
        if path.segments().count() != 1 {
            return Err(InvalidPathError::new(app_id));
        }
        self.app_id = app_id;
        Ok(())
    }

    /// The collection holding visitor requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured application id is not a valid path
    /// segment.
    pub fn requests_collection(&self) -> Result<CollectionPath, InvalidPathError> {
        self.collection("requests")
    }

    /// The collection holding catalog entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured application id is not a valid path
    /// segment.
    pub fn catalog_collection(&self) -> Result<CollectionPath, InvalidPathError> {
        self.collection("movies")
    }

    fn collection(&self, name: &str) -> Result<CollectionPath, InvalidPathError> {
        CollectionPath::new(format!("artifacts/{}/public/data/{name}", self.app_id))
    }

    /// Whether an administrator token has been configured.
    #[must_use]
    pub const fn admin_enabled(&self) -> bool {
        self.admin_token_sha256.is_some()
    }

    /// Replace the administrator token. Only its digest is stored.
    pub fn set_admin_token(&mut self, token: &str) {
        self.admin_token_sha256 = Some(token_digest(token));
    }

    /// Remove the administrator token, disabling administrator sign-in.
    pub fn clear_admin_token(&mut self) {
        self.admin_token_sha256 = None;
    }

    /// Check a presented token against the configured digest.
    ///
    /// Returns `None` if no token is configured.
    #[must_use]
    pub fn verify_admin_token(&self, token: &str) -> Option<bool> {
        let expected = self.admin_token_sha256.as_deref()?;
        let presented = token_digest(token);
        Some(constant_time_eq(
            expected.to_ascii_lowercase().as_bytes(),
            presented.as_bytes(),
        ))
    }
}

fn default_app_id() -> String {
    "default-movie-app".to_string()
}

const fn default_seed_catalog() -> bool {
    true
}

fn token_digest(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    format!("{hash:x}")
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The serialized versions of the configuration.
/// This allows for future changes to the configuration format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default = "default_app_id")]
        app_id: String,

        #[serde(default, skip_serializing_if = "Option::is_none")]
        admin_token_sha256: Option<String>,

        #[serde(default = "default_seed_catalog")]
        seed_catalog: bool,
    },
}

impl From<Versions> for Config {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 {
                app_id,
                admin_token_sha256,
                seed_catalog,
            } => Self {
                app_id,
                admin_token_sha256,
                seed_catalog,
            },
        }
    }
}

impl From<Config> for Versions {
    fn from(config: Config) -> Self {
        Self::V1 {
            app_id: config.app_id,
            admin_token_sha256: config.admin_token_sha256,
            seed_catalog: config.seed_catalog,
        }
    }
}
