use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub environment: Environment,
    pub api: ApiConfig,
    pub storage: StorageConfig,
    pub scope: ScopeConfig,
    pub routes: RouteConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Backend origin; only requests to this origin are scoped or authenticated
    pub base_url: String,
    /// Path namespace under the origin that the interceptor applies to
    pub api_prefix: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Explicit storage directory; `None` resolves to `$HOME/.config/edudash`
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    pub skip_header: String,
    pub skip_value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub login_path: String,
    pub landing_path: String,
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // API overrides
        if let Ok(v) = env::var("EDUDASH_API_URL") {
            self.api.base_url = v.trim_end_matches('/').to_string();
        }
        if let Ok(v) = env::var("EDUDASH_API_PREFIX") {
            self.api.api_prefix = v;
        }
        if let Ok(v) = env::var("EDUDASH_TIMEOUT_SECS") {
            self.api.timeout_secs = v.parse().unwrap_or(self.api.timeout_secs);
        }

        // Storage overrides
        if let Ok(v) = env::var("EDUDASH_STORAGE_DIR") {
            self.storage.dir = Some(PathBuf::from(v));
        }

        // Scope overrides
        if let Ok(v) = env::var("EDUDASH_SKIP_SCOPE_HEADER") {
            self.scope.skip_header = v.to_ascii_lowercase();
        }

        // Route overrides
        if let Ok(v) = env::var("EDUDASH_LOGIN_PATH") {
            self.routes.login_path = v;
        }
        if let Ok(v) = env::var("EDUDASH_LANDING_PATH") {
            self.routes.landing_path = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            api: ApiConfig {
                base_url: "http://localhost:8001".to_string(),
                api_prefix: "/api".to_string(),
                timeout_secs: 20,
            },
            storage: StorageConfig { dir: None },
            scope: ScopeConfig::default(),
            routes: RouteConfig::default(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            api: ApiConfig {
                base_url: "https://staging.edudash.example.com".to_string(),
                api_prefix: "/api".to_string(),
                timeout_secs: 20,
            },
            storage: StorageConfig { dir: None },
            scope: ScopeConfig::default(),
            routes: RouteConfig::default(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            api: ApiConfig {
                base_url: "https://edudash.example.com".to_string(),
                api_prefix: "/api".to_string(),
                timeout_secs: 20,
            },
            storage: StorageConfig { dir: None },
            scope: ScopeConfig::default(),
            routes: RouteConfig::default(),
        }
    }

    /// Configuration pointed at an explicit backend, used by embedders and tests
    pub fn for_backend(base_url: impl Into<String>) -> Self {
        let mut config = Self::development();
        config.api.base_url = base_url.into().trim_end_matches('/').to_string();
        config
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn base_url(&self) -> ClientResult<url::Url> {
        let url = url::Url::parse(&self.api.base_url)?;
        if url.cannot_be_a_base() {
            return Err(ClientError::Config(format!(
                "backend URL '{}' cannot be used as a base",
                self.api.base_url
            )));
        }
        Ok(url)
    }

    /// Resolve the storage directory without creating it
    pub fn storage_dir(&self) -> ClientResult<PathBuf> {
        if let Some(dir) = &self.storage.dir {
            return Ok(dir.clone());
        }
        let home = env::var("HOME")
            .map_err(|_| ClientError::Config("HOME environment variable not set".to_string()))?;
        Ok(PathBuf::from(home).join(".config").join("edudash"))
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            skip_header: "x-skip-scope".to_string(),
            skip_value: "1".to_string(),
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            landing_path: "/".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = ClientConfig::development();
        assert_eq!(config.api.base_url, "http://localhost:8001");
        assert_eq!(config.api.api_prefix, "/api");
        assert_eq!(config.timeout(), Duration::from_secs(20));
    }

    #[test]
    fn test_default_production_config() {
        let config = ClientConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert!(config.api.base_url.starts_with("https://"));
        assert_eq!(config.scope.skip_header, "x-skip-scope");
    }

    #[test]
    fn for_backend_strips_trailing_slash() {
        let config = ClientConfig::for_backend("http://127.0.0.1:9000/");
        assert_eq!(config.api.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.base_url().unwrap().port(), Some(9000));
    }

    #[test]
    fn explicit_storage_dir_wins() {
        let mut config = ClientConfig::development();
        config.storage.dir = Some(PathBuf::from("/tmp/edudash-test"));
        assert_eq!(config.storage_dir().unwrap(), PathBuf::from("/tmp/edudash-test"));
    }
}
