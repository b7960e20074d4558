#[cfg(feature = "cli")]
pub mod cli;
pub mod function;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use function::FunctionConfig;
pub use toml_config::TomlConfig;

use crate::utils::error::Result;
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;

/// Connection settings for the hosted backend, read once at startup.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSettings {
    pub endpoint: String,
    pub access_key: String,
}

impl ServiceSettings {
    pub fn new(endpoint: impl Into<String>, access_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            access_key: access_key.into(),
        }
    }

    /// Reads `SUPABASE_URL` / `SUPABASE_ANON_KEY`, falling back to the
    /// `VITE_`-prefixed names. Missing values are left empty.
    pub fn from_env() -> Self {
        Self {
            endpoint: first_var(&["SUPABASE_URL", "VITE_SUPABASE_URL"]),
            access_key: first_var(&["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"]),
        }
    }

    /// Both values present means the backend is usable. Anything else is demo mode.
    pub fn is_configured(&self) -> bool {
        !self.endpoint.trim().is_empty() && !self.access_key.trim().is_empty()
    }
}

impl fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("endpoint", &self.endpoint)
            .field("access_key", &if self.access_key.is_empty() { "" } else { "***" })
            .finish()
    }
}

impl Validate for ServiceSettings {
    fn validate(&self) -> Result<()> {
        // 未設定屬於正常的示範模式
        if !self.is_configured() {
            tracing::warn!("Backend not configured, running in demo mode");
            return Ok(());
        }
        validate_url("endpoint", &self.endpoint)?;
        validate_non_empty_string("access_key", &self.access_key)?;
        Ok(())
    }
}

fn first_var(keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| env::var(key).ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_configured_requires_both_values() {
        assert!(ServiceSettings::new("https://x.supabase.co", "anon").is_configured());
        assert!(!ServiceSettings::new("https://x.supabase.co", "").is_configured());
        assert!(!ServiceSettings::new("", "anon").is_configured());
        assert!(!ServiceSettings::new("  ", "  ").is_configured());
        assert!(!ServiceSettings::default().is_configured());
    }

    #[test]
    fn test_unconfigured_settings_validate() {
        assert!(ServiceSettings::default().validate().is_ok());
    }

    #[test]
    fn test_configured_settings_require_valid_url() {
        assert!(ServiceSettings::new("not a url", "anon").validate().is_err());
        assert!(ServiceSettings::new("https://x.supabase.co", "anon")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_debug_redacts_access_key() {
        let settings = ServiceSettings::new("https://x.supabase.co", "secret-key");
        let printed = format!("{:?}", settings);
        assert!(!printed.contains("secret-key"));
    }

    #[test]
    fn test_from_env_prefers_primary_names() {
        std::env::set_var("SUPABASE_URL", "https://primary.supabase.co");
        std::env::set_var("VITE_SUPABASE_URL", "https://vite.supabase.co");
        std::env::set_var("VITE_SUPABASE_ANON_KEY", "vite-key");
        std::env::remove_var("SUPABASE_ANON_KEY");

        let settings = ServiceSettings::from_env();
        assert_eq!(settings.endpoint, "https://primary.supabase.co");
        assert_eq!(settings.access_key, "vite-key");

        std::env::remove_var("SUPABASE_URL");
        std::env::remove_var("VITE_SUPABASE_URL");
        std::env::remove_var("VITE_SUPABASE_ANON_KEY");
    }
}
