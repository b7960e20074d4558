use crate::config::toml_config::TomlConfig;
use crate::utils::error::{ChefError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use std::env;
use std::fmt;
use std::path::Path;

/// Optional TOML file whose `[generation]` section overrides the environment.
pub const CONFIG_FILE_VAR: &str = "SCAN_CHEF_CONFIG";

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Settings of the generation function's execution environment.
///
/// The model key lives only here and is never sent to clients.
#[derive(Clone)]
pub struct FunctionConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl FunctionConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| ChefError::MissingConfigError {
            field: "OPENAI_API_KEY".to_string(),
        })?;

        Ok(Self {
            api_key,
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            base_url: env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            temperature: parse_var("GENERATION_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            max_tokens: parse_var("GENERATION_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
        })
    }

    /// Environment settings, overlaid with the file named by
    /// `SCAN_CHEF_CONFIG` when it is set.
    pub fn load() -> Result<Self> {
        let config = Self::from_env()?;
        match env::var(CONFIG_FILE_VAR) {
            Ok(path) if !path.trim().is_empty() => config.with_file(path.trim()),
            _ => Ok(config),
        }
    }

    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        tracing::info!("Applying generation settings from {}", path.as_ref().display());
        let file = TomlConfig::from_file(path)?;
        file.validate()?;
        Ok(file.apply_generation(self))
    }
}

impl fmt::Debug for FunctionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl Validate for FunctionConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("api_key", &self.api_key)?;
        validate_non_empty_string("model", &self.model)?;
        validate_url("base_url", &self.base_url)?;
        validate_range("temperature", self.temperature, 0.0, 2.0)?;
        validate_positive_number("max_tokens", self.max_tokens, 1)?;

        tracing::info!("✅ Function configuration validation passed");
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ChefError::InvalidConfigValueError {
                field: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FunctionConfig::new("sk-test");
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.temperature, 1.0);
        assert_eq!(config.max_tokens, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = FunctionConfig::new("sk-test");
        config.temperature = 3.0;
        assert!(config.validate().is_err());

        let mut config = FunctionConfig::new("sk-test");
        config.max_tokens = 0;
        assert!(config.validate().is_err());

        let config = FunctionConfig::new("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_hides_api_key() {
        let printed = format!("{:?}", FunctionConfig::new("sk-very-secret"));
        assert!(!printed.contains("sk-very-secret"));
    }

    #[test]
    fn test_file_overrides_generation_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut file,
            b"[generation]\nmodel = \"gpt-4o-mini\"\ntemperature = 0.4\n",
        )
        .unwrap();

        let config = FunctionConfig::new("sk-test").with_file(file.path()).unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.temperature, 0.4);
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(config.api_key, "sk-test");
    }

    #[test]
    fn test_file_with_invalid_generation_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[generation]\ntemperature = 7.5\n").unwrap();

        assert!(FunctionConfig::new("sk-test").with_file(file.path()).is_err());
    }

    #[test]
    fn test_parse_var_reports_bad_number() {
        std::env::set_var("SCAN_CHEF_TEST_MAX_TOKENS", "lots");
        let result: Result<u32> = parse_var("SCAN_CHEF_TEST_MAX_TOKENS", 10);
        assert!(matches!(
            result,
            Err(ChefError::InvalidConfigValueError { .. })
        ));
        std::env::remove_var("SCAN_CHEF_TEST_MAX_TOKENS");

        let result: Result<u32> = parse_var("SCAN_CHEF_TEST_UNSET_VAR", 10);
        assert_eq!(result.unwrap(), 10);
    }
}
