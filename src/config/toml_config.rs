use crate::config::{FunctionConfig, ServiceSettings};
use crate::utils::error::{ChefError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File-based configuration.
///
/// ```toml
/// [service]
/// endpoint = "${SUPABASE_URL}"
/// access_key = "${SUPABASE_ANON_KEY}"
///
/// [generation]
/// model = "gpt-4o"
/// temperature = 1.0
/// max_tokens = 1000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub service: Option<ServiceSection>,
    pub generation: Option<GenerationSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSection {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub access_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationSection {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ChefError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ChefError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SUPABASE_URL})，未設定的變數替換為空字串
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ChefError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| {
                tracing::warn!("Environment variable {} not set, substituting empty value", var_name);
                String::new()
            })
        });

        Ok(result.to_string())
    }

    pub fn service_settings(&self) -> ServiceSettings {
        self.service
            .as_ref()
            .map(|s| ServiceSettings::new(s.endpoint.clone(), s.access_key.clone()))
            .unwrap_or_default()
    }

    /// Overlays the `[generation]` section on top of an environment-derived config.
    pub fn apply_generation(&self, mut config: FunctionConfig) -> FunctionConfig {
        if let Some(generation) = &self.generation {
            if let Some(model) = &generation.model {
                config.model = model.clone();
            }
            if let Some(base_url) = &generation.base_url {
                config.base_url = base_url.clone();
            }
            if let Some(temperature) = generation.temperature {
                config.temperature = temperature;
            }
            if let Some(max_tokens) = generation.max_tokens {
                config.max_tokens = max_tokens;
            }
        }
        config
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.service_settings().validate()?;

        if let Some(generation) = &self.generation {
            if let Some(temperature) = generation.temperature {
                crate::utils::validation::validate_range("generation.temperature", temperature, 0.0, 2.0)?;
            }
            if let Some(max_tokens) = generation.max_tokens {
                crate::utils::validation::validate_positive_number("generation.max_tokens", max_tokens, 1)?;
            }
            if let Some(base_url) = &generation.base_url {
                crate::utils::validation::validate_url("generation.base_url", base_url)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_basic_toml_config() {
        let toml_content = r#"
[service]
endpoint = "https://demo.supabase.co"
access_key = "anon-key"

[generation]
model = "gpt-4o-mini"
max_tokens = 800
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let settings = config.service_settings();

        assert_eq!(settings.endpoint, "https://demo.supabase.co");
        assert!(settings.is_configured());

        let function = config.apply_generation(FunctionConfig::new("sk-test"));
        assert_eq!(function.model, "gpt-4o-mini");
        assert_eq!(function.max_tokens, 800);
        assert_eq!(function.temperature, 1.0);
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SCAN_CHEF_TEST_ENDPOINT", "https://env.supabase.co");

        let toml_content = r#"
[service]
endpoint = "${SCAN_CHEF_TEST_ENDPOINT}"
access_key = "${SCAN_CHEF_TEST_MISSING_KEY}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let settings = config.service_settings();
        assert_eq!(settings.endpoint, "https://env.supabase.co");
        // 未設定的金鑰代表示範模式
        assert!(settings.access_key.is_empty());
        assert!(!settings.is_configured());

        std::env::remove_var("SCAN_CHEF_TEST_ENDPOINT");
    }

    #[test]
    fn test_missing_sections_mean_demo_mode() {
        let config = TomlConfig::from_toml_str("").unwrap();
        assert!(!config.service_settings().is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let toml_content = r#"
[service]
endpoint = "invalid-url"
access_key = "anon"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());

        let toml_content = r#"
[generation]
temperature = 5.0
"#;
        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();

        let toml_content = r#"
[service]
endpoint = "https://file.supabase.co"
access_key = "file-key"
"#;

        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.service_settings().access_key, "file-key");
    }
}
