pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{FunctionConfig, ServiceSettings, TomlConfig};

pub use adapters::{OpenAiProvider, SupabaseClient};
pub use crate::core::fallback::{fallback_recipes, with_fallback};
pub use crate::core::generation::{FunctionRequest, FunctionResponse, GenerationFunction};
pub use crate::core::orchestrator::{RecipeOrchestrator, SessionObserver};
pub use utils::error::{ChefError, Result};
