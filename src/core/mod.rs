pub mod cache;
pub mod fallback;
pub mod generation;
pub mod orchestrator;

pub use crate::domain::model::{Difficulty, Ingredient, Notice, QueryKey, Recipe, RecipeDraft};
pub use crate::domain::ports::{AuthProvider, Backend, LlmProvider, RecipeGenerator, RecordStore};
pub use crate::utils::error::Result;
