use crate::domain::model::{AuthEvent, Ingredient, Recipe, RecipeDraft, User};
use crate::utils::error::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Row storage for the `ingredients` and `recipes` collections.
///
/// Listings are ordered by creation time, newest first. Row ownership is
/// enforced by the store itself.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list_ingredients(&self) -> Result<Vec<Ingredient>>;
    async fn insert_ingredients(&self, names: &[String], user_id: &str) -> Result<Vec<Ingredient>>;
    async fn list_recipes(&self) -> Result<Vec<Recipe>>;
    async fn insert_recipe(&self, draft: &RecipeDraft, user_id: &str) -> Result<Recipe>;
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn current_user(&self) -> Result<Option<User>>;

    /// Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Remote invocation of the recipe generation function.
#[async_trait]
pub trait RecipeGenerator: Send + Sync {
    async fn generate(&self, ingredients: &[String]) -> Result<Vec<RecipeDraft>>;
}

/// Everything the orchestrator needs from the hosted backend.
pub trait Backend: RecordStore + AuthProvider + RecipeGenerator {}

impl<T: RecordStore + AuthProvider + RecipeGenerator> Backend for T {}

/// Text-generation model used inside the generation function.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;

    fn model_name(&self) -> &str;
}
