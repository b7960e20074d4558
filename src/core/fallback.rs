use crate::domain::model::{Difficulty, RecipeDraft};
use crate::utils::error::{ChefError, Result};
use std::future::Future;

/// Stock photos cycled through by position when a recipe has no image.
pub const STOCK_IMAGES: [&str; 5] = [
    "https://images.unsplash.com/photo-1569718212165-3a8278d5f624",
    "https://images.unsplash.com/photo-1609951651556-5334e2706168",
    "https://images.unsplash.com/photo-1607532941433-304659e8198a",
    "https://images.unsplash.com/photo-1512621776951-a57141f2eefd",
    "https://images.unsplash.com/photo-1547592180-85f173990554",
];

const IMAGE_PARAMS: &str = "?ixlib=rb-4.0.3&ixid=M3wxMjA3fDB8MHxwaG90by1wYWdlfHx8fGVufDB8fHx8fA%3D%3D&auto=format&fit=crop&w=800&q=80";

pub fn stock_image(index: usize) -> String {
    format!("{}{}", STOCK_IMAGES[index % STOCK_IMAGES.len()], IMAGE_PARAMS)
}

/// The example recipes served whenever live generation is unavailable.
pub fn fallback_recipes() -> Vec<RecipeDraft> {
    vec![
        RecipeDraft {
            title: "Spicy Peanut Butter Ramen".to_string(),
            description: "A unique fusion of creamy peanut butter with instant ramen, elevated with whatever vegetables you have on hand.".to_string(),
            ingredients: strings(&["Instant ramen", "Peanut butter", "Hot sauce", "Vegetables"]),
            time: "15 min".to_string(),
            difficulty: Difficulty::Easy,
            image: stock_image(0),
        },
        RecipeDraft {
            title: "Apple-Cereal Fritters".to_string(),
            description: "Transform breakfast cereals and apples into delicious fritters with a sweet and crunchy texture.".to_string(),
            ingredients: strings(&["Apples", "Breakfast cereal", "Eggs", "Flour", "Cinnamon"]),
            time: "25 min".to_string(),
            difficulty: Difficulty::Medium,
            image: stock_image(1),
        },
        RecipeDraft {
            title: "Savory Oatmeal Bowl".to_string(),
            description: "A savory twist on traditional oatmeal, incorporating cheese, herbs, and whatever protein you have available.".to_string(),
            ingredients: strings(&["Oats", "Cheese", "Herbs", "Protein (eggs/chicken)"]),
            time: "10 min".to_string(),
            difficulty: Difficulty::Easy,
            image: stock_image(2),
        },
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Result of a best-effort read.
#[derive(Debug)]
pub enum Resolved<T> {
    Live(T),
    Fallback { value: T, cause: ChefError },
}

impl<T> Resolved<T> {
    pub fn into_inner(self) -> T {
        match self {
            Resolved::Live(value) | Resolved::Fallback { value, .. } => value,
        }
    }

    pub fn cause(&self) -> Option<&ChefError> {
        match self {
            Resolved::Live(_) => None,
            Resolved::Fallback { cause, .. } => Some(cause),
        }
    }
}

/// Runs `operation`, substituting `fallback()` for any failure.
pub async fn with_fallback<T, Fut, F>(operation: Fut, fallback: F) -> Resolved<T>
where
    Fut: Future<Output = Result<T>>,
    F: FnOnce() -> T,
{
    match operation.await {
        Ok(value) => Resolved::Live(value),
        Err(cause) => {
            tracing::warn!(
                "⚠️ Falling back to example data: {} (category: {:?})",
                cause,
                cause.category()
            );
            Resolved::Fallback {
                value: fallback(),
                cause,
            }
        }
    }
}
