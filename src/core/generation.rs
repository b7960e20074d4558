//! The recipe generation function: one stateless request in, one response out.

use crate::core::fallback::stock_image;
use crate::core::orchestrator::EXPECTED_RECIPES;
use crate::domain::model::RecipeDraft;
use crate::domain::ports::LlmProvider;
use crate::utils::error::{ChefError, Result};
use serde::Serialize;

pub const SYSTEM_PROMPT: &str = "You are a creative recipe generator.";

pub const INVALID_INGREDIENTS: &str = "Invalid or missing ingredients list";
pub const PARSE_FAILURE: &str = "Failed to parse recipe data";
pub const GENERATION_FAILURE: &str = "Failed to generate recipes";

pub const CORS_HEADERS: [(&str, &str); 2] = [
    ("Access-Control-Allow-Origin", "*"),
    (
        "Access-Control-Allow-Headers",
        "authorization, x-client-info, apikey, content-type",
    ),
];

#[derive(Debug, Clone, Default)]
pub struct FunctionRequest {
    pub method: String,
    pub body: Option<String>,
}

impl FunctionRequest {
    pub fn post(body: impl Into<String>) -> Self {
        Self {
            method: "POST".to_string(),
            body: Some(body.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl FunctionResponse {
    fn with_cors(status: u16, body: String) -> Self {
        Self {
            status,
            headers: CORS_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body,
        }
    }

    pub fn preflight() -> Self {
        Self::with_cors(200, String::new())
    }

    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => {
                let mut response = Self::with_cors(status, body);
                response
                    .headers
                    .push(("Content-Type".to_string(), "application/json".to_string()));
                response
            }
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                Self::error(500, GENERATION_FAILURE)
            }
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        let body = format!(r#"{{"error":{}}}"#, serde_json::Value::from(message));
        let mut response = Self::with_cors(status, body);
        response
            .headers
            .push(("Content-Type".to_string(), "application/json".to_string()));
        response
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn from_error(error: &ChefError) -> Self {
        let message = match error {
            ChefError::InvalidRequest { .. } => INVALID_INGREDIENTS,
            ChefError::GenerationParseError { .. } => PARSE_FAILURE,
            _ => GENERATION_FAILURE,
        };
        Self::json(error.status_code(), &ErrorBody { error: message })
    }
}

pub struct GenerationFunction<L: LlmProvider> {
    llm: L,
}

impl<L: LlmProvider> GenerationFunction<L> {
    pub fn new(llm: L) -> Self {
        Self { llm }
    }

    pub async fn handle(&self, request: &FunctionRequest) -> FunctionResponse {
        // 預檢請求必須在解析 body 之前處理
        if request.method.eq_ignore_ascii_case("OPTIONS") {
            return FunctionResponse::preflight();
        }

        match self.generate(request.body.as_deref()).await {
            Ok(recipes) => FunctionResponse::json(200, &recipes),
            Err(e) => {
                match &e {
                    ChefError::InvalidRequest { message } => {
                        tracing::warn!("Rejected request: {}", message)
                    }
                    other => tracing::error!("Error processing request: {}", other),
                }
                FunctionResponse::from_error(&e)
            }
        }
    }

    pub async fn generate(&self, body: Option<&str>) -> Result<Vec<RecipeDraft>> {
        let ingredients = parse_request(body)?;
        tracing::info!(
            "Generating recipes for {} ingredients with {}",
            ingredients.len(),
            self.llm.model_name()
        );

        let prompt = build_prompt(&ingredients);
        let text = self.llm.complete(SYSTEM_PROMPT, &prompt).await?;
        let recipes = parse_recipes(&text)?;
        Ok(attach_images(recipes))
    }
}

/// Extracts the ingredient list from a JSON request body.
pub fn parse_request(body: Option<&str>) -> Result<Vec<String>> {
    let body = body.map(str::trim).unwrap_or_default();
    if body.is_empty() {
        return Err(invalid("request body is empty"));
    }

    let value: serde_json::Value = serde_json::from_str(body)?;
    let items = value
        .get("ingredients")
        .and_then(|v| v.as_array())
        .ok_or_else(|| invalid("ingredients must be an array"))?;

    if items.is_empty() {
        return Err(invalid("ingredients must not be empty"));
    }

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid("ingredients must be strings"))
        })
        .collect()
}

fn invalid(message: &str) -> ChefError {
    ChefError::InvalidRequest {
        message: message.to_string(),
    }
}

pub fn build_prompt(ingredients: &[String]) -> String {
    format!(
        r#"Create {count} original recipes that use these ingredients:
{list}

Favour surprising combinations and inventive techniques. Each recipe must be
possible with only the listed ingredients plus basic pantry staples (salt,
pepper, oil).

Describe every recipe as a JSON object with exactly these fields:
{{
  "title": "",
  "description": "one or two sentences",
  "ingredients": ["..."],
  "time": "approximate cooking time, e.g. 20 min",
  "difficulty": "Easy | Medium | Hard"
}}

Respond with a JSON array of {count} such objects and nothing else."#,
        count = EXPECTED_RECIPES,
        list = ingredients.join(", "),
    )
}

/// Parses model output into exactly three complete recipes.
pub fn parse_recipes(text: &str) -> Result<Vec<RecipeDraft>> {
    let content = strip_code_fence(text.trim());

    let recipes: Vec<RecipeDraft> =
        serde_json::from_str(content).map_err(|e| ChefError::GenerationParseError {
            message: e.to_string(),
        })?;

    if recipes.len() != EXPECTED_RECIPES {
        return Err(ChefError::GenerationParseError {
            message: format!("expected {} recipes, got {}", EXPECTED_RECIPES, recipes.len()),
        });
    }

    for (index, recipe) in recipes.iter().enumerate() {
        if recipe.title.trim().is_empty() || recipe.ingredients.is_empty() {
            return Err(ChefError::GenerationParseError {
                message: format!("recipe {} is missing a title or ingredients", index),
            });
        }
    }

    Ok(recipes)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // 去掉語言標記 (```json)
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Gives each recipe a stock image chosen by its position.
pub fn attach_images(recipes: Vec<RecipeDraft>) -> Vec<RecipeDraft> {
    recipes
        .into_iter()
        .enumerate()
        .map(|(index, mut recipe)| {
            recipe.image = stock_image(index);
            recipe
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Difficulty;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeLlm {
        reply: Result<String>,
        calls: AtomicUsize,
        prompts: Mutex<Vec<(String, String)>>,
    }

    impl FakeLlm {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(ChefError::ModelError {
                    message: "upstream down".to_string(),
                }),
                calls: AtomicUsize::new(0),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FakeLlm {
        async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(ChefError::ModelError {
                    message: "upstream down".to_string(),
                }),
            }
        }

        fn model_name(&self) -> &str {
            "fake"
        }
    }

    const THREE_RECIPES: &str = r#"[
        {"title": "Egg Fried Rice", "description": "Quick.", "ingredients": ["Eggs", "Rice"], "time": "15 min", "difficulty": "Easy"},
        {"title": "Rice Pudding", "description": "Sweet.", "ingredients": ["Rice", "Milk"], "time": "40 min", "difficulty": "medium"},
        {"title": "Egg Souffle", "description": "Airy.", "ingredients": ["Eggs"], "time": "50 min", "difficulty": "Hard"}
    ]"#;

    fn body(response: &FunctionResponse) -> serde_json::Value {
        serde_json::from_str(&response.body).unwrap()
    }

    fn assert_cors(response: &FunctionResponse) {
        assert_eq!(response.header("access-control-allow-origin"), Some("*"));
        assert_eq!(
            response.header("Access-Control-Allow-Headers"),
            Some("authorization, x-client-info, apikey, content-type")
        );
    }

    #[tokio::test]
    async fn test_options_short_circuits() {
        let llm = FakeLlm::replying(THREE_RECIPES);
        let function = GenerationFunction::new(llm);
        let request = FunctionRequest {
            method: "OPTIONS".to_string(),
            body: Some("not json at all".to_string()),
        };

        let response = function.handle(&request).await;

        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
        assert_cors(&response);
        assert_eq!(function.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_generation() {
        let function = GenerationFunction::new(FakeLlm::replying(THREE_RECIPES));

        let response = function
            .handle(&FunctionRequest::post(r#"{"ingredients": ["Eggs", "Rice"]}"#))
            .await;

        assert_eq!(response.status, 200);
        assert_cors(&response);
        assert_eq!(response.header("content-type"), Some("application/json"));

        let recipes: Vec<RecipeDraft> = serde_json::from_str(&response.body).unwrap();
        assert_eq!(recipes.len(), 3);
        assert_eq!(recipes[1].difficulty, Difficulty::Medium);
        for (index, recipe) in recipes.iter().enumerate() {
            assert_eq!(recipe.image, stock_image(index));
            assert!(recipe.is_displayable());
        }

        let prompts = function.llm.prompts.lock().unwrap();
        assert_eq!(prompts[0].0, SYSTEM_PROMPT);
        assert!(prompts[0].1.contains("Eggs, Rice"));
    }

    #[tokio::test]
    async fn test_invalid_ingredients_are_rejected_without_model_call() {
        let function = GenerationFunction::new(FakeLlm::replying(THREE_RECIPES));

        for raw in [
            r#"{"ingredients": []}"#,
            r#"{}"#,
            r#"{"ingredients": "eggs"}"#,
            r#"{"ingredients": [1, 2]}"#,
            "",
        ] {
            let response = function.handle(&FunctionRequest::post(raw)).await;
            assert_eq!(response.status, 400, "body: {}", raw);
            assert_eq!(body(&response)["error"], INVALID_INGREDIENTS);
            assert_cors(&response);
        }

        assert_eq!(function.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unparseable_model_output_is_500() {
        let function = GenerationFunction::new(FakeLlm::replying("Here are some recipes!"));

        let response = function
            .handle(&FunctionRequest::post(r#"{"ingredients": ["Eggs"]}"#))
            .await;

        assert_eq!(response.status, 500);
        assert_eq!(body(&response)["error"], PARSE_FAILURE);
        assert_eq!(function.llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_model_failure_is_500() {
        let function = GenerationFunction::new(FakeLlm::failing());

        let response = function
            .handle(&FunctionRequest::post(r#"{"ingredients": ["Eggs"]}"#))
            .await;

        assert_eq!(response.status, 500);
        assert_eq!(body(&response)["error"], GENERATION_FAILURE);
    }

    #[tokio::test]
    async fn test_non_json_body_is_500() {
        let function = GenerationFunction::new(FakeLlm::replying(THREE_RECIPES));
        let response = function.handle(&FunctionRequest::post("{oops")).await;

        assert_eq!(response.status, 500);
        assert_eq!(body(&response)["error"], GENERATION_FAILURE);
        assert_eq!(function.llm.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parse_recipes_accepts_fenced_output() {
        let fenced = format!("```json\n{}\n```", THREE_RECIPES);
        assert_eq!(parse_recipes(&fenced).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_recipes_rejects_wrong_count_or_shape() {
        let two = r#"[
            {"title": "A", "description": "", "ingredients": ["x"], "time": "1 min", "difficulty": "Easy"},
            {"title": "B", "description": "", "ingredients": ["y"], "time": "1 min", "difficulty": "Easy"}
        ]"#;
        assert!(matches!(
            parse_recipes(two),
            Err(ChefError::GenerationParseError { .. })
        ));

        let missing_ingredients = r#"[
            {"title": "A", "description": "", "ingredients": [], "time": "1 min", "difficulty": "Easy"},
            {"title": "B", "description": "", "ingredients": ["y"], "time": "1 min", "difficulty": "Easy"},
            {"title": "C", "description": "", "ingredients": ["z"], "time": "1 min", "difficulty": "Easy"}
        ]"#;
        assert!(parse_recipes(missing_ingredients).is_err());

        let no_title = r#"[
            {"description": "", "ingredients": ["x"], "time": "1 min", "difficulty": "Easy"}
        ]"#;
        assert!(parse_recipes(no_title).is_err());
    }

    #[test]
    fn test_build_prompt_lists_ingredients() {
        let prompt = build_prompt(&["Tomato".to_string(), "Basil".to_string()]);
        assert!(prompt.contains("Tomato, Basil"));
        assert!(prompt.contains("JSON array of 3"));
        assert!(prompt.contains("\"difficulty\""));
    }

    #[test]
    fn test_attach_images_cycles_by_position() {
        let recipes = parse_recipes(THREE_RECIPES).unwrap();
        let mut many = recipes.clone();
        many.extend(recipes.clone());
        let with_images = attach_images(many);
        assert_eq!(with_images[0].image, with_images[5].image);
        assert_ne!(with_images[0].image, with_images[1].image);
    }
}
