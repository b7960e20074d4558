//! Hosted backend client: auth, table rows and function invocation over the
//! Supabase REST surface.

use crate::config::ServiceSettings;
use crate::domain::model::{
    AuthEvent, GenerateRequest, Ingredient, Recipe, RecipeDraft, Session, User,
};
use crate::domain::ports::{AuthProvider, RecipeGenerator, RecordStore};
use crate::utils::error::{ChefError, Result};
use crate::utils::validation::validate_url;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

pub const GENERATE_FUNCTION: &str = "generate-recipes";

const INGREDIENTS_TABLE: &str = "ingredients";
const RECIPES_TABLE: &str = "recipes";

pub struct SupabaseClient {
    base_url: String,
    access_key: String,
    client: Client,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
}

#[derive(Serialize)]
struct NewIngredient<'a> {
    name: &'a str,
    user_id: &'a str,
}

#[derive(Serialize)]
struct NewRecipe<'a> {
    #[serde(flatten)]
    draft: &'a RecipeDraft,
    user_id: &'a str,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "msg", alias = "error_description", alias = "error")]
    message: Option<String>,
}

impl SupabaseClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        Self::with_client(settings, Client::new())
    }

    pub fn with_client(settings: &ServiceSettings, client: Client) -> Result<Self> {
        if !settings.is_configured() {
            return Err(ChefError::BackendUnavailable);
        }
        validate_url("endpoint", &settings.endpoint)?;

        let (events, _) = broadcast::channel(16);
        Ok(Self {
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            access_key: settings.access_key.clone(),
            client,
            session: RwLock::new(None),
            events,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.access_key.clone())
    }

    async fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.access_key)
            .bearer_auth(self.bearer().await)
    }

    pub async fn session(&self) -> Option<Session> {
        self.session.read().await.clone()
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<User> {
        tracing::debug!("Signing in {}", email);
        let response = self
            .client
            .post(self.url("auth/v1/token?grant_type=password"))
            .header("apikey", &self.access_key)
            .json(&Credentials { email, password })
            .send()
            .await?;

        let session: Session = read_json(check(response).await?).await?;
        Ok(self.store_session(session, false).await)
    }

    /// Registers a new account. Returns the signed-in user when the backend
    /// issues a session immediately, `None` when email confirmation is pending.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<User>> {
        let response = self
            .client
            .post(self.url("auth/v1/signup"))
            .header("apikey", &self.access_key)
            .json(&Credentials { email, password })
            .send()
            .await?;

        let body: serde_json::Value = read_json(check(response).await?).await?;
        if body.get("access_token").is_some() {
            let session: Session = serde_json::from_value(body)?;
            return Ok(Some(self.store_session(session, false).await));
        }

        tracing::info!("Sign-up for {} awaits confirmation", email);
        Ok(None)
    }

    pub async fn refresh_session(&self) -> Result<User> {
        let refresh_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.refresh_token.clone())
            .ok_or(ChefError::Unauthenticated)?;

        let response = self
            .client
            .post(self.url("auth/v1/token?grant_type=refresh_token"))
            .header("apikey", &self.access_key)
            .json(&RefreshGrant {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;

        let session: Session = read_json(check(response).await?).await?;
        Ok(self.store_session(session, true).await)
    }

    pub async fn sign_out(&self) -> Result<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };

        let result = self
            .client
            .post(self.url("auth/v1/logout"))
            .header("apikey", &self.access_key)
            .bearer_auth(&session.access_token)
            .send()
            .await;

        // 本地狀態無論遠端結果如何都要清除
        let _ = self.events.send(AuthEvent::SignedOut);
        check(result?).await?;
        Ok(())
    }

    async fn store_session(&self, session: Session, refreshed: bool) -> User {
        let user = session.user.clone();
        *self.session.write().await = Some(session);

        let event = if refreshed {
            AuthEvent::TokenRefreshed(user.clone())
        } else {
            AuthEvent::SignedIn(user.clone())
        };
        // 沒有訂閱者時 send 會失敗，可忽略
        let _ = self.events.send(event);
        user
    }

    async fn list_table<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>> {
        let url = self.url(&format!(
            "rest/v1/{}?select=*&order=created_at.desc",
            table
        ));
        tracing::debug!("Reading {}", table);

        let response = self.authed(self.client.get(url)).await.send().await?;
        let rows: Vec<serde_json::Value> = read_json(check(response).await?).await?;

        // 單筆資料格式錯誤時略過，不讓整個列表失敗
        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping unreadable {} row: {}", table, e);
                    None
                }
            })
            .collect())
    }

    async fn insert_rows<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<Vec<T>> {
        let response = self
            .authed(self.client.post(self.url(&format!("rest/v1/{}", table))))
            .await
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;

        read_json(check(response).await?).await
    }
}

#[async_trait]
impl RecordStore for SupabaseClient {
    async fn list_ingredients(&self) -> Result<Vec<Ingredient>> {
        self.list_table(INGREDIENTS_TABLE).await
    }

    async fn insert_ingredients(&self, names: &[String], user_id: &str) -> Result<Vec<Ingredient>> {
        let rows: Vec<NewIngredient> = names
            .iter()
            .map(|name| NewIngredient { name, user_id })
            .collect();
        self.insert_rows(INGREDIENTS_TABLE, &rows).await
    }

    async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        self.list_table(RECIPES_TABLE).await
    }

    async fn insert_recipe(&self, draft: &RecipeDraft, user_id: &str) -> Result<Recipe> {
        let inserted: Vec<Recipe> = self
            .insert_rows(RECIPES_TABLE, &NewRecipe { draft, user_id })
            .await?;

        inserted
            .into_iter()
            .next()
            .ok_or_else(|| ChefError::RemoteError {
                status: StatusCode::OK.as_u16(),
                message: "Insert returned no rows".to_string(),
            })
    }
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn current_user(&self) -> Result<Option<User>> {
        let Some(token) = self.session.read().await.as_ref().map(|s| s.access_token.clone())
        else {
            return Ok(None);
        };

        let response = self
            .client
            .get(self.url("auth/v1/user"))
            .header("apikey", &self.access_key)
            .bearer_auth(token)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::debug!("Session token rejected, treating as signed out");
            return Ok(None);
        }

        let user: User = read_json(check(response).await?).await?;
        Ok(Some(user))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl RecipeGenerator for SupabaseClient {
    async fn generate(&self, ingredients: &[String]) -> Result<Vec<RecipeDraft>> {
        let url = self.url(&format!("functions/v1/{}", GENERATE_FUNCTION));
        tracing::debug!("Invoking {} with {} ingredients", GENERATE_FUNCTION, ingredients.len());

        let response = self
            .authed(self.client.post(url))
            .await
            .json(&GenerateRequest {
                ingredients: ingredients.to_vec(),
            })
            .send()
            .await?;

        let body = check(response).await?.text().await?;
        serde_json::from_str(&body).map_err(|e| ChefError::GenerationParseError {
            message: e.to_string(),
        })
    }
}

async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ChefError::Unauthenticated);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or(body);

    Err(ChefError::RemoteError {
        status: status.as_u16(),
        message,
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_settings_are_rejected() {
        let result = SupabaseClient::new(&ServiceSettings::default());
        assert!(matches!(result, Err(ChefError::BackendUnavailable)));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let client =
            SupabaseClient::new(&ServiceSettings::new("https://demo.supabase.co/", "anon")).unwrap();
        assert_eq!(
            client.url("rest/v1/recipes"),
            "https://demo.supabase.co/rest/v1/recipes"
        );
    }

    #[test]
    fn test_new_recipe_flattens_draft() {
        let draft = RecipeDraft {
            title: "Toast".to_string(),
            description: "Warm bread".to_string(),
            ingredients: vec!["Bread".to_string()],
            time: "5 min".to_string(),
            difficulty: crate::domain::model::Difficulty::Easy,
            image: "https://example.com/toast.jpg".to_string(),
        };
        let value = serde_json::to_value(NewRecipe {
            draft: &draft,
            user_id: "user-1",
        })
        .unwrap();

        assert_eq!(value["title"], "Toast");
        assert_eq!(value["difficulty"], "Easy");
        assert_eq!(value["user_id"], "user-1");
        assert!(value.get("id").is_none());
    }

    #[tokio::test]
    async fn test_sign_out_without_session_is_noop() {
        let client =
            SupabaseClient::new(&ServiceSettings::new("https://demo.supabase.co", "anon")).unwrap();
        assert!(client.sign_out().await.is_ok());
        assert!(client.session().await.is_none());
        assert!(client.current_user().await.unwrap().is_none());
    }
}
