//! Client-side recipe pipeline: decides between live generation and the
//! example set, and mediates every read and write against the record store.

use crate::config::ServiceSettings;
use crate::core::cache::QueryCache;
use crate::core::fallback::{fallback_recipes, stock_image, with_fallback, Resolved};
use crate::domain::model::{
    AuthEvent, Ingredient, Notice, QueryKey, Recipe, RecipeDraft, SessionView, User,
};
use crate::domain::ports::Backend;
use crate::utils::error::{ChefError, Result};
use crate::utils::validation::normalize_ingredients;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

pub const EXPECTED_RECIPES: usize = 3;

pub struct RecipeOrchestrator<B: Backend> {
    backend: Option<Arc<B>>,
    ingredients: Arc<QueryCache<Ingredient>>,
    recipes: Arc<QueryCache<Recipe>>,
    invalidations: broadcast::Sender<QueryKey>,
    notices: broadcast::Sender<Notice>,
    session: Arc<watch::Sender<SessionView>>,
}

impl<B: Backend + 'static> RecipeOrchestrator<B> {
    /// The backend is kept only when `settings` pass the configuration gate.
    pub fn new(settings: &ServiceSettings, backend: B) -> Self {
        if settings.is_configured() {
            Self::build(Some(Arc::new(backend)))
        } else {
            tracing::warn!("Backend not configured, using example data only");
            Self::build(None)
        }
    }

    /// Demo mode: no backend at all.
    pub fn offline() -> Self {
        Self::build(None)
    }

    fn build(backend: Option<Arc<B>>) -> Self {
        let (invalidations, _) = broadcast::channel(32);
        let (notices, _) = broadcast::channel(32);
        let (session, _) = watch::channel(SessionView::default());

        Self {
            backend,
            ingredients: Arc::new(QueryCache::new(QueryKey::Ingredients, invalidations.clone())),
            recipes: Arc::new(QueryCache::new(QueryKey::Recipes, invalidations.clone())),
            invalidations,
            notices,
            session: Arc::new(session),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn invalidations(&self) -> broadcast::Receiver<QueryKey> {
        self.invalidations.subscribe()
    }

    pub fn session(&self) -> watch::Receiver<SessionView> {
        self.session.subscribe()
    }

    /// The connected backend, or `BackendUnavailable` in demo mode.
    pub fn backend(&self) -> Result<&B> {
        self.backend
            .as_deref()
            .ok_or(ChefError::BackendUnavailable)
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    fn surface<T>(&self, result: Result<T>, message: &str) -> Result<T> {
        if let Err(e) = &result {
            tracing::error!("❌ {}: {}", message, e);
            self.notify(Notice::error(message));
        }
        result
    }

    async fn require_user(&self, backend: &B) -> Result<User> {
        backend
            .current_user()
            .await?
            .ok_or(ChefError::Unauthenticated)
    }

    async fn fetch_recipes(&self) -> Result<Vec<Recipe>> {
        let backend = self.backend()?;
        self.recipes.get_or_fetch(|| backend.list_recipes()).await
    }

    pub async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let result = self.fetch_recipes().await;
        self.surface(result, "Failed to load recipes")
    }

    pub async fn list_ingredients(&self) -> Result<Vec<Ingredient>> {
        let result = match self.backend() {
            Ok(backend) => {
                self.ingredients
                    .get_or_fetch(|| backend.list_ingredients())
                    .await
            }
            Err(e) => Err(e),
        };
        self.surface(result, "Failed to load ingredients")
    }

    pub async fn add_ingredients(&self, names: &[String]) -> Result<Vec<Ingredient>> {
        let result = self.insert_ingredients(names).await;
        self.surface(result, "Failed to add ingredients")
    }

    async fn insert_ingredients(&self, names: &[String]) -> Result<Vec<Ingredient>> {
        let backend = self.backend()?;
        let names = normalize_ingredients(names);
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let user = self.require_user(backend).await?;

        let inserted = backend.insert_ingredients(&names, &user.id).await?;
        tracing::info!("Stored {} ingredients for {}", inserted.len(), user.id);
        self.ingredients.invalidate().await;
        Ok(inserted)
    }

    /// Always yields something displayable for non-empty input: live
    /// recipes when generation succeeds, the example set otherwise. Only an
    /// empty list yields nothing.
    pub async fn generate_recipes(&self, ingredients: &[String]) -> Vec<RecipeDraft> {
        if ingredients.is_empty() {
            tracing::warn!("generate_recipes called without ingredients");
            return Vec::new();
        }
        let ingredients = normalize_ingredients(ingredients);

        let resolved = with_fallback(self.live_generation(&ingredients), fallback_recipes).await;
        match resolved.cause() {
            None => tracing::info!("✅ Generated recipes for {} ingredients", ingredients.len()),
            Some(ChefError::BackendUnavailable) => {
                self.notify(Notice::info("Using example recipes (service not connected)"))
            }
            Some(_) => self.notify(Notice::warning(
                "Could not generate recipes right now; showing examples instead",
            )),
        }
        resolved.into_inner()
    }

    async fn live_generation(&self, ingredients: &[String]) -> Result<Vec<RecipeDraft>> {
        let backend = self.backend()?;
        if ingredients.is_empty() {
            return Err(ChefError::InvalidRequest {
                message: "every ingredient name was blank".to_string(),
            });
        }
        let drafts = backend.generate(ingredients).await?;
        check_generated(drafts)
    }

    pub async fn save_recipe(&self, draft: &RecipeDraft) -> Result<Recipe> {
        let result = self.insert_recipe(draft).await;
        if result.is_ok() {
            self.notify(Notice::info("Recipe saved successfully!"));
        }
        self.surface(result, "Failed to save recipe")
    }

    async fn insert_recipe(&self, draft: &RecipeDraft) -> Result<Recipe> {
        let backend = self.backend()?;
        let user = self.require_user(backend).await?;

        if draft.title.trim().is_empty() || draft.ingredients.is_empty() {
            return Err(ChefError::InvalidRequest {
                message: "A recipe needs a title and at least one ingredient".to_string(),
            });
        }

        let mut draft = draft.clone();
        if draft.image.trim().is_empty() {
            draft.image = stock_image(0);
        }

        let saved = backend.insert_recipe(&draft, &user.id).await?;
        tracing::info!("Saved recipe {} ({})", saved.id, saved.title);
        self.recipes.invalidate().await;
        Ok(saved)
    }

    /// Recipes for the recipe section: stored ones when available, the
    /// example set when the listing fails or is empty.
    pub async fn display_recipes(&self) -> Vec<RecipeDraft> {
        let resolved = with_fallback(
            async {
                let stored = self.fetch_recipes().await?;
                Ok(stored.iter().map(Recipe::to_draft).collect::<Vec<_>>())
            },
            fallback_recipes,
        )
        .await;

        match resolved {
            Resolved::Live(drafts) if drafts.is_empty() => fallback_recipes(),
            Resolved::Live(drafts) => drafts,
            Resolved::Fallback { value, cause } => {
                if !matches!(cause, ChefError::BackendUnavailable) {
                    self.notify(Notice::warning(
                        "Failed to load recipes. Using example recipes instead.",
                    ));
                }
                value
            }
        }
    }

    /// Starts following the backend's session changes.
    ///
    /// The live view starts as loading until the current user is resolved.
    /// Every sign-in invalidates both listings. Dropping the returned handle
    /// unsubscribes.
    pub fn observe_session(&self) -> SessionObserver {
        let Some(backend) = self.backend.clone() else {
            self.session.send_replace(SessionView {
                user: None,
                loading: false,
            });
            return SessionObserver { handle: None };
        };

        // 先訂閱，避免遺漏查詢期間的事件
        let mut events = backend.subscribe();
        let view = Arc::clone(&self.session);
        let ingredients = Arc::clone(&self.ingredients);
        let recipes = Arc::clone(&self.recipes);

        let known_user = view.borrow().user.clone();
        view.send_replace(SessionView {
            user: known_user,
            loading: true,
        });

        let handle = tokio::spawn(async move {
            let user = match backend.current_user().await {
                Ok(user) => user,
                Err(e) => {
                    tracing::warn!("Could not resolve current user: {}", e);
                    None
                }
            };
            view.send_replace(SessionView {
                user,
                loading: false,
            });

            loop {
                match events.recv().await {
                    Ok(AuthEvent::SignedIn(user)) => {
                        tracing::info!("Signed in as {}", user.id);
                        ingredients.invalidate().await;
                        recipes.invalidate().await;
                        view.send_replace(SessionView {
                            user: Some(user),
                            loading: false,
                        });
                    }
                    Ok(AuthEvent::TokenRefreshed(user)) => {
                        tracing::debug!("Session refreshed for {}", user.id);
                        view.send_replace(SessionView {
                            user: Some(user),
                            loading: false,
                        });
                    }
                    Ok(AuthEvent::SignedOut) => {
                        tracing::info!("Signed out");
                        ingredients.invalidate().await;
                        recipes.invalidate().await;
                        view.send_replace(SessionView {
                            user: None,
                            loading: false,
                        });
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} session events, invalidating caches", skipped);
                        ingredients.invalidate().await;
                        recipes.invalidate().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        SessionObserver {
            handle: Some(handle),
        }
    }
}

/// Subscription handle returned by [`RecipeOrchestrator::observe_session`].
pub struct SessionObserver {
    handle: Option<JoinHandle<()>>,
}

impl SessionObserver {
    pub fn unsubscribe(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SessionObserver {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Rejects remote output that is not exactly three displayable recipes.
fn check_generated(drafts: Vec<RecipeDraft>) -> Result<Vec<RecipeDraft>> {
    if drafts.len() != EXPECTED_RECIPES {
        return Err(ChefError::GenerationParseError {
            message: format!("expected {} recipes, got {}", EXPECTED_RECIPES, drafts.len()),
        });
    }
    if let Some(bad) = drafts.iter().find(|d| !d.is_displayable()) {
        return Err(ChefError::GenerationParseError {
            message: format!("recipe '{}' is incomplete", bad.title),
        });
    }
    Ok(drafts)
}
