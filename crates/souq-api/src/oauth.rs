use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl, basic::BasicClient,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use souq_db::queries::users::NewUser;
use souq_types::models::UserType;

use crate::auth::create_token;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

/// How long a started Google login may take before the callback state
/// is considered stale.
const LOGIN_TTL: Duration = Duration::from_secs(10 * 60);

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

pub struct GoogleOauth {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

struct PendingLogin {
    pkce_verifier: String,
    user_type: UserType,
    expires_at: Instant,
}

/// CSRF-state -> pending login context. This service is token-based, not
/// session-based, so the PKCE verifier and the `user_type` hint for new
/// accounts live here between redirect and callback.
#[derive(Clone)]
pub struct PendingLoginStore {
    inner: Arc<RwLock<HashMap<String, PendingLogin>>>,
}

impl PendingLoginStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn insert(&self, csrf_state: String, pkce_verifier: String, user_type: UserType) {
        self.inner.write().await.insert(
            csrf_state,
            PendingLogin {
                pkce_verifier,
                user_type,
                expires_at: Instant::now() + LOGIN_TTL,
            },
        );
    }

    /// Single-use take; expired entries count as absent.
    async fn take(&self, csrf_state: &str) -> Option<(String, UserType)> {
        let entry = self.inner.write().await.remove(csrf_state)?;
        if entry.expires_at <= Instant::now() {
            return None;
        }
        Some((entry.pkce_verifier, entry.user_type))
    }

    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut store = self.inner.write().await;
        let before = store.len();
        store.retain(|_, entry| entry.expires_at > now);
        before - store.len()
    }
}

impl Default for PendingLoginStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
pub struct GoogleLoginQuery {
    /// Hint for accounts created through this flow; defaults to creator.
    pub user_type: Option<UserType>,
}

#[derive(Deserialize)]
pub struct GoogleCallbackQuery {
    pub state: Option<String>,
    pub code: Option<String>,
}

#[derive(Deserialize)]
struct GoogleUserinfo {
    email: String,
    #[serde(default)]
    name: Option<String>,
}

fn build_client(
    google: &GoogleOauth,
) -> ApiResult<
    BasicClient<
        oauth2::EndpointSet,
        oauth2::EndpointNotSet,
        oauth2::EndpointNotSet,
        oauth2::EndpointNotSet,
        oauth2::EndpointSet,
    >,
> {
    let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string())
        .map_err(|e| anyhow::anyhow!("bad auth url: {}", e))?;
    let token_url = TokenUrl::new(GOOGLE_TOKEN_URL.to_string())
        .map_err(|e| anyhow::anyhow!("bad token url: {}", e))?;
    let redirect_url = RedirectUrl::new(google.redirect_url.clone())
        .map_err(|e| anyhow::anyhow!("bad redirect url: {}", e))?;

    Ok(BasicClient::new(ClientId::new(google.client_id.clone()))
        .set_client_secret(ClientSecret::new(google.client_secret.clone()))
        .set_auth_uri(auth_url)
        .set_token_uri(token_url)
        .set_redirect_uri(redirect_url))
}

/// GET /auth/google — start the code flow.
pub async fn google_login(
    State(state): State<AppState>,
    Query(query): Query<GoogleLoginQuery>,
) -> ApiResult<impl IntoResponse> {
    let google = state
        .google
        .as_ref()
        .ok_or(ApiError::NotFound("Google sign-in"))?;
    let client = build_client(google)?;

    let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

    let (authorize_url, csrf_state) = client
        .authorize_url(CsrfToken::new_random)
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .set_pkce_challenge(pkce_challenge)
        .url();

    let user_type = match query.user_type {
        Some(UserType::Brand) => UserType::Brand,
        // Admin accounts are never created via OAuth
        _ => UserType::Creator,
    };
    state
        .login_store
        .insert(csrf_state.secret().clone(), pkce_verifier.secret().clone(), user_type)
        .await;

    Ok(Redirect::to(authorize_url.as_str()))
}

/// GET /auth/google/callback — exchange the code, create or load the
/// user, and hand the JWT to the frontend via the URL fragment.
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
) -> ApiResult<impl IntoResponse> {
    let google = state
        .google
        .as_ref()
        .ok_or(ApiError::NotFound("Google sign-in"))?;

    let csrf_state = query.state.ok_or(ApiError::Validation("Missing state".into()))?;
    let code = query.code.ok_or(ApiError::Validation("Missing code".into()))?;

    let (pkce_verifier, user_type) = state
        .login_store
        .take(&csrf_state)
        .await
        .ok_or(ApiError::Unauthorized)?;

    let client = build_client(google)?;
    let http_client = reqwest::ClientBuilder::new()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .map_err(|e| anyhow::anyhow!("http client build failed: {}", e))?;

    let token_result = client
        .exchange_code(AuthorizationCode::new(code))
        .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier))
        .request_async(&http_client)
        .await
        .map_err(|e| anyhow::anyhow!("google code exchange failed: {}", e))?;

    let userinfo: GoogleUserinfo = http_client
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(token_result.access_token().secret())
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("userinfo request failed: {}", e))?
        .json()
        .await
        .map_err(|e| anyhow::anyhow!("invalid userinfo response: {}", e))?;

    let email = userinfo.email.trim().to_lowercase();

    let db_state = state.clone();
    let token = blocking(move || {
        let user = match db_state.db.get_user_by_email(&email)? {
            Some(user) => {
                if !user.is_active {
                    return Err(ApiError::AccountDisabled);
                }
                user
            }
            None => {
                let user_id = Uuid::new_v4();
                let full_name = userinfo.name.unwrap_or_else(|| email.clone());
                // Google vouched for the address, so the account starts verified
                db_state.db.create_user(&NewUser {
                    id: &user_id.to_string(),
                    email: &email,
                    password_hash: None,
                    full_name: &full_name,
                    user_type: user_type.as_str(),
                    email_verified: true,
                })?;
                info!("Created {} account for {} via Google", user_type, email);
                db_state
                    .db
                    .get_user_by_email(&email)?
                    .ok_or_else(|| anyhow::anyhow!("user vanished after insert"))?
            }
        };

        create_token(&db_state.jwt_secret, &user)
    })
    .await?;
    Ok(Redirect::to(&format!("{}/auth/callback#token={}", state.frontend_url, token)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pending_login_is_single_use() {
        let store = PendingLoginStore::new();
        store.insert("state1".into(), "verifier1".into(), UserType::Brand).await;

        let (verifier, user_type) = store.take("state1").await.unwrap();
        assert_eq!(verifier, "verifier1");
        assert_eq!(user_type, UserType::Brand);

        assert!(store.take("state1").await.is_none());
        assert!(store.take("unknown").await.is_none());
    }

    #[tokio::test]
    async fn sweep_prunes_expired_logins() {
        let store = PendingLoginStore::new();
        store.insert("state1".into(), "verifier1".into(), UserType::Creator).await;
        store
            .inner
            .write()
            .await
            .get_mut("state1")
            .unwrap()
            .expires_at = Instant::now() - Duration::from_secs(1);

        assert_eq!(store.sweep().await, 1);
        assert!(store.take("state1").await.is_none());
    }
}
