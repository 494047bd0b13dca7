use std::path::PathBuf;
use std::sync::Arc;

use souq_db::Database;
use souq_gateway::dispatcher::Dispatcher;

use crate::error::ApiResult;
use crate::mailer::Mailer;
use crate::oauth::{GoogleOauth, PendingLoginStore};
use crate::otp::OtpStore;
use crate::stripe::StripeClient;

pub type AppState = Arc<AppStateInner>;

/// Run blocking work (rusqlite behind the connection mutex, argon2
/// hashing) off the async runtime so it never stalls a worker thread.
/// Handlers move a cloned `AppState` into the closure.
pub(crate) async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(out) => out,
        Err(e) => Err(anyhow::anyhow!("blocking task failed: {e}").into()),
    }
}

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub dispatcher: Dispatcher,
    pub otp_store: OtpStore,
    pub login_store: PendingLoginStore,
    pub mailer: Mailer,
    pub stripe: StripeClient,
    pub stripe_webhook_secret: String,
    pub google: Option<GoogleOauth>,
    pub frontend_url: String,
    pub upload_dir: PathBuf,
}

/// Fully wired state over an in-memory database. Handler tests call the
/// axum handlers directly against this.
#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use crate::mailer::Mailer;
    use crate::oauth::PendingLoginStore;
    use crate::otp::OtpStore;
    use crate::stripe::StripeClient;

    Arc::new(AppStateInner {
        db: Database::open_in_memory().expect("in-memory db"),
        jwt_secret: "test-secret".into(),
        dispatcher: Dispatcher::new(),
        otp_store: OtpStore::new(),
        login_store: PendingLoginStore::new(),
        mailer: Mailer::Log,
        stripe: StripeClient::new("sk_test_unused".into()),
        stripe_webhook_secret: "whsec_test_secret".into(),
        google: None,
        frontend_url: "http://localhost:3000".into(),
        upload_dir: std::env::temp_dir(),
    })
}
