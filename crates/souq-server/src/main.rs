mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use souq_api::mailer::{HttpMailer, Mailer};
use souq_api::middleware::require_auth;
use souq_api::oauth::{GoogleOauth, PendingLoginStore};
use souq_api::otp::{self, OtpStore};
use souq_api::state::{AppState, AppStateInner};
use souq_api::stripe::StripeClient;
use souq_api::{admin, auth, campaigns, dashboard, messages, oauth, payments, portfolio, search,
    uploads, users};
use souq_gateway::connection;
use souq_gateway::dispatcher::Dispatcher;

use crate::config::Config;

/// Store sweep cadence for OTPs and pending OAuth logins.
const SWEEP_INTERVAL_SECS: u64 = 60;

/// Multipart envelope on top of the 10 MB file cap.
const UPLOAD_BODY_LIMIT: usize = uploads::MAX_UPLOAD_SIZE + 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "souq=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = souq_db::Database::open(&config.database_path)?;
    info!("Database open at {}", config.database_path.display());

    let mailer = match config.mail {
        Some(mail) => Mailer::Http(HttpMailer::new(mail.api_url, mail.api_key, mail.from)),
        None => {
            info!("MAIL_API_URL not set, OTP emails go to the log");
            Mailer::Log
        }
    };

    let otp_store = OtpStore::new();
    let login_store = PendingLoginStore::new();

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret,
        dispatcher: Dispatcher::new(),
        otp_store: otp_store.clone(),
        login_store: login_store.clone(),
        mailer,
        stripe: StripeClient::new(config.stripe_secret_key),
        stripe_webhook_secret: config.stripe_webhook_secret,
        google: config.google.map(|g| GoogleOauth {
            client_id: g.client_id,
            client_secret: g.client_secret,
            redirect_url: g.redirect_url,
        }),
        frontend_url: config.frontend_url,
        upload_dir: config.upload_dir.clone(),
    });

    tokio::spawn(otp::run_sweep_loop(otp_store, SWEEP_INTERVAL_SECS));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            interval.tick().await;
            let removed = login_store.sweep().await;
            if removed > 0 {
                info!("Swept {} stale OAuth logins", removed);
            }
        }
    });

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/verify-otp", post(auth::verify_otp))
        .route("/auth/resend-otp", post(auth::resend_otp))
        .route("/auth/login", post(auth::login))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/google", get(oauth::google_login))
        .route("/auth/google/callback", get(oauth::google_callback))
        // Raw body; signature check replaces auth here
        .route("/stripe/webhook", post(payments::stripe_webhook))
        .route("/search/creators", get(search::search_creators))
        .route("/search/campaigns", get(search::search_campaigns))
        .route("/creators", get(users::list_creators))
        .route("/campaigns/{id}", get(campaigns::get_campaign))
        .route("/users/{id}", get(users::get_user))
        .route("/users/{id}/portfolio", get(portfolio::list_portfolio))
        .route("/users/{id}/packages", get(portfolio::list_packages));

    let protected_routes = Router::new()
        .route("/me", get(users::get_me).patch(users::update_me))
        .route("/me/packages", put(portfolio::replace_packages))
        .route("/campaigns", get(campaigns::list_campaigns).post(campaigns::create_campaign))
        .route(
            "/campaigns/{id}",
            patch(campaigns::update_campaign).delete(campaigns::delete_campaign),
        )
        .route("/campaigns/{id}/status", post(campaigns::change_campaign_status))
        .route("/campaigns/{id}/apply", post(campaigns::apply_to_campaign))
        .route("/campaigns/{id}/applications", get(campaigns::list_campaign_applications))
        .route("/applications/mine", get(campaigns::my_applications))
        .route("/applications/{id}/status", post(campaigns::change_application_status))
        .route(
            "/conversations",
            get(messages::list_conversations).post(messages::open_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/portfolio", post(portfolio::create_portfolio_item))
        .route(
            "/portfolio/{id}",
            patch(portfolio::update_portfolio_item).delete(portfolio::delete_portfolio_item),
        )
        .route("/stripe/payment-intent", post(payments::create_payment_intent))
        .route("/stripe/transactions", get(payments::list_transactions))
        .route("/stripe/transactions/{id}/release", post(payments::release_transaction))
        .route("/stripe/transactions/{id}/refund", post(payments::refund_transaction))
        .route("/analytics/dashboard", get(dashboard::dashboard))
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}/deactivate", post(admin::deactivate_user))
        .route("/admin/users/{id}/activate", post(admin::activate_user))
        .route("/admin/campaigns/{id}/status", post(admin::moderate_campaign_status))
        .route(
            "/upload",
            post(uploads::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let ws_route = Router::new().route("/gateway", get(ws_upgrade));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Souq server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}
