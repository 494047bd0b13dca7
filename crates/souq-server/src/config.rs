use std::path::PathBuf;

use anyhow::{Context, Result, bail};

pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub mail: Option<MailConfig>,
    pub google: Option<GoogleConfig>,
    pub frontend_url: String,
    pub upload_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Secrets have no defaults; everything else falls back to dev
    /// values.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => bail!("JWT_SECRET must be set"),
        };
        let stripe_secret_key = match get("STRIPE_SECRET_KEY") {
            Some(key) if !key.is_empty() => key,
            _ => bail!("STRIPE_SECRET_KEY must be set"),
        };
        let stripe_webhook_secret = match get("STRIPE_WEBHOOK_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ => bail!("STRIPE_WEBHOOK_SECRET must be set"),
        };

        let mail = match (get("MAIL_API_URL"), get("MAIL_API_KEY"), get("MAIL_FROM")) {
            (Some(api_url), Some(api_key), Some(from)) => {
                Some(MailConfig { api_url, api_key, from })
            }
            (None, _, _) => None,
            _ => bail!("MAIL_API_URL requires MAIL_API_KEY and MAIL_FROM"),
        };

        let google = match (
            get("GOOGLE_CLIENT_ID"),
            get("GOOGLE_CLIENT_SECRET"),
            get("GOOGLE_REDIRECT_URL"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_url)) => {
                Some(GoogleConfig { client_id, client_secret, redirect_url })
            }
            (None, _, _) => None,
            _ => bail!("GOOGLE_CLIENT_ID requires GOOGLE_CLIENT_SECRET and GOOGLE_REDIRECT_URL"),
        };

        Ok(Self {
            host: get("SOUQ_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: get("SOUQ_PORT")
                .unwrap_or_else(|| "3000".into())
                .parse()
                .context("SOUQ_PORT must be a port number")?,
            database_path: PathBuf::from(get("DATABASE_PATH").unwrap_or_else(|| "souq.db".into())),
            jwt_secret,
            stripe_secret_key,
            stripe_webhook_secret,
            mail,
            google,
            frontend_url: get("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:5173".into())
                .trim_end_matches('/')
                .to_string(),
            upload_dir: PathBuf::from(get("UPLOAD_DIR").unwrap_or_else(|| "./uploads".into())),
        })
    }
}
