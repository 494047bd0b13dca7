use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

/// Outbound email. Mail is best-effort everywhere it is used: a failed
/// send is logged and never fails the surrounding request.
pub enum Mailer {
    /// Posts to a transactional-mail HTTP endpoint
    /// (`{"from", "to", "subject", "text"}` JSON, bearer-authenticated).
    Http(HttpMailer),
    /// Dev fallback when no mail endpoint is configured: the message
    /// goes to the log instead of an inbox.
    Log,
}

impl Mailer {
    pub async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        match self {
            Self::Http(http) => http.send(to, subject, body).await,
            Self::Log => {
                info!("mail to {} [{}]: {}", to, subject, body);
                Ok(())
            }
        }
    }

    /// Fire-and-forget variant used by the auth handlers.
    pub async fn send_best_effort(&self, to: &str, subject: &str, body: &str) {
        if let Err(e) = self.send(to, subject, body).await {
            warn!("Failed to send mail to {}: {}", to, e);
        }
    }
}

pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }

    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": body,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            warn!("Mail API returned {}: {}", status, detail);
            anyhow::bail!("mail API returned {}", status);
        }

        Ok(())
    }
}
