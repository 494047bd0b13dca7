use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// OTP lifetime.
const OTP_TTL: Duration = Duration::from_secs(10 * 60);

/// Wrong guesses allowed before the entry is burned.
const MAX_ATTEMPTS: u8 = 5;

/// What a pending code is allowed to be used for. A verification code
/// can never reset a password and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    VerifyEmail,
    ResetPassword,
}

struct PendingOtp {
    code: String,
    purpose: OtpPurpose,
    expires_at: Instant,
    attempts: u8,
}

/// In-process OTP store keyed by lowercase email. Entries are single-use,
/// expire after [`OTP_TTL`], and tolerate at most [`MAX_ATTEMPTS`] wrong
/// guesses. A background sweep prunes expired entries so abandoned
/// registrations do not leak memory.
///
/// Single-instance by scope; swapping in a shared cache only requires
/// replacing this type.
#[derive(Clone)]
pub struct OtpStore {
    inner: Arc<RwLock<HashMap<String, PendingOtp>>>,
}

impl OtpStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Generate, store, and return a fresh 6-digit code, replacing any
    /// pending entry for this email.
    pub async fn issue(&self, email: &str, purpose: OtpPurpose) -> String {
        let code = format!("{:06}", rand::rng().random_range(0..1_000_000));
        let entry = PendingOtp {
            code: code.clone(),
            purpose,
            expires_at: Instant::now() + OTP_TTL,
            attempts: 0,
        };
        self.inner.write().await.insert(email.to_lowercase(), entry);
        code
    }

    /// Single-use consume: returns true and removes the entry only when
    /// the code matches, the purpose matches, and the entry is not
    /// expired. A wrong guess counts against the attempt cap.
    pub async fn consume(&self, email: &str, code: &str, purpose: OtpPurpose) -> bool {
        let key = email.to_lowercase();
        let mut store = self.inner.write().await;

        let Some(entry) = store.get_mut(&key) else {
            return false;
        };

        if entry.expires_at <= Instant::now() || entry.purpose != purpose {
            store.remove(&key);
            return false;
        }

        if entry.code != code {
            entry.attempts += 1;
            if entry.attempts >= MAX_ATTEMPTS {
                debug!("OTP attempt cap hit for {}", key);
                store.remove(&key);
            }
            return false;
        }

        store.remove(&key);
        true
    }

    /// Drop expired entries. Returns how many were pruned.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut store = self.inner.write().await;
        let before = store.len();
        store.retain(|_, entry| entry.expires_at > now);
        before - store.len()
    }

    #[cfg(test)]
    async fn expire(&self, email: &str) {
        if let Some(entry) = self.inner.write().await.get_mut(&email.to_lowercase()) {
            entry.expires_at = Instant::now() - Duration::from_secs(1);
        }
    }
}

impl Default for OtpStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Background task that prunes expired OTP entries.
pub async fn run_sweep_loop(store: OtpStore, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        let pruned = store.sweep().await;
        if pruned > 0 {
            info!("OTP sweep: pruned {} expired entries", pruned);
        }
    }
}
