pub mod admin;
pub mod auth;
pub mod campaigns;
pub mod dashboard;
pub mod error;
pub mod mailer;
pub mod messages;
pub mod middleware;
pub mod oauth;
pub mod otp;
pub mod payments;
pub mod portfolio;
pub mod search;
pub mod state;
pub mod stripe;
pub mod uploads;
pub mod users;

pub use error::{ApiError, ApiResult};
pub use state::{AppState, AppStateInner};
