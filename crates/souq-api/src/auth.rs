use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use uuid::Uuid;

use souq_db::queries::{is_unique_violation, users::NewUser};
use souq_types::api::{
    AuthResponse, Claims, ForgotPasswordRequest, LoginRequest, RegisterRequest, RegisterResponse,
    ResendOtpRequest, ResetPasswordRequest, VerifyOtpRequest,
};
use souq_types::models::UserType;

use crate::error::{ApiError, ApiResult};
use crate::otp::OtpPurpose;
use crate::state::{AppState, blocking};
use crate::users::to_user_response;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') || email.len() < 5 {
        return Err(ApiError::Validation("A valid email address is required".into()));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation("Password must be at least 8 characters".into()));
    }
    if req.full_name.trim().is_empty() {
        return Err(ApiError::Validation("Full name is required".into()));
    }
    if req.user_type == UserType::Admin {
        return Err(ApiError::Validation("Invalid account type".into()));
    }

    let user_id = Uuid::new_v4();

    // Argon2 and the insert both block; keep them off the runtime
    let db_state = state.clone();
    let db_email = email.clone();
    blocking(move || {
        let password_hash = hash_password(&req.password)?;
        let created = db_state.db.create_user(&NewUser {
            id: &user_id.to_string(),
            email: &db_email,
            password_hash: Some(&password_hash),
            full_name: req.full_name.trim(),
            user_type: req.user_type.as_str(),
            email_verified: false,
        });
        if let Err(e) = created {
            if is_unique_violation(&e) {
                return Err(ApiError::EmailTaken);
            }
            return Err(e.into());
        }
        Ok(())
    })
    .await?;

    let code = state.otp_store.issue(&email, OtpPurpose::VerifyEmail).await;
    state
        .mailer
        .send_best_effort(
            &email,
            "Verify your email",
            &format!("Your verification code is {code}. It expires in 10 minutes."),
        )
        .await;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id,
            message: "Registration successful. Check your email for a verification code.".into(),
        }),
    ))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();

    if !state.otp_store.consume(&email, &req.otp, OtpPurpose::VerifyEmail).await {
        return Err(ApiError::InvalidOtp);
    }

    let (token, user) = blocking(move || {
        if !state.db.mark_email_verified(&email)? {
            return Err(ApiError::NotFound("User"));
        }
        let user = state
            .db
            .get_user_by_email(&email)?
            .ok_or(ApiError::NotFound("User"))?;

        let token = create_token(&state.jwt_secret, &user)?;
        Ok((token, user))
    })
    .await?;
    Ok(Json(AuthResponse {
        token,
        user: to_user_response(user)?,
    }))
}

/// Always 200 — a different answer for unknown emails would leak which
/// addresses are registered.
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(req): Json<ResendOtpRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();

    let db_state = state.clone();
    let db_email = email.clone();
    let user = blocking(move || Ok(db_state.db.get_user_by_email(&db_email)?)).await?;
    if let Some(user) = user {
        if !user.email_verified {
            let code = state.otp_store.issue(&email, OtpPurpose::VerifyEmail).await;
            state
                .mailer
                .send_best_effort(
                    &email,
                    "Verify your email",
                    &format!("Your verification code is {code}. It expires in 10 minutes."),
                )
                .await;
        }
    }

    Ok(Json(serde_json::json!({
        "message": "If that address is registered, a new code is on its way."
    })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();

    let (token, user) = blocking(move || {
        let user = state
            .db
            .get_user_by_email(&email)?
            .ok_or(ApiError::InvalidCredentials)?;

        // Google-only accounts have no password hash
        let hash = user.password.as_deref().ok_or(ApiError::InvalidCredentials)?;
        verify_password(hash, &req.password)?;

        if !user.email_verified {
            return Err(ApiError::EmailNotVerified);
        }
        if !user.is_active {
            return Err(ApiError::AccountDisabled);
        }

        let token = create_token(&state.jwt_secret, &user)?;
        Ok((token, user))
    })
    .await?;
    Ok(Json(AuthResponse {
        token,
        user: to_user_response(user)?,
    }))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();

    let db_state = state.clone();
    let db_email = email.clone();
    let known = blocking(move || Ok(db_state.db.get_user_by_email(&db_email)?.is_some())).await?;
    if known {
        let code = state.otp_store.issue(&email, OtpPurpose::ResetPassword).await;
        state
            .mailer
            .send_best_effort(
                &email,
                "Reset your password",
                &format!("Your password reset code is {code}. It expires in 10 minutes."),
            )
            .await;
    }

    Ok(Json(serde_json::json!({
        "message": "If that address is registered, a reset code is on its way."
    })))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();

    if req.new_password.len() < 8 {
        return Err(ApiError::Validation("Password must be at least 8 characters".into()));
    }
    if !state.otp_store.consume(&email, &req.otp, OtpPurpose::ResetPassword).await {
        return Err(ApiError::InvalidOtp);
    }

    blocking(move || {
        let password_hash = hash_password(&req.new_password)?;
        if !state.db.set_password(&email, &password_hash)? {
            return Err(ApiError::NotFound("User"));
        }
        Ok(())
    })
    .await?;

    Ok(Json(serde_json::json!({ "message": "Password updated." })))
}

// -- Helpers --

pub(crate) fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(hash: &str, password: &str) -> ApiResult<()> {
    let parsed = PasswordHash::new(hash).map_err(|e| anyhow::anyhow!("corrupt password hash: {}", e))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| ApiError::InvalidCredentials)?;
    Ok(())
}

pub(crate) fn create_token(secret: &str, user: &souq_db::models::UserRow) -> ApiResult<String> {
    let user_type: UserType = user
        .user_type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let sub: Uuid = user
        .id
        .parse()
        .map_err(|e| anyhow::anyhow!("corrupt user id '{}': {}", user.id, e))?;

    let claims = Claims {
        sub,
        email: user.email.clone(),
        name: user.full_name.clone(),
        user_type,
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("token encoding failed: {}", e))?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::response::IntoResponse;

    fn register_req(email: &str, user_type: UserType) -> RegisterRequest {
        RegisterRequest {
            email: email.into(),
            password: "correct-horse".into(),
            full_name: "Amina Yusuf".into(),
            user_type,
        }
    }

    async fn register_ok(state: &AppState, email: &str, user_type: UserType) {
        register(State(state.clone()), Json(register_req(email, user_type)))
            .await
            .map(IntoResponse::into_response)
            .expect("registration should succeed");
    }

    #[tokio::test]
    async fn second_registration_with_same_email_fails() {
        let state = test_state();
        register_ok(&state, "amina@example.com", UserType::Creator).await;

        let err = register(
            State(state.clone()),
            Json(register_req("Amina@Example.com", UserType::Brand)),
        )
        .await
        .err()
        .expect("duplicate email must be rejected");
        assert!(matches!(err, ApiError::EmailTaken));
    }

    #[tokio::test]
    async fn otp_verifies_once_then_becomes_invalid() {
        let state = test_state();
        register_ok(&state, "amina@example.com", UserType::Creator).await;

        let code = state
            .otp_store
            .issue("amina@example.com", OtpPurpose::VerifyEmail)
            .await;

        let first = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "amina@example.com".into(),
                otp: code.clone(),
            }),
        )
        .await;
        assert!(first.is_ok());

        let second = verify_otp(
            State(state.clone()),
            Json(VerifyOtpRequest {
                email: "amina@example.com".into(),
                otp: code,
            }),
        )
        .await;
        assert!(matches!(second.err(), Some(ApiError::InvalidOtp)));
    }

    #[tokio::test]
    async fn login_distinguishes_unverified_from_bad_password() {
        let state = test_state();
        register_ok(&state, "amina@example.com", UserType::Creator).await;

        // Correct password, unverified email
        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "amina@example.com".into(),
                password: "correct-horse".into(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::EmailNotVerified));

        // Wrong password on an existing account
        let err = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "amina@example.com".into(),
                password: "wrong-password".into(),
            }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::InvalidCredentials));
    }

    #[tokio::test]
    async fn verified_login_succeeds() {
        let state = test_state();
        register_ok(&state, "amina@example.com", UserType::Creator).await;
        state.db.mark_email_verified("amina@example.com").unwrap();

        let ok = login(
            State(state.clone()),
            Json(LoginRequest {
                email: "amina@example.com".into(),
                password: "correct-horse".into(),
            }),
        )
        .await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn reset_password_requires_reset_purpose_code() {
        let state = test_state();
        register_ok(&state, "amina@example.com", UserType::Creator).await;
        state.db.mark_email_verified("amina@example.com").unwrap();

        let code = state
            .otp_store
            .issue("amina@example.com", OtpPurpose::ResetPassword)
            .await;

        reset_password(
            State(state.clone()),
            Json(ResetPasswordRequest {
                email: "amina@example.com".into(),
                otp: code,
                new_password: "new-password-1".into(),
            }),
        )
        .await
        .expect("reset should succeed");

        // Old password no longer works, new one does
        assert!(
            login(
                State(state.clone()),
                Json(LoginRequest {
                    email: "amina@example.com".into(),
                    password: "correct-horse".into(),
                }),
            )
            .await
            .is_err()
        );
        assert!(
            login(
                State(state.clone()),
                Json(LoginRequest {
                    email: "amina@example.com".into(),
                    password: "new-password-1".into(),
                }),
            )
            .await
            .is_ok()
        );
    }

    #[tokio::test]
    async fn admin_registration_is_rejected() {
        let state = test_state();
        let err = register(
            State(state.clone()),
            Json(register_req("root@example.com", UserType::Admin)),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
