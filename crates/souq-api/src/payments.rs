use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use souq_db::models::TransactionRow;
use souq_db::queries::is_unique_violation;
use souq_db::queries::transactions::NewTransaction;
use souq_types::api::{
    Claims, CreatePaymentIntentRequest, PaymentIntentResponse, TransactionListResponse,
    TransactionResponse,
};
use souq_types::models::{ApplicationStatus, TransactionStatus, UserType};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};
use crate::stripe::{IntentMetadata, verify_webhook_signature};

fn to_transaction_response(row: TransactionRow) -> ApiResult<TransactionResponse> {
    Ok(TransactionResponse {
        id: row.id.parse().map_err(|e| anyhow::anyhow!("corrupt transaction id: {}", e))?,
        payment_intent_id: row.payment_intent_id,
        application_id: row
            .application_id
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e| anyhow::anyhow!("corrupt application id: {}", e))?,
        campaign_id: row
            .campaign_id
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e| anyhow::anyhow!("corrupt campaign id: {}", e))?,
        brand_id: row
            .brand_id
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e| anyhow::anyhow!("corrupt brand id: {}", e))?,
        creator_id: row
            .creator_id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt creator id: {}", e))?,
        amount: row.amount,
        currency: row.currency,
        status: row.status.parse().map_err(|e: String| anyhow::anyhow!(e))?,
        created_at: row.created_at,
    })
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// POST /stripe/payment-intent — brand opens an escrow payment toward a
/// creator, optionally tied to an accepted application.
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePaymentIntentRequest>,
) -> ApiResult<impl IntoResponse> {
    if claims.user_type != UserType::Brand {
        return Err(ApiError::Forbidden("Only brands can fund campaigns"));
    }
    if req.amount <= 0 {
        return Err(ApiError::Validation("Amount must be positive".into()));
    }

    let db_state = state.clone();
    let campaign_id = req.campaign_id.to_string();
    let creator_id = req.creator_id.to_string();
    let brand_id = claims.sub.to_string();
    let application_id = req.application_id.map(|id| id.to_string());
    let db_application = application_id.clone();
    let (db_campaign, db_creator, db_brand) =
        (campaign_id.clone(), creator_id.clone(), brand_id.clone());
    blocking(move || {
        let campaign = db_state
            .db
            .get_campaign(&db_campaign)?
            .ok_or(ApiError::NotFound("Campaign"))?;
        if campaign.brand_id != db_brand {
            return Err(ApiError::Forbidden("Only the campaign owner can fund it"));
        }
        let creator = db_state
            .db
            .get_user_by_id(&db_creator)?
            .ok_or(ApiError::NotFound("Creator"))?;
        if creator.user_type != UserType::Creator.as_str() {
            return Err(ApiError::Validation("Payee must be a creator".into()));
        }

        // A linked application must be the accepted one between this pair
        if let Some(application_id) = db_application.as_deref() {
            let application = db_state
                .db
                .get_application(application_id)?
                .ok_or(ApiError::NotFound("Application"))?;
            if application.campaign_id != db_campaign || application.creator_id != db_creator {
                return Err(ApiError::Validation(
                    "Application does not match this campaign and creator".into(),
                ));
            }
            if application.status != ApplicationStatus::Accepted.as_str() {
                return Err(ApiError::Conflict("Only accepted applications can be funded"));
            }
        }
        Ok(())
    })
    .await?;

    let currency = req.currency.as_deref().unwrap_or("usd");
    let intent = state
        .stripe
        .create_payment_intent(
            req.amount,
            currency,
            &IntentMetadata {
                campaign_id: &campaign_id,
                creator_id: &creator_id,
                brand_id: &brand_id,
                application_id: application_id.as_deref(),
            },
        )
        .await?;

    info!("Payment intent {} opened for campaign {}", intent.id, req.campaign_id);
    Ok(Json(PaymentIntentResponse {
        payment_intent_id: intent.id,
        client_secret: intent.client_secret,
    }))
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: StripeEventObject,
}

#[derive(Debug, Deserialize)]
struct StripeEventObject {
    id: String,
    #[serde(default)]
    amount: i64,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    metadata: StripeIntentMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct StripeIntentMetadata {
    campaign_id: Option<String>,
    creator_id: Option<String>,
    brand_id: Option<String>,
    application_id: Option<String>,
}

/// POST /stripe/webhook — raw body, signature-checked, idempotent.
/// Settled payments become `held` transactions; everything else is
/// acknowledged and ignored.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::InvalidSignature)?;

    if !verify_webhook_signature(&body, signature, &state.stripe_webhook_secret, now_unix()) {
        return Err(ApiError::InvalidSignature);
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| ApiError::Validation(format!("Malformed event payload: {e}")))?;

    if event.event_type != "payment_intent.succeeded" {
        info!("Ignoring stripe event {} ({})", event.id, event.event_type);
        return Ok(StatusCode::OK);
    }

    let object = event.data.object;
    let creator_id = object
        .metadata
        .creator_id
        .ok_or_else(|| ApiError::Validation("Event metadata missing creator_id".into()))?;

    blocking(move || {
        let created = state.db.create_transaction(&NewTransaction {
            id: &Uuid::new_v4().to_string(),
            stripe_event_id: &event.id,
            payment_intent_id: &object.id,
            application_id: object.metadata.application_id.as_deref(),
            campaign_id: object.metadata.campaign_id.as_deref(),
            brand_id: object.metadata.brand_id.as_deref(),
            creator_id: &creator_id,
            amount: object.amount,
            currency: if object.currency.is_empty() { "usd" } else { &object.currency },
        });
        match created {
            Ok(()) => {
                info!("Recorded held transaction for stripe event {}", event.id);
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => {
                // Stripe retries deliveries; the first insert won
                warn!("Replayed stripe event {}, already recorded", event.id);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    })
    .await?;

    Ok(StatusCode::OK)
}

fn fetch_transaction(state: &AppState, id: Uuid) -> ApiResult<TransactionRow> {
    state
        .db
        .get_transaction(&id.to_string())?
        .ok_or(ApiError::NotFound("Transaction"))
}

fn settle(
    state: &AppState,
    row: &TransactionRow,
    next: TransactionStatus,
) -> ApiResult<TransactionRow> {
    let current: TransactionStatus = row.status.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    if !current.can_transition_to(next) {
        return Err(ApiError::InvalidTransition);
    }
    state.db.set_transaction_status(&row.id, next.as_str())?;
    state
        .db
        .get_transaction(&row.id)?
        .ok_or(ApiError::NotFound("Transaction"))
}

/// POST /stripe/transactions/{id}/release — paying brand or admin.
pub async fn release_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let row = blocking(move || {
        let row = fetch_transaction(&state, id)?;
        let is_payer = row.brand_id.as_deref() == Some(claims.sub.to_string().as_str());
        if claims.user_type != UserType::Admin && !is_payer {
            return Err(ApiError::Forbidden("Only the paying brand can release funds"));
        }

        settle(&state, &row, TransactionStatus::Released)
    })
    .await?;
    info!("Released transaction {}", id);
    Ok(Json(to_transaction_response(row)?))
}

/// POST /stripe/transactions/{id}/refund — admin-only dispute path.
pub async fn refund_transaction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    if claims.user_type != UserType::Admin {
        return Err(ApiError::Forbidden("Refunds are handled by support"));
    }

    let row = blocking(move || {
        let row = fetch_transaction(&state, id)?;
        settle(&state, &row, TransactionStatus::Refunded)
    })
    .await?;
    info!("Refunded transaction {}", id);
    Ok(Json(to_transaction_response(row)?))
}

/// GET /stripe/transactions — the caller's escrow ledger with totals.
pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let as_brand = claims.user_type == UserType::Brand;
    let user_id = claims.sub.to_string();

    let (rows, held_total, released_total) = blocking(move || {
        let rows = state.db.list_transactions_for_user(&user_id, as_brand)?;
        let held =
            state.db.sum_transactions(&user_id, as_brand, TransactionStatus::Held.as_str())?;
        let released =
            state
                .db
                .sum_transactions(&user_id, as_brand, TransactionStatus::Released.as_str())?;
        Ok((rows, held, released))
    })
    .await?;
    let transactions: Vec<TransactionResponse> = rows
        .into_iter()
        .map(to_transaction_response)
        .collect::<ApiResult<_>>()?;

    Ok(Json(TransactionListResponse { held_total, released_total, transactions }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use crate::stripe::sign_payload;
    use souq_db::queries::users::NewUser;

    fn claims_for(id: Uuid, user_type: UserType) -> Claims {
        Claims {
            sub: id,
            email: format!("{id}@example.com"),
            name: "Someone".into(),
            user_type,
            exp: usize::MAX,
        }
    }

    fn seed_user(state: &AppState, id: Uuid, user_type: &str) {
        state
            .db
            .create_user(&NewUser {
                id: &id.to_string(),
                email: &format!("{id}@example.com"),
                password_hash: Some("hash"),
                full_name: "Someone",
                user_type,
                email_verified: true,
            })
            .unwrap();
    }

    fn event_payload(event_id: &str, creator_id: Uuid, brand_id: Uuid) -> Vec<u8> {
        format!(
            r#"{{"id":"{event_id}","type":"payment_intent.succeeded","data":{{"object":{{
                "id":"pi_test","amount":70000,"currency":"usd",
                "metadata":{{"creator_id":"{creator_id}","brand_id":"{brand_id}"}}}}}}}}"#
        )
        .into_bytes()
    }

    fn signed_headers(payload: &[u8]) -> HeaderMap {
        let header = sign_payload(payload, "whsec_test_secret", now_unix());
        let mut headers = HeaderMap::new();
        headers.insert("stripe-signature", header.parse().unwrap());
        headers
    }

    #[tokio::test]
    async fn bad_signature_writes_nothing() {
        let state = test_state();
        let payload = event_payload("evt_1", Uuid::new_v4(), Uuid::new_v4());
        let mut headers = HeaderMap::new();
        headers.insert("stripe-signature", "t=1,v1=deadbeef".parse().unwrap());

        let err = stripe_webhook(State(state.clone()), headers, Bytes::from(payload))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ApiError::InvalidSignature));

        let (_, count) = state.db.transaction_totals().unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn replayed_event_inserts_once() {
        let state = test_state();
        let (brand, creator) = (Uuid::new_v4(), Uuid::new_v4());
        seed_user(&state, brand, "brand");
        seed_user(&state, creator, "creator");

        let payload = event_payload("evt_1", creator, brand);
        for _ in 0..2 {
            stripe_webhook(
                State(state.clone()),
                signed_headers(&payload),
                Bytes::from(payload.clone()),
            )
            .await
            .expect("webhook should ack");
        }

        let (volume, count) = state.db.transaction_totals().unwrap();
        assert_eq!(count, 1);
        assert_eq!(volume, 70_000);
    }

    #[tokio::test]
    async fn event_for_unknown_creator_is_not_acked() {
        let state = test_state();
        // Signed, well-formed event whose creator has no account row.
        // The insert fails the foreign key; that must surface as an
        // error so Stripe retries, not be swallowed as a replay.
        let payload = event_payload("evt_1", Uuid::new_v4(), Uuid::new_v4());

        let err = stripe_webhook(
            State(state.clone()),
            signed_headers(&payload),
            Bytes::from(payload),
        )
        .await
        .err()
        .expect("unknown creator must not be acked");
        assert!(matches!(err, ApiError::Internal(_)));

        let (_, count) = state.db.transaction_totals().unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn unhandled_event_types_are_acked() {
        let state = test_state();
        let payload = br#"{"id":"evt_x","type":"charge.updated","data":{"object":{"id":"ch_1"}}}"#
            .to_vec();

        stripe_webhook(
            State(state.clone()),
            signed_headers(&payload),
            Bytes::from(payload),
        )
        .await
        .expect("unknown events still ack");

        let (_, count) = state.db.transaction_totals().unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn escrow_settles_once() {
        let state = test_state();
        let (brand, creator) = (Uuid::new_v4(), Uuid::new_v4());
        seed_user(&state, brand, "brand");
        seed_user(&state, creator, "creator");

        let payload = event_payload("evt_1", creator, brand);
        stripe_webhook(
            State(state.clone()),
            signed_headers(&payload),
            Bytes::from(payload),
        )
        .await
        .unwrap();
        let tx_id: Uuid = state
            .db
            .list_transactions_for_user(&creator.to_string(), false)
            .unwrap()[0]
            .id
            .parse()
            .unwrap();

        // Creator cannot release their own payout
        let err = release_transaction(
            State(state.clone()),
            Extension(claims_for(creator, UserType::Creator)),
            Path(tx_id),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::Forbidden(_)));

        release_transaction(
            State(state.clone()),
            Extension(claims_for(brand, UserType::Brand)),
            Path(tx_id),
        )
        .await
        .expect("payer can release");

        // released -> refunded is off the map
        let err = refund_transaction(
            State(state.clone()),
            Extension(claims_for(Uuid::new_v4(), UserType::Admin)),
            Path(tx_id),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::InvalidTransition));
    }

    #[tokio::test]
    async fn creator_sees_incoming_totals() {
        let state = test_state();
        let (brand, creator) = (Uuid::new_v4(), Uuid::new_v4());
        seed_user(&state, brand, "brand");
        seed_user(&state, creator, "creator");

        for event in ["evt_1", "evt_2"] {
            let payload = event_payload(event, creator, brand);
            stripe_webhook(
                State(state.clone()),
                signed_headers(&payload),
                Bytes::from(payload),
            )
            .await
            .unwrap();
        }
        let tx_id = state
            .db
            .list_transactions_for_user(&creator.to_string(), false)
            .unwrap()[0]
            .id
            .clone();
        state.db.set_transaction_status(&tx_id, "released").unwrap();

        assert_eq!(
            state.db.sum_transactions(&creator.to_string(), false, "held").unwrap(),
            70_000
        );
        assert_eq!(
            state.db.sum_transactions(&creator.to_string(), false, "released").unwrap(),
            70_000
        );
    }
}
