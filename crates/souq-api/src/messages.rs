use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use souq_db::models::{ConversationRow, MessageRow};
use souq_types::api::{
    Claims, ConversationPeer, ConversationResponse, MessageResponse, OpenConversationRequest,
    SendMessageRequest,
};
use souq_types::events::GatewayEvent;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, blocking};

const MAX_MESSAGE_LEN: usize = 4000;

fn to_conversation_response(row: ConversationRow) -> ApiResult<ConversationResponse> {
    Ok(ConversationResponse {
        id: row.id.parse().map_err(|e| anyhow::anyhow!("corrupt conversation id: {}", e))?,
        campaign_id: row
            .campaign_id
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|e| anyhow::anyhow!("corrupt campaign id: {}", e))?,
        peer: ConversationPeer {
            id: row.peer_id.parse().map_err(|e| anyhow::anyhow!("corrupt peer id: {}", e))?,
            full_name: row.peer_name,
            user_type: row.peer_type.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            avatar_url: row.peer_avatar_url,
        },
        last_message: row.last_message,
        updated_at: row.updated_at,
    })
}

fn to_message_response(row: MessageRow) -> ApiResult<MessageResponse> {
    Ok(MessageResponse {
        id: row.id.parse().map_err(|e| anyhow::anyhow!("corrupt message id: {}", e))?,
        conversation_id: row
            .conversation_id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt conversation id: {}", e))?,
        sender_id: row
            .sender_id
            .parse()
            .map_err(|e| anyhow::anyhow!("corrupt sender id: {}", e))?,
        sender_name: row.sender_name,
        body: row.body,
        created_at: row.created_at,
    })
}

fn require_participant(state: &AppState, conversation_id: Uuid, user_id: Uuid) -> ApiResult<()> {
    if state
        .db
        .is_participant(&conversation_id.to_string(), &user_id.to_string())?
    {
        Ok(())
    } else {
        // Non-participants get the same answer as a missing conversation
        Err(ApiError::NotFound("Conversation"))
    }
}

/// POST /conversations — find or create the thread with a peer, scoped
/// to an optional campaign context.
pub async fn open_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<OpenConversationRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.peer_id == claims.sub {
        return Err(ApiError::Validation("Cannot open a conversation with yourself".into()));
    }
    let (row, created) = blocking(move || {
        let peer = state
            .db
            .get_user_by_id(&req.peer_id.to_string())?
            .ok_or(ApiError::NotFound("User"))?;
        if !peer.is_active {
            return Err(ApiError::NotFound("User"));
        }
        if let Some(campaign_id) = req.campaign_id {
            state
                .db
                .get_campaign(&campaign_id.to_string())?
                .ok_or(ApiError::NotFound("Campaign"))?;
        }

        let me = claims.sub.to_string();
        let peer_id = req.peer_id.to_string();
        let campaign_id = req.campaign_id.map(|id| id.to_string());

        let (conversation_id, created) =
            match state.db.find_conversation(&me, &peer_id, campaign_id.as_deref())? {
                Some(id) => (id, false),
                None => {
                    let id = Uuid::new_v4().to_string();
                    state
                        .db
                        .create_conversation(&id, &me, &peer_id, campaign_id.as_deref())?;
                    (id, true)
                }
            };

        let conversations = state.db.list_conversations(&me)?;
        let row = conversations
            .into_iter()
            .find(|c| c.id == conversation_id)
            .ok_or_else(|| anyhow::anyhow!("conversation vanished after create"))?;
        Ok((row, created))
    })
    .await?;

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(to_conversation_response(row)?)))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows =
        blocking(move || Ok(state.db.list_conversations(&claims.sub.to_string())?)).await?;
    let conversations: Vec<ConversationResponse> = rows
        .into_iter()
        .map(to_conversation_response)
        .collect::<ApiResult<_>>()?;
    Ok(Json(conversations))
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<u32>,
    /// created_at cursor of the oldest message from the previous page.
    pub before: Option<String>,
}

pub async fn get_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<impl IntoResponse> {
    let rows = blocking(move || {
        require_participant(&state, conversation_id, claims.sub)?;
        Ok(state.db.get_messages(
            &conversation_id.to_string(),
            query.limit.unwrap_or(50).min(100),
            query.before.as_deref(),
        )?)
    })
    .await?;
    let messages: Vec<MessageResponse> = rows
        .into_iter()
        .map(to_message_response)
        .collect::<ApiResult<_>>()?;
    Ok(Json(messages))
}

/// POST /conversations/{id}/messages — persist, then relay to any
/// connected subscribers. Delivery over the socket is best-effort; the
/// DB row is the source of truth.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(conversation_id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<impl IntoResponse> {
    let body = req.body.trim().to_string();
    if body.is_empty() {
        return Err(ApiError::Validation("Message body cannot be empty".into()));
    }
    if body.len() > MAX_MESSAGE_LEN {
        return Err(ApiError::Validation("Message body too long".into()));
    }

    let message_id = Uuid::new_v4();
    let sender_id = claims.sub;
    let db_state = state.clone();
    let db_body = body.clone();
    let row = blocking(move || {
        require_participant(&db_state, conversation_id, sender_id)?;

        db_state.db.insert_message(
            &message_id.to_string(),
            &conversation_id.to_string(),
            &sender_id.to_string(),
            &db_body,
        )?;

        let rows = db_state.db.get_messages(&conversation_id.to_string(), 1, None)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("message vanished after insert").into())
    })
    .await?;

    state.dispatcher.broadcast(GatewayEvent::MessageNew {
        id: message_id,
        conversation_id,
        sender_id,
        sender_name: claims.name.clone(),
        body,
        timestamp: chrono::Utc::now(),
    });

    Ok((StatusCode::CREATED, Json(to_message_response(row)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use souq_db::queries::users::NewUser;
    use souq_types::models::UserType;

    fn claims_for(id: Uuid, name: &str) -> Claims {
        Claims {
            sub: id,
            email: format!("{id}@example.com"),
            name: name.into(),
            user_type: UserType::Creator,
            exp: usize::MAX,
        }
    }

    fn seed_user(state: &AppState, id: Uuid, name: &str) {
        state
            .db
            .create_user(&NewUser {
                id: &id.to_string(),
                email: &format!("{id}@example.com"),
                password_hash: Some("hash"),
                full_name: name,
                user_type: "creator",
                email_verified: true,
            })
            .unwrap();
    }

    #[tokio::test]
    async fn open_is_idempotent_per_peer_and_campaign() {
        let state = test_state();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        seed_user(&state, a, "Aisha");
        seed_user(&state, b, "Bilal");

        let open = |state: AppState| {
            open_conversation(
                State(state),
                Extension(claims_for(a, "Aisha")),
                Json(OpenConversationRequest { peer_id: b, campaign_id: None }),
            )
        };
        open(state.clone()).await.expect("first open creates");
        open(state.clone()).await.expect("second open finds");

        let conversations = state.db.list_conversations(&a.to_string()).unwrap();
        assert_eq!(conversations.len(), 1);
    }

    #[tokio::test]
    async fn outsiders_cannot_read_or_send() {
        let state = test_state();
        let (a, b, outsider) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        seed_user(&state, a, "Aisha");
        seed_user(&state, b, "Bilal");
        seed_user(&state, outsider, "Omar");

        open_conversation(
            State(state.clone()),
            Extension(claims_for(a, "Aisha")),
            Json(OpenConversationRequest { peer_id: b, campaign_id: None }),
        )
        .await
        .unwrap();
        let conversation_id: Uuid =
            state.db.list_conversations(&a.to_string()).unwrap()[0].id.parse().unwrap();

        let err = get_messages(
            State(state.clone()),
            Extension(claims_for(outsider, "Omar")),
            Path(conversation_id),
            Query(MessagesQuery::default()),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = send_message(
            State(state.clone()),
            Extension(claims_for(outsider, "Omar")),
            Path(conversation_id),
            Json(SendMessageRequest { body: "hello".into() }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn send_persists_and_broadcasts() {
        let state = test_state();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        seed_user(&state, a, "Aisha");
        seed_user(&state, b, "Bilal");

        open_conversation(
            State(state.clone()),
            Extension(claims_for(a, "Aisha")),
            Json(OpenConversationRequest { peer_id: b, campaign_id: None }),
        )
        .await
        .unwrap();
        let conversation_id: Uuid =
            state.db.list_conversations(&a.to_string()).unwrap()[0].id.parse().unwrap();

        let mut rx = state.dispatcher.subscribe();
        send_message(
            State(state.clone()),
            Extension(claims_for(a, "Aisha")),
            Path(conversation_id),
            Json(SendMessageRequest { body: "  salam  ".into() }),
        )
        .await
        .expect("send should succeed");

        let rows = state.db.get_messages(&conversation_id.to_string(), 10, None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].body, "salam");

        match rx.recv().await.unwrap() {
            GatewayEvent::MessageNew { body, sender_name, .. } => {
                assert_eq!(body, "salam");
                assert_eq!(sender_name, "Aisha");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let state = test_state();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        seed_user(&state, a, "Aisha");
        seed_user(&state, b, "Bilal");

        open_conversation(
            State(state.clone()),
            Extension(claims_for(a, "Aisha")),
            Json(OpenConversationRequest { peer_id: b, campaign_id: None }),
        )
        .await
        .unwrap();
        let conversation_id: Uuid =
            state.db.list_conversations(&a.to_string()).unwrap()[0].id.parse().unwrap();

        let err = send_message(
            State(state.clone()),
            Extension(claims_for(a, "Aisha")),
            Path(conversation_id),
            Json(SendMessageRequest { body: "   ".into() }),
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
