//! HTTP routes.

use crate::error::GatewayError;
use crate::history::HistoryReply;
use crate::state::AppState;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info, warn};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Route, State, get, post, put, routes};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use xbot_ai::ImageRequest;
use xbot_archive::{
    ArchiveError, ChatEventRecord, DEFAULT_SYSTEM_PROMPT, PollRecord, PromptRecord,
    SenderActivity, UpdatePayload,
};

/// Routes mounted under `/v1`.
pub fn api() -> Vec<Route> {
    routes![
        webhook,
        messages,
        transcript,
        summary,
        ask,
        chat,
        leaderboard,
        get_prompt,
        put_prompt,
        register_poll,
        images
    ]
}

/// Routes mounted at the root.
pub fn health() -> Vec<Route> {
    routes![healthz]
}

#[derive(Debug, Deserialize)]
pub struct AskBody {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PromptBody {
    pub prompt: String,
}

#[derive(Debug, Deserialize)]
pub struct PollBody {
    #[serde(rename = "type")]
    pub poll_type: String,
    pub poll_id: String,
    #[serde(default)]
    pub message_id: i64,
    #[serde(default)]
    pub poll: Value,
}

#[derive(Debug, Serialize)]
pub struct PollView {
    /// False when a poll of this type was already posted today.
    pub created: bool,
    pub poll: PollRecord,
}

#[derive(Debug, Deserialize)]
pub struct ImageBody {
    pub prompt: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ImageView {
    pub mime_type: String,
    pub finish_reason: String,
    /// Base64 encoded image bytes.
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct PromptView {
    pub chat_id: i64,
    pub prompt: String,
    pub is_default: bool,
}

#[derive(Debug, Serialize)]
pub struct TranscriptView {
    pub chat_id: i64,
    pub transcript: String,
}

/// Archive an inbound platform event.
///
/// Always acknowledged so the platform does not redeliver; storage failures
/// are logged and reported as `archived: false`.
#[post("/webhook", data = "<update>")]
async fn webhook(state: &State<AppState>, update: Json<Value>) -> Json<Value> {
    let update = UpdatePayload::new(update.into_inner());
    let mut poll_type = None;
    if let Some(answer) = update.poll_answer() {
        match state.polls.get_by_poll_id(&answer.poll_id).await {
            Ok(poll) => {
                info!(
                    "poll answer received (poll_id={}, type={}, date={}, chat_id={}, voter_id={:?}, options={:?})",
                    answer.poll_id,
                    poll.poll_type,
                    poll.date,
                    poll.chat_id,
                    answer.voter_id,
                    answer.option_ids
                );
                poll_type = Some(poll.poll_type);
            }
            Err(ArchiveError::NotFound(_)) => {
                debug!("poll answer for unknown poll (poll_id={})", answer.poll_id)
            }
            Err(err) => warn!(
                "poll lookup failed (poll_id={}, error={})",
                answer.poll_id, err
            ),
        }
    }
    match state.archive.save_update(update).await {
        Ok(record) => Json(json!({
            "ok": true,
            "archived": true,
            "id": record.id,
            "poll_type": poll_type,
        })),
        Err(err) => {
            warn!("failed to archive update (error={})", err);
            Json(json!({ "ok": true, "archived": false, "poll_type": poll_type }))
        }
    }
}

#[get("/chats/<chat_id>/messages")]
async fn messages(
    state: &State<AppState>,
    chat_id: i64,
) -> Result<Json<Vec<ChatEventRecord>>, GatewayError> {
    let records = state.archive.get_messages_by_conversation(chat_id).await?;
    Ok(Json(records))
}

#[get("/chats/<chat_id>/transcript?<limit>")]
async fn transcript(
    state: &State<AppState>,
    chat_id: i64,
    limit: Option<usize>,
) -> Result<Json<TranscriptView>, GatewayError> {
    let transcript = state.history.transcript(chat_id, limit).await?;
    Ok(Json(TranscriptView {
        chat_id,
        transcript,
    }))
}

#[post("/chats/<chat_id>/summary")]
async fn summary(
    state: &State<AppState>,
    chat_id: i64,
) -> Result<Json<HistoryReply>, GatewayError> {
    Ok(Json(state.history.summarize(chat_id).await?))
}

#[post("/chats/<chat_id>/ask", data = "<body>")]
async fn ask(
    state: &State<AppState>,
    chat_id: i64,
    body: Json<AskBody>,
) -> Result<Json<HistoryReply>, GatewayError> {
    Ok(Json(state.history.ask(chat_id, &body.question).await?))
}

#[post("/chats/<chat_id>/chat", data = "<body>")]
async fn chat(
    state: &State<AppState>,
    chat_id: i64,
    body: Json<ChatBody>,
) -> Result<Json<HistoryReply>, GatewayError> {
    Ok(Json(state.history.chat(chat_id, &body.message).await?))
}

#[get("/chats/<chat_id>/leaderboard")]
async fn leaderboard(
    state: &State<AppState>,
    chat_id: i64,
) -> Result<Json<Vec<SenderActivity>>, GatewayError> {
    Ok(Json(state.history.leaderboard(chat_id).await?))
}

#[get("/chats/<chat_id>/prompt")]
async fn get_prompt(
    state: &State<AppState>,
    chat_id: i64,
) -> Result<Json<PromptView>, GatewayError> {
    let view = match state.prompts.get_prompt(chat_id).await {
        Ok(record) if !record.prompt.trim().is_empty() => PromptView {
            chat_id,
            prompt: record.prompt,
            is_default: false,
        },
        Ok(_) | Err(ArchiveError::NotFound(_)) => PromptView {
            chat_id,
            prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            is_default: true,
        },
        Err(err) => return Err(err.into()),
    };
    Ok(Json(view))
}

#[put("/chats/<chat_id>/prompt", data = "<body>")]
async fn put_prompt(
    state: &State<AppState>,
    chat_id: i64,
    body: Json<PromptBody>,
) -> Result<Json<PromptRecord>, GatewayError> {
    let prompt = body.into_inner().prompt;
    if prompt.trim().is_empty() {
        return Err(GatewayError::BadRequest(
            "Please provide the prompt text to save.".to_string(),
        ));
    }
    let record = state.prompts.save_prompt(chat_id, prompt).await?;
    info!("prompt saved (chat_id={})", chat_id);
    Ok(Json(record))
}

/// Register a poll the bot posted so later votes can be resolved.
///
/// At most one poll per type and day: a repeat returns the poll already
/// posted today.
#[post("/chats/<chat_id>/polls", data = "<body>")]
async fn register_poll(
    state: &State<AppState>,
    chat_id: i64,
    body: Json<PollBody>,
) -> Result<(Status, Json<PollView>), GatewayError> {
    let body = body.into_inner();
    if body.poll_type.trim().is_empty() || body.poll_id.trim().is_empty() {
        return Err(GatewayError::BadRequest(
            "Please provide the poll type and poll id.".to_string(),
        ));
    }
    let today = state.polls.today();
    if let Some(existing) = state
        .polls
        .find_by_type_and_date(&body.poll_type, &today)
        .await?
    {
        info!(
            "poll already posted today (type={}, date={}, message_id={})",
            existing.poll_type, existing.date, existing.message_id
        );
        return Ok((
            Status::Ok,
            Json(PollView {
                created: false,
                poll: existing,
            }),
        ));
    }
    let poll = PollRecord {
        message_id: body.message_id,
        poll: body.poll,
        ..PollRecord::new(body.poll_type, today, chat_id, body.poll_id)
    };
    let poll = state.polls.save(poll).await?;
    info!(
        "poll registered (type={}, date={}, chat_id={}, poll_id={})",
        poll.poll_type, poll.date, poll.chat_id, poll.poll_id
    );
    Ok((
        Status::Created,
        Json(PollView {
            created: true,
            poll,
        }),
    ))
}

#[post("/images", data = "<body>")]
async fn images(
    state: &State<AppState>,
    body: Json<ImageBody>,
) -> Result<Json<ImageView>, GatewayError> {
    let generator = state
        .images
        .as_ref()
        .ok_or(GatewayError::NotConfigured("image generation"))?;
    let body = body.into_inner();
    if body.prompt.trim().is_empty() {
        return Err(GatewayError::BadRequest(
            "Please describe the image to generate.".to_string(),
        ));
    }
    let request = ImageRequest {
        temperature: body.temperature,
        top_k: body.top_k,
        top_p: body.top_p,
        ..ImageRequest::new(body.prompt)
    };
    let image = generator.generate_image(&request).await?;
    info!(
        "image generated (bytes={}, mime_type={})",
        image.data.len(),
        image.mime_type
    );
    Ok(Json(ImageView {
        mime_type: image.mime_type,
        finish_reason: image.finish_reason,
        data: STANDARD.encode(&image.data),
    }))
}

#[get("/healthz")]
fn healthz(state: &State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "storage": state.archive.backend_kind(),
        "images": state.images.is_some(),
    }))
}
