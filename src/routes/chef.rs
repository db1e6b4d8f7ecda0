use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AppError;
use crate::llm::ChatMessage;
use crate::models::{AppState, ChefReply, ChefRequest};

const NO_CONTEXT: &str = "No dish context provided.";

/// Relay a conversation to the model under the chef persona. A blank model
/// reply is relayed as `{ "reply": "" }`.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChefRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(e) => {
            return AppError::bad_request(format!("Invalid request body: {}", e.body_text()))
                .into_response();
        }
    };

    let messages = persona_messages(&state.config.system_prompt_chef, req);

    match state
        .llm
        .chat_reply(
            &state.http,
            &messages,
            0.7,
            state.config.identify_timeout(),
            None,
        )
        .await
    {
        Ok(reply) => Json(ChefReply { reply }).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "chef chat failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "GPT failed" })),
            )
                .into_response()
        }
    }
}

/// Persona system message (with the dish context) followed by the client's messages.
#[must_use]
pub fn persona_messages(persona: &str, req: ChefRequest) -> Vec<ChatMessage> {
    let context = req
        .context
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(NO_CONTEXT);

    let mut out = Vec::with_capacity(req.messages.len() + 1);
    out.push(ChatMessage::system(format!("{persona}\nContext: {context}")));
    out.extend(req.messages);
    out
}
