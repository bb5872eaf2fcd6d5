//! Slash command and OAuth redirect endpoints.

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use diffusion_core::{status::GENERIC_FAILURE_NOTICE, CommandRequest, IntakeOutcome};

use crate::state::AppState;

/// Shown on the OAuth redirect page after a successful exchange.
pub const AUTHORIZED_TEXT: &str = "Authorized successfully! You can close this window now :)";

/// Handle a slash command.
///
/// Always answers 200: the body is empty once the job is queued, the
/// authorize text when the requester has no credential, and pipeline
/// failures are reported through the command's response URL.
pub async fn slash_command(
    State(state): State<Arc<AppState>>,
    form: Result<Form<CommandRequest>, FormRejection>,
) -> (StatusCode, String) {
    let Form(request) = match form {
        Ok(form) => form,
        Err(e) => {
            warn!(error = %e, "Unreadable slash command");
            return (StatusCode::OK, GENERIC_FAILURE_NOTICE.to_string());
        }
    };

    match state.intake().submit(&request).await {
        Ok(IntakeOutcome::Queued(_)) => (StatusCode::OK, String::new()),
        Ok(IntakeOutcome::NotAuthorized { message }) => (StatusCode::OK, message),
        Err(e) => {
            error!(command = %request.command, requester_id = %request.requester_id, error = %e, "Slash command failed");
            state.intake().report_failure(&request, &e).await;
            (StatusCode::OK, String::new())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OAuthParams {
    pub code: Option<String>,
}

/// OAuth v2 redirect: exchange the code and store the requester's token.
///
/// Every failure answers 500 with an empty body; the cause is only logged.
pub async fn oauth_redirect(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OAuthParams>,
) -> impl IntoResponse {
    let Some(code) = params.code.filter(|code| !code.is_empty()) else {
        warn!("OAuth redirect without code");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    };

    let chat = match state.registry().chat().ready().await {
        Ok(chat) => chat,
        Err(e) => {
            error!(error = %e, "Chat client unavailable for OAuth exchange");
            return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
        }
    };

    let user = match chat.exchange_code(&code).await {
        Ok(user) => user,
        Err(e) => {
            error!(error = %e, "OAuth code exchange failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
        }
    };

    if let Err(e) = state.credentials().put(&user) {
        error!(user_id = %user.user_id, error = %e, "Failed to store credential");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }

    info!(user_id = %user.user_id, "User authorized");
    (StatusCode::OK, AUTHORIZED_TEXT.to_string())
}
