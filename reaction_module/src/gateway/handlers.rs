use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::event::{parse_reaction_added, ReactionEvent, SlackEnvelope};
use crate::pipeline::{ReactionOutcome, ReactionPipeline};

use super::state::GatewayState;
use super::verify::verify_slack_signature;

pub(super) async fn health(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "timestamp": Utc::now().to_rfc3339(),
            "uptime_secs": state.started_at.elapsed().as_secs(),
        })),
    )
}

pub(super) async fn ingest_slack(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let envelope = serde_json::from_slice::<SlackEnvelope>(&body).ok();
    if let Some(SlackEnvelope::UrlVerification { challenge }) = &envelope {
        return (StatusCode::OK, Json(json!({ "challenge": challenge })));
    }

    if let Err(reason) = verify_slack_signature(
        state.signing_secret.as_deref(),
        &headers,
        &body,
        Utc::now().timestamp(),
    ) {
        warn!("rejected slack request: {}", reason);
        return (StatusCode::UNAUTHORIZED, Json(json!({ "status": reason })));
    }

    let Some(envelope) = envelope else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "status": "bad_json" })));
    };
    let SlackEnvelope::EventCallback {
        event, event_id, ..
    } = envelope
    else {
        return (StatusCode::OK, Json(json!({ "status": "ignored" })));
    };
    let Some(reaction) = parse_reaction_added(&event) else {
        debug!("ignoring slack event {:?}", event.get("type"));
        return (StatusCode::OK, Json(json!({ "status": "ignored" })));
    };

    debug!(
        "accepted slack event {} for {}",
        event_id.as_deref().unwrap_or("-"),
        reaction.event_id()
    );
    dispatch(state.pipeline.clone(), reaction);
    (StatusCode::OK, Json(json!({ "status": "accepted" })))
}

/// Run the pipeline off the async runtime; Slack expects an answer within
/// three seconds and the remote calls block.
fn dispatch(pipeline: Arc<ReactionPipeline>, event: ReactionEvent) {
    tokio::task::spawn_blocking(move || {
        let outcome = pipeline.handle(&event);
        match &outcome {
            ReactionOutcome::Recorded { .. } | ReactionOutcome::ChannelFiltered(_) => {
                info!("{}: {}", event.event_id(), outcome)
            }
            ReactionOutcome::Failed(_) => warn!("{}: {}", event.event_id(), outcome),
            _ => debug!("{}: {}", event.event_id(), outcome),
        }
    });
}
