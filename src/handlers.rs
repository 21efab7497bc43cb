//! HTTP handlers for the webhook endpoint.

use axum::{
    Json,
    body::Bytes,
    extract::State as AxumState,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::SharedState;
use crate::config::DeployMode;
use crate::deploy::run_deploy;
use crate::utils::find_matching_config_owned;

pub async fn root() -> &'static str {
    "push_deployer is running"
}

fn event_received() -> Response {
    (StatusCode::OK, Json(json!({"message": "Event received"}))).into_response()
}

/// Handles the GitHub webhook POST request.
///
/// The signature is checked against every registered secret before anything
/// else; an unmatched request learns nothing beyond the 403. Matched requests
/// are only acted on for push events targeting the configured branch.
pub async fn handle_webhook(
    AxumState(state): AxumState<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Missing header verifies as the empty string so every entry still goes
    // through the constant-time compare.
    let signature = headers
        .get("X-Hub-Signature-256")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let Some(config) = find_matching_config_owned(&state.registry, &body, signature) else {
        warn!("No registered secret matches the received signature");
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"detail": "Invalid signature or no matching secret"})),
        )
            .into_response();
    };

    // Only push events trigger a deploy; anything else is acknowledged.
    let event_opt = headers.get("X-GitHub-Event").and_then(|v| v.to_str().ok());
    if event_opt != Some("push") {
        info!("Not push event; Received {:?} event", event_opt);
        return event_received();
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            info!("Could not parse JSON body: {:?}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"detail": "Invalid JSON payload"})),
            )
                .into_response();
        }
    };

    let branch_ref = payload.get("ref").and_then(|r| r.as_str());
    if branch_ref != Some(config.branch_ref().as_str()) {
        info!(
            "Push ref {:?} does not target configured branch '{}' for '{}', skipping",
            branch_ref, config.branch, config.repo_path
        );
        return event_received();
    }

    let repo_lock = state.repo_lock(&config.repo_path);
    let command_timeout = state.settings.command_timeout();

    match state.settings.deploy_mode {
        DeployMode::Async => {
            let message = format!(
                "Pull and restart triggered for {} on branch {}",
                config.repo_path, config.branch
            );
            info!("{}", message);
            // Fire and forget; the outcome is only observable in the log.
            tokio::spawn(async move {
                let _guard = repo_lock.lock().await;
                match run_deploy(&config, command_timeout).await {
                    Ok(_) => info!(
                        "Deploy completed for {} on branch {}",
                        config.repo_path, config.branch
                    ),
                    Err(e) => error!("Deploy failed for {}: {}", config.repo_path, e),
                }
            });
            (StatusCode::OK, Json(json!({"message": message}))).into_response()
        }
        DeployMode::Sync => {
            let _guard = repo_lock.lock().await;
            match run_deploy(&config, command_timeout).await {
                Ok(_) => {
                    let message = format!(
                        "Pull and restart successful for {} on branch {}",
                        config.repo_path, config.branch
                    );
                    info!("{}", message);
                    (StatusCode::OK, Json(json!({"message": message}))).into_response()
                }
                Err(e) => {
                    error!("Deploy failed for {}: {}", config.repo_path, e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"detail": format!("Error: {}", e)})),
                    )
                        .into_response()
                }
            }
        }
    }
}
