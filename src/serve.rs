use std::sync::Arc;

use anyhow::Result;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tracing::{error, info};

use crate::beacon_chain::{
    BeaconNode, BeaconNodeHttp, Pubkey, Slot, SYNC_COMMITTEES_ACTIVATION_SLOT,
};
use crate::block_rewards;
use crate::env::{self, ENV_CONFIG};
use crate::execution_node::{ExecutionNode, ExecutionNodeWs};
use crate::log;
use crate::relays::{self, RelayApi, RelayApiHttp};
use crate::validators::ValidatorDirectory;

pub type StateExtension = Extension<Arc<State>>;

pub struct State {
    pub beacon_node: Arc<dyn BeaconNode + Send + Sync>,
    pub execution_node: Arc<dyn ExecutionNode + Send + Sync>,
    pub relays: Vec<Arc<dyn RelayApi + Send + Sync>>,
    pub validator_directory: ValidatorDirectory,
}

#[derive(Debug, Serialize)]
struct SyncDutiesResponse {
    data: Vec<Pubkey>,
}

/// Parses and bounds-checks the slot path parameter. Not a number is not a
/// resource (404); a slot past the head is a bad request (400), rejected
/// before any relay or execution node is bothered.
async fn checked_slot(
    beacon_node: &(dyn BeaconNode + Send + Sync),
    slot_text: &str,
) -> Result<Slot, Response> {
    let slot = match slot_text.parse::<Slot>() {
        Ok(slot) => slot,
        Err(_) => return Err(StatusCode::NOT_FOUND.into_response()),
    };

    let head_slot = match beacon_node.get_head_slot().await {
        Ok(head_slot) => head_slot,
        Err(err) => {
            error!(%err, "failed to fetch head slot");
            return Err(StatusCode::INTERNAL_SERVER_ERROR.into_response());
        }
    };

    if slot > head_slot {
        return Err(StatusCode::BAD_REQUEST.into_response());
    }

    Ok(slot)
}

async fn block_reward(state: StateExtension, Path(slot_text): Path<String>) -> Response {
    let slot = match checked_slot(state.beacon_node.as_ref(), &slot_text).await {
        Ok(slot) => slot,
        Err(response) => return response,
    };

    let bid_traces = match relays::bid_traces_for_slot(&state.relays, slot).await {
        Ok(bid_traces) => bid_traces,
        Err(err) => {
            error!(%slot, %err, "failed to aggregate relay bid traces");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let beacon_block = match state.beacon_node.get_block_by_slot(slot).await {
        Ok(Some(beacon_block)) => beacon_block,
        Ok(None) => {
            error!(%slot, "no beacon block for slot");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(err) => {
            error!(%slot, %err, "failed to fetch beacon block");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match block_rewards::resolve(state.execution_node.as_ref(), &bid_traces, &beacon_block).await
    {
        Ok(record) => Json(record).into_response(),
        Err(err) => {
            error!(%slot, %err, "failed to resolve block reward");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn sync_duties(state: StateExtension, Path(slot_text): Path<String>) -> Response {
    let slot = match checked_slot(state.beacon_node.as_ref(), &slot_text).await {
        Ok(slot) => slot,
        Err(response) => return response,
    };

    if slot < SYNC_COMMITTEES_ACTIVATION_SLOT {
        return StatusCode::NOT_FOUND.into_response();
    }

    let indices = match state.beacon_node.get_sync_committee(slot).await {
        Ok(indices) => indices,
        Err(err) => {
            error!(%slot, %err, "failed to fetch sync committee");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let mut data = Vec::with_capacity(indices.len());
    for index in &indices {
        match state.validator_directory.pubkey_for_index(index).await {
            Ok(pubkey) => data.push(pubkey),
            Err(err) => {
                error!(%slot, %index, %err, "failed to resolve sync committee pubkey");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    }

    Json(SyncDutiesResponse { data }).into_response()
}

pub async fn start_server() -> Result<()> {
    log::init();

    let beacon_node = Arc::new(BeaconNodeHttp::new());
    let execution_node = Arc::new(ExecutionNodeWs::connect().await);
    let relays = ENV_CONFIG
        .relay_urls
        .split_whitespace()
        .map(|url| Arc::new(RelayApiHttp::new(url)) as Arc<dyn RelayApi + Send + Sync>)
        .collect::<Vec<_>>();

    let validator_directory = ValidatorDirectory::new(beacon_node.clone());

    // The first snapshot fetch is hundreds of megabytes; take the hit before
    // accepting requests.
    info!("warming validator directory");
    validator_directory.rebuild().await?;
    info!("validator directory ready");

    let shared_state = Arc::new(State {
        beacon_node,
        execution_node,
        relays,
        validator_directory,
    });

    let app = Router::new()
        .route("/eth/validator/blockreward/:slot", get(block_reward))
        .route("/eth/validator/syncduties/:slot", get(sync_duties))
        .route("/healthz", get(|| async { StatusCode::OK }))
        .layer(
            ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .layer(Extension(shared_state)),
        );

    let port = env::get_env_var("PORT").unwrap_or_else(|| "3002".to_string());

    info!(%port, "server listening");
    let socket_addr = format!("0.0.0.0:{port}").parse()?;
    axum::Server::bind(&socket_addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
