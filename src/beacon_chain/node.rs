//! Functions that know how to communicate with a BeaconChain node to get various pieces of data.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use mockall::automock;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::env::ENV_CONFIG;
use crate::execution_node::{Address, BlockNumber};
use crate::json_codecs::i32_from_string;

use super::{slot_from_string, Slot};

/// Index of a validator in the beacon state, decimal digits.
pub type ValidatorIndex = String;
/// BLS public key of a validator, 0x-prefixed hex.
pub type Pubkey = String;

#[derive(Debug, Deserialize)]
pub struct ExecutionPayload {
    pub fee_recipient: Address,
    #[serde(deserialize_with = "i32_from_string")]
    pub block_number: BlockNumber,
}

#[derive(Debug, Deserialize)]
pub struct BeaconBlockBody {
    // Pre-merge blocks carry no execution payload.
    pub execution_payload: Option<ExecutionPayload>,
}

#[derive(Debug, Deserialize)]
pub struct BeaconBlock {
    pub body: BeaconBlockBody,
    #[serde(deserialize_with = "slot_from_string")]
    pub slot: Slot,
}

impl BeaconBlock {
    pub fn execution_payload(&self) -> Option<&ExecutionPayload> {
        self.body.execution_payload.as_ref()
    }
}

/// A signed envelope.
#[derive(Deserialize)]
struct BeaconBlockSignedEnvelope {
    message: BeaconBlock,
}

/// A versioned envelope.
#[derive(Deserialize)]
struct BeaconBlockVersionedEnvelope {
    data: BeaconBlockSignedEnvelope,
}

#[derive(Debug, Deserialize)]
struct BeaconHeader {
    #[serde(deserialize_with = "slot_from_string")]
    slot: Slot,
}

#[derive(Debug, Deserialize)]
struct BeaconHeaderEnvelope {
    message: BeaconHeader,
}

#[derive(Debug, Deserialize)]
struct BeaconHeaderSignedEnvelope {
    header: BeaconHeaderEnvelope,
}

#[derive(Debug, Deserialize)]
struct HeaderEnvelope {
    data: BeaconHeaderSignedEnvelope,
}

#[derive(Debug, Deserialize)]
struct SyncCommittee {
    validators: Vec<ValidatorIndex>,
}

#[derive(Debug, Deserialize)]
struct SyncCommitteeEnvelope {
    data: SyncCommittee,
}

// The full validator set response runs to hundreds of megabytes; keep only
// the two fields the directory needs.
#[derive(Debug, Deserialize)]
pub struct ValidatorSummary {
    pub index: ValidatorIndex,
    validator: ValidatorPubkey,
}

#[derive(Debug, Deserialize)]
struct ValidatorPubkey {
    pubkey: Pubkey,
}

impl ValidatorSummary {
    pub fn new(index: ValidatorIndex, pubkey: Pubkey) -> Self {
        Self {
            index,
            validator: ValidatorPubkey { pubkey },
        }
    }

    pub fn into_entry(self) -> (ValidatorIndex, Pubkey) {
        (self.index, self.validator.pubkey)
    }
}

#[derive(Debug, Deserialize)]
struct ValidatorsEnvelope {
    data: Vec<ValidatorSummary>,
}

#[automock]
#[async_trait]
pub trait BeaconNode {
    async fn get_head_slot(&self) -> Result<Slot>;
    async fn get_block_by_slot(&self, slot: Slot) -> Result<Option<BeaconBlock>>;
    async fn get_sync_committee(&self, slot: Slot) -> Result<Vec<ValidatorIndex>>;
    async fn get_validators_by_slot(&self, slot: Slot) -> Result<Vec<ValidatorSummary>>;
}

#[derive(Clone, Debug)]
pub struct BeaconNodeHttp {
    beacon_url: String,
    client: reqwest::Client,
}

impl Default for BeaconNodeHttp {
    fn default() -> Self {
        BeaconNodeHttp::new()
    }
}

impl BeaconNodeHttp {
    pub fn new() -> Self {
        Self::new_with_url(&ENV_CONFIG.beacon_url)
    }

    pub fn new_with_url(beacon_url: &str) -> Self {
        BeaconNodeHttp {
            beacon_url: beacon_url.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BeaconNode for BeaconNodeHttp {
    async fn get_head_slot(&self) -> Result<Slot> {
        let url = format!("{}/eth/v1/beacon/headers/head", self.beacon_url);
        let envelope = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<HeaderEnvelope>()
            .await?;
        Ok(envelope.data.header.message.slot)
    }

    async fn get_block_by_slot(&self, slot: Slot) -> Result<Option<BeaconBlock>> {
        let url = format!("{}/eth/v2/beacon/blocks/{}", self.beacon_url, slot);

        let res = self.client.get(&url).send().await?;

        match res.status() {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::OK => {
                let block = res
                    .json::<BeaconBlockVersionedEnvelope>()
                    .await
                    .map(|envelope| envelope.data.message)?;
                Ok(Some(block))
            }
            status => Err(anyhow!(
                "failed to fetch block by slot. slot = {} status = {} url = {}",
                slot,
                status,
                res.url()
            )),
        }
    }

    async fn get_sync_committee(&self, slot: Slot) -> Result<Vec<ValidatorIndex>> {
        let url = format!(
            "{}/eth/v1/beacon/states/{}/sync_committees",
            self.beacon_url, slot
        );
        self.client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<SyncCommitteeEnvelope>()
            .await
            .map(|envelope| envelope.data.validators)
            .map_err(Into::into)
    }

    async fn get_validators_by_slot(&self, slot: Slot) -> Result<Vec<ValidatorSummary>> {
        let url = format!(
            "{}/eth/v1/beacon/states/{}/validators",
            self.beacon_url, slot
        );
        self.client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<ValidatorsEnvelope>()
            .await
            .map(|envelope| envelope.data)
            .map_err(Into::into)
    }
}
