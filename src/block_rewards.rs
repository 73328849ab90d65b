//! Decides whether a block's proposer was paid through a relay-delivered
//! payload or priced like a self-built block, and computes the exact reward.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::debug;

use crate::beacon_chain::BeaconBlock;
use crate::execution_node::ExecutionNode;
use crate::relays::BidTrace;
use crate::units::WeiNewtype;

/// How the proposer of a block was paid.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RewardSource {
    Mev,
    Vanilla,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct BlockRewardRecord {
    pub status: RewardSource,
    pub reward: WeiNewtype,
}

impl BlockRewardRecord {
    fn vanilla(reward: WeiNewtype) -> Self {
        Self {
            status: RewardSource::Vanilla,
            reward,
        }
    }
}

// Relays return addresses in whatever casing they like; hex equality is
// case-insensitive.
fn addresses_match(lhs: &str, rhs: &str) -> bool {
    lhs.eq_ignore_ascii_case(rhs)
}

/// Classifies a confirmed block as mev or vanilla and computes the
/// proposer's reward. Pure in its inputs and the node's answers: identical
/// inputs produce identical records.
pub async fn resolve(
    execution_node: &(dyn ExecutionNode + Send + Sync),
    bid_traces: &[BidTrace],
    beacon_block: &BeaconBlock,
) -> Result<BlockRewardRecord> {
    let payload = beacon_block.execution_payload().with_context(|| {
        format!(
            "beacon block for slot {} has no execution payload",
            beacon_block.slot
        )
    })?;

    // No relay claims delivery: a self-built block, priced from its receipts.
    let Some(first_bid_trace) = bid_traces.first() else {
        let block_reward = execution_node.get_block_reward(payload.block_number).await?;
        return Ok(BlockRewardRecord::vanilla(block_reward.total));
    };

    // When relays disagree on the block number, the first trace wins.
    let block_reward = execution_node
        .get_block_reward(first_bid_trace.block_number)
        .await?;

    // A block without transactions has nothing to reconcile a bid against.
    let Some(last_tx_hash) = &block_reward.last_tx_hash else {
        return Ok(BlockRewardRecord::vanilla(block_reward.total));
    };

    let last_tx = execution_node.get_transaction_by_hash(last_tx_hash).await?;

    debug!(
        %last_tx_hash,
        last_tx_index = last_tx.transaction_index,
        "reconciling bid traces against the block's last transaction"
    );

    // The builder pays the proposer in the last transaction of the block. A
    // trace matches when it declares exactly that transfer.
    let matched = bid_traces.iter().find(|bid_trace| {
        bid_trace.value == last_tx.value
            && last_tx
                .to
                .as_deref()
                .map_or(false, |to| addresses_match(to, &bid_trace.proposer_fee_recipient))
    });

    let Some(bid_trace) = matched else {
        return Ok(BlockRewardRecord::vanilla(block_reward.total));
    };

    // Edge case: the builder set the proposer as the block's fee recipient,
    // so the proposer collected the tips on top of the declared bid value.
    let reward = if addresses_match(&payload.fee_recipient, &bid_trace.proposer_fee_recipient) {
        bid_trace.value + block_reward.total
    } else {
        bid_trace.value
    };

    Ok(BlockRewardRecord {
        status: RewardSource::Mev,
        reward,
    })
}
