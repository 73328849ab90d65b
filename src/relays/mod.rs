mod aggregator;
mod relay_api;

use serde::Deserialize;

use crate::beacon_chain::{slot_from_string, Slot};
use crate::execution_node::{Address, BlockNumber};
use crate::json_codecs::i32_from_string;
use crate::units::WeiNewtype;

pub use aggregator::bid_traces_for_slot;

pub use relay_api::MockRelayApi;
pub use relay_api::RelayApi;
pub use relay_api::RelayApiHttp;

// A relay's bid trace has more response fields.
// Only listed the needed ones here to save on resource.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct BidTrace {
    #[serde(deserialize_with = "slot_from_string")]
    pub slot: Slot,
    pub value: WeiNewtype,
    pub proposer_fee_recipient: Address,
    #[serde(deserialize_with = "i32_from_string")]
    pub block_number: BlockNumber,
}
