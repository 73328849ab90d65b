mod node;
mod slot;

pub use node::BeaconBlock;
pub use node::BeaconBlockBody;
pub use node::BeaconNode;
pub use node::BeaconNodeHttp;
pub use node::ExecutionPayload;
pub use node::MockBeaconNode;
pub use node::Pubkey;
pub use node::ValidatorIndex;
pub use node::ValidatorSummary;

pub use slot::slot_from_string;
pub use slot::Slot;

/// Sync committees started at the Altair fork, mainnet epoch 74240.
pub const SYNC_COMMITTEES_ACTIVATION_SLOT: Slot = Slot(2_375_680);
