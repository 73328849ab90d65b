mod beacon_chain;
mod block_rewards;
mod env;
mod execution_node;
mod json_codecs;
mod log;
mod relays;
mod retry;
mod serve;
mod units;
mod validators;

pub use serve::start_server;
