//! Talks JSON-RPC to an execution node over a websocket and prices blocks
//! from their receipts.

mod decoders;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use async_tungstenite::tokio::{connect_async, TokioAdapter};
use async_tungstenite::tungstenite::Message;
use async_tungstenite::WebSocketStream;
use futures::channel::oneshot;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use mockall::automock;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::env::ENV_CONFIG;
use crate::units::WeiNewtype;

use self::decoders::{from_u128_hex_str, from_u64_hex_str, from_wei_hex_str};

// Execution chain blocks come in about once every 12s from genesis. With u32 our program
// would overflow when the block number passes 2_147_483_648. i32::MAX * 12 seconds = ~817 years.
pub type BlockNumber = i32;

/// Hash of a transaction on the execution layer.
pub type TxHash = String;

/// An execution layer account, 0x-prefixed hex.
pub type Address = String;

#[derive(Debug, Deserialize, Error)]
#[error("execution node rpc error, code {code}: {message}")]
pub struct RpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcMessage {
    Error { id: u16, error: RpcError },
    Result { id: u16, result: serde_json::Value },
}

impl RpcMessage {
    fn id(&self) -> u16 {
        match self {
            RpcMessage::Error { id, .. } => *id,
            RpcMessage::Result { id, .. } => *id,
        }
    }
}

struct IdPool {
    next_id: u16,
    in_use_ids: HashSet<u16>,
}

impl IdPool {
    fn new(size: usize) -> Self {
        Self {
            next_id: 0,
            in_use_ids: HashSet::with_capacity(size),
        }
    }

    fn get_next_id(&mut self) -> u16 {
        if self.in_use_ids.len() == self.in_use_ids.capacity() {
            panic!("execution node id pool exhausted")
        }

        while self.in_use_ids.contains(&self.next_id) {
            self.next_id += 1;
        }

        self.in_use_ids.insert(self.next_id);

        self.next_id
    }

    fn free_id(&mut self, id: &u16) {
        self.in_use_ids.remove(id);
    }
}

type NodeMessageRx = SplitStream<
    WebSocketStream<
        async_tungstenite::stream::Stream<
            TokioAdapter<TcpStream>,
            TokioAdapter<tokio_native_tls::TlsStream<tokio::net::TcpStream>>,
        >,
    >,
>;

type MessageHandlers = HashMap<u16, oneshot::Sender<Result<Value, RpcError>>>;

async fn handle_messages(
    mut ws_rx: NodeMessageRx,
    message_rx_map: Arc<Mutex<MessageHandlers>>,
    id_pool: Arc<Mutex<IdPool>>,
) {
    while let Some(message_result) = ws_rx.next().await {
        let message = message_result.expect("expect websocket message to be Ok");

        // We get ping messages too. Do nothing with those.
        if message.is_ping() {
            continue;
        }

        let message_bytes = message.into_data();
        let rpc_message = serde_json::from_slice::<RpcMessage>(&message_bytes)
            .expect("expect node messages to be JsonRpcMessages");

        let id = rpc_message.id();

        id_pool.lock().unwrap().free_id(&id);

        let tx = message_rx_map
            .lock()
            .unwrap()
            .remove(&id)
            .expect("expect a message handler for every received message id");

        match rpc_message {
            RpcMessage::Result { result, .. } => {
                tx.send(Ok(result)).unwrap();
            }
            RpcMessage::Error { error, .. } => {
                tx.send(Err(error)).unwrap();
            }
        };
    }
}

// Only the fields block pricing needs; the node returns many more. Pricing
// pre-London blocks is unsupported, base_fee_per_gas is required.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct ExecutionBlock {
    #[serde(deserialize_with = "from_u64_hex_str")]
    gas_used: u64,
    #[serde(deserialize_with = "from_u64_hex_str")]
    base_fee_per_gas: u64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    transaction_hash: TxHash,
    #[serde(deserialize_with = "from_u64_hex_str")]
    transaction_index: u64,
    #[serde(deserialize_with = "from_u64_hex_str")]
    gas_used: u64,
    #[serde(deserialize_with = "from_u128_hex_str")]
    effective_gas_price: u128,
}

/// What the proposer of a block earned from it directly: the transaction
/// fees that remain after the base-fee burn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockReward {
    pub total: WeiNewtype,
    /// None for blocks without transactions.
    pub last_tx_hash: Option<TxHash>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// None for contract creations.
    pub to: Option<Address>,
    #[serde(deserialize_with = "from_wei_hex_str")]
    pub value: WeiNewtype,
    #[serde(deserialize_with = "from_u64_hex_str")]
    pub transaction_index: u64,
}

#[automock]
#[async_trait]
pub trait ExecutionNode {
    async fn get_block_reward(&self, block_number: BlockNumber) -> Result<BlockReward>;
    async fn get_transaction_by_hash(&self, tx_hash: &str) -> Result<Transaction>;
}

fn block_reward_from_receipts(
    block: &ExecutionBlock,
    receipts: &[TransactionReceipt],
) -> BlockReward {
    let mut total_fees: i128 = 0;
    let mut last_receipt: Option<&TransactionReceipt> = None;

    for receipt in receipts {
        total_fees += receipt.effective_gas_price as i128 * receipt.gas_used as i128;
        if last_receipt.map_or(true, |last| receipt.transaction_index > last.transaction_index) {
            last_receipt = Some(receipt);
        }
    }

    let burnt_fees = block.base_fee_per_gas as i128 * block.gas_used as i128;

    BlockReward {
        total: WeiNewtype(total_fees - burnt_fees),
        last_tx_hash: last_receipt.map(|receipt| receipt.transaction_hash.clone()),
    }
}

pub struct ExecutionNodeWs {
    id_pool: Arc<Mutex<IdPool>>,
    message_rx_map: Arc<Mutex<MessageHandlers>>,
    message_tx: mpsc::Sender<Message>,
}

impl ExecutionNodeWs {
    pub async fn connect() -> Self {
        Self::connect_to(&ENV_CONFIG.geth_url).await
    }

    pub async fn connect_to(url: &str) -> Self {
        let id_pool_am = Arc::new(Mutex::new(IdPool::new(u16::MAX.into())));

        let message_rx_map = Arc::new(Mutex::new(HashMap::with_capacity(u16::MAX.into())));

        let (connected_socket, _) = connect_async(url)
            .await
            .expect("expect execution node websocket connection to succeed");
        let (mut sink, stream) = connected_socket.split();

        // We'd like to read websocket messages concurrently so we read in a thread.
        // The websocket uses pipelining, so IDs are used to match request and response.
        // We'd like the request to wait for a response (from the thread).
        // Currently we use a HashMap + callback channel system, this means requests hang
        // when the websocket thread panics. As a workaround we panic main when this
        // thread panics.
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            std::process::exit(1);
        }));

        let id_pool_ref = id_pool_am.clone();
        let message_handlers_ref = message_rx_map.clone();
        tokio::spawn(async move {
            handle_messages(stream, message_handlers_ref, id_pool_ref).await;
        });

        let (message_tx, mut rx) = mpsc::channel(512);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                sink.send(message).await.unwrap();
            }
        });

        ExecutionNodeWs {
            id_pool: id_pool_am,
            message_rx_map,
            message_tx,
        }
    }

    async fn call(&self, method: &str, params: &Value) -> Result<serde_json::Value, RpcError> {
        let id = self.id_pool.lock().unwrap().get_next_id();

        let json = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        let message = serde_json::to_string(&json).unwrap();

        let (tx, rx) = oneshot::channel();

        self.message_rx_map.lock().unwrap().insert(id, tx);
        self.message_tx.send(Message::Text(message)).await.unwrap();

        rx.await.unwrap()
    }

    async fn get_block_by_number(&self, block_number: BlockNumber) -> Result<Option<ExecutionBlock>> {
        let hex_number = format!("0x{block_number:x}");
        let value = self
            .call("eth_getBlockByNumber", &json!((hex_number, false)))
            .await?;
        let block = serde_json::from_value::<Option<ExecutionBlock>>(value)?;
        Ok(block)
    }

    async fn get_block_receipts(&self, block_number: BlockNumber) -> Result<Vec<TransactionReceipt>> {
        let hex_number = format!("0x{block_number:x}");
        let value = self
            .call("eth_getBlockReceipts", &json!((hex_number,)))
            .await?;
        serde_json::from_value::<Option<Vec<TransactionReceipt>>>(value)?
            .with_context(|| format!("receipts unavailable for block {block_number}"))
    }
}

#[async_trait]
impl ExecutionNode for ExecutionNodeWs {
    async fn get_block_reward(&self, block_number: BlockNumber) -> Result<BlockReward> {
        let block = self
            .get_block_by_number(block_number)
            .await?
            .with_context(|| format!("no block found for block number {block_number}"))?;

        let receipts = self.get_block_receipts(block_number).await?;

        Ok(block_reward_from_receipts(&block, &receipts))
    }

    async fn get_transaction_by_hash(&self, tx_hash: &str) -> Result<Transaction> {
        let value = self
            .call("eth_getTransactionByHash", &json!((tx_hash,)))
            .await?;
        serde_json::from_value::<Option<Transaction>>(value)?
            .with_context(|| format!("transaction unavailable for tx hash: {tx_hash}"))
    }
}
