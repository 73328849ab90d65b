use anyhow::Result;
use async_trait::async_trait;
use format_url::FormatUrl;
use mockall::automock;

use crate::beacon_chain::Slot;

use super::BidTrace;

#[automock]
#[async_trait]
pub trait RelayApi {
    async fn delivered_bid_traces(&self, slot: Slot) -> Result<Vec<BidTrace>>;
}

pub struct RelayApiHttp {
    server_url: String,
    client: reqwest::Client,
}

impl RelayApiHttp {
    pub fn new(server_url: &str) -> Self {
        Self {
            server_url: server_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RelayApi for RelayApiHttp {
    // `limit=1` since only the exact requested slot is of interest, the
    // cursor makes the relay start there.
    async fn delivered_bid_traces(&self, slot: Slot) -> Result<Vec<BidTrace>> {
        let url = FormatUrl::new(&self.server_url)
            .with_path_template("/relay/v1/data/bidtraces/proposer_payload_delivered")
            .with_query_params(vec![("limit", "1"), ("cursor", &slot.to_string())])
            .format_url();

        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<BidTrace>>()
            .await
            .map_err(Into::into)
    }
}
