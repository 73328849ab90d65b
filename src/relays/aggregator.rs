use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::try_join_all;

use crate::beacon_chain::Slot;
use crate::retry::retry_with_backoff;

use super::{BidTrace, RelayApi};

// Relays flake occasionally; two attempts absorb the common case.
const ATTEMPTS_PER_RELAY: u32 = 2;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Asks every configured relay which payload it delivered for a slot,
/// concurrently, and merges the answers.
///
/// Any relay failing, even after retries, fails the whole aggregation and
/// cancels the outstanding queries. The merged order depends on completion
/// order; callers get slot-exact entries, nothing more.
pub async fn bid_traces_for_slot(
    relays: &[Arc<dyn RelayApi + Send + Sync>],
    slot: Slot,
) -> Result<Vec<BidTrace>> {
    let queries = relays.iter().map(|relay| async move {
        let bid_traces = retry_with_backoff(ATTEMPTS_PER_RELAY, INITIAL_BACKOFF, || {
            relay.delivered_bid_traces(slot)
        })
        .await
        .map_err(anyhow::Error::new)?;

        // The cursor query is lenient, neighboring slots may come back.
        let matching = bid_traces
            .into_iter()
            .filter(|bid_trace| bid_trace.slot == slot)
            .collect::<Vec<_>>();

        Ok::<_, anyhow::Error>(matching)
    });

    let per_relay = try_join_all(queries).await?;

    Ok(per_relay.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use mockall::Sequence;

    use crate::relays::MockRelayApi;
    use crate::units::WeiNewtype;

    use super::*;

    const SLOT: Slot = Slot(10031063);

    fn bid_trace(slot: Slot, value: i128) -> BidTrace {
        BidTrace {
            slot,
            value: WeiNewtype(value),
            proposer_fee_recipient: "0xeBec795c9c8bBD61FFc14A6662944748F299cAcf".to_string(),
            block_number: 20821772,
        }
    }

    fn as_relays(mocks: Vec<MockRelayApi>) -> Vec<Arc<dyn RelayApi + Send + Sync>> {
        mocks
            .into_iter()
            .map(|mock| Arc::new(mock) as Arc<dyn RelayApi + Send + Sync>)
            .collect()
    }

    #[tokio::test]
    async fn keeps_only_requested_slot_test() {
        let mut relay = MockRelayApi::new();
        relay.expect_delivered_bid_traces().returning(|_| {
            Ok(vec![
                bid_trace(SLOT, 55766506090015659),
                bid_trace(SLOT - 1, 11111111111111111),
                bid_trace(SLOT + 1, 22222222222222222),
            ])
        });

        let bid_traces = bid_traces_for_slot(&as_relays(vec![relay]), SLOT)
            .await
            .unwrap();

        assert_eq!(bid_traces.len(), 1);
        assert!(bid_traces.iter().all(|bid_trace| bid_trace.slot == SLOT));
    }

    #[tokio::test]
    async fn merges_across_sixteen_relays_test() {
        // Sixteen endpoints, some duplicated providers: three deliver the
        // requested slot, six answer with a neighboring slot, the rest are
        // empty.
        let mut relays = Vec::new();
        for i in 0..16 {
            let mut relay = MockRelayApi::new();
            relay.expect_delivered_bid_traces().returning(move |_| {
                if i % 5 == 0 {
                    // 0, 5, 10, 15 would be four; 15 answers empty below.
                    if i == 15 {
                        return Ok(vec![]);
                    }
                    Ok(vec![bid_trace(SLOT, 55766506090015659)])
                } else if i % 2 == 0 {
                    Ok(vec![bid_trace(SLOT + 1, 99999999)])
                } else {
                    Ok(vec![])
                }
            });
            relays.push(relay);
        }

        let bid_traces = bid_traces_for_slot(&as_relays(relays), SLOT).await.unwrap();

        assert_eq!(bid_traces.len(), 3);
        assert!(bid_traces
            .iter()
            .all(|bid_trace| bid_trace.slot == SLOT
                && bid_trace.value == WeiNewtype(55766506090015659)));
    }

    #[tokio::test]
    async fn one_failing_relay_fails_aggregation_test() {
        let mut healthy = MockRelayApi::new();
        healthy
            .expect_delivered_bid_traces()
            .returning(|_| Ok(vec![bid_trace(SLOT, 55766506090015659)]));

        let mut broken = MockRelayApi::new();
        broken
            .expect_delivered_bid_traces()
            .times(2)
            .returning(|_| Err(anyhow!("relay unreachable")));

        let result = bid_traces_for_slot(&as_relays(vec![healthy, broken]), SLOT).await;

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("gave up after 2 attempts"));
    }

    #[tokio::test]
    async fn transient_relay_failure_is_retried_test() {
        let mut relay = MockRelayApi::new();
        let mut seq = Sequence::new();
        relay
            .expect_delivered_bid_traces()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(anyhow!("connection reset")));
        relay
            .expect_delivered_bid_traces()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(vec![bid_trace(SLOT, 55766506090015659)]));

        let bid_traces = bid_traces_for_slot(&as_relays(vec![relay]), SLOT)
            .await
            .unwrap();

        assert_eq!(bid_traces.len(), 1);
    }

    #[tokio::test]
    async fn no_relays_no_bid_traces_test() {
        let bid_traces = bid_traces_for_slot(&[], SLOT).await.unwrap();
        assert!(bid_traces.is_empty());
    }
}
