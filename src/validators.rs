//! Maps validator indices to public keys from a point-in-time snapshot of the
//! full validator set.
//!
//! The snapshot fetch is expensive, so a rebuild is single-flighted: a caller
//! either starts the fetch and registers a shared completion future, or
//! attaches to the one already in flight. Everyone waiting observes the same
//! result, and exactly one fetch runs no matter how many requests miss at
//! once. The directory lives only in process memory and is rebuilt lazily
//! after a restart.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use thiserror::Error;

use crate::beacon_chain::{BeaconNode, Pubkey, ValidatorIndex};

type ValidatorMap = HashMap<ValidatorIndex, Pubkey>;

#[derive(Clone, Debug, Error)]
#[error("failed to rebuild validator directory: {0}")]
pub struct RebuildError(Arc<anyhow::Error>);

impl RebuildError {
    fn new(err: anyhow::Error) -> Self {
        Self(Arc::new(err))
    }
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Rebuild(#[from] RebuildError),
    #[error("validator index {0} missing from directory after rebuild")]
    MissingIndex(ValidatorIndex),
}

type RebuildHandle = Shared<BoxFuture<'static, Result<Arc<ValidatorMap>, RebuildError>>>;

struct Inner {
    beacon_node: Arc<dyn BeaconNode + Send + Sync>,
    snapshot: RwLock<Option<Arc<ValidatorMap>>>,
    in_flight: Mutex<Option<RebuildHandle>>,
}

pub struct ValidatorDirectory {
    inner: Arc<Inner>,
}

impl ValidatorDirectory {
    pub fn new(beacon_node: Arc<dyn BeaconNode + Send + Sync>) -> Self {
        Self {
            inner: Arc::new(Inner {
                beacon_node,
                snapshot: RwLock::new(None),
                in_flight: Mutex::new(None),
            }),
        }
    }

    fn lookup(&self, index: &str) -> Option<Pubkey> {
        self.inner
            .snapshot
            .read()
            .unwrap()
            .as_ref()
            .and_then(|snapshot| snapshot.get(index).cloned())
    }

    /// Replaces the directory with a fresh snapshot of the validator set at
    /// the current head slot, or attaches to a replacement already underway.
    pub async fn rebuild(&self) -> Result<Arc<ValidatorMap>, RebuildError> {
        let rebuild = {
            let mut in_flight = self.inner.in_flight.lock().unwrap();
            match in_flight.as_ref() {
                Some(rebuild) => rebuild.clone(),
                None => {
                    let inner = self.inner.clone();
                    let rebuild: RebuildHandle = async move {
                        let head_slot = inner
                            .beacon_node
                            .get_head_slot()
                            .await
                            .map_err(RebuildError::new)?;

                        let validators = inner
                            .beacon_node
                            .get_validators_by_slot(head_slot)
                            .await
                            .map_err(RebuildError::new)?;

                        let snapshot: Arc<ValidatorMap> = Arc::new(
                            validators
                                .into_iter()
                                .map(|validator| validator.into_entry())
                                .collect(),
                        );

                        *inner.snapshot.write().unwrap() = Some(snapshot.clone());

                        Ok(snapshot)
                    }
                    .boxed()
                    .shared();

                    *in_flight = Some(rebuild.clone());
                    rebuild
                }
            }
        };

        let result = rebuild.clone().await;

        // Whoever gets here first retires the flight; a failed rebuild must
        // not pin its error forever.
        let mut in_flight = self.inner.in_flight.lock().unwrap();
        if in_flight
            .as_ref()
            .map_or(false, |current| current.ptr_eq(&rebuild))
        {
            *in_flight = None;
        }

        result
    }

    /// Resolves an index to its public key, repairing a cache miss with one
    /// rebuild. An index still unknown after that is a data inconsistency.
    pub async fn pubkey_for_index(&self, index: &str) -> Result<Pubkey, LookupError> {
        if let Some(pubkey) = self.lookup(index) {
            return Ok(pubkey);
        }

        let snapshot = self.rebuild().await?;

        snapshot
            .get(index)
            .cloned()
            .ok_or_else(|| LookupError::MissingIndex(index.to_string()))
    }
}
