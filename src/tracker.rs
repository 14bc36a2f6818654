use alloy::primitives::Address;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::config::HistoryConfig;
use crate::indexer::source::LogSource;
use crate::indexer::types::TransactionRecord;
use crate::pipeline::{log_cycle_failure, HistoryPipeline};

/// What consumers observe: the latest history and whether a cycle is running.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryState {
    pub account: Option<Address>,
    pub transactions: Vec<TransactionRecord>,
    pub is_loading: bool,
    /// Token of the most recently triggered cycle.
    pub generation: u64,
}

/// How a spawned fetch cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Applied { records: usize },
    /// The cycle failed and an empty history was published.
    Failed,
    /// A newer cycle was triggered first; the result was discarded.
    Stale,
}

struct Inputs<S: ?Sized> {
    account: Option<Address>,
    pipeline: Option<Arc<HistoryPipeline<S>>>,
}

struct Inner<S: ?Sized> {
    contract: Address,
    config: HistoryConfig,
    inputs: Mutex<Inputs<S>>,
    state: watch::Sender<HistoryState>,
}

/// Keeps one account's history current. A cycle re-runs whenever the
/// account or the log source changes, or on `refresh`. Each cycle carries
/// a generation token and only the latest one may publish.
pub struct HistoryTracker<S: ?Sized> {
    inner: Arc<Inner<S>>,
}

impl<S: ?Sized> Clone for HistoryTracker<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: LogSource + ?Sized + 'static> HistoryTracker<S> {
    pub fn new(contract: Address, config: HistoryConfig) -> Self {
        let (state, _) = watch::channel(HistoryState::default());
        Self {
            inner: Arc::new(Inner {
                contract,
                config,
                inputs: Mutex::new(Inputs {
                    account: None,
                    pipeline: None,
                }),
                state,
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<HistoryState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> HistoryState {
        self.inner.state.borrow().clone()
    }

    /// Pipeline for the current source, for one-shot queries.
    pub async fn pipeline(&self) -> Option<Arc<HistoryPipeline<S>>> {
        self.inner.inputs.lock().await.pipeline.clone()
    }

    /// Switch the subject account. `None` disables the pipeline. Returns the
    /// spawned cycle, if one was started.
    pub async fn set_account(&self, account: Option<Address>) -> Option<JoinHandle<CycleOutcome>> {
        let mut inputs = self.inner.inputs.lock().await;
        if inputs.account == account {
            return None;
        }
        inputs.account = account;
        self.restart(&inputs)
    }

    /// Attach or detach the log source.
    pub async fn set_source(&self, source: Option<Arc<S>>) -> Option<JoinHandle<CycleOutcome>> {
        let mut inputs = self.inner.inputs.lock().await;
        let unchanged = match (&inputs.pipeline, &source) {
            (None, None) => true,
            (Some(current), Some(new)) => Arc::ptr_eq(current.source(), new),
            _ => false,
        };
        if unchanged {
            return None;
        }

        inputs.pipeline = source.map(|source| {
            Arc::new(HistoryPipeline::new(
                source,
                self.inner.contract,
                self.inner.config.clone(),
            ))
        });
        self.restart(&inputs)
    }

    /// Re-run with unchanged inputs.
    pub async fn refresh(&self) -> Option<JoinHandle<CycleOutcome>> {
        let inputs = self.inner.inputs.lock().await;
        self.restart(&inputs)
    }

    fn restart(&self, inputs: &Inputs<S>) -> Option<JoinHandle<CycleOutcome>> {
        let (Some(account), Some(pipeline)) = (inputs.account, inputs.pipeline.clone()) else {
            self.inner.state.send_modify(|s| {
                s.generation += 1;
                s.account = inputs.account;
                s.transactions.clear();
                s.is_loading = false;
            });
            tracing::debug!(account = ?inputs.account, "History pipeline disabled");
            return None;
        };

        let mut generation = 0;
        self.inner.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            if s.account != Some(account) {
                s.transactions.clear();
            }
            s.account = Some(account);
            s.is_loading = true;
        });

        tracing::debug!(account = %account, generation, "Starting history cycle");
        let inner = self.inner.clone();
        Some(tokio::spawn(async move {
            inner.run_cycle(generation, account, pipeline).await
        }))
    }
}

impl<S: LogSource + ?Sized> Inner<S> {
    async fn run_cycle(
        &self,
        generation: u64,
        account: Address,
        pipeline: Arc<HistoryPipeline<S>>,
    ) -> CycleOutcome {
        let result = pipeline.fetch(account).await;
        let failed = match &result {
            Ok(_) => false,
            Err(e) => {
                log_cycle_failure(account, e);
                true
            }
        };
        let records = result.unwrap_or_default();
        let count = records.len();

        // Checked under the channel lock, so a newer trigger cannot slip in
        // between the check and the write.
        let applied = self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            s.transactions = records;
            s.is_loading = false;
            true
        });

        if !applied {
            tracing::debug!(account = %account, generation, "Discarding stale history cycle");
            CycleOutcome::Stale
        } else if failed {
            CycleOutcome::Failed
        } else {
            CycleOutcome::Applied { records: count }
        }
    }
}
