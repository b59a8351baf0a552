//! Persisted value binding
//!
//! In-memory copy of one stored key for UI code. Reads are served from
//! memory; hydration and writes go through the store in the background.
//! Writes from one binding are queued and persisted in update order.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::SendError};
use tokio::sync::{oneshot, watch};

use crate::config::DataruniConfig;
use crate::store::StoreAccessor;

/// Current value and whether the initial load is still pending.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub value: T,
    pub is_loading: bool,
}

/// Resolves once the queued write has been attempted.
pub type WriteReceipt = oneshot::Receiver<()>;

struct PendingWrite<T> {
    value: T,
    done: oneshot::Sender<()>,
}

pub struct PersistedValue<T> {
    store: StoreAccessor,
    key: String,
    config: DataruniConfig,
    default_value: T,
    state: watch::Sender<Snapshot<T>>,
    /// Started on the first update; held while an update is enqueued.
    writer: Mutex<Option<mpsc::UnboundedSender<PendingWrite<T>>>>,
}

impl<T> PersistedValue<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(
        store: StoreAccessor,
        key: impl Into<String>,
        default_value: T,
        config: DataruniConfig,
    ) -> Self {
        let (state, _) = watch::channel(Snapshot {
            value: default_value.clone(),
            is_loading: true,
        });

        Self {
            store,
            key: key.into(),
            config,
            default_value,
            state,
            writer: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &DataruniConfig {
        &self.config
    }

    pub fn value(&self) -> T {
        self.state.borrow().value.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading
    }

    pub fn snapshot(&self) -> Snapshot<T> {
        self.state.borrow().clone()
    }

    /// Receiver notified on every hydration and update.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot<T>> {
        self.state.subscribe()
    }

    /// Load the stored value. Falls back to the default when the key is
    /// absent or the read fails.
    pub async fn hydrate(&self) -> T {
        let value = match self.store.get::<T>(&self.key, &self.config).await {
            Ok(Some(value)) => value,
            Ok(None) => self.default_value.clone(),
            Err(e) => {
                tracing::error!(key = %self.key, error = %e, "Error loading value");
                self.default_value.clone()
            }
        };

        self.state.send_replace(Snapshot {
            value: value.clone(),
            is_loading: false,
        });

        value
    }

    /// Replace the value and persist it in the background.
    pub fn set(&self, value: T) -> WriteReceipt {
        self.update(move |_| value)
    }

    /// Derive the next value from the current one and persist it in the
    /// background. A failed write is logged; the in-memory value stays.
    pub fn update<F>(&self, f: F) -> WriteReceipt
    where
        F: FnOnce(&T) -> T,
    {
        let mut writer = self.writer.lock();

        let next = f(&self.state.borrow().value);
        self.state.send_modify(|snapshot| snapshot.value = next.clone());

        let (done, receipt) = oneshot::channel();
        let mut write = PendingWrite { value: next, done };

        if let Some(tx) = writer.as_ref() {
            match tx.send(write) {
                Ok(()) => return receipt,
                Err(SendError(unsent)) => write = unsent,
            }
        }

        let tx = self.spawn_writer();
        if tx.send(write).is_err() {
            tracing::error!(key = %self.key, "Write queue closed, value not saved");
        }
        *writer = Some(tx);

        receipt
    }

    fn spawn_writer(&self) -> mpsc::UnboundedSender<PendingWrite<T>> {
        let (tx, mut rx) = mpsc::unbounded_channel::<PendingWrite<T>>();
        let store = self.store.clone();
        let key = self.key.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            while let Some(write) = rx.recv().await {
                if let Err(e) = store.set(&key, &write.value, &config).await {
                    tracing::error!(key = %key, error = %e, "Error saving value");
                }
                let _ = write.done.send(());
            }
        });

        tx
    }
}
