//! Durable lease records.
//!
//! Uniqueness of `(user, subnet, node index)` is enforced here, not by
//! callers: every write re-reads its key under a single write gate, so two
//! racing creates for the same key produce one record and one
//! [`StoreError::Conflict`].

use pkg_constants::state::{LEASE_KEY_PREFIX, NODE_INDEX_KEY_WIDTH, UNINDEXED_SLOT_PREFIX};
use pkg_types::lease::{LeaseStatus, NodeLease};
use pkg_types::validate::validate_user_id;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::StateStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A write would break the one-record-per-key invariant.
    #[error("lease already exists at {0}")]
    Conflict(String),

    #[error("no lease at {0}")]
    NotFound(String),

    #[error("invalid lease key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(e.into())
    }
}

/// Lease persistence on top of the SlateDB [`StateStore`].
#[derive(Clone)]
pub struct LeaseRepository {
    store: StateStore,
    write_gate: Arc<Mutex<()>>,
}

impl LeaseRepository {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            write_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Key segment identifying a lease within its subnet.
    pub fn slot(node_index: Option<u32>, lease_id: &str) -> String {
        match node_index {
            Some(index) => format!("{:0width$}", index, width = NODE_INDEX_KEY_WIDTH),
            None => format!("{}{}", UNINDEXED_SLOT_PREFIX, lease_id),
        }
    }

    fn user_prefix(user_id: &str) -> Result<String, StoreError> {
        validate_user_id(user_id).map_err(|e| StoreError::InvalidKey(e.to_string()))?;
        Ok(format!("{}{}/", LEASE_KEY_PREFIX, user_id))
    }

    fn key(user_id: &str, subnet_id: &str, slot: &str) -> Result<String, StoreError> {
        if subnet_id.is_empty() || subnet_id.contains('/') {
            return Err(StoreError::InvalidKey(format!("subnet id '{}'", subnet_id)));
        }
        Ok(format!("{}{}/{}", Self::user_prefix(user_id)?, subnet_id, slot))
    }

    fn lease_key(lease: &NodeLease) -> Result<String, StoreError> {
        Self::key(
            &lease.user_id,
            &lease.subnet_id,
            &Self::slot(lease.node_index, &lease.id),
        )
    }

    async fn load(&self, key: &str) -> Result<Option<NodeLease>, StoreError> {
        match self.store.get(key).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, lease: &NodeLease) -> Result<(), StoreError> {
        let data = serde_json::to_vec(lease)?;
        self.store.put(key, &data).await?;
        Ok(())
    }

    /// The lease at `(user, subnet, index)` in any status.
    pub async fn find_any_by_key(
        &self,
        user_id: &str,
        subnet_id: &str,
        node_index: u32,
    ) -> Result<Option<NodeLease>, StoreError> {
        let key = Self::key(user_id, subnet_id, &Self::slot(Some(node_index), ""))?;
        self.load(&key).await
    }

    /// The lease at `(user, subnet, index)` if it is active.
    pub async fn find_active_by_key(
        &self,
        user_id: &str,
        subnet_id: &str,
        node_index: u32,
    ) -> Result<Option<NodeLease>, StoreError> {
        Ok(self
            .find_any_by_key(user_id, subnet_id, node_index)
            .await?
            .filter(NodeLease::is_active))
    }

    /// An active lease of this user in this subnet, by lease id.
    pub async fn find_active_by_id(
        &self,
        user_id: &str,
        subnet_id: &str,
        lease_id: &str,
    ) -> Result<Option<NodeLease>, StoreError> {
        let prefix = Self::key(user_id, subnet_id, "")?;
        let entries = self.store.list_prefix(&prefix).await?;
        Ok(decode_all(entries)
            .into_iter()
            .find(|l| l.id == lease_id && l.is_active()))
    }

    /// All active leases of a user, newest first.
    pub async fn list_active_by_user(&self, user_id: &str) -> Result<Vec<NodeLease>, StoreError> {
        let prefix = Self::user_prefix(user_id)?;
        let entries = self.store.list_prefix(&prefix).await?;
        let mut leases: Vec<NodeLease> = decode_all(entries)
            .into_iter()
            .filter(NodeLease::is_active)
            .collect();
        leases.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(leases)
    }

    /// Insert a new lease. Fails with `Conflict` if any record (active or not)
    /// already occupies its key.
    pub async fn create(&self, mut lease: NodeLease) -> Result<NodeLease, StoreError> {
        if lease.id.is_empty() {
            lease.id = uuid::Uuid::new_v4().to_string();
        }
        let key = Self::lease_key(&lease)?;

        let _gate = self.write_gate.lock().await;
        if self.load(&key).await?.is_some() {
            warn!("Refusing to create lease over existing record {}", key);
            return Err(StoreError::Conflict(key));
        }
        self.save(&key, &lease).await?;
        info!(
            "Created lease {} for user={} subnet={} slot={}",
            lease.id,
            lease.user_id,
            lease.subnet_id,
            Self::slot(lease.node_index, &lease.id)
        );
        Ok(lease)
    }

    /// Overwrite a terminated lease in place and flip it back to active.
    ///
    /// The stored record keeps its id; every other field comes from `revived`.
    /// Fails with `Conflict` if the record is active by the time the gate is
    /// taken, and `NotFound` if there is nothing to revive.
    pub async fn revive_and_update(&self, mut revived: NodeLease) -> Result<NodeLease, StoreError> {
        let key = Self::lease_key(&revived)?;

        let _gate = self.write_gate.lock().await;
        let existing = self
            .load(&key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.clone()))?;
        if existing.is_active() {
            warn!("Refusing to revive active lease {}", key);
            return Err(StoreError::Conflict(key));
        }

        revived.id = existing.id;
        revived.status = LeaseStatus::Active;
        self.save(&key, &revived).await?;
        info!(
            "Revived lease {} for user={} subnet={}",
            revived.id, revived.user_id, revived.subnet_id
        );
        Ok(revived)
    }

    /// Terminate the active record stored under this lease's
    /// `(user, subnet, slot)`. Returns whether a record changed.
    pub async fn mark_terminated(&self, lease: &NodeLease) -> Result<bool, StoreError> {
        let key = Self::lease_key(lease)?;

        let _gate = self.write_gate.lock().await;
        match self.load(&key).await? {
            Some(mut current) if current.is_active() => {
                current.status = LeaseStatus::Terminated;
                self.save(&key, &current).await?;
                info!("Terminated lease {} ({})", current.id, key);
                Ok(true)
            }
            _ => {
                debug!("No active lease to terminate at {}", key);
                Ok(false)
            }
        }
    }
}

fn decode_all(entries: Vec<(String, Vec<u8>)>) -> Vec<NodeLease> {
    entries
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_slice(&value) {
            Ok(lease) => Some(lease),
            Err(e) => {
                warn!("Skipping unreadable lease record {}: {}", key, e);
                None
            }
        })
        .collect()
}
