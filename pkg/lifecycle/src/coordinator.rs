use chrono::{DateTime, Duration, Utc};
use pkg_provisioner::chain::ChainDirectory;
use pkg_provisioner::{DeleteResult, Provisioner};
use pkg_state::LeaseRepository;
use pkg_types::lease::{
    CreateLeaseRequest, CreatedLease, DeleteOutcome, LeaseDetail, LeaseStatus, LeaseView,
    NodeLease, NodeSelector,
};
use pkg_types::validate::{validate_blockchain_id, validate_subnet_id};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::LifecycleError;

/// Lease policy.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Lease lifetime, applied locally regardless of provider expiry
    pub lease_ttl: Duration,
    /// Base of the derived per-chain RPC URL
    pub rpc_base_url: String,
}

/// Orchestrates the lease repository and the provisioning service.
///
/// The local store decides success or failure of every read; the provider
/// only ever adds optional detail there. Creates fail when the provider
/// fails. Deletes always terminate locally.
#[derive(Clone)]
pub struct LeaseCoordinator {
    repo: LeaseRepository,
    provisioner: Option<Arc<dyn Provisioner>>,
    chains: Option<Arc<dyn ChainDirectory>>,
    config: LifecycleConfig,
}

impl LeaseCoordinator {
    pub fn new(
        repo: LeaseRepository,
        provisioner: Option<Arc<dyn Provisioner>>,
        chains: Option<Arc<dyn ChainDirectory>>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            repo,
            provisioner,
            chains,
            config,
        }
    }

    pub fn provider_configured(&self) -> bool {
        self.provisioner.is_some()
    }

    fn rpc_url(&self, blockchain_id: &str) -> String {
        format!(
            "{}/ext/bc/{}/rpc",
            self.config.rpc_base_url.trim_end_matches('/'),
            blockchain_id
        )
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, LifecycleError> {
        now.checked_add_signed(self.config.lease_ttl).ok_or_else(|| {
            LifecycleError::Internal(anyhow::anyhow!(
                "lease TTL {} overflows the current time",
                self.config.lease_ttl
            ))
        })
    }

    /// All active leases of `user_id`, newest first.
    pub async fn list(&self, user_id: &str) -> Result<Vec<LeaseView>, LifecycleError> {
        let now = Utc::now();
        let leases = self.repo.list_active_by_user(user_id).await?;
        Ok(leases.into_iter().map(|l| LeaseView::new(l, now)).collect())
    }

    async fn find_active(
        &self,
        user_id: &str,
        subnet_id: &str,
        selector: &NodeSelector,
    ) -> Result<NodeLease, LifecycleError> {
        let found = match selector {
            NodeSelector::Index(index) => {
                self.repo
                    .find_active_by_key(user_id, subnet_id, *index)
                    .await?
            }
            NodeSelector::LeaseId(id) => self.repo.find_active_by_id(user_id, subnet_id, id).await?,
        };
        found.ok_or_else(|| LifecycleError::NotFound(format!("{}/{}", subnet_id, selector)))
    }

    /// One active lease, with live provider status attached when available.
    pub async fn get(
        &self,
        user_id: &str,
        subnet_id: &str,
        selector: &NodeSelector,
    ) -> Result<LeaseDetail, LifecycleError> {
        let lease = self.find_active(user_id, subnet_id, selector).await?;

        let live = match (&self.provisioner, lease.node_index) {
            (Some(provisioner), Some(index)) => match provisioner.subnet_status(subnet_id).await {
                Ok(nodes) => nodes.into_iter().find(|n| n.node_index == index),
                Err(e) => {
                    warn!(
                        "Live status unavailable for {}/{}, serving stored lease: {}",
                        subnet_id, index, e
                    );
                    None
                }
            },
            _ => None,
        };

        Ok(LeaseDetail {
            view: LeaseView::new(lease, Utc::now()),
            live,
        })
    }

    async fn resolve_chain_name(&self, blockchain_id: &str) -> Option<String> {
        let chains = self.chains.as_ref()?;
        match chains.chain_name(blockchain_id).await {
            Ok(name) => name,
            Err(e) => {
                warn!("Chain name lookup for {} failed: {}", blockchain_id, e);
                None
            }
        }
    }

    /// Provision a node and record (or revive) the caller's lease for it.
    pub async fn create(
        &self,
        user_id: &str,
        req: CreateLeaseRequest,
    ) -> Result<CreatedLease, LifecycleError> {
        let subnet_id = req.subnet_id.trim();
        let blockchain_id = req.blockchain_id.trim();
        validate_subnet_id(subnet_id).map_err(|e| LifecycleError::Validation(e.to_string()))?;
        validate_blockchain_id(blockchain_id)
            .map_err(|e| LifecycleError::Validation(e.to_string()))?;

        let provisioner = self
            .provisioner
            .as_ref()
            .ok_or(LifecycleError::ServiceUnavailable)?;

        // Refuse before a remote node exists if the expiry cannot be computed.
        self.expiry_from(Utc::now())?;

        let chain_name = self.resolve_chain_name(blockchain_id).await;

        let node = provisioner.provision(subnet_id).await.inspect_err(|e| {
            warn!("Provisioning failed for user={} subnet={}: {}", user_id, subnet_id, e);
        })?;
        info!(
            "Provider assigned node index {} ({}) in subnet {} to user={}",
            node.node_index, node.identity.node_id, subnet_id, user_id
        );

        let now = Utc::now();
        let expires_at = self.expiry_from(now)?;
        let lease = NodeLease {
            id: String::new(),
            user_id: user_id.to_string(),
            subnet_id: subnet_id.to_string(),
            blockchain_id: blockchain_id.to_string(),
            node_id: node.identity.node_id.clone(),
            node_index: Some(node.node_index),
            public_key: node.identity.public_key.clone(),
            proof_of_possession: node.identity.proof_of_possession.clone(),
            rpc_url: self.rpc_url(blockchain_id),
            chain_name,
            created_at: now,
            provider_created_at: Some(node.created_at),
            expires_at,
            status: LeaseStatus::Active,
        };

        let existing = self
            .repo
            .find_any_by_key(user_id, subnet_id, node.node_index)
            .await?;
        let (lease, revived) = match existing {
            None => (self.repo.create(lease).await?, false),
            Some(current) if current.is_active() => {
                warn!(
                    "User {} already holds an active lease on {}/{}; remote node left to expire",
                    user_id, subnet_id, node.node_index
                );
                return Err(LifecycleError::Conflict(format!(
                    "an active lease already exists for node {} in subnet {}",
                    node.node_index, subnet_id
                )));
            }
            Some(_) => (self.repo.revive_and_update(lease).await?, true),
        };

        Ok(CreatedLease {
            lease,
            node: node.identity,
            revived,
        })
    }

    /// Terminate the caller's lease and ask the provider to drop the node.
    ///
    /// Provider failures are logged and reported in the outcome; the local
    /// lease is terminated regardless.
    pub async fn delete(
        &self,
        user_id: &str,
        subnet_id: &str,
        selector: &NodeSelector,
    ) -> Result<DeleteOutcome, LifecycleError> {
        let lease = self.find_active(user_id, subnet_id, selector).await?;

        let outcome = match lease.node_index {
            None => DeleteOutcome::LocalOnly,
            Some(index) => {
                let provisioner = self
                    .provisioner
                    .as_ref()
                    .ok_or(LifecycleError::ServiceUnavailable)?;
                match provisioner.delete_node(subnet_id, index).await {
                    Ok(DeleteResult::Deleted) => DeleteOutcome::ProviderDeleted,
                    Ok(DeleteResult::AlreadyGone) => DeleteOutcome::ProviderAlreadyGone,
                    Err(e) => {
                        warn!(
                            "Provider delete of {}/{} failed, terminating lease anyway: {}",
                            subnet_id, index, e
                        );
                        DeleteOutcome::ProviderFailed
                    }
                }
            }
        };

        self.repo.mark_terminated(&lease).await?;
        info!(
            "Lease {} ({}/{}) of user={} terminated: {:?}",
            lease.id, subnet_id, selector, user_id, outcome
        );
        Ok(outcome)
    }
}
