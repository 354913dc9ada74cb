//! Bounded admission for client runner tasks.
//!
//! Two independent ceilings are enforced at submission time: a global
//! worker budget shared across all executions and a per-owner budget. A
//! submission that would breach either ceiling is rejected synchronously;
//! there is no queue behind the ceilings.
use std::collections::HashMap;
use std::sync::Arc;

use arcshift::ArcShift;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

use crate::error::{LimitKind, OrchestrateError};

#[cfg(test)]
mod tests;

#[derive(Clone)]
pub struct WorkerPool {
    global: Arc<Semaphore>,
    per_owner: ArcShift<HashMap<String, usize>>,
    max_client_workers: usize,
    max_clients_per_user: usize,
}

impl WorkerPool {
    #[must_use]
    pub fn new(max_client_workers: usize, max_clients_per_user: usize) -> Self {
        Self {
            global: Arc::new(Semaphore::new(max_client_workers)),
            per_owner: ArcShift::new(HashMap::new()),
            max_client_workers,
            max_clients_per_user,
        }
    }

    /// Admits `client_count` workers for `owner`, or rejects without
    /// allocating anything.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrateError::LimitExceeded`] when either ceiling
    /// would be breached, and [`OrchestrateError::NoClients`] for an empty
    /// request.
    pub fn admit(&mut self, owner: &str, client_count: usize) -> Result<PoolPermit, OrchestrateError> {
        if client_count == 0 {
            return Err(OrchestrateError::NoClients);
        }
        if client_count > self.max_client_workers {
            return Err(OrchestrateError::LimitExceeded {
                kind: LimitKind::ClientWorkers,
                requested: client_count,
                ceiling: self.max_client_workers,
            });
        }

        let running = self
            .per_owner
            .get()
            .get(owner)
            .copied()
            .unwrap_or(0);
        if running + client_count > self.max_clients_per_user {
            return Err(OrchestrateError::LimitExceeded {
                kind: LimitKind::ClientsPerUser,
                requested: running + client_count,
                ceiling: self.max_clients_per_user,
            });
        }

        let permits_wanted = u32::try_from(client_count).unwrap_or(u32::MAX);
        let permits = match Arc::clone(&self.global).try_acquire_many_owned(permits_wanted) {
            Ok(permits) => permits,
            Err(TryAcquireError::NoPermits) => {
                return Err(OrchestrateError::LimitExceeded {
                    kind: LimitKind::ClientWorkers,
                    requested: client_count,
                    ceiling: self.max_client_workers,
                });
            }
            Err(TryAcquireError::Closed) => {
                // The pool owns the semaphore and never closes it.
                return Err(OrchestrateError::LimitExceeded {
                    kind: LimitKind::ClientWorkers,
                    requested: client_count,
                    ceiling: self.max_client_workers,
                });
            }
        };

        let owner_key = owner.to_owned();
        self.per_owner.rcu(|current| {
            let mut next = current.clone();
            *next.entry(owner_key.clone()).or_insert(0) += client_count;
            next
        });

        Ok(PoolPermit {
            _permits: permits,
            per_owner: self.per_owner.clone(),
            owner: owner.to_owned(),
            client_count,
        })
    }

    /// Currently admitted client count for an owner.
    pub fn running_for(&mut self, owner: &str) -> usize {
        self.per_owner.get().get(owner).copied().unwrap_or(0)
    }
}

/// Holds both ceilings for the lifetime of one execution; dropping it
/// releases the global permits and the owner's count.
#[derive(Debug)]
pub struct PoolPermit {
    _permits: OwnedSemaphorePermit,
    per_owner: ArcShift<HashMap<String, usize>>,
    owner: String,
    client_count: usize,
}

impl Drop for PoolPermit {
    fn drop(&mut self) {
        let owner = self.owner.clone();
        let count = self.client_count;
        self.per_owner.rcu(|current| {
            let mut next = current.clone();
            match next.get_mut(&owner) {
                Some(running) if *running > count => *running -= count,
                Some(_) => {
                    next.remove(&owner);
                }
                None => {}
            }
            next
        });
    }
}
