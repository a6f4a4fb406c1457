//! Job registry
//!
//! The engine owns a [`JobStore`] and writes every status change through
//! [`update_job`], a compare-and-swap loop keyed on the record's revision.
//! Terminal records are never modified.

use crate::error::{CoreError, Result};
use crate::model::{OperationId, ProvisioningJob};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, id: &OperationId) -> Result<Option<ProvisioningJob>>;

    /// Unconditionally store `job`, bumping its revision
    ///
    /// Any swap prepared against the previous revision fails afterwards.
    async fn set(&self, job: ProvisioningJob) -> Result<()>;

    /// Store `job` only if the current revision equals `expected_revision`
    /// (0 means "not present"). Returns whether the swap happened.
    async fn compare_and_swap(&self, expected_revision: u64, job: ProvisioningJob)
    -> Result<bool>;
}

/// Process-local store; empty at startup, gone at exit
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<OperationId, ProvisioningJob>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn get(&self, id: &OperationId) -> Result<Option<ProvisioningJob>> {
        Ok(self.jobs.get(id).map(|job| job.value().clone()))
    }

    async fn set(&self, mut job: ProvisioningJob) -> Result<()> {
        // Read and bump under one shard lock
        match self.jobs.entry(job.operation_id.clone()) {
            Entry::Occupied(mut current) => {
                job.revision = current.get().revision + 1;
                current.insert(job);
            }
            Entry::Vacant(slot) => {
                job.revision = 1;
                slot.insert(job);
            }
        }
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        expected_revision: u64,
        mut job: ProvisioningJob,
    ) -> Result<bool> {
        match self.jobs.entry(job.operation_id.clone()) {
            Entry::Occupied(mut current) => {
                if current.get().revision != expected_revision {
                    return Ok(false);
                }
                job.revision = expected_revision + 1;
                current.insert(job);
                Ok(true)
            }
            Entry::Vacant(slot) => {
                if expected_revision != 0 {
                    return Ok(false);
                }
                job.revision = 1;
                slot.insert(job);
                Ok(true)
            }
        }
    }
}

const MAX_UPDATE_ATTEMPTS: usize = 64;

/// Apply `mutate` to the stored job atomically
///
/// Returns the stored job after the update, or the unchanged job when it was
/// already terminal.
pub async fn update_job<F>(
    store: &dyn JobStore,
    id: &OperationId,
    mut mutate: F,
) -> Result<ProvisioningJob>
where
    F: FnMut(&mut ProvisioningJob) + Send,
{
    for _ in 0..MAX_UPDATE_ATTEMPTS {
        let current = store
            .get(id)
            .await?
            .ok_or_else(|| CoreError::Store(format!("job {} not found", id)))?;
        if current.status.is_terminal() {
            tracing::debug!(operation_id = %id, "ignoring update to finished job");
            return Ok(current);
        }

        let expected = current.revision;
        let mut next = current;
        mutate(&mut next);
        if store.compare_and_swap(expected, next.clone()).await? {
            next.revision = expected + 1;
            return Ok(next);
        }
    }
    Err(CoreError::Store(format!(
        "job {} kept changing during update",
        id
    )))
}
