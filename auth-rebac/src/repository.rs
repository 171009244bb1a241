use crate::{
    error::{AuthzError, Result},
    models::*,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub mod postgres;

pub use postgres::PostgresTupleRepository;

/// Repository interface for storing relationship tuples
#[async_trait]
pub trait TupleRepository: Send + Sync {
    /// Apply a batch atomically: all preconditions hold and every delete and
    /// write applies, or nothing changes
    async fn batch_write(&self, request: WriteRequest) -> Result<()>;

    /// Read tuples matching the given filter, in a deterministic order
    async fn read_tuples(&self, filter: &TupleFilter) -> Result<Vec<RelationTuple>>;

    /// Check if a specific tuple exists
    async fn tuple_exists(&self, tuple: &RelationTuple) -> Result<bool>;

    /// Idempotent insert of a set of tuples
    async fn write_tuples(&self, tuples: Vec<RelationTuple>) -> Result<()> {
        self.batch_write(WriteRequest {
            writes: tuples,
            ..WriteRequest::default()
        })
        .await
    }

    /// Remove exact tuples; absent tuples are ignored
    async fn delete_tuples(&self, tuples: Vec<RelationTuple>) -> Result<()> {
        self.batch_write(WriteRequest {
            deletes: tuples,
            ..WriteRequest::default()
        })
        .await
    }
}

/// In-memory tuple repository for testing and single-process deployments
pub struct InMemoryTupleRepository {
    tuples: RwLock<BTreeSet<RelationTuple>>,
}

impl InMemoryTupleRepository {
    pub fn new() -> Self {
        Self {
            tuples: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.tuples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.read().is_empty()
    }

    fn precondition_holds(tuples: &BTreeSet<RelationTuple>, precondition: &Precondition) -> bool {
        match precondition {
            Precondition::MustExist { tuple } => tuples.contains(tuple),
            Precondition::MustNotExist { tuple } => !tuples.contains(tuple),
            Precondition::NoneMatching { filter } => !tuples.iter().any(|t| filter.matches(t)),
        }
    }
}

impl Default for InMemoryTupleRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TupleRepository for InMemoryTupleRepository {
    async fn batch_write(&self, request: WriteRequest) -> Result<()> {
        let mut tuples = self.tuples.write();

        if let Some(failed) = request
            .preconditions
            .iter()
            .find(|p| !Self::precondition_holds(&tuples, p))
        {
            return Err(AuthzError::PreconditionFailed(failed.to_string()));
        }

        let (deletes, writes) = (request.deletes.len(), request.writes.len());
        for tuple in &request.deletes {
            tuples.remove(tuple);
        }
        for tuple in request.writes {
            tuples.insert(tuple);
        }

        debug!(
            "Batch applied: {} deletes, {} writes, {} tuples stored",
            deletes,
            writes,
            tuples.len()
        );
        Ok(())
    }

    async fn read_tuples(&self, filter: &TupleFilter) -> Result<Vec<RelationTuple>> {
        let tuples = self.tuples.read();
        Ok(tuples.iter().filter(|t| filter.matches(t)).cloned().collect())
    }

    async fn tuple_exists(&self, tuple: &RelationTuple) -> Result<bool> {
        Ok(self.tuples.read().contains(tuple))
    }
}

/// Decorator bounding every call on the wrapped repository by a timeout.
/// Expiry surfaces as [`AuthzError::Timeout`], never as an empty result.
pub struct TimedTupleRepository {
    inner: Arc<dyn TupleRepository>,
    timeout: Duration,
}

impl TimedTupleRepository {
    pub fn new(inner: Arc<dyn TupleRepository>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Tuple store {} exceeded {:?}", operation, self.timeout);
                Err(AuthzError::Timeout {
                    operation,
                    timeout_ms: duration_ms(self.timeout),
                })
            }
        }
    }
}

#[async_trait]
impl TupleRepository for TimedTupleRepository {
    async fn batch_write(&self, request: WriteRequest) -> Result<()> {
        self.bounded("batch_write", self.inner.batch_write(request)).await
    }

    async fn read_tuples(&self, filter: &TupleFilter) -> Result<Vec<RelationTuple>> {
        self.bounded("read_tuples", self.inner.read_tuples(filter)).await
    }

    async fn tuple_exists(&self, tuple: &RelationTuple) -> Result<bool> {
        self.bounded("tuple_exists", self.inner.tuple_exists(tuple)).await
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(subject: &str, relation: &str, object: &str) -> RelationTuple {
        RelationTuple::parse(subject, relation, object).unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_repository() {
        let repo = InMemoryTupleRepository::new();
        let owner = tuple("user:alice", "owner", "post:1");

        repo.write_tuples(vec![owner.clone()]).await.unwrap();
        assert!(repo.tuple_exists(&owner).await.unwrap());

        let tuples = repo
            .read_tuples(&TupleFilter::new().subject(SubjectRef::user("alice").unwrap()))
            .await
            .unwrap();
        assert_eq!(tuples, vec![owner.clone()]);

        repo.delete_tuples(vec![owner.clone()]).await.unwrap();
        assert!(!repo.tuple_exists(&owner).await.unwrap());
    }

    #[tokio::test]
    async fn test_write_is_idempotent() {
        let repo = InMemoryTupleRepository::new();
        let viewer = tuple("user:bob", "viewer", "org:blog");

        repo.write_tuples(vec![viewer.clone()]).await.unwrap();
        repo.write_tuples(vec![viewer.clone(), viewer.clone()]).await.unwrap();
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_deleting_absent_tuple_is_noop() {
        let repo = InMemoryTupleRepository::new();
        repo.delete_tuples(vec![tuple("user:bob", "admin", "org:blog")])
            .await
            .unwrap();
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_failed_precondition_applies_nothing() {
        let repo = InMemoryTupleRepository::new();
        let old_owner = tuple("user:alice", "owner", "post:1");
        let new_owner = tuple("user:bob", "owner", "post:1");

        let request = WriteRequest::new()
            .require(Precondition::MustExist {
                tuple: old_owner.clone(),
            })
            .delete(old_owner.clone())
            .write(new_owner.clone());

        let result = repo.batch_write(request).await;
        assert!(matches!(result, Err(AuthzError::PreconditionFailed(_))));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_swap_applies_deletes_before_writes() {
        let repo = InMemoryTupleRepository::new();
        let owner = tuple("user:alice", "owner", "post:1");
        repo.write_tuples(vec![owner.clone()]).await.unwrap();

        // Same tuple deleted and rewritten survives
        repo.batch_write(WriteRequest::new().delete(owner.clone()).write(owner.clone()))
            .await
            .unwrap();
        assert!(repo.tuple_exists(&owner).await.unwrap());
    }

    #[tokio::test]
    async fn test_none_matching_precondition() {
        let repo = InMemoryTupleRepository::new();
        let members = TupleFilter::new()
            .relation(RelationName::new("member").unwrap())
            .object(ObjectRef::org("blog").unwrap());

        let first = WriteRequest::new()
            .require(Precondition::NoneMatching {
                filter: members.clone(),
            })
            .write(tuple("user:1", "member", "org:blog"));
        repo.batch_write(first.clone()).await.unwrap();

        let second = WriteRequest::new()
            .require(Precondition::NoneMatching { filter: members })
            .write(tuple("user:2", "member", "org:blog"));
        assert!(repo.batch_write(second).await.is_err());
        assert_eq!(repo.len(), 1);
    }
}
