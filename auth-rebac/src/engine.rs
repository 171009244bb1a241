use crate::{
    check::PermissionChecker,
    error::{AuthzError, Result},
    expand::SubjectExpander,
    models::*,
    repository::{duration_ms, TimedTupleRepository, TupleRepository},
    schema::Schema,
};
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Runtime limits for the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Budget for each individual tuple store call
    pub store_timeout: Duration,
    /// Budget for one whole check, all store calls included
    pub check_timeout: Duration,
    /// Maximum rewrite depth before a check resolves to deny
    pub max_depth: u32,
    /// Collect resolution traces in check responses
    pub debug_mode: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(2000),
            check_timeout: Duration::from_millis(5000),
            max_depth: 25,
            debug_mode: false,
        }
    }
}

/// Core authorization engine.
///
/// Owns the tuple store and the installed schema. Constructed once at
/// startup and shared as `Arc<AuthorizationEngine>`; every call is a pure
/// function of the current tuples and schema.
pub struct AuthorizationEngine {
    /// Storage for relationship tuples, every call bounded by `store_timeout`
    repository: Arc<dyn TupleRepository>,

    /// Installed schema; `None` until the bootstrap hook runs
    schema: RwLock<Option<Arc<Schema>>>,

    config: EngineConfig,
}

impl AuthorizationEngine {
    /// Create an engine with no schema installed
    pub fn new(repository: Arc<dyn TupleRepository>, config: EngineConfig) -> Self {
        let repository: Arc<dyn TupleRepository> = Arc::new(TimedTupleRepository::new(
            repository,
            config.store_timeout,
        ));

        Self {
            repository,
            schema: RwLock::new(None),
            config,
        }
    }

    /// Create with a schema already installed
    pub fn with_schema(self, schema: Schema) -> Result<Self> {
        self.install_schema(schema)?;
        Ok(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =============================================================================
    // Schema Management
    // =============================================================================

    /// Validate and install a schema, replacing any previous one.
    /// Tuples are left untouched, so re-installing is idempotent.
    pub fn install_schema(&self, schema: Schema) -> Result<()> {
        schema.validate()?;

        let cycles = schema.cycles();
        if !cycles.is_empty() {
            warn!(
                "Schema contains relation cycles, affected checks resolve to deny: {}",
                cycles.join(", ")
            );
        }

        info!("Installing schema with {} types", schema.types.len());
        *self.schema.write() = Some(Arc::new(schema));
        Ok(())
    }

    /// Snapshot of the installed schema
    pub fn schema(&self) -> Result<Arc<Schema>> {
        self.schema
            .read()
            .clone()
            .ok_or(AuthzError::SchemaNotInstalled)
    }

    fn checker(&self) -> Result<PermissionChecker> {
        Ok(PermissionChecker::new(
            self.repository.clone(),
            self.schema()?,
            self.config.max_depth,
        ))
    }

    // =============================================================================
    // Core Authorization Operations
    // =============================================================================

    /// Check if a subject has a relation to an object
    pub async fn check(
        &self,
        subject: &SubjectRef,
        relation: &RelationName,
        object: &ObjectRef,
    ) -> Result<Decision> {
        let (decision, _) = self.check_bounded(subject, relation, object, false).await?;
        Ok(decision)
    }

    /// Check a single request, with a resolution trace in debug mode
    pub async fn check_request(&self, request: &CheckRequest) -> Result<CheckResponse> {
        let (decision, debug_trace) = self
            .check_bounded(
                &request.subject,
                &request.relation,
                &request.object,
                self.config.debug_mode,
            )
            .await?;

        Ok(CheckResponse {
            decision,
            debug_trace,
        })
    }

    /// Check and return every resolution step, regardless of debug mode
    pub async fn explain(
        &self,
        subject: &SubjectRef,
        relation: &RelationName,
        object: &ObjectRef,
    ) -> Result<(Decision, Vec<String>)> {
        let (decision, trace) = self.check_bounded(subject, relation, object, true).await?;
        Ok((decision, trace.unwrap_or_default()))
    }

    /// Batch check multiple requests, in order
    pub async fn batch_check(&self, requests: &[CheckRequest]) -> Result<Vec<CheckResponse>> {
        let mut responses = Vec::with_capacity(requests.len());
        for request in requests {
            responses.push(self.check_request(request).await?);
        }
        Ok(responses)
    }

    async fn check_bounded(
        &self,
        subject: &SubjectRef,
        relation: &RelationName,
        object: &ObjectRef,
        trace: bool,
    ) -> Result<(Decision, Option<Vec<String>>)> {
        let checker = self.checker()?;
        let result = tokio::time::timeout(
            self.config.check_timeout,
            checker.check_traced(subject, relation, object, trace),
        )
        .await;

        match result {
            Ok(Ok((decision, trace))) => {
                debug!("Check {}#{}@{} => {}", object, relation, subject, decision);
                Ok((decision, trace))
            }
            Ok(Err(err)) => Err(err),
            Err(_) => {
                warn!(
                    "Check {}#{}@{} exceeded {:?}",
                    object, relation, subject, self.config.check_timeout
                );
                Err(AuthzError::Timeout {
                    operation: "check",
                    timeout_ms: duration_ms(self.config.check_timeout),
                })
            }
        }
    }

    // =============================================================================
    // Tuple Management
    // =============================================================================

    /// Apply an atomic batch. Every tuple written or deleted must name a
    /// direct relation that accepts its subject type.
    pub async fn write(&self, request: WriteRequest) -> Result<()> {
        if request.is_empty() {
            return Ok(());
        }

        let schema = self.schema()?;
        for tuple in request.writes.iter().chain(request.deletes.iter()) {
            schema.validate_tuple(tuple)?;
        }

        let summary = format!(
            "{} writes, {} deletes, {} preconditions",
            request.writes.len(),
            request.deletes.len(),
            request.preconditions.len()
        );
        self.repository.batch_write(request).await?;
        info!("Applied tuple batch: {}", summary);
        Ok(())
    }

    /// Write relationship tuples (idempotent)
    pub async fn write_tuples(&self, tuples: Vec<RelationTuple>) -> Result<()> {
        self.write(WriteRequest {
            writes: tuples,
            ..WriteRequest::default()
        })
        .await
    }

    /// Delete relationship tuples; absent tuples are ignored
    pub async fn delete_tuples(&self, tuples: Vec<RelationTuple>) -> Result<()> {
        self.write(WriteRequest {
            deletes: tuples,
            ..WriteRequest::default()
        })
        .await
    }

    /// Read tuples matching a filter
    pub async fn read(&self, filter: &TupleFilter) -> Result<Vec<RelationTuple>> {
        self.repository.read_tuples(filter).await
    }

    pub async fn tuple_exists(&self, tuple: &RelationTuple) -> Result<bool> {
        self.repository.tuple_exists(tuple).await
    }

    // =============================================================================
    // Expansion
    // =============================================================================

    /// Expand all subjects that have a relation to an object
    pub async fn expand(
        &self,
        relation: &RelationName,
        object: &ObjectRef,
        max_depth: Option<u32>,
    ) -> Result<SubjectTree> {
        SubjectExpander::new(self.repository.clone(), self.schema()?)
            .expand(relation, object, max_depth.unwrap_or(self.config.max_depth))
            .await
    }

    /// Concrete subjects holding the relation, directly or computed
    pub async fn list_subjects(
        &self,
        relation: &RelationName,
        object: &ObjectRef,
    ) -> Result<Vec<SubjectRef>> {
        SubjectExpander::new(self.repository.clone(), self.schema()?)
            .list_subjects(relation, object, self.config.max_depth)
            .await
    }

    /// List the objects of a type on which the subject holds the relation,
    /// directly or computed
    pub async fn list_objects(
        &self,
        subject: &SubjectRef,
        relation: &RelationName,
        object_type: &str,
    ) -> Result<Vec<ObjectRef>> {
        let schema = self.schema()?;
        if schema.get_relation(object_type, relation.as_str()).is_none() {
            return Err(AuthzError::Validation(format!(
                "unknown relation {} on type {}",
                relation, object_type
            )));
        }

        let candidates: BTreeSet<ObjectRef> = self
            .repository
            .read_tuples(&TupleFilter::new().object_type(object_type))
            .await?
            .into_iter()
            .map(|t| t.object)
            .collect();

        let mut objects = Vec::new();
        for object in candidates {
            if self.check(subject, relation, &object).await?.is_allowed() {
                objects.push(object);
            }
        }
        Ok(objects)
    }
}
