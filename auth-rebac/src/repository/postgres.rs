//! PostgreSQL-backed tuple repository
//!
//! - One transaction per batch, so a batch applies all-or-nothing
//! - Conditional batches take a transaction-scoped advisory lock, which
//!   serializes them against each other
//! - Writes are idempotent (`ON CONFLICT DO NOTHING`)

use crate::{
    error::{AuthzError, Result},
    models::*,
    repository::TupleRepository,
};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Executor, PgPool, Postgres, Row, Transaction};
use std::time::Duration;
use tracing::{debug, info};

const SCHEMA_SQL: &str = include_str!("../../migrations/0001_relation_tuples.sql");

/// Advisory lock key shared by every conditional batch
const CONDITIONAL_WRITE_LOCK: i64 = 0x7265_6261_6300;

const TUPLE_COLUMNS: &str =
    "object_type, object_id, relation, subject_type, subject_id, subject_relation";

/// PostgreSQL-backed tuple repository
pub struct PostgresTupleRepository {
    pool: PgPool,
}

impl PostgresTupleRepository {
    /// Create a new PostgreSQL repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create with connection string
    pub async fn connect(
        connection_string: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(connection_string)
            .await
            .map_err(|e| AuthzError::StoreUnavailable(format!("Failed to connect: {}", e)))?;

        info!("Tuple store connection pool created");
        Ok(Self::new(pool))
    }

    /// Create the tuple table and indexes if they do not exist
    pub async fn ensure_schema(&self) -> Result<()> {
        self.pool.execute(SCHEMA_SQL).await?;
        info!("Tuple store schema ensured");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn subject_relation(subject: &SubjectRef) -> &str {
        subject.relation().map_or("", RelationName::as_str)
    }

    /// WHERE clause and bind values for a filter, numbering from `$1`
    fn filter_clause(filter: &TupleFilter) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut binds = Vec::new();
        let mut push = |column: &str, value: String| {
            binds.push(value);
            clauses.push(format!("{} = ${}", column, binds.len()));
        };

        if let Some(ref object) = filter.object {
            push("object_type", object.object_type().to_string());
            push("object_id", object.object_id().to_string());
        } else if let Some(ref object_type) = filter.object_type {
            push("object_type", object_type.clone());
        }
        if let Some(ref relation) = filter.relation {
            push("relation", relation.to_string());
        }
        if let Some(ref subject) = filter.subject {
            push("subject_type", subject.object().object_type().to_string());
            push("subject_id", subject.object().object_id().to_string());
            push("subject_relation", Self::subject_relation(subject).to_string());
        }

        let clause = if clauses.is_empty() {
            "TRUE".to_string()
        } else {
            clauses.join(" AND ")
        };
        (clause, binds)
    }

    fn exact_filter(tuple: &RelationTuple) -> TupleFilter {
        TupleFilter::new()
            .object(tuple.object.clone())
            .relation(tuple.relation.clone())
            .subject(tuple.subject.clone())
    }

    fn row_to_tuple(row: &sqlx::postgres::PgRow) -> Result<RelationTuple> {
        let object = ObjectRef::new(row.try_get("object_type")?, row.try_get("object_id")?)
            .map_err(|e| AuthzError::Internal(format!("corrupt tuple row: {}", e)))?;
        let relation = RelationName::new(row.try_get("relation")?)
            .map_err(|e| AuthzError::Internal(format!("corrupt tuple row: {}", e)))?;
        let subject_object = ObjectRef::new(row.try_get("subject_type")?, row.try_get("subject_id")?)
            .map_err(|e| AuthzError::Internal(format!("corrupt tuple row: {}", e)))?;
        let subject_relation: &str = row.try_get("subject_relation")?;
        let subject = if subject_relation.is_empty() {
            SubjectRef::new(subject_object)
        } else {
            let userset = RelationName::new(subject_relation)
                .map_err(|e| AuthzError::Internal(format!("corrupt tuple row: {}", e)))?;
            SubjectRef::userset(subject_object, userset)
        };
        Ok(RelationTuple::new(subject, relation, object))
    }

    async fn exists_in(tx: &mut Transaction<'_, Postgres>, filter: &TupleFilter) -> Result<bool> {
        let (clause, binds) = Self::filter_clause(filter);
        let sql = format!("SELECT EXISTS(SELECT 1 FROM relation_tuples WHERE {})", clause);
        let mut query = sqlx::query_scalar::<_, bool>(&sql);
        for bind in binds {
            query = query.bind(bind);
        }
        Ok(query.fetch_one(&mut **tx).await?)
    }

    async fn check_precondition(
        tx: &mut Transaction<'_, Postgres>,
        precondition: &Precondition,
    ) -> Result<bool> {
        match precondition {
            Precondition::MustExist { tuple } => Self::exists_in(tx, &Self::exact_filter(tuple)).await,
            Precondition::MustNotExist { tuple } => {
                Ok(!Self::exists_in(tx, &Self::exact_filter(tuple)).await?)
            }
            Precondition::NoneMatching { filter } => Ok(!Self::exists_in(tx, filter).await?),
        }
    }
}

#[async_trait]
impl TupleRepository for PostgresTupleRepository {
    async fn batch_write(&self, request: WriteRequest) -> Result<()> {
        debug!(
            "Batch write: {} writes, {} deletes, {} preconditions",
            request.writes.len(),
            request.deletes.len(),
            request.preconditions.len()
        );

        let mut tx = self.pool.begin().await?;

        if !request.preconditions.is_empty() {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(CONDITIONAL_WRITE_LOCK)
                .execute(&mut *tx)
                .await?;

            for precondition in &request.preconditions {
                if !Self::check_precondition(&mut tx, precondition).await? {
                    tx.rollback().await?;
                    return Err(AuthzError::PreconditionFailed(precondition.to_string()));
                }
            }
        }

        for tuple in &request.deletes {
            sqlx::query(
                r#"
                DELETE FROM relation_tuples
                WHERE object_type = $1
                  AND object_id = $2
                  AND relation = $3
                  AND subject_type = $4
                  AND subject_id = $5
                  AND subject_relation = $6
                "#,
            )
            .bind(tuple.object.object_type())
            .bind(tuple.object.object_id())
            .bind(tuple.relation.as_str())
            .bind(tuple.subject.object().object_type())
            .bind(tuple.subject.object().object_id())
            .bind(Self::subject_relation(&tuple.subject))
            .execute(&mut *tx)
            .await?;
        }

        for tuple in &request.writes {
            sqlx::query(&format!(
                "INSERT INTO relation_tuples ({}) VALUES ($1, $2, $3, $4, $5, $6) ON CONFLICT DO NOTHING",
                TUPLE_COLUMNS
            ))
            .bind(tuple.object.object_type())
            .bind(tuple.object.object_id())
            .bind(tuple.relation.as_str())
            .bind(tuple.subject.object().object_type())
            .bind(tuple.subject.object().object_id())
            .bind(Self::subject_relation(&tuple.subject))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!("Batch write committed");
        Ok(())
    }

    async fn read_tuples(&self, filter: &TupleFilter) -> Result<Vec<RelationTuple>> {
        debug!("Reading tuples: {}", filter);

        let (clause, binds) = Self::filter_clause(filter);
        let sql = format!(
            "SELECT {cols} FROM relation_tuples WHERE {clause} ORDER BY {cols}",
            cols = TUPLE_COLUMNS,
            clause = clause
        );
        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(bind);
        }

        let rows = query.fetch_all(&self.pool).await?;
        let tuples = rows.iter().map(Self::row_to_tuple).collect::<Result<Vec<_>>>()?;

        debug!("Found {} tuples", tuples.len());
        Ok(tuples)
    }

    async fn tuple_exists(&self, tuple: &RelationTuple) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM relation_tuples
                WHERE object_type = $1
                  AND object_id = $2
                  AND relation = $3
                  AND subject_type = $4
                  AND subject_id = $5
                  AND subject_relation = $6
            )
            "#,
        )
        .bind(tuple.object.object_type())
        .bind(tuple.object.object_id())
        .bind(tuple.relation.as_str())
        .bind(tuple.subject.object().object_type())
        .bind(tuple.subject.object().object_id())
        .bind(Self::subject_relation(&tuple.subject))
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
