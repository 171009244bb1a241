use crate::{
    error::Result,
    models::*,
    repository::TupleRepository,
    schema::{Rewrite, Schema},
};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

type CheckFuture<'a> = Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

/// Per-check traversal state
struct CheckContext {
    /// `object#relation` nodes on the current resolution path
    path: HashSet<String>,
    /// Nodes fully resolved to deny during this check
    denied: HashSet<String>,
    /// Set once any path hits the depth limit; denials after that may be
    /// depth-dependent and are no longer memoized
    depth_exhausted: bool,
    trace: Option<Vec<String>>,
}

impl CheckContext {
    fn record(&mut self, line: String) {
        if let Some(trace) = self.trace.as_mut() {
            trace.push(line);
        }
    }
}

/// Permission checker performs authorization checks with support for:
/// - Direct tuples, including userset subjects (`org:blog#admin`)
/// - Computed relations on the same object
/// - Tuple-to-userset traversal to related objects
/// - Unions, short-circuiting on the first allowing operand
///
/// Resolution is bounded: a node revisited on the same path, or a path
/// deeper than `max_depth`, resolves to deny with a warning.
pub struct PermissionChecker {
    repository: Arc<dyn TupleRepository>,
    schema: Arc<Schema>,
    max_depth: u32,
}

impl PermissionChecker {
    pub fn new(repository: Arc<dyn TupleRepository>, schema: Arc<Schema>, max_depth: u32) -> Self {
        Self {
            repository,
            schema,
            max_depth,
        }
    }

    /// Check if subject has the specified relation to object
    pub async fn check(
        &self,
        subject: &SubjectRef,
        relation: &RelationName,
        object: &ObjectRef,
    ) -> Result<Decision> {
        Ok(self.check_traced(subject, relation, object, false).await?.0)
    }

    /// Check and optionally collect the resolution steps taken
    pub async fn check_traced(
        &self,
        subject: &SubjectRef,
        relation: &RelationName,
        object: &ObjectRef,
        trace: bool,
    ) -> Result<(Decision, Option<Vec<String>>)> {
        // Unknown type or relation is a validation failure, before any store access
        self.schema.resolve(object, relation)?;

        let mut ctx = CheckContext {
            path: HashSet::new(),
            denied: HashSet::new(),
            depth_exhausted: false,
            trace: trace.then(Vec::new),
        };
        let allowed = self
            .check_relation(subject, relation.as_str(), object, &mut ctx, 0)
            .await?;
        Ok((Decision::from(allowed), ctx.trace))
    }

    fn check_relation<'a>(
        &'a self,
        subject: &'a SubjectRef,
        relation: &'a str,
        object: &'a ObjectRef,
        ctx: &'a mut CheckContext,
        depth: u32,
    ) -> CheckFuture<'a> {
        Box::pin(async move {
            let node = format!("{}#{}", object, relation);

            if depth > self.max_depth {
                warn!("Check for {} on {} exceeded max depth {}; denying", subject, node, self.max_depth);
                ctx.depth_exhausted = true;
                return Ok(false);
            }
            if ctx.path.contains(&node) {
                warn!("Cycle detected at {} while checking {}; denying", node, subject);
                return Ok(false);
            }
            if ctx.denied.contains(&node) {
                return Ok(false);
            }

            let Some(relation_def) = self.schema.get_relation(object.object_type(), relation) else {
                warn!("Relation {} is not defined; denying", node);
                return Ok(false);
            };

            debug!("Checking: {} {}", subject, node);
            ctx.record(format!("{}{} ?", "  ".repeat(depth as usize), node));

            ctx.path.insert(node.clone());
            let result = self
                .evaluate(&relation_def.rewrite, subject, relation, object, ctx, depth)
                .await;
            ctx.path.remove(&node);

            let allowed = result?;
            if allowed {
                ctx.record(format!("{}{} allow", "  ".repeat(depth as usize), node));
            } else if !ctx.depth_exhausted {
                ctx.denied.insert(node);
            }
            Ok(allowed)
        })
    }

    fn evaluate<'a>(
        &'a self,
        rewrite: &'a Rewrite,
        subject: &'a SubjectRef,
        relation: &'a str,
        object: &'a ObjectRef,
        ctx: &'a mut CheckContext,
        depth: u32,
    ) -> CheckFuture<'a> {
        Box::pin(async move {
            match rewrite {
                Rewrite::Direct { .. } => self.evaluate_direct(subject, relation, object, ctx, depth).await,
                Rewrite::Computed { relation: target } => {
                    self.check_relation(subject, target, object, ctx, depth + 1).await
                }
                Rewrite::TupleToUserset { tupleset, computed } => {
                    self.evaluate_tuple_to_userset(subject, tupleset, computed, object, ctx, depth)
                        .await
                }
                Rewrite::Union { children } => {
                    for child in children {
                        if self.evaluate(child, subject, relation, object, ctx, depth).await? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
            }
        })
    }

    async fn evaluate_direct(
        &self,
        subject: &SubjectRef,
        relation: &str,
        object: &ObjectRef,
        ctx: &mut CheckContext,
        depth: u32,
    ) -> Result<bool> {
        let relation_name = RelationName::new(relation)?;

        // 1. Direct check: does the tuple exist?
        let direct_tuple = RelationTuple::new(subject.clone(), relation_name.clone(), object.clone());
        if self.repository.tuple_exists(&direct_tuple).await? {
            debug!("Direct tuple found: {}", direct_tuple);
            return Ok(true);
        }

        // 2. Userset subjects: `object#relation@group#member` grants to every member
        let tuples = self
            .repository
            .read_tuples(&TupleFilter::new().object(object.clone()).relation(relation_name))
            .await?;

        for tuple in tuples {
            let Some(userset_relation) = tuple.subject.relation() else {
                continue;
            };
            if self
                .check_relation(
                    subject,
                    userset_relation.as_str(),
                    tuple.subject.object(),
                    ctx,
                    depth + 1,
                )
                .await?
            {
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn evaluate_tuple_to_userset(
        &self,
        subject: &SubjectRef,
        tupleset: &str,
        computed: &str,
        object: &ObjectRef,
        ctx: &mut CheckContext,
        depth: u32,
    ) -> Result<bool> {
        let tuples = self
            .repository
            .read_tuples(
                &TupleFilter::new()
                    .object(object.clone())
                    .relation(RelationName::new(tupleset)?),
            )
            .await?;

        for tuple in tuples {
            if tuple.subject.is_userset() {
                continue;
            }
            debug!("Following {}#{} to {}", object, tupleset, tuple.subject);
            if self
                .check_relation(subject, computed, tuple.subject.object(), ctx, depth + 1)
                .await?
            {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryTupleRepository;

    fn tuple(subject: &str, relation: &str, object: &str) -> RelationTuple {
        RelationTuple::parse(subject, relation, object).unwrap()
    }

    fn checker(repo: &Arc<InMemoryTupleRepository>, schema: Schema) -> PermissionChecker {
        PermissionChecker::new(repo.clone(), Arc::new(schema), 25)
    }

    async fn allowed(checker: &PermissionChecker, subject: &str, relation: &str, object: &str) -> bool {
        checker
            .check(
                &subject.parse().unwrap(),
                &relation.parse().unwrap(),
                &object.parse().unwrap(),
            )
            .await
            .unwrap()
            .is_allowed()
    }

    #[tokio::test]
    async fn test_direct_permission() {
        let repo = Arc::new(InMemoryTupleRepository::new());
        let checker = checker(&repo, Schema::blog_schema());

        assert!(!allowed(&checker, "user:alice", "owner", "post:1").await);

        repo.write_tuples(vec![tuple("user:alice", "owner", "post:1")])
            .await
            .unwrap();

        assert!(allowed(&checker, "user:alice", "owner", "post:1").await);
        assert!(!allowed(&checker, "user:bob", "owner", "post:1").await);
    }

    #[tokio::test]
    async fn test_can_edit_union() {
        let repo = Arc::new(InMemoryTupleRepository::new());
        let checker = checker(&repo, Schema::blog_schema());

        repo.write_tuples(vec![
            tuple("org:blog", "org", "post:1"),
            tuple("user:owner", "owner", "post:1"),
            tuple("user:granted", "granted_editor", "post:1"),
            tuple("user:admin", "admin", "org:blog"),
            tuple("user:moderator", "moderator", "org:blog"),
            tuple("user:editor", "editor", "org:blog"),
        ])
        .await
        .unwrap();

        for user in ["user:owner", "user:granted", "user:admin", "user:moderator"] {
            assert!(allowed(&checker, user, "can_edit", "post:1").await, "{} should edit", user);
        }
        assert!(!allowed(&checker, "user:editor", "can_edit", "post:1").await);
        assert!(!allowed(&checker, "user:stranger", "can_edit", "post:1").await);
    }

    #[tokio::test]
    async fn test_userset_subject() {
        let repo = Arc::new(InMemoryTupleRepository::new());
        let document = r#"
types:
  user: { name: user }
  team:
    name: team
    relations:
      member: { name: member, rewrite: { kind: direct, subject_types: [user] } }
  doc:
    name: doc
    relations:
      reader: { name: reader, rewrite: { kind: direct, subject_types: [user, "team#member"] } }
"#;
        let checker = checker(&repo, Schema::from_yaml(document).unwrap());

        repo.write_tuples(vec![
            tuple("team:core#member", "reader", "doc:1"),
            tuple("user:carol", "member", "team:core"),
        ])
        .await
        .unwrap();

        assert!(allowed(&checker, "user:carol", "reader", "doc:1").await);
        assert!(!allowed(&checker, "user:dave", "reader", "doc:1").await);
    }

    #[tokio::test]
    async fn test_cyclic_schema_denies_and_terminates() {
        let repo = Arc::new(InMemoryTupleRepository::new());
        let document = r#"
types:
  doc:
    name: doc
    relations:
      a: { name: a, rewrite: { kind: computed, relation: b } }
      b:
        name: b
        rewrite:
          kind: union
          children:
            - { kind: computed, relation: a }
            - { kind: direct, subject_types: [doc] }
"#;
        let checker = checker(&repo, Schema::from_yaml(document).unwrap());
        assert!(!allowed(&checker, "doc:x", "a", "doc:1").await);

        repo.write_tuples(vec![tuple("doc:x", "b", "doc:1")]).await.unwrap();
        assert!(allowed(&checker, "doc:x", "a", "doc:1").await);
    }

    #[tokio::test]
    async fn test_unknown_relation_is_validation_error() {
        let repo = Arc::new(InMemoryTupleRepository::new());
        let checker = checker(&repo, Schema::blog_schema());
        let result = checker
            .check(
                &SubjectRef::user("alice").unwrap(),
                &RelationName::new("can_fly").unwrap(),
                &ObjectRef::post("1").unwrap(),
            )
            .await;
        assert!(matches!(result, Err(crate::AuthzError::Validation(_))));
    }

    #[tokio::test]
    async fn test_depth_limit_denies() {
        let repo = Arc::new(InMemoryTupleRepository::new());
        repo.write_tuples(vec![
            tuple("org:blog", "org", "post:1"),
            tuple("user:admin", "admin", "org:blog"),
        ])
        .await
        .unwrap();

        let shallow = PermissionChecker::new(repo.clone(), Arc::new(Schema::blog_schema()), 0);
        assert!(!allowed(&shallow, "user:admin", "can_edit", "post:1").await);

        let deep = PermissionChecker::new(repo.clone(), Arc::new(Schema::blog_schema()), 25);
        assert!(allowed(&deep, "user:admin", "can_edit", "post:1").await);
    }

    #[tokio::test]
    async fn test_trace_collected() {
        let repo = Arc::new(InMemoryTupleRepository::new());
        repo.write_tuples(vec![tuple("user:alice", "owner", "post:1")])
            .await
            .unwrap();
        let checker = checker(&repo, Schema::blog_schema());

        let (decision, trace) = checker
            .check_traced(
                &SubjectRef::user("alice").unwrap(),
                &RelationName::new("can_edit").unwrap(),
                &ObjectRef::post("1").unwrap(),
                true,
            )
            .await
            .unwrap();
        assert_eq!(decision, Decision::Allow);
        let trace = trace.unwrap();
        assert_eq!(trace.first().map(String::as_str), Some("post:1#can_edit ?"));
        assert!(trace.iter().any(|l| l.trim() == "post:1#owner allow"));
    }
}
