//! Engine-level tests over the blog schema
//!
//! Covers the org-role and per-post relations, userset subjects, custom
//! schemas with traversal, and expansion.

use auth_rebac::*;
use std::sync::Arc;

fn tuple(subject: &str, relation: &str, object: &str) -> RelationTuple {
    RelationTuple::parse(subject, relation, object).unwrap()
}

fn relation(name: &str) -> RelationName {
    RelationName::new(name).unwrap()
}

// Helper to create test engine
fn create_test_engine() -> Arc<AuthorizationEngine> {
    let repo = Arc::new(InMemoryTupleRepository::new());
    Arc::new(
        AuthorizationEngine::new(repo, EngineConfig::default())
            .with_schema(Schema::blog_schema())
            .unwrap(),
    )
}

async fn can_edit(engine: &AuthorizationEngine, user: &str, post: &str) -> bool {
    engine
        .check(
            &SubjectRef::user(user).unwrap(),
            &relation("can_edit"),
            &ObjectRef::post(post).unwrap(),
        )
        .await
        .unwrap()
        .is_allowed()
}

#[tokio::test]
async fn test_admin_and_moderator_edit_every_post() {
    let engine = create_test_engine();

    engine
        .write_tuples(vec![
            tuple("user:root", "admin", "org:blog"),
            tuple("user:mod", "moderator", "org:blog"),
            tuple("user:writer", "editor", "org:blog"),
            tuple("user:writer", "owner", "post:1"),
            tuple("org:blog", "org", "post:1"),
            tuple("user:other", "owner", "post:2"),
            tuple("org:blog", "org", "post:2"),
        ])
        .await
        .unwrap();

    for post in ["1", "2"] {
        assert!(can_edit(&engine, "root", post).await);
        assert!(can_edit(&engine, "mod", post).await);
    }

    // Editor role alone grants nothing on posts owned by others
    assert!(can_edit(&engine, "writer", "1").await);
    assert!(!can_edit(&engine, "writer", "2").await);
}

#[tokio::test]
async fn test_granted_editor_is_scoped_to_one_post() {
    let engine = create_test_engine();

    engine
        .write_tuples(vec![
            tuple("user:helper", "granted_editor", "post:1"),
            tuple("user:alice", "owner", "post:1"),
            tuple("user:alice", "owner", "post:2"),
        ])
        .await
        .unwrap();

    assert!(can_edit(&engine, "helper", "1").await);
    assert!(!can_edit(&engine, "helper", "2").await);
}

#[tokio::test]
async fn test_revoking_role_removes_access() {
    let engine = create_test_engine();
    let admin = tuple("user:root", "admin", "org:blog");

    engine
        .write_tuples(vec![admin.clone(), tuple("org:blog", "org", "post:1")])
        .await
        .unwrap();
    assert!(can_edit(&engine, "root", "1").await);

    engine.delete_tuples(vec![admin]).await.unwrap();
    assert!(!can_edit(&engine, "root", "1").await);

    // Deleting again is a no-op
    engine
        .delete_tuples(vec![tuple("user:root", "admin", "org:blog")])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_unknown_relation_is_validation_error() {
    let engine = create_test_engine();

    let result = engine
        .check(
            &SubjectRef::user("alice").unwrap(),
            &relation("can_delete"),
            &ObjectRef::post("1").unwrap(),
        )
        .await;
    assert!(matches!(result, Err(AuthzError::Validation(_))));

    let result = engine
        .check(
            &SubjectRef::user("alice").unwrap(),
            &relation("owner"),
            &ObjectRef::new("folder", "1").unwrap(),
        )
        .await;
    assert!(matches!(result, Err(AuthzError::Validation(_))));
}

#[tokio::test]
async fn test_custom_schema_with_traversal_and_usersets() {
    let schema = Schema::from_yaml(
        r#"
types:
  user:
    name: user
  team:
    name: team
    relations:
      member:
        name: member
        rewrite:
          kind: direct
          subject_types: [user, "team#member"]
  doc:
    name: doc
    relations:
      team:
        name: team
        rewrite:
          kind: direct
          subject_types: [team]
      reader:
        name: reader
        rewrite:
          kind: union
          children:
            - kind: direct
              subject_types: [user]
            - kind: tuple_to_userset
              tupleset: team
              computed: member
"#,
    )
    .unwrap();

    let engine = AuthorizationEngine::new(
        Arc::new(InMemoryTupleRepository::new()),
        EngineConfig::default(),
    )
    .with_schema(schema)
    .unwrap();

    engine
        .write_tuples(vec![
            tuple("team:core", "team", "doc:readme"),
            tuple("team:infra#member", "member", "team:core"),
            tuple("user:carol", "member", "team:infra"),
        ])
        .await
        .unwrap();

    let readme = ObjectRef::new("doc", "readme").unwrap();
    let decision = engine
        .check(&SubjectRef::user("carol").unwrap(), &relation("reader"), &readme)
        .await
        .unwrap();
    assert_eq!(decision, Decision::Allow);

    let subjects = engine.list_subjects(&relation("reader"), &readme).await.unwrap();
    assert_eq!(subjects, vec![SubjectRef::user("carol").unwrap()]);
}

#[tokio::test]
async fn test_invalid_schema_is_rejected_at_install() {
    let engine = AuthorizationEngine::new(
        Arc::new(InMemoryTupleRepository::new()),
        EngineConfig::default(),
    );

    let mut schema = Schema::blog_schema();
    if let Some(post) = schema.types.get_mut("post") {
        if let Some(can_edit) = post.relations.get_mut("can_edit") {
            can_edit.rewrite = Rewrite::Computed {
                relation: "missing".to_string(),
            };
        }
    }

    assert!(matches!(
        engine.install_schema(schema),
        Err(AuthzError::Schema(_))
    ));
    assert!(matches!(engine.schema(), Err(AuthzError::SchemaNotInstalled)));
}

#[tokio::test]
async fn test_expand_admin_userset() {
    let engine = create_test_engine();
    engine
        .write_tuples(vec![
            tuple("user:root", "admin", "org:blog"),
            tuple("user:second", "admin", "org:blog"),
        ])
        .await
        .unwrap();

    let tree = engine
        .expand(&relation("admin"), &ObjectRef::org("blog").unwrap(), None)
        .await
        .unwrap();
    assert_eq!(tree.children.len(), 2);
    assert!(tree
        .children
        .iter()
        .all(|c| matches!(c.node, ExpandNode::Subject { .. })));
}
