//! Invariants over arbitrary tuple sets

use auth_rebac::*;
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn engine() -> AuthorizationEngine {
    AuthorizationEngine::new(
        Arc::new(InMemoryTupleRepository::new()),
        EngineConfig::default(),
    )
    .with_schema(Schema::blog_schema())
    .unwrap()
}

fn role_tuple() -> impl Strategy<Value = RelationTuple> {
    (
        "[a-z]{1,6}",
        prop::sample::select(vec!["admin", "editor", "moderator", "viewer", "member"]),
    )
        .prop_map(|(user, role)| RelationTuple::parse(&format!("user:{user}"), role, "org:blog").unwrap())
}

fn post_tuple() -> impl Strategy<Value = RelationTuple> {
    (
        "[a-z]{1,6}",
        prop::sample::select(vec!["owner", "granted_editor"]),
        0u8..8,
    )
        .prop_map(|(user, relation, post)| {
            RelationTuple::parse(&format!("user:{user}"), relation, &format!("post:{post}")).unwrap()
        })
}

proptest! {
    #[test]
    fn writing_twice_leaves_tuple_set_unchanged(
        tuples in prop::collection::vec(prop_oneof![role_tuple(), post_tuple()], 0..20)
    ) {
        let rt = runtime();
        rt.block_on(async {
            let engine = engine();
            engine.write_tuples(tuples.clone()).await.unwrap();
            let first = engine.read(&TupleFilter::new()).await.unwrap();

            engine.write_tuples(tuples.clone()).await.unwrap();
            let second = engine.read(&TupleFilter::new()).await.unwrap();

            prop_assert_eq!(&first, &second);
            let mut distinct = tuples.clone();
            distinct.sort();
            distinct.dedup();
            prop_assert_eq!(first.len(), distinct.len());
            Ok(())
        })?;
    }

    #[test]
    fn admin_can_edit_every_post(
        tuples in prop::collection::vec(post_tuple(), 0..20),
        post in 0u8..8,
    ) {
        let rt = runtime();
        rt.block_on(async {
            let engine = engine();
            let post = ObjectRef::post(&post.to_string()).unwrap();
            let mut setup = tuples;
            setup.push(RelationTuple::parse("user:root", "admin", "org:blog").unwrap());
            setup.push(RelationTuple::new(
                SubjectRef::from(ObjectRef::org("blog").unwrap()),
                RelationName::new("org").unwrap(),
                post.clone(),
            ));
            engine.write_tuples(setup).await.unwrap();

            let decision = engine
                .check(
                    &SubjectRef::user("root").unwrap(),
                    &RelationName::new("can_edit").unwrap(),
                    &post,
                )
                .await
                .unwrap();
            prop_assert_eq!(decision, Decision::Allow);
            Ok(())
        })?;
    }

    #[test]
    fn deleting_absent_tuples_is_noop(
        present in prop::collection::vec(role_tuple(), 0..10),
        absent in prop::collection::vec(role_tuple(), 0..10),
    ) {
        let rt = runtime();
        rt.block_on(async {
            let engine = engine();
            engine.write_tuples(present.clone()).await.unwrap();

            let to_delete: Vec<RelationTuple> =
                absent.into_iter().filter(|t| !present.contains(t)).collect();
            engine.delete_tuples(to_delete).await.unwrap();

            let mut expected = present.clone();
            expected.sort();
            expected.dedup();
            prop_assert_eq!(engine.read(&TupleFilter::new()).await.unwrap(), expected);
            Ok(())
        })?;
    }
}
