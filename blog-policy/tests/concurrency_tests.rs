//! Races on the first-admin claim and on ownership transfer

use async_trait::async_trait;
use auth_rebac::*;
use blog_policy::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

/// In-memory store that applies a queued write from "another request" just
/// before the first `editor` lookup, which a transfer makes after checking
/// the requester's authority and before touching the owner tuple.
struct InterleavingStore {
    inner: InMemoryTupleRepository,
    pending: Mutex<Option<WriteRequest>>,
}

impl InterleavingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryTupleRepository::new(),
            pending: Mutex::new(None),
        }
    }

    fn interleave(&self, request: WriteRequest) {
        *self.pending.lock() = Some(request);
    }
}

#[async_trait]
impl TupleRepository for InterleavingStore {
    async fn batch_write(&self, request: WriteRequest) -> auth_rebac::Result<()> {
        self.inner.batch_write(request).await
    }

    async fn read_tuples(&self, filter: &TupleFilter) -> auth_rebac::Result<Vec<RelationTuple>> {
        self.inner.read_tuples(filter).await
    }

    async fn tuple_exists(&self, tuple: &RelationTuple) -> auth_rebac::Result<bool> {
        if tuple.relation.as_str() == "editor" {
            let pending = self.pending.lock().take();
            if let Some(request) = pending {
                self.inner.batch_write(request).await?;
            }
        }
        self.inner.tuple_exists(tuple).await
    }
}

fn policy() -> Arc<ContentPolicy> {
    let engine = AuthorizationEngine::new(
        Arc::new(InMemoryTupleRepository::new()),
        EngineConfig::default(),
    )
    .with_schema(Schema::blog_schema())
    .unwrap();
    Arc::new(ContentPolicy::new(Arc::new(engine), "blog").unwrap())
}

async fn owners(policy: &ContentPolicy, post: &str) -> usize {
    policy
        .engine()
        .read(
            &TupleFilter::new()
                .relation(RelationName::new("owner").unwrap())
                .object(ObjectRef::post(post).unwrap()),
        )
        .await
        .unwrap()
        .len()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_registrations_yield_one_admin() {
    let policy = policy();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let policy = policy.clone();
            tokio::spawn(async move {
                policy
                    .register_subject(&UserId::new(&format!("u{i}")).unwrap())
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut admins = 0;
    for handle in handles {
        let registration = handle.await.unwrap();
        assert!(registration.newly_created);
        if registration.role == Some(OrgRole::Admin) {
            admins += 1;
        }
    }
    assert_eq!(admins, 1);

    let admin_tuples = policy
        .engine()
        .read(&TupleFilter::new().relation(RelationName::new("admin").unwrap()))
        .await
        .unwrap();
    assert_eq!(admin_tuples.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_transfers_keep_single_owner() {
    let policy = policy();
    let admin = UserId::new("admin").unwrap();
    policy.register_subject(&admin).await.unwrap();
    let admin = Principal::Authenticated(admin);

    for i in 0..8 {
        let user = UserId::new(&format!("e{i}")).unwrap();
        policy.register_subject(&user).await.unwrap();
        policy
            .apply(
                &admin,
                Operation::ManageRole {
                    action: RoleAction::Grant,
                    role: OrgRole::Editor,
                    target: user,
                },
            )
            .await
            .unwrap();
    }
    policy
        .apply(&admin, Operation::CreateContent { post_id: "p1".to_string() })
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let policy = policy.clone();
            let admin = admin.clone();
            tokio::spawn(async move {
                policy
                    .apply(
                        &admin,
                        Operation::TransferOwnership {
                            post_id: "p1".to_string(),
                            new_owner: UserId::new(&format!("e{i}")).unwrap(),
                        },
                    )
                    .await
            })
        })
        .collect();

    let checker = {
        let policy = policy.clone();
        tokio::spawn(async move {
            for _ in 0..50 {
                assert_eq!(owners(&policy, "p1").await, 1);
                tokio::task::yield_now().await;
            }
        })
    };

    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) | Err(PolicyError::TransactionFailed(_)) => {}
            Err(other) => panic!("unexpected transfer failure: {other}"),
        }
    }
    checker.await.unwrap();
    assert_eq!(owners(&policy, "p1").await, 1);
}

#[tokio::test]
async fn test_owner_who_lost_ownership_cannot_transfer() {
    let store = Arc::new(InterleavingStore::new());
    let engine = AuthorizationEngine::new(store.clone(), EngineConfig::default())
        .with_schema(Schema::blog_schema())
        .unwrap();
    let policy = ContentPolicy::new(Arc::new(engine), "blog").unwrap();

    let admin = Principal::user("admin").unwrap();
    policy.register_subject(&UserId::new("admin").unwrap()).await.unwrap();
    for user in ["alice", "bob", "carol"] {
        let user = UserId::new(user).unwrap();
        policy.register_subject(&user).await.unwrap();
        policy
            .apply(
                &admin,
                Operation::ManageRole {
                    action: RoleAction::Grant,
                    role: OrgRole::Editor,
                    target: user,
                },
            )
            .await
            .unwrap();
    }
    let alice = Principal::user("alice").unwrap();
    policy
        .apply(&alice, Operation::CreateContent { post_id: "1".to_string() })
        .await
        .unwrap();

    // alice -> carol lands after alice is authorized as owner
    let alice_owner = RelationTuple::parse("user:alice", "owner", "post:1").unwrap();
    let carol_owner = RelationTuple::parse("user:carol", "owner", "post:1").unwrap();
    store.interleave(
        WriteRequest::new()
            .delete(alice_owner)
            .write(carol_owner.clone()),
    );

    let result = policy
        .apply(
            &alice,
            Operation::TransferOwnership {
                post_id: "1".to_string(),
                new_owner: UserId::new("bob").unwrap(),
            },
        )
        .await;
    assert!(matches!(result, Err(PolicyError::TransactionFailed(_))));

    let owners = policy
        .engine()
        .read(
            &TupleFilter::new()
                .relation(RelationName::new("owner").unwrap())
                .object(ObjectRef::post("1").unwrap()),
        )
        .await
        .unwrap();
    assert_eq!(owners, vec![carol_owner]);
}

proptest! {
    #[test]
    fn single_owner_after_any_transfer_sequence(targets in prop::collection::vec(0usize..4, 1..12)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let policy = policy();
            let admin = UserId::new("admin").unwrap();
            policy.register_subject(&admin).await.unwrap();
            let admin = Principal::Authenticated(admin);

            // e0..e1 are editors, e2..e3 stay viewers
            for i in 0..4 {
                let user = UserId::new(&format!("e{i}")).unwrap();
                policy.register_subject(&user).await.unwrap();
                if i < 2 {
                    policy
                        .apply(&admin, Operation::ManageRole {
                            action: RoleAction::Grant,
                            role: OrgRole::Editor,
                            target: user,
                        })
                        .await
                        .unwrap();
                }
            }
            policy
                .apply(&admin, Operation::CreateContent { post_id: "p1".to_string() })
                .await
                .unwrap();

            for target in targets {
                let result = policy
                    .apply(&admin, Operation::TransferOwnership {
                        post_id: "p1".to_string(),
                        new_owner: UserId::new(&format!("e{target}")).unwrap(),
                    })
                    .await;
                prop_assert_eq!(result.is_ok(), target < 2);
                prop_assert_eq!(owners(&policy, "p1").await, 1);
            }
            Ok(())
        })?;
    }
}
