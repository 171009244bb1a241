use crate::{
    content::{post_object, ContentRecord},
    error::{PolicyError, Result},
    operations::{Effect, Operation, OrgRole, Outcome, RoleAction},
    principal::{Principal, UserId},
};
use auth_rebac::{
    AuthorizationEngine, AuthzError, ObjectRef, Precondition, RelationName, RelationTuple,
    SubjectRef, TupleFilter, WriteRequest,
};
use error_common::report_error;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of registering a subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub user: UserId,
    /// Role assigned by this registration; `None` when already registered
    pub role: Option<OrgRole>,
    pub newly_created: bool,
}

/// Combines org-role and per-post checks into a verdict for each
/// content-lifecycle operation, and keeps tuples in sync with the
/// transitions it allows.
///
/// A denied operation never mutates a tuple. Store failures and timeouts
/// propagate as their own error classes and are never reported as denials.
pub struct ContentPolicy {
    engine: Arc<AuthorizationEngine>,
    org: ObjectRef,
}

impl ContentPolicy {
    pub fn new(engine: Arc<AuthorizationEngine>, org_id: &str) -> Result<Self> {
        Ok(Self {
            engine,
            org: ObjectRef::org(org_id)?,
        })
    }

    pub fn engine(&self) -> &Arc<AuthorizationEngine> {
        &self.engine
    }

    pub fn org(&self) -> &ObjectRef {
        &self.org
    }

    // =============================================================================
    // Checks
    // =============================================================================

    /// Whether the user holds an org role
    pub async fn has_role(&self, user: &UserId, role: OrgRole) -> Result<bool> {
        self.holds(user, role.as_str(), &self.org).await
    }

    /// Short-circuits on the first role held
    async fn has_any_role(&self, user: &UserId, roles: &[OrgRole]) -> Result<bool> {
        for role in roles {
            if self.has_role(user, *role).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn holds(&self, user: &UserId, relation: &str, object: &ObjectRef) -> Result<bool> {
        let decision = self
            .engine
            .check(&user.subject(), &RelationName::new(relation)?, object)
            .await?;
        debug!("{}#{}@{} => {}", object, relation, user, decision);
        Ok(decision.is_allowed())
    }

    // =============================================================================
    // Operations
    // =============================================================================

    /// Decide an operation and apply its tuple effects when allowed
    pub async fn apply(&self, principal: &Principal, operation: Operation) -> Result<Outcome> {
        let name = operation.name();
        let result = self.dispatch(principal, operation).await;

        match &result {
            Ok(outcome) => info!(
                "{} allowed for {} ({} tuple effects)",
                name,
                principal,
                outcome.effects.len()
            ),
            Err(err) if err.is_denied() => warn!("{} denied for {}", name, principal),
            Err(err) => report_error(name, err),
        }
        result
    }

    async fn dispatch(&self, principal: &Principal, operation: Operation) -> Result<Outcome> {
        let name = operation.name();
        match operation {
            Operation::ReadContent { record } => self.read_content(principal, &record, name).await,
            Operation::CreateContent { post_id } => {
                let user = authenticated(principal, name)?;
                self.create_content(user, &post_id, name).await
            }
            Operation::EditContent { post_id } => {
                let user = authenticated(principal, name)?;
                let post = post_object(&post_id)?;
                self.allow_if(self.holds(user, "can_edit", &post).await?, name)
            }
            Operation::DeleteContent { post_id } => {
                let user = authenticated(principal, name)?;
                let post = post_object(&post_id)?;
                let allowed = self.holds(user, "owner", &post).await?
                    || self.has_any_role(user, &[OrgRole::Admin, OrgRole::Moderator]).await?;
                self.allow_if(allowed, name)
            }
            Operation::PublishContent { post_id } => {
                let user = authenticated(principal, name)?;
                post_object(&post_id)?;
                let allowed = self
                    .has_any_role(user, &[OrgRole::Admin, OrgRole::Moderator])
                    .await?;
                self.allow_if(allowed, name)
            }
            Operation::TransferOwnership { post_id, new_owner } => {
                let user = authenticated(principal, name)?;
                self.transfer_ownership(user, &post_id, &new_owner, name).await
            }
            Operation::GrantEdit { post_id, target } => {
                let user = authenticated(principal, name)?;
                self.grant_edit(user, &post_id, &target, name).await
            }
            Operation::ManageRole {
                action,
                role,
                target,
            } => {
                let user = authenticated(principal, name)?;
                self.manage_role(user, action, role, &target, name).await
            }
        }
    }

    fn allow_if(&self, allowed: bool, operation: &'static str) -> Result<Outcome> {
        if allowed {
            Ok(Outcome::allowed(operation))
        } else {
            Err(PolicyError::Denied { operation })
        }
    }

    async fn create_content(
        &self,
        user: &UserId,
        post_id: &str,
        name: &'static str,
    ) -> Result<Outcome> {
        let post = post_object(post_id)?;
        let allowed = self
            .has_any_role(user, &[OrgRole::Admin, OrgRole::Editor, OrgRole::Moderator])
            .await?;
        if !allowed {
            return Err(PolicyError::Denied { operation: name });
        }

        let owner = self.relation("owner")?;
        let owner_tuple = RelationTuple::new(user.subject(), owner.clone(), post.clone());
        let org_tuple = RelationTuple::new(
            SubjectRef::new(self.org.clone()),
            self.relation("org")?,
            post.clone(),
        );

        let request = WriteRequest::new()
            .require(Precondition::NoneMatching {
                filter: TupleFilter::new().relation(owner).object(post.clone()),
            })
            .write(owner_tuple.clone())
            .write(org_tuple.clone());

        self.engine.write(request).await.map_err(|err| match err {
            AuthzError::PreconditionFailed(_) => {
                PolicyError::Validation(format!("{} already has an owner", post))
            }
            other => other.into(),
        })?;

        Ok(Outcome::with_effects(
            name,
            vec![Effect::Wrote(owner_tuple), Effect::Wrote(org_tuple)],
        ))
    }

    async fn read_content(
        &self,
        principal: &Principal,
        record: &ContentRecord,
        name: &'static str,
    ) -> Result<Outcome> {
        let post = record.object()?;
        if record.is_published() {
            return Ok(Outcome::allowed(name));
        }

        let user = authenticated(principal, name)?;
        self.allow_if(self.holds(user, "owner", &post).await?, name)
    }

    /// An owner transfers by deleting their own `owner` tuple, so losing
    /// ownership before the write fails the batch. Only the admin path acts
    /// on whichever owner the store reports.
    async fn transfer_ownership(
        &self,
        user: &UserId,
        post_id: &str,
        new_owner: &UserId,
        name: &'static str,
    ) -> Result<Outcome> {
        let post = post_object(post_id)?;
        let owner = self.relation("owner")?;
        let own_tuple = RelationTuple::new(user.subject(), owner.clone(), post.clone());

        let is_owner = self.holds(user, "owner", &post).await?;
        if !is_owner && !self.has_role(user, OrgRole::Admin).await? {
            return Err(PolicyError::Denied { operation: name });
        }

        if !self.has_role(new_owner, OrgRole::Editor).await? {
            return Err(PolicyError::Validation(format!(
                "new owner {} must hold the editor role",
                new_owner
            )));
        }

        let current = if is_owner {
            own_tuple
        } else {
            self.current_owner(&post)
                .await?
                .ok_or_else(|| PolicyError::NotFound(format!("{} has no owner", post)))?
        };

        if current.subject == new_owner.subject() {
            debug!("{} already owned by {}", post, new_owner);
            return Ok(Outcome::allowed(name));
        }

        let replacement = RelationTuple::new(new_owner.subject(), owner, post.clone());
        let request = WriteRequest::new()
            .require(Precondition::MustExist {
                tuple: current.clone(),
            })
            .delete(current.clone())
            .write(replacement.clone());

        self.engine.write(request).await.map_err(|err| match err {
            AuthzError::PreconditionFailed(_) => PolicyError::TransactionFailed(format!(
                "ownership of {} changed during transfer",
                post
            )),
            other => other.into(),
        })?;

        Ok(Outcome::with_effects(
            name,
            vec![Effect::Deleted(current), Effect::Wrote(replacement)],
        ))
    }

    async fn grant_edit(
        &self,
        user: &UserId,
        post_id: &str,
        target: &UserId,
        name: &'static str,
    ) -> Result<Outcome> {
        let post = post_object(post_id)?;
        if !self.has_role(user, OrgRole::Admin).await? {
            return Err(PolicyError::Denied { operation: name });
        }

        if !self.has_role(target, OrgRole::Moderator).await? {
            return Err(PolicyError::Validation(format!(
                "target {} must hold the moderator role",
                target
            )));
        }

        // Owner tuples are swapped, never removed, so an existing post keeps one
        if self.current_owner(&post).await?.is_none() {
            return Err(PolicyError::NotFound(format!("{} has no owner", post)));
        }

        let grant = RelationTuple::new(target.subject(), self.relation("granted_editor")?, post);
        self.engine.write_tuples(vec![grant.clone()]).await?;
        Ok(Outcome::with_effects(name, vec![Effect::Wrote(grant)]))
    }

    async fn manage_role(
        &self,
        user: &UserId,
        action: RoleAction,
        role: OrgRole,
        target: &UserId,
        name: &'static str,
    ) -> Result<Outcome> {
        if !self.has_role(user, OrgRole::Admin).await? {
            return Err(PolicyError::Denied { operation: name });
        }

        let tuple = RelationTuple::new(target.subject(), role.relation()?, self.org.clone());
        let effect = match action {
            RoleAction::Grant => {
                self.engine.write_tuples(vec![tuple.clone()]).await?;
                Effect::Wrote(tuple)
            }
            RoleAction::Revoke => {
                self.engine.delete_tuples(vec![tuple.clone()]).await?;
                Effect::Deleted(tuple)
            }
        };
        Ok(Outcome::with_effects(name, vec![effect]))
    }

    // =============================================================================
    // Subjects
    // =============================================================================

    /// Register a subject exactly once. The first subject ever registered
    /// claims `admin`; everyone after that starts as `viewer`.
    ///
    /// Registration is marked by a `member` tuple on the org. The admin claim
    /// is a conditional batch that only applies while no `member` exists, so
    /// concurrent first registrations produce exactly one admin.
    pub async fn register_subject(&self, user: &UserId) -> Result<Registration> {
        let member = RelationTuple::new(user.subject(), self.relation("member")?, self.org.clone());
        if self.engine.tuple_exists(&member).await? {
            debug!("{} already registered", user);
            return Ok(Registration {
                user: user.clone(),
                role: None,
                newly_created: false,
            });
        }

        let claim_admin = WriteRequest::new()
            .require(Precondition::NoneMatching {
                filter: TupleFilter::new()
                    .relation(self.relation("member")?)
                    .object(self.org.clone()),
            })
            .write(member.clone())
            .write(self.role_tuple(user, OrgRole::Admin)?);

        match self.engine.write(claim_admin).await {
            Ok(()) => return self.registered(user, OrgRole::Admin),
            Err(AuthzError::PreconditionFailed(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let join_as_viewer = WriteRequest::new()
            .require(Precondition::MustNotExist {
                tuple: member.clone(),
            })
            .write(member)
            .write(self.role_tuple(user, OrgRole::Viewer)?);

        match self.engine.write(join_as_viewer).await {
            Ok(()) => self.registered(user, OrgRole::Viewer),
            // Registered concurrently by another request
            Err(AuthzError::PreconditionFailed(_)) => Ok(Registration {
                user: user.clone(),
                role: None,
                newly_created: false,
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn registered(&self, user: &UserId, role: OrgRole) -> Result<Registration> {
        info!("Registered {} with role {}", user, role);
        Ok(Registration {
            user: user.clone(),
            role: Some(role),
            newly_created: true,
        })
    }

    /// Every registered subject; admin only
    pub async fn list_users(&self, principal: &Principal) -> Result<Vec<UserId>> {
        let operation = "list_users";
        let user = authenticated(principal, operation)?;
        if !self.has_role(user, OrgRole::Admin).await? {
            warn!("{} denied for {}", operation, principal);
            return Err(PolicyError::Denied { operation });
        }

        let members = self
            .engine
            .read(
                &TupleFilter::new()
                    .relation(self.relation("member")?)
                    .object(self.org.clone()),
            )
            .await?;

        members
            .into_iter()
            .filter(|t| !t.subject.is_userset() && t.subject.object().object_type() == "user")
            .map(|t| UserId::new(t.subject.object().object_id()))
            .collect()
    }

    // =============================================================================
    // Listing
    // =============================================================================

    /// Narrow content-store records to what the principal may list:
    /// published records, plus drafts the caller owns. Input order is kept.
    pub async fn visible_content(
        &self,
        principal: &Principal,
        records: &[ContentRecord],
    ) -> Result<Vec<ContentRecord>> {
        let mut visible = Vec::with_capacity(records.len());
        for record in records {
            let post = record.object()?;
            let keep = record.is_published()
                || match principal.user_id() {
                    Some(user) => self.holds(user, "owner", &post).await?,
                    None => false,
                };
            if keep {
                visible.push(record.clone());
            }
        }
        debug!(
            "{} of {} records visible to {}",
            visible.len(),
            records.len(),
            principal
        );
        Ok(visible)
    }

    async fn current_owner(&self, post: &ObjectRef) -> Result<Option<RelationTuple>> {
        Ok(self
            .engine
            .read(
                &TupleFilter::new()
                    .relation(self.relation("owner")?)
                    .object(post.clone()),
            )
            .await?
            .into_iter()
            .next())
    }

    fn role_tuple(&self, user: &UserId, role: OrgRole) -> Result<RelationTuple> {
        Ok(RelationTuple::new(user.subject(), role.relation()?, self.org.clone()))
    }

    fn relation(&self, name: &str) -> Result<RelationName> {
        Ok(RelationName::new(name)?)
    }
}

/// Anonymous callers may only read published content
fn authenticated<'a>(principal: &'a Principal, operation: &'static str) -> Result<&'a UserId> {
    principal
        .user_id()
        .ok_or(PolicyError::Unauthenticated { operation })
}
