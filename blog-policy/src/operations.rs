use crate::content::ContentRecord;
use crate::error::{PolicyError, Result};
use crate::principal::UserId;
use auth_rebac::{RelationName, RelationTuple};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Roles held on the organization object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrgRole {
    Admin,
    Editor,
    Moderator,
    Viewer,
}

impl OrgRole {
    pub const ALL: [OrgRole; 4] = [Self::Admin, Self::Editor, Self::Moderator, Self::Viewer];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Moderator => "moderator",
            Self::Viewer => "viewer",
        }
    }

    pub fn relation(self) -> Result<RelationName> {
        Ok(RelationName::new(self.as_str())?)
    }
}

impl FromStr for OrgRole {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| PolicyError::Validation(format!("invalid role '{}'", s)))
    }
}

impl fmt::Display for OrgRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleAction {
    Grant,
    Revoke,
}

impl FromStr for RoleAction {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grant" => Ok(Self::Grant),
            "revoke" => Ok(Self::Revoke),
            other => Err(PolicyError::Validation(format!("invalid action '{}'", other))),
        }
    }
}

impl fmt::Display for RoleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Grant => "grant",
            Self::Revoke => "revoke",
        })
    }
}

/// Content-lifecycle operations guarded by the policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Operation {
    CreateContent { post_id: String },
    ReadContent { record: ContentRecord },
    EditContent { post_id: String },
    DeleteContent { post_id: String },
    PublishContent { post_id: String },
    TransferOwnership { post_id: String, new_owner: UserId },
    GrantEdit { post_id: String, target: UserId },
    ManageRole { action: RoleAction, role: OrgRole, target: UserId },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateContent { .. } => "create_content",
            Self::ReadContent { .. } => "read_content",
            Self::EditContent { .. } => "edit_content",
            Self::DeleteContent { .. } => "delete_content",
            Self::PublishContent { .. } => "publish_content",
            Self::TransferOwnership { .. } => "transfer_ownership",
            Self::GrantEdit { .. } => "grant_edit",
            Self::ManageRole { .. } => "manage_role",
        }
    }
}

/// A tuple mutation applied on behalf of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tuple", rename_all = "snake_case")]
pub enum Effect {
    Wrote(RelationTuple),
    Deleted(RelationTuple),
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wrote(tuple) => write!(f, "+ {}", tuple),
            Self::Deleted(tuple) => write!(f, "- {}", tuple),
        }
    }
}

/// Result of an allowed operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub operation: &'static str,
    pub effects: Vec<Effect>,
}

impl Outcome {
    pub fn allowed(operation: &'static str) -> Self {
        Self {
            operation,
            effects: Vec::new(),
        }
    }

    pub fn with_effects(operation: &'static str, effects: Vec<Effect>) -> Self {
        Self { operation, effects }
    }
}
