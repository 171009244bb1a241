use crate::error::{PolicyError, Result};
use auth_rebac::{ObjectRef, SubjectRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Validated user identifier, usable as a `user:<id>` subject
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(ObjectRef);

impl UserId {
    pub fn new(id: &str) -> Result<Self> {
        Ok(Self(ObjectRef::user(id)?))
    }

    pub fn as_str(&self) -> &str {
        self.0.object_id()
    }

    pub fn subject(&self) -> SubjectRef {
        SubjectRef::new(self.0.clone())
    }

    pub fn object(&self) -> &ObjectRef {
        &self.0
    }
}

impl FromStr for UserId {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s.strip_prefix("user:").unwrap_or(s))
    }
}

impl TryFrom<String> for UserId {
    type Error = PolicyError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.as_str().to_string()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The caller of an operation, as established by the identity layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user", rename_all = "snake_case")]
pub enum Principal {
    Authenticated(UserId),
    Anonymous,
}

impl Principal {
    pub fn user(id: &str) -> Result<Self> {
        Ok(Self::Authenticated(UserId::new(id)?))
    }

    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Authenticated(id) => Some(id),
            Self::Anonymous => None,
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(id) => write!(f, "user:{}", id),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}
