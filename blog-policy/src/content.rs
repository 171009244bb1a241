use crate::error::{PolicyError, Result};
use crate::principal::UserId;
use auth_rebac::ObjectRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Publication status, owned by the content store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    Draft,
    Published,
}

impl FromStr for ContentStatus {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            other => Err(PolicyError::Validation(format!("unknown content status '{}'", other))),
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Draft => "draft",
            Self::Published => "published",
        })
    }
}

/// Content record as held by the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub owner: UserId,
    pub status: ContentStatus,
}

impl ContentRecord {
    pub fn new(id: &str, owner: UserId, status: ContentStatus) -> Result<Self> {
        post_object(id)?;
        Ok(Self {
            id: id.to_string(),
            owner,
            status,
        })
    }

    pub fn is_published(&self) -> bool {
        self.status == ContentStatus::Published
    }

    pub fn object(&self) -> Result<ObjectRef> {
        post_object(&self.id)
    }
}

/// `post:<id>` object for a content id
pub fn post_object(id: &str) -> Result<ObjectRef> {
    Ok(ObjectRef::post(id.strip_prefix("post:").unwrap_or(id))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_record() {
        let owner = UserId::new("2").unwrap();
        let record = ContentRecord::new("17", owner, ContentStatus::Draft).unwrap();
        assert!(!record.is_published());
        assert_eq!(record.object().unwrap().to_string(), "post:17");
        assert!(ContentRecord::new("bad id", UserId::new("2").unwrap(), ContentStatus::Draft).is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("published".parse::<ContentStatus>().unwrap(), ContentStatus::Published);
        assert!("archived".parse::<ContentStatus>().is_err());
    }
}
