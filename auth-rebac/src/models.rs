use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_NAME_LEN: usize = 64;
const MAX_ID_LEN: usize = 128;

/// Type and relation names: `[a-z][a-z0-9_]*`
fn validate_name(kind: &str, value: &str) -> Result<()> {
    let mut chars = value.chars();
    let starts_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !starts_ok || !rest_ok || value.len() > MAX_NAME_LEN {
        return Err(AuthzError::Validation(format!("invalid {} name: {:?}", kind, value)));
    }
    Ok(())
}

fn validate_id(value: &str) -> Result<()> {
    let chars_ok = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '@' | '|'));
    if value.is_empty() || value.len() > MAX_ID_LEN || !chars_ok {
        return Err(AuthzError::Validation(format!("invalid object id: {:?}", value)));
    }
    Ok(())
}

/// A validated relation name such as `owner` or `can_edit`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelationName(String);

impl RelationName {
    pub fn new(name: &str) -> Result<Self> {
        validate_name("relation", name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RelationName {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self> {
        validate_name("relation", &value)?;
        Ok(Self(value))
    }
}

impl From<RelationName> for String {
    fn from(value: RelationName) -> Self {
        value.0
    }
}

impl FromStr for RelationName {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authorizable object, rendered `type:id`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectRef {
    object_type: String,
    object_id: String,
}

impl ObjectRef {
    pub fn new(object_type: &str, object_id: &str) -> Result<Self> {
        validate_name("object type", object_type)?;
        validate_id(object_id)?;
        Ok(Self {
            object_type: object_type.to_string(),
            object_id: object_id.to_string(),
        })
    }

    pub fn user(user_id: &str) -> Result<Self> {
        Self::new("user", user_id)
    }

    pub fn org(org_id: &str) -> Result<Self> {
        Self::new("org", org_id)
    }

    pub fn post(post_id: &str) -> Result<Self> {
        Self::new("post", post_id)
    }

    pub fn object_type(&self) -> &str {
        &self.object_type
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }
}

impl FromStr for ObjectRef {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        let (object_type, object_id) = s
            .split_once(':')
            .ok_or_else(|| AuthzError::Validation(format!("expected type:id, got {:?}", s)))?;
        Self::new(object_type, object_id)
    }
}

impl TryFrom<String> for ObjectRef {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ObjectRef> for String {
    fn from(value: ObjectRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

/// Represents a subject: either a concrete object (`user:42`) or a
/// userset (`org:blog#admin`, everyone holding `admin` on `org:blog`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectRef {
    object: ObjectRef,
    relation: Option<RelationName>,
}

impl SubjectRef {
    pub fn new(object: ObjectRef) -> Self {
        Self {
            object,
            relation: None,
        }
    }

    pub fn userset(object: ObjectRef, relation: RelationName) -> Self {
        Self {
            object,
            relation: Some(relation),
        }
    }

    pub fn user(user_id: &str) -> Result<Self> {
        Ok(Self::new(ObjectRef::user(user_id)?))
    }

    pub fn object(&self) -> &ObjectRef {
        &self.object
    }

    pub fn relation(&self) -> Option<&RelationName> {
        self.relation.as_ref()
    }

    pub fn is_userset(&self) -> bool {
        self.relation.is_some()
    }

    /// The schema-level type of this subject: `user` or `org#admin`
    pub fn subject_type(&self) -> String {
        match &self.relation {
            Some(relation) => format!("{}#{}", self.object.object_type(), relation),
            None => self.object.object_type().to_string(),
        }
    }
}

impl From<ObjectRef> for SubjectRef {
    fn from(object: ObjectRef) -> Self {
        Self::new(object)
    }
}

impl FromStr for SubjectRef {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('#') {
            Some((object, relation)) => Ok(Self::userset(object.parse()?, relation.parse()?)),
            None => Ok(Self::new(s.parse()?)),
        }
    }
}

impl TryFrom<String> for SubjectRef {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SubjectRef> for String {
    fn from(value: SubjectRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(f, "{}#{}", self.object, relation),
            None => write!(f, "{}", self.object),
        }
    }
}

/// Represents a relationship tuple: subject has relation to object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationTuple {
    pub subject: SubjectRef,
    pub relation: RelationName,
    pub object: ObjectRef,
}

impl RelationTuple {
    pub fn new(subject: SubjectRef, relation: RelationName, object: ObjectRef) -> Self {
        Self {
            subject,
            relation,
            object,
        }
    }

    /// Build a tuple from its textual parts, validating each one
    pub fn parse(subject: &str, relation: &str, object: &str) -> Result<Self> {
        Ok(Self::new(subject.parse()?, relation.parse()?, object.parse()?))
    }
}

impl fmt::Display for RelationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.subject)
    }
}

/// Tuple filter; `None` fields act as wildcards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TupleFilter {
    pub subject: Option<SubjectRef>,
    pub relation: Option<RelationName>,
    pub object_type: Option<String>,
    pub object: Option<ObjectRef>,
}

impl TupleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject: SubjectRef) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn relation(mut self, relation: RelationName) -> Self {
        self.relation = Some(relation);
        self
    }

    pub fn object_type(mut self, object_type: &str) -> Self {
        self.object_type = Some(object_type.to_string());
        self
    }

    pub fn object(mut self, object: ObjectRef) -> Self {
        self.object = Some(object);
        self
    }

    pub fn matches(&self, tuple: &RelationTuple) -> bool {
        self.subject.as_ref().map_or(true, |s| *s == tuple.subject)
            && self.relation.as_ref().map_or(true, |r| *r == tuple.relation)
            && self
                .object_type
                .as_deref()
                .map_or(true, |t| t == tuple.object.object_type())
            && self.object.as_ref().map_or(true, |o| *o == tuple.object)
    }
}

impl fmt::Display for TupleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let object = match (&self.object, &self.object_type) {
            (Some(object), _) => object.to_string(),
            (None, Some(object_type)) => format!("{}:*", object_type),
            (None, None) => "*".to_string(),
        };
        let relation = self.relation.as_ref().map_or("*".to_string(), |r| r.to_string());
        let subject = self.subject.as_ref().map_or("*".to_string(), |s| s.to_string());
        write!(f, "{}#{}@{}", object, relation, subject)
    }
}

/// Condition that must hold for a batch to apply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Precondition {
    MustExist { tuple: RelationTuple },
    MustNotExist { tuple: RelationTuple },
    NoneMatching { filter: TupleFilter },
}

impl fmt::Display for Precondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MustExist { tuple } => write!(f, "{} must exist", tuple),
            Self::MustNotExist { tuple } => write!(f, "{} must not exist", tuple),
            Self::NoneMatching { filter } => write!(f, "nothing may match {}", filter),
        }
    }
}

/// Atomic batch: every precondition holds and every mutation applies, or
/// nothing changes. Deletes apply before writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRequest {
    #[serde(default)]
    pub writes: Vec<RelationTuple>,
    #[serde(default)]
    pub deletes: Vec<RelationTuple>,
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
}

impl WriteRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(mut self, tuple: RelationTuple) -> Self {
        self.writes.push(tuple);
        self
    }

    pub fn delete(mut self, tuple: RelationTuple) -> Self {
        self.deletes.push(tuple);
        self
    }

    pub fn require(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty()
    }
}

/// Outcome of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Self::Allow
        } else {
            Self::Deny
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny => f.write_str("deny"),
        }
    }
}

/// Authorization check request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub subject: SubjectRef,
    pub relation: RelationName,
    pub object: ObjectRef,
}

/// Authorization check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub decision: Decision,
    pub debug_trace: Option<Vec<String>>,
}

/// Node of an expand result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpandNode {
    /// A concrete subject holding the relation
    Subject { subject: SubjectRef },
    /// An intermediate `object#relation` whose children hold it
    Relation { object: ObjectRef, relation: RelationName },
    /// Expansion stopped at the depth limit
    Truncated,
    /// `object#relation` was already being expanded on this path
    Cycle { object: ObjectRef, relation: RelationName },
}

/// Subject tree node for expand responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectTree {
    pub node: ExpandNode,
    pub children: Vec<SubjectTree>,
}

impl SubjectTree {
    pub fn leaf(node: ExpandNode) -> Self {
        Self {
            node,
            children: Vec::new(),
        }
    }
}
