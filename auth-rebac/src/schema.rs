use crate::{
    error::{AuthzError, Result},
    models::*,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Relation schema: object types, their relations, and how relations compose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Type definitions keyed by type name (e.g., "org", "post", "user")
    pub types: BTreeMap<String, TypeDefinition>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::blog_schema()
    }
}

/// Definition of an object type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationDefinition>,
}

/// Definition of a relation within a type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDefinition {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rewrite: Rewrite,
}

/// How a relation is derived
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rewrite {
    /// Assignable via tuples. Entries are `type` or `type#relation`.
    Direct { subject_types: Vec<String> },
    /// Another relation on the same object
    Computed { relation: String },
    /// For every object reached through `tupleset`, evaluate `computed` on it
    TupleToUserset { tupleset: String, computed: String },
    /// Any child allows
    Union { children: Vec<Rewrite> },
}

impl Rewrite {
    fn collect_direct_types<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Rewrite::Direct { subject_types } => out.extend(subject_types.iter().map(String::as_str)),
            Rewrite::Union { children } => children.iter().for_each(|c| c.collect_direct_types(out)),
            Rewrite::Computed { .. } | Rewrite::TupleToUserset { .. } => {}
        }
    }
}

impl RelationDefinition {
    /// Subject types assignable by tuple, or `None` for purely computed relations
    pub fn direct_subject_types(&self) -> Option<Vec<&str>> {
        let mut types = Vec::new();
        self.rewrite.collect_direct_types(&mut types);
        if Self::has_direct(&self.rewrite) {
            Some(types)
        } else {
            None
        }
    }

    fn has_direct(rewrite: &Rewrite) -> bool {
        match rewrite {
            Rewrite::Direct { .. } => true,
            Rewrite::Union { children } => children.iter().any(Self::has_direct),
            Rewrite::Computed { .. } | Rewrite::TupleToUserset { .. } => false,
        }
    }
}

fn direct(name: &str, description: &str, subject_types: &[&str]) -> RelationDefinition {
    RelationDefinition {
        name: name.to_string(),
        description: description.to_string(),
        rewrite: Rewrite::Direct {
            subject_types: subject_types.iter().map(|t| t.to_string()).collect(),
        },
    }
}

fn type_definition(name: &str, relations: Vec<RelationDefinition>) -> TypeDefinition {
    TypeDefinition {
        name: name.to_string(),
        relations: relations.into_iter().map(|r| (r.name.clone(), r)).collect(),
    }
}

impl Schema {
    pub fn new() -> Self {
        Self {
            types: BTreeMap::new(),
        }
    }

    /// The blog relation model: organisation roles, post ownership and
    /// per-post edit grants
    pub fn blog_schema() -> Self {
        let user = type_definition("user", Vec::new());

        let org = type_definition(
            "org",
            vec![
                direct("admin", "Manages roles and every post", &["user"]),
                direct("editor", "Creates posts and may receive transferred posts", &["user"]),
                direct("moderator", "Publishes, edits and deletes any post", &["user"]),
                direct("viewer", "Reads published posts", &["user"]),
                direct("member", "Every registered subject", &["user"]),
            ],
        );

        let can_edit = RelationDefinition {
            name: "can_edit".to_string(),
            description: "Owner, granted editor, or org admin/moderator".to_string(),
            rewrite: Rewrite::Union {
                children: vec![
                    Rewrite::Computed {
                        relation: "owner".to_string(),
                    },
                    Rewrite::Computed {
                        relation: "granted_editor".to_string(),
                    },
                    Rewrite::TupleToUserset {
                        tupleset: "org".to_string(),
                        computed: "admin".to_string(),
                    },
                    Rewrite::TupleToUserset {
                        tupleset: "org".to_string(),
                        computed: "moderator".to_string(),
                    },
                ],
            },
        };

        let post = type_definition(
            "post",
            vec![
                direct("org", "Organisation the post belongs to", &["org"]),
                direct("owner", "Single owner, reassigned only by transfer", &["user"]),
                direct("granted_editor", "Per-post edit grant", &["user"]),
                can_edit,
            ],
        );

        Self {
            types: [user, org, post]
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
        }
    }

    pub fn from_yaml(document: &str) -> Result<Self> {
        let schema: Self = serde_yaml::from_str(document)
            .map_err(|e| AuthzError::Schema(format!("failed to parse YAML schema: {}", e)))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json(document: &str) -> Result<Self> {
        let schema: Self = serde_json::from_str(document)
            .map_err(|e| AuthzError::Schema(format!("failed to parse JSON schema: {}", e)))?;
        schema.validate()?;
        Ok(schema)
    }

    /// Load and validate a schema document; `.json` files are JSON, anything else YAML
    pub fn load(path: &Path) -> Result<Self> {
        let document = std::fs::read_to_string(path).map_err(|e| {
            AuthzError::Schema(format!("failed to read schema {}: {}", path.display(), e))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&document),
            _ => Self::from_yaml(&document),
        }
    }

    pub fn get_type(&self, object_type: &str) -> Option<&TypeDefinition> {
        self.types.get(object_type)
    }

    pub fn get_relation(&self, object_type: &str, relation: &str) -> Option<&RelationDefinition> {
        self.types.get(object_type)?.relations.get(relation)
    }

    /// Resolve a check target before any store access
    pub fn resolve(&self, object: &ObjectRef, relation: &RelationName) -> Result<&RelationDefinition> {
        let type_def = self.get_type(object.object_type()).ok_or_else(|| {
            AuthzError::Validation(format!("unknown object type '{}'", object.object_type()))
        })?;
        type_def.relations.get(relation.as_str()).ok_or_else(|| {
            AuthzError::Validation(format!(
                "unknown relation '{}' for object type '{}'",
                relation,
                object.object_type()
            ))
        })
    }

    /// Validate that a tuple conforms to the schema
    pub fn validate_tuple(&self, tuple: &RelationTuple) -> Result<()> {
        let relation_def = self.resolve(&tuple.object, &tuple.relation)?;

        let allowed = relation_def.direct_subject_types().ok_or_else(|| {
            AuthzError::Validation(format!(
                "relation '{}' on '{}' is computed and cannot be written",
                tuple.relation,
                tuple.object.object_type()
            ))
        })?;

        let subject_type = tuple.subject.subject_type();
        if !allowed.iter().any(|t| *t == subject_type) {
            return Err(AuthzError::Validation(format!(
                "subject type '{}' not allowed for {}#{}",
                subject_type,
                tuple.object.object_type(),
                tuple.relation
            )));
        }

        Ok(())
    }

    /// Validate the entire schema is well-formed
    pub fn validate(&self) -> Result<()> {
        if self.types.is_empty() {
            return Err(AuthzError::Schema("schema defines no types".to_string()));
        }

        for (name, type_def) in &self.types {
            if name != &type_def.name {
                return Err(AuthzError::Schema(format!(
                    "type key '{}' doesn't match name '{}'",
                    name, type_def.name
                )));
            }
            if RelationName::new(name).is_err() {
                return Err(AuthzError::Schema(format!("invalid type name '{}'", name)));
            }

            for (relation_name, relation_def) in &type_def.relations {
                if relation_name != &relation_def.name {
                    return Err(AuthzError::Schema(format!(
                        "relation key '{}' doesn't match name '{}' on type '{}'",
                        relation_name, relation_def.name, name
                    )));
                }
                if RelationName::new(relation_name).is_err() {
                    return Err(AuthzError::Schema(format!(
                        "invalid relation name '{}' on type '{}'",
                        relation_name, name
                    )));
                }
                self.validate_rewrite(type_def, relation_name, &relation_def.rewrite)?;
            }
        }
        Ok(())
    }

    fn validate_rewrite(&self, type_def: &TypeDefinition, relation: &str, rewrite: &Rewrite) -> Result<()> {
        let context = format!("{}#{}", type_def.name, relation);
        match rewrite {
            Rewrite::Direct { subject_types } => {
                if subject_types.is_empty() {
                    return Err(AuthzError::Schema(format!("{}: direct relation allows no subject types", context)));
                }
                for subject_type in subject_types {
                    self.validate_subject_type(&context, subject_type)?;
                }
            }
            Rewrite::Computed { relation: target } => {
                if !type_def.relations.contains_key(target) {
                    return Err(AuthzError::Schema(format!(
                        "{}: computed relation references unknown relation '{}'",
                        context, target
                    )));
                }
            }
            Rewrite::TupleToUserset { tupleset, computed } => {
                let tupleset_def = type_def.relations.get(tupleset).ok_or_else(|| {
                    AuthzError::Schema(format!("{}: unknown tupleset relation '{}'", context, tupleset))
                })?;
                let Rewrite::Direct { subject_types } = &tupleset_def.rewrite else {
                    return Err(AuthzError::Schema(format!(
                        "{}: tupleset '{}' must be a direct relation",
                        context, tupleset
                    )));
                };
                for subject_type in subject_types {
                    if subject_type.contains('#') {
                        return Err(AuthzError::Schema(format!(
                            "{}: tupleset '{}' may only hold plain objects, found '{}'",
                            context, tupleset, subject_type
                        )));
                    }
                    if self.get_relation(subject_type, computed).is_none() {
                        return Err(AuthzError::Schema(format!(
                            "{}: type '{}' reached via '{}' has no relation '{}'",
                            context, subject_type, tupleset, computed
                        )));
                    }
                }
            }
            Rewrite::Union { children } => {
                if children.is_empty() {
                    return Err(AuthzError::Schema(format!("{}: empty union", context)));
                }
                for child in children {
                    self.validate_rewrite(type_def, relation, child)?;
                }
            }
        }
        Ok(())
    }

    fn validate_subject_type(&self, context: &str, subject_type: &str) -> Result<()> {
        let (object_type, relation) = match subject_type.split_once('#') {
            Some((object_type, relation)) => (object_type, Some(relation)),
            None => (subject_type, None),
        };
        if !self.types.contains_key(object_type) {
            return Err(AuthzError::Schema(format!(
                "{}: unknown subject type '{}'",
                context, object_type
            )));
        }
        if let Some(relation) = relation {
            if self.get_relation(object_type, relation).is_none() {
                return Err(AuthzError::Schema(format!(
                    "{}: unknown userset '{}#{}'",
                    context, object_type, relation
                )));
            }
        }
        Ok(())
    }

    /// Relations whose definition can reach themselves again. Legal, but
    /// every check through them is bounded by revisit detection.
    pub fn cycles(&self) -> Vec<String> {
        let mut edges: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for type_def in self.types.values() {
            for relation_def in type_def.relations.values() {
                let node = format!("{}#{}", type_def.name, relation_def.name);
                let targets = edges.entry(node).or_default();
                self.collect_edges(type_def, &relation_def.rewrite, targets);
            }
        }

        let mut cyclic = Vec::new();
        for start in edges.keys() {
            let mut stack: Vec<&str> = edges
                .get(start)
                .map(|targets| targets.iter().map(String::as_str).collect())
                .unwrap_or_default();
            let mut seen = BTreeSet::new();
            while let Some(node) = stack.pop() {
                if node == start {
                    cyclic.push(start.clone());
                    break;
                }
                if !seen.insert(node) {
                    continue;
                }
                if let Some(next) = edges.get(node) {
                    stack.extend(next.iter().map(String::as_str));
                }
            }
        }
        cyclic
    }

    fn collect_edges(&self, type_def: &TypeDefinition, rewrite: &Rewrite, out: &mut BTreeSet<String>) {
        match rewrite {
            Rewrite::Direct { subject_types } => {
                out.extend(subject_types.iter().filter(|t| t.contains('#')).cloned());
            }
            Rewrite::Computed { relation } => {
                out.insert(format!("{}#{}", type_def.name, relation));
            }
            Rewrite::TupleToUserset { tupleset, computed } => {
                if let Some(tupleset_def) = type_def.relations.get(tupleset) {
                    let mut targets = Vec::new();
                    tupleset_def.rewrite.collect_direct_types(&mut targets);
                    out.extend(targets.into_iter().map(|t| format!("{}#{}", t, computed)));
                }
            }
            Rewrite::Union { children } => {
                for child in children {
                    self.collect_edges(type_def, child, out);
                }
            }
        }
    }
}
