use crate::{
    error::Result,
    models::*,
    repository::TupleRepository,
    schema::{Rewrite, Schema},
};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

type ExpandFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Subject expander finds all subjects with a given relation to an object
pub struct SubjectExpander {
    repository: Arc<dyn TupleRepository>,
    schema: Arc<Schema>,
}

impl SubjectExpander {
    pub fn new(repository: Arc<dyn TupleRepository>, schema: Arc<Schema>) -> Self {
        Self { repository, schema }
    }

    /// Expand the relation into a tree following tuples, usersets,
    /// computed relations and traversals
    pub async fn expand(
        &self,
        relation: &RelationName,
        object: &ObjectRef,
        max_depth: u32,
    ) -> Result<SubjectTree> {
        self.schema.resolve(object, relation)?;
        let mut path = HashSet::new();
        self.expand_relation(object.clone(), relation.clone(), &mut path, 0, max_depth)
            .await
    }

    fn expand_relation<'a>(
        &'a self,
        object: ObjectRef,
        relation: RelationName,
        path: &'a mut HashSet<String>,
        depth: u32,
        max_depth: u32,
    ) -> ExpandFuture<'a, SubjectTree> {
        Box::pin(async move {
            if depth >= max_depth {
                return Ok(SubjectTree::leaf(ExpandNode::Truncated));
            }

            let key = format!("{}#{}", object, relation);
            if path.contains(&key) {
                return Ok(SubjectTree::leaf(ExpandNode::Cycle { object, relation }));
            }

            let Some(relation_def) = self.schema.get_relation(object.object_type(), relation.as_str()) else {
                return Ok(SubjectTree::leaf(ExpandNode::Relation { object, relation }));
            };

            debug!("Expanding: {}", key);
            path.insert(key.clone());
            let children = self
                .expand_rewrite(&relation_def.rewrite, &object, &relation, path, depth, max_depth)
                .await;
            path.remove(&key);

            Ok(SubjectTree {
                node: ExpandNode::Relation { object, relation },
                children: children?,
            })
        })
    }

    fn expand_rewrite<'a>(
        &'a self,
        rewrite: &'a Rewrite,
        object: &'a ObjectRef,
        relation: &'a RelationName,
        path: &'a mut HashSet<String>,
        depth: u32,
        max_depth: u32,
    ) -> ExpandFuture<'a, Vec<SubjectTree>> {
        Box::pin(async move {
            let mut children = Vec::new();
            match rewrite {
                Rewrite::Direct { .. } => {
                    let tuples = self
                        .repository
                        .read_tuples(&TupleFilter::new().object(object.clone()).relation(relation.clone()))
                        .await?;
                    for tuple in tuples {
                        match tuple.subject.relation() {
                            Some(userset) => {
                                let child = self
                                    .expand_relation(
                                        tuple.subject.object().clone(),
                                        userset.clone(),
                                        path,
                                        depth + 1,
                                        max_depth,
                                    )
                                    .await?;
                                children.push(child);
                            }
                            None => children.push(SubjectTree::leaf(ExpandNode::Subject {
                                subject: tuple.subject,
                            })),
                        }
                    }
                }
                Rewrite::Computed { relation: target } => {
                    let child = self
                        .expand_relation(object.clone(), RelationName::new(target)?, path, depth + 1, max_depth)
                        .await?;
                    children.push(child);
                }
                Rewrite::TupleToUserset { tupleset, computed } => {
                    let tuples = self
                        .repository
                        .read_tuples(
                            &TupleFilter::new()
                                .object(object.clone())
                                .relation(RelationName::new(tupleset)?),
                        )
                        .await?;
                    let computed = RelationName::new(computed)?;
                    for tuple in tuples.into_iter().filter(|t| !t.subject.is_userset()) {
                        let child = self
                            .expand_relation(
                                tuple.subject.object().clone(),
                                computed.clone(),
                                path,
                                depth + 1,
                                max_depth,
                            )
                            .await?;
                        children.push(child);
                    }
                }
                Rewrite::Union { children: operands } => {
                    for operand in operands {
                        let expanded = self
                            .expand_rewrite(operand, object, relation, path, depth, max_depth)
                            .await?;
                        children.extend(expanded);
                    }
                }
            }
            Ok(children)
        })
    }

    /// List all concrete subjects (flattened, deduplicated) holding the relation
    pub async fn list_subjects(
        &self,
        relation: &RelationName,
        object: &ObjectRef,
        max_depth: u32,
    ) -> Result<Vec<SubjectRef>> {
        let tree = self.expand(relation, object, max_depth).await?;
        let mut subjects = BTreeSet::new();
        Self::flatten_tree(&tree, &mut subjects);
        Ok(subjects.into_iter().collect())
    }

    fn flatten_tree(tree: &SubjectTree, subjects: &mut BTreeSet<SubjectRef>) {
        if let ExpandNode::Subject { subject } = &tree.node {
            subjects.insert(subject.clone());
        }
        for child in &tree.children {
            Self::flatten_tree(child, subjects);
        }
    }
}
