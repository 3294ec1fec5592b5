//! Relation graph over NEXT_ASSEMBLY_USAGE_OCCURRENCE edges.

use std::collections::{HashMap, HashSet};

use crate::decoder::DecodedRecord;
use crate::entities::{parse_next_assembly_usage_occurrence, AssemblyRelation, EntityId};
use crate::error::StepTreeError;
use crate::lexer::RawRecord;
use crate::progress::PhaseCounter;

/// Ordered containment edges with a container → children index.
#[derive(Debug, Clone, Default)]
pub struct RelationGraph {
    relations: Vec<AssemblyRelation>,
    /// Container ID to indices into `relations`, in relation order.
    children: HashMap<EntityId, Vec<usize>>,
    contained: HashSet<EntityId>,
}

impl RelationGraph {
    /// Index a list of relations.
    pub fn new(relations: Vec<AssemblyRelation>) -> Self {
        let mut children: HashMap<EntityId, Vec<usize>> = HashMap::new();
        let mut contained = HashSet::new();
        for (idx, relation) in relations.iter().enumerate() {
            children
                .entry(relation.container.clone())
                .or_default()
                .push(idx);
            contained.insert(relation.contains.clone());
        }
        Self {
            relations,
            children,
            contained,
        }
    }

    /// Decode NEXT_ASSEMBLY_USAGE_OCCURRENCE records and index them.
    pub fn from_records(
        records: &[RawRecord],
        counter: &mut PhaseCounter<'_>,
    ) -> Result<Self, StepTreeError> {
        let mut relations = Vec::with_capacity(records.len());
        for raw in records {
            counter.tick();
            let record = DecodedRecord::decode(raw);
            relations.push(parse_next_assembly_usage_occurrence(&record)?);
        }
        Ok(Self::new(relations))
    }

    /// All relations in file order.
    pub fn relations(&self) -> &[AssemblyRelation] {
        &self.relations
    }

    /// Number of relations.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Whether the graph has no relations.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Relations whose container is `id`, in file order.
    pub fn children_of<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a AssemblyRelation> + 'a {
        self.child_indices(id).map(move |&idx| &self.relations[idx])
    }

    fn child_indices(&self, id: &str) -> std::slice::Iter<'_, usize> {
        self.children
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
    }

    /// Whether `id` contains anything.
    pub fn is_container(&self, id: &str) -> bool {
        self.children.contains_key(id)
    }

    /// Whether `id` is contained by anything.
    pub fn is_contained(&self, id: &str) -> bool {
        self.contained.contains(id)
    }

    /// Whether any relation mentions `id` at all.
    pub fn is_referenced(&self, id: &str) -> bool {
        self.is_container(id) || self.is_contained(id)
    }

    /// Number of occurrences below `id`.
    ///
    /// Shared sub-assemblies are counted once per occurrence. An ID already
    /// on the current path contributes nothing, so cyclic input yields a
    /// finite lower bound. The walk keeps its own stack, so depth is bounded
    /// by memory rather than the call stack.
    pub fn descendant_count(&self, id: &str) -> usize {
        let mut total = 0;
        let mut path: HashSet<&str> = HashSet::new();
        path.insert(id);
        let mut stack = vec![(id, self.child_indices(id))];

        while let Some((_, pending)) = stack.last_mut() {
            match pending.next() {
                Some(&idx) => {
                    let child = self.relations[idx].contains.as_str();
                    if path.insert(child) {
                        total += 1;
                        stack.push((child, self.child_indices(child)));
                    }
                }
                None => {
                    if let Some((done, _)) = stack.pop() {
                        path.remove(done);
                    }
                }
            }
        }
        total
    }
}
