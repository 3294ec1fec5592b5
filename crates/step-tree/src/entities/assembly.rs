//! Assembly relation entities.

use super::EntityId;
use crate::decoder::DecodedRecord;
use crate::error::StepTreeError;

/// Attribute index of the relating (container) product definition.
const CONTAINER_IDX: usize = 3;
/// Attribute index of the related (contained) product definition.
const CONTAINED_IDX: usize = 4;

/// A directed containment edge: `container` holds `contains`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRelation {
    /// The relation's entity ID.
    pub id: EntityId,
    /// The containing product definition.
    pub container: EntityId,
    /// The contained product definition.
    pub contains: EntityId,
}

impl AssemblyRelation {
    /// Create a relation.
    pub fn new(
        id: impl Into<EntityId>,
        container: impl Into<EntityId>,
        contains: impl Into<EntityId>,
    ) -> Self {
        Self {
            id: id.into(),
            container: container.into(),
            contains: contains.into(),
        }
    }
}

/// Parse a NEXT_ASSEMBLY_USAGE_OCCURRENCE entity.
pub fn parse_next_assembly_usage_occurrence(
    record: &DecodedRecord,
) -> Result<AssemblyRelation, StepTreeError> {
    Ok(AssemblyRelation {
        id: record.id.clone(),
        container: record.entity_ref(CONTAINER_IDX)?,
        contains: record.entity_ref(CONTAINED_IDX)?,
    })
}
