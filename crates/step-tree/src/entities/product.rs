//! Product identity entities: product, formation, and definition.

use super::EntityId;
use crate::decoder::DecodedRecord;
use crate::error::StepTreeError;

/// Attribute index of the display name in PRODUCT and PRODUCT_DEFINITION.
const NAME_IDX: usize = 0;
/// Attribute index of the formation reference in PRODUCT_DEFINITION.
const FORMATION_REF_IDX: usize = 2;
/// Attribute index of the product reference in PRODUCT_DEFINITION_FORMATION.
const PRODUCT_REF_IDX: usize = 2;

/// A buildable part or assembly with a resolved display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDefinition {
    /// The entity ID.
    pub id: EntityId,
    /// Display name.
    pub name: String,
}

/// Parsed PRODUCT entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// The entity ID.
    pub id: EntityId,
    /// Display name.
    pub name: String,
}

/// Parsed PRODUCT_DEFINITION_FORMATION entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDefinitionFormation {
    /// The entity ID.
    pub id: EntityId,
    /// The PRODUCT this formation is a version of.
    pub product_ref: EntityId,
}

/// Parse a PRODUCT_DEFINITION whose own first attribute is its name.
pub fn parse_product_definition(
    record: &DecodedRecord,
) -> Result<ProductDefinition, StepTreeError> {
    Ok(ProductDefinition {
        id: record.id.clone(),
        name: record.string(NAME_IDX)?,
    })
}

/// Get the formation a PRODUCT_DEFINITION points at.
pub fn parse_formation_ref(record: &DecodedRecord) -> Result<EntityId, StepTreeError> {
    record.entity_ref(FORMATION_REF_IDX)
}

/// Parse a PRODUCT entity.
pub fn parse_product(record: &DecodedRecord) -> Result<Product, StepTreeError> {
    Ok(Product {
        id: record.id.clone(),
        name: record.string(NAME_IDX)?,
    })
}

/// Parse a PRODUCT_DEFINITION_FORMATION entity.
pub fn parse_formation(
    record: &DecodedRecord,
) -> Result<ProductDefinitionFormation, StepTreeError> {
    Ok(ProductDefinitionFormation {
        id: record.id.clone(),
        product_ref: record.entity_ref(PRODUCT_REF_IDX)?,
    })
}
