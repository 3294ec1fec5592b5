//! Identity resolution: turns PRODUCT_DEFINITION records into named
//! [`ProductDefinition`]s.
//!
//! Two strategies exist. *Direct* takes a definition's own first attribute
//! as its name. *Indirect* follows definition → formation → product and
//! takes the product's first attribute. A definition whose chain breaks is
//! dropped and reported as [`Diagnostic::UnresolvedReference`].

use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use crate::decoder::DecodedRecord;
use crate::entities::{
    parse_formation, parse_formation_ref, parse_product, parse_product_definition, EntityId,
    ProductDefinition,
};
use crate::error::{Diagnostic, StepTreeError};
use crate::lexer::ClassifiedRecords;
use crate::progress::PhaseCounter;

/// How product definitions get their display names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameStrategy {
    /// Indirect when the file has both PRODUCT and formation records, else direct.
    #[default]
    Auto,
    /// Name is the definition's own first attribute.
    Direct,
    /// Name comes from the PRODUCT reached through the formation.
    Indirect,
}

impl NameStrategy {
    /// Resolve `Auto` against the records actually present.
    pub fn effective(self, records: &ClassifiedRecords) -> NameStrategy {
        match self {
            NameStrategy::Auto => {
                if !records.products.is_empty() && !records.formations.is_empty() {
                    NameStrategy::Indirect
                } else {
                    NameStrategy::Direct
                }
            }
            other => other,
        }
    }
}

/// Product definitions that resolved, plus the gaps found on the way.
#[derive(Debug, Clone, Default)]
pub struct ResolvedProducts {
    /// Named product definitions, in file order.
    pub products: Vec<ProductDefinition>,
    /// One entry per dropped definition.
    pub diagnostics: Vec<Diagnostic>,
}

/// Resolve every PRODUCT_DEFINITION record in `records`.
///
/// `Auto` is resolved against `records` first, see [`NameStrategy::effective`].
pub fn resolve_products(
    records: &ClassifiedRecords,
    strategy: NameStrategy,
    counter: &mut PhaseCounter<'_>,
) -> Result<ResolvedProducts, StepTreeError> {
    match strategy.effective(records) {
        NameStrategy::Indirect => resolve_indirect(records, counter),
        NameStrategy::Direct | NameStrategy::Auto => resolve_direct(records, counter),
    }
}

fn resolve_direct(
    records: &ClassifiedRecords,
    counter: &mut PhaseCounter<'_>,
) -> Result<ResolvedProducts, StepTreeError> {
    let mut resolved = ResolvedProducts::default();
    for raw in &records.product_definitions {
        counter.tick();
        let record = DecodedRecord::decode(raw);
        resolved.products.push(parse_product_definition(&record)?);
    }
    Ok(resolved)
}

fn resolve_indirect(
    records: &ClassifiedRecords,
    counter: &mut PhaseCounter<'_>,
) -> Result<ResolvedProducts, StepTreeError> {
    let mut product_names: HashMap<EntityId, String> = HashMap::new();
    for raw in &records.products {
        let product = parse_product(&DecodedRecord::decode(raw))?;
        product_names.entry(product.id).or_insert(product.name);
    }

    let mut formations: HashMap<EntityId, EntityId> = HashMap::new();
    for raw in &records.formations {
        let formation = parse_formation(&DecodedRecord::decode(raw))?;
        formations.entry(formation.id).or_insert(formation.product_ref);
    }

    let mut resolved = ResolvedProducts::default();
    for raw in &records.product_definitions {
        counter.tick();
        let record = DecodedRecord::decode(raw);
        let formation_ref = parse_formation_ref(&record)?;

        let name = formations
            .get(&formation_ref)
            .ok_or_else(|| formation_ref.clone())
            .and_then(|product_ref| {
                product_names
                    .get(product_ref)
                    .ok_or_else(|| product_ref.clone())
            });

        match name {
            Ok(name) => resolved.products.push(ProductDefinition {
                id: record.id,
                name: name.clone(),
            }),
            Err(missing) => {
                warn!(
                    product_definition = %record.id,
                    missing = %missing,
                    "dropping product definition with unresolved name"
                );
                resolved.diagnostics.push(Diagnostic::UnresolvedReference {
                    product_definition: record.id,
                    missing,
                });
            }
        }
    }
    Ok(resolved)
}
