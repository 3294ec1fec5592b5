//! Root assembly identification.

use tracing::debug;

use crate::entities::ProductDefinition;
use crate::error::StepTreeError;
use crate::graph::RelationGraph;

/// Find the top-level assembly among `products`.
///
/// The root is the single product that contains something and is contained
/// by nothing. With several such candidates the one with the most
/// descendants wins, the first in `products` order on a tie. With none, a
/// single product untouched by any relation is taken as the root.
pub fn locate_root<'a>(
    products: &'a [ProductDefinition],
    graph: &RelationGraph,
) -> Result<&'a ProductDefinition, StepTreeError> {
    match products {
        [] => return Err(StepTreeError::NoProductsFound),
        [only] => return Ok(only),
        _ => {}
    }

    let candidates: Vec<&ProductDefinition> = products
        .iter()
        .filter(|p| graph.is_container(&p.id) && !graph.is_contained(&p.id))
        .collect();

    match candidates.as_slice() {
        [] => {
            let isolated: Vec<&ProductDefinition> = products
                .iter()
                .filter(|p| !graph.is_referenced(&p.id))
                .collect();
            match isolated.as_slice() {
                [root] => Ok(*root),
                _ => Err(StepTreeError::RootNotIdentifiable),
            }
        }
        [root] => Ok(*root),
        many => {
            let mut best = many[0];
            let mut best_count = graph.descendant_count(&best.id);
            for &candidate in &many[1..] {
                let count = graph.descendant_count(&candidate.id);
                if count > best_count {
                    best = candidate;
                    best_count = count;
                }
            }
            debug!(
                candidates = many.len(),
                root = %best.id,
                descendants = best_count,
                "ambiguous root resolved by descendant count"
            );
            Ok(best)
        }
    }
}
