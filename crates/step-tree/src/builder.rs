//! Containment tree construction.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::decorator::NodeDecorator;
use crate::entities::{EntityId, ProductDefinition};
use crate::error::{Diagnostic, StepTreeError};
use crate::graph::RelationGraph;
use crate::progress::{Phase, PhaseCounter, Progress};

/// One occurrence in the assembly tree.
///
/// A sub-assembly used in several places appears once per use, each
/// occurrence an independent copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureNode {
    /// Product definition ID.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Contained occurrences, in relation order.
    #[serde(rename = "contains")]
    pub children: Vec<StructureNode>,
    /// Decorations, serialized as extra fields of the node object.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StructureNode {
    /// Create a leaf node.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            children: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Default maximum nesting depth accepted by [`build_tree`].
///
/// Real product structures rarely nest more than a few dozen levels.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// A built tree and the relations that had to be left out of it.
#[derive(Debug, Clone)]
pub struct BuiltTree {
    /// The root node.
    pub root: StructureNode,
    /// One [`Diagnostic::SkippedReference`] per dangling relation.
    pub diagnostics: Vec<Diagnostic>,
    /// Relations examined while building.
    pub relations_examined: u64,
}

/// Build the containment tree below `root`.
///
/// Emits one [`Phase::Build`] tick per relation examined across the whole
/// traversal and a single completion once the tree is finished. Fails with
/// [`StepTreeError::CycleDetected`] when a product would appear on its own
/// ancestor path, and with [`StepTreeError::DepthLimitExceeded`] when the
/// nesting is deeper than [`DEFAULT_MAX_DEPTH`].
pub fn build_tree(
    root: &ProductDefinition,
    products: &[ProductDefinition],
    graph: &RelationGraph,
    decorator: Option<&mut dyn NodeDecorator>,
    progress: &Progress,
) -> Result<BuiltTree, StepTreeError> {
    build_tree_with_limit(root, products, graph, DEFAULT_MAX_DEPTH, decorator, progress)
}

/// Like [`build_tree`], with an explicit nesting limit.
///
/// The root sits at depth 1; a chain of `max_depth` levels is accepted.
pub fn build_tree_with_limit(
    root: &ProductDefinition,
    products: &[ProductDefinition],
    graph: &RelationGraph,
    max_depth: usize,
    decorator: Option<&mut dyn NodeDecorator>,
    progress: &Progress,
) -> Result<BuiltTree, StepTreeError> {
    let mut builder = TreeBuilder::new(products, graph, max_depth, decorator, progress);
    let root = builder.build(root)?;
    let relations_examined = builder.counter.complete();
    Ok(BuiltTree {
        root,
        diagnostics: builder.diagnostics,
        relations_examined,
    })
}

struct TreeBuilder<'a, 'd> {
    products: HashMap<&'a str, &'a ProductDefinition>,
    graph: &'a RelationGraph,
    max_depth: usize,
    decorator: Option<&'d mut dyn NodeDecorator>,
    counter: PhaseCounter<'a>,
    diagnostics: Vec<Diagnostic>,
    path: Vec<EntityId>,
    on_path: HashSet<EntityId>,
}

impl<'a, 'd> TreeBuilder<'a, 'd> {
    fn new(
        products: &'a [ProductDefinition],
        graph: &'a RelationGraph,
        max_depth: usize,
        decorator: Option<&'d mut dyn NodeDecorator>,
        progress: &'a Progress,
    ) -> Self {
        let mut by_id = HashMap::with_capacity(products.len());
        for product in products {
            by_id.entry(product.id.as_str()).or_insert(product);
        }
        Self {
            products: by_id,
            graph,
            max_depth,
            decorator,
            counter: progress.phase(Phase::Build),
            diagnostics: Vec::new(),
            path: Vec::new(),
            on_path: HashSet::new(),
        }
    }

    fn build(&mut self, product: &ProductDefinition) -> Result<StructureNode, StepTreeError> {
        if self.on_path.contains(&product.id) {
            let mut path = self.path.clone();
            path.push(product.id.clone());
            return Err(StepTreeError::CycleDetected { path });
        }
        if self.path.len() >= self.max_depth {
            return Err(StepTreeError::DepthLimitExceeded {
                limit: self.max_depth,
                id: product.id.clone(),
            });
        }
        self.path.push(product.id.clone());
        self.on_path.insert(product.id.clone());

        let mut node = StructureNode::new(product.id.clone(), product.name.clone());
        self.decorate(&mut node, Hook::Enter);

        let graph = self.graph;
        for relation in graph.children_of(&product.id) {
            self.counter.tick();
            match self.products.get(relation.contains.as_str()).copied() {
                Some(child) => {
                    let child_node = self.build(child)?;
                    node.children.push(child_node);
                }
                None => {
                    warn!(
                        relation = %relation.id,
                        missing = %relation.contains,
                        "skipping relation to unknown product definition"
                    );
                    self.diagnostics.push(Diagnostic::SkippedReference {
                        relation: relation.id.clone(),
                        missing: relation.contains.clone(),
                    });
                }
            }
        }

        self.decorate(&mut node, Hook::Exit);

        self.on_path.remove(&product.id);
        self.path.pop();
        Ok(node)
    }

    fn decorate(&mut self, node: &mut StructureNode, hook: Hook) {
        let Some(decorator) = self.decorator.as_deref_mut() else {
            return;
        };
        let decoration = match hook {
            Hook::Enter => decorator.on_enter(node),
            Hook::Exit => decorator.on_exit(node),
        };
        if let Some(decoration) = decoration {
            node.extra.insert(decoration.key, decoration.value);
        }
    }
}

#[derive(Clone, Copy)]
enum Hook {
    Enter,
    Exit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decorator::{Decoration, DescendantCountDecorator, UuidDecorator};
    use crate::entities::AssemblyRelation;
    use crate::progress::ProgressEvent;
    use serde_json::json;

    fn products(ids: &[&str]) -> Vec<ProductDefinition> {
        ids.iter()
            .map(|id| ProductDefinition {
                id: id.to_string(),
                name: format!("Part {id}"),
            })
            .collect()
    }

    fn graph(edges: &[(&str, &str, &str)]) -> RelationGraph {
        RelationGraph::new(
            edges
                .iter()
                .map(|(id, from, to)| AssemblyRelation::new(*id, *from, *to))
                .collect(),
        )
    }

    fn ids(node: &StructureNode) -> Vec<&str> {
        node.children.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_build_nested_tree_in_relation_order() {
        let p = products(&["A", "B", "C", "D"]);
        let g = graph(&[("1", "A", "B"), ("2", "A", "C"), ("3", "B", "D")]);
        let built = build_tree(&p[0], &p, &g, None, &Progress::none()).unwrap();

        let tree = built.root;
        assert_eq!(tree.id, "A");
        assert_eq!(ids(&tree), vec!["B", "C"]);
        assert_eq!(ids(&tree.children[0]), vec!["D"]);
        assert!(tree.children[1].children.is_empty());
        assert!(built.diagnostics.is_empty());
        assert_eq!(built.relations_examined, 3);
    }

    #[test]
    fn test_single_leaf() {
        let p = products(&["A"]);
        let built = build_tree(&p[0], &p, &RelationGraph::default(), None, &Progress::none())
            .unwrap();
        assert_eq!(built.root, StructureNode::new("A", "Part A"));
    }

    #[test]
    fn test_json_shape() {
        let p = products(&["A", "B"]);
        let g = graph(&[("1", "A", "B")]);
        let built = build_tree(&p[0], &p, &g, None, &Progress::none()).unwrap();
        let value: Value = serde_json::from_str(&built.root.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "A",
                "name": "Part A",
                "contains": [{"id": "B", "name": "Part B", "contains": []}]
            })
        );
    }

    #[test]
    fn test_reused_subassembly_is_copied() {
        let p = products(&["A", "B", "C"]);
        let g = graph(&[("1", "A", "B"), ("2", "A", "B"), ("3", "B", "C")]);
        let tree = build_tree(&p[0], &p, &g, None, &Progress::none()).unwrap().root;
        assert_eq!(ids(&tree), vec!["B", "B"]);
        assert_eq!(tree.children[0], tree.children[1]);
        assert_eq!(tree.descendant_count(), 4);
    }

    #[test]
    fn test_dangling_reference_is_skipped_and_reported() {
        let p = products(&["A", "B"]);
        let g = graph(&[("1", "A", "X"), ("2", "A", "B")]);
        let built = build_tree(&p[0], &p, &g, None, &Progress::none()).unwrap();
        assert_eq!(ids(&built.root), vec!["B"]);
        assert_eq!(
            built.diagnostics,
            vec![Diagnostic::SkippedReference {
                relation: "1".into(),
                missing: "X".into(),
            }]
        );
    }

    #[test]
    fn test_cycle_detected() {
        let p = products(&["A", "B"]);
        let g = graph(&[("1", "A", "B"), ("2", "B", "A")]);
        match build_tree(&p[0], &p, &g, None, &Progress::none()) {
            Err(StepTreeError::CycleDetected { path }) => assert_eq!(path, vec!["A", "B", "A"]),
            other => panic!("expected CycleDetected, got {other:?}"),
        }
        assert!(matches!(
            build_tree(&p[1], &p, &g, None, &Progress::none()),
            Err(StepTreeError::CycleDetected { .. })
        ));
    }

    fn chain(depth: usize) -> (Vec<ProductDefinition>, RelationGraph) {
        let ids: Vec<String> = (0..depth).map(|i| i.to_string()).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let relations = (1..depth)
            .map(|i| AssemblyRelation::new(format!("r{i}"), ids[i - 1].clone(), ids[i].clone()))
            .collect();
        (products(&refs), RelationGraph::new(relations))
    }

    #[test]
    fn test_deep_chain_hits_depth_limit() {
        let (p, g) = chain(5000);
        match build_tree(&p[0], &p, &g, None, &Progress::none()) {
            Err(StepTreeError::DepthLimitExceeded { limit, id }) => {
                assert_eq!(limit, DEFAULT_MAX_DEPTH);
                assert_eq!(id, DEFAULT_MAX_DEPTH.to_string());
            }
            other => panic!("expected DepthLimitExceeded, got {other:?}"),
        }
    }

    #[test]
    fn test_chain_at_depth_limit_builds() {
        let (p, g) = chain(40);
        let built = build_tree_with_limit(&p[0], &p, &g, 40, None, &Progress::none()).unwrap();
        assert_eq!(built.root.descendant_count(), 39);

        assert!(matches!(
            build_tree_with_limit(&p[0], &p, &g, 39, None, &Progress::none()),
            Err(StepTreeError::DepthLimitExceeded { limit: 39, .. })
        ));
    }

    #[test]
    fn test_progress_is_global_with_single_completion() {
        let p = products(&["A", "B", "C", "D"]);
        let g = graph(&[("1", "A", "B"), ("2", "B", "D"), ("3", "A", "C")]);
        let (progress, rx) = Progress::channel();
        build_tree(&p[0], &p, &g, None, &progress).unwrap();

        let events: Vec<_> = rx.try_iter().collect();
        let ticks: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Tick { count, .. } => Some(*count),
                _ => None,
            })
            .collect();
        assert_eq!(ticks, vec![1, 2, 3]);
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::Complete { phase: Phase::Build })
        );
        let completions = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Complete { .. }))
            .count();
        assert_eq!(completions, 1);
    }

    struct Recorder {
        calls: Vec<String>,
    }

    impl NodeDecorator for Recorder {
        fn on_enter(&mut self, node: &StructureNode) -> Option<Decoration> {
            self.calls.push(format!("enter {}", node.id));
            Some(Decoration::new("stage", "enter"))
        }

        fn on_exit(&mut self, node: &StructureNode) -> Option<Decoration> {
            self.calls.push(format!("exit {} ({})", node.id, node.children.len()));
            Some(Decoration::new("stage", "exit"))
        }
    }

    #[test]
    fn test_decorator_hooks_wrap_children() {
        let p = products(&["A", "B"]);
        let g = graph(&[("1", "A", "B")]);
        let mut recorder = Recorder { calls: Vec::new() };
        let tree = build_tree(&p[0], &p, &g, Some(&mut recorder), &Progress::none())
            .unwrap()
            .root;

        assert_eq!(
            recorder.calls,
            vec!["enter A", "enter B", "exit B (0)", "exit A (1)"]
        );
        // on_exit overwrites on_enter under the same key
        assert_eq!(tree.extra["stage"], json!("exit"));
        assert_eq!(tree.children[0].extra["stage"], json!("exit"));
    }

    #[test]
    fn test_uuid_decorator_gives_every_occurrence_its_own_id() {
        let p = products(&["A", "B"]);
        let g = graph(&[("1", "A", "B"), ("2", "A", "B")]);
        let mut dec = UuidDecorator;
        let tree = build_tree(&p[0], &p, &g, Some(&mut dec), &Progress::none())
            .unwrap()
            .root;
        let a = &tree.children[0].extra["uuid"];
        let b = &tree.children[1].extra["uuid"];
        assert!(a.is_string());
        assert_ne!(a, b);
    }

    #[test]
    fn test_descendant_decorator_serializes_flat() {
        let p = products(&["A", "B", "C"]);
        let g = graph(&[("1", "A", "B"), ("2", "B", "C")]);
        let mut dec = DescendantCountDecorator;
        let tree = build_tree(&p[0], &p, &g, Some(&mut dec), &Progress::none())
            .unwrap()
            .root;
        let value: Value = serde_json::from_str(&tree.to_json().unwrap()).unwrap();
        assert_eq!(value["descendants"], json!(2));
        assert_eq!(value["contains"][0]["descendants"], json!(1));
    }
}
