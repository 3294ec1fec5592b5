//! STEP file reader: turns a STEP file into its assembly structure tree.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::builder::{
    build_tree, build_tree_with_limit, BuiltTree, StructureNode, DEFAULT_MAX_DEPTH,
};
use crate::decorator::NodeDecorator;
use crate::entities::{AssemblyRelation, ProductDefinition};
use crate::error::{Diagnostic, StepTreeError};
use crate::graph::RelationGraph;
use crate::lexer::{ClassifiedRecords, StepHeader};
use crate::progress::{Phase, Progress};
use crate::resolver::{resolve_products, NameStrategy};
use crate::root::locate_root;

/// Options controlling how a file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReadOptions {
    /// How product definitions are named.
    pub naming: NameStrategy,
    /// Fail on the first diagnostic instead of returning it.
    pub strict: bool,
    /// Deepest nesting accepted before the build fails.
    pub max_depth: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            naming: NameStrategy::default(),
            strict: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// A decoded STEP file: products and relations, ready for root location
/// and tree building.
#[derive(Debug, Clone)]
pub struct StepDocument {
    header: StepHeader,
    naming: NameStrategy,
    products: Vec<ProductDefinition>,
    graph: RelationGraph,
    diagnostics: Vec<Diagnostic>,
}

impl StepDocument {
    /// Classify, decode and resolve the records of a STEP file.
    pub fn parse(
        data: &[u8],
        naming: NameStrategy,
        progress: &Progress,
    ) -> Result<Self, StepTreeError> {
        let records = ClassifiedRecords::classify(data)?;
        debug!(
            product_definitions = records.product_definitions.len(),
            relations = records.relations.len(),
            products = records.products.len(),
            formations = records.formations.len(),
            discarded = records.discarded,
            "classified records"
        );

        let naming = naming.effective(&records);
        let mut counter = progress.phase(Phase::Products);
        let resolved = resolve_products(&records, naming, &mut counter)?;
        counter.complete();
        debug!(
            ?naming,
            resolved = resolved.products.len(),
            dropped = resolved.diagnostics.len(),
            "resolved product definitions"
        );

        let mut counter = progress.phase(Phase::Relations);
        let graph = RelationGraph::from_records(&records.relations, &mut counter)?;
        counter.complete();

        Ok(Self {
            header: records.header,
            naming,
            products: resolved.products,
            graph,
            diagnostics: resolved.diagnostics,
        })
    }

    /// Header tags, verbatim.
    pub fn header(&self) -> &StepHeader {
        &self.header
    }

    /// The naming strategy actually used.
    pub fn naming(&self) -> NameStrategy {
        self.naming
    }

    /// Resolved product definitions, in file order.
    pub fn products(&self) -> &[ProductDefinition] {
        &self.products
    }

    /// Assembly relations, in file order.
    pub fn relations(&self) -> &[AssemblyRelation] {
        self.graph.relations()
    }

    /// The indexed relation graph.
    pub fn graph(&self) -> &RelationGraph {
        &self.graph
    }

    /// Product definitions dropped during resolution.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Find the top-level assembly.
    pub fn locate_root(&self) -> Result<&ProductDefinition, StepTreeError> {
        locate_root(&self.products, &self.graph)
    }

    /// Build the containment tree below `root`.
    pub fn build_tree(
        &self,
        root: &ProductDefinition,
        decorator: Option<&mut dyn NodeDecorator>,
        progress: &Progress,
    ) -> Result<BuiltTree, StepTreeError> {
        build_tree(root, &self.products, &self.graph, decorator, progress)
    }
}

/// The result of reading an assembly: the tree plus everything that had to
/// be left out of it.
#[derive(Debug, Clone)]
pub struct AssemblyOutcome {
    /// Header tags, verbatim.
    pub header: StepHeader,
    /// The assembly tree.
    pub tree: StructureNode,
    /// Resolution and reference gaps, in the order they were found.
    pub diagnostics: Vec<Diagnostic>,
    /// Number of resolved product definitions.
    pub product_count: usize,
    /// Number of assembly relations.
    pub relation_count: usize,
}

impl AssemblyOutcome {
    /// Whether the tree was built without any gaps.
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Turn the first diagnostic, if any, into an error.
    pub fn into_strict(self) -> Result<Self, StepTreeError> {
        match self.diagnostics.first() {
            Some(diagnostic) => Err(diagnostic.clone().into()),
            None => Ok(self),
        }
    }
}

/// Read the assembly structure of a STEP file.
///
/// # Arguments
///
/// * `path` - Path to the STEP file
/// * `options` - Naming strategy and strictness
/// * `decorator` - Optional hooks run for every node
/// * `progress` - Progress sink ([`Progress::none`] to ignore)
pub fn read_assembly(
    path: impl AsRef<Path>,
    options: &ReadOptions,
    decorator: Option<&mut dyn NodeDecorator>,
    progress: &Progress,
) -> Result<AssemblyOutcome, StepTreeError> {
    let data = std::fs::read(path)?;
    read_assembly_from_buffer(&data, options, decorator, progress)
}

/// Read the assembly structure of STEP data held in memory.
pub fn read_assembly_from_buffer(
    data: &[u8],
    options: &ReadOptions,
    decorator: Option<&mut dyn NodeDecorator>,
    progress: &Progress,
) -> Result<AssemblyOutcome, StepTreeError> {
    let document = StepDocument::parse(data, options.naming, progress)?;
    let root = document.locate_root()?;
    debug!(root = %root.id, name = %root.name, "located root assembly");

    let built = build_tree_with_limit(
        root,
        &document.products,
        &document.graph,
        options.max_depth,
        decorator,
        progress,
    )?;

    let mut diagnostics = document.diagnostics.clone();
    diagnostics.extend(built.diagnostics);

    let outcome = AssemblyOutcome {
        product_count: document.products.len(),
        relation_count: document.graph.len(),
        header: document.header,
        tree: built.root,
        diagnostics,
    };

    if options.strict {
        outcome.into_strict()
    } else {
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressEvent;

    const BENCH: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('workbench'),'2;1');
FILE_NAME('Workbench.stp','2021-03-01T10:00:00',('Author'),(''),'','','');
FILE_SCHEMA(('AUTOMOTIVE_DESIGN { 1 0 10303 214 1 1 1 1 }'));
ENDSEC;
DATA;
#1=APPLICATION_CONTEXT('automotive design');
#2=PRODUCT_DEFINITION_CONTEXT('part definition',#1,'design');
#10=PRODUCT('Workbench','Workbench','',(#3));
#11=PRODUCT_DEFINITION_FORMATION('','',#10);
#12=PRODUCT_DEFINITION('design','',#11,#2);
#20=PRODUCT('Tabletop','Tabletop','',(#3));
#21=PRODUCT_DEFINITION_FORMATION('','',#20);
#22=PRODUCT_DEFINITION('design','',#21,#2);
#30=PRODUCT('Leg','Leg','',(#3));
#31=PRODUCT_DEFINITION_FORMATION('','',#30);
#32=PRODUCT_DEFINITION('design','',#31,#2);
#40=NEXT_ASSEMBLY_USAGE_OCCURRENCE('NAUO1','Tabletop','',#12,#22,$);
#41=NEXT_ASSEMBLY_USAGE_OCCURRENCE('NAUO2','Leg 1','',#12,#32,$);
#42=NEXT_ASSEMBLY_USAGE_OCCURRENCE('NAUO3','Leg 2','',#12,#32,$);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_read_workbench() {
        let outcome = read_assembly_from_buffer(
            BENCH.as_bytes(),
            &ReadOptions::default(),
            None,
            &Progress::none(),
        )
        .unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.product_count, 3);
        assert_eq!(outcome.relation_count, 3);
        assert_eq!(outcome.tree.id, "12");
        assert_eq!(outcome.tree.name, "Workbench");
        let names: Vec<_> = outcome.tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Tabletop", "Leg", "Leg"]);
        assert!(outcome.header.file_name.starts_with("FILE_NAME('Workbench.stp'"));
    }

    #[test]
    fn test_direct_naming_uses_definition_name() {
        let outcome = read_assembly_from_buffer(
            BENCH.as_bytes(),
            &ReadOptions {
                naming: NameStrategy::Direct,
                ..ReadOptions::default()
            },
            None,
            &Progress::none(),
        )
        .unwrap();
        assert_eq!(outcome.tree.name, "design");
    }

    #[test]
    fn test_document_stages() {
        let doc = StepDocument::parse(BENCH.as_bytes(), NameStrategy::Auto, &Progress::none())
            .unwrap();
        assert_eq!(doc.naming(), NameStrategy::Indirect);
        assert_eq!(doc.products().len(), 3);
        assert_eq!(doc.relations()[0], AssemblyRelation::new("40", "12", "22"));
        assert_eq!(doc.locate_root().unwrap().id, "12");
    }

    #[test]
    fn test_diagnostics_collected_and_strict_mode() {
        let input = BENCH.replace(
            "#42=NEXT_ASSEMBLY_USAGE_OCCURRENCE('NAUO3','Leg 2','',#12,#32,$);",
            "#42=NEXT_ASSEMBLY_USAGE_OCCURRENCE('NAUO3','Leg 2','',#12,#99,$);\n#50=PRODUCT_DEFINITION('design','',#98,#2);",
        );

        let outcome = read_assembly_from_buffer(
            input.as_bytes(),
            &ReadOptions::default(),
            None,
            &Progress::none(),
        )
        .unwrap();
        assert_eq!(outcome.tree.children.len(), 2);
        assert_eq!(
            outcome.diagnostics,
            vec![
                Diagnostic::UnresolvedReference {
                    product_definition: "50".into(),
                    missing: "98".into(),
                },
                Diagnostic::SkippedReference {
                    relation: "42".into(),
                    missing: "99".into(),
                },
            ]
        );

        let strict = read_assembly_from_buffer(
            input.as_bytes(),
            &ReadOptions {
                strict: true,
                ..ReadOptions::default()
            },
            None,
            &Progress::none(),
        );
        assert!(matches!(
            strict,
            Err(StepTreeError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_progress_phases() {
        let (progress, rx) = Progress::channel();
        read_assembly_from_buffer(BENCH.as_bytes(), &ReadOptions::default(), None, &progress)
            .unwrap();
        let completions: Vec<Phase> = rx
            .try_iter()
            .filter_map(|e| match e {
                ProgressEvent::Complete { phase } => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            completions,
            vec![Phase::Products, Phase::Relations, Phase::Build]
        );
    }

    #[test]
    fn test_max_depth_option() {
        let options = ReadOptions {
            max_depth: 1,
            ..ReadOptions::default()
        };
        let result = read_assembly_from_buffer(BENCH.as_bytes(), &options, None, &Progress::none());
        assert!(matches!(
            result,
            Err(StepTreeError::DepthLimitExceeded { limit: 1, .. })
        ));

        let options: ReadOptions = serde_json::from_str(r#"{"max_depth": 2}"#).unwrap();
        assert_eq!(options.max_depth, 2);
        assert_eq!(options.naming, NameStrategy::Auto);
        let outcome =
            read_assembly_from_buffer(BENCH.as_bytes(), &options, None, &Progress::none()).unwrap();
        assert_eq!(outcome.tree.children.len(), 3);
    }

    #[test]
    fn test_no_products() {
        let result = read_assembly_from_buffer(
            b"ISO-10303-21;DATA;#1=CARTESIAN_POINT('',(0.,0.,0.));ENDSEC;",
            &ReadOptions::default(),
            None,
            &Progress::none(),
        );
        assert!(matches!(result, Err(StepTreeError::NoProductsFound)));
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let result = read_assembly(
            "/definitely/not/here.stp",
            &ReadOptions::default(),
            None,
            &Progress::none(),
        );
        assert!(matches!(result, Err(StepTreeError::Io(_))));
    }
}
