#![warn(missing_docs)]

//! Assembly structure extraction from STEP files.
//!
//! Reads the product structure of a STEP file (ISO 10303-21): which parts
//! and sub-assemblies a product is made of. Only PRODUCT,
//! PRODUCT_DEFINITION, PRODUCT_DEFINITION_FORMATION and
//! NEXT_ASSEMBLY_USAGE_OCCURRENCE records are interpreted; geometry is
//! ignored.
//!
//! # Example
//!
//! ```no_run
//! use step_tree::{read_assembly, Progress, ReadOptions};
//!
//! let outcome = read_assembly("workbench.stp", &ReadOptions::default(), None, &Progress::none())
//!     .unwrap();
//! for diagnostic in &outcome.diagnostics {
//!     eprintln!("warning: {diagnostic}");
//! }
//! println!("{}", outcome.tree.to_json_pretty().unwrap());
//! ```

mod builder;
mod decoder;
mod decorator;
mod entities;
mod error;
mod graph;
mod lexer;
mod progress;
mod reader;
mod resolver;
mod root;

pub use builder::{
    build_tree, build_tree_with_limit, BuiltTree, StructureNode, DEFAULT_MAX_DEPTH,
};
pub use decoder::{fix_special_chars, DecodedRecord};
pub use decorator::{Decoration, DescendantCountDecorator, NodeDecorator, UuidDecorator};
pub use entities::{
    AssemblyRelation, EntityId, Product, ProductDefinition, ProductDefinitionFormation,
};
pub use error::{Diagnostic, StepTreeError};
pub use graph::RelationGraph;
pub use lexer::{ClassifiedRecords, RawRecord, RecordKind, StepHeader};
pub use progress::{Phase, PhaseCounter, Progress, ProgressEvent};
pub use reader::{
    read_assembly, read_assembly_from_buffer, AssemblyOutcome, ReadOptions, StepDocument,
};
pub use resolver::{resolve_products, NameStrategy, ResolvedProducts};
pub use root::locate_root;
