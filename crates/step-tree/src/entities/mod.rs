//! Entity types extracted from STEP records.
//!
//! This module provides structures for the product-structure entities of
//! AP203/AP214 and functions for extracting them from decoded records.

pub mod assembly;
pub mod product;

pub use assembly::*;
pub use product::*;

/// Entity ID as written in the file, without the `#` marker.
pub type EntityId = String;
