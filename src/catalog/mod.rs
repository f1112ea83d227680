//! Catalog Management Module
//!
//! Maps table names to their storage and optional key index. Abort undo
//! resolves write records through it.

pub mod catalog;
pub mod table;

pub use self::catalog::{Catalog, CatalogError};
pub use self::table::{IndexInfo, TableInfo};
