//! Debug-symbol lookup.
//!
//! - `matcher`: log module path -> canonical module name
//! - `archive`: locating a build's archive and classifying its entries
//! - `tools`: the 7-Zip and addr2line capabilities
//! - `resolve`: extract-then-resolve for one module
//! - `offsets`: historical address corrections

pub mod archive;
pub mod matcher;
pub mod offsets;
pub mod resolve;
pub mod tools;

pub use archive::{ArchiveLocator, DebugArchive, ModuleClassifier, ModuleEntry, ModuleKind};
pub use matcher::{best_match, comparison_key};
pub use offsets::AddressAdjustments;
pub use resolve::{parse_location, strip_build_root, AddressTranslator, ResolvedAddress};
pub use tools::{Addr2Line, AddressResolver, ArchiveTool, SevenZip};
