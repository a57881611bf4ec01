// Extraction Module
// Topological traversal, query composition, self-reference expansion

pub mod extractor;
pub mod query;
pub mod selfref;

pub use extractor::{ExtractOptions, ExtractReport, Extractor};
pub use query::{build_child_query, build_root_query, build_self_ref_query, BoundQuery};
