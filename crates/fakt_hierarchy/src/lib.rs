//! Build hierarchy resolution for multi-target builds.
//!
//! A multi-target build is a DAG of compilation scopes ("build nodes") linked
//! by depends-on edges, e.g. `iosArm64Test -> iosTest -> commonTest`. This
//! crate stores that DAG in an index-addressed arena ([`BuildGraph`]) and
//! answers two questions for any node: which ancestors does it see, and where
//! should its generated output be centralized ([`HierarchyResolver`]).

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod ids;
pub mod resolver;

pub use error::HierarchyError;
pub use graph::{BuildGraph, BuildNode};
pub use ids::NodeId;
pub use resolver::{HierarchyResolver, OutputLayout, OutputLocation};
