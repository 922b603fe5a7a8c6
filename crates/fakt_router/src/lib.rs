//! Namespace-based redistribution of generated artifacts.
//!
//! A producer module generates artifacts for every target at once. A consumer
//! module organized by target platform (`commonMain`, `jvmMain`, `iosMain`,
//! ...) needs each artifact in the directory of the target it belongs to. The
//! [`ArtifactRouter`] infers that target from the artifact's own `package`
//! declaration, and [`distribute`] copies a producer's output accordingly.

#![warn(missing_docs)]

pub mod distribute;
pub mod namespace;
pub mod router;

pub use distribute::{collect_artifacts, distribute, DistributionReport, RoutedArtifact};
pub use namespace::{extract_namespace, segments};
pub use router::{ArtifactRouter, GeneratedArtifact, RouteChoice};
