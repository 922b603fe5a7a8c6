//! Destination selection by namespace prefix.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use fakt_diagnostics::{Diagnostic, DiagnosticCode, DiagnosticSink};
use serde::Serialize;

use crate::namespace::segments;

/// A generated file awaiting placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifact {
    /// Path relative to the producing node's output directory.
    pub relative_path: PathBuf,
    /// Absolute or workspace-relative path of the file as produced.
    pub source_path: PathBuf,
    /// The producing build node.
    pub producer: String,
    /// Declared namespace extracted from the file, if any.
    pub namespace: Option<String>,
}

/// The outcome of choosing a destination for one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteChoice {
    /// The chosen destination.
    pub destination: String,
    /// The namespace segment that matched, or `None` if the default was used.
    pub matched_segment: Option<String>,
}

impl RouteChoice {
    /// Returns `true` if no destination matched and the default was used.
    pub fn is_default(&self) -> bool {
        self.matched_segment.is_none()
    }
}

/// Maps artifacts to destinations by their declared namespace.
///
/// A destination matches a namespace segment when the destination name starts
/// with the segment, ignoring ASCII case. Among all matches across all
/// segments the shortest destination name wins, then the lexicographically
/// smallest.
#[derive(Debug, Clone)]
pub struct ArtifactRouter {
    destinations: BTreeSet<String>,
    default_destination: String,
}

impl ArtifactRouter {
    /// Creates a router over `destinations`, falling back to `default_destination`.
    pub fn new<I, S>(destinations: I, default_destination: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            destinations: destinations.into_iter().map(Into::into).collect(),
            default_destination: default_destination.into(),
        }
    }

    /// Returns the candidate destinations.
    pub fn destinations(&self) -> &BTreeSet<String> {
        &self.destinations
    }

    /// Returns the fallback destination.
    pub fn default_destination(&self) -> &str {
        &self.default_destination
    }

    /// Returns `true` if `destination` matches the namespace `segment`.
    pub fn matches(destination: &str, segment: &str) -> bool {
        if segment.is_empty() {
            return false;
        }
        destination
            .get(..segment.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(segment))
    }

    /// Chooses the destination for an artifact with the given namespace.
    pub fn choose(&self, namespace: Option<&str>) -> RouteChoice {
        let mut best: Option<(&str, &str)> = None;
        for segment in namespace.map(segments).unwrap_or_default() {
            for dest in &self.destinations {
                if !Self::matches(dest, segment) {
                    continue;
                }
                let better = match best {
                    None => true,
                    Some((current, _)) => {
                        (dest.len(), dest.as_str()) < (current.len(), current)
                    }
                };
                if better {
                    best = Some((dest.as_str(), segment));
                }
            }
        }

        match best {
            Some((destination, segment)) => RouteChoice {
                destination: destination.to_string(),
                matched_segment: Some(segment.to_string()),
            },
            None => RouteChoice {
                destination: self.default_destination.clone(),
                matched_segment: None,
            },
        }
    }

    /// Chooses a destination for every artifact, keyed by relative path.
    ///
    /// Artifacts that match no destination go to the default and produce an
    /// `R301` warning.
    pub fn route(
        &self,
        artifacts: &[GeneratedArtifact],
        sink: &DiagnosticSink,
    ) -> BTreeMap<PathBuf, RouteChoice> {
        let mut routes = BTreeMap::new();
        for artifact in artifacts {
            let choice = self.choose(artifact.namespace.as_deref());
            if choice.is_default() {
                let namespace = artifact.namespace.as_deref().unwrap_or("<none>");
                sink.emit(
                    Diagnostic::warning(
                        DiagnosticCode::ROUTE_DEFAULTED,
                        format!(
                            "no destination matches namespace '{namespace}'; using '{}'",
                            self.default_destination
                        ),
                    )
                    .with_path(&artifact.source_path),
                );
            }
            tracing::trace!(
                artifact = %artifact.relative_path.display(),
                destination = %choice.destination,
                "routed artifact"
            );
            routes.insert(artifact.relative_path.clone(), choice);
        }
        routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kmp_router() -> ArtifactRouter {
        ArtifactRouter::new(
            ["commonMain", "jvmMain", "iosMain", "iosArm64Main", "iosX64Main"],
            "commonMain",
        )
    }

    fn artifact(path: &str, namespace: Option<&str>) -> GeneratedArtifact {
        GeneratedArtifact {
            relative_path: PathBuf::from(path),
            source_path: PathBuf::from("producer").join(path),
            producer: "commonTest".into(),
            namespace: namespace.map(str::to_string),
        }
    }

    #[test]
    fn general_segment_prefers_shortest_destination() {
        let r = ArtifactRouter::new(["iosMain", "iosArm64Main"], "commonMain");
        assert_eq!(r.choose(Some("x.ios.auth")).destination, "iosMain");
    }

    #[test]
    fn qualified_segment_picks_qualified_destination() {
        let r = ArtifactRouter::new(["iosMain", "iosArm64Main"], "commonMain");
        assert_eq!(r.choose(Some("x.iosArm64.auth")).destination, "iosArm64Main");
    }

    #[test]
    fn matching_ignores_case() {
        let r = kmp_router();
        let choice = r.choose(Some("org.example.iosarm64"));
        assert_eq!(choice.destination, "iosArm64Main");
        assert_eq!(choice.matched_segment.as_deref(), Some("iosarm64"));
        assert_eq!(r.choose(Some("org.example.JVM")).destination, "jvmMain");
    }

    #[test]
    fn match_is_a_plain_prefix() {
        assert!(ArtifactRouter::matches("commonMain", "common"));
        assert!(ArtifactRouter::matches("commonMain", "com"));
        assert!(ArtifactRouter::matches("macosMain", "mac"));
        assert!(ArtifactRouter::matches("iosMain", "io"));
        assert!(ArtifactRouter::matches("ios", "IOS"));
        assert!(!ArtifactRouter::matches("iosMain", "iosArm64"));
        assert!(!ArtifactRouter::matches("ios", "iosMain"));
        assert!(!ArtifactRouter::matches("iosMain", ""));
    }

    #[test]
    fn partial_segment_selects_destination() {
        let r = ArtifactRouter::new(["macosMain", "jvmMain"], "commonMain");
        let choice = r.choose(Some("com.x.mac"));
        assert_eq!(choice.destination, "macosMain");
        assert_eq!(choice.matched_segment.as_deref(), Some("mac"));

        let r = ArtifactRouter::new(["iosMain"], "commonMain");
        let sink = DiagnosticSink::new();
        let routes = r.route(&[artifact("com/x/io/A.kt", Some("com.x.io"))], &sink);
        assert_eq!(routes[&PathBuf::from("com/x/io/A.kt")].destination, "iosMain");
        assert!(!sink.contains(DiagnosticCode::ROUTE_DEFAULTED));
    }

    #[test]
    fn shorter_prefix_match_beats_specific_segment() {
        // `com` matches `commonMain`, which is shorter than `iosArm64Main`
        let r = kmp_router();
        assert_eq!(r.choose(Some("com.x.iosArm64")).destination, "commonMain");
        assert!(!r.choose(Some("com.x.iosArm64")).is_default());
        assert_eq!(r.choose(Some("com.x.jvm")).destination, "jvmMain");
    }

    #[test]
    fn no_match_uses_default() {
        let r = kmp_router();
        let choice = r.choose(Some("org.acme.shared"));
        assert_eq!(choice.destination, "commonMain");
        assert!(choice.is_default());
        assert!(r.choose(None).is_default());
    }

    #[test]
    fn equal_length_ties_break_lexicographically() {
        let r = ArtifactRouter::new(["iosB", "iosA"], "common");
        assert_eq!(r.choose(Some("ios")).destination, "iosA");
    }

    #[test]
    fn shortest_wins_across_segments() {
        let r = ArtifactRouter::new(["jvmMain", "androidNativeMain"], "commonMain");
        assert_eq!(r.choose(Some("android.jvm")).destination, "jvmMain");
    }

    #[test]
    fn route_maps_every_artifact_and_warns_on_default() {
        let r = kmp_router();
        let sink = DiagnosticSink::new();
        let artifacts = vec![
            artifact("org/x/ios/FakeAImpl.kt", Some("org.x.ios")),
            artifact("org/x/jvm/FakeBImpl.kt", Some("org.x.jvm")),
            artifact("org/x/FakeCImpl.kt", Some("org.x")),
        ];
        let routes = r.route(&artifacts, &sink);
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[&PathBuf::from("org/x/ios/FakeAImpl.kt")].destination, "iosMain");
        assert_eq!(routes[&PathBuf::from("org/x/jvm/FakeBImpl.kt")].destination, "jvmMain");
        assert_eq!(routes[&PathBuf::from("org/x/FakeCImpl.kt")].destination, "commonMain");
        assert_eq!(sink.warning_count(), 1);
        assert!(sink.contains(DiagnosticCode::ROUTE_DEFAULTED));
    }

    #[test]
    fn routing_is_independent_of_destination_order() {
        let a = ArtifactRouter::new(["iosArm64Main", "iosMain"], "c");
        let b = ArtifactRouter::new(["iosMain", "iosArm64Main"], "c");
        assert_eq!(a.choose(Some("x.ios")), b.choose(Some("x.ios")));
    }
}
