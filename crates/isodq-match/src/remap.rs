//! # Root Remapper
//!
//! Producers wrap the same message family in differently named top-level
//! containers. A rule written against `/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId`
//! should still resolve when the producer sent
//! `/Document/group/GrpHdr/MsgId`.
//!
//! For a family with a configured expected container, and a rule path that
//! names that container:
//!
//! 1. If the path's prefix through the container exists, the path is used
//!    unchanged.
//! 2. Otherwise each candidate container (the envelope's children in
//!    document order, then the configured synonyms) is substituted at the
//!    container's position, and the first candidate whose rewritten path
//!    exists exactly wins.
//! 3. If none does, the envelope and container segments are dropped and the
//!    remaining container-agnostic path is handed to name search, with
//!    `root_missing` set.
//!
//! Without a tree the same steps run against the raw tag scan.

use isodq_core::{MappingInfo, RemapStrategy, RulePath, ValidatorConfig};
use isodq_xml::{RawTextScan, TagKind, XmlDocument};

/// Where a path is evaluated: the parsed tree if there is one, else the raw
/// tag scan.
#[derive(Debug, Clone, Copy)]
pub enum Structure<'a> {
    /// A parsed tree.
    Tree(&'a XmlDocument),
    /// Raw tag tokens only.
    Raw(&'a RawTextScan),
}

impl Structure<'_> {
    fn path_exists(&self, segments: &[String]) -> bool {
        match self {
            Self::Tree(doc) => doc.path_exists(segments),
            Self::Raw(scan) => scan.chain_exists(segments),
        }
    }

    fn envelope_children(&self, envelope: &str) -> Vec<String> {
        match self {
            Self::Tree(doc) => {
                if doc.root().local_name != envelope {
                    return Vec::new();
                }
                doc.root_child_names().into_iter().map(str::to_string).collect()
            }
            Self::Raw(scan) => {
                let mut names: Vec<String> = Vec::new();
                for t in scan.tokens() {
                    if t.kind != TagKind::Close
                        && t.parent.as_deref() == Some(envelope)
                        && !names.contains(&t.name)
                    {
                        names.push(t.name.clone());
                    }
                }
                names
            }
        }
    }
}

/// The remapper's verdict for one rule path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remap {
    /// Path for the matcher.
    pub path: RulePath,
    /// True when the path is container-agnostic and only name search applies.
    pub relaxed: bool,
    /// True when no container could stand in for the expected one.
    pub root_missing: bool,
    /// Present whenever the path was rewritten.
    pub mapping: Option<MappingInfo>,
}

impl Remap {
    fn unchanged(path: &RulePath) -> Self {
        Self {
            path: path.clone(),
            relaxed: false,
            root_missing: false,
            mapping: None,
        }
    }
}

/// Rewrites rule paths whose expected container is absent.
///
/// Built once per run from the configuration and shared by all workers.
#[derive(Debug, Clone)]
pub struct RootRemapper {
    envelope: String,
    synonyms: Vec<String>,
}

impl RootRemapper {
    /// Build from the run configuration.
    pub fn new(config: &ValidatorConfig) -> Self {
        Self {
            envelope: config.envelope.clone(),
            synonyms: config.root_synonyms.clone(),
        }
    }

    /// Remap `path` for a family whose expected container is
    /// `expected_root`. Families without one, and paths that do not name it,
    /// pass through unchanged.
    pub fn remap(&self, path: &RulePath, expected_root: Option<&str>, structure: Structure<'_>) -> Remap {
        let Some(expected) = expected_root else {
            return Remap::unchanged(path);
        };
        let Some(index) = path.position_of(expected) else {
            return Remap::unchanged(path);
        };
        if structure.path_exists(&path.segments()[..=index]) {
            return Remap::unchanged(path);
        }

        for candidate in self.candidates(expected, structure) {
            let rewritten = path.with_segment(index, &candidate);
            if structure.path_exists(rewritten.segments()) {
                tracing::trace!(
                    path = %path,
                    expected_root = expected,
                    mapped_to = %candidate,
                    "remapped path to substitute root"
                );
                return Remap {
                    mapping: Some(MappingInfo {
                        expected_root: expected.to_string(),
                        mapped_to: Some(candidate),
                        strategy: RemapStrategy::Substitute,
                        effective_path: rewritten.clone(),
                    }),
                    path: rewritten,
                    relaxed: false,
                    root_missing: false,
                };
            }
        }

        let relaxed = path
            .without_leading(index + 1)
            .or_else(|| RulePath::from_segments(vec![expected.to_string()]))
            .unwrap_or_else(|| path.clone());
        tracing::trace!(path = %path, expected_root = expected, relaxed = %relaxed, "no substitute root matched");
        Remap {
            mapping: Some(MappingInfo {
                expected_root: expected.to_string(),
                mapped_to: None,
                strategy: RemapStrategy::Relaxed,
                effective_path: relaxed.clone(),
            }),
            path: relaxed,
            relaxed: true,
            root_missing: true,
        }
    }

    /// Envelope children in document order, then synonyms; deduplicated and
    /// never including the expected container itself.
    fn candidates(&self, expected: &str, structure: Structure<'_>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let children = structure.envelope_children(&self.envelope);
        for name in children.into_iter().chain(self.synonyms.iter().cloned()) {
            if name != expected && !out.contains(&name) {
                out.push(name);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isodq_xml::{parse_message, Sanitizer};

    const ROOT: &str = "FIToFICstmrCdtTrf";

    fn remap(raw: &str, path: &str) -> Remap {
        let parsed = parse_message(raw, &Sanitizer::new("Document").unwrap());
        let scan = RawTextScan::new(&parsed.sanitized);
        let structure = match parsed.document.as_ref() {
            Some(doc) => Structure::Tree(doc),
            None => Structure::Raw(&scan),
        };
        RootRemapper::new(&ValidatorConfig::default()).remap(
            &RulePath::parse(path).unwrap(),
            Some(ROOT),
            structure,
        )
    }

    #[test]
    fn present_container_leaves_path_unchanged() {
        let r = remap(
            "<Document><FIToFICstmrCdtTrf><GrpHdr><MsgId/></GrpHdr></FIToFICstmrCdtTrf></Document>",
            "/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId",
        );
        assert_eq!(r, Remap::unchanged(&RulePath::parse("/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId").unwrap()));
    }

    #[test]
    fn envelope_child_substitutes_for_missing_container() {
        let r = remap(
            "<Document><group><GrpHdr><MsgId>1</MsgId></GrpHdr></group></Document>",
            "/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId",
        );
        assert!(!r.relaxed);
        assert_eq!(r.path.to_string(), "/Document/group/GrpHdr/MsgId");
        let mapping = r.mapping.unwrap();
        assert_eq!(mapping.mapped_to.as_deref(), Some("group"));
        assert_eq!(mapping.strategy, RemapStrategy::Substitute);
    }

    #[test]
    fn first_candidate_in_document_order_wins() {
        let r = remap(
            "<Document><A><GrpHdr><MsgId/></GrpHdr></A><B><GrpHdr><MsgId/></GrpHdr></B></Document>",
            "/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId",
        );
        assert_eq!(r.mapping.unwrap().mapped_to.as_deref(), Some("A"));
    }

    #[test]
    fn unmatched_container_relaxes_the_path() {
        let r = remap(
            "<Document><Other><Hdr><MsgId/></Hdr></Other></Document>",
            "/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId",
        );
        assert!(r.relaxed);
        assert!(r.root_missing);
        assert_eq!(r.path.to_string(), "/GrpHdr/MsgId");
        assert_eq!(r.mapping.unwrap().strategy, RemapStrategy::Relaxed);
    }

    #[test]
    fn container_only_path_relaxes_to_the_container() {
        let r = remap("<Document><Other/></Document>", "/Document/FIToFICstmrCdtTrf");
        assert!(r.relaxed);
        assert_eq!(r.path.to_string(), "/FIToFICstmrCdtTrf");
    }

    #[test]
    fn paths_not_naming_the_container_pass_through() {
        let r = remap("<Document><AppHdr/></Document>", "/Document/AppHdr");
        assert!(r.mapping.is_none());
        assert!(!r.relaxed);
    }

    #[test]
    fn raw_scan_supports_substitution_without_a_tree() {
        let scan = RawTextScan::new("<Document><body><GrpHdr><MsgId>1</MsgId>");
        let r = RootRemapper::new(&ValidatorConfig::default()).remap(
            &RulePath::parse("/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId").unwrap(),
            Some(ROOT),
            Structure::Raw(&scan),
        );
        assert_eq!(r.path.to_string(), "/Document/body/GrpHdr/MsgId");
        assert_eq!(r.mapping.unwrap().mapped_to.as_deref(), Some("body"));
    }

    #[test]
    fn families_without_an_expected_root_skip_remapping() {
        let parsed = parse_message("<Document/>", &Sanitizer::new("Document").unwrap());
        let path = RulePath::parse("/Document/X").unwrap();
        let r = RootRemapper::new(&ValidatorConfig::default()).remap(
            &path,
            None,
            Structure::Tree(parsed.document.as_ref().unwrap()),
        );
        assert_eq!(r, Remap::unchanged(&path));
    }
}
