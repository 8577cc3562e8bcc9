//! # Tiered Path Matcher
//!
//! Runs an ordered list of [`MatchStrategy`] tiers against one rule path and
//! stops at the first tier that locates the element. Whatever the tiers
//! decide, the parent and root flags are then computed independently with
//! the best available search (tree if present, else raw text), and the
//! remapper's mapping is attached.
//!
//! The matcher never fails: a tier error is logged and the next tier runs,
//! and when nothing locates the element the finding says so.

use isodq_core::{Finding, RepairStatus, RulePath};
use isodq_xml::{RawTextScan, XmlDocument};

use crate::remap::Remap;
use crate::strategy::{ExactTier, MatchContext, MatchStrategy, RawTextTier, RelaxedTier};

/// Parse results for one message, borrowed for the duration of its rules.
#[derive(Debug, Clone, Copy)]
pub struct MessageView<'a> {
    /// Parsed tree, absent for unrecoverable payloads.
    pub document: Option<&'a XmlDocument>,
    /// Parser repair status.
    pub repair_status: &'a RepairStatus,
    /// Tag tokens of the sanitized payload.
    pub raw: &'a RawTextScan,
}

impl MessageView<'_> {
    /// True if an element named `name` exists anywhere.
    pub fn contains(&self, name: &str) -> bool {
        match self.document {
            Some(doc) => doc.contains_local_name(name),
            None => self.raw.exists(name),
        }
    }
}

/// Ordered tier sequence with early exit.
pub struct TieredMatcher {
    tiers: Vec<Box<dyn MatchStrategy>>,
}

impl Default for TieredMatcher {
    fn default() -> Self {
        Self::with_tiers(vec![
            Box::new(ExactTier),
            Box::new(RelaxedTier),
            Box::new(RawTextTier),
        ])
    }
}

impl std::fmt::Debug for TieredMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredMatcher")
            .field("tiers", &self.tiers.iter().map(|t| t.tier()).collect::<Vec<_>>())
            .finish()
    }
}

impl TieredMatcher {
    /// A matcher running `tiers` in the given order.
    pub fn with_tiers(tiers: Vec<Box<dyn MatchStrategy>>) -> Self {
        Self { tiers }
    }

    /// Evaluate one rule path.
    ///
    /// `original` is the rule's path before remapping; `remap` is the
    /// remapper's verdict for it; `root_name` is the container whose absence
    /// sets `root_missing` (the family's expected root, or the envelope when
    /// the family has none).
    pub fn evaluate(
        &self,
        original: &RulePath,
        remap: &Remap,
        root_name: &str,
        view: &MessageView<'_>,
    ) -> Finding {
        let expected_parent = if remap.relaxed && remap.path.len() < 2 {
            original.parent()
        } else {
            remap.path.parent()
        };
        let ctx = MatchContext {
            path: &remap.path,
            relaxed: remap.relaxed,
            expected_parent,
            document: view.document,
            repair_status: view.repair_status,
            raw: view.raw,
        };

        let mut finding = None;
        for tier in &self.tiers {
            match tier.try_match(&ctx) {
                Ok(Some(found)) => {
                    tracing::trace!(path = %original, tier = %tier.tier(), "located");
                    finding = Some(found);
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::trace!(path = %original, tier = %tier.tier(), error = %e, "tier skipped");
                }
            }
        }

        let mut finding = finding.unwrap_or_else(|| Finding::not_found(not_found_reason(view)));
        if let Some(mapping) = &remap.mapping {
            if let Some(mapped) = &mapping.mapped_to {
                if finding.reason == "exact match" {
                    finding.reason = format!("exact match via substitute root '{mapped}'");
                }
            }
            finding.mapping_info = Some(mapping.clone());
        }
        finding.parent_exists = match expected_parent {
            Some(parent) => view.contains(parent),
            None => true,
        };
        finding.root_missing = remap.root_missing || !view.contains(root_name);
        finding
    }
}

fn not_found_reason(view: &MessageView<'_>) -> &'static str {
    match (view.document, view.repair_status) {
        (None, _) => "not found in malformed input",
        (Some(_), RepairStatus::Repaired) => "tag missing in repaired XML",
        (Some(_), _) => "tag missing in well-formed XML",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isodq_core::{LocationStatus, MatchTier, RemapStrategy, ValidatorConfig};
    use isodq_xml::{parse_message, Sanitizer};

    use crate::remap::{RootRemapper, Structure};

    fn evaluate(raw: &str, path: &str, expected_root: Option<&str>) -> Finding {
        let parsed = parse_message(raw, &Sanitizer::new("Document").unwrap());
        let scan = RawTextScan::new(&parsed.sanitized);
        let view = MessageView {
            document: parsed.document.as_ref(),
            repair_status: &parsed.repair_status,
            raw: &scan,
        };
        let structure = match view.document {
            Some(doc) => Structure::Tree(doc),
            None => Structure::Raw(&scan),
        };
        let path = RulePath::parse(path).unwrap();
        let remap = RootRemapper::new(&ValidatorConfig::default()).remap(&path, expected_root, structure);
        TieredMatcher::default().evaluate(&path, &remap, expected_root.unwrap_or("Document"), &view)
    }

    #[test]
    fn missing_element_with_present_parent() {
        let f = evaluate(
            "<Document><GrpHdr><OtherTag>ABC</OtherTag></GrpHdr></Document>",
            "/Document/GrpHdr/MsgId",
            None,
        );
        assert!(!f.exists);
        assert!(f.parent_exists);
        assert!(!f.root_missing);
        assert_eq!(f.location_status, LocationStatus::Unknown);
        assert_eq!(f.reason, "tag missing in well-formed XML");
    }

    #[test]
    fn unrecoverable_input_without_the_tag() {
        let f = evaluate("garbage", "/Document/GrpHdr/MsgId", None);
        assert!(!f.exists);
        assert!(!f.parent_exists);
        assert!(f.root_missing);
        assert_eq!(f.reason, "not found in malformed input");
    }

    #[test]
    fn substitute_root_is_reported() {
        let f = evaluate(
            "<Document><group><GrpHdr><MsgId>1</MsgId></GrpHdr></group></Document>",
            "/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId",
            Some("FIToFICstmrCdtTrf"),
        );
        assert!(f.exists);
        assert_eq!(f.location_status, LocationStatus::Correct);
        assert!(f.root_missing);
        assert_eq!(f.reason, "exact match via substitute root 'group'");
        let mapping = f.mapping_info.unwrap();
        assert_eq!(mapping.mapped_to.as_deref(), Some("group"));
        assert_eq!(mapping.strategy, RemapStrategy::Substitute);
    }

    #[test]
    fn relaxed_remap_uses_name_search() {
        let f = evaluate(
            "<Document><Wrapper><Hdr><MsgId>1</MsgId></Hdr></Wrapper></Document>",
            "/Document/FIToFICstmrCdtTrf/GrpHdr/MsgId",
            Some("FIToFICstmrCdtTrf"),
        );
        assert!(f.exists);
        assert_eq!(f.tier, Some(MatchTier::Relaxed));
        assert!(!f.in_correct_location);
        assert!(!f.parent_exists);
        assert!(f.root_missing);
        assert_eq!(f.mapping_info.unwrap().strategy, RemapStrategy::Relaxed);
    }

    #[test]
    fn tiers_run_in_order_with_early_exit() {
        struct Always(MatchTier);
        impl MatchStrategy for Always {
            fn tier(&self) -> MatchTier {
                self.0
            }
            fn try_match(&self, _: &MatchContext<'_>) -> Result<Option<Finding>, crate::MatchError> {
                Ok(Some(Finding::misplaced(self.0, None, false, self.0.to_string())))
            }
        }
        struct Failing;
        impl MatchStrategy for Failing {
            fn tier(&self) -> MatchTier {
                MatchTier::Exact
            }
            fn try_match(&self, _: &MatchContext<'_>) -> Result<Option<Finding>, crate::MatchError> {
                Err(crate::MatchError::NoDocument)
            }
        }

        let matcher = TieredMatcher::with_tiers(vec![
            Box::new(Failing),
            Box::new(Always(MatchTier::RawText)),
            Box::new(Always(MatchTier::Relaxed)),
        ]);
        let parsed = parse_message("<Document/>", &Sanitizer::new("Document").unwrap());
        let scan = RawTextScan::new(&parsed.sanitized);
        let view = MessageView {
            document: parsed.document.as_ref(),
            repair_status: &parsed.repair_status,
            raw: &scan,
        };
        let path = RulePath::parse("/Document/X").unwrap();
        let remap = RootRemapper::new(&ValidatorConfig::default()).remap(
            &path,
            None,
            Structure::Raw(&scan),
        );
        let f = matcher.evaluate(&path, &remap, "Document", &view);
        assert_eq!(f.tier, Some(MatchTier::RawText));
        assert_eq!(f.reason, "raw_text");
    }
}
