//! # Matching Tiers
//!
//! Each tier is a [`MatchStrategy`]: given a [`MatchContext`], it either
//! locates the rule's element (`Ok(Some(finding))`), declines
//! (`Ok(None)`), or fails (`Err`). The [`TieredMatcher`](crate::TieredMatcher)
//! runs tiers in order and stops at the first finding; a failing tier is
//! treated like a declining one.
//!
//! | Tier            | Needs a tree | Result when located                       |
//! |-----------------|--------------|-------------------------------------------|
//! | [`ExactTier`]   | yes          | `correct`, `in_correct_location = 1`      |
//! | [`RelaxedTier`] | yes          | `wrong_location`, parent-dependent flag   |
//! | [`RawTextTier`] | no           | `wrong_location`, no `found_path`         |

use isodq_core::{Finding, MatchTier, RepairStatus, RulePath};
use isodq_xml::{Located, RawTextScan, XmlDocument};

use crate::error::MatchError;

/// Everything a tier may look at for one rule of one message.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    /// The path to evaluate, after root remapping.
    pub path: &'a RulePath,
    /// True when the remapper stripped the envelope and container, leaving
    /// a container-agnostic path that only name search can use.
    pub relaxed: bool,
    /// Name of the element the rule's element should sit directly under.
    pub expected_parent: Option<&'a str>,
    /// Parsed tree, absent for unrecoverable payloads.
    pub document: Option<&'a XmlDocument>,
    /// Parser repair status.
    pub repair_status: &'a RepairStatus,
    /// Tag tokens of the sanitized payload text.
    pub raw: &'a RawTextScan,
}

/// One step of the matcher's fallback sequence.
pub trait MatchStrategy: Send + Sync {
    /// Which tier this strategy implements.
    fn tier(&self) -> MatchTier;

    /// Try to locate the rule's element.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError`] when the strategy cannot run against this
    /// context. Callers move on to the next tier.
    fn try_match(&self, ctx: &MatchContext<'_>) -> Result<Option<Finding>, MatchError>;
}

// ---------------------------------------------------------------------------
// Exact
// ---------------------------------------------------------------------------

/// Exact structural path evaluation, namespace-qualified when the document
/// declares a default namespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactTier;

impl MatchStrategy for ExactTier {
    fn tier(&self) -> MatchTier {
        MatchTier::Exact
    }

    fn try_match(&self, ctx: &MatchContext<'_>) -> Result<Option<Finding>, MatchError> {
        if ctx.relaxed {
            return Ok(None);
        }
        let doc = ctx.document.ok_or(MatchError::NoDocument)?;
        if doc.path_exists(ctx.path.segments()) {
            return Ok(Some(Finding::exact(ctx.path.clone(), "exact match")));
        }
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Relaxed
// ---------------------------------------------------------------------------

/// Name-only search anywhere in the tree.
///
/// When several elements share the leaf's name, the one under the expected
/// parent wins, then the one sharing the most ancestor names with the path,
/// then the first in document order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelaxedTier;

impl RelaxedTier {
    fn best<'d>(ctx: &MatchContext<'_>, candidates: Vec<Located<'d>>) -> Option<Located<'d>> {
        let mut best: Option<((bool, usize), Located<'d>)> = None;
        for candidate in candidates {
            let score = (
                ctx.expected_parent.is_some() && candidate.parent_name() == ctx.expected_parent,
                shared_ancestors(&candidate.path, ctx.path.segments()),
            );
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, candidate));
            }
        }
        best.map(|(_, located)| located)
    }
}

impl MatchStrategy for RelaxedTier {
    fn tier(&self) -> MatchTier {
        MatchTier::Relaxed
    }

    fn try_match(&self, ctx: &MatchContext<'_>) -> Result<Option<Finding>, MatchError> {
        let doc = ctx.document.ok_or(MatchError::NoDocument)?;
        let candidates = doc.find_by_local_name(ctx.path.leaf());
        let Some(located) = Self::best(ctx, candidates) else {
            return Ok(None);
        };

        let in_correct_location = match ctx.expected_parent {
            Some(parent) => located.parent_name() == Some(parent),
            None => true,
        };
        let found_path =
            RulePath::from_segments(located.path.iter().map(|s| s.to_string()).collect())
                .ok_or_else(|| MatchError::Tier {
                    tier: MatchTier::Relaxed.to_string(),
                    reason: "located element has no ancestry".into(),
                })?;
        let reason = if in_correct_location {
            "found via relaxed search under expected parent"
        } else {
            "found via relaxed search, wrong parent"
        };
        Ok(Some(Finding::misplaced(
            MatchTier::Relaxed,
            Some(found_path),
            in_correct_location,
            reason,
        )))
    }
}

/// Number of ancestor names of `expected` (leaf excluded) that also appear
/// among the ancestors of `found`.
fn shared_ancestors<S: AsRef<str>>(found: &[&str], expected: &[S]) -> usize {
    let found_ancestors = &found[..found.len().saturating_sub(1)];
    let expected_ancestors = &expected[..expected.len().saturating_sub(1)];
    expected_ancestors
        .iter()
        .filter(|e| found_ancestors.contains(&e.as_ref()))
        .count()
}

// ---------------------------------------------------------------------------
// Raw text
// ---------------------------------------------------------------------------

/// Tag-pair search over the payload text.
///
/// Runs when there is no tree, and also when the tree was repaired, since
/// repair may have dropped content that the text still holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTextTier;

impl MatchStrategy for RawTextTier {
    fn tier(&self) -> MatchTier {
        MatchTier::RawText
    }

    fn try_match(&self, ctx: &MatchContext<'_>) -> Result<Option<Finding>, MatchError> {
        let applies = ctx.document.is_none() || *ctx.repair_status == RepairStatus::Repaired;
        if !applies {
            return Ok(None);
        }
        let leaf = ctx.path.leaf();
        if !ctx.raw.pair_exists(leaf) {
            return Ok(None);
        }
        let in_correct_location = match ctx.expected_parent {
            Some(parent) => ctx.raw.nested_under(leaf, parent),
            None => true,
        };
        let reason = if in_correct_location {
            "found in raw text under expected parent"
        } else {
            "found in raw text but not under expected parent"
        };
        Ok(Some(Finding::misplaced(
            MatchTier::RawText,
            None,
            in_correct_location,
            reason,
        )))
    }
}
