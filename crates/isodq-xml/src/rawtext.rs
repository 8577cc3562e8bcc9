//! # Raw-Text Tag Scanning
//!
//! When no tree can be built, or a repaired tree may have lost content, the
//! matcher falls back to searching the payload text itself. A
//! [`RawTextScan`] tokenizes every start, end, and self-closing tag once per
//! message and answers presence and nesting questions from that token list.
//!
//! Tag names are compared by local name; namespace prefixes are ignored.
//! Nesting is recovered by simulating an open-element stack: an end tag
//! closes the innermost open element of the same name (and anything opened
//! inside it), and an end tag with no open counterpart is ignored.

use std::sync::OnceLock;

use regex::Regex;

/// Kind of tag token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `<Name ...>`
    Open,
    /// `</Name>`
    Close,
    /// `<Name .../>`
    SelfClose,
}

/// One tag in the raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagToken {
    /// Local name of the tag.
    pub name: String,
    /// Token kind.
    pub kind: TagKind,
    /// Byte offset of `<`.
    pub offset: usize,
    /// Local name of the innermost element open at this tag, if any.
    /// For close tags this is the element the tag closes into.
    pub parent: Option<String>,
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"<(/)?(?:[A-Za-z_][\w.\-]*:)?([A-Za-z_][\w.\-]*)(?:\s[^<>]*?)?(/)?>")
            .expect("tag regex must compile")
    })
}

/// Tag tokens of one payload, with nesting resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTextScan {
    tokens: Vec<TagToken>,
}

impl RawTextScan {
    /// Tokenize `text`.
    pub fn new(text: &str) -> Self {
        let mut tokens = Vec::new();
        let mut open: Vec<String> = Vec::new();
        for caps in tag_regex().captures_iter(text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let name = name.as_str().to_string();
            let kind = if caps.get(1).is_some() {
                TagKind::Close
            } else if caps.get(3).is_some() {
                TagKind::SelfClose
            } else {
                TagKind::Open
            };
            match kind {
                TagKind::Open | TagKind::SelfClose => {
                    tokens.push(TagToken {
                        name: name.clone(),
                        kind,
                        offset: whole.start(),
                        parent: open.last().cloned(),
                    });
                    if kind == TagKind::Open {
                        open.push(name);
                    }
                }
                TagKind::Close => {
                    if let Some(pos) = open.iter().rposition(|n| *n == name) {
                        open.truncate(pos);
                    }
                    tokens.push(TagToken {
                        name,
                        kind,
                        offset: whole.start(),
                        parent: open.last().cloned(),
                    });
                }
            }
        }
        Self { tokens }
    }

    /// All tokens in text order.
    pub fn tokens(&self) -> &[TagToken] {
        &self.tokens
    }

    /// True if any start or self-closing tag named `name` appears.
    pub fn exists(&self, name: &str) -> bool {
        self.tokens
            .iter()
            .any(|t| t.name == name && t.kind != TagKind::Close)
    }

    /// True if a start tag named `name` is followed later by an end tag of
    /// the same name, or a self-closing tag named `name` appears.
    pub fn pair_exists(&self, name: &str) -> bool {
        let mut seen_open = false;
        for t in self.tokens.iter().filter(|t| t.name == name) {
            match t.kind {
                TagKind::SelfClose => return true,
                TagKind::Open => seen_open = true,
                TagKind::Close if seen_open => return true,
                TagKind::Close => {}
            }
        }
        false
    }

    /// True if some element named `child` is opened while the innermost
    /// open element is named `parent`.
    pub fn nested_under(&self, child: &str, parent: &str) -> bool {
        self.tokens.iter().any(|t| {
            t.name == child && t.kind != TagKind::Close && t.parent.as_deref() == Some(parent)
        })
    }

    /// True if the chain `segments[0] > segments[1] > ...` appears as a run
    /// of directly nested elements, with `segments[0]` at the top level.
    pub fn chain_exists<S: AsRef<str>>(&self, segments: &[S]) -> bool {
        let Some((first, rest)) = segments.split_first() else {
            return false;
        };
        let mut open: Vec<&str> = Vec::new();
        for t in &self.tokens {
            match t.kind {
                TagKind::Open | TagKind::SelfClose => {
                    let depth = open.len();
                    let matches_chain = if depth == 0 {
                        t.name == first.as_ref()
                    } else {
                        depth <= rest.len()
                            && open[0] == first.as_ref()
                            && open[1..]
                                .iter()
                                .zip(rest.iter())
                                .all(|(o, s)| *o == s.as_ref())
                            && t.name == rest[depth - 1].as_ref()
                    };
                    if matches_chain && depth == rest.len() {
                        return true;
                    }
                    if t.kind == TagKind::Open {
                        open.push(t.name.as_str());
                    }
                }
                TagKind::Close => {
                    if let Some(pos) = open.iter().rposition(|n| *n == t.name) {
                        open.truncate(pos);
                    }
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_pairs_in_truncated_text() {
        let scan = RawTextScan::new("<Document><GrpHdr><MsgId>ABC</MsgId><CreDtTm>");
        assert!(scan.pair_exists("MsgId"));
        assert!(!scan.pair_exists("CreDtTm"));
        assert!(scan.exists("CreDtTm"));
        assert!(!scan.pair_exists("Missing"));
    }

    #[test]
    fn prefixes_and_attributes_are_ignored() {
        let scan = RawTextScan::new(r#"<ns:Document xmlns:ns="urn:x"><ns:MsgId a="1">X</ns:MsgId>"#);
        assert!(scan.pair_exists("MsgId"));
        assert!(scan.nested_under("MsgId", "Document"));
    }

    #[test]
    fn nesting_tracks_the_innermost_open_element() {
        let scan = RawTextScan::new("<A><B><C/></B><C>1</C></A>");
        assert!(scan.nested_under("C", "B"));
        assert!(scan.nested_under("C", "A"));
        assert!(!scan.nested_under("B", "C"));
    }

    #[test]
    fn stray_close_tags_do_not_disturb_nesting() {
        let scan = RawTextScan::new("<A></X><B>1</B>");
        assert!(scan.nested_under("B", "A"));
    }

    #[test]
    fn close_tag_for_outer_element_closes_inner_ones() {
        let scan = RawTextScan::new("<A><B><C></A><D/>");
        assert_eq!(scan.tokens().last().map(|t| t.parent.clone()), Some(None));
    }

    #[test]
    fn chain_requires_direct_nesting_from_the_top() {
        let scan = RawTextScan::new("<Document><group><GrpHdr><MsgId>1</MsgId>");
        assert!(scan.chain_exists(&["Document", "group", "GrpHdr", "MsgId"]));
        assert!(scan.chain_exists(&["Document"]));
        assert!(!scan.chain_exists(&["Document", "GrpHdr", "MsgId"]));
        assert!(!scan.chain_exists(&["group", "GrpHdr"]));
        assert!(!scan.chain_exists::<&str>(&[]));
    }

    #[test]
    fn comparison_operators_in_text_are_not_tags() {
        let scan = RawTextScan::new("<A>1 < 2 and 3 > 2</A>");
        assert_eq!(scan.tokens().len(), 2);
    }
}
