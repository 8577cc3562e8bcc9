//! # Recovering Parser
//!
//! Turns raw message text into a usable [`XmlDocument`] plus a
//! [`RepairStatus`], or reports that no tree could be produced.
//!
//! ## Stages
//!
//! 1. [`Sanitizer::sanitize`] strips BOMs and cuts the text to the first
//!    envelope.
//! 2. Strict parse: well-formedness is enforced (matching end tags, a single
//!    root, no text outside it, valid entity references, valid names). On
//!    success the status is `OK` and the text is the sanitized input.
//! 3. Recovery parse: unclosed elements are closed at end of input, stray end
//!    tags are dropped, an end tag for an outer element closes everything
//!    opened inside it, undecodable entity references are kept as literal
//!    text, and a syntax error ends the parse with whatever was built so far.
//!    The tree is re-serialized and the status is `REPAIRED`.
//! 4. If recovery yields no root element, the status is
//!    `UNRECOVERABLE: <reason>` and there is no tree.
//!
//! Nesting deeper than the configured limit fails both passes with
//! [`ParseError::TooDeep`], so such payloads are matched on raw text only
//! and every tree the parser hands out is at most that deep.
//!
//! A `REPAIRED` tree carries no structural guarantees: content after a
//! syntax error is lost and mixed text may be reordered.
//!
//! The parser is a pure function of its input and never panics on
//! malformed text.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use isodq_core::{RepairStatus, DEFAULT_MAX_DEPTH, MAX_DEPTH_CEILING};

use crate::sanitize::Sanitizer;
use crate::tree::{Element, XmlDocument};

/// Why a parse attempt failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Nothing left after sanitizing.
    #[error("empty")]
    Empty,

    /// The tokenizer rejected the input.
    #[error("syntax error at byte {position}: {message}")]
    Syntax {
        /// Byte offset reported by the tokenizer.
        position: u64,
        /// Tokenizer message.
        message: String,
    },

    /// An end tag did not match the innermost open element.
    #[error("end tag </{found}> does not match <{expected}>")]
    MismatchedEnd {
        /// Innermost open element.
        expected: String,
        /// End tag encountered.
        found: String,
    },

    /// An end tag appeared with no element open.
    #[error("unexpected end tag </{0}>")]
    UnmatchedEnd(String),

    /// Input ended with elements still open.
    #[error("unclosed element(s): {}", .0.join(", "))]
    Unclosed(Vec<String>),

    /// A second top-level element.
    #[error("multiple root elements (second is <{0}>)")]
    MultipleRoots(String),

    /// Non-whitespace text outside the root element.
    #[error("text outside the root element")]
    TextOutsideRoot,

    /// An entity or character reference could not be decoded.
    #[error("invalid entity reference: {0}")]
    InvalidEntity(String),

    /// An attribute could not be read.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),

    /// An element name is not a valid XML name.
    #[error("invalid element name '{0}'")]
    InvalidName(String),

    /// Elements are nested deeper than the limit.
    #[error("nesting deeper than {0} elements")]
    TooDeep(usize),

    /// No element was found at all.
    #[error("no root element")]
    NoRoot,
}

/// Parser output for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    /// The tree, absent when the payload is unrecoverable.
    pub document: Option<XmlDocument>,
    /// How much alteration was needed.
    pub repair_status: RepairStatus,
    /// Sanitized input for `OK`, canonical re-serialization for `REPAIRED`,
    /// absent for `UNRECOVERABLE`.
    pub text: Option<String>,
    /// The sanitized input text, always present; raw-text search runs on it.
    pub sanitized: String,
}

impl ParsedDocument {
    /// Default namespace of the parsed tree, if any.
    pub fn default_namespace(&self) -> Option<&str> {
        self.document.as_ref().and_then(XmlDocument::default_namespace)
    }
}

/// Strict or recovering tree construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Reject any well-formedness defect.
    Strict,
    /// Build the best tree possible.
    Recover,
}

/// Sanitize and parse a raw payload with the default nesting limit.
pub fn parse_message(raw: &str, sanitizer: &Sanitizer) -> ParsedDocument {
    parse_message_with_depth(raw, sanitizer, DEFAULT_MAX_DEPTH)
}

/// Sanitize and parse a raw payload, refusing a tree deeper than
/// `max_depth` elements.
pub fn parse_message_with_depth(raw: &str, sanitizer: &Sanitizer, max_depth: usize) -> ParsedDocument {
    let sanitized = sanitizer.sanitize(raw).to_string();
    if sanitized.is_empty() {
        return ParsedDocument {
            document: None,
            repair_status: RepairStatus::unrecoverable(ParseError::Empty.to_string()),
            text: None,
            sanitized,
        };
    }

    let strict_error = match parse_document_with_depth(&sanitized, ParseMode::Strict, max_depth) {
        Ok(document) => {
            return ParsedDocument {
                document: Some(document),
                repair_status: RepairStatus::Ok,
                text: Some(sanitized.clone()),
                sanitized,
            };
        }
        Err(e) => e,
    };
    tracing::debug!(error = %strict_error, "strict parse failed; attempting recovery");

    match parse_document_with_depth(&sanitized, ParseMode::Recover, max_depth) {
        Ok(document) => match document.to_xml() {
            Ok(canonical) => ParsedDocument {
                document: Some(document),
                repair_status: RepairStatus::Repaired,
                text: Some(canonical),
                sanitized,
            },
            Err(e) => ParsedDocument {
                document: None,
                repair_status: RepairStatus::unrecoverable(format!("re-serialization failed: {e}")),
                text: None,
                sanitized,
            },
        },
        Err(e) => {
            tracing::debug!(error = %e, "recovery parse failed");
            ParsedDocument {
                document: None,
                repair_status: RepairStatus::unrecoverable(e.to_string()),
                text: None,
                sanitized,
            }
        }
    }
}

/// Parse `text` into a document in the given mode with the default
/// nesting limit.
///
/// # Errors
///
/// As [`parse_document_with_depth`].
pub fn parse_document(text: &str, mode: ParseMode) -> Result<XmlDocument, ParseError> {
    parse_document_with_depth(text, mode, DEFAULT_MAX_DEPTH)
}

/// Parse `text` into a document in the given mode. `max_depth` is capped at
/// [`MAX_DEPTH_CEILING`].
///
/// # Errors
///
/// In strict mode, the first well-formedness defect. In either mode,
/// [`ParseError::TooDeep`] once more than `max_depth` elements are open. In
/// recover mode, otherwise only [`ParseError::Empty`] or
/// [`ParseError::NoRoot`].
pub fn parse_document_with_depth(
    text: &str,
    mode: ParseMode,
    max_depth: usize,
) -> Result<XmlDocument, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut reader = Reader::from_str(text);
    let config = reader.config_mut();
    config.trim_text(false);
    config.expand_empty_elements = false;
    config.check_end_names = mode == ParseMode::Strict;
    config.allow_unmatched_ends = mode == ParseMode::Recover;

    let mut builder = TreeBuilder::new(mode, max_depth.min(MAX_DEPTH_CEILING));
    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                let err = ParseError::Syntax {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                };
                match mode {
                    ParseMode::Strict => return Err(err),
                    ParseMode::Recover => {
                        tracing::trace!(error = %err, "recovery parse stopped at syntax error");
                        break;
                    }
                }
            }
        };
        match event {
            Event::Start(start) => builder.open(&start)?,
            Event::Empty(start) => {
                builder.open(&start)?;
                let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                builder.close(&name)?;
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                builder.close(&name)?;
            }
            Event::Text(t) => {
                let decoded = match t.unescape() {
                    Ok(s) => s.into_owned(),
                    Err(e) => match mode {
                        ParseMode::Strict => return Err(ParseError::InvalidEntity(e.to_string())),
                        ParseMode::Recover => String::from_utf8_lossy(&t).into_owned(),
                    },
                };
                builder.text(&decoded)?;
            }
            Event::CData(c) => {
                let decoded = String::from_utf8_lossy(&c).into_owned();
                builder.text(&decoded)?;
            }
            Event::Eof => break,
            // Prolog, comments, processing instructions, and doctype carry
            // nothing the matcher uses.
            _ => {}
        }
    }
    builder.finish()
}

/// An open element together with the namespace declarations it made.
struct Frame {
    element: Element,
    declared: Vec<(Option<String>, String)>,
}

struct TreeBuilder {
    mode: ParseMode,
    max_depth: usize,
    stack: Vec<Frame>,
    root: Option<Element>,
    root_namespace: Option<String>,
}

impl TreeBuilder {
    fn new(mode: ParseMode, max_depth: usize) -> Self {
        Self {
            mode,
            max_depth,
            stack: Vec::new(),
            root: None,
            root_namespace: None,
        }
    }

    fn strict(&self) -> bool {
        self.mode == ParseMode::Strict
    }

    /// Resolve a prefix (or the default namespace for `None`) against the
    /// declarations of the open elements plus `local`, innermost first.
    fn resolve(&self, prefix: Option<&str>, local: &[(Option<String>, String)]) -> Option<String> {
        let scopes = std::iter::once(local).chain(self.stack.iter().rev().map(|f| f.declared.as_slice()));
        for scope in scopes {
            if let Some((_, uri)) = scope.iter().find(|(p, _)| p.as_deref() == prefix) {
                return if uri.is_empty() { None } else { Some(uri.clone()) };
            }
        }
        None
    }

    fn open(&mut self, start: &BytesStart<'_>) -> Result<(), ParseError> {
        if self.stack.len() >= self.max_depth {
            return Err(ParseError::TooDeep(self.max_depth));
        }
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        if self.strict() && !is_xml_name(&name) {
            return Err(ParseError::InvalidName(name));
        }

        let mut attributes = Vec::new();
        let mut declared = Vec::new();
        for attr in start.attributes() {
            let attr = match attr {
                Ok(a) => a,
                Err(e) if self.strict() => return Err(ParseError::InvalidAttribute(e.to_string())),
                Err(_) => continue,
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = match attr.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(e) if self.strict() => return Err(ParseError::InvalidEntity(e.to_string())),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            };
            if key == "xmlns" {
                declared.push((None, value.clone()));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declared.push((Some(prefix.to_string()), value.clone()));
            }
            attributes.push((key, value));
        }

        let prefix = name.rfind(':').map(|i| &name[..i]);
        let namespace = self.resolve(prefix, &declared);

        if self.stack.is_empty() {
            if self.root.is_some() {
                if self.strict() {
                    return Err(ParseError::MultipleRoots(name));
                }
                // Only the first root survives recovery; later ones are
                // still tracked so their end tags balance.
            } else {
                self.root_namespace = self.resolve(None, &declared);
            }
        }

        let mut element = Element::new(&name, namespace);
        element.attributes = attributes;
        self.stack.push(Frame { element, declared });
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), ParseError> {
        let Some(top) = self.stack.last() else {
            return if self.strict() {
                Err(ParseError::UnmatchedEnd(name.to_string()))
            } else {
                Ok(())
            };
        };
        if top.element.name != name {
            if self.strict() {
                return Err(ParseError::MismatchedEnd {
                    expected: top.element.name.clone(),
                    found: name.to_string(),
                });
            }
            // Recovery: an end tag for an outer element closes everything
            // opened inside it; an end tag for nothing open is dropped.
            if !self.stack.iter().any(|f| f.element.name == name) {
                return Ok(());
            }
            while self.stack.last().is_some_and(|f| f.element.name != name) {
                self.pop();
            }
        }
        self.pop();
        Ok(())
    }

    fn pop(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            Some(parent) => parent.element.children.push(frame.element),
            None => {
                if self.root.is_none() {
                    self.root = Some(frame.element);
                }
            }
        }
    }

    fn text(&mut self, text: &str) -> Result<(), ParseError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }
        let strict = self.strict();
        match self.stack.last_mut() {
            Some(frame) => {
                if !frame.element.text.is_empty() {
                    frame.element.text.push(' ');
                }
                frame.element.text.push_str(trimmed);
                Ok(())
            }
            None if strict => Err(ParseError::TextOutsideRoot),
            None => Ok(()),
        }
    }

    fn finish(mut self) -> Result<XmlDocument, ParseError> {
        if !self.stack.is_empty() {
            if self.strict() {
                return Err(ParseError::Unclosed(
                    self.stack.iter().map(|f| f.element.name.clone()).collect(),
                ));
            }
            while !self.stack.is_empty() {
                self.pop();
            }
        }
        let root = self.root.ok_or(ParseError::NoRoot)?;
        Ok(XmlDocument::new(root, self.root_namespace))
    }
}

/// Conservative XML name check: a letter, `_`, or non-ASCII character
/// first, then letters, digits, `.`, `-`, `_`, `:`, or non-ASCII.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || !first.is_ascii())
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ':') || !c.is_ascii())
}
