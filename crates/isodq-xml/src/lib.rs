//! # isodq-xml: Recovering Parser for Inbound Messages
//!
//! Everything that touches message markup lives here:
//!
//! - [`sanitize`]: byte-order-mark stripping and envelope cutting.
//! - [`parse`]: strict parsing with best-effort recovery, reporting a
//!   [`RepairStatus`](isodq_core::RepairStatus) for every payload.
//! - [`tree`]: the immutable element tree shared across rule evaluations.
//! - [`rawtext`]: tag scanning over raw text for payloads with no usable tree.
//!
//! ## Crate Policy
//!
//! - Parsing is a pure function of the payload text. No IO.
//! - Malformed input never panics and never produces an `Err` at the
//!   [`parse_message`] boundary; it produces a repair status.

pub mod parse;
pub mod rawtext;
pub mod sanitize;
pub mod tree;

pub use parse::{
    parse_document, parse_document_with_depth, parse_message, parse_message_with_depth, ParseError,
    ParseMode, ParsedDocument,
};
pub use rawtext::{RawTextScan, TagKind, TagToken};
pub use sanitize::Sanitizer;
pub use tree::{Element, Located, XmlDocument};
