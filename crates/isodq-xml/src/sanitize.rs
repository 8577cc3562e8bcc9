//! # Envelope Sanitizer
//!
//! Inbound payloads arrive with byte-order marks, surrounding whitespace,
//! transport headers, or several envelopes concatenated together. Before
//! parsing, the payload is cut down to the first envelope:
//!
//! 1. Strip byte-order marks and leading/trailing whitespace.
//! 2. If an envelope start tag is present, keep from it through the first
//!    matching end tag after it.
//! 3. If no end tag follows, keep from the start tag to the end of the text
//!    and let the recovering parser deal with the truncation.

use regex::Regex;

const BOM: char = '\u{feff}';

/// Compiled envelope matchers for one envelope element name.
///
/// Built once per run and shared across workers.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    envelope: String,
    start: Regex,
    end: Regex,
}

impl Sanitizer {
    /// Build matchers for `envelope` (local name; any prefix is accepted).
    pub fn new(envelope: &str) -> Result<Self, regex::Error> {
        let name = regex::escape(envelope);
        let start = Regex::new(&format!(r"<(?:[A-Za-z_][\w.\-]*:)?{name}[\s/>]"))?;
        let end = Regex::new(&format!(r"</(?:[A-Za-z_][\w.\-]*:)?{name}\s*>"))?;
        Ok(Self {
            envelope: envelope.to_string(),
            start,
            end,
        })
    }

    /// The envelope's local name.
    pub fn envelope(&self) -> &str {
        &self.envelope
    }

    /// Cut `raw` down to its first envelope.
    pub fn sanitize<'a>(&self, raw: &'a str) -> &'a str {
        let trimmed = raw.trim_matches(|c: char| c == BOM || c.is_whitespace());
        let Some(start) = self.start.find(trimmed) else {
            return trimmed;
        };
        let from_start = &trimmed[start.start()..];
        match self.end.find(from_start) {
            Some(end) => &from_start[..end.end()],
            None => from_start,
        }
    }
}
