//! # Inbound Message

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::identity::{FamilyId, MessageId};

/// A message as read from the source store. Read-only input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier; reports are keyed by it.
    pub id: MessageId,
    /// Raw payload text, possibly malformed.
    pub raw_payload: String,
    /// Selects the rule set and expected-root mapping.
    pub family: FamilyId,
}

impl Message {
    /// Construct a message.
    pub fn new(id: impl Into<String>, raw_payload: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(id),
            raw_payload: raw_payload.into(),
            family: FamilyId::new(family),
        }
    }

    /// Lowercase hex SHA-256 of the raw payload bytes.
    pub fn payload_sha256(&self) -> String {
        let digest = Sha256::digest(self.raw_payload.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_digest_matches_known_vector() {
        let msg = Message::new("m1", "abc", "pacs.008");
        assert_eq!(
            msg.payload_sha256(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
