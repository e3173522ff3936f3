// src/streaming/descriptor.rs
//! `kind://destination:modifiers` sink descriptors

use crate::error::{BoardError, BoardResult};
use std::fmt;

const SCHEME_SEPARATOR: &str = "://";

/// A parsed sink descriptor. The destination is everything between the
/// scheme separator and the last colon, so it may itself contain colons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkDescriptor {
    pub kind: String,
    pub destination: String,
    pub modifiers: String,
}

impl SinkDescriptor {
    pub fn parse(text: &str) -> BoardResult<Self> {
        let malformed = || {
            BoardError::invalid(format!(
                "sink descriptor {:?} is not of the form kind://destination:modifiers",
                text
            ))
        };

        let scheme_at = text.find(SCHEME_SEPARATOR).ok_or_else(malformed)?;
        let last_colon = text.rfind(':').ok_or_else(malformed)?;
        if last_colon == scheme_at {
            return Err(malformed());
        }

        Ok(Self {
            kind: text[..scheme_at].to_string(),
            destination: text[scheme_at + SCHEME_SEPARATOR.len()..last_colon].to_string(),
            modifiers: text[last_colon + 1..].to_string(),
        })
    }
}

impl fmt::Display for SinkDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.kind, self.destination, self.modifiers)
    }
}
