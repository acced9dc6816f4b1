//! Wire-format serializers.
//!
//! Both serializers consume the same [`FeedData`] and share no code
//! beyond it. [`opds1`] renders an Atom acquisition feed; [`opds2`]
//! renders an OPDS 2 publication-manifest feed. [`negotiate`] picks one
//! from an Accept header.

pub mod opds1;
pub mod opds2;

use tracing::debug;

use crate::error::Result;
use crate::feed::{FeedData, OpdsMessage, WorkEntryData};
use crate::opds::mediatype;

pub use opds1::Opds1Serializer;
pub use opds2::Opds2Serializer;

/// The contract both wire formats implement.
///
/// Malformed IR reaching a serializer is a programmer error; serializers
/// do not defensively repair it.
pub trait Serializer {
    /// Render a complete feed document, with placeholder messages
    /// appended after the real entries.
    fn serialize_feed(&self, feed: &FeedData, messages: &[OpdsMessage]) -> Result<Vec<u8>>;

    /// Render one entry as a standalone document.
    fn serialize_work_entry(&self, entry: &WorkEntryData) -> Result<Vec<u8>>;

    /// Render one placeholder message as a standalone document.
    fn serialize_opds_message(&self, message: &OpdsMessage) -> Result<Vec<u8>>;

    fn content_type(&self) -> &'static str;
}

/// The two wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Opds1,
    Opds2,
}

/// Pick a wire format from an Accept header.
///
/// OPDS 2 wins only when its media type carries a strictly higher
/// quality weight than the Atom family's; ties, unrecognized types, and
/// a missing header all select OPDS 1.
pub fn negotiate(accept: Option<&str>) -> Format {
    let Some(accept) = accept else {
        return Format::Opds1;
    };
    let mut q_opds2: f32 = 0.0;
    let mut q_atom: f32 = 0.0;
    for clause in accept.split(',') {
        let mut parts = clause.trim().split(';');
        let Some(media_type) = parts.next().map(str::trim) else {
            continue;
        };
        let mut q = 1.0_f32;
        for param in parts {
            if let Some(value) = param.trim().strip_prefix("q=") {
                if let Ok(parsed) = value.trim().parse::<f32>() {
                    q = parsed;
                }
            }
        }
        if media_type == mediatype::OPDS2_FEED {
            q_opds2 = q_opds2.max(q);
        } else if media_type.starts_with("application/atom+xml") {
            q_atom = q_atom.max(q);
        }
    }
    let format = if q_opds2 > q_atom && q_opds2 > 0.0 {
        Format::Opds2
    } else {
        Format::Opds1
    };
    debug!(?format, q_opds2, q_atom, "negotiated wire format");
    format
}

/// The serializer for a negotiated format.
pub fn serializer_for(format: Format) -> Box<dyn Serializer> {
    match format {
        Format::Opds1 => Box::new(Opds1Serializer::new()),
        Format::Opds2 => Box::new(Opds2Serializer::new()),
    }
}
