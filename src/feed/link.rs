//! Link and acquisition-link types.
//!
//! A plain [`Link`] covers images, navigation, and facet links. An
//! [`Acquisition`] is a link plus the circulation state a client needs to
//! decide whether it can borrow, fulfill, or revoke a title right now:
//! availability, hold queue, copy counts, the indirect-acquisition chain,
//! and DRM extension blocks.

use chrono::{DateTime, Utc};

use crate::feed::node::FeedEntryNode;

/// A feed or entry link.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Link {
    pub href: String,
    pub rel: Option<String>,
    pub media_type: Option<String>,
    pub title: Option<String>,
    /// Facet-group name, for facet and entry-point links.
    pub facet_group: Option<String>,
    /// Marker rel distinguishing entry-point links from ordinary facets.
    pub facet_group_type: Option<String>,
    pub active_facet: bool,
    pub default_facet: bool,
}

impl Link {
    pub fn new(href: impl Into<String>, rel: impl Into<String>) -> Link {
        Link {
            href: href.into(),
            rel: Some(rel.into()),
            ..Link::default()
        }
    }

    pub fn with_type(mut self, media_type: impl Into<String>) -> Link {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Link {
        self.title = Some(title.into());
        self
    }

    /// Null-pruned projection of the core attributes, used by both wire
    /// formats. Facet attributes are serializer-specific and excluded.
    pub fn link_attribs(&self) -> Vec<(&'static str, &str)> {
        let mut attribs = vec![("href", self.href.as_str())];
        if let Some(rel) = &self.rel {
            attribs.push(("rel", rel));
        }
        if let Some(media_type) = &self.media_type {
            attribs.push(("type", media_type));
        }
        if let Some(title) = &self.title {
            attribs.push(("title", title));
        }
        attribs
    }
}

/// One layer of format types a client must unwrap to get at a title,
/// outermost DRM scheme to innermost content type.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectAcquisition {
    pub media_type: String,
    pub children: Vec<IndirectAcquisition>,
}

impl IndirectAcquisition {
    pub fn new(media_type: impl Into<String>) -> IndirectAcquisition {
        IndirectAcquisition {
            media_type: media_type.into(),
            children: Vec::new(),
        }
    }

    /// Build a nested chain from an ordered list of format types.
    /// Returns `None` for an empty list.
    pub fn chain(types: &[String]) -> Option<IndirectAcquisition> {
        let mut iter = types.iter().rev();
        let innermost = IndirectAcquisition::new(iter.next()?);
        Some(iter.fold(innermost, |child, media_type| IndirectAcquisition {
            media_type: media_type.clone(),
            children: vec![child],
        }))
    }

    /// The format types of this chain, outermost first.
    pub fn flattened(&self) -> Vec<&str> {
        let mut types = vec![self.media_type.as_str()];
        for child in &self.children {
            types.extend(child.flattened());
        }
        types
    }
}

/// Availability state reported for an acquisition link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityStatus {
    Available,
    Unavailable,
    /// A hold that has reached the front of the queue.
    Ready,
    /// A hold waiting in the queue.
    Reserved,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::Available => "available",
            AvailabilityStatus::Unavailable => "unavailable",
            AvailabilityStatus::Ready => "ready",
            AvailabilityStatus::Reserved => "reserved",
        }
    }
}

/// An acquisition link: a [`Link`] extended with circulation state.
///
/// An `Acquisition` with no href and no indirect acquisitions is
/// meaningless; the annotator signals "unfulfillable work" instead of
/// ever constructing one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Acquisition {
    pub link: Link,
    pub availability_status: Option<AvailabilityStatus>,
    pub availability_since: Option<DateTime<Utc>>,
    pub availability_until: Option<DateTime<Utc>>,
    pub holds_position: Option<u32>,
    pub holds_total: Option<u32>,
    pub copies_available: Option<u32>,
    pub copies_total: Option<u32>,
    /// Rights statement URI for this delivery mechanism.
    pub rights: Option<String>,
    /// LCP hashed passphrase, when the loan uses LCP DRM.
    pub lcp_hashed_passphrase: Option<String>,
    /// Vendor-token DRM licensor block.
    pub drm_licensor: Option<FeedEntryNode>,
    pub indirect_acquisitions: Vec<IndirectAcquisition>,
    pub is_loan: bool,
    pub is_hold: bool,
    pub templated: bool,
}

impl Acquisition {
    pub fn new(href: impl Into<String>, rel: impl Into<String>) -> Acquisition {
        Acquisition {
            link: Link::new(href, rel),
            ..Acquisition::default()
        }
    }
}

/// An author or contributor credit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Author {
    pub name: String,
    /// MARC relator code; `None` for primary authors.
    pub role: Option<String>,
    pub sort_name: Option<String>,
    pub wikipedia_name: Option<String>,
    /// "Same as" URIs from authority files.
    pub viaf: Option<String>,
    pub lc: Option<String>,
    pub link: Option<Link>,
}

impl Author {
    pub fn named(name: impl Into<String>) -> Author {
        Author {
            name: name.into(),
            ..Author::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_attribs_prunes_nulls() {
        let link = Link::new("http://example.com/feed", "self");
        let attribs = link.link_attribs();
        assert_eq!(
            attribs,
            vec![("href", "http://example.com/feed"), ("rel", "self")]
        );
    }

    #[test]
    fn test_indirect_chain_nesting() {
        let types = vec![
            "application/vnd.adobe.adept+xml".to_string(),
            "application/epub+zip".to_string(),
        ];
        let chain = IndirectAcquisition::chain(&types).unwrap();
        assert_eq!(chain.media_type, "application/vnd.adobe.adept+xml");
        assert_eq!(chain.children.len(), 1);
        assert_eq!(chain.children[0].media_type, "application/epub+zip");
        assert!(chain.children[0].children.is_empty());
    }

    #[test]
    fn test_indirect_chain_empty() {
        assert_eq!(IndirectAcquisition::chain(&[]), None);
    }

    #[test]
    fn test_indirect_chain_single() {
        let chain = IndirectAcquisition::chain(&["application/epub+zip".to_string()]).unwrap();
        assert_eq!(chain.flattened(), vec!["application/epub+zip"]);
    }
}
