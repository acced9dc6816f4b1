//! Feed intermediate representation.
//!
//! A [`FeedData`] is the format-agnostic document the annotator populates
//! and a serializer renders. It is built once per request, mutated in
//! place by the annotator and the feed builder, handed to exactly one
//! serializer, then discarded.
//!
//! No validation logic lives here; invariants are enforced by the
//! producers (the annotator) and consumers (the serializers).

pub mod link;
pub mod node;

use chrono::{DateTime, NaiveDate, Utc};

pub use link::{Acquisition, Author, AvailabilityStatus, IndirectAcquisition, Link};
pub use node::{FeedEntryNode, FeedValue};

use crate::model::{Edition, Identifier, LicensePool, Work};

/// A subject classification of one work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Category {
    pub scheme: String,
    pub term: String,
    pub label: String,
    /// Weight, for classifications that carry one (e.g. appeals).
    pub rating_value: Option<String>,
}

/// A rating of one work (e.g. a quality score).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rating {
    pub value: String,
    pub additional_type: Option<String>,
}

/// The flattened, serializer-ready description of one catalog item.
///
/// `authors[0]` is the primary author, for wire formats that want
/// exactly one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkEntryData {
    pub identifier: Option<String>,
    pub additional_type: Option<String>,
    pub title: Option<String>,
    pub sort_title: Option<String>,
    pub subtitle: Option<String>,
    /// HTML summary.
    pub summary: Option<String>,
    pub language: Option<String>,
    pub publisher: Option<String>,
    pub imprint: Option<String>,
    pub issued: Option<NaiveDate>,
    /// Date the title became available in this collection.
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub duration: Option<f64>,
    pub series: Option<FeedEntryNode>,
    pub pwid: Option<String>,
    /// Distributor name, when the pool is actually distributing the book.
    pub distribution: Option<String>,
    pub authors: Vec<Author>,
    pub contributors: Vec<Author>,
    pub categories: Vec<Category>,
    pub ratings: Vec<Rating>,
    pub acquisition_links: Vec<Acquisition>,
    pub image_links: Vec<Link>,
    pub other_links: Vec<Link>,
}

/// One catalog entry: the domain identity used to decide *what* to
/// compute, plus the computed data once annotation has run.
///
/// `computed` stays `None` until annotation runs, or permanently if the
/// annotator produced a placeholder message instead.
#[derive(Debug, Clone)]
pub struct WorkEntry {
    pub work: Work,
    pub edition: Edition,
    pub identifier: Identifier,
    pub license_pool: Option<LicensePool>,
    pub computed: Option<WorkEntryData>,
}

impl WorkEntry {
    pub fn new(
        work: Work,
        edition: Edition,
        identifier: Identifier,
        license_pool: Option<LicensePool>,
    ) -> WorkEntry {
        WorkEntry {
            work,
            edition,
            identifier,
            license_pool,
            computed: None,
        }
    }
}

/// A non-work navigational entry, e.g. a sub-lane link in a navigation feed.
#[derive(Debug, Clone, Default)]
pub struct DataEntry {
    pub title: Option<String>,
    pub id: Option<String>,
    pub links: Vec<Link>,
}

/// Feed-level metadata.
///
/// The per-patron extension blocks are rendered at the feed level by the
/// OPDS 1 serializer and ignored by OPDS 2.
#[derive(Debug, Clone, Default)]
pub struct FeedMetadata {
    pub title: Option<String>,
    pub id: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    pub items_per_page: Option<usize>,
    pub patron: Option<FeedEntryNode>,
    pub drm_licensor: Option<FeedEntryNode>,
    pub lcp_hashed_passphrase: Option<String>,
}

/// The complete document root.
///
/// `entries` and `data_entries` are mutually exclusive in practice (a
/// feed is either a catalog feed or a navigation feed) but the type does
/// not enforce this; which builder method populates the structure does.
#[derive(Debug, Clone, Default)]
pub struct FeedData {
    pub entries: Vec<WorkEntry>,
    pub data_entries: Vec<DataEntry>,
    pub metadata: FeedMetadata,
    pub links: Vec<Link>,
    pub breadcrumbs: Vec<Link>,
    pub facet_links: Vec<Link>,
    /// URI of the currently selected content-type entry point, if any.
    pub entrypoint: Option<String>,
}

impl FeedData {
    pub fn new() -> FeedData {
        FeedData::default()
    }

    pub fn add_link(&mut self, link: Link) {
        self.links.push(link);
    }
}

/// A stand-in catalog entry substituted when a real entry cannot be
/// produced. When serialized standalone, `status` is the
/// HTTP-equivalent status code of the whole response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpdsMessage {
    pub urn: String,
    pub status: u16,
    pub message: String,
}

impl OpdsMessage {
    pub fn new(urn: impl Into<String>, status: u16, message: impl Into<String>) -> OpdsMessage {
        OpdsMessage {
            urn: urn.into(),
            status,
            message: message.into(),
        }
    }
}
