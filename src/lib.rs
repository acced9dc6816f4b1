//! # opdsgen
//!
//! A library for generating OPDS catalog feeds for a digital library,
//! serialized as either OPDS 1 (Atom/XML) or OPDS 2 (JSON).
//!
//! ## Features
//!
//! - Format-agnostic feed intermediate representation ([`FeedData`])
//! - Annotation pipeline that turns catalog records into entries,
//!   including per-patron acquisition links (borrow, fulfill,
//!   open-access, revoke) and DRM extension blocks
//! - Paginated, grouped, search, and single-entry feed shapes
//! - Content negotiation between the two wire formats from an
//!   `Accept` header
//!
//! ## Quick Start
//!
//! ```no_run
//! use opdsgen::{
//!     AcquisitionFeed, Annotator, CirculationContext, DefaultCapabilities,
//!     FacetState, Pagination, negotiate, serializer_for,
//! };
//! # use opdsgen::{CatalogRecord, UrlBuilder, Identifier, LicensePool, DeliveryMechanism};
//! # fn records() -> Vec<CatalogRecord> { vec![] }
//! # struct Urls;
//! # impl UrlBuilder for Urls {
//! #     fn permalink_url(&self, i: &Identifier) -> String { String::new() }
//! #     fn borrow_url(&self, i: &Identifier, m: Option<u32>) -> String { String::new() }
//! #     fn fulfill_url(&self, p: &LicensePool, m: &DeliveryMechanism) -> String { String::new() }
//! #     fn revoke_url(&self, p: &LicensePool) -> String { String::new() }
//! # }
//! # let urls = Urls;
//!
//! let annotator = Annotator::new(&urls, &DefaultCapabilities, CirculationContext::new());
//! let pagination = Pagination::from_query(None, None).unwrap().with_total(100);
//! let feed = AcquisitionFeed::page(
//!     "Fiction",
//!     "http://example.org/feed/fiction",
//!     records(),
//!     &annotator,
//!     &pagination,
//!     &FacetState::default(),
//!     Vec::new(),
//! );
//!
//! let format = negotiate(Some("application/opds+json"));
//! let serializer = serializer_for(format);
//! let body = feed.serialize(serializer.as_ref()).unwrap();
//! let content_type = serializer.content_type();
//! ```

pub mod annotator;
pub mod builder;
pub mod error;
pub mod feed;
pub mod model;
pub mod opds;
pub mod serializer;

pub use annotator::{
    Annotator, CirculationCapabilities, CirculationContext, DefaultCapabilities, DrmCredentials,
    EntryError, FormatPriorities, LicensorCache, LicensorToken, UrlBuilder,
};
pub use builder::{
    AcquisitionFeed, Breadcrumb, EntrypointCandidate, FacetCandidate, FacetState, Pagination,
    SingleEntry,
};
pub use error::{Error, Result};
pub use feed::{
    Acquisition, Author, AvailabilityStatus, FeedData, FeedEntryNode, FeedValue,
    IndirectAcquisition, Link, OpdsMessage, WorkEntry, WorkEntryData,
};
pub use model::{
    CatalogRecord, DeliveryMechanism, Edition, Fulfillment, Hold, Identifier, LicensePool, Loan,
    Medium, Patron, Work,
};
pub use serializer::{Format, Opds1Serializer, Opds2Serializer, Serializer, negotiate, serializer_for};
