//! Annotation pipeline.
//!
//! The annotator inspects domain state (edition metadata, license pool,
//! the patron's loans and holds) and populates the feed IR. Everything
//! request-specific arrives through [`CirculationContext`]; everything
//! host-specific (URLs, vendor capabilities, DRM credentials) arrives
//! through the collaborator traits. There is exactly one annotator type;
//! feeds that want less behavior get it by leaving capabilities at their
//! defaults, not by subclassing.

pub mod circulation;
pub mod priorities;

use std::collections::HashMap;

use chrono::Utc;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use tracing::warn;

use crate::feed::{
    Author, Category, FeedData, FeedEntryNode, Link, OpdsMessage, Rating, WorkEntry,
    WorkEntryData,
};
use crate::model::{
    roles, DeliveryMechanism, Edition, Hold, Identifier, LicensePool, Patron,
};
use crate::opds::{self, mediatype, rel, scheme};

pub use circulation::LicensorCache;
pub use priorities::FormatPriorities;

/// A recoverable failure producing one entry.
///
/// These never abort a feed: the builder converts each into a
/// placeholder [`OpdsMessage`], except [`EntryError::NoIdentifier`],
/// which has nothing to key a placeholder on and drops the entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("work has no identifier")]
    NoIdentifier,
    #[error("identifier {0} not found in collection")]
    NotInCollection(String),
    #[error("no active license pool for {0}")]
    NoLicensePool(String),
    #[error("no edition metadata for {0}")]
    NoEditionMetadata(String),
    #[error("identifier {0} does not belong to this work")]
    MismatchedIdentifier(String),
    #[error("no fulfillable delivery mechanism for {0}")]
    Unfulfillable(String),
}

impl EntryError {
    pub fn urn(&self) -> Option<&str> {
        match self {
            EntryError::NoIdentifier => None,
            EntryError::NotInCollection(urn)
            | EntryError::NoLicensePool(urn)
            | EntryError::NoEditionMetadata(urn)
            | EntryError::MismatchedIdentifier(urn)
            | EntryError::Unfulfillable(urn) => Some(urn),
        }
    }

    /// The placeholder entry substituted for the work, with its
    /// HTTP-equivalent status.
    pub fn to_message(&self) -> Option<OpdsMessage> {
        let urn = self.urn()?;
        let (status, text) = match self {
            EntryError::NoIdentifier => return None,
            EntryError::NotInCollection(_) => {
                (404, "Identifier not found in collection".to_string())
            }
            EntryError::NoLicensePool(_) => (
                403,
                "I've heard about this work but have no active licenses for it.".to_string(),
            ),
            EntryError::NoEditionMetadata(_) => (
                403,
                "I've heard about this work but have no metadata for it.".to_string(),
            ),
            EntryError::MismatchedIdentifier(urn) => (
                500,
                format!(
                    "I tried to generate an OPDS entry for the identifier \"{urn}\" \
                     using a Work not associated with that identifier."
                ),
            ),
            EntryError::Unfulfillable(_) => (
                403,
                "I know about this work but can offer no way of fulfilling it.".to_string(),
            ),
        };
        Some(OpdsMessage::new(urn, status, text))
    }
}

/// The host routing layer. The engine never builds a URL itself.
pub trait UrlBuilder {
    fn permalink_url(&self, identifier: &Identifier) -> String;
    /// Borrow URL, optionally pinning a delivery mechanism at checkout.
    fn borrow_url(&self, identifier: &Identifier, mechanism: Option<u32>) -> String;
    fn fulfill_url(&self, pool: &LicensePool, mechanism: &DeliveryMechanism) -> String;
    fn revoke_url(&self, pool: &LicensePool) -> String;
    fn contributor_url(&self, _name: &str) -> Option<String> {
        None
    }
    fn series_url(&self, _series: &str) -> Option<String> {
        None
    }
    fn auth_document_url(&self) -> Option<String> {
        None
    }
    fn shelf_url(&self) -> Option<String> {
        None
    }
}

/// What the vendor backing a license pool allows. Defaults describe the
/// common open-access-style vendor.
pub trait CirculationCapabilities {
    /// Whether the delivery mechanism must be fixed at checkout time.
    fn set_mechanism_at_borrow(&self, _pool: &LicensePool) -> bool {
        false
    }

    /// Whether an existing hold can still be cancelled. Some vendors
    /// disallow cancelling once the hold is ready.
    fn can_revoke_hold(&self, _pool: &LicensePool, _hold: &Hold) -> bool {
        true
    }

    /// Whether a title can be fulfilled with no loan at all, for
    /// libraries that do not authenticate patrons.
    fn can_fulfill_without_loan(
        &self,
        _pool: &LicensePool,
        _mechanism: &DeliveryMechanism,
    ) -> bool {
        false
    }
}

/// Capabilities of a vendor with no special requirements.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCapabilities;

impl CirculationCapabilities for DefaultCapabilities {}

/// An opaque vendor-token DRM credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensorToken {
    pub vendor: String,
    pub client_token: String,
}

/// External credential service for DRM extension blocks. "Not yet
/// available" is an absent value, not an error.
pub trait DrmCredentials {
    fn licensor_token(&self, _patron: &Patron) -> Option<LicensorToken> {
        None
    }

    fn lcp_hashed_passphrase(&self, _patron: &Patron) -> Option<String> {
        None
    }
}

/// Everything request-specific the annotator consults: who the patron
/// is, what they have out, and how the library is configured.
#[derive(Default)]
pub struct CirculationContext {
    /// Whether this library can distinguish individual patrons. When
    /// false, links that imply a patron session (borrow, fulfill,
    /// revoke) are not emitted.
    pub identifies_patrons: bool,
    /// Whether patrons may join hold queues for unavailable titles.
    pub allow_holds: bool,
    pub patron: Option<Patron>,
    /// Active circulation state keyed by work id.
    pub active_loans: HashMap<u64, crate::model::Loan>,
    pub active_holds: HashMap<u64, Hold>,
    pub active_fulfillments: HashMap<u64, crate::model::Fulfillment>,
    pub priorities: FormatPriorities,
}

impl CirculationContext {
    pub fn new() -> CirculationContext {
        CirculationContext {
            identifies_patrons: true,
            allow_holds: true,
            ..CirculationContext::default()
        }
    }
}

/// The annotation pipeline for one feed build.
pub struct Annotator<'a> {
    pub urls: &'a dyn UrlBuilder,
    pub capabilities: &'a dyn CirculationCapabilities,
    pub credentials: Option<&'a dyn DrmCredentials>,
    pub context: CirculationContext,
}

// Python's quote(): everything but alphanumerics, `_.-~` and `/`.
const TERM_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

impl<'a> Annotator<'a> {
    pub fn new(
        urls: &'a dyn UrlBuilder,
        capabilities: &'a dyn CirculationCapabilities,
        context: CirculationContext,
    ) -> Annotator<'a> {
        Annotator {
            urls,
            capabilities,
            credentials: None,
            context,
        }
    }

    pub fn with_credentials(mut self, credentials: &'a dyn DrmCredentials) -> Annotator<'a> {
        self.credentials = Some(credentials);
        self
    }

    /// Populate `entry.computed`. A second call with unchanged inputs is
    /// a no-op, so annotation is idempotent.
    ///
    /// The licensor cache is scoped to one feed build; the builder
    /// creates it and threads it through every entry.
    pub fn annotate_work_entry(
        &self,
        entry: &mut WorkEntry,
        cache: &mut LicensorCache,
    ) -> Result<(), EntryError> {
        if entry.computed.is_some() {
            return Ok(());
        }

        let mut computed = self.bibliographic_entry(entry);

        let acquisition_links = self.acquisition_links(
            entry.license_pool.as_ref(),
            &entry.work,
            &entry.identifier,
            cache,
        )?;
        computed.acquisition_links = acquisition_links;

        let permalink = self.urls.permalink_url(&entry.identifier);
        computed
            .other_links
            .push(Link::new(permalink, "alternate").with_type(mediatype::ENTRY));

        self.add_author_links(&mut computed);
        self.add_series_link(&mut computed);

        entry.computed = Some(computed);
        Ok(())
    }

    fn bibliographic_entry(&self, entry: &WorkEntry) -> WorkEntryData {
        let work = &entry.work;
        let edition = &entry.edition;
        let today = Utc::now().date_naive();

        let mut computed = WorkEntryData {
            identifier: Some(entry.identifier.urn.clone()),
            additional_type: edition.medium.map(|m| m.additional_type().to_string()),
            title: Some(
                edition
                    .title
                    .clone()
                    .unwrap_or_else(|| opds::NO_TITLE.to_string()),
            ),
            sort_title: edition.sort_title.clone(),
            subtitle: edition.subtitle.clone(),
            summary: work.summary.clone(),
            language: edition.language_code.clone(),
            publisher: edition.publisher.clone(),
            imprint: edition.imprint.clone(),
            issued: edition.issued.filter(|issued| *issued <= today),
            updated: work.last_update_time,
            duration: edition.duration,
            series: series_node(edition.series.as_deref(), edition.series_position),
            pwid: edition.permanent_work_id.clone(),
            ..WorkEntryData::default()
        };

        let (authors, contributors) = split_contributions(edition);
        computed.authors = authors;
        computed.contributors = contributors;
        computed.categories = categories(work);

        if let Some(quality) = work.quality {
            computed.ratings.push(Rating {
                value: format!("{quality:.4}"),
                additional_type: Some(scheme::QUALITY.to_string()),
            });
        }

        if let Some(pool) = &entry.license_pool {
            // A pool with no data source is a stand-in that is not
            // actually distributing the book.
            computed.distribution = pool.data_source.clone();
            // Atom 'published' is the date the book first became
            // available to patrons of this catalog.
            computed.published = pool
                .availability_time
                .filter(|avail| avail.date_naive() <= today);
        }

        for (link_rel, url) in [
            (rel::IMAGE, &work.cover_url),
            (rel::THUMBNAIL, &work.thumbnail_url),
        ] {
            if let Some(url) = url {
                computed
                    .image_links
                    .push(Link::new(url, link_rel).with_type(image_type(url)));
            }
        }

        computed
    }

    fn add_author_links(&self, computed: &mut WorkEntryData) {
        for author in &mut computed.authors {
            if author.name.is_empty() {
                continue;
            }
            if let Some(href) = self.urls.contributor_url(&author.name) {
                author.link = Some(
                    Link::new(href, "contributor")
                        .with_type(mediatype::ACQUISITION_FEED)
                        .with_title(author.name.clone()),
                );
            }
        }
    }

    fn add_series_link(&self, computed: &mut WorkEntryData) {
        let Some(series) = &mut computed.series else {
            return;
        };
        let Some(name) = series.get_scalar("name").map(str::to_string) else {
            return;
        };
        if let Some(href) = self.urls.series_url(&name) {
            let link = FeedEntryNode::new()
                .scalar("href", href)
                .scalar("rel", "series")
                .scalar("type", mediatype::ACQUISITION_FEED)
                .scalar("title", name);
            series.set("link", crate::feed::FeedValue::Node(link));
        }
    }

    /// Feed-level blocks: a patron block for authenticated requests, an
    /// authentication-document pointer otherwise, and a bookshelf link
    /// for libraries that track individual patrons.
    pub fn annotate_feed(&self, feed: &mut FeedData) {
        if self.context.identifies_patrons {
            if let Some(patron) = &self.context.patron {
                let mut patron_node = FeedEntryNode::new();
                if let Some(username) = &patron.username {
                    patron_node.set_scalar("username", username);
                }
                if let Some(authorization) = &patron.authorization_identifier {
                    patron_node.set_scalar("authorizationIdentifier", authorization);
                }
                feed.metadata.patron = Some(patron_node);
            } else if let Some(href) = self.urls.auth_document_url() {
                feed.add_link(Link::new(href, rel::AUTH_DOCUMENT));
            }
            if let Some(href) = self.urls.shelf_url() {
                feed.add_link(Link::new(href, rel::SHELF).with_type(mediatype::ACQUISITION_FEED));
            }
        } else if let Some(href) = self.urls.auth_document_url() {
            // This is the document that explains there is no patron
            // authentication at this library.
            feed.add_link(Link::new(href, rel::AUTH_DOCUMENT));
        }
    }
}

/// Split an edition's contributions into authors and named contributors,
/// deduplicating by (role, name). Returns an empty-named author when no
/// author credit exists, to avoid implying (per RFC 4287 4.2.1) that the
/// book was written by whoever wrote the feed.
fn split_contributions(edition: &Edition) -> (Vec<Author>, Vec<Author>) {
    let mut authors = Vec::new();
    let mut contributors = Vec::new();
    let mut seen: Vec<(Option<&'static str>, String)> = Vec::new();

    for contribution in &edition.contributions {
        let marc_role = if roles::is_author_role(&contribution.role) {
            None
        } else {
            match roles::marc_code(&contribution.role) {
                Some(code) => Some(code),
                // Not a credit we publish.
                None => continue,
            }
        };
        if contribution.name.is_empty() {
            continue;
        }
        let key = (marc_role, contribution.name.to_lowercase());
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);

        let credit = Author {
            name: contribution.name.clone(),
            role: marc_role.map(str::to_string),
            sort_name: contribution.sort_name.clone(),
            ..Author::default()
        };
        if marc_role.is_none() {
            authors.push(credit);
        } else {
            contributors.push(credit);
        }
    }

    if authors.is_empty() {
        authors.push(Author::named(""));
    }
    (authors, contributors)
}

fn series_node(name: Option<&str>, position: Option<i32>) -> Option<FeedEntryNode> {
    let name = name?;
    let mut series = FeedEntryNode::new().scalar("name", name);
    if let Some(position) = position {
        series.set_scalar("position", position.to_string());
    }
    Some(series)
}

/// Every relevant classification of a work: fiction status, genres,
/// appeals, audience, and (for juvenile audiences) target age.
fn categories(work: &crate::model::Work) -> Vec<Category> {
    let mut categories = Vec::new();

    if let Some(fiction) = work.fiction {
        let term = if fiction { "Fiction" } else { "Nonfiction" };
        categories.push(Category {
            scheme: scheme::FICTION_STATUS.to_string(),
            term: format!("{}{}", scheme::FICTION_STATUS, term),
            label: term.to_string(),
            rating_value: None,
        });
    }

    for genre in &work.genres {
        if genre.is_empty() {
            continue;
        }
        categories.push(Category {
            scheme: scheme::GENRE.to_string(),
            term: format!(
                "{}{}",
                scheme::GENRE,
                utf8_percent_encode(genre, TERM_ENCODE)
            ),
            label: genre.clone(),
            rating_value: None,
        });
    }

    for appeal in &work.appeals {
        categories.push(Category {
            scheme: scheme::APPEALS.to_string(),
            term: format!("{}{}", scheme::APPEALS, appeal.name),
            label: appeal.name.clone(),
            rating_value: Some(appeal.value.to_string()),
        });
    }

    if let Some(audience) = &work.audience {
        categories.push(Category {
            scheme: scheme::AUDIENCE.to_string(),
            term: audience.clone(),
            label: audience.clone(),
            rating_value: None,
        });
    }

    let juvenile = matches!(work.audience.as_deref(), Some("Children") | Some("Young Adult"));
    if juvenile {
        if let Some(target_age) = &work.target_age {
            categories.push(Category {
                scheme: scheme::AGE_RANGE.to_string(),
                term: target_age.clone(),
                label: target_age.clone(),
                rating_value: None,
            });
        }
    } else if work.target_age.is_some() {
        warn!(audience = ?work.audience, "ignoring target age for non-juvenile audience");
    }

    categories
}

fn image_type(url: &str) -> &'static str {
    if url.ends_with(".jpeg") || url.ends_with(".jpg") {
        "image/jpeg"
    } else if url.ends_with(".gif") {
        "image/gif"
    } else {
        "image/png"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Appeal, Contribution, Work};

    fn edition_with(contributions: Vec<Contribution>) -> Edition {
        Edition {
            title: Some("Test Book".to_string()),
            contributions,
            ..Edition::default()
        }
    }

    #[test]
    fn test_split_contributions_dedups_by_role_and_name() {
        let edition = edition_with(vec![
            Contribution::new("Jane Roe", "Author"),
            Contribution::new("jane roe", "Author"),
            Contribution::new("Jane Roe", "Narrator"),
        ]);
        let (authors, contributors) = split_contributions(&edition);
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].name, "Jane Roe");
        assert_eq!(contributors.len(), 1);
        assert_eq!(contributors[0].role.as_deref(), Some("nrt"));
    }

    #[test]
    fn test_no_authors_yields_empty_placeholder() {
        let edition = edition_with(vec![Contribution::new("Sam Smith", "Narrator")]);
        let (authors, contributors) = split_contributions(&edition);
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].name, "");
        assert_eq!(contributors.len(), 1);
    }

    #[test]
    fn test_unpublishable_role_skipped() {
        let edition = edition_with(vec![Contribution::new("Pat Doe", "Beta Reader")]);
        let (authors, contributors) = split_contributions(&edition);
        assert_eq!(authors[0].name, "");
        assert!(contributors.is_empty());
    }

    #[test]
    fn test_series_node() {
        let series = series_node(Some("A Trilogy"), Some(2)).unwrap();
        assert_eq!(series.get_scalar("name"), Some("A Trilogy"));
        assert_eq!(series.get_scalar("position"), Some("2"));
        assert_eq!(series_node(None, Some(2)), None);
    }

    #[test]
    fn test_categories_fiction_and_genre_encoding() {
        let work = Work {
            fiction: Some(true),
            genres: vec!["Science Fiction".to_string()],
            ..Work::default()
        };
        let categories = categories(&work);
        assert_eq!(categories[0].label, "Fiction");
        assert_eq!(
            categories[0].term,
            format!("{}Fiction", scheme::FICTION_STATUS)
        );
        assert_eq!(
            categories[1].term,
            format!("{}Science%20Fiction", scheme::GENRE)
        );
        assert_eq!(categories[1].label, "Science Fiction");
    }

    #[test]
    fn test_categories_target_age_only_for_juvenile() {
        let adult = Work {
            audience: Some("Adult".to_string()),
            target_age: Some("18-80".to_string()),
            ..Work::default()
        };
        assert!(!categories(&adult)
            .iter()
            .any(|c| c.scheme == scheme::AGE_RANGE));

        let juvenile = Work {
            audience: Some("Children".to_string()),
            target_age: Some("8-10".to_string()),
            ..Work::default()
        };
        assert!(categories(&juvenile)
            .iter()
            .any(|c| c.scheme == scheme::AGE_RANGE && c.term == "8-10"));
    }

    #[test]
    fn test_categories_appeals_carry_rating_values() {
        let work = Work {
            appeals: vec![Appeal {
                name: "Character".to_string(),
                value: 0.43,
            }],
            ..Work::default()
        };
        let categories = categories(&work);
        assert_eq!(categories[0].rating_value.as_deref(), Some("0.43"));
    }

    #[test]
    fn test_image_type_sniffing() {
        assert_eq!(image_type("http://x/cover.jpg"), "image/jpeg");
        assert_eq!(image_type("http://x/cover.jpeg"), "image/jpeg");
        assert_eq!(image_type("http://x/cover.gif"), "image/gif");
        assert_eq!(image_type("http://x/cover"), "image/png");
    }

    #[test]
    fn test_entry_error_messages() {
        let error = EntryError::NoLicensePool("urn:x".to_string());
        let message = error.to_message().unwrap();
        assert_eq!(message.status, 403);
        assert_eq!(message.urn, "urn:x");
        assert_eq!(
            message.message,
            "I've heard about this work but have no active licenses for it."
        );

        assert_eq!(
            EntryError::NotInCollection("urn:x".to_string())
                .to_message()
                .unwrap()
                .status,
            404
        );
        assert_eq!(
            EntryError::MismatchedIdentifier("urn:x".to_string())
                .to_message()
                .unwrap()
                .status,
            500
        );
        assert_eq!(EntryError::NoIdentifier.to_message(), None);
    }
}
