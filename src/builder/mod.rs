//! Feed assembly facade.
//!
//! [`AcquisitionFeed`] turns catalog records into the four feed shapes:
//! a flat paginated page, a grouped feed, a search-result feed, and a
//! standalone entry. Per-record failures become placeholder messages in
//! the same document (or standalone messages for single entries); only
//! malformed request parameters fail the whole feed.

use chrono::Utc;
use tracing::{debug, warn};

use crate::annotator::{Annotator, EntryError, LicensorCache};
use crate::error::{Error, Result};
use crate::feed::{FeedData, Link, OpdsMessage, WorkEntry, WorkEntryData};
use crate::model::{CatalogRecord, Identifier};
use crate::opds::{mediatype, rel};
use crate::serializer::Serializer;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 100;

/// Offset/size pagination over a flat feed.
///
/// `total` is the collection size when the host knows it; without it,
/// a full page is assumed to have a successor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub offset: usize,
    pub size: usize,
    pub total: Option<usize>,
}

impl Pagination {
    pub fn new(offset: usize, size: usize) -> Result<Pagination> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(Error::InvalidInput(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}, got {size}"
            )));
        }
        Ok(Pagination {
            offset,
            size,
            total: None,
        })
    }

    /// Parse request query parameters, rejecting malformed values
    /// before any annotation work happens.
    pub fn from_query(offset: Option<&str>, size: Option<&str>) -> Result<Pagination> {
        let offset = match offset {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| Error::InvalidInput(format!("invalid pagination offset: {raw:?}")))?,
            None => 0,
        };
        let size = match size {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| Error::InvalidInput(format!("invalid page size: {raw:?}")))?,
            None => DEFAULT_PAGE_SIZE,
        };
        Pagination::new(offset, size)
    }

    pub fn with_total(mut self, total: usize) -> Pagination {
        self.total = Some(total);
        self
    }

    fn url_at(&self, base: &str, offset: usize) -> String {
        let joiner = if base.contains('?') { '&' } else { '?' };
        format!("{base}{joiner}after={offset}&size={}", self.size)
    }

    fn has_next(&self, page_len: usize) -> bool {
        if page_len == 0 {
            return false;
        }
        match self.total {
            Some(total) => self.offset + page_len < total,
            None => page_len >= self.size,
        }
    }

    /// The next/previous/first links for one rendered page.
    fn links(&self, base: &str, page_len: usize) -> Vec<Link> {
        let mut links = Vec::new();
        if self.has_next(page_len) {
            links.push(
                Link::new(self.url_at(base, self.offset + page_len), "next")
                    .with_type(mediatype::ACQUISITION_FEED),
            );
        }
        if self.offset > 0 {
            links.push(
                Link::new(self.url_at(base, 0), "first").with_type(mediatype::ACQUISITION_FEED),
            );
            let previous = self.offset.saturating_sub(self.size);
            links.push(
                Link::new(self.url_at(base, previous), "previous")
                    .with_type(mediatype::ACQUISITION_FEED),
            );
        }
        links
    }
}

/// One selectable facet value, identified by machine keys. Display
/// titles come from the fixed tables below.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetCandidate {
    pub group: String,
    pub value: String,
    pub href: String,
    pub active: bool,
}

/// One selectable content-type entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrypointCandidate {
    /// Entry-point URI, e.g. `http://schema.org/EBook`.
    pub uri: String,
    pub href: String,
    pub selected: bool,
}

/// Facet and entry-point selections for one feed.
#[derive(Debug, Clone, Default)]
pub struct FacetState {
    pub facets: Vec<FacetCandidate>,
    pub entrypoints: Vec<EntrypointCandidate>,
}

/// Display title and default value for a facet group key.
fn facet_group_info(group: &str) -> Option<(&'static str, &'static str)> {
    match group {
        "order" => Some(("Sort by", "author")),
        "available" => Some(("Availability", "all")),
        "collection" => Some(("Collection", "full")),
        "distributor" => Some(("Distributor", "All")),
        _ => None,
    }
}

fn facet_value_title(group: &str, value: &str) -> Option<&'static str> {
    match (group, value) {
        ("order", "author") => Some("Author"),
        ("order", "title") => Some("Title"),
        ("order", "added") => Some("Recently Added"),
        ("order", "last_update") => Some("Last Update"),
        ("available", "all") => Some("All"),
        ("available", "now") => Some("Available now"),
        ("available", "always") => Some("Yours to keep"),
        ("collection", "full") => Some("Everything"),
        ("collection", "featured") => Some("Popular Books"),
        ("distributor", "All") => Some("All"),
        _ => None,
    }
}

fn entrypoint_title(uri: &str) -> Option<&'static str> {
    match uri {
        "http://schema.org/CreativeWork" => Some("All"),
        "http://schema.org/EBook" => Some("eBooks"),
        "http://bib.schema.org/Audiobook" => Some("Audiobooks"),
        _ => None,
    }
}

impl FacetState {
    /// Facet links for the feed. Candidates with unrecognized group or
    /// value keys are skipped without failing the feed.
    fn facet_links(&self) -> Vec<Link> {
        let mut links = Vec::new();
        for candidate in &self.facets {
            let Some((group_title, default_value)) = facet_group_info(&candidate.group) else {
                debug!(group = %candidate.group, "skipping unrecognized facet group");
                continue;
            };
            let Some(value_title) = facet_value_title(&candidate.group, &candidate.value) else {
                debug!(
                    group = %candidate.group,
                    value = %candidate.value,
                    "skipping unrecognized facet value"
                );
                continue;
            };
            let mut link = Link::new(&candidate.href, rel::FACET)
                .with_type(mediatype::ACQUISITION_FEED)
                .with_title(value_title);
            link.facet_group = Some(group_title.to_string());
            link.active_facet = candidate.active;
            link.default_facet = candidate.value == default_value;
            links.push(link);
        }
        links
    }

    /// Entry-point links. The group disappears entirely when there is
    /// nothing to switch to: a single entry point that is already
    /// selected.
    fn entrypoint_links(&self) -> Vec<Link> {
        if self.entrypoints.len() <= 1
            && self.entrypoints.first().is_none_or(|ep| ep.selected)
        {
            return Vec::new();
        }
        let mut links = Vec::new();
        for (index, candidate) in self.entrypoints.iter().enumerate() {
            let Some(title) = entrypoint_title(&candidate.uri) else {
                debug!(uri = %candidate.uri, "skipping unrecognized entry point");
                continue;
            };
            let mut link = Link::new(&candidate.href, rel::FACET)
                .with_type(mediatype::ACQUISITION_FEED)
                .with_title(title);
            link.facet_group = Some("Formats".to_string());
            link.facet_group_type = Some(rel::ENTRYPOINT.to_string());
            link.active_facet = candidate.selected;
            link.default_facet = index == 0;
            links.push(link);
        }
        links
    }

    fn selected_entrypoint(&self) -> Option<String> {
        self.entrypoints
            .iter()
            .find(|ep| ep.selected)
            .map(|ep| ep.uri.clone())
    }
}

/// One lane in a breadcrumb ancestry chain, outermost first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breadcrumb {
    pub title: String,
    pub href: String,
    /// A per-patron-type root lane; crumbs never climb above one.
    pub is_patron_root: bool,
}

impl Breadcrumb {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Breadcrumb {
        Breadcrumb {
            title: title.into(),
            href: href.into(),
            is_patron_root: false,
        }
    }
}

/// Breadcrumb links for one lane: an effective root with `rel=start`,
/// then each ancestor below it, then the lane itself. When the ancestry
/// contains a patron-type root, the walk starts there instead of the
/// site root.
pub fn breadcrumb_links(
    site_root: &Breadcrumb,
    ancestry: &[Breadcrumb],
    current: Option<&Breadcrumb>,
) -> Vec<Link> {
    let cutoff = ancestry.iter().rposition(|lane| lane.is_patron_root);
    let (root, below): (&Breadcrumb, &[Breadcrumb]) = match cutoff {
        Some(index) => (&ancestry[index], &ancestry[index + 1..]),
        None => (site_root, ancestry),
    };
    let mut links = vec![Link::new(&root.href, rel::START).with_title(&root.title)];
    for lane in below {
        links.push(Link::new(&lane.href, rel::BREADCRUMB).with_title(&lane.title));
    }
    if let Some(lane) = current {
        links.push(Link::new(&lane.href, rel::BREADCRUMB).with_title(&lane.title));
    }
    links
}

/// A standalone-entry outcome: either the entry or the placeholder
/// message that stands in for it. The message carries the
/// HTTP-equivalent status for the whole response.
#[derive(Debug, Clone, PartialEq)]
pub enum SingleEntry {
    Entry(WorkEntryData),
    Message(OpdsMessage),
}

/// A fully assembled feed document plus the placeholder messages that
/// replaced failed entries.
pub struct AcquisitionFeed {
    pub data: FeedData,
    pub messages: Vec<OpdsMessage>,
}

impl AcquisitionFeed {
    /// A flat paginated feed of one lane.
    pub fn page(
        title: impl Into<String>,
        url: &str,
        records: Vec<CatalogRecord>,
        annotator: &Annotator<'_>,
        pagination: &Pagination,
        facets: &FacetState,
        breadcrumbs: Vec<Link>,
    ) -> AcquisitionFeed {
        let mut feed = AcquisitionFeed::base(title, url, annotator);
        feed.data.metadata.items_per_page = Some(pagination.size);
        let page_len = records.len();
        feed.annotate_all(pair_with_no_links(records), annotator);

        for link in pagination.links(url, page_len) {
            feed.data.add_link(link);
        }
        feed.data.facet_links = facets.facet_links();
        feed.data.facet_links.extend(facets.entrypoint_links());
        feed.data.entrypoint = facets.selected_entrypoint();
        feed.data.breadcrumbs = breadcrumbs;
        feed
    }

    /// A grouped feed. Each record arrives tagged with its bucket title
    /// and the URL of that bucket's flat feed; the tag becomes a
    /// `rel=collection` link on the entry.
    pub fn groups(
        title: impl Into<String>,
        url: &str,
        records: Vec<(CatalogRecord, String, String)>,
        annotator: &Annotator<'_>,
        facets: &FacetState,
        breadcrumbs: Vec<Link>,
    ) -> AcquisitionFeed {
        let mut feed = AcquisitionFeed::base(title, url, annotator);
        let tagged: Vec<(CatalogRecord, Vec<Link>)> = records
            .into_iter()
            .map(|(record, group_title, group_href)| {
                let link = Link::new(group_href, rel::GROUP).with_title(group_title);
                (record, vec![link])
            })
            .collect();
        feed.annotate_all(tagged, annotator);

        feed.data.facet_links = facets.entrypoint_links();
        feed.data.entrypoint = facets.selected_entrypoint();
        feed.data.breadcrumbs = breadcrumbs;
        feed
    }

    /// A search-result feed: paginated like a page feed, with start and
    /// up links back out of the result list and no breadcrumbs.
    pub fn search(
        title: impl Into<String>,
        url: &str,
        records: Vec<CatalogRecord>,
        annotator: &Annotator<'_>,
        pagination: &Pagination,
        facets: &FacetState,
        start: &Breadcrumb,
        up: Option<&Breadcrumb>,
    ) -> AcquisitionFeed {
        let mut feed = AcquisitionFeed::base(title, url, annotator);
        feed.data.metadata.items_per_page = Some(pagination.size);
        let page_len = records.len();
        feed.annotate_all(pair_with_no_links(records), annotator);

        for link in pagination.links(url, page_len) {
            feed.data.add_link(link);
        }
        feed.data
            .add_link(Link::new(&start.href, rel::START).with_title(&start.title));
        if let Some(up) = up {
            feed.data
                .add_link(Link::new(&up.href, "up").with_title(&up.title));
        }
        feed.data.facet_links = facets.entrypoint_links();
        feed.data.entrypoint = facets.selected_entrypoint();
        feed
    }

    /// The patron's active loans and holds, with the feed-level DRM
    /// blocks clients need to open what they already have.
    pub fn loans(
        url: &str,
        records: Vec<CatalogRecord>,
        annotator: &Annotator<'_>,
    ) -> AcquisitionFeed {
        let mut feed = AcquisitionFeed::base("Active loans and holds", url, annotator);
        let mut cache = LicensorCache::new();
        feed.annotate_all_with_cache(pair_with_no_links(records), annotator, &mut cache);
        annotator.annotate_loans_feed(&mut feed.data, &mut cache);
        feed
    }

    /// The record resolved for one requested identifier, as a
    /// standalone entry.
    ///
    /// `record` is whatever the host could find for the identifier;
    /// `None` means the identifier is not in the collection at all.
    /// Every failure becomes a standalone message rather than an error.
    pub fn single_entry(
        requested: &Identifier,
        record: Option<CatalogRecord>,
        annotator: &Annotator<'_>,
    ) -> SingleEntry {
        match resolve_single_entry(requested, record, annotator) {
            Ok(computed) => SingleEntry::Entry(computed),
            Err(error) => match error.to_message() {
                Some(message) => SingleEntry::Message(message),
                None => SingleEntry::Message(OpdsMessage::new(
                    requested.urn.clone(),
                    500,
                    error.to_string(),
                )),
            },
        }
    }

    /// One loan or hold as a standalone entry, annotated the way the
    /// loans feed annotates it (DRM extension blocks included).
    pub fn single_entry_loans_feed(
        requested: &Identifier,
        record: Option<CatalogRecord>,
        annotator: &Annotator<'_>,
    ) -> SingleEntry {
        AcquisitionFeed::single_entry(requested, record, annotator)
    }

    pub fn serialize(&self, serializer: &dyn Serializer) -> Result<Vec<u8>> {
        serializer.serialize_feed(&self.data, &self.messages)
    }

    fn base(title: impl Into<String>, url: &str, annotator: &Annotator<'_>) -> AcquisitionFeed {
        let mut data = FeedData::new();
        data.metadata.title = Some(title.into());
        data.metadata.id = Some(url.to_string());
        data.metadata.updated = Some(Utc::now());
        data.add_link(
            Link::new(url, "self").with_type(mediatype::ACQUISITION_FEED),
        );
        annotator.annotate_feed(&mut data);
        AcquisitionFeed {
            data,
            messages: Vec::new(),
        }
    }

    fn annotate_all(
        &mut self,
        records: Vec<(CatalogRecord, Vec<Link>)>,
        annotator: &Annotator<'_>,
    ) {
        let mut cache = LicensorCache::new();
        self.annotate_all_with_cache(records, annotator, &mut cache);
    }

    /// Each record carries its own extra links so a record that degrades
    /// to a message never shifts the links of the records after it.
    fn annotate_all_with_cache(
        &mut self,
        records: Vec<(CatalogRecord, Vec<Link>)>,
        annotator: &Annotator<'_>,
        cache: &mut LicensorCache,
    ) {
        for (record, links) in records {
            match annotate_record(record, annotator, cache) {
                Ok(mut entry) => {
                    if let Some(computed) = &mut entry.computed {
                        computed.other_links.extend(links);
                    }
                    self.data.entries.push(entry);
                }
                Err(error) => match error.to_message() {
                    Some(message) => self.messages.push(message),
                    None => warn!(%error, "dropping entry with no identifier"),
                },
            }
        }
    }
}

fn pair_with_no_links(records: Vec<CatalogRecord>) -> Vec<(CatalogRecord, Vec<Link>)> {
    records.into_iter().map(|r| (r, Vec::new())).collect()
}

/// The standalone-entry checks, stricter than the feed loop: a single
/// entry is requested for acquisition, so a record with no license pool
/// is an error here rather than a link-free entry.
fn resolve_single_entry(
    requested: &Identifier,
    record: Option<CatalogRecord>,
    annotator: &Annotator<'_>,
) -> std::result::Result<WorkEntryData, EntryError> {
    let Some(mut record) = record else {
        return Err(EntryError::NotInCollection(requested.urn.clone()));
    };
    match &record.identifier {
        Some(identifier) if identifier != requested => {
            return Err(EntryError::MismatchedIdentifier(requested.urn.clone()));
        }
        Some(_) => {}
        None => record.identifier = Some(requested.clone()),
    }
    if record.license_pool.is_none() {
        return Err(EntryError::NoLicensePool(requested.urn.clone()));
    }
    let mut cache = LicensorCache::new();
    let entry = annotate_record(record, annotator, &mut cache)?;
    entry
        .computed
        .ok_or_else(|| EntryError::NoEditionMetadata(requested.urn.clone()))
}

/// Resolve one record into an annotated entry, mapping each missing
/// piece to its error.
fn annotate_record(
    record: CatalogRecord,
    annotator: &Annotator<'_>,
    cache: &mut LicensorCache,
) -> std::result::Result<WorkEntry, EntryError> {
    let Some(identifier) = record.identifier else {
        return Err(EntryError::NoIdentifier);
    };
    let Some(edition) = record.edition else {
        return Err(EntryError::NoEditionMetadata(identifier.urn));
    };
    let mut entry = WorkEntry::new(record.work, edition, identifier, record.license_pool);
    annotator.annotate_work_entry(&mut entry, cache)?;
    Ok(entry)
}
