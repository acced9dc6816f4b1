//! OPDS 1 (Atom) serialization.
//!
//! Tag and attribute names are resolved through two static lookup
//! tables; anything absent from a table is emitted as a bare,
//! unqualified name. This is what lets the generic [`FeedEntryNode`]
//! tree be serialized without per-tag code: scalar attributes become
//! XML attributes (except `text`), nested nodes and lists become child
//! elements, lists as repeated siblings.

use std::fmt::Write;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use quick_xml::escape::escape;

use crate::error::Result;
use crate::feed::{
    Acquisition, Author, DataEntry, FeedData, FeedEntryNode, FeedMetadata, FeedValue,
    IndirectAcquisition, Link, OpdsMessage, WorkEntryData,
};
use crate::opds::{mediatype, ns};

use super::Serializer;

/// Logical tag name to namespace-qualified element name.
fn tag_name(name: &str) -> &str {
    match name {
        "indirectAcquisition" => "opds:indirectAcquisition",
        "holds" => "opds:holds",
        "copies" => "opds:copies",
        "availability" => "opds:availability",
        "licensor" => "drm:licensor",
        "patron" => "simplified:patron",
        "series" => "schema:series",
        "hashed_passphrase" => "lcp:hashed_passphrase",
        other => other,
    }
}

/// Logical attribute name to namespace-qualified attribute name.
fn attr_name(name: &str) -> &str {
    match name {
        "vendor" => "drm:vendor",
        "scheme" => "drm:scheme",
        "username" => "simplified:username",
        "authorizationIdentifier" => "simplified:authorizationIdentifier",
        "rights" => "dcterms:rights",
        "ProviderName" => "bibframe:ProviderName",
        "facetGroup" => "opds:facetGroup",
        "facetGroupType" => "simplified:facetGroupType",
        "activeFacet" => "opds:activeFacet",
        "defaultFacet" => "palaceproperties:default",
        "ratingValue" => "schema:ratingValue",
        other => other,
    }
}

fn author_tag_name(name: &str) -> &str {
    match name {
        "name" => "name",
        "sort_name" => "simplified:sort_name",
        "wikipedia_name" => "simplified:wikipedia_name",
        other => other,
    }
}

fn rfc3339(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn date_only(value: &NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn ns_decls() -> String {
    format!(
        " xmlns=\"{}\" xmlns:opds=\"{}\" xmlns:dcterms=\"{}\" xmlns:schema=\"{}\" \
         xmlns:bib=\"{}\" xmlns:simplified=\"{}\" xmlns:bibframe=\"{}\" xmlns:drm=\"{}\" \
         xmlns:lcp=\"{}\" xmlns:opf=\"{}\" xmlns:palaceproperties=\"{}\" \
         xmlns:opensearch=\"{}\"",
        ns::ATOM,
        ns::OPDS,
        ns::DCTERMS,
        ns::SCHEMA,
        ns::BIB_SCHEMA,
        ns::SIMPLIFIED,
        ns::BIBFRAME,
        ns::DRM,
        ns::LCP,
        ns::OPF,
        ns::PALACE_PROPS,
        ns::OPENSEARCH,
    )
}

fn text_element(out: &mut String, name: &str, text: &str) {
    let _ = write!(out, "<{name}>{}</{name}>", escape(text));
}

/// Recursive, blind serialization of a generic node.
fn node_element(out: &mut String, tag: &str, node: &FeedEntryNode) {
    let name = tag_name(tag);
    let mut attrs = String::new();
    let mut children = String::new();
    for (attr, value) in node.attributes() {
        match value {
            FeedValue::Scalar(scalar) => {
                let _ = write!(attrs, " {}=\"{}\"", attr_name(attr), escape(scalar));
            }
            FeedValue::Node(child) => node_element(&mut children, attr, child),
            FeedValue::List(items) => {
                for item in items {
                    node_element(&mut children, attr, item);
                }
            }
        }
    }
    if node.text.is_none() && children.is_empty() {
        let _ = write!(out, "<{name}{attrs}/>");
    } else {
        let _ = write!(out, "<{name}{attrs}>");
        if let Some(text) = &node.text {
            out.push_str(&escape(text));
        }
        out.push_str(&children);
        let _ = write!(out, "</{name}>");
    }
}

fn link_element(out: &mut String, link: &Link) {
    let mut attrs = String::new();
    for (name, value) in link.link_attribs() {
        let _ = write!(attrs, " {name}=\"{}\"", escape(value));
    }
    if let Some(group) = &link.facet_group {
        let _ = write!(attrs, " opds:facetGroup=\"{}\"", escape(group));
        if link.active_facet {
            attrs.push_str(" opds:activeFacet=\"true\"");
        }
        if link.default_facet {
            attrs.push_str(" palaceproperties:default=\"true\"");
        }
        if let Some(group_type) = &link.facet_group_type {
            let _ = write!(attrs, " simplified:facetGroupType=\"{}\"", escape(group_type));
        }
    }
    let _ = write!(out, "<link{attrs}/>");
}

fn author_element(out: &mut String, tag: &str, author: &Author) {
    let mut attrs = String::new();
    if let Some(role) = &author.role {
        let _ = write!(attrs, " opf:role=\"{}\"", escape(role));
    }
    let _ = write!(out, "<{tag}{attrs}>");
    // An empty name is deliberate: it avoids implying the book was
    // written by whoever wrote the feed.
    text_element(out, author_tag_name("name"), &author.name);
    if let Some(link) = &author.link {
        link_element(out, link);
    }
    if let Some(sort_name) = &author.sort_name {
        text_element(out, author_tag_name("sort_name"), sort_name);
    }
    if let Some(wikipedia_name) = &author.wikipedia_name {
        text_element(out, author_tag_name("wikipedia_name"), wikipedia_name);
    }
    if let Some(viaf) = &author.viaf {
        text_element(out, "sameas", viaf);
    }
    if let Some(lc) = &author.lc {
        text_element(out, "sameas", lc);
    }
    let _ = write!(out, "</{tag}>");
}

fn indirect_element(out: &mut String, indirect: &IndirectAcquisition) {
    let name = tag_name("indirectAcquisition");
    let _ = write!(out, "<{name} type=\"{}\"", escape(&indirect.media_type));
    if indirect.children.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        for child in &indirect.children {
            indirect_element(out, child);
        }
        let _ = write!(out, "</{name}>");
    }
}

/// An acquisition `<link>`, with its circulation children in fixed
/// order: indirect acquisitions, availability, holds, copies, hashed
/// passphrase, licensor.
fn acquisition_element(out: &mut String, acquisition: &Acquisition) {
    let element = if acquisition.templated {
        "simplified:link-template"
    } else {
        "link"
    };
    let mut attrs = String::new();
    for (name, value) in acquisition.link.link_attribs() {
        let _ = write!(attrs, " {name}=\"{}\"", escape(value));
    }
    if let Some(rights) = &acquisition.rights {
        let _ = write!(attrs, " dcterms:rights=\"{}\"", escape(rights));
    }
    let _ = write!(out, "<{element}{attrs}>");

    for indirect in &acquisition.indirect_acquisitions {
        indirect_element(out, indirect);
    }

    if let Some(status) = acquisition.availability_status {
        let mut avail = format!(
            "<{} status=\"{}\"",
            tag_name("availability"),
            status.as_str()
        );
        if let Some(since) = &acquisition.availability_since {
            let _ = write!(avail, " since=\"{}\"", rfc3339(since));
        }
        if let Some(until) = &acquisition.availability_until {
            let _ = write!(avail, " until=\"{}\"", rfc3339(until));
        }
        avail.push_str("/>");
        out.push_str(&avail);
    }

    if let Some(total) = acquisition.holds_total {
        let mut holds = format!("<{} total=\"{total}\"", tag_name("holds"));
        if let Some(position) = acquisition.holds_position {
            let _ = write!(holds, " position=\"{position}\"");
        }
        holds.push_str("/>");
        out.push_str(&holds);
    }

    if let Some(total) = acquisition.copies_total {
        let mut copies = format!("<{} total=\"{total}\"", tag_name("copies"));
        if let Some(available) = acquisition.copies_available {
            let _ = write!(copies, " available=\"{available}\"");
        }
        copies.push_str("/>");
        out.push_str(&copies);
    }

    if let Some(passphrase) = &acquisition.lcp_hashed_passphrase {
        text_element(out, tag_name("hashed_passphrase"), passphrase);
    }

    if let Some(licensor) = &acquisition.drm_licensor {
        node_element(out, "licensor", licensor);
    }

    let _ = write!(out, "</{element}>");
}

fn message_element(out: &mut String, message: &OpdsMessage, with_ns: bool) {
    let decls = if with_ns { ns_decls() } else { String::new() };
    let _ = write!(out, "<simplified:message{decls}>");
    text_element(out, "id", &message.urn);
    text_element(out, "simplified:status_code", &message.status.to_string());
    text_element(out, "schema:description", &message.message);
    out.push_str("</simplified:message>");
}

/// The OPDS 1.2 Atom acquisition-feed serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Opds1Serializer;

impl Opds1Serializer {
    pub fn new() -> Opds1Serializer {
        Opds1Serializer
    }

    fn feed_metadata(&self, out: &mut String, metadata: &FeedMetadata) {
        // Compulsory title.
        text_element(out, "title", metadata.title.as_deref().unwrap_or(""));
        if let Some(id) = &metadata.id {
            text_element(out, "id", id);
        }
        if let Some(updated) = &metadata.updated {
            text_element(out, "updated", &rfc3339(updated));
        }
        if let Some(per_page) = metadata.items_per_page {
            text_element(out, "opensearch:itemsPerPage", &per_page.to_string());
        }
        if let Some(patron) = &metadata.patron {
            node_element(out, "patron", patron);
        }
        if let Some(licensor) = &metadata.drm_licensor {
            node_element(out, "licensor", licensor);
        }
        if let Some(passphrase) = &metadata.lcp_hashed_passphrase {
            text_element(out, tag_name("hashed_passphrase"), passphrase);
        }
    }

    fn work_entry(&self, out: &mut String, entry: &WorkEntryData, with_ns: bool) {
        let mut attrs = if with_ns { ns_decls() } else { String::new() };
        if let Some(additional_type) = &entry.additional_type {
            let _ = write!(
                attrs,
                " schema:additionalType=\"{}\"",
                escape(additional_type)
            );
        }
        let _ = write!(out, "<entry{attrs}>");

        if let Some(title) = &entry.title {
            text_element(out, "title", title);
        }
        if let Some(subtitle) = &entry.subtitle {
            text_element(out, "schema:alternativeHeadline", subtitle);
        }
        if let Some(duration) = entry.duration {
            text_element(out, "dcterms:duration", &duration.to_string());
        }
        if let Some(summary) = &entry.summary {
            let _ = write!(out, "<summary type=\"html\">{}</summary>", escape(summary));
        }
        if let Some(pwid) = &entry.pwid {
            text_element(out, "simplified:pwid", pwid);
        }
        if let Some(language) = &entry.language {
            text_element(out, "dcterms:language", language);
        }
        if let Some(publisher) = &entry.publisher {
            text_element(out, "dcterms:publisher", publisher);
        }
        if let Some(imprint) = &entry.imprint {
            text_element(out, "bib:publisherImprint", imprint);
        }
        // dcterms:issued is the date the book came out; atom:published
        // below is the date it entered this collection.
        if let Some(issued) = &entry.issued {
            text_element(out, "dcterms:issued", &date_only(issued));
        }
        if let Some(identifier) = &entry.identifier {
            text_element(out, "id", identifier);
        }
        if let Some(provider) = &entry.distribution {
            let _ = write!(
                out,
                "<bibframe:distribution bibframe:ProviderName=\"{}\"/>",
                escape(provider)
            );
        }
        if let Some(published) = &entry.published {
            text_element(out, "published", &rfc3339(published));
        }
        if let Some(updated) = &entry.updated {
            text_element(out, "updated", &rfc3339(updated));
        }
        if let Some(series) = &entry.series {
            self.series_entry(out, series);
        }
        for category in &entry.categories {
            let mut attrs = format!(
                " scheme=\"{}\" term=\"{}\" label=\"{}\"",
                escape(&category.scheme),
                escape(&category.term),
                escape(&category.label)
            );
            if let Some(rating_value) = &category.rating_value {
                let _ = write!(attrs, " schema:ratingValue=\"{}\"", escape(rating_value));
            }
            let _ = write!(out, "<category{attrs}/>");
        }
        for rating in &entry.ratings {
            let mut attrs = format!(" schema:ratingValue=\"{}\"", escape(&rating.value));
            if let Some(additional_type) = &rating.additional_type {
                let _ = write!(attrs, " additionalType=\"{}\"", escape(additional_type));
            }
            let _ = write!(out, "<Rating{attrs}/>");
        }
        for author in &entry.authors {
            author_element(out, "author", author);
        }
        for contributor in &entry.contributors {
            author_element(out, "contributor", contributor);
        }
        for link in &entry.image_links {
            link_element(out, link);
        }
        for acquisition in &entry.acquisition_links {
            acquisition_element(out, acquisition);
        }
        for link in &entry.other_links {
            link_element(out, link);
        }
        out.push_str("</entry>");
    }

    // A series statement renders its name as an attribute and its
    // position and link as children.
    fn series_entry(&self, out: &mut String, series: &FeedEntryNode) {
        let name = tag_name("series");
        let mut attrs = String::new();
        if let Some(series_name) = series.get_scalar("name") {
            let _ = write!(attrs, " name=\"{}\"", escape(series_name));
        }
        let mut children = String::new();
        if let Some(position) = series.get_scalar("position") {
            text_element(&mut children, "position", position);
        }
        if let Some(FeedValue::Node(link)) = series.get("link") {
            node_element(&mut children, "link", link);
        }
        if children.is_empty() {
            let _ = write!(out, "<{name}{attrs}/>");
        } else {
            let _ = write!(out, "<{name}{attrs}>{children}</{name}>");
        }
    }

    fn data_entry(&self, out: &mut String, entry: &DataEntry) {
        out.push_str("<entry>");
        if let Some(title) = &entry.title {
            text_element(out, "title", title);
        }
        if let Some(id) = &entry.id {
            text_element(out, "id", id);
        }
        for link in &entry.links {
            link_element(out, link);
        }
        out.push_str("</entry>");
    }
}

impl Serializer for Opds1Serializer {
    fn serialize_feed(&self, feed: &FeedData, messages: &[OpdsMessage]) -> Result<Vec<u8>> {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        let mut attrs = ns_decls();
        if let Some(entrypoint) = &feed.entrypoint {
            let _ = write!(attrs, " simplified:entrypoint=\"{}\"", escape(entrypoint));
        }
        let _ = write!(out, "<feed{attrs}>");

        self.feed_metadata(&mut out, &feed.metadata);

        for entry in &feed.entries {
            if let Some(computed) = &entry.computed {
                self.work_entry(&mut out, computed, false);
            }
        }
        for data_entry in &feed.data_entries {
            self.data_entry(&mut out, data_entry);
        }
        for message in messages {
            message_element(&mut out, message, false);
        }
        for link in &feed.links {
            link_element(&mut out, link);
        }
        if !feed.breadcrumbs.is_empty() {
            out.push_str("<simplified:breadcrumbs>");
            for link in &feed.breadcrumbs {
                link_element(&mut out, link);
            }
            out.push_str("</simplified:breadcrumbs>");
        }
        for link in &feed.facet_links {
            link_element(&mut out, link);
        }

        out.push_str("</feed>");
        Ok(out.into_bytes())
    }

    fn serialize_work_entry(&self, entry: &WorkEntryData) -> Result<Vec<u8>> {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        self.work_entry(&mut out, entry, true);
        Ok(out.into_bytes())
    }

    fn serialize_opds_message(&self, message: &OpdsMessage) -> Result<Vec<u8>> {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        message_element(&mut out, message, true);
        Ok(out.into_bytes())
    }

    fn content_type(&self) -> &'static str {
        mediatype::ACQUISITION_FEED
    }
}
