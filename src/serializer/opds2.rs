//! OPDS 2 (JSON) serialization.
//!
//! The document is assembled as `serde_json` values with null keys never
//! inserted, so the output needs no pruning pass. Per-patron XML
//! extension blocks that have no OPDS 2 equivalent (the feed-level
//! patron block, breadcrumbs, the entrypoint marker) are simply not
//! rendered here.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};

use crate::error::Result;
use crate::feed::{
    Acquisition, Author, FeedData, FeedEntryNode, FeedValue, IndirectAcquisition, Link,
    OpdsMessage, WorkEntryData,
};
use crate::opds::mediatype;

use super::Serializer;

/// MARC relator code to OPDS 2 contributor property.
fn role_property(role: Option<&str>) -> &'static str {
    match role {
        None | Some("aut") => "author",
        Some("trl") => "translator",
        Some("edt") => "editor",
        Some("art") => "artist",
        Some("ill") => "illustrator",
        Some("ltr") => "letterer",
        Some("pen") => "penciler",
        Some("clr") => "colorist",
        Some("ink") => "inker",
        Some("nrt") => "narrator",
        Some(_) => "contributor",
    }
}

fn rfc3339(value: &DateTime<Utc>) -> Value {
    Value::from(value.to_rfc3339_opts(SecondsFormat::Secs, true))
}

fn set(map: &mut Map<String, Value>, key: &str, value: Value) {
    if !value.is_null() {
        map.insert(key.to_string(), value);
    }
}

fn set_opt(map: &mut Map<String, Value>, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        map.insert(key.to_string(), Value::from(value));
    }
}

fn link_object(link: &Link) -> Value {
    let mut object = Map::new();
    set(&mut object, "href", Value::from(link.href.as_str()));
    set_opt(&mut object, "rel", link.rel.as_deref());
    set_opt(&mut object, "type", link.media_type.as_deref());
    set_opt(&mut object, "title", link.title.as_deref());
    Value::Object(object)
}

fn contributor_object(author: &Author) -> Value {
    let mut object = Map::new();
    set(&mut object, "name", Value::from(author.name.as_str()));
    set_opt(&mut object, "sortAs", author.sort_name.as_deref());
    if let Some(link) = &author.link {
        set(&mut object, "links", json!([link_object(link)]));
    }
    Value::Object(object)
}

fn indirect_object(indirect: &IndirectAcquisition) -> Value {
    let mut object = Map::new();
    set(
        &mut object,
        "type",
        Value::from(indirect.media_type.as_str()),
    );
    if !indirect.children.is_empty() {
        let children: Vec<Value> = indirect.children.iter().map(indirect_object).collect();
        set(&mut object, "child", Value::from(children));
    }
    Value::Object(object)
}

/// Generic node to JSON: scalar attributes become string fields,
/// text-only child nodes become strings, anything else recurses.
fn node_object(node: &FeedEntryNode) -> Value {
    let mut object = Map::new();
    for (name, value) in node.attributes() {
        let rendered = match value {
            FeedValue::Scalar(scalar) => Value::from(scalar.as_str()),
            FeedValue::Node(child) => match (&child.text, child.attributes().count()) {
                (Some(text), 0) => Value::from(text.as_str()),
                _ => node_object(child),
            },
            FeedValue::List(items) => Value::from(items.iter().map(node_object).collect::<Vec<_>>()),
        };
        object.insert(name.to_string(), rendered);
    }
    Value::Object(object)
}

fn acquisition_object(acquisition: &Acquisition) -> Value {
    let mut object = Map::new();
    set(
        &mut object,
        "href",
        Value::from(acquisition.link.href.as_str()),
    );
    set_opt(&mut object, "rel", acquisition.link.rel.as_deref());
    set_opt(&mut object, "type", acquisition.link.media_type.as_deref());
    if acquisition.templated {
        set(&mut object, "templated", Value::Bool(true));
    }

    let mut properties = Map::new();
    if let Some(status) = acquisition.availability_status {
        let mut availability = Map::new();
        set(&mut availability, "state", Value::from(status.as_str()));
        if let Some(since) = &acquisition.availability_since {
            set(&mut availability, "since", rfc3339(since));
        }
        if let Some(until) = &acquisition.availability_until {
            set(&mut availability, "until", rfc3339(until));
        }
        set(&mut properties, "availability", Value::Object(availability));
    }
    if !acquisition.indirect_acquisitions.is_empty() {
        let chains: Vec<Value> = acquisition
            .indirect_acquisitions
            .iter()
            .map(indirect_object)
            .collect();
        set(&mut properties, "indirectAcquisition", Value::from(chains));
    }
    if let Some(total) = acquisition.holds_total {
        let mut holds = Map::new();
        set(&mut holds, "total", Value::from(total));
        if let Some(position) = acquisition.holds_position {
            set(&mut holds, "position", Value::from(position));
        }
        set(&mut properties, "holds", Value::Object(holds));
    }
    if let Some(total) = acquisition.copies_total {
        let mut copies = Map::new();
        set(&mut copies, "total", Value::from(total));
        if let Some(available) = acquisition.copies_available {
            set(&mut copies, "available", Value::from(available));
        }
        set(&mut properties, "copies", Value::Object(copies));
    }
    set_opt(
        &mut properties,
        "lcp_hashed_passphrase",
        acquisition.lcp_hashed_passphrase.as_deref(),
    );
    if let Some(licensor) = &acquisition.drm_licensor {
        set(&mut properties, "licensor", node_object(licensor));
    }
    if !properties.is_empty() {
        set(&mut object, "properties", Value::Object(properties));
    }
    Value::Object(object)
}

fn publication_metadata(entry: &WorkEntryData) -> Value {
    let mut metadata = Map::new();
    set_opt(&mut metadata, "@type", entry.additional_type.as_deref());
    set_opt(&mut metadata, "title", entry.title.as_deref());
    set_opt(&mut metadata, "subtitle", entry.subtitle.as_deref());
    set_opt(&mut metadata, "sortAs", entry.sort_title.as_deref());
    set_opt(&mut metadata, "identifier", entry.identifier.as_deref());
    set_opt(&mut metadata, "language", entry.language.as_deref());
    set_opt(&mut metadata, "publisher", entry.publisher.as_deref());
    if let Some(updated) = &entry.updated {
        set(&mut metadata, "modified", rfc3339(updated));
    }
    if let Some(issued) = &entry.issued {
        set(
            &mut metadata,
            "published",
            Value::from(issued.format("%Y-%m-%d").to_string()),
        );
    }
    if let Some(duration) = entry.duration {
        set(&mut metadata, "duration", Value::from(duration));
    }
    set_opt(&mut metadata, "description", entry.summary.as_deref());

    if let Some(series) = &entry.series {
        let mut belongs = Map::new();
        if let Some(name) = series.get_scalar("name") {
            set(&mut belongs, "name", Value::from(name));
        }
        if let Some(position) = series.get_scalar("position") {
            if let Ok(parsed) = position.parse::<i64>() {
                set(&mut belongs, "position", Value::from(parsed));
            }
        }
        if !belongs.is_empty() {
            set(
                &mut metadata,
                "belongsTo",
                json!({ "series": Value::Object(belongs) }),
            );
        }
    }

    if !entry.categories.is_empty() {
        let subjects: Vec<Value> = entry
            .categories
            .iter()
            .map(|category| {
                let mut subject = Map::new();
                set(&mut subject, "scheme", Value::from(category.scheme.as_str()));
                set(&mut subject, "code", Value::from(category.term.as_str()));
                set(&mut subject, "name", Value::from(category.label.as_str()));
                Value::Object(subject)
            })
            .collect();
        set(&mut metadata, "subject", Value::from(subjects));
    }

    for (credits, default_role) in [
        (&entry.authors, Some("aut")),
        (&entry.contributors, Some("ctb")),
    ] {
        for credit in credits.iter() {
            if credit.name.is_empty() {
                continue;
            }
            let property = role_property(credit.role.as_deref().or(default_role));
            let contributor = contributor_object(credit);
            match metadata.get_mut(property) {
                Some(Value::Array(existing)) => existing.push(contributor),
                Some(single) => {
                    let first = single.take();
                    *single = Value::from(vec![first, contributor]);
                }
                None => {
                    metadata.insert(property.to_string(), contributor);
                }
            }
        }
    }

    Value::Object(metadata)
}

fn publication_object(entry: &WorkEntryData) -> Value {
    let mut publication = Map::new();
    set(&mut publication, "metadata", publication_metadata(entry));

    let mut links: Vec<Value> = Vec::new();
    for acquisition in &entry.acquisition_links {
        links.push(acquisition_object(acquisition));
    }
    for link in &entry.other_links {
        links.push(link_object(link));
    }
    set(&mut publication, "links", Value::from(links));

    if !entry.image_links.is_empty() {
        let images: Vec<Value> = entry.image_links.iter().map(link_object).collect();
        set(&mut publication, "images", Value::from(images));
    }
    Value::Object(publication)
}

fn message_object(message: &OpdsMessage) -> Value {
    json!({
        "identifier": message.urn,
        "status": message.status,
        "description": message.message,
    })
}

/// The OPDS 2 publication-manifest serializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Opds2Serializer;

impl Opds2Serializer {
    pub fn new() -> Opds2Serializer {
        Opds2Serializer
    }

    /// Facet links grouped by facet-group title, first-seen order.
    fn facet_groups(&self, feed: &FeedData) -> Vec<Value> {
        let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
        for link in &feed.facet_links {
            let Some(group) = &link.facet_group else {
                continue;
            };
            let rendered = link_object(link);
            match groups.iter_mut().find(|(name, _)| name == group) {
                Some((_, links)) => links.push(rendered),
                None => groups.push((group.clone(), vec![rendered])),
            }
        }
        groups
            .into_iter()
            .map(|(title, links)| {
                json!({
                    "metadata": { "title": title },
                    "links": links,
                })
            })
            .collect()
    }
}

impl Serializer for Opds2Serializer {
    fn serialize_feed(&self, feed: &FeedData, messages: &[OpdsMessage]) -> Result<Vec<u8>> {
        let mut document = Map::new();

        let mut metadata = Map::new();
        set_opt(&mut metadata, "title", feed.metadata.title.as_deref());
        set_opt(&mut metadata, "identifier", feed.metadata.id.as_deref());
        if let Some(updated) = &feed.metadata.updated {
            set(&mut metadata, "modified", rfc3339(updated));
        }
        if let Some(per_page) = feed.metadata.items_per_page {
            set(&mut metadata, "itemsPerPage", Value::from(per_page));
        }
        set(&mut document, "metadata", Value::Object(metadata));

        let links: Vec<Value> = feed.links.iter().map(link_object).collect();
        set(&mut document, "links", Value::from(links));

        let facets = self.facet_groups(feed);
        if !facets.is_empty() {
            set(&mut document, "facets", Value::from(facets));
        }

        let publications: Vec<Value> = feed
            .entries
            .iter()
            .filter_map(|entry| entry.computed.as_ref())
            .map(publication_object)
            .collect();
        set(&mut document, "publications", Value::from(publications));

        if !feed.data_entries.is_empty() {
            let navigation: Vec<Value> = feed
                .data_entries
                .iter()
                .flat_map(|entry| {
                    entry.links.iter().map(|link| {
                        let mut object = link_object(link);
                        if let (Value::Object(map), Some(title)) = (&mut object, &entry.title) {
                            set_opt(map, "title", Some(title));
                        }
                        object
                    })
                })
                .collect();
            set(&mut document, "navigation", Value::from(navigation));
        }

        if !messages.is_empty() {
            let rendered: Vec<Value> = messages.iter().map(message_object).collect();
            set(&mut document, "messages", Value::from(rendered));
        }

        Ok(serde_json::to_vec(&Value::Object(document))?)
    }

    fn serialize_work_entry(&self, entry: &WorkEntryData) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&publication_object(entry))?)
    }

    fn serialize_opds_message(&self, message: &OpdsMessage) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&message_object(message))?)
    }

    fn content_type(&self) -> &'static str {
        mediatype::OPDS2_FEED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{AvailabilityStatus, Category, FeedMetadata};
    use crate::opds::rel;

    fn parse(bytes: Vec<u8>) -> Value {
        serde_json::from_slice(&bytes).unwrap()
    }

    fn sample_entry() -> WorkEntryData {
        WorkEntryData {
            identifier: Some("urn:isbn:123".to_string()),
            additional_type: Some("http://schema.org/EBook".to_string()),
            title: Some("A Study in Scarlet".to_string()),
            sort_title: Some("Study in Scarlet, A".to_string()),
            language: Some("eng".to_string()),
            summary: Some("<p>Classic.</p>".to_string()),
            authors: vec![Author {
                name: "Arthur Conan Doyle".to_string(),
                sort_name: Some("Doyle, Arthur Conan".to_string()),
                ..Author::default()
            }],
            contributors: vec![
                Author {
                    name: "Jane Reader".to_string(),
                    role: Some("nrt".to_string()),
                    ..Author::default()
                },
                Author {
                    name: "Someone Else".to_string(),
                    role: Some("xyz".to_string()),
                    ..Author::default()
                },
            ],
            categories: vec![Category {
                scheme: "http://librarysimplified.org/terms/genres/Simplified/".to_string(),
                term: "http://librarysimplified.org/terms/genres/Simplified/Mystery".to_string(),
                label: "Mystery".to_string(),
                rating_value: None,
            }],
            series: Some(
                FeedEntryNode::new()
                    .scalar("name", "Sherlock Holmes")
                    .scalar("position", "1"),
            ),
            ..WorkEntryData::default()
        }
    }

    #[test]
    fn test_publication_metadata_routing() {
        let serializer = Opds2Serializer::new();
        let parsed = parse(serializer.serialize_work_entry(&sample_entry()).unwrap());
        let metadata = &parsed["metadata"];
        assert_eq!(metadata["@type"], "http://schema.org/EBook");
        assert_eq!(metadata["title"], "A Study in Scarlet");
        assert_eq!(metadata["sortAs"], "Study in Scarlet, A");
        assert_eq!(metadata["identifier"], "urn:isbn:123");
        assert_eq!(metadata["author"]["name"], "Arthur Conan Doyle");
        assert_eq!(metadata["author"]["sortAs"], "Doyle, Arthur Conan");
        assert_eq!(metadata["narrator"]["name"], "Jane Reader");
        assert_eq!(metadata["contributor"]["name"], "Someone Else");
        assert_eq!(metadata["belongsTo"]["series"]["name"], "Sherlock Holmes");
        assert_eq!(metadata["belongsTo"]["series"]["position"], 1);
        assert_eq!(metadata["subject"][0]["name"], "Mystery");
        // Absent fields stay absent rather than serializing as null.
        assert!(metadata.get("publisher").is_none());
    }

    #[test]
    fn test_repeated_role_collects_into_array() {
        let mut entry = sample_entry();
        entry.authors.push(Author::named("A Co-Author"));
        let serializer = Opds2Serializer::new();
        let parsed = parse(serializer.serialize_work_entry(&entry).unwrap());
        let authors = parsed["metadata"]["author"].as_array().unwrap();
        assert_eq!(authors.len(), 2);
        assert_eq!(authors[1]["name"], "A Co-Author");
    }

    #[test]
    fn test_acquisition_link_properties() {
        let mut acquisition = Acquisition::new("http://test/borrow", rel::BORROW);
        acquisition.availability_status = Some(AvailabilityStatus::Reserved);
        acquisition.holds_total = Some(7);
        acquisition.holds_position = Some(3);
        acquisition.copies_total = Some(2);
        acquisition.copies_available = Some(0);
        acquisition.lcp_hashed_passphrase = Some("abc123".to_string());
        acquisition.drm_licensor = Some(
            FeedEntryNode::new()
                .scalar("vendor", "VENDOR")
                .child("clientToken", FeedEntryNode::with_text("TOKEN")),
        );
        acquisition.indirect_acquisitions =
            vec![IndirectAcquisition::chain(&[
                mediatype::ADOBE_DRM.to_string(),
                mediatype::EPUB.to_string(),
            ])
            .unwrap()];

        let object = acquisition_object(&acquisition);
        let properties = &object["properties"];
        assert_eq!(properties["availability"]["state"], "reserved");
        assert_eq!(properties["holds"]["total"], 7);
        assert_eq!(properties["holds"]["position"], 3);
        assert_eq!(properties["copies"]["total"], 2);
        assert_eq!(properties["copies"]["available"], 0);
        assert_eq!(properties["lcp_hashed_passphrase"], "abc123");
        assert_eq!(properties["licensor"]["vendor"], "VENDOR");
        assert_eq!(properties["licensor"]["clientToken"], "TOKEN");
        let chain = &properties["indirectAcquisition"][0];
        assert_eq!(chain["type"], "application/vnd.adobe.adept+xml");
        assert_eq!(chain["child"][0]["type"], "application/epub+zip");
    }

    #[test]
    fn test_templated_link() {
        let mut acquisition = Acquisition::new("http://test/fulfill/{id}", rel::ACQUISITION);
        acquisition.templated = true;
        let object = acquisition_object(&acquisition);
        assert_eq!(object["templated"], true);
    }

    #[test]
    fn test_facets_grouped_by_title() {
        let mut feed = FeedData::new();
        feed.metadata = FeedMetadata {
            title: Some("All Books".to_string()),
            ..FeedMetadata::default()
        };
        for (href, group) in [
            ("http://test/?order=title", "Sort by"),
            ("http://test/?order=author", "Sort by"),
            ("http://test/?available=now", "Availability"),
        ] {
            let mut link = Link::new(href, rel::FACET);
            link.facet_group = Some(group.to_string());
            feed.facet_links.push(link);
        }
        let serializer = Opds2Serializer::new();
        let parsed = parse(serializer.serialize_feed(&feed, &[]).unwrap());
        let facets = parsed["facets"].as_array().unwrap();
        assert_eq!(facets.len(), 2);
        assert_eq!(facets[0]["metadata"]["title"], "Sort by");
        assert_eq!(facets[0]["links"].as_array().unwrap().len(), 2);
        assert_eq!(facets[1]["metadata"]["title"], "Availability");
    }

    #[test]
    fn test_message_serialization() {
        let serializer = Opds2Serializer::new();
        let message = OpdsMessage::new("urn:isbn:123", 404, "Identifier not found in collection");
        let parsed = parse(serializer.serialize_opds_message(&message).unwrap());
        assert_eq!(parsed["identifier"], "urn:isbn:123");
        assert_eq!(parsed["status"], 404);
        assert_eq!(parsed["description"], "Identifier not found in collection");
    }
}
