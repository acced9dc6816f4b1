//! Format equivalence tests.
//!
//! The same feed rendered as OPDS 1 and OPDS 2 must carry the same
//! logical facts: the XML is parsed back with quick-xml and compared
//! field by field against the JSON document.

use opdsgen::{
    AcquisitionFeed, Annotator, CatalogRecord, CirculationContext, DefaultCapabilities,
    DeliveryMechanism, Edition, FacetState, Identifier, LicensePool, Opds1Serializer,
    Opds2Serializer, Pagination, Serializer, Work,
};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde_json::Value;

struct TestUrls;

impl opdsgen::UrlBuilder for TestUrls {
    fn permalink_url(&self, identifier: &Identifier) -> String {
        format!("http://test/works/{}", identifier.urn)
    }

    fn borrow_url(&self, identifier: &Identifier, _mechanism: Option<u32>) -> String {
        format!("http://test/borrow/{}", identifier.urn)
    }

    fn fulfill_url(&self, pool: &LicensePool, mechanism: &DeliveryMechanism) -> String {
        format!("http://test/fulfill/{}/{}", pool.id, mechanism.id)
    }

    fn revoke_url(&self, pool: &LicensePool) -> String {
        format!("http://test/revoke/{}", pool.id)
    }
}

fn record(urn: &str, title: &str, owned: u32, available: u32) -> CatalogRecord {
    CatalogRecord {
        work: Work::default(),
        edition: Some(Edition {
            title: Some(title.to_string()),
            language_code: Some("eng".to_string()),
            ..Edition::default()
        }),
        identifier: Some(Identifier::new(urn)),
        license_pool: Some(LicensePool {
            id: 1,
            licenses_owned: owned,
            licenses_available: available,
            delivery_mechanisms: vec![DeliveryMechanism {
                id: 1,
                content_type: Some("application/epub+zip".to_string()),
                ..DeliveryMechanism::default()
            }],
            ..LicensePool::default()
        }),
    }
}

fn sample_feed() -> AcquisitionFeed {
    let urls = TestUrls;
    let annotator = Annotator::new(&urls, &DefaultCapabilities, CirculationContext::new());
    let pagination = Pagination::new(0, 10).unwrap().with_total(3);
    AcquisitionFeed::page(
        "Fiction",
        "http://test/feed",
        vec![
            record("urn:isbn:1", "First Book", 100, 50),
            record("urn:isbn:2", "Second Book", 3, 0),
            CatalogRecord {
                edition: None,
                ..record("urn:isbn:3", "", 1, 1)
            },
        ],
        &annotator,
        &pagination,
        &FacetState::default(),
        Vec::new(),
    )
}

fn attr(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// The logical facts both serializers must agree on.
#[derive(Debug, Default, PartialEq)]
struct Facts {
    titles: Vec<String>,
    identifiers: Vec<String>,
    borrow_hrefs: Vec<String>,
    copies_totals: Vec<String>,
    availability_states: Vec<String>,
    message_urns: Vec<String>,
}

fn facts_from_xml(xml: &str) -> Facts {
    let mut facts = Facts::default();
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut text_target: Option<&'static str> = None;

    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                let parent = path.last().map(|p| p.as_slice());
                let in_entry = parent == Some(b"entry".as_slice());
                let in_feed = parent == Some(b"feed".as_slice());
                let in_message = parent == Some(b"simplified:message".as_slice());
                // The feed-level <title> and <id> are captured too and
                // stripped by the caller.
                match name.as_slice() {
                    b"title" if in_entry || in_feed => text_target = Some("title"),
                    b"id" if in_entry || in_feed => text_target = Some("id"),
                    b"id" if in_message => text_target = Some("message_urn"),
                    b"link" if in_entry => {
                        if attr(&e, b"rel").as_deref()
                            == Some("http://opds-spec.org/acquisition/borrow")
                        {
                            facts.borrow_hrefs.extend(attr(&e, b"href"));
                        }
                    }
                    _ => {}
                }
                path.push(name);
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"opds:copies" => facts.copies_totals.extend(attr(&e, b"total")),
                b"opds:availability" => {
                    facts.availability_states.extend(attr(&e, b"status"))
                }
                _ => {}
            },
            Event::Text(t) => {
                let text = t.xml_content().unwrap().into_owned();
                match text_target.take() {
                    Some("title") => facts.titles.push(text),
                    Some("id") => facts.identifiers.push(text),
                    Some("message_urn") => facts.message_urns.push(text),
                    _ => {}
                }
            }
            Event::End(_) => {
                path.pop();
                text_target = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    facts
}

fn facts_from_json(json: &Value) -> Facts {
    let mut facts = Facts::default();
    for publication in json["publications"].as_array().unwrap() {
        let metadata = &publication["metadata"];
        facts
            .titles
            .push(metadata["title"].as_str().unwrap().to_string());
        facts
            .identifiers
            .push(metadata["identifier"].as_str().unwrap().to_string());
        for link in publication["links"].as_array().unwrap() {
            let properties = &link["properties"];
            if link["rel"] == "http://opds-spec.org/acquisition/borrow" {
                facts
                    .borrow_hrefs
                    .push(link["href"].as_str().unwrap().to_string());
            }
            if let Some(total) = properties["copies"]["total"].as_u64() {
                facts.copies_totals.push(total.to_string());
            }
            if let Some(state) = properties["availability"]["state"].as_str() {
                facts.availability_states.push(state.to_string());
            }
        }
    }
    if let Some(messages) = json["messages"].as_array() {
        for message in messages {
            facts
                .message_urns
                .push(message["identifier"].as_str().unwrap().to_string());
        }
    }
    facts
}

#[test]
fn test_both_formats_carry_the_same_facts() {
    let feed = sample_feed();
    let xml = String::from_utf8(feed.serialize(&Opds1Serializer::new()).unwrap()).unwrap();
    let json: Value =
        serde_json::from_slice(&feed.serialize(&Opds2Serializer::new()).unwrap()).unwrap();

    let mut from_xml = facts_from_xml(&xml);
    let from_json = facts_from_json(&json);

    // The XML feed has its own feed-level <title> and <id>; drop them.
    assert_eq!(from_xml.titles.remove(0), "Fiction");
    assert_eq!(from_xml.identifiers.remove(0), "http://test/feed");

    assert_eq!(from_xml, from_json);
    assert_eq!(from_xml.titles, vec!["First Book", "Second Book"]);
    assert_eq!(from_xml.identifiers, vec!["urn:isbn:1", "urn:isbn:2"]);
    assert_eq!(from_xml.borrow_hrefs.len(), 2);
    assert_eq!(from_xml.copies_totals, vec!["100", "3"]);
    assert_eq!(from_xml.availability_states, vec!["available", "unavailable"]);
    assert_eq!(from_xml.message_urns, vec!["urn:isbn:3"]);
}

#[test]
fn test_message_status_matches_across_formats() {
    let feed = sample_feed();
    let xml = String::from_utf8(feed.serialize(&Opds1Serializer::new()).unwrap()).unwrap();
    let json: Value =
        serde_json::from_slice(&feed.serialize(&Opds2Serializer::new()).unwrap()).unwrap();

    assert!(xml.contains("<simplified:status_code>403</simplified:status_code>"));
    assert_eq!(json["messages"][0]["status"], 403);
    assert_eq!(
        json["messages"][0]["description"],
        "I've heard about this work but have no metadata for it."
    );
}

#[test]
fn test_content_types_differ() {
    assert_eq!(
        Opds1Serializer::new().content_type(),
        "application/atom+xml;profile=opds-catalog;kind=acquisition"
    );
    assert_eq!(Opds2Serializer::new().content_type(), "application/opds+json");
}
