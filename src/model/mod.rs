//! Domain snapshot types.
//!
//! The feed engine does not own persistence or search; the host hands it
//! plain-data snapshots of works, editions, license pools, loans, and
//! holds. Everything here is a black box from the engine's point of
//! view: it reads fields, it never resolves or refreshes them.

pub mod roles;

use chrono::{DateTime, NaiveDate, Utc};

/// An identifier for one title, expressed as a URN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
    pub urn: String,
}

impl Identifier {
    pub fn new(urn: impl Into<String>) -> Identifier {
        Identifier { urn: urn.into() }
    }
}

/// The medium of an edition, mapped to a schema.org additional type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Medium {
    Book,
    Audio,
}

impl Medium {
    pub fn additional_type(&self) -> &'static str {
        match self {
            Medium::Book => "http://schema.org/EBook",
            Medium::Audio => "http://bib.schema.org/Audiobook",
        }
    }
}

/// One person's contribution to an edition.
#[derive(Debug, Clone, PartialEq)]
pub struct Contribution {
    pub name: String,
    pub sort_name: Option<String>,
    /// Role name, e.g. "Author", "Narrator", "Translator".
    pub role: String,
}

impl Contribution {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Contribution {
        Contribution {
            name: name.into(),
            sort_name: None,
            role: role.into(),
        }
    }
}

/// Bibliographic description of one title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Edition {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub sort_title: Option<String>,
    pub language_code: Option<String>,
    pub publisher: Option<String>,
    pub imprint: Option<String>,
    pub issued: Option<NaiveDate>,
    /// Playback duration in seconds, for audiobooks.
    pub duration: Option<f64>,
    pub permanent_work_id: Option<String>,
    pub medium: Option<Medium>,
    pub series: Option<String>,
    pub series_position: Option<i32>,
    pub contributions: Vec<Contribution>,
}

/// An appeal classification with a weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Appeal {
    pub name: String,
    pub value: f32,
}

/// Presentation-level state of one work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Work {
    /// Stable key used by the circulation context's loan/hold maps.
    pub id: u64,
    /// HTML summary.
    pub summary: Option<String>,
    pub last_update_time: Option<DateTime<Utc>>,
    pub cover_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub fiction: Option<bool>,
    pub genres: Vec<String>,
    pub appeals: Vec<Appeal>,
    pub audience: Option<String>,
    pub target_age: Option<String>,
    /// Quality score in [0, 1], rendered as a rating.
    pub quality: Option<f64>,
}

/// A (content-type, DRM-scheme) pair describing one way a title can be
/// delivered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryMechanism {
    pub id: u32,
    pub content_type: Option<String>,
    pub drm_scheme: Option<String>,
    pub is_streaming: bool,
    /// Direct download URL, for open-access resources.
    pub resource_url: Option<String>,
    pub rights_uri: Option<String>,
}

/// The circulation-availability record for one title in one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LicensePool {
    pub id: u32,
    pub open_access: bool,
    pub unlimited_access: bool,
    pub licenses_owned: u32,
    pub licenses_available: u32,
    pub patrons_in_hold_queue: u32,
    /// When the title first became available in this collection.
    pub availability_time: Option<DateTime<Utc>>,
    /// Distributor name; `None` for stand-in pools that are not actually
    /// distributing the book.
    pub data_source: Option<String>,
    pub delivery_mechanisms: Vec<DeliveryMechanism>,
}

impl LicensePool {
    pub fn mechanism(&self, id: u32) -> Option<&DeliveryMechanism> {
        self.delivery_mechanisms.iter().find(|m| m.id == id)
    }
}

/// A patron's active loan of one title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loan {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// The delivery mechanism locked in at fulfillment time, if any.
    pub locked_mechanism: Option<u32>,
}

/// A patron's active hold on one title.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hold {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    /// Queue position; 0 means the hold is ready. `None` means the
    /// vendor did not report one.
    pub position: Option<u32>,
}

/// An out-of-band fulfillment handle the patron has already obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Fulfillment {
    pub content_link: String,
    pub content_type: Option<String>,
}

/// The authenticated patron, as much of them as the feed needs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patron {
    pub username: Option<String>,
    pub authorization_identifier: Option<String>,
    /// Opaque key for per-build credential caching.
    pub cache_key: String,
}

/// One row handed to the feed builder: a work plus whatever the host
/// could resolve for it. Missing pieces degrade per the error taxonomy
/// rather than failing the feed.
#[derive(Debug, Clone)]
pub struct CatalogRecord {
    pub work: Work,
    pub edition: Option<Edition>,
    pub identifier: Option<Identifier>,
    pub license_pool: Option<LicensePool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_medium_additional_type() {
        assert_eq!(Medium::Book.additional_type(), "http://schema.org/EBook");
        assert_eq!(
            Medium::Audio.additional_type(),
            "http://bib.schema.org/Audiobook"
        );
    }

    #[test]
    fn test_pool_mechanism_lookup() {
        let pool = LicensePool {
            delivery_mechanisms: vec![
                DeliveryMechanism {
                    id: 1,
                    content_type: Some("application/epub+zip".to_string()),
                    ..DeliveryMechanism::default()
                },
                DeliveryMechanism {
                    id: 2,
                    content_type: Some("application/pdf".to_string()),
                    ..DeliveryMechanism::default()
                },
            ],
            ..LicensePool::default()
        };
        assert_eq!(
            pool.mechanism(2).and_then(|m| m.content_type.as_deref()),
            Some("application/pdf")
        );
        assert!(pool.mechanism(3).is_none());
    }
}
