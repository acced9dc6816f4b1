//! OPDS namespace URIs, link relations, and media type constants.
//!
//! These are shared between the annotator (which decides which rels to
//! emit) and the serializers (which decide how to spell them on the wire).

/// XML namespaces used by the OPDS 1 (Atom) serializer.
pub mod ns {
    pub const ATOM: &str = "http://www.w3.org/2005/Atom";
    pub const OPDS: &str = "http://opds-spec.org/2010/catalog";
    pub const DCTERMS: &str = "http://purl.org/dc/terms/";
    pub const SCHEMA: &str = "http://schema.org/";
    pub const BIB_SCHEMA: &str = "http://bib.schema.org/";
    pub const SIMPLIFIED: &str = "http://librarysimplified.org/terms/";
    pub const BIBFRAME: &str = "http://bibframe.org/vocab/";
    pub const DRM: &str = "http://librarysimplified.org/terms/drm";
    pub const LCP: &str = "http://readium.org/lcp-specs/ns";
    pub const OPF: &str = "http://www.idpf.org/2007/opf";
    pub const PALACE_PROPS: &str = "http://palaceproject.io/terms/properties/";
    pub const OPENSEARCH: &str = "http://a9.com/-/spec/opensearch/1.1/";
}

/// Link relations.
pub mod rel {
    pub const ACQUISITION: &str = "http://opds-spec.org/acquisition";
    pub const BORROW: &str = "http://opds-spec.org/acquisition/borrow";
    pub const OPEN_ACCESS: &str = "http://opds-spec.org/acquisition/open-access";
    pub const REVOKE_LOAN: &str = "http://librarysimplified.org/terms/rel/revoke";
    pub const FACET: &str = "http://opds-spec.org/facet";
    pub const GROUP: &str = "collection";
    pub const ENTRYPOINT: &str = "http://librarysimplified.org/terms/rel/entrypoint";
    pub const SHELF: &str = "http://opds-spec.org/shelf";
    pub const AUTH_DOCUMENT: &str = "http://opds-spec.org/auth/document";
    pub const IMAGE: &str = "http://opds-spec.org/image";
    pub const THUMBNAIL: &str = "http://opds-spec.org/image/thumbnail";
    pub const START: &str = "start";
    pub const BREADCRUMB: &str = "http://librarysimplified.org/terms/rel/breadcrumb";
}

/// Media types for the two wire formats and for intermediate OPDS entries.
pub mod mediatype {
    /// Format A: an OPDS 1 acquisition feed.
    pub const ACQUISITION_FEED: &str =
        "application/atom+xml;profile=opds-catalog;kind=acquisition";
    /// A single OPDS 1 entry, also used as the first layer of a
    /// streaming indirect-acquisition chain.
    pub const ENTRY: &str = "application/atom+xml;type=entry;profile=opds-catalog";
    /// Format B: an OPDS 2 publication-manifest feed.
    pub const OPDS2_FEED: &str = "application/opds+json";

    pub const EPUB: &str = "application/epub+zip";
    pub const LCP_DRM: &str = "application/vnd.readium.lcp.license.v1.0+json";
    pub const ADOBE_DRM: &str = "application/vnd.adobe.adept+xml";
}

/// Classification scheme URIs used for category tags.
pub mod scheme {
    pub const FICTION_STATUS: &str = "http://librarysimplified.org/terms/fiction/";
    pub const GENRE: &str = "http://librarysimplified.org/terms/genres/Simplified/";
    pub const APPEALS: &str = "http://librarysimplified.org/terms/appeals/";
    pub const AUDIENCE: &str = "http://schema.org/audience";
    pub const AGE_RANGE: &str = "http://schema.org/typicalAgeRange";
    pub const QUALITY: &str = "http://librarysimplified.org/terms/rel/quality";
}

/// Placeholder title for editions with no title metadata.
pub const NO_TITLE: &str = "[Unknown Title]";
