//! Delivery-mechanism prioritization.
//!
//! Collections can be configured with ordered lists of preferred DRM
//! schemes and content types. The first mechanism in the prioritized
//! list is the one a client should present as the primary format.

use crate::model::DeliveryMechanism;
use crate::opds::mediatype;

/// Configured format preferences for one collection.
///
/// Prioritization is a stable sort: mechanisms the configuration says
/// nothing about keep their incoming relative order. DRM-free
/// mechanisms always sort ahead of encrypted ones, even encrypted ones
/// whose scheme is explicitly prioritized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatPriorities {
    pub prioritized_drm_schemes: Vec<String>,
    pub prioritized_content_types: Vec<String>,
    /// Content types never shown to clients at all.
    pub hidden_content_types: Vec<String>,
    /// Push LCP-encrypted non-EPUB formats (audiobooks, PDFs) to the
    /// very end of the list while leaving everything else unchanged.
    pub deprioritize_lcp_non_epub: bool,
}

impl FormatPriorities {
    /// Mechanisms that may appear in a feed at all.
    pub fn visible<'a>(
        &self,
        mechanisms: &'a [DeliveryMechanism],
    ) -> Vec<&'a DeliveryMechanism> {
        mechanisms
            .iter()
            .filter(|m| match &m.content_type {
                Some(t) => !self.hidden_content_types.iter().any(|h| h == t),
                None => true,
            })
            .collect()
    }

    /// Visible mechanisms in presentation order.
    pub fn prioritize<'a>(
        &self,
        mechanisms: &'a [DeliveryMechanism],
    ) -> Vec<&'a DeliveryMechanism> {
        let mut visible = self.visible(mechanisms);
        visible.sort_by_key(|m| {
            (
                self.is_deprioritized(m),
                self.drm_rank(m.drm_scheme.as_deref()),
                self.content_rank(m.content_type.as_deref()),
            )
        });
        visible
    }

    fn is_deprioritized(&self, mechanism: &DeliveryMechanism) -> bool {
        self.deprioritize_lcp_non_epub
            && mechanism.drm_scheme.as_deref() == Some(mediatype::LCP_DRM)
            && mechanism.content_type.as_deref() != Some(mediatype::EPUB)
    }

    fn drm_rank(&self, scheme: Option<&str>) -> usize {
        match scheme {
            // No DRM beats any DRM.
            None => 0,
            Some(scheme) => {
                1 + self
                    .prioritized_drm_schemes
                    .iter()
                    .position(|s| s == scheme)
                    .unwrap_or(self.prioritized_drm_schemes.len())
            }
        }
    }

    fn content_rank(&self, content_type: Option<&str>) -> usize {
        match content_type {
            Some(content_type) => self
                .prioritized_content_types
                .iter()
                .position(|t| t == content_type)
                .unwrap_or(self.prioritized_content_types.len()),
            None => self.prioritized_content_types.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mechanism(drm: Option<&str>, content: Option<&str>) -> DeliveryMechanism {
        DeliveryMechanism {
            drm_scheme: drm.map(str::to_string),
            content_type: content.map(str::to_string),
            ..DeliveryMechanism::default()
        }
    }

    // A spread of mechanisms taken from a working catalog.
    fn sample() -> Vec<DeliveryMechanism> {
        vec![
            mechanism(Some(mediatype::ADOBE_DRM), Some(mediatype::EPUB)),
            mechanism(Some("Libby DRM"), Some("application/audiobook+overdrive")),
            mechanism(None, Some("application/audiobook+json")),
            mechanism(Some("application/vnd.bearer-token+json"), Some("application/pdf")),
            mechanism(Some("application/vnd.bearer-token+json"), Some(mediatype::EPUB)),
            mechanism(None, Some(mediatype::EPUB)),
            mechanism(None, Some("application/pdf")),
            mechanism(Some("application/vnd.findaway.license+json"), None),
            mechanism(Some(mediatype::LCP_DRM), Some("application/audiobook+lcp")),
            mechanism(Some(mediatype::LCP_DRM), Some(mediatype::EPUB)),
            mechanism(Some(mediatype::LCP_DRM), Some("application/pdf")),
        ]
    }

    fn shapes(ordered: &[&DeliveryMechanism]) -> Vec<(Option<String>, Option<String>)> {
        ordered
            .iter()
            .map(|m| (m.drm_scheme.clone(), m.content_type.clone()))
            .collect()
    }

    #[test]
    fn test_empty_configuration_is_identity() {
        let priorities = FormatPriorities::default();
        let mechanisms = sample();
        let ordered = priorities.prioritize(&mechanisms);
        assert_eq!(
            shapes(&ordered),
            mechanisms
                .iter()
                .map(|m| (m.drm_scheme.clone(), m.content_type.clone()))
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_drm_free_before_encrypted() {
        let priorities = FormatPriorities {
            prioritized_drm_schemes: vec![mediatype::LCP_DRM.to_string()],
            ..FormatPriorities::default()
        };
        let mechanisms = sample();
        let ordered = priorities.prioritize(&mechanisms);
        // The three DRM-free mechanisms lead in their original order,
        // then LCP, then everything else unchanged.
        let got = shapes(&ordered);
        assert_eq!(got[0].0, None);
        assert_eq!(got[1].0, None);
        assert_eq!(got[2].0, None);
        assert_eq!(got[3].0.as_deref(), Some(mediatype::LCP_DRM));
        assert_eq!(got[4].0.as_deref(), Some(mediatype::LCP_DRM));
        assert_eq!(got[5].0.as_deref(), Some(mediatype::LCP_DRM));
        assert_eq!(got[6].0.as_deref(), Some(mediatype::ADOBE_DRM));
    }

    #[test]
    fn test_prioritized_content_type() {
        let priorities = FormatPriorities {
            prioritized_content_types: vec![mediatype::EPUB.to_string()],
            ..FormatPriorities::default()
        };
        let mechanisms = sample();
        let ordered = priorities.prioritize(&mechanisms);
        let got = shapes(&ordered);
        // Within the DRM-free group, EPUB jumps to the front.
        assert_eq!(got[0], (None, Some(mediatype::EPUB.to_string())));
        assert_eq!(got[1], (None, Some("application/audiobook+json".to_string())));
        assert_eq!(got[2], (None, Some("application/pdf".to_string())));
    }

    #[test]
    fn test_deprioritize_lcp_non_epub() {
        let priorities = FormatPriorities {
            prioritized_drm_schemes: vec![mediatype::LCP_DRM.to_string()],
            prioritized_content_types: vec![
                mediatype::EPUB.to_string(),
                "application/pdf".to_string(),
                "application/audiobook+lcp".to_string(),
            ],
            hidden_content_types: vec![],
            deprioritize_lcp_non_epub: true,
        };
        let mechanisms = sample();
        let ordered = priorities.prioritize(&mechanisms);
        let got = shapes(&ordered);
        // LCP EPUB keeps its prioritized slot; LCP PDF and the LCP
        // audiobook sink to the very end, in content-priority order.
        let lcp_epub = (
            Some(mediatype::LCP_DRM.to_string()),
            Some(mediatype::EPUB.to_string()),
        );
        assert_eq!(got[3], lcp_epub);
        assert_eq!(
            got[got.len() - 2],
            (
                Some(mediatype::LCP_DRM.to_string()),
                Some("application/pdf".to_string())
            )
        );
        assert_eq!(
            got[got.len() - 1],
            (
                Some(mediatype::LCP_DRM.to_string()),
                Some("application/audiobook+lcp".to_string())
            )
        );
    }

    #[test]
    fn test_hidden_content_types() {
        let priorities = FormatPriorities {
            hidden_content_types: vec!["application/pdf".to_string()],
            ..FormatPriorities::default()
        };
        let mechanisms = sample();
        let visible = priorities.visible(&mechanisms);
        assert!(visible
            .iter()
            .all(|m| m.content_type.as_deref() != Some("application/pdf")));
        assert_eq!(visible.len(), mechanisms.len() - 3);
    }
}
