//! Acquisition-link decision procedure.
//!
//! Given the patron's relationship to a title (none, active loan,
//! active hold, or an out-of-band fulfillment handle), decide which of
//! borrow / fulfill / revoke / open-access links to emit and with what
//! availability and DRM metadata. The relationships are mutually
//! exclusive and evaluated in priority order: fulfillment handle, loan,
//! hold, none.

use std::collections::HashMap;

use tracing::debug;

use crate::feed::{Acquisition, AvailabilityStatus, FeedData, FeedEntryNode, IndirectAcquisition};
use crate::model::{DeliveryMechanism, Hold, Identifier, LicensePool, Loan, Patron, Work};
use crate::opds::{mediatype, rel};

use super::{Annotator, DrmCredentials, EntryError};

/// Memoizes vendor-token licensor blocks for the duration of one feed
/// build, so every entry in the feed carries the same token. Negative
/// results are cached too.
#[derive(Default)]
pub struct LicensorCache {
    entries: HashMap<String, Option<FeedEntryNode>>,
}

impl LicensorCache {
    pub fn new() -> LicensorCache {
        LicensorCache::default()
    }

    pub fn licensor(
        &mut self,
        credentials: &dyn DrmCredentials,
        patron: &Patron,
    ) -> Option<FeedEntryNode> {
        if let Some(cached) = self.entries.get(&patron.cache_key) {
            debug!(patron = %patron.cache_key, "licensor cache hit");
            return cached.clone();
        }
        let block = credentials.licensor_token(patron).map(|token| {
            FeedEntryNode::new()
                .scalar("vendor", token.vendor)
                .child("clientToken", FeedEntryNode::with_text(token.client_token))
        });
        self.entries.insert(patron.cache_key.clone(), block.clone());
        block
    }
}

/// The ordered format-type layers a client must unwrap for one delivery
/// mechanism. Streaming books hand back an OPDS entry first, then the
/// DRM wrapper if any, then the content itself.
pub fn format_types(mechanism: &DeliveryMechanism) -> Vec<String> {
    let mut types = Vec::new();
    if mechanism.is_streaming {
        types.push(mediatype::ENTRY.to_string());
    }
    if let Some(drm) = &mechanism.drm_scheme {
        types.push(drm.clone());
    }
    if let Some(content) = &mechanism.content_type {
        types.push(content.clone());
    }
    types
}

/// Fill in the availability, holds, and copies blocks of an acquisition
/// link.
///
/// The hold counters come from two processes that update at different
/// times, so they can disagree; the reconciliation here trusts the more
/// specific number and never shows a patron a position past the end of
/// the queue.
pub fn license_tags(
    acquisition: &mut Acquisition,
    pool: &LicensePool,
    loan: Option<&Loan>,
    hold: Option<&Hold>,
) {
    let status;
    let mut since = None;
    let mut until = None;

    if let Some(loan) = loan {
        status = AvailabilityStatus::Available;
        since = loan.start;
        if !pool.unlimited_access {
            until = loan.end;
        }
    } else if let Some(hold) = hold {
        until = hold.end;
        if hold.position == Some(0) {
            status = AvailabilityStatus::Ready;
        } else {
            status = AvailabilityStatus::Reserved;
            since = hold.start;
        }
    } else if pool.open_access
        || pool.unlimited_access
        || (pool.licenses_available > 0 && pool.licenses_owned > 0)
    {
        status = AvailabilityStatus::Available;
    } else {
        status = AvailabilityStatus::Unavailable;
    }

    acquisition.availability_status = Some(status);
    acquisition.availability_since = since;
    acquisition.availability_until = until;

    // Open-access and unlimited pools report status only.
    if pool.open_access || pool.unlimited_access {
        return;
    }

    let mut total = pool.patrons_in_hold_queue;
    if let Some(hold) = hold {
        // No recorded position means last in line.
        let position = hold.position.unwrap_or(total);
        if position > 0 {
            acquisition.holds_position = Some(position);
        }
        if position > total {
            total = position;
        } else if position == 0 && total == 0 {
            // The book is reserved for this patron but they are not yet
            // counted in the queue.
            total = 1;
        }
    }
    acquisition.holds_total = Some(total);
    acquisition.copies_total = Some(pool.licenses_owned);
    acquisition.copies_available = Some(pool.licenses_available);
}

fn acquisition_link(rel_uri: &str, href: String, types: &[String], is_loan: bool) -> Acquisition {
    let mut link = Acquisition::new(href, rel_uri);
    link.link.media_type = types.first().cloned();
    if types.len() > 1 {
        link.indirect_acquisitions = IndirectAcquisition::chain(&types[1..])
            .into_iter()
            .collect();
    }
    link.is_loan = is_loan;
    link
}

impl<'a> Annotator<'a> {
    /// Every acquisition method for one title, in presentation order:
    /// borrow, fulfill, open-access, revoke.
    pub(crate) fn acquisition_links(
        &self,
        pool: Option<&LicensePool>,
        work: &Work,
        identifier: &Identifier,
        cache: &mut LicensorCache,
    ) -> Result<Vec<Acquisition>, EntryError> {
        let loan = self.context.active_loans.get(&work.id);
        let hold = self.context.active_holds.get(&work.id);
        let fulfillment = self.context.active_fulfillments.get(&work.id);

        let mut can_borrow = false;
        let can_fulfill;
        let can_revoke;

        if fulfillment.is_some() || loan.is_some() {
            can_fulfill = true;
            can_revoke = true;
        } else if let Some(hold) = hold {
            // The borrow link is shown even when the patron can't borrow
            // right this minute; it is the convert-hold-to-loan path.
            can_borrow = true;
            can_fulfill = false;
            can_revoke = pool
                .map(|pool| self.capabilities.can_revoke_hold(pool, hold))
                .unwrap_or(false);
        } else {
            can_borrow = true;
            can_fulfill = false;
            can_revoke = false;
        }

        let mut links: Vec<Acquisition> = Vec::new();

        if can_borrow {
            if let Some(pool) = pool {
                links.extend(self.borrow_links(pool, identifier, hold)?);
            }
        }

        if can_fulfill {
            if let Some(fulfillment) = fulfillment {
                let types: Vec<String> = fulfillment.content_type.clone().into_iter().collect();
                links.push(acquisition_link(
                    rel::ACQUISITION,
                    fulfillment.content_link.clone(),
                    &types,
                    loan.is_some(),
                ));
            } else if let Some(pool) = pool {
                links.extend(self.fulfill_links(pool, loan, cache));
            }
        }

        if let Some(pool) = pool {
            if loan.is_none() && !self.context.identifies_patrons {
                links.extend(self.direct_fulfillment_links(pool, cache));
            }
        }

        if can_revoke && self.context.identifies_patrons {
            if let Some(pool) = pool {
                links.push(Acquisition::new(self.urls.revoke_url(pool), rel::REVOKE_LOAN));
            }
        }

        Ok(links)
    }

    /// Borrow links for a title the patron does not have out.
    ///
    /// If the vendor fixes the delivery mechanism at checkout there is
    /// one borrow link per eligible mechanism; otherwise one borrow link
    /// carrying an indirect-acquisition chain per eligible mechanism. A
    /// title with zero eligible mechanisms cancels the whole entry.
    fn borrow_links(
        &self,
        pool: &LicensePool,
        identifier: &Identifier,
        hold: Option<&Hold>,
    ) -> Result<Vec<Acquisition>, EntryError> {
        if !self.context.identifies_patrons {
            return Ok(Vec::new());
        }
        // Without holds there is no borrow path for an unavailable title.
        if hold.is_none()
            && !self.context.allow_holds
            && !pool.open_access
            && !pool.unlimited_access
            && pool.licenses_available == 0
        {
            return Ok(Vec::new());
        }

        let visible = self.context.priorities.prioritize(&pool.delivery_mechanisms);
        let mut links = Vec::new();

        if self.capabilities.set_mechanism_at_borrow(pool) {
            for mechanism in &visible {
                let types = format_types(mechanism);
                let Some(indirect) = IndirectAcquisition::chain(&types) else {
                    continue;
                };
                let href = self.urls.borrow_url(identifier, Some(mechanism.id));
                let mut link = Acquisition::new(href, rel::BORROW);
                link.link.media_type = Some(mediatype::ENTRY.to_string());
                link.is_hold = hold.is_some();
                link.indirect_acquisitions = vec![indirect];
                links.push(link);
            }
        } else {
            let chains: Vec<IndirectAcquisition> = visible
                .iter()
                .filter_map(|mechanism| IndirectAcquisition::chain(&format_types(mechanism)))
                .collect();
            if !chains.is_empty() {
                let href = self.urls.borrow_url(identifier, None);
                let mut link = Acquisition::new(href, rel::BORROW);
                link.link.media_type = Some(mediatype::ENTRY.to_string());
                link.is_hold = hold.is_some();
                link.indirect_acquisitions = chains;
                links.push(link);
            }
        }

        if links.is_empty() {
            // There is no way to actually get the book; cancel the
            // entry rather than emit a borrow link with nothing in it.
            return Err(EntryError::Unfulfillable(identifier.urn.clone()));
        }
        for link in &mut links {
            license_tags(link, pool, None, hold);
        }
        Ok(links)
    }

    /// Fulfill links for an active loan. A locked-in mechanism restricts
    /// the choice to that mechanism plus any streaming mechanisms, which
    /// stay available after lock-in.
    fn fulfill_links(
        &self,
        pool: &LicensePool,
        loan: Option<&Loan>,
        cache: &mut LicensorCache,
    ) -> Vec<Acquisition> {
        let mut links = Vec::new();
        if let Some(locked) = loan.and_then(|loan| loan.locked_mechanism) {
            for mechanism in &pool.delivery_mechanisms {
                if mechanism.id == locked || mechanism.is_streaming {
                    links.extend(self.fulfill_link(pool, loan, mechanism, rel::ACQUISITION, cache));
                }
            }
        } else {
            for mechanism in self.context.priorities.prioritize(&pool.delivery_mechanisms) {
                links.extend(self.fulfill_link(pool, loan, mechanism, rel::ACQUISITION, cache));
            }
        }
        links
    }

    fn fulfill_link(
        &self,
        pool: &LicensePool,
        loan: Option<&Loan>,
        mechanism: &DeliveryMechanism,
        rel_uri: &str,
        cache: &mut LicensorCache,
    ) -> Option<Acquisition> {
        if !self.context.identifies_patrons && rel_uri != rel::OPEN_ACCESS {
            return None;
        }
        let types = format_types(mechanism);
        if types.is_empty() {
            return None;
        }
        let href = self.urls.fulfill_url(pool, mechanism);
        let mut link = acquisition_link(rel_uri, href, &types, loan.is_some());
        license_tags(&mut link, pool, loan, None);
        self.drm_extension(&mut link, loan, mechanism, cache);
        Some(link)
    }

    /// Links for getting a book with no loan step at all, for libraries
    /// that do not authenticate patrons. These use the open-access rel
    /// not because the titles are open access in the licensing sense but
    /// because they can be downloaded with no intermediate requirement.
    fn direct_fulfillment_links(
        &self,
        pool: &LicensePool,
        cache: &mut LicensorCache,
    ) -> Vec<Acquisition> {
        let mut links = Vec::new();
        for mechanism in &pool.delivery_mechanisms {
            if self.capabilities.can_fulfill_without_loan(pool, mechanism) {
                if let Some(mut link) =
                    self.fulfill_link(pool, None, mechanism, rel::OPEN_ACCESS, cache)
                {
                    link.rights = mechanism.rights_uri.clone();
                    links.push(link);
                }
            }
        }
        if pool.open_access {
            for mechanism in &pool.delivery_mechanisms {
                if let Some(href) = &mechanism.resource_url {
                    let mut link = Acquisition::new(href.clone(), rel::OPEN_ACCESS);
                    link.link.media_type = mechanism.content_type.clone();
                    link.rights = mechanism.rights_uri.clone();
                    link.availability_status = Some(AvailabilityStatus::Available);
                    links.push(link);
                }
            }
        }
        links
    }

    fn drm_extension(
        &self,
        link: &mut Acquisition,
        loan: Option<&Loan>,
        mechanism: &DeliveryMechanism,
        cache: &mut LicensorCache,
    ) {
        if loan.is_none() || !self.context.identifies_patrons {
            return;
        }
        let (Some(credentials), Some(patron)) = (self.credentials, self.context.patron.as_ref())
        else {
            return;
        };
        match mechanism.drm_scheme.as_deref() {
            Some(mediatype::ADOBE_DRM) => {
                link.drm_licensor = cache.licensor(credentials, patron);
            }
            Some(mediatype::LCP_DRM) => {
                link.lcp_hashed_passphrase = credentials.lcp_hashed_passphrase(patron);
            }
            _ => {}
        }
    }

    /// Feed-level DRM blocks for a patron's bookshelf feed, so clients
    /// can register with the DRM server once rather than per entry.
    /// Runs on top of [`Annotator::annotate_feed`], which the feed
    /// builder has already applied.
    pub fn annotate_loans_feed(&self, feed: &mut FeedData, cache: &mut LicensorCache) {
        if !self.context.identifies_patrons {
            return;
        }
        let (Some(credentials), Some(patron)) = (self.credentials, self.context.patron.as_ref())
        else {
            return;
        };
        feed.metadata.drm_licensor = cache.licensor(credentials, patron);
        feed.metadata.lcp_hashed_passphrase = credentials.lcp_hashed_passphrase(patron);
    }
}
