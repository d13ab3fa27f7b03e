//! Removes already-downloaded items from a listing page.

use crate::inventory::Inventory;
use crate::listing::ListingPage;

/// A page with already-present items removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filtered {
    /// Items not present in the inventory, in their original order.
    pub page: ListingPage,
    /// Number of items dropped because they were already present.
    pub skipped: usize,
}

/// Keeps only the items whose id is absent from `inventory`.
#[must_use]
pub fn filter(page: ListingPage, inventory: &Inventory) -> Filtered {
    let before = page.len();
    let page: ListingPage = page
        .into_iter()
        .filter(|item| {
            let present = inventory.contains(item.id);
            if present {
                log::debug!("{} exists, skipping download", item.id);
            }
            !present
        })
        .collect();
    let skipped = before - page.len();
    Filtered { page, skipped }
}
