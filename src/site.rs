use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::db::{BankRecord, StoredBank};
use crate::slug;

/// Every state gets a page, whether or not it has failures.
pub const ALL_STATES: [&str; 50] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY",
];

/// Entry in a state listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BankLink {
    pub name: String,
    /// Detail page is `banks/<slug>.html`.
    pub slug: String,
}

/// A bank with the slug its detail page is written under.
#[derive(Debug, Clone)]
pub struct SlottedBank {
    pub slug: String,
    pub record: BankRecord,
}

impl SlottedBank {
    pub fn file_name(&self) -> String {
        slug::page_name(&self.slug)
    }
}

/// Everything the renderer needs, derived from one read of the store.
#[derive(Debug, Default)]
pub struct SiteData {
    pub states: BTreeSet<String>,
    pub state_counts: BTreeMap<String, usize>,
    pub state_banks: BTreeMap<String, Vec<BankLink>>,
    pub banks: Vec<SlottedBank>,
}

impl SiteData {
    pub fn build(stored: Vec<StoredBank>) -> Self {
        let slugs = slug::assign_slugs(&stored);
        let mut data = SiteData::default();

        for (bank, page_slug) in stored.into_iter().zip(slugs) {
            let state = bank.record.state.clone();
            data.states.insert(state.clone());
            *data.state_counts.entry(state.clone()).or_insert(0) += 1;
            data.state_banks.entry(state).or_default().push(BankLink {
                name: bank.record.name.clone(),
                slug: page_slug.clone(),
            });
            data.banks.push(SlottedBank { slug: page_slug, record: bank.record });
        }

        for links in data.state_banks.values_mut() {
            links.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.slug.cmp(&b.slug)));
        }
        data
    }

    /// Listing for a state; empty for states with no failures.
    pub fn banks_in(&self, state: &str) -> &[BankLink] {
        self.state_banks.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// States present in the data, alphabetical, each with its listing.
    pub fn index_listing(&self) -> Vec<(&str, &[BankLink])> {
        self.state_banks
            .iter()
            .map(|(state, links)| (state.as_str(), links.as_slice()))
            .collect()
    }
}
