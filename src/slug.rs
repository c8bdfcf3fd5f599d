use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::db::StoredBank;

const PAGE_EXT: &str = ".html";

/// Collapse non-alphanumeric runs to '-', trim edge hyphens, lower-case.
pub fn slugify(name: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9]+").unwrap());
    re.replace_all(name, "-").trim_matches('-').to_lowercase()
}

/// File name of the detail page for a slug.
pub fn page_name(slug: &str) -> String {
    format!("{}{}", slug, PAGE_EXT)
}

/// Assign a unique slug to every stored bank, in row-id order.
///
/// The first bank to claim a slug keeps it. Later claimants get
/// `<slug>-<cert>`, then a numeric suffix if that is taken too.
pub fn assign_slugs(banks: &[StoredBank]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(banks.len());
    let mut out = Vec::with_capacity(banks.len());

    for bank in banks {
        let base = match slugify(&bank.record.name) {
            s if s.is_empty() => "bank".to_string(),
            s => s,
        };
        let slug = if taken.contains(&base) {
            let resolved = disambiguate(&base, &bank.record.cert, &taken);
            warn!(
                "Slug collision for '{}' (row {}, cert {}), using '{}'",
                bank.record.name, bank.rowid, bank.record.cert, resolved
            );
            resolved
        } else {
            base
        };
        taken.insert(slug.clone());
        out.push(slug);
    }
    out
}

fn disambiguate(base: &str, cert: &str, taken: &HashSet<String>) -> String {
    let cert = slugify(cert);
    let stem = if cert.is_empty() {
        base.to_string()
    } else {
        format!("{}-{}", base, cert)
    };
    if !taken.contains(&stem) {
        return stem;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", stem, n);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
