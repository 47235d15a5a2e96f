//! Search ranking over the token catalog.
//!
//! Splits a catalog snapshot into the user's watchlist section and
//! everything else, filters both by the search query, and orders them:
//! by market cap when there is no query, by edit distance to the query
//! (then market cap) when there is one.
//!
//! Pure and synchronous. The view borrows the catalog; recompute it
//! whenever the catalog, the query or the membership snapshot changes.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracing::debug;

use crate::types::CatalogEntry;

// ---------------------------------------------------------------------------
// Edit distance
// ---------------------------------------------------------------------------

/// Levenshtein distance between two strings, counted in chars.
///
/// Two-row dynamic programme: O(|a|·|b|) time, O(|b|) space.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            curr[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

// ---------------------------------------------------------------------------
// Ranked view
// ---------------------------------------------------------------------------

/// The two display sections produced by [`rank`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedView<'a> {
    /// Entries whose id is in the membership set.
    pub members: Vec<&'a CatalogEntry>,
    /// Everything else that passed the filter.
    pub others: Vec<&'a CatalogEntry>,
}

impl<'a> RankedView<'a> {
    pub fn len(&self) -> usize {
        self.members.len() + self.others.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty() && self.others.is_empty()
    }

    /// Members first, then the rest, in display order.
    pub fn iter(&self) -> impl Iterator<Item = &'a CatalogEntry> + '_ {
        self.members.iter().chain(self.others.iter()).copied()
    }

    pub fn ids(&self) -> Vec<&'a str> {
        self.iter().map(|e| e.id.as_str()).collect()
    }
}

/// Sort key computed once per entry per call.
struct Candidate<'a> {
    entry: &'a CatalogEntry,
    distance: usize,
    market_cap: Option<f64>,
}

/// Normalise a raw query: trimmed, lowercased, `None` when blank.
fn normalise_query(query: Option<&str>) -> Option<String> {
    query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase)
}

/// Descending market cap with unknown caps last.
fn by_market_cap_desc(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn order(candidates: &mut [Candidate<'_>]) {
    // `sort_by` is stable, so equal keys keep catalog order.
    candidates.sort_by(|a, b| {
        a.distance
            .cmp(&b.distance)
            .then_with(|| by_market_cap_desc(a.market_cap, b.market_cap))
    });
}

/// Rank a catalog snapshot against a query and a membership set.
///
/// Each catalog id lands in exactly one section; repeated ids in the
/// catalog collapse to their first occurrence. With a blank or absent
/// query every entry is kept and ordered by market cap descending. With a
/// query only entries whose symbol contains it (case-insensitive) are kept,
/// ordered by edit distance to the query, then by market cap descending.
pub fn rank<'a, S: AsRef<str>>(
    catalog: &'a [CatalogEntry],
    query: Option<&str>,
    member_ids: &[S],
) -> RankedView<'a> {
    let query = normalise_query(query);
    let members: HashSet<&str> = member_ids.iter().map(AsRef::as_ref).collect();

    let mut seen: HashSet<&str> = HashSet::with_capacity(catalog.len());
    let mut in_members: Vec<Candidate<'a>> = Vec::new();
    let mut in_others: Vec<Candidate<'a>> = Vec::new();
    let mut filtered_out = 0usize;

    for entry in catalog {
        if !seen.insert(entry.id.as_str()) {
            continue;
        }

        let distance = match &query {
            Some(q) => {
                let symbol = entry.symbol.to_lowercase();
                if !symbol.contains(q.as_str()) {
                    filtered_out += 1;
                    continue;
                }
                levenshtein(&symbol, q)
            }
            None => 0,
        };

        let candidate = Candidate {
            entry,
            distance,
            market_cap: entry.ranking_market_cap(),
        };
        if members.contains(entry.id.as_str()) {
            in_members.push(candidate);
        } else {
            in_others.push(candidate);
        }
    }

    order(&mut in_members);
    order(&mut in_others);

    debug!(
        catalog = catalog.len(),
        unique = seen.len(),
        members = in_members.len(),
        others = in_others.len(),
        filtered_out,
        query = query.as_deref().unwrap_or(""),
        "Catalog ranked"
    );

    RankedView {
        members: in_members.into_iter().map(|c| c.entry).collect(),
        others: in_others.into_iter().map(|c| c.entry).collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
