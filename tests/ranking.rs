//! Ranking properties over generated catalogs.

mod common;

use std::collections::HashSet;

use tokenwatch::rank::{levenshtein, rank};
use tokenwatch::types::CatalogEntry;

use common::{default_catalog, entry, generated_catalog};

const SEEDS: &[u64] = &[1, 7, 42, 1234, 98765];

fn unique_ids(catalog: &[CatalogEntry]) -> HashSet<&str> {
    catalog.iter().map(|e| e.id.as_str()).collect()
}

fn members_for(catalog: &[CatalogEntry]) -> Vec<String> {
    catalog
        .iter()
        .step_by(4)
        .map(|e| e.id.clone())
        .chain(std::iter::once("not-listed".to_string()))
        .collect()
}

#[test]
fn test_every_entry_lands_in_exactly_one_section() {
    for &seed in SEEDS {
        let catalog = generated_catalog(200, seed);
        let members = members_for(&catalog);
        let view = rank(&catalog, Some(""), &members);

        let ids = view.ids();
        let distinct: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(ids.len(), distinct.len(), "seed {seed}: duplicated entry");
        assert_eq!(distinct, unique_ids(&catalog), "seed {seed}: lost entry");

        let member_set: HashSet<&str> = members.iter().map(String::as_str).collect();
        assert!(view.members.iter().all(|e| member_set.contains(e.id.as_str())));
        assert!(view.others.iter().all(|e| !member_set.contains(e.id.as_str())));
    }
}

#[test]
fn test_query_matches_every_returned_symbol() {
    for &seed in SEEDS {
        let catalog = generated_catalog(200, seed);
        let members = members_for(&catalog);
        for query in ["b", "ETH", "wdo", "1", "zzz"] {
            let view = rank(&catalog, Some(query), &members);
            let q = query.to_lowercase();
            for e in view.iter() {
                assert!(
                    e.symbol.to_lowercase().contains(&q),
                    "seed {seed}: {} does not contain {query}",
                    e.symbol
                );
            }
            // Nothing matching was dropped.
            let expected = unique_ids(&catalog)
                .into_iter()
                .filter(|id| {
                    let first = catalog.iter().find(|e| e.id == *id).unwrap();
                    first.symbol.to_lowercase().contains(&q)
                })
                .count();
            assert_eq!(view.len(), expected, "seed {seed} query {query}");
        }
    }
}

#[test]
fn test_empty_query_market_caps_non_increasing() {
    for &seed in SEEDS {
        let catalog = generated_catalog(200, seed);
        let members = members_for(&catalog);
        let view = rank(&catalog, None, &members);

        for section in [&view.members, &view.others] {
            let caps: Vec<Option<f64>> = section.iter().map(|e| e.market_cap).collect();
            let first_unknown = caps.iter().position(Option::is_none).unwrap_or(caps.len());
            assert!(caps[first_unknown..].iter().all(Option::is_none), "unknown caps sort last");
            for pair in caps[..first_unknown].windows(2) {
                assert!(pair[0] >= pair[1], "seed {seed}: {pair:?}");
            }
        }
    }
}

#[test]
fn test_distance_ties_resolved_by_market_cap() {
    for &seed in SEEDS {
        let catalog = generated_catalog(200, seed);
        for query in ["btc", "eth", "w"] {
            let view = rank(&catalog, Some(query), &Vec::<String>::new());
            let keyed: Vec<(usize, Option<f64>)> = view
                .others
                .iter()
                .map(|e| (levenshtein(&e.symbol.to_lowercase(), query), e.market_cap))
                .collect();

            for pair in keyed.windows(2) {
                let (d0, c0) = pair[0];
                let (d1, c1) = pair[1];
                assert!(d0 <= d1, "seed {seed}: distance order {pair:?}");
                if d0 == d1 {
                    match (c0, c1) {
                        (Some(a), Some(b)) => assert!(a >= b, "seed {seed}: cap order {pair:?}"),
                        (None, Some(_)) => panic!("seed {seed}: unknown cap before known {pair:?}"),
                        _ => {}
                    }
                }
            }
        }
    }
}

#[test]
fn test_identical_inputs_identical_output() {
    let catalog = generated_catalog(300, 5);
    let members = members_for(&catalog);
    let a = rank(&catalog, Some("b"), &members).ids();
    let b = rank(&catalog, Some("b"), &members).ids();
    assert_eq!(a, b);
}

#[test]
fn test_search_for_eth_on_real_catalog() {
    let catalog = default_catalog();
    let members = vec!["ether-fi".to_string()];
    let view = rank(&catalog, Some("eth"), &members);

    assert_eq!(view.members.len(), 1);
    assert_eq!(view.members[0].id, "ether-fi");
    assert_eq!(view.ids(), vec!["ether-fi", "ethereum"]);
}

#[test]
fn test_two_entry_example() {
    let catalog = vec![
        entry("btc", "btc", 1.0, Some(100.0)),
        entry("eth", "eth", 1.0, Some(50.0)),
    ];
    let view = rank(&catalog, Some(""), &Vec::<String>::new());
    assert!(view.members.is_empty());
    assert_eq!(view.others.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(), vec!["btc", "eth"]);
}
