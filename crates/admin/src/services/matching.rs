//! Fuzzy store matching.
//!
//! Operator aid for linking an edit request to an existing store. The
//! weights are heuristic and preserved numerically from the original
//! scoring scheme; treat them as tunable, not load-bearing.

use serde::Serialize;

use machiya_core::StoreId;

/// Full points for an exact name or address match.
const EXACT_WEIGHT: f64 = 1.0;
/// Partial points for token overlap on name or address.
const PARTIAL_WEIGHT: f64 = 0.3;
/// Partial points for a last-4-digits phone match.
const PHONE_SUFFIX_WEIGHT: f64 = 0.2;
/// Number of weighted fields; the score is normalized against this.
const FIELD_COUNT: f64 = 3.0;

/// Maximum number of matches returned.
const MAX_MATCHES: usize = 10;

/// The request-side fields compared against stores.
#[derive(Debug, Clone)]
pub struct MatchQuery<'a> {
    pub name: &'a str,
    pub address: &'a str,
    pub phone: Option<&'a str>,
}

/// A store candidate to score.
#[derive(Debug, Clone)]
pub struct MatchCandidate {
    pub id: StoreId,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
}

/// A scored match, highest first.
#[derive(Debug, Clone, Serialize)]
pub struct StoreMatch {
    pub store_id: StoreId,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    /// Percentage score, 1-100.
    pub score: i32,
}

/// Normalize a phone number for comparison: digits only.
fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Partial-match test: substring containment either way, or any shared
/// whitespace-separated token of at least two characters.
fn partial_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.contains(b) || b.contains(a) {
        return true;
    }
    a.split_whitespace()
        .filter(|token| token.chars().count() >= 2)
        .any(|token| b.split_whitespace().any(|other| other == token))
}

/// Points contributed by one text field.
fn text_points(query: &str, candidate: &str) -> f64 {
    let query = query.trim();
    let candidate = candidate.trim();
    if query.is_empty() || candidate.is_empty() {
        0.0
    } else if query == candidate {
        EXACT_WEIGHT
    } else if partial_match(query, candidate) {
        PARTIAL_WEIGHT
    } else {
        0.0
    }
}

/// Points contributed by the phone field.
fn phone_points(query: Option<&str>, candidate: Option<&str>) -> f64 {
    let (Some(query), Some(candidate)) = (query, candidate) else {
        return 0.0;
    };
    let query = normalize_phone(query);
    let candidate = normalize_phone(candidate);
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }
    if query == candidate {
        return EXACT_WEIGHT;
    }
    let query_suffix: String = query.chars().rev().take(4).collect();
    let candidate_suffix: String = candidate.chars().rev().take(4).collect();
    if query_suffix.len() == 4 && query_suffix == candidate_suffix {
        PHONE_SUFFIX_WEIGHT
    } else {
        0.0
    }
}

/// Percentage score of one candidate against the query.
#[must_use]
pub fn score(query: &MatchQuery<'_>, candidate: &MatchCandidate) -> i32 {
    let points = text_points(query.name, &candidate.name)
        + text_points(query.address, &candidate.address)
        + phone_points(query.phone, candidate.phone.as_deref());

    #[allow(clippy::cast_possible_truncation)]
    let percentage = (points / FIELD_COUNT * 100.0).round() as i32;
    percentage
}

/// Score all candidates, returning the top matches above zero, descending.
/// Ties keep the candidates' input order.
#[must_use]
pub fn top_matches(query: &MatchQuery<'_>, candidates: Vec<MatchCandidate>) -> Vec<StoreMatch> {
    let mut matches: Vec<StoreMatch> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let score = score(query, &candidate);
            (score > 0).then(|| StoreMatch {
                store_id: candidate.id,
                name: candidate.name,
                address: candidate.address,
                phone: candidate.phone,
                score,
            })
        })
        .collect();

    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches.truncate(MAX_MATCHES);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: i32, name: &str, address: &str, phone: Option<&str>) -> MatchCandidate {
        MatchCandidate {
            id: StoreId::new(id),
            name: name.to_owned(),
            address: address.to_owned(),
            phone: phone.map(str::to_owned),
        }
    }

    #[test]
    fn test_exact_match_on_all_fields_is_100() {
        let query = MatchQuery {
            name: "Blue Door Coffee",
            address: "12 Harbor St",
            phone: Some("03-1234-5678"),
        };
        let candidate = candidate(1, "Blue Door Coffee", "12 Harbor St", Some("0312345678"));
        assert_eq!(score(&query, &candidate), 100);
    }

    #[test]
    fn test_exact_name_only_is_33() {
        let query = MatchQuery {
            name: "Blue Door Coffee",
            address: "somewhere else entirely",
            phone: None,
        };
        let candidate = candidate(1, "Blue Door Coffee", "99 Other Ave", None);
        assert_eq!(score(&query, &candidate), 33);
    }

    #[test]
    fn test_partial_name_overlap_is_10() {
        let query = MatchQuery {
            name: "Blue Door Coffee",
            address: "x",
            phone: None,
        };
        // Shares the token "Coffee".
        let candidate = candidate(1, "Harbor Coffee Stand", "y", None);
        assert_eq!(score(&query, &candidate), 10);
    }

    #[test]
    fn test_phone_last_four_is_7() {
        let query = MatchQuery {
            name: "a",
            address: "b",
            phone: Some("03-9999-5678"),
        };
        let candidate = candidate(1, "c", "d", Some("06-0000-5678"));
        // 0.2 / 3 * 100 = 6.67 -> rounds to 7.
        assert_eq!(score(&query, &candidate), 7);
    }

    #[test]
    fn test_phone_normalization_strips_hyphens() {
        let query = MatchQuery {
            name: "a",
            address: "b",
            phone: Some("03-1234-5678"),
        };
        let exact = candidate(1, "c", "d", Some("03 1234 5678"));
        assert_eq!(score(&query, &exact), 33);
    }

    #[test]
    fn test_top_matches_sorted_capped_and_filtered() {
        let query = MatchQuery {
            name: "Blue Door Coffee",
            address: "12 Harbor St",
            phone: None,
        };
        let mut candidates = vec![
            candidate(1, "no relation", "nowhere", None),
            candidate(2, "Blue Door Coffee", "12 Harbor St", None),
            candidate(3, "Blue Door Coffee", "somewhere", None),
        ];
        for id in 4..20 {
            candidates.push(candidate(id, "Door Coffee Blue", "Harbor", None));
        }

        let matches = top_matches(&query, candidates);
        assert_eq!(matches.len(), MAX_MATCHES);
        assert_eq!(matches.first().map(|m| m.store_id), Some(StoreId::new(2)));
        assert!(matches.iter().all(|m| m.score > 0));
        let scores: Vec<i32> = matches.iter().map(|m| m.score).collect();
        let mut sorted = scores.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(scores, sorted);
    }

    #[test]
    fn test_ties_keep_query_order() {
        let query = MatchQuery {
            name: "Blue Door Coffee",
            address: "x",
            phone: None,
        };
        let matches = top_matches(
            &query,
            vec![
                candidate(5, "Blue Door Coffee", "y", None),
                candidate(2, "Blue Door Coffee", "z", None),
            ],
        );
        let ids: Vec<StoreId> = matches.iter().map(|m| m.store_id).collect();
        assert_eq!(ids, vec![StoreId::new(5), StoreId::new(2)]);
    }
}
