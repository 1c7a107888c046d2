//! Property-based tests for scope parsing and set arithmetic.

use chat_oauth::scope::{self, Scope, ScopeSet};
use proptest::prelude::*;

/// Generate an arbitrary scope set, in arbitrary insertion order.
fn arb_scope_set() -> impl Strategy<Value = ScopeSet> {
    proptest::sample::subsequence(Scope::ALL.to_vec(), 0..=Scope::ALL.len())
        .prop_shuffle()
        .prop_map(|scopes| scopes.into_iter().collect())
}

proptest! {
    /// Formatting then parsing returns the same set, in the same order.
    #[test]
    fn scope_set_roundtrip(set in arb_scope_set()) {
        let parsed = ScopeSet::parse(&set.to_string()).expect("parse");
        prop_assert_eq!(parsed, set);
    }

    /// The intersection is a subset of both operands.
    #[test]
    fn intersection_is_subset(requested in arb_scope_set(), allowed in arb_scope_set()) {
        let both = requested.intersect(&allowed);
        prop_assert!(allowed.is_superset_of(&both));
        prop_assert!(requested.is_superset_of(&both));
    }

    /// Narrowing never grants more than the allowed set.
    #[test]
    fn narrowing_stays_within_allowed(requested in arb_scope_set(), allowed in arb_scope_set()) {
        if let Some(granted) = scope::narrow(&requested, &allowed) {
            prop_assert!(allowed.is_superset_of(&granted));
            prop_assert!(!granted.is_empty() || allowed.is_empty());
        } else {
            prop_assert!(!requested.is_empty());
        }
    }

    /// Extra whitespace between tokens does not change the result.
    #[test]
    fn whitespace_is_insignificant(set in arb_scope_set(), pad in "[ ]{1,3}") {
        let spaced = set.iter().map(Scope::as_str).collect::<Vec<_>>().join(&pad);
        let parsed = ScopeSet::parse(&format!("{pad}{spaced}{pad}")).expect("parse");
        prop_assert_eq!(parsed, set);
    }

    /// Arbitrary printable input never panics the parser.
    #[test]
    fn parse_never_panics(text in "\\PC{0,64}") {
        let _ = ScopeSet::parse(&text);
    }
}
