//! Property tests for the automata algebra.

use proptest::prelude::*;

use strand_automata::{SemilinearSet, StringAutomaton};

fn small_word() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[abc]{0,6}").expect("valid generator")
}

fn small_set() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(small_word(), 1..5)
}

fn automaton_of(words: &[String]) -> StringAutomaton {
    let mut auto = StringAutomaton::make_phi();
    for word in words {
        auto = auto.union(&StringAutomaton::make_string(word));
    }
    auto
}

proptest! {
    #[test]
    fn union_accepts_both_sides(left in small_set(), right in small_set()) {
        let merged = automaton_of(&left).union(&automaton_of(&right));
        for word in left.iter().chain(right.iter()) {
            prop_assert!(merged.accepts(word));
        }
    }

    #[test]
    fn intersection_is_conjunction(left in small_set(), right in small_set(), probe in small_word()) {
        let a = automaton_of(&left);
        let b = automaton_of(&right);
        let both = a.intersect(&b);
        prop_assert_eq!(both.accepts(&probe), a.accepts(&probe) && b.accepts(&probe));
    }

    #[test]
    fn complement_flips_every_probe(words in small_set(), probe in small_word()) {
        let auto = automaton_of(&words);
        let complement = auto.complement();
        prop_assert_eq!(complement.accepts(&probe), !auto.accepts(&probe));
    }

    #[test]
    fn concat_accepts_pairwise_joins(left in small_set(), right in small_set()) {
        let joined = automaton_of(&left).concat(&automaton_of(&right));
        for l in &left {
            for r in &right {
                let joined_word = format!("{}{}", l, r);
                prop_assert!(joined.accepts(&joined_word));
            }
        }
    }

    #[test]
    fn quotient_inverts_concat(stem in small_word(), tail in small_word()) {
        let whole = StringAutomaton::make_string(&format!("{stem}{tail}"));
        let stems = whole.right_quotient(&StringAutomaton::make_string(&tail));
        prop_assert!(stems.accepts(&stem));
        let tails = whole.left_quotient(&StringAutomaton::make_string(&stem));
        prop_assert!(tails.accepts(&tail));
    }

    #[test]
    fn length_matches_accepted_words(words in small_set()) {
        let lengths = automaton_of(&words).length();
        for word in &words {
            prop_assert!(lengths.contains(word.len() as i64));
        }
    }

    #[test]
    fn prefixes_cover_every_cut(word in small_word()) {
        let auto = StringAutomaton::make_string(&word);
        let prefixes = auto.prefixes();
        let suffixes = auto.suffixes();
        for cut in 0..=word.len() {
            prop_assert!(prefixes.accepts(&word[..cut]));
            prop_assert!(suffixes.accepts(&word[cut..]));
        }
    }
}

proptest! {
    #[test]
    fn minkowski_sum_membership(
        a in proptest::collection::btree_set(0u64..40, 1..4),
        b in proptest::collection::btree_set(0u64..40, 1..4),
    ) {
        let left = SemilinearSet::finite(a.clone());
        let right = SemilinearSet::finite(b.clone());
        let sum = left.add(&right);
        for &x in &a {
            for &y in &b {
                prop_assert!(sum.contains(x + y));
            }
        }
    }

    #[test]
    fn set_algebra_membership(
        a in proptest::collection::btree_set(0u64..60, 1..6),
        b in proptest::collection::btree_set(0u64..60, 1..6),
        probe in 0u64..80,
    ) {
        let left = SemilinearSet::finite(a);
        let right = SemilinearSet::finite(b);
        prop_assert_eq!(
            left.union(&right).contains(probe),
            left.contains(probe) || right.contains(probe)
        );
        prop_assert_eq!(
            left.intersect(&right).contains(probe),
            left.contains(probe) && right.contains(probe)
        );
        prop_assert_eq!(left.complement().contains(probe), !left.contains(probe));
    }
}
