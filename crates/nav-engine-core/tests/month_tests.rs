use nav_engine_core::month::{
    add_months, compare_keys, date_to_key, generate_month_range, key_to_date, months_between,
    MonthKey,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ===========================================================================
// Month arithmetic properties
// ===========================================================================

fn any_month() -> impl Strategy<Value = MonthKey> {
    (MonthKey::MIN_YEAR..=MonthKey::MAX_YEAR, 1u32..=12)
        .prop_map(|(y, m)| MonthKey::new(y, m).unwrap())
}

proptest! {
    #[test]
    fn prop_date_round_trip(k in any_month()) {
        let date = key_to_date(&k).unwrap();
        let back = date_to_key(date).unwrap();
        prop_assert_eq!(key_to_date(&back).unwrap(), date);
        prop_assert_eq!(back, k);
    }

    #[test]
    fn prop_months_between_antisymmetric(a in any_month(), b in any_month()) {
        prop_assert_eq!(months_between(&a, &b), -months_between(&b, &a));
    }

    #[test]
    fn prop_range_length_and_order(a in any_month(), span in 0i64..60) {
        let end = match add_months(&a, span) {
            Ok(end) => end,
            Err(_) => return Ok(()),
        };
        let range = generate_month_range(&a, &end).unwrap();
        prop_assert_eq!(range.len() as i64, months_between(&a, &end) + 1);
        prop_assert!(range.windows(2).all(|w| compare_keys(&w[0], &w[1]) == -1));
    }

    #[test]
    fn prop_string_order_matches_key_order(a in any_month(), b in any_month()) {
        prop_assert_eq!(a.to_string().cmp(&b.to_string()), a.cmp(&b));
    }

    #[test]
    fn prop_add_months_inverse(a in any_month(), n in -240i64..240) {
        if let Ok(moved) = add_months(&a, n) {
            prop_assert_eq!(add_months(&moved, -n).unwrap(), a);
            prop_assert_eq!(months_between(&a, &moved), n);
        }
    }
}

#[test]
fn test_range_single_month() {
    let k: MonthKey = "2024-06".parse().unwrap();
    assert_eq!(generate_month_range(&k, &k).unwrap(), vec![k]);
}

#[test]
fn test_year_bounds_are_inclusive() {
    assert!("1900-01".parse::<MonthKey>().is_ok());
    assert!("2100-12".parse::<MonthKey>().is_ok());
}
