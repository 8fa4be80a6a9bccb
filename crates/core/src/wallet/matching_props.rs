//! Property-based tests for receiver matching.

use proptest::prelude::*;

use super::matching::{MIN_SUFFIX_LEN, accounts_match, normalize_account};

/// Account numbers of realistic length.
fn account() -> impl Strategy<Value = String> {
    "[0-9]{8,16}"
}

/// Inserts spaces and dashes at arbitrary positions.
fn decorate(account: &str, seps: &[u8]) -> String {
    account
        .chars()
        .zip(seps.iter().cycle())
        .flat_map(|(c, sep)| {
            let extra = match sep % 4 {
                0 => Some(' '),
                1 => Some('-'),
                _ => None,
            };
            std::iter::once(c).chain(extra)
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every account matches itself.
    #[test]
    fn prop_account_matches_itself(account in account()) {
        prop_assert!(accounts_match(&account, &account));
    }

    /// Spaces and dashes never change the outcome.
    #[test]
    fn prop_formatting_is_ignored(
        reported in account(),
        expected in account(),
        seps in prop::collection::vec(any::<u8>(), 1..8),
    ) {
        let decorated = decorate(&reported, &seps);
        prop_assert_eq!(normalize_account(&decorated), reported.clone());
        prop_assert_eq!(
            accounts_match(&decorated, &expected),
            accounts_match(&reported, &expected)
        );
    }

    /// Masking the middle of the expected account still matches.
    #[test]
    fn prop_masked_middle_matches(
        account in account(),
        prefix_len in 0usize..4,
        mask_len in 1usize..6,
    ) {
        let suffix_start = account.len() - MIN_SUFFIX_LEN;
        prop_assume!(prefix_len < suffix_start);

        let masked = format!(
            "{}{}{}",
            &account[..prefix_len],
            "*".repeat(mask_len),
            &account[suffix_start..]
        );
        prop_assert!(accounts_match(&masked, &account));
    }

    /// A different last digit never matches an unmasked report.
    #[test]
    fn prop_wrong_last_digit_rejected(account in account(), bump in 1u32..10) {
        let last = account.chars().last().and_then(|c| c.to_digit(10)).unwrap_or(0);
        let replacement = char::from_digit((last + bump) % 10, 10).unwrap_or('0');
        let mut other = account.clone();
        other.pop();
        other.push(replacement);

        prop_assert!(!accounts_match(&other, &account));
    }

    /// Fewer than the minimum visible trailing digits never match.
    #[test]
    fn prop_short_suffix_rejected(account in account(), visible in 0usize..MIN_SUFFIX_LEN) {
        let masked = format!("****{}", &account[account.len() - visible..]);
        prop_assert!(!accounts_match(&masked, &account));
    }
}
