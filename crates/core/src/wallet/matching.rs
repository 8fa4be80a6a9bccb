//! Receiver account matching.
//!
//! Verifiers report the account a transfer was credited to in whatever shape
//! the bank prints it: with spaces, dashes, or masked (`1000****9601`). An
//! expected receiver matches when, after normalization:
//!
//! 1. the accounts are equal, or
//! 2. the visible parts of a masked report line up with the expected account
//!    (prefix before the mask, suffix after it), or
//! 3. one unmasked account is a trailing substring of the other, or
//! 4. both names are present and equal.

use serde::{Deserialize, Serialize};

/// Characters banks use to hide account digits.
const MASK_CHARS: [char; 3] = ['*', 'x', '•'];

/// Fewest visible trailing characters accepted for a suffix match.
pub const MIN_SUFFIX_LEN: usize = 4;

/// A receiver account the transfer is expected to land in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedReceiver {
    /// Account number as configured.
    pub account: String,
    /// Account holder name as configured.
    pub name: Option<String>,
}

/// Strips whitespace and dashes and lower-cases the account.
#[must_use]
pub fn normalize_account(account: &str) -> String {
    account
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Collapses whitespace runs and lower-cases the name.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns true if a reported account identifies the expected account.
#[must_use]
pub fn accounts_match(reported: &str, expected: &str) -> bool {
    let reported = normalize_account(reported);
    let expected = normalize_account(expected);

    if reported.is_empty() || expected.is_empty() {
        return false;
    }
    if reported == expected {
        return true;
    }

    if let Some(first_mask) = reported.find(MASK_CHARS) {
        let last_mask = reported.rfind(MASK_CHARS).unwrap_or(first_mask);
        let prefix = &reported[..first_mask];
        let mask_end = last_mask + reported[last_mask..].chars().next().map_or(1, char::len_utf8);
        let suffix = &reported[mask_end..];

        return suffix.chars().count() >= MIN_SUFFIX_LEN
            && expected.len() > prefix.len() + suffix.len()
            && expected.starts_with(prefix)
            && expected.ends_with(suffix);
    }

    let (shorter, longer) = if reported.len() <= expected.len() {
        (&reported, &expected)
    } else {
        (&expected, &reported)
    };
    shorter.chars().count() >= MIN_SUFFIX_LEN && longer.ends_with(shorter.as_str())
}

/// Returns true if both names are present and equal after normalization.
#[must_use]
pub fn names_match(reported: Option<&str>, expected: Option<&str>) -> bool {
    match (reported, expected) {
        (Some(reported), Some(expected)) => {
            let reported = normalize_name(reported);
            !reported.is_empty() && reported == normalize_name(expected)
        }
        _ => false,
    }
}

/// Full receiver check: account match, or name equality fallback.
#[must_use]
pub fn receiver_matches(
    reported_account: Option<&str>,
    reported_name: Option<&str>,
    expected: &ExpectedReceiver,
) -> bool {
    reported_account.is_some_and(|account| accounts_match(account, &expected.account))
        || names_match(reported_name, expected.name.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1000675169601", "1000675169601", true)]
    #[case("1000-6751-69601", "1000 675169601", true)]
    #[case("1000****9601", "1000675169601", true)]
    #[case("****9601", "1000675169601", true)]
    #[case("xxxx9601", "1000675169601", true)]
    #[case("9601", "1000675169601", true)]
    #[case("1234567", "1000675169601", false)]
    #[case("1000****9602", "1000675169601", false)]
    #[case("2000****9601", "1000675169601", false)]
    #[case("****601", "1000675169601", false)]
    #[case("601", "1000675169601", false)]
    #[case("", "1000675169601", false)]
    #[case("1000675169601", "", false)]
    fn test_accounts_match(#[case] reported: &str, #[case] expected: &str, #[case] matches: bool) {
        assert_eq!(accounts_match(reported, expected), matches);
    }

    #[test]
    fn test_expected_account_trailing_in_reported() {
        // Some banks prefix the branch code to the printed account.
        assert!(accounts_match("0011000675169601", "1000675169601"));
    }

    #[test]
    fn test_mask_cannot_cover_nothing() {
        // Visible parts add up to the whole expected account: the mask hides no digits.
        assert!(!accounts_match("1000****675169601", "1000675169601"));
    }

    #[test]
    fn test_normalize_account() {
        assert_eq!(normalize_account(" 1000-6751 69601 "), "1000675169601");
        assert_eq!(normalize_account("AB-12"), "ab12");
    }

    #[test]
    fn test_name_fallback() {
        let expected = ExpectedReceiver {
            account: "1000675169601".to_string(),
            name: Some("Kasa  Payments PLC".to_string()),
        };
        assert!(receiver_matches(None, Some("kasa payments plc"), &expected));
        assert!(receiver_matches(
            Some("9999999999"),
            Some("KASA PAYMENTS PLC"),
            &expected
        ));
        assert!(!receiver_matches(None, Some("Other Co"), &expected));
        assert!(!receiver_matches(None, None, &expected));
    }

    #[test]
    fn test_name_fallback_needs_both_names() {
        let expected = ExpectedReceiver {
            account: "1000675169601".to_string(),
            name: None,
        };
        assert!(!receiver_matches(None, Some("Kasa Payments"), &expected));
        assert!(receiver_matches(Some("1000****9601"), None, &expected));
    }
}
