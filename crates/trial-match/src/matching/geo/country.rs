use serde::{Deserialize, Serialize};

/// Countries with a postal-code reference table on board.
///
/// `ALL` doubles as the fixed scan order for codes whose shape gives no
/// hint, so resolution stays deterministic across processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountryCode {
    Us,
    Ca,
    Gb,
    De,
    Fr,
    Es,
    It,
    Nl,
    Mx,
}

impl CountryCode {
    pub const ALL: [CountryCode; 9] = [
        CountryCode::Us,
        CountryCode::Ca,
        CountryCode::Gb,
        CountryCode::De,
        CountryCode::Fr,
        CountryCode::Es,
        CountryCode::It,
        CountryCode::Nl,
        CountryCode::Mx,
    ];

    pub const fn alpha2(self) -> &'static str {
        match self {
            CountryCode::Us => "US",
            CountryCode::Ca => "CA",
            CountryCode::Gb => "GB",
            CountryCode::De => "DE",
            CountryCode::Fr => "FR",
            CountryCode::Es => "ES",
            CountryCode::It => "IT",
            CountryCode::Nl => "NL",
            CountryCode::Mx => "MX",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        CountryCode::ALL
            .into_iter()
            .find(|country| country.alpha2().eq_ignore_ascii_case(value))
    }
}

/// Five-digit numeric codes are most often one of these.
const DIGITS_FIVE: [CountryCode; 6] = [
    CountryCode::Us,
    CountryCode::De,
    CountryCode::Fr,
    CountryCode::Es,
    CountryCode::It,
    CountryCode::Mx,
];

/// Short alphanumeric codes are most often one of these.
const ALPHANUMERIC: [CountryCode; 3] = [CountryCode::Ca, CountryCode::Gb, CountryCode::Nl];

/// Split an explicit `CC:code` / `CC-code` country prefix off a postal code.
pub(crate) fn split_country_prefix(raw: &str) -> Option<(CountryCode, &str)> {
    let raw = raw.trim();
    let (prefix, rest) = raw
        .split_once(':')
        .or_else(|| raw.split_once('-'))?;
    let country = CountryCode::parse(prefix)?;
    let rest = rest.trim();
    if rest.is_empty() {
        return None;
    }
    Some((country, rest))
}

/// Ordered list of countries worth trying for a code of this shape.
pub(crate) fn candidate_countries(normalized: &str) -> &'static [CountryCode] {
    let compact_len = normalized.chars().filter(|c| !c.is_whitespace()).count();
    if normalized.chars().all(|c| c.is_ascii_digit()) && compact_len == 5 {
        &DIGITS_FIVE
    } else if normalized.chars().any(|c| c.is_ascii_alphabetic()) && compact_len <= 7 {
        &ALPHANUMERIC
    } else {
        &CountryCode::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_digit_codes_favor_numeric_postal_countries() {
        let candidates = candidate_countries("10001");
        assert_eq!(candidates.first(), Some(&CountryCode::Us));
        assert!(candidates.contains(&CountryCode::De));
        assert!(!candidates.contains(&CountryCode::Ca));
    }

    #[test]
    fn short_alphanumeric_codes_favor_alpha_postal_countries() {
        assert_eq!(candidate_countries("K1A0B1"), &ALPHANUMERIC);
        assert_eq!(candidate_countries("SW1A1AA"), &ALPHANUMERIC);
    }

    #[test]
    fn odd_shapes_scan_the_full_list() {
        assert_eq!(candidate_countries("123456789012"), &CountryCode::ALL);
        assert_eq!(candidate_countries("1234"), &CountryCode::ALL);
    }

    #[test]
    fn prefix_split_requires_known_country_and_remainder() {
        assert_eq!(
            split_country_prefix("US:10001"),
            Some((CountryCode::Us, "10001"))
        );
        assert_eq!(
            split_country_prefix("de-80331"),
            Some((CountryCode::De, "80331"))
        );
        assert_eq!(split_country_prefix("ZZ:10001"), None);
        assert_eq!(split_country_prefix("US:"), None);
        assert_eq!(split_country_prefix("10001"), None);
    }
}
