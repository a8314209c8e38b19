//! Money amounts
//!
//! Prices are kept as whole euro cents. Vendor pages print them in several
//! shapes ("19,95 €", "19.95€", "1 299,00 EUR"), so parsing is lenient about
//! decoration but strict about the number itself.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// A non-negative price in euro cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(u32);

fn number_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(\d{1,3}(?:[ \x{a0}\x{202f}]\d{3})+|\d+)(?:[.,](\d+))?").ok()
        })
        .as_ref()
}

impl Price {
    pub const fn from_cents(cents: u32) -> Self {
        Self(cents)
    }

    pub const fn cents(&self) -> u32 {
        self.0
    }

    /// Parses a price out of display text
    ///
    /// The first number in the text is taken; a decimal comma or dot is
    /// accepted, and groups of three digits may be separated by a space or a
    /// non-breaking space. Extra fraction digits beyond cents are truncated.
    ///
    /// # Returns
    ///
    /// `None` when the text contains no number or the amount does not fit.
    pub fn parse(text: &str) -> Option<Self> {
        let captures = number_pattern()?.captures(text)?;
        let whole: String = captures
            .get(1)?
            .as_str()
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        let whole: u32 = whole.parse().ok()?;

        let fraction = match captures.get(2) {
            Some(digits) => {
                let digits = digits.as_str();
                let mut padded: String = digits.chars().take(2).collect();
                while padded.len() < 2 {
                    padded.push('0');
                }
                padded.parse::<u32>().ok()?
            }
            None => 0,
        };

        whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction))
            .map(Self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02} €", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Price {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with('-') {
            return Err(format!("price must not be negative: {}", s));
        }
        Self::parse(trimmed).ok_or_else(|| format!("not a price: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_decimal_comma() {
        assert_eq!(Price::parse("19,95 €"), Some(Price::from_cents(1995)));
    }

    #[test]
    fn test_parse_decimal_dot_without_space() {
        assert_eq!(Price::parse("19.95€"), Some(Price::from_cents(1995)));
    }

    #[test]
    fn test_parse_thousands_separated_by_space() {
        assert_eq!(
            Price::parse("1\u{a0}299,00 EUR"),
            Some(Price::from_cents(129_900))
        );
    }

    #[test]
    fn test_parse_whole_euros() {
        assert_eq!(Price::parse("15 €"), Some(Price::from_cents(1500)));
    }

    #[test]
    fn test_parse_takes_first_amount_only() {
        assert_eq!(Price::parse("15 € 24,95 €"), Some(Price::from_cents(1500)));
        assert_eq!(Price::parse("12,95 € 19,95 €"), Some(Price::from_cents(1295)));
    }

    #[test]
    fn test_parse_single_fraction_digit() {
        assert_eq!(Price::parse("9,5"), Some(Price::from_cents(950)));
    }

    #[test]
    fn test_parse_truncates_extra_fraction_digits() {
        assert_eq!(Price::parse("9.999"), Some(Price::from_cents(999)));
    }

    #[test]
    fn test_parse_no_number() {
        assert_eq!(Price::parse("Loppuunmyyty"), None);
        assert_eq!(Price::parse(""), None);
    }

    #[test]
    fn test_parse_overflow() {
        assert_eq!(Price::parse("99999999999 €"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::from_cents(1500).to_string(), "15.00 €");
        assert_eq!(Price::from_cents(7).to_string(), "0.07 €");
    }

    #[test]
    fn test_from_str_rejects_negative() {
        assert!("-3.00".parse::<Price>().is_err());
        assert_eq!("18.00".parse::<Price>(), Ok(Price::from_cents(1800)));
    }

    #[test]
    fn test_ordering_follows_amount() {
        assert!(Price::from_cents(1500) < Price::from_cents(2000));
    }
}
