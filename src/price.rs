use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Decimals of the marketplace token (smallest denomination = 10^-18).
pub const TOKEN_DECIMALS: usize = 18;

/// Ticker appended to formatted prices.
pub const TOKEN_SYMBOL: &str = "HONK";

// ---------------------------------------------------------------------------
// TokenAmount
// ---------------------------------------------------------------------------

/// Unsigned integer amount in the token's smallest denomination.
///
/// Stored as normalized decimal digits (no leading zeros, `"0"` for zero) so
/// values of any magnitude order exactly: a longer digit string is larger,
/// equal lengths compare lexicographically. Never goes through `f64`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenAmount {
    digits: String,
}

impl TokenAmount {
    pub fn zero() -> Self {
        Self { digits: "0".to_string() }
    }

    /// Parse a non-negative decimal integer string. Surrounding whitespace is
    /// ignored; anything else that is not an ASCII digit makes it invalid.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let trimmed = s.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        Some(Self { digits: digits.to_string() })
    }

    /// Like [`TokenAmount::parse`] but unparseable input becomes zero, the
    /// minimum amount.
    pub fn parse_or_zero(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(Self::zero)
    }

    pub fn is_zero(&self) -> bool {
        self.digits == "0"
    }

    pub fn as_str(&self) -> &str {
        &self.digits
    }

    /// Parse a decimal such as `"12.5"` into smallest units with `decimals`
    /// fraction digits. Inverse of [`TokenAmount::format_units`] at full
    /// precision.
    ///
    /// Returns `None` for signs, exponents, empty input, or more fraction
    /// digits than `decimals` can hold. `"1."` and `".5"` are accepted.
    pub fn parse_units(s: &str, decimals: usize) -> Option<Self> {
        let s = s.trim();
        let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if frac_part.len() > decimals {
            return None;
        }
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return None;
        }
        let padding = "0".repeat(decimals - frac_part.len());
        Self::parse(&format!("0{int_part}{frac_part}{padding}"))
    }

    /// Render as a decimal with `decimals` implied fraction digits, rounded
    /// half-up to `places` fraction digits.
    ///
    /// `1234500000000000000` with 18 decimals and 2 places → `"1.23"`.
    pub fn format_units(&self, decimals: usize, places: usize) -> String {
        let places = places.min(decimals);
        let padded = if self.digits.len() <= decimals {
            format!("{}{}", "0".repeat(decimals + 1 - self.digits.len()), self.digits)
        } else {
            self.digits.clone()
        };
        let split = padded.len() - decimals;
        let mut kept: Vec<u8> = padded.as_bytes()[..split + places].to_vec();
        let round_up = padded
            .as_bytes()
            .get(split + places)
            .is_some_and(|&b| b >= b'5');
        if round_up {
            increment_digits(&mut kept);
        }

        // A carry may have grown the integer part by one digit.
        let int_len = kept.len() - places;
        let (int_part, frac_part) = kept.split_at(int_len);
        let int_str = std::str::from_utf8(int_part).unwrap_or("0");
        let int_str = match int_str.trim_start_matches('0') {
            "" => "0",
            s => s,
        };
        if places == 0 {
            int_str.to_string()
        } else {
            format!("{int_str}.{}", std::str::from_utf8(frac_part).unwrap_or(""))
        }
    }
}

/// Add one to an ASCII decimal digit buffer in place.
fn increment_digits(buf: &mut Vec<u8>) {
    for b in buf.iter_mut().rev() {
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            return;
        }
    }
    buf.insert(0, b'1');
}

impl Default for TokenAmount {
    fn default() -> Self {
        Self::zero()
    }
}

impl Ord for TokenAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.digits
            .len()
            .cmp(&other.digits.len())
            .then_with(|| self.digits.cmp(&other.digits))
    }
}

impl PartialOrd for TokenAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digits)
    }
}

impl From<u128> for TokenAmount {
    fn from(v: u128) -> Self {
        Self { digits: v.to_string() }
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.digits)
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    /// Accepts a decimal string or a JSON integer. Malformed amounts degrade
    /// to zero instead of failing the whole record.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = serde_json::Value::deserialize(deserializer)?;
        Ok(match v {
            serde_json::Value::String(s) => Self::parse_or_zero(&s),
            serde_json::Value::Number(n) => n.as_u64().map(|n| Self::from(n as u128)).unwrap_or_default(),
            _ => Self::zero(),
        })
    }
}

/// Display form used by the API and the terminal browser: `"12.50 HONK"`.
pub fn format_price(amount: &TokenAmount) -> String {
    format!("{} {TOKEN_SYMBOL}", amount.format_units(TOKEN_DECIMALS, 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(s: &str) -> TokenAmount {
        TokenAmount::parse(s).unwrap()
    }

    #[test]
    fn orders_past_f64_precision() {
        assert!(amt("999999999999999999999") < amt("1000000000000000000000"));
        assert!(amt("100000000000000000000000001") > amt("100000000000000000000000000"));
    }

    #[test]
    fn leading_zeros_do_not_change_value() {
        assert_eq!(amt("000123"), amt("123"));
        assert_eq!(amt("0000"), TokenAmount::zero());
        assert!(amt("0009") < amt("10"));
    }

    #[test]
    fn rejects_non_digits() {
        assert!(TokenAmount::parse("").is_none());
        assert!(TokenAmount::parse("-5").is_none());
        assert!(TokenAmount::parse("1.5").is_none());
        assert!(TokenAmount::parse("0x10").is_none());
        assert!(TokenAmount::parse_or_zero("abc").is_zero());
    }

    #[test]
    fn formats_with_rounding() {
        assert_eq!(amt("1234500000000000000").format_units(18, 2), "1.23");
        assert_eq!(amt("1235000000000000000").format_units(18, 2), "1.24");
        assert_eq!(amt("999500000000000000").format_units(18, 2), "1.00");
        assert_eq!(amt("5").format_units(18, 2), "0.00");
        assert_eq!(amt("0").format_units(18, 2), "0.00");
        assert_eq!(amt("12000000000000000000000").format_units(18, 0), "12000");
    }

    #[test]
    fn parses_decimal_prices_into_units() {
        assert_eq!(TokenAmount::parse_units("12.5", 18), Some(amt("12500000000000000000")));
        assert_eq!(TokenAmount::parse_units(" 3 ", 18), Some(amt("3000000000000000000")));
        assert_eq!(TokenAmount::parse_units("0.000000000000000001", 18), Some(amt("1")));
        assert_eq!(TokenAmount::parse_units(".5", 2), Some(amt("50")));
        assert_eq!(TokenAmount::parse_units("7.", 2), Some(amt("700")));
        assert_eq!(TokenAmount::parse_units("0", 18), Some(TokenAmount::zero()));

        let price = TokenAmount::parse_units("1000000000000000000000.25", 18).unwrap();
        assert_eq!(price.format_units(18, 2), "1000000000000000000000.25");
    }

    #[test]
    fn rejects_malformed_decimal_prices() {
        for bad in ["", ".", "-1", "+1", "1e18", "1.2.3", "abc", "1,5", "0.0000000000000000001"] {
            assert_eq!(TokenAmount::parse_units(bad, 18), None, "{bad:?}");
        }
        assert_eq!(TokenAmount::parse_units("1.234", 2), None);
    }

    #[test]
    fn format_price_appends_symbol() {
        assert_eq!(format_price(&amt("2500000000000000000")), "2.50 HONK");
    }

    #[test]
    fn deserializes_strings_and_numbers() {
        let a: TokenAmount = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(a, amt("42"));
        let b: TokenAmount = serde_json::from_str("7").unwrap();
        assert_eq!(b, amt("7"));
        let c: TokenAmount = serde_json::from_str("\"garbage\"").unwrap();
        assert!(c.is_zero());
        assert_eq!(serde_json::to_string(&amt("0010")).unwrap(), "\"10\"");
    }
}
