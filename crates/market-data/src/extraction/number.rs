//! Vietnamese-locale number parsing.
//!
//! SBV pages print rates as `23.977` (dot as thousands separator) while bank
//! feeds use `24,150.00`. A separator followed by exactly three digits is a
//! thousands separator; when both separators appear the last one is the
//! decimal point.

use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;

/// Maximal run of digits and separators, starting and ending on a digit.
///
/// The whole run goes to [`parse_vn_number`], so "23.9771" stays one token
/// instead of splitting into "23.977" and "1".
pub(crate) const NUMBER_PATTERN: &str = r"\d(?:[\d.,]*\d)?";

lazy_static! {
    pub(crate) static ref NUMBER_TOKEN: Regex = Regex::new(NUMBER_PATTERN).unwrap();
}

/// Parse a number printed with Vietnamese or English grouping.
///
/// Returns `None` for anything that is not a well-formed number. The result
/// keeps the fractional digits the source printed and never adds any.
pub fn parse_vn_number(token: &str) -> Option<Decimal> {
    let token = token.trim();
    if token.is_empty() || !token.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',') {
        return None;
    }

    let last_dot = token.rfind('.');
    let last_comma = token.rfind(',');

    let (integer, fraction, group_sep) = match (last_dot, last_comma) {
        (None, None) => (token, None, None),
        (Some(d), Some(c)) => {
            let (dec_pos, group) = if d > c { (d, ',') } else { (c, '.') };
            let decimal_sep = token.as_bytes()[dec_pos] as char;
            if token.matches(decimal_sep).count() != 1 {
                return None;
            }
            (&token[..dec_pos], Some(&token[dec_pos + 1..]), Some(group))
        }
        (Some(pos), None) | (None, Some(pos)) => {
            let sep = token.as_bytes()[pos] as char;
            let after = token.len() - pos - 1;
            if token.matches(sep).count() > 1 || (after == 3 && pos <= 3) {
                (token, None, Some(sep))
            } else {
                (&token[..pos], Some(&token[pos + 1..]), None)
            }
        }
    };

    let digits = match group_sep {
        Some(sep) => ungroup(integer, sep)?,
        None => {
            if integer.is_empty() || !integer.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            integer.to_string()
        }
    };

    let normalized = match fraction {
        Some(frac) if !frac.is_empty() && frac.chars().all(|c| c.is_ascii_digit()) => {
            format!("{}.{}", digits, frac)
        }
        Some(_) => return None,
        None => digits,
    };

    Decimal::from_str(&normalized).ok()
}

/// Strip thousands separators, checking the groups are well formed.
fn ungroup(integer: &str, sep: char) -> Option<String> {
    let mut groups = integer.split(sep);
    let first = groups.next()?;
    if first.is_empty() || first.len() > 3 || !first.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let mut digits = first.to_string();
    for group in groups {
        if group.len() != 3 || !group.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}
