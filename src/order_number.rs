//! Purchase-order number normalization and format classification.
//!
//! Insertion orders print order numbers in a handful of shapes: plain
//! numerics that sometimes carry a revision decimal ("40104.1"), dashed
//! identifiers with a revision token ("O-57GQ7-R4"), and compact
//! alphanumerics ("CP32K5B"). Downstream systems key on the base number,
//! so revision suffixes are stripped before matching.

/// Recognized order-number shapes, most specific first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderNumberFormat {
    /// Dashed identifier: one letter, a dash, then 4+ alphanumerics,
    /// optionally a short trailing group ("O-57GQ7", "O-57GQ7-R4").
    Dashed,
    /// 4+ digits, not year-like ("40104").
    Numeric,
    /// Letters then a digit then more alphanumerics ("CP32K5B").
    Alphanumeric,
    Unrecognized,
}

const STOP_WORDS: &[&str] = &[
    "and", "the", "for", "with", "from", "order", "number", "sent", "date",
];

/// Strip revision suffixes so "40104.1" and "40104" resolve to the same
/// order, as do "O-57GQ7-R4" and "O-57GQ7".
pub fn normalize_order_number(raw: &str) -> String {
    let mut value = raw.trim().to_string();

    // Decimal revision on a numeric base: "40104.1" -> "40104".
    if let Some(dot) = value.find('.') {
        let (base, suffix) = value.split_at(dot);
        if base.len() >= 3
            && base.chars().all(|c| c.is_ascii_digit())
            && suffix[1..].chars().all(|c| c.is_ascii_digit())
        {
            value.truncate(dot);
        }
    }

    // Trailing revision token on a dashed id: "O-57GQ7-R4" -> "O-57GQ7".
    if let Some(dash) = value.rfind('-') {
        let tail = &value[dash + 1..];
        let mut chars = tail.chars();
        let is_revision = matches!(chars.next(), Some('R') | Some('r'))
            && !tail[1..].is_empty()
            && tail[1..].chars().all(|c| c.is_ascii_digit());
        if is_revision && value[..dash].contains('-') {
            value.truncate(dash);
        }
    }

    value
}

/// Reject values that cannot be an order number: stop words picked up from
/// surrounding label text, all-alphabetic tokens, and anything under three
/// characters.
pub fn is_plausible_candidate(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.len() < 3 {
        return false;
    }
    if STOP_WORDS.contains(&trimmed.to_lowercase().as_str()) {
        return false;
    }
    if trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    true
}

pub fn classify_order_number(value: &str) -> OrderNumberFormat {
    let trimmed = value.trim();

    if is_dashed(trimmed) {
        return OrderNumberFormat::Dashed;
    }
    if is_numeric(trimmed) {
        return OrderNumberFormat::Numeric;
    }
    if is_alphanumeric_code(trimmed) {
        return OrderNumberFormat::Alphanumeric;
    }

    OrderNumberFormat::Unrecognized
}

fn is_dashed(value: &str) -> bool {
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() != 2 && parts.len() != 3 {
        return false;
    }

    let head_ok = parts[0].len() == 1
        && parts[0].chars().all(|c| c.is_ascii_alphabetic());
    let body_ok = parts[1].len() >= 4
        && parts[1].chars().all(|c| c.is_ascii_alphanumeric());
    let tail_ok = parts.len() == 2
        || ((1..=2).contains(&parts[2].len())
            && parts[2].chars().all(|c| c.is_ascii_alphanumeric()));

    head_ok && body_ok && tail_ok
}

fn is_numeric(value: &str) -> bool {
    value.len() >= 4
        && value.chars().all(|c| c.is_ascii_digit())
        // Years and YYYYMMDD stamps masquerade as order numbers.
        && !value.starts_with("20")
}

fn is_alphanumeric_code(value: &str) -> bool {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() < 5 || !chars.iter().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }

    let Some(first_digit) = chars.iter().position(|c| c.is_ascii_digit()) else {
        return false;
    };

    // At least two leading letters, a digit, then at least two more chars.
    first_digit >= 2 && chars.len() - first_digit - 1 >= 2
}
