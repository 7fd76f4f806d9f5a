//! Identity formats, normalisation and the age rule.

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

pub const MINIMUM_AGE: i32 = 18;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

fn pan_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z]{5}[0-9]{4}[A-Z]$").expect("static regex"))
}

fn mobile_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("static regex"))
}

/// PANs are stored upper-cased, so lookups and uniqueness ignore case.
pub fn normalize_pan(pan: &str) -> String {
    pan.trim().to_uppercase()
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Five letters, four digits, one letter. Expects a normalised PAN.
pub fn is_valid_pan(pan: &str) -> bool {
    pan_regex().is_match(pan)
}

pub fn is_valid_mobile(mobile: &str) -> bool {
    mobile_regex().is_match(mobile)
}

/// Whole years between `dob` and `today`, counting a birthday only once it has occurred.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let years = today.year() - dob.year();
    let birthday_passed = (today.month(), today.day()) >= (dob.month(), dob.day());
    if birthday_passed {
        years
    } else {
        years - 1
    }
}

pub fn is_adult(dob: NaiveDate, today: NaiveDate) -> bool {
    age_on(dob, today) >= MINIMUM_AGE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn pan_format() {
        assert!(is_valid_pan("ABCDE1234F"));
        assert!(!is_valid_pan("abcde1234f"));
        assert!(is_valid_pan(&normalize_pan(" abcde1234f ")));
        assert!(!is_valid_pan("ABCD1234F"));
        assert!(!is_valid_pan("ADMIN1234567"));
    }

    #[test]
    fn mobile_shapes() {
        assert!(is_valid_mobile("9876543210"));
        assert!(is_valid_mobile("+919876543210"));
        assert!(!is_valid_mobile("98765"));
    }

    #[test]
    fn one_day_short_of_eighteen_is_a_minor() {
        let today = date(2024, 6, 15);
        assert_eq!(age_on(date(2006, 6, 16), today), 17);
        assert!(!is_adult(date(2006, 6, 16), today));
    }

    #[test]
    fn eighteenth_birthday_counts() {
        let today = date(2024, 6, 15);
        assert_eq!(age_on(date(2006, 6, 15), today), 18);
        assert!(is_adult(date(2006, 6, 15), today));
    }

    #[test]
    fn leap_day_birthday() {
        assert_eq!(age_on(date(2004, 2, 29), date(2022, 2, 28)), 17);
        assert_eq!(age_on(date(2004, 2, 29), date(2022, 3, 1)), 18);
    }
}
