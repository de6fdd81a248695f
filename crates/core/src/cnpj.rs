//! CNPJ normalization.
//!
//! Tax identifiers arrive in two shapes: a raw 14-digit string and the
//! punctuated display form. Historical rows mix both, so every lookup
//! compares against the pair returned by [`both_forms`].

use crate::error::CoreError;

/// Strip everything but ASCII digits.
pub fn digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// `true` when the input cleans to exactly 14 digits.
pub fn is_valid(raw: &str) -> bool {
    digits(raw).len() == 14
}

/// Format a CNPJ into the punctuated display form.
///
/// Inputs that do not clean to exactly 14 digits pass through unchanged,
/// matching how partner identifiers of other shapes are stored.
///
/// # Examples
///
/// ```
/// use nfse_core::cnpj::display;
///
/// assert_eq!(display("25249058000102"), "25.249.058/0001-02");
/// assert_eq!(display("25.249.058/0001-02"), "25.249.058/0001-02");
/// assert_eq!(display("12345"), "12345");
/// ```
pub fn display(raw: &str) -> String {
    let d = digits(raw);
    if d.len() != 14 {
        return raw.to_string();
    }
    format!(
        "{}.{}.{}/{}-{}",
        &d[0..2],
        &d[2..5],
        &d[5..8],
        &d[8..12],
        &d[12..14]
    )
}

/// The `(display, digits)` pair used for dual-form lookups.
pub fn both_forms(raw: &str) -> (String, String) {
    (display(raw), digits(raw))
}

/// Strict variant for operator-supplied input: returns the cleaned
/// 14-digit form or rejects.
pub fn require_digits(raw: &str) -> Result<String, CoreError> {
    let d = digits(raw);
    if d.len() != 14 {
        return Err(CoreError::Validation(format!(
            "CNPJ must contain exactly 14 digits (got {} from {raw:?})",
            d.len()
        )));
    }
    Ok(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_strips_punctuation() {
        assert_eq!(digits("25.249.058/0001-02"), "25249058000102");
    }

    #[test]
    fn digits_of_empty_is_empty() {
        assert_eq!(digits(""), "");
    }

    #[test]
    fn display_formats_raw_form() {
        assert_eq!(display("25249058000102"), "25.249.058/0001-02");
    }

    #[test]
    fn display_is_idempotent_on_formatted_input() {
        assert_eq!(display("25.249.058/0001-02"), "25.249.058/0001-02");
    }

    #[test]
    fn display_passes_through_short_input() {
        assert_eq!(display("1234"), "1234");
    }

    #[test]
    fn both_forms_round_trip() {
        let (fmt, raw) = both_forms("25.249.058/0001-02");
        assert_eq!(fmt, "25.249.058/0001-02");
        assert_eq!(raw, "25249058000102");
        assert_eq!(display(&raw), fmt);
    }

    #[test]
    fn is_valid_accepts_both_forms() {
        assert!(is_valid("25249058000102"));
        assert!(is_valid("25.249.058/0001-02"));
    }

    #[test]
    fn is_valid_rejects_wrong_length() {
        assert!(!is_valid("2524905800010"));
        assert!(!is_valid(""));
    }

    #[test]
    fn require_digits_cleans_formatted_input() {
        assert_eq!(
            require_digits("25.249.058/0001-02").unwrap(),
            "25249058000102"
        );
    }

    #[test]
    fn require_digits_rejects_garbage() {
        assert!(require_digits("not-a-cnpj").is_err());
    }
}
