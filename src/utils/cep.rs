//! CEP normalization and validation.

use regex::Regex;
use std::sync::LazyLock;

/// Digits with the usual `-`, `.` and space separators, e.g. `01310-100`.
static CEP_INPUT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d{2}\.?\d{3}[-\s]?\d{3}\s*$").unwrap());

/// Number of digits in a CEP.
pub const CEP_LENGTH: usize = 8;

/// Errors for inputs that cannot be a CEP.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CepError {
    #[error("CEP is empty")]
    Empty,

    #[error("CEP must have 8 digits, got {0}")]
    InvalidLength(usize),

    #[error("CEP contains invalid characters")]
    InvalidCharacters,
}

/// Reduces a user-supplied CEP to its 8 digits.
///
/// Accepts the plain (`01310100`) and punctuated (`01310-100`, `01.310-100`)
/// forms, so equivalent inputs share one cache key.
///
/// # Errors
///
/// - [`CepError::Empty`] for blank input
/// - [`CepError::InvalidCharacters`] for letters or unexpected separators
/// - [`CepError::InvalidLength`] when the digit count is not 8
pub fn normalize_cep(input: &str) -> Result<String, CepError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CepError::Empty);
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if trimmed
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '-' | '.' | ' ')))
    {
        return Err(CepError::InvalidCharacters);
    }
    if digits.len() != CEP_LENGTH {
        return Err(CepError::InvalidLength(digits.len()));
    }
    if !CEP_INPUT_REGEX.is_match(trimmed) {
        return Err(CepError::InvalidCharacters);
    }

    Ok(digits)
}
