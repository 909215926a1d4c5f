//! ISBN normalization and validation.
//!
//! Scanned barcodes and user input arrive with hyphens, spaces and
//! surrounding noise; everything here strips that before checking.

use thiserror::Error;

/// Validation error types
#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Invalid ISBN: {0}")]
    InvalidIsbn(String),

    #[error("Invalid ISBN checksum: {0}")]
    BadChecksum(String),
}

/// Strip separators and surrounding noise from an ISBN.
///
/// Returns the bare 10- or 13-character ISBN. Only hyphens and spaces are
/// tolerated between digits. A trailing `X` is kept as the ISBN-10 check
/// character when exactly nine digits precede it, and dropped as noise otherwise.
pub fn normalize_isbn(raw: &str) -> Result<String, ValidationError> {
    let start = raw.trim_start_matches(|c: char| !c.is_ascii_digit());
    let core = start.trim_end_matches(|c: char| !c.is_ascii_digit());

    if core.is_empty() {
        return Err(ValidationError::InvalidIsbn(raw.to_string()));
    }

    let mut isbn = String::with_capacity(13);
    for ch in core.chars() {
        match ch {
            '0'..='9' => isbn.push(ch),
            '-' | ' ' => {}
            _ => return Err(ValidationError::InvalidIsbn(raw.to_string())),
        }
    }

    let tail = start[core.len()..].trim_start_matches(['-', ' ']);
    if isbn.len() == 9 && tail.starts_with(['X', 'x']) {
        isbn.push('X');
    }

    if isbn.len() != 13 && isbn.len() != 10 {
        return Err(ValidationError::InvalidIsbn(raw.to_string()));
    }

    Ok(isbn)
}

/// Validate an ISBN-13 (978/979 prefix, correct check digit).
pub fn validate_isbn13(raw: &str) -> Result<String, ValidationError> {
    let isbn = normalize_isbn(raw)?;
    if isbn.len() != 13 || !(isbn.starts_with("978") || isbn.starts_with("979")) {
        return Err(ValidationError::InvalidIsbn(raw.to_string()));
    }

    let digits: Vec<u32> = isbn.chars().filter_map(|c| c.to_digit(10)).collect();
    let sum: u32 = digits[..12]
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    let check = (10 - sum % 10) % 10;

    if check != digits[12] {
        return Err(ValidationError::BadChecksum(isbn));
    }

    Ok(isbn)
}

/// Validate an ISBN-10 (mod-11 check character, `X` = 10).
pub fn validate_isbn10(raw: &str) -> Result<String, ValidationError> {
    let isbn = normalize_isbn(raw)?;
    if isbn.len() != 10 {
        return Err(ValidationError::InvalidIsbn(raw.to_string()));
    }

    let sum: u32 = isbn
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let value = if c == 'X' { 10 } else { c.to_digit(10).unwrap_or(0) };
            value * (10 - i as u32)
        })
        .sum();

    if sum % 11 != 0 {
        return Err(ValidationError::BadChecksum(isbn));
    }

    Ok(isbn)
}

/// Whether `raw` is a book ISBN-13 the scanner should accept
pub fn is_valid_isbn(raw: &str) -> bool {
    validate_isbn13(raw).is_ok()
}
