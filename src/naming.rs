//! Random file-name tokens and URL slugs.

use rand::seq::IndexedRandom;
use thiserror::Error;

/// Alphabet the token source samples from.
pub const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOP0123456789-+";

/// Token length used for renamed uploads.
pub const DEFAULT_TOKEN_LENGTH: usize = 25;

/// Errors from [`slugify`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlugError {
    /// The input string was empty.
    #[error("empty string not permitted")]
    EmptyInput,

    /// Nothing sluggable survived filtering.
    #[error("after removing characters, slug is zero length")]
    EmptySlug,
}

/// Returns a random string of `length` characters drawn uniformly from
/// [`TOKEN_ALPHABET`].
///
/// Backed by [`rand::rng`], a cryptographically secure generator, so tokens
/// are safe to use as unguessable file names for untrusted uploads.
pub fn random_token(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let byte = TOKEN_ALPHABET
                .choose(&mut rng)
                .expect("token alphabet is non-empty");
            *byte as char
        })
        .collect()
}

/// Reduces a string to a URL-safe slug.
///
/// Lowercases the input, collapses every run of characters outside
/// `[a-z0-9]` into a single `-`, and trims leading/trailing dashes.
///
/// # Errors
///
/// - [`SlugError::EmptyInput`] for an empty input
/// - [`SlugError::EmptySlug`] when nothing remains after filtering
///   (e.g. the input had no ASCII letters or digits at all)
pub fn slugify(input: &str) -> Result<String, SlugError> {
    if input.is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let mut slug = String::with_capacity(input.len());
    for ch in input.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            slug.push(ch);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        return Err(SlugError::EmptySlug);
    }
    Ok(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_has_requested_length_and_alphabet() {
        for length in [0, 1, 25, 100] {
            let token = random_token(length);
            assert_eq!(token.len(), length);
            assert!(token.bytes().all(|b| TOKEN_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn tokens_do_not_repeat() {
        let a = random_token(DEFAULT_TOKEN_LENGTH);
        let b = random_token(DEFAULT_TOKEN_LENGTH);
        assert_ne!(a, b);
    }

    #[test]
    fn slugify_basic_cases() {
        let cases = [
            ("hello world", "hello-world"),
            ("NOW is the time 123", "now-is-the-time-123"),
            ("  spaced  out  ", "spaced-out"),
            ("already-a-slug", "already-a-slug"),
            ("Trailing!!!", "trailing"),
        ];
        for (input, expected) in cases {
            assert_eq!(slugify(input).unwrap(), expected, "input {input:?}");
        }
    }

    #[test]
    fn slugify_rejects_empty_input() {
        assert_eq!(slugify(""), Err(SlugError::EmptyInput));
    }

    #[test]
    fn slugify_rejects_unsluggable_input() {
        // No ASCII letters or digits survive the filter.
        assert_eq!(slugify("日本語!!"), Err(SlugError::EmptySlug));
        assert_eq!(slugify("!!!"), Err(SlugError::EmptySlug));
    }
}
