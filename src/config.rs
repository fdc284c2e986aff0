//! Configuration types for the intake pipelines.
//!
//! This module defines [`IntakeConfig`], the caller-supplied settings object
//! shared by the upload and JSON pipelines, and [`Limits`], the effective
//! byte-ceiling snapshot each call derives from it. The config is intended to
//! be cheap to clone and easy to deserialize from external configuration
//! formats such as JSON, TOML, or YAML.
//!
//! A stored config is never mutated by the pipelines: unset ceilings are
//! resolved to their defaults through [`IntakeConfig::limits`] at the start
//! of every call, so a zero-value config behaves identically on its first
//! and hundredth use.
//!
//! ```
//! use intake::IntakeConfig;
//!
//! let config = IntakeConfig::default();
//! config.validate().expect("defaults are valid");
//!
//! let limits = config.limits();
//! assert_eq!(limits.max_json_bytes, 1024 * 1024);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Ceiling applied to a raw multipart request body when none is configured.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 1024 * 1024 * 1024; // 1 GiB

/// Ceiling applied to a JSON body when none is configured.
pub const DEFAULT_MAX_JSON_BYTES: usize = 1024 * 1024; // 1 MiB

/// Runtime configuration shared by both intake pipelines.
///
/// All fields are optional in serialized form; an empty document
/// deserializes to the same thing as [`IntakeConfig::default`].
///
/// # Fields
///
/// - `max_upload_bytes`: aggregate ceiling for a raw multipart body
/// - `allowed_content_types`: sniffed-MIME allow-list (empty = unrestricted)
/// - `max_json_bytes`: ceiling for a JSON body
/// - `allow_unknown_json_fields`: tolerate fields absent from the target shape
///
/// # Examples
///
/// ```
/// use intake::IntakeConfig;
///
/// let config = IntakeConfig {
///     max_upload_bytes: Some(10 * 1024 * 1024),
///     allowed_content_types: ["image/png", "image/jpeg"]
///         .into_iter()
///         .map(String::from)
///         .collect(),
///     ..Default::default()
/// };
///
/// assert!(config.validate().is_ok());
/// assert!(config.is_allowed_content_type("IMAGE/PNG"));
/// assert!(!config.is_allowed_content_type("application/pdf"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// Maximum raw multipart body size in bytes.
    ///
    /// Applied to the whole request body before any part is inspected, not
    /// per file. `None` resolves to [`DEFAULT_MAX_UPLOAD_BYTES`].
    pub max_upload_bytes: Option<u64>,

    /// Sniffed content types permitted for uploaded parts.
    ///
    /// Matching is case-insensitive and runs against the type detected from
    /// the part's leading bytes, never against a client-declared header. An
    /// empty set permits any type.
    pub allowed_content_types: HashSet<String>,

    /// Maximum JSON body size in bytes.
    ///
    /// `None` resolves to [`DEFAULT_MAX_JSON_BYTES`].
    pub max_json_bytes: Option<usize>,

    /// Whether JSON bodies may carry fields the target shape does not know.
    ///
    /// When `false` (the default) an unknown field fails the decode with
    /// [`JsonError::UnknownField`](crate::JsonError::UnknownField), naming
    /// the offending field.
    pub allow_unknown_json_fields: bool,
}

/// Effective byte ceilings for one pipeline invocation.
///
/// Derived from an [`IntakeConfig`] at call time; defaults are filled in
/// here rather than written back into the caller's config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Resolved aggregate multipart body ceiling.
    pub max_upload_bytes: u64,
    /// Resolved JSON body ceiling.
    pub max_json_bytes: usize,
}

/// Errors that can occur when validating an [`IntakeConfig`].
///
/// These are configuration-time issues, intended to be surfaced at service
/// start-up rather than per request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// A ceiling was explicitly set to zero.
    ///
    /// Zero would reject every body; leave the field unset to get the
    /// default instead.
    #[error("{field} must be greater than zero when set")]
    ZeroLimit {
        /// Name of the offending field.
        field: &'static str,
    },

    /// An allow-list entry is not a `type/subtype` pair.
    #[error("allowed content type {entry:?} is not a type/subtype pair")]
    MalformedContentType {
        /// The rejected entry, verbatim.
        entry: String,
    },
}

impl IntakeConfig {
    /// Validates internal consistency of this configuration.
    ///
    /// Cheap, in-memory only; call once at start-up.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::ZeroLimit`] if a ceiling is `Some(0)`
    /// - [`ConfigError::MalformedContentType`] if an allow-list entry lacks
    ///   a `/` separating type and subtype
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_bytes == Some(0) {
            return Err(ConfigError::ZeroLimit {
                field: "max_upload_bytes",
            });
        }
        if self.max_json_bytes == Some(0) {
            return Err(ConfigError::ZeroLimit {
                field: "max_json_bytes",
            });
        }
        for entry in &self.allowed_content_types {
            let mut halves = entry.splitn(2, '/');
            let ty = halves.next().unwrap_or("");
            let subty = halves.next().unwrap_or("");
            if ty.is_empty() || subty.is_empty() {
                return Err(ConfigError::MalformedContentType {
                    entry: entry.clone(),
                });
            }
        }
        Ok(())
    }

    /// Derives the effective byte ceilings for one call.
    ///
    /// Unset ceilings resolve to [`DEFAULT_MAX_UPLOAD_BYTES`] and
    /// [`DEFAULT_MAX_JSON_BYTES`]; the config itself is left untouched.
    pub fn limits(&self) -> Limits {
        Limits {
            max_upload_bytes: self.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            max_json_bytes: self.max_json_bytes.unwrap_or(DEFAULT_MAX_JSON_BYTES),
        }
    }

    /// Whether a sniffed content type passes the allow-list.
    ///
    /// An empty allow-list permits everything; otherwise the comparison is
    /// ASCII case-insensitive.
    pub fn is_allowed_content_type(&self, content_type: &str) -> bool {
        self.allowed_content_types.is_empty()
            || self
                .allowed_content_types
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid_and_unrestricted() {
        let config = IntakeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.is_allowed_content_type("application/x-anything"));
        assert!(!config.allow_unknown_json_fields);
    }

    #[test]
    fn limits_fill_defaults_without_mutating_config() {
        let config = IntakeConfig::default();

        let first = config.limits();
        assert_eq!(first.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(first.max_json_bytes, DEFAULT_MAX_JSON_BYTES);

        // The stored config still has no explicit ceilings, so a second
        // derivation sees the same zero-value input.
        assert_eq!(config.max_upload_bytes, None);
        assert_eq!(config.max_json_bytes, None);
        assert_eq!(config.limits(), first);
    }

    #[test]
    fn explicit_limits_win_over_defaults() {
        let config = IntakeConfig {
            max_upload_bytes: Some(512),
            max_json_bytes: Some(5),
            ..Default::default()
        };

        let limits = config.limits();
        assert_eq!(limits.max_upload_bytes, 512);
        assert_eq!(limits.max_json_bytes, 5);
    }

    #[test]
    fn zero_limits_rejected() {
        let config = IntakeConfig {
            max_upload_bytes: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroLimit {
                field: "max_upload_bytes"
            })
        ));

        let config = IntakeConfig {
            max_json_bytes: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroLimit {
                field: "max_json_bytes"
            })
        ));
    }

    #[test]
    fn malformed_allow_list_entry_rejected() {
        for entry in ["png", "image/", "/png", ""] {
            let config = IntakeConfig {
                allowed_content_types: [entry.to_string()].into_iter().collect(),
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::MalformedContentType { .. })),
                "entry {entry:?} should be rejected"
            );
        }
    }

    #[test]
    fn allow_list_matching_is_case_insensitive() {
        let config = IntakeConfig {
            allowed_content_types: ["image/png".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert!(config.is_allowed_content_type("image/png"));
        assert!(config.is_allowed_content_type("Image/PNG"));
        assert!(!config.is_allowed_content_type("image/jpeg"));
    }

    #[test]
    fn config_round_trips_through_serde() {
        let config = IntakeConfig {
            max_upload_bytes: Some(1024),
            allowed_content_types: ["image/png".to_string()].into_iter().collect(),
            max_json_bytes: None,
            allow_unknown_json_fields: true,
        };

        let json = serde_json::to_string(&config).unwrap();
        let back: IntakeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_upload_bytes, Some(1024));
        assert!(back.allow_unknown_json_fields);
        assert!(back.is_allowed_content_type("image/png"));
    }

    #[test]
    fn empty_document_deserializes_to_defaults() {
        let config: IntakeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.limits().max_json_bytes, DEFAULT_MAX_JSON_BYTES);
    }
}
