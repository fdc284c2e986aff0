//! Error types produced by the intake pipelines.
//!
//! Two disjoint taxonomies: [`UploadError`] for the multipart
//! validation-and-persistence pipeline, [`JsonError`] for the strict JSON
//! decode pipeline. Both are typed (not stringly) so callers can map variants
//! to HTTP status codes, render precise user-facing messages, and assert on
//! them in tests without parsing strings.
//!
//! Neither pipeline retries internally; every variant here is terminal for
//! the call that produced it. Upload errors travel alongside whatever records
//! the call had already produced (see [`UploadOutcome`](crate::UploadOutcome));
//! JSON errors never accompany a partial value.

use std::error::Error as StdError;
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors terminating an upload call.
///
/// All variants abort processing of the remaining parts; records built for
/// earlier parts are preserved and returned alongside the error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UploadError {
    /// The destination directory could not be created.
    ///
    /// Raised before any part is touched; the outcome carries zero records.
    #[error("failed to create destination directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// A part's byte stream could not be opened.
    #[error("failed to open uploaded file {name:?}: {source}")]
    OpenPart {
        /// Client-declared file name of the part.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A part's byte stream failed mid-read (sniff prefix or rewind).
    #[error("failed to read uploaded file {name:?}: {source}")]
    ReadPart {
        /// Client-declared file name of the part.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The sniffed content type is not in the configured allow-list.
    ///
    /// The decision is made on the part's leading bytes, never on the
    /// client-declared type.
    #[error("the uploaded file type {detected:?} is not permitted")]
    TypeNotAllowed {
        /// Content type detected from the part's leading bytes.
        detected: String,
    },

    /// The destination file could not be created or written.
    #[error("failed to write uploaded file {name:?}: {source}")]
    WritePart {
        /// Assigned destination file name.
        name: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The raw multipart body exceeded the configured aggregate ceiling.
    #[error("request body must not be larger than {limit} bytes")]
    BodyTooLarge {
        /// Effective ceiling in bytes.
        limit: u64,
    },

    /// The request produced no file parts.
    #[error("request contained no uploaded files")]
    NoParts,

    /// A single-file entry point received more than one part.
    #[error("expected exactly one uploaded file, got {count}")]
    MultipleParts {
        /// Number of parts actually received.
        count: usize,
    },
}

impl UploadError {
    /// Suggested HTTP status code for this error.
    ///
    /// Convenience for HTTP layers feeding the error-envelope emitter.
    pub fn http_status(&self) -> u16 {
        match self {
            UploadError::BodyTooLarge { .. } => 413,
            UploadError::TypeNotAllowed { .. } => 415,
            UploadError::CreateDir { .. } | UploadError::WritePart { .. } => 500,
            _ => 400,
        }
    }
}

/// Classified failures of the strict JSON decode pipeline.
///
/// Exactly one variant is produced per failed call, carrying the context a
/// user-facing message needs: a position, a field name, or a byte limit.
/// serde_json reports positions as line/column; those are the positional
/// context [`BadSyntax`](JsonError::BadSyntax) and
/// [`TypeMismatch`](JsonError::TypeMismatch) carry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum JsonError {
    /// The token stream is malformed.
    BadSyntax {
        /// Line of the offending token (1-based).
        line: usize,
        /// Column of the offending token (1-based).
        column: usize,
    },

    /// A value has the wrong type for its target field.
    TypeMismatch {
        /// Dotted path of the offending field, when the decoder knew it.
        field: Option<String>,
        /// Line of the offending value (1-based).
        line: usize,
        /// Column of the offending value (1-based).
        column: usize,
    },

    /// The body ended in the middle of a value.
    TruncatedBody,

    /// The body contained no JSON at all.
    EmptyBody,

    /// The body carries a field the target shape does not know.
    ///
    /// Only produced under the strict unknown-field policy.
    UnknownField(String),

    /// The body exceeded the configured byte ceiling.
    TooLarge {
        /// Effective ceiling in bytes.
        limit: usize,
    },

    /// The target shape cannot accept a JSON document.
    MalformedTarget,

    /// The body contained more than one JSON document.
    MultipleDocuments,

    /// Any other decode failure, with the decoder's message.
    Other(String),
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonError::BadSyntax { line, column } => write!(
                f,
                "body contains badly-formed JSON (at line {line}, column {column})"
            ),
            JsonError::TypeMismatch {
                field: Some(field), ..
            } => write!(f, "body contains an incorrect JSON type for field {field:?}"),
            JsonError::TypeMismatch { line, column, .. } => write!(
                f,
                "body contains an incorrect JSON type (at line {line}, column {column})"
            ),
            JsonError::TruncatedBody => write!(f, "body contains badly-formed JSON"),
            JsonError::EmptyBody => write!(f, "body must not be empty"),
            JsonError::UnknownField(name) => {
                write!(f, "body contains unknown field {name:?}")
            }
            JsonError::TooLarge { limit } => {
                write!(f, "body must not be larger than {limit} bytes")
            }
            JsonError::MalformedTarget => {
                write!(f, "target shape cannot accept a JSON document")
            }
            JsonError::MultipleDocuments => {
                write!(f, "body must contain only a single JSON value")
            }
            JsonError::Other(message) => write!(f, "{message}"),
        }
    }
}

impl StdError for JsonError {}

impl JsonError {
    /// Suggested HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            JsonError::TooLarge { .. } => 413,
            _ => 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_status_mapping() {
        assert_eq!(UploadError::BodyTooLarge { limit: 1 }.http_status(), 413);
        assert_eq!(
            UploadError::TypeNotAllowed {
                detected: "application/pdf".into()
            }
            .http_status(),
            415
        );
        assert_eq!(UploadError::NoParts.http_status(), 400);
        assert_eq!(
            UploadError::CreateDir {
                path: PathBuf::from("/nope"),
                source: std::io::Error::other("denied"),
            }
            .http_status(),
            500
        );
    }

    #[test]
    fn json_messages_name_their_context() {
        let err = JsonError::BadSyntax { line: 1, column: 9 };
        assert_eq!(
            err.to_string(),
            "body contains badly-formed JSON (at line 1, column 9)"
        );

        let err = JsonError::TypeMismatch {
            field: Some("foo".into()),
            line: 1,
            column: 10,
        };
        assert!(err.to_string().contains("\"foo\""));

        let err = JsonError::TypeMismatch {
            field: None,
            line: 2,
            column: 3,
        };
        assert!(err.to_string().contains("line 2, column 3"));

        assert!(JsonError::UnknownField("foo0".into())
            .to_string()
            .contains("\"foo0\""));
        assert!(JsonError::TooLarge { limit: 5 }.to_string().contains('5'));
    }

    #[test]
    fn json_status_mapping() {
        assert_eq!(JsonError::TooLarge { limit: 5 }.http_status(), 413);
        assert_eq!(JsonError::EmptyBody.http_status(), 400);
        assert_eq!(JsonError::MultipleDocuments.http_status(), 400);
    }
}
