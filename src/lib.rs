//! Request intake toolkit.
//!
//! This crate turns inbound HTTP payloads into validated, disk-backed or
//! in-memory results, rejecting malformed, oversized, or disallowed input
//! with precise, classified errors. Two independent pipelines share one
//! caller-supplied [`IntakeConfig`]:
//!
//! - the **upload pipeline** ([`save_parts`] / [`save_one`]) consumes
//!   already-parsed multipart file parts, sniffs their real content types,
//!   enforces an allow-list, assigns collision-resistant names, and persists
//!   the bytes, reporting partial results when a part fails;
//! - the **JSON pipeline** ([`read_json`]) decodes a size-bounded body into
//!   exactly one well-typed value, classifying every way a body can be
//!   malformed into a distinct [`JsonError`].
//!
//! Both pipelines are pure request-scoped transformations: no state survives
//! a call, and the caller's config is only ever read.
//!
//! The `http` feature (on by default) adds the axum glue in [`http`]:
//! multipart collection, the `{error, message, data?}` response envelope,
//! and the attachment download helper.
//!
//! ## Example
//!
//! ```
//! use intake::{read_json, save_parts, FilePart, IntakeConfig, NamePolicy};
//! use serde::Deserialize;
//!
//! let config = IntakeConfig {
//!     allowed_content_types: ["image/png".to_string()].into_iter().collect(),
//!     ..Default::default()
//! };
//!
//! let dir = tempfile::tempdir().unwrap();
//! let parts = vec![FilePart::from_bytes(
//!     "avatar.png",
//!     vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
//! )];
//! let outcome = save_parts(parts, dir.path(), &config, NamePolicy::Randomize);
//! assert!(outcome.is_success());
//!
//! #[derive(Deserialize)]
//! struct Hello {
//!     foo: String,
//! }
//! let hello: Hello = read_json(br#"{"foo": "bar"}"#, &config).unwrap();
//! assert_eq!(hello.foo, "bar");
//! ```

mod config;
mod error;
mod json;
mod naming;
mod upload;

#[cfg(feature = "http")]
pub mod http;

pub use crate::config::{
    ConfigError, IntakeConfig, Limits, DEFAULT_MAX_JSON_BYTES, DEFAULT_MAX_UPLOAD_BYTES,
};
pub use crate::error::{JsonError, UploadError};
pub use crate::json::{read_json, read_json_from_reader};
pub use crate::naming::{
    random_token, slugify, SlugError, DEFAULT_TOKEN_LENGTH, TOKEN_ALPHABET,
};
pub use crate::upload::{
    save_one, save_parts, sniff_bytes, sniff_content_type, FilePart, NamePolicy, UploadOutcome,
    UploadRecord,
};
