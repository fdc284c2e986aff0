//! Strict JSON decode pipeline.
//!
//! Turns a size-bounded byte stream into exactly one well-typed value, or
//! into exactly one classified [`JsonError`]. The pipeline enforces, in
//! order:
//!
//! 1. a byte ceiling on the body ([`IntakeConfig::max_json_bytes`]);
//! 2. a structural decode into the target shape, with unknown fields
//!    rejected unless [`IntakeConfig::allow_unknown_json_fields`] is set;
//! 3. a single-document guard: anything but whitespace after the first
//!    value fails the call.
//!
//! On failure no partial value escapes; classification happens before
//! anything is returned.
//!
//! ```
//! use intake::{read_json, IntakeConfig, JsonError};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, Debug)]
//! struct Greeting {
//!     foo: String,
//! }
//!
//! let config = IntakeConfig::default();
//! let value: Greeting = read_json(br#"{"foo": "bar"}"#, &config).unwrap();
//! assert_eq!(value.foo, "bar");
//!
//! let err = read_json::<Greeting>(b"", &config).unwrap_err();
//! assert_eq!(err, JsonError::EmptyBody);
//! ```
//!
//! # Classification
//!
//! serde_json exposes failures as structured categories
//! ([`serde_json::error::Category`]) plus a position; field attribution for
//! type mismatches comes from `serde_path_to_error`, and runtime
//! unknown-field detection from `serde_ignored`. The one place that still
//! inspects error *messages* (telling `unknown field` and `invalid type`
//! Data errors apart) is [`classify_decode_error`]'s helper, kept small and
//! tested on its own precisely because message formats are a fragile
//! contract.

use std::io::Read;

use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::config::IntakeConfig;
use crate::error::JsonError;

/// Decodes one JSON document from `body` into `T`.
///
/// The effective byte ceiling and unknown-field policy are derived from
/// `config` at call time. See the module docs for the classification
/// contract.
pub fn read_json<T: DeserializeOwned>(body: &[u8], config: &IntakeConfig) -> Result<T, JsonError> {
    let limit = config.limits().max_json_bytes;
    if body.len() > limit {
        return Err(JsonError::TooLarge { limit });
    }
    let result = decode(body, config.allow_unknown_json_fields);
    if let Err(err) = &result {
        tracing::debug!(error = %err, "json_body_rejected");
    }
    result
}

/// Like [`read_json`], but pulls the body from a reader.
///
/// At most one byte past the ceiling is read; anything longer than the
/// ceiling surfaces as [`JsonError::TooLarge`] without reading the rest.
pub fn read_json_from_reader<T, R>(reader: R, config: &IntakeConfig) -> Result<T, JsonError>
where
    T: DeserializeOwned,
    R: Read,
{
    let limit = config.limits().max_json_bytes;
    let mut body = Vec::new();
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|err| JsonError::Other(err.to_string()))?;
    if body.len() > limit {
        return Err(JsonError::TooLarge { limit });
    }
    read_json(&body, config)
}

fn decode<T: DeserializeOwned>(body: &[u8], allow_unknown: bool) -> Result<T, JsonError> {
    let mut de = serde_json::Deserializer::from_slice(body);
    let mut track = serde_path_to_error::Track::new();
    let traced = serde_path_to_error::Deserializer::new(&mut de, &mut track);

    let mut ignored: Option<String> = None;
    let decoded: Result<T, serde_json::Error> = if allow_unknown {
        T::deserialize(traced)
    } else {
        serde_ignored::deserialize(traced, |path| {
            if ignored.is_none() {
                ignored = Some(path.to_string());
            }
        })
    };

    let value = match decoded {
        Ok(value) => value,
        Err(err) => {
            let field = field_from_path(&track.path().to_string());
            return Err(classify_decode_error(&err, field, body));
        }
    };

    if let Some(name) = ignored {
        return Err(JsonError::UnknownField(name));
    }

    // One document per body: whatever follows the first value must be
    // whitespace, or the decode as a whole fails.
    if de.end().is_err() {
        return Err(JsonError::MultipleDocuments);
    }

    Ok(value)
}

/// Maps a serde_json failure onto the [`JsonError`] taxonomy.
///
/// `field` is the dotted path recorded up to the failure, when any; `body`
/// distinguishes an empty body from a truncated one.
fn classify_decode_error(
    err: &serde_json::Error,
    field: Option<String>,
    body: &[u8],
) -> JsonError {
    match err.classify() {
        Category::Syntax => JsonError::BadSyntax {
            line: err.line(),
            column: err.column(),
        },
        Category::Eof => {
            if body.iter().all(u8::is_ascii_whitespace) {
                JsonError::EmptyBody
            } else {
                JsonError::TruncatedBody
            }
        }
        Category::Data => classify_data_error(err, field),
        Category::Io => JsonError::Other(err.to_string()),
    }
}

/// Splits Data-category failures into the value-shaped variants.
///
/// This is the known fragility point: serde_json reports Data errors as
/// messages, so `unknown field` and `invalid type`/`invalid value` are told
/// apart by prefix. The formats are stable serde conventions, and the tests
/// below pin them.
fn classify_data_error(err: &serde_json::Error, field: Option<String>) -> JsonError {
    // No recorded position means the target's Deserialize impl failed
    // before consuming any input: the shape rejects JSON documents as such.
    if err.line() == 0 {
        return JsonError::MalformedTarget;
    }

    let message = err.to_string();
    if message.starts_with("unknown field") {
        let name = backticked_name(&message)
            .map(str::to_owned)
            .or(field)
            .unwrap_or_default();
        return JsonError::UnknownField(name);
    }
    if message.starts_with("invalid type") || message.starts_with("invalid value") {
        return JsonError::TypeMismatch {
            field,
            line: err.line(),
            column: err.column(),
        };
    }
    JsonError::Other(message)
}

/// First backtick-quoted token of a serde error message.
fn backticked_name(message: &str) -> Option<&str> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    Some(&message[start..start + len])
}

/// Normalizes a serde_path_to_error path: the empty path renders as `.`,
/// which carries no field information.
fn field_from_path(path: &str) -> Option<String> {
    if path.is_empty() || path == "." {
        None
    } else {
        Some(path.to_string())
    }
}
