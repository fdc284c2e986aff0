//! Multipart upload validation-and-persistence pipeline.
//!
//! This is where uploaded files enter the system. The pipeline consumes a
//! sequence of already-parsed file parts (wire-format parsing belongs to the
//! HTTP layer), sniffs each part's real content type from its leading bytes,
//! enforces the configured allow-list, assigns a collision-resistant name,
//! and copies the bytes into the destination directory.
//!
//! ## What we do here
//!
//! - **Sniff, never trust** - The content-type decision is made from the
//!   part's first 512 bytes. Client-declared headers and filename extensions
//!   carry no weight.
//! - **Rename by default** - Assigned names are random tokens plus the
//!   original extension, so untrusted filenames cannot traverse paths or
//!   collide.
//! - **Keep partial results** - Parts are processed in order; the first
//!   failure stops the call, and records for parts persisted before it are
//!   returned alongside the error.
//! - **Log everything** - Structured events via tracing for debugging
//!   production rejects.
//!
//! ## Main entry points
//!
//! Call [`save_parts`] with the parts, a destination directory, an
//! [`IntakeConfig`], and a [`NamePolicy`]; get back an [`UploadOutcome`].
//! [`save_one`] is the single-file special case.
//!
//! ```
//! use intake::{save_parts, FilePart, IntakeConfig, NamePolicy};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let parts = vec![FilePart::from_bytes(
//!     "logo.png",
//!     vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
//! )];
//!
//! let outcome = save_parts(
//!     parts,
//!     dir.path(),
//!     &IntakeConfig::default(),
//!     NamePolicy::Randomize,
//! );
//! assert!(outcome.is_success());
//! assert_eq!(outcome.records[0].byte_count, 8);
//! ```

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};

use crate::config::IntakeConfig;
use crate::error::UploadError;
use crate::naming::{random_token, DEFAULT_TOKEN_LENGTH};

/// How many leading bytes the content sniffer inspects.
const SNIFF_PREFIX_LEN: usize = 512;

/// Reported when no known signature matches the leading bytes.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// How destination file names are assigned.
///
/// Replaces the original API's trailing `rename ...bool` with an explicit,
/// documented option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamePolicy {
    /// Random token plus the original extension (the default).
    ///
    /// This is what shields the destination directory from path traversal
    /// and collisions in untrusted client filenames.
    #[default]
    Randomize,

    /// Use the client-declared filename verbatim.
    ///
    /// Concurrent uploads of the same name may race on one path; that risk
    /// belongs to callers who pick this policy.
    KeepOriginal,
}

/// One already-parsed file part: a declared name plus an openable,
/// rewindable byte stream.
#[derive(Debug, Clone)]
pub struct FilePart {
    file_name: String,
    source: PartSource,
}

#[derive(Debug, Clone)]
enum PartSource {
    Memory(Vec<u8>),
    Disk(PathBuf),
}

impl FilePart {
    /// A part backed by an in-memory buffer (the usual case for parts
    /// collected from a multipart body).
    pub fn from_bytes(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            source: PartSource::Memory(bytes),
        }
    }

    /// A part backed by a file on disk, opened lazily when the pipeline
    /// reaches it.
    pub fn from_path(file_name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            source: PartSource::Disk(path.into()),
        }
    }

    /// The client-declared file name. Untrusted.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    fn open(&self) -> io::Result<Box<dyn ReadSeek + '_>> {
        match &self.source {
            PartSource::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.as_slice()))),
            PartSource::Disk(path) => Ok(Box::new(File::open(path)?)),
        }
    }
}

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Record of one persisted part.
///
/// Created once per successfully written file and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// File name as declared by the client. Untrusted.
    pub original_name: String,

    /// Name the bytes were stored under: a random token plus the original
    /// extension, or the original name verbatim under
    /// [`NamePolicy::KeepOriginal`].
    pub assigned_name: String,

    /// Bytes actually written to the destination file.
    pub byte_count: u64,
}

/// Result of one upload call: the records built so far plus an optional
/// terminal error.
///
/// Records for parts processed before a failing part are preserved here,
/// not discarded, so callers can tell exactly which files made it to disk.
#[derive(Debug)]
pub struct UploadOutcome {
    /// Records for the parts persisted before the call ended.
    pub records: Vec<UploadRecord>,

    /// The error that stopped the call, if any.
    pub error: Option<UploadError>,
}

impl UploadOutcome {
    /// True when every part was persisted.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    fn failed(records: Vec<UploadRecord>, error: UploadError) -> Self {
        Self {
            records,
            error: Some(error),
        }
    }
}

/// Validates and persists a sequence of file parts in order.
///
/// The destination directory (and its parents) is created first; failure
/// there aborts before any part is touched. Each part then flows through
/// sniff → allow-list → rename → copy. The first failing part terminates
/// the call; see [`UploadOutcome`] for the partial-result contract.
///
/// The aggregate raw-body ceiling is the HTTP layer's job (it sees the
/// request body before parts exist); by the time parts reach this function
/// they are within bounds.
pub fn save_parts<I>(
    parts: I,
    dest_dir: &Path,
    config: &IntakeConfig,
    policy: NamePolicy,
) -> UploadOutcome
where
    I: IntoIterator<Item = FilePart>,
{
    let start = Instant::now();
    let span = tracing::span!(
        Level::INFO,
        "intake.save_parts",
        dest = %dest_dir.display(),
    );
    let _guard = span.enter();

    if let Err(source) = fs::create_dir_all(dest_dir) {
        let err = UploadError::CreateDir {
            path: dest_dir.to_path_buf(),
            source,
        };
        warn!(error = %err, "upload_aborted");
        return UploadOutcome::failed(Vec::new(), err);
    }

    // Explicit fold over the parts: an immutable record list plus an
    // early-exit marker, no shared accumulator captured by closures.
    let mut records = Vec::new();
    let mut failure = None;
    for part in parts {
        match save_part(&part, dest_dir, config, policy) {
            Ok(record) => records.push(record),
            Err(err) => {
                failure = Some(err);
                break;
            }
        }
    }

    let elapsed_micros = start.elapsed().as_micros();
    match &failure {
        None => info!(files = records.len(), elapsed_micros, "upload_complete"),
        Some(err) => warn!(
            files = records.len(),
            error = %err,
            elapsed_micros,
            "upload_aborted"
        ),
    }

    UploadOutcome {
        records,
        error: failure,
    }
}

/// Single-file variant of [`save_parts`]: requires exactly one part.
///
/// # Errors
///
/// Everything [`save_parts`] can report, plus [`UploadError::NoParts`] for
/// an empty sequence and [`UploadError::MultipleParts`] when more than one
/// part arrived.
pub fn save_one<I>(
    parts: I,
    dest_dir: &Path,
    config: &IntakeConfig,
    policy: NamePolicy,
) -> Result<UploadRecord, UploadError>
where
    I: IntoIterator<Item = FilePart>,
{
    let mut outcome = save_parts(parts, dest_dir, config, policy);
    if let Some(err) = outcome.error {
        return Err(err);
    }
    match outcome.records.len() {
        0 => Err(UploadError::NoParts),
        1 => Ok(outcome.records.remove(0)),
        count => Err(UploadError::MultipleParts { count }),
    }
}

/// Runs one part through sniff → allow-list → rename → copy.
fn save_part(
    part: &FilePart,
    dest_dir: &Path,
    config: &IntakeConfig,
    policy: NamePolicy,
) -> Result<UploadRecord, UploadError> {
    let original_name = part.file_name().to_string();

    let mut stream = part.open().map_err(|source| UploadError::OpenPart {
        name: original_name.clone(),
        source,
    })?;

    let detected = sniff_content_type(&mut stream).map_err(|source| UploadError::ReadPart {
        name: original_name.clone(),
        source,
    })?;

    if !config.is_allowed_content_type(&detected) {
        return Err(UploadError::TypeNotAllowed { detected });
    }

    // The sniff read must not consume bytes from the persisted copy.
    stream
        .seek(SeekFrom::Start(0))
        .map_err(|source| UploadError::ReadPart {
            name: original_name.clone(),
            source,
        })?;

    let assigned_name = match policy {
        NamePolicy::Randomize => format!(
            "{}{}",
            random_token(DEFAULT_TOKEN_LENGTH),
            extension_of(&original_name)
        ),
        NamePolicy::KeepOriginal => original_name.clone(),
    };

    let dest_path = dest_dir.join(&assigned_name);
    let mut dest = File::create(&dest_path).map_err(|source| UploadError::WritePart {
        name: assigned_name.clone(),
        source,
    })?;
    let byte_count =
        io::copy(&mut stream, &mut dest).map_err(|source| UploadError::WritePart {
            name: assigned_name.clone(),
            source,
        })?;

    Ok(UploadRecord {
        original_name,
        assigned_name,
        byte_count,
    })
}

/// Detects a stream's content type from its leading bytes.
///
/// Reads at most [`SNIFF_PREFIX_LEN`] bytes (fewer if the stream is shorter)
/// and matches them against known format signatures. Always returns a valid
/// MIME type: unmatched prefixes report `application/octet-stream`.
pub fn sniff_content_type(stream: &mut dyn Read) -> io::Result<String> {
    let mut prefix = [0u8; SNIFF_PREFIX_LEN];
    let mut filled = 0;
    while filled < prefix.len() {
        let n = stream.read(&mut prefix[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(sniff_bytes(&prefix[..filled]).to_string())
}

/// Signature-based content detection over a byte slice.
pub fn sniff_bytes(bytes: &[u8]) -> &'static str {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or(FALLBACK_CONTENT_TYPE)
}

/// Extension of the declared filename, dot included, or empty.
fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}
