//! Locating produced documents for delivery.
//!
//! Delivery never consults a mapping table. It re-derives the
//! [`DocumentIdentity`] from the same row that produced a document and looks
//! the file up by name in the output directory:
//!
//! ```text
//! row: ana@ubu.es / "Introducción a Python"
//!   → email id   ana_ubu_es
//!   → course     introduccion_a_python   (lower-cased for matching)
//!   → any *.pdf whose lower-cased name contains both, newest first
//! ```
//!
//! The directory is read once into a [`DocumentIndex`]; every lookup after
//! that is in memory. Sending mail is out of scope: [`plan_dispatch`] only
//! produces the list of messages a mailer would send.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

use crate::config::DeliveryConfig;
use crate::naming::{self, DocumentIdentity};
use crate::record::{Record, columns};
use crate::sanitize::safe_text;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One PDF found in the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    pub path: PathBuf,
    /// File name as stored on disk.
    pub file_name: String,
    name_lower: String,
    pub modified: Option<SystemTime>,
}

impl IndexedDocument {
    pub fn new(path: PathBuf, modified: Option<SystemTime>) -> Self {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name_lower = file_name.to_lowercase();
        Self {
            path,
            file_name,
            name_lower,
            modified,
        }
    }

    /// Stat `path` for its modification time.
    pub fn from_path(path: PathBuf) -> Self {
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok();
        Self::new(path, modified)
    }

    fn is_pdf(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
    }
}

/// In-memory view of the PDFs in one directory.
#[derive(Debug, Clone, Default)]
pub struct DocumentIndex {
    documents: Vec<IndexedDocument>,
}

impl DocumentIndex {
    /// List the `*.pdf` files directly inside `dir`.
    ///
    /// A missing directory is an empty index, not an error.
    pub fn scan(dir: &Path) -> Result<Self, DeliveryError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("document directory {} does not exist", dir.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(DeliveryError::Io {
                    path: dir.to_path_buf(),
                    source,
                });
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| DeliveryError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            if entry.file_type().is_ok_and(|t| t.is_file()) {
                paths.push(entry.path());
            }
        }
        Ok(Self::from_paths(paths))
    }

    /// Index the given files, keeping only PDFs.
    pub fn from_paths(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self::from_documents(paths.into_iter().map(IndexedDocument::from_path))
    }

    pub fn from_documents(documents: impl IntoIterator<Item = IndexedDocument>) -> Self {
        let mut documents: Vec<_> = documents.into_iter().filter(|d| d.is_pdf()).collect();
        documents.sort_by(|a, b| a.path.cmp(&b.path));
        Self { documents }
    }

    /// Newest document whose lower-cased name contains both tokens.
    pub fn find(&self, email_id: &str, course_slug: &str) -> Option<&IndexedDocument> {
        let email_id = email_id.to_lowercase();
        let course_slug = course_slug.to_lowercase();
        newest(
            self.documents
                .iter()
                .filter(|d| d.name_lower.contains(&email_id) && d.name_lower.contains(&course_slug)),
        )
    }

    pub fn find_identity(&self, identity: &DocumentIdentity) -> Option<&IndexedDocument> {
        self.find(&identity.email_id, &identity.course_slug)
    }

    /// Newest document whose name starts with `email_id`, ignoring the
    /// course. Case-sensitive on the stored name.
    pub fn find_latest_for_email(&self, email_id: &str) -> Option<&IndexedDocument> {
        newest(
            self.documents
                .iter()
                .filter(|d| d.file_name.starts_with(email_id)),
        )
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedDocument> {
        self.documents.iter()
    }
}

/// Latest modification time wins; among equal times the first by path.
/// Candidates arrive sorted by path.
fn newest<'a>(candidates: impl Iterator<Item = &'a IndexedDocument>) -> Option<&'a IndexedDocument> {
    candidates.fold(None, |best: Option<&IndexedDocument>, doc| match best {
        Some(b) if b.modified >= doc.modified => Some(b),
        _ => Some(doc),
    })
}

// ============================================================================
// Dispatch plan
// ============================================================================

/// One message ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dispatch {
    pub position: usize,
    pub to: String,
    pub recipient_name: String,
    pub course: String,
    pub subject: String,
    pub body: String,
    pub document: PathBuf,
    pub attachment_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchEntry {
    Planned(Dispatch),
    Unmatched {
        position: usize,
        email: String,
        course: String,
        reason: String,
    },
}

impl DispatchEntry {
    pub fn position(&self) -> usize {
        match self {
            DispatchEntry::Planned(d) => d.position,
            DispatchEntry::Unmatched { position, .. } => *position,
        }
    }
}

/// Match every record that has a deliverable email to its document.
///
/// Records without a usable email produce no entry at all.
pub fn plan_dispatch(
    records: &[Record],
    index: &DocumentIndex,
    config: &DeliveryConfig,
) -> Vec<DispatchEntry> {
    records
        .iter()
        .filter_map(|record| {
            let email = safe_text(record.get(columns::EMAIL));
            if !naming::is_deliverable_email(&email) {
                return None;
            }
            let course = safe_text(record.get(columns::COURSE));
            let identity = DocumentIdentity::derive(&email, &course);

            let Some(document) = index.find_identity(&identity) else {
                return Some(DispatchEntry::Unmatched {
                    position: record.position,
                    reason: format!("no document for {email} in course '{course}'"),
                    email,
                    course,
                });
            };

            let name = safe_text(record.get(columns::NAME));
            Some(DispatchEntry::Planned(Dispatch {
                position: record.position,
                subject: config.subject_for(&course),
                body: config.body_for(&name, &course),
                document: document.path.clone(),
                attachment_name: naming::attachment_name(&config.attachment_prefix, &course),
                to: email,
                recipient_name: name,
                course,
            }))
        })
        .collect()
}
