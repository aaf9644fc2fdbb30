//! Batch driver: one document per record.
//!
//! ## Flow
//!
//! 1. Create the output directory (the only failure that stops a batch).
//! 2. Walk the records in order. Rows without a deliverable email are
//!    skipped and counted as failed; the rest are grouped by
//!    [`DocumentIdentity`].
//! 3. Compose the groups in parallel with [rayon](https://docs.rs/rayon).
//!    Records in one group run in input order on one worker, so when two
//!    rows name the same file the later row wins, every time.
//! 4. Each document is written to a temp file next to its destination and
//!    renamed into place, so a crash never leaves a half-written PDF under a
//!    name delivery would pick up.
//!
//! Every record produces exactly one [`BatchEvent`], sent to the optional
//! channel as soon as its outcome is known.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::Sender;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::compose::{ComposeError, Composer};
use crate::config::AppConfig;
use crate::delivery::DocumentIndex;
use crate::naming::{self, DocumentIdentity};
use crate::record::{DisplayOptions, Record, columns};
use crate::sanitize::safe_text;
use crate::template::{ResolvedTemplate, TemplateCache, TemplateResolver};

/// Default file name for [`write_preview`].
pub const PREVIEW_FILE: &str = "preview_diploma.pdf";

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Compose error: {0}")]
    Compose(#[from] ComposeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    MissingEmail,
    InvalidEmail(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingEmail => write!(f, "no email"),
            SkipReason::InvalidEmail(email) => write!(f, "invalid email '{email}'"),
        }
    }
}

/// Outcome of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BatchEvent {
    Generated {
        position: usize,
        file: PathBuf,
    },
    Skipped {
        position: usize,
        reason: SkipReason,
    },
    Failed {
        position: usize,
        file: PathBuf,
        error: String,
    },
}

impl BatchEvent {
    pub fn position(&self) -> usize {
        match self {
            BatchEvent::Generated { position, .. }
            | BatchEvent::Skipped { position, .. }
            | BatchEvent::Failed { position, .. } => *position,
        }
    }

    fn is_generated(&self) -> bool {
        matches!(self, BatchEvent::Generated { .. })
    }
}

/// Aggregate result. Skipped records count as failed.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub generated: usize,
    pub failed: usize,
    /// Files written by this batch, ready for [`DocumentIndex::find`].
    pub documents: DocumentIndex,
}

/// Records that share one output file, in input order.
struct Group<'a> {
    file: PathBuf,
    records: Vec<&'a Record>,
}

/// Compose every record into `output_dir`.
///
/// `resolve` maps a record's template identifier to its resolved template;
/// `compose` turns a record into PDF bytes. Both are called from worker
/// threads.
pub fn run_batch<R, C>(
    records: &[Record],
    options: DisplayOptions,
    output_dir: &Path,
    resolve: R,
    compose: C,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchSummary, BatchError>
where
    R: Fn(Option<&str>) -> Arc<ResolvedTemplate> + Sync,
    C: Fn(&Record, DisplayOptions, &ResolvedTemplate) -> Result<Vec<u8>, ComposeError> + Sync,
{
    std::fs::create_dir_all(output_dir).map_err(|source| BatchError::OutputDir {
        path: output_dir.to_path_buf(),
        source,
    })?;

    let emit = |event: &BatchEvent| {
        if let Some(tx) = &events {
            tx.send(event.clone()).ok();
        }
    };

    let mut outcomes = Vec::with_capacity(records.len());
    let mut groups: Vec<Group> = Vec::new();
    let mut by_identity: HashMap<DocumentIdentity, usize> = HashMap::new();

    for record in records {
        let email = safe_text(record.get(columns::EMAIL));
        if let Some(reason) = skip_reason(&email) {
            log::warn!("record {}: skipped: {reason}", record.position);
            let event = BatchEvent::Skipped {
                position: record.position,
                reason,
            };
            emit(&event);
            outcomes.push(event);
            continue;
        }

        let identity = DocumentIdentity::derive(&email, &safe_text(record.get(columns::COURSE)));
        match by_identity.get(&identity) {
            Some(&index) => {
                log::warn!(
                    "record {} overwrites {} from an earlier record",
                    record.position,
                    identity.filename()
                );
                groups[index].records.push(record);
            }
            None => {
                by_identity.insert(identity.clone(), groups.len());
                groups.push(Group {
                    file: output_dir.join(identity.filename()),
                    records: vec![record],
                });
            }
        }
    }

    let composed: Vec<Vec<BatchEvent>> = groups
        .par_iter()
        .map(|group| {
            group
                .records
                .iter()
                .map(|record| {
                    let event = render_one(record, options, &group.file, &resolve, &compose);
                    emit(&event);
                    event
                })
                .collect()
        })
        .collect();
    outcomes.extend(composed.into_iter().flatten());

    let generated = outcomes.iter().filter(|e| e.is_generated()).count();
    let written: BTreeSet<PathBuf> = outcomes
        .iter()
        .filter_map(|e| match e {
            BatchEvent::Generated { file, .. } => Some(file.clone()),
            _ => None,
        })
        .collect();

    Ok(BatchSummary {
        generated,
        failed: outcomes.len() - generated,
        documents: DocumentIndex::from_paths(written),
    })
}

/// [`run_batch`] wired to the configured templates and composer.
pub fn generate(
    records: &[Record],
    options: DisplayOptions,
    output_dir: &Path,
    config: &AppConfig,
    signer: Option<&str>,
    events: Option<Sender<BatchEvent>>,
) -> Result<BatchSummary, BatchError> {
    let composer = Composer::from_config(config);
    let resolver = TemplateResolver::from_config(&config.templates);
    let templates = TemplateCache::new(&resolver);

    let summary = run_batch(
        records,
        options,
        output_dir,
        |id| templates.get(id),
        |record, options, template| composer.compose(record, options, template, signer),
        events,
    )?;
    log::debug!("{} template(s) resolved", templates.len());
    Ok(summary)
}

fn skip_reason(email: &str) -> Option<SkipReason> {
    if email.is_empty() {
        Some(SkipReason::MissingEmail)
    } else if !naming::is_deliverable_email(email) {
        Some(SkipReason::InvalidEmail(email.to_string()))
    } else {
        None
    }
}

fn template_id(record: &Record) -> Option<String> {
    Some(safe_text(record.get(columns::TEMPLATE))).filter(|id| !id.is_empty())
}

fn render_one<R, C>(
    record: &Record,
    options: DisplayOptions,
    file: &Path,
    resolve: &R,
    compose: &C,
) -> BatchEvent
where
    R: Fn(Option<&str>) -> Arc<ResolvedTemplate>,
    C: Fn(&Record, DisplayOptions, &ResolvedTemplate) -> Result<Vec<u8>, ComposeError>,
{
    let template = resolve(template_id(record).as_deref());
    let result = compose(record, options, &template)
        .map_err(BatchError::from)
        .and_then(|bytes| write_atomic(file, &bytes));

    match result {
        Ok(()) => BatchEvent::Generated {
            position: record.position,
            file: file.to_path_buf(),
        },
        Err(e) => {
            log::warn!(
                "record {} failed ({}): {e}",
                record.position,
                file.display()
            );
            BatchEvent::Failed {
                position: record.position,
                file: file.to_path_buf(),
                error: e.to_string(),
            }
        }
    }
}

/// Write through a temp file in the destination directory, then rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BatchError> {
    let write_err = |source| BatchError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

// ============================================================================
// Preview
// ============================================================================

/// First record with both an email and a name.
pub fn preview_record(records: &[Record]) -> Option<&Record> {
    records.iter().find(|r| {
        !safe_text(r.get(columns::EMAIL)).is_empty() && !safe_text(r.get(columns::NAME)).is_empty()
    })
}

/// Compose the preview record to `path`.
///
/// Returns the position of the record used, or `None` when no record
/// qualifies (nothing is written).
pub fn write_preview<R, C>(
    records: &[Record],
    options: DisplayOptions,
    path: &Path,
    resolve: R,
    compose: C,
) -> Result<Option<usize>, BatchError>
where
    R: Fn(Option<&str>) -> Arc<ResolvedTemplate>,
    C: Fn(&Record, DisplayOptions, &ResolvedTemplate) -> Result<Vec<u8>, ComposeError>,
{
    let Some(record) = preview_record(records) else {
        return Ok(None);
    };
    let template = resolve(template_id(record).as_deref());
    let bytes = compose(record, options, &template)?;
    write_atomic(path, &bytes)?;
    Ok(Some(record.position))
}
