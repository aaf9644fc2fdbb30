//! # Diploma Gen
//!
//! Template-driven certificate generation. Each row of a spreadsheet export
//! becomes a one-page PDF, laid out by a per-course template and named so that
//! signing and delivery tools can find it again without any database.
//!
//! # Architecture
//!
//! ```text
//! records.csv ─▶ ingest ─▶ batch ─┬─▶ template (resolve id → layout + background)
//!                                 ├─▶ compose  ─▶ layout ─▶ PdfSurface ─▶ bytes
//!                                 └─▶ naming   ─▶ email_id__course_slug.pdf
//!
//! records.csv + output dir ─▶ delivery ─▶ dispatch plan
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`record`] | Input rows, cell values, display options, column names |
//! | [`sanitize`] | Turning raw cells into display text and grades |
//! | [`naming`] | Deterministic document identities and filenames |
//! | [`template`] | Template schema, bundle lookup with fallback, per-batch cache |
//! | [`layout`] | Fonts, colors, placement math, the layout engine and the PDF surface |
//! | [`compose`] | One record onto one page |
//! | [`batch`] | All records into a directory, in parallel, with per-record events |
//! | [`delivery`] | Finding produced documents again and planning messages |
//! | [`ingest`] | CSV and JSON record files |
//! | [`config`] | Layered `diploma-gen.toml` loading and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## The Filename Is the Join Key
//!
//! Nothing records which file was produced for which row. The identity
//! `email_id__course_slug` is recomputed from the row by every consumer,
//! which is why [`naming`] is pure and its rules never change across
//! versions: a renamed slug would orphan every document already produced.
//!
//! ## Degrade, Don't Abort
//!
//! A missing template falls back to the default bundle, then to a built-in
//! layout. A malformed template draws nothing but keeps its background. An
//! unknown font or color falls back to the configured default. A record with
//! no usable email is skipped. Only failing to create the output directory
//! stops a batch; everything else is reported per record and counted.
//!
//! ## Base-14 Fonts Only
//!
//! Documents use the PDF standard fonts with WinAnsi encoding, so there is
//! nothing to embed and text width can be measured from compiled-in AFM
//! tables. That is what makes signature autofit work without a font engine.
//!
//! ## Reproducible Output
//!
//! The PDF writer emits no timestamps or random identifiers. The same record
//! and template always produce the same bytes.

pub mod batch;
pub mod compose;
pub mod config;
pub mod delivery;
pub mod ingest;
pub mod layout;
pub mod naming;
pub mod output;
pub mod record;
pub mod sanitize;
pub mod template;

#[cfg(test)]
pub(crate) mod test_helpers;
