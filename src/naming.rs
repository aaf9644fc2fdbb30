//! Deterministic document identities.
//!
//! Every generated document is named after who it is for and what it
//! certifies:
//!
//! ```text
//! juan_perez_ubu_es__Introduccion_a_Python.pdf
//! └──── email id ─┘  └──── course slug ────┘
//! ```
//!
//! Nothing records which file belongs to which row. Signing and delivery
//! re-derive the same identity from the same row and find the file by name,
//! so both functions here must be pure: same input text, same output, on
//! every run and every platform.
//!
//! ## Email id
//!
//! Lower-cased, trimmed, `@` and `.` replaced by `_`. No validation of the
//! address shape happens here; [`is_deliverable_email`] is the only check the
//! pipeline applies.
//!
//! ## Course slug
//!
//! Accents are decomposed and dropped (`ó` → `o`), anything that is not an
//! ASCII letter or digit becomes `_`, runs of `_` collapse to one, and the
//! result is cut at 50 characters. An empty course name yields `diploma`.

use unicode_normalization::UnicodeNormalization;

/// Separator between the email id and the course slug.
pub const IDENTITY_SEPARATOR: &str = "__";

/// Slug used when the course name is empty.
pub const EMPTY_COURSE_SLUG: &str = "diploma";

const MAX_SLUG_LEN: usize = 50;

/// Filesystem-safe token for an email address.
pub fn email_to_id(email: &str) -> String {
    email.to_lowercase().trim().replace(['@', '.'], "_")
}

/// Filesystem-safe, ASCII-only slug for a course name.
pub fn slugify_course(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return EMPTY_COURSE_SLUG.to_string();
    }

    // Decompose, then keep ASCII only: combining marks (and any other
    // non-ASCII character) disappear, base letters survive.
    let ascii: String = trimmed.nfd().filter(char::is_ascii).collect();

    let mut slug = String::with_capacity(ascii.len());
    let mut prev_underscore = false;
    for c in ascii.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' {
            if !prev_underscore {
                slug.push('_');
            }
            prev_underscore = true;
        } else {
            slug.push(c);
            prev_underscore = false;
        }
    }

    // ASCII only at this point, so byte length == char count.
    slug.truncate(MAX_SLUG_LEN);
    slug
}

/// An address is deliverable when it is non-empty and contains `@`.
pub fn is_deliverable_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.contains('@')
}

/// The two-part key that names a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentIdentity {
    pub email_id: String,
    pub course_slug: String,
}

impl DocumentIdentity {
    pub fn derive(email: &str, course: &str) -> Self {
        Self {
            email_id: email_to_id(email),
            course_slug: slugify_course(course),
        }
    }

    /// `email_id__course_slug`
    pub fn composite(&self) -> String {
        format!("{}{IDENTITY_SEPARATOR}{}", self.email_id, self.course_slug)
    }

    /// Output filename: `email_id__course_slug.pdf`
    pub fn filename(&self) -> String {
        format!("{}.pdf", self.composite())
    }
}

/// Name the recipient sees on the attachment, e.g. `Diploma_Python_avanzado.pdf`.
pub fn attachment_name(prefix: &str, course: &str) -> String {
    format!("{prefix}{}.pdf", slugify_course(course))
}
