//! Student and staff identifier codec.
//!
//! Identifiers are built from typed formats, formatted through `Display` on the
//! decoded forms, and parsed back with fixed regex shapes. The only state is the
//! sequence allocator handed in by the caller.

pub mod classes;
pub mod sequence;
pub mod staff;
pub mod student;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use classes::Section;
pub use sequence::{MemoryAllocator, SequenceAllocator, SequenceError, SequenceKey};
pub use staff::{StaffFormat, StaffId};
pub use student::{StudentFormat, StudentId};

/// Institutional tag at the front of every identifier.
pub const PREFIX: &str = "VSP";
pub const STAFF_TAG: &str = "STF";
pub const INVALID_BADGE: &str = "INVALID";
pub const DEFAULT_EMAIL_DOMAIN: &str = "vincollins.edu.ng";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdKind {
    Student,
    Staff,
}

impl IdKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IdKind::Student => "student",
            IdKind::Staff => "staff",
        }
    }
}

impl std::str::FromStr for IdKind {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(IdKind::Student),
            "staff" => Ok(IdKind::Staff),
            other => Err(IdError::InvalidFormatParameters(format!(
                "unknown identifier kind: {other}"
            ))),
        }
    }
}

/// Format tag reported by `parse`. Student and staff share `standard` and `legacy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdFormat {
    Standard,
    YearOnly,
    Section,
    Department,
    Simplified,
    Legacy,
}

#[derive(Debug, Error)]
pub enum IdError {
    #[error("invalid format parameters: {0}")]
    InvalidFormatParameters(String),
    #[error("batch count must be a positive integer")]
    InvalidBatchCount,
    #[error("sequence {sequence} for {key} does not fit in {width} digits")]
    SequenceExhausted {
        key: String,
        sequence: u32,
        width: usize,
    },
    #[error(transparent)]
    Allocator(#[from] SequenceError),
}

impl IdError {
    /// Stable wire code for IPC error responses.
    pub fn code(&self) -> &'static str {
        match self {
            IdError::InvalidFormatParameters(_) => "invalid_format_parameters",
            IdError::InvalidBatchCount => "invalid_batch_count",
            IdError::SequenceExhausted { .. } => "sequence_exhausted",
            IdError::Allocator(_) => "allocator_failed",
        }
    }

    pub(crate) fn missing(field: &str, format: &str) -> Self {
        IdError::InvalidFormatParameters(format!("{field} is required for {format} format"))
    }
}

/// Loose parameter bag as it arrives from the caller. Which fields are
/// required depends on the chosen format.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdParams {
    pub class_code: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
    pub year: Option<i32>,
    pub original_id: Option<String>,
    pub original_number: Option<u32>,
}

/// A decoded identifier of either kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Student(StudentId),
    Staff(StaffId),
}

impl Identifier {
    /// Routes `VSP-STF-` identifiers to the staff shapes and everything else to
    /// the student shapes, so `VSP-STF-24-0001` is never read as a student
    /// section identifier.
    pub fn parse(s: &str) -> Option<Identifier> {
        if s.starts_with(&format!("{PREFIX}-{STAFF_TAG}-")) {
            StaffId::parse(s).map(Identifier::Staff)
        } else {
            StudentId::parse(s).map(Identifier::Student)
        }
    }

    pub fn parse_as(kind: IdKind, s: &str) -> Option<Identifier> {
        match kind {
            IdKind::Student => StudentId::parse(s).map(Identifier::Student),
            IdKind::Staff => StaffId::parse(s).map(Identifier::Staff),
        }
    }

    pub fn badge_number(&self) -> String {
        match self {
            Identifier::Student(id) => id.badge_number(),
            Identifier::Staff(id) => id.badge_number(),
        }
    }
}

/// Wire form of a parse. Invalid input carries only `isValid: false`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedIdentifier {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<IdKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<IdFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_legacy: Option<bool>,
}

impl ParsedIdentifier {
    pub fn invalid() -> Self {
        Self::default()
    }

    fn valid(kind: IdKind, format: IdFormat) -> Self {
        Self {
            is_valid: true,
            prefix: Some(PREFIX.to_string()),
            kind: Some(kind),
            format: Some(format),
            is_legacy: Some(format == IdFormat::Legacy),
            ..Self::default()
        }
    }
}

impl From<&Identifier> for ParsedIdentifier {
    fn from(id: &Identifier) -> Self {
        match id {
            Identifier::Student(s) => {
                let mut p = ParsedIdentifier::valid(IdKind::Student, s.format());
                match s {
                    StudentId::Standard {
                        year,
                        class_code,
                        sequence,
                    } => {
                        p.year = Some(*year);
                        p.class_code = Some(class_code.clone());
                        p.sequence = Some(*sequence);
                    }
                    StudentId::YearOnly { year, sequence } => {
                        p.year = Some(*year);
                        p.sequence = Some(*sequence);
                    }
                    StudentId::Section {
                        section_code,
                        year,
                        sequence,
                    } => {
                        p.section = Some(section_code.clone());
                        p.year = Some(*year);
                        p.sequence = Some(*sequence);
                    }
                    StudentId::Legacy { original_id } => {
                        p.original_id = Some(original_id.clone());
                    }
                }
                p
            }
            Identifier::Staff(s) => {
                let mut p = ParsedIdentifier::valid(IdKind::Staff, s.format());
                match s {
                    StaffId::Standard { year, sequence } => {
                        p.year = Some(*year);
                        p.sequence = Some(*sequence);
                    }
                    StaffId::Department {
                        department,
                        year,
                        sequence,
                    } => {
                        p.department = Some(department.clone());
                        p.year = Some(*year);
                        p.sequence = Some(*sequence);
                    }
                    StaffId::Simplified { sequence } => {
                        p.sequence = Some(*sequence);
                    }
                    StaffId::Legacy { year, number } => {
                        p.year = Some(*year);
                        p.sequence = Some(*number);
                    }
                }
                p
            }
        }
    }
}

pub fn parse(s: &str) -> ParsedIdentifier {
    Identifier::parse(s)
        .as_ref()
        .map(ParsedIdentifier::from)
        .unwrap_or_else(ParsedIdentifier::invalid)
}

pub fn parse_as(kind: IdKind, s: &str) -> ParsedIdentifier {
    Identifier::parse_as(kind, s)
        .as_ref()
        .map(ParsedIdentifier::from)
        .unwrap_or_else(ParsedIdentifier::invalid)
}

pub fn validate(s: &str) -> bool {
    Identifier::parse(s).is_some()
}

pub fn validate_as(kind: IdKind, s: &str) -> bool {
    match kind {
        IdKind::Student => student::validate(s),
        IdKind::Staff => staff::validate(s),
    }
}

/// Generates one identifier, advancing the matching counter by one.
pub fn generate(
    alloc: &dyn SequenceAllocator,
    kind: IdKind,
    format: &str,
    params: &IdParams,
) -> Result<String, IdError> {
    match kind {
        IdKind::Student => student::generate(alloc, &StudentFormat::from_params(format, params)?),
        IdKind::Staff => staff::generate(alloc, &StaffFormat::from_params(format, params)?),
    }
}

/// Generates `count` identifiers with contiguous, strictly increasing sequences.
pub fn generate_batch(
    alloc: &dyn SequenceAllocator,
    kind: IdKind,
    format: &str,
    params: &IdParams,
    count: u32,
) -> Result<Vec<String>, IdError> {
    match kind {
        IdKind::Student => {
            student::generate_batch(alloc, &StudentFormat::from_params(format, params)?, count)
        }
        IdKind::Staff => {
            staff::generate_batch(alloc, &StaffFormat::from_params(format, params)?, count)
        }
    }
}

pub fn badge_number(s: &str) -> String {
    Identifier::parse(s)
        .map(|id| id.badge_number())
        .unwrap_or_else(|| INVALID_BADGE.to_string())
}

/// `first.last.<suffix>@domain`, names keeping only `a-z` after lower-casing.
///
/// Allocated student identifiers contribute their sequence without padding
/// (`VSP-24-JSS1-0045` gives `45`). Legacy, staff and unparsable identifiers
/// contribute their last `-` segment as written.
pub fn username(first_name: &str, last_name: &str, identifier: &str, domain: &str) -> String {
    let clean = |s: &str| -> String {
        s.to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_lowercase())
            .collect()
    };
    let sequence = match Identifier::parse(identifier) {
        Some(Identifier::Student(
            StudentId::Standard { sequence, .. }
            | StudentId::YearOnly { sequence, .. }
            | StudentId::Section { sequence, .. },
        )) if sequence > 0 => Some(sequence.to_string()),
        _ => None,
    };
    let suffix = sequence.unwrap_or_else(|| {
        identifier
            .rsplit('-')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("0000")
            .to_string()
    });
    format!(
        "{}.{}.{}@{}",
        clean(first_name),
        clean(last_name),
        suffix,
        domain
    )
}

pub(crate) fn current_year() -> i32 {
    chrono::Local::now().year()
}

/// Largest sequence that still fits a zero-padded field of `width` digits.
fn ceiling(width: usize) -> u32 {
    u32::try_from(width)
        .ok()
        .and_then(|w| 10u32.checked_pow(w))
        .map_or(u32::MAX, |n| n - 1)
}

/// Reserves `count` numbers for `key`. A block that would not fit `width`
/// digits is refused by the allocator before anything is committed.
pub(crate) fn reserve_block(
    alloc: &dyn SequenceAllocator,
    key: &SequenceKey,
    count: u32,
    width: usize,
) -> Result<std::ops::RangeInclusive<u32>, IdError> {
    if count == 0 {
        return Err(IdError::InvalidBatchCount);
    }
    let key_str = key.to_string();
    let max = ceiling(width);
    let reserved = if count == 1 {
        alloc.next_sequence(&key_str, max)
    } else {
        alloc.reserve(&key_str, count, max)
    };
    let first = match reserved {
        Ok(first) => first,
        Err(SequenceError::Exhausted { sequence, .. }) => {
            return Err(IdError::SequenceExhausted {
                key: key_str,
                sequence,
                width,
            })
        }
        Err(e) => return Err(e.into()),
    };
    tracing::debug!(key = %key, first, count, "reserved sequence block");
    Ok(first..=first + (count - 1))
}
