use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::classes::Section;
use super::sequence::{SequenceAllocator, SequenceKey};
use super::{current_year, reserve_block, IdError, IdFormat, IdParams, PREFIX};

// Checked in this order. The shapes are disjoint: standard and year-only start
// with two digits and differ in segment count, section starts with three
// letters, and legacy needs the single-letter `L` segment.
static STANDARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^VSP-([0-9]{2})-([A-Z0-9]{3,4})-([0-9]{4})$").expect("regex"));
static YEAR_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^VSP-([0-9]{2})-([0-9]{5})$").expect("regex"));
static SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^VSP-([A-Z]{3})-([0-9]{2})-([0-9]{4})$").expect("regex"));
static LEGACY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^VSP-L-(.+)$").expect("regex"));

const CLASS_WIDTH: usize = 4;
const YEAR_ONLY_WIDTH: usize = 5;
const SECTION_WIDTH: usize = 4;

/// What the caller asked for. Each variant carries exactly the fields its
/// shape needs; only the year may be left to default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentFormat {
    Standard { class_code: String, year: Option<i32> },
    YearOnly { year: Option<i32> },
    Section { section: Section, year: Option<i32> },
    Legacy { original_id: String },
}

impl StudentFormat {
    pub fn from_params(format: &str, p: &IdParams) -> Result<Self, IdError> {
        match format {
            "standard" => {
                let class_code = p
                    .class_code
                    .clone()
                    .ok_or_else(|| IdError::missing("classCode", format))?;
                Ok(StudentFormat::Standard {
                    class_code,
                    year: p.year,
                })
            }
            "year-only" => Ok(StudentFormat::YearOnly { year: p.year }),
            "section" => {
                let raw = p
                    .section
                    .as_deref()
                    .ok_or_else(|| IdError::missing("section", format))?;
                let section = Section::lookup(raw).ok_or_else(|| {
                    IdError::InvalidFormatParameters(format!("unknown section: {raw}"))
                })?;
                Ok(StudentFormat::Section {
                    section,
                    year: p.year,
                })
            }
            "legacy" => {
                let original_id = p
                    .original_id
                    .clone()
                    .ok_or_else(|| IdError::missing("originalId", format))?;
                Ok(StudentFormat::Legacy { original_id })
            }
            other => Err(IdError::InvalidFormatParameters(format!(
                "unknown student format: {other}"
            ))),
        }
    }
}

/// A decoded student identifier. `Display` produces the wire string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentId {
    Standard {
        year: i32,
        class_code: String,
        sequence: u32,
    },
    YearOnly {
        year: i32,
        sequence: u32,
    },
    Section {
        section_code: String,
        year: i32,
        sequence: u32,
    },
    Legacy {
        original_id: String,
    },
}

impl StudentId {
    pub fn parse(s: &str) -> Option<StudentId> {
        if let Some(c) = STANDARD.captures(s) {
            return Some(StudentId::Standard {
                year: expand_year(&c[1])?,
                class_code: c[2].to_string(),
                sequence: c[3].parse().ok()?,
            });
        }
        if let Some(c) = YEAR_ONLY.captures(s) {
            return Some(StudentId::YearOnly {
                year: expand_year(&c[1])?,
                sequence: c[2].parse().ok()?,
            });
        }
        if let Some(c) = SECTION.captures(s) {
            return Some(StudentId::Section {
                section_code: c[1].to_string(),
                year: expand_year(&c[2])?,
                sequence: c[3].parse().ok()?,
            });
        }
        LEGACY.captures(s).map(|c| StudentId::Legacy {
            original_id: c[1].to_string(),
        })
    }

    pub fn format(&self) -> IdFormat {
        match self {
            StudentId::Standard { .. } => IdFormat::Standard,
            StudentId::YearOnly { .. } => IdFormat::YearOnly,
            StudentId::Section { .. } => IdFormat::Section,
            StudentId::Legacy { .. } => IdFormat::Legacy,
        }
    }

    /// `VC-YYYY-XXXXX` for allocated ids, `VC-L-<last 6>` for legacy ones.
    pub fn badge_number(&self) -> String {
        match self {
            StudentId::Standard { year, sequence, .. }
            | StudentId::YearOnly { year, sequence }
            | StudentId::Section { year, sequence, .. } => format!("VC-{year}-{sequence:05}"),
            StudentId::Legacy { original_id } => {
                let n = original_id.chars().count();
                let tail: String = original_id.chars().skip(n.saturating_sub(6)).collect();
                format!("VC-L-{tail}")
            }
        }
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudentId::Standard {
                year,
                class_code,
                sequence,
            } => write!(f, "{PREFIX}-{:02}-{class_code}-{sequence:04}", year % 100),
            StudentId::YearOnly { year, sequence } => {
                write!(f, "{PREFIX}-{:02}-{sequence:05}", year % 100)
            }
            StudentId::Section {
                section_code,
                year,
                sequence,
            } => write!(f, "{PREFIX}-{section_code}-{:02}-{sequence:04}", year % 100),
            StudentId::Legacy { original_id } => write!(f, "{PREFIX}-L-{original_id}"),
        }
    }
}

pub fn validate(s: &str) -> bool {
    StudentId::parse(s).is_some()
}

pub fn generate(alloc: &dyn SequenceAllocator, format: &StudentFormat) -> Result<String, IdError> {
    if let StudentFormat::Legacy { original_id } = format {
        return legacy(original_id).map(|id| id.to_string());
    }
    let ids = allocate(alloc, format, 1)?;
    let id = ids
        .into_iter()
        .next()
        .map(|id| id.to_string())
        .ok_or(IdError::InvalidBatchCount)?;
    tracing::info!(identifier = %id, "issued student identifier");
    Ok(id)
}

pub fn generate_batch(
    alloc: &dyn SequenceAllocator,
    format: &StudentFormat,
    count: u32,
) -> Result<Vec<String>, IdError> {
    let ids: Vec<String> = allocate(alloc, format, count)?
        .iter()
        .map(ToString::to_string)
        .collect();
    tracing::info!(count = ids.len(), "issued student identifier batch");
    Ok(ids)
}

fn allocate(
    alloc: &dyn SequenceAllocator,
    format: &StudentFormat,
    count: u32,
) -> Result<Vec<StudentId>, IdError> {
    match format {
        StudentFormat::Standard { class_code, year } => {
            let class_code = normalize_class_code(class_code)?;
            let year = admission_year(*year)?;
            let key = SequenceKey::StudentStandard {
                yy: format!("{:02}", year % 100),
                class_code: class_code.clone(),
            };
            Ok(reserve_block(alloc, &key, count, CLASS_WIDTH)?
                .map(|sequence| StudentId::Standard {
                    year,
                    class_code: class_code.clone(),
                    sequence,
                })
                .collect())
        }
        StudentFormat::YearOnly { year } => {
            let year = admission_year(*year)?;
            let key = SequenceKey::StudentYearOnly {
                yy: format!("{:02}", year % 100),
            };
            Ok(reserve_block(alloc, &key, count, YEAR_ONLY_WIDTH)?
                .map(|sequence| StudentId::YearOnly { year, sequence })
                .collect())
        }
        StudentFormat::Section { section, year } => {
            let year = admission_year(*year)?;
            let key = SequenceKey::StudentSection {
                section_code: section.code().to_string(),
                yy: format!("{:02}", year % 100),
            };
            Ok(reserve_block(alloc, &key, count, SECTION_WIDTH)?
                .map(|sequence| StudentId::Section {
                    section_code: section.code().to_string(),
                    year,
                    sequence,
                })
                .collect())
        }
        StudentFormat::Legacy { .. } => Err(IdError::InvalidFormatParameters(
            "legacy identifiers wrap an existing id and cannot be batch generated".to_string(),
        )),
    }
}

fn legacy(original_id: &str) -> Result<StudentId, IdError> {
    let trimmed = original_id.trim();
    let clean = match trimmed.get(..PREFIX.len()) {
        Some(head) if head.eq_ignore_ascii_case(PREFIX) => {
            let rest = &trimmed[PREFIX.len()..];
            rest.strip_prefix('-').unwrap_or(rest)
        }
        _ => trimmed,
    };
    if clean.is_empty() || clean.contains('\n') {
        return Err(IdError::InvalidFormatParameters(format!(
            "originalId {original_id:?} leaves nothing to wrap"
        )));
    }
    Ok(StudentId::Legacy {
        original_id: clean.to_string(),
    })
}

fn normalize_class_code(raw: &str) -> Result<String, IdError> {
    let code = raw.trim().to_ascii_uppercase();
    let ok = (3..=4).contains(&code.len()) && code.chars().all(|c| c.is_ascii_alphanumeric());
    if !ok {
        return Err(IdError::InvalidFormatParameters(format!(
            "classCode must be 3-4 letters or digits, got {raw:?}"
        )));
    }
    Ok(code)
}

/// Student ids encode the year as two digits and decode it as `20YY`, so only
/// 2000..=2099 round-trips.
fn admission_year(year: Option<i32>) -> Result<i32, IdError> {
    let year = year.unwrap_or_else(current_year);
    if !(2000..=2099).contains(&year) {
        return Err(IdError::InvalidFormatParameters(format!(
            "admission year must be between 2000 and 2099, got {year}"
        )));
    }
    Ok(year)
}

fn expand_year(yy: &str) -> Option<i32> {
    format!("20{yy}").parse().ok()
}
