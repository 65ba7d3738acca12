use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::sequence::{SequenceAllocator, SequenceKey};
use super::{current_year, reserve_block, IdError, IdFormat, IdParams, PREFIX, STAFF_TAG};

static STANDARD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^VSP-STF-([0-9]{4})-([0-9]{4})$").expect("regex"));
static DEPARTMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^VSP-STF-([A-Z]{2,3})-([0-9]{4})-([0-9]{4})$").expect("regex"));
static SIMPLIFIED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^VSP-STF-([0-9]{5})$").expect("regex"));
static LEGACY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^VSP-STF-L-([0-9]{4})-([0-9]{4})$").expect("regex"));

const STANDARD_WIDTH: usize = 4;
const DEPARTMENT_WIDTH: usize = 4;
const SIMPLIFIED_WIDTH: usize = 5;
const LEGACY_MAX: u32 = 9999;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffFormat {
    Standard {
        year: Option<i32>,
    },
    Department {
        department: String,
        year: Option<i32>,
    },
    Simplified,
    /// Staff migrated from the previous system keep their joining year and number.
    Legacy {
        year: i32,
        original_number: u32,
    },
}

impl StaffFormat {
    pub fn from_params(format: &str, p: &IdParams) -> Result<Self, IdError> {
        match format {
            "standard" => Ok(StaffFormat::Standard { year: p.year }),
            "department" => {
                let department = p
                    .department
                    .clone()
                    .ok_or_else(|| IdError::missing("department", format))?;
                Ok(StaffFormat::Department {
                    department,
                    year: p.year,
                })
            }
            "simplified" => Ok(StaffFormat::Simplified),
            "legacy" => Ok(StaffFormat::Legacy {
                year: p.year.ok_or_else(|| IdError::missing("year", format))?,
                original_number: p
                    .original_number
                    .ok_or_else(|| IdError::missing("originalNumber", format))?,
            }),
            other => Err(IdError::InvalidFormatParameters(format!(
                "unknown staff format: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaffId {
    Standard {
        year: i32,
        sequence: u32,
    },
    Department {
        department: String,
        year: i32,
        sequence: u32,
    },
    Simplified {
        sequence: u32,
    },
    Legacy {
        year: i32,
        number: u32,
    },
}

impl StaffId {
    pub fn parse(s: &str) -> Option<StaffId> {
        if let Some(c) = STANDARD.captures(s) {
            return Some(StaffId::Standard {
                year: c[1].parse().ok()?,
                sequence: c[2].parse().ok()?,
            });
        }
        if let Some(c) = DEPARTMENT.captures(s) {
            return Some(StaffId::Department {
                department: c[1].to_string(),
                year: c[2].parse().ok()?,
                sequence: c[3].parse().ok()?,
            });
        }
        if let Some(c) = SIMPLIFIED.captures(s) {
            return Some(StaffId::Simplified {
                sequence: c[1].parse().ok()?,
            });
        }
        let c = LEGACY.captures(s)?;
        Some(StaffId::Legacy {
            year: c[1].parse().ok()?,
            number: c[2].parse().ok()?,
        })
    }

    pub fn format(&self) -> IdFormat {
        match self {
            StaffId::Standard { .. } => IdFormat::Standard,
            StaffId::Department { .. } => IdFormat::Department,
            StaffId::Simplified { .. } => IdFormat::Simplified,
            StaffId::Legacy { .. } => IdFormat::Legacy,
        }
    }

    pub fn badge_number(&self) -> String {
        let n = match self {
            StaffId::Standard { sequence, .. }
            | StaffId::Department { sequence, .. }
            | StaffId::Simplified { sequence } => *sequence,
            StaffId::Legacy { number, .. } => *number,
        };
        format!("VC-{n:05}")
    }
}

impl fmt::Display for StaffId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffId::Standard { year, sequence } => {
                write!(f, "{PREFIX}-{STAFF_TAG}-{year}-{sequence:04}")
            }
            StaffId::Department {
                department,
                year,
                sequence,
            } => write!(f, "{PREFIX}-{STAFF_TAG}-{department}-{year}-{sequence:04}"),
            StaffId::Simplified { sequence } => write!(f, "{PREFIX}-{STAFF_TAG}-{sequence:05}"),
            StaffId::Legacy { year, number } => {
                write!(f, "{PREFIX}-{STAFF_TAG}-L-{year}-{number:04}")
            }
        }
    }
}

pub fn validate(s: &str) -> bool {
    StaffId::parse(s).is_some()
}

pub fn generate(alloc: &dyn SequenceAllocator, format: &StaffFormat) -> Result<String, IdError> {
    if let StaffFormat::Legacy {
        year,
        original_number,
    } = format
    {
        return legacy(*year, *original_number).map(|id| id.to_string());
    }
    let id = allocate(alloc, format, 1)?
        .pop()
        .map(|id| id.to_string())
        .ok_or(IdError::InvalidBatchCount)?;
    tracing::info!(identifier = %id, "issued staff identifier");
    Ok(id)
}

pub fn generate_batch(
    alloc: &dyn SequenceAllocator,
    format: &StaffFormat,
    count: u32,
) -> Result<Vec<String>, IdError> {
    let ids: Vec<String> = allocate(alloc, format, count)?
        .iter()
        .map(ToString::to_string)
        .collect();
    tracing::info!(count = ids.len(), "issued staff identifier batch");
    Ok(ids)
}

fn allocate(
    alloc: &dyn SequenceAllocator,
    format: &StaffFormat,
    count: u32,
) -> Result<Vec<StaffId>, IdError> {
    match format {
        StaffFormat::Standard { year } => {
            let year = joining_year(*year)?;
            let key = SequenceKey::StaffStandard { year };
            Ok(reserve_block(alloc, &key, count, STANDARD_WIDTH)?
                .map(|sequence| StaffId::Standard { year, sequence })
                .collect())
        }
        StaffFormat::Department { department, year } => {
            let department = normalize_department(department)?;
            let year = joining_year(*year)?;
            let key = SequenceKey::StaffDepartment {
                department: department.clone(),
                year,
            };
            Ok(reserve_block(alloc, &key, count, DEPARTMENT_WIDTH)?
                .map(|sequence| StaffId::Department {
                    department: department.clone(),
                    year,
                    sequence,
                })
                .collect())
        }
        StaffFormat::Simplified => Ok(reserve_block(
            alloc,
            &SequenceKey::StaffSimplified,
            count,
            SIMPLIFIED_WIDTH,
        )?
        .map(|sequence| StaffId::Simplified { sequence })
        .collect()),
        StaffFormat::Legacy { .. } => Err(IdError::InvalidFormatParameters(
            "legacy staff identifiers carry an original number and cannot be batch generated"
                .to_string(),
        )),
    }
}

fn legacy(year: i32, number: u32) -> Result<StaffId, IdError> {
    let year = joining_year(Some(year))?;
    if !(1..=LEGACY_MAX).contains(&number) {
        return Err(IdError::InvalidFormatParameters(format!(
            "originalNumber must be between 1 and {LEGACY_MAX}, got {number}"
        )));
    }
    Ok(StaffId::Legacy { year, number })
}

/// Upper-cased and cut to three characters; must leave 2-3 letters.
fn normalize_department(raw: &str) -> Result<String, IdError> {
    let code: String = raw.trim().to_ascii_uppercase().chars().take(3).collect();
    let ok = code.len() >= 2 && code.chars().all(|c| c.is_ascii_uppercase());
    if !ok {
        return Err(IdError::InvalidFormatParameters(format!(
            "department must be 2-3 letters, got {raw:?}"
        )));
    }
    Ok(code)
}

fn joining_year(year: Option<i32>) -> Result<i32, IdError> {
    let year = year.unwrap_or_else(current_year);
    if !(1000..=9999).contains(&year) {
        return Err(IdError::InvalidFormatParameters(format!(
            "joining year must have four digits, got {year}"
        )));
    }
    Ok(year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::MemoryAllocator;

    #[test]
    fn staff_shapes() {
        let a = MemoryAllocator::new();
        assert_eq!(
            generate(&a, &StaffFormat::Standard { year: Some(2024) }).unwrap(),
            "VSP-STF-2024-0001"
        );
        assert_eq!(
            generate(
                &a,
                &StaffFormat::Department {
                    department: "teaching".into(),
                    year: Some(2024)
                }
            )
            .unwrap(),
            "VSP-STF-TEA-2024-0001"
        );
        assert_eq!(generate(&a, &StaffFormat::Simplified).unwrap(), "VSP-STF-00001");
        assert_eq!(generate(&a, &StaffFormat::Simplified).unwrap(), "VSP-STF-00002");
        assert_eq!(
            generate(
                &a,
                &StaffFormat::Legacy {
                    year: 2020,
                    original_number: 123
                }
            )
            .unwrap(),
            "VSP-STF-L-2020-0123"
        );
        assert_eq!(a.current("staff-standard:2024").unwrap(), 1);
        assert_eq!(a.current("staff-department:TEA-2024").unwrap(), 1);
    }

    #[test]
    fn department_and_standard_counters_are_separate() {
        let a = MemoryAllocator::new();
        let dept = StaffFormat::Department {
            department: "ADM".into(),
            year: Some(2024),
        };
        generate(&a, &dept).unwrap();
        generate(&a, &dept).unwrap();
        assert_eq!(
            generate(&a, &StaffFormat::Standard { year: Some(2024) }).unwrap(),
            "VSP-STF-2024-0001"
        );
    }

    #[test]
    fn parse_cascade_order() {
        assert_eq!(
            StaffId::parse("VSP-STF-2024-0045"),
            Some(StaffId::Standard {
                year: 2024,
                sequence: 45
            })
        );
        assert_eq!(
            StaffId::parse("VSP-STF-SPT-2024-0001"),
            Some(StaffId::Department {
                department: "SPT".into(),
                year: 2024,
                sequence: 1
            })
        );
        assert_eq!(
            StaffId::parse("VSP-STF-L-2019-0456"),
            Some(StaffId::Legacy {
                year: 2019,
                number: 456
            })
        );
        assert_eq!(StaffId::parse("VSP-STF-99999"), Some(StaffId::Simplified { sequence: 99999 }));
        assert_eq!(StaffId::parse("VSP-STF-A-2024-0001"), None);
        assert_eq!(StaffId::parse("VSP-STF-ABCD-2024-0001"), None);
    }

    #[test]
    fn bad_staff_parameters() {
        let a = MemoryAllocator::new();
        let p = IdParams::default();
        assert!(StaffFormat::from_params("department", &p).is_err());
        assert!(StaffFormat::from_params("legacy", &p).is_err());
        assert!(StaffFormat::from_params("year-only", &p).is_err());
        for dept in ["T", "T1", "", "12"] {
            let f = StaffFormat::Department {
                department: dept.into(),
                year: Some(2024),
            };
            assert!(generate(&a, &f).is_err(), "{dept:?}");
        }
        assert!(generate(&a, &StaffFormat::Standard { year: Some(999) }).is_err());
        for original_number in [0, 10_000] {
            let f = StaffFormat::Legacy {
                year: 2020,
                original_number,
            };
            assert!(
                matches!(generate(&a, &f), Err(IdError::InvalidFormatParameters(_))),
                "{original_number}"
            );
        }
    }

    #[test]
    fn batch_rejects_legacy_and_stays_contiguous() {
        let a = MemoryAllocator::new();
        let ids = generate_batch(&a, &StaffFormat::Standard { year: Some(2025) }, 3).unwrap();
        assert_eq!(
            ids,
            vec!["VSP-STF-2025-0001", "VSP-STF-2025-0002", "VSP-STF-2025-0003"]
        );
        assert!(generate_batch(
            &a,
            &StaffFormat::Legacy {
                year: 2020,
                original_number: 1
            },
            1
        )
        .is_err());
    }

    #[test]
    fn staff_badges() {
        assert_eq!(
            StaffId::Legacy {
                year: 2019,
                number: 456
            }
            .badge_number(),
            "VC-00456"
        );
        assert_eq!(StaffId::Simplified { sequence: 12 }.badge_number(), "VC-00012");
    }
}
