use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use thiserror::Error;

/// Composite counter key. The format is always part of the key so two formats
/// sharing discriminators never share a counter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SequenceKey {
    StudentStandard { yy: String, class_code: String },
    StudentYearOnly { yy: String },
    StudentSection { section_code: String, yy: String },
    StaffStandard { year: i32 },
    StaffDepartment { department: String, year: i32 },
    StaffSimplified,
}

impl fmt::Display for SequenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceKey::StudentStandard { yy, class_code } => {
                write!(f, "standard:{yy}-{class_code}")
            }
            SequenceKey::StudentYearOnly { yy } => write!(f, "year-only:{yy}"),
            SequenceKey::StudentSection { section_code, yy } => {
                write!(f, "section:{section_code}-{yy}")
            }
            SequenceKey::StaffStandard { year } => write!(f, "staff-standard:{year}"),
            SequenceKey::StaffDepartment { department, year } => {
                write!(f, "staff-department:{department}-{year}")
            }
            SequenceKey::StaffSimplified => f.write_str("staff-simplified:global"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("sequence counter for {key} would overflow")]
    Overflow { key: String },
    #[error("sequence {sequence} for {key} is above the ceiling {max}")]
    Exhausted { key: String, sequence: u32, max: u32 },
    #[error("sequence store failed: {0}")]
    Store(String),
}

/// Per-key monotonic allocator behind identifier generation.
///
/// Keys are passed in their string form (`SequenceKey::to_string`) so seeding
/// from a migration or an IPC call can address any counter without building
/// a typed key.
pub trait SequenceAllocator: Send + Sync {
    /// Advances `key` by `count` in one step and returns the first number
    /// handed out. Callers get `first..first + count`. A block that would end
    /// above `max` is refused and the counter is left where it was.
    fn reserve(&self, key: &str, count: u32, max: u32) -> Result<u32, SequenceError>;

    /// Last number issued for `key`, 0 if the key has never been used.
    fn current(&self, key: &str) -> Result<u32, SequenceError>;

    /// Sets the last issued number for `key`; the next reservation returns `value + 1`.
    fn seed(&self, key: &str, value: u32) -> Result<(), SequenceError>;

    fn reset(&self) -> Result<(), SequenceError>;

    fn next_sequence(&self, key: &str, max: u32) -> Result<u32, SequenceError> {
        self.reserve(key, 1, max)
    }

    /// Short label reported by `health`.
    fn kind(&self) -> &'static str;
}

/// Last number of the block after `last`, checked against `max` before any
/// store commits it.
pub(crate) fn block_end(key: &str, last: u32, count: u32, max: u32) -> Result<u32, SequenceError> {
    let end = last.checked_add(count).ok_or_else(|| SequenceError::Overflow {
        key: key.to_string(),
    })?;
    if end > max {
        return Err(SequenceError::Exhausted {
            key: key.to_string(),
            sequence: end,
            max,
        });
    }
    Ok(end)
}

/// Process-lifetime counters. Not persisted.
#[derive(Debug, Default)]
pub struct MemoryAllocator {
    counters: Mutex<HashMap<String, u32>>,
}

impl MemoryAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, u32>>, SequenceError> {
        self.counters
            .lock()
            .map_err(|_| SequenceError::Store("sequence table lock poisoned".to_string()))
    }
}

impl SequenceAllocator for MemoryAllocator {
    fn reserve(&self, key: &str, count: u32, max: u32) -> Result<u32, SequenceError> {
        let mut counters = self.lock()?;
        let last = counters.get(key).copied().unwrap_or(0);
        let end = block_end(key, last, count, max)?;
        counters.insert(key.to_string(), end);
        Ok(last + 1)
    }

    fn current(&self, key: &str) -> Result<u32, SequenceError> {
        Ok(self.lock()?.get(key).copied().unwrap_or(0))
    }

    fn seed(&self, key: &str, value: u32) -> Result<(), SequenceError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn reset(&self) -> Result<(), SequenceError> {
        self.lock()?.clear();
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
