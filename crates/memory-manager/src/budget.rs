// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Arena size budgets and parsing.
//!
//! A [`MemoryBudget`] is the size of a caller-provided region. Microcontroller
//! arenas are small, so the parser accepts plain byte counts as well as
//! `K`/`M` suffixes.

use crate::{ArenaKind, MemoryError};
use std::fmt;

/// The byte size of a caller-provided arena region.
///
/// # Parsing
/// - `"988"` or `"988B"` → 988 bytes
/// - `"2K"` or `"2KB"` → 2 × 1024 bytes
/// - `"1M"` or `"1MB"` → 1024² bytes
///
/// # Examples
/// ```
/// use memory_manager::MemoryBudget;
///
/// let b = MemoryBudget::parse("988").unwrap();
/// assert_eq!(b.as_bytes(), 988);
///
/// let b = MemoryBudget::parse("100K").unwrap();
/// assert_eq!(b.as_kb(), 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemoryBudget {
    bytes: usize,
}

impl MemoryBudget {
    pub fn from_bytes(bytes: usize) -> Self {
        Self { bytes }
    }

    pub fn from_kb(kb: usize) -> Self {
        Self { bytes: kb * 1024 }
    }

    pub fn as_bytes(&self) -> usize {
        self.bytes
    }

    /// Returns the budget in kibibytes (truncated).
    pub fn as_kb(&self) -> usize {
        self.bytes / 1024
    }

    /// Fails with [`MemoryError::ArenaTooSmall`] if `required` does not fit.
    pub fn check(&self, kind: ArenaKind, required: usize) -> Result<(), MemoryError> {
        if required > self.bytes {
            return Err(MemoryError::ArenaTooSmall {
                kind,
                required,
                provided: self.bytes,
            });
        }
        Ok(())
    }

    /// Parses a human-readable budget string. Case-insensitive.
    pub fn parse(s: &str) -> Result<Self, MemoryError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(MemoryError::ZeroSized);
        }

        let upper = s.to_uppercase();
        let (num_str, multiplier) = if upper.ends_with("MB") {
            (&s[..s.len() - 2], 1024 * 1024)
        } else if upper.ends_with('M') {
            (&s[..s.len() - 1], 1024 * 1024)
        } else if upper.ends_with("KB") {
            (&s[..s.len() - 2], 1024)
        } else if upper.ends_with('K') {
            (&s[..s.len() - 1], 1024)
        } else if upper.ends_with('B') {
            (&s[..s.len() - 1], 1)
        } else {
            (s, 1)
        };

        let value: usize = num_str
            .trim()
            .parse()
            .map_err(|_| MemoryError::InvalidBudget(s.to_string()))?;
        let bytes = value
            .checked_mul(multiplier)
            .ok_or_else(|| MemoryError::InvalidBudget(s.to_string()))?;

        if bytes == 0 {
            return Err(MemoryError::ZeroSized);
        }
        Ok(Self { bytes })
    }
}

impl fmt::Display for MemoryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bytes >= 1024 * 1024 && self.bytes % (1024 * 1024) == 0 {
            write!(f, "{}M", self.bytes / (1024 * 1024))
        } else if self.bytes >= 1024 && self.bytes % 1024 == 0 {
            write!(f, "{}K", self.bytes / 1024)
        } else {
            write!(f, "{}", self.bytes)
        }
    }
}

impl TryFrom<String> for MemoryBudget {
    type Error = MemoryError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<MemoryBudget> for String {
    fn from(b: MemoryBudget) -> Self {
        b.to_string()
    }
}
