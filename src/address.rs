use crate::errors::AddressError;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const MAX_ROW: u32 = 1_048_576;
pub const MAX_COL: u32 = 16_384;

/// Bijective base-26 column name for a zero-based column index (0 -> A, 26 -> AA).
pub fn column_letters(index: u32) -> String {
    let mut n = index as u64 + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = ((n - 1) % 26) as u8;
        out.push(b'A' + rem);
        n = (n - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Zero-based column index for a column name; `None` for anything but ASCII letters.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    let mut col: u64 = 0;
    for c in letters.chars() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (c.to_ascii_uppercase() as u64 - 'A' as u64 + 1);
        if col > MAX_COL as u64 {
            return None;
        }
    }
    Some((col - 1) as u32)
}

/// A single cell, 1-based on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    pub col: u32,
    pub row: u32,
}

impl CellAddress {
    pub fn new(col: u32, row: u32) -> Result<Self, AddressError> {
        if col == 0 || row == 0 || col > MAX_COL || row > MAX_ROW {
            return Err(AddressError::OutOfBounds(format!(
                "{}{}",
                column_letters(col.saturating_sub(1)),
                row
            )));
        }
        Ok(Self { col, row })
    }

    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        let invalid = || AddressError::InvalidCell(trimmed.to_string());

        let split_idx = trimmed.find(|c: char| c.is_ascii_digit()).ok_or_else(invalid)?;
        let (col_str, row_str) = trimmed.split_at(split_idx);
        if col_str.is_empty() || row_str.starts_with('0') {
            return Err(invalid());
        }
        if !row_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }
        if !col_str.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }

        let col = column_index(col_str)
            .ok_or_else(|| AddressError::OutOfBounds(trimmed.to_string()))?
            + 1;
        let row = row_str
            .parse::<u32>()
            .map_err(|_| AddressError::OutOfBounds(trimmed.to_string()))?;
        Self::new(col, row).map_err(|_| AddressError::OutOfBounds(trimmed.to_string()))
    }

    /// Cell reached by moving `rows` down and `cols` right.
    pub fn offset(&self, rows: u32, cols: u32) -> Result<Self, AddressError> {
        Self::new(self.col + cols, self.row + rows)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col - 1), self.row)
    }
}

impl FromStr for CellAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Reading order: a sheet's cells sort top row first, left to right within a row.
impl Ord for CellAddress {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.row, self.col).cmp(&(other.row, other.col))
    }
}

impl PartialOrd for CellAddress {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Rectangular block of cells with `start` top-left and `end` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RangeAddress {
    start: CellAddress,
    end: CellAddress,
}

impl RangeAddress {
    pub fn new(a: CellAddress, b: CellAddress) -> Self {
        let start = CellAddress {
            col: a.col.min(b.col),
            row: a.row.min(b.row),
        };
        let end = CellAddress {
            col: a.col.max(b.col),
            row: a.row.max(b.row),
        };
        Self { start, end }
    }

    pub fn single(cell: CellAddress) -> Self {
        Self {
            start: cell,
            end: cell,
        }
    }

    pub fn parse(s: &str) -> Result<Self, AddressError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(AddressError::Empty);
        }
        let parts: Vec<&str> = trimmed.split(':').collect();
        match parts.as_slice() {
            [cell] => Ok(Self::single(CellAddress::parse(cell)?)),
            [start, end] => Ok(Self::new(
                CellAddress::parse(start)?,
                CellAddress::parse(end)?,
            )),
            _ => Err(AddressError::InvalidRange(trimmed.to_string())),
        }
    }

    /// Range anchored at `start` covering `rows` x `cols` cells.
    pub fn anchored(start: CellAddress, rows: usize, cols: usize) -> Result<Self, AddressError> {
        let rows = rows.max(1) as u32;
        let cols = cols.max(1) as u32;
        let end = start.offset(rows - 1, cols - 1)?;
        Ok(Self { start, end })
    }

    pub fn start(&self) -> CellAddress {
        self.start
    }

    pub fn end(&self) -> CellAddress {
        self.end
    }

    /// `(start_row, start_col, end_row, end_col)`, 1-based and inclusive.
    pub fn bounds(&self) -> (u32, u32, u32, u32) {
        (self.start.row, self.start.col, self.end.row, self.end.col)
    }

    pub fn rows(&self) -> usize {
        (self.end.row - self.start.row + 1) as usize
    }

    pub fn cols(&self) -> usize {
        (self.end.col - self.start.col + 1) as usize
    }

    pub fn cell_count(&self) -> usize {
        self.rows() * self.cols()
    }

    pub fn is_single_cell(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, cell: &CellAddress) -> bool {
        cell.row >= self.start.row
            && cell.row <= self.end.row
            && cell.col >= self.start.col
            && cell.col <= self.end.col
    }

    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.col..=self.end.col).map(move |col| CellAddress { col, row })
        })
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}

impl FromStr for RangeAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<CellAddress> for RangeAddress {
    fn from(cell: CellAddress) -> Self {
        Self::single(cell)
    }
}

macro_rules! string_serde {
    ($ty:ty, $name:literal) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                <$ty>::parse(&raw).map_err(serde::de::Error::custom)
            }
        }

        impl JsonSchema for $ty {
            fn schema_name() -> Cow<'static, str> {
                $name.into()
            }

            fn json_schema(generator: &mut SchemaGenerator) -> Schema {
                String::json_schema(generator)
            }
        }
    };
}

string_serde!(CellAddress, "CellAddress");
string_serde!(RangeAddress, "RangeAddress");
