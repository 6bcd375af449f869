//! Cell model structures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::LinkStyle;
use crate::error::{Error, Result};

/// A column identifier, stored as a 0-based index and displayed as
/// spreadsheet letters (`A`, `Z`, `AA`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnId(u32);

impl ColumnId {
    /// Largest column index accepted by spreadsheet applications (`XFD`).
    pub const MAX_INDEX: u32 = 16_383;

    /// Create a column identifier from a 0-based index.
    pub const fn from_index(index: u32) -> Self {
        Self(index)
    }

    /// The 0-based column index.
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Spreadsheet letter label for this column.
    pub fn letters(self) -> String {
        let mut col = self.0;
        let mut result = Vec::new();
        loop {
            result.push(b'A' + (col % 26) as u8);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result.reverse();
        result.into_iter().map(char::from).collect()
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.letters())
    }
}

impl FromStr for ColumnId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::InvalidData(format!("invalid column identifier: {s:?}")));
        }

        let mut value: u32 = 0;
        for b in s.bytes() {
            let digit = u32::from(b.to_ascii_uppercase() - b'A') + 1;
            value = value
                .checked_mul(26)
                .and_then(|v| v.checked_add(digit))
                .filter(|v| *v <= Self::MAX_INDEX + 1)
                .ok_or_else(|| Error::InvalidData(format!("column out of range: {s}")))?;
        }
        Ok(Self(value - 1))
    }
}

impl Serialize for ColumnId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.letters())
    }
}

impl<'de> Deserialize<'de> for ColumnId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A cell address: 1-based row and a column identifier.
///
/// Ordering is row-major, which matches the order cells appear in a worksheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CellRef {
    pub row: u32,
    pub col: ColumnId,
}

impl CellRef {
    /// Create a cell reference from a 1-based row and a column.
    pub const fn new(row: u32, col: ColumnId) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.col, self.row)
    }
}

impl FromStr for CellRef {
    type Err = Error;

    /// Parse an A1-style reference. `$` anchors are accepted and ignored.
    fn from_str(s: &str) -> Result<Self> {
        let cleaned: String = s.trim().chars().filter(|c| *c != '$').collect();
        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| Error::InvalidData(format!("invalid cell reference: {s:?}")))?;
        let (letters, digits) = cleaned.split_at(split);
        let col = letters.parse()?;
        let row = digits
            .parse::<u32>()
            .ok()
            .filter(|r| *r >= 1)
            .ok_or_else(|| Error::InvalidData(format!("invalid cell reference: {s:?}")))?;
        Ok(Self { row, col })
    }
}

/// The value held by a cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Date serial in the 1900 date system.
    Date(f64),
    /// Error code such as `#N/A`.
    Error(String),
    /// Formula expression (without the leading `=`) and its cached result.
    Formula {
        expr: String,
        cached: Option<String>,
    },
}

impl CellValue {
    /// Whether the cell holds nothing worth linking.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Formula { expr, cached } => {
                expr.is_empty() && cached.as_deref().is_none_or(str::is_empty)
            }
            _ => false,
        }
    }

    /// The value in its natural display form.
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
            CellValue::Date(serial) => {
                serial_to_date(*serial).unwrap_or_else(|| format_number(*serial))
            }
            CellValue::Error(code) => code.clone(),
            CellValue::Formula { expr, cached } => match cached {
                Some(value) if !value.is_empty() => value.clone(),
                _ => format!("={expr}"),
            },
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Where a hyperlink points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum HyperlinkTarget {
    /// External target stored as a relationship (URL, file, anything else).
    Url(String),
    /// Location inside the workbook, e.g. `Sheet2!A1`.
    Location(String),
}

/// A hyperlink attached to a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperlink {
    pub target: HyperlinkTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Hyperlink {
    /// An external hyperlink with no tooltip or display override.
    pub fn url(target: impl Into<String>) -> Self {
        Self {
            target: HyperlinkTarget::Url(target.into()),
            tooltip: None,
            display: None,
        }
    }

    /// The external target, if this is not an in-workbook link.
    pub fn url_target(&self) -> Option<&str> {
        match &self.target {
            HyperlinkTarget::Url(url) => Some(url),
            HyperlinkTarget::Location(_) => None,
        }
    }
}

/// One grid position: value, optional hyperlink and optional link style.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub(crate) value: CellValue,
    pub(crate) hyperlink: Option<Hyperlink>,
    pub(crate) link_style: Option<LinkStyle>,
    /// Cell format index (`s` attribute) from the source package.
    pub(crate) style_id: u32,
}

impl Cell {
    /// Create a cell holding `value` with no hyperlink and default format.
    pub fn new(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn value(&self) -> &CellValue {
        &self.value
    }

    pub fn hyperlink(&self) -> Option<&Hyperlink> {
        self.hyperlink.as_ref()
    }

    /// The style applied by the hyperlink assigner, if any.
    pub fn link_style(&self) -> Option<&LinkStyle> {
        self.link_style.as_ref()
    }

    /// Cell format index carried over from the source file.
    pub fn style_id(&self) -> u32 {
        self.style_id
    }
}

/// Convert an Excel serial date (1900 system) to an ISO 8601 string.
pub(crate) fn serial_to_date(serial: f64) -> Option<String> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }

    // Serial 60 is the nonexistent 1900-02-29 kept for Lotus 1-2-3 compatibility.
    let adjusted_serial = if serial > 60.0 { serial - 1.0 } else { serial };
    let days = adjusted_serial.floor() as i64;
    let (year, month, day) = days_to_ymd(days)?;

    let time_fraction = serial.fract();
    if time_fraction > 0.0001 {
        let total_seconds = (time_fraction * 86400.0).round() as u32;
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;
        Some(format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
            year, month, day, hours, minutes, seconds
        ))
    } else {
        Some(format!("{:04}-{:02}-{:02}", year, month, day))
    }
}

/// Convert days since 1899-12-31 to (year, month, day).
fn days_to_ymd(days: i64) -> Option<(i32, u32, u32)> {
    if days < 1 {
        return None;
    }

    let mut year = 1900;
    let mut remaining_days = days;
    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days <= days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let months_days = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1u32;
    for &days_in_month in &months_days {
        if remaining_days <= days_in_month as i64 {
            break;
        }
        remaining_days -= days_in_month as i64;
        month += 1;
    }

    Some((year, month, remaining_days.max(1) as u32))
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
