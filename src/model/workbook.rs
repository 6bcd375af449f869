//! Workbook and sheet model structures.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use super::{Cell, CellRef, CellValue, ColumnId};
use crate::detect::{detect_format_from_bytes, FormatType};
use crate::error::{Error, Result};
use crate::package::OoxmlPackage;

/// A headered column offered for selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnHeader {
    pub column: ColumnId,
    pub header: String,
}

impl fmt::Display for ColumnHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  [{}]", self.header, self.column)
    }
}

/// A named grid of cells.
///
/// Row 1 is the header row; data rows start at row 2.
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<CellRef, Cell>,
    /// Worksheet part inside the source package, if any.
    pub(crate) part: Option<String>,
    /// Read from a source file rather than added in memory.
    pub(crate) loaded: bool,
    /// Hyperlinks or link styles changed since load.
    pub(crate) links_changed: bool,
    /// Cell values changed since load.
    pub(crate) values_changed: bool,
}

impl Sheet {
    /// Create an empty sheet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the cell at `at`, if it exists.
    pub fn cell(&self, at: CellRef) -> Option<&Cell> {
        self.cells.get(&at)
    }

    pub(crate) fn cell_mut(&mut self, at: CellRef) -> Option<&mut Cell> {
        self.cells.get_mut(&at)
    }

    /// Iterate cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (&CellRef, &Cell)> {
        self.cells.iter()
    }

    /// Set the value of a cell, creating it if needed. An existing
    /// hyperlink and format are kept.
    pub fn set_value(&mut self, at: CellRef, value: impl Into<CellValue>) {
        self.cells.entry(at).or_default().value = value.into();
        self.values_changed = true;
    }

    /// Mutable access to a loaded cell, creating an empty one if needed,
    /// without marking the sheet modified.
    pub(crate) fn loaded_entry(&mut self, at: CellRef) -> &mut Cell {
        self.cells.entry(at).or_default()
    }

    /// Highest row index that holds a non-empty value, or 0 for an empty sheet.
    pub fn max_row(&self) -> u32 {
        self.cells
            .iter()
            .rev()
            .find(|(_, cell)| !cell.value.is_empty())
            .map(|(at, _)| at.row)
            .unwrap_or(0)
    }

    /// Columns whose header (row 1) is non-empty, in column order.
    pub fn columns(&self) -> Vec<ColumnHeader> {
        self.cells
            .range(CellRef::new(1, ColumnId::from_index(0))..CellRef::new(2, ColumnId::from_index(0)))
            .filter(|(_, cell)| !cell.value.is_empty())
            .map(|(at, cell)| ColumnHeader {
                column: at.col,
                header: cell.value.to_text(),
            })
            .collect()
    }

    /// Whether anything in this sheet changed since it was loaded.
    pub fn is_modified(&self) -> bool {
        self.links_changed || self.values_changed
    }
}

/// An ordered collection of sheets loaded from (or saved to) one file.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    pub(crate) sheets: Vec<Sheet>,
    pub(crate) format: Option<FormatType>,
    /// Original package for xlsx input; unmodified parts are written back verbatim.
    pub(crate) package: Option<OoxmlPackage>,
    /// The source stores dates in the 1904 system.
    pub(crate) date1904: bool,
}

impl Workbook {
    /// Create an empty in-memory workbook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a workbook from a file, detecting its format from the content.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use hyperlink_maker::Workbook;
    ///
    /// let workbook = Workbook::open("links.xlsx")?;
    /// println!("Sheets: {:?}", workbook.sheet_names());
    /// # Ok::<(), hyperlink_maker::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        log::debug!("loading workbook {}", path.display());
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Load a workbook from bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let format = detect_format_from_bytes(&data)?;
        let workbook = match format {
            FormatType::Xlsx => crate::xlsx::read_workbook(OoxmlPackage::from_bytes(data)?)?,
            #[cfg(feature = "xls")]
            FormatType::Xls => crate::xls::read_workbook(data)?,
            #[cfg(not(feature = "xls"))]
            FormatType::Xls => return Err(Error::UnsupportedFormat(format.to_string())),
            FormatType::Docx | FormatType::Pptx => {
                return Err(Error::UnsupportedFormat(format.to_string()))
            }
        };
        log::debug!(
            "loaded {} workbook with {} sheet(s)",
            format.extension(),
            workbook.sheets.len()
        );
        Ok(workbook)
    }

    /// The format the workbook was loaded from; `None` when built in memory.
    pub fn format(&self) -> Option<FormatType> {
        self.format
    }

    /// Whether the source stored dates in the 1904 system.
    pub fn is_date1904(&self) -> bool {
        self.date1904
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name()).collect()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Append a new empty sheet.
    pub fn add_sheet(&mut self, name: &str) -> Result<&mut Sheet> {
        if self.sheet(name).is_some() {
            return Err(Error::InvalidData(format!("Sheet '{name}' already exists")));
        }
        self.sheets.push(Sheet::new(name));
        let index = self.sheets.len() - 1;
        Ok(&mut self.sheets[index])
    }

    /// Write the workbook to `path` in the zipped-XML format.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        crate::hyperlink::persist(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(a1: &str) -> CellRef {
        a1.parse().unwrap()
    }

    #[test]
    fn test_max_row_ignores_empty_cells() {
        let mut sheet = Sheet::new("Data");
        assert_eq!(sheet.max_row(), 0);

        sheet.set_value(at("A1"), "Name");
        sheet.set_value(at("A3"), "x");
        *sheet.loaded_entry(at("B9")) = Cell::new(CellValue::Empty);
        assert_eq!(sheet.max_row(), 3);
    }

    #[test]
    fn test_columns_from_header_row() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(at("C1"), "Site");
        sheet.set_value(at("A1"), "Name");
        sheet.set_value(at("B1"), "");
        sheet.set_value(at("A2"), "not a header");

        let columns = sheet.columns();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].to_string(), "Name  [A]");
        assert_eq!(columns[1].column, ColumnId::from_index(2));
        assert_eq!(columns[1].header, "Site");
    }

    #[test]
    fn test_add_sheet_rejects_duplicates() {
        let mut workbook = Workbook::new();
        workbook.add_sheet("One").unwrap();
        workbook.add_sheet("Two").unwrap();
        assert!(workbook.add_sheet("One").is_err());
        assert_eq!(workbook.sheet_names(), vec!["One", "Two"]);
        assert!(workbook.format().is_none());
    }

    #[test]
    fn test_set_value_marks_modified() {
        let mut sheet = Sheet::new("Data");
        assert!(!sheet.is_modified());
        *sheet.loaded_entry(at("A1")) = Cell::new("x");
        assert!(!sheet.is_modified());
        sheet.set_value(at("A2"), 5.0);
        assert!(sheet.is_modified());
    }

    #[test]
    fn test_from_bytes_rejects_garbage() {
        let err = Workbook::from_bytes(b"not a spreadsheet".to_vec()).unwrap_err();
        assert!(matches!(err, Error::UnknownFormat));
        assert!(err.is_load_error());
    }
}
