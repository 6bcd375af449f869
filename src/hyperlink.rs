//! Hyperlink assignment over selected columns of a sheet.

use serde::Serialize;
use std::io;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::{CellRef, ColumnId, Hyperlink, Sheet, Workbook};
use crate::options::AssignOptions;

/// Row 1 holds headers; links start on the row below.
pub const FIRST_DATA_ROW: u32 = 2;

/// Derive the hyperlink target for a cell's text.
///
/// `http://` and `https://` text is used as-is, `www.` text gets an
/// `https://` prefix, and anything else passes through unchanged.
///
/// # Example
///
/// ```
/// use hyperlink_maker::hyperlink_target;
///
/// assert_eq!(hyperlink_target("www.example.com"), "https://www.example.com");
/// assert_eq!(hyperlink_target("http://foo.org"), "http://foo.org");
/// assert_eq!(hyperlink_target("hello"), "hello");
/// ```
pub fn hyperlink_target(text: &str) -> String {
    if text.starts_with("http://") || text.starts_with("https://") {
        text.to_string()
    } else if text.starts_with("www.") {
        format!("https://{text}")
    } else {
        text.to_string()
    }
}

/// Receives one call per processed row.
pub trait ProgressObserver {
    /// `row` was just processed; `total` is the sheet's last row.
    fn on_row(&mut self, row: u32, total: u32);
}

impl<F: FnMut(u32, u32)> ProgressObserver for F {
    fn on_row(&mut self, row: u32, total: u32) {
        self(row, total)
    }
}

/// Observer that ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_row(&mut self, _row: u32, _total: u32) {}
}

/// What one `apply` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppliedCount {
    /// Cells that received a hyperlink
    pub cells: usize,
    /// Rows walked
    pub rows: u32,
}

/// Turns cell text into hyperlinks with a link style.
#[derive(Debug, Clone, Default)]
pub struct HyperlinkAssigner {
    options: AssignOptions,
}

impl HyperlinkAssigner {
    pub fn new(options: AssignOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AssignOptions {
        &self.options
    }

    /// Link every non-empty cell of `columns` in rows `2..=max_row`.
    ///
    /// Rows are walked in ascending order and columns in the given order;
    /// `progress` is called once after each row with `(row, max_row)`.
    /// Repeated column identifiers are processed once. Cell values are never
    /// changed.
    pub fn apply<P>(&self, sheet: &mut Sheet, columns: &[ColumnId], progress: &mut P) -> AppliedCount
    where
        P: ProgressObserver + ?Sized,
    {
        let total = sheet.max_row();
        let mut count = AppliedCount::default();
        if total < FIRST_DATA_ROW {
            log::debug!("sheet '{}' has no data rows", sheet.name());
            return count;
        }

        let mut selected: Vec<ColumnId> = Vec::with_capacity(columns.len());
        for col in columns {
            if !selected.contains(col) {
                selected.push(*col);
            }
        }

        for row in FIRST_DATA_ROW..=total {
            for &col in &selected {
                let Some(cell) = sheet.cell_mut(CellRef::new(row, col)) else {
                    continue;
                };
                if cell.value.is_empty() {
                    continue;
                }
                let url = hyperlink_target(&cell.value.to_text());
                log::trace!("{} -> {url}", CellRef::new(row, col));
                cell.hyperlink = Some(Hyperlink::url(url));
                cell.link_style = Some(self.options.link_style.clone());
                count.cells += 1;
            }
            count.rows += 1;
            progress.on_row(row, total);
        }

        if count.cells > 0 {
            sheet.links_changed = true;
        }
        log::debug!(
            "linked {} cell(s) over {} row(s) in sheet '{}'",
            count.cells,
            count.rows,
            sheet.name()
        );
        count
    }
}

/// Write the whole workbook to `path` as xlsx, replacing any existing file.
///
/// The archive is built in memory before the destination is opened. On
/// failure the workbook is untouched and can be saved elsewhere.
pub fn persist(workbook: &Workbook, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let save_error = |source: io::Error| Error::Save {
        path: path.to_path_buf(),
        source,
    };

    let bytes = crate::xlsx::write_workbook(workbook)
        .map_err(|e| save_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    std::fs::write(path, &bytes).map_err(save_error)?;

    log::debug!("saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, HyperlinkTarget, Underline};

    fn at(a1: &str) -> CellRef {
        a1.parse().unwrap()
    }

    fn col(letters: &str) -> ColumnId {
        letters.parse().unwrap()
    }

    fn url_of(sheet: &Sheet, a1: &str) -> Option<String> {
        sheet
            .cell(at(a1))
            .and_then(|c| c.hyperlink())
            .and_then(|h| h.url_target())
            .map(String::from)
    }

    #[test]
    fn test_hyperlink_target_rules() {
        assert_eq!(hyperlink_target("https://a.b"), "https://a.b");
        assert_eq!(hyperlink_target("www.example.com"), "https://www.example.com");
        assert_eq!(hyperlink_target("WWW.example.com"), "WWW.example.com");
        assert_eq!(hyperlink_target("ftp://x"), "ftp://x");
        assert_eq!(hyperlink_target(""), "");
    }

    #[test]
    fn test_apply_links_selected_column() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(at("A1"), "Site");
        sheet.set_value(at("B1"), "Note");
        sheet.set_value(at("A2"), "www.example.com");
        sheet.set_value(at("B2"), "www.ignored.com");
        sheet.set_value(at("A3"), "http://foo.org");

        let mut calls = Vec::new();
        let count = HyperlinkAssigner::default().apply(&mut sheet, &[col("A")], &mut |row: u32, total: u32| {
            calls.push((row, total))
        });

        assert_eq!(count, AppliedCount { cells: 2, rows: 2 });
        assert_eq!(calls, vec![(2, 3), (3, 3)]);
        assert_eq!(url_of(&sheet, "A2").as_deref(), Some("https://www.example.com"));
        assert_eq!(url_of(&sheet, "A3").as_deref(), Some("http://foo.org"));
        assert!(url_of(&sheet, "B2").is_none());
        assert!(url_of(&sheet, "A1").is_none());

        let cell = sheet.cell(at("A2")).unwrap();
        assert_eq!(cell.value(), &CellValue::Text("www.example.com".into()));
        assert_eq!(cell.link_style().unwrap().color.as_argb(), "FF0563C1");
        assert!(sheet.is_modified());
    }

    #[test]
    fn test_apply_skips_empty_and_passes_through_text() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(at("A1"), "Site");
        sheet.set_value(at("A2"), "hello");
        sheet.set_value(at("A3"), "");
        sheet.set_value(at("A4"), 42.0);

        let count = HyperlinkAssigner::default().apply(&mut sheet, &[col("A")], &mut NoProgress);

        assert_eq!(count.cells, 2);
        assert_eq!(url_of(&sheet, "A2").as_deref(), Some("hello"));
        assert!(sheet.cell(at("A3")).unwrap().hyperlink().is_none());
        assert!(sheet.cell(at("A3")).unwrap().link_style().is_none());
        assert_eq!(url_of(&sheet, "A4").as_deref(), Some("42"));
    }

    #[test]
    fn test_header_only_sheet_does_nothing() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(at("A1"), "www.header.com");
        sheet.values_changed = false;

        let mut calls = 0;
        let count = HyperlinkAssigner::default().apply(&mut sheet, &[col("A")], &mut |_: u32, _: u32| calls += 1);

        assert_eq!(count, AppliedCount::default());
        assert_eq!(calls, 0);
        assert!(!sheet.is_modified());
    }

    #[test]
    fn test_empty_selection_still_reports_rows() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(at("A1"), "Site");
        sheet.set_value(at("A3"), "www.example.com");

        let mut rows = Vec::new();
        let count = HyperlinkAssigner::default().apply(&mut sheet, &[], &mut |row: u32, _: u32| rows.push(row));

        assert_eq!(count, AppliedCount { cells: 0, rows: 2 });
        assert_eq!(rows, vec![2, 3]);
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(at("A1"), "Site");
        sheet.set_value(at("A2"), "www.example.com");
        sheet.set_value(at("C2"), "https://c.example");

        let assigner = HyperlinkAssigner::default();
        let columns = [col("A"), col("C"), col("A"), col("Z")];
        let first = assigner.apply(&mut sheet, &columns, &mut NoProgress);
        let snapshot: Vec<_> = sheet.cells().map(|(at, c)| (*at, c.clone())).collect();
        let second = assigner.apply(&mut sheet, &columns, &mut NoProgress);
        let again: Vec<_> = sheet.cells().map(|(at, c)| (*at, c.clone())).collect();

        assert_eq!(first.cells, 2);
        assert_eq!(first, second);
        assert_eq!(snapshot, again);
    }

    #[test]
    fn test_custom_link_style() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(at("A1"), "Site");
        sheet.set_value(at("A2"), "www.example.com");

        let options = AssignOptions::new().with_color("FF0000").with_underline(Underline::None);
        HyperlinkAssigner::new(options).apply(&mut sheet, &[col("A")], &mut NoProgress);

        let style = sheet.cell(at("A2")).unwrap().link_style().unwrap();
        assert_eq!(style.color.as_argb(), "FFFF0000");
        assert_eq!(style.underline, Underline::None);
    }

    #[test]
    fn test_existing_location_link_is_replaced() {
        let mut sheet = Sheet::new("Data");
        sheet.set_value(at("A1"), "Site");
        sheet.set_value(at("A2"), "www.example.com");
        sheet.cell_mut(at("A2")).unwrap().hyperlink = Some(Hyperlink {
            target: HyperlinkTarget::Location("Other!A1".into()),
            tooltip: None,
            display: None,
        });

        HyperlinkAssigner::default().apply(&mut sheet, &[col("A")], &mut NoProgress);
        assert_eq!(url_of(&sheet, "A2").as_deref(), Some("https://www.example.com"));
    }

    #[test]
    fn test_persist_failure_is_save_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut workbook = Workbook::new();
        workbook.add_sheet("Data").unwrap().set_value(at("A1"), "Site");

        let target = dir.path().join("missing").join("out.xlsx");
        let err = persist(&workbook, &target).unwrap_err();
        assert!(err.is_save_error());
        assert!(err.to_string().contains("out.xlsx"));

        let retry = dir.path().join("out.xlsx");
        persist(&workbook, &retry).unwrap();
        assert!(retry.exists());
    }
}
