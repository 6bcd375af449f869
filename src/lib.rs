//! # hyperlink-maker
//!
//! Turn spreadsheet columns into clickable hyperlinks.
//!
//! Every non-empty cell of the selected columns, from row 2 down to the last
//! used row, gets a hyperlink derived from its own text and a link font
//! (blue, single underline by default). The displayed values stay as they
//! were. Workbooks are read from `.xlsx` or legacy `.xls` files and always
//! saved as `.xlsx`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use hyperlink_maker::{apply_hyperlinks, list_columns, ColumnId, Workbook};
//!
//! let mut workbook = Workbook::open("links.xlsx")?;
//! let sheet = workbook.sheet_names()[0].to_string();
//!
//! for column in list_columns(workbook.sheet(&sheet).unwrap()) {
//!     println!("{column}");
//! }
//!
//! let columns: Vec<ColumnId> = vec!["A".parse()?, "C".parse()?];
//! apply_hyperlinks(&mut workbook, &sheet, &columns, &mut |row: u32, total: u32| {
//!     println!("Processing row {row} of {total}...");
//! })?;
//! workbook.save("links.xlsx")?;
//! # Ok::<(), hyperlink_maker::Error>(())
//! ```
//!
//! ## Features
//!
//! - `xls` (default): legacy Excel 97-2003 input through calamine

pub mod detect;
pub mod error;
pub mod hyperlink;
pub mod model;
pub mod options;
pub mod package;
pub mod xlsx;

#[cfg(feature = "xls")]
mod xls;

// Re-exports
pub use detect::{detect_format_from_bytes, detect_format_from_path, FormatType};
pub use error::{Error, Result};
pub use hyperlink::{
    hyperlink_target, persist, AppliedCount, HyperlinkAssigner, NoProgress, ProgressObserver,
};
pub use model::{
    Cell, CellRef, CellValue, Color, ColumnHeader, ColumnId, Hyperlink, HyperlinkTarget,
    LinkStyle, Sheet, Underline, Workbook,
};
pub use options::AssignOptions;
pub use package::{OoxmlPackage, Relationship, Relationships};

/// Sheet names of `workbook` in workbook order.
///
/// # Example
///
/// ```no_run
/// use hyperlink_maker::{list_sheets, Workbook};
///
/// let workbook = Workbook::open("links.xlsx")?;
/// for name in list_sheets(&workbook) {
///     println!("{name}");
/// }
/// # Ok::<(), hyperlink_maker::Error>(())
/// ```
pub fn list_sheets(workbook: &Workbook) -> Vec<&str> {
    workbook.sheet_names()
}

/// Headered columns of `sheet`: every non-empty cell of row 1, in column order.
pub fn list_columns(sheet: &Sheet) -> Vec<ColumnHeader> {
    sheet.columns()
}

/// Link the selected columns of the sheet named `sheet_name` with the
/// default link style.
///
/// Returns [`Error::SheetNotFound`] when the workbook has no such sheet.
pub fn apply_hyperlinks<P>(
    workbook: &mut Workbook,
    sheet_name: &str,
    columns: &[ColumnId],
    progress: &mut P,
) -> Result<AppliedCount>
where
    P: ProgressObserver + ?Sized,
{
    let sheet = workbook
        .sheet_mut(sheet_name)
        .ok_or_else(|| Error::SheetNotFound(sheet_name.to_string()))?;
    Ok(HyperlinkAssigner::default().apply(sheet, columns, progress))
}
