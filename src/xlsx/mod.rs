//! XLSX (Excel) workbook reading and writing.
//!
//! Reading keeps the whole source package in memory so that saving can
//! patch the changed worksheets and leave every other part untouched.
//!
//! # Example
//!
//! ```no_run
//! use hyperlink_maker::Workbook;
//!
//! let workbook = Workbook::open("links.xlsx")?;
//! for name in workbook.sheet_names() {
//!     println!("Sheet: {name}");
//! }
//! # Ok::<(), hyperlink_maker::Error>(())
//! ```

mod reader;
mod shared_strings;
mod styles;
mod writer;

pub(crate) use reader::read_workbook;
pub(crate) use writer::write_workbook;
