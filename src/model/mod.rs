//! In-memory workbook model.
//!
//! Readers convert xlsx packages and legacy xls files into these structures;
//! the hyperlink assigner mutates them and the xlsx writer persists them.

mod cell;
mod style;
mod workbook;

pub use cell::*;
pub use style::*;
pub use workbook::*;
