//! Legacy Excel 97-2003 (.xls) reading.
//!
//! Cell values are read through calamine. The binary format is never
//! written back: a workbook loaded from `.xls` is saved as a new xlsx
//! package.

use calamine::{Data, Range, Reader, Xls};
use std::io::Cursor;

use crate::detect::FormatType;
use crate::error::Result;
use crate::model::{CellRef, CellValue, ColumnId, Sheet, Workbook};

/// Read every worksheet of an `.xls` file.
pub(crate) fn read_workbook(data: Vec<u8>) -> Result<Workbook> {
    let mut xls = Xls::new(Cursor::new(data))?;
    let names = xls.sheet_names().to_owned();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let mut sheet = Sheet::new(name.clone());
        sheet.loaded = true;

        let values = xls.worksheet_range(&name)?;
        read_values(&values, &mut sheet);

        match xls.worksheet_formula(&name) {
            Ok(formulas) => read_formulas(&formulas, &mut sheet),
            Err(e) => log::warn!("formulas of sheet '{name}' are unreadable: {e}"),
        }

        log::trace!("read xls sheet '{name}' up to row {}", sheet.max_row());
        sheets.push(sheet);
    }

    Ok(Workbook {
        sheets,
        format: Some(FormatType::Xls),
        package: None,
        date1904: false,
    })
}

fn read_values(range: &Range<Data>, sheet: &mut Sheet) {
    let start = range.start().unwrap_or((0, 0));
    for (row, col, value) in range.used_cells() {
        let Some(at) = to_cell_ref(start, row, col) else {
            log::warn!("skipping out-of-range cell ({row},{col}) in '{}'", sheet.name());
            continue;
        };
        let value = convert_value(value);
        if !value.is_empty() {
            sheet.loaded_entry(at).value = value;
        }
    }
}

fn read_formulas(range: &Range<String>, sheet: &mut Sheet) {
    let start = range.start().unwrap_or((0, 0));
    for (row, col, formula) in range.used_cells() {
        let expr = formula.trim().trim_start_matches('=');
        if expr.is_empty() {
            continue;
        }
        let Some(at) = to_cell_ref(start, row, col) else {
            continue;
        };
        let cell = sheet.loaded_entry(at);
        let cached = (!cell.value.is_empty()).then(|| cell.value.to_text());
        cell.value = CellValue::Formula {
            expr: expr.to_string(),
            cached,
        };
    }
}

/// calamine iterates relative to the range start; rows and columns are
/// zero-based there and one-based rows here.
fn to_cell_ref(start: (u32, u32), row: usize, col: usize) -> Option<CellRef> {
    let row = start.0.checked_add(u32::try_from(row).ok()?)?;
    let col = start.1.checked_add(u32::try_from(col).ok()?)?;
    if col > ColumnId::MAX_INDEX {
        return None;
    }
    Some(CellRef::new(row.checked_add(1)?, ColumnId::from_index(col)))
}

fn convert_value(value: &Data) -> CellValue {
    match value {
        Data::Empty => CellValue::Empty,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Error(e.to_string()),
        Data::DateTime(dt) => CellValue::Date(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_cell_ref_offsets() {
        assert_eq!(
            to_cell_ref((0, 0), 0, 0),
            Some(CellRef::new(1, ColumnId::from_index(0)))
        );
        assert_eq!(
            to_cell_ref((3, 2), 1, 1),
            Some(CellRef::new(5, ColumnId::from_index(3)))
        );
        assert_eq!(to_cell_ref((0, ColumnId::MAX_INDEX), 0, 1), None);
    }

    #[test]
    fn test_convert_value() {
        assert_eq!(convert_value(&Data::Int(7)), CellValue::Number(7.0));
        assert_eq!(
            convert_value(&Data::String("www.example.com".into())),
            CellValue::Text("www.example.com".into())
        );
        assert_eq!(convert_value(&Data::Bool(false)), CellValue::Bool(false));
        assert!(convert_value(&Data::Empty).is_empty());
    }

    #[test]
    fn test_read_values_and_formulas() {
        let mut values = Range::new((0, 0), (1, 1));
        values.set_value((0, 0), Data::String("Site".into()));
        values.set_value((1, 0), Data::String("www.example.com".into()));
        values.set_value((1, 1), Data::Float(4.0));

        let mut formulas = Range::new((1, 1), (1, 1));
        formulas.set_value((1, 1), "2*2".to_string());

        let mut sheet = Sheet::new("Legacy");
        read_values(&values, &mut sheet);
        read_formulas(&formulas, &mut sheet);

        let a2: CellRef = "A2".parse().unwrap();
        let b2: CellRef = "B2".parse().unwrap();
        assert_eq!(sheet.cell(a2).unwrap().value().to_text(), "www.example.com");
        assert_eq!(
            sheet.cell(b2).unwrap().value(),
            &CellValue::Formula {
                expr: "2*2".into(),
                cached: Some("4".into())
            }
        );
        assert_eq!(sheet.max_row(), 2);
        assert!(!sheet.is_modified());
    }

    #[test]
    fn test_rejects_non_cfb_bytes() {
        let err = read_workbook(b"plainly not a workbook".to_vec()).unwrap_err();
        assert!(matches!(err, crate::Error::Legacy(_)));
    }
}
