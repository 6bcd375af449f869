//! XLSX reader: workbook structure, cell values and existing hyperlinks.

use crate::error::Result;
use crate::model::{CellRef, CellValue, ColumnId, Hyperlink, HyperlinkTarget, Sheet, Workbook};
use crate::package::{OoxmlPackage, Relationships};
use crate::detect::FormatType;
use quick_xml::events::{BytesStart, Event};

use super::shared_strings::SharedStrings;
use super::styles::Styles;

pub(crate) const REL_TYPE_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_TYPE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
const REL_TYPE_SHARED_STRINGS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings";

/// Days between the 1900 and 1904 date system epochs.
pub(crate) const DATE1904_OFFSET: f64 = 1462.0;

/// Ranged hyperlinks covering more cells than this are clipped.
const MAX_RANGE_CELLS: u64 = 1 << 16;

/// Sheet info from workbook.xml.
#[derive(Debug, Clone)]
struct SheetInfo {
    name: String,
    rel_id: String,
}

/// Location of the workbook part, following the package root relationship.
pub(crate) fn workbook_part(package: &OoxmlPackage) -> String {
    package
        .read_relationships("")
        .ok()
        .and_then(|rels| {
            rels.get_by_type(REL_TYPE_OFFICE_DOCUMENT)
                .first()
                .map(|rel| OoxmlPackage::resolve_path("", &rel.target))
        })
        .unwrap_or_else(|| "xl/workbook.xml".to_string())
}

/// Location of a workbook-level part such as styles, if the package declares one.
pub(crate) fn workbook_related_part(
    package: &OoxmlPackage,
    workbook_path: &str,
    rel_type: &str,
) -> Option<String> {
    let rels = package.read_relationships(workbook_path).ok()?;
    let rel = rels.get_by_type(rel_type).into_iter().next()?;
    Some(OoxmlPackage::resolve_path(workbook_path, &rel.target))
}

/// Reads every sheet of an xlsx package into the workbook model.
struct XlsxReader {
    package: OoxmlPackage,
    workbook_path: String,
    shared_strings: SharedStrings,
    styles: Styles,
    sheets: Vec<SheetInfo>,
    relationships: Relationships,
    date1904: bool,
}

impl XlsxReader {
    fn new(package: OoxmlPackage) -> Result<Self> {
        let workbook_path = workbook_part(&package);
        let xml = package.read_xml(&workbook_path)?;
        let (sheets, date1904) = Self::parse_workbook(&xml)?;
        let relationships = package.read_relationships(&workbook_path)?;

        let shared_strings =
            match workbook_related_part(&package, &workbook_path, REL_TYPE_SHARED_STRINGS) {
                Some(path) if package.exists(&path) => SharedStrings::parse(&package.read_xml(&path)?)?,
                _ => SharedStrings::default(),
            };

        let styles = match workbook_related_part(&package, &workbook_path, REL_TYPE_STYLES) {
            Some(path) if package.exists(&path) => Styles::parse(&package.read_xml(&path)?),
            _ => Styles::default(),
        };

        log::trace!(
            "workbook {} declares {} sheet(s), {} shared string(s)",
            workbook_path,
            sheets.len(),
            shared_strings.len()
        );

        Ok(Self {
            package,
            workbook_path,
            shared_strings,
            styles,
            sheets,
            relationships,
            date1904,
        })
    }

    /// Parse workbook.xml for sheet info and the date system.
    fn parse_workbook(xml: &str) -> Result<(Vec<SheetInfo>, bool)> {
        let mut sheets = Vec::new();
        let mut date1904 = false;
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Empty(e) | Event::Start(e) => match e.local_name().as_ref() {
                    b"sheet" => {
                        let mut name = String::new();
                        let mut rel_id = String::new();
                        for attr in e.attributes().flatten() {
                            match attr.key.local_name().as_ref() {
                                b"name" => name = attr.unescape_value()?.into_owned(),
                                b"id" => rel_id = attr.unescape_value()?.into_owned(),
                                _ => {}
                            }
                        }
                        if !name.is_empty() {
                            sheets.push(SheetInfo { name, rel_id });
                        }
                    }
                    b"workbookPr" => {
                        date1904 = attr_value(&e, b"date1904")
                            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
                    }
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok((sheets, date1904))
    }

    fn read(self) -> Result<Workbook> {
        let mut sheets = Vec::with_capacity(self.sheets.len());

        for info in &self.sheets {
            let mut sheet = Sheet::new(info.name.clone());
            sheet.loaded = true;
            let part = self
                .relationships
                .get(&info.rel_id)
                .map(|rel| OoxmlPackage::resolve_path(&self.workbook_path, &rel.target))
                .filter(|path| self.package.exists(path));

            match part {
                Some(path) => {
                    let xml = self.package.read_xml(&path)?;
                    let rels = self.package.read_relationships(&path)?;
                    self.parse_sheet(&xml, &rels, &mut sheet)?;
                    sheet.part = Some(path);
                }
                None => log::warn!("sheet '{}' has no worksheet part", info.name),
            }
            sheets.push(sheet);
        }

        Ok(Workbook {
            sheets,
            format: Some(FormatType::Xlsx),
            package: Some(self.package),
            date1904: self.date1904,
        })
    }

    /// Parse a worksheet part into `sheet`.
    fn parse_sheet(&self, xml: &str, rels: &Relationships, sheet: &mut Sheet) -> Result<()> {
        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut row_index = 0u32;
        let mut col_index = 0u32;
        let mut current: Option<PendingCell> = None;
        let mut text_target = TextTarget::None;
        let mut in_phonetic = false;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"row" => {
                        row_index = next_row(e, row_index);
                        col_index = 0;
                    }
                    b"c" => {
                        let pending = PendingCell::start(e, row_index, col_index);
                        col_index = pending.at.col.index() + 1;
                        current = Some(pending);
                    }
                    b"v" if current.is_some() => text_target = TextTarget::Value,
                    b"f" if current.is_some() => {
                        text_target = TextTarget::Formula;
                        if let Some(cell) = current.as_mut() {
                            cell.formula.get_or_insert_with(String::new);
                        }
                    }
                    b"rPh" => in_phonetic = true,
                    b"t" if current.is_some() && !in_phonetic => text_target = TextTarget::Inline,
                    b"hyperlink" => self.read_hyperlink(e, rels, sheet)?,
                    _ => {}
                },
                Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"row" => {
                        row_index = next_row(e, row_index);
                        col_index = 0;
                    }
                    b"c" => {
                        let pending = PendingCell::start(e, row_index, col_index);
                        col_index = pending.at.col.index() + 1;
                        self.finish_cell(pending, sheet);
                    }
                    b"f" => {
                        if let Some(cell) = current.as_mut() {
                            cell.formula.get_or_insert_with(String::new);
                        }
                    }
                    b"hyperlink" => self.read_hyperlink(e, rels, sheet)?,
                    _ => {}
                },
                Event::Text(ref e) => {
                    if let Some(cell) = current.as_mut() {
                        let text = e.unescape()?;
                        match text_target {
                            TextTarget::Value => cell.raw.push_str(&text),
                            TextTarget::Inline => cell.inline.push_str(&text),
                            TextTarget::Formula => {
                                if let Some(formula) = cell.formula.as_mut() {
                                    formula.push_str(&text);
                                }
                            }
                            TextTarget::None => {}
                        }
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"c" => {
                        if let Some(pending) = current.take() {
                            self.finish_cell(pending, sheet);
                        }
                        text_target = TextTarget::None;
                    }
                    b"rPh" => in_phonetic = false,
                    b"v" | b"f" | b"t" => text_target = TextTarget::None,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        let linked: Vec<(CellRef, u32)> = sheet
            .cells()
            .filter(|(_, cell)| cell.hyperlink().is_some())
            .map(|(at, cell)| (*at, cell.style_id()))
            .collect();
        for (at, style_id) in linked {
            if let Some(cell) = sheet.cell_mut(at) {
                cell.link_style = self.styles.link_style(style_id as usize);
            }
        }

        Ok(())
    }

    fn finish_cell(&self, pending: PendingCell, sheet: &mut Sheet) {
        let value = self.resolve_cell_value(&pending);
        // a hyperlink read earlier for this position stays attached
        let entry = sheet.loaded_entry(pending.at);
        entry.value = value;
        entry.style_id = pending.style_id;
    }

    /// Resolve a cell value based on its type.
    fn resolve_cell_value(&self, cell: &PendingCell) -> CellValue {
        let raw = cell.raw.as_str();
        let value = match cell.cell_type.as_deref() {
            Some("s") => match raw.trim().parse::<usize>() {
                Ok(idx) => CellValue::Text(self.shared_strings.get(idx).unwrap_or("").to_string()),
                Err(_) => CellValue::Text(raw.to_string()),
            },
            Some("b") => CellValue::Bool(raw.trim() == "1" || raw.trim().eq_ignore_ascii_case("true")),
            Some("e") => CellValue::Error(raw.to_string()),
            Some("inlineStr") => CellValue::Text(cell.inline.clone()),
            Some("str") | Some("d") => CellValue::Text(raw.to_string()),
            _ if raw.trim().is_empty() => CellValue::Empty,
            _ => match raw.trim().parse::<f64>() {
                Ok(n) if self.styles.is_date_style(cell.style_id as usize) => {
                    CellValue::Date(if self.date1904 { n + DATE1904_OFFSET } else { n })
                }
                Ok(n) => CellValue::Number(n),
                Err(_) => CellValue::Text(raw.to_string()),
            },
        };

        match &cell.formula {
            Some(expr) => {
                let cached = (!value.is_empty()).then(|| value.to_text());
                if expr.is_empty() {
                    // shared formula followers carry only the cached result
                    value
                } else {
                    CellValue::Formula {
                        expr: expr.clone(),
                        cached,
                    }
                }
            }
            None => value,
        }
    }

    /// Attach a `<hyperlink>` element to every cell it covers.
    fn read_hyperlink(&self, e: &BytesStart, rels: &Relationships, sheet: &mut Sheet) -> Result<()> {
        let mut range = None;
        let mut rel_id = None;
        let mut location = None;
        let mut tooltip = None;
        let mut display = None;

        for attr in e.attributes().flatten() {
            let value = attr.unescape_value()?.into_owned();
            match attr.key.local_name().as_ref() {
                b"ref" => range = Some(value),
                b"id" => rel_id = Some(value),
                b"location" => location = Some(value),
                b"tooltip" => tooltip = Some(value),
                b"display" => display = Some(value),
                _ => {}
            }
        }

        let Some(range) = range else {
            log::warn!("hyperlink without a cell reference in sheet '{}'", sheet.name());
            return Ok(());
        };

        let external = rel_id
            .as_deref()
            .and_then(|id| rels.get(id))
            .map(|rel| rel.target.clone());
        let target = match (external, location) {
            (Some(url), Some(loc)) if !loc.is_empty() => HyperlinkTarget::Url(format!("{url}#{loc}")),
            (Some(url), _) => HyperlinkTarget::Url(url),
            (None, Some(loc)) => HyperlinkTarget::Location(loc),
            (None, None) => {
                log::warn!("hyperlink {range} in sheet '{}' has no target", sheet.name());
                return Ok(());
            }
        };

        let hyperlink = Hyperlink {
            target,
            tooltip,
            display,
        };

        let Some(cells) = expand_range(&range) else {
            log::warn!("ignoring hyperlink with bad reference '{range}'");
            return Ok(());
        };
        for at in cells {
            sheet.loaded_entry(at).hyperlink = Some(hyperlink.clone());
        }
        Ok(())
    }
}

/// Which text node the reader is inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextTarget {
    None,
    Value,
    Formula,
    Inline,
}

/// A `<c>` element being read.
#[derive(Debug)]
struct PendingCell {
    at: CellRef,
    cell_type: Option<String>,
    style_id: u32,
    raw: String,
    inline: String,
    formula: Option<String>,
}

impl PendingCell {
    fn start(e: &BytesStart, row_index: u32, col_index: u32) -> Self {
        let at = attr_value(e, b"r")
            .and_then(|r| r.parse::<CellRef>().ok())
            .unwrap_or_else(|| CellRef::new(row_index.max(1), ColumnId::from_index(col_index)));
        let style_id = attr_value(e, b"s")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        Self {
            at,
            cell_type: attr_value(e, b"t"),
            style_id,
            raw: String::new(),
            inline: String::new(),
            formula: None,
        }
    }
}

fn attr_value(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Row number from `<row r="..">`, or the next one when absent.
fn next_row(e: &BytesStart, previous: u32) -> u32 {
    attr_value(e, b"r")
        .and_then(|r| r.parse().ok())
        .unwrap_or(previous + 1)
}

/// Every cell of an `A1` or `A1:C3` reference, clipped to a sane size.
fn expand_range(range: &str) -> Option<Vec<CellRef>> {
    let (first, last) = match range.split_once(':') {
        Some((a, b)) => (a.parse::<CellRef>().ok()?, b.parse::<CellRef>().ok()?),
        None => {
            let single = range.parse::<CellRef>().ok()?;
            (single, single)
        }
    };

    let (top, bottom) = (first.row.min(last.row), first.row.max(last.row));
    let (left, right) = (
        first.col.index().min(last.col.index()),
        first.col.index().max(last.col.index()),
    );

    let total = u64::from(bottom - top + 1) * u64::from(right - left + 1);
    if total > MAX_RANGE_CELLS {
        log::warn!("hyperlink range {range} clipped to its first cell");
        return Some(vec![CellRef::new(top, ColumnId::from_index(left))]);
    }

    let mut cells = Vec::with_capacity(total as usize);
    for row in top..=bottom {
        for col in left..=right {
            cells.push(CellRef::new(row, ColumnId::from_index(col)));
        }
    }
    Some(cells)
}

/// Read an xlsx package into a workbook that remembers its source parts.
pub(crate) fn read_workbook(package: OoxmlPackage) -> Result<Workbook> {
    XlsxReader::new(package)?.read()
}
