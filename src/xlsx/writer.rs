//! XLSX writer.
//!
//! A workbook loaded from an xlsx package is written by patching that
//! package: only the worksheets that changed, their relationship parts and
//! the styles part are rewritten, every other part is copied as-is in its
//! original order. Workbooks without a usable source package are written as
//! a fresh minimal package.

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use super::reader::{workbook_part, workbook_related_part, DATE1904_OFFSET, REL_TYPE_STYLES};
use super::styles::{StylesPatch, MINIMAL_STYLES_XML};
use crate::error::{Error, Result};
use crate::model::{Cell, CellRef, CellValue, HyperlinkTarget, LinkStyle, Sheet, Workbook};
use crate::package::{xml_escape, OoxmlPackage, Relationship, Relationships, REL_TYPE_HYPERLINK};

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const REL_TYPE_WORKSHEET: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet";
const CONTENT_TYPE_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml";
const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Built-in short date format used for date cells in fresh packages.
const NUM_FMT_DATE: u32 = 14;

/// Worksheet children that must follow `<hyperlinks>`, in schema order.
const AFTER_HYPERLINKS: &[&[u8]] = &[
    b"printOptions",
    b"pageMargins",
    b"pageSetup",
    b"headerFooter",
    b"rowBreaks",
    b"colBreaks",
    b"customProperties",
    b"cellWatches",
    b"ignoredErrors",
    b"smartTags",
    b"drawing",
    b"legacyDrawing",
    b"legacyDrawingHF",
    b"picture",
    b"oleObjects",
    b"controls",
    b"webPublishItems",
    b"tableParts",
    b"extLst",
];

/// Serialize a workbook to xlsx bytes.
pub(crate) fn write_workbook(workbook: &Workbook) -> Result<Vec<u8>> {
    match &workbook.package {
        Some(package) if can_patch(workbook) => patch_package(workbook, package),
        Some(_) => {
            log::debug!("workbook has sheets outside its source package, writing a new package");
            write_fresh(workbook)
        }
        None => write_fresh(workbook),
    }
}

/// Every sheet that has to be written has a worksheet part to patch.
fn can_patch(workbook: &Workbook) -> bool {
    workbook
        .sheets
        .iter()
        .all(|s| s.part.is_some() || (s.loaded && !s.is_modified()))
}

// ---------------------------------------------------------------------------
// Patching a source package
// ---------------------------------------------------------------------------

/// The styles part being extended, opened on first use.
struct StylesTarget {
    path: String,
    patch: StylesPatch,
    created: bool,
}

fn patch_package(workbook: &Workbook, source: &OoxmlPackage) -> Result<Vec<u8>> {
    let mut package = source.clone();
    let workbook_path = workbook_part(&package);
    let mut styles: Option<StylesTarget> = None;

    for sheet in workbook.sheets.iter().filter(|s| s.is_modified()) {
        let Some(part) = sheet.part.as_deref() else {
            continue;
        };
        log::debug!("rewriting worksheet {part} for sheet '{}'", sheet.name());

        let mut cell_styles = HashMap::new();
        for (at, cell) in sheet.cells() {
            if let Some(link_style) = cell.link_style() {
                if styles.is_none() {
                    styles = Some(open_styles(&mut package, &workbook_path)?);
                }
                if let Some(target) = styles.as_mut() {
                    let xf = target.patch.derive_link_xf(cell.style_id(), link_style);
                    cell_styles.insert(*at, xf);
                }
            }
        }

        let xml = package.read_xml(part)?;
        let prefix = root_prefix(&xml)?;

        let mut rels = package.read_relationships(part)?;
        rels.remove_type(REL_TYPE_HYPERLINK);
        let hyperlinks = hyperlinks_xml(sheet, &mut rels, &prefix);

        let sheet_data = if sheet.values_changed {
            let rows = collect_rows(&xml)?;
            let date_offset = if workbook.date1904 { DATE1904_OFFSET } else { 0.0 };
            Some(sheet_data_xml(
                sheet,
                &prefix,
                |at, cell| cell_styles.get(at).copied().unwrap_or(cell.style_id()),
                date_offset,
                &rows,
            ))
        } else {
            None
        };

        let patched = SheetPatch {
            cell_styles: &cell_styles,
            hyperlinks: hyperlinks.as_deref(),
            sheet_data: sheet_data.as_deref(),
        }
        .apply(&xml)?;
        package.set_part(part, patched.into_bytes());

        let rels_path = OoxmlPackage::rels_path_for(part);
        if rels.is_empty() {
            package.remove_part(&rels_path);
        } else {
            package.set_part(&rels_path, rels.to_xml().into_bytes());
        }
    }

    if let Some(target) = styles {
        if target.created || target.patch.is_changed() {
            let xml = target.patch.finish()?;
            package.set_part(&target.path, xml.into_bytes());
        }
    }

    package.to_bytes()
}

/// Open the package's styles part, creating a minimal one when it has none.
fn open_styles(package: &mut OoxmlPackage, workbook_path: &str) -> Result<StylesTarget> {
    let existing = workbook_related_part(package, workbook_path, REL_TYPE_STYLES)
        .filter(|path| package.exists(path));
    if let Some(path) = existing {
        let xml = package.read_xml(&path)?;
        return Ok(StylesTarget {
            path,
            patch: StylesPatch::parse(&xml)?,
            created: false,
        });
    }

    let path = OoxmlPackage::resolve_path(workbook_path, "styles.xml");
    log::warn!("workbook has no styles part, creating {path}");

    let mut rels = package.read_relationships(workbook_path)?;
    rels.remove_type(REL_TYPE_STYLES);
    rels.add(Relationship {
        id: rels.next_id(),
        rel_type: REL_TYPE_STYLES.to_string(),
        target: "styles.xml".to_string(),
        external: false,
    });
    package.set_part(
        &OoxmlPackage::rels_path_for(workbook_path),
        rels.to_xml().into_bytes(),
    );

    let content_types = package.read_xml("[Content_Types].xml")?;
    let entry = format!(r#"<Override PartName="/{path}" ContentType="{CONTENT_TYPE_STYLES}"/>"#);
    let updated = match content_types.rfind("</Types>") {
        Some(end) => format!("{}{}{}", &content_types[..end], entry, &content_types[end..]),
        None => {
            return Err(Error::InvalidData(
                "[Content_Types].xml has no closing Types element".into(),
            ))
        }
    };
    package.set_part("[Content_Types].xml", updated.into_bytes());

    Ok(StylesTarget {
        path,
        patch: StylesPatch::parse(MINIMAL_STYLES_XML)?,
        created: true,
    })
}

/// Namespace prefix (with trailing `:`) of the worksheet root element.
fn root_prefix(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.name();
                return Ok(match name.prefix() {
                    Some(prefix) => format!("{}:", String::from_utf8_lossy(prefix.as_ref())),
                    None => String::new(),
                });
            }
            Event::Eof => return Err(Error::XmlParse("worksheet has no root element".into())),
            _ => {}
        }
        buf.clear();
    }
}

/// Original `<row>` elements by row number, so regenerated rows keep heights
/// and other row formatting.
fn collect_rows(xml: &str) -> Result<BTreeMap<u32, BytesStart<'static>>> {
    let mut rows = BTreeMap::new();
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut last = 0u32;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let row = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"r")
                    .and_then(|a| String::from_utf8_lossy(&a.value).parse().ok())
                    .unwrap_or(last + 1);
                last = row;
                rows.insert(row, e.into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(rows)
}

/// Edits applied while streaming one worksheet part.
struct SheetPatch<'a> {
    /// New `s` attribute for cells that now carry a link style.
    cell_styles: &'a HashMap<CellRef, u32>,
    /// Replacement `<hyperlinks>` element; `None` drops the element.
    hyperlinks: Option<&'a str>,
    /// Replacement `<sheetData>` element when cell values changed.
    sheet_data: Option<&'a str>,
}

impl SheetPatch<'_> {
    fn apply(&self, xml: &str) -> Result<String> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);
        let mut writer = Writer::new(Vec::with_capacity(xml.len() + 1024));
        let mut buf = Vec::new();

        let mut depth = 0usize;
        let mut skipping: Option<usize> = None;
        let mut links_written = self.hyperlinks.is_none();
        let mut row_index = 0u32;
        let mut col_index = 0u32;

        loop {
            let event = reader.read_event_into(&mut buf)?;

            if let Some(level) = skipping {
                match event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => {
                        depth -= 1;
                        if depth == level {
                            skipping = None;
                        }
                    }
                    Event::Eof => break,
                    _ => {}
                }
                buf.clear();
                continue;
            }

            match event {
                Event::Start(e) => {
                    let name = e.local_name();
                    if depth == 1 {
                        match name.as_ref() {
                            b"hyperlinks" => {
                                skipping = Some(depth);
                                depth += 1;
                                buf.clear();
                                continue;
                            }
                            b"sheetData" if self.sheet_data.is_some() => {
                                self.write_raw(&mut writer, self.sheet_data)?;
                                skipping = Some(depth);
                                depth += 1;
                                buf.clear();
                                continue;
                            }
                            n if !links_written && AFTER_HYPERLINKS.contains(&n) => {
                                self.write_raw(&mut writer, self.hyperlinks)?;
                                links_written = true;
                            }
                            _ => {}
                        }
                    }

                    if depth == 2 && name.as_ref() == b"row" {
                        row_index = row_number(&e, row_index);
                        col_index = 0;
                        writer.write_event(Event::Start(e))?;
                    } else if depth == 3 && name.as_ref() == b"c" {
                        let start = self.restyle_cell(&e, row_index, &mut col_index);
                        writer.write_event(Event::Start(start))?;
                    } else {
                        writer.write_event(Event::Start(e))?;
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    let name = e.local_name();
                    if depth == 1 {
                        match name.as_ref() {
                            b"hyperlinks" => {
                                buf.clear();
                                continue;
                            }
                            b"sheetData" if self.sheet_data.is_some() => {
                                self.write_raw(&mut writer, self.sheet_data)?;
                                buf.clear();
                                continue;
                            }
                            n if !links_written && AFTER_HYPERLINKS.contains(&n) => {
                                self.write_raw(&mut writer, self.hyperlinks)?;
                                links_written = true;
                            }
                            _ => {}
                        }
                    }

                    if depth == 2 && name.as_ref() == b"row" {
                        row_index = row_number(&e, row_index);
                        col_index = 0;
                        writer.write_event(Event::Empty(e))?;
                    } else if depth == 3 && name.as_ref() == b"c" {
                        let start = self.restyle_cell(&e, row_index, &mut col_index);
                        writer.write_event(Event::Empty(start))?;
                    } else {
                        writer.write_event(Event::Empty(e))?;
                    }
                }
                Event::End(e) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 && !links_written {
                        self.write_raw(&mut writer, self.hyperlinks)?;
                        links_written = true;
                    }
                    writer.write_event(Event::End(e))?;
                }
                Event::Eof => break,
                other => writer.write_event(other)?,
            }
            buf.clear();
        }

        Ok(String::from_utf8(writer.into_inner())?)
    }

    fn write_raw(&self, writer: &mut Writer<Vec<u8>>, xml: Option<&str>) -> Result<()> {
        if let Some(xml) = xml {
            writer.get_mut().write_all(xml.as_bytes())?;
        }
        Ok(())
    }

    /// The `<c>` start tag with its `s` attribute replaced when the cell
    /// now carries a link style.
    fn restyle_cell(&self, e: &BytesStart, row_index: u32, col_index: &mut u32) -> BytesStart<'static> {
        let at = e
            .attributes()
            .flatten()
            .find(|a| a.key.as_ref() == b"r")
            .and_then(|a| String::from_utf8_lossy(&a.value).parse::<CellRef>().ok())
            .unwrap_or_else(|| {
                CellRef::new(row_index.max(1), crate::model::ColumnId::from_index(*col_index))
            });
        *col_index = at.col.index() + 1;

        let Some(xf) = self.cell_styles.get(&at) else {
            return e.clone().into_owned();
        };

        let mut start = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
        let mut placed = false;
        for attr in e.attributes().flatten() {
            if attr.key.as_ref() == b"s" {
                start.push_attribute(("s", xf.to_string().as_str()));
                placed = true;
            } else {
                start.push_attribute(attr);
            }
        }
        if !placed {
            start.push_attribute(("s", xf.to_string().as_str()));
        }
        start
    }
}

fn row_number(e: &BytesStart, previous: u32) -> u32 {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"r")
        .and_then(|a| String::from_utf8_lossy(&a.value).parse().ok())
        .unwrap_or(previous + 1)
}

// ---------------------------------------------------------------------------
// Shared XML builders
// ---------------------------------------------------------------------------

/// The `<hyperlinks>` element for `sheet`, registering an external
/// relationship in `rels` for every URL target. `None` when the sheet has no
/// hyperlinks.
fn hyperlinks_xml(sheet: &Sheet, rels: &mut Relationships, prefix: &str) -> Option<String> {
    let mut out = String::new();
    let mut next_id = rels.next_id_number();

    for (at, cell) in sheet.cells() {
        let Some(link) = cell.hyperlink() else {
            continue;
        };
        out.push_str(&format!(r#"<{prefix}hyperlink ref="{at}""#));
        match &link.target {
            HyperlinkTarget::Url(url) => {
                let id = format!("rId{next_id}");
                next_id += 1;
                out.push_str(&format!(r#" r:id="{id}""#));
                rels.add(Relationship {
                    id,
                    rel_type: REL_TYPE_HYPERLINK.to_string(),
                    target: url.clone(),
                    external: true,
                });
            }
            HyperlinkTarget::Location(location) => {
                out.push_str(&format!(r#" location="{}""#, xml_escape(location)));
            }
        }
        if let Some(tooltip) = &link.tooltip {
            out.push_str(&format!(r#" tooltip="{}""#, xml_escape(tooltip)));
        }
        if let Some(display) = &link.display {
            out.push_str(&format!(r#" display="{}""#, xml_escape(display)));
        }
        out.push_str("/>");
    }

    if out.is_empty() {
        return None;
    }
    Some(format!(
        r#"<{prefix}hyperlinks xmlns:r="{NS_RELATIONSHIPS}">{out}</{prefix}hyperlinks>"#
    ))
}

/// A complete `<sheetData>` element. `row_starts` supplies original row
/// elements whose attributes are kept.
fn sheet_data_xml(
    sheet: &Sheet,
    prefix: &str,
    style_of: impl Fn(&CellRef, &Cell) -> u32,
    date_offset: f64,
    row_starts: &BTreeMap<u32, BytesStart<'static>>,
) -> String {
    let mut rows: BTreeMap<u32, String> = BTreeMap::new();
    for (at, cell) in sheet.cells() {
        let style = style_of(at, cell);
        if cell.value().is_empty() && style == 0 {
            continue;
        }
        let row = rows.entry(at.row).or_default();
        write_cell(row, prefix, *at, cell.value(), style, date_offset);
    }
    for row in row_starts.keys() {
        rows.entry(*row).or_default();
    }

    let mut out = format!("<{prefix}sheetData>");
    for (row, cells) in rows {
        out.push_str(&format!(r#"<{prefix}row r="{row}""#));
        if let Some(start) = row_starts.get(&row) {
            for attr in start.attributes().flatten() {
                if matches!(attr.key.as_ref(), b"r" | b"spans") {
                    continue;
                }
                out.push_str(&format!(
                    r#" {}="{}""#,
                    String::from_utf8_lossy(attr.key.as_ref()),
                    String::from_utf8_lossy(&attr.value)
                ));
            }
        }
        if cells.is_empty() {
            out.push_str("/>");
        } else {
            out.push('>');
            out.push_str(&cells);
            out.push_str(&format!("</{prefix}row>"));
        }
    }
    out.push_str(&format!("</{prefix}sheetData>"));
    out
}

fn write_cell(out: &mut String, prefix: &str, at: CellRef, value: &CellValue, style: u32, date_offset: f64) {
    let s = if style == 0 {
        String::new()
    } else {
        format!(r#" s="{style}""#)
    };
    let c = format!("{prefix}c");
    let v = |text: &str| format!("<{prefix}v>{}</{prefix}v>", xml_escape(text));
    let inline = |text: &str| {
        format!(
            r#"<{c} r="{at}"{s} t="inlineStr"><{prefix}is><{prefix}t xml:space="preserve">{}</{prefix}t></{prefix}is></{c}>"#,
            xml_escape(text)
        )
    };

    let xml = match value {
        CellValue::Empty => format!(r#"<{c} r="{at}"{s}/>"#),
        CellValue::Text(text) => inline(text),
        CellValue::Number(n) if n.is_finite() => format!(r#"<{c} r="{at}"{s}>{}</{c}>"#, v(&n.to_string())),
        CellValue::Number(_) => format!(r#"<{c} r="{at}"{s} t="e">{}</{c}>"#, v("#NUM!")),
        CellValue::Bool(b) => format!(r#"<{c} r="{at}"{s} t="b">{}</{c}>"#, v(if *b { "1" } else { "0" })),
        CellValue::Date(serial) => {
            format!(r#"<{c} r="{at}"{s}>{}</{c}>"#, v(&(serial - date_offset).to_string()))
        }
        CellValue::Error(code) => format!(r#"<{c} r="{at}"{s} t="e">{}</{c}>"#, v(code)),
        CellValue::Formula { expr, cached } if expr.is_empty() => match cached {
            Some(text) => inline(text),
            None => format!(r#"<{c} r="{at}"{s}/>"#),
        },
        CellValue::Formula { expr, cached } => {
            let f = format!("<{prefix}f>{}</{prefix}f>", xml_escape(expr));
            match cached {
                Some(text) if text.parse::<f64>().is_ok() => {
                    format!(r#"<{c} r="{at}"{s}>{f}{}</{c}>"#, v(text))
                }
                Some(text) => format!(r#"<{c} r="{at}"{s} t="str">{f}{}</{c}>"#, v(text)),
                None => format!(r#"<{c} r="{at}"{s}>{f}</{c}>"#),
            }
        }
    };
    out.push_str(&xml);
}

// ---------------------------------------------------------------------------
// Fresh packages
// ---------------------------------------------------------------------------

const RELS_DOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
    r#"</Relationships>"#,
);

fn content_types_xml(sheet_count: usize) -> String {
    let mut overrides = String::new();
    for i in 1..=sheet_count {
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
            r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
            r#"<Default Extension="xml" ContentType="application/xml"/>"#,
            r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
            r#"<Override PartName="/xl/styles.xml" ContentType="{}"/>"#,
            r#"{}"#,
            r#"</Types>"#,
        ),
        CONTENT_TYPE_STYLES, overrides
    )
}

fn workbook_xml(names: &[&str]) -> String {
    let mut sheets = String::new();
    for (i, name) in names.iter().enumerate() {
        sheets.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            xml_escape(name),
            i + 1,
            i + 1
        ));
    }

    format!(
        r#"{XML_DECLARATION}<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_RELATIONSHIPS}"><bookViews><workbookView activeTab="0"/></bookViews><sheets>{sheets}</sheets></workbook>"#
    )
}

fn workbook_rels(sheet_count: usize) -> Relationships {
    let mut rels = Relationships::new();
    for i in 1..=sheet_count {
        rels.add(Relationship {
            id: format!("rId{i}"),
            rel_type: REL_TYPE_WORKSHEET.to_string(),
            target: format!("worksheets/sheet{i}.xml"),
            external: false,
        });
    }
    rels.add(Relationship {
        id: format!("rId{}", sheet_count + 1),
        rel_type: REL_TYPE_STYLES.to_string(),
        target: "styles.xml".to_string(),
        external: false,
    });
    rels
}

/// Fonts and cell formats of a fresh package, interned by use.
struct StyleRegistry {
    /// Link fonts; font 0 is the default body font.
    fonts: Vec<LinkStyle>,
    xfs: Vec<(usize, u32)>,
    xf_index: HashMap<(usize, u32), u32>,
}

impl StyleRegistry {
    fn new() -> Self {
        let mut reg = Self {
            fonts: Vec::new(),
            xfs: Vec::new(),
            xf_index: HashMap::new(),
        };
        reg.intern_xf(0, 0);
        reg
    }

    fn register(&mut self, cell: &Cell) -> u32 {
        let font_id = match cell.link_style() {
            Some(style) => self.intern_font(style),
            None => 0,
        };
        let num_fmt_id = match cell.value() {
            CellValue::Date(_) => NUM_FMT_DATE,
            _ => 0,
        };
        self.intern_xf(font_id, num_fmt_id)
    }

    fn intern_font(&mut self, style: &LinkStyle) -> usize {
        match self.fonts.iter().position(|f| f == style) {
            Some(i) => i + 1,
            None => {
                self.fonts.push(style.clone());
                self.fonts.len()
            }
        }
    }

    fn intern_xf(&mut self, font_id: usize, num_fmt_id: u32) -> u32 {
        let key = (font_id, num_fmt_id);
        if let Some(&i) = self.xf_index.get(&key) {
            return i;
        }
        let i = self.xfs.len() as u32;
        self.xf_index.insert(key, i);
        self.xfs.push(key);
        i
    }

    fn to_xml(&self) -> String {
        let mut out = String::from(XML_DECLARATION);
        out.push_str(&format!(r#"<styleSheet xmlns="{NS_MAIN}">"#));

        out.push_str(&format!(r#"<fonts count="{}">"#, self.fonts.len() + 1));
        out.push_str(r#"<font><sz val="11"/><name val="Calibri"/><family val="2"/></font>"#);
        for font in &self.fonts {
            out.push_str(&font.to_font_xml());
        }
        out.push_str("</fonts>");

        out.push_str(r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#);
        out.push_str(r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#);
        out.push_str(r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#);

        out.push_str(&format!(r#"<cellXfs count="{}">"#, self.xfs.len()));
        for (font_id, num_fmt_id) in &self.xfs {
            out.push_str(&format!(
                r#"<xf numFmtId="{num_fmt_id}" fontId="{font_id}" fillId="0" borderId="0" xfId="0""#
            ));
            if *font_id != 0 {
                out.push_str(r#" applyFont="1""#);
            }
            if *num_fmt_id != 0 {
                out.push_str(r#" applyNumberFormat="1""#);
            }
            out.push_str("/>");
        }
        out.push_str("</cellXfs>");

        out.push_str(r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#);
        out.push_str("</styleSheet>");
        out
    }
}

/// Write every sheet into a new package.
fn write_fresh(workbook: &Workbook) -> Result<Vec<u8>> {
    let names = workbook.sheet_names();
    let mut registry = StyleRegistry::new();
    let mut package = OoxmlPackage::new();

    package.set_part(
        "[Content_Types].xml",
        content_types_xml(names.len()).into_bytes(),
    );
    package.set_part("_rels/.rels", RELS_DOT_RELS.as_bytes().to_vec());
    package.set_part("xl/workbook.xml", workbook_xml(&names).into_bytes());
    package.set_part(
        "xl/_rels/workbook.xml.rels",
        workbook_rels(names.len()).to_xml().into_bytes(),
    );

    let mut worksheets = Vec::with_capacity(names.len());
    for (i, sheet) in workbook.sheets.iter().enumerate() {
        let styles: HashMap<CellRef, u32> = sheet
            .cells()
            .map(|(at, cell)| (*at, registry.register(cell)))
            .collect();
        let sheet_data = sheet_data_xml(
            sheet,
            "",
            |at, _| styles.get(at).copied().unwrap_or(0),
            0.0,
            &BTreeMap::new(),
        );

        let mut rels = Relationships::new();
        let hyperlinks = hyperlinks_xml(sheet, &mut rels, "").unwrap_or_default();
        let xml = format!(
            r#"{XML_DECLARATION}<worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_RELATIONSHIPS}">{sheet_data}{hyperlinks}</worksheet>"#
        );

        let part = format!("xl/worksheets/sheet{}.xml", i + 1);
        worksheets.push((part, xml, rels));
    }

    package.set_part("xl/styles.xml", registry.to_xml().into_bytes());
    for (part, xml, rels) in worksheets {
        package.set_part(&part, xml.into_bytes());
        if !rels.is_empty() {
            package.set_part(&OoxmlPackage::rels_path_for(&part), rels.to_xml().into_bytes());
        }
    }

    log::debug!("wrote new package with {} sheet(s)", names.len());
    package.to_bytes()
}
