//! Shared fixtures for integration tests: small xlsx packages built in memory.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Two cell formats: the default and a bold font.
pub const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="11"/><name val="Calibri"/></font><font><b/><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="3"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#;

struct FixtureSheet {
    name: String,
    xml: String,
    rels: Option<String>,
}

/// Builds an xlsx package part by part.
#[derive(Default)]
pub struct XlsxBuilder {
    sheets: Vec<FixtureSheet>,
    shared_strings: Vec<String>,
    styles: Option<String>,
    extra: Vec<(String, String)>,
    date1904: bool,
}

impl XlsxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared_strings(mut self, strings: &[&str]) -> Self {
        self.shared_strings = strings.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn styles(mut self, xml: &str) -> Self {
        self.styles = Some(xml.to_string());
        self
    }

    pub fn date1904(mut self) -> Self {
        self.date1904 = true;
        self
    }

    /// Add a worksheet whose `<sheetData>` content is `rows`.
    pub fn sheet(self, name: &str, rows: &str) -> Self {
        let xml = worksheet(rows, "");
        self.raw_sheet(name, &xml, None)
    }

    /// Add a worksheet from a complete part and optional relationships.
    pub fn raw_sheet(mut self, name: &str, xml: &str, rels: Option<&str>) -> Self {
        self.sheets.push(FixtureSheet {
            name: name.to_string(),
            xml: xml.to_string(),
            rels: rels.map(String::from),
        });
        self
    }

    /// Add an arbitrary part, such as document properties.
    pub fn part(mut self, path: &str, content: &str) -> Self {
        self.extra.push((path.to_string(), content.to_string()));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut parts: Vec<(String, String)> = Vec::new();

        let mut overrides = String::from(
            r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
        );
        for i in 1..=self.sheets.len() {
            overrides.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
        }
        if self.styles.is_some() {
            overrides.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
        }
        if !self.shared_strings.is_empty() {
            overrides.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
        }
        parts.push((
            "[Content_Types].xml".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>{overrides}</Types>"#
            ),
        ));

        parts.push((
            "_rels/.rels".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{NS_REL}/officeDocument" Target="xl/workbook.xml"/></Relationships>"#
            ),
        ));

        let mut sheets = String::new();
        let mut rels = String::new();
        for (i, sheet) in self.sheets.iter().enumerate() {
            let n = i + 1;
            sheets.push_str(&format!(
                r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
                sheet.name
            ));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="{NS_REL}/worksheet" Target="worksheets/sheet{n}.xml"/>"#
            ));
        }
        let mut next = self.sheets.len() + 1;
        if self.styles.is_some() {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{next}" Type="{NS_REL}/styles" Target="styles.xml"/>"#
            ));
            next += 1;
        }
        if !self.shared_strings.is_empty() {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{next}" Type="{NS_REL}/sharedStrings" Target="sharedStrings.xml"/>"#
            ));
        }
        let workbook_pr = if self.date1904 {
            r#"<workbookPr date1904="1"/>"#
        } else {
            ""
        };
        parts.push((
            "xl/workbook.xml".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}">{workbook_pr}<sheets>{sheets}</sheets></workbook>"#
            ),
        ));
        parts.push((
            "xl/_rels/workbook.xml.rels".into(),
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
            ),
        ));

        for (i, sheet) in self.sheets.into_iter().enumerate() {
            let n = i + 1;
            parts.push((format!("xl/worksheets/sheet{n}.xml"), sheet.xml));
            if let Some(rels) = sheet.rels {
                parts.push((format!("xl/worksheets/_rels/sheet{n}.xml.rels"), rels));
            }
        }

        if let Some(styles) = self.styles {
            parts.push(("xl/styles.xml".into(), styles));
        }

        if !self.shared_strings.is_empty() {
            let mut sst = format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="{NS_MAIN}" count="{0}" uniqueCount="{0}">"#,
                self.shared_strings.len()
            );
            for s in &self.shared_strings {
                sst.push_str(&format!("<si><t>{s}</t></si>"));
            }
            sst.push_str("</sst>");
            parts.push(("xl/sharedStrings.xml".into(), sst));
        }

        parts.extend(self.extra);
        zip_parts(&parts)
    }
}

/// A worksheet part with `rows` inside `<sheetData>` and `tail` after it.
pub fn worksheet(rows: &str, tail: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_REL}"><sheetData>{rows}</sheetData>{tail}</worksheet>"#
    )
}

/// A shared-string cell.
pub fn s(at: &str, index: usize) -> String {
    format!(r#"<c r="{at}" t="s"><v>{index}</v></c>"#)
}

/// An inline-string cell.
pub fn inline(at: &str, text: &str) -> String {
    format!(r#"<c r="{at}" t="inlineStr"><is><t>{text}</t></is></c>"#)
}

/// A numeric cell.
pub fn n(at: &str, value: &str) -> String {
    format!(r#"<c r="{at}"><v>{value}</v></c>"#)
}

pub fn row(r: u32, cells: &[String]) -> String {
    format!(r#"<row r="{r}">{}</row>"#, cells.concat())
}

fn zip_parts(parts: &[(String, String)]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut buffer));
        let options = SimpleFileOptions::default();
        for (name, content) in parts {
            zip.start_file(name.as_str(), options).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buffer
}

/// Decompressed content of one part of a saved package.
pub fn read_part(package: &[u8], path: &str) -> Option<String> {
    let mut archive = ZipArchive::new(Cursor::new(package)).unwrap();
    let mut file = archive.by_name(path).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    Some(content)
}

/// Part names of a saved package in archive order.
pub fn part_names(package: &[u8]) -> Vec<String> {
    let archive = ZipArchive::new(Cursor::new(package)).unwrap();
    archive.file_names().map(String::from).collect()
}
