//! In-memory OOXML package: every part of the ZIP archive, in original order.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Relationship type for worksheet hyperlinks.
pub(crate) const REL_TYPE_HYPERLINK: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

/// A relationship entry from a .rels file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute) or external URI
    pub target: String,
    /// Whether the target is external
    pub external: bool,
}

/// Relationships parsed from a .rels file, in document order.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    entries: Vec<Relationship>,
    /// id -> position in `entries`
    index: HashMap<String, usize>,
}

impl Relationships {
    /// Create a new empty relationships collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the content of a .rels part.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut rels = Relationships::new();
        if xml.trim().is_empty() {
            return Ok(rels);
        }

        let mut reader = quick_xml::Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(quick_xml::events::Event::Empty(e)) | Ok(quick_xml::events::Event::Start(e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut id = String::new();
                    let mut rel_type = String::new();
                    let mut target = String::new();
                    let mut external = false;

                    for attr in e.attributes().flatten() {
                        let value = attr.unescape_value()?.into_owned();
                        match attr.key.as_ref() {
                            b"Id" => id = value,
                            b"Type" => rel_type = value,
                            b"Target" => target = value,
                            b"TargetMode" => external = value.eq_ignore_ascii_case("external"),
                            _ => {}
                        }
                    }

                    if !id.is_empty() {
                        rels.add(Relationship {
                            id,
                            rel_type,
                            target,
                            external,
                        });
                    }
                }
                Ok(quick_xml::events::Event::Eof) => break,
                Err(e) => return Err(Error::XmlParse(e.to_string())),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }

    /// Get a relationship by ID.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.index.get(id).and_then(|&i| self.entries.get(i))
    }

    /// Get relationships by type.
    pub fn get_by_type(&self, rel_type: &str) -> Vec<&Relationship> {
        self.entries.iter().filter(|r| r.rel_type == rel_type).collect()
    }

    /// Add a relationship.
    ///
    /// A later entry with an id already present shadows the earlier one in `get`.
    pub fn add(&mut self, rel: Relationship) {
        self.index.insert(rel.id.clone(), self.entries.len());
        self.entries.push(rel);
    }

    /// Drop every relationship of `rel_type`.
    pub fn remove_type(&mut self, rel_type: &str) {
        self.entries.retain(|r| r.rel_type != rel_type);
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();
    }

    /// Number following the highest `rIdN` in use; ids of any other shape are
    /// ignored.
    pub fn next_id_number(&self) -> u32 {
        self.entries
            .iter()
            .filter_map(|r| r.id.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1
    }

    /// `rIdN` above every id in use.
    pub fn next_id(&self) -> String {
        format!("rId{}", self.next_id_number())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize back to a .rels part.
    pub fn to_xml(&self) -> String {
        let mut out = String::from(concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            "\n",
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        ));
        for rel in &self.entries {
            out.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                xml_escape(&rel.id),
                xml_escape(&rel.rel_type),
                xml_escape(&rel.target)
            ));
            if rel.external {
                out.push_str(r#" TargetMode="External""#);
            }
            out.push_str("/>");
        }
        out.push_str("</Relationships>");
        out
    }
}

/// Fix XML encoding declaration from UTF-16 to UTF-8.
///
/// Once UTF-16 XML is decoded to a Rust String the declaration must stop
/// claiming UTF-16, or quick-xml re-interprets the already-decoded text.
fn fix_xml_encoding_declaration(content: &str) -> String {
    if content.starts_with("<?xml") {
        if let Some(end_decl) = content.find("?>") {
            let decl = &content[..end_decl + 2];
            let rest = &content[end_decl + 2..];

            let fixed_decl = decl
                .replace("encoding=\"UTF-16\"", "encoding=\"UTF-8\"")
                .replace("encoding='UTF-16'", "encoding='UTF-8'")
                .replace("encoding=\"utf-16\"", "encoding=\"UTF-8\"")
                .replace("encoding='utf-16'", "encoding='UTF-8'");

            return format!("{}{}", fixed_decl, rest);
        }
    }
    content.to_string()
}

/// Decode XML bytes handling different encodings (UTF-8, UTF-16 LE/BE).
pub fn decode_xml_bytes(bytes: &[u8]) -> Result<String> {
    if bytes.len() >= 3 && bytes[0] == 0xEF && bytes[1] == 0xBB && bytes[2] == 0xBF {
        return Ok(String::from_utf8(bytes[3..].to_vec())?);
    }

    if bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == 0xFE {
        let content = decode_utf16(&bytes[2..], u16::from_le_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let content = decode_utf16(&bytes[2..], u16::from_be_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => Ok(s),
        Err(_) => {
            // UTF-16 without BOM: ASCII markup leaves every other byte zero.
            if bytes.len() >= 4 && bytes[1] == 0 && bytes[3] == 0 {
                decode_utf16(bytes, u16::from_le_bytes)
            } else if bytes.len() >= 4 && bytes[0] == 0 && bytes[2] == 0 {
                decode_utf16(bytes, u16::from_be_bytes)
            } else {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    let len = bytes.len() & !1;
    let units = (0..len).step_by(2).map(|i| unit([bytes[i], bytes[i + 1]]));

    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::InvalidData(e.to_string()))
}

/// Escape text for use in XML attribute values and character data.
pub(crate) fn xml_escape(s: &str) -> String {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// An OOXML package held fully in memory.
///
/// Parts keep the order they had in the source archive so a package that is
/// written back without changes lists its entries the same way.
#[derive(Clone)]
pub struct OoxmlPackage {
    parts: Vec<(String, Vec<u8>)>,
    index: HashMap<String, usize>,
}

impl OoxmlPackage {
    /// Create an empty package.
    pub fn new() -> Self {
        Self {
            parts: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Open a package from a file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Read every part of a ZIP archive into memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))?;
        let mut package = Self::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut bytes = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut bytes)?;
            package.set_part(&name, bytes);
        }

        log::trace!("read package with {} parts", package.parts.len());
        Ok(package)
    }

    /// Read an XML part as a string, handling UTF-8 and UTF-16 encodings.
    pub fn read_xml(&self, path: &str) -> Result<String> {
        let bytes = self
            .part(path)
            .ok_or_else(|| Error::MissingComponent(path.to_string()))?;
        decode_xml_bytes(bytes)
    }

    /// Raw bytes of a part.
    pub fn part(&self, path: &str) -> Option<&[u8]> {
        self.index.get(path).map(|&i| self.parts[i].1.as_slice())
    }

    /// Insert or replace a part. New parts are appended at the end.
    pub fn set_part(&mut self, path: &str, data: Vec<u8>) {
        match self.index.get(path) {
            Some(&i) => self.parts[i].1 = data,
            None => {
                self.index.insert(path.to_string(), self.parts.len());
                self.parts.push((path.to_string(), data));
            }
        }
    }

    /// Remove a part if present.
    pub fn remove_part(&mut self, path: &str) {
        if self.index.remove(path).is_some() {
            self.parts.retain(|(name, _)| name != path);
            self.index = self
                .parts
                .iter()
                .enumerate()
                .map(|(i, (name, _))| (name.clone(), i))
                .collect();
        }
    }

    /// Check if a part exists in the package.
    pub fn exists(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// List all part names in archive order.
    pub fn list_files(&self) -> Vec<&str> {
        self.parts.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Path of the .rels part describing `part_path`.
    pub fn rels_path_for(part_path: &str) -> String {
        if part_path.is_empty() || part_path == "/" {
            return "_rels/.rels".to_string();
        }
        match part_path.rsplit_once('/') {
            Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
            None => format!("_rels/{part_path}.rels"),
        }
    }

    /// Read and parse relationships for a part; a missing .rels yields none.
    pub fn read_relationships(&self, part_path: &str) -> Result<Relationships> {
        match self.read_xml(&Self::rels_path_for(part_path)) {
            Ok(xml) => Relationships::parse(&xml),
            Err(Error::MissingComponent(_)) => Ok(Relationships::new()),
            Err(e) => Err(e),
        }
    }

    /// Resolve a relationship target relative to the part that owns it.
    pub fn resolve_path(base: &str, relative: &str) -> String {
        if let Some(stripped) = relative.strip_prefix('/') {
            return stripped.to_string();
        }

        let base_path = Path::new(base);
        let base_dir = base_path.parent().unwrap_or(Path::new(""));

        let mut result = base_dir.to_path_buf();
        for component in Path::new(relative).components() {
            match component {
                std::path::Component::ParentDir => {
                    result.pop();
                }
                std::path::Component::Normal(c) => {
                    result.push(c);
                }
                _ => {}
            }
        }

        result.to_string_lossy().replace('\\', "/")
    }

    /// Serialize the package as a deflated ZIP archive.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        // fixed timestamps keep repeated saves of the same workbook byte-identical
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default());

        for (name, data) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(data)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

impl Default for OoxmlPackage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OoxmlPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OoxmlPackage")
            .field("parts", &self.parts.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            OoxmlPackage::resolve_path("xl/workbook.xml", "worksheets/sheet1.xml"),
            "xl/worksheets/sheet1.xml"
        );
        assert_eq!(
            OoxmlPackage::resolve_path("xl/worksheets/sheet1.xml", "../sharedStrings.xml"),
            "xl/sharedStrings.xml"
        );
        assert_eq!(
            OoxmlPackage::resolve_path("xl/workbook.xml", "/xl/worksheets/sheet2.xml"),
            "xl/worksheets/sheet2.xml"
        );
    }

    #[test]
    fn test_rels_path_for() {
        assert_eq!(
            OoxmlPackage::rels_path_for("xl/worksheets/sheet1.xml"),
            "xl/worksheets/_rels/sheet1.xml.rels"
        );
        assert_eq!(OoxmlPackage::rels_path_for(""), "_rels/.rels");
        assert_eq!(
            OoxmlPackage::rels_path_for("xl/workbook.xml"),
            "xl/_rels/workbook.xml.rels"
        );
    }

    #[test]
    fn test_relationships_round_trip() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://x/drawing" Target="../drawings/drawing1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://a.example/?x=1&amp;y=2" TargetMode="External"/>
</Relationships>"#;

        let mut rels = Relationships::parse(xml).unwrap();
        assert_eq!(rels.len(), 2);
        let link = rels.get("rId2").unwrap();
        assert!(link.external);
        assert_eq!(link.target, "https://a.example/?x=1&y=2");
        assert_eq!(rels.get_by_type(REL_TYPE_HYPERLINK).len(), 1);

        rels.remove_type(REL_TYPE_HYPERLINK);
        assert_eq!(rels.next_id(), "rId2");

        let reparsed = Relationships::parse(&rels.to_xml()).unwrap();
        assert_eq!(reparsed.len(), 1);
        assert_eq!(reparsed.get("rId1").unwrap().target, "../drawings/drawing1.xml");
    }

    #[test]
    fn test_next_id_skips_past_highest() {
        let mut rels = Relationships::new();
        assert_eq!(rels.next_id(), "rId1");

        for id in ["rId3", "vmlDrawing1", "rId17", "rIdx"] {
            rels.add(Relationship {
                id: id.to_string(),
                rel_type: "http://x/drawing".to_string(),
                target: "../drawings/drawing1.xml".to_string(),
                external: false,
            });
        }
        assert_eq!(rels.next_id_number(), 18);
        assert_eq!(rels.next_id(), "rId18");
        assert!(rels.get("rId17").is_some());
        assert!(rels.get("rId4").is_none());

        rels.remove_type("http://x/drawing");
        assert!(rels.get("rId17").is_none());
        assert_eq!(rels.next_id(), "rId1");
    }

    #[test]
    fn test_package_parts_keep_order() {
        let mut package = OoxmlPackage::new();
        package.set_part("[Content_Types].xml", b"<Types/>".to_vec());
        package.set_part("xl/workbook.xml", b"<workbook/>".to_vec());
        package.set_part("[Content_Types].xml", b"<Types></Types>".to_vec());
        assert_eq!(package.list_files(), vec!["[Content_Types].xml", "xl/workbook.xml"]);

        let bytes = package.to_bytes().unwrap();
        let reread = OoxmlPackage::from_bytes(bytes).unwrap();
        assert_eq!(reread.list_files(), package.list_files());
        assert_eq!(reread.part("[Content_Types].xml"), Some(&b"<Types></Types>"[..]));

        let mut trimmed = reread.clone();
        trimmed.remove_part("[Content_Types].xml");
        assert!(!trimmed.exists("[Content_Types].xml"));
        assert_eq!(trimmed.part("xl/workbook.xml"), Some(&b"<workbook/>"[..]));
    }

    #[test]
    fn test_missing_part_is_reported() {
        let package = OoxmlPackage::new();
        assert!(matches!(
            package.read_xml("xl/workbook.xml"),
            Err(Error::MissingComponent(_))
        ));
        assert!(package
            .read_relationships("xl/workbook.xml")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_utf16_decoding() {
        let utf16_le = b"\xFF\xFE<\0?\0x\0m\0l\0>\0";
        assert_eq!(decode_xml_bytes(utf16_le).unwrap(), "<?xml>");

        let utf16_be = b"\xFE\xFF\0<\0?\0x\0m\0l\0>";
        assert_eq!(decode_xml_bytes(utf16_be).unwrap(), "<?xml>");

        let utf8_bom = b"\xEF\xBB\xBF<?xml>";
        assert_eq!(decode_xml_bytes(utf8_bom).unwrap(), "<?xml>");

        let declared = "\u{FEFF}<?xml version=\"1.0\" encoding=\"UTF-16\"?><a/>";
        let mut bytes = vec![0xFF, 0xFE];
        for unit in declared.encode_utf16().skip(1) {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(
            decode_xml_bytes(&bytes).unwrap(),
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><a/>"
        );
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("plain"), "plain");
        assert_eq!(xml_escape("a&b<\"c\">"), "a&amp;b&lt;&quot;c&quot;&gt;");
    }
}
