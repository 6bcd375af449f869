//! XLSX styles: number formats for reading, font/format patching for writing.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashMap;
use std::io::Write;

use crate::error::{Error, Result};
use crate::model::{Color, LinkStyle, Underline};

/// The font attributes that make up a link style.
#[derive(Debug, Clone, Default)]
struct FontInfo {
    underline: Option<Underline>,
    color: Option<String>,
    /// Index into the workbook theme's color scheme.
    theme: Option<u32>,
    name: Option<String>,
    size: Option<u32>,
}

/// Color scheme of the default Office theme in `theme` attribute order, where
/// the light and dark entries come first and 10 is the hyperlink color.
const OFFICE_THEME_COLORS: [&str; 12] = [
    "FFFFFF", "000000", "E7E6E6", "44546A", "4472C4", "ED7D31", "A5A5A5", "FFC000", "5B9BD5",
    "70AD47", "0563C1", "954F72",
];

impl FontInfo {
    /// The link style this font shows, if it is colored and underlined.
    fn link_style(&self) -> Option<LinkStyle> {
        let underline = self.underline.filter(|u| *u != Underline::None)?;
        let color = match (&self.color, self.theme) {
            (Some(rgb), _) => Color::new(rgb),
            (None, Some(theme)) => Color::new(OFFICE_THEME_COLORS.get(theme as usize)?),
            (None, None) => return None,
        };

        let defaults = LinkStyle::default();
        Some(LinkStyle {
            color,
            underline,
            font_name: self.name.clone().unwrap_or(defaults.font_name),
            font_size: self.size.unwrap_or(defaults.font_size),
        })
    }
}

/// Number formats and fonts parsed from xl/styles.xml.
#[derive(Debug, Default)]
pub struct Styles {
    /// Custom number formats: numFmtId -> formatCode
    num_fmts: HashMap<u32, String>,
    /// Cell formats: style index -> (numFmtId, fontId)
    cell_xfs: Vec<(u32, u32)>,
    fonts: Vec<FontInfo>,
}

impl Styles {
    /// Parse styles from xl/styles.xml content.
    pub fn parse(xml: &str) -> Self {
        let mut styles = Self::default();
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut in_num_fmts = false;
        let mut in_cell_xfs = false;
        let mut in_fonts = false;
        let mut font: Option<FontInfo> = None;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                    b"numFmts" => in_num_fmts = true,
                    b"cellXfs" => in_cell_xfs = true,
                    b"fonts" => in_fonts = true,
                    b"font" if in_fonts => font = Some(FontInfo::default()),
                    b"xf" if in_cell_xfs => styles.cell_xfs.push(xf_ids(e)),
                    _ => {}
                },
                Ok(Event::Empty(ref e)) if font.is_some() => {
                    if let Some(current) = font.as_mut() {
                        read_font_property(e, current);
                    }
                }
                Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                    b"font" if in_fonts => styles.fonts.push(FontInfo::default()),
                    b"numFmt" if in_num_fmts => {
                        let mut num_fmt_id: Option<u32> = None;
                        let mut format_code = String::new();
                        for attr in e.attributes().flatten() {
                            match attr.key.as_ref() {
                                b"numFmtId" => {
                                    num_fmt_id = String::from_utf8_lossy(&attr.value).parse().ok();
                                }
                                b"formatCode" => {
                                    format_code = attr
                                        .unescape_value()
                                        .map(|v| v.into_owned())
                                        .unwrap_or_default();
                                }
                                _ => {}
                            }
                        }
                        if let Some(id) = num_fmt_id {
                            styles.num_fmts.insert(id, format_code);
                        }
                    }
                    b"xf" if in_cell_xfs => styles.cell_xfs.push(xf_ids(e)),
                    _ => {}
                },
                Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                    b"numFmts" => in_num_fmts = false,
                    b"cellXfs" => in_cell_xfs = false,
                    b"fonts" => in_fonts = false,
                    b"font" => {
                        if let Some(done) = font.take() {
                            styles.fonts.push(done);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    log::warn!("styles.xml is malformed, dates will show as numbers: {e}");
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        styles
    }

    /// Get the numFmtId for a cell style index.
    pub fn get_num_fmt_id(&self, style_index: usize) -> Option<u32> {
        self.cell_xfs.get(style_index).map(|(num_fmt, _)| *num_fmt)
    }

    /// The link style of a cell format whose font is colored and underlined.
    ///
    /// Theme colors resolve against the default Office theme.
    pub(crate) fn link_style(&self, style_index: usize) -> Option<LinkStyle> {
        let (_, font_id) = self.cell_xfs.get(style_index)?;
        self.fonts.get(*font_id as usize)?.link_style()
    }

    /// Index of the first font showing exactly `style`.
    fn find_link_font(&self, style: &LinkStyle) -> Option<usize> {
        self.fonts
            .iter()
            .position(|font| font.link_style().as_ref() == Some(style))
    }

    /// Whether cells using `style_index` display as dates.
    pub fn is_date_style(&self, style_index: usize) -> bool {
        self.get_num_fmt_id(style_index)
            .is_some_and(|id| self.is_date_format(id))
    }

    /// Check if a numFmtId represents a date format.
    pub fn is_date_format(&self, num_fmt_id: u32) -> bool {
        // Built-in formats 14-22 are dates, 45-47 are times.
        if (14..=22).contains(&num_fmt_id) || (45..=47).contains(&num_fmt_id) {
            return true;
        }

        if let Some(format_code) = self.num_fmts.get(&num_fmt_id) {
            return Self::is_date_format_code(format_code);
        }

        false
    }

    /// Check if a format code string represents a date format.
    ///
    /// Sections in square brackets (`[Red]`, `[$-409]`) and quoted literals
    /// are ignored.
    fn is_date_format_code(format_code: &str) -> bool {
        let mut in_bracket = false;
        let mut in_quote = false;
        let mut prev_char = '\0';

        for c in format_code.chars() {
            match c {
                '[' if !in_quote => in_bracket = true,
                ']' if !in_quote => in_bracket = false,
                '"' => in_quote = !in_quote,
                _ if !in_bracket && !in_quote => match c.to_ascii_lowercase() {
                    'd' | 'y' => return true,
                    // 'm' is a month next to d/y, otherwise minutes
                    'm' => {
                        let lower_prev = prev_char.to_ascii_lowercase();
                        if lower_prev == 'd' || lower_prev == 'y' {
                            return true;
                        }
                        let lower_format = format_code.to_lowercase();
                        if lower_format.contains('d') || lower_format.contains('y') {
                            return true;
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
            prev_char = c;
        }

        false
    }
}

fn attr_u32(e: &BytesStart, key: &[u8]) -> Option<u32> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| String::from_utf8_lossy(&attr.value).parse().ok())
}

fn attr_string(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

fn xf_ids(e: &BytesStart) -> (u32, u32) {
    (
        attr_u32(e, b"numFmtId").unwrap_or(0),
        attr_u32(e, b"fontId").unwrap_or(0),
    )
}

fn read_font_property(e: &BytesStart, font: &mut FontInfo) {
    match e.local_name().as_ref() {
        b"u" => {
            font.underline = Some(match attr_string(e, b"val").as_deref() {
                Some("none") => Underline::None,
                Some("double") | Some("doubleAccounting") => Underline::Double,
                _ => Underline::Single,
            })
        }
        // indexed colors are left out
        b"color" => {
            font.color = attr_string(e, b"rgb");
            font.theme = attr_u32(e, b"theme");
        }
        b"name" => font.name = attr_string(e, b"val"),
        b"sz" => {
            font.size = attr_string(e, b"val")
                .and_then(|v| v.parse::<f64>().ok())
                .map(|v| v.round() as u32)
        }
        _ => {}
    }
}

/// Copy of `e` with `key` set to `value` (replacing any previous value).
fn with_attr(e: &BytesStart, key: &str, value: &str) -> BytesStart<'static> {
    let mut start = BytesStart::new(String::from_utf8_lossy(e.name().as_ref()).into_owned());
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != key.as_bytes() {
            start.push_attribute(attr);
        }
    }
    start.push_attribute((key, value));
    start
}

/// One `cellXfs/xf` entry kept as events so it can be cloned.
#[derive(Debug, Clone)]
struct XfEntry {
    start: BytesStart<'static>,
    children: Vec<Event<'static>>,
}

impl XfEntry {
    /// Same attributes, in any order, and same children.
    fn same_as(&self, other: &XfEntry) -> bool {
        fn attrs(e: &BytesStart) -> Vec<(Vec<u8>, Vec<u8>)> {
            let mut attrs: Vec<_> = e
                .attributes()
                .flatten()
                .map(|a| (a.key.as_ref().to_vec(), a.value.into_owned()))
                .collect();
            attrs.sort();
            attrs
        }
        self.children == other.children && attrs(&self.start) == attrs(&other.start)
    }
}

const DEFAULT_XF: &str = r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#;

/// Pending additions to `styles.xml`: link fonts and the cell formats derived
/// from existing ones.
#[derive(Debug)]
pub(crate) struct StylesPatch {
    xml: String,
    existing: Styles,
    font_count: usize,
    xfs: Vec<XfEntry>,
    new_fonts: Vec<LinkStyle>,
    new_xfs: Vec<XfEntry>,
    derived: HashMap<(u32, LinkStyle), u32>,
}

impl StylesPatch {
    /// Index the fonts and cell formats of an existing styles part.
    pub(crate) fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut buf = Vec::new();
        let mut in_fonts = false;
        let mut in_cell_xfs = false;
        let mut font_count = 0usize;
        let mut xfs = Vec::new();
        let mut current: Option<(XfEntry, usize)> = None;

        loop {
            let event = reader.read_event_into(&mut buf)?;
            if let Some((entry, depth)) = current.as_mut() {
                match &event {
                    Event::Start(_) => *depth += 1,
                    Event::End(_) if *depth == 0 => {
                        if let Some((entry, _)) = current.take() {
                            xfs.push(entry);
                        }
                        buf.clear();
                        continue;
                    }
                    Event::End(_) => *depth -= 1,
                    Event::Eof => {
                        return Err(Error::XmlParse("unterminated xf in styles.xml".into()))
                    }
                    _ => {}
                }
                entry.children.push(event.into_owned());
                buf.clear();
                continue;
            }

            match event {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"fonts" => in_fonts = true,
                    b"font" if in_fonts => font_count += 1,
                    b"cellXfs" => in_cell_xfs = true,
                    b"xf" if in_cell_xfs => {
                        let entry = XfEntry {
                            start: e.clone().into_owned(),
                            children: Vec::new(),
                        };
                        current = Some((entry, 0));
                    }
                    _ => {}
                },
                Event::Empty(ref e) => match e.local_name().as_ref() {
                    b"font" if in_fonts => font_count += 1,
                    b"xf" if in_cell_xfs => xfs.push(XfEntry {
                        start: e.clone().into_owned(),
                        children: Vec::new(),
                    }),
                    _ => {}
                },
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"fonts" => in_fonts = false,
                    b"cellXfs" => in_cell_xfs = false,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(Self {
            xml: xml.to_string(),
            existing: Styles::parse(xml),
            font_count,
            xfs,
            new_fonts: Vec::new(),
            new_xfs: Vec::new(),
            derived: HashMap::new(),
        })
    }

    /// Cell format index for a cell that had format `base` and now carries
    /// `style`: a copy of `base` whose font is the link font.
    ///
    /// `base` itself is returned when its font already shows `style`. Fonts
    /// and formats already in the part are reused before new ones are added.
    pub(crate) fn derive_link_xf(&mut self, base: u32, style: &LinkStyle) -> u32 {
        if let Some(&id) = self.derived.get(&(base, style.clone())) {
            return id;
        }
        if (base as usize) < self.xfs.len()
            && self.existing.link_style(base as usize).as_ref() == Some(style)
        {
            return base;
        }

        let font_id = match self.existing.find_link_font(style) {
            Some(i) => i,
            None => match self.new_fonts.iter().position(|f| f == style) {
                Some(i) => self.font_count + i,
                None => {
                    self.new_fonts.push(style.clone());
                    self.font_count + self.new_fonts.len() - 1
                }
            },
        };

        let template = self
            .xfs
            .get(base as usize)
            .or_else(|| self.xfs.first())
            .cloned()
            .unwrap_or_else(default_xf);

        let start = with_attr(&template.start, "fontId", &font_id.to_string());
        let start = with_attr(&start, "applyFont", "1");
        let entry = XfEntry {
            start,
            children: template.children,
        };

        let id = match self.xfs.iter().position(|xf| xf.same_as(&entry)) {
            Some(i) => i as u32,
            None => {
                self.new_xfs.push(entry);
                (self.xfs.len() + self.new_xfs.len() - 1) as u32
            }
        };
        self.derived.insert((base, style.clone()), id);
        id
    }

    /// Whether any font or format was added.
    pub(crate) fn is_changed(&self) -> bool {
        !self.new_xfs.is_empty()
    }

    /// Produce the patched styles part.
    pub(crate) fn finish(self) -> Result<String> {
        if !self.is_changed() {
            return Ok(self.xml);
        }

        let mut reader = Reader::from_str(&self.xml);
        reader.config_mut().trim_text(false);
        let mut writer = Writer::new(Vec::new());
        let mut buf = Vec::new();
        let mut wrote_fonts = false;
        let mut wrote_xfs = false;

        let font_total = (self.font_count + self.new_fonts.len()).to_string();
        let xf_total = (self.xfs.len() + self.new_xfs.len()).to_string();

        loop {
            let event = reader.read_event_into(&mut buf)?;
            match event {
                Event::Eof => break,
                Event::Start(ref e) if e.local_name().as_ref() == b"fonts" => {
                    writer.write_event(Event::Start(with_attr(e, "count", &font_total)))?;
                }
                Event::End(ref e) if e.local_name().as_ref() == b"fonts" => {
                    self.write_fonts(&mut writer)?;
                    wrote_fonts = true;
                    writer.write_event(Event::End(e.to_owned()))?;
                }
                Event::Empty(ref e) if e.local_name().as_ref() == b"fonts" => {
                    writer.write_event(Event::Start(with_attr(e, "count", &font_total)))?;
                    self.write_fonts(&mut writer)?;
                    wrote_fonts = true;
                    writer.write_event(Event::End(BytesEnd::new(
                        String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    )))?;
                }
                Event::Start(ref e) if e.local_name().as_ref() == b"cellXfs" => {
                    writer.write_event(Event::Start(with_attr(e, "count", &xf_total)))?;
                }
                Event::End(ref e) if e.local_name().as_ref() == b"cellXfs" => {
                    self.write_xfs(&mut writer)?;
                    wrote_xfs = true;
                    writer.write_event(Event::End(e.to_owned()))?;
                }
                Event::Empty(ref e) if e.local_name().as_ref() == b"cellXfs" => {
                    writer.write_event(Event::Start(with_attr(e, "count", &xf_total)))?;
                    self.write_xfs(&mut writer)?;
                    wrote_xfs = true;
                    writer.write_event(Event::End(BytesEnd::new(
                        String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    )))?;
                }
                other => writer.write_event(other)?,
            }
            buf.clear();
        }

        if !wrote_fonts || !wrote_xfs {
            return Err(Error::InvalidData(
                "styles.xml has no fonts or cellXfs section".into(),
            ));
        }

        Ok(String::from_utf8(writer.into_inner())?)
    }

    fn write_fonts<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        for font in &self.new_fonts {
            writer.get_mut().write_all(font.to_font_xml().as_bytes())?;
        }
        Ok(())
    }

    fn write_xfs<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        for xf in &self.new_xfs {
            if xf.children.is_empty() {
                writer.write_event(Event::Empty(xf.start.clone()))?;
            } else {
                writer.write_event(Event::Start(xf.start.clone()))?;
                for child in &xf.children {
                    writer.write_event(child.clone())?;
                }
                writer.write_event(Event::End(xf.start.to_end().into_owned()))?;
            }
        }
        Ok(())
    }
}

fn default_xf() -> XfEntry {
    let mut reader = Reader::from_str(DEFAULT_XF);
    let start = match reader.read_event() {
        Ok(Event::Empty(e)) => e.into_owned(),
        _ => BytesStart::new("xf"),
    };
    XfEntry {
        start,
        children: Vec::new(),
    }
}

/// Minimal styles part for packages that ship without one.
pub(crate) const MINIMAL_STYLES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
    r#"<fonts count="1"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font></fonts>"#,
    r#"<fills count="2"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill></fills>"#,
    r#"<borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders>"#,
    r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
    r#"<cellXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/></cellXfs>"#,
    r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
    r#"</styleSheet>"#,
);
