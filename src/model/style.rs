//! Link style applied to hyperlinked cells.

use serde::{Deserialize, Serialize};

/// An ARGB color as written to `styles.xml` (e.g. `FF0563C1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(String);

impl Color {
    /// Build a color from `RRGGBB` or `AARRGGBB` hex, with or without `#`.
    /// Six-digit colors get an opaque alpha channel.
    pub fn new(hex: &str) -> Self {
        let hex = hex.trim_start_matches('#');
        if hex.len() == 6 {
            Color(format!("FF{}", hex.to_uppercase()))
        } else {
            Color(hex.to_uppercase())
        }
    }

    pub fn as_argb(&self) -> &str {
        &self.0
    }
}

/// Underline kind for the link font.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Underline {
    None,
    #[default]
    Single,
    Double,
}

impl Underline {
    /// Value of the `<u val="..."/>` attribute, `None` when no `<u>` is written.
    pub(crate) fn as_xml_val(self) -> Option<&'static str> {
        match self {
            Underline::None => None,
            Underline::Single => Some("single"),
            Underline::Double => Some("double"),
        }
    }
}

/// The font given to a cell once it carries a hyperlink.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkStyle {
    pub color: Color,
    pub underline: Underline,
    pub font_name: String,
    /// Font size in points.
    pub font_size: u32,
}

impl Default for LinkStyle {
    fn default() -> Self {
        Self {
            color: Color::new("0563C1"),
            underline: Underline::Single,
            font_name: "Calibri".to_string(),
            font_size: 11,
        }
    }
}

impl LinkStyle {
    /// The `<font>` element for `styles.xml`.
    pub(crate) fn to_font_xml(&self) -> String {
        let mut xml = String::from("<font>");
        if let Some(val) = self.underline.as_xml_val() {
            xml.push_str(&format!("<u val=\"{val}\"/>"));
        }
        xml.push_str(&format!("<sz val=\"{}\"/>", self.font_size));
        xml.push_str(&format!("<color rgb=\"{}\"/>", self.color.as_argb()));
        xml.push_str(&format!(
            "<name val=\"{}\"/>",
            crate::package::xml_escape(&self.font_name)
        ));
        xml.push_str("<family val=\"2\"/>");
        xml.push_str("</font>");
        xml
    }
}
