//! Hyperlink assignment options.

use crate::model::{Color, LinkStyle, Underline};

/// Options for assigning hyperlinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignOptions {
    /// Font given to every linked cell
    pub link_style: LinkStyle,
}

impl AssignOptions {
    /// Create options with the default blue, single-underlined link style.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole link style.
    pub fn with_link_style(mut self, style: LinkStyle) -> Self {
        self.link_style = style;
        self
    }

    /// Set the link font color from `RRGGBB` or `AARRGGBB` hex.
    pub fn with_color(mut self, hex: &str) -> Self {
        self.link_style.color = Color::new(hex);
        self
    }

    /// Set the link underline.
    pub fn with_underline(mut self, underline: Underline) -> Self {
        self.link_style.underline = underline;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = AssignOptions::default();
        assert_eq!(opts.link_style.color.as_argb(), "FF0563C1");
        assert_eq!(opts.link_style.underline, Underline::Single);
        assert_eq!(opts.link_style.font_name, "Calibri");
    }

    #[test]
    fn test_builder_pattern() {
        let opts = AssignOptions::new()
            .with_color("#ff0000")
            .with_underline(Underline::Double);

        assert_eq!(opts.link_style.color.as_argb(), "FFFF0000");
        assert_eq!(opts.link_style.underline, Underline::Double);
        assert_eq!(opts.link_style.font_size, 11);
    }
}
