//! Renderer-agnostic styles for filter decorations.
//!
//! Filters with the same appearance share one [`StyleFingerprint`], so a
//! renderer creates one decoration object per distinct look rather than one
//! per filter.

use crate::core::model::Filter;
use serde::{Serialize, Serializer};
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    /// Opacity in `0.0..=1.0`.
    pub a: f32,
}

impl Rgba {
    /// Parse `RRGGBBAA` or `RRGGBB` (opaque), with or without a leading `#`.
    pub fn parse_hex(input: &str) -> Option<Self> {
        let hex = input.trim().trim_start_matches('#');
        if !hex.is_ascii() || !(hex.len() == 6 || hex.len() == 8) {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let alpha = if hex.len() == 8 { byte(6)? } else { 255 };
        Some(Self {
            r: byte(0)?,
            g: byte(2)?,
            b: byte(4)?,
            a: f32::from(alpha) / 255.0,
        })
    }

    fn alpha_byte(&self) -> u8 {
        (self.a * 255.0).round().clamp(0.0, 255.0) as u8
    }

    /// Canonical lower-case `rrggbbaa`.
    pub fn to_hex(&self) -> String {
        format!(
            "{:02x}{:02x}{:02x}{:02x}",
            self.r,
            self.g,
            self.b,
            self.alpha_byte()
        )
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

impl Serialize for Rgba {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    Normal,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FontStyle {
    Normal,
    Italic,
}

/// Deduplication key of a filter's visual attributes. Colours are stored in
/// canonical form so `#AABBCC`, `aabbcc` and `aabbccff` collapse together;
/// unparseable colours become "no override".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleFingerprint {
    pub foreground: String,
    pub background: String,
    pub bold: bool,
    pub italic: bool,
    pub whole_line: bool,
}

impl StyleFingerprint {
    pub fn of(filter: &Filter) -> Self {
        Self {
            foreground: canonical_color(&filter.foreground, &filter.id),
            background: canonical_color(&filter.background, &filter.id),
            bold: filter.bold,
            italic: filter.italic,
            whole_line: filter.highlight_whole_line,
        }
    }
}

fn canonical_color(value: &str, filter_id: &str) -> String {
    if value.trim().is_empty() {
        return String::new();
    }
    match Rgba::parse_hex(value) {
        Some(rgba) => rgba.to_hex(),
        None => {
            warn!(target: "style", filter = filter_id, color = value, "unrecognised colour ignored");
            String::new()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleDescriptor {
    pub color: Option<Rgba>,
    pub background_color: Option<Rgba>,
    pub font_weight: FontWeight,
    pub font_style: FontStyle,
    pub whole_line: bool,
}

pub fn resolve(fingerprint: &StyleFingerprint) -> StyleDescriptor {
    StyleDescriptor {
        color: Rgba::parse_hex(&fingerprint.foreground),
        background_color: Rgba::parse_hex(&fingerprint.background),
        font_weight: if fingerprint.bold {
            FontWeight::Bold
        } else {
            FontWeight::Normal
        },
        font_style: if fingerprint.italic {
            FontStyle::Italic
        } else {
            FontStyle::Normal
        },
        whole_line: fingerprint.whole_line,
    }
}

pub fn resolve_filter(filter: &Filter) -> StyleDescriptor {
    resolve(&StyleFingerprint::of(filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn styled(fg: &str, bg: &str, bold: bool) -> Filter {
        let mut f = Filter::new("f".into());
        f.foreground = fg.to_string();
        f.background = bg.to_string();
        f.bold = bold;
        f
    }

    #[test]
    fn test_parse_eight_digit_alpha() {
        let c = Rgba::parse_hex("#ff000080").unwrap();
        assert_eq!((c.r, c.g, c.b), (255, 0, 0));
        assert!((c.a - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_six_digit_is_opaque() {
        let c = Rgba::parse_hex("00ff00").unwrap();
        assert_eq!(c.a, 1.0);
        assert_eq!(c.to_string(), "rgba(0, 255, 0, 1)");
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(Rgba::parse_hex("#12345").is_none());
        assert!(Rgba::parse_hex("zzzzzz").is_none());
        assert!(Rgba::parse_hex("").is_none());
    }

    #[test]
    fn test_empty_colour_means_no_override() {
        let d = resolve_filter(&styled("", "", false));
        assert_eq!(d.color, None);
        assert_eq!(d.background_color, None);
        assert_eq!(d.font_weight, FontWeight::Normal);
        assert_eq!(d.font_style, FontStyle::Normal);
    }

    #[test]
    fn test_equivalent_colours_share_fingerprint() {
        let a = StyleFingerprint::of(&styled("#AABBCC", "", true));
        let b = StyleFingerprint::of(&styled("aabbccff", "", true));
        assert_eq!(a, b);
        let c = StyleFingerprint::of(&styled("aabbccff", "", false));
        assert_ne!(a, c);
    }

    #[test]
    fn test_descriptor_serializes_css_values() {
        let d = resolve_filter(&styled("#ff0000ff", "", true));
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["color"], "rgba(255, 0, 0, 1)");
        assert_eq!(json["fontWeight"], "bold");
        assert_eq!(json["fontStyle"], "normal");
    }
}
