//! Per-button visual attributes with their defaults.

use crate::config::ButtonSpec;

pub const DEFAULT_FG: &str = "#ffffff";
pub const DEFAULT_BG: &str = "#007bff";
pub const DEFAULT_ACTIVE: &str = "#0047a6";
pub const DEFAULT_RADIUS: &str = "25%";
pub const DEFAULT_IMG_WIDTH: &str = "100%";
pub const DEFAULT_IMG_HEIGHT: &str = "100%";
pub const DEFAULT_IMG_RADIUS: &str = "25%";

/// What the button face shows.
#[derive(Debug, Clone, PartialEq)]
pub enum Label {
    Icon(IconStyle),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IconStyle {
    pub width: String,
    pub height: String,
    pub radius: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ButtonStyle {
    pub fg: String,
    pub bg: String,
    pub active: String,
    pub radius: String,
    /// Side length of the square button in layout units
    pub size: u32,
    pub label: Label,
}

/// Resolve the final style of one button. `has_icon` is the icon probe result.
pub fn resolve(spec: &ButtonSpec<'_>, square_size: u32, has_icon: bool) -> ButtonStyle {
    let size = match spec.scale() {
        Some(scale) => (square_size as f64 * scale).round().max(0.0) as u32,
        None => square_size,
    };

    let label = if has_icon {
        Label::Icon(IconStyle {
            width: or_default(spec.img_width(), DEFAULT_IMG_WIDTH),
            height: or_default(spec.img_height(), DEFAULT_IMG_HEIGHT),
            radius: or_default(spec.img_radius(), DEFAULT_IMG_RADIUS),
        })
    } else {
        let text = spec.text().or(spec.macro_name()).unwrap_or_default();
        Label::Text(text.to_string())
    };

    ButtonStyle {
        fg: or_default(spec.fg(), DEFAULT_FG),
        bg: or_default(spec.bg(), DEFAULT_BG),
        active: or_default(spec.active(), DEFAULT_ACTIVE),
        radius: or_default(spec.radius(), DEFAULT_RADIUS),
        size,
        label,
    }
}

fn or_default(value: Option<&str>, default: &str) -> String {
    value.unwrap_or(default).to_string()
}
