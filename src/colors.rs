use crossterm::style::Color;

/// Parse a CSS-style colour string into a terminal colour.
///
/// Accepts `#rgb`, `#rrggbb`, `rgb(r, g, b)` and a handful of common named
/// colours. Anything else yields `None` and the caller falls back to a default.
pub fn parse_css_color(value: &str) -> Option<Color> {
    let value = value.trim();

    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex);
    }

    let lower = value.to_ascii_lowercase();
    if let Some(args) = lower.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
        let parts: Vec<u8> = args
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .ok()?;
        return match parts.as_slice() {
            [r, g, b] => Some(rgb(*r, *g, *b)),
            _ => None,
        };
    }

    let (r, g, b) = match lower.as_str() {
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "orange" => (255, 165, 0),
        "purple" => (128, 0, 128),
        "magenta" | "fuchsia" => (255, 0, 255),
        "cyan" | "aqua" => (0, 255, 255),
        "gray" | "grey" => (128, 128, 128),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "navy" => (0, 0, 128),
        "teal" => (0, 128, 128),
        "maroon" => (128, 0, 0),
        "olive" => (128, 128, 0),
        "pink" => (255, 192, 203),
        "brown" => (165, 42, 42),
        _ => return None,
    };
    Some(rgb(r, g, b))
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        // #rgb expands each nibble: #0af -> #00aaff
        3 => {
            let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|v| v * 17);
            Some(rgb(nibble(0)?, nibble(1)?, nibble(2)?))
        }
        6 => {
            let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
            Some(rgb(byte(0)?, byte(2)?, byte(4)?))
        }
        _ => None,
    }
}

/// Parse with a fallback that is itself a valid colour string.
pub fn css_or(value: &str, fallback: &str) -> Color {
    parse_css_color(value)
        .or_else(|| parse_css_color(fallback))
        .unwrap_or(Color::Reset)
}

/// Helper to create RGB colors
pub fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::Rgb { r, g, b }
}

/// Halve the brightness of an RGB colour (used for cooling buttons)
pub fn dim(color: Color) -> Color {
    match color {
        Color::Rgb { r, g, b } => rgb(r / 2, g / 2, b / 2),
        other => other,
    }
}

/// Whether a CSS length such as `25%`, `4px` or `0` means "no rounding".
pub fn is_zero_length(value: &str) -> bool {
    let number = value
        .trim()
        .trim_end_matches('%')
        .trim_end_matches("px")
        .trim_end_matches("rem")
        .trim_end_matches("em")
        .trim();
    number.parse::<f64>().map(|n| n == 0.0).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_forms() {
        assert_eq!(parse_css_color("#007bff"), Some(rgb(0, 123, 255)));
        assert_eq!(parse_css_color("#FFF"), Some(rgb(255, 255, 255)));
        assert_eq!(parse_css_color("#0af"), Some(rgb(0, 170, 255)));
        assert_eq!(parse_css_color("#12345"), None);
        assert_eq!(parse_css_color("#gg0000"), None);
    }

    #[test]
    fn functional_and_named_forms() {
        assert_eq!(parse_css_color("rgb(1, 2, 3)"), Some(rgb(1, 2, 3)));
        assert_eq!(parse_css_color("RGB(10,20,30)"), Some(rgb(10, 20, 30)));
        assert_eq!(parse_css_color("rgb(1, 2)"), None);
        assert_eq!(parse_css_color("rgb(300, 2, 3)"), None);
        assert_eq!(parse_css_color("Red"), Some(rgb(255, 0, 0)));
        assert_eq!(parse_css_color("hsl(0, 100%, 50%)"), None);
    }

    #[test]
    fn fallback_is_used_for_unknown_values() {
        assert_eq!(css_or("not-a-colour", "#000000"), rgb(0, 0, 0));
        assert_eq!(css_or("nope", "nope"), Color::Reset);
    }

    #[test]
    fn zero_lengths() {
        assert!(is_zero_length("0"));
        assert!(is_zero_length("0%"));
        assert!(is_zero_length(" 0px "));
        assert!(!is_zero_length("25%"));
        assert!(!is_zero_length("round"));
    }
}
