/// An RGB fill color with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Parse `#RRGGBB`, `RRGGBB`, `#RGB` or `0xRRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Color> {
        let hex = hex.trim();
        let digits = hex
            .strip_prefix('#')
            .or_else(|| hex.strip_prefix("0x"))
            .unwrap_or(hex);
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let (r, g, b) = match digits.len() {
            6 => (
                u8::from_str_radix(&digits[0..2], 16).ok()?,
                u8::from_str_radix(&digits[2..4], 16).ok()?,
                u8::from_str_radix(&digits[4..6], 16).ok()?,
            ),
            3 => {
                let short = |i: usize| u8::from_str_radix(&digits[i..i + 1], 16).map(|v| v * 17);
                (short(0).ok()?, short(1).ok()?, short(2).ok()?)
            }
            _ => return None,
        };
        Some(Color {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
        })
    }
}

/// Parse a template color, falling back to `default` when absent or invalid.
pub fn resolve_color(hex: Option<&str>, default: Color) -> Color {
    match hex {
        None => default,
        Some(h) => Color::from_hex(h).unwrap_or_else(|| {
            log::debug!("invalid color '{h}', using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_form() {
        let c = Color::from_hex("#555555").unwrap();
        assert!((c.r - 85.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.r, c.g);
        assert_eq!(Color::from_hex("000000"), Some(Color::BLACK));
        assert_eq!(Color::from_hex("0xFF0000").map(|c| c.r), Some(1.0));
    }

    #[test]
    fn parses_short_form() {
        assert_eq!(Color::from_hex("#fff").map(|c| c.b), Some(1.0));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Color::from_hex("grey"), None);
        assert_eq!(Color::from_hex("#12345"), None);
        assert_eq!(Color::from_hex("#ééé"), None);
        assert_eq!(Color::from_hex(""), None);
    }

    #[test]
    fn resolve_color_falls_back() {
        let red = Color::from_hex("#ff0000").unwrap();
        assert_eq!(resolve_color(Some("nope"), red), red);
        assert_eq!(resolve_color(None, red), red);
        assert_eq!(resolve_color(Some("#000"), red), Color::BLACK);
    }
}
