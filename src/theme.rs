//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Cube palette and UI colours, optionally loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Block colours for kinds 1..=10.
    pub cubes: [Color; 10],
    /// Panel background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, counters).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Inactive / secondary text (dimmed layer panels).
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::classic_default()
    }
}

impl Theme {
    /// Default palette: the classic ten cube colours on a dark UI.
    pub fn classic_default() -> Self {
        Self {
            cubes: [
                parse_hex("#FF0000").unwrap(), // red
                parse_hex("#00CC00").unwrap(), // green
                parse_hex("#0066FF").unwrap(), // sky blue
                parse_hex("#FFCC00").unwrap(), // gold
                parse_hex("#FF00FF").unwrap(), // magenta
                parse_hex("#FF6600").unwrap(), // orange
                parse_hex("#8833DD").unwrap(), // purple
                parse_hex("#00FFFF").unwrap(), // cyan
                parse_hex("#996633").unwrap(), // brown
                parse_hex("#9AA0AC").unwrap(), // slate
            ],
            bg: parse_hex("#31353F").unwrap(),
            div_line: parse_hex("#3F444F").unwrap(),
            main_fg: parse_hex("#ABB2BF").unwrap(),
            title: parse_hex("#E5C07B").unwrap(),
            inactive_fg: parse_hex("#5C6370").unwrap(),
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or
    /// `theme[key]='value'`. Cube keys are `cube1`..`cube10`; UI keys are
    /// `bg`, `div_line`, `main_fg`, `title`, `inactive_fg`.
    /// Falls back to the classic defaults if path is None or file is missing.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    fn default_for_palette(palette: crate::Palette) -> Self {
        let mut t = Self::classic_default();
        t.apply_palette(palette);
        t
    }

    /// Override cube colours for high-contrast or colourblind variants.
    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.cubes = [
                    parse_hex("#FF0000").unwrap(),
                    parse_hex("#00FF00").unwrap(),
                    parse_hex("#0088FF").unwrap(),
                    parse_hex("#FFFF00").unwrap(),
                    parse_hex("#FF00FF").unwrap(),
                    parse_hex("#FF8800").unwrap(),
                    parse_hex("#AA66FF").unwrap(),
                    parse_hex("#00FFFF").unwrap(),
                    parse_hex("#FFFFFF").unwrap(),
                    parse_hex("#888888").unwrap(),
                ];
            }
            crate::Palette::Colorblind => {
                // Tol-style palette: distinguishable without red/green alone.
                self.cubes = [
                    parse_hex("#0077BB").unwrap(), // blue
                    parse_hex("#EE7733").unwrap(), // orange
                    parse_hex("#009988").unwrap(), // teal
                    parse_hex("#CC3311").unwrap(), // red
                    parse_hex("#EE3377").unwrap(), // magenta
                    parse_hex("#BBBB00").unwrap(), // yellow
                    parse_hex("#33BBEE").unwrap(), // cyan
                    parse_hex("#AA4499").unwrap(), // purple
                    parse_hex("#DDCC77").unwrap(), // sand
                    parse_hex("#BBBBBB").unwrap(), // grey
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            map.get(key)
                .and_then(|v| parse_hex(v.trim_matches('"').trim_matches('\'').trim()).ok())
        };
        let defaults = Self::classic_default();
        let mut cubes = defaults.cubes;
        for (i, slot) in cubes.iter_mut().enumerate() {
            if let Some(c) = get(&format!("cube{}", i + 1)) {
                *slot = c;
            }
        }
        Self {
            cubes,
            bg: get("bg").unwrap_or(defaults.bg),
            div_line: get("div_line").unwrap_or(defaults.div_line),
            main_fg: get("main_fg").unwrap_or(defaults.main_fg),
            title: get("title").unwrap_or(defaults.title),
            inactive_fg: get("inactive_fg").unwrap_or(defaults.inactive_fg),
        }
    }

    /// Colour for a block kind (1..=10).
    #[inline]
    pub fn cube_color(&self, kind: u8) -> Color {
        self.cubes[(kind.max(1) as usize - 1) % self.cubes.len()]
    }
}

/// Parse btop-style theme file into key -> value map.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_prefix("theme[") {
            if let Some(end) = stripped.find(']') {
                let key = stripped[..end].trim();
                let rest = stripped[end + 1..].trim();
                if let Some(eq) = rest.find('=') {
                    let value = rest[eq + 1..]
                        .trim()
                        .trim_matches('"')
                        .trim_matches('\'')
                        .to_string();
                    if !value.is_empty() {
                        map.insert(key.to_string(), value);
                    }
                }
            }
        }
    }
    map
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let (r, g, b) = if s.len() == 6 {
        let r =
            u8::from_str_radix(&s[0..2], 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))?;
        let g =
            u8::from_str_radix(&s[2..4], 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))?;
        let b =
            u8::from_str_radix(&s[4..6], 16).map_err(|_| ThemeError::InvalidHex(s.to_string()))?;
        (r, g, b)
    } else if s.len() == 3 {
        let r = u8::from_str_radix(&s[0..1], 16)
            .map_err(|_| ThemeError::InvalidHex(s.to_string()))?
            * 17;
        let g = u8::from_str_radix(&s[1..2], 16)
            .map_err(|_| ThemeError::InvalidHex(s.to_string()))?
            * 17;
        let b = u8::from_str_radix(&s[2..3], 16)
            .map_err(|_| ThemeError::InvalidHex(s.to_string()))?
            * 17;
        (r, g, b)
    } else {
        return Err(ThemeError::InvalidHex(s.to_string()));
    };
    Ok(Color::Rgb(r, g, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#00CC00").unwrap();
        assert!(matches!(c, Color::Rgb(0x00, 0xCC, 0x00)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[cube3]="#0066FF""##);
        assert_eq!(map.get("cube3"), Some(&"#0066FF".to_string()));
    }

    #[test]
    fn test_cube_color_wraps_kind() {
        let t = Theme::classic_default();
        assert_eq!(t.cube_color(1), t.cubes[0]);
        assert_eq!(t.cube_color(10), t.cubes[9]);
        assert_eq!(t.cube_color(11), t.cubes[0]);
    }
}
