//! Color themes
//!
//! A [`Theme`] is a plain value passed into the render composer, so the
//! same state can be drawn with different palettes.

use ratatui::style::Color;

/// Theme names accepted in settings, in cycle order
pub const THEME_NAMES: &[&str] = &["dark", "light"];

/// Palette used by the views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    pub header: Color,
    pub keybind: Color,
    pub text: Color,
    pub dim: Color,
    pub border: Color,
    pub border_focused: Color,
    pub selected_bg: Color,
    pub ok: Color,
    pub error: Color,
    pub loading: Color,
    pub progress: Color,
}

impl Theme {
    /// k9s-inspired dark palette
    pub fn dark() -> Self {
        Self {
            name: "dark",
            header: Color::Rgb(0, 255, 255),       // Cyan
            keybind: Color::Rgb(0, 255, 255),      // Cyan
            text: Color::Rgb(230, 230, 230),
            dim: Color::DarkGray,
            border: Color::Rgb(88, 88, 88),
            border_focused: Color::Rgb(0, 255, 127), // Spring green
            selected_bg: Color::Rgb(40, 40, 40),
            ok: Color::Rgb(50, 205, 50),        // Lime green
            error: Color::Rgb(220, 20, 60),     // Crimson
            loading: Color::Rgb(255, 215, 0),   // Gold
            progress: Color::Rgb(100, 149, 237), // Cornflower blue
        }
    }

    pub fn light() -> Self {
        Self {
            name: "light",
            header: Color::Rgb(0, 95, 135),
            keybind: Color::Rgb(0, 95, 135),
            text: Color::Rgb(30, 30, 30),
            dim: Color::Gray,
            border: Color::Rgb(160, 160, 160),
            border_focused: Color::Rgb(0, 135, 0),
            selected_bg: Color::Rgb(220, 220, 220),
            ok: Color::Rgb(0, 135, 0),
            error: Color::Rgb(175, 0, 0),
            loading: Color::Rgb(175, 95, 0),
            progress: Color::Rgb(0, 0, 175),
        }
    }

    /// Theme for a settings name; unknown names get the dark theme
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "light" => Self::light(),
            _ => Self::dark(),
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}
