use ratatui::style::Color;
use term_color_support::ColorSupport;

/// Color depth the terminal claims to support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Depth {
    TrueColor,
    Indexed256,
    Basic,
}

impl Depth {
    pub fn detect() -> Self {
        let support = ColorSupport::stdout();
        if support.has_16m {
            Depth::TrueColor
        } else if support.has_256 {
            Depth::Indexed256
        } else {
            Depth::Basic
        }
    }

    /// Pick the RGB value, the 256-color index or the plain ANSI color
    fn resolve(self, ansi: Color, rgb: (u8, u8, u8), index256: u8) -> Color {
        match self {
            Depth::TrueColor => Color::Rgb(rgb.0, rgb.1, rgb.2),
            Depth::Indexed256 => Color::Indexed(index256),
            Depth::Basic => ansi,
        }
    }
}

/// Colors used by the board and HUD, resolved once at startup
#[derive(Debug, Clone)]
pub struct Palette {
    pub hidden: Color,
    pub flag: Color,
    pub mine: Color,
    pub cursor_bg: Color,
    pub title: Color,
    pub won: Color,
    pub lost: Color,
    pub numbers: [Color; 8], // Revealed counts 1..8
}

impl Palette {
    pub fn new(depth: Depth) -> Self {
        // RGB samples follow the Windows Terminal "Campbell" scheme
        let blue = depth.resolve(Color::Blue, (0, 55, 218), 20);
        let green = depth.resolve(Color::Green, (19, 161, 14), 28);
        let red = depth.resolve(Color::Red, (197, 15, 31), 160);
        let magenta = depth.resolve(Color::Magenta, (136, 23, 152), 90);
        let cyan = depth.resolve(Color::Cyan, (58, 150, 221), 38);
        let yellow = depth.resolve(Color::Yellow, (193, 156, 0), 178);
        Palette {
            hidden: depth.resolve(Color::Gray, (204, 204, 204), 250),
            flag: depth.resolve(Color::LightBlue, (59, 120, 255), 63),
            mine: depth.resolve(Color::LightRed, (231, 72, 86), 203),
            cursor_bg: depth.resolve(Color::DarkGray, (118, 118, 118), 243),
            title: yellow,
            won: depth.resolve(Color::LightGreen, (22, 198, 12), 46),
            lost: red,
            numbers: [blue, green, red, magenta, cyan, yellow, blue, red],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_controls_color_form() {
        assert_eq!(Palette::new(Depth::Basic).hidden, Color::Gray);
        assert_eq!(Palette::new(Depth::Indexed256).hidden, Color::Indexed(250));
        assert_eq!(Palette::new(Depth::TrueColor).hidden, Color::Rgb(204, 204, 204));
    }
}
