//! Text style state
//!
//! The style model is deliberately small: three additive attributes plus at
//! most one foreground and one background color taken from the eight
//! standard ANSI color names.

use bitflags::bitflags;

bitflags! {
    /// Additive text attributes
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StyleAttributes: u8 {
        const BOLD      = 0b0001;
        const ITALIC    = 0b0010;
        const UNDERLINE = 0b0100;
    }
}

/// One of the eight ANSI color names.
///
/// Bright SGR variants (90-97, 100-107) map onto the same names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NamedColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl NamedColor {
    pub const ALL: [NamedColor; 8] = [
        NamedColor::Black,
        NamedColor::Red,
        NamedColor::Green,
        NamedColor::Yellow,
        NamedColor::Blue,
        NamedColor::Magenta,
        NamedColor::Cyan,
        NamedColor::White,
    ];

    /// Color for an offset 0..=7 within an SGR color range
    pub fn from_offset(offset: u16) -> Option<Self> {
        Self::ALL.get(offset as usize).copied()
    }
}

/// Which color slot an SGR code targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSlot {
    Foreground,
    Background,
}

/// Style currently in effect for a display session.
///
/// This is a plain `Copy` value, so every fragment handed to a sink carries
/// its own snapshot rather than a reference into the parser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ActiveStyleSet {
    pub attrs: StyleAttributes,
    pub fg: Option<NamedColor>,
    pub bg: Option<NamedColor>,
}

impl ActiveStyleSet {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_plain(&self) -> bool {
        self.attrs.is_empty() && self.fg.is_none() && self.bg.is_none()
    }

    pub fn set_color(&mut self, slot: ColorSlot, color: NamedColor) {
        match slot {
            ColorSlot::Foreground => self.fg = Some(color),
            ColorSlot::Background => self.bg = Some(color),
        }
    }

    #[cfg(test)]
    pub fn with_fg(mut self, color: NamedColor) -> Self {
        self.fg = Some(color);
        self
    }

    #[cfg(test)]
    pub fn with_attrs(mut self, attrs: StyleAttributes) -> Self {
        self.attrs |= attrs;
        self
    }

    /// Apply one SGR parameter code.
    ///
    /// Unknown codes leave the set untouched.
    pub fn apply_sgr(&mut self, code: u16) {
        match code {
            0 => self.reset(),
            1 => self.attrs |= StyleAttributes::BOLD,
            3 => self.attrs |= StyleAttributes::ITALIC,
            4 => self.attrs |= StyleAttributes::UNDERLINE,
            30..=37 => self.set_offset(ColorSlot::Foreground, code - 30),
            90..=97 => self.set_offset(ColorSlot::Foreground, code - 90),
            40..=47 => self.set_offset(ColorSlot::Background, code - 40),
            100..=107 => self.set_offset(ColorSlot::Background, code - 100),
            _ => {}
        }
    }

    fn set_offset(&mut self, slot: ColorSlot, offset: u16) {
        if let Some(color) = NamedColor::from_offset(offset) {
            self.set_color(slot, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bright_codes_share_names() {
        let mut normal = ActiveStyleSet::default();
        normal.apply_sgr(31);
        let mut bright = ActiveStyleSet::default();
        bright.apply_sgr(91);
        assert_eq!(normal, bright);
        assert_eq!(normal.fg, Some(NamedColor::Red));
    }

    #[test]
    fn test_background_range() {
        let mut style = ActiveStyleSet::default();
        style.apply_sgr(107);
        assert_eq!(style.bg, Some(NamedColor::White));
        assert_eq!(style.fg, None);

        style.apply_sgr(40);
        assert_eq!(style.bg, Some(NamedColor::Black));
    }

    #[test]
    fn test_attributes_accumulate_until_reset() {
        let mut style = ActiveStyleSet::default();
        style.apply_sgr(1);
        style.apply_sgr(3);
        style.apply_sgr(4);
        style.apply_sgr(33);
        assert_eq!(style.attrs, StyleAttributes::all());

        style.apply_sgr(0);
        assert!(style.is_plain());
    }

    #[test]
    fn test_unknown_codes_ignored() {
        let mut style = ActiveStyleSet::default().with_fg(NamedColor::Blue);
        for code in [2, 5, 38, 39, 48, 49, 98, 108, 999] {
            style.apply_sgr(code);
        }
        assert_eq!(style, ActiveStyleSet::default().with_fg(NamedColor::Blue));
    }
}
