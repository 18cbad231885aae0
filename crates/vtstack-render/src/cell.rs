#![forbid(unsafe_code)]

//! Cell types and invariants.
//!
//! The [`Cell`] is the atomic unit of every area: a scalar value plus the
//! full attribute set and two bookkeeping bits used by the sync engine.
//!
//! # Equality
//!
//! `Cell` equality compares every rendering-relevant field (glyph, colors,
//! style, transparency) and ignores the bookkeeping [`CellFlags`]. Two cells
//! that compare equal render identically, which is what the compositor and
//! the sync engine use to decide whether a physical redraw is needed.
//!
//! # Transparency
//!
//! | Kind | Compositing |
//! |------|-------------|
//! | `Opaque` | replaces whatever is below |
//! | `Transparent` | shows the covered cell unchanged |
//! | `Shadow` | keeps the covered glyph, takes this cell's colors |
//! | `InheritBackground` | keeps this glyph and foreground, takes the covered background |

/// A palette color.
///
/// `Default` is the terminal's own default color (SGR 39 / 49).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
}

impl Color {
    pub const BLACK: Color = Color::Indexed(0);
    pub const RED: Color = Color::Indexed(1);
    pub const GREEN: Color = Color::Indexed(2);
    pub const BROWN: Color = Color::Indexed(3);
    pub const BLUE: Color = Color::Indexed(4);
    pub const MAGENTA: Color = Color::Indexed(5);
    pub const CYAN: Color = Color::Indexed(6);
    pub const LIGHT_GRAY: Color = Color::Indexed(7);
    pub const DARK_GRAY: Color = Color::Indexed(8);
    pub const LIGHT_RED: Color = Color::Indexed(9);
    pub const LIGHT_GREEN: Color = Color::Indexed(10);
    pub const YELLOW: Color = Color::Indexed(11);
    pub const LIGHT_BLUE: Color = Color::Indexed(12);
    pub const LIGHT_MAGENTA: Color = Color::Indexed(13);
    pub const LIGHT_CYAN: Color = Color::Indexed(14);
    pub const WHITE: Color = Color::Indexed(15);

    /// Map this color onto a palette of `count` entries.
    ///
    /// 256-color indices fold onto the 16 ANSI colors, bright colors fold
    /// onto their dark counterparts for an 8-color palette, and a
    /// monochrome terminal (`count == 0`) only has the default color.
    #[must_use]
    pub fn for_palette(self, count: u16) -> Color {
        let Color::Indexed(index) = self else {
            return self;
        };
        if count == 0 {
            return Color::Default;
        }
        if u16::from(index) < count {
            return self;
        }
        let mut index = if index >= 16 {
            ansi256_to_16(index)
        } else {
            index
        };
        if count <= 8 && index >= 8 {
            index -= 8;
        }
        Color::Indexed(index)
    }
}

/// Nearest 16-color equivalent of a 256-color palette index.
fn ansi256_to_16(index: u8) -> u8 {
    match index {
        0..=15 => index,
        16..=231 => {
            let i = index - 16;
            let (r, g, b) = (i / 36, (i / 6) % 6, i % 6);
            let base = u8::from(r >= 3) | (u8::from(g >= 3) << 1) | (u8::from(b >= 3) << 2);
            if r.max(g).max(b) >= 4 { base + 8 } else { base }
        }
        _ => match index - 232 {
            0..=5 => 0,
            6..=11 => 8,
            12..=17 => 7,
            _ => 15,
        },
    }
}

bitflags::bitflags! {
    /// Character style bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StyleFlags: u16 {
        /// Bold / increased intensity.
        const BOLD             = 1 << 0;
        /// Dim / decreased intensity.
        const DIM              = 1 << 1;
        /// Italic text.
        const ITALIC           = 1 << 2;
        /// Single underline.
        const UNDERLINE        = 1 << 3;
        /// Double underline.
        const DOUBLE_UNDERLINE = 1 << 4;
        /// Blinking text.
        const BLINK            = 1 << 5;
        /// Reverse video.
        const REVERSE          = 1 << 6;
        /// Standout (rendered as reverse video).
        const STANDOUT         = 1 << 7;
        /// Hidden text.
        const INVISIBLE        = 1 << 8;
        /// Protected from selective erase; no visual effect.
        const PROTECTED        = 1 << 9;
        /// Strikethrough.
        const CROSSED_OUT      = 1 << 10;
        /// Drawn from the DEC special graphics set.
        const ALT_CHARSET      = 1 << 11;
        /// Drawn from the PC (CP437) set.
        const PC_CHARSET       = 1 << 12;
    }
}

impl StyleFlags {
    /// Bits that change how a glyph looks on screen.
    pub const RENDITION: StyleFlags = StyleFlags::BOLD
        .union(StyleFlags::DIM)
        .union(StyleFlags::ITALIC)
        .union(StyleFlags::UNDERLINE)
        .union(StyleFlags::DOUBLE_UNDERLINE)
        .union(StyleFlags::BLINK)
        .union(StyleFlags::REVERSE)
        .union(StyleFlags::STANDOUT)
        .union(StyleFlags::INVISIBLE)
        .union(StyleFlags::CROSSED_OUT);

    /// Charset selection bits.
    pub const CHARSET: StyleFlags = StyleFlags::ALT_CHARSET.union(StyleFlags::PC_CHARSET);
}

/// How a cell composites over what lies beneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transparency {
    #[default]
    Opaque,
    Transparent,
    Shadow,
    InheritBackground,
}

impl Transparency {
    /// Whether the cell needs the covered cell to be resolved.
    #[inline]
    pub const fn is_see_through(self) -> bool {
        !matches!(self, Transparency::Opaque)
    }
}

bitflags::bitflags! {
    /// Per-cell bookkeeping owned by the sync engine.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CellFlags: u8 {
        /// The terminal shows this cell's current value.
        ///
        /// Set when a flush emits the cell, kept when an identical value
        /// is stored over it, and cleared by any other store.
        const PRINTED = 1 << 0;
    }
}

/// A single character cell.
#[derive(Debug, Clone, Copy)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub style: StyleFlags,
    pub transparency: Transparency,
    pub flags: CellFlags,
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.ch == other.ch
            && self.fg == other.fg
            && self.bg == other.bg
            && self.style == other.style
            && self.transparency == other.transparency
    }
}

impl Eq for Cell {}

impl Default for Cell {
    fn default() -> Self {
        Self::BLANK
    }
}

impl Cell {
    /// A space in default colors, opaque.
    pub const BLANK: Cell = Cell {
        ch: ' ',
        fg: Color::Default,
        bg: Color::Default,
        style: StyleFlags::empty(),
        transparency: Transparency::Opaque,
        flags: CellFlags::empty(),
    };

    /// Create an opaque cell with default attributes.
    #[inline]
    pub const fn new(ch: char) -> Self {
        Self { ch, ..Self::BLANK }
    }

    #[inline]
    #[must_use]
    pub const fn with_fg(mut self, fg: Color) -> Self {
        self.fg = fg;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_bg(mut self, bg: Color) -> Self {
        self.bg = bg;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_style(mut self, style: StyleFlags) -> Self {
        self.style = style;
        self
    }

    #[inline]
    #[must_use]
    pub const fn with_transparency(mut self, transparency: Transparency) -> Self {
        self.transparency = transparency;
        self
    }

    /// Whether the terminal already shows this cell.
    #[inline]
    pub const fn is_printed(&self) -> bool {
        self.flags.contains(CellFlags::PRINTED)
    }

    /// A space with default colors and no visible style.
    ///
    /// Clearing a line leaves exactly this state on every terminal,
    /// with or without background-color-erase.
    #[inline]
    pub fn is_normal_blank(&self) -> bool {
        self.ch == ' '
            && self.fg == Color::Default
            && self.bg == Color::Default
            && !self.style.intersects(StyleFlags::RENDITION)
    }
}

/// Block-graphic glyphs that a shadow never keeps.
///
/// A shadow recolors the glyph below it; for solid blocks that would
/// paint the shadow color over the whole cell, so they become spaces.
#[inline]
pub const fn is_shadow_hidden_glyph(ch: char) -> bool {
    matches!(
        ch,
        '\u{2580}' // ▀ upper half block
            | '\u{2584}' // ▄ lower half block
            | '\u{2588}' // █ full block
            | '\u{258C}' // ▌ left half block
            | '\u{2590}' // ▐ right half block
            | '\u{2591}' // ░ light shade
            | '\u{2592}' // ▒ medium shade
            | '\u{2593}' // ▓ dark shade
    )
}

/// The attribute state that print and clear calls stamp onto new cells.
///
/// Threaded explicitly through the write path instead of living in a
/// global, so that attribute diffing can be tested in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GraphicsContext {
    pub fg: Color,
    pub bg: Color,
    pub style: StyleFlags,
    pub transparency: Transparency,
}

impl GraphicsContext {
    /// Create a context with the given colors and no style.
    #[inline]
    pub const fn new(fg: Color, bg: Color) -> Self {
        Self {
            fg,
            bg,
            style: StyleFlags::empty(),
            transparency: Transparency::Opaque,
        }
    }

    /// Set both colors.
    #[inline]
    pub fn set_colors(&mut self, fg: Color, bg: Color) {
        self.fg = fg;
        self.bg = bg;
    }

    /// Replace the style bits.
    #[inline]
    pub fn set_style(&mut self, style: StyleFlags) {
        self.style = style;
    }

    /// Enable or disable individual style bits.
    #[inline]
    pub fn toggle_style(&mut self, bits: StyleFlags, on: bool) {
        self.style.set(bits, on);
    }

    #[inline]
    pub fn set_transparency(&mut self, transparency: Transparency) {
        self.transparency = transparency;
    }

    /// Reset to default colors, no style, opaque.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Build a cell carrying these attributes.
    #[inline]
    pub const fn cell(&self, ch: char) -> Cell {
        Cell {
            ch,
            fg: self.fg,
            bg: self.bg,
            style: self.style,
            transparency: self.transparency,
            flags: CellFlags::empty(),
        }
    }
}
