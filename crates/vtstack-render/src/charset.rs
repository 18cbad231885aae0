#![forbid(unsafe_code)]

//! Output encodings and glyph translation.
//!
//! Terminals without UTF-8 still draw boxes: VT100-class terminals via
//! the DEC special graphics set (`ESC ( 0`), the Linux console and other
//! PC-style consoles via the CP437 ROM font (`CSI 11 m`). Every glyph in
//! the table carries an ASCII fallback for terminals with neither.

use vtstack_core::terminal_capabilities::TerminalCapabilities;

/// How characters are encoded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    /// UTF-8, every scalar sent as-is.
    #[default]
    Utf8,
    /// 7-bit ASCII plus the DEC special graphics set.
    Vt100,
    /// CP437 bytes (PC console font).
    Pc,
    /// Plain 7-bit ASCII.
    Ascii,
}

impl Encoding {
    /// Pick an encoding from the terminal's capabilities.
    pub fn detect(caps: &TerminalCapabilities) -> Self {
        if caps.utf8 {
            Self::Utf8
        } else if caps.pc_charset {
            Self::Pc
        } else if caps.alt_charset {
            Self::Vt100
        } else {
            Self::Ascii
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Vt100 => "vt100",
            Self::Pc => "pc",
            Self::Ascii => "ascii",
        }
    }
}

/// Character set a glyph has to be sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Normal,
    /// DEC special graphics (G0 = `0`).
    Alternate,
    /// PC ROM font.
    Pc,
}

/// A glyph translated for the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedGlyph {
    pub charset: Charset,
    bytes: [u8; 4],
    len: u8,
}

impl EncodedGlyph {
    fn byte(charset: Charset, b: u8) -> Self {
        Self {
            charset,
            bytes: [b, 0, 0, 0],
            len: 1,
        }
    }

    fn utf8(ch: char) -> Self {
        let mut bytes = [0u8; 4];
        let len = ch.encode_utf8(&mut bytes).len() as u8;
        Self {
            charset: Charset::Normal,
            bytes,
            len,
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..usize::from(self.len)]
    }
}

/// `(glyph, DEC graphics letter, CP437 byte, ASCII fallback)`; `0` means
/// the set has no slot for the glyph.
const GLYPHS: &[(char, u8, u8, u8)] = &[
    ('\u{2500}', b'q', 0xC4, b'-'), // ─
    ('\u{2502}', b'x', 0xB3, b'|'), // │
    ('\u{250C}', b'l', 0xDA, b'.'), // ┌
    ('\u{2510}', b'k', 0xBF, b'.'), // ┐
    ('\u{2514}', b'm', 0xC0, b'`'), // └
    ('\u{2518}', b'j', 0xD9, b'\''), // ┘
    ('\u{251C}', b't', 0xC3, b'+'), // ├
    ('\u{2524}', b'u', 0xB4, b'+'), // ┤
    ('\u{252C}', b'w', 0xC2, b'+'), // ┬
    ('\u{2534}', b'v', 0xC1, b'+'), // ┴
    ('\u{253C}', b'n', 0xC5, b'+'), // ┼
    ('\u{2550}', 0, 0xCD, b'='),    // ═
    ('\u{2551}', 0, 0xBA, b'|'),    // ║
    ('\u{2554}', 0, 0xC9, b'+'),    // ╔
    ('\u{2557}', 0, 0xBB, b'+'),    // ╗
    ('\u{255A}', 0, 0xC8, b'+'),    // ╚
    ('\u{255D}', 0, 0xBC, b'+'),    // ╝
    ('\u{2588}', b'0', 0xDB, b'#'), // █
    ('\u{2580}', 0, 0xDF, b'^'),    // ▀
    ('\u{2584}', 0, 0xDC, b'_'),    // ▄
    ('\u{258C}', 0, 0xDD, b' '),    // ▌
    ('\u{2590}', 0, 0xDE, b' '),    // ▐
    ('\u{2591}', 0, 0xB0, b' '),    // ░
    ('\u{2592}', b'a', 0xB1, b'#'), // ▒
    ('\u{2593}', 0, 0xB2, b'#'),    // ▓
    ('\u{25C6}', b'`', 0x04, b'*'), // ◆
    ('\u{00B0}', b'f', 0xF8, b'o'), // °
    ('\u{00B1}', b'g', 0xF1, b'#'), // ±
    ('\u{00B7}', b'~', 0xFA, b'.'), // ·
    ('\u{2264}', b'y', 0xF3, b'<'), // ≤
    ('\u{2265}', b'z', 0xF2, b'>'), // ≥
    ('\u{03C0}', b'{', 0xE3, b'*'), // π
    ('\u{2260}', b'|', 0, b'!'),    // ≠
    ('\u{00A3}', b'}', 0x9C, b'L'), // £
    ('\u{2191}', 0, 0x18, b'^'),    // ↑
    ('\u{2193}', 0, 0x19, b'v'),    // ↓
    ('\u{2192}', b'+', 0x1A, b'>'), // →
    ('\u{2190}', b',', 0x1B, b'<'), // ←
    ('\u{25BA}', 0, 0x10, b'>'),    // ►
    ('\u{25C4}', 0, 0x11, b'<'),    // ◄
    ('\u{25B2}', b'-', 0x1E, b'^'), // ▲
    ('\u{25BC}', b'.', 0x1F, b'v'), // ▼
    ('\u{25CF}', b'`', 0x07, b'*'), // ●
    ('\u{2022}', b'`', 0x07, b'*'), // •
    ('\u{221A}', 0, 0xFB, b'x'),    // √
];

fn lookup(ch: char) -> Option<&'static (char, u8, u8, u8)> {
    GLYPHS.iter().find(|entry| entry.0 == ch)
}

/// Translate `ch` for the given encoding.
///
/// `pc_low_bytes` says whether the terminal renders CP437 bytes below
/// 0x20 (with the ROM font selected); otherwise those glyphs take their
/// ASCII fallback.
pub fn encode(ch: char, encoding: Encoding, pc_low_bytes: bool) -> EncodedGlyph {
    if encoding == Encoding::Utf8 {
        return EncodedGlyph::utf8(ch);
    }
    if ch.is_ascii() && !ch.is_ascii_control() {
        return EncodedGlyph::byte(Charset::Normal, ch as u8);
    }
    let Some(&(_, dec, pc, ascii)) = lookup(ch) else {
        return EncodedGlyph::byte(Charset::Normal, b'?');
    };
    match encoding {
        Encoding::Vt100 if dec != 0 => EncodedGlyph::byte(Charset::Alternate, dec),
        Encoding::Pc if pc != 0 && (pc >= 0x20 || (pc_low_bytes && pc_displays_control(pc))) => {
            EncodedGlyph::byte(Charset::Pc, pc)
        }
        _ => EncodedGlyph::byte(Charset::Normal, ascii),
    }
}

/// Whether a C0 byte is drawn as a glyph while the PC font is selected.
///
/// NUL, BS, LF, FF, CR, SO, SI and ESC keep their control meaning.
#[inline]
pub const fn pc_displays_control(b: u8) -> bool {
    !matches!(b, 0x00 | 0x08 | 0x0A | 0x0C | 0x0D | 0x0E | 0x0F | 0x1B)
}

/// Unicode glyph for a DEC special graphics byte, used when reading the
/// output stream back.
pub fn decode_dec_graphics(b: u8) -> Option<char> {
    GLYPHS.iter().find(|entry| entry.1 == b).map(|entry| entry.0)
}

/// Unicode glyph for a CP437 byte drawn with the PC font selected.
pub fn decode_pc(b: u8) -> Option<char> {
    GLYPHS.iter().find(|entry| entry.2 == b && b != 0).map(|entry| entry.0)
}

/// Glyph substitution for terminals drawing with the "new font".
///
/// The lower half block is drawn as an upper half block with reversed
/// colors. Returns the glyph to draw and whether fg/bg must be swapped.
#[inline]
pub const fn new_font_glyph(ch: char) -> (char, bool) {
    match ch {
        '\u{2584}' => ('\u{2580}', true),
        _ => (ch, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passthrough() {
        let g = encode('\u{2500}', Encoding::Utf8, false);
        assert_eq!(g.as_bytes(), "\u{2500}".as_bytes());
        assert_eq!(g.charset, Charset::Normal);
    }

    #[test]
    fn vt100_uses_dec_graphics() {
        let g = encode('\u{250C}', Encoding::Vt100, false);
        assert_eq!(g.charset, Charset::Alternate);
        assert_eq!(g.as_bytes(), b"l");
        // Double lines have no DEC slot.
        let g = encode('\u{2550}', Encoding::Vt100, false);
        assert_eq!((g.charset, g.as_bytes()), (Charset::Normal, &b"="[..]));
    }

    #[test]
    fn pc_uses_cp437() {
        let g = encode('\u{2554}', Encoding::Pc, false);
        assert_eq!((g.charset, g.as_bytes()), (Charset::Pc, &[0xC9u8][..]));
    }

    #[test]
    fn pc_low_bytes_need_rom_font() {
        let g = encode('\u{2191}', Encoding::Pc, false);
        assert_eq!((g.charset, g.as_bytes()), (Charset::Normal, &b"^"[..]));
        let g = encode('\u{2191}', Encoding::Pc, true);
        assert_eq!((g.charset, g.as_bytes()), (Charset::Pc, &[0x18u8][..]));
        // 0x1B would start an escape sequence.
        let g = encode('\u{2190}', Encoding::Pc, true);
        assert_eq!((g.charset, g.as_bytes()), (Charset::Normal, &b"<"[..]));
    }

    #[test]
    fn ascii_fallbacks() {
        assert_eq!(encode('\u{2502}', Encoding::Ascii, true).as_bytes(), b"|");
        assert_eq!(encode('a', Encoding::Ascii, false).as_bytes(), b"a");
        assert_eq!(encode('\u{4E2D}', Encoding::Ascii, false).as_bytes(), b"?");
        assert_eq!(encode('\u{4E2D}', Encoding::Vt100, false).as_bytes(), b"?");
    }

    #[test]
    fn decode_round_trip() {
        assert_eq!(decode_dec_graphics(b'q'), Some('\u{2500}'));
        assert_eq!(decode_pc(0xC4), Some('\u{2500}'));
        assert_eq!(decode_pc(0), None);
    }

    #[test]
    fn new_font_swaps_lower_half() {
        assert_eq!(new_font_glyph('\u{2584}'), ('\u{2580}', true));
        assert_eq!(new_font_glyph('x'), ('x', false));
    }

    #[test]
    fn detect_from_capabilities() {
        assert_eq!(
            Encoding::detect(&TerminalCapabilities::xterm_256color()),
            Encoding::Utf8
        );
        assert_eq!(
            Encoding::detect(&TerminalCapabilities::vt100()),
            Encoding::Vt100
        );
        assert_eq!(
            Encoding::detect(&TerminalCapabilities::dumb()),
            Encoding::Ascii
        );
    }
}
