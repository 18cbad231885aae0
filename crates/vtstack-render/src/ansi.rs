#![forbid(unsafe_code)]

//! ANSI escape sequence generation helpers.
//!
//! Pure byte-generation functions for the VT control sequences the sync
//! engine emits, plus byte-length helpers used by its cost model. No
//! state is tracked here.
//!
//! # Sequence Reference
//!
//! | Category | Sequence | Description |
//! |----------|----------|-------------|
//! | CSI | `ESC [ n ; ... m` | SGR (Select Graphic Rendition) |
//! | CSI | `ESC [ row ; col H` | CUP (Cursor Position, 1-indexed) |
//! | CSI | `ESC [ col G` | CHA (Cursor Horizontal Absolute) |
//! | CSI | `ESC [ n A/B/C/D` | CUU/CUD/CUF/CUB (relative moves) |
//! | CSI | `ESC [ n K` | EL (Erase Line) |
//! | CSI | `ESC [ n X` | ECH (Erase Characters) |
//! | CSI | `ESC [ n b` | REP (Repeat preceding character) |
//! | CSI | `ESC [ n @` | ICH (Insert Characters) |
//! | CSI | `ESC [ ? 7 h/l` | DECAWM (auto right margin) |
//! | CSI | `ESC [ ? 25 h/l` | DECTCEM (cursor visibility) |
//! | CSI | `ESC [ ? 2026 h/l` | Synchronized Output (DEC) |
//! | ESC | `ESC ( 0` / `ESC ( B` | G0 = DEC special graphics / ASCII |

use std::io::{self, Write};

// =============================================================================
// SGR (Select Graphic Rendition)
// =============================================================================

/// SGR reset: `CSI 0 m`
pub const SGR_RESET: &[u8] = b"\x1b[0m";

/// SGR code pair for a single attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SgrCodes {
    pub on: u8,
    pub off: u8,
}

pub const SGR_BOLD: SgrCodes = SgrCodes { on: 1, off: 22 };
pub const SGR_DIM: SgrCodes = SgrCodes { on: 2, off: 22 };
pub const SGR_ITALIC: SgrCodes = SgrCodes { on: 3, off: 23 };
pub const SGR_UNDERLINE: SgrCodes = SgrCodes { on: 4, off: 24 };
pub const SGR_DOUBLE_UNDERLINE: SgrCodes = SgrCodes { on: 21, off: 24 };
pub const SGR_BLINK: SgrCodes = SgrCodes { on: 5, off: 25 };
pub const SGR_REVERSE: SgrCodes = SgrCodes { on: 7, off: 27 };
pub const SGR_HIDDEN: SgrCodes = SgrCodes { on: 8, off: 28 };
pub const SGR_STRIKETHROUGH: SgrCodes = SgrCodes { on: 9, off: 29 };
/// PC ROM font (CP437 glyphs for bytes below 0x20).
pub const SGR_PC_CHARSET: SgrCodes = SgrCodes { on: 11, off: 10 };

/// Write one combined SGR sequence from numeric parameters.
///
/// An empty parameter list writes nothing.
pub fn sgr<W: Write>(w: &mut W, params: &[u16]) -> io::Result<()> {
    if params.is_empty() {
        return Ok(());
    }
    w.write_all(b"\x1b[")?;
    for (i, p) in params.iter().enumerate() {
        if i > 0 {
            w.write_all(b";")?;
        }
        write!(w, "{p}")?;
    }
    w.write_all(b"m")
}

/// Byte length of [`sgr`] for the given parameters.
pub fn sgr_len(params: &[u16]) -> usize {
    if params.is_empty() {
        return 0;
    }
    3 + params.iter().map(|p| digits(*p)).sum::<usize>() + params.len() - 1
}

/// Write SGR reset sequence.
#[inline]
pub fn sgr_reset<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SGR_RESET)
}

// =============================================================================
// Cursor Positioning
// =============================================================================

/// CUP (Cursor Position): `CSI row ; col H`
///
/// Row and col are 0-indexed input, converted to 1-indexed for ANSI.
pub fn cup<W: Write>(w: &mut W, row: u16, col: u16) -> io::Result<()> {
    write!(
        w,
        "\x1b[{};{}H",
        row.saturating_add(1),
        col.saturating_add(1)
    )
}

/// Byte length of [`cup`].
#[inline]
pub fn cup_len(row: u16, col: u16) -> usize {
    4 + digits(row.saturating_add(1)) + digits(col.saturating_add(1))
}

/// CHA (Cursor Horizontal Absolute): `CSI col G` (1-indexed)
pub fn cha<W: Write>(w: &mut W, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{}G", col.saturating_add(1))
}

/// Byte length of [`cha`].
#[inline]
pub fn cha_len(col: u16) -> usize {
    3 + digits(col.saturating_add(1))
}

fn relative<W: Write>(w: &mut W, n: u16, op: u8) -> io::Result<()> {
    match n {
        0 => Ok(()),
        1 => w.write_all(&[0x1b, b'[', op]),
        _ => write!(w, "\x1b[{n}{}", op as char),
    }
}

/// Byte length of a relative cursor move by `n`.
#[inline]
pub fn relative_len(n: u16) -> usize {
    match n {
        0 => 0,
        1 => 3,
        _ => 3 + digits(n),
    }
}

/// Move cursor up: `CSI n A`
#[inline]
pub fn cuu<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    relative(w, n, b'A')
}

/// Move cursor down: `CSI n B`
#[inline]
pub fn cud<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    relative(w, n, b'B')
}

/// Move cursor forward (right): `CSI n C`
#[inline]
pub fn cuf<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    relative(w, n, b'C')
}

/// Move cursor back (left): `CSI n D`
#[inline]
pub fn cub<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    relative(w, n, b'D')
}

/// Move cursor to start of line: `\r` (CR)
#[inline]
pub fn cr<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(b"\r")
}

/// Hide cursor: `CSI ? 25 l`
pub const CURSOR_HIDE: &[u8] = b"\x1b[?25l";

/// Show cursor: `CSI ? 25 h`
pub const CURSOR_SHOW: &[u8] = b"\x1b[?25h";

#[inline]
pub fn cursor_hide<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(CURSOR_HIDE)
}

#[inline]
pub fn cursor_show<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(CURSOR_SHOW)
}

// =============================================================================
// Erase / Repeat / Insert
// =============================================================================

/// EL (Erase Line) mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseLineMode {
    /// Erase from cursor to end of line.
    ToEnd = 0,
    /// Erase from start of line to cursor.
    ToStart = 1,
    /// Erase entire line.
    All = 2,
}

/// EL (Erase Line): `CSI n K`
pub fn erase_line<W: Write>(w: &mut W, mode: EraseLineMode) -> io::Result<()> {
    match mode {
        EraseLineMode::ToEnd => w.write_all(b"\x1b[K"),
        EraseLineMode::ToStart => w.write_all(b"\x1b[1K"),
        EraseLineMode::All => w.write_all(b"\x1b[2K"),
    }
}

/// Byte length of [`erase_line`].
#[inline]
pub const fn erase_line_len(mode: EraseLineMode) -> usize {
    match mode {
        EraseLineMode::ToEnd => 3,
        EraseLineMode::ToStart | EraseLineMode::All => 4,
    }
}

/// ECH (Erase Characters): `CSI n X`
///
/// Blanks `n` cells from the cursor without moving it.
pub fn ech<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}X")
}

#[inline]
pub fn ech_len(n: u16) -> usize {
    3 + digits(n)
}

/// REP (Repeat): `CSI n b`
///
/// Repeats the preceding graphic character `n` more times.
pub fn rep<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}b")
}

#[inline]
pub fn rep_len(n: u16) -> usize {
    3 + digits(n)
}

/// ICH (Insert Characters): `CSI n @`
pub fn ich<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    match n {
        0 => Ok(()),
        1 => w.write_all(b"\x1b[@"),
        _ => write!(w, "\x1b[{n}@"),
    }
}

// =============================================================================
// Modes
// =============================================================================

/// Enable auto right margin: `CSI ? 7 h`
pub const DECAWM_ON: &[u8] = b"\x1b[?7h";

/// Disable auto right margin: `CSI ? 7 l`
pub const DECAWM_OFF: &[u8] = b"\x1b[?7l";

/// Begin synchronized update: `CSI ? 2026 h`
pub const SYNC_BEGIN: &[u8] = b"\x1b[?2026h";

/// End synchronized update: `CSI ? 2026 l`
pub const SYNC_END: &[u8] = b"\x1b[?2026l";

#[inline]
pub fn sync_begin<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SYNC_BEGIN)
}

#[inline]
pub fn sync_end<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SYNC_END)
}

// =============================================================================
// Character sets
// =============================================================================

/// Designate DEC special graphics into G0: `ESC ( 0`
pub const ACS_ON: &[u8] = b"\x1b(0";

/// Designate US-ASCII into G0: `ESC ( B`
pub const ACS_OFF: &[u8] = b"\x1b(B";

/// Audible bell.
pub const BELL: &[u8] = b"\x07";

/// Decimal digit count of `n`.
#[inline]
pub const fn digits(n: u16) -> usize {
    match n {
        0..=9 => 1,
        10..=99 => 2,
        100..=999 => 3,
        1000..=9999 => 4,
        _ => 5,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> Vec<u8> {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        buf
    }

    #[test]
    fn sgr_combined() {
        assert_eq!(to_bytes(|w| sgr(w, &[1, 38, 5, 200])), b"\x1b[1;38;5;200m");
        assert_eq!(sgr_len(&[1, 38, 5, 200]), b"\x1b[1;38;5;200m".len());
        assert_eq!(to_bytes(|w| sgr(w, &[])), b"");
        assert_eq!(sgr_len(&[]), 0);
    }

    #[test]
    fn sgr_reset_bytes() {
        assert_eq!(to_bytes(sgr_reset), b"\x1b[0m");
        assert_eq!(sgr_len(&[0]), SGR_RESET.len());
    }

    #[test]
    fn cup_is_one_indexed() {
        assert_eq!(to_bytes(|w| cup(w, 0, 0)), b"\x1b[1;1H");
        assert_eq!(to_bytes(|w| cup(w, 23, 79)), b"\x1b[24;80H");
        assert_eq!(cup_len(23, 79), 8);
        assert_eq!(cup_len(0, 0), 6);
    }

    #[test]
    fn cha_bytes() {
        assert_eq!(to_bytes(|w| cha(w, 9)), b"\x1b[10G");
        assert_eq!(cha_len(9), 5);
    }

    #[test]
    fn relative_moves_short_forms() {
        assert_eq!(to_bytes(|w| cuf(w, 1)), b"\x1b[C");
        assert_eq!(to_bytes(|w| cub(w, 12)), b"\x1b[12D");
        assert_eq!(to_bytes(|w| cuu(w, 0)), b"");
        assert_eq!(to_bytes(|w| cud(w, 3)), b"\x1b[3B");
        assert_eq!(relative_len(1), 3);
        assert_eq!(relative_len(12), 5);
        assert_eq!(relative_len(0), 0);
    }

    #[test]
    fn erase_and_repeat() {
        assert_eq!(to_bytes(|w| erase_line(w, EraseLineMode::ToEnd)), b"\x1b[K");
        assert_eq!(to_bytes(|w| erase_line(w, EraseLineMode::ToStart)), b"\x1b[1K");
        assert_eq!(erase_line_len(EraseLineMode::ToStart), 4);
        assert_eq!(to_bytes(|w| ech(w, 15)), b"\x1b[15X");
        assert_eq!(ech_len(15), 5);
        assert_eq!(to_bytes(|w| rep(w, 7)), b"\x1b[7b");
        assert_eq!(rep_len(7), 4);
        assert_eq!(to_bytes(|w| ich(w, 1)), b"\x1b[@");
    }

    #[test]
    fn digit_counts() {
        assert_eq!(digits(0), 1);
        assert_eq!(digits(80), 2);
        assert_eq!(digits(999), 3);
        assert_eq!(digits(u16::MAX), 5);
    }
}
