#![forbid(unsafe_code)]

//! Terminal model for sync-engine validation.
//!
//! A minimal terminal emulator that understands the subset of sequences
//! the sync engine emits, so flush output can be replayed and checked
//! deterministically without real terminal I/O.
//!
//! # Scope
//!
//! This is NOT a full VT emulator. It supports only:
//! - Cursor positioning (CUP, CHA, relative moves, CR, LF, BS)
//! - SGR with 8/16/256 palette colors and the PC font switch (10/11)
//! - Erase operations (EL 0/1/2, ECH) and REP, ICH
//! - DECAWM (`?7`), DECTCEM (`?25`) and DEC 2026 synchronized output
//! - G0 designation (`ESC ( 0` / `ESC ( B`)
//! - Auto-wrap with optional pending-wrap ("newline glitch") semantics and
//!   scrolling when the cursor leaves the bottom row
//!
//! # Usage
//!
//! ```ignore
//! let mut model = TerminalModel::new(80, 24);
//! model.process(b"\x1b[1;1H");
//! model.process(b"\x1b[1mHello\x1b[0m");
//! assert_eq!(model.cursor(), (5, 0));
//! assert_eq!(model.cell(0, 0).unwrap().ch, 'H');
//! ```

use unicode_width::UnicodeWidthChar;

use crate::cell::{Cell, Color, StyleFlags};
use crate::charset::{decode_dec_graphics, decode_pc, pc_displays_control};

/// Style bits a terminal can show, as the model stores them.
const MODEL_STYLE: StyleFlags = StyleFlags::BOLD
    .union(StyleFlags::DIM)
    .union(StyleFlags::ITALIC)
    .union(StyleFlags::UNDERLINE)
    .union(StyleFlags::DOUBLE_UNDERLINE)
    .union(StyleFlags::BLINK)
    .union(StyleFlags::REVERSE)
    .union(StyleFlags::INVISIBLE)
    .union(StyleFlags::CROSSED_OUT);

/// A single cell in the terminal model grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCell {
    pub ch: char,
    pub fg: Color,
    pub bg: Color,
    pub style: StyleFlags,
}

impl Default for ModelCell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Default,
            bg: Color::Default,
            style: StyleFlags::empty(),
        }
    }
}

impl ModelCell {
    pub fn with_char(ch: char) -> Self {
        Self {
            ch,
            ..Default::default()
        }
    }

    /// How a buffer cell is expected to look once drawn.
    ///
    /// Standout renders as reverse video; protection and charset bits
    /// have no visual counterpart.
    pub fn expected(cell: &Cell) -> Self {
        let mut style = cell.style;
        if style.contains(StyleFlags::STANDOUT) {
            style.insert(StyleFlags::REVERSE);
        }
        Self {
            ch: cell.ch,
            fg: cell.fg,
            bg: cell.bg,
            style: style & MODEL_STYLE,
        }
    }
}

/// Current SGR state for the terminal model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SgrState {
    pub fg: Color,
    pub bg: Color,
    pub flags: StyleFlags,
    /// PC ROM font selected (SGR 11).
    pub pc_font: bool,
}

impl SgrState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Mode flags tracked by the terminal model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeFlags {
    pub cursor_visible: bool,
    /// DECAWM.
    pub auto_wrap: bool,
    /// G0 holds the DEC special graphics set.
    pub dec_graphics: bool,
    /// DEC 2026 synchronized output nesting level.
    pub sync_output_level: u32,
}

impl ModeFlags {
    pub fn new() -> Self {
        Self {
            cursor_visible: true,
            auto_wrap: true,
            dec_graphics: false,
            sync_output_level: 0,
        }
    }
}

impl Default for ModeFlags {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseState {
    Ground,
    Escape,
    /// `ESC (` waiting for the charset designator.
    Designate,
    CsiEntry,
    CsiParam,
}

/// A minimal terminal model for testing sync-engine output.
#[derive(Debug)]
pub struct TerminalModel {
    width: usize,
    height: usize,
    cells: Vec<ModelCell>,
    cursor_x: usize,
    cursor_y: usize,
    /// Cursor sits past the last column waiting for the next glyph.
    wrap_pending: bool,
    newline_glitch: bool,
    sgr: SgrState,
    modes: ModeFlags,
    last_char: Option<char>,
    scroll_count: usize,
    bell_count: usize,
    parse_state: ParseState,
    csi_params: Vec<u32>,
    csi_intermediate: Vec<u8>,
    utf8_buf: Vec<u8>,
    utf8_need: usize,
    bytes_processed: usize,
}

impl TerminalModel {
    /// Create a model with xterm-like wrapping (pending wrap at the margin).
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![ModelCell::default(); width * height],
            cursor_x: 0,
            cursor_y: 0,
            wrap_pending: false,
            newline_glitch: true,
            sgr: SgrState::default(),
            modes: ModeFlags::new(),
            last_char: None,
            scroll_count: 0,
            bell_count: 0,
            parse_state: ParseState::Ground,
            csi_params: Vec::with_capacity(16),
            csi_intermediate: Vec::with_capacity(4),
            utf8_buf: Vec::with_capacity(4),
            utf8_need: 0,
            bytes_processed: 0,
        }
    }

    /// Choose between pending wrap (`true`) and immediate wrap at the
    /// right margin.
    #[must_use]
    pub fn with_newline_glitch(mut self, on: bool) -> Self {
        self.newline_glitch = on;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Cursor position as (x, y).
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_x, self.cursor_y)
    }

    pub fn sgr_state(&self) -> &SgrState {
        &self.sgr
    }

    pub fn modes(&self) -> &ModeFlags {
        &self.modes
    }

    /// Times the screen scrolled up.
    pub fn scroll_count(&self) -> usize {
        self.scroll_count
    }

    /// BEL bytes seen in the ground state.
    pub fn bell_count(&self) -> usize {
        self.bell_count
    }

    pub fn bytes_processed(&self) -> usize {
        self.bytes_processed
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<&ModelCell> {
        if x < self.width && y < self.height {
            Some(&self.cells[y * self.width + x])
        } else {
            None
        }
    }

    fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut ModelCell> {
        if x < self.width && y < self.height {
            Some(&mut self.cells[y * self.width + x])
        } else {
            None
        }
    }

    pub fn cells(&self) -> &[ModelCell] {
        &self.cells
    }

    pub fn row(&self, y: usize) -> Option<&[ModelCell]> {
        if y < self.height {
            let start = y * self.width;
            Some(&self.cells[start..start + self.width])
        } else {
            None
        }
    }

    /// Text content of a row with trailing spaces trimmed.
    pub fn row_text(&self, y: usize) -> Option<String> {
        self.row(y).map(|cells| {
            let s: String = cells.iter().map(|c| c.ch).collect();
            s.trim_end().to_string()
        })
    }

    pub fn sync_output_balanced(&self) -> bool {
        self.modes.sync_output_level == 0
    }

    /// Process a byte sequence, updating the terminal state.
    pub fn process(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.process_byte(b);
            self.bytes_processed += 1;
        }
    }

    fn process_byte(&mut self, b: u8) {
        match self.parse_state {
            ParseState::Ground => self.ground_state(b),
            ParseState::Escape => self.escape_state(b),
            ParseState::Designate => {
                self.modes.dec_graphics = b == b'0';
                self.parse_state = ParseState::Ground;
            }
            ParseState::CsiEntry => self.csi_entry_state(b),
            ParseState::CsiParam => self.csi_param_state(b),
        }
    }

    fn ground_state(&mut self, b: u8) {
        if self.utf8_need > 0 {
            if b & 0xC0 == 0x80 {
                self.utf8_buf.push(b);
                if self.utf8_buf.len() == self.utf8_need {
                    let ch = std::str::from_utf8(&self.utf8_buf)
                        .ok()
                        .and_then(|s| s.chars().next())
                        .unwrap_or('\u{FFFD}');
                    self.utf8_buf.clear();
                    self.utf8_need = 0;
                    self.put_char(ch);
                }
                return;
            }
            self.utf8_buf.clear();
            self.utf8_need = 0;
            self.put_char('\u{FFFD}');
        }
        match b {
            0x1B => self.parse_state = ParseState::Escape,
            0x00..=0x1F if self.sgr.pc_font && pc_displays_control(b) => {
                let ch = decode_pc(b).unwrap_or('?');
                self.put_char(ch);
            }
            0x00..=0x1F | 0x7F => self.handle_c0(b),
            0x20..=0x7E => {
                let ch = if self.modes.dec_graphics {
                    decode_dec_graphics(b).unwrap_or(b as char)
                } else {
                    b as char
                };
                self.put_char(ch);
            }
            _ if self.sgr.pc_font => {
                let ch = decode_pc(b).unwrap_or('?');
                self.put_char(ch);
            }
            0xC0..=0xDF => self.begin_utf8(b, 2),
            0xE0..=0xEF => self.begin_utf8(b, 3),
            0xF0..=0xF7 => self.begin_utf8(b, 4),
            _ => self.put_char('\u{FFFD}'),
        }
    }

    fn begin_utf8(&mut self, b: u8, need: usize) {
        self.utf8_buf.push(b);
        self.utf8_need = need;
    }

    fn escape_state(&mut self, b: u8) {
        match b {
            b'[' => {
                self.csi_params.clear();
                self.csi_intermediate.clear();
                self.parse_state = ParseState::CsiEntry;
            }
            b'(' => self.parse_state = ParseState::Designate,
            0x1B => {}
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn csi_entry_state(&mut self, b: u8) {
        match b {
            b'0'..=b'9' => {
                self.csi_params.push(u32::from(b - b'0'));
                self.parse_state = ParseState::CsiParam;
            }
            b';' => {
                self.csi_params.push(0);
                self.parse_state = ParseState::CsiParam;
            }
            b'?' | b'>' | b'!' => {
                self.csi_intermediate.push(b);
                self.parse_state = ParseState::CsiParam;
            }
            0x40..=0x7E => {
                self.execute_csi(b);
                self.parse_state = ParseState::Ground;
            }
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn csi_param_state(&mut self, b: u8) {
        match b {
            b'0'..=b'9' => {
                if self.csi_params.is_empty() {
                    self.csi_params.push(0);
                }
                if let Some(last) = self.csi_params.last_mut() {
                    *last = last.saturating_mul(10).saturating_add(u32::from(b - b'0'));
                }
            }
            b';' | b':' => self.csi_params.push(0),
            0x20..=0x2F => self.csi_intermediate.push(b),
            0x40..=0x7E => {
                self.execute_csi(b);
                self.parse_state = ParseState::Ground;
            }
            _ => self.parse_state = ParseState::Ground,
        }
    }

    fn handle_c0(&mut self, b: u8) {
        match b {
            0x07 => self.bell_count += 1,
            0x08 => {
                self.wrap_pending = false;
                self.cursor_x = self.cursor_x.saturating_sub(1);
            }
            0x09 => {
                self.wrap_pending = false;
                self.cursor_x = ((self.cursor_x / 8 + 1) * 8).min(self.width.saturating_sub(1));
            }
            0x0A => {
                self.wrap_pending = false;
                self.line_feed();
            }
            0x0D => {
                self.wrap_pending = false;
                self.cursor_x = 0;
            }
            _ => {}
        }
    }

    fn line_feed(&mut self) {
        if self.cursor_y + 1 < self.height {
            self.cursor_y += 1;
        } else {
            self.scroll_up();
        }
    }

    fn scroll_up(&mut self) {
        if self.height == 0 {
            return;
        }
        self.cells.drain(..self.width);
        self.cells
            .extend(std::iter::repeat_n(ModelCell::default(), self.width));
        self.scroll_count += 1;
    }

    fn put_char(&mut self, ch: char) {
        if self.width == 0 || self.height == 0 {
            return;
        }
        if self.wrap_pending {
            self.wrap_pending = false;
            self.cursor_x = 0;
            self.line_feed();
        }
        let width = UnicodeWidthChar::width(ch).unwrap_or(0).max(1);
        let sgr = self.sgr;
        if let Some(cell) = self.cell_mut(self.cursor_x, self.cursor_y) {
            *cell = ModelCell {
                ch,
                fg: sgr.fg,
                bg: sgr.bg,
                style: sgr.flags,
            };
        }
        if width == 2
            && let Some(next) = self.cell_mut(self.cursor_x + 1, self.cursor_y)
        {
            *next = ModelCell {
                ch: ' ',
                fg: sgr.fg,
                bg: sgr.bg,
                style: StyleFlags::empty(),
            };
        }
        self.last_char = Some(ch);

        let next_x = self.cursor_x + width;
        if next_x < self.width {
            self.cursor_x = next_x;
        } else if !self.modes.auto_wrap {
            self.cursor_x = self.width - 1;
        } else if self.newline_glitch {
            self.cursor_x = self.width - 1;
            self.wrap_pending = true;
        } else {
            self.cursor_x = 0;
            self.line_feed();
        }
    }

    fn param(&self, i: usize, default: u32) -> u32 {
        match self.csi_params.get(i).copied() {
            Some(0) | None => default,
            Some(v) => v,
        }
    }

    fn execute_csi(&mut self, final_byte: u8) {
        let has_question = self.csi_intermediate.contains(&b'?');
        if final_byte != b'm' && final_byte != b'b' && final_byte != b'X' && final_byte != b'K' {
            self.wrap_pending = false;
        }
        match final_byte {
            b'H' | b'f' => self.csi_cup(),
            b'A' => {
                let n = self.param(0, 1) as usize;
                self.cursor_y = self.cursor_y.saturating_sub(n);
            }
            b'B' => {
                let n = self.param(0, 1) as usize;
                self.cursor_y = (self.cursor_y + n).min(self.height.saturating_sub(1));
            }
            b'C' => {
                let n = self.param(0, 1) as usize;
                self.cursor_x = (self.cursor_x + n).min(self.width.saturating_sub(1));
            }
            b'D' => {
                let n = self.param(0, 1) as usize;
                self.cursor_x = self.cursor_x.saturating_sub(n);
            }
            b'G' => {
                let col = self.param(0, 1) as usize;
                self.cursor_x = (col - 1).min(self.width.saturating_sub(1));
            }
            b'K' => self.csi_el(),
            b'X' => self.csi_ech(),
            b'b' => self.csi_rep(),
            b'@' => self.csi_ich(),
            b'm' => self.csi_sgr(),
            b'h' if has_question => self.set_private_modes(true),
            b'l' if has_question => self.set_private_modes(false),
            _ => {}
        }
    }

    fn csi_cup(&mut self) {
        let row = self.param(0, 1) as usize;
        let col = self.param(1, 1) as usize;
        self.cursor_y = (row - 1).min(self.height.saturating_sub(1));
        self.cursor_x = (col - 1).min(self.width.saturating_sub(1));
    }

    fn csi_el(&mut self) {
        let mode = self.csi_params.first().copied().unwrap_or(0);
        let y = self.cursor_y;
        let range = match mode {
            0 => self.cursor_x..self.width,
            1 => 0..(self.cursor_x + 1).min(self.width),
            2 => 0..self.width,
            _ => return,
        };
        for x in range {
            self.erase_cell(x, y);
        }
    }

    fn csi_ech(&mut self) {
        let n = self.param(0, 1) as usize;
        let y = self.cursor_y;
        let end = (self.cursor_x + n).min(self.width);
        for x in self.cursor_x..end {
            self.erase_cell(x, y);
        }
    }

    fn csi_rep(&mut self) {
        let n = self.param(0, 1);
        if let Some(ch) = self.last_char {
            for _ in 0..n {
                self.put_char(ch);
            }
        }
    }

    fn csi_ich(&mut self) {
        let n = self.param(0, 1) as usize;
        let y = self.cursor_y;
        let x = self.cursor_x;
        if y >= self.height || x >= self.width {
            return;
        }
        let start = y * self.width + x;
        let end = (y + 1) * self.width;
        let n = n.min(end - start);
        self.cells[start..end].rotate_right(n);
        let bg = self.sgr.bg;
        for cell in &mut self.cells[start..start + n] {
            *cell = ModelCell {
                bg,
                ..ModelCell::default()
            };
        }
    }

    /// Erase with the current background (background color erase).
    fn erase_cell(&mut self, x: usize, y: usize) {
        let bg = self.sgr.bg;
        if let Some(cell) = self.cell_mut(x, y) {
            *cell = ModelCell {
                bg,
                ..ModelCell::default()
            };
        }
    }

    fn csi_sgr(&mut self) {
        if self.csi_params.is_empty() {
            self.sgr.reset();
            return;
        }
        let mut i = 0;
        while i < self.csi_params.len() {
            let code = self.csi_params[i];
            let flags = &mut self.sgr.flags;
            match code {
                0 => self.sgr.reset(),
                1 => flags.insert(StyleFlags::BOLD),
                2 => flags.insert(StyleFlags::DIM),
                3 => flags.insert(StyleFlags::ITALIC),
                4 => flags.insert(StyleFlags::UNDERLINE),
                5 => flags.insert(StyleFlags::BLINK),
                7 => flags.insert(StyleFlags::REVERSE),
                8 => flags.insert(StyleFlags::INVISIBLE),
                9 => flags.insert(StyleFlags::CROSSED_OUT),
                10 => self.sgr.pc_font = false,
                11 => self.sgr.pc_font = true,
                21 => flags.insert(StyleFlags::DOUBLE_UNDERLINE),
                22 => flags.remove(StyleFlags::BOLD | StyleFlags::DIM),
                23 => flags.remove(StyleFlags::ITALIC),
                24 => flags.remove(StyleFlags::UNDERLINE | StyleFlags::DOUBLE_UNDERLINE),
                25 => flags.remove(StyleFlags::BLINK),
                27 => flags.remove(StyleFlags::REVERSE),
                28 => flags.remove(StyleFlags::INVISIBLE),
                29 => flags.remove(StyleFlags::CROSSED_OUT),
                30..=37 => self.sgr.fg = Color::Indexed((code - 30) as u8),
                39 => self.sgr.fg = Color::Default,
                40..=47 => self.sgr.bg = Color::Indexed((code - 40) as u8),
                49 => self.sgr.bg = Color::Default,
                90..=97 => self.sgr.fg = Color::Indexed((code - 90 + 8) as u8),
                100..=107 => self.sgr.bg = Color::Indexed((code - 100 + 8) as u8),
                38 | 48 => {
                    if self.csi_params.get(i + 1) == Some(&5)
                        && let Some(&idx) = self.csi_params.get(i + 2)
                    {
                        let color = Color::Indexed(idx.min(255) as u8);
                        if code == 38 {
                            self.sgr.fg = color;
                        } else {
                            self.sgr.bg = color;
                        }
                        i += 2;
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }

    fn set_private_modes(&mut self, on: bool) {
        for &code in &self.csi_params {
            match code {
                7 => {
                    self.modes.auto_wrap = on;
                    if !on {
                        self.wrap_pending = false;
                    }
                }
                25 => self.modes.cursor_visible = on,
                2026 if on => self.modes.sync_output_level += 1,
                2026 => {
                    self.modes.sync_output_level = self.modes.sync_output_level.saturating_sub(1);
                }
                _ => {}
            }
        }
    }

    /// Compare the grid against expected cells; `None` if identical.
    pub fn diff_grid(&self, expected: &[ModelCell]) -> Option<String> {
        if self.cells.len() != expected.len() {
            return Some(format!(
                "Grid size mismatch: got {} cells, expected {}",
                self.cells.len(),
                expected.len()
            ));
        }
        let diffs: Vec<String> = self
            .cells
            .iter()
            .zip(expected)
            .enumerate()
            .filter(|(_, (actual, exp))| actual != exp)
            .map(|(i, (actual, exp))| {
                format!(
                    "  ({}, {}): got {:?}, expected {:?}",
                    i % self.width,
                    i / self.width,
                    actual,
                    exp
                )
            })
            .collect();
        if diffs.is_empty() {
            None
        } else {
            Some(format!("Grid differences:\n{}", diffs.join("\n")))
        }
    }

    /// Render escape sequences readably (for test failure messages).
    pub fn dump_sequences(bytes: &[u8]) -> String {
        let mut output = String::new();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                0x1B if bytes.get(i + 1) == Some(&b'[') => {
                    output.push_str("\\e[");
                    i += 2;
                    while i < bytes.len() && !(0x40..=0x7E).contains(&bytes[i]) {
                        output.push(bytes[i] as char);
                        i += 1;
                    }
                    if i < bytes.len() {
                        output.push(bytes[i] as char);
                        i += 1;
                    }
                }
                0x1B => {
                    output.push_str("\\e");
                    if let Some(&next) = bytes.get(i + 1) {
                        output.push(next as char);
                    }
                    i += 2;
                }
                b if b < 0x20 || b >= 0x7F => {
                    output.push_str(&format!("\\x{b:02x}"));
                    i += 1;
                }
                b => {
                    output.push(b as char);
                    i += 1;
                }
            }
        }
        output
    }
}
