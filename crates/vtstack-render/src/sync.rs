#![forbid(unsafe_code)]

//! Terminal sync engine: damaged virtual-terminal lines to escape codes.
//!
//! The engine mirrors the virtual terminal onto the physical one. It
//! keeps a shadow of what the terminal currently has selected (cursor
//! position, attributes, charset, cursor visibility) and emits only
//! what is needed to move from that state to the next cell.
//!
//! # Per-line strategy
//!
//! For every damaged line, in order of preference:
//!
//! 1. A uniform blank suffix starting at the first damaged column is
//!    cleared with `EL 0`.
//! 2. Uniform blank runs at the line start or end shrink the working
//!    range and are cleared with `EL 1` / `EL 0`.
//! 3. Inside the remaining range, runs already shown on screen are
//!    skipped with a cursor move, blank runs become `ECH`, runs of one
//!    ASCII character become the character plus `REP`, and everything
//!    else is written cell by cell with minimal SGR changes.
//!
//! Every rule is gated on its capability; without any of them the
//! engine still draws correctly, one cell at a time.
//!
//! # Bottom-right corner
//!
//! Writing the last cell of the screen on an auto-margin terminal would
//! scroll. The engine writes it with auto-margin disabled when the
//! terminal can toggle it, otherwise it writes the glyph one column
//! early and shifts it into place with `ICH`, and as a last resort it
//! leaves the cell alone.
//!
//! # Usage
//!
//! ```
//! use vtstack_core::geometry::{Point, Size};
//! use vtstack_core::terminal_capabilities::TerminalCapabilities;
//! use vtstack_render::area::Area;
//! use vtstack_render::cell::{Cell, GraphicsContext};
//! use vtstack_render::cursor::CursorRequest;
//! use vtstack_render::sync::TerminalSync;
//!
//! let mut vterm = Area::new(Point::ORIGIN, Size::new(20, 2), Size::ZERO).unwrap();
//! vterm.print("hello", &GraphicsContext::default());
//!
//! let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
//! let stats = sync.flush(&mut vterm, CursorRequest::Hidden, false).unwrap();
//! assert!(stats.bytes_emitted > 0);
//!
//! // Nothing changed, nothing to send.
//! let stats = sync.flush(&mut vterm, CursorRequest::Hidden, false).unwrap();
//! assert_eq!(stats.bytes_emitted, 0);
//! ```

use std::io::{self, Write};

use smallvec::SmallVec;
use unicode_width::UnicodeWidthChar;
use vtstack_core::terminal_capabilities::TerminalCapabilities;

use crate::ansi::{self, EraseLineMode, SgrCodes};
use crate::area::{Area, LineDamage};
use crate::cell::{Cell, Color, StyleFlags};
use crate::charset::{self, Charset, Encoding};
use crate::cursor::CursorRequest;
use crate::flush_stats::{FlushStats, StatsCollector};

/// Initial capacity of the per-flush output buffer.
const BUFFER_CAPACITY: usize = 16 * 1024;

/// Style bits with an SGR representation.
const VISUAL_STYLE: StyleFlags = StyleFlags::BOLD
    .union(StyleFlags::DIM)
    .union(StyleFlags::ITALIC)
    .union(StyleFlags::UNDERLINE)
    .union(StyleFlags::DOUBLE_UNDERLINE)
    .union(StyleFlags::BLINK)
    .union(StyleFlags::REVERSE)
    .union(StyleFlags::INVISIBLE)
    .union(StyleFlags::CROSSED_OUT);

const INTENSITY: StyleFlags = StyleFlags::BOLD.union(StyleFlags::DIM);
const UNDERLINES: StyleFlags = StyleFlags::UNDERLINE.union(StyleFlags::DOUBLE_UNDERLINE);

const STYLE_CODES: [(StyleFlags, SgrCodes); 9] = [
    (StyleFlags::BOLD, ansi::SGR_BOLD),
    (StyleFlags::DIM, ansi::SGR_DIM),
    (StyleFlags::ITALIC, ansi::SGR_ITALIC),
    (StyleFlags::UNDERLINE, ansi::SGR_UNDERLINE),
    (StyleFlags::DOUBLE_UNDERLINE, ansi::SGR_DOUBLE_UNDERLINE),
    (StyleFlags::BLINK, ansi::SGR_BLINK),
    (StyleFlags::REVERSE, ansi::SGR_REVERSE),
    (StyleFlags::INVISIBLE, ansi::SGR_HIDDEN),
    (StyleFlags::CROSSED_OUT, ansi::SGR_STRIKETHROUGH),
];

/// Attributes whose off code affects only themselves.
const SINGLE_OFF: [(StyleFlags, SgrCodes); 5] = [
    (StyleFlags::ITALIC, ansi::SGR_ITALIC),
    (StyleFlags::BLINK, ansi::SGR_BLINK),
    (StyleFlags::REVERSE, ansi::SGR_REVERSE),
    (StyleFlags::INVISIBLE, ansi::SGR_HIDDEN),
    (StyleFlags::CROSSED_OUT, ansi::SGR_STRIKETHROUGH),
];

type Params = SmallVec<[u16; 16]>;
type PrintedRanges = SmallVec<[(u16, u16); 8]>;

/// Output options beyond what the capabilities say.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncConfig {
    /// Draw the lower half block as a reversed upper half block.
    pub new_font: bool,
    /// Force an encoding instead of deriving it from the capabilities.
    pub encoding: Option<Encoding>,
}

/// Attributes selected on the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TermAttr {
    pub fg: Color,
    pub bg: Color,
    pub style: StyleFlags,
}

/// What the engine believes the terminal currently has selected.
///
/// `None` means unknown; the next use emits an absolute sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TermState {
    pub cursor: Option<(u16, u16)>,
    pub attr: Option<TermAttr>,
    pub cursor_visible: Option<bool>,
    pub charset: Charset,
}

/// Phase of the flush cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Idle,
    /// The virtual terminal carries damage not yet sent.
    Damaged,
    Flushing,
}

/// Cursor movement chosen by the cost model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Horizontal {
    Stay,
    Column,
    Forward(u16),
    Back(u16),
    Return,
    ReturnForward(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorMove {
    Absolute,
    Relative {
        up: u16,
        down: u16,
        horizontal: Horizontal,
    },
}

fn horizontal_cost(h: Horizontal, x: u16) -> usize {
    match h {
        Horizontal::Stay => 0,
        Horizontal::Column => ansi::cha_len(x),
        Horizontal::Forward(n) | Horizontal::Back(n) => ansi::relative_len(n),
        Horizontal::Return => 1,
        Horizontal::ReturnForward(n) => 1 + ansi::relative_len(n),
    }
}

/// Cheapest way to reach `(x, y)` and its byte cost.
fn plan_move(from: Option<(u16, u16)>, x: u16, y: u16) -> (CursorMove, usize) {
    let absolute = (CursorMove::Absolute, ansi::cup_len(y, x));
    let Some((cx, cy)) = from else {
        return absolute;
    };

    let mut options: SmallVec<[Horizontal; 4]> = SmallVec::new();
    if cx == x {
        options.push(Horizontal::Stay);
    } else if x > cx {
        options.push(Horizontal::Forward(x - cx));
    } else {
        options.push(Horizontal::Back(cx - x));
    }
    options.push(Horizontal::Column);
    if x == 0 {
        options.push(Horizontal::Return);
    } else {
        options.push(Horizontal::ReturnForward(x));
    }
    let (horizontal, h_cost) = options
        .into_iter()
        .map(|h| (h, horizontal_cost(h, x)))
        .min_by_key(|&(_, cost)| cost)
        .unwrap_or((Horizontal::Column, ansi::cha_len(x)));

    let (up, down) = if y < cy { (cy - y, 0) } else { (0, y - cy) };
    let cost = h_cost + ansi::relative_len(up) + ansi::relative_len(down);
    if cost < absolute.1 {
        (
            CursorMove::Relative {
                up,
                down,
                horizontal,
            },
            cost,
        )
    } else {
        absolute
    }
}

fn push_color(params: &mut Params, color: Color, background: bool) {
    let base: u16 = if background { 40 } else { 30 };
    match color {
        Color::Default => params.push(base + 9),
        Color::Indexed(i) if i < 8 => params.push(base + u16::from(i)),
        Color::Indexed(i) if i < 16 => params.push(base + 60 + u16::from(i - 8)),
        Color::Indexed(i) => params.extend_from_slice(&[base + 8, 5, u16::from(i)]),
    }
}

/// SGR parameters that rebuild `target` from a reset.
fn reset_params(target: TermAttr, pc_font: bool) -> Params {
    let mut params = Params::new();
    params.push(0);
    for (flag, codes) in STYLE_CODES {
        if target.style.contains(flag) {
            params.push(u16::from(codes.on));
        }
    }
    if target.fg != Color::Default {
        push_color(&mut params, target.fg, false);
    }
    if target.bg != Color::Default {
        push_color(&mut params, target.bg, true);
    }
    if pc_font {
        params.push(u16::from(ansi::SGR_PC_CHARSET.on));
    }
    params
}

/// SGR parameters that turn `current` into `target` without a reset.
fn incremental_params(current: TermAttr, target: TermAttr, pc_now: bool, pc_font: bool) -> Params {
    let mut params = Params::new();
    let removed = current.style - target.style;
    let mut added = target.style - current.style;
    if removed.intersects(INTENSITY) {
        params.push(u16::from(ansi::SGR_BOLD.off));
        added |= target.style & INTENSITY;
    }
    if removed.intersects(UNDERLINES) {
        params.push(u16::from(ansi::SGR_UNDERLINE.off));
        added |= target.style & UNDERLINES;
    }
    for (flag, codes) in SINGLE_OFF {
        if removed.contains(flag) {
            params.push(u16::from(codes.off));
        }
    }
    for (flag, codes) in STYLE_CODES {
        if added.contains(flag) {
            params.push(u16::from(codes.on));
        }
    }
    if current.fg != target.fg {
        push_color(&mut params, target.fg, false);
    }
    if current.bg != target.bg {
        push_color(&mut params, target.bg, true);
    }
    if pc_now != pc_font {
        let codes = ansi::SGR_PC_CHARSET;
        params.push(u16::from(if pc_font { codes.on } else { codes.off }));
    }
    params
}

/// Extend `ranges` by `[x0, x1]`, merging with the previous range.
fn push_range(ranges: &mut PrintedRanges, x0: u16, x1: u16) {
    if let Some(last) = ranges.last_mut()
        && last.1.saturating_add(1) >= x0
        && x1.saturating_add(1) >= last.0
    {
        last.0 = last.0.min(x0);
        last.1 = last.1.max(x1);
        return;
    }
    ranges.push((x0, x1));
}

/// Length of the run starting at `x` (inclusive) up to `end` (inclusive).
fn run_len(row: &[Cell], x: u16, end: u16, pred: impl Fn(&Cell) -> bool) -> u16 {
    row[usize::from(x)..=usize::from(end)]
        .iter()
        .take_while(|c| pred(c))
        .count() as u16
}

#[inline]
fn is_repeatable(ch: char) -> bool {
    matches!(ch, ' '..='~')
}

/// Mirrors the virtual terminal onto a physical terminal.
#[derive(Debug)]
pub struct TerminalSync<W: Write> {
    writer: W,
    buf: Vec<u8>,
    capabilities: TerminalCapabilities,
    config: SyncConfig,
    encoding: Encoding,
    color_count: u16,
    term: TermState,
    phase: SyncState,
}

impl<W: Write> TerminalSync<W> {
    pub fn new(writer: W, capabilities: TerminalCapabilities) -> Self {
        Self::with_config(writer, capabilities, SyncConfig::default())
    }

    pub fn with_config(writer: W, capabilities: TerminalCapabilities, config: SyncConfig) -> Self {
        let encoding = config
            .encoding
            .unwrap_or_else(|| Encoding::detect(&capabilities));
        Self {
            writer,
            buf: Vec::with_capacity(BUFFER_CAPACITY),
            capabilities,
            config,
            encoding,
            color_count: capabilities.color_count(),
            term: TermState::default(),
            phase: SyncState::Idle,
        }
    }

    #[inline]
    pub fn capabilities(&self) -> &TerminalCapabilities {
        &self.capabilities
    }

    #[inline]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// The engine's view of the terminal.
    #[inline]
    pub fn term_state(&self) -> &TermState {
        &self.term
    }

    #[inline]
    pub fn phase(&self) -> SyncState {
        self.phase
    }

    /// Update the phase from the virtual terminal's damage.
    pub fn observe(&mut self, vterm: &Area) -> SyncState {
        if self.phase != SyncState::Flushing {
            self.phase = if vterm.has_damage() {
                SyncState::Damaged
            } else {
                SyncState::Idle
            };
        }
        self.phase
    }

    /// Drop every assumption about the terminal state.
    ///
    /// Call after something else wrote to the terminal; pair it with
    /// [`Area::invalidate_printed`] on the virtual terminal to redraw.
    pub fn forget_state(&mut self) {
        self.term = TermState::default();
    }

    #[inline]
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Send every damaged line of `vterm` to the terminal.
    ///
    /// Afterwards the damage is gone and the sent cells are marked as
    /// printed. `bell` appends an audible bell, `cursor` decides where
    /// the hardware cursor ends up. A flush with nothing to do writes
    /// nothing, not even a synchronized-output frame.
    pub fn flush(
        &mut self,
        vterm: &mut Area,
        cursor: CursorRequest,
        bell: bool,
    ) -> io::Result<FlushStats> {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "flush",
            width = vterm.width(),
            height = vterm.height()
        )
        .entered();

        self.phase = SyncState::Flushing;
        let result = self.flush_inner(vterm, cursor, bell);
        self.phase = SyncState::Idle;
        match result {
            Ok(stats) => {
                stats.log();
                Ok(stats)
            }
            Err(err) => {
                vtstack_core::warn!(%err, "terminal flush failed");
                self.forget_state();
                vterm.invalidate_printed();
                Err(err)
            }
        }
    }

    fn flush_inner(
        &mut self,
        vterm: &mut Area,
        cursor: CursorRequest,
        bell: bool,
    ) -> io::Result<FlushStats> {
        let mut stats = StatsCollector::start();
        self.buf.clear();
        let height = vterm.total_height();

        if vterm.has_damage()
            && !self.capabilities.use_sync_output()
            && self.term.cursor_visible != Some(false)
        {
            ansi::cursor_hide(&mut self.buf)?;
            self.term.cursor_visible = Some(false);
        }

        for y in 0..height {
            let Some(&damage) = vterm.line(y) else {
                continue;
            };
            if !damage.is_damaged() {
                continue;
            }
            let Some(row) = vterm.row(y) else {
                continue;
            };
            let printed = self.flush_line(row, y, height, damage, &mut stats)?;
            for (x0, x1) in printed {
                vterm.mark_printed(x0, x1, y);
            }
            stats.lines_flushed += 1;
        }
        vterm.reset_damage();

        self.restore_charset()?;
        if bell {
            self.buf.write_all(ansi::BELL)?;
        }
        self.place_cursor(cursor)?;
        let bytes = self.write_out()?;
        Ok(stats.finish(bytes))
    }

    /// Reset the terminal to a sane state for handing it back.
    pub fn restore(&mut self) -> io::Result<()> {
        self.buf.clear();
        self.restore_charset()?;
        ansi::sgr_reset(&mut self.buf)?;
        if self.capabilities.auto_margin_toggle {
            self.buf.write_all(ansi::DECAWM_ON)?;
        }
        ansi::cursor_show(&mut self.buf)?;
        self.write_out()?;
        self.forget_state();
        Ok(())
    }

    fn write_out(&mut self) -> io::Result<u64> {
        if self.buf.is_empty() {
            return Ok(0);
        }
        let mut total = self.buf.len();
        let sync = self.capabilities.use_sync_output();
        if sync {
            ansi::sync_begin(&mut self.writer)?;
            total += ansi::SYNC_BEGIN.len();
        }
        self.writer.write_all(&self.buf)?;
        if sync {
            ansi::sync_end(&mut self.writer)?;
            total += ansi::SYNC_END.len();
        }
        self.writer.flush()?;
        self.buf.clear();
        Ok(total as u64)
    }

    // ── Lines ──────────────────────────────────────────────────────────

    fn flush_line(
        &mut self,
        row: &[Cell],
        y: u16,
        height: u16,
        damage: LineDamage,
        stats: &mut StatsCollector,
    ) -> io::Result<PrintedRanges> {
        let mut printed = PrintedRanges::new();
        let width = row.len() as u16;
        if width == 0 {
            return Ok(printed);
        }
        let last = width - 1;
        let mut xmin = damage.xmin;
        let mut xmax = damage.xmax.min(last);
        if xmin > xmax {
            return Ok(printed);
        }

        // Uniform blank suffix from the first damaged column.
        let first = row[usize::from(xmin)];
        if self.capabilities.clear_eol
            && self.is_clearable(&first)
            && row[usize::from(xmin)..]
                .iter()
                .all(|c| self.same_blank(c, &first))
            && usize::from(xmax - xmin + 1) >= ansi::erase_line_len(EraseLineMode::ToEnd)
        {
            self.erase_line_at(xmin, y, EraseLineMode::ToEnd, &first)?;
            stats.cells_written += usize::from(width - xmin);
            push_range(&mut printed, xmin, last);
            return Ok(printed);
        }

        // Uniform blank prefix.
        let lead_cell = row[0];
        if self.capabilities.clear_bol && self.is_clearable(&lead_cell) {
            let lead = run_len(row, 0, last, |c| self.same_blank(c, &lead_cell));
            if lead > xmin
                && usize::from(lead - xmin) > ansi::erase_line_len(EraseLineMode::ToStart) + 3
            {
                self.erase_line_at(lead - 1, y, EraseLineMode::ToStart, &lead_cell)?;
                stats.cells_written += usize::from(lead);
                push_range(&mut printed, 0, lead - 1);
                xmin = lead;
            }
        }

        // Uniform blank suffix somewhere inside the range.
        let mut tail = None;
        let tail_cell = row[usize::from(last)];
        if self.capabilities.clear_eol && xmin <= xmax && self.is_clearable(&tail_cell) {
            let run = row
                .iter()
                .rev()
                .take_while(|c| self.same_blank(c, &tail_cell))
                .count() as u16;
            let from = (width - run).max(xmin);
            if from > xmin
                && from <= xmax
                && usize::from(xmax - from + 1) > ansi::erase_line_len(EraseLineMode::ToEnd) + 3
            {
                tail = Some(from);
                xmax = from - 1;
            }
        }

        if xmin <= xmax {
            self.flush_range(row, y, height, xmin, xmax, stats, &mut printed)?;
        }
        if let Some(from) = tail {
            self.erase_line_at(from, y, EraseLineMode::ToEnd, &tail_cell)?;
            stats.cells_written += usize::from(width - from);
            push_range(&mut printed, from, last);
        }
        Ok(printed)
    }

    #[allow(clippy::too_many_arguments)]
    fn flush_range(
        &mut self,
        row: &[Cell],
        y: u16,
        height: u16,
        xmin: u16,
        xmax: u16,
        stats: &mut StatsCollector,
        printed: &mut PrintedRanges,
    ) -> io::Result<()> {
        let width = row.len() as u16;
        let mut x = xmin;
        while x <= xmax {
            let cell = row[usize::from(x)];

            if cell.is_printed() {
                let run = run_len(row, x, xmax, Cell::is_printed);
                let end = x + run;
                let (_, relocate) = plan_move(Some((x, y)), end, y);
                if end > xmax || usize::from(run) > relocate {
                    x = end;
                    continue;
                }
                for i in x..end {
                    self.put_cell(row, i, y, height, stats, printed)?;
                }
                x = end;
                continue;
            }

            if self.capabilities.erase_chars && self.is_clearable(&cell) {
                let run = run_len(row, x, xmax, |c| self.same_blank(c, &cell));
                if usize::from(run) > ansi::ech_len(run) + 3 {
                    self.move_to(x, y)?;
                    self.set_attr(self.erase_attr(&cell), None)?;
                    ansi::ech(&mut self.buf, run)?;
                    stats.cells_written += usize::from(run);
                    push_range(printed, x, x + run - 1);
                    x += run;
                    continue;
                }
            }

            if self.capabilities.repeat_char && is_repeatable(cell.ch) {
                let limit = if y + 1 == height {
                    xmax.min(width.saturating_sub(2))
                } else {
                    xmax
                };
                if x <= limit {
                    let run = run_len(row, x, limit, |c| *c == cell);
                    if run > 1 && usize::from(run - 1) > ansi::rep_len(run - 1) {
                        self.put_cell(row, x, y, height, stats, printed)?;
                        ansi::rep(&mut self.buf, run - 1)?;
                        let end = x + run - 1;
                        self.term.cursor = self.cursor_after(end, y, 1, width, height);
                        stats.cells_written += usize::from(run - 1);
                        push_range(printed, x, end);
                        x += run;
                        continue;
                    }
                }
            }

            self.put_cell(row, x, y, height, stats, printed)?;
            x += 1;
        }
        Ok(())
    }

    // ── Cells ──────────────────────────────────────────────────────────

    fn put_cell(
        &mut self,
        row: &[Cell],
        x: u16,
        y: u16,
        height: u16,
        stats: &mut StatsCollector,
        printed: &mut PrintedRanges,
    ) -> io::Result<()> {
        let width = row.len() as u16;
        let cell = row[usize::from(x)];
        if y + 1 == height && x + 1 == width && self.capabilities.auto_right_margin {
            return self.put_corner(row, x, y, stats, printed);
        }
        self.move_to(x, y)?;
        let advance = self.write_glyph(&cell)?;
        self.term.cursor = self.cursor_after(x, y, advance, width, height);
        stats.cells_written += 1;
        push_range(printed, x, x);
        Ok(())
    }

    /// Write the bottom-right cell without scrolling the screen.
    fn put_corner(
        &mut self,
        row: &[Cell],
        x: u16,
        y: u16,
        stats: &mut StatsCollector,
        printed: &mut PrintedRanges,
    ) -> io::Result<()> {
        let cell = row[usize::from(x)];
        if self.capabilities.auto_margin_toggle {
            self.move_to(x, y)?;
            self.buf.write_all(ansi::DECAWM_OFF)?;
            let advance = self.write_glyph(&cell)?;
            self.buf.write_all(ansi::DECAWM_ON)?;
            self.term.cursor = (advance == 1).then_some((x, y));
            stats.cells_written += 1;
            push_range(printed, x, x);
            return Ok(());
        }
        if self.capabilities.insert_character && x > 0 {
            // Draw the corner glyph one column early, shift it right with
            // ICH, then redraw the penultimate cell in the gap.
            let prev = row[usize::from(x - 1)];
            self.move_to(x - 1, y)?;
            let a = self.write_glyph(&cell)?;
            ansi::cub(&mut self.buf, 1)?;
            ansi::ich(&mut self.buf, 1)?;
            let b = self.write_glyph(&prev)?;
            self.term.cursor = (a == 1 && b == 1).then_some((x, y));
            stats.cells_written += 2;
            push_range(printed, x - 1, x);
            return Ok(());
        }
        Ok(())
    }

    /// Select attributes and charset for `cell`, then send its glyph.
    ///
    /// Returns the number of columns the terminal advances.
    fn write_glyph(&mut self, cell: &Cell) -> io::Result<u16> {
        let mut ch = if cell.ch.is_control() { ' ' } else { cell.ch };
        let mut swap = false;
        if self.config.new_font {
            (ch, swap) = charset::new_font_glyph(ch);
        }
        let glyph = charset::encode(ch, self.encoding, self.capabilities.pc_charset);

        let attr = self.glyph_attr(cell, swap);
        let pc_font = (glyph.charset == Charset::Pc).then_some(true);
        self.set_attr(attr, pc_font)?;

        if glyph.charset == Charset::Alternate {
            if self.term.charset != Charset::Alternate {
                self.buf.write_all(ansi::ACS_ON)?;
                self.term.charset = Charset::Alternate;
            }
        } else if self.term.charset == Charset::Alternate {
            self.buf.write_all(ansi::ACS_OFF)?;
            self.term.charset = Charset::Normal;
        }

        self.buf.write_all(glyph.as_bytes())?;
        if self.encoding == Encoding::Utf8 {
            Ok(UnicodeWidthChar::width(ch).unwrap_or(0) as u16)
        } else {
            Ok(1)
        }
    }

    /// Cursor position after writing a glyph of `advance` columns at `x`.
    fn cursor_after(
        &self,
        x: u16,
        y: u16,
        advance: u16,
        width: u16,
        height: u16,
    ) -> Option<(u16, u16)> {
        if advance != 1 {
            return None;
        }
        let next = x + 1;
        if next < width {
            Some((next, y))
        } else if !self.capabilities.auto_right_margin {
            Some((width - 1, y))
        } else if self.capabilities.eat_newline_glitch {
            None
        } else if y + 1 < height {
            Some((0, y + 1))
        } else {
            None
        }
    }

    fn move_to(&mut self, x: u16, y: u16) -> io::Result<()> {
        if self.term.cursor == Some((x, y)) {
            return Ok(());
        }
        let (plan, _) = plan_move(self.term.cursor, x, y);
        match plan {
            CursorMove::Absolute => ansi::cup(&mut self.buf, y, x)?,
            CursorMove::Relative {
                up,
                down,
                horizontal,
            } => {
                ansi::cuu(&mut self.buf, up)?;
                ansi::cud(&mut self.buf, down)?;
                match horizontal {
                    Horizontal::Stay => {}
                    Horizontal::Column => ansi::cha(&mut self.buf, x)?,
                    Horizontal::Forward(n) => ansi::cuf(&mut self.buf, n)?,
                    Horizontal::Back(n) => ansi::cub(&mut self.buf, n)?,
                    Horizontal::Return => ansi::cr(&mut self.buf)?,
                    Horizontal::ReturnForward(n) => {
                        ansi::cr(&mut self.buf)?;
                        ansi::cuf(&mut self.buf, n)?;
                    }
                }
            }
        }
        self.term.cursor = Some((x, y));
        Ok(())
    }

    // ── Attributes ─────────────────────────────────────────────────────

    fn glyph_attr(&self, cell: &Cell, swap: bool) -> TermAttr {
        let mut style = cell.style;
        if style.contains(StyleFlags::STANDOUT) {
            style.insert(StyleFlags::REVERSE);
        }
        let mut fg = cell.fg.for_palette(self.color_count);
        let mut bg = cell.bg.for_palette(self.color_count);
        if swap {
            std::mem::swap(&mut fg, &mut bg);
        }
        TermAttr {
            fg,
            bg,
            style: style & VISUAL_STYLE,
        }
    }

    fn erase_attr(&self, blank: &Cell) -> TermAttr {
        TermAttr {
            fg: blank.fg.for_palette(self.color_count),
            bg: blank.bg.for_palette(self.color_count),
            style: StyleFlags::empty(),
        }
    }

    /// Emit one combined SGR moving the terminal to `target`.
    ///
    /// `pc_font` requests the PC ROM font on or off; `None` keeps it.
    fn set_attr(&mut self, target: TermAttr, pc_font: Option<bool>) -> io::Result<()> {
        let pc_now = self.term.charset == Charset::Pc;
        let want_pc = pc_font.unwrap_or(pc_now);
        if self.term.attr == Some(target) && want_pc == pc_now {
            return Ok(());
        }
        let reset = reset_params(target, want_pc);
        let params = match self.term.attr {
            Some(current) => {
                let incremental = incremental_params(current, target, pc_now, want_pc);
                if ansi::sgr_len(&incremental) <= ansi::sgr_len(&reset) {
                    incremental
                } else {
                    reset
                }
            }
            None => reset,
        };
        ansi::sgr(&mut self.buf, &params)?;
        self.term.attr = Some(target);
        if want_pc {
            self.term.charset = Charset::Pc;
        } else if pc_now {
            self.term.charset = Charset::Normal;
        }
        Ok(())
    }

    fn erase_line_at(
        &mut self,
        x: u16,
        y: u16,
        mode: EraseLineMode,
        blank: &Cell,
    ) -> io::Result<()> {
        self.move_to(x, y)?;
        self.set_attr(self.erase_attr(blank), None)?;
        ansi::erase_line(&mut self.buf, mode)
    }

    /// A cell that an erase sequence reproduces exactly.
    fn is_clearable(&self, cell: &Cell) -> bool {
        cell.ch == ' '
            && !cell.style.intersects(StyleFlags::RENDITION)
            && (self.capabilities.background_color_erase
                || cell.bg.for_palette(self.color_count) == Color::Default)
    }

    fn same_blank(&self, cell: &Cell, blank: &Cell) -> bool {
        self.is_clearable(cell)
            && cell.bg.for_palette(self.color_count) == blank.bg.for_palette(self.color_count)
    }

    fn restore_charset(&mut self) -> io::Result<()> {
        match self.term.charset {
            Charset::Normal => {}
            Charset::Alternate => self.buf.write_all(ansi::ACS_OFF)?,
            Charset::Pc => ansi::sgr(&mut self.buf, &[u16::from(ansi::SGR_PC_CHARSET.off)])?,
        }
        self.term.charset = Charset::Normal;
        Ok(())
    }

    fn place_cursor(&mut self, request: CursorRequest) -> io::Result<()> {
        match request {
            CursorRequest::Hidden => {
                if self.term.cursor_visible != Some(false) {
                    ansi::cursor_hide(&mut self.buf)?;
                    self.term.cursor_visible = Some(false);
                }
            }
            CursorRequest::Visible { x, y } => {
                self.move_to(x, y)?;
                if self.term.cursor_visible != Some(true) {
                    ansi::cursor_show(&mut self.buf)?;
                    self.term.cursor_visible = Some(true);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::GraphicsContext;
    use crate::terminal_model::{ModelCell, TerminalModel};
    use vtstack_core::geometry::{Point, Size};

    fn vterm(w: u16, h: u16) -> Area {
        let mut area = Area::new(Point::ORIGIN, Size::new(w, h), Size::ZERO).unwrap();
        area.mark_all_dirty();
        area
    }

    fn flush(sync: &mut TerminalSync<Vec<u8>>, vterm: &mut Area) -> Vec<u8> {
        let start = sync.get_ref().len();
        sync.flush(vterm, CursorRequest::Hidden, false).unwrap();
        sync.get_ref()[start..].to_vec()
    }

    fn count_sgr(bytes: &[u8]) -> usize {
        let mut count = 0;
        let mut i = 0;
        while i + 1 < bytes.len() {
            if bytes[i] == 0x1b && bytes[i + 1] == b'[' {
                let mut j = i + 2;
                while j < bytes.len() && !(0x40..=0x7e).contains(&bytes[j]) {
                    j += 1;
                }
                if j < bytes.len() && bytes[j] == b'm' {
                    count += 1;
                }
                i = j;
            }
            i += 1;
        }
        count
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    /// Compare what a model terminal shows against the virtual terminal.
    ///
    /// Plain blanks only compare their background; erase sequences do not
    /// keep a foreground color.
    fn assert_screen_matches(model: &TerminalModel, vterm: &Area) {
        for y in 0..vterm.height() {
            for x in 0..vterm.width() {
                let want = ModelCell::expected(vterm.cell(x, y).unwrap());
                let got = *model.cell(usize::from(x), usize::from(y)).unwrap();
                if want.ch == ' ' && !want.style.intersects(StyleFlags::RENDITION) {
                    assert_eq!((got.ch, got.bg), (want.ch, want.bg), "cell ({x},{y})");
                } else {
                    assert_eq!(got, want, "cell ({x},{y})");
                }
            }
        }
    }

    #[test]
    fn empty_flush_writes_nothing() {
        let mut vt = vterm(10, 3);
        vt.reset_damage();
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::modern());
        sync.forget_state();
        let stats = sync.flush(&mut vt, CursorRequest::Hidden, false).unwrap();
        // Only the cursor visibility is unknown.
        assert_eq!(sync.get_ref().as_slice(), b"\x1b[?2026h\x1b[?25l\x1b[?2026l");
        assert_eq!(stats.lines_flushed, 0);
        let stats = sync.flush(&mut vt, CursorRequest::Hidden, false).unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn second_flush_is_empty() {
        let mut vt = vterm(12, 3);
        vt.print("hello world", &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
        let first = flush(&mut sync, &mut vt);
        assert!(!first.is_empty());
        assert!(!vt.has_damage());
        let second = flush(&mut sync, &mut vt);
        assert!(second.is_empty());
    }

    #[test]
    fn adjacent_cells_share_one_sgr() {
        let mut vt = vterm(10, 1);
        vt.reset_damage();
        let gc = GraphicsContext::new(Color::RED, Color::BLUE);
        vt.print("ab", &gc);
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
        let out = flush(&mut sync, &mut vt);
        assert_eq!(count_sgr(&out), 1);
        assert!(contains(&out, b"\x1b[0;31;44mab"));
    }

    #[test]
    fn incremental_sgr_beats_reset() {
        let current = TermAttr {
            fg: Color::RED,
            bg: Color::BLUE,
            style: StyleFlags::BOLD,
        };
        let target = TermAttr {
            style: StyleFlags::empty(),
            ..current
        };
        assert_eq!(incremental_params(current, target, false, false).as_slice(), &[22]);
        let target = TermAttr {
            style: StyleFlags::DIM,
            ..current
        };
        assert_eq!(
            incremental_params(current, target, false, false).as_slice(),
            &[22, 2]
        );
        assert_eq!(reset_params(target, false).as_slice(), &[0, 2, 31, 44]);
    }

    #[test]
    fn palette_codes() {
        let mut params = Params::new();
        push_color(&mut params, Color::Indexed(3), false);
        push_color(&mut params, Color::Indexed(12), true);
        push_color(&mut params, Color::Indexed(200), false);
        push_color(&mut params, Color::Default, true);
        assert_eq!(params.as_slice(), &[33, 104, 38, 5, 200, 49]);
    }

    #[test]
    fn cursor_cost_model() {
        assert_eq!(plan_move(None, 4, 2).0, CursorMove::Absolute);
        let (plan, cost) = plan_move(Some((3, 2)), 4, 2);
        assert_eq!(cost, 3);
        assert!(matches!(
            plan,
            CursorMove::Relative {
                horizontal: Horizontal::Forward(1),
                ..
            }
        ));
        let (plan, cost) = plan_move(Some((30, 2)), 0, 2);
        assert_eq!((plan, cost), (
            CursorMove::Relative {
                up: 0,
                down: 0,
                horizontal: Horizontal::Return
            },
            1
        ));
        let (_, cost) = plan_move(Some((0, 0)), 70, 40);
        assert!(cost <= ansi::cup_len(40, 70));
    }

    #[test]
    fn blank_suffix_uses_erase_line() {
        let mut vt = vterm(20, 1);
        vt.print("ab", &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
        let out = flush(&mut sync, &mut vt);
        assert!(contains(&out, b"ab\x1b[K"));
        let mut model = TerminalModel::new(20, 1);
        model.process(&out);
        assert_screen_matches(&model, &vt);
    }

    #[test]
    fn blank_run_uses_erase_chars() {
        let mut vt = vterm(30, 1);
        vt.reset_damage();
        vt.print("a", &GraphicsContext::default());
        vt.set_print_cursor(20, 0);
        vt.print("b", &GraphicsContext::default());
        for x in 1..20 {
            vt.write_at(x, 0, Cell::new('x'));
            vt.write_at(x, 0, Cell::BLANK.with_bg(Color::GREEN));
        }
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
        let out = flush(&mut sync, &mut vt);
        assert!(contains(&out, b"\x1b[19X"));
        let mut model = TerminalModel::new(30, 1);
        model.process(&out);
        assert_screen_matches(&model, &vt);
    }

    #[test]
    fn character_run_uses_repeat() {
        let mut vt = vterm(30, 2);
        vt.print(&"=".repeat(25), &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
        let out = flush(&mut sync, &mut vt);
        assert!(contains(&out, b"=\x1b[24b"));
        let mut model = TerminalModel::new(30, 2);
        model.process(&out);
        assert_screen_matches(&model, &vt);
    }

    #[test]
    fn printed_run_is_skipped() {
        let mut vt = vterm(40, 1);
        vt.print(&"abcdefghij".repeat(4), &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
        let mut model = TerminalModel::new(40, 1);
        model.process(&flush(&mut sync, &mut vt));

        vt.write_at(0, 0, Cell::new('X'));
        vt.write_at(39, 0, Cell::new('Y'));
        let out = flush(&mut sync, &mut vt);
        // Two glyphs and a relocation, not 40 cells.
        assert!(out.len() < 30, "{}", TerminalModel::dump_sequences(&out));
        model.process(&out);
        assert_screen_matches(&model, &vt);
    }

    #[test]
    fn identical_recomposite_is_skipped() {
        let text = "abcdefghij".repeat(4);
        let mut vt = vterm(40, 1);
        vt.print(&text, &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
        let mut model = TerminalModel::new(40, 1);
        model.process(&flush(&mut sync, &mut vt));

        for (x, ch) in (0u16..).zip(text.chars()) {
            let ch = match x {
                0 => 'X',
                39 => 'Y',
                _ => ch,
            };
            vt.store_composited(x, 0, Cell::new(ch));
        }
        assert!(vt.cell(20, 0).unwrap().is_printed());
        let out = flush(&mut sync, &mut vt);
        assert!(out.len() < 30, "{}", TerminalModel::dump_sequences(&out));
        model.process(&out);
        assert_screen_matches(&model, &vt);
    }

    #[test]
    fn vt100_draws_lines_with_dec_graphics() {
        let mut vt = vterm(10, 2);
        vt.print("\u{250C}\u{2500}\u{2510}", &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::vt100());
        assert_eq!(sync.encoding(), Encoding::Vt100);
        let out = flush(&mut sync, &mut vt);
        assert!(contains(&out, b"\x1b(0lqk"));
        assert!(out.ends_with(ansi::ACS_OFF));
        assert_eq!(sync.term_state().charset, Charset::Normal);
        let mut model = TerminalModel::new(10, 2);
        model.process(&out);
        assert_eq!(model.row_text(0).unwrap().trim_end(), "\u{250C}\u{2500}\u{2510}");
    }

    #[test]
    fn pc_console_uses_rom_font() {
        let mut caps = TerminalCapabilities::linux_console();
        caps.utf8 = false;
        let mut vt = vterm(10, 1);
        vt.print("a\u{2554}b", &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), caps);
        assert_eq!(sync.encoding(), Encoding::Pc);
        let out = flush(&mut sync, &mut vt);
        assert!(contains(&out, b"\x1b[11m\xC9b"));
        assert!(contains(&out, b"\x1b[10m"));
        let mut model = TerminalModel::new(10, 1);
        model.process(&out);
        assert_eq!(model.row_text(0).unwrap().trim_end(), "a\u{2554}b");
        assert!(!model.sgr_state().pc_font);
    }

    #[test]
    fn new_font_swaps_colors_for_lower_half() {
        let mut vt = vterm(4, 1);
        vt.reset_damage();
        vt.print("\u{2584}", &GraphicsContext::new(Color::RED, Color::BLUE));
        let config = SyncConfig {
            new_font: true,
            encoding: None,
        };
        let mut sync =
            TerminalSync::with_config(Vec::new(), TerminalCapabilities::xterm_256color(), config);
        let out = flush(&mut sync, &mut vt);
        let mut model = TerminalModel::new(4, 1);
        model.process(&out);
        let cell = model.cell(0, 0).unwrap();
        assert_eq!((cell.ch, cell.fg, cell.bg), ('\u{2580}', Color::BLUE, Color::RED));
    }

    #[test]
    fn monochrome_terminal_drops_colors() {
        let mut vt = vterm(4, 1);
        vt.reset_damage();
        vt.print("a", &GraphicsContext::new(Color::RED, Color::BLUE));
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::vt100());
        let out = flush(&mut sync, &mut vt);
        assert!(contains(&out, b"\x1b[0ma"));
    }

    #[test]
    fn corner_with_margin_toggle() {
        let mut vt = vterm(5, 2);
        vt.print(&"x".repeat(10), &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
        let out = flush(&mut sync, &mut vt);
        assert!(contains(&out, b"\x1b[?7lx\x1b[?7h"));
        let mut model = TerminalModel::new(5, 2);
        model.process(&out);
        assert_eq!(model.scroll_count(), 0);
        assert_screen_matches(&model, &vt);
    }

    #[test]
    fn corner_with_insert_character() {
        let caps = TerminalCapabilities::builder()
            .auto_right_margin(true)
            .insert_character(true)
            .build();
        let mut vt = vterm(5, 2);
        vt.print("abcdefghij", &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), caps);
        let out = flush(&mut sync, &mut vt);
        assert!(contains(&out, b"\x1b[@"));
        let mut model = TerminalModel::new(5, 2).with_newline_glitch(false);
        model.process(&out);
        assert_eq!(model.scroll_count(), 0);
        assert_eq!(model.row_text(1).unwrap(), "fghij");
    }

    #[test]
    fn corner_skipped_without_support() {
        let mut vt = vterm(5, 2);
        vt.print("abcdefghij", &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::dumb());
        let out = flush(&mut sync, &mut vt);
        let mut model = TerminalModel::new(5, 2).with_newline_glitch(false);
        model.process(&out);
        assert_eq!(model.scroll_count(), 0);
        assert_eq!(model.row_text(0).unwrap(), "abcde");
        assert_eq!(model.row_text(1).unwrap(), "fghi ");
        assert!(!vt.cell(4, 1).unwrap().is_printed());
    }

    #[test]
    fn bell_and_cursor() {
        let mut vt = vterm(10, 3);
        vt.reset_damage();
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
        sync.flush(&mut vt, CursorRequest::Visible { x: 4, y: 1 }, true).unwrap();
        let mut model = TerminalModel::new(10, 3);
        model.process(sync.get_ref());
        assert_eq!(model.bell_count(), 1);
        assert_eq!(model.cursor(), (4, 1));
        assert!(model.modes().cursor_visible);
        let before = sync.get_ref().len();
        sync.flush(&mut vt, CursorRequest::Visible { x: 4, y: 1 }, false).unwrap();
        assert_eq!(sync.get_ref().len(), before);
    }

    #[test]
    fn sync_output_wraps_frame() {
        let mut vt = vterm(10, 1);
        vt.print("hi", &GraphicsContext::default());
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::modern());
        let out = flush(&mut sync, &mut vt);
        assert!(out.starts_with(ansi::SYNC_BEGIN));
        assert!(out.ends_with(ansi::SYNC_END));
        let mut model = TerminalModel::new(10, 1);
        model.process(&out);
        assert!(model.sync_output_balanced());
    }

    #[test]
    fn observe_tracks_damage() {
        let mut vt = vterm(4, 1);
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm());
        assert_eq!(sync.observe(&vt), SyncState::Damaged);
        sync.flush(&mut vt, CursorRequest::Hidden, false).unwrap();
        assert_eq!(sync.observe(&vt), SyncState::Idle);
    }

    #[test]
    fn restore_resets_terminal() {
        let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
        sync.restore().unwrap();
        let mut model = TerminalModel::new(4, 1);
        model.process(sync.get_ref());
        assert!(model.modes().cursor_visible);
        assert!(model.modes().auto_wrap);
        assert_eq!(*sync.term_state(), TermState::default());
    }
}

#[cfg(test)]
mod sync_proptests {
    use super::*;
    use crate::terminal_model::{ModelCell, TerminalModel};
    use proptest::prelude::*;
    use vtstack_core::geometry::{Point, Size};

    const W: u16 = 12;
    const H: u16 = 4;

    fn arb_cell() -> impl Strategy<Value = Cell> {
        let glyph = prop::sample::select(vec![' ', ' ', ' ', 'a', 'b', '=', '\u{2500}']);
        let color = prop::sample::select(vec![
            Color::Default,
            Color::RED,
            Color::BLUE,
            Color::Indexed(200),
        ]);
        let style = prop::sample::select(vec![
            StyleFlags::empty(),
            StyleFlags::BOLD,
            StyleFlags::UNDERLINE | StyleFlags::ITALIC,
            StyleFlags::STANDOUT,
        ]);
        (glyph, color.clone(), color, style)
            .prop_map(|(ch, fg, bg, style)| Cell::new(ch).with_fg(fg).with_bg(bg).with_style(style))
    }

    fn arb_writes() -> impl Strategy<Value = Vec<(u16, u16, Cell)>> {
        prop::collection::vec((0..W, 0..H, arb_cell()), 0..60)
    }

    fn arb_caps() -> impl Strategy<Value = TerminalCapabilities> {
        prop::sample::select(vec![
            TerminalCapabilities::xterm_256color(),
            TerminalCapabilities::modern(),
            TerminalCapabilities::screen(),
        ])
    }

    fn apply(vt: &mut Area, writes: &[(u16, u16, Cell)]) {
        for &(x, y, cell) in writes {
            vt.write_at(i32::from(x), i32::from(y), cell);
        }
    }

    fn matches(model: &TerminalModel, vt: &Area) -> bool {
        (0..H).all(|y| {
            (0..W).all(|x| {
                let want = ModelCell::expected(vt.cell(x, y).unwrap());
                let got = *model.cell(usize::from(x), usize::from(y)).unwrap();
                if want.ch == ' ' && !want.style.intersects(StyleFlags::RENDITION) {
                    got.ch == ' ' && got.bg == want.bg
                } else {
                    got == want
                }
            })
        })
    }

    proptest! {
        #[test]
        fn flushed_screen_matches_vterm(
            caps in arb_caps(),
            first in arb_writes(),
            second in arb_writes(),
        ) {
            let mut vt = Area::new(Point::ORIGIN, Size::new(W, H), Size::ZERO).unwrap();
            vt.mark_all_dirty();
            let mut sync = TerminalSync::new(Vec::new(), caps);
            let mut model = TerminalModel::new(usize::from(W), usize::from(H));

            apply(&mut vt, &first);
            sync.flush(&mut vt, CursorRequest::Hidden, false).unwrap();
            model.process(sync.get_ref());
            prop_assert!(matches(&model, &vt));

            let before = sync.get_ref().len();
            apply(&mut vt, &second);
            sync.flush(&mut vt, CursorRequest::Hidden, false).unwrap();
            model.process(&sync.get_ref()[before..]);
            prop_assert!(matches(&model, &vt));
            prop_assert_eq!(model.scroll_count(), 0);
        }

        #[test]
        fn flush_is_idempotent(caps in arb_caps(), writes in arb_writes()) {
            let mut vt = Area::new(Point::ORIGIN, Size::new(W, H), Size::ZERO).unwrap();
            vt.mark_all_dirty();
            apply(&mut vt, &writes);
            let mut sync = TerminalSync::new(Vec::new(), caps);
            sync.flush(&mut vt, CursorRequest::Visible { x: 1, y: 1 }, false).unwrap();
            let stats = sync.flush(&mut vt, CursorRequest::Visible { x: 1, y: 1 }, false).unwrap();
            prop_assert_eq!(stats.bytes_emitted, 0);
        }
    }
}
