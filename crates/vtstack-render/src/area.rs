#![forbid(unsafe_code)]

//! Retained drawing surfaces with per-line damage tracking.
//!
//! An [`Area`] is a row-major grid of [`Cell`]s sized
//! `(width + right_shadow) × (height + bottom_shadow)` plus one
//! [`LineDamage`] record per row.
//!
//! # Invariants
//!
//! 1. `cells.len() == total_width * total_height` and
//!    `lines.len() == total_height` at all times.
//! 2. A line is damaged iff `xmin <= xmax`; the empty state is
//!    `xmin = total_width.max(1), xmax = 0`.
//! 3. `trans_count` equals the number of non-opaque cells on that line.
//! 4. Writes outside the grid are silently clipped.
//! 5. Allocation failure leaves the area untouched and is reported as
//!    [`AreaError`].

use std::fmt;

use vtstack_core::geometry::{Point, Size};

use crate::cell::{Cell, CellFlags, GraphicsContext, Transparency};

/// Error raised when an area's buffers cannot be allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaError {
    /// The allocator refused the cell or damage buffers.
    Allocation { width: u16, height: u16 },
    /// The cell count exceeds [`MAX_AREA_CELLS`].
    TooLarge { width: u16, height: u16 },
}

impl fmt::Display for AreaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation { width, height } => {
                write!(f, "failed to allocate area buffers for {width}x{height} cells")
            }
            Self::TooLarge { width, height } => {
                write!(f, "area of {width}x{height} cells is too large")
            }
        }
    }
}

impl std::error::Error for AreaError {}

/// Non-owning tag naming the widget that owns an area.
///
/// Used only for diagnostics and lookups, never to extend a lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerTag(pub u64);

/// Changed-column range and transparency count for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDamage {
    /// First damaged column (inclusive).
    pub xmin: u16,
    /// Last damaged column (inclusive).
    pub xmax: u16,
    /// Number of non-opaque cells on the line.
    pub trans_count: u16,
}

impl LineDamage {
    /// An undamaged line of the given width.
    #[inline]
    pub const fn empty(line_width: u16) -> Self {
        Self {
            xmin: if line_width == 0 { 1 } else { line_width },
            xmax: 0,
            trans_count: 0,
        }
    }

    /// Whether any column on this line is damaged.
    #[inline]
    pub const fn is_damaged(&self) -> bool {
        self.xmin <= self.xmax
    }

    /// Widen the damage range to include `x`.
    #[inline]
    pub fn include(&mut self, x: u16) {
        self.xmin = self.xmin.min(x);
        self.xmax = self.xmax.max(x);
    }

    /// Widen the damage range to include `[x0, x1]`.
    #[inline]
    pub fn include_range(&mut self, x0: u16, x1: u16) {
        self.xmin = self.xmin.min(x0);
        self.xmax = self.xmax.max(x1);
    }

    /// Drop the damage range, keeping the transparency count.
    #[inline]
    pub fn reset(&mut self, line_width: u16) {
        let trans_count = self.trans_count;
        *self = Self::empty(line_width);
        self.trans_count = trans_count;
    }
}

/// A retained rectangular character buffer.
#[derive(Debug, Clone)]
pub struct Area {
    offset: Point,
    width: u16,
    height: u16,
    right_shadow: u16,
    bottom_shadow: u16,
    cells: Vec<Cell>,
    lines: Vec<LineDamage>,
    has_changes: bool,
    visible: bool,
    owner: Option<OwnerTag>,
    print_cursor: (u16, u16),
    input_cursor: Point,
    input_cursor_visible: bool,
}

/// Largest cell grid a single area may hold, shadow included.
pub const MAX_AREA_CELLS: usize = 1 << 24;

fn allocate(size: Size, shadow: Size) -> Result<(Vec<Cell>, Vec<LineDamage>), AreaError> {
    let total_w = size.width.saturating_add(shadow.width);
    let total_h = size.height.saturating_add(shadow.height);
    let too_large = AreaError::TooLarge {
        width: total_w,
        height: total_h,
    };
    let count = usize::from(total_w)
        .checked_mul(usize::from(total_h))
        .filter(|&count| count <= MAX_AREA_CELLS)
        .ok_or(too_large)?;

    let alloc_err = AreaError::Allocation {
        width: total_w,
        height: total_h,
    };
    let mut cells = Vec::new();
    cells.try_reserve_exact(count).map_err(|_| alloc_err)?;
    cells.resize(count, Cell::BLANK);

    let mut lines = Vec::new();
    lines
        .try_reserve_exact(usize::from(total_h))
        .map_err(|_| alloc_err)?;
    lines.resize(usize::from(total_h), LineDamage::empty(total_w));
    Ok((cells, lines))
}

impl Area {
    /// Allocate an area filled with blank cells and no damage.
    ///
    /// The area starts hidden.
    pub fn new(offset: Point, size: Size, shadow: Size) -> Result<Self, AreaError> {
        let (cells, lines) = allocate(size, shadow).inspect_err(|err| {
            vtstack_core::warn!(%err, "area allocation failed");
        })?;
        Ok(Self {
            offset,
            width: size.width,
            height: size.height,
            right_shadow: shadow.width,
            bottom_shadow: shadow.height,
            cells,
            lines,
            has_changes: false,
            visible: false,
            owner: None,
            print_cursor: (0, 0),
            input_cursor: Point::ORIGIN,
            input_cursor_visible: false,
        })
    }

    /// Resize in place.
    ///
    /// If the size and shadow are unchanged only the offset moves.
    /// Otherwise the buffers are reallocated, refilled with blanks and
    /// every line is marked dirty; no content is preserved. On
    /// allocation failure the area is left as it was.
    pub fn resize(&mut self, offset: Point, size: Size, shadow: Size) -> Result<(), AreaError> {
        if size == self.size() && shadow == self.shadow() {
            self.offset = offset;
            return Ok(());
        }
        let (cells, lines) = allocate(size, shadow).inspect_err(|err| {
            vtstack_core::warn!(%err, "area resize failed");
        })?;
        self.offset = offset;
        self.cells = cells;
        self.lines = lines;
        self.width = size.width;
        self.height = size.height;
        self.right_shadow = shadow.width;
        self.bottom_shadow = shadow.height;
        self.print_cursor = (0, 0);
        self.mark_all_dirty();
        Ok(())
    }

    // ── Geometry ───────────────────────────────────────────────────────

    #[inline]
    pub const fn offset(&self) -> Point {
        self.offset
    }

    #[inline]
    pub fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }

    /// Content width (excluding the right shadow).
    #[inline]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Content height (excluding the bottom shadow).
    #[inline]
    pub const fn height(&self) -> u16 {
        self.height
    }

    #[inline]
    pub const fn right_shadow(&self) -> u16 {
        self.right_shadow
    }

    #[inline]
    pub const fn bottom_shadow(&self) -> u16 {
        self.bottom_shadow
    }

    /// Width including the right shadow.
    #[inline]
    pub const fn total_width(&self) -> u16 {
        self.width.saturating_add(self.right_shadow)
    }

    /// Height including the bottom shadow.
    #[inline]
    pub const fn total_height(&self) -> u16 {
        self.height.saturating_add(self.bottom_shadow)
    }

    #[inline]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[inline]
    pub const fn shadow(&self) -> Size {
        Size::new(self.right_shadow, self.bottom_shadow)
    }

    /// Size including shadows.
    #[inline]
    pub const fn total_size(&self) -> Size {
        Size::new(self.total_width(), self.total_height())
    }

    /// Map a global position to local cell coordinates, shadow included.
    #[inline]
    pub fn local(&self, p: Point) -> Option<(u16, u16)> {
        let x = i64::from(p.x) - i64::from(self.offset.x);
        let y = i64::from(p.y) - i64::from(self.offset.y);
        if x < 0 || y < 0 || x >= i64::from(self.total_width()) || y >= i64::from(self.total_height())
        {
            return None;
        }
        Some((x as u16, y as u16))
    }

    /// Whether a global position falls inside the area, shadow included.
    #[inline]
    pub fn contains_global(&self, p: Point) -> bool {
        self.local(p).is_some()
    }

    // ── Cell access ────────────────────────────────────────────────────

    #[inline]
    fn index(&self, x: u16, y: u16) -> usize {
        usize::from(y) * usize::from(self.total_width()) + usize::from(x)
    }

    /// Cell at local coordinates.
    #[inline]
    pub fn cell(&self, x: u16, y: u16) -> Option<&Cell> {
        if x < self.total_width() && y < self.total_height() {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// Cell at a global position.
    #[inline]
    pub fn cell_at_global(&self, p: Point) -> Option<&Cell> {
        let (x, y) = self.local(p)?;
        self.cell(x, y)
    }

    /// One row of cells, shadow included.
    #[inline]
    pub fn row(&self, y: u16) -> Option<&[Cell]> {
        if y >= self.total_height() {
            return None;
        }
        let start = self.index(0, y);
        Some(&self.cells[start..start + usize::from(self.total_width())])
    }

    /// All cells in row-major order.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    // ── Damage ─────────────────────────────────────────────────────────

    #[inline]
    pub fn line(&self, y: u16) -> Option<&LineDamage> {
        self.lines.get(usize::from(y))
    }

    #[inline]
    pub fn lines(&self) -> &[LineDamage] {
        &self.lines
    }

    /// Whether the area needs merging.
    #[inline]
    pub const fn has_changes(&self) -> bool {
        self.has_changes
    }

    /// Flag the area for merging without touching line ranges.
    #[inline]
    pub fn set_changed(&mut self) {
        self.has_changes = true;
    }

    /// Whether any line carries damage.
    pub fn has_damage(&self) -> bool {
        self.lines.iter().any(LineDamage::is_damaged)
    }

    /// Mark every column of every line as damaged.
    pub fn mark_all_dirty(&mut self) {
        let last = self.total_width().saturating_sub(1);
        if self.total_width() > 0 {
            for line in &mut self.lines {
                line.xmin = 0;
                line.xmax = last;
            }
        }
        self.has_changes = true;
    }

    /// Clear every damage range and the dirty flag.
    pub fn reset_damage(&mut self) {
        let width = self.total_width();
        for line in &mut self.lines {
            line.reset(width);
        }
        self.has_changes = false;
    }

    /// Clear one line's damage range.
    #[inline]
    pub fn reset_line(&mut self, y: u16) {
        let width = self.total_width();
        if let Some(line) = self.lines.get_mut(usize::from(y)) {
            line.reset(width);
        }
    }

    // ── Writing ────────────────────────────────────────────────────────

    /// Bounds-checked write at local coordinates.
    ///
    /// Returns `true` if the stored cell changed. Out-of-range positions
    /// are ignored.
    pub fn write_at(&mut self, x: i32, y: i32, cell: Cell) -> bool {
        let (Ok(x), Ok(y)) = (u16::try_from(x), u16::try_from(y)) else {
            return false;
        };
        if x >= self.total_width() || y >= self.total_height() {
            return false;
        }
        let idx = self.index(x, y);
        let old = self.cells[idx];
        if old == cell {
            return false;
        }
        let line = &mut self.lines[usize::from(y)];
        match (
            old.transparency.is_see_through(),
            cell.transparency.is_see_through(),
        ) {
            (false, true) => line.trans_count += 1,
            (true, false) => line.trans_count -= 1,
            _ => {}
        }
        line.include(x);
        self.cells[idx] = Cell {
            flags: CellFlags::empty(),
            ..cell
        };
        self.has_changes = true;
        true
    }

    /// Fill the content region from the graphics context.
    ///
    /// Shadow columns and rows get a transparent cell carrying the same
    /// visual attributes. Every line ends up fully damaged.
    pub fn clear(&mut self, fill: char, gc: &GraphicsContext) {
        let content = gc.cell(fill);
        let shadow = content.with_transparency(Transparency::Transparent);
        let total_w = self.total_width();
        for y in 0..self.total_height() {
            let mut trans = 0u16;
            for x in 0..total_w {
                let cell = if x < self.width && y < self.height {
                    content
                } else {
                    shadow
                };
                if cell.transparency.is_see_through() {
                    trans += 1;
                }
                let idx = self.index(x, y);
                self.cells[idx] = cell;
            }
            self.lines[usize::from(y)].trans_count = trans;
        }
        self.print_cursor = (0, 0);
        self.mark_all_dirty();
    }

    /// Store a composited cell into this area as the virtual terminal.
    ///
    /// A cell identical to an already printed one stays printed and
    /// leaves the damage range alone; anything else replaces the cell,
    /// drops the bookkeeping and widens the damage.
    pub(crate) fn store_composited(&mut self, x: u16, y: u16, cell: Cell) {
        if x >= self.total_width() || y >= self.total_height() {
            return;
        }
        let idx = self.index(x, y);
        let cell = Cell {
            transparency: Transparency::Opaque,
            flags: CellFlags::empty(),
            ..cell
        };
        let slot = &mut self.cells[idx];
        if slot.is_printed() && *slot == cell {
            return;
        }
        *slot = cell;
        self.lines[usize::from(y)].include(x);
        self.has_changes = true;
    }

    /// Record that the terminal now shows cells `[x0, x1]` of row `y`.
    pub(crate) fn mark_printed(&mut self, x0: u16, x1: u16, y: u16) {
        if y >= self.total_height() || x0 > x1 {
            return;
        }
        let x1 = x1.min(self.total_width().saturating_sub(1));
        let start = self.index(x0, y);
        let end = self.index(x1, y);
        for cell in &mut self.cells[start..=end] {
            cell.flags = CellFlags::PRINTED;
        }
    }

    /// Forget what the terminal shows: every cell unprinted, all dirty.
    pub fn invalidate_printed(&mut self) {
        for cell in &mut self.cells {
            cell.flags = CellFlags::empty();
        }
        self.mark_all_dirty();
    }

    // ── Cursors, visibility, ownership ─────────────────────────────────

    /// Current print cursor (0-based column, row).
    #[inline]
    pub const fn print_cursor(&self) -> (u16, u16) {
        self.print_cursor
    }

    /// Move the print cursor. The row may equal `total_height`, which
    /// makes further printing a no-op.
    #[inline]
    pub fn set_print_cursor(&mut self, x: u16, y: u16) {
        self.print_cursor = (x, y);
    }

    /// Input cursor position in local content coordinates.
    #[inline]
    pub const fn input_cursor(&self) -> Point {
        self.input_cursor
    }

    #[inline]
    pub fn set_input_cursor(&mut self, pos: Point) {
        self.input_cursor = pos;
    }

    #[inline]
    pub const fn is_input_cursor_visible(&self) -> bool {
        self.input_cursor_visible
    }

    #[inline]
    pub fn set_input_cursor_visible(&mut self, visible: bool) {
        self.input_cursor_visible = visible;
    }

    #[inline]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    #[inline]
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    #[inline]
    pub const fn owner(&self) -> Option<OwnerTag> {
        self.owner
    }

    #[inline]
    pub fn set_owner(&mut self, owner: Option<OwnerTag>) {
        self.owner = owner;
    }
}
