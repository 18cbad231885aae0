#![forbid(unsafe_code)]

//! Window-stack compositing into the virtual terminal.
//!
//! The virtual terminal is an ordinary [`Area`] the size of the screen.
//! Windows are merged into it back to front; every merged position is
//! resolved against the whole stack so that transparent, shadow and
//! inherit-background cells pick up whatever lies below them, and cells
//! hidden behind an opaque window higher up are left alone.
//!
//! # Layer folding
//!
//! Resolution starts from the desktop cell and applies one layer at a time
//! with [`apply_layer`]:
//!
//! | Top cell | Result |
//! |----------|--------|
//! | `Opaque` | top cell |
//! | `Transparent` | lower cell |
//! | `Shadow` | lower glyph and style, top colors, no reverse/standout, block glyphs become spaces |
//! | `InheritBackground` | top glyph, fg and style with the lower background |
//!
//! The result of a fold is always opaque.

use vtstack_core::geometry::{Point, Rect};

use crate::area::Area;
use crate::arena::{AreaArena, AreaId};
use crate::cell::{Cell, CellFlags, StyleFlags, Transparency, is_shadow_hidden_glyph};
use crate::window_stack::{Layered, WindowDescriptor, WindowStack};

/// How a position is hidden by windows above a given layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    NotCovered,
    /// Only see-through cells (shadow or inherit-background) lie above.
    HalfCovered,
    /// An opaque cell lies above.
    FullyCovered,
}

/// Fold one layer onto the cell below it.
pub fn apply_layer(below: Cell, top: Cell) -> Cell {
    let out = match top.transparency {
        Transparency::Opaque => top,
        Transparency::Transparent => below,
        Transparency::Shadow => {
            let ch = if is_shadow_hidden_glyph(below.ch) {
                ' '
            } else {
                below.ch
            };
            Cell {
                ch,
                fg: top.fg,
                bg: top.bg,
                style: below.style - (StyleFlags::REVERSE | StyleFlags::STANDOUT),
                ..below
            }
        }
        Transparency::InheritBackground => Cell { bg: below.bg, ..top },
    };
    Cell {
        transparency: Transparency::Opaque,
        flags: CellFlags::empty(),
        ..out
    }
}

/// Read-only view of everything that takes part in compositing.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub areas: &'a AreaArena,
    pub stack: &'a WindowStack,
    pub desktop: &'a Area,
}

impl<'a> Scene<'a> {
    pub fn new(areas: &'a AreaArena, stack: &'a WindowStack, desktop: &'a Area) -> Self {
        Self {
            areas,
            stack,
            desktop,
        }
    }

    /// The area of a window if it currently takes part in compositing.
    fn shown_area(&self, window: &WindowDescriptor) -> Option<&'a Area> {
        if !window.is_visible() {
            return None;
        }
        let area = self.areas.get(window.area?)?;
        area.is_visible().then_some(area)
    }

    fn window_cell(&self, window: &WindowDescriptor, p: Point) -> Option<Cell> {
        self.shown_area(window)?.cell_at_global(p).copied()
    }

    fn desktop_cell(&self, p: Point) -> Cell {
        let cell = self.desktop.cell_at_global(p).copied().unwrap_or(Cell::BLANK);
        Cell {
            transparency: Transparency::Opaque,
            flags: CellFlags::empty(),
            ..cell
        }
    }

    /// Layer of the window that owns `area`, if it is stacked.
    #[inline]
    pub fn layer_of(&self, area: AreaId) -> Option<usize> {
        self.stack.layer_of_area(area)
    }

    /// Coverage of `p` by windows strictly above `layer`.
    ///
    /// `None` stands for "below every window", which is how the desktop
    /// is queried. Shadows and inherit-background cells mark the position
    /// half covered and the scan continues; the first opaque cell ends it.
    pub fn coverage_above(&self, p: Point, layer: Option<usize>) -> Coverage {
        let start = layer.map_or(0, |l| l + 1);
        let mut coverage = Coverage::NotCovered;
        for window in self.stack.entries().iter().skip(start) {
            let Some(cell) = self.window_cell(window, p) else {
                continue;
            };
            match cell.transparency {
                Transparency::Opaque => return Coverage::FullyCovered,
                Transparency::Shadow | Transparency::InheritBackground => {
                    coverage = Coverage::HalfCovered;
                }
                Transparency::Transparent => {}
            }
        }
        coverage
    }

    /// Coverage of `p` by windows above the one owning `area`.
    ///
    /// An area outside the stack is treated as front-most.
    pub fn is_covered(&self, p: Point, area: AreaId) -> Coverage {
        match self.layer_of(area) {
            Some(layer) => self.coverage_above(p, Some(layer)),
            None => Coverage::NotCovered,
        }
    }

    /// What shows through at `p` underneath `layer`.
    ///
    /// `None` folds the whole stack, which is what an area that is not
    /// stacked sees below itself.
    pub fn covered_character(&self, p: Point, layer: Option<usize>) -> Cell {
        let end = layer.unwrap_or(self.stack.len()).min(self.stack.len());
        self.stack.entries()[..end]
            .iter()
            .filter_map(|w| self.window_cell(w, p))
            .fold(self.desktop_cell(p), apply_layer)
    }

    /// The desktop at `p` with every window above `layer` folded on top.
    pub fn overlapped_character(&self, p: Point, layer: usize) -> Cell {
        self.fold_above(self.desktop_cell(p), p, Some(layer))
    }

    /// The final screen content at `p`.
    pub fn generate_character(&self, p: Point) -> Cell {
        self.covered_character(p, None)
    }

    fn fold_above(&self, base: Cell, p: Point, layer: Option<usize>) -> Cell {
        let start = layer.map_or(0, |l| l + 1);
        self.stack
            .entries()
            .iter()
            .skip(start)
            .filter_map(|w| self.window_cell(w, p))
            .fold(base, apply_layer)
    }

    /// Resolve a cell of the window at `layer` for the screen position `p`.
    fn resolve(&self, own: Cell, p: Point, layer: Option<usize>) -> Cell {
        if own.transparency == Transparency::Opaque {
            return apply_layer(Cell::BLANK, own);
        }
        apply_layer(self.covered_character(p, layer), own)
    }
}

/// Composite `area` onto the virtual terminal at its own offset.
///
/// `layer` locates the area in the stack for transparency lookups; `None`
/// resolves see-through cells against the full stack. Lines without
/// see-through cells are copied directly. Cells of windows higher up are
/// not consulted, so this overwrites whatever they put there.
pub fn put_area(vterm: &mut Area, scene: &Scene<'_>, area: &Area, layer: Option<usize>) {
    put_area_at(vterm, scene, area, area.offset(), layer);
}

/// [`put_area`] at an explicit global position.
pub fn put_area_at(
    vterm: &mut Area,
    scene: &Scene<'_>,
    area: &Area,
    pos: Point,
    layer: Option<usize>,
) {
    #[cfg(feature = "tracing")]
    let _span = tracing::trace_span!("put_area", x = pos.x, y = pos.y).entered();

    let Some(clip) = visible_rect(vterm, pos, area) else {
        return;
    };
    for gy in clip.y..clip.bottom() {
        let ly = (i32::from(gy) - pos.y) as u16;
        let opaque_line = area.line(ly).is_some_and(|l| l.trans_count == 0);
        for gx in clip.x..clip.right() {
            let lx = (i32::from(gx) - pos.x) as u16;
            let Some(&own) = area.cell(lx, ly) else {
                continue;
            };
            let cell = if opaque_line {
                own
            } else {
                scene.resolve(own, Point::from((gx, gy)), layer)
            };
            vterm.store_composited(gx, gy, cell);
        }
    }
}

/// Copy the virtual terminal region under `pos` into `area`.
pub fn get_area(vterm: &Area, area: &mut Area, pos: Point) {
    let Some(clip) = visible_rect(vterm, pos, area) else {
        return;
    };
    for gy in clip.y..clip.bottom() {
        for gx in clip.x..clip.right() {
            if let Some(&cell) = vterm.cell(gx, gy) {
                let lx = i32::from(gx) - pos.x;
                let ly = i32::from(gy) - pos.y;
                area.write_at(lx, ly, cell);
            }
        }
    }
}

/// Recompute every virtual-terminal cell in `rect` from the stack.
pub fn restore_vterm(vterm: &mut Area, scene: &Scene<'_>, rect: Rect) {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!(
        "restore_vterm",
        x = rect.x,
        y = rect.y,
        width = rect.width,
        height = rect.height
    )
    .entered();

    let screen = Rect::from_size(vterm.width(), vterm.height());
    let Some(rect) = rect.intersection_opt(&screen) else {
        return;
    };
    for gy in rect.y..rect.bottom() {
        for gx in rect.x..rect.right() {
            let cell = scene.generate_character(Point::from((gx, gy)));
            vterm.store_composited(gx, gy, cell);
        }
    }
}

/// Merge every damaged area into the virtual terminal.
///
/// The desktop goes first, then stacked windows back to front. Returns
/// the number of areas merged. Damage on the merged areas is left for the
/// caller to reset.
pub fn update_vterm(vterm: &mut Area, scene: &Scene<'_>) -> usize {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("update_vterm", windows = scene.stack.len()).entered();

    let mut merged = 0;
    if scene.desktop.has_changes() {
        merge_desktop(vterm, scene);
        merged += 1;
    }
    for (layer, window) in scene.stack.entries().iter().enumerate() {
        let Some(area) = scene.shown_area(window) else {
            continue;
        };
        if !area.has_changes() {
            continue;
        }
        merge_window(vterm, scene, area, layer);
        merged += 1;
    }
    merged
}

fn merge_desktop(vterm: &mut Area, scene: &Scene<'_>) {
    let desktop = scene.desktop;
    let origin = desktop.offset();
    for (ly, line) in desktop.lines().iter().enumerate() {
        if !line.is_damaged() {
            continue;
        }
        let gy = origin.y + ly as i32;
        for lx in line.xmin..=line.xmax {
            let p = Point::new(origin.x + i32::from(lx), gy);
            let Some((gx, gy)) = p.to_cell() else {
                continue;
            };
            if gx >= vterm.width() || gy >= vterm.height() {
                continue;
            }
            if scene.coverage_above(p, None) == Coverage::FullyCovered {
                continue;
            }
            vterm.store_composited(gx, gy, scene.generate_character(p));
        }
    }
}

fn merge_window(vterm: &mut Area, scene: &Scene<'_>, area: &Area, layer: usize) {
    let origin = area.offset();
    for (ly, line) in area.lines().iter().enumerate() {
        if !line.is_damaged() {
            continue;
        }
        let gy = origin.y + ly as i32;
        for lx in line.xmin..=line.xmax {
            let p = Point::new(origin.x + i32::from(lx), gy);
            let Some((gx, gy)) = p.to_cell() else {
                continue;
            };
            if gx >= vterm.width() || gy >= vterm.height() {
                continue;
            }
            let Some(&own) = area.cell(lx, ly as u16) else {
                continue;
            };
            let cell = match scene.coverage_above(p, Some(layer)) {
                Coverage::FullyCovered => continue,
                Coverage::NotCovered => scene.resolve(own, p, Some(layer)),
                Coverage::HalfCovered => {
                    let resolved = scene.resolve(own, p, Some(layer));
                    scene.fold_above(resolved, p, Some(layer))
                }
            };
            vterm.store_composited(gx, gy, cell);
        }
    }
}

/// The part of `area` placed at `pos` that lies on the virtual terminal.
fn visible_rect(vterm: &Area, pos: Point, area: &Area) -> Option<Rect> {
    let placed = Rect::clip_signed(pos, area.total_size())?;
    placed.intersection_opt(&Rect::from_size(vterm.width(), vterm.height()))
}
