#![forbid(unsafe_code)]

//! The compositor context: everything one screen needs, in one value.
//!
//! [`CompositorContext`] owns the area arena, the window stack, the
//! virtual desktop, the virtual terminal, the current graphics context
//! and the update scheduler. It is created when the application starts,
//! passed by reference wherever drawing happens, and dropped at exit.
//! The terminal output itself lives in a separate [`TerminalSync`] so
//! the context can be driven against any writer.
//!
//! # Usage
//!
//! ```
//! use vtstack_core::geometry::{Point, Size};
//! use vtstack_core::terminal_capabilities::TerminalCapabilities;
//! use vtstack_render::context::{CompositorContext, ContextConfig};
//! use vtstack_render::sync::TerminalSync;
//!
//! let config = ContextConfig::default().with_size(Size::new(40, 10));
//! let mut ctx = CompositorContext::new(config).unwrap();
//! let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
//!
//! let area = ctx.acquire_area(Point::new(2, 1), Size::new(12, 3), Size::ZERO, None).unwrap();
//! ctx.push_window(Some(area), None);
//! ctx.print(area, "hello").unwrap();
//!
//! let stats = ctx.flush(&mut sync).unwrap();
//! assert!(stats.bytes_emitted > 0);
//! ```

use std::fmt;
use std::io::{self, Write};

use vtstack_core::geometry::{Point, Rect, Size};

use crate::area::{Area, AreaError, OwnerTag};
use crate::arena::{AreaArena, AreaId};
use crate::cell::{Color, GraphicsContext, StyleFlags, Transparency};
use crate::charset::Encoding;
use crate::compositor::{self, Scene};
use crate::cursor::{CursorRequest, resolve_cursor};
use crate::flush_stats::FlushStats;
use crate::print::{DEFAULT_TAB_WIDTH, PrintOutcome};
use crate::scheduler::{InputProbe, NoInput, SchedulerConfig, SyncDecision, UpdateScheduler};
use crate::sync::{SyncConfig, TerminalSync};
use crate::window_stack::{WindowDescriptor, WindowId, WindowStack};

/// Errors raised by context operations.
#[derive(Debug)]
pub enum ContextError {
    /// An area could not be allocated or resized.
    Area(AreaError),
    /// The handle does not name a live area.
    UnknownArea(AreaId),
    /// The id does not name a stacked window.
    UnknownWindow(WindowId),
    /// Querying the terminal failed.
    Io(io::Error),
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Area(err) => write!(f, "area error: {err}"),
            Self::UnknownArea(id) => write!(f, "unknown area handle {id:?}"),
            Self::UnknownWindow(id) => write!(f, "unknown window {id}"),
            Self::Io(err) => write!(f, "terminal I/O error: {err}"),
        }
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Area(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::UnknownArea(_) | Self::UnknownWindow(_) => None,
        }
    }
}

impl From<AreaError> for ContextError {
    fn from(err: AreaError) -> Self {
        Self::Area(err)
    }
}

impl From<io::Error> for ContextError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

/// Construction-time settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextConfig {
    /// Terminal size in cells.
    pub size: Size,
    /// Tab stop width used by [`CompositorContext::print`].
    pub tab_width: u16,
    /// Draw the lower half block as a reversed upper half block.
    pub new_font: bool,
    /// Force an output encoding.
    pub encoding: Option<Encoding>,
    /// Character the desktop is filled with.
    pub desktop_fill: char,
    pub desktop_fg: Color,
    pub desktop_bg: Color,
    pub scheduler: SchedulerConfig,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            size: Size::new(80, 24),
            tab_width: DEFAULT_TAB_WIDTH,
            new_font: false,
            encoding: None,
            desktop_fill: ' ',
            desktop_fg: Color::Default,
            desktop_bg: Color::Default,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl ContextConfig {
    #[must_use]
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_desktop(mut self, fill: char, fg: Color, bg: Color) -> Self {
        self.desktop_fill = fill;
        self.desktop_fg = fg;
        self.desktop_bg = bg;
        self
    }

    #[must_use]
    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Output settings for a [`TerminalSync`] driving this context.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            new_font: self.new_font,
            encoding: self.encoding,
        }
    }
}

type PlainHook = Box<dyn FnMut(&mut Area)>;
type ChildHook = Box<dyn FnMut(&Area, &mut Area)>;

enum Hook {
    Plain(PlainHook),
    /// Fills the target from a child area, e.g. a scrolled viewport.
    Child { source: AreaId, hook: ChildHook },
}

struct Preprocessor {
    target: AreaId,
    hook: Hook,
}

impl fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Preprocessor");
        s.field("target", &self.target);
        if let Hook::Child { source, .. } = &self.hook {
            s.field("source", source);
        }
        s.finish_non_exhaustive()
    }
}

/// Global rectangle an area occupies on screen, shadow included.
fn screen_rect(area: &Area) -> Option<Rect> {
    Rect::clip_signed(area.offset(), area.total_size())
}

/// All compositing state of one terminal screen.
#[derive(Debug)]
pub struct CompositorContext {
    config: ContextConfig,
    areas: AreaArena,
    stack: WindowStack,
    desktop: Area,
    vterm: Area,
    gc: GraphicsContext,
    scheduler: UpdateScheduler,
    preprocessors: Vec<Preprocessor>,
    bell_pending: bool,
}

impl CompositorContext {
    /// Allocate the desktop and virtual terminal.
    ///
    /// The virtual terminal starts fully damaged so the first flush
    /// paints the whole screen.
    pub fn new(config: ContextConfig) -> Result<Self, ContextError> {
        let mut desktop = Area::new(Point::ORIGIN, config.size, Size::ZERO)?;
        desktop.set_visible(true);
        desktop.clear(
            config.desktop_fill,
            &GraphicsContext::new(config.desktop_fg, config.desktop_bg),
        );
        let mut vterm = Area::new(Point::ORIGIN, config.size, Size::ZERO)?;
        vterm.set_visible(true);
        vterm.mark_all_dirty();
        vtstack_core::info!(
            width = config.size.width,
            height = config.size.height,
            "compositor context created"
        );
        Ok(Self {
            config,
            areas: AreaArena::with_key(),
            stack: WindowStack::new(),
            desktop,
            vterm,
            gc: GraphicsContext::default(),
            scheduler: UpdateScheduler::new(config.scheduler),
            preprocessors: Vec::new(),
            bell_pending: false,
        })
    }

    /// Like [`new`](Self::new), sized from the real terminal.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn from_terminal(config: ContextConfig) -> Result<Self, ContextError> {
        let (width, height) = crossterm::terminal::size()?;
        Self::new(config.with_size(Size::new(width, height)))
    }

    // ── Accessors ──────────────────────────────────────────────────────

    #[inline]
    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.vterm.size()
    }

    #[inline]
    pub fn areas(&self) -> &AreaArena {
        &self.areas
    }

    #[inline]
    pub fn stack(&self) -> &WindowStack {
        &self.stack
    }

    #[inline]
    pub fn desktop(&self) -> &Area {
        &self.desktop
    }

    /// The desktop for drawing; changes are merged on the next update.
    #[inline]
    pub fn desktop_mut(&mut self) -> &mut Area {
        &mut self.desktop
    }

    #[inline]
    pub fn vterm(&self) -> &Area {
        &self.vterm
    }

    #[inline]
    pub fn area(&self, id: AreaId) -> Option<&Area> {
        self.areas.get(id)
    }

    #[inline]
    pub fn area_mut(&mut self, id: AreaId) -> Option<&mut Area> {
        self.areas.get_mut(id)
    }

    #[inline]
    pub fn graphics_context(&self) -> &GraphicsContext {
        &self.gc
    }

    #[inline]
    pub fn graphics_context_mut(&mut self) -> &mut GraphicsContext {
        &mut self.gc
    }

    #[inline]
    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    #[inline]
    pub fn scheduler_mut(&mut self) -> &mut UpdateScheduler {
        &mut self.scheduler
    }

    /// Whether a BEL is waiting for the next flush.
    #[inline]
    pub fn bell_pending(&self) -> bool {
        self.bell_pending
    }

    /// Read-only compositing view.
    pub fn scene(&self) -> Scene<'_> {
        Scene::new(&self.areas, &self.stack, &self.desktop)
    }

    fn get(&self, id: AreaId) -> Result<&Area, ContextError> {
        self.areas.get(id).ok_or(ContextError::UnknownArea(id))
    }

    fn get_mut(&mut self, id: AreaId) -> Result<&mut Area, ContextError> {
        self.areas.get_mut(id).ok_or(ContextError::UnknownArea(id))
    }

    // ── Areas ──────────────────────────────────────────────────────────

    /// Allocate a visible area. It takes part in compositing once a
    /// window refers to it.
    pub fn acquire_area(
        &mut self,
        offset: Point,
        size: Size,
        shadow: Size,
        owner: Option<OwnerTag>,
    ) -> Result<AreaId, ContextError> {
        let mut area = Area::new(offset, size, shadow)?;
        area.set_owner(owner);
        area.set_visible(true);
        Ok(self.areas.insert(area))
    }

    /// Resize an area in place and repair the screen it used to cover.
    ///
    /// On allocation failure the area keeps its previous buffers.
    pub fn resize_area(
        &mut self,
        id: AreaId,
        offset: Point,
        size: Size,
        shadow: Size,
    ) -> Result<(), ContextError> {
        let area = self.get_mut(id)?;
        let old = screen_rect(area);
        area.resize(offset, size, shadow)?;
        area.mark_all_dirty();
        if let Some(rect) = old {
            self.restore_vterm(rect);
        }
        Ok(())
    }

    /// Move an area; the old position is restored from the stack.
    pub fn move_area(&mut self, id: AreaId, offset: Point) -> Result<(), ContextError> {
        let area = self.get_mut(id)?;
        let old = screen_rect(area);
        area.set_offset(offset);
        area.mark_all_dirty();
        if let Some(rect) = old {
            self.restore_vterm(rect);
        }
        Ok(())
    }

    /// Free an area, detaching it from its window and hooks.
    pub fn release_area(&mut self, id: AreaId) -> Result<Area, ContextError> {
        let window = self.stack.window_for_area(id).map(|w| w.id);
        if let Some(window) = window {
            self.stack.attach_area(window, None);
        }
        self.preprocessors.retain(|p| {
            p.target != id && !matches!(p.hook, Hook::Child { source, .. } if source == id)
        });
        let area = self.areas.remove(id).ok_or(ContextError::UnknownArea(id))?;
        if let Some(rect) = screen_rect(&area) {
            self.restore_vterm(rect);
        }
        Ok(area)
    }

    pub fn set_area_visible(&mut self, id: AreaId, visible: bool) -> Result<(), ContextError> {
        let area = self.get_mut(id)?;
        if area.is_visible() == visible {
            return Ok(());
        }
        area.set_visible(visible);
        if visible {
            area.mark_all_dirty();
        } else if let Some(rect) = screen_rect(area) {
            self.restore_vterm(rect);
        }
        Ok(())
    }

    /// Flag an area for merging on the next update.
    pub fn mark_dirty(&mut self, id: AreaId) -> Result<(), ContextError> {
        self.get_mut(id)?.set_changed();
        Ok(())
    }

    // ── Writing ────────────────────────────────────────────────────────

    /// Print `text` at the area's print cursor with the current
    /// graphics context. A BEL is queued for the next flush.
    pub fn print(&mut self, id: AreaId, text: &str) -> Result<PrintOutcome, ContextError> {
        let (gc, tab_width) = (self.gc, self.config.tab_width);
        let outcome = self.get_mut(id)?.print_tabbed(text, &gc, tab_width);
        self.bell_pending |= outcome.bell;
        Ok(outcome)
    }

    pub fn print_char(&mut self, id: AreaId, ch: char) -> Result<PrintOutcome, ContextError> {
        let mut buf = [0u8; 4];
        self.print(id, ch.encode_utf8(&mut buf))
    }

    /// Colors and style stamped onto subsequently printed cells.
    pub fn set_output_attributes(&mut self, fg: Color, bg: Color, style: StyleFlags) {
        self.gc.set_colors(fg, bg);
        self.gc.set_style(style);
    }

    pub fn set_transparency(&mut self, transparency: Transparency) {
        self.gc.set_transparency(transparency);
    }

    pub fn set_print_cursor(&mut self, id: AreaId, x: u16, y: u16) -> Result<(), ContextError> {
        self.get_mut(id)?.set_print_cursor(x, y);
        Ok(())
    }

    /// Fill an area with `fill` in the current graphics context.
    pub fn clear_area(&mut self, id: AreaId, fill: char) -> Result<(), ContextError> {
        let gc = self.gc;
        self.get_mut(id)?.clear(fill, &gc);
        Ok(())
    }

    /// Place (and show or hide) an area's input cursor.
    pub fn set_input_cursor(
        &mut self,
        id: AreaId,
        pos: Point,
        visible: bool,
    ) -> Result<(), ContextError> {
        let area = self.get_mut(id)?;
        area.set_input_cursor(pos);
        area.set_input_cursor_visible(visible);
        Ok(())
    }

    // ── Window stack ───────────────────────────────────────────────────

    /// Stack a new window in front of the others.
    pub fn push_window(&mut self, area: Option<AreaId>, owner: Option<OwnerTag>) -> WindowId {
        let id = self.stack.push(area, owner);
        if let Some(area) = area.and_then(|a| self.areas.get_mut(a)) {
            area.mark_all_dirty();
        }
        id
    }

    pub fn remove_window(&mut self, id: WindowId) -> Result<WindowDescriptor, ContextError> {
        let removed = self.stack.remove(id).ok_or(ContextError::UnknownWindow(id))?;
        if let Some(rect) = removed
            .area
            .and_then(|a| self.areas.get(a))
            .and_then(screen_rect)
        {
            self.restore_vterm(rect);
        }
        Ok(removed)
    }

    pub fn raise_window(&mut self, id: WindowId) -> Result<bool, ContextError> {
        self.require_window(id)?;
        let changed = self.stack.raise(id);
        if changed {
            self.repaint_window(id);
        }
        Ok(changed)
    }

    pub fn lower_window(&mut self, id: WindowId) -> Result<bool, ContextError> {
        self.require_window(id)?;
        let changed = self.stack.lower(id);
        if changed {
            self.repaint_window(id);
        }
        Ok(changed)
    }

    pub fn swap_windows(&mut self, a: WindowId, b: WindowId) -> Result<bool, ContextError> {
        self.require_window(a)?;
        self.require_window(b)?;
        let changed = self.stack.swap(a, b);
        if changed {
            self.repaint_window(a);
            self.repaint_window(b);
        }
        Ok(changed)
    }

    pub fn set_window_visible(&mut self, id: WindowId, visible: bool) -> Result<(), ContextError> {
        self.require_window(id)?;
        self.stack.set_visible(id, visible);
        self.repaint_window(id);
        Ok(())
    }

    pub fn set_always_on_top(&mut self, id: WindowId, on: bool) -> Result<(), ContextError> {
        self.require_window(id)?;
        self.stack.set_always_on_top(id, on);
        self.repaint_window(id);
        Ok(())
    }

    /// Mark the window that owns the hardware cursor.
    pub fn set_active_window(&mut self, id: Option<WindowId>) -> Result<(), ContextError> {
        if let Some(window) = id {
            self.require_window(window)?;
        }
        self.stack.set_active(id);
        Ok(())
    }

    /// Bind a retained area to a window, repainting both old and new.
    pub fn attach_area(&mut self, id: WindowId, area: Option<AreaId>) -> Result<(), ContextError> {
        let old = self.stack.get(id).ok_or(ContextError::UnknownWindow(id))?.area;
        if let Some(area) = area {
            self.get(area)?;
        }
        self.stack.attach_area(id, area);
        if let Some(rect) = old.and_then(|a| self.areas.get(a)).and_then(screen_rect) {
            self.restore_vterm(rect);
        }
        if let Some(area) = area.and_then(|a| self.areas.get_mut(a)) {
            area.mark_all_dirty();
        }
        Ok(())
    }

    fn require_window(&self, id: WindowId) -> Result<(), ContextError> {
        self.stack
            .get(id)
            .map(|_| ())
            .ok_or(ContextError::UnknownWindow(id))
    }

    /// Regenerate the screen under a window after its stacking changed.
    fn repaint_window(&mut self, id: WindowId) {
        let rect = self
            .stack
            .get(id)
            .and_then(|w| w.area)
            .and_then(|a| self.areas.get(a))
            .and_then(screen_rect);
        if let Some(rect) = rect {
            self.restore_vterm(rect);
        }
    }

    // ── Compositing ────────────────────────────────────────────────────

    /// Composite one area into the virtual terminal right now.
    pub fn put_area(&mut self, id: AreaId) -> Result<(), ContextError> {
        let offset = self.get(id)?.offset();
        self.put_area_at(id, offset)
    }

    /// Composite one area at an explicit position, e.g. while dragging.
    pub fn put_area_at(&mut self, id: AreaId, pos: Point) -> Result<(), ContextError> {
        let area = self.areas.get(id).ok_or(ContextError::UnknownArea(id))?;
        let scene = Scene::new(&self.areas, &self.stack, &self.desktop);
        compositor::put_area_at(&mut self.vterm, &scene, area, pos, scene.layer_of(id));
        Ok(())
    }

    /// Copy the virtual terminal under `pos` into an area.
    pub fn get_area(&mut self, id: AreaId, pos: Point) -> Result<(), ContextError> {
        let area = self.areas.get_mut(id).ok_or(ContextError::UnknownArea(id))?;
        compositor::get_area(&self.vterm, area, pos);
        Ok(())
    }

    /// Recompute a screen rectangle from the window stack.
    pub fn restore_vterm(&mut self, rect: Rect) {
        let scene = Scene::new(&self.areas, &self.stack, &self.desktop);
        compositor::restore_vterm(&mut self.vterm, &scene, rect);
    }

    /// Run preprocessing hooks, merge every changed area into the
    /// virtual terminal, then clear all area damage.
    ///
    /// Returns the number of areas merged.
    pub fn update_vterm(&mut self) -> usize {
        self.run_preprocessors();
        let merged = {
            let scene = Scene::new(&self.areas, &self.stack, &self.desktop);
            compositor::update_vterm(&mut self.vterm, &scene)
        };
        for area in self.areas.values_mut() {
            area.reset_damage();
        }
        self.desktop.reset_damage();
        vtstack_core::trace!(merged, "virtual terminal updated");
        merged
    }

    fn run_preprocessors(&mut self) {
        for pre in &mut self.preprocessors {
            if self.stack.window_for_area(pre.target).is_none() {
                continue;
            }
            match &mut pre.hook {
                Hook::Plain(hook) => {
                    if let Some(target) = self.areas.get_mut(pre.target)
                        && target.has_changes()
                    {
                        hook(target);
                    }
                }
                Hook::Child { source, hook } => {
                    if let Some([child, target]) =
                        self.areas.get_disjoint_mut([*source, pre.target])
                        && (child.has_changes() || target.has_changes())
                    {
                        hook(&*child, target);
                    }
                }
            }
        }
    }

    /// Run `hook` on the area just before a merge pass that finds it
    /// changed. Hooks run in registration order.
    pub fn register_preprocessor(
        &mut self,
        target: AreaId,
        hook: impl FnMut(&mut Area) + 'static,
    ) -> Result<(), ContextError> {
        self.get(target)?;
        self.preprocessors.push(Preprocessor {
            target,
            hook: Hook::Plain(Box::new(hook)),
        });
        Ok(())
    }

    /// Run `hook` with a child area as its source whenever the child or
    /// the target changed.
    pub fn register_child_preprocessor(
        &mut self,
        target: AreaId,
        child: AreaId,
        hook: impl FnMut(&Area, &mut Area) + 'static,
    ) -> Result<(), ContextError> {
        self.get(target)?;
        self.get(child)?;
        self.preprocessors.push(Preprocessor {
            target,
            hook: Hook::Child {
                source: child,
                hook: Box::new(hook),
            },
        });
        Ok(())
    }

    /// Drop every hook targeting `target`; returns how many were removed.
    pub fn unregister_preprocessor(&mut self, target: AreaId) -> usize {
        let before = self.preprocessors.len();
        self.preprocessors.retain(|p| p.target != target);
        before - self.preprocessors.len()
    }

    // ── Terminal updates ───────────────────────────────────────────────

    pub fn start_update(&mut self) {
        self.scheduler.start_update();
    }

    pub fn finish_update(&mut self) {
        self.scheduler.finish_update();
    }

    /// Fence terminal syncs until [`start`](Self::start).
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    pub fn start(&mut self) {
        self.scheduler.start();
    }

    /// Run `f` with terminal syncs fenced off.
    pub fn scoped_batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_stopped = self.scheduler.is_stopped();
        self.stop();
        let result = f(self);
        if !was_stopped {
            self.start();
        }
        result
    }

    /// Where the hardware cursor belongs right now.
    pub fn cursor_request(&self) -> CursorRequest {
        resolve_cursor(&self.scene(), self.vterm.size())
    }

    /// Sync the terminal if the scheduler allows it.
    ///
    /// Returns `None` when the sync was deferred or blocked.
    pub fn update_terminal<W: Write>(
        &mut self,
        sync: &mut TerminalSync<W>,
        probe: &mut impl InputProbe,
    ) -> io::Result<Option<FlushStats>> {
        match self.scheduler.poll(probe) {
            SyncDecision::Run => {}
            SyncDecision::Defer | SyncDecision::Blocked => return Ok(None),
        }
        self.update_vterm();
        let cursor = self.cursor_request();
        let bell = std::mem::take(&mut self.bell_pending);
        sync.flush(&mut self.vterm, cursor, bell).map(Some)
    }

    /// Sync now, bypassing input batching (but not a [`stop`](Self::stop)
    /// fence, which yields empty stats).
    pub fn flush<W: Write>(&mut self, sync: &mut TerminalSync<W>) -> io::Result<FlushStats> {
        self.scheduler.force();
        Ok(self
            .update_terminal(sync, &mut NoInput)?
            .unwrap_or_default())
    }

    /// Reallocate desktop and virtual terminal for a new terminal size.
    ///
    /// Pair with [`invalidate_terminal`](Self::invalidate_terminal) so
    /// the next flush repaints everything.
    pub fn resize_terminal(&mut self, size: Size) -> Result<(), ContextError> {
        self.desktop.resize(Point::ORIGIN, size, Size::ZERO)?;
        self.desktop.clear(
            self.config.desktop_fill,
            &GraphicsContext::new(self.config.desktop_fg, self.config.desktop_bg),
        );
        self.vterm.resize(Point::ORIGIN, size, Size::ZERO)?;
        self.config.size = size;
        for area in self.areas.values_mut() {
            area.mark_all_dirty();
        }
        vtstack_core::info!(width = size.width, height = size.height, "terminal resized");
        Ok(())
    }

    /// Forget what the terminal shows; the next flush repaints it all.
    pub fn invalidate_terminal<W: Write>(&mut self, sync: &mut TerminalSync<W>) {
        sync.forget_state();
        self.vterm.invalidate_printed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use crate::terminal_model::TerminalModel;
    use vtstack_core::terminal_capabilities::TerminalCapabilities;

    fn ctx(w: u16, h: u16) -> CompositorContext {
        let config = ContextConfig::default()
            .with_size(Size::new(w, h))
            .with_desktop('.', Color::Default, Color::Default)
            .with_scheduler(SchedulerConfig::immediate());
        CompositorContext::new(config).unwrap()
    }

    fn sync() -> TerminalSync<Vec<u8>> {
        TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color())
    }

    fn screen_row(ctx: &CompositorContext, y: u16) -> String {
        ctx.vterm().row(y).unwrap().iter().map(|c| c.ch).collect()
    }

    #[test]
    fn first_flush_paints_desktop() {
        let mut ctx = ctx(6, 2);
        let mut sync = sync();
        ctx.flush(&mut sync).unwrap();
        let mut model = TerminalModel::new(6, 2);
        model.process(sync.get_ref());
        assert_eq!(model.row_text(0).unwrap(), "......");
        assert_eq!(model.row_text(1).unwrap(), "......");
    }

    #[test]
    fn window_print_reaches_terminal() {
        let mut ctx = ctx(10, 3);
        let a = ctx
            .acquire_area(Point::new(2, 1), Size::new(4, 1), Size::ZERO, None)
            .unwrap();
        ctx.push_window(Some(a), None);
        ctx.clear_area(a, ' ').unwrap();
        ctx.print(a, "hi").unwrap();
        let mut sync = sync();
        ctx.flush(&mut sync).unwrap();
        assert_eq!(screen_row(&ctx, 1), "..hi  ....");
        let mut model = TerminalModel::new(10, 3);
        model.process(sync.get_ref());
        assert_eq!(model.row_text(1).unwrap(), "..hi  ....");
    }

    #[test]
    fn update_clears_all_damage() {
        let mut ctx = ctx(10, 3);
        let a = ctx
            .acquire_area(Point::ORIGIN, Size::new(3, 1), Size::ZERO, None)
            .unwrap();
        ctx.push_window(Some(a), None);
        ctx.print(a, "abc").unwrap();
        ctx.update_vterm();
        assert!(!ctx.area(a).unwrap().has_changes());
        assert!(!ctx.desktop().has_changes());
        assert!(ctx.areas().iter().all(|(_, area)| !area.has_damage()));
    }

    #[test]
    fn move_restores_old_position() {
        let mut ctx = ctx(10, 2);
        let a = ctx
            .acquire_area(Point::ORIGIN, Size::new(3, 1), Size::ZERO, None)
            .unwrap();
        ctx.push_window(Some(a), None);
        ctx.print(a, "abc").unwrap();
        ctx.update_vterm();
        assert_eq!(screen_row(&ctx, 0), "abc.......");
        ctx.move_area(a, Point::new(5, 0)).unwrap();
        ctx.update_vterm();
        assert_eq!(screen_row(&ctx, 0), ".....abc..");
    }

    #[test]
    fn hiding_and_removing_windows_repaints() {
        let mut ctx = ctx(6, 1);
        let a = ctx
            .acquire_area(Point::ORIGIN, Size::new(2, 1), Size::ZERO, None)
            .unwrap();
        let w = ctx.push_window(Some(a), None);
        ctx.print(a, "ab").unwrap();
        ctx.update_vterm();
        ctx.set_window_visible(w, false).unwrap();
        assert_eq!(screen_row(&ctx, 0), "......");
        ctx.set_window_visible(w, true).unwrap();
        assert_eq!(screen_row(&ctx, 0), "ab....");
        ctx.remove_window(w).unwrap();
        assert_eq!(screen_row(&ctx, 0), "......");
        assert!(matches!(
            ctx.remove_window(w),
            Err(ContextError::UnknownWindow(_))
        ));
    }

    #[test]
    fn raise_brings_window_to_front() {
        let mut ctx = ctx(6, 1);
        let a = ctx
            .acquire_area(Point::ORIGIN, Size::new(3, 1), Size::ZERO, None)
            .unwrap();
        let b = ctx
            .acquire_area(Point::new(1, 0), Size::new(3, 1), Size::ZERO, None)
            .unwrap();
        let wa = ctx.push_window(Some(a), None);
        ctx.push_window(Some(b), None);
        ctx.print(a, "aaa").unwrap();
        ctx.print(b, "bbb").unwrap();
        ctx.update_vterm();
        assert_eq!(screen_row(&ctx, 0), "abbb..");
        assert!(ctx.raise_window(wa).unwrap());
        assert_eq!(screen_row(&ctx, 0), "aaab..");
    }

    #[test]
    fn release_detaches_and_restores() {
        let mut ctx = ctx(6, 1);
        let a = ctx
            .acquire_area(Point::ORIGIN, Size::new(2, 1), Size::ZERO, None)
            .unwrap();
        let w = ctx.push_window(Some(a), None);
        ctx.print(a, "xy").unwrap();
        ctx.update_vterm();
        ctx.release_area(a).unwrap();
        assert_eq!(screen_row(&ctx, 0), "......");
        assert_eq!(ctx.stack().get(w).unwrap().area, None);
        assert!(matches!(ctx.print(a, "z"), Err(ContextError::UnknownArea(_))));
    }

    #[test]
    fn preprocessor_runs_before_merge() {
        let mut ctx = ctx(6, 1);
        let a = ctx
            .acquire_area(Point::ORIGIN, Size::new(3, 1), Size::ZERO, None)
            .unwrap();
        ctx.push_window(Some(a), None);
        ctx.register_preprocessor(a, |area| {
            area.write_at(2, 0, Cell::new('!'));
        })
        .unwrap();
        ctx.print(a, "ab").unwrap();
        ctx.update_vterm();
        assert_eq!(screen_row(&ctx, 0), "ab!...");
        assert_eq!(ctx.unregister_preprocessor(a), 1);
    }

    #[test]
    fn child_preprocessor_blits_viewport() {
        let mut ctx = ctx(6, 1);
        let view = ctx
            .acquire_area(Point::ORIGIN, Size::new(3, 1), Size::ZERO, None)
            .unwrap();
        let child = ctx
            .acquire_area(Point::ORIGIN, Size::new(6, 1), Size::ZERO, None)
            .unwrap();
        ctx.push_window(Some(view), None);
        ctx.register_child_preprocessor(view, child, |src, dst| {
            for x in 0..dst.width() {
                if let Some(&cell) = src.cell(x + 2, 0) {
                    dst.write_at(i32::from(x), 0, cell);
                }
            }
        })
        .unwrap();
        ctx.print(child, "012345").unwrap();
        ctx.update_vterm();
        assert_eq!(screen_row(&ctx, 0), "234...");
    }

    #[test]
    fn fence_defers_sync_until_start() {
        let mut ctx = ctx(6, 1);
        let mut sync = sync();
        ctx.flush(&mut sync).unwrap();
        let a = ctx
            .acquire_area(Point::ORIGIN, Size::new(2, 1), Size::ZERO, None)
            .unwrap();
        ctx.push_window(Some(a), None);
        let stats = ctx.scoped_batch(|ctx| {
            ctx.print(a, "ok").unwrap();
            ctx.flush(&mut sync).unwrap()
        });
        assert!(stats.is_empty());
        assert!(ctx.scheduler().is_pending());
        let stats = ctx.update_terminal(&mut sync, &mut NoInput).unwrap();
        assert!(stats.is_some_and(|s| s.bytes_emitted > 0));
    }

    #[test]
    fn bell_is_sent_once() {
        let mut ctx = ctx(6, 1);
        let a = ctx
            .acquire_area(Point::ORIGIN, Size::new(2, 1), Size::ZERO, None)
            .unwrap();
        ctx.push_window(Some(a), None);
        ctx.print(a, "\x07").unwrap();
        assert!(ctx.bell_pending());
        let mut sync = sync();
        ctx.flush(&mut sync).unwrap();
        ctx.flush(&mut sync).unwrap();
        let mut model = TerminalModel::new(6, 1);
        model.process(sync.get_ref());
        assert_eq!(model.bell_count(), 1);
    }

    #[test]
    fn cursor_follows_active_window() {
        let mut ctx = ctx(10, 3);
        let a = ctx
            .acquire_area(Point::new(3, 1), Size::new(4, 1), Size::ZERO, None)
            .unwrap();
        let w = ctx.push_window(Some(a), None);
        ctx.set_input_cursor(a, Point::new(2, 0), true).unwrap();
        assert_eq!(ctx.cursor_request(), CursorRequest::Hidden);
        ctx.set_active_window(Some(w)).unwrap();
        assert_eq!(ctx.cursor_request(), CursorRequest::Visible { x: 5, y: 1 });
    }

    #[test]
    fn resize_terminal_repaints() {
        let mut ctx = ctx(4, 1);
        let mut sync = sync();
        ctx.flush(&mut sync).unwrap();
        ctx.resize_terminal(Size::new(6, 2)).unwrap();
        ctx.invalidate_terminal(&mut sync);
        let before = sync.get_ref().len();
        ctx.flush(&mut sync).unwrap();
        let mut model = TerminalModel::new(6, 2);
        model.process(&sync.get_ref()[before..]);
        assert_eq!(model.row_text(1).unwrap(), "......");
        assert_eq!(ctx.size(), Size::new(6, 2));
    }

    #[test]
    fn oversized_area_resize_keeps_window_on_screen() {
        let mut ctx = ctx(10, 3);
        let a = ctx
            .acquire_area(Point::new(2, 1), Size::new(4, 1), Size::ZERO, None)
            .unwrap();
        ctx.push_window(Some(a), None);
        ctx.clear_area(a, ' ').unwrap();
        ctx.print(a, "hi").unwrap();
        ctx.update_vterm();
        let err = ctx
            .resize_area(a, Point::new(7, 2), Size::new(u16::MAX, u16::MAX), Size::ZERO)
            .unwrap_err();
        assert!(matches!(err, ContextError::Area(AreaError::TooLarge { .. })));
        assert_eq!(ctx.area(a).unwrap().offset(), Point::new(2, 1));
        ctx.update_vterm();
        assert_eq!(screen_row(&ctx, 1), "..hi  ....");
        assert_eq!(screen_row(&ctx, 2), "..........");
    }

    #[test]
    fn error_display() {
        let err = ContextError::from(AreaError::TooLarge {
            width: 1,
            height: 2,
        });
        assert_eq!(err.to_string(), "area error: area of 1x2 cells is too large");
        assert!(std::error::Error::source(&err).is_some());
    }
}
