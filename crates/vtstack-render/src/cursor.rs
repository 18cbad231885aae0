#![forbid(unsafe_code)]

//! Hardware cursor placement.
//!
//! Only the active window may show the terminal cursor, and only where
//! its input cursor actually appears on screen.

use vtstack_core::geometry::{Point, Size};

use crate::compositor::{Coverage, Scene};
use crate::window_stack::Layered;

/// Where the hardware cursor should end up after a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorRequest {
    #[default]
    Hidden,
    /// Show the cursor at a 0-based screen position.
    Visible { x: u16, y: u16 },
}

impl CursorRequest {
    #[inline]
    pub const fn is_visible(&self) -> bool {
        matches!(self, Self::Visible { .. })
    }

    #[inline]
    pub const fn position(&self) -> Option<(u16, u16)> {
        match *self {
            Self::Visible { x, y } => Some((x, y)),
            Self::Hidden => None,
        }
    }
}

/// Decide the cursor request for the active window.
///
/// The cursor is shown only if the active window is visible, its area
/// is visible with a visible input cursor inside the content region,
/// the resulting screen position lies inside the terminal, and no window
/// above covers it.
pub fn resolve_cursor(scene: &Scene<'_>, terminal: Size) -> CursorRequest {
    let Some(window) = scene.stack.active().and_then(|id| scene.stack.get(id)) else {
        return CursorRequest::Hidden;
    };
    if !window.is_visible() {
        return CursorRequest::Hidden;
    }
    let Some(area_id) = window.area else {
        return CursorRequest::Hidden;
    };
    let Some(area) = scene.areas.get(area_id) else {
        return CursorRequest::Hidden;
    };
    if !area.is_visible() || !area.is_input_cursor_visible() {
        return CursorRequest::Hidden;
    }

    let local = area.input_cursor();
    if local.x < 0
        || local.y < 0
        || local.x >= i32::from(area.width())
        || local.y >= i32::from(area.height())
    {
        return CursorRequest::Hidden;
    }
    let global = Point::new(area.offset().x + local.x, area.offset().y + local.y);
    let (Ok(x), Ok(y)) = (u16::try_from(global.x), u16::try_from(global.y)) else {
        return CursorRequest::Hidden;
    };
    if x >= terminal.width || y >= terminal.height {
        return CursorRequest::Hidden;
    }
    if scene.is_covered(global, area_id) != Coverage::NotCovered {
        return CursorRequest::Hidden;
    }
    CursorRequest::Visible { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area::Area;
    use crate::arena::{AreaArena, AreaId};
    use crate::cell::Cell;
    use crate::window_stack::{WindowId, WindowStack};

    struct Fixture {
        areas: AreaArena,
        stack: WindowStack,
        desktop: Area,
    }

    impl Fixture {
        fn new() -> Self {
            let mut desktop = Area::new(Point::ORIGIN, Size::new(20, 10), Size::ZERO).unwrap();
            desktop.set_visible(true);
            Self {
                areas: AreaArena::with_key(),
                stack: WindowStack::new(),
                desktop,
            }
        }

        fn window(&mut self, x: i32, y: i32, w: u16, h: u16) -> (WindowId, AreaId) {
            let mut area = Area::new(Point::new(x, y), Size::new(w, h), Size::ZERO).unwrap();
            for yy in 0..i32::from(h) {
                for xx in 0..i32::from(w) {
                    area.write_at(xx, yy, Cell::new('#'));
                }
            }
            area.set_visible(true);
            let id = self.areas.insert(area);
            (self.stack.push(Some(id), None), id)
        }

        fn resolve(&self) -> CursorRequest {
            let scene = Scene::new(&self.areas, &self.stack, &self.desktop);
            resolve_cursor(&scene, Size::new(20, 10))
        }
    }

    fn show_cursor(fx: &mut Fixture, area: AreaId, x: i32, y: i32) {
        let area = fx.areas.get_mut(area).unwrap();
        area.set_input_cursor(Point::new(x, y));
        area.set_input_cursor_visible(true);
    }

    #[test]
    fn no_active_window_hides() {
        let mut fx = Fixture::new();
        let (_, a) = fx.window(2, 2, 5, 3);
        show_cursor(&mut fx, a, 1, 1);
        assert_eq!(fx.resolve(), CursorRequest::Hidden);
    }

    #[test]
    fn active_window_places_cursor() {
        let mut fx = Fixture::new();
        let (w, a) = fx.window(2, 2, 5, 3);
        show_cursor(&mut fx, a, 1, 2);
        fx.stack.set_active(Some(w));
        assert_eq!(fx.resolve(), CursorRequest::Visible { x: 3, y: 4 });
        assert_eq!(fx.resolve().position(), Some((3, 4)));
    }

    #[test]
    fn cursor_outside_content_hides() {
        let mut fx = Fixture::new();
        let (w, a) = fx.window(2, 2, 5, 3);
        fx.stack.set_active(Some(w));
        show_cursor(&mut fx, a, 5, 0);
        assert_eq!(fx.resolve(), CursorRequest::Hidden);
        show_cursor(&mut fx, a, -1, 0);
        assert_eq!(fx.resolve(), CursorRequest::Hidden);
    }

    #[test]
    fn cursor_off_screen_hides() {
        let mut fx = Fixture::new();
        let (w, a) = fx.window(18, 8, 5, 3);
        fx.stack.set_active(Some(w));
        show_cursor(&mut fx, a, 3, 0);
        assert_eq!(fx.resolve(), CursorRequest::Hidden);
        show_cursor(&mut fx, a, 1, 1);
        assert_eq!(fx.resolve(), CursorRequest::Visible { x: 19, y: 9 });
    }

    #[test]
    fn covered_cursor_hides() {
        let mut fx = Fixture::new();
        let (w, a) = fx.window(0, 0, 5, 3);
        let _ = fx.window(2, 0, 5, 3);
        fx.stack.set_active(Some(w));
        show_cursor(&mut fx, a, 3, 1);
        assert_eq!(fx.resolve(), CursorRequest::Hidden);
        show_cursor(&mut fx, a, 1, 1);
        assert_eq!(fx.resolve(), CursorRequest::Visible { x: 1, y: 1 });
    }

    #[test]
    fn invisible_cursor_or_window_hides() {
        let mut fx = Fixture::new();
        let (w, a) = fx.window(0, 0, 5, 3);
        fx.stack.set_active(Some(w));
        show_cursor(&mut fx, a, 1, 1);
        fx.areas.get_mut(a).unwrap().set_input_cursor_visible(false);
        assert_eq!(fx.resolve(), CursorRequest::Hidden);
        fx.areas.get_mut(a).unwrap().set_input_cursor_visible(true);
        fx.stack.set_visible(w, false);
        assert_eq!(fx.resolve(), CursorRequest::Hidden);
    }
}
