#![forbid(unsafe_code)]

//! Back-to-front ordering of top-level windows.
//!
//! The stack stores [`WindowDescriptor`] values, not widgets. Overlap
//! queries only need the [`Layered`] view of an entry. After every
//! mutation the stack re-partitions so that always-on-top windows form the
//! front-most tail, then re-indexes layers.

use std::fmt;

use crate::arena::AreaId;
use crate::area::OwnerTag;

/// What the compositor needs to know about a stacked window.
pub trait Layered {
    /// Whether the window owns a retained area.
    fn has_retained_area(&self) -> bool;
    /// Position in the back-to-front ordering.
    fn z_order_index(&self) -> usize;
    fn is_visible(&self) -> bool;
    fn is_always_on_top(&self) -> bool;
}

/// Stable identity of a window in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

/// A stacked window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowDescriptor {
    pub id: WindowId,
    /// The window's retained area, if it has one yet.
    pub area: Option<AreaId>,
    pub visible: bool,
    pub always_on_top: bool,
    pub owner: Option<OwnerTag>,
    layer: usize,
}

impl Layered for WindowDescriptor {
    #[inline]
    fn has_retained_area(&self) -> bool {
        self.area.is_some()
    }

    #[inline]
    fn z_order_index(&self) -> usize {
        self.layer
    }

    #[inline]
    fn is_visible(&self) -> bool {
        self.visible
    }

    #[inline]
    fn is_always_on_top(&self) -> bool {
        self.always_on_top
    }
}

/// Ordered window list with an optional active entry.
#[derive(Debug, Clone, Default)]
pub struct WindowStack {
    entries: Vec<WindowDescriptor>,
    active: Option<WindowId>,
    next_id: u32,
}

impl WindowStack {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries back to front.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, WindowDescriptor> {
        self.entries.iter()
    }

    /// Entries back to front, as a slice.
    #[inline]
    pub fn entries(&self) -> &[WindowDescriptor] {
        &self.entries
    }

    fn position(&self, id: WindowId) -> Option<usize> {
        self.entries.iter().position(|w| w.id == id)
    }

    pub fn get(&self, id: WindowId) -> Option<&WindowDescriptor> {
        self.entries.iter().find(|w| w.id == id)
    }

    /// Layer index of a window.
    pub fn layer_of(&self, id: WindowId) -> Option<usize> {
        self.get(id).map(Layered::z_order_index)
    }

    /// The window that owns `area`.
    pub fn window_for_area(&self, area: AreaId) -> Option<&WindowDescriptor> {
        self.entries.iter().find(|w| w.area == Some(area))
    }

    /// Layer index of the window that owns `area`.
    pub fn layer_of_area(&self, area: AreaId) -> Option<usize> {
        self.window_for_area(area).map(Layered::z_order_index)
    }

    /// Add a window at the front and return its id.
    pub fn push(&mut self, area: Option<AreaId>, owner: Option<OwnerTag>) -> WindowId {
        let id = WindowId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push(WindowDescriptor {
            id,
            area,
            visible: true,
            always_on_top: false,
            owner,
            layer: 0,
        });
        vtstack_core::debug!(window = %id, "window pushed");
        self.determine_layers();
        id
    }

    /// Remove a window. Clears the active marker if it pointed there.
    pub fn remove(&mut self, id: WindowId) -> Option<WindowDescriptor> {
        let pos = self.position(id)?;
        let removed = self.entries.remove(pos);
        if self.active == Some(id) {
            self.active = None;
        }
        vtstack_core::debug!(window = %id, "window removed");
        self.determine_layers();
        Some(removed)
    }

    /// Move a window to the front. Returns `false` if it was already there
    /// or is unknown.
    pub fn raise(&mut self, id: WindowId) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        let before = self.order();
        let entry = self.entries.remove(pos);
        self.entries.push(entry);
        self.determine_layers();
        let changed = before != self.order();
        vtstack_core::debug!(window = %id, changed, "window raised");
        changed
    }

    /// Move a window to the back. Returns `false` if nothing moved.
    pub fn lower(&mut self, id: WindowId) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        let before = self.order();
        let entry = self.entries.remove(pos);
        self.entries.insert(0, entry);
        self.determine_layers();
        let changed = before != self.order();
        vtstack_core::debug!(window = %id, changed, "window lowered");
        changed
    }

    /// Exchange the positions of two windows.
    ///
    /// Returns `false` if either is unknown or the stacking order ends up
    /// as it was, e.g. when one of them is always on top.
    pub fn swap(&mut self, a: WindowId, b: WindowId) -> bool {
        let (Some(pa), Some(pb)) = (self.position(a), self.position(b)) else {
            return false;
        };
        let before = self.order();
        self.entries.swap(pa, pb);
        self.determine_layers();
        let changed = before != self.order();
        vtstack_core::debug!(first = %a, second = %b, changed, "windows swapped");
        changed
    }

    pub fn set_always_on_top(&mut self, id: WindowId, on: bool) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        self.entries[pos].always_on_top = on;
        self.determine_layers();
        true
    }

    pub fn set_visible(&mut self, id: WindowId, visible: bool) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        self.entries[pos].visible = visible;
        true
    }

    /// Bind (or unbind) a retained area to a window.
    pub fn attach_area(&mut self, id: WindowId, area: Option<AreaId>) -> bool {
        let Some(pos) = self.position(id) else {
            return false;
        };
        self.entries[pos].area = area;
        true
    }

    /// Mark one window active. `None` clears the marker.
    pub fn set_active(&mut self, id: Option<WindowId>) -> bool {
        if let Some(id) = id
            && self.position(id).is_none()
        {
            return false;
        }
        self.active = id;
        true
    }

    #[inline]
    pub fn active(&self) -> Option<WindowId> {
        self.active
    }

    fn order(&self) -> Vec<WindowId> {
        self.entries.iter().map(|w| w.id).collect()
    }

    /// Move always-on-top windows to the tail, keeping relative order in
    /// both groups, then renumber layers.
    fn determine_layers(&mut self) {
        let (mut normal, on_top): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|w| !w.always_on_top);
        normal.extend(on_top);
        self.entries = normal;
        for (layer, entry) in self.entries.iter_mut().enumerate() {
            entry.layer = layer;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(stack: &WindowStack) -> Vec<WindowId> {
        stack.iter().map(|w| w.id).collect()
    }

    #[test]
    fn push_assigns_layers_in_order() {
        let mut stack = WindowStack::new();
        let a = stack.push(None, None);
        let b = stack.push(None, Some(OwnerTag(7)));
        assert_eq!(stack.layer_of(a), Some(0));
        assert_eq!(stack.layer_of(b), Some(1));
        assert_eq!(stack.get(b).and_then(|w| w.owner), Some(OwnerTag(7)));
        assert!(stack.get(a).is_some_and(Layered::is_visible));
        assert!(!stack.get(a).is_some_and(Layered::has_retained_area));
    }

    #[test]
    fn raise_and_lower() {
        let mut stack = WindowStack::new();
        let a = stack.push(None, None);
        let b = stack.push(None, None);
        let c = stack.push(None, None);
        assert!(stack.raise(a));
        assert_eq!(ids(&stack), vec![b, c, a]);
        assert!(!stack.raise(a));
        assert!(stack.lower(c));
        assert_eq!(ids(&stack), vec![c, b, a]);
        assert_eq!(stack.layer_of(a), Some(2));
    }

    #[test]
    fn always_on_top_stays_in_front() {
        let mut stack = WindowStack::new();
        let a = stack.push(None, None);
        let b = stack.push(None, None);
        stack.set_always_on_top(a, true);
        assert_eq!(ids(&stack), vec![b, a]);
        let c = stack.push(None, None);
        assert_eq!(ids(&stack), vec![b, c, a]);
        // Raising a normal window cannot pass an always-on-top one.
        assert!(stack.raise(b));
        assert_eq!(ids(&stack), vec![c, b, a]);
        assert!(!stack.raise(a));
        assert!(!stack.lower(c));
        assert!(stack.get(a).is_some_and(Layered::is_always_on_top));
    }

    #[test]
    fn swap_is_reindexed() {
        let mut stack = WindowStack::new();
        let a = stack.push(None, None);
        let b = stack.push(None, None);
        assert!(stack.swap(a, b));
        assert_eq!(stack.layer_of(a), Some(1));
        assert!(!stack.swap(a, a));
    }

    #[test]
    fn swap_across_always_on_top_is_a_no_op() {
        let mut stack = WindowStack::new();
        let a = stack.push(None, None);
        let top = stack.push(None, None);
        stack.set_always_on_top(top, true);
        assert!(!stack.swap(a, top));
        assert_eq!(ids(&stack), vec![a, top]);
        assert_eq!(stack.layer_of(top), Some(1));
        let b = stack.push(None, None);
        assert!(stack.swap(a, b));
        assert_eq!(ids(&stack), vec![b, a, top]);
    }

    #[test]
    fn remove_clears_active() {
        let mut stack = WindowStack::new();
        let a = stack.push(None, None);
        let b = stack.push(None, None);
        assert!(stack.set_active(Some(a)));
        assert_eq!(stack.active(), Some(a));
        stack.remove(a);
        assert_eq!(stack.active(), None);
        assert_eq!(stack.layer_of(b), Some(0));
        assert!(!stack.set_active(Some(a)));
    }

    #[test]
    fn area_lookup() {
        let mut arena = crate::arena::AreaArena::with_key();
        let area = arena.insert(
            crate::area::Area::new(
                vtstack_core::geometry::Point::ORIGIN,
                vtstack_core::geometry::Size::new(1, 1),
                vtstack_core::geometry::Size::ZERO,
            )
            .unwrap(),
        );
        let mut stack = WindowStack::new();
        stack.push(None, None);
        let w = stack.push(None, None);
        assert!(stack.layer_of_area(area).is_none());
        stack.attach_area(w, Some(area));
        assert_eq!(stack.layer_of_area(area), Some(1));
        assert_eq!(stack.window_for_area(area).map(|d| d.id), Some(w));
    }
}
