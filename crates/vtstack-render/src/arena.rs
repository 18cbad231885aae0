#![forbid(unsafe_code)]

//! Storage for every retained [`Area`].
//!
//! Areas live in a [`SlotMap`]; an [`AreaId`] is its versioned key, so a
//! handle kept past [`remove`](SlotMap::remove) resolves to `None` instead
//! of aliasing whatever area reuses the slot.

use slotmap::SlotMap;

use crate::area::Area;

slotmap::new_key_type! {
    /// Opaque handle to an area in an [`AreaArena`].
    pub struct AreaId;
}

/// All retained areas, keyed by handle.
pub type AreaArena = SlotMap<AreaId, Area>;
