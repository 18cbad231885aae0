#![forbid(unsafe_code)]

//! Render kernel: retained areas, window-stack compositing, and the
//! terminal sync engine.
//!
//! Drawing happens into [`area::Area`] buffers that track per-line
//! damage. The [`compositor`] merges them, back to front, into the
//! virtual terminal, and [`sync::TerminalSync`] turns the virtual
//! terminal's damaged lines into the fewest escape sequences it can.
//! [`context::CompositorContext`] ties the pieces together.

pub mod ansi;
pub mod area;
pub mod arena;
pub mod cell;
pub mod charset;
pub mod compositor;
pub mod context;
pub mod cursor;
pub mod flush_stats;
pub mod print;
pub mod scheduler;
pub mod sync;
pub mod terminal_model;
pub mod window_stack;
