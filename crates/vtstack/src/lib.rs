#![forbid(unsafe_code)]

//! vtstack public facade crate.
//!
//! Re-exports the types an application needs to draw into retained
//! areas, stack them as windows, and keep a real terminal in sync with
//! the composited screen.
//!
//! ```
//! use vtstack::prelude::*;
//!
//! let mut ctx = CompositorContext::new(ContextConfig::default().with_size(Size::new(20, 4)))?;
//! let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::modern());
//! let area = ctx.acquire_area(Point::new(1, 1), Size::new(6, 1), Size::ZERO, None)?;
//! ctx.push_window(Some(area), None);
//! ctx.print(area, "ready")?;
//! ctx.flush(&mut sync)?;
//! # Ok::<(), vtstack::Error>(())
//! ```

use std::fmt;
use std::io;

// --- Core re-exports -------------------------------------------------------

pub use vtstack_core::geometry::{Point, Rect, Size};
pub use vtstack_core::terminal_capabilities::{TerminalCapabilities, TerminalProfile};

// --- Render re-exports -----------------------------------------------------

pub use vtstack_render::area::{Area, AreaError, OwnerTag};
pub use vtstack_render::arena::{AreaArena, AreaId};
pub use vtstack_render::cell::{Cell, Color, GraphicsContext, StyleFlags, Transparency};
pub use vtstack_render::charset::Encoding;
pub use vtstack_render::context::{CompositorContext, ContextConfig, ContextError};
pub use vtstack_render::flush_stats::FlushStats;
pub use vtstack_render::cursor::CursorRequest;
pub use vtstack_render::print::PrintOutcome;
pub use vtstack_render::scheduler::{InputProbe, NoInput, SchedulerConfig, UpdateScheduler};
pub use vtstack_render::sync::{SyncConfig, TerminalSync};
pub use vtstack_render::window_stack::{WindowDescriptor, WindowId, WindowStack};

#[cfg(not(target_arch = "wasm32"))]
pub use vtstack_render::scheduler::CrosstermProbe;

// --- Errors ---------------------------------------------------------------

/// Top-level error type for vtstack applications.
#[derive(Debug)]
pub enum Error {
    /// I/O failure while writing to the terminal.
    Io(io::Error),
    /// A compositor operation failed.
    Context(ContextError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Context(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Context(err) => Some(err),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<ContextError> for Error {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Io(err) => Self::Io(err),
            other => Self::Context(other),
        }
    }
}

impl From<AreaError> for Error {
    fn from(err: AreaError) -> Self {
        Self::Context(ContextError::Area(err))
    }
}

/// Standard result type for vtstack APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Terminal helpers -----------------------------------------------------

/// A sync engine writing to stdout with capabilities detected from the
/// environment.
pub fn stdout_sync(config: &ContextConfig) -> TerminalSync<io::Stdout> {
    TerminalSync::with_config(
        io::stdout(),
        TerminalCapabilities::detect(),
        config.sync_config(),
    )
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Area, AreaId, Cell, Color, CompositorContext, ContextConfig, Error, Point, Rect, Result,
        SchedulerConfig, Size, StyleFlags, TerminalCapabilities, TerminalSync, Transparency,
        WindowId,
    };

    pub use crate::{core, render};
}

pub use vtstack_core as core;
pub use vtstack_render as render;
