//! Smoke tests for the public facade.

use vtstack::prelude::*;
use vtstack::{ContextError, Error};

#[test]
fn prelude_drives_a_flush() -> Result<()> {
    let mut ctx = CompositorContext::new(ContextConfig::default().with_size(Size::new(10, 2)))?;
    let mut sync = TerminalSync::new(Vec::new(), TerminalCapabilities::xterm_256color());
    let area = ctx.acquire_area(Point::new(0, 1), Size::new(5, 1), Size::ZERO, None)?;
    ctx.push_window(Some(area), None);
    ctx.print(area, "hello")?;
    let stats = ctx.flush(&mut sync)?;
    assert!(stats.bytes_emitted > 0);
    assert_eq!(ctx.vterm().cell(4, 1).map(|c| c.ch), Some('o'));
    Ok(())
}

#[test]
fn stale_handle_maps_to_context_error() {
    let mut ctx = CompositorContext::new(ContextConfig::default()).unwrap();
    let area = ctx
        .acquire_area(Point::ORIGIN, Size::new(2, 2), Size::ZERO, None)
        .unwrap();
    ctx.release_area(area).unwrap();
    let err: Error = ctx.print(area, "x").unwrap_err().into();
    assert!(matches!(err, Error::Context(ContextError::UnknownArea(_))));
}

#[test]
fn io_errors_stay_io() {
    let io = std::io::Error::other("gone");
    let err: Error = ContextError::Io(io).into();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(err.to_string(), "gone");
}
