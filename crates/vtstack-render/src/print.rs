#![forbid(unsafe_code)]

//! Text output into an [`Area`].
//!
//! Printing writes at the area's print cursor using the attributes of the
//! supplied [`GraphicsContext`]. Control characters move the cursor:
//!
//! | Char | Effect |
//! |------|--------|
//! | `\n` | next row, column 0 |
//! | `\r` | column 0 |
//! | `\t` | next column that is a multiple of the tab width |
//! | `\x08` | one column left, stopping at 0 |
//! | `\x07` | queues a bell, writes nothing |
//!
//! Any other C0 control is consumed without effect. Column overflow wraps
//! to the next row; once the cursor row passes the last row (shadow
//! included) the rest of the input is dropped.

use crate::area::Area;
use crate::cell::GraphicsContext;

/// Default tab stop width.
pub const DEFAULT_TAB_WIDTH: u16 = 8;

/// Result of a print call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrintOutcome {
    /// Characters consumed before the input ran out or printing aborted.
    pub consumed: usize,
    /// A BEL was seen.
    pub bell: bool,
}

impl Area {
    /// Print `text` with the default tab width.
    pub fn print(&mut self, text: &str, gc: &GraphicsContext) -> PrintOutcome {
        self.print_tabbed(text, gc, DEFAULT_TAB_WIDTH)
    }

    /// Print a single character.
    pub fn print_char(&mut self, ch: char, gc: &GraphicsContext) -> PrintOutcome {
        let mut buf = [0u8; 4];
        self.print_tabbed(ch.encode_utf8(&mut buf), gc, DEFAULT_TAB_WIDTH)
    }

    /// Print `text` with an explicit tab width.
    pub fn print_tabbed(&mut self, text: &str, gc: &GraphicsContext, tab_width: u16) -> PrintOutcome {
        let total_w = self.total_width();
        let total_h = self.total_height();
        let tab_width = tab_width.max(1);
        let (mut x, mut y) = self.print_cursor();
        let mut outcome = PrintOutcome::default();

        for ch in text.chars() {
            if y >= total_h || total_w == 0 {
                break;
            }
            outcome.consumed += 1;
            match ch {
                '\n' => {
                    y += 1;
                    x = 0;
                }
                '\r' => x = 0,
                '\t' => {
                    x = (x / tab_width + 1).saturating_mul(tab_width);
                    if x >= total_w {
                        x = 0;
                        y += 1;
                    }
                }
                '\x08' => x = x.saturating_sub(1),
                '\x07' => outcome.bell = true,
                c if c.is_control() => {}
                c => {
                    self.write_at(i32::from(x), i32::from(y), gc.cell(c));
                    x += 1;
                    if x >= total_w {
                        x = 0;
                        y += 1;
                    }
                }
            }
        }

        self.set_print_cursor(x, y);
        if outcome.consumed > 0 {
            self.set_changed();
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{Cell, Color, StyleFlags};
    use vtstack_core::geometry::{Point, Size};

    fn area(w: u16, h: u16) -> Area {
        Area::new(Point::ORIGIN, Size::new(w, h), Size::ZERO).unwrap()
    }

    fn row_text(a: &Area, y: u16) -> String {
        a.row(y).unwrap().iter().map(|c| c.ch).collect()
    }

    #[test]
    fn prints_with_graphics_context() {
        let mut a = area(6, 1);
        let mut gc = GraphicsContext::new(Color::YELLOW, Color::BLUE);
        gc.set_style(StyleFlags::BOLD);
        let out = a.print("hi", &gc);
        assert_eq!(out.consumed, 2);
        assert_eq!(a.cell(0, 0), Some(&gc.cell('h')));
        assert_eq!(a.cell(1, 0), Some(&gc.cell('i')));
        assert_eq!(a.print_cursor(), (2, 0));
        assert!(a.has_changes());
    }

    #[test]
    fn newline_and_carriage_return() {
        let mut a = area(5, 3);
        let gc = GraphicsContext::default();
        a.print("ab\ncd\rX", &gc);
        assert_eq!(row_text(&a, 0), "ab   ");
        assert_eq!(row_text(&a, 1), "Xd   ");
        assert_eq!(a.print_cursor(), (1, 1));
    }

    #[test]
    fn tab_advances_to_next_multiple() {
        let mut a = area(20, 2);
        let gc = GraphicsContext::default();
        a.print_tabbed("a\tb", &gc, 4);
        assert_eq!(a.cell(4, 0).unwrap().ch, 'b');
        a.set_print_cursor(4, 1);
        a.print_tabbed("\tc", &gc, 4);
        assert_eq!(a.cell(8, 1).unwrap().ch, 'c');
    }

    #[test]
    fn tab_past_the_edge_wraps() {
        let mut a = area(10, 2);
        let gc = GraphicsContext::default();
        a.set_print_cursor(9, 0);
        a.print("\tz", &gc);
        assert_eq!(a.cell(0, 1).unwrap().ch, 'z');
    }

    #[test]
    fn backspace_stops_at_zero() {
        let mut a = area(4, 1);
        let gc = GraphicsContext::default();
        a.print("\x08\x08q", &gc);
        assert_eq!(a.cell(0, 0).unwrap().ch, 'q');
        a.print("r\x08s", &gc);
        assert_eq!(row_text(&a, 0), "qs  ");
    }

    #[test]
    fn bell_is_reported_not_written() {
        let mut a = area(4, 1);
        let gc = GraphicsContext::default();
        let out = a.print("\x07", &gc);
        assert!(out.bell);
        assert_eq!(out.consumed, 1);
        assert_eq!(a.cell(0, 0), Some(&Cell::BLANK));
        assert!(a.has_changes());
    }

    #[test]
    fn other_controls_are_ignored() {
        let mut a = area(4, 1);
        let gc = GraphicsContext::default();
        let out = a.print("a\x1bb", &gc);
        assert_eq!(out.consumed, 3);
        assert_eq!(row_text(&a, 0), "ab  ");
    }

    #[test]
    fn wrap_fills_area_and_stops() {
        let mut a = area(3, 2);
        let gc = GraphicsContext::default();
        let out = a.print("abcdef", &gc);
        assert_eq!(out.consumed, 6);
        assert_eq!(row_text(&a, 0), "abc");
        assert_eq!(row_text(&a, 1), "def");
        assert_eq!(a.print_cursor(), (0, 2));

        let snapshot = a.cells().to_vec();
        let out = a.print("g", &gc);
        assert_eq!(out.consumed, 0);
        assert_eq!(a.cells(), snapshot.as_slice());
    }

    #[test]
    fn overflow_aborts_remaining_input() {
        let mut a = area(2, 1);
        let gc = GraphicsContext::default();
        let out = a.print("abcd", &gc);
        assert_eq!(out.consumed, 2);
        assert_eq!(row_text(&a, 0), "ab");
    }

    #[test]
    fn printing_reaches_shadow_rows() {
        let mut a = Area::new(Point::ORIGIN, Size::new(2, 1), Size::new(1, 1)).unwrap();
        let gc = GraphicsContext::default();
        let out = a.print("abcdef", &gc);
        assert_eq!(out.consumed, 6);
        assert_eq!(a.cell(2, 1).unwrap().ch, 'f');
    }

    #[test]
    fn empty_print_leaves_area_clean() {
        let mut a = area(2, 1);
        let out = a.print("", &GraphicsContext::default());
        assert_eq!(out, PrintOutcome::default());
        assert!(!a.has_changes());
    }
}
