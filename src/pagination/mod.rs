//! Cursor Paginator subsystem
//!
//! Cursors are plain record ids. The paginator turns a cursor record and the
//! requested sort into a seek bound over a total order, so following `next`
//! from the first page visits every matching record exactly once.

mod order;
mod paginator;

pub use order::{SeekBound, SeekDirection, SortOrder};
pub use paginator::{Page, Paginator, Window};
