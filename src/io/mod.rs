//! File-level I/O helpers.

pub mod atomic;

pub use atomic::{read_file, write_atomic};
