//! Shared infrastructure utilities for InviteGate.
//!
//! - **`atomic_write`**: Crash-safe file persistence (temp + rename)
//! - **`colors`**: `&`-prefixed legacy color codes used in configured messages

pub mod atomic_write;
pub mod colors;

pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, PersistMode, atomic_write, atomic_write_new_with_options,
    atomic_write_with_options, recover_bak_file,
};
pub use colors::{COLOR_CHAR, strip_color_codes, translate_color_codes};
