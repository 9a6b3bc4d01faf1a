//! Async filesystem helpers re-exported from the underlying runtime.
//!
//! The APIs are kept identical to Tokio's so downstream crates can rely on the
//! familiar surface area without depending on Tokio directly.

pub use tokio::fs::{
    copy, create_dir_all, metadata, read, read_dir, remove_dir_all, remove_file, rename,
    try_exists, write, DirEntry, File, OpenOptions,
};
