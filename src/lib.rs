//! `fscore`: the storage engine for a single-user-session, block-structured
//! virtual file system hosted inside one regular host file (spec.md §1).
//!
//! Layered leaves-first, per spec.md §2: [`device`] → [`free_stack`] →
//! [`superblock`] → [`volume`] (the single owner of device + superblock +
//! free-stack, per the Design Notes) → the fixed-size record codecs
//! ([`inode`], [`directory`], [`file_index`]) → [`fileio`] → [`path`] →
//! [`perm`] / [`users`] → [`session`], which ties the directory-mutating
//! operations together behind one per-session cursor.

pub mod consts;
pub mod device;
pub mod directory;
pub mod error;
pub mod file_index;
pub mod fileio;
pub mod free_stack;
pub mod inode;
pub mod path;
pub mod perm;
pub mod session;
pub mod superblock;
pub mod time;
pub mod users;
pub mod volume;

pub use error::{FsError, FsResult};
pub use volume::Volume;
