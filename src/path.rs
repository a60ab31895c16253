//! Side-effect-free path resolution (spec.md §4.6).
//!
//! A path is a `/`-separated list of segments, each resolved as a directory
//! lookup by name — `.` and `..` are ordinary entries already present in
//! every directory's item array, so no special-casing is needed for them.
//! A leading `/` starts resolution at the root inode instead of the caller's
//! current directory; repeated or trailing slashes are ignored.

use crate::error::{FsError, FsResult};
use crate::perm;
use crate::volume::Volume;

/// Splits a path into `(is_absolute, segments)`, dropping empty segments
/// produced by repeated or trailing slashes.
fn split(path: &str) -> (bool, Vec<&str>) {
    let is_absolute = path.starts_with('/');
    let segments = path.split('/').filter(|s| !s.is_empty()).collect();
    (is_absolute, segments)
}

/// Walks `segments` starting from `start` (an inode block number), checking
/// read permission on every directory traversed (spec.md §4.6: "acting uid
/// has read access → descend"). Returns the final inode's block number.
fn resolve_from(
    vol: &mut Volume,
    uid: u8,
    sudo: bool,
    start: u32,
    segments: &[&str],
) -> FsResult<u32> {
    let mut cur = start;
    for seg in segments {
        let cur_node = vol.read_inode(cur)?;
        if !cur_node.is_directory() {
            return Err(FsError::NotADirectory);
        }
        if !perm::can_read(vol.superblock(), uid, sudo, &cur_node) {
            return Err(FsError::PermissionDenied);
        }
        let dir = vol.read_directory(cur_node.bno)?;
        let idx = dir.find(seg)?.ok_or(FsError::NotFound)?;
        cur = dir.get(idx).inode_index;
    }
    Ok(cur)
}

/// Resolves `path` to the block number of its target inode, relative to
/// `cwd` (the caller's current directory's inode block) unless `path` is
/// absolute, in which case resolution starts at `root`.
pub fn resolve(vol: &mut Volume, uid: u8, sudo: bool, root: u32, cwd: u32, path: &str) -> FsResult<u32> {
    let (is_absolute, segments) = split(path);
    let start = if is_absolute { root } else { cwd };
    resolve_from(vol, uid, sudo, start, &segments)
}

/// Resolves `path`'s parent directory and the leaf name, for operations that
/// create or remove an entry (`touch`, `mkdir`, `rm`, `rmdir`, `mv`, `cp`).
/// Fails on a path with no leaf component (e.g. `/` or an empty string).
pub fn resolve_parent<'a>(
    vol: &mut Volume,
    uid: u8,
    sudo: bool,
    root: u32,
    cwd: u32,
    path: &'a str,
) -> FsResult<(u32, &'a str)> {
    let (is_absolute, segments) = split(path);
    let leaf = *segments
        .last()
        .ok_or(FsError::InvalidArgument("path has no name component"))?;
    let start = if is_absolute { root } else { cwd };
    let parent = resolve_from(vol, uid, sudo, start, &segments[..segments.len() - 1])?;
    Ok((parent, leaf))
}
