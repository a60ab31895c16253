//! Session state (spec.md §4.9) and the directory-mutating operations that
//! sit on top of the path resolver (spec.md §4.7): `touch`, `mkdir`, `rm`,
//! `rmdir`, `mv`, `cp`, `chmod`, `format`. Grounded on `original_source`'s
//! `FileManagerSystem.cpp` for the operation sequencing, and on the Design
//! Notes' guidance to pass the working directory explicitly rather than
//! mutate a shared cursor.

use crate::consts::UID_ROOT;
use crate::error::{FsError, FsResult};
use crate::fileio;
use crate::inode::{parse_perm_string, ChmodWho, Inode};
use crate::path;
use crate::perm;
use crate::users;
use crate::volume::Volume;

/// Everything about the interactive session that outlives a single command:
/// who's logged in, where they are, whether `sudo` is active for the
/// command currently running, and the command name used to prefix error
/// messages (spec.md §4.9).
pub struct Session {
    pub uid: u8,
    /// Inode block of the current working directory.
    pub cwd: u32,
    /// True only while the one command that requested it is executing.
    pub sudo: bool,
    pub command_name: String,
}

impl Session {
    pub fn new(uid: u8, root: u32) -> Self {
        Self {
            uid,
            cwd: root,
            sudo: false,
            command_name: String::new(),
        }
    }

    /// Resets the working directory to root, as `logout` and `format` do.
    pub fn reset_to_root(&mut self, root: u32) {
        self.cwd = root;
    }
}

/// Resolves `path` to a directory's inode block, descending through `cd`
/// semantics. Fails with `NotADirectory` if the target exists but is a file.
pub fn cd(vol: &mut Volume, root: u32, session: &Session, target: &str) -> FsResult<u32> {
    let bno = path::resolve(vol, session.uid, session.sudo, root, session.cwd, target)?;
    let inode = vol.read_inode(bno)?;
    if !inode.is_directory() {
        return Err(FsError::NotADirectory);
    }
    Ok(bno)
}

/// Reads a directory's sorted listing of live entry names (spec.md §8
/// scenario 2/3 `ls`). `-l` detail is left to the caller via [`stat_entry`].
pub fn ls(vol: &mut Volume, root: u32, session: &Session, target: &str) -> FsResult<Vec<String>> {
    let bno = path::resolve(vol, session.uid, session.sudo, root, session.cwd, target)?;
    let inode = vol.read_inode(bno)?;
    if !inode.is_directory() {
        return Err(FsError::NotADirectory);
    }
    if !perm::can_read(vol.superblock(), session.uid, session.sudo, &inode) {
        return Err(FsError::PermissionDenied);
    }
    let dir = vol.read_directory(inode.bno)?;
    Ok(dir.live_items()?.map(|(_, it)| it.name_str()).collect())
}

/// One directory entry's metadata, for `ls -l`.
pub struct EntryStat {
    pub name: String,
    pub is_dir: bool,
    pub uid: u8,
    pub trusted_bits: u8,
    pub other_bits: u8,
    pub modified_time: String,
}

/// `ls -l`: the same listing as [`ls`], with per-entry inode metadata.
pub fn ls_long(vol: &mut Volume, root: u32, session: &Session, target: &str) -> FsResult<Vec<EntryStat>> {
    let bno = path::resolve(vol, session.uid, session.sudo, root, session.cwd, target)?;
    let dir_inode = vol.read_inode(bno)?;
    if !dir_inode.is_directory() {
        return Err(FsError::NotADirectory);
    }
    if !perm::can_read(vol.superblock(), session.uid, session.sudo, &dir_inode) {
        return Err(FsError::PermissionDenied);
    }
    let dir = vol.read_directory(dir_inode.bno)?;
    let items: Vec<(u32, String)> = dir
        .live_items()?
        .map(|(_, it)| (it.inode_index, it.name_str()))
        .collect();
    let mut out = Vec::with_capacity(items.len());
    for (inode_block, name) in items {
        let inode = vol.read_inode(inode_block)?;
        out.push(EntryStat {
            name,
            is_dir: inode.is_directory(),
            uid: inode.uid,
            trusted_bits: inode.trusted_bits(),
            other_bits: inode.other_bits(),
            modified_time: crate::time::display_timestamp(&inode.modified_time),
        });
    }
    Ok(out)
}

/// `cat`: reads a file's full content by path.
pub fn cat(vol: &mut Volume, root: u32, session: &Session, target: &str) -> FsResult<Vec<u8>> {
    let bno = path::resolve(vol, session.uid, session.sudo, root, session.cwd, target)?;
    let inode = vol.read_inode(bno)?;
    if !inode.is_file() {
        return Err(FsError::NotAFile);
    }
    if !perm::can_read(vol.superblock(), session.uid, session.sudo, &inode) {
        return Err(FsError::PermissionDenied);
    }
    fileio::read_file(vol, inode.bno)
}

fn check_duplicate(vol: &mut Volume, parent_bno: u32, name: &str) -> FsResult<()> {
    let parent_inode = vol.read_inode(parent_bno)?;
    let dir = vol.read_directory(parent_inode.bno)?;
    if dir.find(name)?.is_some() {
        return Err(FsError::Exists);
    }
    Ok(())
}

fn require_write(vol: &Volume, uid: u8, sudo: bool, inode: &Inode) -> FsResult<()> {
    if perm::can_write(vol.superblock(), uid, sudo, inode) {
        Ok(())
    } else {
        Err(FsError::PermissionDenied)
    }
}

/// `touch`: creates an empty file (spec.md §4.7 "create-file").
pub fn touch(vol: &mut Volume, root: u32, session: &Session, target: &str) -> FsResult<()> {
    let (parent_bno, name) = path::resolve_parent(vol, session.uid, session.sudo, root, session.cwd, target)?;
    let name_bytes: [u8; crate::consts::DIR_NAME_LEN] = crate::superblock::encode_fixed(name)?;

    let parent_inode = vol.read_inode(parent_bno)?;
    require_write(vol, session.uid, session.sudo, &parent_inode)?;
    check_duplicate(vol, parent_bno, name)?;

    let fi_bno = vol.allocate()?;
    let mut allocated = vec![fi_bno];
    let result = (|| -> FsResult<()> {
        vol.write_file_index(fi_bno, &crate::file_index::FileIndex::empty(vol.file_index_capacity()))?;
        let inode_bno = vol.allocate()?;
        allocated.push(inode_bno);
        let inode = Inode::new_file(session.uid, fi_bno);
        vol.write_inode(inode_bno, &inode)?;
        install_entry(vol, parent_bno, inode_bno, name_bytes)
    })();
    if result.is_err() {
        for bno in allocated {
            let _ = vol.free(bno);
        }
    }
    result
}

fn install_entry(
    vol: &mut Volume,
    parent_bno: u32,
    inode_bno: u32,
    name: [u8; crate::consts::DIR_NAME_LEN],
) -> FsResult<()> {
    let parent_inode = vol.read_inode(parent_bno)?;
    let mut dir = vol.read_directory(parent_inode.bno)?;
    dir.install(crate::directory::DirectoryItem {
        inode_index: inode_bno,
        name,
    })?;
    vol.write_directory(parent_inode.bno, &dir)
}

/// `mkdir`: creates an empty subdirectory (spec.md §4.7 "create-directory").
pub fn mkdir(vol: &mut Volume, root: u32, session: &Session, target: &str) -> FsResult<()> {
    let (parent_bno, name) = path::resolve_parent(vol, session.uid, session.sudo, root, session.cwd, target)?;
    let name_bytes: [u8; crate::consts::DIR_NAME_LEN] = crate::superblock::encode_fixed(name)?;

    let parent_inode = vol.read_inode(parent_bno)?;
    require_write(vol, session.uid, session.sudo, &parent_inode)?;
    check_duplicate(vol, parent_bno, name)?;

    // The new directory's `..` points at the same inode index the parent
    // records for its own `.` entry, i.e. `parent_bno` itself.
    let dir_bno = vol.allocate()?;
    let mut allocated = vec![dir_bno];
    let result = (|| -> FsResult<()> {
        let new_dir = crate::directory::Directory::new(vol.dir_capacity(), dir_bno, parent_bno)?;
        vol.write_directory(dir_bno, &new_dir)?;
        let inode_bno = vol.allocate()?;
        allocated.push(inode_bno);
        let inode = Inode::new_directory(session.uid, dir_bno);
        vol.write_inode(inode_bno, &inode)?;
        install_entry(vol, parent_bno, inode_bno, name_bytes)
    })();
    if result.is_err() {
        for bno in allocated {
            let _ = vol.free(bno);
        }
    }
    result
}

/// `rm`: removes a file (spec.md §4.7 "remove-file").
pub fn rm(vol: &mut Volume, root: u32, session: &Session, target: &str) -> FsResult<()> {
    let (parent_bno, name) = path::resolve_parent(vol, session.uid, session.sudo, root, session.cwd, target)?;
    let parent_inode = vol.read_inode(parent_bno)?;
    let mut dir = vol.read_directory(parent_inode.bno)?;
    let idx = dir.find(name)?.ok_or(FsError::NotFound)?;
    let entry_inode_bno = dir.get(idx).inode_index;
    let inode = vol.read_inode(entry_inode_bno)?;
    if !inode.is_file() {
        return Err(FsError::NotAFile);
    }
    require_write(vol, session.uid, session.sudo, &inode)?;

    fileio::free_chain(vol, inode.bno)?;
    vol.free(entry_inode_bno)?;
    dir.remove(idx)?;
    vol.write_directory(parent_inode.bno, &dir)
}

/// `rmdir`: recursively removes a directory and everything beneath it
/// (spec.md §4.7 "remove-directory"). On any sub-failure, aborts and leaves
/// the partially-deleted state, per spec.md §9 open question 3 and §7.
pub fn rmdir(vol: &mut Volume, root: u32, session: &Session, target: &str) -> FsResult<()> {
    let (parent_bno, name) = path::resolve_parent(vol, session.uid, session.sudo, root, session.cwd, target)?;
    let parent_inode = vol.read_inode(parent_bno)?;
    let mut dir = vol.read_directory(parent_inode.bno)?;
    let idx = dir.find(name)?.ok_or(FsError::NotFound)?;
    let target_inode_bno = dir.get(idx).inode_index;
    let target_inode = vol.read_inode(target_inode_bno)?;
    if !target_inode.is_directory() {
        return Err(FsError::NotADirectory);
    }
    require_write(vol, session.uid, session.sudo, &target_inode)?;

    remove_directory_contents(vol, session, target_inode_bno)?;

    vol.free(target_inode.bno)?;
    vol.free(target_inode_bno)?;
    dir.remove(idx)?;
    vol.write_directory(parent_inode.bno, &dir)
}

/// Recursively empties `dir_inode_bno`, leaving `.`/`..` untouched and the
/// directory block itself still allocated (the caller frees it).
fn remove_directory_contents(vol: &mut Volume, session: &Session, dir_inode_bno: u32) -> FsResult<()> {
    let dir_inode = vol.read_inode(dir_inode_bno)?;
    let dir = vol.read_directory(dir_inode.bno)?;
    let entries: Vec<(String, u32)> = dir
        .live_items()?
        .filter(|(_, it)| it.name_str() != "." && it.name_str() != "..")
        .map(|(_, it)| (it.name_str(), it.inode_index))
        .collect();

    for (_, entry_inode_bno) in &entries {
        let entry_inode = vol.read_inode(*entry_inode_bno)?;
        if entry_inode.is_directory() {
            remove_directory_contents(vol, session, *entry_inode_bno)?;
            vol.free(entry_inode.bno)?;
        } else {
            fileio::free_chain(vol, entry_inode.bno)?;
        }
        vol.free(*entry_inode_bno)?;
    }
    Ok(())
}

/// `cp`: copies a file's content and creation time to a new destination path
/// (spec.md §4.7 "rename/move and copy"). Directories are not supported
/// (spec.md §9 open question 6).
pub fn cp(vol: &mut Volume, root: u32, session: &Session, src: &str, dest: &str) -> FsResult<()> {
    let src_bno = path::resolve(vol, session.uid, session.sudo, root, session.cwd, src)?;
    let src_inode = vol.read_inode(src_bno)?;
    if !src_inode.is_file() {
        return Err(FsError::NotAFile);
    }
    if !perm::can_read(vol.superblock(), session.uid, session.sudo, &src_inode) {
        return Err(FsError::PermissionDenied);
    }
    let content = fileio::read_file(vol, src_inode.bno)?;

    touch(vol, root, session, dest)?;
    let (dest_parent, dest_name) = path::resolve_parent(vol, session.uid, session.sudo, root, session.cwd, dest)?;
    let dest_parent_inode = vol.read_inode(dest_parent)?;
    let dest_dir = vol.read_directory(dest_parent_inode.bno)?;
    let dest_idx = dest_dir.find(dest_name)?.ok_or(FsError::NotFound)?;
    let dest_inode_bno = dest_dir.get(dest_idx).inode_index;
    let mut dest_inode = vol.read_inode(dest_inode_bno)?;

    let new_head = fileio::write_file(vol, dest_inode.bno, &content)?;
    dest_inode.bno = new_head;
    dest_inode.creation_time = src_inode.creation_time;
    dest_inode.touch_modified();
    vol.write_inode(dest_inode_bno, &dest_inode)
}

/// `mv`: copy-then-remove, per spec.md §4.7.
pub fn mv(vol: &mut Volume, root: u32, session: &Session, src: &str, dest: &str) -> FsResult<()> {
    cp(vol, root, session, src, dest)?;
    rm(vol, root, session, src)
}

/// `chmod`: masks out the selected permission group(s) and ORs in `bits`
/// (spec.md §4.7). Only the owner, or root under `sudo`, may chmod.
pub fn chmod(vol: &mut Volume, root: u32, session: &Session, target: &str, who: ChmodWho, perm_str: &str) -> FsResult<()> {
    let bits = parse_perm_string(perm_str)?;
    let bno = path::resolve(vol, session.uid, session.sudo, root, session.cwd, target)?;
    let mut inode = vol.read_inode(bno)?;
    if !perm::can_chmod(session.uid, session.sudo, &inode) {
        return Err(FsError::PermissionDenied);
    }
    inode.chmod(who, bits);
    inode.touch_modified();
    vol.write_inode(bno, &inode)
}

/// `echo ... > path` / `echo ... >> path`: spec.md Design Notes' "read-all /
/// free-all / write-all" append policy — there is no in-place append.
pub fn write_file_content(vol: &mut Volume, root: u32, session: &Session, target: &str, content: &[u8], append: bool) -> FsResult<()> {
    let existing = if append {
        cat(vol, root, session, target).unwrap_or_default()
    } else {
        Vec::new()
    };
    if path::resolve(vol, session.uid, session.sudo, root, session.cwd, target).is_err() {
        touch(vol, root, session, target)?;
    }
    let bno = path::resolve(vol, session.uid, session.sudo, root, session.cwd, target)?;
    let mut inode = vol.read_inode(bno)?;
    if !inode.is_file() {
        return Err(FsError::NotAFile);
    }
    require_write(vol, session.uid, session.sudo, &inode)?;

    let mut full = existing;
    full.extend_from_slice(content);

    let new_head = fileio::write_file(vol, inode.bno, &full)?;
    inode.bno = new_head;
    inode.touch_modified();
    vol.write_inode(bno, &inode)
}

/// `mkuser` (spec.md §4.8): restricted to root in sudo mode.
pub fn mkuser(vol: &mut Volume, session: &Session, name: &str, password: &str) -> FsResult<u8> {
    if session.uid != UID_ROOT || !session.sudo {
        return Err(FsError::PermissionDenied);
    }
    users::mkuser(vol.superblock_mut(), name, password)
}

/// `rmuser` (spec.md §4.8): restricted to root in sudo mode.
pub fn rmuser(vol: &mut Volume, session: &Session, name: &str) -> FsResult<u8> {
    if session.uid != UID_ROOT || !session.sudo {
        return Err(FsError::PermissionDenied);
    }
    users::rmuser(vol.superblock_mut(), name)
}

/// `passwd` (spec.md §4.8): an acting user may only change their own
/// password, and only after reauthenticating with the old one.
pub fn passwd(vol: &mut Volume, session: &Session, old_password: &str, new_password: &str) -> FsResult<()> {
    let slot = vol
        .superblock()
        .find_user_by_uid(session.uid)
        .ok_or(FsError::NotFound)?;
    let name = vol.superblock().users[slot].name_str();
    users::authenticate(vol.superblock(), &name, old_password)?;
    users::passwd(vol.superblock_mut(), session.uid, new_password)
}

/// `trust` (spec.md §4.8): requires `sudo`.
pub fn trust(vol: &mut Volume, session: &Session, target_name: &str) -> FsResult<()> {
    if !session.sudo {
        return Err(FsError::PermissionDenied);
    }
    users::trust(vol.superblock_mut(), session.uid, target_name)
}

/// `distrust` (spec.md §4.8): requires `sudo`; self-distrust is forbidden.
pub fn distrust(vol: &mut Volume, session: &Session, target_name: &str) -> FsResult<()> {
    if !session.sudo {
        return Err(FsError::PermissionDenied);
    }
    users::distrust(vol.superblock_mut(), session.uid, target_name)
}

/// `format`: wipes the volume and resets the session's working directory to
/// the new root (spec.md §4.7).
pub fn format(vol: &mut Volume, session: &mut Session, block_size: Option<u16>) -> FsResult<u32> {
    let root = vol.format(block_size)?;
    session.reset_to_root(root);
    Ok(root)
}
