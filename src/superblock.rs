//! The on-disk superblock (spec.md §3): allocator state, root location, user
//! table, and trust matrix. Serialization follows the Design Notes'
//! re-architecture guidance — explicit little-endian field packing instead
//! of a raw `#[repr(C)]` struct dump, so the image is portable across hosts.

use crate::consts::{DEFAULT_ROOT_NAME, DEFAULT_ROOT_PASSWORD, MAX_USERS, NAME_LEN, UID_NONE, UID_ROOT};
use crate::error::{FsError, FsResult};

/// One entry of the user table.
#[derive(Clone, Copy)]
pub struct UserRecord {
    /// `0` means the slot is empty ("none/system"); nonzero is the uid.
    pub uid: u8,
    /// NUL-padded login name.
    pub name: [u8; NAME_LEN],
    /// NUL-padded password digest (see [`crate::users`] for the hash scheme).
    pub password: [u8; NAME_LEN],
}

impl UserRecord {
    const SIZE: usize = 1 + NAME_LEN + NAME_LEN;

    fn empty() -> Self {
        Self {
            uid: UID_NONE,
            name: [0; NAME_LEN],
            password: [0; NAME_LEN],
        }
    }

    /// Whether this slot is occupied.
    pub fn is_live(&self) -> bool {
        self.uid != UID_NONE
    }

    /// Decodes the NUL-terminated name as a UTF-8 string, lossily.
    pub fn name_str(&self) -> String {
        decode_fixed(&self.name)
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.uid);
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&self.password);
    }

    fn read(buf: &[u8]) -> Self {
        let mut name = [0u8; NAME_LEN];
        let mut password = [0u8; NAME_LEN];
        name.copy_from_slice(&buf[1..1 + NAME_LEN]);
        password.copy_from_slice(&buf[1 + NAME_LEN..1 + 2 * NAME_LEN]);
        Self {
            uid: buf[0],
            name,
            password,
        }
    }
}

/// Encodes a string into a fixed-size NUL-padded byte array, rejecting names
/// that don't fit.
pub fn encode_fixed<const N: usize>(s: &str) -> FsResult<[u8; N]> {
    let bytes = s.as_bytes();
    if bytes.len() >= N {
        return Err(FsError::InvalidArgument("name too long"));
    }
    let mut buf = [0u8; N];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(buf)
}

fn decode_fixed(buf: &[u8]) -> String {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

/// The block-0 superblock record.
pub struct Superblock {
    /// Block number of the root directory's inode.
    pub root_location: u32,
    /// Number of currently-free blocks.
    pub free_block_number: u32,
    /// Block number of the free-stack's current top block.
    pub free_block_stack_top: u32,
    /// Intra-block offset of the free-stack's top pointer.
    pub free_block_stack_offset: u16,
    /// Remaining usable capacity in bytes.
    pub available_capacity: u32,
    /// The user table.
    pub users: [UserRecord; MAX_USERS],
    /// `trust[i][j] == 1` means user slot `i` trusts user slot `j`.
    pub trust_matrix: [[u8; MAX_USERS]; MAX_USERS],
    /// `1` means the in-memory copy has been mutated since the last flush.
    pub dirty: bool,
}

impl Superblock {
    /// Size in bytes of the serialized record.
    pub const SIZE: usize = 4 + 4 + 4 + 2 + 4 + MAX_USERS * UserRecord::SIZE + MAX_USERS * MAX_USERS + 1;

    /// Builds a fresh superblock for a newly formatted image: allocator
    /// fields as computed by the caller, root user created with the default
    /// password, every other slot empty, self-trust set for root.
    pub fn new_formatted(
        root_location: u32,
        free_block_number: u32,
        free_block_stack_top: u32,
        free_block_stack_offset: u16,
        available_capacity: u32,
    ) -> FsResult<Self> {
        let mut users = [UserRecord::empty(); MAX_USERS];
        users[0] = UserRecord {
            uid: UID_ROOT,
            name: encode_fixed(DEFAULT_ROOT_NAME)?,
            password: crate::users::digest_password(DEFAULT_ROOT_NAME, DEFAULT_ROOT_PASSWORD),
        };
        let mut trust_matrix = [[0u8; MAX_USERS]; MAX_USERS];
        trust_matrix[0][0] = 1;
        Ok(Self {
            root_location,
            free_block_number,
            free_block_stack_top,
            free_block_stack_offset,
            available_capacity,
            users,
            trust_matrix,
            dirty: true,
        })
    }

    /// Serializes the record to little-endian bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::SIZE);
        out.extend_from_slice(&self.root_location.to_le_bytes());
        out.extend_from_slice(&self.free_block_number.to_le_bytes());
        out.extend_from_slice(&self.free_block_stack_top.to_le_bytes());
        out.extend_from_slice(&self.free_block_stack_offset.to_le_bytes());
        out.extend_from_slice(&self.available_capacity.to_le_bytes());
        for u in &self.users {
            u.write(&mut out);
        }
        for row in &self.trust_matrix {
            out.extend_from_slice(row);
        }
        out.push(self.dirty as u8);
        out
    }

    /// Parses a record previously produced by [`Self::to_bytes`].
    pub fn from_bytes(buf: &[u8]) -> FsResult<Self> {
        if buf.len() < Self::SIZE {
            return Err(FsError::InvalidArgument("truncated superblock"));
        }
        let mut off = 0;
        let read_u32 = |off: &mut usize, buf: &[u8]| -> u32 {
            let v = u32::from_le_bytes(buf[*off..*off + 4].try_into().unwrap());
            *off += 4;
            v
        };
        let root_location = read_u32(&mut off, buf);
        let free_block_number = read_u32(&mut off, buf);
        let free_block_stack_top = read_u32(&mut off, buf);
        let free_block_stack_offset = u16::from_le_bytes(buf[off..off + 2].try_into().unwrap());
        off += 2;
        let available_capacity = read_u32(&mut off, buf);

        let mut users = [UserRecord::empty(); MAX_USERS];
        for u in users.iter_mut() {
            *u = UserRecord::read(&buf[off..off + UserRecord::SIZE]);
            off += UserRecord::SIZE;
        }

        let mut trust_matrix = [[0u8; MAX_USERS]; MAX_USERS];
        for row in trust_matrix.iter_mut() {
            row.copy_from_slice(&buf[off..off + MAX_USERS]);
            off += MAX_USERS;
        }

        let dirty = buf[off] != 0;

        Ok(Self {
            root_location,
            free_block_number,
            free_block_stack_top,
            free_block_stack_offset,
            available_capacity,
            users,
            trust_matrix,
            dirty,
        })
    }

    /// Index of the first empty user slot, if any.
    pub fn first_empty_slot(&self) -> Option<usize> {
        self.users.iter().position(|u| !u.is_live())
    }

    /// Finds the slot index of a live user by name.
    pub fn find_user_by_name(&self, name: &str) -> Option<usize> {
        self.users
            .iter()
            .position(|u| u.is_live() && u.name_str() == name)
    }

    /// Finds the slot index of a live user by uid.
    pub fn find_user_by_uid(&self, uid: u8) -> Option<usize> {
        self.users.iter().position(|u| u.uid == uid)
    }
}
