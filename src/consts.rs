//! Layout constants. Most sizes are derived from the block size `B`, which is
//! parameterised at format time (spec default: 4096 bytes); a handful of
//! table sizes are fixed regardless of `B`, mirroring `original_source`'s
//! `Constraints.h`.

/// Default block size used by `format` when the caller doesn't override it.
pub const DEFAULT_BLOCK_SIZE: u16 = 4096;

/// Maximum number of users in the user table (`MAX_USER_NUMS` upstream).
pub const MAX_USERS: usize = 8;

/// Fixed size of a username or password field, in bytes.
pub const NAME_LEN: usize = 32;

/// Fixed size of a directory entry's name field, in bytes. Directory items
/// are 128 bits (16 bytes): a 4-byte inode block number plus a 12-byte name.
pub const DIR_NAME_LEN: usize = 12;

/// Size in bytes of one on-disk `DirectoryItem` record.
pub const DIR_ITEM_SIZE: usize = 16;

/// Reserved uid meaning "no user / system-owned".
pub const UID_NONE: u8 = 0;

/// uid of the root user, created at format time.
pub const UID_ROOT: u8 = 1;

/// Default password for the root account created at format time.
pub const DEFAULT_ROOT_PASSWORD: &str = "123456";

/// Default name for the root account.
pub const DEFAULT_ROOT_NAME: &str = "root";

/// Byte length of a formatted timestamp: `"YYYY-MM-DD HH:MM:SS"` plus padding.
pub const TIME_LEN: usize = 25;

/// Header region preceding the superblock: `capacity:u32 + isUnformatted:i8 + blockSize:u16`.
pub const HEADER_LEN: u64 = 4 + 1 + 2;

/// Number of `u32` slots held by one block of the free-block stack, or by one
/// FileIndex's data-pointer-plus-`next` array.
pub fn slots_per_block(block_size: u16) -> u32 {
    block_size as u32 / 4
}

/// Number of data-block pointers in one FileIndex block (`K` in spec.md §4.4).
pub fn file_index_capacity(block_size: u16) -> u32 {
    slots_per_block(block_size) - 1
}

/// Maximum number of live entries in one directory block.
pub fn dir_items_per_block(block_size: u16) -> u32 {
    block_size as u32 / DIR_ITEM_SIZE as u32
}
