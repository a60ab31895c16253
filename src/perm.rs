//! The permission and trust engine (spec.md §4.5).
//!
//! Three tiers apply, checked in order: the owner (or root acting through
//! `sudo`) always has full access; a system-owned item (`uid == 0`, e.g. the
//! root directory) is open to everyone; otherwise the trusted/other bits
//! apply, gated by whether the inode's owner trusts the requesting user.

use crate::consts::{UID_NONE, UID_ROOT};
use crate::inode::{Inode, PERM_R, PERM_W};
use crate::superblock::Superblock;
use crate::users;

/// Whether `uid` is the inode's owner, or root acting with `sudo`.
pub fn is_owner(uid: u8, sudo: bool, inode: &Inode) -> bool {
    inode.uid == uid || (sudo && uid == UID_ROOT)
}

fn group_bits(sb: &Superblock, uid: u8, inode: &Inode) -> u8 {
    if users::trusts(sb, inode.uid, uid) {
        inode.trusted_bits()
    } else {
        inode.other_bits()
    }
}

fn has_perm(sb: &Superblock, uid: u8, sudo: bool, inode: &Inode, bit: u8) -> bool {
    if is_owner(uid, sudo, inode) {
        return true;
    }
    if inode.uid == UID_NONE {
        return true;
    }
    group_bits(sb, uid, inode) & bit != 0
}

pub fn can_read(sb: &Superblock, uid: u8, sudo: bool, inode: &Inode) -> bool {
    has_perm(sb, uid, sudo, inode, PERM_R)
}

pub fn can_write(sb: &Superblock, uid: u8, sudo: bool, inode: &Inode) -> bool {
    has_perm(sb, uid, sudo, inode, PERM_W)
}

/// Only the owner (or root via `sudo`) may `chmod` an item.
pub fn can_chmod(uid: u8, sudo: bool, inode: &Inode) -> bool {
    is_owner(uid, sudo, inode)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::inode::{parse_perm_string, ChmodWho};

    fn sb_with_trust() -> Superblock {
        let mut sb = Superblock::new_formatted(3, 100, 1, 0, 4096 * 100).unwrap();
        users::mkuser(&mut sb, "alice", "p").unwrap();
        users::mkuser(&mut sb, "bob", "p").unwrap();
        sb
    }

    #[test]
    fn owner_always_has_access() {
        let sb = sb_with_trust();
        let mut inode = Inode::new_file(2, 5); // alice's file
        inode.chmod(ChmodWho::All, 0);
        assert!(can_read(&sb, 2, false, &inode));
        assert!(can_write(&sb, 2, false, &inode));
    }

    #[test]
    fn system_owned_is_open_to_all() {
        let sb = sb_with_trust();
        let inode = Inode::new_root(9);
        assert!(can_read(&sb, 3, false, &inode));
        assert!(can_write(&sb, 3, false, &inode));
    }

    #[test]
    fn trust_gates_which_group_bits_apply() {
        let mut sb = sb_with_trust();
        let mut inode = Inode::new_file(2, 5); // alice owns
        inode.chmod(ChmodWho::Trusted, parse_perm_string("rw-").unwrap());
        inode.chmod(ChmodWho::Other, parse_perm_string("r--").unwrap());

        // bob (uid 3) is not trusted by alice yet: other bits apply.
        assert!(can_read(&sb, 3, false, &inode));
        assert!(!can_write(&sb, 3, false, &inode));

        users::trust(&mut sb, 2, "bob").unwrap();
        assert!(can_write(&sb, 3, false, &inode));
    }

    #[test]
    fn sudo_grants_root_owner_access() {
        let sb = sb_with_trust();
        let mut inode = Inode::new_file(2, 5);
        inode.chmod(ChmodWho::All, 0);
        assert!(!can_read(&sb, UID_ROOT, false, &inode));
        assert!(can_read(&sb, UID_ROOT, true, &inode));
    }

    #[test]
    fn only_owner_or_sudo_root_can_chmod() {
        let inode = Inode::new_file(2, 5);
        assert!(can_chmod(2, false, &inode));
        assert!(!can_chmod(3, false, &inode));
        assert!(can_chmod(UID_ROOT, true, &inode));
    }
}
