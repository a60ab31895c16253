//! User table operations: `mkuser`, `rmuser`, `passwd`, `trust`, `distrust`,
//! `lsuser`, and login authentication (spec.md §4.6). Password hashing is
//! grounded on the teacher's `argon2` usage in `utils/src/user.rs`, adapted
//! to produce a raw fixed-size digest rather than a PHC string — see
//! SPEC_FULL.md §3.1 for why the on-disk `password` field can't hold one.

use crate::consts::{MAX_USERS, NAME_LEN};
use crate::error::{FsError, FsResult};
use crate::superblock::{encode_fixed, Superblock, UserRecord};
use argon2::Argon2;

/// Non-secret constant XORed into the derived salt so two users who share a
/// login name on different images don't share a salt with some other fixed
/// system value. Not a substitute for a random salt; chosen only so the same
/// (name, password) pair always re-derives the same digest without storing
/// the salt on disk.
const SALT_PEPPER: [u8; 16] = *b"mutils-fsd-salt\0";

fn derive_salt(name: &str) -> [u8; 16] {
    let mut salt = [0u8; 16];
    let lower = name.to_lowercase();
    let bytes = lower.as_bytes();
    let n = bytes.len().min(16);
    salt[..n].copy_from_slice(&bytes[..n]);
    for i in 0..16 {
        salt[i] ^= SALT_PEPPER[i];
    }
    salt
}

/// Derives the fixed-size password digest stored in a [`UserRecord`].
/// Deterministic in `name` and `password`: the same pair always yields the
/// same digest, which is what lets us re-verify a login against a single
/// stored field with no separate salt column.
pub fn digest_password(name: &str, password: &str) -> [u8; NAME_LEN] {
    let salt = derive_salt(name);
    let mut out = [0u8; NAME_LEN];
    Argon2::default()
        .hash_password_into(password.as_bytes(), &salt, &mut out)
        .expect("fixed-size output within argon2 bounds");
    out
}

fn check_password(name: &str, password: &str, stored: &[u8; NAME_LEN]) -> bool {
    &digest_password(name, password) == stored
}

/// Verifies a login attempt, returning the uid on success.
pub fn authenticate(sb: &Superblock, name: &str, password: &str) -> FsResult<u8> {
    let slot = sb.find_user_by_name(name).ok_or(FsError::AuthFailed)?;
    let user = &sb.users[slot];
    if check_password(name, password, &user.password) {
        Ok(user.uid)
    } else {
        Err(FsError::AuthFailed)
    }
}

/// Creates a new user, returning the assigned uid. The uid is the table
/// slot's position plus one, so it never collides with a uid still held by
/// another live slot.
pub fn mkuser(sb: &mut Superblock, name: &str, password: &str) -> FsResult<u8> {
    if sb.find_user_by_name(name).is_some() {
        return Err(FsError::Exists);
    }
    let slot = sb.first_empty_slot().ok_or(FsError::NoSpace)?;
    let uid = slot as u8 + 1;
    sb.users[slot] = UserRecord {
        uid,
        name: encode_fixed(name)?,
        password: digest_password(name, password),
    };
    sb.trust_matrix[slot] = [0; MAX_USERS];
    for row in sb.trust_matrix.iter_mut() {
        row[slot] = 0;
    }
    sb.trust_matrix[slot][slot] = 1;
    sb.dirty = true;
    Ok(uid)
}

/// Removes a user by name. The root account (uid 1) can never be removed.
pub fn rmuser(sb: &mut Superblock, name: &str) -> FsResult<u8> {
    let slot = sb.find_user_by_name(name).ok_or(FsError::NotFound)?;
    let uid = sb.users[slot].uid;
    if uid == crate::consts::UID_ROOT {
        return Err(FsError::PermissionDenied);
    }
    sb.users[slot] = UserRecord::empty();
    sb.trust_matrix[slot] = [0; MAX_USERS];
    for row in sb.trust_matrix.iter_mut() {
        row[slot] = 0;
    }
    sb.dirty = true;
    Ok(uid)
}

/// Changes a user's password in place.
pub fn passwd(sb: &mut Superblock, uid: u8, new_password: &str) -> FsResult<()> {
    let slot = sb.find_user_by_uid(uid).ok_or(FsError::NotFound)?;
    let name = sb.users[slot].name_str();
    sb.users[slot].password = digest_password(&name, new_password);
    sb.dirty = true;
    Ok(())
}

/// Records that `truster_uid` trusts `trusted_name`.
pub fn trust(sb: &mut Superblock, truster_uid: u8, trusted_name: &str) -> FsResult<()> {
    let truster_slot = sb.find_user_by_uid(truster_uid).ok_or(FsError::NotFound)?;
    let trusted_slot = sb.find_user_by_name(trusted_name).ok_or(FsError::NotFound)?;
    sb.trust_matrix[truster_slot][trusted_slot] = 1;
    sb.dirty = true;
    Ok(())
}

/// Revokes a prior `trust` call.
pub fn distrust(sb: &mut Superblock, truster_uid: u8, trusted_name: &str) -> FsResult<()> {
    let truster_slot = sb.find_user_by_uid(truster_uid).ok_or(FsError::NotFound)?;
    let trusted_slot = sb.find_user_by_name(trusted_name).ok_or(FsError::NotFound)?;
    if truster_slot == trusted_slot {
        return Err(FsError::InvalidArgument("a user always trusts itself"));
    }
    sb.trust_matrix[truster_slot][trusted_slot] = 0;
    sb.dirty = true;
    Ok(())
}

/// Whether `truster_uid` trusts `trusted_uid` (spec.md §4.5 permission engine).
pub fn trusts(sb: &Superblock, truster_uid: u8, trusted_uid: u8) -> bool {
    let Some(truster_slot) = sb.find_user_by_uid(truster_uid) else {
        return false;
    };
    let Some(trusted_slot) = sb.find_user_by_uid(trusted_uid) else {
        return false;
    };
    sb.trust_matrix[truster_slot][trusted_slot] != 0
}

/// Lists all live user names, in table order.
pub fn lsuser(sb: &Superblock) -> Vec<String> {
    sb.users
        .iter()
        .filter(|u| u.is_live())
        .map(|u| u.name_str())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn fresh() -> Superblock {
        Superblock::new_formatted(3, 100, 1, 0, 4096 * 100).unwrap()
    }

    #[test]
    fn digest_is_deterministic_and_name_sensitive() {
        let a = digest_password("alice", "hunter2");
        let b = digest_password("alice", "hunter2");
        let c = digest_password("bob", "hunter2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn mkuser_then_authenticate() {
        let mut sb = fresh();
        let uid = mkuser(&mut sb, "alice", "hunter2").unwrap();
        assert_eq!(authenticate(&sb, "alice", "hunter2").unwrap(), uid);
        assert!(authenticate(&sb, "alice", "wrong").is_err());
    }

    #[test]
    fn mkuser_rejects_duplicate_name() {
        let mut sb = fresh();
        mkuser(&mut sb, "alice", "hunter2").unwrap();
        assert!(matches!(mkuser(&mut sb, "alice", "other"), Err(FsError::Exists)));
    }

    #[test]
    fn mkuser_exhausts_table() {
        let mut sb = fresh();
        for i in 0..MAX_USERS - 1 {
            mkuser(&mut sb, &format!("u{i}"), "p").unwrap();
        }
        assert!(matches!(mkuser(&mut sb, "overflow", "p"), Err(FsError::NoSpace)));
    }

    #[test]
    fn rmuser_cannot_remove_root() {
        let mut sb = fresh();
        assert!(matches!(rmuser(&mut sb, "root"), Err(FsError::PermissionDenied)));
    }

    #[test]
    fn trust_and_distrust_round_trip() {
        let mut sb = fresh();
        let alice_uid = mkuser(&mut sb, "alice", "p").unwrap();
        mkuser(&mut sb, "bob", "p").unwrap();
        assert!(!trusts(&sb, alice_uid, 1));
        trust(&mut sb, alice_uid, "root").unwrap();
        assert!(trusts(&sb, alice_uid, 1));
        distrust(&mut sb, alice_uid, "root").unwrap();
        assert!(!trusts(&sb, alice_uid, 1));
    }

    #[test]
    fn passwd_changes_digest() {
        let mut sb = fresh();
        let uid = mkuser(&mut sb, "alice", "old").unwrap();
        passwd(&mut sb, uid, "new").unwrap();
        assert!(authenticate(&sb, "alice", "old").is_err());
        assert!(authenticate(&sb, "alice", "new").is_ok());
    }

    #[test]
    fn lsuser_lists_live_names() {
        let mut sb = fresh();
        mkuser(&mut sb, "alice", "p").unwrap();
        let names = lsuser(&sb);
        assert_eq!(names, vec!["root".to_string(), "alice".to_string()]);
    }
}
