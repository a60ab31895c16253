//! Integration tests driving a real temporary disk image through the full
//! stack, covering the end-to-end scenarios of spec.md §8.

use fscore::consts::UID_ROOT;
use fscore::inode::ChmodWho;
use fscore::session::{self, Session};
use fscore::users;
use fscore::{FsError, Volume};
use tempfile::NamedTempFile;

fn image_path() -> NamedTempFile {
    NamedTempFile::new().unwrap()
}

/// Scenario 1: create, format, mount.
#[test]
fn create_format_mount() {
    let tmp = image_path();
    {
        let _ = Volume::create_image(tmp.path(), 8 * 1024 * 1024).unwrap();
    }
    assert!(Volume::mount(tmp.path()).is_err());

    let mut vol = Volume::format_existing(tmp.path(), 4096).unwrap();
    let root = vol.root_location();
    drop(vol);

    vol = Volume::mount(tmp.path()).unwrap();
    let session = Session::new(UID_ROOT, root);
    let names = session::ls(&mut vol, root, &session, ".").unwrap();
    assert_eq!(names, vec![".".to_string(), "..".to_string()]);
}

/// Scenario 2: touch/ls/rm, and free-block accounting.
#[test]
fn touch_ls_rm() {
    let tmp = image_path();
    let mut vol = Volume::create_and_format(tmp.path(), 1 << 20, 4096).unwrap();
    let root = vol.root_location();
    let session = Session::new(UID_ROOT, root);

    let free_before = vol.superblock().free_block_number;
    session::touch(&mut vol, root, &session, "a").unwrap();
    session::touch(&mut vol, root, &session, "b").unwrap();
    let mut names = session::ls(&mut vol, root, &session, ".").unwrap();
    names.sort();
    assert_eq!(names, vec![".".to_string(), "..".to_string(), "a".to_string(), "b".to_string()]);

    session::rm(&mut vol, root, &session, "a").unwrap();
    let mut names = session::ls(&mut vol, root, &session, ".").unwrap();
    names.sort();
    assert_eq!(names, vec![".".to_string(), "..".to_string(), "b".to_string()]);

    session::rm(&mut vol, root, &session, "b").unwrap();
    assert_eq!(vol.superblock().free_block_number, free_before);
}

/// Scenario 3: mkdir/cd/rmdir.
#[test]
fn mkdir_cd_rmdir() {
    let tmp = image_path();
    let mut vol = Volume::create_and_format(tmp.path(), 1 << 20, 4096).unwrap();
    let root = vol.root_location();
    let mut session = Session::new(UID_ROOT, root);

    session::mkdir(&mut vol, root, &session, "d").unwrap();
    session.cwd = session::cd(&mut vol, root, &session, "d").unwrap();
    let mut names = session::ls(&mut vol, root, &session, ".").unwrap();
    names.sort();
    assert_eq!(names, vec![".".to_string(), "..".to_string()]);

    session.cwd = session::cd(&mut vol, root, &session, "..").unwrap();
    assert_eq!(session.cwd, root);
    session::rmdir(&mut vol, root, &session, "d").unwrap();
    let names = session::ls(&mut vol, root, &session, ".").unwrap();
    assert!(!names.iter().any(|n| n == "d"));
}

/// Scenario 4: permission — mkuser, login as alice, sudo cat as root.
#[test]
fn permission_sudo_read() {
    let tmp = image_path();
    let mut vol = Volume::create_and_format(tmp.path(), 1 << 20, 4096).unwrap();
    let root = vol.root_location();
    let mut root_session = Session::new(UID_ROOT, root);
    root_session.sudo = true;

    let alice_uid = session::mkuser(&mut vol, &root_session, "alice", "x").unwrap();

    let mut alice_session = Session::new(alice_uid, root);
    session::touch(&mut vol, root, &alice_session, "a").unwrap();
    session::chmod(&mut vol, root, &alice_session, "a", ChmodWho::All, "---").unwrap();

    // root without sudo cannot read alice's unreadable-by-others file.
    let root_plain = Session::new(UID_ROOT, root);
    assert!(matches!(
        session::cat(&mut vol, root, &root_plain, "a"),
        Err(FsError::PermissionDenied)
    ));

    // root with sudo bypasses the permission check.
    let mut root_sudo = Session::new(UID_ROOT, root);
    root_sudo.sudo = true;
    assert!(session::cat(&mut vol, root, &root_sudo, "a").is_ok());
}

/// Scenario 5: trust — alice trusts bob, bob can write a trusted-writable
/// file, charlie (untrusted) cannot.
#[test]
fn trust_gates_write_access() {
    let tmp = image_path();
    let mut vol = Volume::create_and_format(tmp.path(), 1 << 20, 4096).unwrap();
    let root = vol.root_location();
    let mut root_session = Session::new(UID_ROOT, root);
    root_session.sudo = true;

    let alice_uid = session::mkuser(&mut vol, &root_session, "alice", "x").unwrap();
    let bob_uid = session::mkuser(&mut vol, &root_session, "bob", "x").unwrap();
    let charlie_uid = session::mkuser(&mut vol, &root_session, "charlie", "x").unwrap();

    let mut alice_session = Session::new(alice_uid, root);
    alice_session.sudo = true;
    session::touch(&mut vol, root, &alice_session, "f").unwrap();
    session::chmod(&mut vol, root, &alice_session, "f", ChmodWho::Trusted, "rw-").unwrap();
    session::chmod(&mut vol, root, &alice_session, "f", ChmodWho::Other, "---").unwrap();
    session::trust(&mut vol, &alice_session, "bob").unwrap();

    let bob_session = Session::new(bob_uid, root);
    session::write_file_content(&mut vol, root, &bob_session, "f", b"hi", false).unwrap();

    let charlie_session = Session::new(charlie_uid, root);
    assert!(matches!(
        session::write_file_content(&mut vol, root, &charlie_session, "f", b"no", false),
        Err(FsError::PermissionDenied)
    ));
}

/// Scenario 6: chmod mask isolation.
#[test]
fn chmod_mask_isolation() {
    let tmp = image_path();
    let mut vol = Volume::create_and_format(tmp.path(), 1 << 20, 4096).unwrap();
    let root = vol.root_location();
    let session = Session::new(UID_ROOT, root);

    session::touch(&mut vol, root, &session, "f").unwrap();
    session::chmod(&mut vol, root, &session, "f", ChmodWho::Trusted, "r-x").unwrap();

    let bno = fscore::path::resolve(&mut vol, session.uid, session.sudo, root, root, "f").unwrap();
    let inode = vol.read_inode(bno).unwrap();
    assert_eq!(inode.trusted_bits(), 0b101);
    assert_eq!(inode.other_bits(), 0b100); // untouched by the `-t` chmod

    session::chmod(&mut vol, root, &session, "f", ChmodWho::Other, "---").unwrap();
    let inode = vol.read_inode(bno).unwrap();
    assert_eq!(inode.trusted_bits(), 0b101); // untouched by the `-o` chmod
    assert_eq!(inode.other_bits(), 0);
}

/// Mount persistence: operations survive a teardown/re-mount cycle
/// (spec.md §8 universal property 5).
#[test]
fn mount_persistence() {
    let tmp = image_path();
    {
        let mut vol = Volume::create_and_format(tmp.path(), 1 << 20, 4096).unwrap();
        let root = vol.root_location();
        let mut root_session = Session::new(UID_ROOT, root);
        root_session.sudo = true;
        session::mkuser(&mut vol, &root_session, "alice", "x").unwrap();
        session::mkdir(&mut vol, root, &root_session, "d").unwrap();
        session::touch(&mut vol, root, &root_session, "f").unwrap();
        session::chmod(&mut vol, root, &root_session, "f", ChmodWho::All, "rw-").unwrap();
        vol.update().unwrap();
    }

    let mut vol = Volume::mount(tmp.path()).unwrap();
    let root = vol.root_location();
    let session = Session::new(UID_ROOT, root);
    let mut names = session::ls(&mut vol, root, &session, ".").unwrap();
    names.sort();
    assert_eq!(
        names,
        vec![".".to_string(), "..".to_string(), "d".to_string(), "f".to_string()]
    );
    assert!(users::lsuser(vol.superblock()).contains(&"alice".to_string()));
    let bno = fscore::path::resolve(&mut vol, UID_ROOT, false, root, root, "f").unwrap();
    let inode = vol.read_inode(bno).unwrap();
    assert_eq!(inode.trusted_bits(), 0b110);
}
