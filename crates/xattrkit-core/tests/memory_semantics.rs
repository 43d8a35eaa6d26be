// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Attribute layer behavior against the in-memory kernel

use std::path::Path;
use std::sync::Arc;
use xattrkit_core::testing::{Access, MemoryXattrSys};
use xattrkit_core::{AttributeAccess, Errno, Target, XattrErrorKind, XattrOptions};

const NONE: XattrOptions = XattrOptions::empty();

fn setup() -> (Arc<MemoryXattrSys>, AttributeAccess<Arc<MemoryXattrSys>>) {
    let sys = Arc::new(MemoryXattrSys::new());
    let access = AttributeAccess::new(Arc::clone(&sys));
    (sys, access)
}

fn assert_errno<T: std::fmt::Debug>(result: xattrkit_core::XattrResult<T>, errno: i32) {
    let err = result.expect_err("operation should fail");
    let needle = format!(" errno: {} ", errno);
    assert!(err.message().contains(&needle), "unexpected message: {}", err);
}

#[test]
fn missing_target_fails_every_operation_with_enoent() {
    let (_sys, access) = setup();
    let f = Path::new("/tmp/missing");

    assert_errno(access.get(f, "", NONE), 2);
    assert_errno(access.get(f, "foobar", NONE), 2);
    assert_errno(access.get(f, "foobar", XattrOptions::NOFOLLOW), 2);
    assert_errno(access.get(f, "foobar", XattrOptions::CREATE), 2);
    assert_errno(access.get(f, "foobar", XattrOptions::REPLACE), 2);
    assert_errno(access.get(f, "foobar", XattrOptions::SHOW_COMPRESSION), 2);
    assert_errno(access.set(f, "foobar", b"v", NONE), 2);
    assert_errno(access.remove(f, "xattr", NONE, false), 2);
    assert_errno(access.remove(f, "xattr", XattrOptions::CREATE, false), 2);
    assert_errno(access.list(f, NONE), 2);
    assert_errno(access.size(f, "foobar", NONE), 2);

    // existence checks must not hide a missing target
    let err = access.exists(f, "foobar", NONE).unwrap_err();
    assert_eq!(err.kind(), XattrErrorKind::NotFound);
}

#[test]
fn unknown_option_bits_are_einval() {
    let (sys, access) = setup();
    let all = XattrOptions::from_raw(i32::MAX as u32);

    assert_errno(access.get("/tmp/missing", "foobar", all), 22);
    assert_errno(access.remove("/tmp/missing", "xattr", all, false), 22);

    sys.create_file("/tmp/f").unwrap();
    assert_errno(access.list("/tmp/f", all), 22);
}

#[test]
fn permission_denied_is_reported() {
    let (sys, access) = setup();
    sys.create_file("/private/etc/security/audit_user").unwrap();
    sys.set_access("/private/etc/security/audit_user", Access::Denied).unwrap();

    assert_errno(access.get("/private/etc/security/audit_user", "foobar", NONE), 13);
    let err = access.exists("/private/etc/security/audit_user", "foobar", NONE).unwrap_err();
    assert_eq!(err.kind(), XattrErrorKind::PermissionDenied);
}

#[test]
fn get_set_list_remove_lifecycle() {
    let (sys, access) = setup();
    let f = Path::new("/tmp/lifecycle");
    sys.create_file(f).unwrap();

    assert_errno(access.get(f, "", NONE), 22);
    assert_errno(access.get(f, "foobar", NONE), 93);
    assert_errno(access.set_str(f, "", "deadbeef", NONE), 22);
    assert!(access.list(f, NONE).unwrap().is_empty());

    access.set_str(f, "foobar", "deadbeef", NONE).unwrap();
    assert_eq!(access.size(f, "foobar", NONE).unwrap(), 8);
    assert_eq!(access.get(f, "foobar", NONE).unwrap(), b"deadbeef");
    assert_eq!(access.list(f, NONE).unwrap(), vec!["foobar".to_string()]);

    access.remove(f, "foobar", NONE, false).unwrap();
    assert_errno(access.get(f, "foobar", NONE), 93);

    // forced removal of an absent attribute is quiet
    access.remove(f, "foobar", NONE, true).unwrap();
    // but an invalid name is never tolerated
    assert_errno(access.remove(f, "", NONE, true), 22);

    assert!(access.list(f, NONE).unwrap().is_empty());
    assert!(!access.exists(f, "foobar", NONE).unwrap());

    sys.unlink(f).unwrap();
    // works like rm -f once the file itself is gone
    access.remove(f, "foobar", NONE, true).unwrap();
    assert_errno(access.get(f, "foobar", NONE), 2);
    assert_errno(access.list(f, NONE), 2);
}

#[test]
fn mixed_values_sizes_and_removal() {
    let (sys, access) = setup();
    let f = Path::new("/tmp/uuid_0b7e0c7e-6a4f-4a57-9d0c-3f1c3c1d2a10");

    assert_errno(access.remove(f, "xattr", NONE, false), 2);
    assert_errno(access.remove(f, "xattr", XattrOptions::NOFOLLOW, false), 2);

    sys.create_file(f).unwrap();
    assert_errno(access.remove(f, "xattr", NONE, false), 93);
    assert_errno(access.set_str(f, "", "some values", NONE), 22);

    let uuid = "5f0c2f3e-8f0e-4b8e-9c7b-1d2e3f4a5b6c";
    access.set_str(f, "xattr1", "", NONE).unwrap();
    access.set_str(f, "xattr2", uuid, NONE).unwrap();
    access.set(f, "xattr3", uuid.as_bytes(), XattrOptions::NOFOLLOW).unwrap();
    access.set(f, "xattr4", "祝你好运！".as_bytes(), XattrOptions::CREATE).unwrap();
    access.set_str(f, "xattr5", "こんにちは。", NONE).unwrap();
    access.set_str(f, "xattr6", "I got a 😊", NONE).unwrap();
    access.set_str(f, "xattr7", "", XattrOptions::CREATE).unwrap();
    access.set_str(f, "xattr7", "你好 👋", XattrOptions::REPLACE).unwrap();
    access.set_str(f, "xattr😋", "Wünsche schönes ß", NONE).unwrap();

    let names = [
        "xattr1", "xattr2", "xattr3", "xattr4", "xattr5", "xattr6", "xattr7", "xattr😋",
    ];
    for name in names {
        assert!(access.exists(f, name, NONE).unwrap(), "{name} should exist");
    }

    let expected = [
        ("xattr1", NONE, 0),
        ("xattr2", NONE, 36),
        ("xattr3", NONE, 36),
        ("xattr4", NONE, 15),
        ("xattr5", NONE, 18),
        ("xattr6", NONE, 12),
        ("xattr7", XattrOptions::NOFOLLOW, 11),
        ("xattr😋", NONE, 20),
    ];
    for (name, options, size) in expected {
        assert_eq!(access.size(f, name, options).unwrap(), size, "size of {name}");
    }

    let names = access.list(f, NONE).unwrap();
    assert_eq!(names.len(), 8);
    assert_eq!(names.iter().filter(|n| n.as_str() == "xattr2").count(), 1);
    assert_eq!(access.get(f, "xattr😋", NONE).unwrap().len(), 20);

    access.remove(f, "xattr😋", NONE, false).unwrap();
    assert_eq!(access.list(f, NONE).unwrap().len(), 7);

    access.remove(f, "xattr2", NONE, false).unwrap();
    assert!(!access.list(f, NONE).unwrap().contains(&"xattr2".to_string()));
    assert!(!access.exists(f, "xattr2", NONE).unwrap());
}

#[test]
fn create_and_replace_restrict_upsert() {
    let (sys, access) = setup();
    sys.create_file("/tmp/f").unwrap();

    access.set("/tmp/f", "k", b"one", XattrOptions::CREATE).unwrap();
    let err = access.set("/tmp/f", "k", b"two", XattrOptions::CREATE).unwrap_err();
    assert_eq!(err.kind(), XattrErrorKind::AlreadyExists);

    let err = access.set("/tmp/f", "absent", b"x", XattrOptions::REPLACE).unwrap_err();
    assert_eq!(err.kind(), XattrErrorKind::AttributeNotFound);

    let both = XattrOptions::CREATE | XattrOptions::REPLACE;
    let err = access.set("/tmp/f", "k", b"x", both).unwrap_err();
    assert_eq!(err.kind(), XattrErrorKind::InvalidArgument);

    access.set("/tmp/f", "k", b"three", NONE).unwrap();
    assert_eq!(access.get("/tmp/f", "k", NONE).unwrap(), b"three");
}

#[test]
fn round_trip_preserves_bytes() {
    let (sys, access) = setup();
    sys.create_file("/tmp/f").unwrap();

    let values: [&[u8]; 4] = [b"", b"\0\x01\xff", "ünïcödé".as_bytes(), &[0xAB; 4096]];
    for (i, value) in values.iter().enumerate() {
        let name = format!("user.v{i}");
        access.set("/tmp/f", &name, value, NONE).unwrap();
        let read = access.get("/tmp/f", &name, NONE).unwrap();
        assert_eq!(&read[..], *value);
        assert_eq!(access.size("/tmp/f", &name, NONE).unwrap(), read.len() as u64);
    }
}

#[test]
fn symlinks_follow_unless_nofollow() {
    let (sys, access) = setup();
    sys.create_file("/tmp/real").unwrap();
    sys.symlink("/tmp/real", "/tmp/link").unwrap();

    access.set("/tmp/link", "user.k", b"through", NONE).unwrap();
    assert_eq!(access.get("/tmp/real", "user.k", NONE).unwrap(), b"through");
    assert_eq!(access.get("/tmp/link", "user.k", NONE).unwrap(), b"through");

    let err = access.get("/tmp/link", "user.k", XattrOptions::NOFOLLOW).unwrap_err();
    assert_eq!(err.kind(), XattrErrorKind::AttributeNotFound);
    assert!(!access.exists("/tmp/link", "user.k", XattrOptions::NOFOLLOW).unwrap());

    access.set("/tmp/link", "user.own", b"link", XattrOptions::NOFOLLOW).unwrap();
    assert_eq!(access.list("/tmp/link", XattrOptions::NOFOLLOW).unwrap(), vec!["user.own"]);
    assert_eq!(access.list("/tmp/real", NONE).unwrap(), vec!["user.k"]);
}

#[test]
fn descriptor_forms_match_path_forms() {
    let (sys, access) = setup();
    sys.create_file("/tmp/f").unwrap();
    let fd = sys.open("/tmp/f", false).unwrap();
    let target = Target::Descriptor(fd);

    access.set(target, "user.k", b"by-fd", NONE).unwrap();
    assert_eq!(access.get("/tmp/f", "user.k", NONE).unwrap(), b"by-fd");
    assert_eq!(access.get(target, "user.k", NONE).unwrap(), b"by-fd");
    assert_eq!(access.size(target, "user.k", NONE).unwrap(), 5);
    assert!(access.exists(target, "user.k", NONE).unwrap());
    assert_eq!(access.list(target, NONE).unwrap(), vec!["user.k"]);
    access.remove(target, "user.k", NONE, false).unwrap();
    assert!(!access.exists(target, "user.k", NONE).unwrap());

    sys.close(fd).unwrap();
    let err = access.list(target, NONE).unwrap_err();
    assert_eq!(err.errno(), Errno::EBADF);
    assert_eq!(err.kind(), XattrErrorKind::Io);
}

#[test]
fn unsupported_filesystem_is_reported() {
    let (sys, access) = setup();
    sys.create_file("/dev/null").unwrap();
    sys.set_xattr_support("/dev/null", false).unwrap();

    let err = access.set("/dev/null", "user.k", b"v", NONE).unwrap_err();
    assert_eq!(err.kind(), XattrErrorKind::NotSupported);
    assert_eq!(access.size_bits("/dev/null").unwrap(), 0);
}

#[test]
fn size_bits_reports_missing_paths() {
    let (sys, access) = setup();
    sys.create_file("/tmp").unwrap();

    assert!(access.size_bits("/tmp").unwrap() > 0);
    assert_errno(access.size_bits("/foo/bar/gee"), 2);
}

#[test]
fn read_only_objects_reject_writes() {
    let (sys, access) = setup();
    sys.create_file("/tmp/ro").unwrap();
    access.set("/tmp/ro", "user.k", b"v", NONE).unwrap();
    sys.set_access("/tmp/ro", Access::ReadOnly).unwrap();

    assert_eq!(access.get("/tmp/ro", "user.k", NONE).unwrap(), b"v");
    let err = access.remove("/tmp/ro", "user.k", NONE, true).unwrap_err();
    assert_eq!(err.kind(), XattrErrorKind::PermissionDenied);
}

#[test]
fn oversized_values_are_invalid() {
    let sys = MemoryXattrSys::with_max_value_size(16);
    sys.create_file("/tmp/f").unwrap();
    let access = AttributeAccess::new(sys);

    let err = access.set("/tmp/f", "user.k", &[0u8; 17], NONE).unwrap_err();
    assert_eq!(err.errno(), Errno::E2BIG);
    assert_eq!(err.kind(), XattrErrorKind::InvalidArgument);
}

#[test]
fn compression_attributes_need_show_compression() {
    let (sys, access) = setup();
    sys.create_file("/tmp/c").unwrap();
    access.set("/tmp/c", "com.apple.decmpfs", b"fpmc", NONE).unwrap();
    access.set("/tmp/c", "user.k", b"v", NONE).unwrap();
    sys.set_compressed("/tmp/c", true).unwrap();

    assert_eq!(access.list("/tmp/c", NONE).unwrap(), vec!["user.k"]);
    assert!(!access.exists("/tmp/c", "com.apple.decmpfs", NONE).unwrap());

    let shown = access.list("/tmp/c", XattrOptions::SHOW_COMPRESSION).unwrap();
    assert_eq!(shown, vec!["com.apple.decmpfs", "user.k"]);
    assert_eq!(
        access.get("/tmp/c", "com.apple.decmpfs", XattrOptions::SHOW_COMPRESSION).unwrap(),
        b"fpmc"
    );
}

#[test]
fn concurrent_shrink_returns_short_read() {
    let (sys, access) = setup();
    sys.create_file("/tmp/f").unwrap();
    access.set("/tmp/f", "user.k", b"long value", NONE).unwrap();

    sys.mutate_after_probe("user.k", b"short");
    assert_eq!(access.get("/tmp/f", "user.k", NONE).unwrap(), b"short");
}

#[test]
fn concurrent_growth_is_replayed() {
    let (sys, access) = setup();
    sys.create_file("/tmp/f").unwrap();
    access.set("/tmp/f", "user.k", b"tiny", NONE).unwrap();
    let before = sys.syscall_count();

    sys.mutate_after_probe("user.k", b"much larger value");
    assert_eq!(access.get("/tmp/f", "user.k", NONE).unwrap(), b"much larger value");
    // probe, failed read, probe, read
    assert_eq!(sys.syscall_count() - before, 4);
}

#[test]
fn list_growth_is_replayed() {
    let (sys, access) = setup();
    sys.create_file("/tmp/f").unwrap();
    access.set("/tmp/f", "user.a", b"1", NONE).unwrap();
    let before = sys.syscall_count();

    sys.insert_after_list_probe("user.added.late", b"2");
    assert_eq!(access.list("/tmp/f", NONE).unwrap(), vec!["user.a", "user.added.late"]);
    // probe, failed read, probe, read
    assert_eq!(sys.syscall_count() - before, 4);
}

#[test]
fn list_shrink_returns_remaining_names() {
    let (sys, access) = setup();
    sys.create_file("/tmp/f").unwrap();
    access.set("/tmp/f", "user.a", b"1", NONE).unwrap();
    access.set("/tmp/f", "user.gone", b"2", NONE).unwrap();
    let before = sys.syscall_count();

    sys.remove_after_list_probe("user.gone");
    assert_eq!(access.list("/tmp/f", NONE).unwrap(), vec!["user.a"]);
    assert_eq!(sys.syscall_count() - before, 2);
}

#[test]
fn empty_value_is_a_single_probe() {
    let (sys, access) = setup();
    sys.create_file("/tmp/f").unwrap();
    access.set("/tmp/f", "user.empty", b"", NONE).unwrap();
    let before = sys.syscall_count();

    assert!(access.get("/tmp/f", "user.empty", NONE).unwrap().is_empty());
    assert_eq!(sys.syscall_count() - before, 1);
}

#[test]
fn concurrent_callers_share_one_access() {
    let (sys, access) = setup();
    sys.create_file("/tmp/shared").unwrap();
    let access = Arc::new(access);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let access = Arc::clone(&access);
            std::thread::spawn(move || {
                let name = format!("user.t{i}");
                access.set_str("/tmp/shared", &name, &name, NONE).unwrap();
                access.get("/tmp/shared", &name, NONE).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), format!("user.t{i}").into_bytes());
    }
    assert_eq!(access.list("/tmp/shared", NONE).unwrap().len(), 8);
}
