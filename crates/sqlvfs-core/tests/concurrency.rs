// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use sqlvfs_core::{Filesystem, NodeTable, OpenFlags, SessionDriver, SqlFs, VfsConfig, VfsFile};
use std::thread;

fn driver() -> SessionDriver {
    SessionDriver::new(NodeTable::open_in_memory().unwrap(), &VfsConfig::default())
}

fn put(fs: &SqlFs, path: &str, data: &[u8]) {
    let mut f = fs.create(path).unwrap();
    f.write(data).unwrap();
    f.close().unwrap();
}

fn get(fs: &SqlFs, path: &str) -> Vec<u8> {
    let mut f = fs.open(path).unwrap();
    let mut out = vec![0u8; f.stat().unwrap().size as usize];
    let n = f.read_at(&mut out, 0).unwrap();
    out.truncate(n);
    out
}

#[test]
fn fifty_concurrent_readers_see_same_content() {
    let driver = driver();
    let content: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
    put(&driver.authenticate("writer", ""), "/shared.bin", &content);

    thread::scope(|scope| {
        let handles: Vec<_> = (0..50)
            .map(|i| {
                let driver = &driver;
                scope.spawn(move || {
                    let fs = driver.authenticate(&format!("reader-{i}"), "");
                    get(&fs, "/shared.bin")
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), content);
        }
    });
}

#[test]
fn concurrent_sessions_build_one_tree() {
    let driver = driver();
    thread::scope(|scope| {
        for i in 0..20 {
            let driver = &driver;
            scope.spawn(move || {
                let fs = driver.authenticate(&format!("user-{i}"), "");
                fs.mkdir_all("/uploads/2024").unwrap();
                put(&fs, &format!("/uploads/2024/{i:02}.txt"), format!("{i}").as_bytes());
            });
        }
    });

    let fs = driver.authenticate("check", "");
    let mut dir = fs.open("/uploads/2024").unwrap();
    let names = dir.readdirnames(0).unwrap();
    assert_eq!(names.len(), 20);
    assert_eq!(names[0], "00.txt");
    assert_eq!(names[19], "19.txt");
    assert_eq!(driver.tree().table().stats().unwrap().directories, 3);
}

#[test]
fn last_close_wins() {
    let driver = driver();
    let alice = driver.authenticate("alice", "");
    let bob = driver.authenticate("bob", "");
    put(&alice, "/doc.txt", b"draft");

    let mut a = alice.open_file("/doc.txt", OpenFlags::create_truncate()).unwrap();
    let mut b = bob.open_file("/doc.txt", OpenFlags::append()).unwrap();
    a.write(b"from alice").unwrap();
    b.write(b" + bob").unwrap();

    b.close().unwrap();
    assert_eq!(get(&alice, "/doc.txt"), b"draft + bob");

    a.close().unwrap();
    assert_eq!(get(&bob, "/doc.txt"), b"from alice");
}

#[test]
fn open_handles_do_not_see_each_other() {
    let driver = driver();
    let fs = driver.authenticate("u", "");
    put(&fs, "/f", b"v1");

    let mut reader = fs.open("/f").unwrap();
    let mut writer = fs.create("/f").unwrap();
    writer.write(b"version two").unwrap();

    let mut buf = [0u8; 32];
    let n = reader.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"v1");

    writer.close().unwrap();
    // Still the snapshot taken at open.
    assert_eq!(reader.read_at(&mut buf, 0).unwrap(), 2);
    assert_eq!(get(&fs, "/f"), b"version two");
}

#[test]
fn close_after_concurrent_remove_reports_not_found() {
    let driver = driver();
    let fs = driver.authenticate("u", "");
    let mut f = fs.create("/gone").unwrap();
    f.write(b"data").unwrap();
    driver.authenticate("other", "").remove("/gone").unwrap();

    let err = f.close().unwrap_err();
    assert_eq!(err.kind(), sqlvfs_core::ErrorKind::NotFound);
    assert!(fs.stat("/gone").is_err());
}
