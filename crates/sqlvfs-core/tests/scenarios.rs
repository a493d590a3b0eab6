// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end behaviour through the session driver and the capability traits.

use sqlvfs_core::{
    ErrorKind, Filesystem, NodeTable, OpenFlags, SessionDriver, SqlFs, VfsConfig, VfsFile,
};

const MAX_FILE_SIZE: u64 = 4096;

fn session() -> SqlFs {
    let mut config = VfsConfig::default();
    config.limits.max_file_size = MAX_FILE_SIZE;
    SessionDriver::new(NodeTable::open_in_memory().unwrap(), &config).authenticate("test", "")
}

fn put(fs: &SqlFs, path: &str, data: &[u8]) {
    let mut f = fs.create(path).unwrap();
    assert_eq!(f.write(data).unwrap(), data.len());
    f.close().unwrap();
}

fn get(fs: &SqlFs, path: &str) -> Vec<u8> {
    let mut f = fs.open(path).unwrap();
    let mut out = Vec::new();
    let mut chunk = [0u8; 100];
    loop {
        match f.read(&mut chunk).unwrap() {
            0 => break,
            n => out.extend_from_slice(&chunk[..n]),
        }
    }
    f.close().unwrap();
    out
}

#[test]
fn mkdir_then_stat_is_directory() {
    let fs = session();
    fs.mkdir("/a").unwrap();
    let info = fs.stat("/a").unwrap();
    assert!(info.is_dir);
    assert_eq!(info.size, 0);
}

#[test]
fn create_write_close_then_read() {
    let fs = session();
    fs.mkdir("/a").unwrap();
    put(&fs, "/a/b.txt", b"hi");
    assert_eq!(fs.stat("/a/b.txt").unwrap().size, 2);
    assert_eq!(get(&fs, "/a/b.txt"), b"hi");
}

#[test]
fn round_trip_various_sizes() {
    let fs = session();
    for (i, len) in [0usize, 1, 99, 100, 101, 4096].into_iter().enumerate() {
        let data: Vec<u8> = (0..len).map(|b| (b * 7 + i) as u8).collect();
        let path = format!("/file-{i}.bin");
        put(&fs, &path, &data);
        assert_eq!(get(&fs, &path), data, "len {len}");
    }
}

#[test]
fn mkdir_all_creates_every_ancestor() {
    let fs = session();
    fs.mkdir_all("/x/y/z").unwrap();
    fs.mkdir_all("/x/y/z").unwrap();
    for p in ["/x", "/x/y", "/x/y/z"] {
        assert!(fs.stat(p).unwrap().is_dir, "{p}");
    }
    let mut root = fs.open("/").unwrap();
    assert_eq!(root.readdirnames(0).unwrap(), ["x"]);
}

#[test]
fn rename_directory_moves_contents() {
    let fs = session();
    fs.mkdir("/a").unwrap();
    put(&fs, "/a/b.txt", b"hi");
    fs.rename("/a", "/renamed").unwrap();

    assert_eq!(fs.stat("/a").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(fs.stat("/a/b.txt").unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(fs.stat("/renamed/b.txt").unwrap().size, 2);
    assert_eq!(get(&fs, "/renamed/b.txt"), b"hi");
}

#[test]
fn rename_deep_subtree_rewrites_every_parent() {
    let fs = session();
    fs.mkdir_all("/src/one/two/three").unwrap();
    put(&fs, "/src/one/two/three/leaf", b"leaf");
    put(&fs, "/src/one/mid", b"mid");

    fs.rename("/src", "/dst").unwrap();

    let mut three = fs.open("/dst/one/two/three").unwrap();
    let entries = three.readdir(0).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "/dst/one/two/three/leaf");

    let mut one = fs.open("/dst/one").unwrap();
    assert_eq!(one.readdirnames(0).unwrap(), ["mid", "two"]);
    assert!(fs.open("/src/one").is_err());
}

#[test]
fn rename_failure_leaves_tree_unchanged() {
    let fs = session();
    fs.mkdir_all("/a/b").unwrap();
    put(&fs, "/a/b/f", b"1");
    put(&fs, "/taken", b"2");

    assert_eq!(fs.rename("/a", "/taken").unwrap_err().kind(), ErrorKind::AlreadyExists);
    assert_eq!(fs.rename("/a", "/a/b/inner").unwrap_err().kind(), ErrorKind::InvalidOperation);
    assert_eq!(fs.rename("/", "/root").unwrap_err().kind(), ErrorKind::InvalidOperation);

    assert_eq!(get(&fs, "/a/b/f"), b"1");
    assert_eq!(get(&fs, "/taken"), b"2");
}

#[test]
fn rename_file_into_other_directory() {
    let fs = session();
    fs.mkdir("/in").unwrap();
    fs.mkdir("/out").unwrap();
    put(&fs, "/in/f.txt", b"payload");
    fs.rename("in/f.txt", "/out/g.txt").unwrap();

    let info = fs.stat("/out/g.txt").unwrap();
    assert_eq!(info.name, "g.txt");
    assert_eq!(get(&fs, "/out/g.txt"), b"payload");
    let mut dir = fs.open("/in").unwrap();
    assert!(dir.readdir(0).unwrap().is_empty());
}

#[test]
fn oversized_write_deletes_file() {
    let fs = session();
    let mut f = fs.create("/big.txt").unwrap();
    let err = f.write(&vec![b'x'; MAX_FILE_SIZE as usize + 1]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StorageExceeded);
    assert_eq!(fs.stat("/big.txt").unwrap_err().kind(), ErrorKind::NotFound);
    f.close().unwrap();
    assert_eq!(fs.stat("/big.txt").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn oversized_append_destroys_prior_content() {
    let fs = session();
    put(&fs, "/log", &vec![b'a'; 4000]);
    let mut f = fs.open_file("/log", OpenFlags::append()).unwrap();
    assert_eq!(f.write(&[b'b'; 97]).unwrap_err().kind(), ErrorKind::StorageExceeded);
    assert!(fs.stat("/log").is_err());
}

#[test]
fn remove_respects_children() {
    let fs = session();
    fs.mkdir("/a").unwrap();
    put(&fs, "/a/b.txt", b"hi");
    assert_eq!(fs.remove("/a").unwrap_err().kind(), ErrorKind::DirectoryNotEmpty);
    fs.remove("/a/b.txt").unwrap();
    fs.remove("/a").unwrap();
    assert_eq!(fs.stat("/a").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn listing_is_sorted_and_complete() {
    let fs = session();
    fs.mkdir("/d").unwrap();
    let names = ["zeta", "alpha", "Mid", "beta.txt", "_under", "%pct"];
    for name in names {
        put(&fs, &format!("/d/{name}"), name.as_bytes());
    }
    fs.mkdir("/d/alpha.dir").unwrap();
    put(&fs, "/d/alpha.dir/nested", b"not a direct child");

    let mut dir = fs.open("/d").unwrap();
    let listed = dir.readdirnames(0).unwrap();
    let mut expected: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    expected.push("alpha.dir".to_string());
    expected.sort();
    assert_eq!(listed, expected);
    assert_eq!(dir.readdirnames(3).unwrap(), &expected[..3]);
}

#[test]
fn open_with_posix_flags() {
    let fs = session();
    let mut f = fs
        .open_file("/p", OpenFlags::from_posix(libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC))
        .unwrap();
    f.write_string("posix").unwrap();
    f.close().unwrap();
    assert_eq!(get(&fs, "/p"), b"posix");

    assert_eq!(
        fs.open_file("/missing", OpenFlags::from_posix(0)).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn handle_stat_and_name() {
    let fs = session();
    fs.mkdir("/dir").unwrap();
    let mut f = fs.create("/dir/file.txt").unwrap();
    f.write_string("abc").unwrap();
    assert_eq!(f.name(), "file.txt");
    // Unsaved bytes are not part of the stored node yet.
    assert_eq!(f.stat().unwrap().size, 0);
    f.close().unwrap();
    let info = f.stat().unwrap();
    assert_eq!(info.size, 3);
    assert_eq!(info.mode(), 0o644);
}
