//! One behavior suite run against both backends.
//!
//! Code written against `Arc<dyn FileSystem>` must not be able to tell
//! the virtual tree from the real disk, so every scenario here executes
//! on a `MemFS` and on an `OsFS` scoped to a scratch directory.

use std::sync::Arc;

use path_kit::{
    AbsolutePath, FileDataProvider, FileSystem, FsError, MappedFileProvider, MappingMode, MemFS,
    OsFS, OverlayFS, OverlayOptions,
};
use tokio_util::sync::CancellationToken;

struct Fixture {
    name: &'static str,
    fs: Arc<dyn FileSystem>,
    root: AbsolutePath,
    _scratch: Option<tempfile::TempDir>,
}

fn fixtures() -> Vec<Fixture> {
    let mem = Arc::new(MemFS::new());
    let mem_root = mem.root().clone();

    let os = Arc::new(OsFS::new());
    let scratch = tempfile::tempdir().unwrap();
    let os_root = os
        .parse_unsanitized(&scratch.path().to_string_lossy())
        .unwrap();

    vec![
        Fixture {
            name: "mem",
            fs: mem,
            root: mem_root,
            _scratch: None,
        },
        Fixture {
            name: "os",
            fs: os,
            root: os_root,
            _scratch: Some(scratch),
        },
    ]
}

fn sub(base: &AbsolutePath, fragment: &str) -> AbsolutePath {
    base.join(fragment).unwrap()
}

#[test]
fn write_read_round_trip_creates_missing_parents() {
    for f in fixtures() {
        let p = sub(&f.root, "nested/deeply/file.txt");
        f.fs.write(&p, b"payload").unwrap();

        assert_eq!(f.fs.read(&p).unwrap(), b"payload", "{}", f.name);
        assert!(f.fs.is_dir(&sub(&f.root, "nested/deeply")), "{}", f.name);

        let meta = f.fs.metadata(&p).unwrap();
        assert!(meta.is_file(), "{}", f.name);
        assert_eq!(meta.size, 7, "{}", f.name);
    }
}

#[test]
fn missing_entries_report_not_found() {
    for f in fixtures() {
        let p = sub(&f.root, "absent.txt");
        assert!(!f.fs.exists(&p), "{}", f.name);
        assert!(
            matches!(f.fs.read(&p), Err(FsError::NotFound { .. })),
            "{}",
            f.name
        );
        assert!(
            matches!(f.fs.delete_file(&p), Err(FsError::NotFound { .. })),
            "{}",
            f.name
        );
    }
}

#[test]
fn read_only_files_refuse_writes_on_both_backends() {
    for f in fixtures() {
        let p = sub(&f.root, "locked.txt");
        f.fs.write(&p, b"old").unwrap();
        f.fs.set_read_only(&p, true).unwrap();

        assert!(
            matches!(f.fs.write(&p, b"new"), Err(FsError::AccessDenied { .. })),
            "{}",
            f.name
        );
        assert_eq!(f.fs.read(&p).unwrap(), b"old", "{}", f.name);

        f.fs.set_read_only(&p, false).unwrap();
    }
}

#[test]
fn directory_deletion_semantics_match() {
    for f in fixtures() {
        let dir = sub(&f.root, "tree");
        f.fs.write(&sub(&dir, "inner/file.txt"), b"x").unwrap();

        assert!(
            matches!(
                f.fs.delete_directory(&dir, false),
                Err(FsError::DirectoryNotEmpty { .. })
            ),
            "{}",
            f.name
        );

        f.fs.delete_directory(&dir, true).unwrap();
        assert!(!f.fs.exists(&dir), "{}", f.name);

        let empty = sub(&f.root, "empty");
        f.fs.create_directory(&empty).unwrap();
        f.fs.delete_directory(&empty, false).unwrap();
        assert!(!f.fs.exists(&empty), "{}", f.name);
    }
}

#[test]
fn move_file_honors_the_overwrite_flag() {
    for f in fixtures() {
        let a = sub(&f.root, "a.txt");
        let b = sub(&f.root, "b.txt");
        f.fs.write(&a, b"a").unwrap();
        f.fs.write(&b, b"b").unwrap();

        assert!(
            matches!(
                f.fs.move_file(&a, &b, false),
                Err(FsError::AlreadyExists { .. })
            ),
            "{}",
            f.name
        );
        assert_eq!(f.fs.read(&b).unwrap(), b"b", "{}", f.name);

        f.fs.move_file(&a, &b, true).unwrap();
        assert_eq!(f.fs.read(&b).unwrap(), b"a", "{}", f.name);
        assert!(!f.fs.exists(&a), "{}", f.name);
    }
}

#[test]
fn enumeration_is_sorted_and_pattern_filtered() {
    for f in fixtures() {
        let dir = sub(&f.root, "mods");
        f.fs.write(&sub(&dir, "zeta.esp"), b"").unwrap();
        f.fs.write(&sub(&dir, "alpha.esp"), b"").unwrap();
        f.fs.write(&sub(&dir, "notes.txt"), b"").unwrap();
        f.fs.write(&sub(&dir, "sub/beta.esp"), b"").unwrap();

        let shallow = f.fs.enumerate_files(&dir, Some("*.esp"), false).unwrap();
        let names: Vec<_> = shallow.iter().filter_map(|p| p.file_name()).collect();
        assert_eq!(names, vec!["alpha.esp", "zeta.esp"], "{}", f.name);

        let deep = f.fs.enumerate_files(&dir, Some("*.esp"), true).unwrap();
        assert_eq!(deep.len(), 3, "{}", f.name);

        let dirs = f.fs.enumerate_directories(&dir, false).unwrap();
        assert_eq!(dirs, vec![sub(&dir, "sub")], "{}", f.name);
    }
}

#[test]
fn random_access_reads_clamp_identically() {
    for f in fixtures() {
        let p = sub(&f.root, "folder/file.bin");
        f.fs.write(&p, &[1, 2, 3, 4, 5]).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(f.fs.read_at(&p, 1, &mut buf).unwrap(), 3, "{}", f.name);
        assert_eq!(buf, [2, 3, 4], "{}", f.name);

        let mut buf = [0u8; 10];
        let count = f.fs.read_at(&p, 3, &mut buf).unwrap();
        assert_eq!(count, 2, "{}", f.name);
        assert_eq!(&buf[..count], &[4, 5], "{}", f.name);

        assert_eq!(f.fs.read_at(&p, 99, &mut buf).unwrap(), 0, "{}", f.name);
    }
}

#[tokio::test]
async fn async_reads_match_sync_and_honor_cancellation() {
    for f in fixtures() {
        let p = sub(&f.root, "file.bin");
        f.fs.write(&p, &[1, 2, 3, 4, 5]).unwrap();

        let data = f
            .fs
            .read_at_async(&p, 3, 10, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(data, vec![4, 5], "{}", f.name);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = f.fs.read_at_async(&p, 0, 5, cancel).await;
        assert!(matches!(result, Err(FsError::Cancelled)), "{}", f.name);
        // The file is untouched after a cancelled read.
        assert_eq!(f.fs.read(&p).unwrap(), vec![1, 2, 3, 4, 5], "{}", f.name);
    }
}

#[test]
fn mappings_expose_the_same_chunk_contract() {
    for f in fixtures() {
        let p = sub(&f.root, "map.bin");
        f.fs.write(&p, &[1, 2, 3, 4, 5]).unwrap();

        let handle = f.fs.create_mapping(&p, MappingMode::ReadOnly).unwrap();
        assert_eq!(handle.len(), 5, "{}", f.name);
        assert_eq!(handle.chunk(3, 10).as_slice(), &[4, 5], "{}", f.name);
        assert!(handle.chunk(5, 1).is_empty(), "{}", f.name);
        assert!(
            matches!(handle.chunk_mut(0, 1), Err(FsError::AccessDenied { .. })),
            "{}",
            f.name
        );

        let empty = sub(&f.root, "empty.bin");
        f.fs.create_file(&empty).unwrap();
        let handle = f.fs.create_mapping(&empty, MappingMode::ReadOnly).unwrap();
        assert!(handle.is_empty(), "{}", f.name);
        assert!(handle.as_ptr().is_null(), "{}", f.name);
    }
}

#[test]
fn writable_mappings_persist_through_the_backend() {
    for f in fixtures() {
        let p = sub(&f.root, "out/data.bin");
        {
            let handle = f
                .fs
                .create_mapping(&p, MappingMode::ReadWrite { size: 4 })
                .unwrap();
            handle
                .chunk_mut(0, 4)
                .unwrap()
                .copy_from(&[9, 8, 7, 6])
                .unwrap();
        }
        assert_eq!(f.fs.read(&p).unwrap(), vec![9, 8, 7, 6], "{}", f.name);
    }
}

#[test]
fn provider_extraction_works_over_any_backend() {
    for f in fixtures() {
        let source = sub(&f.root, "archive.bin");
        f.fs.write(&source, &[10, 20, 30, 40, 50, 60]).unwrap();

        let provider = MappedFileProvider::open(f.fs.clone(), &source).unwrap();
        assert_eq!(provider.len(), 6, "{}", f.name);

        // Extract the middle section into a new file.
        let dest = sub(&f.root, "extracted.bin");
        let mut out = provider.output_section(&dest, 3).unwrap().unwrap();
        out.copy_from(provider.section(2, 3).unwrap().as_slice())
            .unwrap();
        drop(out);
        drop(provider);

        assert_eq!(f.fs.read(&dest).unwrap(), vec![30, 40, 50], "{}", f.name);
    }
}

#[test]
fn overlay_redirection_is_backend_agnostic() {
    for f in fixtures() {
        let virtual_dir = sub(&f.root, "virtual");
        let real_dir = sub(&f.root, "real");
        let overlay = OverlayFS::new(
            f.fs.clone(),
            OverlayOptions::new().with_path_mapping(virtual_dir.clone(), real_dir.clone()),
        );

        overlay.write(&sub(&virtual_dir, "file.txt"), b"x").unwrap();

        assert!(f.fs.is_file(&sub(&real_dir, "file.txt")), "{}", f.name);
        assert_eq!(
            overlay.read(&sub(&virtual_dir, "file.txt")).unwrap(),
            b"x",
            "{}",
            f.name
        );
    }
}
