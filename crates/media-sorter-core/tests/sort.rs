use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Local, TimeZone};
use filetime::FileTime;
use media_sorter_core::{
    date, run, spawn_run, DateSource, RunConfig, RunReport, SortAction, SortError, SortEvent,
};

/// Smallest JPEG kamadak-exif will read: SOI, an APP1 Exif segment holding
/// IFD0 -> Exif IFD -> DateTimeOriginal, EOI.
fn jpeg_with_capture_time(datetime: &str) -> Vec<u8> {
    assert_eq!(datetime.len(), 19);
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II\x2A\x00");
    tiff.extend_from_slice(&8u32.to_le_bytes());
    // IFD0: one entry, ExifIFDPointer -> 26
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x8769u16.to_le_bytes());
    tiff.extend_from_slice(&4u16.to_le_bytes());
    tiff.extend_from_slice(&1u32.to_le_bytes());
    tiff.extend_from_slice(&26u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    // Exif IFD: one entry, DateTimeOriginal (ASCII, 20 bytes at 44)
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&0x9003u16.to_le_bytes());
    tiff.extend_from_slice(&2u16.to_le_bytes());
    tiff.extend_from_slice(&20u32.to_le_bytes());
    tiff.extend_from_slice(&44u32.to_le_bytes());
    tiff.extend_from_slice(&0u32.to_le_bytes());
    tiff.extend_from_slice(datetime.as_bytes());
    tiff.push(0);
    assert_eq!(tiff.len(), 64);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((2 + 6 + tiff.len()) as u16).to_be_bytes());
    jpeg.extend_from_slice(b"Exif\0\0");
    jpeg.extend_from_slice(&tiff);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

fn set_mtime(path: &Path, y: i32, m: u32, d: u32) {
    let local = Local.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
    filetime::set_file_mtime(path, FileTime::from_unix_time(local.timestamp(), 0)).unwrap();
}

fn write(path: &Path, contents: &[u8]) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
    path.to_path_buf()
}

fn sort(source: &Path, action: SortAction) -> (RunReport, Vec<SortEvent>) {
    let events = Mutex::new(Vec::new());
    let sink = |e: &SortEvent| events.lock().unwrap().push(e.clone());
    let report = run(RunConfig::new(source, action), &sink).unwrap();
    (report, events.into_inner().unwrap())
}

/// All files below `dir`, relative to it, with `/` separators.
fn tree(dir: &Path) -> Vec<String> {
    let mut out: Vec<String> = walkdir_files(dir)
        .into_iter()
        .map(|p| {
            p.strip_prefix(dir)
                .unwrap()
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect();
    out.sort();
    out
}

fn walkdir_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).unwrap().flatten() {
        let path = entry.path();
        if path.is_dir() {
            files.extend(walkdir_files(&path));
        } else {
            files.push(path);
        }
    }
    files
}

#[test]
fn test_exif_date_beats_modification_time() {
    let dir = tempfile::tempdir().unwrap();
    let photo = write(&dir.path().join("photo.jpg"), &jpeg_with_capture_time("2022:05:14 10:30:00"));
    set_mtime(&photo, 2019, 11, 3);

    let resolved = date::resolve(&photo).unwrap();
    assert_eq!(resolved.source, DateSource::Exif);
    assert_eq!(resolved.timestamp.to_string(), "2022-05-14 10:30:00");
}

#[test]
fn test_copy_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let photo = write(&root.join("photo.jpg"), &jpeg_with_capture_time("2022:05:14 10:30:00"));
    let clip = write(&root.join("clip.mp4"), b"\x00\x00\x00\x08junkjunk not an mp4");
    set_mtime(&clip, 2023, 1, 2);
    write(&root.join("notes.txt"), b"shopping list");

    let (report, events) = sort(root, SortAction::Copy);

    assert_eq!(
        tree(&root.join("sorted_output")),
        vec!["2022-05/photo.jpg", "2023-01/clip.mp4"]
    );
    assert!(root.join("sorted_output/undated_or_error").is_dir());
    assert!(photo.exists());
    assert!(clip.exists());
    assert!(root.join("notes.txt").exists());
    assert_eq!(fs::read(&photo).unwrap(), fs::read(root.join("sorted_output/2022-05/photo.jpg")).unwrap());
    assert_eq!(fs::read(&clip).unwrap(), fs::read(root.join("sorted_output/2023-01/clip.mp4")).unwrap());

    assert_eq!(
        report,
        RunReport {
            files_seen: 2,
            transferred: 2,
            quarantined: 0,
            failed: 0
        }
    );
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| !e.to_string().contains("notes.txt")));
    assert!(events[..2].iter().all(|e| e.to_string().starts_with("Copied: ")));
    assert!(matches!(events.last(), Some(SortEvent::Completed(_))));
    assert_eq!(events.last().unwrap().to_string(), "✅ Sorting completed!");
}

#[test]
fn test_move_removes_originals() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let video = write(&root.join("trips/beach/IMG_1.MOV"), b"garbage");
    set_mtime(&video, 2020, 7, 15);
    let image = write(&root.join("trips/IMG_2.png"), b"garbage");
    set_mtime(&image, 2020, 8, 16);

    let (report, events) = sort(root, SortAction::Move);

    assert_eq!(report.transferred, 2);
    assert!(!video.exists());
    assert!(!image.exists());
    assert_eq!(
        tree(&root.join("sorted_output")),
        vec!["2020-07/IMG_1.MOV", "2020-08/IMG_2.png"]
    );
    assert!(events[..2].iter().all(|e| e.to_string().starts_with("Moved: ")));
}

#[test]
fn test_rerun_never_descends_into_output() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let photo = write(&root.join("photo.jpg"), &jpeg_with_capture_time("2021:12:24 18:00:00"));

    let (first, _) = sort(root, SortAction::Move);
    assert_eq!(first.files_seen, 1);
    assert!(!photo.exists());

    let (second, events) = sort(root, SortAction::Move);
    assert_eq!(second.files_seen, 0);
    assert_eq!(events.len(), 1);
    assert_eq!(tree(&root.join("sorted_output")), vec!["2021-12/photo.jpg"]);
}

#[test]
fn test_rerun_in_copy_mode_does_not_nest_output() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(&root.join("photo.jpg"), &jpeg_with_capture_time("2021:12:24 18:00:00"));

    sort(root, SortAction::Copy);
    let (second, _) = sort(root, SortAction::Copy);

    // Only the original is seen again; the collision gets a numbered name
    assert_eq!(second.files_seen, 1);
    assert_eq!(
        tree(&root.join("sorted_output")),
        vec!["2021-12/photo(1).jpg", "2021-12/photo.jpg"]
    );
}

#[test]
fn test_same_name_same_month_is_renamed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let a = write(&root.join("cam1/a.jpg"), b"first");
    let b = write(&root.join("cam2/a.jpg"), b"second");
    set_mtime(&a, 2021, 7, 1);
    set_mtime(&b, 2021, 7, 20);

    let (report, _) = sort(root, SortAction::Copy);

    assert_eq!(report.transferred, 2);
    assert_eq!(tree(&root.join("sorted_output")), vec!["2021-07/a(1).jpg", "2021-07/a.jpg"]);
    // Walk order is by file name, so cam1 is sorted first
    assert_eq!(fs::read(root.join("sorted_output/2021-07/a.jpg")).unwrap(), b"first");
    assert_eq!(fs::read(root.join("sorted_output/2021-07/a(1).jpg")).unwrap(), b"second");
}

#[test]
fn test_unusable_month_folder_is_quarantined() {
    let dir = tempfile::tempdir().unwrap();
    // Event paths are canonical
    let root = &dunce::canonicalize(dir.path()).unwrap();
    let photo = write(&root.join("photo.jpg"), &jpeg_with_capture_time("2022:05:14 10:30:00"));
    // A plain file occupies the month folder's name
    write(&root.join("sorted_output/2022-05"), b"");

    let (report, events) = sort(root, SortAction::Move);

    assert_eq!(report.quarantined, 1);
    assert!(root.join("sorted_output/undated_or_error/photo.jpg").exists());
    // Quarantine copies, even in move mode
    assert!(photo.exists());

    let lines: Vec<String> = events.iter().map(ToString::to_string).collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with(&format!("Error processing {}: ", photo.display())));
    assert_eq!(lines[1], format!("Copied to undated_or_error: {}", photo.display()));
    assert_eq!(lines[2], "✅ Sorting completed!");
}

#[test]
fn test_failed_quarantine_skips_file_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let root = &dunce::canonicalize(dir.path()).unwrap();
    let photo = write(&root.join("a.jpg"), &jpeg_with_capture_time("2022:05:14 10:30:00"));
    let image = write(&root.join("b.png"), b"no metadata here");
    set_mtime(&image, 2021, 3, 10);
    write(&root.join("sorted_output/2022-05"), b"");

    // Removing the source between the failure and the quarantine copy makes the copy fail too
    let events = Mutex::new(Vec::new());
    let sink = |e: &SortEvent| {
        if let SortEvent::Failed { source, .. } = e {
            fs::remove_file(source).unwrap();
        }
        events.lock().unwrap().push(e.clone());
    };
    let report = run(RunConfig::new(root, SortAction::Copy), &sink).unwrap();

    assert_eq!(
        report,
        RunReport {
            files_seen: 2,
            transferred: 1,
            quarantined: 0,
            failed: 1,
        }
    );
    assert!(!root.join("sorted_output/undated_or_error/a.jpg").exists());
    assert!(root.join("sorted_output/2021-03/b.png").exists());

    let lines: Vec<String> = events.into_inner().unwrap().iter().map(ToString::to_string).collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with(&format!("Error processing {}: ", photo.display())));
    assert!(lines[1].starts_with(&format!("Skipped {}: ", photo.display())));
    assert_eq!(
        lines[2],
        format!("Copied: {} → {}", image.display(), root.join("sorted_output/2021-03").display())
    );
    assert_eq!(lines[3], "✅ Sorting completed!");
}

#[cfg(unix)]
#[test]
fn test_symlinked_file_is_sorted_by_its_target() {
    let dir = tempfile::tempdir().unwrap();
    let elsewhere = tempfile::tempdir().unwrap();
    let root = &dunce::canonicalize(dir.path()).unwrap();
    let target = write(&elsewhere.path().join("clip.mp4"), b"garbage, not a container");
    set_mtime(&target, 2023, 1, 2);
    std::os::unix::fs::symlink(&target, root.join("clip.mp4")).unwrap();
    // Directory links are still not followed
    std::os::unix::fs::symlink(elsewhere.path(), root.join("linked_dir")).unwrap();

    let (report, _) = sort(root, SortAction::Copy);

    assert_eq!(report.files_seen, 1);
    assert_eq!(tree(&root.join("sorted_output")), vec!["2023-01/clip.mp4"]);
    assert_eq!(
        fs::read(root.join("sorted_output/2023-01/clip.mp4")).unwrap(),
        b"garbage, not a container"
    );
}

#[test]
fn test_invalid_source_does_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let sink = |_: &SortEvent| panic!("no events expected");

    let err = run(RunConfig::new(&missing, SortAction::Copy), &sink).unwrap_err();
    assert!(matches!(err, SortError::InvalidSource { .. }));

    let file = write(&dir.path().join("photo.jpg"), b"");
    let err = run(RunConfig::new(&file, SortAction::Copy), &sink).unwrap_err();
    assert!(matches!(err, SortError::InvalidSource { .. }));

    assert!(!dir.path().join("sorted_output").exists());
    assert!(spawn_run(RunConfig::new(&missing, SortAction::Move)).is_err());
}

#[test]
fn test_background_run_streams_events() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    for (i, name) in ["a.jpg", "b.mkv", "c.avi", "d.3gp"].iter().enumerate() {
        let path = write(&root.join(name), b"no metadata here");
        set_mtime(&path, 2017, 3 + i as u32, 10);
    }

    let handle = spawn_run(RunConfig::new(root, SortAction::Copy)).unwrap();
    let events: Vec<SortEvent> = handle.events().collect();
    let report = handle.join().unwrap().unwrap();

    assert_eq!(report.transferred, 4);
    assert_eq!(events.len(), 5);
    assert_eq!(events.last(), Some(&SortEvent::Completed(report)));
    assert_eq!(
        tree(&root.join("sorted_output")),
        vec!["2017-03/a.jpg", "2017-04/b.mkv", "2017-05/c.avi", "2017-06/d.3gp"]
    );
}
