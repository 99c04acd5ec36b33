mod common;

use std::sync::Arc;

use futures::TryStreamExt;
use streamzip::zip::{locate_central_directory, read_central_directory};
use streamzip::{EntryFilter, EntryMetadata, MemorySource, ReaderConfig, ZipExtractor};

use common::ZipBuilder;

const WINDOW: u64 = 1024;

fn archive_with_trailer_at(distance_from_end: usize) -> Vec<u8> {
    let comment = vec![b'#'; distance_from_end - 22];
    ZipBuilder::new()
        .stored("a.txt", b"hi")
        .directory("b/")
        .deflated("b/c.txt", b"hello world")
        .comment(&comment)
        .build()
}

#[tokio::test]
async fn trailer_straddling_the_window_boundary_is_found() {
    // The signature starts 2 bytes before the tail window, then every
    // neighbouring split and the two clean cuts on either side.
    for distance in WINDOW as usize - 4..=WINDOW as usize + 4 {
        let archive = archive_with_trailer_at(distance);
        let length = archive.len();
        let source = MemorySource::new(archive);

        let directory = read_central_directory(&source, WINDOW).await.unwrap();
        assert_eq!(directory.entries.len(), 3, "trailer {distance} bytes from the end");
        assert_eq!(directory.end.comment.len(), distance - 22);
        assert_eq!(
            directory.end.central_directory_offset + directory.end.central_directory_size,
            (length - distance) as u64
        );
    }
}

#[tokio::test]
async fn straddling_trailer_through_the_ranged_reader() {
    let archive = archive_with_trailer_at(WINDOW as usize + 2);
    let config = ReaderConfig::default()
        .with_prefer_ranges_above(0)
        .with_scan_window(WINDOW);
    let extractor = ZipExtractor::with_config(Arc::new(MemorySource::new(archive)), config);

    let entries: Vec<_> = extractor
        .entries(EntryFilter::matching(|e| e.path() == "b/c.txt"))
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text(), "hello world");
}

#[tokio::test]
async fn located_bytes_are_exactly_the_central_directory() {
    let archive = ZipBuilder::new()
        .padding("pad.bin", 3000)
        .stored("x", b"x")
        .comment(b"tail")
        .build();
    let source = MemorySource::new(archive.clone());

    for window in [8, 100, 4096] {
        let (bytes, end) = locate_central_directory(&source, window).await.unwrap();
        let start = end.central_directory_offset as usize;
        let stop = start + end.central_directory_size as usize;
        assert_eq!(bytes, &archive[start..stop], "window {window}");
    }
}

#[tokio::test]
async fn signature_inside_a_short_comment_tail_is_skipped() {
    let mut comment = b"ends with a stray ".to_vec();
    comment.extend_from_slice(&[0x50, 0x4b, 0x05, 0x06, 1, 2, 3]);
    let archive = ZipBuilder::new().stored("a.txt", b"hi").comment(&comment).build();

    let directory = read_central_directory(&MemorySource::new(archive), 64)
        .await
        .unwrap();
    assert_eq!(directory.entries.len(), 1);
    assert_eq!(directory.end.comment.len(), comment.len());
}
