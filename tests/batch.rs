use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use space_image_resizer::codec::{ExifCodec, ImageCodec};
use space_image_resizer::{BatchResizer, Config, FileOutcome, MemorySink};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

/// Noise compresses badly, so encoded sizes track pixel counts
fn noise_image(width: u32, height: u32, seed: u32) -> DynamicImage {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(7);
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        Rgb([state as u8, (state >> 8) as u8, (state >> 16) as u8])
    }))
}

fn write_image(root: &Path, relative: &str, width: u32, height: u32, seed: u32) -> PathBuf {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    let format = ImageFormat::from_path(&path).unwrap();
    noise_image(width, height, seed)
        .save_with_format(&path, format)
        .unwrap();
    path
}

/// Relative path → content of every file under `root`
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
            (relative, std::fs::read(entry.path()).unwrap())
        })
        .collect()
}

fn source_tree(dir: &TempDir) -> PathBuf {
    let source = dir.path().join("Photos");
    std::fs::create_dir_all(&source).unwrap();
    source
}

async fn run(config: &Config) -> (space_image_resizer::RunStats, Vec<space_image_resizer::FileReport>) {
    let sink = Arc::new(MemorySink::new());
    let resizer = BatchResizer::new(config, sink.clone()).unwrap();
    let stats = resizer.run().await.unwrap();
    (stats, sink.reports())
}

#[tokio::test]
async fn test_mixed_tree_is_mirrored_under_budget() {
    let dir = TempDir::new().unwrap();
    let source = source_tree(&dir);
    let budget = 8 * 1024;

    let small = write_image(&source, "small.png", 8, 8, 1);
    write_image(&source, "a/big.bmp", 100, 100, 2);
    write_image(&source, "a/b/big.png", 120, 90, 3);
    write_image(&source, "a/b/c/big.jpg", 160, 120, 4);
    std::fs::write(source.join("a/notes.txt"), b"not an image").unwrap();

    let config = Config {
        source_dir: source.clone(),
        target_file_size: budget,
        num_threads: 3,
        ..Default::default()
    };
    let (stats, reports) = run(&config).await;

    assert_eq!(stats.files_seen(), 4);
    assert_eq!(stats.copied, 1);
    assert_eq!(stats.resized, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(reports.len(), 4);

    let destination = dir.path().join("Photos_low_res");
    let outputs = snapshot(&destination);
    let names: Vec<_> = outputs.keys().cloned().collect();
    assert_eq!(
        names,
        vec![
            PathBuf::from("a/b/big.png"),
            PathBuf::from("a/b/c/big.jpg"),
            PathBuf::from("a/big.bmp"),
            PathBuf::from("small.png"),
        ]
    );

    assert_eq!(outputs[Path::new("small.png")], std::fs::read(&small).unwrap());
    for (name, data) in &outputs {
        assert!(data.len() as u64 <= budget, "{} is {} bytes", name.display(), data.len());
    }

    for report in &reports {
        if let FileOutcome::Resized {
            scale_percent,
            within_budget,
            ..
        } = report.outcome
        {
            assert!(within_budget);
            assert!(scale_percent < 100);
        }
    }
}

#[tokio::test]
async fn test_second_run_skips_everything() {
    let dir = TempDir::new().unwrap();
    let source = source_tree(&dir);
    write_image(&source, "one.png", 8, 8, 10);
    write_image(&source, "sub/two.bmp", 80, 80, 11);

    let config = Config {
        source_dir: source,
        target_file_size: 4 * 1024,
        ..Default::default()
    };
    run(&config).await;
    let destination = dir.path().join("Photos_low_res");
    let before = snapshot(&destination);

    let (stats, reports) = run(&config).await;

    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.files_written(), 0);
    assert!(reports.iter().all(|r| r.outcome == FileOutcome::Skipped));
    assert_eq!(snapshot(&destination), before);
}

#[tokio::test]
async fn test_worker_count_does_not_change_output() {
    let dir = TempDir::new().unwrap();
    let source = source_tree(&dir);
    for i in 0..50u32 {
        let relative = match i % 3 {
            0 => format!("img_{:02}.png", i),
            1 => format!("d{}/img_{:02}.jpg", i % 4, i),
            _ => format!("d{}/e/img_{:02}.bmp", i % 2, i),
        };
        let side = 16 + (i % 5) * 12;
        write_image(&source, &relative, side, side, i);
    }

    let mut trees = Vec::new();
    for (threads, parent) in [(1, "serial"), (16, "parallel")] {
        let config = Config {
            source_dir: source.clone(),
            destination_dir: Some(dir.path().join(parent)),
            target_file_size: 3 * 1024,
            num_threads: threads,
            ..Default::default()
        };
        let (stats, _) = run(&config).await;
        assert_eq!(stats.files_seen(), 50);
        assert_eq!(stats.failed, 0);
        trees.push(snapshot(&dir.path().join(parent).join("Photos_low_res")));
    }

    assert_eq!(trees[0].len(), 50);
    assert_eq!(trees[0], trees[1]);
}

#[tokio::test]
async fn test_corrupt_file_does_not_stop_the_batch() {
    let dir = TempDir::new().unwrap();
    let source = source_tree(&dir);
    for i in 0..9u32 {
        write_image(&source, &format!("ok_{}.png", i), 48, 48, i);
    }
    let corrupt = source.join("corrupt.jpg");
    std::fs::write(&corrupt, vec![0x42u8; 4096]).unwrap();

    let config = Config {
        source_dir: source,
        target_file_size: 2 * 1024,
        num_threads: 4,
        ..Default::default()
    };
    let (stats, reports) = run(&config).await;

    assert_eq!(stats.files_seen(), 10);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.files_written(), 9);
    assert_eq!(stats.failures[0].kind, "decode");
    assert!(stats.failures[0].path.ends_with("corrupt.jpg"));

    let outputs = snapshot(&dir.path().join("Photos_low_res"));
    assert_eq!(outputs.len(), 9);
    assert!(!outputs.contains_key(Path::new("corrupt.jpg")));
    assert_eq!(reports.len(), 10);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let source = source_tree(&dir);
    write_image(&source, "small.png", 8, 8, 1);
    write_image(&source, "deep/big.bmp", 100, 100, 2);

    let config = Config {
        source_dir: source,
        target_file_size: 4 * 1024,
        dry_run: true,
        ..Default::default()
    };
    let (stats, reports) = run(&config).await;

    assert_eq!(stats.copied, 1);
    assert_eq!(stats.resized, 1);
    assert!(reports.iter().all(|r| r.dry_run));
    assert!(!dir.path().join("Photos_low_res").exists());
}

#[tokio::test]
async fn test_stop_before_run_processes_nothing() {
    let dir = TempDir::new().unwrap();
    let source = source_tree(&dir);
    for i in 0..5u32 {
        write_image(&source, &format!("img_{}.png", i), 32, 32, i);
    }

    let config = Config {
        source_dir: source,
        target_file_size: 1024,
        ..Default::default()
    };
    let sink = Arc::new(MemorySink::new());
    let resizer = BatchResizer::new(&config, sink.clone()).unwrap();
    resizer.stop_handle().stop();

    let stats = resizer.run().await.unwrap();

    assert_eq!(stats.files_written(), 0);
    assert!(sink.reports().is_empty());
    assert!(snapshot(&dir.path().join("Photos_low_res")).is_empty());
}

#[tokio::test]
async fn test_exif_survives_resize() {
    let dir = TempDir::new().unwrap();
    let source = source_tree(&dir);
    let exif = b"MM\x00\x2a\x00\x00\x00\x08\x00\x00camera".to_vec();
    let codec = ExifCodec::new(95);
    let data = codec
        .encode(&noise_image(200, 150, 9), ImageFormat::Jpeg, Some(&exif))
        .unwrap();
    std::fs::write(source.join("shot.jpg"), &data).unwrap();

    let config = Config {
        source_dir: source,
        target_file_size: 12 * 1024,
        preserve_metadata: true,
        ..Default::default()
    };
    let (stats, _) = run(&config).await;
    assert_eq!(stats.resized, 1);

    let output = dir.path().join("Photos_low_res/shot.jpg");
    assert!(std::fs::metadata(&output).unwrap().len() <= 12 * 1024);
    let decoded = codec.decode(&output, ImageFormat::Jpeg).unwrap();
    assert_eq!(decoded.metadata, Some(exif));
    assert!(decoded.raster.width() < 200);
}

#[tokio::test]
async fn test_destination_inside_source_is_not_traversed() {
    let dir = TempDir::new().unwrap();
    let source = source_tree(&dir);
    write_image(&source, "a.png", 8, 8, 1);
    write_image(&source, "b.png", 8, 8, 2);

    let config = Config {
        source_dir: source.clone(),
        destination_dir: Some(source.clone()),
        ..Default::default()
    };
    let (first, _) = run(&config).await;
    let (second, _) = run(&config).await;

    assert_eq!(first.copied, 2);
    assert_eq!(second.files_seen(), 2);
    assert_eq!(second.skipped, 2);
    assert_eq!(snapshot(&source.join("Photos_low_res")).len(), 2);
}

#[tokio::test]
async fn test_unattainable_budget_still_writes_smallest_output() {
    let dir = TempDir::new().unwrap();
    let source = source_tree(&dir);
    write_image(&source, "noise.png", 100, 100, 21);

    let config = Config {
        source_dir: source,
        target_file_size: 10,
        ..Default::default()
    };
    let (stats, reports) = run(&config).await;

    assert_eq!(stats.resized, 1);
    assert_eq!(stats.over_budget, 1);
    assert_eq!(stats.failed, 0);
    match reports[0].outcome {
        FileOutcome::Resized {
            within_budget,
            output_size,
            ..
        } => {
            assert!(!within_budget);
            assert!(output_size > 10);
        }
        ref other => panic!("unexpected outcome {:?}", other),
    }

    let output = image::open(dir.path().join("Photos_low_res/noise.png")).unwrap();
    assert_eq!((output.width(), output.height()), (1, 1));
}

#[tokio::test]
async fn test_extension_mismatch_is_decoded_by_content() {
    let dir = TempDir::new().unwrap();
    let source = source_tree(&dir);
    let path = source.join("photo.jpg");
    noise_image(100, 100, 22)
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();

    let config = Config {
        source_dir: source,
        target_file_size: 4 * 1024,
        ..Default::default()
    };
    let (stats, reports) = run(&config).await;

    assert_eq!(stats.failed, 0, "{:?}", reports);
    assert_eq!(stats.resized, 1);

    let output = std::fs::read(dir.path().join("Photos_low_res/photo.jpg")).unwrap();
    assert!(output.len() as u64 <= 4 * 1024);
    assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Jpeg);
}
