use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use serde_json::json;

use crate::{
    ErrorDetail,
    progress::{NullReporter, SimpleReporter, Stats},
    pyramid::{self, BatchMode, PyramidOptions},
};

fn save_sample(path: &Path, width: u32, height: u32) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 200])
    })
    .save(path)
    .unwrap();
}

fn sorted(mut paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths.sort();
    paths
}

fn parts_left(dir: &Path) -> bool {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .any(|e| e.file_name().to_string_lossy().ends_with(".part"))
}

/// Formatted log output shared between the subscriber and the test.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for Captured {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn directory_walk_skips_unsupported_files() {
    let captured = Captured::default();
    let _guard = tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .without_time()
            .with_writer(captured.clone())
            .finish(),
    );

    let input = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    save_sample(&input.path().join("photo.jpg"), 300, 200);
    save_sample(&input.path().join("coins").join("obverse.png"), 40, 40);
    std::fs::rename(
        input.path().join("coins").join("obverse.png"),
        input.path().join("coins").join("obverse.PNG"),
    )
    .unwrap();
    std::fs::write(input.path().join("notes.txt"), "not an image").unwrap();

    let report = pyramid::pyramids_from_directory(
        input.path(),
        target.path(),
        &PyramidOptions::default(),
        BatchMode::Rebuild,
        &NullReporter,
    )
    .await
    .unwrap();

    assert_eq!(
        sorted(report.converted),
        [
            target.path().join("coins").join("obverse.tif"),
            target.path().join("photo.tif"),
        ]
    );
    assert_eq!(report.ignored, [input.path().join("notes.txt")]);
    assert!(report.failed.is_empty());
    assert!(target.path().join("photo.tif").is_file());
    assert!(!target.path().join("notes.tif").exists());
    assert!(!parts_left(target.path()));

    // one warning, for the unsupported file only
    let warnings = captured.lines();
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("WARN"));
    assert!(warnings[0].contains("skipping non-image file"));
    assert!(warnings[0].contains("notes.txt"));
}

#[tokio::test]
async fn directory_update_leaves_existing_outputs() {
    let input = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    save_sample(&input.path().join("a.bmp"), 32, 32);
    save_sample(&input.path().join("b.jpeg"), 32, 32);
    std::fs::write(target.path().join("a.tif"), "placeholder").unwrap();

    let report = pyramid::pyramids_from_directory(
        input.path(),
        target.path(),
        &PyramidOptions::default(),
        BatchMode::Update,
        &NullReporter,
    )
    .await
    .unwrap();
    assert_eq!(report.skipped, [target.path().join("a.tif")]);
    assert_eq!(report.converted, [target.path().join("b.tif")]);
    assert_eq!(
        std::fs::read_to_string(target.path().join("a.tif")).unwrap(),
        "placeholder"
    );
}

#[tokio::test]
async fn missing_input_directory_is_fatal() {
    let target = tempfile::tempdir().unwrap();
    let err = pyramid::pyramids_from_directory(
        target.path().join("nowhere"),
        target.path(),
        &PyramidOptions::default(),
        BatchMode::Rebuild,
        &NullReporter,
    )
    .await
    .unwrap_err();
    assert!(matches!(*err.detail, ErrorDetail::ReadInputDir(_)));
}

struct Extant {
    _dir: tempfile::TempDir,
    index: PathBuf,
    target: PathBuf,
}

/// Three convertible entries (one per source field), one pointing at a file
/// that does not exist and one without any source.
fn extant_fixture() -> Extant {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    save_sample(&root.join("archival").join("vase1_master.tif"), 64, 48);
    save_sample(&root.join("images").join("vase1.jpg"), 64, 48);
    save_sample(&root.join("images").join("coin2.jpg"), 520, 260);
    save_sample(&root.join("restricted").join("gem3.png"), 16, 16);

    let index = json!({
        "vase1": {
            "images": root.join("images/vase1.jpg"),
            "archival": root.join("archival/vase1_master.tif"),
        },
        "coin2": { "images": root.join("images/coin2.jpg"), "restricted": null },
        "gem3": { "archival": "", "restricted": root.join("restricted/gem3.png") },
        "lost4": { "archival": root.join("archival/lost4.tif") },
        "empty5": {},
    });
    let index_path = root.join("extant.json");
    std::fs::write(&index_path, serde_json::to_string_pretty(&index).unwrap()).unwrap();

    Extant {
        index: index_path,
        target: root.join("pyramids"),
        _dir: dir,
    }
}

#[tokio::test]
async fn update_converges_after_one_run() {
    let fixture = extant_fixture();
    let options = PyramidOptions::default();

    let reporter = SimpleReporter::new();
    let first = pyramid::update_pyramids(&fixture.index, &fixture.target, &options, &reporter)
        .await
        .unwrap();
    assert_eq!(
        first.converted,
        [
            fixture.target.join("vase1_master.tif"),
            fixture.target.join("coin2.tif"),
            fixture.target.join("gem3.tif"),
        ]
    );
    assert!(first.skipped.is_empty());
    assert_eq!(first.failed.len(), 2);
    assert_eq!(
        reporter.stats(),
        Stats {
            total_entries: 4,
            converted: 3,
            skipped: 0,
            failed: 1,
        }
    );

    let second = pyramid::update_pyramids(&fixture.index, &fixture.target, &options, &NullReporter)
        .await
        .unwrap();
    assert!(second.converted.is_empty());
    assert_eq!(second.skipped, first.converted);
    assert_eq!(second.failed.len(), 2);
    assert!(!parts_left(&fixture.target));
}

#[tokio::test]
async fn archival_source_wins() {
    let fixture = extant_fixture();
    pyramid::pyramids_from_index(
        &fixture.index,
        &fixture.target,
        &PyramidOptions::default(),
        BatchMode::Rebuild,
        &NullReporter,
    )
    .await
    .unwrap();
    let mut names: Vec<_> = std::fs::read_dir(&fixture.target)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["coin2.tif", "gem3.tif", "vase1_master.tif"]);
}

#[tokio::test]
async fn rebuild_converts_every_time() {
    let fixture = extant_fixture();
    let options = PyramidOptions::default();
    for _ in 0..2 {
        let report = pyramid::pyramids_from_index(
            &fixture.index,
            &fixture.target,
            &options,
            BatchMode::Rebuild,
            &NullReporter,
        )
        .await
        .unwrap();
        assert_eq!(report.converted.len(), 3);
        assert!(report.skipped.is_empty());
    }
}

#[tokio::test]
async fn failed_items_are_reported_with_their_source() {
    let fixture = extant_fixture();
    let report = pyramid::update_pyramids(
        &fixture.index,
        &fixture.target,
        &PyramidOptions::default(),
        &NullReporter,
    )
    .await
    .unwrap();
    // entries without a source fail while planning, before any conversion
    let (no_source, missing_source) = (&report.failed[0], &report.failed[1]);
    assert!(missing_source.0.ends_with("archival/lost4.tif"));
    assert!(missing_source.1.starts_with("Failed to decode image"));
    assert_eq!(no_source.0, fixture.index);
    assert!(no_source.1.starts_with("empty5("));
    assert!(!fixture.target.join("lost4.tif").exists());
}

#[tokio::test]
async fn leftover_partial_file_is_not_mistaken_for_output() {
    let fixture = extant_fixture();
    std::fs::create_dir_all(&fixture.target).unwrap();
    std::fs::write(fixture.target.join(".gem3.tif.part"), "interrupted").unwrap();

    let report = pyramid::update_pyramids(
        &fixture.index,
        &fixture.target,
        &PyramidOptions::default(),
        &NullReporter,
    )
    .await
    .unwrap();
    assert!(report.converted.contains(&fixture.target.join("gem3.tif")));
    assert!(!fixture.target.join(".gem3.tif.part").exists());
}

#[tokio::test]
async fn missing_index_is_fatal() {
    let target = tempfile::tempdir().unwrap();
    let err = pyramid::update_pyramids(
        target.path().join("missing.json"),
        target.path(),
        &PyramidOptions::default(),
        &NullReporter,
    )
    .await
    .unwrap_err();
    assert!(matches!(*err.detail, ErrorDetail::ReadIndex(_)));
}
