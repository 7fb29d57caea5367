//! Batch drivers: directory walk, index-driven conversion and incremental
//! update.
//!
//! Items are converted one at a time, in walk or index order. A failure
//! converting one item is logged and recorded; the batch moves on.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

use tracing::{error, info, warn};

use crate::{
    Error, ErrorContext, ErrorDetail,
    index::load_extant_index,
    progress::{BatchPhase, EntryStatus, ProgressReporter},
};

use super::{PyramidOptions, convert_to_pyramid};

pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "tiff", "tif"];

const OUTPUT_EXTENSION: &str = "tif";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// Convert every item, replacing existing outputs.
    #[default]
    Rebuild,
    /// Convert only items whose destination does not exist yet.
    Update,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub converted: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
    /// Files left alone because of their extension.
    pub ignored: Vec<PathBuf>,
}

struct Job {
    id: String,
    source: PathBuf,
    dest: PathBuf,
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
}

/// `target_dir/<relative path>` with the extension replaced.
pub fn directory_destination(file: &Path, input_root: &Path, target_dir: &Path) -> Option<PathBuf> {
    let relative = file.strip_prefix(input_root).ok()?;
    Some(target_dir.join(relative).with_extension(OUTPUT_EXTENSION))
}

/// `target_dir/<source stem>.tif`; directories in the source are dropped.
pub fn index_destination(source: &Path, target_dir: &Path) -> Option<PathBuf> {
    let mut name = source.file_stem()?.to_os_string();
    name.push(".");
    name.push(OUTPUT_EXTENSION);
    Some(target_dir.join(name))
}

async fn ensure_dir(dir: &Path) -> Result<(), Error> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ErrorContext::new(dir).error(ErrorDetail::CreateDir(e)))
}

async fn run_job(
    job: Job,
    options: &PyramidOptions,
    mode: BatchMode,
    reporter: &dyn ProgressReporter,
    report: &mut BatchReport,
) {
    if mode == BatchMode::Update && tokio::fs::try_exists(&job.dest).await.unwrap_or(false) {
        info!(
            source = %job.source.display(),
            dest = %job.dest.display(),
            "skipping; destination already exists"
        );
        reporter.update_entry(&job.id, EntryStatus::Skipped);
        report.skipped.push(job.dest);
        return;
    }

    reporter.update_entry(&job.id, EntryStatus::Processing);
    let result = {
        let (source, dest, options) = (job.source.clone(), job.dest.clone(), options.clone());
        tokio::task::spawn_blocking(move || convert_to_pyramid(source, dest, &options))
            .await
            .map_err(|e| ErrorContext::new(&job.source).error(ErrorDetail::Join(e)))
            .and_then(|result| result)
    };
    match result {
        Ok(summary) => {
            info!(
                source = %job.source.display(),
                dest = %job.dest.display(),
                levels = summary.levels,
                "converted to pyramidal TIFF"
            );
            reporter.update_entry(&job.id, EntryStatus::Done);
            report.converted.push(job.dest);
        }
        Err(e) => {
            error!(source = %job.source.display(), error = %e.detail, "failed to convert");
            reporter.update_entry(&job.id, EntryStatus::Failed(e.detail.to_string()));
            report.failed.push((job.source, e.detail.to_string()));
        }
    }
}

enum Found {
    Image(PathBuf),
    Other(PathBuf),
    Unreadable(walkdir::Error),
}

fn scan(input_root: &Path) -> Vec<Found> {
    walkdir::WalkDir::new(input_root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if !entry.file_type().is_file() => None,
            Ok(entry) if is_supported(entry.path()) => Some(Found::Image(entry.into_path())),
            Ok(entry) => Some(Found::Other(entry.into_path())),
            Err(e) => Some(Found::Unreadable(e)),
        })
        .collect()
}

/// Converts every supported image below `input_root` into the same relative
/// location under `target_dir`.
pub async fn pyramids_from_directory(
    input_root: impl AsRef<Path>,
    target_dir: impl AsRef<Path>,
    options: &PyramidOptions,
    mode: BatchMode,
    reporter: &dyn ProgressReporter,
) -> Result<BatchReport, Error> {
    let input_root = input_root.as_ref();
    let target_dir = target_dir.as_ref();

    let metadata = tokio::fs::metadata(input_root)
        .await
        .map_err(|e| ErrorContext::new(input_root).error(ErrorDetail::ReadInputDir(e)))?;
    if !metadata.is_dir() {
        return Err(ErrorContext::new(input_root).error(ErrorDetail::ReadInputDir(
            std::io::Error::other("not a directory"),
        )));
    }
    ensure_dir(target_dir).await?;

    reporter.set_phase(BatchPhase::Scanning);
    let root = input_root.to_owned();
    let found = tokio::task::spawn_blocking(move || scan(&root))
        .await
        .map_err(|e| ErrorContext::new(input_root).error(ErrorDetail::Join(e)))?;

    let mut report = BatchReport::default();
    let mut jobs = Vec::new();
    for found in found {
        match found {
            Found::Image(source) => {
                let Some(dest) = directory_destination(&source, input_root, target_dir) else {
                    continue;
                };
                jobs.push(Job {
                    id: source.display().to_string(),
                    source,
                    dest,
                });
            }
            Found::Other(path) => {
                warn!(path = %path.display(), "skipping non-image file");
                report.ignored.push(path);
            }
            Found::Unreadable(e) => {
                let path = e.path().map(Path::to_owned).unwrap_or_default();
                let e = ErrorContext::new(&path).error(ErrorDetail::Walk(e));
                error!(error = %e, "failed to read directory entry");
                report.failed.push((path, e.detail.to_string()));
            }
        }
    }

    reporter.register_entries(jobs.iter().map(|job| job.id.clone()).collect());
    reporter.set_phase(BatchPhase::Converting);
    for job in jobs {
        run_job(job, options, mode, reporter, &mut report).await;
    }
    reporter.set_phase(BatchPhase::Completed);
    Ok(report)
}

/// Converts the preferred source of every entry of an extant image index
/// into `target_dir/<stem>.tif`.
pub async fn pyramids_from_index(
    index_path: impl AsRef<Path>,
    target_dir: impl AsRef<Path>,
    options: &PyramidOptions,
    mode: BatchMode,
    reporter: &dyn ProgressReporter,
) -> Result<BatchReport, Error> {
    let index_path = index_path.as_ref();
    let target_dir = target_dir.as_ref();

    reporter.set_phase(BatchPhase::LoadingIndex);
    let index = load_extant_index(index_path).await?;
    info!(index = %index_path.display(), entries = index.len(), "loaded index");
    ensure_dir(target_dir).await?;

    let ctx = ErrorContext::new(index_path);
    let mut report = BatchReport::default();
    let mut jobs = Vec::with_capacity(index.len());
    for (id, entry) in &index {
        let Some(selected) = entry.select_source() else {
            let e = ctx.with_id(id).error(ErrorDetail::MissingSource);
            error!(error = %e, "no source image");
            report.failed.push((index_path.to_owned(), e.to_string()));
            continue;
        };
        let source = PathBuf::from(selected);
        let Some(dest) = index_destination(&source, target_dir) else {
            let e = ctx.with_id(id).error(ErrorDetail::MissingStem);
            error!(error = %e, source = selected, "cannot name output");
            report.failed.push((source, e.to_string()));
            continue;
        };
        info!(id = %id, source = selected, "choosing source");
        jobs.push(Job {
            id: id.clone(),
            source,
            dest,
        });
    }

    reporter.register_entries(jobs.iter().map(|job| job.id.clone()).collect());
    reporter.set_phase(BatchPhase::Converting);
    for job in jobs {
        run_job(job, options, mode, reporter, &mut report).await;
    }
    reporter.set_phase(BatchPhase::Completed);
    Ok(report)
}

/// Index-driven conversion that leaves existing outputs untouched, so that
/// repeated runs converge.
pub async fn update_pyramids(
    index_path: impl AsRef<Path>,
    target_dir: impl AsRef<Path>,
    options: &PyramidOptions,
    reporter: &dyn ProgressReporter,
) -> Result<BatchReport, Error> {
    let index_path = index_path.as_ref();
    info!(index = %index_path.display(), "updating pyramids");
    let report =
        pyramids_from_index(index_path, target_dir, options, BatchMode::Update, reporter).await?;
    info!(
        index = %index_path.display(),
        converted = report.converted.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "finished updating"
    );
    Ok(report)
}
