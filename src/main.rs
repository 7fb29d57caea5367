use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use artifact_imaging::{
    config::Config,
    graph::{self, GraphFormat},
    index,
    progress::{self, BatchPhase},
    pyramid::{self, BatchMode, BatchReport, PyramidOptions},
};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt as _;

#[derive(Parser)]
#[command(about = "Link artifacts to IIIF images and build pyramidal TIFFs")]
struct Opts {
    #[clap(short, long, env = "ARTIFACT_IMAGING_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Link images and artifacts with crm:P138_represents and its inverse.
    Link {
        /// Index of the form {artifactId: [imageId, ...]}
        index: PathBuf,
        output: PathBuf,
        #[clap(long, value_enum, default_value_t = GraphFormat::Turtle)]
        format: GraphFormat,
    },
    /// Link artifacts to the IIIF URL of their first image with schema:thumbnail.
    Thumbnails {
        index: PathBuf,
        output: PathBuf,
        #[clap(long, value_enum, default_value_t = GraphFormat::Turtle)]
        format: GraphFormat,
    },
    /// Build both graphs for every index listed under `graphs` in the config.
    Graphs,
    /// Recursively convert image files to pyramidal TIFFs.
    FromDirectory {
        /// Directory containing input image files.
        input_dir: PathBuf,
        /// Directory to save the output pyramidal TIFF files.
        target_dir: PathBuf,
        /// Leave existing outputs untouched.
        #[clap(long)]
        update: bool,
    },
    /// Convert the images of an extant image map to pyramidal TIFFs.
    FromIndex {
        /// File containing map of object ids to image files.
        image_map: PathBuf,
        target_dir: PathBuf,
    },
    /// Convert only the images of an extant image map that have no pyramid yet.
    Update {
        image_index: PathBuf,
        target_dir: PathBuf,
    },
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => {
            let src = tokio::fs::read_to_string(path)
                .await
                .with_context(|| "read config")?;
            serde_yaml::from_str(&src)
                .with_context(|| format!("parse config from {}", path.display()))?
        }
        None => Config::default(),
    };
    config.validate().map_err(|msg| anyhow!("{msg}"))?;
    Ok(config)
}

async fn link(
    config: &Config,
    index_path: &Path,
    output: &Path,
    format: GraphFormat,
    thumbnails: bool,
) -> anyhow::Result<()> {
    let index = index::load_artifact_index(index_path).await?;
    let graph = if thumbnails {
        graph::build_thumbnail_graph(&index, &config.namespaces)
    } else {
        graph::build_representation_graph(&index, &config.namespaces)
    };
    graph::write_graph(&graph, output, format).await?;
    info!(
        index = %index_path.display(),
        output = %output.display(),
        triples = graph.len(),
        "saved graph"
    );
    Ok(())
}

async fn graphs(config: &Config) -> anyhow::Result<()> {
    let jobs = &config.graphs;
    if jobs.indexes.is_empty() {
        warn!("no indexes listed under `graphs.indexes`");
    }
    for index_path in &jobs.indexes {
        graph::write_index_graphs(index_path, &jobs.output_dir, jobs.format, &config.namespaces)
            .await?;
    }
    Ok(())
}

fn log_report(report: &BatchReport) {
    info!(
        converted = report.converted.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        ignored = report.ignored.len(),
        "batch finished"
    );
}

async fn run(opts: Opts) -> anyhow::Result<()> {
    let config = load_config(opts.config.as_deref()).await?;
    let options = PyramidOptions::from(&config.pyramid);

    match opts.command {
        Command::Link {
            index,
            output,
            format,
        } => link(&config, &index, &output, format, false).await,
        Command::Thumbnails {
            index,
            output,
            format,
        } => link(&config, &index, &output, format, true).await,
        Command::Graphs => graphs(&config).await,
        Command::FromDirectory {
            input_dir,
            target_dir,
            update,
        } => {
            let mode = if update {
                BatchMode::Update
            } else {
                BatchMode::Rebuild
            };
            let reporter = progress::create_reporter();
            let result =
                pyramid::pyramids_from_directory(&input_dir, &target_dir, &options, mode, &*reporter)
                    .await;
            finish(&*reporter, result)
        }
        Command::FromIndex {
            image_map,
            target_dir,
        } => {
            let reporter = progress::create_reporter();
            let result = pyramid::pyramids_from_index(
                &image_map,
                &target_dir,
                &options,
                BatchMode::Rebuild,
                &*reporter,
            )
            .await;
            finish(&*reporter, result)
        }
        Command::Update {
            image_index,
            target_dir,
        } => {
            let reporter = progress::create_reporter();
            let result =
                pyramid::update_pyramids(&image_index, &target_dir, &options, &*reporter).await;
            finish(&*reporter, result)
        }
    }
}

fn finish(
    reporter: &dyn progress::ProgressReporter,
    result: Result<BatchReport, artifact_imaging::Error>,
) -> anyhow::Result<()> {
    match &result {
        Ok(report) => log_report(report),
        Err(e) => reporter.set_phase(BatchPhase::Failed(e.to_string())),
    }
    reporter.finish();
    result.map(|_| ()).map_err(Into::into)
}

fn main() -> std::process::ExitCode {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(
            std::io::stderr
                .with_max_level(tracing::Level::ERROR)
                .or_else(std::io::stdout),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(%e, "failed to start runtime");
            return std::process::ExitCode::FAILURE;
        }
    };
    if let Err(e) = runtime.block_on(run(opts)) {
        error!(?e, "critical error");
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}
