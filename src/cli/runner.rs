use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use skyfuse::io::export::{CommandExportService, DateSelection, ExportRequest};
use skyfuse::io::preprocess::GdalWarpPreprocessor;
use skyfuse::{FusionCheckpointLoader, IndexName, IndexReportOptions, ServeConfig, ServingFront};

use super::args::{CliArgs, Command, ExportArgs, ServeArgs};
use super::errors::AppError;

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn serve_config(args: ServeArgs) -> Result<ServeConfig, AppError> {
    let mut config = match &args.config {
        Some(path) => ServeConfig::from_file(path)?,
        None => ServeConfig::default(),
    };
    if let Some(listen) = args.listen {
        config.listen = listen;
    }
    if args.checkpoint.is_some() {
        config.checkpoint = args.checkpoint;
    }
    if args.export_command.is_some() {
        config.export_command = args.export_command;
    }
    if let Some(dir) = args.download_dir {
        config.default_download_dir = dir;
    }
    if let Some(scale) = args.scale {
        config.default_scale = scale;
    }
    Ok(config)
}

fn run_serve(args: ServeArgs) -> Result<(), AppError> {
    let config = serve_config(args)?;
    let addr: SocketAddr = config
        .listen
        .parse()
        .map_err(|_| AppError::InvalidListenAddress {
            addr: config.listen.clone(),
        })?;

    let front = Arc::new(ServingFront::from_config(&config, &FusionCheckpointLoader)?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(skyfuse::serving::serve(front, addr))?;
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<(), AppError> {
    let dates = DateSelection::from_parts(
        args.date.as_deref(),
        args.start.as_deref(),
        args.end.as_deref(),
    )?;
    let service = CommandExportService::from_command(&args.export_command)?;
    let request = ExportRequest {
        roi: args.geometry,
        dates,
        out_dir: args.output_dir,
        scale: args.scale,
    };
    for file in skyfuse::export_scenes(&service, &request)? {
        println!("{}", file.display());
    }
    Ok(())
}

fn run_indices(
    input: PathBuf,
    output_dir: PathBuf,
    no_heatmaps: bool,
    index: Vec<IndexName>,
) -> Result<(), AppError> {
    let options = IndexReportOptions {
        output_dir,
        heatmaps: !no_heatmaps,
        indices: index,
    };
    let entries = skyfuse::compute_index_report(&input, &options)?;
    for entry in &entries {
        println!("{}", entry);
    }
    let failed = entries.iter().filter(|e| e.error.is_some()).count();
    if failed > 0 {
        return Err(AppError::IndexReportIncomplete {
            failed,
            total: entries.len(),
        });
    }
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    // The server always logs; other commands only with --log.
    if args.log || matches!(args.command, Command::Serve(_)) {
        init_logging(&args.log_level, args.log_json);
    }

    match args.command {
        Command::Clip {
            input,
            geometry,
            output,
        } => {
            let out = skyfuse::clip_raster_file(&input, &geometry, &output)?;
            info!("Successfully clipped: {:?} -> {:?}", input, out);
        }
        Command::Indices {
            input,
            output_dir,
            no_heatmaps,
            index,
        } => run_indices(input, output_dir, no_heatmaps, index)?,
        Command::Reconstruct {
            checkpoint,
            optical,
            sar,
            output_dir,
        } => {
            let out = skyfuse::reconstruct_pair(
                &FusionCheckpointLoader,
                &checkpoint,
                &optical,
                &sar,
                output_dir.as_deref(),
            )?;
            println!("{}", out.display());
        }
        Command::Preprocess {
            sensor,
            input,
            output,
        } => {
            let out = skyfuse::preprocess_product(
                &GdalWarpPreprocessor::default(),
                sensor,
                &input,
                &output,
            )?;
            info!("Successfully preprocessed: {:?} -> {:?}", input, out);
        }
        Command::Export(export) => run_export(export)?,
        Command::Serve(serve) => run_serve(serve)?,
    }

    Ok(())
}
