mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use cli::{Cli, Commands};
use tokio_util::sync::CancellationToken;
use vf_av::{FfprobeProber, MediaProber, ToolRegistry};
use vf_core::config::{Config, StorageBackend};
use vf_core::{JobIdentity, OwnerKey, ProcessingOptions, ProcessingResult, QualityTier, VideoId};
use vf_pipeline::JobOrchestrator;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "vodforge=trace,vf_pipeline=trace,vf_av=debug,vf_storage=debug,vf_core=debug".to_string()
        } else {
            "vodforge=info,vf_pipeline=info,vf_av=warn,vf_storage=warn,vf_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Process {
            file,
            owner,
            video_id,
            quality,
            segment_duration,
            json,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(process_file(
                &file,
                cli.config.as_deref(),
                &owner,
                video_id.as_deref(),
                quality,
                segment_duration,
                json,
            ))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, cli.config.as_deref(), json))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("vodforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load_or_default(path)?;
    for warning in config.validate() {
        tracing::warn!("config: {warning}");
    }
    Ok(config)
}

async fn process_file(
    file: &Path,
    config_path: Option<&Path>,
    owner: &str,
    video_id: Option<&str>,
    quality: Option<QualityTier>,
    segment_duration: Option<u32>,
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;

    if !file.exists() {
        anyhow::bail!("Input file does not exist: {:?}", file);
    }

    let options = ProcessingOptions::new(
        quality.unwrap_or(config.pipeline.default_quality),
        segment_duration.unwrap_or(config.pipeline.default_segment_duration_secs),
    );
    options.validate()?;

    let video_id = match video_id {
        Some(id) => id.parse::<VideoId>()?,
        None => VideoId::generate(),
    };
    let identity = JobIdentity::new(video_id, OwnerKey::sanitize(owner));

    let raw = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let tools = ToolRegistry::discover(&config.tools);
    let store = vf_storage::build_store(&config.storage)?;
    if config.storage.backend == StorageBackend::Memory {
        tracing::warn!("storage.backend is memory; published objects are discarded on exit");
    }
    let orchestrator = JobOrchestrator::from_config(&config, &tools, store)?;

    // Ctrl-C cancels the job; the workspace is still removed.
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; cancelling job");
            on_signal.cancel();
        }
    });

    let result = orchestrator
        .process_with_cancel(&identity, Bytes::from(raw), &file_name, &options, &cancel)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    Ok(())
}

fn print_result(result: &ProcessingResult) {
    println!("Video:    {}", result.video_id);
    println!("Owner:    {}", result.owner_key);
    println!(
        "Media:    {}x{}, {:.2}s",
        result.width, result.height, result.duration_secs
    );
    println!("Original: {}", result.original_storage_key);
    println!("Manifest: {}", result.manifest_storage_key);
    println!("Playback: {}", result.manifest_public_path);
    println!("Segments: {}", result.segment_public_paths.len());
}

async fn probe_file(file: &Path, config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_config(config_path)?;

    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let tools = ToolRegistry::discover(&config.tools);
    let ffprobe = tools.ffprobe().map_err(vf_core::Error::Tool)?;
    let prober = FfprobeProber::new(ffprobe.to_path_buf()).with_timeout(config.timeouts.probe());
    let info = prober.probe(file, &CancellationToken::new()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("File: {}", file.display());
        let secs = info.duration_secs as u64;
        println!(
            "Duration: {:02}:{:02}:{:02} ({:.3}s)",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60,
            info.duration_secs
        );
        println!(
            "Video: {} {}x{}",
            info.video_codec.as_deref().unwrap_or("unknown"),
            info.width,
            info.height
        );
        if let Some(bitrate) = info.bitrate {
            println!("Bitrate: {} kb/s", bitrate / 1000);
        }
        println!("Audio: {}", if info.has_audio { "yes" } else { "no" });
    }

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = load_config(config_path)?;
    let tools = ToolRegistry::discover(&config.tools).check_all();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install ffmpeg (which ships ffprobe) to process videos.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            if !p.exists() {
                anyhow::bail!("Config file does not exist: {:?}", p);
            }
            Config::load_or_default(Some(p))?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration loaded with {} warning(s):", warnings.len());
        for w in &warnings {
            println!("  ! {w}");
        }
    }

    let backend = match config.storage.backend {
        StorageBackend::Memory => "memory".to_string(),
        StorageBackend::Fs => format!("fs ({})", config.storage.fs_root.display()),
        StorageBackend::S3 => format!("s3 (bucket {:?})", config.storage.s3.bucket),
    };
    println!("  Storage: {backend}");
    println!(
        "  Layout: {}/<owner>/... served under /{}/",
        config.storage.namespace, config.storage.proxy_prefix
    );
    println!(
        "  Timeouts: probe {}s, transcode {}s",
        config.timeouts.probe_secs, config.timeouts.transcode_secs
    );
    println!(
        "  Defaults: {} quality, {}s segments, {} concurrent uploads",
        config.pipeline.default_quality,
        config.pipeline.default_segment_duration_secs,
        config.pipeline.upload_concurrency
    );

    Ok(())
}
