mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use dg_core::config::Config;
use dg_core::KillReason;
use dg_pipeline::{MediaKind, Orchestrator, ProgressSender, RunOptions};
use serde_json::Value;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "deskgif=debug,dg_pipeline=debug,dg_av=debug,dg_core=debug".to_string()
        } else {
            "deskgif=info,dg_pipeline=info,dg_av=warn,dg_core=warn".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = e
                .downcast_ref::<dg_core::Error>()
                .map_or(1, dg_core::Error::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let verbose = cli.verbose;
    match cli.command {
        Commands::Ops => {
            let config = Config::load_or_default(cli.config.as_deref());
            for name in Orchestrator::from_config(config).list_operations() {
                println!("{name}");
            }
            Ok(())
        }
        Commands::Run {
            operation,
            input,
            output,
            settings,
            settings_file,
            timeout_ms,
        } => {
            let settings = read_settings(settings.as_deref(), settings_file.as_deref())?;
            let orch = orchestrator(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_operation(
                &orch,
                &operation,
                &input,
                &output,
                &settings,
                timeout_ms.map(Duration::from_millis),
                verbose,
            ))
        }
        Commands::Frames { file, json } => {
            let orch = orchestrator(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(list_frames(&orch, &file, json))
        }
        Commands::Info { file, json } => {
            let orch = orchestrator(cli.config.as_deref());
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(describe_file(&orch, &file, json))
        }
        Commands::CheckTools => {
            let config = Config::load_or_default(cli.config.as_deref());
            check_tools(&Orchestrator::from_config(config));
            Ok(())
        }
        Commands::Sweep => {
            let config = Config::load_or_default(cli.config.as_deref());
            let removed = Orchestrator::from_config(config).startup();
            println!("Removed {removed} stale scratch file(s)");
            Ok(())
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("deskgif {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Build the orchestrator and clear leftovers from earlier runs.
fn orchestrator(config_path: Option<&Path>) -> Orchestrator {
    let orch = Orchestrator::from_config(Config::load_or_default(config_path));
    orch.startup();
    orch
}

fn read_settings(inline: Option<&str>, file: Option<&Path>) -> Result<Value> {
    let text = match (inline, file) {
        (Some(inline), _) => inline.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?,
        (None, None) => return Ok(Value::Object(Default::default())),
    };
    serde_json::from_str(&text)
        .map_err(|e| dg_core::Error::validation(format!("Settings are not valid JSON: {e}")).into())
}

async fn run_operation(
    orch: &Orchestrator,
    operation: &str,
    input: &Path,
    output: &Path,
    settings: &Value,
    timeout: Option<Duration>,
    verbose: bool,
) -> Result<()> {
    let stderr: Option<dg_av::StderrSink> = verbose.then(|| {
        Arc::new(|chunk: &str| tracing::debug!(target: "deskgif::tool", "{}", chunk.trim_end()))
            as dg_av::StderrSink
    });
    let options = RunOptions {
        timeout,
        progress: Some(ProgressSender::new(|pct, step| {
            eprintln!("[{pct:>3.0}%] {step}");
        })),
        stderr,
    };

    let run = orch.run_operation(operation, input, output, settings, options);
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Cancelling...");
            orch.processes().cancel_all(KillReason::User);
            run.await
        }
    };

    let result = result?;
    println!("{}", result.final_artifact_path.display());
    Ok(())
}

async fn list_frames(orch: &Orchestrator, file: &Path, json: bool) -> Result<()> {
    let frames = orch.inspect_frames(file, None).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&frames)?);
        return Ok(());
    }

    println!("Frames: {}", frames.len());
    for frame in &frames {
        let thumb = if frame.is_placeholder() {
            "no thumbnail".to_string()
        } else {
            format!("{} bytes base64", frame.thumbnail.len())
        };
        println!("  [{}] {} ms ({thumb})", frame.index, frame.delay_ms);
    }
    Ok(())
}

async fn describe_file(orch: &Orchestrator, file: &Path, json: bool) -> Result<()> {
    let info = orch.file_info(file)?;
    let gif = if MediaKind::from_path(file) == MediaKind::Gif {
        match orch.gif_info(file).await {
            Ok(gif) => Some(gif),
            Err(e) => {
                tracing::warn!("Could not probe GIF: {e}");
                None
            }
        }
    } else {
        None
    };

    if json {
        let value = serde_json::json!({
            "file": info,
            "frames": gif.as_ref().map(|g| g.frames),
            "delays_ms": gif.as_ref().map(|g| g.timings.iter().map(|t| t.delay_ms).collect::<Vec<_>>()),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Size: {} bytes", info.size);
    if let Some(created) = info.created {
        println!("Created: {}", created.to_rfc3339());
    }
    if let Some(modified) = info.modified {
        println!("Modified: {}", modified.to_rfc3339());
    }
    if let Some(gif) = gif {
        let total_ms: u64 = gif.timings.iter().map(|t| u64::from(t.delay_ms)).sum();
        println!("Frames: {}", gif.frames);
        println!("Duration: {total_ms} ms");
    }
    Ok(())
}

fn check_tools(orch: &Orchestrator) {
    println!("Checking external tools...\n");

    let mut all_ok = true;
    for tool in orch.check_tools() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {} [{:?}]", status, tool.name, tool.kind);

        if let Some(ref version) = tool.version {
            print!(" ({version})");
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
        println!("Some tools are missing. Install them to enable all features.");
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("Failed to read config file {}", p.display()))?;
            Config::from_json(&text)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    println!("✓ Configuration is valid");
    println!("  Timeout: {} ms", config.processing.timeout_ms);
    println!("  GPU acceleration: {}", config.processing.use_gpu);
    println!("  Temp dir: {}", config.temp.resolved_dir().display());
    println!(
        "  Defaults: {}x{} @ {} fps",
        config.defaults.width, config.defaults.height, config.defaults.fps
    );
    for warning in &warnings {
        println!("  ⚠ {warning}");
    }

    Ok(())
}
