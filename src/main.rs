#![forbid(unsafe_code)]

//! tdconv: session-to-tdata converter.
//!
//! CLI entry point: parses arguments, merges cached credentials, dispatches
//! subcommands, renders output.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use serde_json::json;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tdconv::backends::external::{CommandTranscoder, DEFAULT_TRANSCODER};
use tdconv::backends::telethon::TelethonLoader;
use tdconv::discovery::{collect_artifacts, find_destination_conflicts};
use tdconv::error::{ConversionError, SENSITIVE_TARGET};
use tdconv::model::SessionRequest;
use tdconv::pipeline::{ConvertOptions, Converter};
use tdconv::proxy::{self, ProxyConfig, ProxySelector};
use tdconv::settings::{self, Settings};

/// Convert messaging-client session files into `tdata` directories.
///
/// Accepts binary `.session` databases as well as files holding an exported
/// session string, so one authenticated identity can be reused in another
/// client without logging in again.
#[derive(Parser, Debug)]
#[command(name = "tdconv", version, about, long_about = None)]
struct Cli {
    /// Show detailed conversion progress.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show everything including per-step loader details.
    #[arg(long, global = true)]
    trace: bool,

    /// Output as JSON for machine consumption.
    #[arg(long, global = true)]
    json: bool,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Also log diagnostics that may contain credentials or session secrets.
    #[arg(long, global = true)]
    log_sensitive: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct CredentialArgs {
    /// API ID. Cached after the first successful use.
    #[arg(long, env = "TDCONV_API_ID")]
    api_id: Option<i32>,

    /// API hash. Cached after the first successful use.
    #[arg(long, env = "TDCONV_API_HASH", hide_env_values = true)]
    api_hash: Option<String>,

    /// Do not write the credentials to the settings file.
    #[arg(long)]
    no_save: bool,
}

#[derive(clap::Args, Debug)]
struct ProxyArgs {
    /// Proxy type: none, http, https, socks4, socks5.
    #[arg(long, value_name = "TYPE")]
    proxy_type: Option<ProxySelector>,

    /// Proxy in format login:password@ip:port or ip:port.
    #[arg(long, value_name = "PROXY")]
    proxy: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Convert session files (or directories of them) into tdata.
    Convert {
        /// Session files or directories containing `*.session` files.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        credentials: CredentialArgs,

        #[command(flatten)]
        proxy: ProxyArgs,

        /// Directory receiving `<name>_tdata` folders (default: next to each session).
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Transcoder program name or path.
        #[arg(long, env = "TDCONV_TRANSCODER", default_value = DEFAULT_TRANSCODER)]
        transcoder: String,

        /// Descend into subdirectories when scanning directories.
        #[arg(long)]
        recursive: bool,
    },

    /// Detect how a session file loads, without converting it.
    Inspect {
        /// Session file to inspect.
        path: PathBuf,

        #[command(flatten)]
        credentials: CredentialArgs,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: clap_complete::Shell,
    },
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber based on CLI flags.
///
/// Priority: `--trace` > `--verbose` > `RUST_LOG` env var > default (warn).
/// The sensitive target stays off unless `--log-sensitive` is set.
fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let mut filter = if cli.trace {
        EnvFilter::new("tdconv=trace")
    } else if cli.verbose {
        EnvFilter::new("tdconv=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    if !cli.log_sensitive {
        filter = filter.add_directive(format!("{SENSITIVE_TARGET}=off").parse()?);
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Front-end failures that never reached the conversion core.
enum Failure {
    /// Bad flag combination; exit code 2.
    Usage(String),
    /// Typed core error; exit code 1.
    Conversion(ConversionError),
}

impl From<ConversionError> for Failure {
    fn from(e: ConversionError) -> Self {
        Self::Conversion(e)
    }
}

fn report_failure(failure: Failure, as_json: bool) -> ExitCode {
    let (error_type, message, code) = match failure {
        Failure::Usage(message) => ("usage", message, 2),
        Failure::Conversion(e) => (e.error_type(), e.to_string(), 1),
    };
    if as_json {
        println!(
            "{}",
            json!({ "ok": false, "error_type": error_type, "message": message })
        );
    } else {
        eprintln!("{} {message}", "Error:".red().bold());
    }
    ExitCode::from(code)
}

// ---------------------------------------------------------------------------
// Request assembly
// ---------------------------------------------------------------------------

/// Apply the type/text pairing rule, then validate.
fn resolve_proxy(args: &ProxyArgs) -> Result<Option<ProxyConfig>, Failure> {
    match (args.proxy_type, args.proxy.as_deref()) {
        (None, None) => Ok(None),
        (Some(ProxySelector::None), _) => Ok(None),
        (Some(selector), Some(text)) => Ok(proxy::validate(selector, Some(text))
            .map_err(ConversionError::from)?),
        (Some(_), None) => Err(Failure::Usage(
            "--proxy is required when --proxy-type is provided".to_string(),
        )),
        (None, Some(_)) => Err(Failure::Usage(
            "--proxy-type is required when --proxy is provided".to_string(),
        )),
    }
}

/// Merge flags/env with the credential cache, saving new values.
fn resolve_credentials(args: &CredentialArgs) -> Result<(i32, String), Failure> {
    let path = settings::settings_path();
    let mut cached = path.as_deref().map(Settings::load).unwrap_or_default();

    let api_id = args.api_id.or(cached.api_id);
    let api_hash = args.api_hash.clone().or_else(|| cached.api_hash.clone());
    let (Some(api_id), Some(api_hash)) = (api_id, api_hash) else {
        return Err(Failure::Usage(
            "--api-id and --api-hash are required for the first run or if not saved".to_string(),
        ));
    };

    let savable = api_id > 0 && !api_hash.trim().is_empty();
    if !args.no_save && savable && !cached.holds(api_id, &api_hash) {
        match path {
            Some(path) => {
                cached.remember(api_id, &api_hash);
                if let Err(e) = cached.save(&path) {
                    warn!(error = %e, "could not cache credentials");
                }
            }
            None => warn!("no config directory; credentials not cached"),
        }
    }
    Ok((api_id, api_hash))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_convert(
    paths: &[PathBuf],
    credentials: &CredentialArgs,
    proxy_args: &ProxyArgs,
    output_dir: Option<&Path>,
    transcoder: &str,
    recursive: bool,
    as_json: bool,
) -> Result<ExitCode, Failure> {
    let proxy = resolve_proxy(proxy_args)?;
    let (api_id, api_hash) = resolve_credentials(credentials)?;

    let artifacts = collect_artifacts(paths, recursive);
    if artifacts.is_empty() {
        return Err(Failure::Usage("no session files found".to_string()));
    }
    let conflicts = find_destination_conflicts(&artifacts, output_dir);
    if let Some(conflict) = conflicts.first() {
        let names: Vec<String> = conflict
            .artifacts
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        return Err(Failure::Usage(format!(
            "{} would all be written to {}; convert them separately or use different --output-dir values",
            names.join(", "),
            conflict.destination.display()
        )));
    }

    let converter = Converter::new(
        Box::new(TelethonLoader),
        Box::new(CommandTranscoder::locate(transcoder)),
    );
    let opts = ConvertOptions {
        output_dir: output_dir.map(Path::to_path_buf),
    };

    info!(count = artifacts.len(), "converting sessions");
    let mut results = Vec::with_capacity(artifacts.len());
    let mut failed = 0usize;
    for artifact in &artifacts {
        let outcome = SessionRequest::new(artifact, api_id, api_hash.clone(), proxy.clone())
            .and_then(|request| converter.convert(&request, &opts));
        match outcome {
            Ok(result) => {
                if !as_json {
                    println!(
                        "{} tdata saved to {} ({})",
                        "Success:".green().bold(),
                        result.output_directory.display(),
                        result.mode
                    );
                }
                results.push(json!({
                    "artifact": artifact,
                    "ok": true,
                    "output_directory": result.output_directory,
                    "mode": result.mode,
                }));
            }
            Err(e) => {
                failed += 1;
                if !as_json {
                    eprintln!(
                        "{} {}: {e}",
                        "Error:".red().bold(),
                        artifact.display()
                    );
                }
                results.push(json!({
                    "artifact": artifact,
                    "ok": false,
                    "error_type": e.error_type(),
                    "message": e.to_string(),
                }));
            }
        }
    }

    debug!(total = artifacts.len(), failed, "batch finished");
    if as_json {
        println!(
            "{}",
            json!({
                "ok": failed == 0,
                "converted": artifacts.len() - failed,
                "failed": failed,
                "results": results,
            })
        );
    } else if artifacts.len() > 1 {
        println!(
            "{} of {} session(s) converted",
            artifacts.len() - failed,
            artifacts.len()
        );
    }

    Ok(if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn cmd_inspect(
    path: &Path,
    credentials: &CredentialArgs,
    as_json: bool,
) -> Result<ExitCode, Failure> {
    let (api_id, api_hash) = resolve_credentials(credentials)?;
    let request = SessionRequest::new(path, api_id, api_hash, None)?;

    let converter = Converter::new(
        Box::new(TelethonLoader),
        Box::new(CommandTranscoder::new(DEFAULT_TRANSCODER)),
    );
    let resolution = converter.inspect(&request)?;
    let session = &resolution.handle.session;
    let attempts: Vec<&str> = resolution.attempts.iter().map(|s| s.as_str()).collect();

    if as_json {
        println!(
            "{}",
            json!({
                "ok": true,
                "artifact": path,
                "mode": resolution.handle.mode,
                "attempts": attempts,
                "dc_id": session.dc_id,
                "server_address": session.server_address.to_string(),
                "port": session.port,
                "key_fingerprint": session.auth_key.fingerprint(),
            })
        );
    } else {
        println!("{}", path.display().to_string().bold());
        println!("  mode:        {}", resolution.handle.mode);
        println!("  attempts:    {}", attempts.join(" -> "));
        println!("  datacenter:  {}", session.dc_id);
        println!(
            "  server:      {}",
            std::net::SocketAddr::new(session.server_address, session.port)
        );
        println!("  fingerprint: {}", session.auth_key.fingerprint());
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(&cli) {
        eprintln!("{} cannot initialize logging: {e}", "Error:".red().bold());
        return ExitCode::from(2);
    }
    if cli.json {
        colored::control::set_override(false);
    }

    let outcome = match &cli.command {
        Command::Convert {
            paths,
            credentials,
            proxy,
            output_dir,
            transcoder,
            recursive,
        } => cmd_convert(
            paths,
            credentials,
            proxy,
            output_dir.as_deref(),
            transcoder,
            *recursive,
            cli.json,
        ),
        Command::Inspect { path, credentials } => cmd_inspect(path, credentials, cli.json),
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "tdconv", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
    };

    outcome.unwrap_or_else(|failure| report_failure(failure, cli.json))
}
