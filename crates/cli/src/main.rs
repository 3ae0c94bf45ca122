//! Command-line interface for the cmdutil helpers.
//!
//! Unpacks archives, downloads files, edits environments for child commands
//! and inspects installed Go toolchains.

use clap::{Parser, Subcommand};
use cmdutil::{
    clean_color, ArchiveEntry, DownloadOptions, Downloader, EntryObserver, EnvTable, Outcome, ProxySetting,
    UnpackOptions,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{self, Command};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "cmdutil")]
#[command(version, about = "Archive, download, environment and Go toolchain helpers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack a .tar, .tar.gz, .tgz or .zip archive
    Unpack {
        /// Archive file to unpack
        archive: PathBuf,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Strip leading path components
        #[arg(long, default_value = "0")]
        strip_components: u32,

        /// Skip files smaller than this many bytes
        #[arg(long, default_value = "0")]
        min_size: u64,

        /// Skip files larger than this many bytes
        #[arg(long, default_value = "0")]
        max_size: u64,

        /// Keep going after per-entry failures
        #[arg(long)]
        ignore_failed: bool,

        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download a URL to a file
    Download {
        /// URL to fetch
        url: String,

        /// Destination file
        #[arg(short, long)]
        out: PathBuf,

        /// Overall timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Connect timeout in seconds
        #[arg(long)]
        connect_timeout: Option<u64>,

        /// Skip TLS certificate verification
        #[arg(long)]
        insecure: bool,

        /// Ignore proxy settings from the environment
        #[arg(long)]
        no_proxy: bool,

        /// Do not report progress
        #[arg(short, long)]
        quiet: bool,
    },

    /// Edit the environment, then print it or run a command with it
    Env {
        /// Set KEY=VALUE
        #[arg(long, value_parser = parse_pair)]
        set: Vec<(String, String)>,

        /// Append VALUE to the list in KEY (KEY=VALUE)
        #[arg(long, value_parser = parse_pair)]
        append: Vec<(String, String)>,

        /// Prepend VALUE to the list in KEY (KEY=VALUE)
        #[arg(long, value_parser = parse_pair)]
        insert: Vec<(String, String)>,

        /// Remove KEY
        #[arg(long)]
        delete: Vec<String>,

        /// Remove VALUE from the list in KEY (KEY=VALUE)
        #[arg(long, value_parser = parse_pair)]
        delete_value: Vec<(String, String)>,

        /// Print as JSON
        #[arg(long)]
        json: bool,

        /// Command to run with the edited environment
        #[arg(last = true)]
        command: Vec<String>,
    },

    /// Inspect and run installed Go toolchains
    Go {
        #[command(subcommand)]
        command: GoCommands,
    },

    /// Strip ANSI color codes from stdin
    CleanColor,
}

#[derive(Subcommand)]
enum GoCommands {
    /// List toolchains, highest version first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the binary of a toolchain matching VERSION
    Find {
        /// Release such as 1.21 or go1.21.5
        version: String,
    },

    /// Print the go found on PATH
    Default,

    /// Print the highest installed go
    Latest,

    /// Run a toolchain's go command
    Run {
        /// Release to run; the default toolchain when omitted
        #[arg(long = "go")]
        version: Option<String>,

        /// Turn off go.work when it does not cover this directory
        #[arg(long)]
        auto_gowork: bool,

        /// Arguments passed to go
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

type CliResult<T> = Result<T, Box<dyn Error>>;

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Unpack {
            archive,
            out,
            strip_components,
            min_size,
            max_size,
            ignore_failed,
            json,
        } => {
            let options = UnpackOptions::new()
                .strip_components(strip_components)
                .min_size(min_size)
                .max_size(max_size)
                .ignore_failed(ignore_failed);
            handle_unpack(archive, out, options, json)
        }
        Commands::Download {
            url,
            out,
            timeout,
            connect_timeout,
            insecure,
            no_proxy,
            quiet,
        } => {
            let mut options = DownloadOptions::new().insecure_skip_verify(insecure);
            if let Some(secs) = timeout {
                options = options.timeout(Duration::from_secs(secs));
            }
            if let Some(secs) = connect_timeout {
                options = options.connect_timeout(Duration::from_secs(secs));
            }
            if no_proxy {
                options = options.proxy(ProxySetting::None);
            }
            handle_download(url, out, options, quiet)
        }
        Commands::Env {
            set,
            append,
            insert,
            delete,
            delete_value,
            json,
            command,
        } => {
            let edits = EnvEdits {
                set,
                append,
                insert,
                delete,
                delete_value,
            };
            handle_env(edits, json, command)
        }
        Commands::Go { command } => handle_go(command),
        Commands::CleanColor => handle_clean_color(),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

/// Ticks a spinner for every entry the unpacker finishes.
struct SpinnerObserver {
    bar: ProgressBar,
}

impl EntryObserver for SpinnerObserver {
    fn after(&self, entry: &ArchiveEntry, outcome: Outcome) -> Outcome {
        self.bar.inc(1);
        self.bar.set_message(entry.path.clone());
        outcome
    }
}

fn handle_unpack(archive: PathBuf, out: PathBuf, options: UnpackOptions, json: bool) -> CliResult<i32> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner} {pos} entries {wide_msg}")?);
    bar.enable_steady_tick(Duration::from_millis(100));

    let options = options.observer(SpinnerObserver { bar: bar.clone() });
    let result = cmdutil::unpack(&archive, &out, &options);
    bar.finish_and_clear();
    let stats = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!(
            "Unpacked {} files ({} bytes), {} directories into {} in {} ms",
            stats.files_written,
            stats.bytes_written,
            stats.dirs_created,
            out.display(),
            stats.duration.as_millis()
        );
        if stats.skipped > 0 || stats.failed > 0 {
            println!("Skipped {}, failed {}", stats.skipped, stats.failed);
        }
    }
    Ok(if stats.failed > 0 { 2 } else { 0 })
}

fn handle_download(url: String, out: PathBuf, options: DownloadOptions, quiet: bool) -> CliResult<i32> {
    let mut downloader = Downloader::new(options);
    if !quiet {
        downloader = downloader.progress(io::stderr());
    }
    let bytes = downloader.download(&url, &out)?;
    if !quiet {
        println!("Saved {} bytes to {}", bytes, out.display());
    }
    Ok(0)
}

struct EnvEdits {
    set: Vec<(String, String)>,
    append: Vec<(String, String)>,
    insert: Vec<(String, String)>,
    delete: Vec<String>,
    delete_value: Vec<(String, String)>,
}

impl EnvEdits {
    fn apply(&self, env: &mut EnvTable) -> Result<(), cmdutil::EnvError> {
        for (key, value) in &self.set {
            env.set(key, value)?;
        }
        for (key, value) in &self.append {
            env.append(key, value)?;
        }
        for (key, value) in &self.insert {
            env.insert(key, value)?;
        }
        for key in &self.delete {
            env.delete(key)?;
        }
        for (key, value) in &self.delete_value {
            env.delete_value(key, value)?;
        }
        Ok(())
    }
}

fn handle_env(edits: EnvEdits, json: bool, command: Vec<String>) -> CliResult<i32> {
    let mut env = EnvTable::new();
    edits.apply(&mut env)?;

    if let Some((program, args)) = command.split_first() {
        let mut cmd = Command::new(program);
        cmd.args(args);
        env.apply(&mut cmd);
        let status = cmd.status().map_err(|e| format!("{program}: {e}"))?;
        return Ok(status.code().unwrap_or(1));
    }

    if json {
        println!("{}", serde_json::to_string_pretty(env.environ())?);
    } else {
        for entry in env.environ() {
            println!("{}", entry);
        }
    }
    Ok(0)
}

fn handle_go(command: GoCommands) -> CliResult<i32> {
    let sdk = gosdk::default_sdk();

    match command {
        GoCommands::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(sdk.installs())?);
            } else {
                for install in sdk.installs() {
                    println!("{:<12} {}", install.version, install.bin.display());
                }
            }
            Ok(0)
        }
        GoCommands::Find { version } => match sdk.find(&version) {
            Some(install) => {
                println!("{}", install.bin.display());
                Ok(0)
            }
            None => Err(format!("no Go toolchain matches {version}").into()),
        },
        GoCommands::Default => {
            let install = sdk.default().ok_or("no go on PATH")?;
            println!("{}", install.bin.display());
            Ok(0)
        }
        GoCommands::Latest => {
            let install = sdk.latest().ok_or("no Go toolchain installed")?;
            println!("{}", install.bin.display());
            Ok(0)
        }
        GoCommands::Run {
            version,
            auto_gowork,
            args,
        } => {
            let install = match &version {
                Some(v) => sdk.find(v).ok_or_else(|| format!("no Go toolchain matches {v}"))?,
                None => sdk
                    .default()
                    .or_else(|| sdk.latest())
                    .ok_or("no Go toolchain installed")?,
            };

            let mut env = EnvTable::new();
            if auto_gowork {
                let cwd = std::env::current_dir()?;
                gosdk::auto_disable_go_work(&sdk, &cwd, &mut env)?;
            }

            let status = gosdk::run_go_with_env(&install.root, &args, &env)?;
            Ok(status.code().unwrap_or(1))
        }
    }
}

fn handle_clean_color() -> CliResult<i32> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;
    io::stdout().write_all(clean_color(&input).as_bytes())?;
    Ok(0)
}
