use clap::{ArgAction, Parser};
use console::{style, Term};
use selfext::{
    PackConfig, PackOutcome, PackProgress, Packer, SelfextResult, Settings, TargetArch, TargetOs,
    VersionInfo, CACHE_DIR_ENV,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "selfext")]
#[command(disable_version_flag = true)]
#[command(
    about = "Turn an archive into a self-extracting executable",
    long_about = "Turn an archive (.zip, .tar, .tar.gz, .tgz) into a self-extracting \
                  executable for any supported OS/architecture. The executable is written \
                  next to the archive as <archive>.exe."
)]
struct Cli {
    /// Archive to wrap
    #[arg(value_name = "ARCHIVE")]
    archive: Option<String>,

    /// Archive to wrap (the positional argument wins when both are given)
    #[arg(short = 'a', long = "archive", value_name = "PATH")]
    archive_flag: Option<String>,

    /// Target operating system: windows, linux, darwin, freebsd (default: host)
    #[arg(long, value_name = "OS")]
    os: Option<TargetOs>,

    /// Target architecture: amd64, 386, arm64, arm (default: host)
    #[arg(long, value_name = "ARCH")]
    arch: Option<TargetArch>,

    /// Settings file (default: <config dir>/selfext/selfext.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Toolchain cache root [env: SELFEXT_CACHE_DIR]
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Build with the Go installed at DIR instead of the embedded toolchain
    #[arg(long, value_name = "DIR")]
    goroot: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print version and build information
    #[arg(short = 'V', long)]
    version: bool,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("selfext={}", level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(Term::stderr().is_term())
        .with_target(false)
        .init();
}

fn build_config(cli: Cli) -> SelfextResult<PackConfig> {
    let settings = Settings::load(cli.config.as_deref())?;
    let mut config = PackConfig::from_settings(&settings);

    if let Some(archive) = cli.archive.or(cli.archive_flag) {
        config = config.with_archive(archive);
    }
    if let Some(os) = cli.os {
        config = config.with_os(os);
    }
    if let Some(arch) = cli.arch {
        config = config.with_arch(arch);
    }
    if let Some(goroot) = cli.goroot {
        config = config.with_goroot(goroot);
    }

    let cache_dir = cli
        .cache_dir
        .or_else(|| std::env::var_os(CACHE_DIR_ENV).map(PathBuf::from))
        .filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = cache_dir {
        config = config.with_cache_root(dir);
    }

    Ok(config)
}

fn run(cli: Cli) -> SelfextResult<()> {
    let config = build_config(cli)?;
    let progress = PackProgress::new();

    match Packer::new(config).with_progress(progress.clone()).pack()? {
        PackOutcome::Packed(output) => {
            progress.success(&format!(
                "{} ({}, {} bytes, payload sha256 {})",
                output.executable.display(),
                output.target,
                output.size,
                output.payload_sha256
            ));
            println!("{}", output.executable.display());
        }
        PackOutcome::Skipped => {
            tracing::info!("Nothing to pack, pass an archive (see --help)");
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if cli.version {
        println!("{}", VersionInfo::current());
        return;
    }

    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        let label = if Term::stderr().is_term() {
            style("error:").red().bold().to_string()
        } else {
            "error:".to_string()
        };
        eprintln!("{} {}", label, e);
        if let Some(output) = e.build_output() {
            eprintln!("{}", style(output.trim_end()).dim().for_stderr());
        }
        std::process::exit(1);
    }
}
