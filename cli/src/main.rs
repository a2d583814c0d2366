use clap::Parser;
use cli::script::Shell;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tdbshare::{Registry, RegistryConfig, TdbRuntime};
use tdb_runtime_mocked::MemTdb;
use tracing::{info, warn};

/// tdbsh - run a command script against shared TDB handles
#[derive(Parser, Debug)]
#[command(name = "tdbsh")]
#[command(version, about, long_about = None)]
struct Args {
    /// Script file; standard input when omitted
    script: Option<PathBuf>,

    /// JSON registry configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the system libtdb instead of the in-memory engine
    #[arg(long)]
    libtdb: bool,
}

fn run<R: TdbRuntime>(registry: Registry<R>, input: impl BufRead) -> io::Result<usize> {
    let mut shell = Shell::new(registry);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failures = shell.run_script(input, &mut out)?;
    out.flush()?;

    for e in shell.registry().shutdown() {
        warn!(error = %e, "close at exit failed");
        failures += 1;
    }
    Ok(failures)
}

#[cfg(feature = "libtdb")]
fn run_libtdb(config: RegistryConfig, input: impl BufRead) -> io::Result<usize> {
    run(Registry::with_config(tdbshare::FfiTdb::new(), config), input)
}

#[cfg(not(feature = "libtdb"))]
fn run_libtdb(_config: RegistryConfig, _input: impl BufRead) -> io::Result<usize> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "tdbsh was built without the libtdb feature",
    ))
}

fn load_config(path: Option<&PathBuf>) -> Result<RegistryConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(RegistryConfig::from_reader(File::open(path)?)?),
        None => Ok(RegistryConfig::default()),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    let config = match load_config(args.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    let input: Box<dyn BufRead> = match &args.script {
        Some(path) => match File::open(path) {
            Ok(file) => Box::new(BufReader::new(file)),
            Err(e) => {
                eprintln!("Error: cannot open {}: {e}", path.display());
                return ExitCode::from(2);
            }
        },
        None => Box::new(io::stdin().lock()),
    };

    let result = if args.libtdb {
        run_libtdb(config, input)
    } else {
        run(Registry::with_config(MemTdb::new(), config), input)
    };

    match result {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            info!(failures, "script finished with failures");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}
