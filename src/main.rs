use clap::{Parser, Subcommand};
use elektron_circuits::{
    config::ENV_DEBUG, BackendKind, Config, Context, Demo, Error, Result, SpiceLibrary,
};
use std::{path::PathBuf, time::Duration};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Rectifier, inverter and filter circuits simulated with ngspice
#[derive(Parser)]
#[command(name = "circuits", version)]
struct Cli {
    /// Directory with the spice models
    #[arg(long, global = true)]
    libraries: Option<PathBuf>,

    /// Directory the plots and CSV files are written to
    #[arg(long, global = true)]
    results: Option<PathBuf>,

    /// ngspice integration
    #[arg(long, value_enum, global = true)]
    backend: Option<BackendKind>,

    /// ngspice executable for the batch backend
    #[arg(long, global = true)]
    ngspice: Option<PathBuf>,

    /// Timeout of a batch simulation in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// SCR trigger angle in [0, 1]
    #[arg(long, global = true)]
    alpha: Option<f64>,

    /// Also write the simulation results as CSV
    #[arg(long, global = true)]
    csv: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the demos
    List,
    /// Print the netlists of a demo
    Netlist { demo: Demo },
    /// Simulate a demo, or `all` of them
    Run { demo: String },
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(libraries) = &self.libraries {
            config.libraries = libraries.clone();
        }
        if let Some(results) = &self.results {
            config.results = results.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(ngspice) = &self.ngspice {
            config.ngspice = ngspice.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout = Duration::from_secs(timeout);
        }
        config
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.config();
    match &cli.command {
        Commands::List => {
            for demo in Demo::ALL {
                println!("{:<18} {}", demo.name(), demo.description());
            }
        }
        Commands::Netlist { demo } => {
            let library = SpiceLibrary::new(&config.libraries)?;
            for circuit in demo.circuits(&library, cli.alpha)? {
                println!("**** Circuit netlist: ****");
                println!("{}", circuit);
            }
        }
        Commands::Run { demo } => {
            let demos = if demo.eq_ignore_ascii_case("all") {
                Demo::ALL.to_vec()
            } else {
                vec![demo.parse::<Demo>()?]
            };
            let mut ctx = Context {
                library: SpiceLibrary::new(&config.libraries)?,
                results: config.results.clone(),
                backend: config.backend(),
                alpha: cli.alpha,
                csv: cli.csv,
            };
            for demo in demos {
                println!("**** {} ****", demo);
                let report = demo.run(&mut ctx)?;
                for measurement in &report.measurements {
                    println!("{}", measurement);
                }
                for file in &report.files {
                    println!("written: {}", file.display());
                }
            }
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let default = if std::env::var(ENV_DEBUG).is_ok() { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli) {
        error!("{}", err);
        if let Error::SpiceModelNotFound(_) | Error::LibraryPath(_) = err {
            eprintln!("set --libraries or ELEKTRON_LIBRARIES to the spice model directory");
        }
        std::process::exit(1);
    }
}
