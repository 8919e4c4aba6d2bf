use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use texel_core::{
    CoefficientVector, LocalBackend, SessionSummary, TunerConfig, TuningSession, WorkerPool,
};
use tools::engine::OracleProcess;
use tools::epd::read_corpus;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Hill-climb evaluation coefficients against EPD positions from stdin"
)]
struct Cli {
    /// Number of parallel worker processes (0 tunes in-process)
    #[arg(short = 'n', long = "workers", default_value_t = 4)]
    workers: usize,

    /// Search depth per position (0 = static/quiescence only)
    #[arg(short = 'd', long = "depth", default_value_t = 0)]
    depth: u32,

    /// Probe steps before the window shrinks
    #[arg(short = 's', long = "steps", default_value_t = 2)]
    steps: usize,

    /// Active positions before short-cut evaluation kicks in
    #[arg(short = 'm', long = "max-active")]
    max_active: Option<usize>,

    /// Print the current residual and quit
    #[arg(short = 'q', long = "quit")]
    quit: bool,

    /// Engine binary implementing the tuning protocol
    #[arg(long)]
    engine: PathBuf,

    /// Extra arguments passed to the engine
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// JSON vector file to tune (input/output)
    vector: PathBuf,

    /// Names of coefficients to tune (empty means all)
    params: Vec<String>,
}

fn run(cli: Cli) -> Result<SessionSummary> {
    let config = TunerConfig {
        workers: cli.workers,
        depth: cli.depth,
        steps: cli.steps,
        max_active: cli.max_active,
        quit_after_initial: cli.quit,
        coefficients: cli.params.clone(),
    };
    config.validate()?;

    let records =
        read_corpus(std::io::stdin().lock()).context("failed to read EPD from stdin")?;

    let mut first =
        OracleProcess::spawn(&cli.engine, &cli.engine_args, "engine-0".to_string())?;
    let mut vector =
        CoefficientVector::from_oracle(&mut first).context("schema discovery failed")?;
    vector.merge_file(&cli.vector);

    let mut session = TuningSession::new(vector, config, cli.vector.clone());
    if cli.workers == 0 {
        let mut backend = LocalBackend::new(first, records, cli.depth, session.vector().values())?;
        Ok(session.run(&mut backend)?)
    } else {
        let mut oracles = vec![first];
        for i in 1..cli.workers {
            oracles.push(OracleProcess::spawn(
                &cli.engine,
                &cli.engine_args,
                format!("engine-{i}"),
            )?);
        }
        let mut pool =
            WorkerPool::spawn(oracles, &records, session.vector().values(), cli.depth)?;
        let summary = session.run(&mut pool);
        pool.shutdown()?;
        Ok(summary?)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let quit = cli.quit;
    let summary = run(cli)?;

    // Exit 0 when the vector improved (or we only measured), 1 otherwise,
    // so wrapper scripts can loop until the tuning run stops paying off.
    if summary.changed || quit {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
