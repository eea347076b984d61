//! # Turnstile Simulator
//!
//! Runs reader and writer threads against one shared core and shows what
//! happens.
//!
//! ## Usage
//!
//! ```bash
//! turnstile --readers 5 --writers 2 --display dashboard
//! turnstile --config sim.toml --duration 30
//! RUST_LOG=turnstile=debug turnstile --fast --duration 5 --display log
//! ```

use std::io::IsTerminal;
use std::process;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;
use turnstile::{DisplayMode, SimConfig, SimError, SimResult, Simulation};

/// Time compression applied by `--fast`.
const FAST_FACTOR: u64 = 100;

/// Command line after parsing. `None` keeps the config file value.
#[derive(Default)]
struct Args {
    config: Option<String>,
    readers: Option<usize>,
    writers: Option<usize>,
    duration: Option<u64>,
    display: Option<DisplayMode>,
    seed: Option<u64>,
    fast: bool,
    no_color: bool,
    help: bool,
}

fn value<T: FromStr>(args: &[String], i: usize, flag: &str) -> SimResult<T> {
    let raw = args.get(i + 1).ok_or_else(|| SimError::InvalidArgument {
        flag: flag.to_string(),
        reason: "missing value".to_string(),
    })?;
    raw.parse().map_err(|_| SimError::InvalidArgument {
        flag: flag.to_string(),
        reason: format!("cannot parse '{raw}'"),
    })
}

fn parse_args(args: &[String]) -> SimResult<Args> {
    let mut parsed = Args::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                parsed.config = Some(value(args, i, "--config")?);
                i += 1;
            }
            "--readers" | "-r" => {
                parsed.readers = Some(value(args, i, "--readers")?);
                i += 1;
            }
            "--writers" | "-w" => {
                parsed.writers = Some(value(args, i, "--writers")?);
                i += 1;
            }
            "--duration" | "-d" => {
                parsed.duration = Some(value(args, i, "--duration")?);
                i += 1;
            }
            "--display" => {
                let raw: String = value(args, i, "--display")?;
                parsed.display = Some(raw.parse()?);
                i += 1;
            }
            "--seed" => {
                parsed.seed = Some(value(args, i, "--seed")?);
                i += 1;
            }
            "--fast" => parsed.fast = true,
            "--no-color" => parsed.no_color = true,
            "--help" | "-h" => parsed.help = true,
            other => {
                return Err(SimError::InvalidArgument {
                    flag: other.to_string(),
                    reason: "unknown option (see --help)".to_string(),
                })
            }
        }
        i += 1;
    }
    Ok(parsed)
}

fn print_help() {
    println!("Usage: turnstile [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config <FILE>        TOML config (defaults apply to missing keys)");
    println!("  -r, --readers <NUM>        Reader tasks (default: 5)");
    println!("  -w, --writers <NUM>        Writer tasks (default: 2)");
    println!("  -d, --duration <SECS>      Run for N seconds then exit");
    println!("      --display <MODE>       console | dashboard | log (default: console)");
    println!("      --seed <NUM>           Fixed seed for think times");
    println!("      --fast                 Divide every duration by {FAST_FACTOR}");
    println!("      --no-color             Plain event lines (automatic when not a terminal)");
    println!("  -h, --help                 Show this help");
    println!();
    println!("Log level comes from RUST_LOG (default: warn).");
}

fn build_config(args: &Args) -> SimResult<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::load(path)?,
        None => SimConfig::default(),
    };
    if let Some(readers) = args.readers {
        config.readers = readers;
    }
    if let Some(writers) = args.writers {
        config.writers = writers;
    }
    if let Some(duration) = args.duration {
        config.run_for_secs = Some(duration);
    }
    if let Some(display) = args.display {
        config.display = display;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.fast {
        config = config.compressed(FAST_FACTOR);
    }
    if args.no_color || !std::io::stdout().is_terminal() {
        config.color = false;
    }
    config.validate()?;
    Ok(config)
}

fn run() -> SimResult<()> {
    let args: Vec<String> = std::env::args().collect();
    let args = parse_args(&args)?;
    if args.help {
        print_help();
        return Ok(());
    }
    let config = build_config(&args)?;

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         TURNSTILE                                                ║");
    println!("║         STARVATION-FREE READERS / WRITERS                        ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Readers:            {}", config.readers);
    println!("│ Writers:            {}", config.writers);
    println!("│ Read / write:       {} ms / {} ms", config.read_ms, config.write_ms);
    println!("│ Display:            {}", config.display);
    match config.run_for_secs {
        Some(secs) => println!("│ Duration:           {secs} seconds"),
        None => println!("│ Duration:           until Ctrl+C"),
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let simulation = Simulation::new(config)?;
    let report = simulation.run(std::io::stdout())?;

    println!();
    println!("═══════════════════════════════════════════════════════════════════");
    println!("                         RUN COMPLETE");
    println!("═══════════════════════════════════════════════════════════════════");
    println!("  Elapsed:            {:.1}s", report.elapsed.as_secs_f64());
    println!("  Read sessions:      {}", report.snapshot.reader_sessions);
    println!("  Write sessions:     {}", report.snapshot.writer_sessions);
    println!("  Gate cycles:        {}", report.snapshot.gate_acquisitions);
    println!("  Tickets served:     {}", report.snapshot.queue.served);
    println!("  Reports rendered:   {}", report.reporter.reports);
    if report.reporter.dropped > 0 {
        println!("  Events dropped:     {}", report.reporter.dropped);
    }
    Ok(())
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        process::exit(1);
    }
}
