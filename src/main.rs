use log::*;

mod generator;
mod logfiles;
mod queues;
mod scheduler;
mod state;
mod train;

use logfiles::LogSink;
use state::{Shared, SimConfig};
use std::thread;
use std::time::Instant;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "tunnelrail", about = "Single-track tunnel traffic simulator.")]
struct Opt {
    /// Probability that a train arrives on the A/E/F side; trains
    /// arrive at B otherwise. Must lie in [0, 1].
    #[structopt(name = "probability", default_value = "0.5")]
    probability: f64,

    /// Simulation duration in time units.
    #[structopt(name = "simulation_time", default_value = "60")]
    simulation_time: u64,

    /// Activate debug mode
    #[structopt(short, long)]
    verbose: bool,
}

#[derive(Debug, thiserror::Error)]
enum SetupError {
    #[error("invalid probability value {0}, must be between 0 and 1")]
    InvalidProbability(f64),
    #[error(transparent)]
    LogOpen(#[from] logfiles::LogOpenError),
    #[error("failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

fn main() {
    let opt = Opt::from_args();
    let level = if opt.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    simple_logger::SimpleLogger::new()
        .with_level(level)
        .init()
        .unwrap();

    if let Err(err) = run(opt) {
        error!("{}", err);
        std::process::exit(1);
    }
}

fn run(opt: Opt) -> Result<(), SetupError> {
    if !(0.0..=1.0).contains(&opt.probability) {
        return Err(SetupError::InvalidProbability(opt.probability));
    }
    let config = SimConfig::new(opt.probability, opt.simulation_time);
    info!(
        "starting simulation with p = {} for {} time units",
        config.p, config.simulation_time
    );

    // Both log streams must be open before anything runs.
    let (sink_handle, sink) = LogSink::open(&config)?;
    let shared = Shared::new(config);

    {
        let shared = shared.clone();
        ctrlc::set_handler(move || {
            info!("interrupt received, initiating shutdown");
            shared.request_shutdown();
        })?;
    }

    let generator_thread = {
        let shared = shared.clone();
        let sink = sink_handle.clone();
        thread::spawn(move || generator::run(&shared, &sink))
    };
    let scheduler_thread = {
        let shared = shared.clone();
        let sink = sink_handle.clone();
        thread::spawn(move || scheduler::run(&shared, &sink))
    };
    let sink_thread = thread::spawn(move || sink.run());
    // The sink exits when the last sender is gone; don't hold one here.
    drop(sink_handle);

    // Supervising timer: trip shutdown once the run length elapses,
    // unless an interrupt got there first.
    let deadline = shared.config.tick * shared.config.simulation_time as u32;
    let started = Instant::now();
    while !shared.shutdown_requested() && started.elapsed() < deadline {
        thread::sleep(shared.config.tick);
    }
    shared.request_shutdown();

    let _ = generator_thread.join();
    let _ = scheduler_thread.join();
    let _ = sink_thread.join();

    println!("Simulation ended.");
    Ok(())
}
