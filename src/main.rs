mod miner;
mod network;
mod prelude;
mod stratum;

use crate::miner::dispatcher::{JobDispatcher, JobQueue};
use crate::miner::hash::Sha256;
use crate::miner::{sink, MinerConfig, MinerError};
use crate::network::{ClientMessage, NetConfig, NetworkError, ServerMessage};
use crate::prelude::*;
use crate::stratum::{Job, JobError};
use futures::{pin_mut, SinkExt, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::{create_dir_all, File};
use std::thread;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Mine jobs received from a Stratum pool
    Mine {
        #[structopt(flatten)]
        net_cfg: NetConfig,

        #[structopt(flatten)]
        miner_cfg: MinerConfig,
    },

    /// Connect to the pool and log every message, for debugging purposes.
    NetLog {
        #[structopt(flatten)]
        net_cfg: NetConfig,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(about, author)]
pub struct Opts {
    /// Log level for terminal output
    #[structopt(short, long, default_value = "info")]
    log_level: LevelFilter,

    /// Don't write a debug log to the data directory
    #[structopt(long)]
    no_log_file: bool,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("couldn't set up logging: {0}")]
    Logging(#[from] log::SetLoggerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("miner error: {0}")]
    Miner(#[from] MinerError),
}

fn open_log_file() -> Result<Option<File>, AppError> {
    let data_dir = match dirs::data_dir() {
        Some(dir) => dir.join(env!("CARGO_PKG_NAME")),
        None => return Ok(None),
    };

    create_dir_all(&data_dir)?;
    let file = File::create(data_dir.join(concat!(env!("CARGO_PKG_NAME"), ".log")))?;
    Ok(Some(file))
}

fn init_logging(level: LevelFilter, log_file: bool) -> Result<(), AppError> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    let file = if log_file { open_log_file()? } else { None };
    let missing_file = log_file && file.is_none();

    if let Some(file) = file {
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
    }

    CombinedLogger::init(loggers)?;

    if missing_file {
        warn!("Couldn't determine data directory, not writing a log file");
    }

    Ok(())
}

async fn net_log(net_cfg: NetConfig) -> Result<(), AppError> {
    let (sink, stream) = network::connect(&net_cfg).await?;
    pin_mut!(sink);
    pin_mut!(stream);

    eprintln!("Connected to {}", net_cfg.pool);

    sink.send(ClientMessage::subscribe()).await?;
    sink.send(ClientMessage::authorize(&net_cfg.user, &net_cfg.password))
        .await?;

    while let Some(message) = stream.next().await {
        match message {
            Ok(message) => println!("{:?}", message),
            Err(NetworkError::JsonError(e)) => println!("Malformed message: {}", e),
            Err(e) => return Err(e.into()),
        }
    }

    eprintln!("Connection closed");
    Ok(())
}

/// Feed jobs from the pool into the queue until the connection ends.
async fn follow_pool(net_cfg: &NetConfig, queue: &JobQueue) -> Result<(), AppError> {
    let (sink, stream) = network::connect(net_cfg).await?;
    pin_mut!(sink);
    pin_mut!(stream);

    info!("Connected to {}", net_cfg.pool);

    sink.send(ClientMessage::subscribe()).await?;
    sink.send(ClientMessage::authorize(&net_cfg.user, &net_cfg.password))
        .await?;

    while let Some(message) = stream.next().await {
        match message {
            Ok(ServerMessage::Request { method, params, .. }) => {
                match Job::from_parsed(&method, &params) {
                    Ok(job) => {
                        debug!("Received job {}", job.id());
                        queue.submit(job)?;
                    }
                    Err(JobError::WrongMethod(_)) => debug!("Ignoring {} request", method),
                    Err(e) => warn!("Ignoring incomplete job: {}", e),
                }
            }
            Ok(other) => debug!("Pool message: {:?}", other),
            Err(NetworkError::JsonError(e)) => warn!("Couldn't parse pool message: {}", e),
            Err(e) => return Err(e.into()),
        }
    }

    Err(NetworkError::Closed.into())
}

async fn mine(net_cfg: NetConfig, miner_cfg: MinerConfig) -> Result<(), AppError> {
    let (reports, sink) = sink::channel(miner_cfg.channel_capacity);
    let dispatcher = JobDispatcher::new(miner_cfg, Sha256, reports);
    let (queue, outcomes, dispatcher_thread) = JobQueue::spawn(dispatcher)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}"));
    pb.enable_steady_tick(100);

    let sink_thread = thread::Builder::new()
        .name("result sink".to_string())
        .spawn(move || sink.run(outcomes, pb))?;

    let result = follow_pool(&net_cfg, &queue).await;

    // closing the queue stops the dispatcher, which in turn ends the sink
    drop(queue);
    if dispatcher_thread.join().is_err() {
        error!("Job dispatcher panicked");
    }
    if sink_thread.join().is_err() {
        error!("Result sink panicked");
    }

    result
}

#[tokio::main]
async fn main() {
    let opts: Opts = Opts::from_args();

    if let Err(e) = init_logging(opts.log_level, !opts.no_log_file) {
        eprintln!("{}", e);
    }

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let result = match opts.command {
        Command::Mine { net_cfg, miner_cfg } => mine(net_cfg, miner_cfg).await,
        Command::NetLog { net_cfg } => net_log(net_cfg).await,
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
