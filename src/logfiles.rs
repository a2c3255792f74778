//! The two append-only event streams the simulation produces:
//! `train.log` (one line per completed passage) and
//! `control-center.log` (tunnel/overload events). Worker threads send
//! records over a channel; a dedicated sink thread owns the files and
//! exits once every sender has been dropped.

use crate::state::SimConfig;
use crate::train::{Station, Train};
use chrono::{DateTime, Local};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::*;
use std::fs::File;
use std::io::{BufWriter, Write};

pub const TRAIN_LOG: &str = "train.log";
pub const CONTROL_LOG: &str = "control-center.log";

const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, thiserror::Error)]
#[error("cannot open log file {path}: {source}")]
pub struct LogOpenError {
    pub path: &'static str,
    #[source]
    pub source: std::io::Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    TunnelPassing,
    Breakdown,
    SystemOverload,
}

impl ControlEvent {
    fn name(self) -> &'static str {
        match self {
            ControlEvent::TunnelPassing => "Tunnel Passing",
            ControlEvent::Breakdown => "Breakdown",
            ControlEvent::SystemOverload => "System Overload",
        }
    }
}

#[derive(Debug)]
pub enum LogRecord {
    /// A completed tunnel passage, for the train log.
    Passage {
        id: u64,
        starting_point: Station,
        destination_point: Station,
        length: u32,
        arrival: DateTime<Local>,
        departure: DateTime<Local>,
    },
    /// A control-center event with the waiting-train snapshot taken
    /// when the event occurred.
    Control {
        event: ControlEvent,
        time: DateTime<Local>,
        train: Option<u64>,
        waiting: Vec<u64>,
    },
    /// Overload left; the trailing field reports the drain duration.
    TunnelCleared { time: DateTime<Local>, secs: u64 },
}

/// Cloneable sending side handed to the generator and scheduler.
#[derive(Clone)]
pub struct LogHandle {
    tx: Sender<LogRecord>,
}

impl LogHandle {
    pub fn passage(&self, train: &Train, departure: DateTime<Local>) {
        let _ = self.tx.send(LogRecord::Passage {
            id: train.id,
            starting_point: train.starting_point,
            destination_point: train.destination_point,
            length: train.length,
            arrival: train.arrival_time,
            departure,
        });
    }

    pub fn control(&self, event: ControlEvent, train: Option<u64>, waiting: Vec<u64>) {
        let _ = self.tx.send(LogRecord::Control {
            event,
            time: Local::now(),
            train,
            waiting,
        });
    }

    pub fn tunnel_cleared(&self, secs: u64) {
        let _ = self.tx.send(LogRecord::TunnelCleared {
            time: Local::now(),
            secs,
        });
    }
}

#[cfg(test)]
impl LogHandle {
    /// Handle wired to an in-memory receiver instead of the files.
    pub fn test_pair() -> (LogHandle, Receiver<LogRecord>) {
        let (tx, rx) = unbounded();
        (LogHandle { tx }, rx)
    }
}

/// Owns the two log files and drains the record channel.
pub struct LogSink {
    train_log: BufWriter<File>,
    control_log: BufWriter<File>,
    rx: Receiver<LogRecord>,
}

impl LogSink {
    /// Open both streams and write their headers. Failure here is
    /// fatal at startup; the simulation never runs unobserved.
    pub fn open(config: &SimConfig) -> Result<(LogHandle, LogSink), LogOpenError> {
        let train_log = File::create(TRAIN_LOG).map_err(|source| LogOpenError {
            path: TRAIN_LOG,
            source,
        })?;
        let control_log = File::create(CONTROL_LOG).map_err(|source| LogOpenError {
            path: CONTROL_LOG,
            source,
        })?;
        let mut train_log = BufWriter::new(train_log);
        let mut control_log = BufWriter::new(control_log);

        let header = |err: std::io::Error| LogOpenError {
            path: TRAIN_LOG,
            source: err,
        };
        writeln!(train_log, "{}:", TRAIN_LOG).map_err(header)?;
        writeln!(
            train_log,
            "Simulation arguments: p = {:.6}, simulation_time = {}",
            config.p, config.simulation_time
        )
        .map_err(header)?;
        writeln!(
            train_log,
            "{:<10} {:<15} {:<15} {:<10} {:<20} {:<20}",
            "Train ID", "Starting Point", "Destination", "Length(m)", "Arrival Time", "Departure Time"
        )
        .map_err(header)?;

        let header = |err: std::io::Error| LogOpenError {
            path: CONTROL_LOG,
            source: err,
        };
        writeln!(control_log, "{}:", CONTROL_LOG).map_err(header)?;
        writeln!(
            control_log,
            "{:<20} {:<20} {:<10} {}",
            "Event", "Event Time", "Train ID", "Trains Waiting Passage"
        )
        .map_err(header)?;

        let (tx, rx) = unbounded();
        Ok((
            LogHandle { tx },
            LogSink {
                train_log,
                control_log,
                rx,
            },
        ))
    }

    /// Drain records until the last `LogHandle` is gone, then flush.
    pub fn run(mut self) {
        while let Ok(record) = self.rx.recv() {
            let result = match record {
                LogRecord::Passage { .. } => {
                    writeln!(self.train_log, "{}", passage_line(&record))
                }
                _ => writeln!(self.control_log, "{}", control_line(&record)),
            };
            if let Err(err) = result {
                error!("log write failed: {}", err);
            }
        }
        let _ = self.train_log.flush();
        let _ = self.control_log.flush();
    }
}

fn passage_line(record: &LogRecord) -> String {
    match record {
        LogRecord::Passage {
            id,
            starting_point,
            destination_point,
            length,
            arrival,
            departure,
        } => format!(
            "{:<10} {:<15} {:<15} {:<10} {:<20} {:<20}",
            id,
            starting_point,
            destination_point,
            length,
            arrival.format(TIME_FORMAT).to_string(),
            departure.format(TIME_FORMAT).to_string()
        ),
        _ => String::new(),
    }
}

fn control_line(record: &LogRecord) -> String {
    match record {
        LogRecord::Control {
            event,
            time,
            train,
            waiting,
        } => {
            let id = train.map_or_else(|| "#".to_string(), |id| id.to_string());
            format!(
                "{:<20} {:<20} {:<10} {}",
                event.name(),
                time.format(TIME_FORMAT).to_string(),
                id,
                waiting_field(waiting)
            )
        }
        LogRecord::TunnelCleared { time, secs } => format!(
            "{:<20} {:<20} {:<10} # Time to clear: {} secs",
            "Tunnel Cleared",
            time.format(TIME_FORMAT).to_string(),
            "#",
            secs
        ),
        _ => String::new(),
    }
}

/// Comma-joined ascending train ids, or a single space when nobody
/// is waiting.
fn waiting_field(ids: &[u64]) -> String {
    if ids.is_empty() {
        return " ".to_string();
    }
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
