//! Durable usage-record output.
//!
//! The simulation emits one [`UsageRecord`] per function per cycle. Writing
//! them is the only asynchronous part of a scenario: the CSV sink runs on a
//! dedicated thread behind a bounded channel, so a slow disk cannot stall the
//! cycle loop until the channel fills, at which point the sender blocks.
use std::path::Path;
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::error;
use serde::Serialize;

use crate::error::SimulationError;

const SINK_CHANNEL_CAPACITY: usize = 2048;

/// Per-function, per-cycle usage row.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub tick: u64,
    pub function: String,
    pub invocations: u64,
    pub cold_starts: u64,
    pub delayed_invocations: u64,
    pub running_instances: u64,
    pub idle_instances: u64,
    pub terminated_instances: u64,
    pub provisioned_cpu: u32,
    pub provisioned_memory: u32,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub wasted_memory_time: f64,
    pub execution_time: u64,
    pub median_cold_start_delay: u64,
    pub cost: f64,
}

/// Destination for usage records.
pub trait RecordSink: Send {
    fn emit(&mut self, record: UsageRecord) -> Result<(), SimulationError>;

    /// Blocks until every record emitted so far is durable.
    fn flush(&mut self) -> Result<(), SimulationError>;
}

enum SinkMessage {
    Record(Box<UsageRecord>),
    Flush(SyncSender<()>),
}

/// CSV sink with a dedicated writer thread.
pub struct CsvSink {
    sender: Option<SyncSender<SinkMessage>>,
    writer: Option<JoinHandle<()>>,
}

impl CsvSink {
    pub fn open(path: &Path) -> Result<Self, SimulationError> {
        let mut csv_writer = csv::Writer::from_path(path)?;
        let (sender, receiver) = sync_channel::<SinkMessage>(SINK_CHANNEL_CAPACITY);
        let writer = std::thread::spawn(move || {
            for message in receiver {
                match message {
                    SinkMessage::Record(record) => {
                        if let Err(e) = csv_writer.serialize(record.as_ref()) {
                            error!("failed to write usage record: {}", e);
                        }
                    }
                    SinkMessage::Flush(ack) => {
                        if let Err(e) = csv_writer.flush() {
                            error!("failed to flush usage records: {}", e);
                        }
                        // receiver may be gone, nothing left to do then
                        let _ = ack.send(());
                    }
                }
            }
            if let Err(e) = csv_writer.flush() {
                error!("failed to flush usage records: {}", e);
            }
        });
        Ok(Self {
            sender: Some(sender),
            writer: Some(writer),
        })
    }

    fn closed() -> SimulationError {
        SimulationError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "record sink writer thread is gone",
        ))
    }
}

impl RecordSink for CsvSink {
    fn emit(&mut self, record: UsageRecord) -> Result<(), SimulationError> {
        let sender = self.sender.as_ref().ok_or_else(Self::closed)?;
        sender
            .send(SinkMessage::Record(Box::new(record)))
            .map_err(|_| Self::closed())
    }

    fn flush(&mut self) -> Result<(), SimulationError> {
        let sender = self.sender.as_ref().ok_or_else(Self::closed)?;
        let (ack_sender, ack_receiver) = sync_channel(1);
        sender
            .send(SinkMessage::Flush(ack_sender))
            .map_err(|_| Self::closed())?;
        ack_receiver.recv().map_err(|_| Self::closed())
    }
}

impl Drop for CsvSink {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

/// In-memory sink for tests; the record vector is shared so callers can keep
/// a handle and inspect it after the simulation finishes.
#[derive(Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<UsageRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Arc<Mutex<Vec<UsageRecord>>> {
        self.records.clone()
    }
}

impl RecordSink for MemorySink {
    fn emit(&mut self, record: UsageRecord) -> Result<(), SimulationError> {
        self.records
            .lock()
            .map_err(|_| {
                SimulationError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "record store poisoned",
                ))
            })?
            .push(record);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SimulationError> {
        Ok(())
    }
}

/// Sink that discards everything; default when no output path is given.
#[derive(Default)]
pub struct NullSink;

impl RecordSink for NullSink {
    fn emit(&mut self, _record: UsageRecord) -> Result<(), SimulationError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SimulationError> {
        Ok(())
    }
}
