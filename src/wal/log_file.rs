use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{error, trace};

use crate::common::{QuarryError, Result, TransactionId};
use crate::storage::page::HeapPage;

use super::log_record::{LogRecord, LogSink};

/// Requests handled by the log writer thread
enum LogRequest {
    /// Append an encoded record
    Append(Bytes),
    /// Make everything appended so far durable, then reply
    Force(Sender<std::result::Result<(), String>>),
}

/// LogFile appends [`LogRecord`]s to a file from a background writer thread.
///
/// `write` only queues the record; `force` waits until the writer has
/// flushed and synced every record queued before it. Requests are processed
/// in order, so a successful `force` covers all earlier writes.
pub struct LogFile {
    path: PathBuf,
    sender: Option<Sender<LogRequest>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl LogFile {
    /// Opens (or creates) the log at `path` and starts its writer thread.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;

        let (sender, receiver) = bounded::<LogRequest>(128);
        let worker_handle = thread::spawn(move || {
            Self::run_writer(BufWriter::new(file), receiver);
        });

        Ok(Self {
            path: path.as_ref().to_path_buf(),
            sender: Some(sender),
            worker_handle: Some(worker_handle),
        })
    }

    /// Reads back every complete record stored in the log at `path`.
    pub fn read_records<P: AsRef<Path>>(path: P) -> Result<Vec<LogRecord>> {
        let mut raw = Vec::new();
        File::open(path)?.read_to_end(&mut raw)?;
        let mut bytes = Bytes::from(raw);
        let mut records = Vec::new();
        while let Some(record) = LogRecord::decode(&mut bytes) {
            records.push(record);
        }
        Ok(records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn send(&self, request: LogRequest) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| QuarryError::Log("log is closed".to_string()))?;
        sender
            .send(request)
            .map_err(|e| QuarryError::Log(format!("log writer is gone: {}", e)))
    }

    /// Writer loop. The first I/O failure is remembered and reported to
    /// every later force, since records after it may be missing.
    fn run_writer(mut out: BufWriter<File>, receiver: Receiver<LogRequest>) {
        let mut failure: Option<String> = None;

        for request in receiver.iter() {
            match request {
                LogRequest::Append(bytes) => {
                    if failure.is_none() {
                        if let Err(e) = out.write_all(&bytes) {
                            error!("log append failed: {}", e);
                            failure = Some(e.to_string());
                        }
                    }
                }
                LogRequest::Force(reply) => {
                    if failure.is_none() {
                        if let Err(e) = out.flush().and_then(|_| out.get_ref().sync_data()) {
                            error!("log force failed: {}", e);
                            failure = Some(e.to_string());
                        }
                    }
                    let _ = reply.send(match &failure {
                        Some(msg) => Err(msg.clone()),
                        None => Ok(()),
                    });
                }
            }
        }

        // channel closed
        let _ = out.flush();
        let _ = out.get_ref().sync_data();
    }
}

impl LogSink for LogFile {
    fn write(&self, txn: TransactionId, before: &HeapPage, after: &HeapPage) -> Result<()> {
        trace!("logging {} for {}", after.page_id(), txn);
        self.send(LogRequest::Append(LogRecord::new(txn, before, after).encode()))
    }

    fn force(&self) -> Result<()> {
        let (tx, rx) = bounded(1);
        self.send(LogRequest::Force(tx))?;
        rx.recv()
            .map_err(|e| QuarryError::Log(format!("no reply to force: {}", e)))?
            .map_err(QuarryError::Log)
    }
}

impl Drop for LogFile {
    fn drop(&mut self) {
        // closing the channel ends the writer loop
        self.sender.take();
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }
    }
}
