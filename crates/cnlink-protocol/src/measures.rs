use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{Receiver, RecvTimeoutError};
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::decode::MeasureRecord;
use crate::error::MeasuresError;
use crate::protocol::{CommandSender, Protocol};

/// How long the worker waits on an empty queue before checking for stop.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const MEASURES_THREAD_NAME: &str = "cn-measures";

/// Background worker decoding the measurement queue.
///
/// Every decoded record is handed to the consumer on the worker thread.
pub struct MeasuresReader<S, C> {
    queue: Receiver<Bytes>,
    protocol: Arc<Protocol<S, C>>,
    poll_interval: Duration,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl<S, C> MeasuresReader<S, C>
where
    S: CommandSender + 'static,
    C: Clock + 'static,
{
    pub fn new(queue: Receiver<Bytes>, protocol: Arc<Protocol<S, C>>) -> Self {
        Self {
            queue,
            protocol,
            poll_interval: DEFAULT_POLL_INTERVAL,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Start the worker. Fails if it is already running.
    pub fn start<F>(&mut self, mut consumer: F) -> Result<(), MeasuresError>
    where
        F: FnMut(MeasureRecord) + Send + 'static,
    {
        if self.worker.is_some() {
            return Err(MeasuresError::AlreadyRunning);
        }

        let queue = self.queue.clone();
        let protocol = Arc::clone(&self.protocol);
        let running = Arc::clone(&self.running);
        let poll_interval = self.poll_interval;

        running.store(true, Ordering::Release);
        let spawned = thread::Builder::new()
            .name(MEASURES_THREAD_NAME.to_string())
            .spawn(move || {
                let mut decoded = 0u64;
                while running.load(Ordering::Acquire) {
                    match queue.recv_timeout(poll_interval) {
                        Ok(packet) => {
                            if let Some(record) = protocol.decode_measure_packet(&packet) {
                                decoded += 1;
                                consumer(record);
                            }
                        }
                        Err(RecvTimeoutError::Timeout) => {}
                        Err(RecvTimeoutError::Disconnected) => {
                            debug!("measurement queue closed");
                            break;
                        }
                    }
                }
                debug!(decoded, "measures reader exiting");
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                info!("measures reader started");
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                Err(MeasuresError::Spawn(err))
            }
        }
    }

    /// Stop the worker and wait for it. Returns false if it was not running.
    pub fn stop(&mut self) -> bool {
        let Some(handle) = self.worker.take() else {
            return false;
        };
        self.running.store(false, Ordering::Release);
        if handle.join().is_err() {
            error!("measures reader panicked");
        }
        info!("measures reader stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }
}

impl<S, C> Drop for MeasuresReader<S, C> {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.take() {
            self.running.store(false, Ordering::Release);
            let _ = handle.join();
        }
    }
}
