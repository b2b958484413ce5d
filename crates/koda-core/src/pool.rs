//! Off-thread decode on a fixed pool of worker threads.
//!
//! The format engine itself is synchronous; this module only ships a byte
//! buffer to another thread, runs the ordinary decoder there, and hands the
//! result back through a channel. Jobs are dispatched in submission order to
//! the first idle worker, so completion order is not guaranteed. A running
//! decode cannot be cancelled; dropping the [`DecodeJob`] handle abandons it
//! and the result is discarded when the worker finishes.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use tracing::debug;

use crate::decoder::{decode, DecodeOptions};
use crate::error::DecodeError;
use crate::value::Value;

/// Sizing for [`DecoderPool`].
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub pool_size: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        let pool_size = thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
        PoolOptions { pool_size }
    }
}

struct Job {
    bytes: Vec<u8>,
    options: DecodeOptions,
    result: Sender<Result<Value, DecodeError>>,
}

/// Handle to a decode running (or queued) off-thread.
#[derive(Debug)]
pub struct DecodeJob {
    result: Receiver<Result<Value, DecodeError>>,
}

impl DecodeJob {
    /// Block until the decode completes.
    pub fn wait(self) -> Result<Value, DecodeError> {
        match self.result.recv() {
            Ok(outcome) => outcome,
            Err(_) => Err(DecodeError::PoolClosed),
        }
    }

    /// Take the result if it is already available.
    pub fn try_wait(&self) -> Option<Result<Value, DecodeError>> {
        self.result.try_recv().ok()
    }
}

/// A fixed set of decode workers sharing one FIFO job queue.
pub struct DecoderPool {
    jobs: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl DecoderPool {
    pub fn new(options: &PoolOptions) -> DecoderPool {
        let (jobs, queue) = channel::<Job>();
        let queue = Arc::new(Mutex::new(queue));
        let size = options.pool_size.max(1);
        let workers = (0..size)
            .map(|id| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || worker_loop(id, &queue))
            })
            .collect();
        debug!(workers = size, "decoder pool started");
        DecoderPool {
            jobs: Some(jobs),
            workers,
        }
    }

    /// Queue one buffer for decoding. The buffer moves to the worker; the
    /// returned handle yields the decoded value.
    pub fn decode(
        &self,
        bytes: Vec<u8>,
        options: DecodeOptions,
    ) -> Result<DecodeJob, DecodeError> {
        let jobs = self.jobs.as_ref().ok_or(DecodeError::PoolClosed)?;
        let (result, handle) = channel();
        jobs.send(Job {
            bytes,
            options,
            result,
        })
        .map_err(|_| DecodeError::PoolClosed)?;
        Ok(DecodeJob { result: handle })
    }

    /// Drain in-flight jobs, then release the workers. Submissions after
    /// this reject immediately.
    pub fn destroy(&mut self) {
        if self.jobs.take().is_none() {
            return;
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("decoder pool shut down");
    }
}

impl Drop for DecoderPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn worker_loop(id: usize, queue: &Mutex<Receiver<Job>>) {
    loop {
        // hold the lock only while waiting; decoding runs unlocked
        let job = match queue.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };
        match job {
            Ok(job) => {
                let outcome = decode(&job.bytes, &job.options);
                // an abandoned handle just discards the result
                let _ = job.result.send(outcome);
            }
            // channel closed: the pool was destroyed and the queue is drained
            Err(_) => break,
        }
    }
    debug!(worker = id, "decode worker exited");
}

/// One-shot off-thread decode without a pool.
pub fn spawn_decode(bytes: Vec<u8>, options: DecodeOptions) -> DecodeJob {
    let (result, handle) = channel();
    thread::spawn(move || {
        let _ = result.send(decode(&bytes, &options));
    });
    DecodeJob { result: handle }
}
