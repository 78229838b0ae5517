use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::BytesMut;
use crossbeam::channel::{Receiver, Sender};
use proplink_transport::PushQueue;
use proplink_wire::{encode_message, Command};
use tracing::{debug, warn};

use crate::dispatch;
use crate::error::{Result, ServerError};
use crate::store::Shared;

/// One parsed request plus everything needed to route the reply: the index
/// of the router it arrived on and the captured identity/delimiter frames.
pub(crate) struct Job {
    pub origin: u8,
    pub identity: Vec<u8>,
    pub delimiter: Vec<u8>,
    pub command_id: u32,
    pub command: Command,
}

/// Fixed-size pool of request workers.
///
/// Workers receive jobs over a crossbeam channel, run the (possibly
/// blocking) handler, and hand the encoded reply back to the dispatch
/// thread over an inproc push queue. Dropping the sender drains and stops
/// the pool.
pub(crate) struct WorkerPool {
    job_tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers, each with its own reply socket connected to
    /// `reply_endpoint` (which must already be bound).
    pub fn spawn(
        size: usize,
        ctx: &zmq::Context,
        reply_endpoint: &str,
        shared: Arc<Shared>,
    ) -> Result<Self> {
        let (job_tx, job_rx) = crossbeam::channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for index in 0..size {
            let job_rx = job_rx.clone();
            let ctx = ctx.clone();
            let endpoint = reply_endpoint.to_string();
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("proplink-worker-{index}"))
                .spawn(move || worker_loop(&job_rx, &ctx, &endpoint, &shared))
                .map_err(|source| ServerError::Spawn {
                    name: "worker",
                    source,
                })?;
            workers.push(handle);
        }
        Ok(Self {
            job_tx: Some(job_tx),
            workers,
        })
    }

    pub fn sender(&self) -> Option<Sender<Job>> {
        self.job_tx.clone()
    }

    /// Stop accepting work, let queued jobs finish, and join every worker.
    pub fn join(&mut self) {
        self.job_tx.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.join();
    }
}

fn worker_loop(job_rx: &Receiver<Job>, ctx: &zmq::Context, reply_endpoint: &str, shared: &Shared) {
    let replies = match PushQueue::connect(ctx, reply_endpoint) {
        Ok(queue) => queue,
        Err(error) => {
            warn!(%error, "worker could not open its reply queue");
            return;
        }
    };

    while let Ok(job) = job_rx.recv() {
        let response = dispatch::handle_command(shared, job.command_id, job.command);
        let mut body = BytesMut::new();
        encode_message(&response, &mut body);
        if let Err(error) =
            replies.push(&[&[job.origin][..], &job.identity, &job.delimiter, &body])
        {
            // Only happens once the dispatch loop is gone; the reply is
            // undeliverable anyway.
            debug!(%error, command_id = job.command_id, "dropping undeliverable reply");
        }
    }
    debug!("worker stopped");
}
