//! Live order path: a bounded queue drained by one background worker.
//!
//! Bar processing enqueues and moves on; the worker performs the blocking
//! submission in FIFO order. Shutdown sends a sentinel and joins the worker.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::components::{AccountSnapshot, OrderAck, OrderError, OrderRouter};
use crate::domain::{Bar, OrderRequest};

/// Default queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Performs the actual (possibly blocking) order submission.
pub trait OrderSubmitter: Send {
    fn name(&self) -> &str;

    fn submit(&mut self, order: &OrderRequest) -> Result<(), OrderError>;
}

enum QueueCommand {
    Submit(OrderRequest),
    Shutdown,
}

/// Final state of the worker after shutdown.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub submitted: usize,
    /// The submission error that stopped the worker, if any.
    pub error: Option<OrderError>,
}

impl WorkerReport {
    pub fn into_result(self) -> Result<usize, OrderError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.submitted),
        }
    }
}

pub struct OrderQueue {
    sender: SyncSender<QueueCommand>,
    handle: Option<JoinHandle<WorkerReport>>,
}

impl OrderQueue {
    /// Spawn the worker thread around `submitter`.
    pub fn spawn<S>(submitter: S, capacity: usize) -> Result<Self, OrderError>
    where
        S: OrderSubmitter + 'static,
    {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        let handle = thread::Builder::new()
            .name("qqelab-order-worker".into())
            .spawn(move || worker_loop(receiver, submitter))
            .map_err(|e| OrderError::Spawn(e.to_string()))?;
        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Queue an order. Blocks only while the queue is full.
    pub fn enqueue(&self, order: OrderRequest) -> Result<(), OrderError> {
        self.sender
            .send(QueueCommand::Submit(order))
            .map_err(|_| OrderError::QueueClosed)
    }

    /// Send the sentinel, wait for queued orders to drain, and join.
    pub fn shutdown(mut self) -> WorkerReport {
        self.stop()
    }

    fn stop(&mut self) -> WorkerReport {
        let Some(handle) = self.handle.take() else {
            return WorkerReport {
                submitted: 0,
                error: None,
            };
        };
        // The worker may already be gone after a failed submission.
        let _ = self.sender.send(QueueCommand::Shutdown);
        match handle.join() {
            Ok(report) => report,
            Err(_) => WorkerReport {
                submitted: 0,
                error: Some(OrderError::WorkerPanicked),
            },
        }
    }
}

impl Drop for OrderQueue {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let report = self.stop();
            if let Some(err) = report.error {
                error!(error = %err, "order worker stopped with error");
            }
        }
    }
}

fn worker_loop<S: OrderSubmitter>(receiver: Receiver<QueueCommand>, mut submitter: S) -> WorkerReport {
    let mut submitted = 0usize;
    loop {
        match receiver.recv() {
            Ok(QueueCommand::Shutdown) | Err(_) => break,
            Ok(QueueCommand::Submit(order)) => match submitter.submit(&order) {
                Ok(()) => {
                    submitted += 1;
                    debug!(
                        submitter = submitter.name(),
                        side = %order.side,
                        asset = %order.asset,
                        size = order.size,
                        "order submitted"
                    );
                }
                Err(err) => {
                    error!(
                        submitter = submitter.name(),
                        side = %order.side,
                        error = %err,
                        "order submission failed, stopping worker"
                    );
                    // Dropping the receiver makes later enqueues fail.
                    return WorkerReport {
                        submitted,
                        error: Some(err),
                    };
                }
            },
        }
    }
    info!(submitted, "order worker finished");
    WorkerReport {
        submitted,
        error: None,
    }
}

/// Order router for live runs: every order goes onto the queue.
pub struct QueuedRouter {
    queue: OrderQueue,
}

impl QueuedRouter {
    pub fn new(queue: OrderQueue) -> Self {
        Self { queue }
    }

    pub fn shutdown(self) -> WorkerReport {
        self.queue.shutdown()
    }
}

impl OrderRouter for QueuedRouter {
    fn submit(
        &mut self,
        request: &OrderRequest,
        _bar_index: usize,
        _bar: &Bar,
    ) -> Result<OrderAck, OrderError> {
        self.queue.enqueue(request.clone())?;
        Ok(OrderAck::Queued)
    }

    fn account(&self, _mark_price: f64) -> AccountSnapshot {
        AccountSnapshot::default()
    }
}
