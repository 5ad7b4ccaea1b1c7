use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use crate::SourceError;

/// Program text that is either available now or arriving from a worker.
#[derive(Debug)]
pub enum SourceFuture {
    Ready(Option<Result<String, SourceError>>),
    Pending {
        receiver: Receiver<Result<String, SourceError>>,
        origin: String,
        deadline: Instant,
        timeout: Duration,
    },
}

impl SourceFuture {
    pub fn ready(result: Result<String, SourceError>) -> Self {
        SourceFuture::Ready(Some(result))
    }

    pub(crate) fn pending(
        receiver: Receiver<Result<String, SourceError>>,
        origin: String,
        timeout: Duration,
    ) -> Self {
        SourceFuture::Pending {
            receiver,
            origin,
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SourceFuture::Ready(_))
    }

    /// Non-blocking check. `Ok(None)` means the worker is still running.
    ///
    /// Once a result has been returned the future is spent; polling again
    /// reports [`SourceError::WorkerDisconnected`].
    pub fn poll(&mut self) -> Result<Option<String>, SourceError> {
        match self {
            SourceFuture::Ready(result) => match result.take() {
                Some(result) => result.map(Some),
                None => Err(SourceError::WorkerDisconnected),
            },
            SourceFuture::Pending {
                receiver,
                origin,
                deadline,
                timeout,
            } => match receiver.try_recv() {
                Ok(result) => {
                    let result = result.map(Some);
                    *self = SourceFuture::Ready(None);
                    result
                }
                Err(TryRecvError::Empty) if Instant::now() >= *deadline => {
                    Err(SourceError::Timeout {
                        url: origin.clone(),
                        timeout: *timeout,
                    })
                }
                Err(TryRecvError::Empty) => Ok(None),
                Err(TryRecvError::Disconnected) => Err(SourceError::WorkerDisconnected),
            },
        }
    }

    /// Blocks until the program text is available or the deadline passes.
    pub fn wait(self) -> Result<String, SourceError> {
        match self {
            SourceFuture::Ready(Some(result)) => result,
            SourceFuture::Ready(None) => Err(SourceError::WorkerDisconnected),
            SourceFuture::Pending {
                receiver,
                origin,
                deadline,
                timeout,
            } => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match receiver.recv_timeout(remaining) {
                    Ok(result) => result,
                    Err(RecvTimeoutError::Timeout) => Err(SourceError::Timeout {
                        url: origin,
                        timeout,
                    }),
                    Err(RecvTimeoutError::Disconnected) => Err(SourceError::WorkerDisconnected),
                }
            }
        }
    }
}
