//! Pull-based row sources
//!
//! The exporter pulls rows one at a time from a [`RowSource`] until it
//! returns [`Pulled::EndOfData`]. Three kinds of sources are provided:
//!
//! - any closure `FnMut(usize) -> Result<Pulled>`
//! - [`rows_from_iter`] for iterators of rows
//! - [`use_row_channel`] for push-style producers running on their own thread
//!
//! # Channel example
//!
//! ```no_run
//! use excelstream_exporter::source::use_row_channel;
//! use excelstream_exporter::{Exporter, Row, SheetSpec};
//!
//! # fn main() -> excelstream_exporter::Result<()> {
//! let source = use_row_channel(|sink| {
//!     for i in 0..1_000_i64 {
//!         sink.send(Row::new([i, i * 2]))?;
//!     }
//!     Ok(())
//! });
//!
//! let exporter = Exporter::new("numbers.xlsx", true)?;
//! exporter.export(vec![SheetSpec::new("Numbers", source)])?;
//! # Ok(())
//! # }
//! ```

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::{ExcelError, Result};
use crate::types::{Pulled, Row};

/// Pull contract producing one row per call
///
/// `index` starts at 0 and grows by one per successful pull. It counts rows
/// of the logical sheet and knows nothing about physical sheet splits.
/// After returning [`Pulled::EndOfData`] a source is not pulled again.
pub trait RowSource {
    /// Produce the row at `index`, or the end marker
    fn pull(&mut self, index: usize) -> Result<Pulled>;
}

impl<F> RowSource for F
where
    F: FnMut(usize) -> Result<Pulled>,
{
    fn pull(&mut self, index: usize) -> Result<Pulled> {
        self(index)
    }
}

/// Row source backed by an iterator
pub struct IterSource<I> {
    rows: I,
}

impl<I> RowSource for IterSource<I>
where
    I: Iterator<Item = Row>,
{
    fn pull(&mut self, _index: usize) -> Result<Pulled> {
        Ok(self.rows.next().into())
    }
}

/// Wrap any collection or iterator of rows as a row source
pub fn rows_from_iter<I>(rows: I) -> IterSource<I::IntoIter>
where
    I: IntoIterator<Item = Row>,
{
    IterSource {
        rows: rows.into_iter(),
    }
}

type Produce = Box<dyn FnOnce(RowSender) -> Result<()> + Send>;
type FailureSlot = Arc<Mutex<Option<Arc<ExcelError>>>>;

/// Sending half handed to a channel producer
///
/// Each `send` blocks until the exporter pulls the row.
pub struct RowSender {
    tx: SyncSender<Row>,
}

impl RowSender {
    /// Hand one row to the exporter
    ///
    /// Fails with [`ExcelError::ConsumerGone`] once the consuming source has
    /// been dropped, e.g. because the export aborted. Producers should stop
    /// on this error.
    pub fn send(&self, row: Row) -> Result<()> {
        self.tx.send(row).map_err(|_| ExcelError::ConsumerGone)
    }
}

enum ChannelState {
    NotStarted(Produce),
    Running {
        rx: Receiver<Row>,
        failure: FailureSlot,
        handle: JoinHandle<()>,
    },
    Finished(Option<Arc<ExcelError>>),
}

/// Row source fed by a push-style producer on a background thread
///
/// The producer starts lazily on the first pull and hands rows over a
/// zero-capacity channel, so it can never run ahead of the exporter.
/// Only one consumer is supported.
///
/// Dropping the source disconnects the channel: a producer blocked in
/// [`RowSender::send`] gets [`ExcelError::ConsumerGone`] and can exit.
/// The thread itself is detached, not joined.
pub struct ChannelSource {
    state: ChannelState,
    pulled: usize,
}

/// Build a row source from a push-style producer
pub fn use_row_channel<F>(produce: F) -> ChannelSource
where
    F: FnOnce(RowSender) -> Result<()> + Send + 'static,
{
    ChannelSource {
        state: ChannelState::NotStarted(Box::new(produce)),
        pulled: 0,
    }
}

impl ChannelSource {
    /// Number of rows received so far
    pub fn rows_received(&self) -> usize {
        self.pulled
    }

    fn start(produce: Produce) -> Result<ChannelState> {
        let (tx, rx) = mpsc::sync_channel::<Row>(0);
        let failure: FailureSlot = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&failure);

        let handle = thread::Builder::new()
            .name("row-producer".to_string())
            .spawn(move || {
                let result = produce(RowSender { tx: tx.clone() });
                if let Err(err) = result {
                    debug!(error = %err, "row producer finished with error");
                    *slot.lock() = Some(Arc::new(err));
                }
                // The channel closes here, after the failure is recorded.
                drop(tx);
            })?;

        Ok(ChannelState::Running {
            rx,
            failure,
            handle,
        })
    }
}

impl RowSource for ChannelSource {
    fn pull(&mut self, _index: usize) -> Result<Pulled> {
        if matches!(self.state, ChannelState::NotStarted(_)) {
            let placeholder = ChannelState::Finished(None);
            if let ChannelState::NotStarted(produce) = std::mem::replace(&mut self.state, placeholder)
            {
                self.state = Self::start(produce)?;
            }
        }

        let received = match &self.state {
            ChannelState::Running { rx, .. } => rx.recv().ok(),
            ChannelState::Finished(Some(err)) => {
                return Err(ExcelError::Producer(Arc::clone(err)));
            }
            ChannelState::Finished(None) => return Ok(Pulled::EndOfData),
            ChannelState::NotStarted(_) => {
                return Err(ExcelError::InvalidState(
                    "row producer was not started".to_string(),
                ));
            }
        };

        if let Some(row) = received {
            self.pulled += 1;
            return Ok(Pulled::Row(row));
        }

        // Channel closed: the producer has returned and recorded its outcome.
        match std::mem::replace(&mut self.state, ChannelState::Finished(None)) {
            ChannelState::Running {
                failure, handle, ..
            } => self.finish(failure, handle),
            other => {
                self.state = other;
                Ok(Pulled::EndOfData)
            }
        }
    }
}

impl ChannelSource {
    fn finish(&mut self, failure: FailureSlot, handle: JoinHandle<()>) -> Result<Pulled> {
        if let Err(panic) = handle.join() {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(%message, "row producer panicked");
            let err = Arc::new(ExcelError::ProducerPanicked(message));
            self.state = ChannelState::Finished(Some(Arc::clone(&err)));
            return Err(ExcelError::Producer(err));
        }

        let recorded = failure.lock().take();
        debug!(rows = self.pulled, failed = recorded.is_some(), "row producer closed channel");
        self.state = ChannelState::Finished(recorded.clone());
        match recorded {
            Some(err) => Err(ExcelError::Producer(err)),
            None => Ok(Pulled::EndOfData),
        }
    }
}
