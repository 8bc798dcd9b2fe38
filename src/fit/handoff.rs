//! Single-slot diagnostics handoff.
//!
//! A fit running on a worker thread publishes exactly one [`FitDiagnostics`]
//! record; a reporting thread takes it without blocking. The slot holds one
//! record: publishing again before it is taken fails with
//! [`FitError::DiagnosticsPending`], and taking from an empty slot returns `None`.

use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

use crate::domain::FitDiagnostics;
use crate::error::FitError;

/// Producer half; cheap to clone into worker threads.
#[derive(Debug, Clone)]
pub struct DiagnosticsSender(SyncSender<FitDiagnostics>);

/// Consumer half.
#[derive(Debug)]
pub struct DiagnosticsReceiver(Receiver<FitDiagnostics>);

/// A new, empty slot.
pub fn diagnostics_slot() -> (DiagnosticsSender, DiagnosticsReceiver) {
    let (tx, rx) = sync_channel(1);
    (DiagnosticsSender(tx), DiagnosticsReceiver(rx))
}

impl DiagnosticsSender {
    /// Never blocks. A record nobody can receive any more is dropped.
    pub fn publish(&self, diagnostics: FitDiagnostics) -> Result<(), FitError> {
        match self.0.try_send(diagnostics) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(FitError::DiagnosticsPending),
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("diagnostics receiver dropped; discarding record");
                Ok(())
            }
        }
    }
}

impl DiagnosticsReceiver {
    /// Never blocks.
    pub fn try_take(&self) -> Option<FitDiagnostics> {
        self.0.try_recv().ok()
    }
}
