//! Frame-aligned snapshots of the bridge's execution context.

use ledger_precompiles::{context::SnapshotId, ledger::Ledger, SharedBridge};
use revm::{
    context_interface::ContextTr,
    interpreter::{CallInputs, CallOutcome, CreateInputs, CreateOutcome},
    Inspector,
};

/// Inspector that keeps the ledger's revert boundary in lock step with the
/// VM's call frames.
///
/// Every `call`/`create` opens a snapshot; the matching `*_end` commits it on
/// success and reverts it otherwise. A precompile write committed inside a
/// frame is therefore dropped again when any enclosing frame reverts.
#[derive(Debug)]
pub struct LedgerFrameInspector<L> {
    bridge: SharedBridge<L>,
    frames: Vec<SnapshotId>,
}

impl<L> LedgerFrameInspector<L> {
    /// An inspector over `bridge`.
    pub const fn new(bridge: SharedBridge<L>) -> Self {
        Self {
            bridge,
            frames: Vec::new(),
        }
    }

    /// Number of frames currently open.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl<L: Ledger> LedgerFrameInspector<L> {
    fn open_frame(&mut self) {
        let id = self.bridge.lock().context_mut().snapshot();
        self.frames.push(id);
    }

    /// Releases the innermost frame, returning whether it committed.
    fn close_frame(&mut self, success: bool) -> bool {
        let Some(id) = self.frames.pop() else {
            tracing::warn!(target: "ledger_revm::inspector", "frame end without matching start");
            return false;
        };
        let mut bridge = self.bridge.lock();
        if success {
            bridge.context_mut().commit_snapshot(id);
        } else {
            bridge.context_mut().revert_to_snapshot(id);
        }
        tracing::trace!(target: "ledger_revm::inspector", ?id, success, depth = self.frames.len(), "frame closed");
        success
    }

    /// Reverts frames left open by a transaction that aborted mid-execution.
    pub(crate) fn unwind(&mut self) {
        if self.frames.is_empty() {
            return;
        }
        tracing::warn!(target: "ledger_revm::inspector", open = self.frames.len(), "reverting frames of an aborted transaction");
        let mut bridge = self.bridge.lock();
        while let Some(id) = self.frames.pop() {
            bridge.context_mut().revert_to_snapshot(id);
        }
    }
}

impl<CTX: ContextTr, L: Ledger> Inspector<CTX> for LedgerFrameInspector<L> {
    fn call(&mut self, _context: &mut CTX, _inputs: &mut CallInputs) -> Option<CallOutcome> {
        self.open_frame();
        None
    }

    fn call_end(&mut self, _context: &mut CTX, _inputs: &CallInputs, outcome: &mut CallOutcome) {
        self.close_frame(outcome.result.is_ok());
    }

    fn create(&mut self, _context: &mut CTX, _inputs: &mut CreateInputs) -> Option<CreateOutcome> {
        self.open_frame();
        None
    }

    fn create_end(
        &mut self,
        _context: &mut CTX,
        _inputs: &CreateInputs,
        outcome: &mut CreateOutcome,
    ) {
        self.close_frame(outcome.result.is_ok());
    }
}
