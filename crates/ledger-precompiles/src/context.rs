//! Execution context shared by the VM frames of one transaction.
//!
//! The context owns the ledger and the pending precompile logs, and keeps a
//! single stack of snapshots. Every VM call frame (and every precompile
//! invocation inside it) pushes exactly one snapshot and releases it exactly
//! once: committing folds its ledger layer and logs into the parent frame,
//! reverting drops everything recorded since it was taken. Ledger writes only
//! reach the committed state when the outermost snapshot commits.

use crate::ledger::{BlockInfo, CacheContext, LedgerCheckpoint};
use alloy_primitives::Log;
use std::ops::{Deref, DerefMut};

/// A log emitted by a precompile, tagged with the block it was produced in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventLog {
    /// Emitter, topics and data.
    pub log: Log,
    /// Block height at emission.
    pub block_number: u64,
}

/// Identifier of a snapshot on the context stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SnapshotId(u64);

#[derive(Debug)]
struct Frame {
    id: SnapshotId,
    checkpoint: LedgerCheckpoint,
    log_len: usize,
}

/// Ledger plus log journal with one nested revert boundary.
#[derive(Debug)]
pub struct ExecutionContext<L> {
    ledger: L,
    block: BlockInfo,
    logs: Vec<EventLog>,
    frames: Vec<Frame>,
    next_id: u64,
}

impl<L: CacheContext> ExecutionContext<L> {
    /// Wraps a ledger for execution at `block`.
    pub const fn new(ledger: L, block: BlockInfo) -> Self {
        Self {
            ledger,
            block,
            logs: Vec::new(),
            frames: Vec::new(),
            next_id: 0,
        }
    }

    /// Read access to the ledger, including uncommitted writes.
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Write access to the ledger. Writes land in the innermost open snapshot.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Current block.
    pub const fn block(&self) -> BlockInfo {
        self.block
    }

    /// Moves to another block.
    pub fn set_block(&mut self, block: BlockInfo) {
        self.block = block;
    }

    /// Number of open snapshots.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Logs emitted and not yet reverted or taken.
    pub fn logs(&self) -> &[EventLog] {
        &self.logs
    }

    /// Drains the pending logs.
    pub fn take_logs(&mut self) -> Vec<EventLog> {
        std::mem::take(&mut self.logs)
    }

    pub(crate) fn push_log(&mut self, log: EventLog) {
        self.logs.push(log);
    }

    /// Opens a snapshot aligned with a new VM frame.
    pub fn snapshot(&mut self) -> SnapshotId {
        let id = SnapshotId(self.next_id);
        self.next_id += 1;
        let checkpoint = self.ledger.checkpoint();
        self.frames.push(Frame {
            id,
            checkpoint,
            log_len: self.logs.len(),
        });
        tracing::trace!(target: "ledger_precompiles::context", ?id, depth = self.frames.len(), "snapshot");
        id
    }

    /// Merges the innermost snapshot into its parent.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not the innermost open snapshot.
    pub fn commit_snapshot(&mut self, id: SnapshotId) {
        let frame = self.pop_frame(id);
        self.ledger.checkpoint_commit(frame.checkpoint);
        tracing::trace!(target: "ledger_precompiles::context", ?id, depth = self.frames.len(), "snapshot committed");
    }

    /// Discards everything recorded since the innermost snapshot was taken.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not the innermost open snapshot.
    pub fn revert_to_snapshot(&mut self, id: SnapshotId) {
        let frame = self.pop_frame(id);
        self.ledger.checkpoint_revert(frame.checkpoint);
        self.logs.truncate(frame.log_len);
        tracing::trace!(target: "ledger_precompiles::context", ?id, depth = self.frames.len(), "snapshot reverted");
    }

    /// Opens a snapshot released when the guard is committed or dropped.
    ///
    /// Dropping the guard without [`NestedSnapshot::commit`] discards the
    /// snapshot, which also happens while unwinding from a panic.
    pub fn begin_nested(&mut self) -> NestedSnapshot<'_, L> {
        let id = self.snapshot();
        NestedSnapshot {
            context: self,
            id,
            released: false,
        }
    }

    /// Returns the ledger once every snapshot has been released.
    ///
    /// # Panics
    ///
    /// Panics if a snapshot is still open.
    pub fn into_ledger(self) -> L {
        assert!(
            self.frames.is_empty(),
            "execution context dropped with {} open snapshots",
            self.frames.len()
        );
        self.ledger
    }

    fn pop_frame(&mut self, id: SnapshotId) -> Frame {
        match self.frames.pop() {
            Some(frame) if frame.id == id => frame,
            Some(frame) => panic!(
                "snapshot {id:?} released out of order: innermost open snapshot is {:?}",
                frame.id
            ),
            None => panic!("snapshot {id:?} released with no open snapshot"),
        }
    }
}

/// Scoped snapshot: reverts on drop unless committed.
#[derive(Debug)]
pub struct NestedSnapshot<'a, L: CacheContext> {
    context: &'a mut ExecutionContext<L>,
    id: SnapshotId,
    released: bool,
}

impl<L: CacheContext> NestedSnapshot<'_, L> {
    /// The snapshot identifier.
    pub const fn id(&self) -> SnapshotId {
        self.id
    }

    /// Merges the snapshot into its parent.
    pub fn commit(mut self) {
        self.released = true;
        self.context.commit_snapshot(self.id);
    }

    /// Discards the snapshot.
    pub fn discard(mut self) {
        self.released = true;
        self.context.revert_to_snapshot(self.id);
    }
}

impl<L: CacheContext> Deref for NestedSnapshot<'_, L> {
    type Target = ExecutionContext<L>;

    fn deref(&self) -> &Self::Target {
        self.context
    }
}

impl<L: CacheContext> DerefMut for NestedSnapshot<'_, L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.context
    }
}

impl<L: CacheContext> Drop for NestedSnapshot<'_, L> {
    fn drop(&mut self) {
        if !self.released {
            self.context.revert_to_snapshot(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{BankKeeper, MemoryLedger};
    use alloy_primitives::{address, Address, LogData, U256};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    const ALICE: Address = address!("0x00000000000000000000000000000000000000a1");
    const BOB: Address = address!("0x00000000000000000000000000000000000000b1");
    const DENOM: &str = "aevmos";

    fn context() -> ExecutionContext<MemoryLedger> {
        let mut ledger = MemoryLedger::new(DENOM);
        ledger.mint(ALICE, DENOM, U256::from(100)).unwrap();
        ExecutionContext::new(ledger, BlockInfo::new(1, 1_000))
    }

    fn send(ctx: &mut ExecutionContext<MemoryLedger>, amount: u64) {
        ctx.ledger_mut()
            .send_coins(ALICE, BOB, DENOM, U256::from(amount))
            .unwrap();
    }

    fn log(tag: u8) -> EventLog {
        EventLog {
            log: Log {
                address: Address::with_last_byte(tag),
                data: LogData::new_unchecked(vec![], Default::default()),
            },
            block_number: 1,
        }
    }

    fn bob(ctx: &ExecutionContext<MemoryLedger>) -> U256 {
        ctx.ledger().balance(BOB, DENOM)
    }

    #[test]
    fn reverted_frame_leaves_no_effect() {
        let mut ctx = context();
        let outer = ctx.snapshot();
        send(&mut ctx, 10);
        ctx.push_log(log(1));

        let inner = ctx.snapshot();
        send(&mut ctx, 20);
        ctx.push_log(log(2));
        ctx.revert_to_snapshot(inner);

        assert_eq!(bob(&ctx), U256::from(10));
        assert_eq!(ctx.logs(), &[log(1)]);

        ctx.commit_snapshot(outer);
        assert_eq!(ctx.depth(), 0);
        assert_eq!(ctx.into_ledger().balance(BOB, DENOM), U256::from(10));
    }

    #[test]
    fn outer_revert_discards_committed_children() {
        let mut ctx = context();
        let outer = ctx.snapshot();
        let inner = ctx.snapshot();
        send(&mut ctx, 30);
        ctx.push_log(log(1));
        ctx.commit_snapshot(inner);
        assert_eq!(bob(&ctx), U256::from(30));

        ctx.revert_to_snapshot(outer);
        assert_eq!(bob(&ctx), U256::ZERO);
        assert!(ctx.logs().is_empty());
    }

    #[test]
    fn guard_reverts_on_drop() {
        let mut ctx = context();
        {
            let mut guard = ctx.begin_nested();
            send(&mut guard, 5);
            assert_eq!(bob(&guard), U256::from(5));
        }
        assert_eq!(bob(&ctx), U256::ZERO);
        assert_eq!(ctx.depth(), 0);

        let mut guard = ctx.begin_nested();
        send(&mut guard, 5);
        guard.commit();
        assert_eq!(bob(&ctx), U256::from(5));
    }

    #[test]
    fn guard_reverts_while_unwinding() {
        let mut ctx = context();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let mut guard = ctx.begin_nested();
            send(&mut guard, 50);
            panic!("handler failure");
        }));
        assert!(result.is_err());
        assert_eq!(ctx.depth(), 0);
        assert_eq!(bob(&ctx), U256::ZERO);
        assert_eq!(ctx.ledger().balance(ALICE, DENOM), U256::from(100));
    }

    #[test]
    #[should_panic(expected = "released out of order")]
    fn out_of_order_release_panics() {
        let mut ctx = context();
        let outer = ctx.snapshot();
        let _inner = ctx.snapshot();
        ctx.commit_snapshot(outer);
    }

    #[test]
    #[should_panic(expected = "open snapshots")]
    fn dropping_with_open_snapshot_panics() {
        let mut ctx = context();
        ctx.snapshot();
        ctx.into_ledger();
    }
}
