//! EVM wrapper that owns the transaction-level ledger snapshot.

use crate::inspector::LedgerFrameInspector;
use alloy_evm::{
    eth::{EthEvm, EthEvmContext},
    precompiles::PrecompilesMap,
    Database, Evm, EvmEnv, IntoTxEnv,
};
use alloy_primitives::{Address, Bytes};
use core::fmt;
use ledger_precompiles::{context::SnapshotId, ledger::Ledger, SharedBridge};
use revm::{
    context::{BlockEnv, TxEnv},
    context_interface::result::{EVMError, ExecutionResult, HaltReason, ResultAndState},
    primitives::hardfork::SpecId,
    DatabaseCommit, Inspector,
};

/// `EthEvm` whose ledger writes only reach the ledger through
/// [`Evm::transact_commit`].
///
/// Every transaction runs inside a ledger snapshot opened before the first
/// frame. [`Evm::transact_commit`] commits it together with the VM state;
/// [`Evm::transact_raw`] and system calls always revert it, so simulated
/// execution leaves the ledger as it found it.
pub struct LedgerEvm<DB: Database, L> {
    inner: EthEvm<DB, LedgerFrameInspector<L>, PrecompilesMap>,
    bridge: SharedBridge<L>,
}

impl<DB: Database, L> fmt::Debug for LedgerEvm<DB, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerEvm").finish_non_exhaustive()
    }
}

impl<DB: Database, L: Ledger> LedgerEvm<DB, L> {
    pub(crate) const fn new(
        inner: EthEvm<DB, LedgerFrameInspector<L>, PrecompilesMap>,
        bridge: SharedBridge<L>,
    ) -> Self {
        Self { inner, bridge }
    }

    /// The shared bridge.
    pub const fn bridge(&self) -> &SharedBridge<L> {
        &self.bridge
    }

    /// Consumes the wrapper, returning the inner EVM.
    pub fn into_inner(self) -> EthEvm<DB, LedgerFrameInspector<L>, PrecompilesMap> {
        self.inner
    }

    /// Runs `tx` inside a fresh ledger snapshot, leaving the snapshot open.
    fn execute(
        &mut self,
        tx: TxEnv,
    ) -> (SnapshotId, Result<ResultAndState<HaltReason>, EVMError<DB::Error>>) {
        let id = self.bridge.lock().context_mut().snapshot();
        let result = self.inner.transact_raw(tx);
        self.inner.inspector_mut().unwind();
        (id, result)
    }

    fn settle(&self, id: SnapshotId, commit: bool) {
        let mut bridge = self.bridge.lock();
        if commit {
            bridge.context_mut().commit_snapshot(id);
        } else {
            bridge.context_mut().revert_to_snapshot(id);
        }
        tracing::trace!(target: "ledger_revm::evm", ?id, commit, "transaction snapshot settled");
    }
}

impl<DB, L> Evm for LedgerEvm<DB, L>
where
    DB: Database,
    L: Ledger,
    LedgerFrameInspector<L>: Inspector<EthEvmContext<DB>>,
{
    type DB = DB;
    type Tx = TxEnv;
    type Error = EVMError<DB::Error>;
    type HaltReason = HaltReason;
    type Spec = SpecId;
    type BlockEnv = BlockEnv;
    type Precompiles = PrecompilesMap;
    type Inspector = LedgerFrameInspector<L>;

    fn block(&self) -> &BlockEnv {
        self.inner.block()
    }

    fn chain_id(&self) -> u64 {
        self.inner.chain_id()
    }

    fn transact_raw(
        &mut self,
        tx: Self::Tx,
    ) -> Result<ResultAndState<Self::HaltReason>, Self::Error> {
        let (id, result) = self.execute(tx);
        self.settle(id, false);
        result
    }

    fn transact_commit(
        &mut self,
        tx: impl IntoTxEnv<Self::Tx>,
    ) -> Result<ExecutionResult<Self::HaltReason>, Self::Error>
    where
        Self::DB: DatabaseCommit,
    {
        let (id, result) = self.execute(tx.into_tx_env());
        match result {
            Ok(ResultAndState { result, state }) => {
                self.inner.db_mut().commit(state);
                self.settle(id, true);
                Ok(result)
            }
            Err(err) => {
                self.settle(id, false);
                Err(err)
            }
        }
    }

    fn transact_system_call(
        &mut self,
        caller: Address,
        contract: Address,
        data: Bytes,
    ) -> Result<ResultAndState<Self::HaltReason>, Self::Error> {
        let id = self.bridge.lock().context_mut().snapshot();
        let result = self.inner.transact_system_call(caller, contract, data);
        self.settle(id, false);
        result
    }

    fn finish(self) -> (Self::DB, EvmEnv<Self::Spec>) {
        self.inner.finish()
    }

    /// Frame alignment depends on the inspector, so it stays enabled.
    fn set_inspector_enabled(&mut self, enabled: bool) {
        if !enabled {
            tracing::warn!(target: "ledger_revm::evm", "ignoring request to disable the ledger frame inspector");
        }
    }

    fn components(&self) -> (&Self::DB, &Self::Inspector, &Self::Precompiles) {
        self.inner.components()
    }

    fn components_mut(&mut self) -> (&mut Self::DB, &mut Self::Inspector, &mut Self::Precompiles) {
        self.inner.components_mut()
    }
}
