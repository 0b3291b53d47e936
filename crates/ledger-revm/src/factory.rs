//! EVM construction with the ledger bridge installed.

use crate::{evm::LedgerEvm, inspector::LedgerFrameInspector};
use alloy_evm::{
    eth::EthEvmFactory,
    precompiles::{DynPrecompile, Precompile, PrecompilesMap},
    Database, Evm, EvmEnv, EvmFactory,
};
use ledger_precompiles::{ledger::Ledger, BridgePrecompile, SharedBridge};
use revm::{context::BlockEnv, primitives::hardfork::SpecId};
use std::sync::Arc;

/// Builds [`LedgerEvm`] instances that route bridge addresses to the ledger.
#[derive(Debug, Clone)]
pub struct LedgerEvmFactory<L> {
    inner: EthEvmFactory,
    bridge: SharedBridge<L>,
}

impl<L: Ledger + Send + 'static> LedgerEvmFactory<L> {
    /// Wraps `inner`, serving precompiles from `bridge`.
    pub const fn new(inner: EthEvmFactory, bridge: SharedBridge<L>) -> Self {
        Self { inner, bridge }
    }

    /// The shared bridge.
    pub const fn bridge(&self) -> &SharedBridge<L> {
        &self.bridge
    }

    /// Maps the staking address and every token pair address to the bridge.
    ///
    /// Disabled pairs are installed too; they keep answering read methods.
    pub fn install_precompiles(&self, precompiles: &mut PrecompilesMap) {
        let addresses = self.bridge.lock().dispatcher().addresses();
        let bridge = Arc::new(BridgePrecompile::new(Arc::clone(&self.bridge)));
        tracing::debug!(target: "ledger_revm::factory", count = addresses.len(), "installing bridge precompiles");

        for address in addresses {
            let bridge = Arc::clone(&bridge);
            let id = BridgePrecompile::<L>::id().clone();
            precompiles.apply_precompile(&address, move |_| {
                Some(DynPrecompile::new_stateful(id, move |input| bridge.call(input)))
            });
        }
    }

    /// Creates an EVM whose frames are mirrored onto the ledger.
    ///
    /// Ledger writes survive only transactions run through
    /// [`Evm::transact_commit`].
    pub fn create_evm<DB: Database>(
        &self,
        db: DB,
        evm_env: EvmEnv<SpecId, BlockEnv>,
    ) -> LedgerEvm<DB, L> {
        let inspector = LedgerFrameInspector::new(Arc::clone(&self.bridge));
        let mut evm = self.inner.create_evm_with_inspector(db, evm_env, inspector);
        self.install_precompiles(evm.precompiles_mut());
        LedgerEvm::new(evm, Arc::clone(&self.bridge))
    }
}
