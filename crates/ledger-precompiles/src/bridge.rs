//! Dispatcher plus execution context: the state one VM instance talks to.

use crate::{
    call::PrecompileCall,
    context::ExecutionContext,
    dispatch::{CallOutput, CallRevert, Dispatcher},
    ledger::{BlockInfo, Ledger},
};
use alloy_primitives::Address;
use parking_lot::Mutex;
use std::sync::Arc;

/// A bridge shared between the VM's precompile table and its inspector.
pub type SharedBridge<L> = Arc<Mutex<LedgerBridge<L>>>;

/// Precompile dispatcher bound to a ledger.
#[derive(Debug)]
pub struct LedgerBridge<L> {
    dispatcher: Dispatcher,
    context: ExecutionContext<L>,
}

impl<L: Ledger> LedgerBridge<L> {
    /// Binds `dispatcher` to `ledger` at `block`.
    pub const fn new(dispatcher: Dispatcher, ledger: L, block: BlockInfo) -> Self {
        Self {
            dispatcher,
            context: ExecutionContext::new(ledger, block),
        }
    }

    /// Wraps the bridge for sharing with a VM.
    pub fn into_shared(self) -> SharedBridge<L> {
        Arc::new(Mutex::new(self))
    }

    /// The dispatcher.
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Mutable dispatcher, e.g. to register or toggle token pairs.
    pub fn dispatcher_mut(&mut self) -> &mut Dispatcher {
        &mut self.dispatcher
    }

    /// The execution context.
    pub const fn context(&self) -> &ExecutionContext<L> {
        &self.context
    }

    /// Mutable execution context.
    pub fn context_mut(&mut self) -> &mut ExecutionContext<L> {
        &mut self.context
    }

    /// Returns true if `address` is served by a bridge precompile.
    pub fn is_precompile(&self, address: Address) -> bool {
        self.dispatcher.is_precompile(address)
    }

    /// Executes `call` against the precompile at `address`.
    pub fn call(&mut self, address: Address, call: &PrecompileCall) -> Result<CallOutput, CallRevert> {
        self.dispatcher.dispatch(address, &mut self.context, call)
    }

    /// Returns the ledger once every snapshot has been released.
    ///
    /// # Panics
    ///
    /// Panics if a snapshot is still open.
    pub fn into_ledger(self) -> L {
        self.context.into_ledger()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        abi::IERC20,
        error::PrecompileFailure,
        ledger::BankKeeper,
        test_utils::{Fixture, ALICE, BOB, GAS},
    };
    use alloy_primitives::U256;
    use alloy_sol_types::SolCall;

    #[test]
    fn unknown_address_is_not_a_precompile() {
        let mut fx = Fixture::new();
        let target = Address::with_last_byte(0x42);
        assert!(!fx.bridge.is_precompile(target));
        let revert = fx
            .bridge
            .call(target, &PrecompileCall::new(ALICE, vec![0u8; 4], GAS))
            .unwrap_err();
        assert_eq!(revert.failure, PrecompileFailure::NotPrecompile(target));
        assert_eq!(revert.gas_used, 0);
    }

    #[test]
    fn ledger_survives_bridge() {
        let mut fx = Fixture::new()
            .with_pair("uatom")
            .fund(ALICE, "uatom", U256::from(9));
        let token = fx.pair_address("uatom");
        fx.call(
            token,
            ALICE,
            IERC20::transferCall {
                to: BOB,
                amount: U256::from(4),
            }
            .abi_encode(),
        )
        .unwrap();

        let ledger = fx.bridge.into_ledger();
        assert_eq!(ledger.balance(BOB, "uatom"), U256::from(4));
    }
}
