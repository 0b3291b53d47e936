//! Fixtures for tests of this crate and its dependents.

use crate::{
    bridge::LedgerBridge,
    call::PrecompileCall,
    config::BridgeConfig,
    dispatch::{CallOutput, CallRevert, Dispatcher},
    ledger::{BlockInfo, MemoryLedger, Validator},
    token_pair::OwnerKind,
};
use alloy_primitives::{address, Address, U256};
use std::sync::Arc;

/// Externally owned account.
pub const ALICE: Address = address!("0x00000000000000000000000000000000000a11ce");
/// Externally owned account.
pub const BOB: Address = address!("0x0000000000000000000000000000000000000b0b");
/// Externally owned account.
pub const CAROL: Address = address!("0x00000000000000000000000000000000000ca201");
/// Validator operator.
pub const VAL_A: Address = address!("0x000000000000000000000000000000000000a10a");
/// Validator operator.
pub const VAL_B: Address = address!("0x000000000000000000000000000000000000a10b");
/// Validator operator.
pub const VAL_C: Address = address!("0x000000000000000000000000000000000000a10c");

/// Gas limit used by fixture calls.
pub const GAS: u64 = 1_000_000;
/// Height of the fixture's first block.
pub const START_HEIGHT: u64 = 10;
/// Time of the fixture's first block.
pub const START_TIME: u64 = 1_700_000_000;

/// A bridge over a [`MemoryLedger`] with default configuration.
#[derive(Debug)]
pub struct Fixture {
    /// The bridge under test.
    pub bridge: LedgerBridge<MemoryLedger>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    /// An empty ledger bonding the native denomination.
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    /// An empty ledger under `config`.
    pub fn with_config(config: BridgeConfig) -> Self {
        let ledger = MemoryLedger::new(config.native_denom.clone());
        let dispatcher = Dispatcher::new(Arc::new(config));
        let block = BlockInfo::new(START_HEIGHT, START_TIME);
        Self {
            bridge: LedgerBridge::new(dispatcher, ledger, block),
        }
    }

    /// Registers a module-owned token pair for `denom`.
    pub fn with_pair(mut self, denom: &str) -> Self {
        self.bridge
            .dispatcher_mut()
            .registry_mut()
            .register(denom, OwnerKind::Module)
            .expect("fixture pair registers");
        self
    }

    /// Mints `amount` of `denom` to `account`.
    pub fn fund(mut self, account: Address, denom: &str, amount: U256) -> Self {
        self.ledger_mut()
            .mint(account, denom, amount)
            .expect("fixture mint");
        self
    }

    /// Adds a bonded validator with no stake.
    pub fn with_validator(mut self, operator: Address) -> Self {
        self.ledger_mut().set_validator(Validator::new(operator));
        self
    }

    /// Synthetic address of a registered pair.
    pub fn pair_address(&self, denom: &str) -> Address {
        self.bridge
            .dispatcher()
            .registry()
            .resolve_by_denom(denom)
            .expect("pair registered")
            .address
    }

    /// The ledger.
    pub const fn ledger(&self) -> &MemoryLedger {
        self.bridge.context().ledger()
    }

    /// Mutable ledger.
    pub fn ledger_mut(&mut self) -> &mut MemoryLedger {
        self.bridge.context_mut().ledger_mut()
    }

    /// Moves to the next block, `seconds` later.
    pub fn advance_time(&mut self, seconds: u64) {
        let context = self.bridge.context_mut();
        let block = context.block();
        context.set_block(BlockInfo::new(block.height + 1, block.time + seconds));
    }

    /// Direct call by an externally owned account.
    pub fn call(
        &mut self,
        to: Address,
        caller: Address,
        data: Vec<u8>,
    ) -> Result<CallOutput, CallRevert> {
        self.call_with(to, PrecompileCall::new(caller, data, GAS))
    }

    /// Call with an explicit frame.
    pub fn call_with(&mut self, to: Address, call: PrecompileCall) -> Result<CallOutput, CallRevert> {
        self.bridge.call(to, &call)
    }
}
