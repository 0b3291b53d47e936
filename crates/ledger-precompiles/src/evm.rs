//! `alloy-evm` precompile backed by a [`SharedBridge`].

use crate::{
    bridge::SharedBridge,
    call::PrecompileCall,
    error::FailureKind,
    ledger::{BlockInfo, Ledger},
};
use alloy_evm::{
    precompiles::{Precompile, PrecompileInput},
    revm::precompile::{PrecompileError, PrecompileId, PrecompileResult},
};
use alloy_primitives::Bytes;
use revm::precompile::PrecompileOutput;
use std::sync::OnceLock;

/// One precompile instance serves every bridge address; the dispatcher
/// routes on the called code address.
#[derive(Debug)]
pub struct BridgePrecompile<L> {
    bridge: SharedBridge<L>,
}

impl<L> Clone for BridgePrecompile<L> {
    fn clone(&self) -> Self {
        Self {
            bridge: self.bridge.clone(),
        }
    }
}

impl<L> BridgePrecompile<L> {
    /// Wraps a shared bridge.
    pub const fn new(bridge: SharedBridge<L>) -> Self {
        Self { bridge }
    }

    /// The precompile identifier.
    pub fn id() -> &'static PrecompileId {
        static ID: OnceLock<PrecompileId> = OnceLock::new();
        ID.get_or_init(|| PrecompileId::custom("ledger_bridge"))
    }

    /// The shared bridge.
    pub const fn bridge(&self) -> &SharedBridge<L> {
        &self.bridge
    }
}

impl<L: Ledger + Send + 'static> Precompile for BridgePrecompile<L> {
    fn precompile_id(&self) -> &PrecompileId {
        Self::id()
    }

    fn call(&self, mut input: PrecompileInput<'_>) -> PrecompileResult {
        let block = BlockInfo::new(
            input.internals.block_number().saturating_to::<u64>(),
            input.internals.block_timestamp().saturating_to::<u64>(),
        );
        let call = PrecompileCall {
            caller: input.caller,
            origin: input.internals.tx_origin(),
            value: input.value,
            input: Bytes::copy_from_slice(input.data),
            gas_limit: input.gas,
            is_static: input.is_static,
        };

        let mut bridge = self.bridge.lock();
        bridge.context_mut().set_block(block);
        match bridge.call(input.bytecode_address, &call) {
            Ok(output) => {
                // Handed to the VM journal so enclosing frames revert them.
                for entry in bridge.context_mut().take_logs() {
                    input.internals.log(entry.log);
                }
                Ok(PrecompileOutput::new(output.gas_used, output.output))
            }
            Err(revert) if revert.failure.kind() == FailureKind::OutOfGas => {
                Err(PrecompileError::OutOfGas)
            }
            Err(revert) => Ok(PrecompileOutput::new_reverted(revert.gas_used, revert.output())),
        }
    }

    fn is_pure(&self) -> bool {
        false
    }
}
