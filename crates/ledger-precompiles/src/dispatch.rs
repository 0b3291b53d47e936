//! Routing of VM calls to precompile handlers.
//!
//! A call is processed in a fixed order: resolve the target, decode selector
//! and arguments, enforce the call-frame rules (static frames, attached value,
//! disabled pairs), charge the method's required gas, then run the handler
//! inside a nested snapshot of the execution context. A failing handler
//! leaves neither ledger writes nor logs behind.

use crate::{
    call::{CallContext, GasMeter, PrecompileCall},
    config::BridgeConfig,
    context::ExecutionContext,
    erc20::Erc20Precompile,
    error::{FailureKind, PrecompileFailure},
    ledger::Ledger,
    staking::StakingPrecompile,
    token_pair::{TokenPair, TokenPairRegistry},
    werc20::WrappedNativePrecompile,
};
use alloy_primitives::{Address, Bytes};
use std::sync::Arc;

/// Static description of a method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Method {
    /// ABI name.
    pub name: &'static str,
    /// Whether the method changes ledger state or emits events.
    pub mutates: bool,
    /// Whether the method accepts native value.
    pub payable: bool,
    /// Required gas overriding the store schedule.
    pub fixed_gas: Option<u64>,
}

impl Method {
    /// A read-only method.
    pub const fn query(name: &'static str) -> Self {
        Self {
            name,
            mutates: false,
            payable: false,
            fixed_gas: None,
        }
    }

    /// A state-changing method.
    pub const fn transaction(name: &'static str) -> Self {
        Self {
            name,
            mutates: true,
            payable: false,
            fixed_gas: None,
        }
    }

    /// Accepts native value.
    pub const fn payable(mut self) -> Self {
        self.payable = true;
        self
    }

    /// Uses a fixed required gas.
    pub const fn with_fixed_gas(mut self, gas: u64) -> Self {
        self.fixed_gas = Some(gas);
        self
    }
}

/// A precompile's method table and handlers.
pub(crate) trait Handler {
    /// Decoded call: a closed enum of the published methods.
    type Call;

    /// Decodes calldata, routing unknown selectors to a fallback when one exists.
    fn decode(&self, input: &[u8]) -> Result<Self::Call, PrecompileFailure>;

    /// The table entry of a decoded call.
    fn method(&self, call: &Self::Call) -> Method;

    /// Runs the call.
    fn execute<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        call: Self::Call,
    ) -> Result<Bytes, PrecompileFailure>;
}

/// Successful call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallOutput {
    /// ABI-encoded return data.
    pub output: Bytes,
    /// Gas consumed.
    pub gas_used: u64,
}

/// Reverted call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallRevert {
    /// Why the call reverted.
    pub failure: PrecompileFailure,
    /// Gas consumed; the whole limit when the call ran out of gas.
    pub gas_used: u64,
}

impl CallRevert {
    /// Revert data returned to the caller.
    pub fn output(&self) -> Bytes {
        self.failure.revert_data()
    }
}

/// Which precompile serves an address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route<'a> {
    /// Staking authorization precompile.
    Staking,
    /// ERC-20 view of a token pair.
    Erc20(&'a TokenPair),
    /// Wrapped-native shim over the native coin's pair.
    WrappedNative(&'a TokenPair),
}

/// Entry point for calls targeting bridge precompiles.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    config: Arc<BridgeConfig>,
    registry: TokenPairRegistry,
}

impl Dispatcher {
    /// A dispatcher with an empty registry.
    pub fn new(config: Arc<BridgeConfig>) -> Self {
        Self::with_registry(config, TokenPairRegistry::new())
    }

    /// A dispatcher over an existing registry.
    pub const fn with_registry(config: Arc<BridgeConfig>, registry: TokenPairRegistry) -> Self {
        Self { config, registry }
    }

    /// Chain parameters.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Token pairs.
    pub const fn registry(&self) -> &TokenPairRegistry {
        &self.registry
    }

    /// Mutable token pairs.
    pub fn registry_mut(&mut self) -> &mut TokenPairRegistry {
        &mut self.registry
    }

    /// Resolves the precompile serving `address`.
    pub fn route(&self, address: Address) -> Option<Route<'_>> {
        if address == self.config.staking_address {
            return Some(Route::Staking);
        }
        let pair = self.registry.resolve_by_address(address)?;
        Some(if pair.denom == self.config.native_denom {
            Route::WrappedNative(pair)
        } else {
            Route::Erc20(pair)
        })
    }

    /// Returns true if `address` is served by a bridge precompile.
    pub fn is_precompile(&self, address: Address) -> bool {
        self.route(address).is_some()
    }

    /// Every address served: the staking precompile followed by all pairs.
    pub fn addresses(&self) -> Vec<Address> {
        std::iter::once(self.config.staking_address)
            .chain(self.registry.pairs().map(|pair| pair.address))
            .collect()
    }

    /// Executes `call` against the precompile at `address`.
    pub fn dispatch<L: Ledger>(
        &self,
        address: Address,
        context: &mut ExecutionContext<L>,
        call: &PrecompileCall,
    ) -> Result<CallOutput, CallRevert> {
        let mut gas = GasMeter::new(call.gas_limit);
        let result = match self.route(address) {
            None => Err(PrecompileFailure::NotPrecompile(address)),
            Some(Route::Staking) => {
                let handler = StakingPrecompile::new(&self.config);
                self.run(&handler, address, None, context, call, &mut gas)
            }
            Some(Route::Erc20(pair)) => {
                let handler = Erc20Precompile::new(pair, &self.config);
                self.run(&handler, address, Some(pair), context, call, &mut gas)
            }
            Some(Route::WrappedNative(pair)) => {
                let handler = WrappedNativePrecompile::new(pair, &self.config);
                self.run(&handler, address, Some(pair), context, call, &mut gas)
            }
        };

        match result {
            Ok(output) => Ok(CallOutput {
                output,
                gas_used: gas.used(),
            }),
            Err(failure) => {
                let gas_used = if failure.kind() == FailureKind::OutOfGas {
                    gas.limit()
                } else {
                    gas.used()
                };
                tracing::debug!(
                    target: "ledger_precompiles::dispatch",
                    %address,
                    caller = ?call.caller,
                    %failure,
                    "precompile call reverted"
                );
                Err(CallRevert { failure, gas_used })
            }
        }
    }

    fn run<H: Handler, L: Ledger>(
        &self,
        handler: &H,
        address: Address,
        pair: Option<&TokenPair>,
        context: &mut ExecutionContext<L>,
        call: &PrecompileCall,
        gas: &mut GasMeter,
    ) -> Result<Bytes, PrecompileFailure> {
        let decoded = handler.decode(&call.input)?;
        let method = handler.method(&decoded);

        if method.mutates {
            if call.is_static {
                return Err(PrecompileFailure::WriteProtection(method.name));
            }
            if let Some(pair) = pair.filter(|pair| !pair.enabled) {
                return Err(PrecompileFailure::PairDisabled(pair.denom.clone()));
            }
        }
        if !method.payable && !call.value.is_zero() {
            return Err(PrecompileFailure::NonPayable(method.name));
        }

        let args_len = call.input.len().saturating_sub(4);
        let required = method
            .fixed_gas
            .unwrap_or_else(|| self.config.gas.required_gas(method.mutates, args_len));
        gas.consume(required)?;

        tracing::debug!(
            target: "ledger_precompiles::dispatch",
            %address,
            method = method.name,
            caller = ?call.caller,
            required,
            "dispatching precompile call"
        );

        let mut snapshot = context.begin_nested();
        let result = {
            let mut ctx = CallContext::new(&mut snapshot, gas, &self.config.gas, address, call);
            handler.execute(&mut ctx, decoded)
        };
        match result {
            Ok(output) => {
                snapshot.commit();
                Ok(output)
            }
            Err(failure) => {
                snapshot.discard();
                Err(failure)
            }
        }
    }
}
