//! Wrapped-native shim over the native coin's token pair.
//!
//! The native coin and its ERC-20 view share one ledger balance, so wrapping
//! moves nothing: `deposit`, `withdraw` and the fallback only emit events for
//! tooling that expects a WETH-style contract.

use crate::{
    abi::{
        decode_input, Decoded,
        IERC20::IERC20Calls,
        IWERC20::{self, IWERC20Calls},
    },
    call::CallContext,
    config::BridgeConfig,
    dispatch::{Handler, Method},
    erc20::Erc20Precompile,
    error::PrecompileFailure,
    ledger::Ledger,
    token_pair::TokenPair,
};
use alloy_primitives::{Bytes, U256};

/// A decoded call to the wrapped-native precompile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WrappedNativeCall {
    /// Any ERC-20 method.
    Token(IERC20Calls),
    /// `deposit()`.
    Deposit,
    /// `withdraw(wad)`.
    Withdraw(U256),
    /// Empty calldata or an unknown selector; treated as a deposit.
    Fallback,
}

/// ERC-20 view of the native denomination plus the wrapping interface.
#[derive(Clone, Copy, Debug)]
pub struct WrappedNativePrecompile<'a> {
    token: Erc20Precompile<'a>,
    config: &'a BridgeConfig,
}

impl<'a> WrappedNativePrecompile<'a> {
    /// The shim over `pair`.
    pub const fn new(pair: &'a TokenPair, config: &'a BridgeConfig) -> Self {
        Self {
            token: Erc20Precompile::new(pair, config),
            config,
        }
    }
}

impl Handler for WrappedNativePrecompile<'_> {
    type Call = WrappedNativeCall;

    fn decode(&self, input: &[u8]) -> Result<Self::Call, PrecompileFailure> {
        let call = match decode_input::<IWERC20Calls>(input)? {
            Decoded::Call(IWERC20Calls::deposit(_)) => WrappedNativeCall::Deposit,
            Decoded::Call(IWERC20Calls::withdraw(call)) => WrappedNativeCall::Withdraw(call.wad),
            Decoded::Short(_) => WrappedNativeCall::Fallback,
            Decoded::Unknown(_) => match decode_input::<IERC20Calls>(input)? {
                Decoded::Call(call) => WrappedNativeCall::Token(call),
                Decoded::Short(_) | Decoded::Unknown(_) => WrappedNativeCall::Fallback,
            },
        };
        Ok(call)
    }

    fn method(&self, call: &Self::Call) -> Method {
        let gas = &self.config.gas;
        match call {
            WrappedNativeCall::Token(call) => Erc20Precompile::method_of(call),
            WrappedNativeCall::Deposit => Method::transaction("deposit")
                .payable()
                .with_fixed_gas(gas.deposit),
            WrappedNativeCall::Withdraw(_) => {
                Method::transaction("withdraw").with_fixed_gas(gas.withdraw)
            }
            WrappedNativeCall::Fallback => Method::transaction("fallback")
                .payable()
                .with_fixed_gas(gas.deposit),
        }
    }

    fn execute<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        call: Self::Call,
    ) -> Result<Bytes, PrecompileFailure> {
        match call {
            WrappedNativeCall::Token(call) => return self.token.handle(ctx, call),
            WrappedNativeCall::Deposit | WrappedNativeCall::Fallback => {
                let (dst, wad) = (ctx.caller, ctx.value);
                ctx.emit(&IWERC20::Deposit { dst, wad });
            }
            WrappedNativeCall::Withdraw(wad) => {
                let src = ctx.caller;
                ctx.emit(&IWERC20::Withdrawal { src, wad });
            }
        }
        Ok(Bytes::new())
    }
}
