//! # Ledger Bridge Precompiles
//!
//! Precompiled contracts that expose native ledger modules to EVM callers.
//! Native denominations appear as ERC-20 tokens and staking permissions as
//! ERC-20 style allowances, while balances, supply and grants stay in the
//! ledger's own stores.
//!
//! ## Available Precompiles
//!
//! | Address | Name | Description |
//! |---------|------|-------------|
//! | per token pair | [`erc20`] | ERC-20 view of a ledger denomination |
//! | native coin's pair | [`werc20`] | ERC-20 view plus `deposit`/`withdraw` events |
//! | `0x0800` | [`staking`] | Delegation and staking allowances |
//!
//! ## Architecture
//!
//! 1. **Routing**: [`dispatch::Dispatcher`] resolves the called address through
//!    the [`token_pair`] registry and the configured staking address.
//! 2. **Decoding**: each precompile matches calldata against a closed
//!    `sol!` method enum; unknown selectors revert unless a fallback exists.
//! 3. **Atomicity**: handlers run inside a nested snapshot of the
//!    [`context::ExecutionContext`]; a revert drops ledger writes and logs.
//! 4. **Metering**: a per-method required gas plus a charge for every ledger
//!    read and write.
//!
//! ## Integration
//!
//! [`evm::BridgePrecompile`] implements the `alloy-evm` precompile trait over
//! a [`bridge::SharedBridge`]. The `ledger-revm` crate installs it into an
//! `EthEvm` together with the frame inspector that keeps ledger snapshots
//! aligned with the VM's call frames.

pub mod abi;
pub mod authorization;
pub mod bridge;
pub mod call;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod erc20;
pub mod error;
pub mod evm;
pub mod ledger;
pub mod staking;
pub mod token_pair;
pub mod werc20;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use bridge::{LedgerBridge, SharedBridge};
pub use call::PrecompileCall;
pub use config::BridgeConfig;
pub use dispatch::{CallOutput, CallRevert, Dispatcher};
pub use error::PrecompileFailure;
pub use evm::BridgePrecompile;
