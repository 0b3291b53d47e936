//! Failures of a precompile call.

use crate::{authorization::AuthorizationError, ledger::LedgerError, token_pair::RegistryError};
use alloy_primitives::{Address, Bytes, Selector};
use alloy_sol_types::{Revert, SolError};
use thiserror::Error;

/// Coarse class of a [`PrecompileFailure`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// Malformed call: arity, types, denomination shape, addresses, call frame.
    Argument,
    /// Missing, expired, mistyped or exhausted authorization.
    Authorization,
    /// The ledger refused the mutation.
    Ledger,
    /// The call ran out of gas.
    OutOfGas,
}

/// Why a precompile call reverted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrecompileFailure {
    /// No precompile at the target address.
    #[error("no precompile registered at {0}")]
    NotPrecompile(Address),
    /// Input shorter than a selector on a precompile without fallback.
    #[error("invalid input length: expected at least 4 bytes, got {0}")]
    InputTooShort(usize),
    /// Selector not in the method table.
    #[error("no method with id: {0}")]
    UnknownMethod(Selector),
    /// Arguments do not match the method signature.
    #[error("invalid arguments for method {selector}: {reason}")]
    InvalidArguments {
        /// Selector of the method.
        selector: Selector,
        /// Decoder message.
        reason: String,
    },
    /// A mutating method inside a static call.
    #[error("write protection: {0} cannot be called in a static call")]
    WriteProtection(&'static str),
    /// Value attached to a method that does not accept it.
    #[error("method {0} is not payable")]
    NonPayable(&'static str),
    /// Write method on a disabled token pair.
    #[error("token pair for {0} is disabled")]
    PairDisabled(String),
    /// The denomination cannot be described as an ERC-20 token.
    #[error("unsupported denomination {denom}: {reason}")]
    UnsupportedDenom {
        /// Denomination.
        denom: String,
        /// What prevents the inference.
        reason: String,
    },
    /// A required address argument is zero.
    #[error("invalid {0}: zero address")]
    ZeroAddress(&'static str),
    /// An address argument does not match the transaction origin.
    #[error("{role} address {address} does not match the origin address {origin}")]
    OriginMismatch {
        /// Which argument.
        role: &'static str,
        /// Supplied address.
        address: Address,
        /// Transaction origin.
        origin: Address,
    },
    /// A method was called from a contract where only direct calls are allowed.
    #[error("{0} must be called directly by the origin")]
    ContractCaller(&'static str),
    /// Any other invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Authorization failure.
    #[error(transparent)]
    Authorization(#[from] AuthorizationError),
    /// Ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    /// Registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Gas limit exceeded.
    #[error("out of gas: needed {needed}, remaining {remaining}")]
    OutOfGas {
        /// Gas the operation needed.
        needed: u64,
        /// Gas left in the call.
        remaining: u64,
    },
}

impl PrecompileFailure {
    /// The taxonomy class of the failure.
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Authorization(_) => FailureKind::Authorization,
            Self::Ledger(_) => FailureKind::Ledger,
            Self::OutOfGas { .. } => FailureKind::OutOfGas,
            Self::NotPrecompile(_)
            | Self::InputTooShort(_)
            | Self::UnknownMethod(_)
            | Self::InvalidArguments { .. }
            | Self::WriteProtection(_)
            | Self::NonPayable(_)
            | Self::PairDisabled(_)
            | Self::UnsupportedDenom { .. }
            | Self::ZeroAddress(_)
            | Self::OriginMismatch { .. }
            | Self::ContractCaller(_)
            | Self::InvalidArgument(_)
            | Self::Registry(_) => FailureKind::Argument,
        }
    }

    /// Revert data: `Error(string)` with the failure message.
    pub fn revert_data(&self) -> Bytes {
        Revert {
            reason: self.to_string(),
        }
        .abi_encode()
        .into()
    }

    pub(crate) fn unsupported_denom(denom: &str, reason: impl Into<String>) -> Self {
        Self::UnsupportedDenom {
            denom: denom.to_string(),
            reason: reason.into(),
        }
    }
}
