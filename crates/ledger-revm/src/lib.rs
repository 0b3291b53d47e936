//! revm integration of the ledger bridge.
//!
//! [`LedgerFrameInspector`] mirrors every VM call frame with a snapshot of the
//! bridge's execution context so a reverted frame also reverts the ledger
//! writes made by precompiles inside it. [`LedgerEvm`] keeps one more snapshot
//! around the whole transaction and commits it only from `transact_commit`.
//! [`LedgerEvmFactory`] builds those EVMs with every bridge address installed.

pub mod evm;
pub mod factory;
pub mod inspector;

pub use evm::LedgerEvm;
pub use factory::LedgerEvmFactory;
pub use inspector::LedgerFrameInspector;
