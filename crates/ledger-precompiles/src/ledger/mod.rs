//! Keeper-style interfaces of the native ledger.
//!
//! The precompiles never keep state of their own: balances, supply,
//! authorization grants and staking positions are read and mutated through
//! these traits. [`MemoryLedger`] is the in-process implementation.

mod memory;

pub use memory::{module_address, CacheMap, MemoryLedger, DEFAULT_UNBONDING_TIME};

use crate::authorization::{Grant, MsgType};
use alloy_primitives::{Address, B256, U256};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Fixed-point scale of commission rates (18 decimals).
pub const COMMISSION_SCALE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Block context the ledger needs for time-dependent operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BlockInfo {
    /// Block height.
    pub height: u64,
    /// Block time in unix seconds.
    pub time: u64,
}

impl BlockInfo {
    /// Creates a block context.
    pub const fn new(height: u64, time: u64) -> Self {
        Self { height, time }
    }
}

/// One unit of a denomination's display metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DenomUnit {
    /// Unit name.
    pub denom: String,
    /// Power of ten relative to the base unit.
    pub exponent: u32,
}

/// Display metadata registered for a denomination.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DenomMetadata {
    /// Base (smallest) denomination.
    pub base: String,
    /// Denomination shown to users; must name one of `denom_units`.
    pub display: String,
    /// Human readable name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// All units of the denomination.
    pub denom_units: Vec<DenomUnit>,
}

/// Origin of a cross-chain voucher denomination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DenomTrace {
    /// Port/channel hops, e.g. `transfer/channel-0`.
    pub path: String,
    /// Denomination on the source chain.
    pub base_denom: String,
}

impl DenomTrace {
    /// Creates a trace.
    pub fn new(path: impl Into<String>, base_denom: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            base_denom: base_denom.into(),
        }
    }

    /// `path/base_denom`, or just the base when there is no path.
    pub fn full_path(&self) -> String {
        if self.path.is_empty() {
            self.base_denom.clone()
        } else {
            format!("{}/{}", self.path, self.base_denom)
        }
    }

    /// sha256 of the full path.
    pub fn hash(&self) -> B256 {
        B256::from_slice(&Sha256::digest(self.full_path().as_bytes()))
    }

    /// The voucher denomination, `ibc/<HASH>`.
    pub fn ibc_denom(&self) -> String {
        format!("ibc/{}", hex::encode_upper(self.hash()))
    }
}

/// Bonding state of a validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BondStatus {
    /// Not in the active set.
    Unbonded,
    /// Leaving the active set.
    Unbonding,
    /// In the active set.
    Bonded,
}

impl BondStatus {
    /// Numeric encoding used on the ABI surface.
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Unbonded => 1,
            Self::Unbonding => 2,
            Self::Bonded => 3,
        }
    }
}

/// Free-form validator description.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatorDescription {
    /// Display name.
    pub moniker: String,
    /// Identity signature (e.g. keybase).
    pub identity: String,
    /// Website.
    pub website: String,
    /// Security contact.
    pub security_contact: String,
    /// Details.
    pub details: String,
}

/// Commission parameters, scaled by [`COMMISSION_SCALE`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommissionRates {
    /// Current rate.
    pub rate: U256,
    /// Upper bound of the rate.
    pub max_rate: U256,
    /// Maximum daily change of the rate.
    pub max_change_rate: U256,
}

impl CommissionRates {
    /// Checks the rate ordering `rate <= max_rate <= 1` and `max_change_rate <= max_rate`.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.max_rate > COMMISSION_SCALE {
            return Err(LedgerError::InvalidCommission("max rate cannot be more than 100%"));
        }
        if self.rate > self.max_rate {
            return Err(LedgerError::InvalidCommission("rate cannot be more than the max rate"));
        }
        if self.max_change_rate > self.max_rate {
            return Err(LedgerError::InvalidCommission(
                "max change rate cannot be more than the max rate",
            ));
        }
        Ok(())
    }
}

/// A validator record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validator {
    /// Operator address.
    pub operator: Address,
    /// Bonding state.
    pub status: BondStatus,
    /// Administratively excluded from the active set.
    pub jailed: bool,
    /// Bonded tokens.
    pub tokens: U256,
    /// Total delegation shares issued.
    pub delegator_shares: U256,
    /// Description.
    pub description: ValidatorDescription,
    /// Commission parameters.
    pub commission: CommissionRates,
    /// Minimum self delegation.
    pub min_self_delegation: U256,
}

impl Validator {
    /// A bonded, unjailed validator with no stake.
    pub fn new(operator: Address) -> Self {
        Self {
            operator,
            status: BondStatus::Bonded,
            jailed: false,
            tokens: U256::ZERO,
            delegator_shares: U256::ZERO,
            description: ValidatorDescription::default(),
            commission: CommissionRates::default(),
            min_self_delegation: U256::ZERO,
        }
    }

    /// Shares issued for a delegation of `amount` tokens.
    pub fn shares_from_tokens(&self, amount: U256) -> U256 {
        if self.tokens.is_zero() || self.delegator_shares.is_zero() {
            amount
        } else {
            amount * self.delegator_shares / self.tokens
        }
    }

    /// Tokens represented by `shares`.
    pub fn tokens_from_shares(&self, shares: U256) -> U256 {
        if self.delegator_shares.is_zero() {
            U256::ZERO
        } else {
            shares * self.tokens / self.delegator_shares
        }
    }
}

/// Parameters of a new validator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewValidator {
    /// Operator address.
    pub operator: Address,
    /// Description.
    pub description: ValidatorDescription,
    /// Commission parameters.
    pub commission: CommissionRates,
    /// Minimum self delegation.
    pub min_self_delegation: U256,
    /// Initial self delegation.
    pub value: U256,
}

/// A delegation record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Delegation {
    /// Delegator.
    pub delegator: Address,
    /// Validator operator.
    pub validator: Address,
    /// Shares held.
    pub shares: U256,
}

/// One pending unbonding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnbondingEntry {
    /// Height at which the unbonding started.
    pub creation_height: u64,
    /// Unix time at which the tokens are released.
    pub completion_time: u64,
    /// Tokens still unbonding.
    pub balance: U256,
}

/// Failures reported by the ledger.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Balance too small.
    #[error("insufficient funds: spendable balance {available}{denom} is smaller than {required}{denom}")]
    InsufficientFunds {
        /// Denomination.
        denom: String,
        /// Spendable balance.
        available: U256,
        /// Requested amount.
        required: U256,
    },
    /// Arithmetic overflow on a balance or supply.
    #[error("balance overflow for {0}")]
    Overflow(String),
    /// No validator with that operator address.
    #[error("validator {0} does not exist")]
    UnknownValidator(Address),
    /// A validator with that operator address already exists.
    #[error("validator {0} already exists")]
    ValidatorExists(Address),
    /// No delegation for the pair.
    #[error("no delegation for delegator {delegator} and validator {validator}")]
    NoDelegation {
        /// Delegator.
        delegator: Address,
        /// Validator.
        validator: Address,
    },
    /// Undelegating more than delegated.
    #[error("invalid shares amount: {requested} exceeds delegation of {available}")]
    InsufficientShares {
        /// Requested shares.
        requested: U256,
        /// Shares held.
        available: U256,
    },
    /// No unbonding entry created at that height.
    #[error("unbonding delegation entry is not found at block height {0}")]
    UnbondingEntryNotFound(u64),
    /// Cancelling more than the entry holds.
    #[error("amount is greater than the unbonding delegation entry balance")]
    UnbondingAmountTooLarge,
    /// Source and destination are the same validator.
    #[error("cannot redelegate to the same validator")]
    SelfRedelegation,
    /// Zero-amount staking operation.
    #[error("invalid delegation amount")]
    InvalidAmount,
    /// Commission parameters out of range.
    #[error("invalid commission: {0}")]
    InvalidCommission(&'static str),
    /// Self delegation below the declared minimum.
    #[error("self delegation {value} is below the minimum self delegation {minimum}")]
    SelfDelegationBelowMinimum {
        /// Initial self delegation.
        value: U256,
        /// Declared minimum.
        minimum: U256,
    },
}

/// Bank module.
pub trait BankKeeper {
    /// Balance of `account` in `denom`.
    fn balance(&self, account: Address, denom: &str) -> U256;

    /// Moves `amount` of `denom` from `from` to `to`.
    fn send_coins(
        &mut self,
        from: Address,
        to: Address,
        denom: &str,
        amount: U256,
    ) -> Result<(), LedgerError>;

    /// Total supply of `denom`.
    fn supply(&self, denom: &str) -> U256;

    /// Registered display metadata of `denom`.
    fn denom_metadata(&self, denom: &str) -> Option<DenomMetadata>;
}

/// Authorization store.
pub trait AuthzKeeper {
    /// Grant stored under `(grantee, granter, msg)`, expired or not.
    fn grant(&self, grantee: Address, granter: Address, msg: MsgType) -> Option<Grant>;

    /// Stores a grant under the message kind of its authorization.
    fn save_grant(&mut self, grantee: Address, granter: Address, grant: Grant);

    /// Deletes a grant. Returns whether one existed.
    fn delete_grant(&mut self, grantee: Address, granter: Address, msg: MsgType) -> bool;
}

/// Staking module.
pub trait StakingKeeper {
    /// Denomination used for bonding.
    fn bond_denom(&self) -> String;

    /// All validators, optionally including jailed ones.
    fn validators(&self, include_jailed: bool) -> Vec<Validator>;

    /// A single validator.
    fn validator(&self, operator: Address) -> Option<Validator>;

    /// A delegation.
    fn delegation(&self, delegator: Address, validator: Address) -> Option<Delegation>;

    /// Bonds `amount` to `validator`, returning the shares issued.
    fn delegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: U256,
    ) -> Result<U256, LedgerError>;

    /// Starts unbonding `amount`, returning the completion time.
    fn undelegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: U256,
        block: BlockInfo,
    ) -> Result<u64, LedgerError>;

    /// Moves `amount` between validators, returning the completion time.
    fn redelegate(
        &mut self,
        delegator: Address,
        src: Address,
        dst: Address,
        amount: U256,
        block: BlockInfo,
    ) -> Result<u64, LedgerError>;

    /// Returns `amount` of the unbonding entry created at `creation_height` to the validator.
    fn cancel_unbonding(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: U256,
        creation_height: u64,
    ) -> Result<(), LedgerError>;

    /// Registers a validator and bonds its self delegation.
    fn create_validator(&mut self, validator: NewValidator) -> Result<(), LedgerError>;
}

/// Cross-chain transfer module.
pub trait TransferKeeper {
    /// Trace of a voucher denomination hash.
    fn denom_trace(&self, hash: B256) -> Option<DenomTrace>;
}

/// A checkpoint returned by [`CacheContext::checkpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerCheckpoint {
    depth: usize,
}

impl LedgerCheckpoint {
    /// A checkpoint taken when `depth` layers were open.
    pub const fn new(depth: usize) -> Self {
        Self { depth }
    }

    /// Number of layers open before the checkpoint.
    pub const fn depth(&self) -> usize {
        self.depth
    }
}

/// Layered mutation cache of the ledger.
///
/// Every mutation lands in the newest layer. Committing a checkpoint merges
/// all layers above it into the parent; reverting drops them.
pub trait CacheContext {
    /// Opens a new layer.
    fn checkpoint(&mut self) -> LedgerCheckpoint;

    /// Merges every layer opened since `checkpoint` into its parent.
    fn checkpoint_commit(&mut self, checkpoint: LedgerCheckpoint);

    /// Discards every layer opened since `checkpoint`.
    fn checkpoint_revert(&mut self, checkpoint: LedgerCheckpoint);
}

/// Everything the precompiles consume from the ledger.
pub trait Ledger: BankKeeper + AuthzKeeper + StakingKeeper + TransferKeeper + CacheContext {}

impl<T> Ledger for T where T: BankKeeper + AuthzKeeper + StakingKeeper + TransferKeeper + CacheContext
{}
