//! Authorization grants shared by the ERC-20 view and the staking precompile.
//!
//! A grant is keyed by `(grantee, granter, msg type)` in the ledger's
//! authorization store. Amount limits are modelled as [`SpendLimit`], where
//! "unlimited" is its own variant and never a large numeric cap.

use alloy_primitives::{Address, U256};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};
use thiserror::Error;

/// Amount bound of an authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpendLimit {
    /// No cap at all.
    Unlimited,
    /// A finite cap, consumed by successful operations.
    Bounded(U256),
}

impl SpendLimit {
    /// Maps an ABI amount to a limit. `U256::MAX` means unlimited.
    pub fn from_amount(amount: U256) -> Self {
        if amount == U256::MAX {
            Self::Unlimited
        } else {
            Self::Bounded(amount)
        }
    }

    /// Maps the limit back onto the ABI surface.
    pub const fn to_amount(self) -> U256 {
        match self {
            Self::Unlimited => U256::MAX,
            Self::Bounded(amount) => amount,
        }
    }

    /// Returns true when the limit has no cap.
    pub const fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }
}

/// Ledger message kinds an authorization can be scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MsgType {
    /// Bank send, used by the ERC-20 allowance.
    Send,
    /// Staking delegation.
    Delegate,
    /// Staking undelegation.
    Undelegate,
    /// Staking redelegation.
    Redelegate,
    /// Cancellation of an unbonding delegation.
    CancelUnbondingDelegation,
}

impl MsgType {
    /// Every staking message kind, in declaration order.
    pub const STAKING: [Self; 4] = [
        Self::Delegate,
        Self::Undelegate,
        Self::Redelegate,
        Self::CancelUnbondingDelegation,
    ];

    /// The ledger type URL of the message.
    pub const fn type_url(self) -> &'static str {
        match self {
            Self::Send => "/cosmos.bank.v1beta1.MsgSend",
            Self::Delegate => "/cosmos.staking.v1beta1.MsgDelegate",
            Self::Undelegate => "/cosmos.staking.v1beta1.MsgUndelegate",
            Self::Redelegate => "/cosmos.staking.v1beta1.MsgBeginRedelegate",
            Self::CancelUnbondingDelegation => {
                "/cosmos.staking.v1beta1.MsgCancelUnbondingDelegation"
            }
        }
    }

    /// Returns true for the staking message kinds.
    pub const fn is_staking(self) -> bool {
        !matches!(self, Self::Send)
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_url())
    }
}

impl FromStr for MsgType {
    type Err = AuthorizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Send]
            .into_iter()
            .chain(Self::STAKING)
            .find(|msg| msg.type_url() == s)
            .ok_or_else(|| AuthorizationError::InvalidMsgType(s.to_string()))
    }
}

/// The payload of a grant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Authorization {
    /// Per-denomination spend limits for bank sends.
    Send {
        /// Limit by denomination.
        spend_limits: BTreeMap<String, SpendLimit>,
    },
    /// Staking permission restricted to a validator allow-list.
    Stake {
        /// The staking message this grant applies to.
        msg: MsgType,
        /// Remaining amount that may be staked on the granter's behalf.
        max_tokens: SpendLimit,
        /// Validators fixed at approval time.
        allow_list: BTreeSet<Address>,
    },
}

/// Result of charging an operation against an authorization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Accepted {
    /// The grant is unchanged (unlimited).
    Keep,
    /// The grant must be stored with its remaining limit.
    Update(Authorization),
    /// The limit is exhausted; the grant must be deleted.
    Delete,
}

impl Authorization {
    /// Builds a send authorization for a single denomination.
    pub fn send(denom: impl Into<String>, limit: SpendLimit) -> Self {
        Self::Send {
            spend_limits: BTreeMap::from([(denom.into(), limit)]),
        }
    }

    /// The message kind this authorization is stored under.
    pub const fn msg_type(&self) -> MsgType {
        match self {
            Self::Send { .. } => MsgType::Send,
            Self::Stake { msg, .. } => *msg,
        }
    }

    /// Charges a bank send of `amount` units of `denom`.
    pub fn accept_send(&self, denom: &str, amount: U256) -> Result<Accepted, AuthorizationError> {
        let Self::Send { spend_limits } = self else {
            return Err(AuthorizationError::UnknownType(self.msg_type()));
        };
        let limit = spend_limits
            .get(denom)
            .copied()
            .ok_or_else(|| AuthorizationError::NoAllowanceForDenom(denom.to_string()))?;

        let remaining = match limit {
            SpendLimit::Unlimited => return Ok(Accepted::Keep),
            SpendLimit::Bounded(limit) => limit
                .checked_sub(amount)
                .ok_or(AuthorizationError::ExceedsLimit { requested: amount, limit })?,
        };

        let mut spend_limits = spend_limits.clone();
        if remaining.is_zero() {
            spend_limits.remove(denom);
            if spend_limits.is_empty() {
                return Ok(Accepted::Delete);
            }
        } else {
            spend_limits.insert(denom.to_string(), SpendLimit::Bounded(remaining));
        }
        Ok(Accepted::Update(Self::Send { spend_limits }))
    }

    /// Charges a staking operation of `amount` against `validator`.
    pub fn accept_stake(
        &self,
        validator: Address,
        amount: U256,
    ) -> Result<Accepted, AuthorizationError> {
        let Self::Stake {
            msg,
            max_tokens,
            allow_list,
        } = self
        else {
            return Err(AuthorizationError::UnknownType(self.msg_type()));
        };

        if !allow_list.contains(&validator) {
            return Err(AuthorizationError::ValidatorNotAllowed {
                msg: *msg,
                validator,
            });
        }

        match *max_tokens {
            SpendLimit::Unlimited => Ok(Accepted::Keep),
            SpendLimit::Bounded(limit) => {
                let remaining = limit
                    .checked_sub(amount)
                    .ok_or(AuthorizationError::ExceedsLimit { requested: amount, limit })?;
                if remaining.is_zero() {
                    return Ok(Accepted::Delete);
                }
                Ok(Accepted::Update(Self::Stake {
                    msg: *msg,
                    max_tokens: SpendLimit::Bounded(remaining),
                    allow_list: allow_list.clone(),
                }))
            }
        }
    }
}

/// A stored authorization with its expiry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grant {
    /// The permission itself.
    pub authorization: Authorization,
    /// Unix time after which the grant no longer applies.
    pub expiration: Option<u64>,
}

impl Grant {
    /// Creates a grant.
    pub const fn new(authorization: Authorization, expiration: Option<u64>) -> Self {
        Self {
            authorization,
            expiration,
        }
    }

    /// An expired grant behaves as if it did not exist.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiration.is_some_and(|expiration| expiration < now)
    }
}

/// Failures while looking up or charging an authorization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthorizationError {
    /// No live grant for the key.
    #[error("authorization to {msg} for address {grantee} does not exist or is expired")]
    NotFound {
        /// Message kind of the missing grant.
        msg: MsgType,
        /// The grantee that was looked up.
        grantee: Address,
    },
    /// The stored grant has a payload the operation cannot interpret.
    #[error("unknown authorization type for {0}")]
    UnknownType(MsgType),
    /// Operation amount is above the remaining limit.
    #[error("requested amount {requested} is more than the authorization limit {limit}")]
    ExceedsLimit {
        /// Amount the operation tried to spend.
        requested: U256,
        /// Remaining limit.
        limit: U256,
    },
    /// `decreaseAllowance` asked for more than the remaining limit.
    #[error(
        "amount by which the allowance should be decreased is greater than the authorization limit: {amount} > {limit}"
    )]
    DecreaseExceedsLimit {
        /// Requested decrease.
        amount: U256,
        /// Remaining limit.
        limit: U256,
    },
    /// The validator is not in the grant's allow-list.
    #[error("cannot use {msg} with validator {validator}: not in the authorization allow list")]
    ValidatorNotAllowed {
        /// Message kind being authorized.
        msg: MsgType,
        /// Rejected validator.
        validator: Address,
    },
    /// A string did not name a known message kind.
    #[error("invalid message type: {0}")]
    InvalidMsgType(String),
    /// A send grant exists but carries no limit for the denomination.
    #[error("no allowance for token {0}")]
    NoAllowanceForDenom(String),
}
