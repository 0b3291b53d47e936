//! ERC-20 view of a ledger denomination.
//!
//! Balances and supply are read from the bank keeper on every call; the view
//! holds no state of its own. Allowances are send authorizations keyed by
//! `(spender, owner)` with one spend limit per denomination.

use crate::{
    abi::{
        decode_strict,
        IERC20::{self, IERC20Calls},
    },
    authorization::{Accepted, Authorization, AuthorizationError, Grant, MsgType, SpendLimit},
    call::CallContext,
    config::BridgeConfig,
    dispatch::{Handler, Method},
    error::PrecompileFailure,
    ledger::{DenomMetadata, Ledger},
    token_pair::{TokenPair, IBC_PREFIX},
};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolValue};
use std::collections::BTreeMap;

/// Prefix of micro denominations (6 decimals).
const MICRO_PREFIX: char = 'u';
/// Prefix of atto denominations (18 decimals).
const ATTO_PREFIX: char = 'a';

/// Token description derived from the ledger when no metadata is registered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferredMetadata {
    /// Base denomination: the trace base for vouchers, else the denomination.
    pub base: String,
}

impl InferredMetadata {
    /// Wraps a base denomination, rejecting ones too short to carry a prefix.
    pub fn new(denom: &str, base: impl Into<String>) -> Result<Self, PrecompileFailure> {
        let base = base.into();
        if base.chars().count() < 3 {
            return Err(PrecompileFailure::unsupported_denom(
                denom,
                "invalid base denomination; should be at least length 3",
            ));
        }
        Ok(Self { base })
    }

    /// The base without its decimals prefix.
    pub fn display(&self) -> &str {
        self.base
            .strip_prefix(MICRO_PREFIX)
            .or_else(|| self.base.strip_prefix(ATTO_PREFIX))
            .unwrap_or(&self.base)
    }

    /// Display denomination uppercased.
    pub fn symbol(&self) -> String {
        self.display().to_uppercase()
    }

    /// Display denomination with its first letter uppercased.
    pub fn name(&self) -> String {
        let mut chars = self.display().chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Decimals implied by the base prefix.
    pub fn decimals(&self, denom: &str) -> Result<u8, PrecompileFailure> {
        match self.base.chars().next() {
            Some(MICRO_PREFIX) => Ok(6),
            Some(ATTO_PREFIX) => Ok(18),
            _ => Err(PrecompileFailure::unsupported_denom(
                denom,
                "invalid base denomination; should be either micro ('u[...]') or atto ('a[...]')",
            )),
        }
    }
}

/// Decimals of registered metadata: the exponent of the display unit.
pub fn metadata_decimals(denom: &str, metadata: &DenomMetadata) -> Result<u8, PrecompileFailure> {
    let unit = metadata
        .denom_units
        .iter()
        .rev()
        .find(|unit| unit.denom == metadata.display)
        .ok_or_else(|| {
            PrecompileFailure::unsupported_denom(
                denom,
                format!("display denomination {} not found in metadata", metadata.display),
            )
        })?;
    u8::try_from(unit.exponent)
        .map_err(|_| PrecompileFailure::unsupported_denom(denom, "uint8 overflow: invalid decimals"))
}

#[derive(Debug)]
enum TokenMetadata {
    Registered(DenomMetadata),
    Inferred(InferredMetadata),
}

/// ERC-20 precompile bound to one token pair.
#[derive(Clone, Copy, Debug)]
pub struct Erc20Precompile<'a> {
    pair: &'a TokenPair,
    config: &'a BridgeConfig,
}

impl<'a> Erc20Precompile<'a> {
    /// A view of `pair`.
    pub const fn new(pair: &'a TokenPair, config: &'a BridgeConfig) -> Self {
        Self { pair, config }
    }

    fn denom(&self) -> &'a str {
        &self.pair.denom
    }

    /// Method table entry of an ERC-20 call.
    pub fn method_of(call: &IERC20Calls) -> Method {
        match call {
            IERC20Calls::name(_) => Method::query("name"),
            IERC20Calls::symbol(_) => Method::query("symbol"),
            IERC20Calls::decimals(_) => Method::query("decimals"),
            IERC20Calls::totalSupply(_) => Method::query("totalSupply"),
            IERC20Calls::balanceOf(_) => Method::query("balanceOf"),
            IERC20Calls::allowance(_) => Method::query("allowance"),
            IERC20Calls::transfer(_) => Method::transaction("transfer"),
            IERC20Calls::transferFrom(_) => Method::transaction("transferFrom"),
            IERC20Calls::approve(_) => Method::transaction("approve"),
            IERC20Calls::increaseAllowance(_) => Method::transaction("increaseAllowance"),
            IERC20Calls::decreaseAllowance(_) => Method::transaction("decreaseAllowance"),
        }
    }

    /// Runs a decoded ERC-20 call.
    pub(crate) fn handle<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        call: IERC20Calls,
    ) -> Result<Bytes, PrecompileFailure> {
        let denom = self.denom();
        let output = match call {
            IERC20Calls::name(_) => match self.metadata(ctx)? {
                TokenMetadata::Registered(metadata) => metadata.name,
                TokenMetadata::Inferred(inferred) => inferred.name(),
            }
            .abi_encode(),
            IERC20Calls::symbol(_) => match self.metadata(ctx)? {
                TokenMetadata::Registered(metadata) => metadata.symbol,
                TokenMetadata::Inferred(inferred) => inferred.symbol(),
            }
            .abi_encode(),
            IERC20Calls::decimals(_) => {
                let decimals = match self.metadata(ctx)? {
                    TokenMetadata::Registered(metadata) => metadata_decimals(denom, &metadata)?,
                    TokenMetadata::Inferred(inferred) => inferred.decimals(denom)?,
                };
                IERC20::decimalsCall::abi_encode_returns(&decimals)
            }
            IERC20Calls::totalSupply(_) => ctx.supply(denom)?.abi_encode(),
            IERC20Calls::balanceOf(call) => ctx.balance(call.account, denom)?.abi_encode(),
            IERC20Calls::allowance(call) => {
                let grant = ctx.grant(call.spender, call.owner, MsgType::Send)?;
                self.spend_limit(grant.as_ref())?
                    .map_or(U256::ZERO, SpendLimit::to_amount)
                    .abi_encode()
            }
            IERC20Calls::transfer(call) => {
                let from = ctx.caller;
                self.transfer(ctx, from, call.to, call.amount)?;
                true.abi_encode()
            }
            IERC20Calls::transferFrom(call) => {
                self.transfer_from(ctx, call.from, call.to, call.amount)?;
                true.abi_encode()
            }
            IERC20Calls::approve(call) => {
                self.approve(ctx, call.spender, call.amount)?;
                true.abi_encode()
            }
            IERC20Calls::increaseAllowance(call) => {
                self.increase_allowance(ctx, call.spender, call.addedValue)?;
                true.abi_encode()
            }
            IERC20Calls::decreaseAllowance(call) => {
                self.decrease_allowance(ctx, call.spender, call.subtractedValue)?;
                true.abi_encode()
            }
        };
        Ok(output.into())
    }

    fn metadata<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
    ) -> Result<TokenMetadata, PrecompileFailure> {
        let denom = self.denom();
        if let Some(metadata) = ctx.denom_metadata(denom)? {
            return Ok(TokenMetadata::Registered(metadata));
        }

        let base = match denom.strip_prefix(IBC_PREFIX) {
            Some(hash) => {
                let hash: B256 = hash.parse().map_err(|_| {
                    PrecompileFailure::unsupported_denom(denom, "invalid IBC voucher hash")
                })?;
                ctx.denom_trace(hash)?
                    .ok_or_else(|| {
                        PrecompileFailure::unsupported_denom(denom, "denomination trace not found")
                    })?
                    .base_denom
            }
            None => denom.to_string(),
        };
        InferredMetadata::new(denom, base).map(TokenMetadata::Inferred)
    }

    /// Spend limit of this denomination inside a send grant.
    fn spend_limit(&self, grant: Option<&Grant>) -> Result<Option<SpendLimit>, PrecompileFailure> {
        match grant.map(|grant| &grant.authorization) {
            None => Ok(None),
            Some(Authorization::Send { spend_limits }) => {
                Ok(spend_limits.get(self.denom()).copied())
            }
            Some(other) => Err(AuthorizationError::UnknownType(other.msg_type()).into()),
        }
    }

    /// Writes this denomination's limit into the send grant, deleting the
    /// grant once no denomination has a limit left.
    fn store_spend_limit<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        owner: Address,
        spender: Address,
        existing: Option<Grant>,
        limit: Option<SpendLimit>,
    ) -> Result<(), PrecompileFailure> {
        let (mut spend_limits, expiration) = match existing {
            Some(Grant {
                authorization: Authorization::Send { spend_limits },
                expiration,
            }) => (spend_limits, expiration),
            Some(grant) => {
                return Err(AuthorizationError::UnknownType(grant.authorization.msg_type()).into())
            }
            None => (
                BTreeMap::new(),
                Some(ctx.block().time.saturating_add(self.config.approval_expiration_secs)),
            ),
        };

        match limit {
            Some(limit) => {
                spend_limits.insert(self.denom().to_string(), limit);
            }
            None => {
                spend_limits.remove(self.denom());
            }
        }

        if spend_limits.is_empty() {
            ctx.delete_grant(spender, owner, MsgType::Send)?;
        } else {
            let grant = Grant::new(Authorization::Send { spend_limits }, expiration);
            ctx.save_grant(spender, owner, grant)?;
        }
        Ok(())
    }

    fn transfer<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PrecompileFailure> {
        if to.is_zero() {
            return Err(PrecompileFailure::ZeroAddress("recipient"));
        }
        ctx.send_coins(from, to, self.denom(), amount)?;
        ctx.emit(&IERC20::Transfer {
            from,
            to,
            value: amount,
        });
        tracing::debug!(target: "ledger_precompiles::erc20", denom = self.denom(), ?from, ?to, %amount, "transfer");
        Ok(())
    }

    fn transfer_from<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), PrecompileFailure> {
        let spender = ctx.caller;
        if spender != from {
            let grant = ctx.grant(spender, from, MsgType::Send)?.ok_or(
                AuthorizationError::NotFound {
                    msg: MsgType::Send,
                    grantee: spender,
                },
            )?;
            match grant.authorization.accept_send(self.denom(), amount)? {
                Accepted::Keep => {}
                Accepted::Update(authorization) => {
                    ctx.save_grant(spender, from, Grant::new(authorization, grant.expiration))?;
                }
                Accepted::Delete => {
                    ctx.delete_grant(spender, from, MsgType::Send)?;
                }
            }
        }
        self.transfer(ctx, from, to, amount)
    }

    fn approve<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        spender: Address,
        amount: U256,
    ) -> Result<(), PrecompileFailure> {
        if spender.is_zero() {
            return Err(PrecompileFailure::ZeroAddress("spender"));
        }
        let owner = ctx.caller;
        let existing = ctx.grant(spender, owner, MsgType::Send)?;
        let limit = (!amount.is_zero()).then(|| SpendLimit::from_amount(amount));
        self.store_spend_limit(ctx, owner, spender, existing, limit)?;
        self.emit_approval(ctx, owner, spender, amount);
        Ok(())
    }

    fn increase_allowance<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        spender: Address,
        added: U256,
    ) -> Result<(), PrecompileFailure> {
        if spender.is_zero() {
            return Err(PrecompileFailure::ZeroAddress("spender"));
        }
        let owner = ctx.caller;
        let existing = ctx.grant(spender, owner, MsgType::Send)?;
        let limit = match self.spend_limit(existing.as_ref())? {
            Some(SpendLimit::Unlimited) => SpendLimit::Unlimited,
            Some(SpendLimit::Bounded(current)) => {
                let total = current.checked_add(added).ok_or_else(|| {
                    PrecompileFailure::InvalidArgument("allowance overflows uint256".to_string())
                })?;
                SpendLimit::from_amount(total)
            }
            None => SpendLimit::from_amount(added),
        };
        let allowance = limit.to_amount();
        let limit = (!allowance.is_zero()).then_some(limit);
        self.store_spend_limit(ctx, owner, spender, existing, limit)?;
        self.emit_approval(ctx, owner, spender, allowance);
        Ok(())
    }

    fn decrease_allowance<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        spender: Address,
        subtracted: U256,
    ) -> Result<(), PrecompileFailure> {
        let owner = ctx.caller;
        let existing = ctx.grant(spender, owner, MsgType::Send)?;
        let current = self
            .spend_limit(existing.as_ref())?
            .ok_or_else(|| AuthorizationError::NoAllowanceForDenom(self.denom().to_string()))?;
        let allowance = current.to_amount().checked_sub(subtracted).ok_or(
            AuthorizationError::DecreaseExceedsLimit {
                amount: subtracted,
                limit: current.to_amount(),
            },
        )?;
        let limit = (!allowance.is_zero()).then(|| SpendLimit::from_amount(allowance));
        self.store_spend_limit(ctx, owner, spender, existing, limit)?;
        self.emit_approval(ctx, owner, spender, allowance);
        Ok(())
    }

    fn emit_approval<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        owner: Address,
        spender: Address,
        value: U256,
    ) {
        ctx.emit(&IERC20::Approval {
            owner,
            spender,
            value,
        });
        tracing::debug!(target: "ledger_precompiles::erc20", denom = self.denom(), ?owner, ?spender, %value, "allowance set");
    }
}

impl Handler for Erc20Precompile<'_> {
    type Call = IERC20Calls;

    fn decode(&self, input: &[u8]) -> Result<Self::Call, PrecompileFailure> {
        decode_strict(input)
    }

    fn method(&self, call: &Self::Call) -> Method {
        Self::method_of(call)
    }

    fn execute<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        call: Self::Call,
    ) -> Result<Bytes, PrecompileFailure> {
        self.handle(ctx, call)
    }
}
