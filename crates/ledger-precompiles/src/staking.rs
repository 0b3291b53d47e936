//! Staking precompile with ERC-20 style allowances.
//!
//! Allowances are stake authorizations keyed by `(grantee, granter, msg)`.
//! The validator allow-list of a grant is fixed when it is approved: every
//! validator that is not jailed at that moment, whatever its bond status.
//! Jailing a validator later does not remove it from existing grants.
//!
//! Delegation methods act on behalf of the transaction origin. When a
//! contract sits between the origin and the precompile, the contract must
//! hold a grant from the origin, which the operation consumes.

use crate::{
    abi::{
        decode_strict,
        IStaking::{self, IStakingCalls},
    },
    authorization::{Accepted, Authorization, AuthorizationError, Grant, MsgType, SpendLimit},
    call::CallContext,
    config::BridgeConfig,
    dispatch::{Handler, Method},
    error::PrecompileFailure,
    ledger::{CommissionRates, Ledger, NewValidator, ValidatorDescription},
};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, SolValue};
use std::collections::BTreeSet;

/// Parses the staking message kinds named by an allowance call.
///
/// Duplicates are dropped, keeping the first occurrence.
pub fn parse_methods(methods: &[String]) -> Result<Vec<MsgType>, PrecompileFailure> {
    if methods.is_empty() {
        return Err(PrecompileFailure::InvalidArgument(
            "at least one staking method is required".to_string(),
        ));
    }
    let mut parsed = Vec::with_capacity(methods.len());
    for method in methods {
        let msg = parse_method(method)?;
        if !parsed.contains(&msg) {
            parsed.push(msg);
        }
    }
    Ok(parsed)
}

fn parse_method(method: &str) -> Result<MsgType, PrecompileFailure> {
    let msg: MsgType = method.parse()?;
    if !msg.is_staking() {
        return Err(AuthorizationError::InvalidMsgType(method.to_string()).into());
    }
    Ok(msg)
}

fn type_urls(msgs: &[MsgType]) -> Vec<String> {
    msgs.iter().map(|msg| msg.type_url().to_string()).collect()
}

impl From<IStaking::Description> for ValidatorDescription {
    fn from(description: IStaking::Description) -> Self {
        Self {
            moniker: description.moniker,
            identity: description.identity,
            website: description.website,
            security_contact: description.securityContact,
            details: description.details,
        }
    }
}

impl From<IStaking::CommissionRates> for CommissionRates {
    fn from(rates: IStaking::CommissionRates) -> Self {
        Self {
            rate: rates.rate,
            max_rate: rates.maxRate,
            max_change_rate: rates.maxChangeRate,
        }
    }
}

/// The staking precompile.
#[derive(Clone, Copy, Debug)]
pub struct StakingPrecompile<'a> {
    config: &'a BridgeConfig,
}

impl<'a> StakingPrecompile<'a> {
    /// A staking precompile using `config` for approval lifetimes.
    pub const fn new(config: &'a BridgeConfig) -> Self {
        Self { config }
    }

    fn approve<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        spender: Address,
        amount: U256,
        methods: &[String],
    ) -> Result<(), PrecompileFailure> {
        if spender.is_zero() {
            return Err(PrecompileFailure::ZeroAddress("spender"));
        }
        let granter = ctx.caller;
        let msgs = parse_methods(methods)?;

        if amount.is_zero() {
            for &msg in &msgs {
                ctx.delete_grant(spender, granter, msg)?;
            }
        } else {
            let allow_list: BTreeSet<Address> = ctx
                .validators(false)?
                .into_iter()
                .map(|validator| validator.operator)
                .collect();
            let expiration = ctx
                .block()
                .time
                .saturating_add(self.config.approval_expiration_secs);
            for &msg in &msgs {
                let authorization = Authorization::Stake {
                    msg,
                    max_tokens: SpendLimit::from_amount(amount),
                    allow_list: allow_list.clone(),
                };
                ctx.save_grant(spender, granter, Grant::new(authorization, Some(expiration)))?;
            }
        }

        ctx.emit(&IStaking::Approval {
            grantee: spender,
            granter,
            methods: type_urls(&msgs),
            value: amount,
        });
        tracing::debug!(target: "ledger_precompiles::staking", ?granter, grantee = ?spender, %amount, ?msgs, "approve");
        Ok(())
    }

    /// Applies `update` to the limit of every named grant and emits the new limits.
    fn change_allowance<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        spender: Address,
        methods: &[String],
        update: impl Fn(U256) -> Result<U256, PrecompileFailure>,
    ) -> Result<(), PrecompileFailure> {
        let granter = ctx.caller;
        let msgs = parse_methods(methods)?;

        let mut values = Vec::with_capacity(msgs.len());
        for &msg in &msgs {
            let grant = ctx
                .grant(spender, granter, msg)?
                .ok_or(AuthorizationError::NotFound { msg, grantee: spender })?;
            let Authorization::Stake {
                max_tokens,
                allow_list,
                ..
            } = grant.authorization
            else {
                return Err(AuthorizationError::UnknownType(msg).into());
            };

            let limit = match max_tokens {
                SpendLimit::Unlimited => SpendLimit::Unlimited,
                SpendLimit::Bounded(limit) => {
                    let limit = SpendLimit::from_amount(update(limit)?);
                    let authorization = Authorization::Stake {
                        msg,
                        max_tokens: limit,
                        allow_list,
                    };
                    ctx.save_grant(spender, granter, Grant::new(authorization, grant.expiration))?;
                    limit
                }
            };
            values.push(limit.to_amount());
        }

        tracing::debug!(target: "ledger_precompiles::staking", ?granter, grantee = ?spender, ?values, "allowance changed");
        ctx.emit(&IStaking::AllowanceChange {
            grantee: spender,
            granter,
            methods: type_urls(&msgs),
            values,
        });
        Ok(())
    }

    fn revoke<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        spender: Address,
        methods: &[String],
    ) -> Result<(), PrecompileFailure> {
        let granter = ctx.caller;
        let msgs = parse_methods(methods)?;
        for &msg in &msgs {
            if !ctx.delete_grant(spender, granter, msg)? {
                return Err(AuthorizationError::NotFound { msg, grantee: spender }.into());
            }
        }
        ctx.emit(&IStaking::Revocation {
            grantee: spender,
            granter,
            methods: type_urls(&msgs),
        });
        Ok(())
    }

    fn allowance<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        grantee: Address,
        granter: Address,
        method: &str,
    ) -> Result<U256, PrecompileFailure> {
        let msg = parse_method(method)?;
        match ctx.grant(grantee, granter, msg)? {
            None => Ok(U256::ZERO),
            Some(Grant {
                authorization: Authorization::Stake { max_tokens, .. },
                ..
            }) => Ok(max_tokens.to_amount()),
            Some(_) => Err(AuthorizationError::UnknownType(msg).into()),
        }
    }

    /// Checks that `delegator` is the origin and charges the caller's grant
    /// when a contract acts for it.
    fn authorize<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        msg: MsgType,
        delegator: Address,
        validator: Address,
        amount: U256,
    ) -> Result<(), PrecompileFailure> {
        if delegator != ctx.origin {
            return Err(PrecompileFailure::OriginMismatch {
                role: "delegator",
                address: delegator,
                origin: ctx.origin,
            });
        }
        if ctx.caller == ctx.origin {
            return Ok(());
        }

        let (grantee, granter) = (ctx.caller, ctx.origin);
        let grant = ctx
            .grant(grantee, granter, msg)?
            .ok_or(AuthorizationError::NotFound { msg, grantee })?;
        match grant.authorization.accept_stake(validator, amount)? {
            Accepted::Keep => {}
            Accepted::Update(authorization) => {
                ctx.save_grant(grantee, granter, Grant::new(authorization, grant.expiration))?;
            }
            Accepted::Delete => {
                ctx.delete_grant(grantee, granter, msg)?;
            }
        }
        tracing::debug!(target: "ledger_precompiles::staking", ?grantee, ?granter, %msg, %amount, "grant consumed");
        Ok(())
    }

    fn create_validator<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        call: IStaking::createValidatorCall,
    ) -> Result<(), PrecompileFailure> {
        if ctx.caller != ctx.origin {
            return Err(PrecompileFailure::ContractCaller("createValidator"));
        }
        if call.validatorAddress != ctx.origin {
            return Err(PrecompileFailure::OriginMismatch {
                role: "validator",
                address: call.validatorAddress,
                origin: ctx.origin,
            });
        }
        if call.pubkey.is_empty() {
            return Err(PrecompileFailure::InvalidArgument(
                "validator pubkey cannot be empty".to_string(),
            ));
        }

        let operator = call.validatorAddress;
        ctx.create_validator(NewValidator {
            operator,
            description: call.description.into(),
            commission: call.commissionRates.into(),
            min_self_delegation: call.minSelfDelegation,
            value: call.value,
        })?;
        ctx.emit(&IStaking::CreateValidator {
            validatorAddress: operator,
            value: call.value,
        });
        tracing::debug!(target: "ledger_precompiles::staking", ?operator, value = %call.value, "validator created");
        Ok(())
    }
}

impl Handler for StakingPrecompile<'_> {
    type Call = IStakingCalls;

    fn decode(&self, input: &[u8]) -> Result<Self::Call, PrecompileFailure> {
        decode_strict(input)
    }

    fn method(&self, call: &Self::Call) -> Method {
        match call {
            IStakingCalls::approve(_) => Method::transaction("approve"),
            IStakingCalls::increaseAllowance(_) => Method::transaction("increaseAllowance"),
            IStakingCalls::decreaseAllowance(_) => Method::transaction("decreaseAllowance"),
            IStakingCalls::revoke(_) => Method::transaction("revoke"),
            IStakingCalls::allowance(_) => Method::query("allowance"),
            IStakingCalls::createValidator(_) => Method::transaction("createValidator"),
            IStakingCalls::delegate(_) => Method::transaction("delegate"),
            IStakingCalls::undelegate(_) => Method::transaction("undelegate"),
            IStakingCalls::redelegate(_) => Method::transaction("redelegate"),
            IStakingCalls::cancelUnbondingDelegation(_) => {
                Method::transaction("cancelUnbondingDelegation")
            }
            IStakingCalls::delegation(_) => Method::query("delegation"),
            IStakingCalls::validator(_) => Method::query("validator"),
        }
    }

    fn execute<L: Ledger>(
        &self,
        ctx: &mut CallContext<'_, L>,
        call: Self::Call,
    ) -> Result<Bytes, PrecompileFailure> {
        let output = match call {
            IStakingCalls::approve(call) => {
                self.approve(ctx, call.spender, call.amount, &call.methods)?;
                true.abi_encode()
            }
            IStakingCalls::increaseAllowance(call) => {
                let added = call.amount;
                self.change_allowance(ctx, call.spender, &call.methods, |limit| {
                    limit.checked_add(added).ok_or_else(|| {
                        PrecompileFailure::InvalidArgument("allowance overflows uint256".to_string())
                    })
                })?;
                true.abi_encode()
            }
            IStakingCalls::decreaseAllowance(call) => {
                let subtracted = call.amount;
                self.change_allowance(ctx, call.spender, &call.methods, |limit| {
                    limit.checked_sub(subtracted).ok_or_else(|| {
                        AuthorizationError::DecreaseExceedsLimit {
                            amount: subtracted,
                            limit,
                        }
                        .into()
                    })
                })?;
                true.abi_encode()
            }
            IStakingCalls::revoke(call) => {
                self.revoke(ctx, call.spender, &call.methods)?;
                true.abi_encode()
            }
            IStakingCalls::allowance(call) => self
                .allowance(ctx, call.grantee, call.granter, &call.method)?
                .abi_encode(),
            IStakingCalls::createValidator(call) => {
                self.create_validator(ctx, call)?;
                true.abi_encode()
            }
            IStakingCalls::delegate(call) => {
                let (delegator, validator) = (call.delegatorAddress, call.validatorAddress);
                self.authorize(ctx, MsgType::Delegate, delegator, validator, call.amount)?;
                let shares = ctx.delegate(delegator, validator, call.amount)?;
                ctx.emit(&IStaking::Delegate {
                    delegatorAddress: delegator,
                    validatorAddress: validator,
                    amount: call.amount,
                    newShares: shares,
                });
                true.abi_encode()
            }
            IStakingCalls::undelegate(call) => {
                let (delegator, validator) = (call.delegatorAddress, call.validatorAddress);
                self.authorize(ctx, MsgType::Undelegate, delegator, validator, call.amount)?;
                let completion = ctx.undelegate(delegator, validator, call.amount)?;
                ctx.emit(&IStaking::Unbond {
                    delegatorAddress: delegator,
                    validatorAddress: validator,
                    amount: call.amount,
                    completionTime: U256::from(completion),
                });
                i64::try_from(completion).unwrap_or(i64::MAX).abi_encode()
            }
            IStakingCalls::redelegate(call) => {
                let delegator = call.delegatorAddress;
                let (src, dst) = (call.validatorSrcAddress, call.validatorDstAddress);
                self.authorize(ctx, MsgType::Redelegate, delegator, dst, call.amount)?;
                let completion = ctx.redelegate(delegator, src, dst, call.amount)?;
                ctx.emit(&IStaking::Redelegate {
                    delegatorAddress: delegator,
                    validatorSrcAddress: src,
                    validatorDstAddress: dst,
                    amount: call.amount,
                    completionTime: U256::from(completion),
                });
                i64::try_from(completion).unwrap_or(i64::MAX).abi_encode()
            }
            IStakingCalls::cancelUnbondingDelegation(call) => {
                let (delegator, validator) = (call.delegatorAddress, call.validatorAddress);
                let height = u64::try_from(call.creationHeight).map_err(|_| {
                    PrecompileFailure::InvalidArgument(format!(
                        "creation height {} does not fit in 64 bits",
                        call.creationHeight
                    ))
                })?;
                self.authorize(
                    ctx,
                    MsgType::CancelUnbondingDelegation,
                    delegator,
                    validator,
                    call.amount,
                )?;
                ctx.cancel_unbonding(delegator, validator, call.amount, height)?;
                ctx.emit(&IStaking::CancelUnbondingDelegation {
                    delegatorAddress: delegator,
                    validatorAddress: validator,
                    amount: call.amount,
                    creationHeight: call.creationHeight,
                });
                true.abi_encode()
            }
            IStakingCalls::delegation(call) => {
                let (delegator, operator) = (call.delegatorAddress, call.validatorAddress);
                let shares = ctx
                    .delegation(delegator, operator)?
                    .map_or(U256::ZERO, |delegation| delegation.shares);
                let balance = ctx
                    .validator(operator)?
                    .map_or(U256::ZERO, |validator| validator.tokens_from_shares(shares));
                (shares, balance).abi_encode_params()
            }
            IStakingCalls::validator(call) => {
                let ret = match ctx.validator(call.validatorAddress)? {
                    Some(validator) => IStaking::validatorReturn {
                        jailed: validator.jailed,
                        status: validator.status.as_u8(),
                        tokens: validator.tokens,
                        delegatorShares: validator.delegator_shares,
                    },
                    None => IStaking::validatorReturn {
                        jailed: false,
                        status: 0,
                        tokens: U256::ZERO,
                        delegatorShares: U256::ZERO,
                    },
                };
                IStaking::validatorCall::abi_encode_returns(&ret)
            }
        };
        Ok(output.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        call::PrecompileCall,
        error::FailureKind,
        ledger::{AuthzKeeper, BondStatus, StakingKeeper},
        test_utils::{Fixture, ALICE, BOB, CAROL, GAS, VAL_A, VAL_B, VAL_C},
    };
    use alloy_sol_types::{SolCall, SolEvent};

    fn fixture() -> Fixture {
        let fx = Fixture::new();
        let bond = fx.ledger().bond_denom();
        fx.fund(ALICE, &bond, U256::from(10_000))
            .with_validator(VAL_A)
            .with_validator(VAL_B)
            .with_validator(VAL_C)
    }

    fn methods(msgs: &[MsgType]) -> Vec<String> {
        type_urls(msgs)
    }

    fn staking(fx: &mut Fixture, call: PrecompileCall) -> Result<Bytes, PrecompileFailure> {
        let address = fx.bridge.dispatcher().config().staking_address;
        fx.call_with(address, call)
            .map(|output| output.output)
            .map_err(|revert| revert.failure)
    }

    fn direct<C: SolCall>(fx: &mut Fixture, caller: Address, call: C) -> Result<C::Return, PrecompileFailure> {
        let output = staking(fx, PrecompileCall::new(caller, call.abi_encode(), GAS))?;
        Ok(C::abi_decode_returns(&output).expect("return data decodes"))
    }

    fn approve(fx: &mut Fixture, granter: Address, spender: Address, amount: U256, msgs: &[MsgType]) {
        let call = IStaking::approveCall {
            spender,
            amount,
            methods: methods(msgs),
        };
        assert!(direct(fx, granter, call).unwrap());
    }

    fn allowance(fx: &mut Fixture, grantee: Address, granter: Address, msg: MsgType) -> U256 {
        let call = IStaking::allowanceCall {
            grantee,
            granter,
            method: msg.type_url().to_string(),
        };
        direct(fx, CAROL, call).unwrap()
    }

    fn allow_list(fx: &Fixture, grantee: Address, granter: Address) -> BTreeSet<Address> {
        let grants = fx.ledger().grants();
        let (_, _, grant) = grants
            .iter()
            .find(|(e, r, _)| (*e, *r) == (grantee, granter))
            .expect("grant stored");
        match &grant.authorization {
            Authorization::Stake { allow_list, .. } => allow_list.clone(),
            other => panic!("expected stake authorization, got {other:?}"),
        }
    }

    fn one_ether() -> U256 {
        U256::from(1_000_000_000_000_000_000u64)
    }

    // === Test: approvals ===

    #[test]
    fn allow_list_excludes_only_jailed_validators() {
        let mut fx = fixture();
        fx.ledger_mut().set_jailed(VAL_B, true).unwrap();
        fx.ledger_mut().set_status(VAL_C, BondStatus::Unbonding).unwrap();

        approve(&mut fx, ALICE, BOB, U256::from(100), &[MsgType::Delegate]);
        assert_eq!(allow_list(&fx, BOB, ALICE), BTreeSet::from([VAL_A, VAL_C]));
    }

    #[test]
    fn later_jailing_is_not_retroactive() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, U256::from(100), &[MsgType::Delegate]);
        fx.ledger_mut().set_jailed(VAL_A, true).unwrap();
        assert!(allow_list(&fx, BOB, ALICE).contains(&VAL_A));
    }

    #[test]
    fn approval_covers_every_named_method() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, U256::from(5), &MsgType::STAKING);
        for msg in MsgType::STAKING {
            assert_eq!(allowance(&mut fx, BOB, ALICE, msg), U256::from(5));
        }

        let log = &fx.bridge.context().logs()[0].log;
        let event = IStaking::Approval::decode_log_data(&log.data).unwrap();
        assert_eq!(event.methods, methods(&MsgType::STAKING));
        assert_eq!(event.value, U256::from(5));
    }

    #[test]
    fn max_approval_is_unlimited() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, U256::MAX, &[MsgType::Delegate]);
        let (_, _, grant) = fx.ledger().grants().into_iter().next().unwrap();
        match grant.authorization {
            Authorization::Stake { max_tokens, .. } => assert!(max_tokens.is_unlimited()),
            other => panic!("expected stake authorization, got {other:?}"),
        }
        assert_eq!(allowance(&mut fx, BOB, ALICE, MsgType::Delegate), U256::MAX);
    }

    #[test]
    fn approve_zero_deletes_grant() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, U256::from(5), &[MsgType::Delegate]);
        approve(&mut fx, ALICE, BOB, U256::ZERO, &[MsgType::Delegate]);
        assert!(fx.ledger().grants().is_empty());
    }

    #[test]
    fn approval_expires() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, U256::from(5), &[MsgType::Delegate]);
        let lifetime = fx.bridge.dispatcher().config().approval_expiration_secs;
        fx.advance_time(lifetime);
        assert_eq!(allowance(&mut fx, BOB, ALICE, MsgType::Delegate), U256::from(5));
        fx.advance_time(1);
        assert_eq!(allowance(&mut fx, BOB, ALICE, MsgType::Delegate), U256::ZERO);
    }

    #[test]
    fn invalid_method_names_are_rejected() {
        let mut fx = fixture();
        let call = IStaking::approveCall {
            spender: BOB,
            amount: U256::from(1),
            methods: vec!["/cosmos.staking.v1beta1.MsgFoo".to_string()],
        };
        match direct(&mut fx, ALICE, call) {
            Err(PrecompileFailure::Authorization(AuthorizationError::InvalidMsgType(msg))) => {
                assert_eq!(msg, "/cosmos.staking.v1beta1.MsgFoo")
            }
            other => panic!("expected invalid message type, got {other:?}"),
        }

        let call = IStaking::approveCall {
            spender: BOB,
            amount: U256::from(1),
            methods: vec![MsgType::Send.type_url().to_string()],
        };
        assert!(matches!(
            direct(&mut fx, ALICE, call),
            Err(PrecompileFailure::Authorization(AuthorizationError::InvalidMsgType(_)))
        ));
        assert!(fx.ledger().grants().is_empty());
    }

    // === Test: allowance changes ===

    #[test]
    fn decrease_to_zero_keeps_grant() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, one_ether(), &[MsgType::Delegate]);
        let call = IStaking::decreaseAllowanceCall {
            spender: BOB,
            amount: one_ether(),
            methods: methods(&[MsgType::Delegate]),
        };
        assert!(direct(&mut fx, ALICE, call).unwrap());

        assert_eq!(allowance(&mut fx, BOB, ALICE, MsgType::Delegate), U256::ZERO);
        let grant = fx.ledger().grant(BOB, ALICE, MsgType::Delegate).expect("grant present");
        match grant.authorization {
            Authorization::Stake { max_tokens, .. } => {
                assert_eq!(max_tokens, SpendLimit::Bounded(U256::ZERO))
            }
            other => panic!("expected stake authorization, got {other:?}"),
        }
    }

    #[test]
    fn decrease_above_limit_fails_and_keeps_grant() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, U256::from(10), &[MsgType::Delegate, MsgType::Undelegate]);
        let before = fx.ledger().grants();

        let call = IStaking::decreaseAllowanceCall {
            spender: BOB,
            amount: U256::from(11),
            methods: methods(&[MsgType::Delegate, MsgType::Undelegate]),
        };
        match direct(&mut fx, ALICE, call) {
            Err(failure @ PrecompileFailure::Authorization(AuthorizationError::DecreaseExceedsLimit { .. })) => {
                assert_eq!(failure.kind(), FailureKind::Authorization)
            }
            other => panic!("expected decrease failure, got {other:?}"),
        }
        assert_eq!(fx.ledger().grants(), before);
    }

    #[test]
    fn increase_reports_new_limits() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, U256::from(10), &[MsgType::Delegate]);
        approve(&mut fx, ALICE, BOB, U256::MAX, &[MsgType::Undelegate]);
        fx.bridge.context_mut().take_logs();

        let call = IStaking::increaseAllowanceCall {
            spender: BOB,
            amount: U256::from(5),
            methods: methods(&[MsgType::Delegate, MsgType::Undelegate]),
        };
        assert!(direct(&mut fx, ALICE, call).unwrap());
        assert_eq!(allowance(&mut fx, BOB, ALICE, MsgType::Delegate), U256::from(15));
        assert_eq!(allowance(&mut fx, BOB, ALICE, MsgType::Undelegate), U256::MAX);

        let log = &fx.bridge.context().logs()[0].log;
        let event = IStaking::AllowanceChange::decode_log_data(&log.data).unwrap();
        assert_eq!(event.values, vec![U256::from(15), U256::MAX]);
    }

    #[test]
    fn change_requires_existing_grant() {
        let mut fx = fixture();
        let call = IStaking::increaseAllowanceCall {
            spender: BOB,
            amount: U256::from(5),
            methods: methods(&[MsgType::Redelegate]),
        };
        assert!(matches!(
            direct(&mut fx, ALICE, call),
            Err(PrecompileFailure::Authorization(AuthorizationError::NotFound { .. }))
        ));
    }

    #[test]
    fn revoke_deletes_and_rejects_missing() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, U256::from(10), &[MsgType::Delegate]);
        let call = IStaking::revokeCall {
            spender: BOB,
            methods: methods(&[MsgType::Delegate]),
        };
        assert!(direct(&mut fx, ALICE, call.clone()).unwrap());
        assert!(fx.ledger().grants().is_empty());

        match direct(&mut fx, ALICE, call) {
            Err(PrecompileFailure::Authorization(AuthorizationError::NotFound { msg, grantee })) => {
                assert_eq!((msg, grantee), (MsgType::Delegate, BOB))
            }
            other => panic!("expected missing grant, got {other:?}"),
        }
    }

    // === Test: delegation ===

    #[test]
    fn direct_delegation_needs_no_grant() {
        let mut fx = fixture();
        let call = IStaking::delegateCall {
            delegatorAddress: ALICE,
            validatorAddress: VAL_A,
            amount: U256::from(1_000),
        };
        assert!(direct(&mut fx, ALICE, call).unwrap());

        let (shares, balance) = {
            let call = IStaking::delegationCall {
                delegatorAddress: ALICE,
                validatorAddress: VAL_A,
            };
            let output = staking(&mut fx, PrecompileCall::new(BOB, call.abi_encode(), GAS)).unwrap();
            let ret = IStaking::delegationCall::abi_decode_returns(&output).unwrap();
            (ret.shares, ret.balance)
        };
        assert_eq!(shares, U256::from(1_000));
        assert_eq!(balance, U256::from(1_000));
    }

    #[test]
    fn delegator_must_be_origin() {
        let mut fx = fixture();
        let call = IStaking::delegateCall {
            delegatorAddress: BOB,
            validatorAddress: VAL_A,
            amount: U256::from(1),
        };
        assert!(matches!(
            direct(&mut fx, ALICE, call),
            Err(PrecompileFailure::OriginMismatch { role: "delegator", .. })
        ));
    }

    #[test]
    fn contract_delegation_consumes_grant() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, U256::from(300), &[MsgType::Delegate]);

        let data = IStaking::delegateCall {
            delegatorAddress: ALICE,
            validatorAddress: VAL_A,
            amount: U256::from(100),
        }
        .abi_encode();
        staking(&mut fx, PrecompileCall::new(BOB, data.clone(), GAS).with_origin(ALICE)).unwrap();
        assert_eq!(allowance(&mut fx, BOB, ALICE, MsgType::Delegate), U256::from(200));

        let data = IStaking::delegateCall {
            delegatorAddress: ALICE,
            validatorAddress: VAL_A,
            amount: U256::from(200),
        }
        .abi_encode();
        staking(&mut fx, PrecompileCall::new(BOB, data.clone(), GAS).with_origin(ALICE)).unwrap();
        assert!(fx.ledger().grants().is_empty());

        assert!(matches!(
            staking(&mut fx, PrecompileCall::new(BOB, data, GAS).with_origin(ALICE)),
            Err(PrecompileFailure::Authorization(AuthorizationError::NotFound { .. }))
        ));
    }

    #[test]
    fn contract_delegation_checks_allow_list() {
        let mut fx = fixture();
        fx.ledger_mut().set_jailed(VAL_B, true).unwrap();
        approve(&mut fx, ALICE, BOB, U256::from(300), &[MsgType::Delegate]);
        fx.ledger_mut().set_jailed(VAL_B, false).unwrap();

        let data = IStaking::delegateCall {
            delegatorAddress: ALICE,
            validatorAddress: VAL_B,
            amount: U256::from(1),
        }
        .abi_encode();
        assert!(matches!(
            staking(&mut fx, PrecompileCall::new(BOB, data, GAS).with_origin(ALICE)),
            Err(PrecompileFailure::Authorization(AuthorizationError::ValidatorNotAllowed { .. }))
        ));
        assert_eq!(allowance(&mut fx, BOB, ALICE, MsgType::Delegate), U256::from(300));
    }

    #[test]
    fn undelegate_returns_completion_time() {
        let mut fx = fixture();
        direct(&mut fx, ALICE, IStaking::delegateCall {
            delegatorAddress: ALICE,
            validatorAddress: VAL_A,
            amount: U256::from(500),
        })
        .unwrap();

        let now = fx.bridge.context().block().time;
        let completion = direct(&mut fx, ALICE, IStaking::undelegateCall {
            delegatorAddress: ALICE,
            validatorAddress: VAL_A,
            amount: U256::from(200),
        })
        .unwrap();
        assert_eq!(completion, (now + crate::ledger::DEFAULT_UNBONDING_TIME) as i64);

        let height = fx.bridge.context().block().height;
        assert!(direct(&mut fx, ALICE, IStaking::cancelUnbondingDelegationCall {
            delegatorAddress: ALICE,
            validatorAddress: VAL_A,
            amount: U256::from(200),
            creationHeight: U256::from(height),
        })
        .unwrap());
        assert!(fx.ledger().unbonding_entries(ALICE, VAL_A).is_empty());
        let delegation = fx.ledger().delegation(ALICE, VAL_A).unwrap();
        assert_eq!(delegation.shares, U256::from(500));
    }

    #[test]
    fn redelegate_checks_destination() {
        let mut fx = fixture();
        direct(&mut fx, ALICE, IStaking::delegateCall {
            delegatorAddress: ALICE,
            validatorAddress: VAL_A,
            amount: U256::from(500),
        })
        .unwrap();
        fx.ledger_mut().set_jailed(VAL_C, true).unwrap();
        approve(&mut fx, ALICE, BOB, U256::from(500), &[MsgType::Redelegate]);

        let to_c = IStaking::redelegateCall {
            delegatorAddress: ALICE,
            validatorSrcAddress: VAL_A,
            validatorDstAddress: VAL_C,
            amount: U256::from(100),
        };
        assert!(matches!(
            staking(&mut fx, PrecompileCall::new(BOB, to_c.abi_encode(), GAS).with_origin(ALICE)),
            Err(PrecompileFailure::Authorization(AuthorizationError::ValidatorNotAllowed { .. }))
        ));

        let to_b = IStaking::redelegateCall {
            validatorDstAddress: VAL_B,
            ..to_c
        };
        staking(&mut fx, PrecompileCall::new(BOB, to_b.abi_encode(), GAS).with_origin(ALICE)).unwrap();
        assert_eq!(fx.ledger().delegation(ALICE, VAL_B).unwrap().shares, U256::from(100));
        assert_eq!(allowance(&mut fx, BOB, ALICE, MsgType::Redelegate), U256::from(400));
    }

    #[test]
    fn failed_delegation_leaves_no_trace() {
        let mut fx = fixture();
        approve(&mut fx, ALICE, BOB, U256::from(1_000_000), &[MsgType::Delegate]);
        let logs = fx.bridge.context().logs().len();

        let data = IStaking::delegateCall {
            delegatorAddress: ALICE,
            validatorAddress: VAL_A,
            amount: U256::from(20_000),
        }
        .abi_encode();
        let failure =
            staking(&mut fx, PrecompileCall::new(BOB, data, GAS).with_origin(ALICE)).unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Ledger);
        assert_eq!(allowance(&mut fx, BOB, ALICE, MsgType::Delegate), U256::from(1_000_000));
        assert_eq!(fx.bridge.context().logs().len(), logs);
    }

    // === Test: validators ===

    #[test]
    fn create_validator_requires_direct_call() {
        let mut fx = fixture();
        let call = IStaking::createValidatorCall {
            description: IStaking::Description {
                moniker: "node".to_string(),
                identity: String::new(),
                website: String::new(),
                securityContact: String::new(),
                details: String::new(),
            },
            commissionRates: IStaking::CommissionRates {
                rate: U256::from(100_000_000_000_000_000u64),
                maxRate: U256::from(200_000_000_000_000_000u64),
                maxChangeRate: U256::from(10_000_000_000_000_000u64),
            },
            minSelfDelegation: U256::from(1),
            validatorAddress: ALICE,
            pubkey: "pubkey".to_string(),
            value: U256::from(1_000),
        };

        let data = call.abi_encode();
        assert_eq!(
            staking(&mut fx, PrecompileCall::new(BOB, data.clone(), GAS).with_origin(ALICE)),
            Err(PrecompileFailure::ContractCaller("createValidator"))
        );
        assert!(staking(&mut fx, PrecompileCall::new(BOB, data, GAS)).is_err());

        assert!(direct(&mut fx, ALICE, call).unwrap());
        let validator = fx.ledger().validator(ALICE).unwrap();
        assert_eq!(validator.description.moniker, "node");
        assert_eq!(validator.tokens, U256::from(1_000));

        let ret = direct(&mut fx, BOB, IStaking::validatorCall { validatorAddress: ALICE }).unwrap();
        assert!(!ret.jailed);
        assert_eq!(ret.status, BondStatus::Unbonded.as_u8());
        assert_eq!(ret.tokens, U256::from(1_000));
    }

    #[test]
    fn staking_writes_are_rejected_in_static_frames() {
        let mut fx = fixture();
        let data = IStaking::approveCall {
            spender: BOB,
            amount: U256::from(1),
            methods: methods(&[MsgType::Delegate]),
        }
        .abi_encode();
        assert_eq!(
            staking(&mut fx, PrecompileCall::new(ALICE, data, GAS).with_static(true)),
            Err(PrecompileFailure::WriteProtection("approve"))
        );

        let data = IStaking::allowanceCall {
            grantee: BOB,
            granter: ALICE,
            method: MsgType::Delegate.type_url().to_string(),
        }
        .abi_encode();
        assert!(staking(&mut fx, PrecompileCall::new(ALICE, data, GAS).with_static(true)).is_ok());
    }
}
