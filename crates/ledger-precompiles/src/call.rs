//! Per-call state handed to precompile handlers.

use crate::{
    authorization::{Grant, MsgType},
    config::GasConfig,
    context::{EventLog, ExecutionContext},
    error::PrecompileFailure,
    ledger::{
        BlockInfo, Delegation, DenomMetadata, DenomTrace, Ledger, NewValidator, Validator,
    },
};
use alloy_primitives::{Address, Bytes, Log, B256, U256};
use alloy_sol_types::SolEvent;

/// A VM call frame targeting a precompile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrecompileCall {
    /// Immediate caller.
    pub caller: Address,
    /// Transaction signer.
    pub origin: Address,
    /// Native value attached to the call.
    pub value: U256,
    /// Calldata.
    pub input: Bytes,
    /// Gas available to the call.
    pub gas_limit: u64,
    /// Whether the frame forbids state changes.
    pub is_static: bool,
}

impl PrecompileCall {
    /// A direct call by an externally owned account.
    pub fn new(caller: Address, input: impl Into<Bytes>, gas_limit: u64) -> Self {
        Self {
            caller,
            origin: caller,
            value: U256::ZERO,
            input: input.into(),
            gas_limit,
            is_static: false,
        }
    }

    /// Sets the transaction origin.
    pub fn with_origin(mut self, origin: Address) -> Self {
        self.origin = origin;
        self
    }

    /// Attaches native value.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Marks the frame as static.
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }
}

/// Gas accounting of one call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    /// A meter allowing `limit` gas.
    pub const fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Gas consumed so far.
    pub const fn used(&self) -> u64 {
        self.used
    }

    /// Gas still available.
    pub const fn remaining(&self) -> u64 {
        self.limit - self.used
    }

    /// Gas limit of the call.
    pub const fn limit(&self) -> u64 {
        self.limit
    }

    /// Consumes `amount`, failing without consuming when it exceeds the remainder.
    pub fn consume(&mut self, amount: u64) -> Result<(), PrecompileFailure> {
        if amount > self.remaining() {
            return Err(PrecompileFailure::OutOfGas {
                needed: amount,
                remaining: self.remaining(),
            });
        }
        self.used += amount;
        Ok(())
    }
}

/// Metered access to the ledger from inside a handler.
///
/// Every ledger access charges the store gas schedule before it runs, so a
/// handler that runs out of gas stops before its next read or write.
#[derive(Debug)]
pub struct CallContext<'a, L: Ledger> {
    context: &'a mut ExecutionContext<L>,
    gas: &'a mut GasMeter,
    schedule: &'a GasConfig,
    /// Precompile address; emitter of the call's logs.
    pub address: Address,
    /// Immediate caller.
    pub caller: Address,
    /// Transaction signer.
    pub origin: Address,
    /// Native value attached to the call.
    pub value: U256,
}

impl<'a, L: Ledger> CallContext<'a, L> {
    pub(crate) fn new(
        context: &'a mut ExecutionContext<L>,
        gas: &'a mut GasMeter,
        schedule: &'a GasConfig,
        address: Address,
        call: &PrecompileCall,
    ) -> Self {
        Self {
            context,
            gas,
            schedule,
            address,
            caller: call.caller,
            origin: call.origin,
            value: call.value,
        }
    }

    /// Current block.
    pub fn block(&self) -> BlockInfo {
        self.context.block()
    }

    fn read(&mut self) -> Result<&L, PrecompileFailure> {
        self.gas.consume(self.schedule.read_cost_flat)?;
        Ok(self.context.ledger())
    }

    fn write(&mut self) -> Result<&mut L, PrecompileFailure> {
        self.gas.consume(self.schedule.write_cost_flat)?;
        Ok(self.context.ledger_mut())
    }

    // === Bank ===

    /// Balance of `account`.
    pub fn balance(&mut self, account: Address, denom: &str) -> Result<U256, PrecompileFailure> {
        Ok(self.read()?.balance(account, denom))
    }

    /// Supply of `denom`.
    pub fn supply(&mut self, denom: &str) -> Result<U256, PrecompileFailure> {
        Ok(self.read()?.supply(denom))
    }

    /// Display metadata of `denom`.
    pub fn denom_metadata(
        &mut self,
        denom: &str,
    ) -> Result<Option<DenomMetadata>, PrecompileFailure> {
        Ok(self.read()?.denom_metadata(denom))
    }

    /// Voucher trace of a hash.
    pub fn denom_trace(&mut self, hash: B256) -> Result<Option<DenomTrace>, PrecompileFailure> {
        Ok(self.read()?.denom_trace(hash))
    }

    /// Moves coins between accounts.
    pub fn send_coins(
        &mut self,
        from: Address,
        to: Address,
        denom: &str,
        amount: U256,
    ) -> Result<(), PrecompileFailure> {
        self.write()?.send_coins(from, to, denom, amount)?;
        Ok(())
    }

    // === Authorization ===

    /// A live grant: missing and expired grants both read as `None`.
    pub fn grant(
        &mut self,
        grantee: Address,
        granter: Address,
        msg: MsgType,
    ) -> Result<Option<Grant>, PrecompileFailure> {
        let now = self.block().time;
        Ok(self
            .read()?
            .grant(grantee, granter, msg)
            .filter(|grant| !grant.is_expired(now)))
    }

    /// Stores a grant.
    pub fn save_grant(
        &mut self,
        grantee: Address,
        granter: Address,
        grant: Grant,
    ) -> Result<(), PrecompileFailure> {
        self.write()?.save_grant(grantee, granter, grant);
        Ok(())
    }

    /// Deletes a grant, returning whether one existed.
    ///
    /// The existence check is charged `has_cost`; the delete itself only runs,
    /// and is only charged, when a grant is stored.
    pub fn delete_grant(
        &mut self,
        grantee: Address,
        granter: Address,
        msg: MsgType,
    ) -> Result<bool, PrecompileFailure> {
        self.gas.consume(self.schedule.has_cost)?;
        if self.context.ledger().grant(grantee, granter, msg).is_none() {
            return Ok(false);
        }
        self.gas.consume(self.schedule.delete_cost)?;
        Ok(self.context.ledger_mut().delete_grant(grantee, granter, msg))
    }

    // === Staking ===

    /// Bond denomination.
    pub fn bond_denom(&mut self) -> Result<String, PrecompileFailure> {
        Ok(self.read()?.bond_denom())
    }

    /// Validators, charging one iteration step per record.
    pub fn validators(&mut self, include_jailed: bool) -> Result<Vec<Validator>, PrecompileFailure> {
        let validators = self.read()?.validators(include_jailed);
        let steps = self
            .schedule
            .iter_next_cost_flat
            .saturating_mul(validators.len() as u64);
        self.gas.consume(steps)?;
        Ok(validators)
    }

    /// A validator.
    pub fn validator(&mut self, operator: Address) -> Result<Option<Validator>, PrecompileFailure> {
        Ok(self.read()?.validator(operator))
    }

    /// A delegation.
    pub fn delegation(
        &mut self,
        delegator: Address,
        validator: Address,
    ) -> Result<Option<Delegation>, PrecompileFailure> {
        Ok(self.read()?.delegation(delegator, validator))
    }

    /// Delegates, returning the new shares.
    pub fn delegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: U256,
    ) -> Result<U256, PrecompileFailure> {
        Ok(self.write()?.delegate(delegator, validator, amount)?)
    }

    /// Undelegates, returning the completion time.
    pub fn undelegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: U256,
    ) -> Result<u64, PrecompileFailure> {
        let block = self.block();
        Ok(self.write()?.undelegate(delegator, validator, amount, block)?)
    }

    /// Redelegates, returning the completion time.
    pub fn redelegate(
        &mut self,
        delegator: Address,
        src: Address,
        dst: Address,
        amount: U256,
    ) -> Result<u64, PrecompileFailure> {
        let block = self.block();
        Ok(self.write()?.redelegate(delegator, src, dst, amount, block)?)
    }

    /// Cancels part of an unbonding entry.
    pub fn cancel_unbonding(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: U256,
        creation_height: u64,
    ) -> Result<(), PrecompileFailure> {
        self.write()?
            .cancel_unbonding(delegator, validator, amount, creation_height)?;
        Ok(())
    }

    /// Creates a validator.
    pub fn create_validator(&mut self, validator: NewValidator) -> Result<(), PrecompileFailure> {
        self.write()?.create_validator(validator)?;
        Ok(())
    }

    // === Logs ===

    /// Appends an event emitted by this precompile to the pending log journal.
    pub fn emit<E: SolEvent>(&mut self, event: &E) {
        let log = Log {
            address: self.address,
            data: event.encode_log_data(),
        };
        let block_number = self.block().height;
        self.context.push_log(EventLog { log, block_number });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        authorization::{Authorization, SpendLimit},
        ledger::AuthzKeeper,
        test_utils::{Fixture, ALICE, BOB, CAROL, GAS},
    };

    #[test]
    fn meter_refuses_overdraw_without_consuming() {
        let mut meter = GasMeter::new(100);
        meter.consume(60).unwrap();
        assert_eq!(
            meter.consume(41),
            Err(PrecompileFailure::OutOfGas {
                needed: 41,
                remaining: 40
            })
        );
        assert_eq!(meter.used(), 60);
        meter.consume(40).unwrap();
        assert_eq!(meter.remaining(), 0);
    }

    #[test]
    fn delete_grant_charges_existence_check() {
        let mut fx = Fixture::new();
        let grant = Grant::new(Authorization::send("uatom", SpendLimit::Unlimited), None);
        fx.ledger_mut().save_grant(BOB, ALICE, grant);
        let schedule = GasConfig::default();
        let call = PrecompileCall::new(ALICE, Bytes::new(), GAS);
        let mut gas = GasMeter::new(GAS);
        let mut ctx = CallContext::new(
            fx.bridge.context_mut(),
            &mut gas,
            &schedule,
            Address::ZERO,
            &call,
        );

        assert!(!ctx.delete_grant(CAROL, ALICE, MsgType::Send).unwrap());
        assert!(ctx.delete_grant(BOB, ALICE, MsgType::Send).unwrap());
        assert_eq!(gas.used(), 2 * schedule.has_cost + schedule.delete_cost);
        assert!(fx.ledger().grant(BOB, ALICE, MsgType::Send).is_none());
    }

    #[test]
    fn call_builder_defaults_origin_to_caller() {
        let caller = Address::with_last_byte(1);
        let call = PrecompileCall::new(caller, Bytes::new(), 10)
            .with_value(U256::from(3))
            .with_static(true);
        assert_eq!(call.origin, caller);
        assert_eq!(call.value, U256::from(3));
        assert!(call.is_static);
        assert_eq!(call.with_origin(Address::ZERO).origin, Address::ZERO);
    }
}
