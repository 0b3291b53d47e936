use super::{
    AuthzKeeper, BankKeeper, BlockInfo, BondStatus, CacheContext, Delegation, DenomMetadata,
    DenomTrace, LedgerCheckpoint, LedgerError, NewValidator, StakingKeeper, TransferKeeper,
    UnbondingEntry, Validator,
};
use crate::authorization::{Grant, MsgType};
use alloy_primitives::{Address, B256, U256};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Default unbonding period: 21 days.
pub const DEFAULT_UNBONDING_TIME: u64 = 21 * 24 * 60 * 60;

const BONDED_POOL: &str = "bonded_tokens_pool";
const NOT_BONDED_POOL: &str = "not_bonded_tokens_pool";

/// Address of a module account: the first 20 bytes of sha256(name).
pub fn module_address(name: &str) -> Address {
    Address::from_slice(&Sha256::digest(name.as_bytes())[..20])
}

/// A map with stacked write layers on top of a committed base.
///
/// A `None` entry in a layer is a tombstone hiding the key in lower layers.
#[derive(Clone, Debug)]
pub struct CacheMap<K, V> {
    base: BTreeMap<K, V>,
    layers: Vec<BTreeMap<K, Option<V>>>,
}

impl<K, V> Default for CacheMap<K, V> {
    fn default() -> Self {
        Self {
            base: BTreeMap::new(),
            layers: Vec::new(),
        }
    }
}

impl<K: Ord + Clone, V: Clone> CacheMap<K, V> {
    /// Looks a key up through every layer.
    pub fn get(&self, key: &K) -> Option<&V> {
        for layer in self.layers.iter().rev() {
            if let Some(entry) = layer.get(key) {
                return entry.as_ref();
            }
        }
        self.base.get(key)
    }

    /// Writes into the newest layer.
    pub fn insert(&mut self, key: K, value: V) {
        match self.layers.last_mut() {
            Some(layer) => {
                layer.insert(key, Some(value));
            }
            None => {
                self.base.insert(key, value);
            }
        }
    }

    /// Removes a key in the newest layer. Returns whether it was visible.
    pub fn remove(&mut self, key: &K) -> bool {
        let existed = self.get(key).is_some();
        match self.layers.last_mut() {
            Some(layer) => {
                layer.insert(key.clone(), None);
            }
            None => {
                self.base.remove(key);
            }
        }
        existed
    }

    /// The merged view of every visible entry, in key order.
    pub fn entries(&self) -> Vec<(K, V)> {
        let mut merged: BTreeMap<&K, Option<&V>> =
            self.base.iter().map(|(key, value)| (key, Some(value))).collect();
        for layer in &self.layers {
            for (key, value) in layer {
                merged.insert(key, value.as_ref());
            }
        }
        merged
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key.clone(), value.clone())))
            .collect()
    }

    fn push(&mut self) {
        self.layers.push(BTreeMap::new());
    }

    fn merge_top(&mut self) {
        let Some(top) = self.layers.pop() else { return };
        match self.layers.last_mut() {
            Some(parent) => parent.extend(top),
            None => {
                for (key, value) in top {
                    match value {
                        Some(value) => {
                            self.base.insert(key, value);
                        }
                        None => {
                            self.base.remove(&key);
                        }
                    }
                }
            }
        }
    }

    fn discard_top(&mut self) {
        self.layers.pop();
    }
}

macro_rules! for_each_store {
    ($ledger:ident, $op:ident) => {
        $ledger.balances.$op();
        $ledger.supply.$op();
        $ledger.metadata.$op();
        $ledger.traces.$op();
        $ledger.grants.$op();
        $ledger.validators.$op();
        $ledger.delegations.$op();
        $ledger.unbonding.$op();
    };
}

/// In-memory ledger with nested cache layers.
#[derive(Clone, Debug)]
pub struct MemoryLedger {
    bond_denom: String,
    unbonding_time: u64,
    depth: usize,
    balances: CacheMap<(Address, String), U256>,
    supply: CacheMap<String, U256>,
    metadata: CacheMap<String, DenomMetadata>,
    traces: CacheMap<B256, DenomTrace>,
    grants: CacheMap<(Address, Address, MsgType), Grant>,
    validators: CacheMap<Address, Validator>,
    delegations: CacheMap<(Address, Address), U256>,
    unbonding: CacheMap<(Address, Address), Vec<UnbondingEntry>>,
}

impl MemoryLedger {
    /// An empty ledger bonding `bond_denom`.
    pub fn new(bond_denom: impl Into<String>) -> Self {
        Self {
            bond_denom: bond_denom.into(),
            unbonding_time: DEFAULT_UNBONDING_TIME,
            depth: 0,
            balances: CacheMap::default(),
            supply: CacheMap::default(),
            metadata: CacheMap::default(),
            traces: CacheMap::default(),
            grants: CacheMap::default(),
            validators: CacheMap::default(),
            delegations: CacheMap::default(),
            unbonding: CacheMap::default(),
        }
    }

    /// Overrides the unbonding period.
    pub const fn with_unbonding_time(mut self, seconds: u64) -> Self {
        self.unbonding_time = seconds;
        self
    }

    /// Number of open cache layers.
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Creates `amount` new coins in `account`.
    pub fn mint(&mut self, account: Address, denom: &str, amount: U256) -> Result<(), LedgerError> {
        let supply = self
            .supply(denom)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(denom.to_string()))?;
        let balance = self
            .balance(account, denom)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(denom.to_string()))?;
        self.supply.insert(denom.to_string(), supply);
        self.set_balance(account, denom, balance);
        Ok(())
    }

    /// Destroys `amount` coins held by `account`.
    pub fn burn(&mut self, account: Address, denom: &str, amount: U256) -> Result<(), LedgerError> {
        let balance = self.debit(account, denom, amount)?;
        self.set_balance(account, denom, balance);
        let supply = self.supply(denom).saturating_sub(amount);
        self.supply.insert(denom.to_string(), supply);
        Ok(())
    }

    /// Registers display metadata.
    pub fn set_denom_metadata(&mut self, metadata: DenomMetadata) {
        self.metadata.insert(metadata.base.clone(), metadata);
    }

    /// Registers a voucher trace, returning its voucher denomination.
    pub fn set_denom_trace(&mut self, trace: DenomTrace) -> String {
        let denom = trace.ibc_denom();
        self.traces.insert(trace.hash(), trace);
        denom
    }

    /// Inserts or replaces a validator record.
    pub fn set_validator(&mut self, validator: Validator) {
        self.validators.insert(validator.operator, validator);
    }

    /// Jails or unjails a validator.
    pub fn set_jailed(&mut self, operator: Address, jailed: bool) -> Result<(), LedgerError> {
        let mut validator = self
            .validators
            .get(&operator)
            .cloned()
            .ok_or(LedgerError::UnknownValidator(operator))?;
        validator.jailed = jailed;
        self.validators.insert(operator, validator);
        Ok(())
    }

    /// Changes a validator's bonding status, moving its tokens between pools.
    pub fn set_status(&mut self, operator: Address, status: BondStatus) -> Result<(), LedgerError> {
        let mut validator = self
            .validators
            .get(&operator)
            .cloned()
            .ok_or(LedgerError::UnknownValidator(operator))?;
        let denom = self.bond_denom.clone();
        let from = Self::pool_of(validator.status);
        let to = Self::pool_of(status);
        self.send_coins(from, to, &denom, validator.tokens)?;
        validator.status = status;
        self.validators.insert(operator, validator);
        Ok(())
    }

    /// Pending unbondings of a delegation.
    pub fn unbonding_entries(&self, delegator: Address, validator: Address) -> Vec<UnbondingEntry> {
        self.unbonding
            .get(&(delegator, validator))
            .cloned()
            .unwrap_or_default()
    }

    /// Releases every unbonding entry of `delegator` that matured by `block`.
    /// Returns the released amount.
    pub fn complete_unbonding(
        &mut self,
        delegator: Address,
        validator: Address,
        block: BlockInfo,
    ) -> Result<U256, LedgerError> {
        let key = (delegator, validator);
        let entries = self.unbonding_entries(delegator, validator);
        let (matured, pending): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|entry| entry.completion_time <= block.time);
        let released = matured
            .iter()
            .fold(U256::ZERO, |acc, entry| acc + entry.balance);

        let denom = self.bond_denom.clone();
        self.send_coins(module_address(NOT_BONDED_POOL), delegator, &denom, released)?;
        if pending.is_empty() {
            self.unbonding.remove(&key);
        } else {
            self.unbonding.insert(key, pending);
        }
        Ok(released)
    }

    /// Every stored grant as `(grantee, granter, grant)`.
    pub fn grants(&self) -> Vec<(Address, Address, Grant)> {
        self.grants
            .entries()
            .into_iter()
            .map(|((grantee, granter, _), grant)| (grantee, granter, grant))
            .collect()
    }

    fn pool_of(status: BondStatus) -> Address {
        match status {
            BondStatus::Bonded => module_address(BONDED_POOL),
            BondStatus::Unbonding | BondStatus::Unbonded => module_address(NOT_BONDED_POOL),
        }
    }

    fn set_balance(&mut self, account: Address, denom: &str, amount: U256) {
        self.balances.insert((account, denom.to_string()), amount);
    }

    fn debit(&self, account: Address, denom: &str, amount: U256) -> Result<U256, LedgerError> {
        let available = self.balance(account, denom);
        available
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::InsufficientFunds {
                denom: denom.to_string(),
                available,
                required: amount,
            })
    }

    fn existing_validator(&self, operator: Address) -> Result<Validator, LedgerError> {
        self.validators
            .get(&operator)
            .cloned()
            .ok_or(LedgerError::UnknownValidator(operator))
    }

    /// Issues shares on `validator` for `amount` tokens taken from `source`.
    fn bond(
        &mut self,
        source: Address,
        delegator: Address,
        mut validator: Validator,
        amount: U256,
    ) -> Result<U256, LedgerError> {
        let denom = self.bond_denom.clone();
        self.send_coins(source, Self::pool_of(validator.status), &denom, amount)?;

        let shares = validator.shares_from_tokens(amount);
        validator.tokens += amount;
        validator.delegator_shares += shares;
        let key = (delegator, validator.operator);
        let held = self.delegations.get(&key).copied().unwrap_or_default();
        self.delegations.insert(key, held + shares);
        self.validators.insert(validator.operator, validator);
        Ok(shares)
    }

    /// Removes `amount` tokens worth of shares, returning the validator's pool.
    fn unbond(
        &mut self,
        delegator: Address,
        operator: Address,
        amount: U256,
    ) -> Result<Address, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        let mut validator = self.existing_validator(operator)?;
        let key = (delegator, operator);
        let held = self
            .delegations
            .get(&key)
            .copied()
            .ok_or(LedgerError::NoDelegation {
                delegator,
                validator: operator,
            })?;
        let shares = validator.shares_from_tokens(amount);
        let remaining = held.checked_sub(shares).ok_or(LedgerError::InsufficientShares {
            requested: shares,
            available: held,
        })?;

        if remaining.is_zero() {
            self.delegations.remove(&key);
        } else {
            self.delegations.insert(key, remaining);
        }
        validator.tokens = validator.tokens.saturating_sub(amount);
        validator.delegator_shares = validator.delegator_shares.saturating_sub(shares);
        let pool = Self::pool_of(validator.status);
        self.validators.insert(operator, validator);
        Ok(pool)
    }
}

impl BankKeeper for MemoryLedger {
    fn balance(&self, account: Address, denom: &str) -> U256 {
        self.balances
            .get(&(account, denom.to_string()))
            .copied()
            .unwrap_or_default()
    }

    fn send_coins(
        &mut self,
        from: Address,
        to: Address,
        denom: &str,
        amount: U256,
    ) -> Result<(), LedgerError> {
        let from_balance = self.debit(from, denom, amount)?;
        if amount.is_zero() || from == to {
            return Ok(());
        }
        let to_balance = self
            .balance(to, denom)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(denom.to_string()))?;
        self.set_balance(from, denom, from_balance);
        self.set_balance(to, denom, to_balance);
        Ok(())
    }

    fn supply(&self, denom: &str) -> U256 {
        self.supply.get(&denom.to_string()).copied().unwrap_or_default()
    }

    fn denom_metadata(&self, denom: &str) -> Option<DenomMetadata> {
        self.metadata.get(&denom.to_string()).cloned()
    }
}

impl AuthzKeeper for MemoryLedger {
    fn grant(&self, grantee: Address, granter: Address, msg: MsgType) -> Option<Grant> {
        self.grants.get(&(grantee, granter, msg)).cloned()
    }

    fn save_grant(&mut self, grantee: Address, granter: Address, grant: Grant) {
        let msg = grant.authorization.msg_type();
        self.grants.insert((grantee, granter, msg), grant);
    }

    fn delete_grant(&mut self, grantee: Address, granter: Address, msg: MsgType) -> bool {
        self.grants.remove(&(grantee, granter, msg))
    }
}

impl StakingKeeper for MemoryLedger {
    fn bond_denom(&self) -> String {
        self.bond_denom.clone()
    }

    fn validators(&self, include_jailed: bool) -> Vec<Validator> {
        self.validators
            .entries()
            .into_iter()
            .map(|(_, validator)| validator)
            .filter(|validator| include_jailed || !validator.jailed)
            .collect()
    }

    fn validator(&self, operator: Address) -> Option<Validator> {
        self.validators.get(&operator).cloned()
    }

    fn delegation(&self, delegator: Address, validator: Address) -> Option<Delegation> {
        self.delegations
            .get(&(delegator, validator))
            .map(|shares| Delegation {
                delegator,
                validator,
                shares: *shares,
            })
    }

    fn delegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: U256,
    ) -> Result<U256, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        let validator = self.existing_validator(validator)?;
        self.bond(delegator, delegator, validator, amount)
    }

    fn undelegate(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: U256,
        block: BlockInfo,
    ) -> Result<u64, LedgerError> {
        let pool = self.unbond(delegator, validator, amount)?;
        let denom = self.bond_denom.clone();
        self.send_coins(pool, module_address(NOT_BONDED_POOL), &denom, amount)?;

        let completion_time = block.time.saturating_add(self.unbonding_time);
        let mut entries = self.unbonding_entries(delegator, validator);
        entries.push(UnbondingEntry {
            creation_height: block.height,
            completion_time,
            balance: amount,
        });
        self.unbonding.insert((delegator, validator), entries);
        Ok(completion_time)
    }

    fn redelegate(
        &mut self,
        delegator: Address,
        src: Address,
        dst: Address,
        amount: U256,
        block: BlockInfo,
    ) -> Result<u64, LedgerError> {
        if src == dst {
            return Err(LedgerError::SelfRedelegation);
        }
        let destination = self.existing_validator(dst)?;
        let src_status = self.existing_validator(src)?.status;
        let pool = self.unbond(delegator, src, amount)?;
        self.bond(pool, delegator, destination, amount)?;

        Ok(match src_status {
            BondStatus::Bonded => block.time.saturating_add(self.unbonding_time),
            BondStatus::Unbonding | BondStatus::Unbonded => block.time,
        })
    }

    fn cancel_unbonding(
        &mut self,
        delegator: Address,
        validator: Address,
        amount: U256,
        creation_height: u64,
    ) -> Result<(), LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        let target = self.existing_validator(validator)?;
        let mut entries = self.unbonding_entries(delegator, validator);
        let index = entries
            .iter()
            .position(|entry| entry.creation_height == creation_height)
            .ok_or(LedgerError::UnbondingEntryNotFound(creation_height))?;
        let entry = &mut entries[index];
        entry.balance = entry
            .balance
            .checked_sub(amount)
            .ok_or(LedgerError::UnbondingAmountTooLarge)?;
        if entry.balance.is_zero() {
            entries.remove(index);
        }

        let key = (delegator, validator);
        if entries.is_empty() {
            self.unbonding.remove(&key);
        } else {
            self.unbonding.insert(key, entries);
        }
        self.bond(module_address(NOT_BONDED_POOL), delegator, target, amount)?;
        Ok(())
    }

    fn create_validator(&mut self, new: NewValidator) -> Result<(), LedgerError> {
        if self.validators.get(&new.operator).is_some() {
            return Err(LedgerError::ValidatorExists(new.operator));
        }
        new.commission.validate()?;
        if new.value < new.min_self_delegation || new.value.is_zero() {
            return Err(LedgerError::SelfDelegationBelowMinimum {
                value: new.value,
                minimum: new.min_self_delegation,
            });
        }

        let validator = Validator {
            operator: new.operator,
            status: BondStatus::Unbonded,
            jailed: false,
            tokens: U256::ZERO,
            delegator_shares: U256::ZERO,
            description: new.description,
            commission: new.commission,
            min_self_delegation: new.min_self_delegation,
        };
        self.bond(new.operator, new.operator, validator, new.value)?;
        Ok(())
    }
}

impl TransferKeeper for MemoryLedger {
    fn denom_trace(&self, hash: B256) -> Option<DenomTrace> {
        self.traces.get(&hash).cloned()
    }
}

impl CacheContext for MemoryLedger {
    fn checkpoint(&mut self) -> LedgerCheckpoint {
        let checkpoint = LedgerCheckpoint::new(self.depth);
        self.depth += 1;
        for_each_store!(self, push);
        checkpoint
    }

    fn checkpoint_commit(&mut self, checkpoint: LedgerCheckpoint) {
        assert!(
            checkpoint.depth() < self.depth,
            "ledger checkpoint at depth {} already released (depth {})",
            checkpoint.depth(),
            self.depth
        );
        while self.depth > checkpoint.depth() {
            for_each_store!(self, merge_top);
            self.depth -= 1;
        }
    }

    fn checkpoint_revert(&mut self, checkpoint: LedgerCheckpoint) {
        assert!(
            checkpoint.depth() < self.depth,
            "ledger checkpoint at depth {} already released (depth {})",
            checkpoint.depth(),
            self.depth
        );
        while self.depth > checkpoint.depth() {
            for_each_store!(self, discard_top);
            self.depth -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::{Authorization, SpendLimit};
    use alloy_primitives::address;

    const ALICE: Address = address!("0x00000000000000000000000000000000000000a1");
    const BOB: Address = address!("0x00000000000000000000000000000000000000b1");
    const VAL_A: Address = address!("0x00000000000000000000000000000000000000d1");
    const VAL_B: Address = address!("0x00000000000000000000000000000000000000d2");
    const DENOM: &str = "aevmos";

    fn funded() -> MemoryLedger {
        let mut ledger = MemoryLedger::new(DENOM);
        ledger.mint(ALICE, DENOM, U256::from(1_000)).unwrap();
        ledger.set_validator(Validator::new(VAL_A));
        ledger.set_validator(Validator::new(VAL_B));
        ledger
    }

    // === Test: Cache layers ===

    #[test]
    fn revert_drops_nested_writes() {
        let mut ledger = funded();
        let outer = ledger.checkpoint();
        ledger.send_coins(ALICE, BOB, DENOM, U256::from(100)).unwrap();
        let inner = ledger.checkpoint();
        ledger.send_coins(ALICE, BOB, DENOM, U256::from(50)).unwrap();
        assert_eq!(ledger.balance(BOB, DENOM), U256::from(150));

        ledger.checkpoint_revert(inner);
        assert_eq!(ledger.balance(BOB, DENOM), U256::from(100));
        ledger.checkpoint_commit(outer);
        assert_eq!(ledger.depth(), 0);
        assert_eq!(ledger.balance(BOB, DENOM), U256::from(100));
        assert_eq!(ledger.balance(ALICE, DENOM), U256::from(900));
    }

    #[test]
    fn revert_of_outer_drops_committed_inner() {
        let mut ledger = funded();
        let outer = ledger.checkpoint();
        let inner = ledger.checkpoint();
        ledger.send_coins(ALICE, BOB, DENOM, U256::from(10)).unwrap();
        ledger.checkpoint_commit(inner);
        assert_eq!(ledger.balance(BOB, DENOM), U256::from(10));
        ledger.checkpoint_revert(outer);
        assert_eq!(ledger.balance(BOB, DENOM), U256::ZERO);
        assert_eq!(ledger.balance(ALICE, DENOM), U256::from(1_000));
    }

    #[test]
    fn tombstones_hide_base_entries() {
        let mut ledger = funded();
        let grant = Grant::new(
            Authorization::send(DENOM, SpendLimit::Unlimited),
            None,
        );
        ledger.save_grant(BOB, ALICE, grant.clone());

        let checkpoint = ledger.checkpoint();
        assert!(ledger.delete_grant(BOB, ALICE, MsgType::Send));
        assert_eq!(ledger.grant(BOB, ALICE, MsgType::Send), None);
        assert!(ledger.grants().is_empty());
        ledger.checkpoint_revert(checkpoint);
        assert_eq!(ledger.grant(BOB, ALICE, MsgType::Send), Some(grant));
    }

    #[test]
    #[should_panic(expected = "already released")]
    fn releasing_twice_panics() {
        let mut ledger = funded();
        let checkpoint = ledger.checkpoint();
        ledger.checkpoint_commit(checkpoint);
        ledger.checkpoint_revert(checkpoint);
    }

    // === Test: Bank ===

    #[test]
    fn send_rejects_overdraft() {
        let mut ledger = funded();
        match ledger.send_coins(ALICE, BOB, DENOM, U256::from(1_001)) {
            Err(LedgerError::InsufficientFunds {
                available,
                required,
                ..
            }) => {
                assert_eq!(available, U256::from(1_000));
                assert_eq!(required, U256::from(1_001));
            }
            other => panic!("expected insufficient funds, got {other:?}"),
        }
    }

    #[test]
    fn mint_and_burn_track_supply() {
        let mut ledger = funded();
        ledger.mint(BOB, DENOM, U256::from(5)).unwrap();
        assert_eq!(ledger.supply(DENOM), U256::from(1_005));
        ledger.burn(ALICE, DENOM, U256::from(5)).unwrap();
        assert_eq!(ledger.supply(DENOM), U256::from(1_000));
        assert_eq!(ledger.balance(ALICE, DENOM), U256::from(995));
    }

    // === Test: Staking ===

    #[test]
    fn delegate_moves_coins_to_bonded_pool() {
        let mut ledger = funded();
        let shares = ledger.delegate(ALICE, VAL_A, U256::from(300)).unwrap();
        assert_eq!(shares, U256::from(300));
        assert_eq!(ledger.balance(ALICE, DENOM), U256::from(700));
        assert_eq!(
            ledger.balance(module_address(BONDED_POOL), DENOM),
            U256::from(300)
        );
        assert_eq!(ledger.validator(VAL_A).unwrap().tokens, U256::from(300));
    }

    #[test]
    fn undelegate_creates_entry_and_matures() {
        let mut ledger = funded();
        ledger.delegate(ALICE, VAL_A, U256::from(300)).unwrap();
        let block = BlockInfo::new(10, 1_000);
        let completion = ledger
            .undelegate(ALICE, VAL_A, U256::from(100), block)
            .unwrap();
        assert_eq!(completion, 1_000 + DEFAULT_UNBONDING_TIME);
        assert_eq!(
            ledger.unbonding_entries(ALICE, VAL_A),
            vec![UnbondingEntry {
                creation_height: 10,
                completion_time: completion,
                balance: U256::from(100),
            }]
        );

        let early = ledger
            .complete_unbonding(ALICE, VAL_A, BlockInfo::new(11, 1_001))
            .unwrap();
        assert_eq!(early, U256::ZERO);
        let released = ledger
            .complete_unbonding(ALICE, VAL_A, BlockInfo::new(12, completion))
            .unwrap();
        assert_eq!(released, U256::from(100));
        assert_eq!(ledger.balance(ALICE, DENOM), U256::from(800));
        assert!(ledger.unbonding_entries(ALICE, VAL_A).is_empty());
    }

    #[test]
    fn cancel_unbonding_rebonds_tokens() {
        let mut ledger = funded();
        ledger.delegate(ALICE, VAL_A, U256::from(300)).unwrap();
        ledger
            .undelegate(ALICE, VAL_A, U256::from(100), BlockInfo::new(7, 0))
            .unwrap();
        ledger
            .cancel_unbonding(ALICE, VAL_A, U256::from(40), 7)
            .unwrap();
        assert_eq!(
            ledger.delegation(ALICE, VAL_A).unwrap().shares,
            U256::from(240)
        );
        assert_eq!(
            ledger.unbonding_entries(ALICE, VAL_A)[0].balance,
            U256::from(60)
        );
        assert_eq!(
            ledger.cancel_unbonding(ALICE, VAL_A, U256::from(61), 7),
            Err(LedgerError::UnbondingAmountTooLarge)
        );
        assert_eq!(
            ledger.cancel_unbonding(ALICE, VAL_A, U256::from(1), 8),
            Err(LedgerError::UnbondingEntryNotFound(8))
        );
    }

    #[test]
    fn redelegate_moves_shares() {
        let mut ledger = funded();
        ledger.delegate(ALICE, VAL_A, U256::from(300)).unwrap();
        ledger
            .redelegate(ALICE, VAL_A, VAL_B, U256::from(300), BlockInfo::new(1, 5))
            .unwrap();
        assert_eq!(ledger.delegation(ALICE, VAL_A), None);
        assert_eq!(
            ledger.delegation(ALICE, VAL_B).unwrap().shares,
            U256::from(300)
        );
        assert_eq!(
            ledger.redelegate(ALICE, VAL_B, VAL_B, U256::from(1), BlockInfo::default()),
            Err(LedgerError::SelfRedelegation)
        );
    }

    #[test]
    fn validators_filter_jailed() {
        let mut ledger = funded();
        ledger.set_jailed(VAL_B, true).unwrap();
        let active: Vec<_> = ledger
            .validators(false)
            .into_iter()
            .map(|validator| validator.operator)
            .collect();
        assert_eq!(active, vec![VAL_A]);
        assert_eq!(ledger.validators(true).len(), 2);
    }

    #[test]
    fn create_validator_self_delegates() {
        let mut ledger = funded();
        let operator = ALICE;
        ledger
            .create_validator(NewValidator {
                operator,
                description: Default::default(),
                commission: Default::default(),
                min_self_delegation: U256::from(10),
                value: U256::from(100),
            })
            .unwrap();
        let validator = ledger.validator(operator).unwrap();
        assert_eq!(validator.status, BondStatus::Unbonded);
        assert_eq!(validator.tokens, U256::from(100));
        assert_eq!(
            ledger.delegation(operator, operator).unwrap().shares,
            U256::from(100)
        );
        assert_eq!(
            ledger.create_validator(NewValidator {
                operator,
                description: Default::default(),
                commission: Default::default(),
                min_self_delegation: U256::ZERO,
                value: U256::from(1),
            }),
            Err(LedgerError::ValidatorExists(operator))
        );
    }
}
