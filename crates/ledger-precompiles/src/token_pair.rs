//! Token pair registry.
//!
//! Binds native denominations to synthetic contract addresses. The address is
//! a pure function of the denomination so every node derives the same one:
//!
//! - `ibc/<HASH>` vouchers use the last 20 bytes of the 32-byte hash.
//! - Any other denomination uses the last 20 bytes of `keccak256(denom)`.

use alloy_primitives::{keccak256, Address, B256};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Prefix of cross-chain voucher denominations.
pub const IBC_PREFIX: &str = "ibc/";

/// Who controls the token's supply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OwnerKind {
    /// Native coin managed by a ledger module.
    Module,
    /// Token whose canonical representation lives outside the ledger.
    External,
}

/// Binding between a denomination and its synthetic address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPair {
    /// keccak256 of address and denomination.
    pub id: B256,
    /// Synthetic contract address.
    pub address: Address,
    /// Ledger denomination.
    pub denom: String,
    /// Whether write operations are routed.
    pub enabled: bool,
    /// Supply owner.
    pub owner: OwnerKind,
}

/// Registry failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The denomination already has a pair.
    #[error("token pair for denomination {0} already registered")]
    AlreadyRegistered(String),
    /// Two denominations derived the same address.
    #[error("address {address} already bound to denomination {existing}")]
    AddressCollision {
        /// Derived address.
        address: Address,
        /// Denomination already holding it.
        existing: String,
    },
    /// The denomination does not parse.
    #[error("invalid denomination {denom}: {reason}")]
    InvalidDenom {
        /// Offending denomination.
        denom: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// No pair with that id.
    #[error("token pair {0} not found")]
    NotFound(B256),
}

/// Validates a denomination: `[a-zA-Z][a-zA-Z0-9/:._-]{2,127}`.
pub fn validate_denom(denom: &str) -> Result<(), RegistryError> {
    let invalid = |reason| RegistryError::InvalidDenom {
        denom: denom.to_string(),
        reason,
    };
    if !(3..=128).contains(&denom.len()) {
        return Err(invalid("length must be between 3 and 128"));
    }
    let mut chars = denom.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return Err(invalid("must start with a letter"));
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '_' | '-')) {
        return Err(invalid("contains a disallowed character"));
    }
    Ok(())
}

/// Derives the synthetic address of a denomination.
pub fn synthetic_address(denom: &str) -> Result<Address, RegistryError> {
    let Some(hash) = denom.strip_prefix(IBC_PREFIX) else {
        return Ok(Address::from_slice(&keccak256(denom.as_bytes())[12..]));
    };
    let invalid = || RegistryError::InvalidDenom {
        denom: denom.to_string(),
        reason: "is not a valid IBC voucher hash",
    };
    if hash.len() != 64 {
        return Err(invalid());
    }
    let bytes = hex::decode(hash).map_err(|_| invalid())?;
    Ok(Address::from_slice(&bytes[12..]))
}

/// Pair id: keccak256 of the address followed by the denomination.
pub fn pair_id(address: Address, denom: &str) -> B256 {
    let mut preimage = Vec::with_capacity(20 + denom.len());
    preimage.extend_from_slice(address.as_slice());
    preimage.extend_from_slice(denom.as_bytes());
    keccak256(preimage)
}

/// All registered pairs with address and denomination indexes.
#[derive(Clone, Debug, Default)]
pub struct TokenPairRegistry {
    pairs: BTreeMap<B256, TokenPair>,
    by_address: HashMap<Address, B256>,
    by_denom: HashMap<String, B256>,
}

impl TokenPairRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an enabled pair for `denom`.
    pub fn register(&mut self, denom: &str, owner: OwnerKind) -> Result<TokenPair, RegistryError> {
        validate_denom(denom)?;
        if self.by_denom.contains_key(denom) {
            return Err(RegistryError::AlreadyRegistered(denom.to_string()));
        }
        let address = synthetic_address(denom)?;
        if let Some(existing) = self.resolve_by_address(address) {
            return Err(RegistryError::AddressCollision {
                address,
                existing: existing.denom.clone(),
            });
        }

        let pair = TokenPair {
            id: pair_id(address, denom),
            address,
            denom: denom.to_string(),
            enabled: true,
            owner,
        };
        self.by_address.insert(address, pair.id);
        self.by_denom.insert(pair.denom.clone(), pair.id);
        self.pairs.insert(pair.id, pair.clone());
        tracing::debug!(target: "ledger_precompiles::registry", %address, denom, "registered token pair");
        Ok(pair)
    }

    /// Pair bound to a synthetic address.
    ///
    /// # Panics
    ///
    /// Panics if the address index names a pair that does not exist.
    pub fn resolve_by_address(&self, address: Address) -> Option<&TokenPair> {
        self.by_address.get(&address).map(|id| self.expect_pair(id))
    }

    /// Pair bound to a denomination.
    ///
    /// # Panics
    ///
    /// Panics if the denomination index names a pair that does not exist.
    pub fn resolve_by_denom(&self, denom: &str) -> Option<&TokenPair> {
        self.by_denom.get(denom).map(|id| self.expect_pair(id))
    }

    /// Enables or disables routing of write operations.
    pub fn set_enabled(&mut self, id: B256, enabled: bool) -> Result<&TokenPair, RegistryError> {
        let pair = self.pairs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
        pair.enabled = enabled;
        tracing::debug!(target: "ledger_precompiles::registry", address = %pair.address, enabled, "token pair toggled");
        Ok(pair)
    }

    /// Every pair, ordered by id.
    pub fn pairs(&self) -> impl Iterator<Item = &TokenPair> {
        self.pairs.values()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns true when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn expect_pair(&self, id: &B256) -> &TokenPair {
        match self.pairs.get(id) {
            Some(pair) => pair,
            None => panic!("token pair registry corrupted: index points to missing pair {id}"),
        }
    }
}
