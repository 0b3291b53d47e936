//! Published method tables and events of the bridge precompiles.

use crate::error::PrecompileFailure;
use alloy_sol_types::{sol, SolInterface};

sol! {
    /// ERC-20 view over a ledger denomination.
    #[sol(all_derives)]
    interface IERC20 {
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function increaseAllowance(address spender, uint256 addedValue) external returns (bool);
        function decreaseAllowance(address spender, uint256 subtractedValue) external returns (bool);

        event Transfer(address indexed from, address indexed to, uint256 value);
        event Approval(address indexed owner, address indexed spender, uint256 value);
    }
}

sol! {
    /// Wrapping interface of the native coin.
    #[sol(all_derives)]
    interface IWERC20 {
        function deposit() external payable;
        function withdraw(uint256 wad) external;

        event Deposit(address indexed dst, uint256 wad);
        event Withdrawal(address indexed src, uint256 wad);
    }
}

sol! {
    /// Staking module with ERC-20 style allowances.
    #[sol(all_derives)]
    interface IStaking {
        struct Description {
            string moniker;
            string identity;
            string website;
            string securityContact;
            string details;
        }

        struct CommissionRates {
            uint256 rate;
            uint256 maxRate;
            uint256 maxChangeRate;
        }

        function approve(address spender, uint256 amount, string[] calldata methods) external returns (bool approved);
        function increaseAllowance(address spender, uint256 amount, string[] calldata methods) external returns (bool approved);
        function decreaseAllowance(address spender, uint256 amount, string[] calldata methods) external returns (bool approved);
        function revoke(address spender, string[] calldata methods) external returns (bool revoked);
        function allowance(address grantee, address granter, string calldata method) external view returns (uint256 remaining);

        function createValidator(
            Description calldata description,
            CommissionRates calldata commissionRates,
            uint256 minSelfDelegation,
            address validatorAddress,
            string calldata pubkey,
            uint256 value
        ) external returns (bool success);
        function delegate(address delegatorAddress, address validatorAddress, uint256 amount) external returns (bool success);
        function undelegate(address delegatorAddress, address validatorAddress, uint256 amount) external returns (int64 completionTime);
        function redelegate(
            address delegatorAddress,
            address validatorSrcAddress,
            address validatorDstAddress,
            uint256 amount
        ) external returns (int64 completionTime);
        function cancelUnbondingDelegation(
            address delegatorAddress,
            address validatorAddress,
            uint256 amount,
            uint256 creationHeight
        ) external returns (bool success);

        function delegation(address delegatorAddress, address validatorAddress) external view returns (uint256 shares, uint256 balance);
        function validator(address validatorAddress) external view returns (bool jailed, uint8 status, uint256 tokens, uint256 delegatorShares);

        event Approval(address indexed grantee, address indexed granter, string[] methods, uint256 value);
        event Revocation(address indexed grantee, address indexed granter, string[] methods);
        event AllowanceChange(address indexed grantee, address indexed granter, string[] methods, uint256[] values);
        event CreateValidator(address indexed validatorAddress, uint256 value);
        event Delegate(address indexed delegatorAddress, address indexed validatorAddress, uint256 amount, uint256 newShares);
        event Unbond(address indexed delegatorAddress, address indexed validatorAddress, uint256 amount, uint256 completionTime);
        event Redelegate(
            address indexed delegatorAddress,
            address indexed validatorSrcAddress,
            address indexed validatorDstAddress,
            uint256 amount,
            uint256 completionTime
        );
        event CancelUnbondingDelegation(
            address indexed delegatorAddress,
            address indexed validatorAddress,
            uint256 amount,
            uint256 creationHeight
        );
    }
}

/// Outcome of matching calldata against an interface.
#[derive(Debug)]
pub(crate) enum Decoded<C> {
    /// A known method with well-formed arguments.
    Call(C),
    /// Input shorter than a selector.
    Short(usize),
    /// A selector the interface does not publish.
    Unknown([u8; 4]),
}

/// Splits calldata into selector and arguments and decodes the arguments.
///
/// Unknown selectors are reported as such so the caller can route them to a
/// fallback; argument mismatches on a known selector are failures.
pub(crate) fn decode_input<C: SolInterface>(input: &[u8]) -> Result<Decoded<C>, PrecompileFailure> {
    let Some((selector, _)) = input.split_first_chunk::<4>() else {
        return Ok(Decoded::Short(input.len()));
    };
    if !C::valid_selector(*selector) {
        return Ok(Decoded::Unknown(*selector));
    }
    C::abi_decode(input)
        .map(Decoded::Call)
        .map_err(|err| PrecompileFailure::InvalidArguments {
            selector: (*selector).into(),
            reason: err.to_string(),
        })
}

/// Like [`decode_input`] for interfaces without a fallback.
pub(crate) fn decode_strict<C: SolInterface>(input: &[u8]) -> Result<C, PrecompileFailure> {
    match decode_input(input)? {
        Decoded::Call(call) => Ok(call),
        Decoded::Short(len) => Err(PrecompileFailure::InputTooShort(len)),
        Decoded::Unknown(selector) => Err(PrecompileFailure::UnknownMethod(selector.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, U256};
    use alloy_sol_types::SolCall;

    #[test]
    fn decodes_known_selector() {
        let data = IERC20::balanceOfCall {
            account: Address::ZERO,
        }
        .abi_encode();
        match decode_input::<IERC20::IERC20Calls>(&data) {
            Ok(Decoded::Call(IERC20::IERC20Calls::balanceOf(call))) => {
                assert_eq!(call.account, Address::ZERO)
            }
            other => panic!("expected balanceOf, got {other:?}"),
        }
    }

    #[test]
    fn reports_unknown_and_short_input() {
        let deposit = IWERC20::depositCall {}.abi_encode();
        assert!(matches!(
            decode_input::<IERC20::IERC20Calls>(&deposit),
            Ok(Decoded::Unknown(selector)) if selector == IWERC20::depositCall::SELECTOR
        ));
        assert!(matches!(
            decode_input::<IERC20::IERC20Calls>(&[0x01, 0x02]),
            Ok(Decoded::Short(2))
        ));
    }

    #[test]
    fn truncated_arguments_are_invalid() {
        let mut data = IERC20::transferCall {
            to: Address::ZERO,
            amount: U256::from(1),
        }
        .abi_encode();
        data.truncate(40);
        match decode_strict::<IERC20::IERC20Calls>(&data) {
            Err(PrecompileFailure::InvalidArguments { selector, .. }) => {
                assert_eq!(selector, IERC20::transferCall::SELECTOR)
            }
            other => panic!("expected invalid arguments, got {other:?}"),
        }
    }
}
