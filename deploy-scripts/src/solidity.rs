//! Definitions of Solidity functions called during deployment

use alloy::sol;

sol! {
    /// The OpenZeppelin v5 transparent proxy, which deploys its own `ProxyAdmin`
    /// owned by `initialOwner`
    contract TransparentUpgradeableProxy {
        constructor(address _logic, address initialOwner, bytes memory _data);
    }
}
