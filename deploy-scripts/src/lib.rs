//! Scripts for deploying the upgradeable reward & staking contracts.
//!
//! Deployed addresses are recorded in a deployments file, so re-running a
//! script attaches to what already exists instead of deploying it again.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod cli;
mod commands;
pub mod constants;
pub mod driver;
pub mod errors;
pub mod ledger;
pub mod provisioner;
pub mod proxy;
mod solidity;
#[cfg(test)]
mod test_helpers;
pub mod utils;
