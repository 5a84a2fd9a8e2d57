//! Chain family, network identifiers and the built-in descriptor registry.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{address, Address, B256};
use alloy_sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use crate::decoder::{OutputProposed, SendRootUpdated};
use crate::error::IndexerError;

/// Rollup family. Determines which decoder is dispatched for a raw log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    /// OP Stack chains posting `OutputProposed` on the L2OutputOracle.
    OpStack,
    /// Arbitrum chains posting `SendRootUpdated` on the Outbox.
    Arbitrum,
}

impl ChainFamily {
    /// topic0 of the checkpoint event this family publishes on L1.
    pub fn event_signature(&self) -> B256 {
        match self {
            ChainFamily::OpStack => OutputProposed::SIGNATURE_HASH,
            ChainFamily::Arbitrum => SendRootUpdated::SIGNATURE_HASH,
        }
    }

    /// Default number of L1 blocks kept between the head and the scan frontier.
    pub fn default_confirmation_depth(&self) -> u64 {
        match self {
            ChainFamily::OpStack => 12,
            ChainFamily::Arbitrum => 64,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainFamily::OpStack => "opstack",
            ChainFamily::Arbitrum => "arbitrum",
        }
    }
}

impl fmt::Display for ChainFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainFamily {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "opstack" => Ok(ChainFamily::OpStack),
            "arbitrum" => Ok(ChainFamily::Arbitrum),
            other => Err(IndexerError::Configuration(format!(
                "unknown chain family '{other}'"
            ))),
        }
    }
}

/// Rollup name, the first half of a [`Network`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainName {
    Optimism,
    Base,
    Zora,
    Arbitrum,
}

impl ChainName {
    pub const ALL: [ChainName; 4] = [
        ChainName::Optimism,
        ChainName::Base,
        ChainName::Zora,
        ChainName::Arbitrum,
    ];

    pub fn family(&self) -> ChainFamily {
        match self {
            ChainName::Optimism | ChainName::Base | ChainName::Zora => ChainFamily::OpStack,
            ChainName::Arbitrum => ChainFamily::Arbitrum,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChainName::Optimism => "optimism",
            ChainName::Base => "base",
            ChainName::Zora => "zora",
            ChainName::Arbitrum => "arbitrum",
        }
    }
}

impl fmt::Display for ChainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainName {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChainName::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| IndexerError::Configuration(format!("unknown chain name '{s}'")))
    }
}

/// The L1 network a rollup settles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum L1Network {
    Mainnet,
    Sepolia,
    Goerli,
}

impl L1Network {
    pub const ALL: [L1Network; 3] = [L1Network::Mainnet, L1Network::Sepolia, L1Network::Goerli];

    pub fn as_str(&self) -> &'static str {
        match self {
            L1Network::Mainnet => "mainnet",
            L1Network::Sepolia => "sepolia",
            L1Network::Goerli => "goerli",
        }
    }
}

impl fmt::Display for L1Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for L1Network {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        L1Network::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| IndexerError::Configuration(format!("unknown L1 network '{s}'")))
    }
}

/// A rollup deployment, e.g. `optimism_sepolia`.
///
/// The canonical string form is also the partition key in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Network {
    pub chain: ChainName,
    pub l1: L1Network,
}

impl Network {
    pub const fn new(chain: ChainName, l1: L1Network) -> Self {
        Self { chain, l1 }
    }

    pub fn family(&self) -> ChainFamily {
        self.chain.family()
    }

    /// Every chain × L1 combination, builtin or not.
    pub fn all() -> impl Iterator<Item = Network> {
        ChainName::ALL
            .into_iter()
            .flat_map(|chain| L1Network::ALL.into_iter().map(move |l1| Network::new(chain, l1)))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.chain, self.l1)
    }
}

impl FromStr for Network {
    type Err = IndexerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain, l1) = s.split_once('_').ok_or_else(|| {
            IndexerError::Configuration(format!(
                "network '{s}' must have the form <chain>_<l1network>"
            ))
        })?;
        Ok(Network::new(chain.parse()?, l1.parse()?))
    }
}

impl TryFrom<String> for Network {
    type Error = IndexerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Network> for String {
    fn from(network: Network) -> Self {
        network.to_string()
    }
}

/// Static metadata needed to scan one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainDescriptor {
    pub network: Network,
    pub family: ChainFamily,
    /// L1 contract emitting the checkpoint event.
    pub contract: Address,
    /// topic0 filter for `eth_getLogs`.
    pub event_signature: B256,
    pub confirmation_depth: u64,
    /// First L1 block worth scanning.
    pub deployment_block: u64,
}

impl ChainDescriptor {
    pub fn new(network: Network, contract: Address, deployment_block: u64) -> Self {
        let family = network.family();
        Self {
            network,
            family,
            contract,
            event_signature: family.event_signature(),
            confirmation_depth: family.default_confirmation_depth(),
            deployment_block,
        }
    }

    /// Look up the built-in descriptor for `network`.
    ///
    /// Goerli deployments have no entry; they need a `contract` in configuration.
    pub fn builtin(network: Network) -> Option<Self> {
        let (contract, deployment_block) = match (network.chain, network.l1) {
            (ChainName::Optimism, L1Network::Mainnet) => {
                (address!("dfe97868233d1aa22e815a266982f2cf17685a27"), 17_365_802)
            }
            (ChainName::Optimism, L1Network::Sepolia) => {
                (address!("90E9c4f8a994a250F6aEfd61CAFb4F2e895D458F"), 4_071_248)
            }
            (ChainName::Base, L1Network::Mainnet) => {
                (address!("56315b90c40730925ec5485cf004d835058518A0"), 17_482_143)
            }
            (ChainName::Base, L1Network::Sepolia) => {
                (address!("84457ca9D0163FbC4bbfe4Dfbb20ba46e48DF254"), 4_370_901)
            }
            (ChainName::Zora, L1Network::Mainnet) => {
                (address!("9E6204F750cD866b299594e2aC9eA824E2e5f95c"), 17_473_938)
            }
            (ChainName::Zora, L1Network::Sepolia) => {
                (address!("2615B481Bd3E5A1C0C7Ca3Da1bdc663E8615Ade9"), 4_548_103)
            }
            (ChainName::Arbitrum, L1Network::Mainnet) => {
                (address!("0B9857ae2D4A3DBe74ffE1d7DF045bb7F96E4840"), 15_411_056)
            }
            (ChainName::Arbitrum, L1Network::Sepolia) => {
                (address!("65f07C7D521164a4d5DaC6eB8Fac8DA067A3B78F"), 4_139_226)
            }
            (_, L1Network::Goerli) => return None,
        };
        Some(Self::new(network, contract, deployment_block))
    }

    /// All built-in descriptors, in registry order.
    pub fn builtins() -> Vec<Self> {
        Network::all().filter_map(Self::builtin).collect()
    }

    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.contract == Address::ZERO {
            return Err(IndexerError::Configuration(format!(
                "{}: contract address must not be zero",
                self.network
            )));
        }
        if self.event_signature == B256::ZERO {
            return Err(IndexerError::Configuration(format!(
                "{}: event signature must not be zero",
                self.network
            )));
        }
        if self.family != self.network.family() {
            return Err(IndexerError::Configuration(format!(
                "{}: family {} does not match chain {}",
                self.network, self.family, self.network.chain
            )));
        }
        if self.event_signature != self.family.event_signature() {
            return Err(IndexerError::Configuration(format!(
                "{}: event signature {} is not a {} checkpoint event",
                self.network, self.event_signature, self.family
            )));
        }
        Ok(())
    }
}
