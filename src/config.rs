use crate::ruleset::{ConnectingRule, ProxyingRule, Ruleset, Target};
use crate::socks::{
    Resolver, Socks, Socks4, Socks4Auther, Socks5, Socks5Auther, SystemResolver, UserTable,
};
use ipnetwork::IpNetwork;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("can't read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("config file is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("rule destination `{0}` is neither a network nor a domain")]
    RuleTarget(String),
}

/// The parsed TOML configuration. `transport` and `ruleset` sections are
/// required; `proxy` defaults to an open SOCKS5 server.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proxy: ProxySection,
    pub transport: TransportSection,
    pub ruleset: RulesetSection,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProxySection {
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub transport: TransportKind,
    /// username -> password; absent means no authentication
    pub auth: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Socks4,
    /// SOCKS4 with remote name resolution
    Socks4a,
    #[default]
    Socks5,
    /// SOCKS5 with remote name resolution
    Socks5h,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Tcp,
}

#[derive(Debug, Deserialize)]
pub struct TransportSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds. Bounds the handshake, the remote dial and the relay idle
    /// wait; absent means no timeouts at all.
    pub timeout: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    1080
}

#[derive(Debug, Deserialize, Default)]
pub struct RulesetSection {
    #[serde(default)]
    pub connecting: ConnectingLists,
    #[serde(default)]
    pub proxying: ProxyingLists,
}

#[derive(Debug, Deserialize, Default)]
pub struct ConnectingLists {
    #[serde(default)]
    pub allow: Vec<ConnectingRuleEntry>,
    #[serde(default)]
    pub block: Vec<ConnectingRuleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectingRuleEntry {
    pub from: IpNetwork,
}

#[derive(Debug, Deserialize, Default)]
pub struct ProxyingLists {
    #[serde(default)]
    pub allow: Vec<ProxyingRuleEntry>,
    #[serde(default)]
    pub block: Vec<ProxyingRuleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyingRuleEntry {
    pub from: IpNetwork,
    /// address, CIDR or domain string
    pub to: String,
}

impl Config {
    pub fn load(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Config::load(&fs::read_to_string(path)?)
    }

    /// Build the protocol engine this config asks for. The `socks4a` and
    /// `socks5h` variants promise clients remote name resolution, so they
    /// carry the system resolver.
    pub fn socks(&self) -> Socks {
        let users = self.proxy.auth.clone().map(UserTable::new).map(Arc::new);
        let resolver: Option<Arc<dyn Resolver>> = match self.proxy.protocol {
            Protocol::Socks4a | Protocol::Socks5h => Some(Arc::new(SystemResolver)),
            Protocol::Socks4 | Protocol::Socks5 => None,
        };
        match self.proxy.protocol {
            Protocol::Socks4 | Protocol::Socks4a => Socks::V4(Socks4::new(
                users.map(|users| users as Arc<dyn Socks4Auther>),
                resolver,
            )),
            Protocol::Socks5 | Protocol::Socks5h => Socks::V5(Socks5::new(
                users.map(|users| users as Arc<dyn Socks5Auther>),
                resolver,
            )),
        }
    }

    pub fn ruleset(&self) -> Result<Ruleset, ConfigError> {
        let connecting =
            |entries: &[ConnectingRuleEntry]| -> Vec<ConnectingRule> {
                entries.iter().map(|entry| ConnectingRule::new(entry.from)).collect()
            };
        let proxying = |entries: &[ProxyingRuleEntry]| -> Result<Vec<ProxyingRule>, ConfigError> {
            entries
                .iter()
                .map(|entry| Ok(ProxyingRule::new(entry.from, parse_target(&entry.to)?)))
                .collect()
        };
        Ok(Ruleset::new(
            connecting(&self.ruleset.connecting.allow),
            connecting(&self.ruleset.connecting.block),
            proxying(&self.ruleset.proxying.allow)?,
            proxying(&self.ruleset.proxying.block)?,
        ))
    }
}

fn parse_target(to: &str) -> Result<Target, ConfigError> {
    match to.parse::<IpNetwork>() {
        Ok(net) => Ok(Target::Net(net)),
        // a slash means the operator meant a CIDR and got it wrong
        Err(_) if to.contains('/') => Err(ConfigError::RuleTarget(to.to_string())),
        Err(_) => Ok(Target::Domain(to.to_string())),
    }
}
