use ipnetwork::IpNetwork;
use std::fmt;
use std::net::SocketAddr;

/// Destination predicate of a proxying rule: a network (a bare address
/// parses as a host network) or an exact domain name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Net(IpNetwork),
    Domain(String),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Net(net) => write!(f, "{}", net),
            Target::Domain(domain) => write!(f, "{}", domain),
        }
    }
}

/// Source-only rule, evaluated when a client connects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectingRule {
    pub from: IpNetwork,
}

impl ConnectingRule {
    pub fn new(from: IpNetwork) -> Self {
        ConnectingRule { from }
    }

    fn matches(&self, client: SocketAddr) -> bool {
        self.from.contains(client.ip())
    }
}

impl fmt::Display for ConnectingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from {}", self.from)
    }
}

/// Source and destination rule, evaluated once the handshake has produced a
/// destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyingRule {
    pub from: IpNetwork,
    pub to: Target,
}

impl ProxyingRule {
    pub fn new(from: IpNetwork, to: Target) -> Self {
        ProxyingRule { from, to }
    }

    fn matches(&self, client: SocketAddr, destination: SocketAddr, domain_name: Option<&str>) -> bool {
        if !self.from.contains(client.ip()) {
            return false;
        }
        match &self.to {
            Target::Net(net) => net.contains(destination.ip()),
            // a domain rule only ever matches a destination the client named
            Target::Domain(domain) => domain_name == Some(domain.as_str()),
        }
    }
}

impl fmt::Display for ProxyingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "from {} to {}", self.from, self.to)
    }
}

/// Policy over both phases: who may connect at all, and who may proxy where.
///
/// Rules are walked in declaration order. The first allow match grants;
/// any block match overrides; no allow match denies.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    allow_connecting: Vec<ConnectingRule>,
    block_connecting: Vec<ConnectingRule>,
    allow_proxying: Vec<ProxyingRule>,
    block_proxying: Vec<ProxyingRule>,
}

impl Ruleset {
    pub fn new(
        allow_connecting: Vec<ConnectingRule>,
        block_connecting: Vec<ConnectingRule>,
        allow_proxying: Vec<ProxyingRule>,
        block_proxying: Vec<ProxyingRule>,
    ) -> Self {
        Ruleset {
            allow_connecting,
            block_connecting,
            allow_proxying,
            block_proxying,
        }
    }

    pub fn should_allow_connecting(&self, client: SocketAddr) -> bool {
        let allowed = match self
            .allow_connecting
            .iter()
            .find(|rule| rule.matches(client))
        {
            Some(rule) => {
                debug!("{} connection allowed by rule `{}`", client, rule);
                true
            }
            None => {
                debug!("{} matches no connecting allow-rule", client);
                false
            }
        };
        if let Some(rule) = self
            .block_connecting
            .iter()
            .find(|rule| rule.matches(client))
        {
            info!("{} connection blocked by rule `{}`", client, rule);
            return false;
        }
        allowed
    }

    pub fn should_allow_proxying(
        &self,
        client: SocketAddr,
        destination: SocketAddr,
        domain_name: Option<&str>,
    ) -> bool {
        let allowed = match self
            .allow_proxying
            .iter()
            .find(|rule| rule.matches(client, destination, domain_name))
        {
            Some(rule) => {
                debug!("{} request for {} allowed by rule `{}`", client, destination, rule);
                true
            }
            None => {
                debug!("{} matches no proxying allow-rule for {}", client, destination);
                false
            }
        };
        if let Some(rule) = self
            .block_proxying
            .iter()
            .find(|rule| rule.matches(client, destination, domain_name))
        {
            info!("{} request for {} blocked by rule `{}`", client, destination, rule);
            return false;
        }
        allowed
    }
}
