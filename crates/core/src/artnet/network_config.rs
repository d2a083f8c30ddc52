use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::config::{ConfigError, Settings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtNetMode {
    Unicast(SocketAddr),
    Broadcast,
}

impl ArtNetMode {
    /// Where packets in this mode are sent when the output port is `port`.
    pub fn address(&self, port: u16) -> SocketAddr {
        match self {
            ArtNetMode::Unicast(destination) => *destination,
            ArtNetMode::Broadcast => SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), port),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ArtNetDestination {
    pub name: String,
    pub mode: ArtNetMode,
}

/// Art-Net destinations and the universe routing between them.
///
/// Destination 0 is the default: universes without a route are sent there.
#[derive(Clone, Debug)]
pub struct NetworkConfig {
    pub destinations: Vec<ArtNetDestination>,
    pub universe_routing: HashMap<u16, usize>, // universe -> destination index
    pub port: u16,
}

impl NetworkConfig {
    /// Single destination: broadcast, or unicast to `dest_ip` when one is given.
    pub fn new(dest_ip: Option<IpAddr>, artnet_port: u16, broadcast: bool) -> Self {
        let mode = match (broadcast, dest_ip) {
            (false, Some(ip)) => ArtNetMode::Unicast(SocketAddr::new(ip, artnet_port)),
            _ => ArtNetMode::Broadcast,
        };

        NetworkConfig {
            destinations: vec![ArtNetDestination {
                name: "default".to_string(),
                mode,
            }],
            universe_routing: HashMap::new(),
            port: artnet_port,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        let invalid = |ip: &str| ConfigError::Validation(vec![format!("'{}' is not an IP address", ip)]);

        let dest_ip: IpAddr = settings
            .destination_ip
            .parse()
            .map_err(|_| invalid(&settings.destination_ip))?;
        let mut config = Self::new(Some(dest_ip), settings.artnet_port, settings.broadcast);

        // Sorted so destination indices are stable between runs
        let routes: BTreeMap<_, _> = settings.universe_routes.iter().collect();
        for (&universe, ip) in routes {
            let ip: IpAddr = ip.parse().map_err(|_| invalid(ip))?;
            let address = SocketAddr::new(ip, settings.artnet_port);

            let index = match config
                .destinations
                .iter()
                .position(|d| d.mode == ArtNetMode::Unicast(address))
            {
                Some(index) => index,
                None => config.add_destination(ArtNetDestination {
                    name: format!("universe-{}", universe),
                    mode: ArtNetMode::Unicast(address),
                }),
            };
            config.route_universe(universe, index);
        }

        Ok(config)
    }

    pub fn add_destination(&mut self, destination: ArtNetDestination) -> usize {
        self.destinations.push(destination);
        self.destinations.len() - 1
    }

    /// Route a universe to a destination index. Unknown indices are ignored.
    pub fn route_universe(&mut self, universe: u16, destination_index: usize) {
        if destination_index < self.destinations.len() {
            self.universe_routing.insert(universe, destination_index);
        }
    }

    pub fn destination_for_universe(&self, universe: u16) -> Option<SocketAddr> {
        let index = self.universe_routing.get(&universe).copied().unwrap_or(0);
        self.destinations
            .get(index)
            .map(|destination| destination.mode.address(self.port))
    }

    pub fn get_destination(&self) -> String {
        if self.destinations.is_empty() {
            return "No destinations configured".to_string();
        }

        self.destinations
            .iter()
            .map(|dest| format!("{}: {}", dest.name, dest.mode.address(self.port)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn get_mode_string(&self) -> &str {
        match self.destinations.first().map(|d| d.mode) {
            None => "none",
            Some(ArtNetMode::Unicast(_)) if self.destinations.len() > 1 => "multi-unicast",
            Some(ArtNetMode::Unicast(_)) => "unicast",
            Some(ArtNetMode::Broadcast) => "broadcast",
        }
    }
}
