use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use super::network_config::NetworkConfig;
use super::transmitter::Transmitter;
use crate::error::TransmitError;
use crate::patch::{FrameSink, LightingPatch};

/// One transmitter per universe, all routed through a [`NetworkConfig`].
pub struct ArtNetOutput {
    transmitters: BTreeMap<u16, Arc<Transmitter>>,
    mode: String,
    running: bool,
}

impl ArtNetOutput {
    /// Bind a transmitter for each universe at the destination the config routes it to.
    pub async fn bind<I>(
        config: &NetworkConfig,
        universes: I,
        max_universe: u16,
    ) -> Result<Self, TransmitError>
    where
        I: IntoIterator<Item = u16>,
    {
        let mut transmitters = BTreeMap::new();
        for universe in universes {
            let destination = config
                .destination_for_universe(universe)
                .ok_or(TransmitError::NoDestination(universe))?;
            let transmitter = Transmitter::bind(universe, destination, max_universe).await?;
            transmitters.insert(universe, Arc::new(transmitter));
        }

        log::info!(
            "Art-Net output ready: {} universe(s), {} ({})",
            transmitters.len(),
            config.get_mode_string(),
            config.get_destination()
        );

        Ok(Self {
            transmitters,
            mode: config.get_mode_string().to_string(),
            running: false,
        })
    }

    /// Register every transmitter as the sink for its universe.
    pub fn attach(&self, patch: &LightingPatch) {
        for (universe, transmitter) in &self.transmitters {
            patch.register_sink(*universe, Arc::clone(transmitter) as Arc<dyn FrameSink>);
        }
    }

    /// Start all send loops. On failure the loops already started are stopped again.
    pub fn start(&mut self, period: Duration) -> Result<(), TransmitError> {
        let result = self.transmitters.iter().try_for_each(|(universe, transmitter)| {
            transmitter.start(period).map_err(|e| {
                log::error!("Failed to start transmitter for universe {}: {}", universe, e);
                e
            })
        });

        match result {
            Ok(()) => {
                self.running = true;
                Ok(())
            }
            Err(e) => {
                self.stop();
                Err(e)
            }
        }
    }

    pub fn stop(&mut self) {
        for transmitter in self.transmitters.values() {
            transmitter.stop();
        }
        self.running = false;
    }

    /// Close every transmitter. Frames published afterwards are rejected by the sinks.
    pub fn close(&mut self) {
        log::info!("Closing Art-Net output...");
        for transmitter in self.transmitters.values() {
            transmitter.close();
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn transmitter(&self, universe: u16) -> Option<&Arc<Transmitter>> {
        self.transmitters.get(&universe)
    }

    pub fn universes(&self) -> Vec<u16> {
        self.transmitters.keys().copied().collect()
    }

    pub fn status(&self) -> HashMap<u16, HashMap<String, String>> {
        self.transmitters
            .iter()
            .map(|(universe, transmitter)| {
                let mut status = transmitter.status();
                status.insert("mode".to_string(), self.mode.clone());
                (*universe, status)
            })
            .collect()
    }
}
