use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::UdpSocket;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::packet::{self, DmxFrame, DMX_CHANNELS};
use crate::error::TransmitError;
use crate::patch::FrameSink;

/// ~30Hz
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(33);

/// Highest universe accepted unless configured otherwise.
pub const DEFAULT_MAX_UNIVERSE: u16 = 254;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmitterState {
    Disabled,
    Enabled,
    Terminated,
}

impl TransmitterState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransmitterState::Disabled => "disabled",
            TransmitterState::Enabled => "enabled",
            TransmitterState::Terminated => "terminated",
        }
    }
}

/// Single-slot hand-off between producers and the send loop.
struct DoubleBuffer {
    front: Box<DmxFrame>,
    back: Box<DmxFrame>,
    ready: bool,
}

impl DoubleBuffer {
    fn new() -> Self {
        Self {
            front: Box::new([0; DMX_CHANNELS]),
            back: Box::new([0; DMX_CHANNELS]),
            ready: false,
        }
    }

    /// The newest write always becomes the pending frame; an unsent one is overwritten.
    fn write(&mut self, data: &[u8]) {
        self.back[..data.len()].copy_from_slice(data);
        self.back[data.len()..].fill(0);
        std::mem::swap(&mut self.front, &mut self.back);
        self.ready = true;
    }

    fn take(&mut self) -> Option<DmxFrame> {
        if !self.ready {
            return None;
        }
        self.ready = false;
        Some(*self.front)
    }
}

struct Control {
    state: TransmitterState,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// Sends one universe to one destination at a fixed rate.
///
/// Producers call [`Transmitter::submit`] as often as they like; the send loop started by
/// [`Transmitter::start`] picks up the newest frame on each tick and skips ticks where nothing
/// changed. The buffer lock is never held across the UDP send.
pub struct Transmitter {
    universe: AtomicU16,
    max_universe: u16,
    destination: SocketAddr,
    buffers: Mutex<DoubleBuffer>,
    sequence: AtomicU8,
    socket: Mutex<Option<Arc<UdpSocket>>>,
    control: Mutex<Control>,
    frames_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl Transmitter {
    /// Bind an ephemeral UDP socket for sending `universe` to `destination`.
    pub async fn bind(
        universe: u16,
        destination: SocketAddr,
        max_universe: u16,
    ) -> Result<Self, TransmitError> {
        check_universe(universe, max_universe)?;

        let socket = if destination.is_ipv4() {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
            socket.set_broadcast(true)?;
            socket
        } else {
            UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0)).await?
        };

        log::info!(
            "Art-Net transmitter created for universe {} -> {}",
            universe,
            destination
        );

        Ok(Self {
            universe: AtomicU16::new(universe),
            max_universe,
            destination,
            buffers: Mutex::new(DoubleBuffer::new()),
            sequence: AtomicU8::new(0),
            socket: Mutex::new(Some(Arc::new(socket))),
            control: Mutex::new(Control {
                state: TransmitterState::Disabled,
                shutdown: None,
                handle: None,
            }),
            frames_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        })
    }

    /// Hand a frame to the sender. Frames shorter than 512 bytes are zero-padded.
    pub fn submit(&self, data: &[u8]) -> Result<(), TransmitError> {
        if data.len() > DMX_CHANNELS {
            return Err(TransmitError::PayloadTooLarge(data.len()));
        }
        if self.state() == TransmitterState::Terminated {
            return Err(TransmitError::Closed);
        }

        self.buffers.lock().write(data);
        Ok(())
    }

    /// Send the pending frame, if any. Returns the sequence number used, or `None` when there was
    /// nothing new to send.
    pub async fn send_pending(&self) -> Result<Option<u8>, TransmitError> {
        let pending = self.buffers.lock().take();
        let Some(frame) = pending else {
            return Ok(None);
        };

        let socket = self.socket.lock().clone();
        let socket = socket.ok_or(TransmitError::Closed)?;

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        let packet = packet::encode(&frame, self.universe(), sequence)?;

        socket.send_to(&packet, self.destination).await?;
        self.frames_sent.fetch_add(1, Ordering::Relaxed);

        log::trace!(
            "Sent Art-Net packet for universe {} (sequence {})",
            self.universe(),
            sequence
        );

        Ok(Some(sequence))
    }

    /// Start the periodic send loop on the current tokio runtime. Starting a running transmitter
    /// is a no-op.
    pub fn start(self: &Arc<Self>, period: Duration) -> Result<(), TransmitError> {
        let runtime = Handle::try_current().map_err(|_| TransmitError::NoRuntime)?;
        let period = period.max(Duration::from_millis(1));

        let mut control = self.control.lock();
        match control.state {
            TransmitterState::Terminated => return Err(TransmitError::Closed),
            TransmitterState::Enabled => {
                log::debug!("Transmitter for universe {} already running", self.universe());
                return Ok(());
            }
            TransmitterState::Disabled => {}
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let transmitter = Arc::clone(self);
        let handle = runtime.spawn(async move { transmitter.run(period, shutdown_rx).await });

        control.shutdown = Some(shutdown_tx);
        control.handle = Some(handle);
        control.state = TransmitterState::Enabled;

        log::info!(
            "Transmitter for universe {} started, sending every {:?}",
            self.universe(),
            period
        );
        Ok(())
    }

    /// Cancel the send loop. Idempotent.
    pub fn stop(&self) {
        let mut control = self.control.lock();
        if self.stop_locked(&mut control) {
            log::info!("Transmitter for universe {} stopped", self.universe());
        }
    }

    /// Stop and release the socket. The transmitter cannot be restarted afterwards.
    pub fn close(&self) {
        let mut control = self.control.lock();
        if control.state == TransmitterState::Terminated {
            return;
        }
        // Cancel an in-flight send too, so the socket is released here
        if let Some(handle) = control.handle.take() {
            handle.abort();
        }
        self.stop_locked(&mut control);
        control.state = TransmitterState::Terminated;
        self.socket.lock().take();

        log::info!(
            "Transmitter for universe {} closed after sending {} frames",
            self.universe(),
            self.frames_sent()
        );
    }

    fn stop_locked(&self, control: &mut Control) -> bool {
        if control.state != TransmitterState::Enabled {
            return false;
        }
        if let Some(shutdown) = control.shutdown.take() {
            let _ = shutdown.send(true);
        }
        // The loop exits on its own once it sees the signal
        control.handle.take();
        control.state = TransmitterState::Disabled;
        true
    }

    async fn run(&self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => break,

                _ = ticker.tick() => {
                    if let Err(e) = self.send_pending().await {
                        self.send_failures.fetch_add(1, Ordering::Relaxed);
                        log::warn!(
                            "Failed to send DMX for universe {}: {}",
                            self.universe(),
                            e
                        );
                    }
                }
            }
        }

        log::debug!("Send loop for universe {} exited", self.universe());
    }

    pub fn set_universe(&self, universe: u16) -> Result<(), TransmitError> {
        check_universe(universe, self.max_universe)?;
        self.universe.store(universe, Ordering::Relaxed);
        Ok(())
    }

    pub fn universe(&self) -> u16 {
        self.universe.load(Ordering::Relaxed)
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn state(&self) -> TransmitterState {
        self.control.lock().state
    }

    pub fn has_pending(&self) -> bool {
        self.buffers.lock().ready
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    pub fn send_failures(&self) -> u64 {
        self.send_failures.load(Ordering::Relaxed)
    }

    pub fn last_sequence(&self) -> u8 {
        self.sequence.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> HashMap<String, String> {
        let mut status = HashMap::new();
        status.insert("universe".to_string(), self.universe().to_string());
        status.insert("destination".to_string(), self.destination.to_string());
        status.insert("state".to_string(), self.state().as_str().to_string());
        status.insert("frames_sent".to_string(), self.frames_sent().to_string());
        status.insert("send_failures".to_string(), self.send_failures().to_string());
        status.insert("sequence".to_string(), self.last_sequence().to_string());
        status
    }
}

impl FrameSink for Transmitter {
    fn submit(&self, frame: &[u8]) -> Result<(), TransmitError> {
        Transmitter::submit(self, frame)
    }
}

fn check_universe(universe: u16, max: u16) -> Result<(), TransmitError> {
    if universe > max {
        return Err(TransmitError::InvalidUniverse { universe, max });
    }
    Ok(())
}
