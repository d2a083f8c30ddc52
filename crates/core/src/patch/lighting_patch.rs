use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bitfrost_fixtures::{Coordinate, FixtureProfile};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::artnet::packet::{DmxFrame, DMX_CHANNELS};
use crate::error::{PatchError, TransmitError};

pub type FixtureId = u32;

/// Anything that accepts a universe frame from [`LightingPatch::publish`].
pub trait FrameSink: Send + Sync {
    fn submit(&self, frame: &[u8]) -> Result<(), TransmitError>;
}

/// How fixtures are assigned to universes when frames are built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UniverseLayout {
    /// Legacy behaviour. Channel claims wrap modulo 512, and fixtures move to the next universe
    /// whenever the running sum of their sequential ids passes 512.
    #[default]
    InsertionOrder,
    /// Start addresses are absolute across concatenated universes: address 513 is channel 1 of
    /// universe 1.
    Absolute,
}

impl UniverseLayout {
    /// Key used for the channel ownership map.
    fn channel_key(&self, address: u32) -> u32 {
        match self {
            UniverseLayout::InsertionOrder => (address - 1) % DMX_CHANNELS as u32 + 1,
            UniverseLayout::Absolute => address,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UniverseLayout::InsertionOrder => "insertion_order",
            UniverseLayout::Absolute => "absolute",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    fn step(&self, origin: Coordinate, index: usize) -> Coordinate {
        let offset = i32::try_from(index).unwrap_or(i32::MAX);
        match self {
            Axis::Horizontal => Coordinate::new(origin.x.saturating_add(offset), origin.y),
            Axis::Vertical => Coordinate::new(origin.x, origin.y.saturating_add(offset)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    pub coordinate: Coordinate,
    /// 1-based, global across concatenated universes.
    pub start_address: u32,
    pub profile: FixtureProfile,
    pub sequential_id: FixtureId,
}

/// Result of [`LightingPatch::add_line`].
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Added(usize),
    /// Fixture `failed_at` (0-based) could not be patched; every fixture added by the call was
    /// removed again.
    RolledBack { failed_at: usize, cause: PatchError },
}

impl LineOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, LineOutcome::Added(_))
    }
}

#[derive(Default)]
struct PatchState {
    fixtures: HashMap<Coordinate, Fixture>,
    channels: HashMap<u32, Coordinate>,
    next_id: FixtureId,
}

impl PatchState {
    fn insert(
        &mut self,
        layout: UniverseLayout,
        coordinate: Coordinate,
        start_address: u32,
        profile: FixtureProfile,
    ) -> Result<FixtureId, PatchError> {
        if start_address == 0 {
            return Err(PatchError::InvalidAddress(start_address));
        }
        if self.fixtures.contains_key(&coordinate) {
            return Err(PatchError::DuplicateCoordinate(coordinate));
        }

        let mut keys = Vec::with_capacity(profile.channel_count());
        for offset in 0..profile.channel_count() as u32 {
            let address = start_address
                .checked_add(offset)
                .ok_or(PatchError::InvalidAddress(start_address))?;
            let key = layout.channel_key(address);
            if let Some(owner) = self.channels.get(&key) {
                return Err(PatchError::DuplicateChannel {
                    channel: key,
                    owner: *owner,
                });
            }
            keys.push(key);
        }

        self.next_id += 1;
        let id = self.next_id;
        for key in keys {
            self.channels.insert(key, coordinate);
        }
        self.fixtures.insert(
            coordinate,
            Fixture {
                coordinate,
                start_address,
                profile,
                sequential_id: id,
            },
        );
        Ok(id)
    }

    fn remove(&mut self, coordinate: Coordinate) -> Result<Fixture, PatchError> {
        let fixture = self
            .fixtures
            .remove(&coordinate)
            .ok_or(PatchError::FixtureNotFound(coordinate))?;
        self.channels.retain(|_, owner| *owner != coordinate);
        Ok(fixture)
    }

    fn ordered(&self) -> Vec<&Fixture> {
        let mut fixtures: Vec<&Fixture> = self.fixtures.values().collect();
        fixtures.sort_by_key(|f| f.sequential_id);
        fixtures
    }
}

/// Coordinate to fixture to DMX channel mapping, shared between the control surface, effect
/// generators and the publish path.
///
/// Every operation takes the patch lock for its duration. No I/O happens under the lock: frames
/// are handed to sinks after it is released.
pub struct LightingPatch {
    layout: UniverseLayout,
    state: Mutex<PatchState>,
    sinks: RwLock<HashMap<u16, Vec<Arc<dyn FrameSink>>>>,
}

impl LightingPatch {
    pub fn new() -> Self {
        Self::with_layout(UniverseLayout::default())
    }

    pub fn with_layout(layout: UniverseLayout) -> Self {
        Self {
            layout,
            state: Mutex::new(PatchState::default()),
            sinks: RwLock::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> UniverseLayout {
        self.layout
    }

    pub fn add_fixture(
        &self,
        coordinate: Coordinate,
        start_address: u32,
        profile: FixtureProfile,
    ) -> Result<FixtureId, PatchError> {
        let mut state = self.state.lock();
        let id = state.insert(self.layout, coordinate, start_address, profile)?;
        log::debug!(
            "Patched {} fixture #{} at {} (address {})",
            profile.kind(),
            id,
            coordinate,
            start_address
        );
        Ok(id)
    }

    pub fn remove_fixture(&self, coordinate: Coordinate) -> Result<(), PatchError> {
        let mut state = self.state.lock();
        state.remove(coordinate)?;
        log::debug!("Removed fixture at {}", coordinate);
        Ok(())
    }

    /// Patch `count` fixtures along `axis`, advancing the DMX address by the profile's channel
    /// count each step.
    ///
    /// The patch lock is held for the whole run, so concurrent bulk operations cannot interleave.
    /// If any fixture fails, the ones added by this call are removed in reverse order and
    /// `LineOutcome::RolledBack` is returned. `Err` means the rollback itself failed.
    pub fn add_line(
        &self,
        origin: Coordinate,
        axis: Axis,
        start_address: u32,
        count: usize,
        profile: FixtureProfile,
    ) -> Result<LineOutcome, PatchError> {
        let stride = profile.channel_count() as u32;

        // The whole run has to fit in the address space before anything is patched
        let fits = count
            .checked_sub(1)
            .map_or(true, |last| {
                u32::try_from(last)
                    .ok()
                    .and_then(|i| i.checked_mul(stride))
                    .and_then(|offset| start_address.checked_add(offset))
                    .is_some()
            });
        if !fits {
            let failed_at = ((u32::MAX - start_address) / stride) as usize + 1;
            log::warn!(
                "Rejected line of {} fixtures from {}: addresses past {} do not fit",
                count,
                origin,
                u32::MAX
            );
            return Ok(LineOutcome::RolledBack {
                failed_at,
                cause: PatchError::InvalidAddress(start_address),
            });
        }

        let mut state = self.state.lock();
        let first_id = state.next_id;
        let mut added = Vec::new();

        for index in 0..count {
            let coordinate = axis.step(origin, index);
            let result = u32::try_from(index)
                .ok()
                .and_then(|i| i.checked_mul(stride))
                .and_then(|offset| start_address.checked_add(offset))
                .ok_or(PatchError::InvalidAddress(start_address))
                .and_then(|address| state.insert(self.layout, coordinate, address, profile));

            if let Err(cause) = result {
                for coordinate in added.iter().rev() {
                    state
                        .remove(*coordinate)
                        .map_err(|e| PatchError::RollbackFailed(Box::new(e)))?;
                }
                state.next_id = first_id;

                log::warn!(
                    "Rolled back line of {} fixtures from {}: fixture {} failed: {}",
                    count,
                    origin,
                    index,
                    cause
                );
                return Ok(LineOutcome::RolledBack {
                    failed_at: index,
                    cause,
                });
            }
            added.push(coordinate);
        }

        Ok(LineOutcome::Added(count))
    }

    pub fn clear_all(&self) {
        let mut state = self.state.lock();
        *state = PatchState::default();
        log::debug!("Patch cleared");
    }

    /// The fixture owning the absolute DMX `channel`.
    pub fn lookup(&self, channel: u32) -> Result<Coordinate, PatchError> {
        if channel == 0 {
            return Err(PatchError::ChannelNotFound(channel));
        }
        let state = self.state.lock();
        state
            .channels
            .get(&self.layout.channel_key(channel))
            .copied()
            .ok_or(PatchError::ChannelNotFound(channel))
    }

    pub fn fixture_location(&self, channel: u32) -> Result<String, PatchError> {
        self.lookup(channel).map(|coordinate| coordinate.to_string())
    }

    /// Write wire-order channel values into the fixture at `coordinate`.
    ///
    /// Unpatched coordinates and payloads longer than the fixture's channel count are ignored.
    pub fn set_channel_value(&self, coordinate: Coordinate, data: &[u8]) {
        let mut state = self.state.lock();
        if let Some(fixture) = state.fixtures.get_mut(&coordinate) {
            apply_values(&mut fixture.profile, data);
        }
    }

    /// Visit every fixture's profile under a single lock acquisition.
    pub fn repaint<F>(&self, mut paint: F)
    where
        F: FnMut(Coordinate, &mut FixtureProfile),
    {
        let mut state = self.state.lock();
        for fixture in state.fixtures.values_mut() {
            paint(fixture.coordinate, &mut fixture.profile);
        }
    }

    /// One frame per universe, from universe 0 up to the highest one holding a fixture.
    pub fn snapshot(&self) -> Vec<DmxFrame> {
        let frames = {
            let state = self.state.lock();
            self.render(&state)
        };

        let count = frames.keys().next_back().map_or(0, |last| *last as usize + 1);
        let mut snapshot = vec![[0u8; DMX_CHANNELS]; count];
        for (universe, frame) in frames {
            snapshot[universe as usize] = frame;
        }
        snapshot
    }

    /// All universe frames back to back.
    pub fn current_dmx_data(&self) -> Vec<u8> {
        self.snapshot().concat()
    }

    /// Universes that currently hold at least one fixture, ascending.
    pub fn universes(&self) -> Vec<u16> {
        let state = self.state.lock();
        self.render(&state).into_keys().collect()
    }

    /// Render the patch and hand each populated universe to its registered sinks. Returns the
    /// number of universes rendered.
    pub fn publish(&self) -> usize {
        let frames = {
            let state = self.state.lock();
            self.render(&state)
        };

        let sinks = self.sinks.read();
        for (universe, frame) in &frames {
            let Some(targets) = sinks.get(universe) else {
                log::trace!("No sink registered for universe {}", universe);
                continue;
            };
            for sink in targets {
                if let Err(e) = sink.submit(frame) {
                    log::warn!("Failed to submit frame for universe {}: {}", universe, e);
                }
            }
        }

        frames.len()
    }

    pub fn register_sink(&self, universe: u16, sink: Arc<dyn FrameSink>) {
        self.sinks.write().entry(universe).or_default().push(sink);
    }

    pub fn clear_sinks(&self) {
        self.sinks.write().clear();
    }

    pub fn fixture(&self, coordinate: Coordinate) -> Option<Fixture> {
        self.state.lock().fixtures.get(&coordinate).cloned()
    }

    /// All fixtures in insertion order.
    pub fn fixtures(&self) -> Vec<Fixture> {
        self.state.lock().ordered().into_iter().cloned().collect()
    }

    pub fn total_fixtures(&self) -> usize {
        self.state.lock().fixtures.len()
    }

    pub fn total_channels(&self) -> usize {
        self.state.lock().channels.len()
    }

    fn render(&self, state: &PatchState) -> BTreeMap<u16, DmxFrame> {
        let mut frames: BTreeMap<u16, DmxFrame> = BTreeMap::new();
        let mut running: u64 = 0;
        let mut bucket: u16 = 0;

        for fixture in state.ordered() {
            let index = (fixture.start_address - 1) as usize;
            let universe = match self.layout {
                UniverseLayout::InsertionOrder => {
                    running += fixture.sequential_id as u64;
                    if running > DMX_CHANNELS as u64 {
                        bucket = bucket.saturating_add(1);
                        running = 0;
                    }
                    bucket
                }
                UniverseLayout::Absolute => match u16::try_from(index / DMX_CHANNELS) {
                    Ok(universe) => universe,
                    Err(_) => {
                        log::warn!(
                            "Skipping fixture at {}: address {} is beyond the last universe",
                            fixture.coordinate,
                            fixture.start_address
                        );
                        continue;
                    }
                },
            };

            let offset = index % DMX_CHANNELS;
            let data = fixture.profile.encode();
            if offset + data.len() > DMX_CHANNELS {
                log::warn!(
                    "Skipping fixture at {}: channels {}..{} cross the end of universe {}",
                    fixture.coordinate,
                    offset + 1,
                    offset + data.len(),
                    universe
                );
                continue;
            }

            let frame = frames.entry(universe).or_insert([0; DMX_CHANNELS]);
            frame[offset..offset + data.len()].copy_from_slice(&data);
        }

        frames
    }
}

impl Default for LightingPatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode `data` into `profile` unless it is longer than the profile's channel count.
pub(crate) fn apply_values(profile: &mut FixtureProfile, data: &[u8]) -> bool {
    if data.len() > profile.channel_count() {
        return false;
    }
    profile.decode(data);
    true
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<Vec<u8>>>,
    }

    impl FrameSink for RecordingSink {
        fn submit(&self, frame: &[u8]) -> Result<(), TransmitError> {
            self.frames.lock().push(frame.to_vec());
            Ok(())
        }
    }

    fn at(x: i32, y: i32) -> Coordinate {
        Coordinate::new(x, y)
    }

    #[test]
    fn test_add_and_lookup() {
        let patch = LightingPatch::new();
        let id = patch.add_fixture(at(0, 0), 1, FixtureProfile::rgb()).unwrap();
        assert_eq!(id, 1);

        assert_eq!(patch.lookup(1), Ok(at(0, 0)));
        assert_eq!(patch.lookup(3), Ok(at(0, 0)));
        assert_eq!(patch.lookup(4), Err(PatchError::ChannelNotFound(4)));
        assert_eq!(patch.fixture_location(2).unwrap(), "(0, 0)");
        assert_eq!(patch.total_fixtures(), 1);
        assert_eq!(patch.total_channels(), 3);
    }

    #[test]
    fn test_duplicate_coordinate() {
        let patch = LightingPatch::new();
        patch.add_fixture(at(1, 1), 1, FixtureProfile::rgb()).unwrap();

        assert_eq!(
            patch.add_fixture(at(1, 1), 100, FixtureProfile::rgb()),
            Err(PatchError::DuplicateCoordinate(at(1, 1)))
        );
        assert_eq!(patch.total_channels(), 3);
    }

    #[test]
    fn test_overlapping_channels_rejected_without_side_effects() {
        let patch = LightingPatch::new();
        patch.add_fixture(at(0, 0), 10, FixtureProfile::rgbw()).unwrap();

        // 8..=10 overlaps channel 10
        assert_eq!(
            patch.add_fixture(at(1, 0), 8, FixtureProfile::rgb()),
            Err(PatchError::DuplicateChannel {
                channel: 10,
                owner: at(0, 0)
            })
        );
        assert_eq!(patch.total_fixtures(), 1);
        assert_eq!(patch.total_channels(), 4);
        assert_eq!(patch.lookup(8), Err(PatchError::ChannelNotFound(8)));

        // Adjacent ranges are fine
        patch.add_fixture(at(1, 0), 7, FixtureProfile::rgb()).unwrap();
        patch.add_fixture(at(2, 0), 14, FixtureProfile::rgb()).unwrap();
        assert_eq!(patch.total_channels(), 10);
    }

    #[test]
    fn test_channel_ranges_stay_disjoint() {
        let patch = LightingPatch::new();
        for (i, address) in [1u32, 3, 4, 6, 7, 9, 12, 13].iter().enumerate() {
            let _ = patch.add_fixture(at(i as i32, 0), *address, FixtureProfile::rgb());
        }

        let fixtures = patch.fixtures();
        for a in &fixtures {
            for b in &fixtures {
                if a.coordinate == b.coordinate {
                    continue;
                }
                let a_end = a.start_address + a.profile.channel_count() as u32;
                let b_end = b.start_address + b.profile.channel_count() as u32;
                assert!(a_end <= b.start_address || b_end <= a.start_address);
            }
        }
        assert_eq!(patch.total_channels(), fixtures.len() * 3);
    }

    #[test]
    fn test_start_address_wraps_in_insertion_order_layout() {
        let patch = LightingPatch::new();
        patch.add_fixture(at(0, 0), 1, FixtureProfile::rgb()).unwrap();

        assert_eq!(
            patch.add_fixture(at(1, 0), 513, FixtureProfile::rgb()),
            Err(PatchError::DuplicateChannel {
                channel: 1,
                owner: at(0, 0)
            })
        );
        assert_eq!(patch.lookup(514), Ok(at(0, 0)));
    }

    #[test]
    fn test_zero_address_rejected() {
        let patch = LightingPatch::new();
        assert_eq!(
            patch.add_fixture(at(0, 0), 0, FixtureProfile::rgb()),
            Err(PatchError::InvalidAddress(0))
        );
        assert_eq!(patch.lookup(0), Err(PatchError::ChannelNotFound(0)));
    }

    #[test]
    fn test_remove_releases_channels() {
        let patch = LightingPatch::new();
        patch.add_fixture(at(0, 0), 1, FixtureProfile::rgbw()).unwrap();
        patch.remove_fixture(at(0, 0)).unwrap();

        assert_eq!(patch.total_channels(), 0);
        assert_eq!(
            patch.remove_fixture(at(0, 0)),
            Err(PatchError::FixtureNotFound(at(0, 0)))
        );

        patch.add_fixture(at(5, 5), 2, FixtureProfile::rgb()).unwrap();
        assert_eq!(patch.lookup(2), Ok(at(5, 5)));
    }

    #[test]
    fn test_add_line_horizontal_and_vertical() {
        let patch = LightingPatch::new();

        let outcome = patch
            .add_line(at(0, 0), Axis::Horizontal, 1, 10, FixtureProfile::rgb())
            .unwrap();
        assert_eq!(outcome, LineOutcome::Added(10));
        assert_eq!(patch.lookup(1), Ok(at(0, 0)));
        assert_eq!(patch.lookup(30), Ok(at(9, 0)));

        let outcome = patch
            .add_line(at(0, 1), Axis::Vertical, 31, 3, FixtureProfile::rgbw())
            .unwrap();
        assert!(outcome.is_added());
        assert_eq!(patch.fixture(at(0, 3)).unwrap().start_address, 39);
        assert_eq!(patch.total_channels(), 42);
    }

    #[test]
    fn test_add_line_rolls_back_on_failure() {
        let patch = LightingPatch::new();
        // Third fixture of the line would start at 7
        patch.add_fixture(at(9, 9), 8, FixtureProfile::rgb()).unwrap();
        let before = patch.fixtures();

        let outcome = patch
            .add_line(at(0, 0), Axis::Horizontal, 1, 5, FixtureProfile::rgb())
            .unwrap();

        assert_eq!(
            outcome,
            LineOutcome::RolledBack {
                failed_at: 2,
                cause: PatchError::DuplicateChannel {
                    channel: 8,
                    owner: at(9, 9)
                },
            }
        );
        assert_eq!(patch.fixtures(), before);
        assert_eq!(patch.total_channels(), 3);
        assert_eq!(patch.lookup(1), Err(PatchError::ChannelNotFound(1)));

        // Sequential ids consumed by the failed line are handed out again
        assert_eq!(
            patch.add_fixture(at(0, 0), 1, FixtureProfile::rgb()),
            Ok(2)
        );
    }

    #[test]
    fn test_add_line_with_huge_count() {
        for layout in [UniverseLayout::InsertionOrder, UniverseLayout::Absolute] {
            let patch = LightingPatch::with_layout(layout);

            let outcome = patch
                .add_line(at(0, 0), Axis::Horizontal, 1, usize::MAX, FixtureProfile::rgb())
                .unwrap();

            assert!(matches!(
                outcome,
                LineOutcome::RolledBack {
                    cause: PatchError::InvalidAddress(1),
                    ..
                }
            ));
            assert_eq!(patch.total_fixtures(), 0);
            assert_eq!(
                patch.add_fixture(at(0, 0), 1, FixtureProfile::rgb()),
                Ok(1)
            );
        }
    }

    #[test]
    fn test_add_line_rolls_back_on_duplicate_coordinate() {
        let patch = LightingPatch::new();
        patch.add_fixture(at(0, 2), 100, FixtureProfile::rgb()).unwrap();

        let outcome = patch
            .add_line(at(0, 0), Axis::Vertical, 1, 4, FixtureProfile::grb())
            .unwrap();

        assert!(matches!(
            outcome,
            LineOutcome::RolledBack {
                failed_at: 2,
                cause: PatchError::DuplicateCoordinate(_)
            }
        ));
        assert_eq!(patch.total_fixtures(), 1);
    }

    #[test]
    fn test_clear_all_is_idempotent() {
        let patch = LightingPatch::new();
        let _ = patch
            .add_line(at(0, 0), Axis::Horizontal, 1, 10, FixtureProfile::rgb())
            .unwrap();

        patch.clear_all();
        assert_eq!(patch.total_channels(), 0);
        patch.clear_all();
        assert_eq!(patch.total_channels(), 0);
        assert_eq!(patch.total_fixtures(), 0);
        assert!(patch.lookup(1).is_err());
        assert!(patch.snapshot().is_empty());
    }

    #[test]
    fn test_set_channel_value_round_trip() {
        let patch = LightingPatch::new();
        patch.add_fixture(at(0, 0), 1, FixtureProfile::rgb()).unwrap();
        patch.add_fixture(at(1, 0), 20, FixtureProfile::rgb()).unwrap();

        patch.set_channel_value(at(1, 0), &[10, 20, 30]);

        let frames = patch.snapshot();
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][19..22], &[10, 20, 30]);
        assert_eq!(&frames[0][0..3], &[0, 0, 0]);
    }

    #[test]
    fn test_set_channel_value_ignores_invalid_writes() {
        let patch = LightingPatch::new();
        patch.add_fixture(at(0, 0), 1, FixtureProfile::rgb()).unwrap();
        patch.set_channel_value(at(0, 0), &[1, 2, 3]);

        patch.set_channel_value(at(0, 0), &[9, 9, 9, 9]);
        patch.set_channel_value(at(4, 4), &[9, 9, 9]);

        assert_eq!(&patch.snapshot()[0][0..3], &[1, 2, 3]);
    }

    #[test]
    fn test_grb_fixture_frame_bytes() {
        let patch = LightingPatch::new();
        patch.add_fixture(at(0, 0), 5, FixtureProfile::grb()).unwrap();
        patch.repaint(|_, profile| profile.set_color(255, 128, 0));

        assert_eq!(&patch.snapshot()[0][4..7], &[128, 255, 0]);
    }

    #[test]
    fn test_insertion_order_bucketing() {
        let patch = LightingPatch::new();
        let _ = patch
            .add_line(at(0, 0), Axis::Horizontal, 1, 33, FixtureProfile::rgb())
            .unwrap();

        // Ids 1..=31 sum to 496; adding id 32 passes 512 and moves on to universe 1
        patch.set_channel_value(at(30, 0), &[7, 7, 7]);
        patch.set_channel_value(at(31, 0), &[1, 2, 3]);

        let frames = patch.snapshot();
        assert_eq!(frames.len(), 2);
        assert_eq!(patch.universes(), vec![0, 1]);
        assert_eq!(&frames[0][90..93], &[7, 7, 7]);
        assert_eq!(&frames[1][93..96], &[1, 2, 3]);
        assert_eq!(&frames[0][93..96], &[0, 0, 0]);
    }

    #[test]
    fn test_absolute_layout_buckets_by_address() {
        let patch = LightingPatch::with_layout(UniverseLayout::Absolute);
        patch.add_fixture(at(0, 0), 1, FixtureProfile::rgb()).unwrap();
        patch.add_fixture(at(1, 0), 513, FixtureProfile::rgb()).unwrap();
        patch.set_channel_value(at(1, 0), &[4, 5, 6]);

        let frames = patch.snapshot();
        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[1][0..3], &[4, 5, 6]);
        assert_eq!(patch.lookup(513), Ok(at(1, 0)));
        assert_eq!(patch.current_dmx_data().len(), 1024);
        assert_eq!(patch.universes(), vec![0, 1]);
    }

    #[test]
    fn test_fixture_crossing_universe_end_is_skipped() {
        let patch = LightingPatch::new();
        patch.add_fixture(at(0, 0), 511, FixtureProfile::rgb()).unwrap();
        patch.add_fixture(at(1, 0), 1, FixtureProfile::rgbw()).unwrap_err();
        patch.add_fixture(at(1, 0), 10, FixtureProfile::rgb()).unwrap();
        patch.repaint(|_, profile| profile.set_color(1, 1, 1));

        let frames = patch.snapshot();
        assert_eq!(&frames[0][9..12], &[1, 1, 1]);
        assert_eq!(&frames[0][510..512], &[0, 0]);
    }

    #[test]
    fn test_publish_reaches_registered_sinks() {
        let patch = LightingPatch::with_layout(UniverseLayout::Absolute);
        let universe_0 = Arc::new(RecordingSink::default());
        let universe_1 = Arc::new(RecordingSink::default());
        patch.register_sink(0, universe_0.clone());
        patch.register_sink(1, universe_1.clone());

        // Empty patch: nothing emitted
        assert_eq!(patch.publish(), 0);

        patch.add_fixture(at(0, 0), 1, FixtureProfile::rgb()).unwrap();
        patch.set_channel_value(at(0, 0), &[10, 20, 30]);
        assert_eq!(patch.publish(), 1);

        let frames = universe_0.frames.lock();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), DMX_CHANNELS);
        assert_eq!(&frames[0][0..3], &[10, 20, 30]);
        assert!(universe_1.frames.lock().is_empty());
    }

    #[test]
    fn test_concurrent_mutation_and_publish() {
        let patch = Arc::new(LightingPatch::with_layout(UniverseLayout::Absolute));
        let sink = Arc::new(RecordingSink::default());
        patch.register_sink(0, sink.clone());

        let writers: Vec<_> = (0..4)
            .map(|row| {
                let patch = Arc::clone(&patch);
                thread::spawn(move || {
                    let start = 1 + row as u32 * 30;
                    let _ = patch
                        .add_line(at(0, row), Axis::Horizontal, start, 10, FixtureProfile::rgb())
                        .unwrap();
                    for value in 0..50u8 {
                        for x in 0..10 {
                            patch.set_channel_value(at(x, row), &[value, value, value]);
                        }
                        patch.publish();
                    }
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(patch.total_fixtures(), 40);
        assert_eq!(patch.total_channels(), 120);
        let last = patch.snapshot();
        assert!(last[0][..120].iter().all(|&b| b == 49));
        assert!(!sink.frames.lock().is_empty());
    }
}
