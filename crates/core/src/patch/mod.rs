pub mod grid_painter;
pub mod lighting_patch;

pub use grid_painter::GridPainter;
pub use lighting_patch::{
    Axis, Fixture, FixtureId, FrameSink, LightingPatch, LineOutcome, UniverseLayout,
};
