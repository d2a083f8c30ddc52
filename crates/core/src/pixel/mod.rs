pub mod pixel_effects;

pub use pixel_effects::{PixelEffect, PixelEffectType};
