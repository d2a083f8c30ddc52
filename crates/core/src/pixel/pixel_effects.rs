use std::str::FromStr;

use bitfrost_fixtures::{Color, Coordinate};
use serde::{Deserialize, Serialize};

use crate::patch::GridPainter;

/// Built-in test patterns for checking a rig without an effect generator attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelEffectType {
    Solid,
    Chase,
}

impl PixelEffectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelEffectType::Solid => "solid",
            PixelEffectType::Chase => "chase",
        }
    }

    pub fn all() -> Vec<PixelEffectType> {
        vec![PixelEffectType::Solid, PixelEffectType::Chase]
    }
}

impl FromStr for PixelEffectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PixelEffectType::all()
            .into_iter()
            .find(|effect| effect.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown pattern: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelEffect {
    pub effect_type: PixelEffectType,
    pub color: Color,
    /// Chase: columns trailing the lit one, fading towards black.
    pub tail: u32,
}

impl Default for PixelEffect {
    fn default() -> Self {
        Self {
            effect_type: PixelEffectType::Solid,
            color: Color::new(255, 255, 255),
            tail: 3,
        }
    }
}

impl PixelEffect {
    pub fn new(effect_type: PixelEffectType, color: Color) -> Self {
        Self {
            effect_type,
            color,
            ..Default::default()
        }
    }

    /// Colour of one cell on render step `step`.
    pub fn color_at(&self, coordinate: Coordinate, width: u32, step: u64) -> Color {
        match self.effect_type {
            PixelEffectType::Solid => self.color,
            PixelEffectType::Chase => {
                if width == 0 || coordinate.x < 0 {
                    return Color::BLACK;
                }
                let head = (step % width as u64) as i64;
                let distance = (head - coordinate.x as i64).rem_euclid(width as i64) as u32;
                if distance > self.tail {
                    return Color::BLACK;
                }
                let fade = distance as f32 / (self.tail + 1) as f32;
                self.color.lerp(&Color::BLACK, fade)
            }
        }
    }

    /// Paint the whole grid for render step `step`.
    pub fn render(&self, painter: &GridPainter, step: u64) -> usize {
        let width = painter.width();
        painter.paint_color(|coordinate| {
            painter
                .contains(coordinate)
                .then(|| self.color_at(coordinate, width, step))
        })
    }
}
