//! Static effect registry.
//!
//! Every effect the deck can render is a variant of [`EffectId`]. The
//! variant order is the canonical registry order, which is also the order
//! passes run in: all coordinate-mapping effects first, then color effects.

mod library;

use anyhow::anyhow;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Where in the sampling chain an effect acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Transforms the sample coordinate before the pixel is read.
    Mapping,
    /// Transforms the pixel value after it is read.
    Color,
}

/// Closed set of effect identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub enum EffectId {
    Mirror,
    Kaleidoscope,
    Wave,
    ZoomPulse,
    Swirl,
    Pixelate,
    Invert,
    Grayscale,
    Sepia,
    Posterize,
    HueRotate,
    Vignette,
    RgbSplit,
}

impl EffectId {
    pub const COUNT: usize = 13;

    /// All effects in registry order.
    pub const ALL: [EffectId; EffectId::COUNT] = [
        EffectId::Mirror,
        EffectId::Kaleidoscope,
        EffectId::Wave,
        EffectId::ZoomPulse,
        EffectId::Swirl,
        EffectId::Pixelate,
        EffectId::Invert,
        EffectId::Grayscale,
        EffectId::Sepia,
        EffectId::Posterize,
        EffectId::HueRotate,
        EffectId::Vignette,
        EffectId::RgbSplit,
    ];

    /// Position in registry order, usable as an array index.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn definition(self) -> &'static EffectDefinition {
        &REGISTRY[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.definition().name
    }

    pub fn stage(self) -> Stage {
        self.definition().stage
    }

    pub fn has_intensity(self) -> bool {
        self.definition().has_intensity()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        EffectId::ALL
            .into_iter()
            .find(|id| id.name() == wanted)
            .ok_or_else(|| anyhow!("unknown effect `{}`", s))
    }
}

impl TryFrom<String> for EffectId {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Immutable description of one effect.
#[derive(Debug)]
pub struct EffectDefinition {
    pub id: EffectId,
    pub name: &'static str,
    pub stage: Stage,
    /// GLSL fragment templated into the effect's program. Mapping bodies
    /// define `vec2 map_coord(vec2 uv)`, color bodies define
    /// `vec4 map_color(vec4 color, vec2 uv)`.
    pub body: &'static str,
    /// Present exactly when the effect has a continuous intensity control.
    pub default_intensity: Option<f32>,
}

impl EffectDefinition {
    pub fn has_intensity(&self) -> bool {
        self.default_intensity.is_some()
    }
}

/// Fixed-size table indexed by [`EffectId`].
#[derive(Debug, Clone, PartialEq)]
pub struct EffectMap<T> {
    slots: [T; EffectId::COUNT],
}

impl<T> EffectMap<T> {
    pub fn from_fn(mut f: impl FnMut(EffectId) -> T) -> Self {
        Self {
            slots: std::array::from_fn(|i| f(EffectId::ALL[i])),
        }
    }

    pub fn get(&self, id: EffectId) -> &T {
        &self.slots[id.index()]
    }

    pub fn get_mut(&mut self, id: EffectId) -> &mut T {
        &mut self.slots[id.index()]
    }

    /// Entries in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (EffectId, &T)> {
        EffectId::ALL.into_iter().zip(self.slots.iter())
    }
}

impl<T: Default> Default for EffectMap<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

static REGISTRY: [EffectDefinition; EffectId::COUNT] = [
    EffectDefinition {
        id: EffectId::Mirror,
        name: "mirror",
        stage: Stage::Mapping,
        body: library::MIRROR,
        default_intensity: None,
    },
    EffectDefinition {
        id: EffectId::Kaleidoscope,
        name: "kaleidoscope",
        stage: Stage::Mapping,
        body: library::KALEIDOSCOPE,
        default_intensity: Some(1.0),
    },
    EffectDefinition {
        id: EffectId::Wave,
        name: "wave",
        stage: Stage::Mapping,
        body: library::WAVE,
        default_intensity: Some(0.5),
    },
    EffectDefinition {
        id: EffectId::ZoomPulse,
        name: "zoom-pulse",
        stage: Stage::Mapping,
        body: library::ZOOM_PULSE,
        default_intensity: Some(0.5),
    },
    EffectDefinition {
        id: EffectId::Swirl,
        name: "swirl",
        stage: Stage::Mapping,
        body: library::SWIRL,
        default_intensity: Some(0.5),
    },
    EffectDefinition {
        id: EffectId::Pixelate,
        name: "pixelate",
        stage: Stage::Mapping,
        body: library::PIXELATE,
        default_intensity: Some(0.3),
    },
    EffectDefinition {
        id: EffectId::Invert,
        name: "invert",
        stage: Stage::Color,
        body: library::INVERT,
        default_intensity: None,
    },
    EffectDefinition {
        id: EffectId::Grayscale,
        name: "grayscale",
        stage: Stage::Color,
        body: library::GRAYSCALE,
        default_intensity: Some(1.0),
    },
    EffectDefinition {
        id: EffectId::Sepia,
        name: "sepia",
        stage: Stage::Color,
        body: library::SEPIA,
        default_intensity: Some(1.0),
    },
    EffectDefinition {
        id: EffectId::Posterize,
        name: "posterize",
        stage: Stage::Color,
        body: library::POSTERIZE,
        default_intensity: Some(0.5),
    },
    EffectDefinition {
        id: EffectId::HueRotate,
        name: "hue-rotate",
        stage: Stage::Color,
        body: library::HUE_ROTATE,
        default_intensity: Some(0.5),
    },
    EffectDefinition {
        id: EffectId::Vignette,
        name: "vignette",
        stage: Stage::Color,
        body: library::VIGNETTE,
        default_intensity: Some(0.6),
    },
    EffectDefinition {
        id: EffectId::RgbSplit,
        name: "rgb-split",
        stage: Stage::Color,
        body: library::RGB_SPLIT,
        default_intensity: Some(0.3),
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_indexed_by_id() {
        for id in EffectId::ALL {
            assert_eq!(id.definition().id, id);
        }
    }

    #[test]
    fn mapping_effects_precede_color_effects() {
        let first_color = EffectId::ALL
            .iter()
            .position(|id| id.stage() == Stage::Color)
            .unwrap();
        assert!(EffectId::ALL[..first_color]
            .iter()
            .all(|id| id.stage() == Stage::Mapping));
        assert!(EffectId::ALL[first_color..]
            .iter()
            .all(|id| id.stage() == Stage::Color));
    }

    #[test]
    fn bodies_define_their_stage_entry_point() {
        for id in EffectId::ALL {
            let def = id.definition();
            match def.stage {
                Stage::Mapping => assert!(def.body.contains("vec2 map_coord(vec2 uv)"), "{}", id),
                Stage::Color => assert!(
                    def.body.contains("vec4 map_color(vec4 color, vec2 uv)"),
                    "{}",
                    id
                ),
            }
        }
    }

    #[test]
    fn names_parse_back() {
        for id in EffectId::ALL {
            assert_eq!(id.name().parse::<EffectId>().unwrap(), id);
        }
        assert_eq!("Zoom_Pulse".parse::<EffectId>().unwrap(), EffectId::ZoomPulse);
        assert!("bloom".parse::<EffectId>().is_err());
    }

    #[test]
    fn binary_effects_have_no_default_intensity() {
        assert!(!EffectId::Mirror.has_intensity());
        assert!(!EffectId::Invert.has_intensity());
        assert_eq!(EffectId::Wave.definition().default_intensity, Some(0.5));
    }
}
