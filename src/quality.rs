use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Recognition-engine tuning parameters trading speed for accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    pub beam_size: u32,
    pub vad_filter: bool,
    pub word_timestamps: bool,
}

impl QualityProfile {
    pub const FAST: Self = Self {
        beam_size: 1,
        vad_filter: false,
        word_timestamps: false,
    };

    pub const BALANCED: Self = Self {
        beam_size: 3,
        vad_filter: true,
        word_timestamps: false,
    };

    pub const QUALITY: Self = Self {
        beam_size: 5,
        vad_filter: true,
        word_timestamps: true,
    };

    /// Resolve a quality label into a profile.
    ///
    /// Matching is case-insensitive. This is total: any label other than `fast` or `quality`
    /// resolves to the balanced preset. Use [`Quality::from_str`] where a strict check is wanted.
    pub fn resolve(label: &str) -> Self {
        match Quality::from_str(label) {
            Ok(quality) => quality.profile(),
            Err(_) => Self::BALANCED,
        }
    }
}

/// The named quality presets accepted at the command surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Quality {
    Fast,
    #[default]
    Balanced,
    Quality,
}

impl Quality {
    pub fn profile(self) -> QualityProfile {
        match self {
            Quality::Fast => QualityProfile::FAST,
            Quality::Balanced => QualityProfile::BALANCED,
            Quality::Quality => QualityProfile::QUALITY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Quality::Fast => "fast",
            Quality::Balanced => "balanced",
            Quality::Quality => "quality",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Quality::Fast),
            "balanced" => Ok(Quality::Balanced),
            "quality" => Ok(Quality::Quality),
            _ => Err(Error::InvalidQuality(s.to_owned())),
        }
    }
}
