//! Shared configuration for terrain path painting
//!
//! This crate provides the single source of truth for brush defaults,
//! modifier parameters, preview timing and compute kernel setup. The
//! painting crate builds its brush, modifier stack and preview transaction
//! from a [`PaintConfig`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Default brush width in world units
pub const DEFAULT_BRUSH_WIDTH: f32 = 5.0;

/// Smallest brush width accepted
pub const MIN_BRUSH_WIDTH: f32 = 0.1;

/// Default path sampling density (samples per world unit of arc length)
pub const DEFAULT_SAMPLING_DENSITY: f32 = 1.0;

/// Legal sampling density range
pub const SAMPLING_DENSITY_RANGE: (f32, f32) = (0.1, 5.0);

/// Default bank blend width in world units
pub const DEFAULT_BANK_WIDTH: f32 = 10.0;

/// Number of texels in the bank curve lookup image
pub const DEFAULT_CURVE_RESOLUTION: u32 = 256;

/// Minimum time between two preview repaints
pub const DEFAULT_REPAINT_INTERVAL_MS: u64 = 50;

/// Committed paints kept by the undo history
pub const DEFAULT_MAX_UNDO_LEVELS: usize = 20;

/// Compute kernel entry point
pub const DEFAULT_KERNEL_ENTRY_POINT: &str = "cs_main";

/// Workgroup edge length of the built-in kernel
pub const DEFAULT_WORKGROUP_SIZE: u32 = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse paint config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Kernel entry point must not be empty")]
    EmptyEntryPoint,
    #[error("Invalid workgroup size: {0}")]
    InvalidWorkgroupSize(u32),
}

/// How the brush turns a path into a footprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum PaintMode {
    /// Paint a band of `width` around the path (road building)
    #[default]
    StrokePath = 0,
    /// Paint the area enclosed by the path (lake flattening)
    FillPolygon = 1,
}

impl PaintMode {
    /// Value bound to the kernel's `paint_mode` uniform
    pub fn as_gpu(self) -> u32 {
        self as u32
    }
}

/// Brush parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrushConfig {
    /// Footprint mode
    pub mode: PaintMode,
    /// Half width of the stroke in world units
    pub width: f32,
    /// Samples per world unit of curve arc length
    pub sampling_density: f32,
}

impl Default for BrushConfig {
    fn default() -> Self {
        Self {
            mode: PaintMode::StrokePath,
            width: DEFAULT_BRUSH_WIDTH,
            sampling_density: DEFAULT_SAMPLING_DENSITY,
        }
    }
}

/// Bank blend modifier parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Distance over which the terrain blends toward the path height
    pub width: f32,
    /// Texels in the curve lookup image
    pub curve_resolution: u32,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_BANK_WIDTH,
            curve_resolution: DEFAULT_CURVE_RESOLUTION,
        }
    }
}

/// Preview transaction timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Minimum milliseconds between repaints while dirty
    pub min_repaint_interval_ms: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            min_repaint_interval_ms: DEFAULT_REPAINT_INTERVAL_MS,
        }
    }
}

/// Undo history limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    /// Oldest entries are dropped beyond this count
    pub max_levels: usize,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_levels: DEFAULT_MAX_UNDO_LEVELS,
        }
    }
}

/// Compute kernel setup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Entry point looked up on every paint invocation
    pub entry_point: String,
    /// Edge length of the square workgroup used by the CPU reference backend
    pub workgroup_size: u32,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            entry_point: DEFAULT_KERNEL_ENTRY_POINT.to_string(),
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
        }
    }
}

/// Complete configuration for a paint tool
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaintConfig {
    pub brush: BrushConfig,
    /// Additive height offset in world units
    pub height_offset: f32,
    pub bank: BankConfig,
    pub preview: PreviewConfig,
    pub undo: UndoConfig,
    pub kernel: KernelConfig,
}

impl PaintConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: PaintConfig = serde_json::from_str(json)?;
        config.validate()
    }

    /// Serialize the config to pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamp numeric fields into their legal ranges and reject unusable kernel setup
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.kernel.entry_point.trim().is_empty() {
            return Err(ConfigError::EmptyEntryPoint);
        }
        if self.kernel.workgroup_size == 0 {
            return Err(ConfigError::InvalidWorkgroupSize(self.kernel.workgroup_size));
        }

        let width = clamp_brush_width(self.brush.width);
        if width != self.brush.width {
            warn!("Brush width {} out of range, using {}", self.brush.width, width);
            self.brush.width = width;
        }

        let density = clamp_sampling_density(self.brush.sampling_density);
        if density != self.brush.sampling_density {
            warn!(
                "Sampling density {} out of range, using {}",
                self.brush.sampling_density, density
            );
            self.brush.sampling_density = density;
        }

        self.bank.width = self.bank.width.max(0.0);
        self.bank.curve_resolution = self.bank.curve_resolution.max(2);
        self.undo.max_levels = self.undo.max_levels.max(1);

        Ok(self)
    }
}

/// Floor a brush width at [`MIN_BRUSH_WIDTH`]
pub fn clamp_brush_width(width: f32) -> f32 {
    if width.is_nan() {
        return DEFAULT_BRUSH_WIDTH;
    }
    width.max(MIN_BRUSH_WIDTH)
}

/// Clamp a sampling density into [`SAMPLING_DENSITY_RANGE`]
pub fn clamp_sampling_density(density: f32) -> f32 {
    if density.is_nan() {
        return DEFAULT_SAMPLING_DENSITY;
    }
    density.clamp(SAMPLING_DENSITY_RANGE.0, SAMPLING_DENSITY_RANGE.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PaintConfig::default();
        assert_eq!(config.brush.width, DEFAULT_BRUSH_WIDTH);
        assert_eq!(config.brush.sampling_density, DEFAULT_SAMPLING_DENSITY);
        assert_eq!(config.brush.mode, PaintMode::StrokePath);
        assert_eq!(config.height_offset, 0.0);
        assert_eq!(config.bank.width, DEFAULT_BANK_WIDTH);
        assert_eq!(config.bank.curve_resolution, 256);
        assert_eq!(config.preview.min_repaint_interval_ms, 50);
        assert_eq!(config.undo.max_levels, 20);
        assert_eq!(config.kernel.entry_point, "cs_main");
    }

    #[test]
    fn test_from_json_partial() {
        let config = PaintConfig::from_json(
            r#"{ "brush": { "width": 12.5, "mode": "FillPolygon" }, "height_offset": 3.0 }"#,
        )
        .unwrap();
        assert_eq!(config.brush.width, 12.5);
        assert_eq!(config.brush.mode, PaintMode::FillPolygon);
        assert_eq!(config.brush.sampling_density, DEFAULT_SAMPLING_DENSITY);
        assert_eq!(config.height_offset, 3.0);
        assert_eq!(config.bank.width, DEFAULT_BANK_WIDTH);
    }

    #[test]
    fn test_validate_clamps_ranges() {
        let mut config = PaintConfig::default();
        config.brush.width = 0.0;
        config.brush.sampling_density = 50.0;
        config.bank.width = -4.0;
        config.undo.max_levels = 0;

        let config = config.validate().unwrap();
        assert_eq!(config.undo.max_levels, 1);
        assert_eq!(config.brush.width, MIN_BRUSH_WIDTH);
        assert_eq!(config.brush.sampling_density, 5.0);
        assert_eq!(config.bank.width, 0.0);
    }

    #[test]
    fn test_validate_rejects_empty_entry_point() {
        let mut config = PaintConfig::default();
        config.kernel.entry_point = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyEntryPoint)));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            PaintConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_keeps_mode() {
        let mut config = PaintConfig::default();
        config.brush.mode = PaintMode::FillPolygon;
        let json = config.to_json().unwrap();
        let parsed = PaintConfig::from_json(&json).unwrap();
        assert_eq!(parsed.brush.mode, PaintMode::FillPolygon);
    }
}
