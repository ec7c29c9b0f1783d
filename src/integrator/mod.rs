//! Per-pixel light transport.
//!
//! - [`IntegratorSettings`] - bounce limits, roulette, clamping
//! - [`Payload`] - hit record produced by intersection, consumed by shading
//! - [`Integrator`] - path tracing state machine and debug kernels

mod path;
mod payload;

pub use path::{Integrator, PathState, SceneView};
pub use payload::Payload;

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// Hard cap on path length.
pub const MAX_BOUNCES: u32 = 64;

/// What the per-pixel kernel computes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kernel {
    #[default]
    PathTrace,
    /// First-hit shading normal mapped to `[0, 1]`.
    Normals,
    /// First-hit base color (emission for emitters).
    Albedo,
}

impl Kernel {
    pub const ALL: [Kernel; 3] = [Kernel::PathTrace, Kernel::Normals, Kernel::Albedo];

    pub fn label(&self) -> &'static str {
        match self {
            Self::PathTrace => "Path trace",
            Self::Normals => "Normals",
            Self::Albedo => "Albedo",
        }
    }
}

/// Path integrator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    pub kernel: Kernel,
    /// Maximum number of surface interactions per path.
    pub max_depth: u32,
    /// First depth at which Russian roulette may end a path.
    /// Values `>= max_depth` disable roulette.
    pub rr_depth: u32,
    /// Per-sample luminance ceiling; 0 disables clamping.
    pub firefly_clamp: f32,
    /// Show the environment where camera rays escape.
    pub sky_visible: bool,
    /// Random sub-pixel offsets (anti-aliasing). Off = pixel centers.
    pub jitter: bool,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            kernel: Kernel::PathTrace,
            max_depth: 6,
            rr_depth: 3,
            firefly_clamp: 0.0,
            sky_visible: true,
            jitter: true,
        }
    }
}

impl IntegratorSettings {
    /// Reject settings the kernel cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 || self.max_depth > MAX_BOUNCES {
            return Err(Error::PipelineBuild(format!(
                "max_depth {} outside 1..={MAX_BOUNCES}",
                self.max_depth
            )));
        }
        if !self.firefly_clamp.is_finite() || self.firefly_clamp < 0.0 {
            return Err(Error::PipelineBuild(format!("invalid firefly clamp {}", self.firefly_clamp)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(IntegratorSettings::default().validate().is_ok());
        let bad = IntegratorSettings { max_depth: 0, ..Default::default() };
        assert!(matches!(bad.validate(), Err(Error::PipelineBuild(_))));
        let bad = IntegratorSettings { firefly_clamp: f32::NAN, ..Default::default() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_settings_json_defaults() {
        let s: IntegratorSettings = serde_json::from_str(r#"{"max_depth": 3, "kernel": "normals"}"#).unwrap();
        assert_eq!(s.max_depth, 3);
        assert_eq!(s.kernel, Kernel::Normals);
        assert_eq!(s.rr_depth, IntegratorSettings::default().rr_depth);
    }
}
