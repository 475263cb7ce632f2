//! Render configuration.
//!
//! Every knob the integrators read lives here so a render can be described by
//! a single JSON document.

use crate::{RenderError, RenderResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard upper bound on path length; also the capacity of BDPT subpaths.
pub const TRACING_DEPTH_LIMIT: usize = 16;

/// Which estimator renders the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    Ao,
    #[default]
    Path,
    LightPath,
    Bdpt,
}

/// Weighting used when next-event estimation and BSDF sampling overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MisHeuristic {
    /// `pdf1² / (pdf1² + pdf2²)`
    #[default]
    Power,
    /// Both strategies weighted one half.
    Fixed,
}

/// How a light is picked for next-event estimation and emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LightSelectStrategy {
    Uniform,
    #[default]
    ByPower,
}

/// How the choice between scene lights and the environment is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnvSelectStrategy {
    /// 50/50 whenever both are present.
    Uniform,
    /// Proportional to total light power vs. environment power.
    #[default]
    ByPower,
}

/// Render configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Image resolution in pixels
    pub width: u32,
    pub height: u32,
    /// Worker threads per pass; 0 uses every available core
    pub threads: usize,
    /// Base seed for all sample streams
    pub seed: u64,
    /// Progressive passes the CLI runs (one sample per pixel each)
    pub passes: u32,
    pub integrator: IntegratorKind,
    /// Maximum number of path segments
    pub max_depth: usize,
    /// Bounce index from which Russian roulette may terminate paths
    pub rr_start_depth: usize,
    /// Next-event estimation in the path tracer
    pub direct_light: bool,
    pub mis: MisHeuristic,
    pub light_select: LightSelectStrategy,
    pub env_select: EnvSelectStrategy,
    /// Largest `s + t` a BDPT connection may have; unset admits every path
    /// up to `max_depth` bounces
    pub bdpt_max_connect_depth: Option<usize>,
    /// BDPT `s = 1`: resample the light endpoint (true) or reuse the subpath's own vertex
    pub bdpt_resample_light: bool,
    /// Occlusion distance for the AO integrator
    pub ao_distance: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            threads: 0,
            seed: 0,
            passes: 16,
            integrator: IntegratorKind::Path,
            max_depth: 8,
            rr_start_depth: 3,
            direct_light: true,
            mis: MisHeuristic::Power,
            light_select: LightSelectStrategy::ByPower,
            env_select: EnvSelectStrategy::ByPower,
            bdpt_max_connect_depth: None,
            bdpt_resample_light: true,
            ao_distance: 1.0,
        }
    }
}

impl RenderConfig {
    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_integrator(mut self, integrator: IntegratorKind) -> Self {
        self.integrator = integrator;
        self
    }

    /// Set path length and Russian roulette start.
    pub fn with_depth(mut self, max_depth: usize, rr_start_depth: usize) -> Self {
        self.max_depth = max_depth;
        self.rr_start_depth = rr_start_depth;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_passes(mut self, passes: u32) -> Self {
        self.passes = passes;
        self
    }

    /// Largest BDPT `s + t`. Without an explicit cap this is `max_depth + 2`,
    /// the vertex count of the longest path the other integrators trace.
    pub fn bdpt_connect_depth(&self) -> usize {
        self.bdpt_max_connect_depth.unwrap_or(self.max_depth + 2)
    }

    /// Number of worker threads a pass actually uses.
    pub fn worker_threads(&self) -> usize {
        if self.threads == 0 {
            rayon::current_num_threads().max(1)
        } else {
            self.threads
        }
    }

    pub fn validate(&self) -> RenderResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidConfig(format!(
                "resolution must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.max_depth == 0 || self.max_depth > TRACING_DEPTH_LIMIT {
            return Err(RenderError::InvalidConfig(format!(
                "max_depth must be in 1..={TRACING_DEPTH_LIMIT}, got {}",
                self.max_depth
            )));
        }
        if let Some(depth) = self.bdpt_max_connect_depth {
            if !(2..=TRACING_DEPTH_LIMIT + 2).contains(&depth) {
                return Err(RenderError::InvalidConfig(format!(
                    "bdpt_max_connect_depth must be in 2..={}, got {}",
                    TRACING_DEPTH_LIMIT + 2,
                    depth
                )));
            }
        }
        if self.ao_distance.is_nan() || self.ao_distance <= 0.0 {
            return Err(RenderError::InvalidConfig(format!(
                "ao_distance must be positive, got {}",
                self.ao_distance
            )));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> RenderResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
