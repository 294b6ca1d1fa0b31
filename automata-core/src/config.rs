//! # Configuration - The Automaton's Parameters
//!
//! Grid size, rules, seeding, cascade shape and timing. The visual section
//! is carried for the host's renderer only; nothing in the automaton's
//! logical state reads it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AutomataError, AutomataResult};

/// Shortest tick interval a host timer can be asked for
pub const MIN_TICK_INTERVAL: Duration = Duration::from_nanos(1);

/// Longest tick interval accepted by `validate` (one year)
pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(365 * 24 * 3600);

/// Master configuration for the automaton
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AutomataConfig {
    /// Grid dimensions
    pub grid: GridConfig,

    /// Birth/survival rule strings
    pub rules: RuleConfig,

    /// Initial population
    pub seeding: SeedConfig,

    /// Partition cascade settings
    pub cascade: CascadeConfig,

    /// Step timing
    pub timing: TimingConfig,

    /// Renderer-only tuning
    pub visual: VisualConfig,
}

/// Grid dimensions, in clusters and cells per cluster
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridConfig {
    /// Horizontal dimension of the grid of clusters
    pub x_clusters: usize,

    /// Vertical dimension of the grid of clusters
    pub z_clusters: usize,

    /// Cluster tile width in cells
    pub x_cells_per_cluster: usize,

    /// Cluster tile height in cells
    pub z_cells_per_cluster: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            x_clusters: 300,
            z_clusters: 300,
            x_cells_per_cluster: 2,
            z_cells_per_cluster: 2,
        }
    }
}

/// Rule strings in classic notation
///
/// Non-digit characters are accepted and ignored, so `"B3"` and `"3"`
/// are equivalent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Neighbor counts that bring a dead cell to life
    pub birth: String,

    /// Neighbor counts that keep a live cell alive
    pub survive: String,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            birth: "3".to_string(),
            survive: "23".to_string(),
        }
    }
}

/// Initial population settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeedConfig {
    /// Probability that a cell starts alive. Functionally ranges from 0 to 1.
    pub probability: f32,

    /// Fixed RNG seed (entropy when absent)
    pub seed: Option<u64>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            probability: 0.4,
            seed: None,
        }
    }
}

/// How partitions are cascaded and how the host ticks them
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Number of cascade partitions / output batches
    pub divisions: usize,

    /// Worker threads for per-cell evaluation (0 = one per core)
    pub worker_threads: usize,

    /// What each host tick does
    pub tick_mode: TickMode,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            divisions: 2,
            worker_threads: 0,
            tick_mode: TickMode::PerStep,
        }
    }
}

/// What a single host tick does
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickMode {
    /// Every tick completes a full step
    PerStep,
    /// `divisions` ticks publish one batch each, the next one completes the step
    Staggered,
}

/// Step timing
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Wall-clock seconds per automaton step
    pub step_period: f32,

    /// How many steps a dead cell takes to fade out (renderer only)
    pub steps_to_fade: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            step_period: 0.01,
            steps_to_fade: 1000.0,
        }
    }
}

/// Renderer tuning, handed through untouched
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisualConfig {
    /// Fade curve exponent; 1 fades linearly, higher fades faster at first
    pub phase_exponent: f32,

    /// Emissive strength of live cells
    pub emissive_multiplier: f32,

    /// "On" state color (RGBA)
    pub on_color: [f32; 4],

    /// "Off" state color (RGBA)
    pub off_color: [f32; 4],

    /// Spacing between adjacent clusters in world units
    pub offset: f32,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            phase_exponent: 201.0,
            emissive_multiplier: 20.0,
            on_color: [0.6, 0.0, 0.6, 1.0],
            off_color: [0.0, 0.0, 0.0, 1.0],
            offset: 1.0,
        }
    }
}

impl VisualConfig {
    /// Emissive color of a cell at a fade phase (0 = lit, 1 = faded)
    pub fn shade(&self, phase: f32) -> [f32; 4] {
        let glow = (1.0 - phase.clamp(0.0, 1.0)).powf(self.phase_exponent);
        let mut color = [0.0; 4];
        for (i, c) in color.iter_mut().enumerate() {
            let mixed = self.off_color[i] + (self.on_color[i] - self.off_color[i]) * glow;
            *c = if i < 3 { mixed * self.emissive_multiplier } else { mixed };
        }
        color
    }
}

impl AutomataConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &str) -> AutomataResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::info!("Loaded configuration from {}", path);
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &str) -> AutomataResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved configuration to {}", path);
        Ok(())
    }

    /// Small deterministic grid, handy for tests and demos
    pub fn small(x_clusters: usize, z_clusters: usize, divisions: usize) -> Self {
        let mut config = Self::default();
        config.grid.x_clusters = x_clusters;
        config.grid.z_clusters = z_clusters;
        config.cascade.divisions = divisions;
        config.seeding.seed = Some(0x5eed);
        config
    }

    /// Create config from environment variables
    ///
    /// Reads (all optional, unparseable values are ignored):
    /// - AUTOMATA_X_CLUSTERS / AUTOMATA_Z_CLUSTERS: grid size in clusters
    /// - AUTOMATA_CELLS_PER_CLUSTER: square cluster tile size
    /// - AUTOMATA_DIVISIONS: cascade partitions
    /// - AUTOMATA_PROBABILITY: initial live fraction
    /// - AUTOMATA_BIRTH / AUTOMATA_SURVIVE: rule strings
    /// - AUTOMATA_STEP_PERIOD: seconds per step
    /// - AUTOMATA_STEPS_TO_FADE: fade length in steps
    /// - AUTOMATA_SEED: RNG seed
    /// - AUTOMATA_THREADS: worker threads
    /// - AUTOMATA_TICK_MODE: "step" or "staggered"
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_parse("AUTOMATA_X_CLUSTERS") {
            config.grid.x_clusters = v;
        }
        if let Some(v) = env_parse("AUTOMATA_Z_CLUSTERS") {
            config.grid.z_clusters = v;
        }
        if let Some(v) = env_parse("AUTOMATA_CELLS_PER_CLUSTER") {
            config.grid.x_cells_per_cluster = v;
            config.grid.z_cells_per_cluster = v;
        }
        if let Some(v) = env_parse("AUTOMATA_DIVISIONS") {
            config.cascade.divisions = v;
        }
        if let Some(v) = env_parse("AUTOMATA_THREADS") {
            config.cascade.worker_threads = v;
        }
        if let Some(v) = env_parse("AUTOMATA_PROBABILITY") {
            config.seeding.probability = v;
        }
        if let Some(v) = env_parse("AUTOMATA_SEED") {
            config.seeding.seed = Some(v);
        }
        if let Ok(v) = std::env::var("AUTOMATA_BIRTH") {
            config.rules.birth = v;
        }
        if let Ok(v) = std::env::var("AUTOMATA_SURVIVE") {
            config.rules.survive = v;
        }
        if let Some(v) = env_parse("AUTOMATA_STEP_PERIOD") {
            config.timing.step_period = v;
        }
        if let Some(v) = env_parse("AUTOMATA_STEPS_TO_FADE") {
            config.timing.steps_to_fade = v;
        }
        match std::env::var("AUTOMATA_TICK_MODE").map(|s| s.to_lowercase()).as_deref() {
            Ok("staggered") => config.cascade.tick_mode = TickMode::Staggered,
            Ok("step") => config.cascade.tick_mode = TickMode::PerStep,
            _ => {}
        }

        config
    }

    /// Reject configurations the automaton cannot be built from
    pub fn validate(&self) -> AutomataResult<()> {
        let grid = &self.grid;
        if grid.x_clusters == 0 || grid.z_clusters == 0 {
            return Err(AutomataError::config(format!(
                "grid needs at least one cluster per axis, got {}x{}",
                grid.x_clusters, grid.z_clusters
            )));
        }
        if grid.x_cells_per_cluster == 0 || grid.z_cells_per_cluster == 0 {
            return Err(AutomataError::config(format!(
                "clusters need at least one cell per axis, got {}x{}",
                grid.x_cells_per_cluster, grid.z_cells_per_cluster
            )));
        }
        if self.cascade.divisions == 0 {
            return Err(AutomataError::config("divisions must be at least 1"));
        }
        if self.checked_num_cells().is_none() {
            return Err(AutomataError::config("cell count overflows usize"));
        }
        if !self.timing.step_period.is_finite() || self.timing.step_period <= 0.0 {
            return Err(AutomataError::config(format!(
                "step_period must be a positive number of seconds, got {}",
                self.timing.step_period
            )));
        }
        if self.checked_tick_interval().is_none() {
            return Err(AutomataError::config(format!(
                "step_period {}s gives a tick interval outside {:?}..={:?}",
                self.timing.step_period, MIN_TICK_INTERVAL, MAX_TICK_INTERVAL
            )));
        }
        if !self.seeding.probability.is_finite() {
            return Err(AutomataError::config("probability must be finite"));
        }
        Ok(())
    }

    fn checked_num_cells(&self) -> Option<usize> {
        let x = self.grid.x_clusters.checked_mul(self.grid.x_cells_per_cluster)?;
        let z = self.grid.z_clusters.checked_mul(self.grid.z_cells_per_cluster)?;
        x.checked_mul(z)
    }

    pub fn num_clusters(&self) -> usize {
        self.grid.x_clusters * self.grid.z_clusters
    }

    pub fn cells_per_cluster(&self) -> usize {
        self.grid.x_cells_per_cluster * self.grid.z_cells_per_cluster
    }

    pub fn num_cells(&self) -> usize {
        self.num_clusters() * self.cells_per_cluster()
    }

    /// Interval at which the host should call `tick()`
    ///
    /// Saturates instead of panicking; `validate` rejects periods that
    /// would need to.
    pub fn tick_interval(&self) -> Duration {
        Duration::try_from_secs_f32(self.tick_seconds())
            .unwrap_or(Duration::MAX)
            .max(MIN_TICK_INTERVAL)
    }

    fn tick_seconds(&self) -> f32 {
        let period = self.timing.step_period.max(f32::EPSILON);
        match self.cascade.tick_mode {
            TickMode::PerStep => period,
            TickMode::Staggered => period / (self.cascade.divisions + 1) as f32,
        }
    }

    fn checked_tick_interval(&self) -> Option<Duration> {
        Duration::try_from_secs_f32(self.tick_seconds())
            .ok()
            .filter(|interval| *interval >= MIN_TICK_INTERVAL && *interval <= MAX_TICK_INTERVAL)
    }

    /// Fade rate the renderer applies to switched-off cells
    pub fn fade_per_second(&self) -> f32 {
        1.0 / (self.timing.step_period * self.timing.steps_to_fade)
    }

    /// Switch-off time written before the first step: long since faded out
    pub fn initial_switch_time(&self) -> f32 {
        -2.0 * (self.timing.step_period * self.timing.steps_to_fade)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
