//! Driver Configuration
//!
//! Host-side settings around the automaton's own configuration

use std::env;

use tracing::Level;

use automata_core::{AutomataConfig, AutomataResult, TickMode};

/// Driver configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Automaton parameters (from AUTOMATA_CONFIG or AUTOMATA_* variables)
    pub automaton: AutomataConfig,
    /// Stop after this many committed steps
    pub max_steps: Option<u64>,
    /// Log a status line every N committed steps
    pub report_every: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            automaton: AutomataConfig::default(),
            max_steps: None,
            report_every: 100,
        }
    }
}

impl Config {
    /// Log level only, so logging can start before anything else is read
    pub fn log_level_from_env() -> Level {
        env::var("AUTOMATA_LOG")
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(Level::INFO)
    }

    /// Create config from environment variables
    ///
    /// AUTOMATA_CONFIG names a JSON file that replaces the AUTOMATA_*
    /// automaton variables entirely.
    pub fn from_env() -> AutomataResult<Self> {
        let mut config = Self::default();

        config.automaton = match env::var("AUTOMATA_CONFIG") {
            Ok(path) => AutomataConfig::load(&path)?,
            Err(_) => {
                let automaton = AutomataConfig::from_env();
                automaton.validate()?;
                automaton
            }
        };

        if let Ok(steps) = env::var("AUTOMATA_MAX_STEPS") {
            if let Ok(s) = steps.trim().parse() {
                config.max_steps = Some(s);
            }
        }

        if let Ok(every) = env::var("AUTOMATA_REPORT_EVERY") {
            if let Ok(n) = every.trim().parse::<u64>() {
                config.report_every = n.max(1);
            }
        }

        Ok(config)
    }
}

/// Print startup banner with config info
pub fn print_banner(config: &Config) {
    let a = &config.automaton;
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║            🧫 Cascade Automaton - Headless Host          ║");
    println!("╠══════════════════════════════════════════════════════════╣");
    println!("║  Cells: {:>10}                                       ║", a.num_cells());
    println!("║  Rules: {:>10}                                       ║",
        format!("B{}/S{}", a.rules.birth, a.rules.survive)
    );
    println!("║  Partitions: {:>5}                                       ║", a.cascade.divisions);
    println!("║  Tick: {:>9.2}ms ({})                            ║",
        a.tick_interval().as_secs_f64() * 1000.0,
        match a.cascade.tick_mode {
            TickMode::PerStep => "per step ",
            TickMode::Staggered => "staggered",
        }
    );
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_default_driver_config() {
        let config = Config::default();
        assert_eq!(config.max_steps, None);
        assert_eq!(config.report_every, 100);
        assert!(config.automaton.validate().is_ok());
    }

    // tests in this module share the process environment
    static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

    const KEYS: [&str; 6] = [
        "AUTOMATA_CONFIG",
        "AUTOMATA_MAX_STEPS",
        "AUTOMATA_REPORT_EVERY",
        "AUTOMATA_DIVISIONS",
        "AUTOMATA_TICK_MODE",
        "AUTOMATA_LOG",
    ];

    fn clear_env() {
        KEYS.iter().for_each(|k| env::remove_var(k));
    }

    #[test]
    fn test_from_env_reads_host_settings() {
        let _guard = ENV_LOCK.lock();
        clear_env();

        env::set_var("AUTOMATA_MAX_STEPS", "250");
        env::set_var("AUTOMATA_REPORT_EVERY", "0");
        env::set_var("AUTOMATA_DIVISIONS", "6");
        env::set_var("AUTOMATA_TICK_MODE", "staggered");
        env::set_var("AUTOMATA_LOG", "debug");
        let config = Config::from_env().unwrap();

        assert_eq!(config.max_steps, Some(250));
        assert_eq!(config.report_every, 1);
        assert_eq!(config.automaton.cascade.divisions, 6);
        assert_eq!(config.automaton.cascade.tick_mode, TickMode::Staggered);
        assert_eq!(Config::log_level_from_env(), Level::DEBUG);

        env::set_var("AUTOMATA_MAX_STEPS", "forever");
        env::set_var("AUTOMATA_DIVISIONS", "0");
        assert!(Config::from_env().is_err());
        env::remove_var("AUTOMATA_DIVISIONS");
        assert_eq!(Config::from_env().unwrap().max_steps, None);

        clear_env();
    }

    #[test]
    fn test_config_file_replaces_variables() {
        let _guard = ENV_LOCK.lock();
        clear_env();

        let path = env::temp_dir().join(format!("automata-driver-{}.json", std::process::id()));
        let path = path.to_string_lossy().to_string();
        AutomataConfig::small(5, 4, 3).save(&path).unwrap();

        env::set_var("AUTOMATA_CONFIG", &path);
        env::set_var("AUTOMATA_DIVISIONS", "9");
        env::set_var("AUTOMATA_MAX_STEPS", "10");
        let config = Config::from_env();
        std::fs::remove_file(&path).ok();

        let config = config.unwrap();
        assert_eq!(config.automaton.cascade.divisions, 3);
        assert_eq!(config.automaton.grid.x_clusters, 5);
        assert_eq!(config.max_steps, Some(10));

        env::set_var("AUTOMATA_CONFIG", "/nonexistent/automata.json");
        assert!(Config::from_env().is_err());

        clear_env();
    }
}
