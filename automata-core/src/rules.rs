//! # Rule Table
//!
//! Birth/survival lookup tables over neighbor counts 0-8.
//!
//! Rule strings use the classic notation (`"3"` / `"23"` for Conway's
//! Life). Parsing is deliberately lenient: only ASCII digits 0-8 enable a
//! count, every other character is skipped without complaint.

use std::fmt;

use crate::config::RuleConfig;
use crate::MAX_NEIGHBORS;

/// Membership table indexed by neighbor count
pub type CountTable = [bool; MAX_NEIGHBORS + 1];

/// Parse a rule string into a neighbor-count table
pub fn parse_rule_string(s: &str) -> CountTable {
    let mut table = [false; MAX_NEIGHBORS + 1];
    for digit in s.chars().filter_map(|c| c.to_digit(10)) {
        let count = digit as usize;
        if count <= MAX_NEIGHBORS {
            table[count] = true;
        }
    }
    table
}

/// Birth and survival tables for a Life-like automaton
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuleTable {
    birth: CountTable,
    survive: CountTable,
}

impl RuleTable {
    /// Build from rule strings
    pub fn from_strings(birth: &str, survive: &str) -> Self {
        Self {
            birth: parse_rule_string(birth),
            survive: parse_rule_string(survive),
        }
    }

    pub fn from_config(rules: &RuleConfig) -> Self {
        Self::from_strings(&rules.birth, &rules.survive)
    }

    /// Conway's Game of Life (B3/S23)
    pub fn life() -> Self {
        Self::from_strings(presets::LIFE.0, presets::LIFE.1)
    }

    #[inline]
    pub fn births(&self, neighbors: usize) -> bool {
        self.birth.get(neighbors).copied().unwrap_or(false)
    }

    #[inline]
    pub fn survives(&self, neighbors: usize) -> bool {
        self.survive.get(neighbors).copied().unwrap_or(false)
    }

    /// Next state for a cell given its own state and live neighbor count
    #[inline]
    pub fn next_state(&self, alive: bool, neighbors: usize) -> bool {
        if alive {
            self.survives(neighbors)
        } else {
            self.births(neighbors)
        }
    }

    pub fn birth_table(&self) -> &CountTable {
        &self.birth
    }

    pub fn survive_table(&self) -> &CountTable {
        &self.survive
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::life()
    }
}

impl fmt::Display for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = |table: &CountTable| -> String {
            table
                .iter()
                .enumerate()
                .filter(|(_, &on)| on)
                .map(|(n, _)| char::from(b'0' + n as u8))
                .collect()
        };
        write!(f, "B{}/S{}", digits(&self.birth), digits(&self.survive))
    }
}

/// Common Life-like rule strings as (birth, survive)
pub mod presets {
    /// Game of Life (B3/S23) - classic rules
    pub const LIFE: (&str, &str) = ("3", "23");

    /// HighLife (B36/S23) - Life with replicators
    pub const HIGH_LIFE: (&str, &str) = ("36", "23");

    /// Seeds (B2/S) - every live cell dies each step
    pub const SEEDS: (&str, &str) = ("2", "");

    /// Day & Night (B3678/S34678) - symmetric under inversion
    pub const DAY_NIGHT: (&str, &str) = ("3678", "34678");

    /// Maze (B3/S12345) - grows maze-like corridors
    pub const MAZE: (&str, &str) = ("3", "12345");

    /// Diamoeba (B35678/S5678) - amoeba-like blobs
    pub const DIAMOEBA: (&str, &str) = ("35678", "5678");

    /// Replicator (B1357/S1357) - every pattern replicates
    pub const REPLICATOR: (&str, &str) = ("1357", "1357");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_digits() {
        let table = parse_rule_string("23");
        assert_eq!(
            table,
            [false, false, true, true, false, false, false, false, false]
        );
    }

    #[test]
    fn test_parse_ignores_non_digits() {
        let table = parse_rule_string("3a7");
        let enabled: Vec<usize> = (0..=8).filter(|&n| table[n]).collect();
        assert_eq!(enabled, vec![3, 7]);
    }

    #[test]
    fn test_parse_ignores_nine() {
        let table = parse_rule_string("9");
        assert!(table.iter().all(|&on| !on));
    }

    #[test]
    fn test_parse_empty_and_notation() {
        assert!(parse_rule_string("").iter().all(|&on| !on));
        assert_eq!(parse_rule_string("B3/S"), parse_rule_string("3"));
    }

    #[test]
    fn test_life_transitions() {
        let rules = RuleTable::life();
        assert!(rules.next_state(false, 3));
        assert!(!rules.next_state(false, 2));
        assert!(rules.next_state(true, 2));
        assert!(rules.next_state(true, 3));
        assert!(!rules.next_state(true, 4));
        assert!(!rules.next_state(true, 1));
    }

    #[test]
    fn test_out_of_range_count_is_false() {
        let rules = RuleTable::from_strings("012345678", "012345678");
        assert!(!rules.births(9));
        assert!(!rules.survives(42));
    }

    #[test]
    fn test_display() {
        assert_eq!(RuleTable::life().to_string(), "B3/S23");
        let seeds = RuleTable::from_strings(presets::SEEDS.0, presets::SEEDS.1);
        assert_eq!(seeds.to_string(), "B2/S");
    }
}
