//! Run-time configuration of the interpreter and its driver.
use std::time::Duration;

use crate::definitions::{cpu, timer};

/// The points where historical implementations of the chip8 disagree.
///
/// The toggles only change how single opcodes behave, so they can be swapped
/// between two steps without resetting any other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// `8XY6` / `8XYE`: copy `VY` into `VX` before shifting.
    pub shift: bool,
    /// `BNNN`: jump to `VX + NNN` (with `X` taken from the high nibble of `NNN`)
    /// instead of `V0 + NNN`.
    pub jump_offset: bool,
    /// `FX55` / `FX65`: leave `I` at `I + X + 1` after the transfer.
    pub index_increment: bool,
}

impl Quirks {
    /// No quirk enabled.
    pub const NONE: Quirks = Quirks {
        shift: false,
        jump_offset: false,
        index_increment: false,
    };

    /// The behaviour of the original COSMAC VIP interpreter.
    pub const COSMAC_VIP: Quirks = Quirks {
        shift: true,
        jump_offset: false,
        index_increment: true,
    };

    /// The behaviour of CHIP-48 and its SUPER-CHIP descendants.
    pub const CHIP48: Quirks = Quirks {
        shift: false,
        jump_offset: true,
        index_increment: false,
    };
}

impl Default for Quirks {
    fn default() -> Self {
        Self {
            shift: true,
            jump_offset: true,
            index_increment: true,
        }
    }
}

/// The configuration used by the [`Runner`](crate::Runner).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// How many instructions are executed per timer tick.
    pub instructions_per_tick: usize,
    /// The wall clock time between two ticks.
    pub tick_interval: Duration,
    pub quirks: Quirks,
}

impl RunnerConfig {
    pub fn with_instructions_per_tick(mut self, instructions_per_tick: usize) -> Self {
        self.instructions_per_tick = instructions_per_tick;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_quirks(mut self, quirks: Quirks) -> Self {
        self.quirks = quirks;
        self
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            instructions_per_tick: cpu::INSTRUCTIONS_PER_TICK,
            tick_interval: Duration::from_nanos(timer::INTERVAL),
            quirks: Quirks::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_enables_all_quirks() {
        let quirks = Quirks::default();
        assert!(quirks.shift);
        assert!(quirks.jump_offset);
        assert!(quirks.index_increment);
    }

    #[test]
    fn test_runner_config_builder() {
        let config = RunnerConfig::default()
            .with_instructions_per_tick(20)
            .with_tick_interval(Duration::from_millis(5))
            .with_quirks(Quirks::CHIP48);

        assert_eq!(config.instructions_per_tick, 20);
        assert_eq!(config.tick_interval, Duration::from_millis(5));
        assert_eq!(config.quirks, Quirks::CHIP48);
    }

    #[test]
    fn test_runner_config_default_rate() {
        let config = RunnerConfig::default();
        assert_eq!(config.instructions_per_tick, cpu::INSTRUCTIONS_PER_TICK);
        assert_eq!(config.tick_interval, Duration::from_nanos(16_666_666));

        let herz = 1.0 / config.tick_interval.as_secs_f64();
        assert!((herz - timer::HERZ as f64).abs() < 0.01, "ticking at {} Hz", herz);
    }
}
