//! Tunable constants for the simulation and their validation.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{geometry::range_map, BoardGeometry, ImageRef};

/// Placeholder avatar used when a gift arrives without one.
pub const DEFAULT_AVATAR_URL: &str =
    "https://i.pinimg.com/736x/9f/16/72/9f1672710cba6bcb0dfd93201c6d4c00.jpg";

/// Reasons a [`SimulationConfig`] may be rejected.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The board must have at least one peg row.
    #[error("the board needs at least one row")]
    ZeroRows,
    /// The token pool must hold at least one token.
    #[error("pool_capacity must be positive")]
    ZeroPoolCapacity,
    /// The completed-gift history must keep at least one entry.
    #[error("history_capacity must be positive")]
    ZeroHistoryCapacity,
    /// The drain timer cannot fire with a zero period.
    #[error("drain_period_ms must be positive")]
    ZeroDrainPeriod,
    /// Synthetic test gifts must owe at least one token.
    #[error("test_gift_weight must be positive")]
    ZeroTestGiftWeight,
    /// Token size drives every spacing constant and must be positive.
    #[error("token_size must be positive (received {0})")]
    NonPositiveTokenSize(String),
    /// The scoring table must have exactly one slot per bin.
    #[error("bin table has {actual} slots but a {rows}-row board needs {expected}")]
    BinTableMismatch {
        /// Configured number of rows.
        rows: u32,
        /// Slots required for the configured rows.
        expected: usize,
        /// Slots present in the table.
        actual: usize,
    },
    /// Tokens would stop advancing through the peg rows.
    #[error("max_bounce_step must be positive (received {0})")]
    NonPositiveBounceCap(String),
    /// The bounce curve must stay positive for every weight from 1 upwards.
    #[error("bounce_step curve must be positive for every weight (received {0} at weight {1})")]
    NonPositiveBounceCurve(String, u32),
    /// Falling tokens must never slow down.
    #[error("fall_acceleration must be at least 1 (received {0})")]
    FallAccelerationBelowOne(String),
    /// Falling tokens need a positive speed cap.
    #[error("max_fall_speed must be positive (received {0})")]
    NonPositiveFallSpeedCap(String),
    /// A negative initial fall speed would carry tokens upwards forever.
    #[error("fall_speed curve must not be negative (received {0} at weight {1})")]
    NegativeFallCurve(String, u32),
    /// A colour string could not be parsed as `#rrggbb`.
    #[error("'{0}' is not a #rrggbb colour")]
    InvalidColor(String),
}

/// Display colour assigned to a scoring bin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BinColor {
    red: u8,
    green: u8,
    blue: u8,
}

impl BinColor {
    /// Creates a colour from byte RGB components.
    #[must_use]
    pub const fn from_rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parses a `#rrggbb` string.
    pub fn parse_hex(value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidColor(value.to_owned());
        let digits = value.strip_prefix('#').ok_or_else(invalid)?;
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(invalid());
        }

        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| invalid())
        };
        Ok(Self::from_rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Red component of the colour.
    #[must_use]
    pub const fn red(&self) -> u8 {
        self.red
    }

    /// Green component of the colour.
    #[must_use]
    pub const fn green(&self) -> u8 {
        self.green
    }

    /// Blue component of the colour.
    #[must_use]
    pub const fn blue(&self) -> u8 {
        self.blue
    }
}

impl fmt::Display for BinColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

impl TryFrom<String> for BinColor {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse_hex(&value)
    }
}

impl From<BinColor> for String {
    fn from(color: BinColor) -> Self {
        color.to_string()
    }
}

/// Score value and colour of one bin.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinSlot {
    /// Points credited to a token's owner when it lands in the bin.
    pub score: u32,
    /// Colour used to paint the bin and its score labels.
    pub color: BinColor,
}

impl BinSlot {
    /// Creates a new bin slot.
    #[must_use]
    pub const fn new(score: u32, color: BinColor) -> Self {
        Self { score, color }
    }
}

/// Static mapping from bin index to score value and colour.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinScoringTable {
    slots: Vec<BinSlot>,
}

impl BinScoringTable {
    /// Creates a table from slots ordered left to right.
    #[must_use]
    pub fn new(slots: Vec<BinSlot>) -> Self {
        Self { slots }
    }

    /// Returns the slot at `index`, if the bin exists.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&BinSlot> {
        self.slots.get(index)
    }

    /// Number of bins described by the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Reports whether the table has no bins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterator over the slots from left to right.
    pub fn iter(&self) -> impl Iterator<Item = &BinSlot> {
        self.slots.iter()
    }
}

impl Default for BinScoringTable {
    fn default() -> Self {
        Self::new(default_bins())
    }
}

fn default_bins() -> Vec<BinSlot> {
    const GOLD: BinColor = BinColor::from_rgb(0xeb, 0xc1, 0x3e);
    const PURPLE: BinColor = BinColor::from_rgb(0xa2, 0x42, 0xae);
    const ORANGE: BinColor = BinColor::from_rgb(0xd0, 0x76, 0x34);
    const BLUE: BinColor = BinColor::from_rgb(0x0b, 0x8b, 0xb0);
    const GREEN: BinColor = BinColor::from_rgb(0x5c, 0xa5, 0x09);
    const GREY: BinColor = BinColor::from_rgb(0x8c, 0x8c, 0x8c);

    vec![
        BinSlot::new(100, GOLD),
        BinSlot::new(25, PURPLE),
        BinSlot::new(10, ORANGE),
        BinSlot::new(5, BLUE),
        BinSlot::new(2, GREEN),
        BinSlot::new(1, GREY),
        BinSlot::new(2, GREEN),
        BinSlot::new(5, BLUE),
        BinSlot::new(10, ORANGE),
        BinSlot::new(25, PURPLE),
        BinSlot::new(100, GOLD),
    ]
}

/// Linear mapping from a token's weight onto a speed value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightCurve {
    /// Weight mapped onto `out_min`.
    pub weight_min: f32,
    /// Weight mapped onto `out_max`.
    pub weight_max: f32,
    /// Output produced for `weight_min`.
    pub out_min: f32,
    /// Output produced for `weight_max`.
    pub out_max: f32,
}

impl WeightCurve {
    /// Evaluates the curve for `weight` without clamping.
    #[must_use]
    pub fn evaluate(&self, weight: u32) -> f32 {
        range_map(
            weight as f32,
            self.weight_min,
            self.weight_max,
            self.out_min,
            self.out_max,
        )
    }
}

/// Motion constants of the token state machine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionTuning {
    /// Initial fall speed in pixels per frame as a function of weight.
    pub fall_speed: WeightCurve,
    /// Bounce progress gained per frame as a function of weight.
    pub bounce_step: WeightCurve,
    /// Upper bound for the fall speed.
    pub max_fall_speed: f32,
    /// Upper bound for the per-frame bounce progress.
    pub max_bounce_step: f32,
    /// Factor applied to the fall speed every falling frame.
    pub fall_acceleration: f32,
}

impl MotionTuning {
    /// Fall speed assigned to a freshly initialised token of `weight`.
    #[must_use]
    pub fn initial_fall_speed(&self, weight: u32) -> f32 {
        self.fall_speed.evaluate(weight).min(self.max_fall_speed)
    }

    /// Bounce progress gained per frame by a token of `weight`.
    #[must_use]
    pub fn bounce_step(&self, weight: u32) -> f32 {
        self.bounce_step.evaluate(weight).min(self.max_bounce_step)
    }

    /// Rejects tunings under which a token could stop moving down the board.
    ///
    /// Both curves are linear, so checking the lightest and heaviest weights
    /// covers every weight in between.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_bounce_step > 0.0) {
            return Err(ConfigError::NonPositiveBounceCap(
                self.max_bounce_step.to_string(),
            ));
        }
        if !(self.max_fall_speed > 0.0) {
            return Err(ConfigError::NonPositiveFallSpeedCap(
                self.max_fall_speed.to_string(),
            ));
        }
        if !(self.fall_acceleration >= 1.0) || !self.fall_acceleration.is_finite() {
            return Err(ConfigError::FallAccelerationBelowOne(
                self.fall_acceleration.to_string(),
            ));
        }

        for weight in [1, u32::MAX] {
            let step = self.bounce_step(weight);
            if !(step > 0.0) {
                return Err(ConfigError::NonPositiveBounceCurve(step.to_string(), weight));
            }
            let speed = self.initial_fall_speed(weight);
            if !(speed >= 0.0) {
                return Err(ConfigError::NegativeFallCurve(speed.to_string(), weight));
            }
        }

        Ok(())
    }
}

impl Default for MotionTuning {
    fn default() -> Self {
        Self {
            fall_speed: WeightCurve {
                weight_min: 1.0,
                weight_max: 1000.0,
                out_min: 2.0,
                out_max: 10.0,
            },
            bounce_step: WeightCurve {
                weight_min: 1.0,
                weight_max: 1000.0,
                out_min: 0.05,
                out_max: 0.2,
            },
            max_fall_speed: 10.0,
            max_bounce_step: 0.2,
            fall_acceleration: 1.025,
        }
    }
}

/// Every tunable constant of the board, loadable from a TOML file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of peg rows. The board has `rows + 1` bins.
    pub rows: u32,
    /// Number of token slots in the fixed pool.
    pub pool_capacity: usize,
    /// Number of completed gifts retained for display.
    pub history_capacity: usize,
    /// Minimum time between a gift completing and the next gift's first spawn.
    pub min_completion_interval_ms: u64,
    /// Period of the gift-queue drain timer.
    pub drain_period_ms: u64,
    /// Lifetime of a floating score label.
    pub score_label_duration_ms: u64,
    /// Delay before the gift feed reconnects after a disconnect.
    pub reconnect_delay_ms: u64,
    /// Token diameter in pixels; all board spacing derives from it.
    pub token_size: f32,
    /// Pixel height of the first peg row.
    pub offset_y: f32,
    /// Avatar used for gifts that arrive without one.
    pub default_avatar: String,
    /// Weight of gifts injected for interactive testing.
    pub test_gift_weight: u32,
    /// Seed for the bounce direction generator.
    pub seed: u64,
    /// Motion constants of the token state machine.
    pub motion: MotionTuning,
    /// Scoring table ordered left to right; must hold `rows + 1` slots.
    pub bins: Vec<BinSlot>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            rows: 10,
            pool_capacity: 250,
            history_capacity: 6,
            min_completion_interval_ms: 1_000,
            drain_period_ms: 50,
            score_label_duration_ms: 1_000,
            reconnect_delay_ms: 3_000,
            token_size: 30.0,
            offset_y: 200.0,
            default_avatar: DEFAULT_AVATAR_URL.to_owned(),
            test_gift_weight: 100,
            seed: 0x6a09_e667_f3bc_c908,
            motion: MotionTuning::default(),
            bins: default_bins(),
        }
    }
}

impl SimulationConfig {
    /// Checks the invariants the simulation relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 {
            return Err(ConfigError::ZeroRows);
        }
        if self.pool_capacity == 0 {
            return Err(ConfigError::ZeroPoolCapacity);
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroHistoryCapacity);
        }
        if self.drain_period_ms == 0 {
            return Err(ConfigError::ZeroDrainPeriod);
        }
        if self.test_gift_weight == 0 {
            return Err(ConfigError::ZeroTestGiftWeight);
        }
        if !(self.token_size > 0.0) {
            return Err(ConfigError::NonPositiveTokenSize(self.token_size.to_string()));
        }
        self.motion.validate()?;

        let expected = self.rows as usize + 1;
        if self.bins.len() != expected {
            return Err(ConfigError::BinTableMismatch {
                rows: self.rows,
                expected,
                actual: self.bins.len(),
            });
        }

        Ok(())
    }

    /// Board geometry derived from the configured sizes.
    #[must_use]
    pub fn geometry(&self) -> BoardGeometry {
        BoardGeometry::new(self.rows, self.token_size, self.offset_y)
    }

    /// Scoring table built from the configured bins.
    #[must_use]
    pub fn scoring_table(&self) -> BinScoringTable {
        BinScoringTable::new(self.bins.clone())
    }

    /// Avatar applied to gifts without one.
    #[must_use]
    pub fn default_avatar(&self) -> ImageRef {
        ImageRef::new(self.default_avatar.clone())
    }

    /// Minimum time between a gift completing and the next spawn.
    #[must_use]
    pub const fn min_completion_interval(&self) -> Duration {
        Duration::from_millis(self.min_completion_interval_ms)
    }

    /// Period of the gift-queue drain timer.
    #[must_use]
    pub const fn drain_period(&self) -> Duration {
        Duration::from_millis(self.drain_period_ms)
    }

    /// Lifetime of a floating score label.
    #[must_use]
    pub const fn score_label_duration(&self) -> Duration {
        Duration::from_millis(self.score_label_duration_ms)
    }

    /// Delay before the gift feed reconnects.
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
