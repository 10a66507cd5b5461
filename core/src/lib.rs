#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Galton board overlay.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then broadcasts [`Event`] values for systems to
//! react to deterministically. Systems consume event streams, query immutable
//! snapshots, and respond exclusively with new command batches.

pub mod config;
pub mod geometry;

use std::{num::NonZeroU32, time::Duration};

use serde::{Deserialize, Serialize};

pub use config::{
    BinColor, BinScoringTable, BinSlot, ConfigError, MotionTuning, SimulationConfig, WeightCurve,
    DEFAULT_AVATAR_URL,
};
pub use geometry::{range_map, BoardGeometry, SurfaceSize};

/// Canonical banner emitted when the overlay boots.
pub const WELCOME_BANNER: &str = "Welcome to the Galton board.";

/// Owner assigned to gifts that arrive without a nickname.
pub const ANONYMOUS_OWNER: &str = "Anonymous";

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Updates the dimensions of the drawing surface.
    ConfigureSurface {
        /// New surface size in pixels.
        surface: SurfaceSize,
    },
    /// Advances the simulation by one frame.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Appends a validated gift to the pending queue.
    EnqueueGift {
        /// Gift describing how many tokens are owed and to whom.
        gift: GiftRequest,
    },
    /// Asks the gift queue for its next eligible spawn.
    DrainGiftQueue,
    /// Spawns a single token directly from the pool, bypassing the gift queue.
    SpawnToken {
        /// Image drawn inside the token.
        avatar: ImageRef,
        /// Weight driving the token's speeds.
        weight: NonZeroU32,
        /// Identity credited when the token lands. Empty identities are never credited.
        owner: String,
    },
    /// Clears every bin landing counter.
    ResetBinHistory,
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms the surface dimensions in use.
    SurfaceConfigured {
        /// Surface size in pixels.
        surface: SurfaceSize,
    },
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Announces that a gift joined the pending queue.
    GiftQueued {
        /// Identifier assigned to the new ticket.
        ticket: TicketId,
        /// Identity that sent the gift.
        owner: String,
        /// Number of tokens owed by the ticket.
        weight: NonZeroU32,
    },
    /// Confirms that a pooled token started a new lifecycle.
    TokenSpawned {
        /// Slot of the initialised token.
        token: TokenId,
        /// Ticket the spawn was charged against, if it came from the queue.
        ticket: Option<TicketId>,
        /// Identity the token will credit.
        owner: String,
        /// Weight of the token.
        weight: NonZeroU32,
    },
    /// Reports that an eligible spawn could not happen on this drain.
    SpawnDeferred {
        /// Ticket at the head of the queue.
        ticket: TicketId,
        /// Why the spawn was skipped.
        reason: DeferReason,
    },
    /// Announces that a ticket spawned all of its tokens and moved to history.
    GiftCompleted {
        /// Identifier of the completed ticket.
        ticket: TicketId,
        /// Identity that sent the gift.
        owner: String,
        /// Number of tokens the ticket spawned.
        weight: NonZeroU32,
    },
    /// Signals that a settling token reached the top of the board.
    TokenEnteredBoard {
        /// Token that started bouncing.
        token: TokenId,
    },
    /// Signals that a token crossed the bin line inside a scoring bin.
    TokenLanded {
        /// Token that landed.
        token: TokenId,
        /// Identity the token belongs to.
        owner: String,
        /// Index of the bin that received the token.
        bin: usize,
        /// Score awarded by the bin.
        score: u32,
    },
    /// Signals that a token crossed the bin line outside every bin.
    TokenDropped {
        /// Token that was dropped.
        token: TokenId,
        /// Identity the token belongs to.
        owner: String,
    },
    /// Signals that a token left the surface and returned to the pool.
    TokenRetired {
        /// Token that became idle.
        token: TokenId,
        /// Whether the token crossed the bin line before retiring.
        scored: bool,
    },
    /// Confirms that every bin counter was cleared.
    BinHistoryReset,
    /// Carries a freshly computed statistics report.
    StatsPublished {
        /// Report describing landings and leaders.
        report: StatsReport,
    },
}

/// Reasons an eligible drain did not spawn a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeferReason {
    /// The minimum interval since the previous completion has not elapsed.
    Throttled,
    /// Every pooled token is active.
    PoolExhausted,
}

/// Identifier of a pooled token slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(u32);

impl TokenId {
    /// Creates a new identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Identifier of a gift ticket, assigned in arrival order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(u64);

impl TicketId {
    /// Creates a new identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Reference to an image, either a URL or a local path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// Wraps the provided location.
    #[must_use]
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// Location of the image.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reports whether the reference points at a remote resource.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.0.starts_with("http://") || self.0.starts_with("https://")
    }
}

/// Lifecycle phase of a pooled token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenPhase {
    /// Parked in the pool, waiting for a spawn.
    Idle,
    /// Dropping toward the top of the board.
    Settling,
    /// Stepping down the peg rows.
    Bouncing,
    /// Below the pegs, dropping toward the bin line.
    Falling,
    /// Crossed the bin line; keeps falling until it leaves the surface.
    Scored,
}

/// Gift object as delivered by the feed, before validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftPayload {
    /// Number of tokens the gift is worth.
    #[serde(default)]
    pub diamond_count: Option<i64>,
    /// Sender avatar URL.
    #[serde(default)]
    pub avatar: Option<String>,
    /// Sender display name.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Number of gifts in the combo.
    #[serde(default)]
    pub gift_amount: Option<i64>,
    /// Gift artwork URL.
    #[serde(default)]
    pub gift_image: Option<String>,
    /// Human readable gift name.
    #[serde(default)]
    pub gift_name: Option<String>,
}

/// Display-only details carried alongside a gift.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftMetadata {
    /// Human readable gift name.
    pub gift_name: Option<String>,
    /// Number of gifts in the combo.
    pub gift_amount: Option<i64>,
    /// Gift artwork.
    pub gift_image: Option<ImageRef>,
}

/// Validated gift ready to be queued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GiftRequest {
    weight: NonZeroU32,
    owner: Option<String>,
    avatar: Option<ImageRef>,
    metadata: GiftMetadata,
}

impl GiftRequest {
    /// Creates a gift worth `weight` tokens.
    ///
    /// Missing or empty owners and avatars are defaulted by the world when
    /// the gift is queued.
    #[must_use]
    pub fn new(
        weight: NonZeroU32,
        owner: Option<String>,
        avatar: Option<ImageRef>,
        metadata: GiftMetadata,
    ) -> Self {
        Self {
            weight,
            owner: owner.filter(|name| !name.is_empty()),
            avatar: avatar.filter(|image| !image.as_str().is_empty()),
            metadata,
        }
    }

    /// Number of tokens owed.
    #[must_use]
    pub const fn weight(&self) -> NonZeroU32 {
        self.weight
    }

    /// Sender identity, if supplied.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Sender avatar, if supplied.
    #[must_use]
    pub fn avatar(&self) -> Option<&ImageRef> {
        self.avatar.as_ref()
    }

    /// Display-only gift details.
    #[must_use]
    pub fn metadata(&self) -> &GiftMetadata {
        &self.metadata
    }
}

/// Immutable representation of a single token's state.
#[derive(Clone, Debug, PartialEq)]
pub struct TokenSnapshot {
    /// Slot occupied by the token.
    pub id: TokenId,
    /// Lifecycle phase.
    pub phase: TokenPhase,
    /// Committed board row.
    pub row: u32,
    /// Committed lane offset.
    pub lane: i32,
    /// Horizontal pixel position used for drawing.
    pub display_x: f32,
    /// Vertical pixel position used for drawing.
    pub display_y: f32,
    /// Progress through the current bounce cycle.
    pub progress: f32,
    /// Current fall speed in pixels per frame.
    pub fall_speed: f32,
    /// Weight the token was initialised with.
    pub weight: u32,
    /// Identity credited on landing.
    pub owner: String,
    /// Image drawn inside the token.
    pub avatar: ImageRef,
    /// Whether the token already crossed the bin line.
    pub has_scored: bool,
}

/// Read-only snapshot describing every active token.
#[derive(Clone, Debug, Default)]
pub struct TokenView {
    snapshots: Vec<TokenSnapshot>,
}

impl TokenView {
    /// Creates a new token view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<TokenSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured token snapshots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &TokenSnapshot> {
        self.snapshots.iter()
    }

    /// Number of captured snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether the view captured no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<TokenSnapshot> {
        self.snapshots
    }
}

/// Accumulated score of one identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Identity that earned the score.
    pub owner: String,
    /// Total score credited so far.
    pub score: u64,
    /// Avatar recorded with the first credit.
    pub avatar: ImageRef,
}

/// Immutable representation of a queued or completed gift ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GiftTicketSnapshot {
    /// Ticket identifier.
    pub id: TicketId,
    /// Total tokens owed at creation.
    pub weight: NonZeroU32,
    /// Tokens spawned so far.
    pub spawned: u32,
    /// Tokens still owed.
    pub remaining: u32,
    /// Identity that sent the gift.
    pub owner: String,
    /// Avatar applied to every spawned token.
    pub avatar: ImageRef,
    /// Display-only gift details.
    pub metadata: GiftMetadata,
}

/// Floating "+score" label spawned when a token lands.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreLabel {
    /// Horizontal anchor in pixels.
    pub x: f32,
    /// Vertical anchor in pixels.
    pub y: f32,
    /// Colour of the bin that produced the label.
    pub color: BinColor,
    /// Simulation time at which the label appeared.
    pub created_at: Duration,
    /// Text of the label.
    pub label: String,
}

impl ScoreLabel {
    /// Age of the label at simulation time `now`.
    #[must_use]
    pub fn age(&self, now: Duration) -> Duration {
        now.saturating_sub(self.created_at)
    }

    /// Reports whether the label outlived `lifetime`.
    #[must_use]
    pub fn is_expired(&self, now: Duration, lifetime: Duration) -> bool {
        self.age(now) > lifetime
    }

    /// Opacity fading linearly from one to zero over `lifetime`.
    #[must_use]
    pub fn opacity(&self, now: Duration, lifetime: Duration) -> f32 {
        if lifetime.is_zero() {
            return 0.0;
        }
        let fraction = self.age(now).as_secs_f32() / lifetime.as_secs_f32();
        (1.0 - fraction).clamp(0.0, 1.0)
    }

    /// Upward drift in pixels, one pixel per thirty milliseconds of age.
    #[must_use]
    pub fn rise(&self, now: Duration) -> f32 {
        self.age(now).as_secs_f32() * 1000.0 / 30.0
    }
}

/// Aggregated landing statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StatsReport {
    /// Tokens that landed inside a bin.
    pub landed: u64,
    /// Tokens that crossed the bin line outside every bin.
    pub dropped: u64,
    /// Landing counter per bin.
    pub distribution: Vec<u64>,
    /// Leaderboard sorted by descending score.
    pub leaders: Vec<LeaderboardEntry>,
}

impl StatsReport {
    /// Share of landings per bin, or all zeros when nothing has landed.
    #[must_use]
    pub fn proportions(&self) -> Vec<f64> {
        let total: u64 = self.distribution.iter().sum();
        self.distribution
            .iter()
            .map(|count| {
                if total == 0 {
                    0.0
                } else {
                    *count as f64 / total as f64
                }
            })
            .collect()
    }
}
