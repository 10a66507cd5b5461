#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative simulation state for the Galton board overlay.
//!
//! The [`World`] owns the token pool, the gift queue, the leaderboard, the
//! bin counters and the live score labels as one unit. It is mutated only
//! through [`apply`] and observed only through the [`query`] module.

mod gifts;
mod scoring;
mod tokens;

use std::{num::NonZeroU32, time::Duration};

use galton_board_core::{
    BinScoringTable, BoardGeometry, Command, ConfigError, DeferReason, Event, ImageRef, ScoreLabel,
    SimulationConfig, SurfaceSize, TokenId, WELCOME_BANNER,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

use gifts::{DrainCandidate, GiftQueue};
use scoring::{BinHistory, Leaderboard, ScoreLabels};
use tokens::{Crossing, StepContext, TokenPool};

/// Represents the authoritative Galton board state.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    config: SimulationConfig,
    geometry: BoardGeometry,
    scoring: BinScoringTable,
    default_avatar: ImageRef,
    surface: SurfaceSize,
    clock: Duration,
    tick_index: u64,
    pool: TokenPool,
    gifts: GiftQueue,
    leaderboard: Leaderboard,
    bins: BinHistory,
    labels: ScoreLabels,
    landed: u64,
    dropped: u64,
    rng: ChaCha8Rng,
}

impl World {
    /// Creates a world using the reference configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(SimulationConfig::default())
    }

    /// Creates a world from a custom configuration after validating it.
    pub fn from_config(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SimulationConfig) -> Self {
        let geometry = config.geometry();
        Self {
            banner: WELCOME_BANNER,
            geometry,
            scoring: config.scoring_table(),
            default_avatar: config.default_avatar(),
            surface: SurfaceSize::default(),
            clock: Duration::ZERO,
            tick_index: 0,
            pool: TokenPool::new(config.pool_capacity),
            gifts: GiftQueue::new(config.history_capacity, config.min_completion_interval()),
            leaderboard: Leaderboard::default(),
            bins: BinHistory::new(geometry.bin_count()),
            labels: ScoreLabels::new(config.score_label_duration()),
            landed: 0,
            dropped: 0,
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
        }
    }

    fn step_tokens(&mut self, out_events: &mut Vec<Event>) {
        let ctx = StepContext {
            geometry: &self.geometry,
            motion: &self.config.motion,
            surface: self.surface,
        };

        for token in self.pool.iter_mut() {
            if !token.is_active() {
                continue;
            }

            let outcome = token.step(&ctx, &mut self.rng);
            if outcome.entered_board {
                out_events.push(Event::TokenEnteredBoard { token: token.id() });
            }

            match outcome.crossing {
                Some(Crossing::Landed { bin, x }) => match self.scoring.slot(bin) {
                    Some(slot) => {
                        if !token.owner().is_empty() {
                            self.leaderboard
                                .credit(token.owner(), token.avatar(), slot.score);
                        }
                        self.bins.record(bin);
                        self.landed = self.landed.saturating_add(1);
                        self.labels.push(ScoreLabel {
                            x,
                            y: self.geometry.label_y(),
                            color: slot.color,
                            created_at: self.clock,
                            label: format!("+{}", slot.score),
                        });
                        trace!(token = token.id().get(), bin, score = slot.score, "token landed");
                        out_events.push(Event::TokenLanded {
                            token: token.id(),
                            owner: token.owner().to_owned(),
                            bin,
                            score: slot.score,
                        });
                    }
                    None => {
                        self.dropped = self.dropped.saturating_add(1);
                        out_events.push(Event::TokenDropped {
                            token: token.id(),
                            owner: token.owner().to_owned(),
                        });
                    }
                },
                Some(Crossing::Dropped) => {
                    self.dropped = self.dropped.saturating_add(1);
                    trace!(token = token.id().get(), "token missed every bin");
                    out_events.push(Event::TokenDropped {
                        token: token.id(),
                        owner: token.owner().to_owned(),
                    });
                }
                None => {}
            }

            if outcome.retired {
                out_events.push(Event::TokenRetired {
                    token: token.id(),
                    scored: token.has_scored(),
                });
            }
        }
    }

    fn drain_gift_queue(&mut self, out_events: &mut Vec<Event>) {
        let (ticket, avatar, weight, owner) = match self.gifts.next_eligible_spawn(self.clock) {
            DrainCandidate::Empty => return,
            DrainCandidate::Throttled(ticket) => {
                trace!(ticket = ticket.get(), "spawn throttled");
                out_events.push(Event::SpawnDeferred {
                    ticket,
                    reason: DeferReason::Throttled,
                });
                return;
            }
            DrainCandidate::Eligible(head) => (
                head.id(),
                head.avatar().clone(),
                head.weight(),
                head.owner().to_owned(),
            ),
        };

        let Some(token) = self.spawn_from_pool(avatar, weight, owner.clone()) else {
            trace!(ticket = ticket.get(), "token pool exhausted");
            out_events.push(Event::SpawnDeferred {
                ticket,
                reason: DeferReason::PoolExhausted,
            });
            return;
        };

        out_events.push(Event::TokenSpawned {
            token,
            ticket: Some(ticket),
            owner,
            weight,
        });

        if let Some(completed) = self.gifts.consume_one_spawn(self.clock) {
            info!(
                ticket = completed.id().get(),
                owner = completed.owner(),
                weight = completed.weight().get(),
                "gift completed"
            );
            out_events.push(Event::GiftCompleted {
                ticket: completed.id(),
                owner: completed.owner().to_owned(),
                weight: completed.weight(),
            });
        }
    }

    fn spawn_from_pool(
        &mut self,
        avatar: ImageRef,
        weight: NonZeroU32,
        owner: String,
    ) -> Option<TokenId> {
        let ctx = StepContext {
            geometry: &self.geometry,
            motion: &self.config.motion,
            surface: self.surface,
        };
        let token = self.pool.acquire()?;
        token.initialize(avatar, weight, owner, &ctx);
        Some(token.id())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::ConfigureSurface { surface } => {
            if !(surface.width() > 0.0 && surface.height() > 0.0) {
                warn!(
                    width = surface.width(),
                    height = surface.height(),
                    "ignoring degenerate surface"
                );
                return;
            }
            world.surface = surface;
            out_events.push(Event::SurfaceConfigured { surface });
        }
        Command::Tick { dt } => {
            world.tick_index = world.tick_index.saturating_add(1);
            world.clock = world.clock.saturating_add(dt);
            out_events.push(Event::TimeAdvanced { dt });
            world.labels.expire(world.clock);
            world.step_tokens(out_events);
        }
        Command::EnqueueGift { gift } => {
            let ticket = world.gifts.add_gift(gift, &world.default_avatar);
            info!(
                ticket = ticket.id().get(),
                owner = ticket.owner(),
                weight = ticket.weight().get(),
                "gift queued"
            );
            out_events.push(Event::GiftQueued {
                ticket: ticket.id(),
                owner: ticket.owner().to_owned(),
                weight: ticket.weight(),
            });
        }
        Command::DrainGiftQueue => world.drain_gift_queue(out_events),
        Command::SpawnToken {
            avatar,
            weight,
            owner,
        } => match world.spawn_from_pool(avatar, weight, owner.clone()) {
            Some(token) => out_events.push(Event::TokenSpawned {
                token,
                ticket: None,
                owner,
                weight,
            }),
            None => debug!(owner = owner.as_str(), "direct spawn skipped, pool exhausted"),
        },
        Command::ResetBinHistory => {
            world.bins.reset();
            out_events.push(Event::BinHistoryReset);
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use super::World;
    use galton_board_core::{
        BinScoringTable, BoardGeometry, GiftTicketSnapshot, LeaderboardEntry, ScoreLabel,
        SimulationConfig, StatsReport, SurfaceSize, TokenView,
    };

    /// Retrieves the welcome banner that adapters may display.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Configuration the world was built from.
    #[must_use]
    pub fn config(world: &World) -> &SimulationConfig {
        &world.config
    }

    /// Board geometry used for all coordinate mapping.
    #[must_use]
    pub fn geometry(world: &World) -> &BoardGeometry {
        &world.geometry
    }

    /// Scoring table consulted when tokens land.
    #[must_use]
    pub fn scoring_table(world: &World) -> &BinScoringTable {
        &world.scoring
    }

    /// Current surface dimensions.
    #[must_use]
    pub fn surface(world: &World) -> SurfaceSize {
        world.surface
    }

    /// Total simulated time.
    #[must_use]
    pub fn clock(world: &World) -> Duration {
        world.clock
    }

    /// Number of ticks applied so far.
    #[must_use]
    pub fn tick_index(world: &World) -> u64 {
        world.tick_index
    }

    /// Captures a read-only view of every active token.
    #[must_use]
    pub fn token_view(world: &World) -> TokenView {
        TokenView::from_snapshots(
            world
                .pool
                .iter()
                .filter(|token| token.is_active())
                .map(|token| token.snapshot())
                .collect(),
        )
    }

    /// Number of token slots in the pool.
    #[must_use]
    pub fn pool_capacity(world: &World) -> usize {
        world.pool.capacity()
    }

    /// Number of tokens currently in flight.
    #[must_use]
    pub fn active_token_count(world: &World) -> usize {
        world.pool.active_count()
    }

    /// Leaderboard ordered by descending score; ties keep first-credit order.
    #[must_use]
    pub fn leaderboard(world: &World) -> Vec<LeaderboardEntry> {
        world.leaderboard.sorted()
    }

    /// Accumulated score for `owner`, if it was ever credited.
    #[must_use]
    pub fn score_for(world: &World, owner: &str) -> Option<u64> {
        world.leaderboard.score_for(owner)
    }

    /// Landing counters indexed by bin.
    #[must_use]
    pub fn bin_counts(world: &World) -> &[u64] {
        world.bins.as_slice()
    }

    /// Landing counter for one bin, zero when the bin does not exist.
    #[must_use]
    pub fn bin_count(world: &World, bin: usize) -> u64 {
        world.bins.count(bin)
    }

    /// Sum of every bin counter.
    #[must_use]
    pub fn bin_total(world: &World) -> u64 {
        world.bins.total()
    }

    /// Tickets still owing tokens, head of the queue first.
    #[must_use]
    pub fn pending_gifts(world: &World) -> Vec<GiftTicketSnapshot> {
        world.gifts.pending().map(|ticket| ticket.snapshot()).collect()
    }

    /// Number of tickets still owing tokens.
    #[must_use]
    pub fn pending_gift_count(world: &World) -> usize {
        world.gifts.pending_len()
    }

    /// Completed tickets, most recent first.
    #[must_use]
    pub fn gift_history(world: &World) -> Vec<GiftTicketSnapshot> {
        world.gifts.history().map(|ticket| ticket.snapshot()).collect()
    }

    /// Score labels that have not yet expired.
    #[must_use]
    pub fn score_labels(world: &World) -> &[ScoreLabel] {
        world.labels.as_slice()
    }

    /// Snapshot of landing totals, distribution and leaders.
    #[must_use]
    pub fn stats_report(world: &World) -> StatsReport {
        StatsReport {
            landed: world.landed,
            dropped: world.dropped,
            distribution: world.bins.as_slice().to_vec(),
            leaders: world.leaderboard.sorted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use galton_board_core::{GiftMetadata, GiftRequest, TokenPhase};

    fn weight(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).expect("non-zero weight")
    }

    fn gift(value: u32, owner: &str) -> Command {
        Command::EnqueueGift {
            gift: GiftRequest::new(
                weight(value),
                Some(owner.to_owned()),
                None,
                GiftMetadata::default(),
            ),
        }
    }

    fn tick(world: &mut World, events: &mut Vec<Event>) {
        apply(
            world,
            Command::Tick {
                dt: Duration::from_millis(16),
            },
            events,
        );
    }

    #[test]
    fn new_world_is_idle() {
        let world = World::new();
        assert_eq!(query::welcome_banner(&world), WELCOME_BANNER);
        assert_eq!(query::pool_capacity(&world), 250);
        assert_eq!(query::active_token_count(&world), 0);
        assert_eq!(query::bin_counts(&world), &[0; 11]);
        assert!(query::token_view(&world).is_empty());
        assert_eq!(query::clock(&world), Duration::ZERO);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimulationConfig {
            pool_capacity: 0,
            ..SimulationConfig::default()
        };
        assert!(matches!(
            World::from_config(config),
            Err(ConfigError::ZeroPoolCapacity)
        ));

        let frozen = SimulationConfig {
            pool_capacity: 1,
            motion: galton_board_core::MotionTuning {
                max_bounce_step: 0.0,
                ..galton_board_core::MotionTuning::default()
            },
            ..SimulationConfig::default()
        };
        assert!(matches!(
            World::from_config(frozen),
            Err(ConfigError::NonPositiveBounceCap(_))
        ));
    }

    #[test]
    fn enqueue_defaults_owner_and_avatar() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::EnqueueGift {
                gift: GiftRequest::new(weight(2), None, None, GiftMetadata::default()),
            },
            &mut events,
        );

        let pending = query::pending_gifts(&world);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].owner, "Anonymous");
        assert_eq!(pending[0].avatar, query::config(&world).default_avatar());
        assert!(matches!(
            events.as_slice(),
            [Event::GiftQueued { owner, .. }] if owner == "Anonymous"
        ));
    }

    #[test]
    fn drain_spawns_from_the_head_ticket() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(&mut world, gift(2, "ada"), &mut events);
        apply(&mut world, gift(1, "bob"), &mut events);
        events.clear();

        apply(&mut world, Command::DrainGiftQueue, &mut events);

        assert!(matches!(
            events.as_slice(),
            [Event::TokenSpawned { ticket: Some(ticket), owner, .. }]
                if ticket.get() == 0 && owner == "ada"
        ));
        let pending = query::pending_gifts(&world);
        assert_eq!((pending[0].spawned, pending[0].remaining), (1, 1));
        assert_eq!(query::active_token_count(&world), 1);
        let tokens = query::token_view(&world).into_vec();
        assert_eq!(tokens[0].phase, TokenPhase::Settling);
        assert_eq!(tokens[0].weight, 2);
    }

    #[test]
    fn empty_queue_drain_emits_nothing() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(&mut world, Command::DrainGiftQueue, &mut events);
        assert!(events.is_empty());
    }

    #[test]
    fn direct_spawn_is_silent_when_pool_is_full() {
        let config = SimulationConfig {
            pool_capacity: 1,
            ..SimulationConfig::default()
        };
        let mut world = World::from_config(config).expect("valid config");
        let mut events = Vec::new();
        for _ in 0..2 {
            apply(
                &mut world,
                Command::SpawnToken {
                    avatar: ImageRef::new("a.png"),
                    weight: weight(1),
                    owner: "ada".to_owned(),
                },
                &mut events,
            );
        }

        assert_eq!(events.len(), 1);
        assert_eq!(query::active_token_count(&world), 1);
    }

    #[test]
    fn degenerate_surface_is_ignored() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::ConfigureSurface {
                surface: SurfaceSize::new(0.0, 600.0),
            },
            &mut events,
        );
        assert!(events.is_empty());
        assert_eq!(query::surface(&world), SurfaceSize::default());

        apply(
            &mut world,
            Command::ConfigureSurface {
                surface: SurfaceSize::new(800.0, 600.0),
            },
            &mut events,
        );
        assert_eq!(query::surface(&world), SurfaceSize::new(800.0, 600.0));
    }

    #[test]
    fn landing_credits_owner_bins_and_labels() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnToken {
                avatar: ImageRef::new("a.png"),
                weight: weight(1000),
                owner: "ada".to_owned(),
            },
            &mut events,
        );

        let mut landing = None;
        for _ in 0..1_000 {
            events.clear();
            tick(&mut world, &mut events);
            landing = events.iter().find_map(|event| match event {
                Event::TokenLanded { bin, score, .. } => Some((*bin, *score)),
                _ => None,
            });
            if landing.is_some() {
                break;
            }
        }

        let (bin, score) = landing.expect("token lands");
        assert_eq!(query::score_for(&world, "ada"), Some(u64::from(score)));
        assert_eq!(query::bin_count(&world, bin), 1);
        assert_eq!(query::bin_total(&world), 1);
        let labels = query::score_labels(&world);
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].label, format!("+{score}"));
        assert_eq!(labels[0].y, 830.0);
        assert_eq!(query::stats_report(&world).landed, 1);
    }

    #[test]
    fn anonymous_direct_spawns_are_not_credited() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnToken {
                avatar: ImageRef::new("a.png"),
                weight: weight(1000),
                owner: String::new(),
            },
            &mut events,
        );
        for _ in 0..1_000 {
            tick(&mut world, &mut events);
        }

        assert_eq!(query::bin_total(&world), 1);
        assert!(query::leaderboard(&world).is_empty());
        assert_eq!(query::active_token_count(&world), 0);
    }

    #[test]
    fn reset_clears_bins_only() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::SpawnToken {
                avatar: ImageRef::new("a.png"),
                weight: weight(1000),
                owner: "ada".to_owned(),
            },
            &mut events,
        );
        for _ in 0..1_000 {
            tick(&mut world, &mut events);
        }
        events.clear();

        apply(&mut world, Command::ResetBinHistory, &mut events);

        assert_eq!(events, vec![Event::BinHistoryReset]);
        assert_eq!(query::bin_total(&world), 0);
        assert!(query::score_for(&world, "ada").is_some());
    }
}
