//! Pooled tokens and the per-frame lifecycle state machine.

use std::num::NonZeroU32;

use galton_board_core::{
    BoardGeometry, ImageRef, MotionTuning, SurfaceSize, TokenId, TokenPhase, TokenSnapshot,
};
use rand::Rng;

/// Progress assigned after each committed row so the next cycle never renders flat.
const PROGRESS_EPSILON: f32 = 0.001;

/// Read-only inputs required to advance a token by one frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct StepContext<'a> {
    pub(crate) geometry: &'a BoardGeometry,
    pub(crate) motion: &'a MotionTuning,
    pub(crate) surface: SurfaceSize,
}

/// What happened when a falling token crossed the bin line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Crossing {
    /// The token is above the bin at `bin`.
    Landed { bin: usize, x: f32 },
    /// The token missed every bin.
    Dropped,
}

/// Observable transitions produced by a single frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct StepOutcome {
    pub(crate) entered_board: bool,
    pub(crate) crossing: Option<Crossing>,
    pub(crate) retired: bool,
}

/// Single pooled token.
#[derive(Clone, Debug)]
pub(crate) struct Token {
    id: TokenId,
    phase: TokenPhase,
    row: u32,
    lane: i32,
    direction: i32,
    progress: f32,
    bounce_step: f32,
    fall_speed: f32,
    display_x: f32,
    display_y: f32,
    weight: u32,
    owner: String,
    avatar: ImageRef,
    has_scored: bool,
}

impl Token {
    fn idle(id: TokenId) -> Self {
        Self {
            id,
            phase: TokenPhase::Idle,
            row: 0,
            lane: 0,
            direction: 0,
            progress: 0.0,
            bounce_step: 0.0,
            fall_speed: 0.0,
            display_x: 0.0,
            display_y: 0.0,
            weight: 1,
            owner: String::new(),
            avatar: ImageRef::new(""),
            has_scored: false,
        }
    }

    pub(crate) const fn id(&self) -> TokenId {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.phase != TokenPhase::Idle
    }

    pub(crate) fn owner(&self) -> &str {
        &self.owner
    }

    pub(crate) fn avatar(&self) -> &ImageRef {
        &self.avatar
    }

    pub(crate) const fn has_scored(&self) -> bool {
        self.has_scored
    }

    /// Starts a new lifecycle above the board.
    pub(crate) fn initialize(
        &mut self,
        avatar: ImageRef,
        weight: NonZeroU32,
        owner: String,
        ctx: &StepContext<'_>,
    ) {
        let weight = weight.get();
        self.phase = TokenPhase::Settling;
        self.row = 0;
        self.lane = 0;
        self.direction = 0;
        self.progress = 0.0;
        self.bounce_step = ctx.motion.bounce_step(weight);
        self.fall_speed = ctx.motion.initial_fall_speed(weight);
        self.display_x = ctx.geometry.board_to_pixel_x(0.0, ctx.surface.width());
        self.display_y = ctx.geometry.spawn_y();
        self.weight = weight;
        self.owner = owner;
        self.avatar = avatar;
        self.has_scored = false;
    }

    /// Advances the token by one frame.
    pub(crate) fn step<R: Rng>(&mut self, ctx: &StepContext<'_>, rng: &mut R) -> StepOutcome {
        let mut outcome = StepOutcome::default();

        match self.phase {
            TokenPhase::Idle => return outcome,
            TokenPhase::Settling => {
                if self.display_y >= ctx.geometry.entry_y() {
                    self.display_y = ctx.geometry.entry_y();
                    self.direction = coin_flip(rng);
                    self.progress = PROGRESS_EPSILON;
                    self.phase = TokenPhase::Bouncing;
                    outcome.entered_board = true;
                } else {
                    self.fall(ctx);
                }
            }
            TokenPhase::Bouncing => self.bounce(ctx, rng),
            TokenPhase::Falling | TokenPhase::Scored => {
                self.fall(ctx);
                outcome.crossing = self.check_bin_line(ctx);
            }
        }

        if self.display_y >= ctx.surface.height() {
            self.phase = TokenPhase::Idle;
            outcome.retired = true;
        }

        outcome
    }

    fn bounce<R: Rng>(&mut self, ctx: &StepContext<'_>, rng: &mut R) {
        self.progress += self.bounce_step;
        if self.progress >= 1.0 {
            self.lane += self.direction;
            self.row += 1;
            self.direction = coin_flip(rng);
            self.progress = PROGRESS_EPSILON;
        }

        let lane = self.lane as f32 + self.direction as f32 * self.progress;
        let row = self.row as f32 + self.progress.powi(4) - 0.5;
        self.display_x = ctx.geometry.board_to_pixel_x(lane, ctx.surface.width());
        self.display_y = ctx.geometry.board_to_pixel_y(row);

        if self.row >= ctx.geometry.rows() {
            self.phase = TokenPhase::Falling;
        }
    }

    fn fall(&mut self, ctx: &StepContext<'_>) {
        self.fall_speed =
            (self.fall_speed * ctx.motion.fall_acceleration).min(ctx.motion.max_fall_speed);
        self.display_y += self.fall_speed + 1.0;
        self.display_x = ctx
            .geometry
            .board_to_pixel_x(self.lane as f32, ctx.surface.width());
    }

    fn check_bin_line(&mut self, ctx: &StepContext<'_>) -> Option<Crossing> {
        if self.has_scored || self.display_y < ctx.geometry.bin_line_y() {
            return None;
        }

        self.has_scored = true;
        self.phase = TokenPhase::Scored;
        let crossing = match ctx
            .geometry
            .bin_index_at(self.display_x, ctx.surface.width())
        {
            Some(bin) => Crossing::Landed {
                bin,
                x: self.display_x,
            },
            None => Crossing::Dropped,
        };
        Some(crossing)
    }

    pub(crate) fn snapshot(&self) -> TokenSnapshot {
        TokenSnapshot {
            id: self.id,
            phase: self.phase,
            row: self.row,
            lane: self.lane,
            display_x: self.display_x,
            display_y: self.display_y,
            progress: self.progress,
            fall_speed: self.fall_speed,
            weight: self.weight,
            owner: self.owner.clone(),
            avatar: self.avatar.clone(),
            has_scored: self.has_scored,
        }
    }
}

fn coin_flip<R: Rng>(rng: &mut R) -> i32 {
    if rng.gen::<f64>() < 0.5 {
        -1
    } else {
        1
    }
}

/// Fixed-capacity collection of tokens created once and reused forever.
#[derive(Clone, Debug)]
pub(crate) struct TokenPool {
    tokens: Vec<Token>,
}

impl TokenPool {
    pub(crate) fn new(capacity: usize) -> Self {
        let tokens = (0..capacity)
            .map(|index| Token::idle(TokenId::new(index as u32)))
            .collect();
        Self { tokens }
    }

    /// Returns the first idle token, or `None` when every slot is active.
    pub(crate) fn acquire(&mut self) -> Option<&mut Token> {
        self.tokens.iter_mut().find(|token| !token.is_active())
    }

    pub(crate) fn capacity(&self) -> usize {
        self.tokens.len()
    }

    pub(crate) fn active_count(&self) -> usize {
        self.tokens.iter().filter(|token| token.is_active()).count()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Token> {
        self.tokens.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Token> {
        self.tokens.iter_mut()
    }
}
