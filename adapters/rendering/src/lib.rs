#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Galton board adapters.

pub mod avatars;

use anyhow::Result as AnyResult;
use galton_board_core::{
    BinColor, GiftTicketSnapshot, ImageRef, LeaderboardEntry, ScoreLabel, SurfaceSize, TokenId,
};
use glam::Vec2;
use std::time::Duration;

pub use avatars::{AvatarCache, AvatarError, AvatarSource, AvatarState, HttpAvatarSource};

/// Heading drawn above the gift panel.
pub const GIFT_PANEL_HEADING: &str = "GIFTS";

/// Heading drawn above the ranking panel.
pub const RANKING_PANEL_HEADING: &str = "RANKING";

/// Number of rows shown by each side panel.
pub const PANEL_ROWS: usize = 5;

/// Size of a single panel row in pixels.
pub const PANEL_ROW_SIZE: Vec2 = Vec2::new(300.0, 60.0);

/// Vertical distance between consecutive panel rows.
pub const PANEL_ROW_SPACING: f32 = 70.0;

/// Top-left corner of the first gift panel row.
pub const GIFT_PANEL_ORIGIN: Vec2 = Vec2::new(395.0, 100.0);

/// Top-left corner of the first ranking panel row.
pub const RANKING_PANEL_ORIGIN: Vec2 = Vec2::new(1200.0, 100.0);

const DISPLAY_NAME_LIMIT: usize = 17;
const DISPLAY_NAME_KEPT: usize = 15;

const GIFT_ROW_BACKGROUNDS: [Color; PANEL_ROWS] = [
    Color::from_rgb_u8(0xff, 0xff, 0xff),
    Color::from_rgb_u8(0xf0, 0xf0, 0xf0),
    Color::from_rgb_u8(0xe0, 0xe0, 0xe0),
    Color::from_rgb_u8(0xd0, 0xd0, 0xd0),
    Color::from_rgb_u8(0xc0, 0xc0, 0xc0),
];

const RANKING_ROW_BACKGROUNDS: [Color; PANEL_ROWS] = [
    Color::from_rgb_u8(0xff, 0xd7, 0x00),
    Color::from_rgb_u8(0xc0, 0xc0, 0xc0),
    Color::from_rgb_u8(0xcd, 0x7f, 0x32),
    Color::from_rgb_u8(0xff, 0xff, 0xff),
    Color::from_rgb_u8(0xf0, 0xf0, 0xf0),
];

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns the same color with its alpha channel replaced.
    #[must_use]
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            ..self
        }
    }
}

impl From<BinColor> for Color {
    fn from(color: BinColor) -> Self {
        Self::from_rgb_u8(color.red(), color.green(), color.blue())
    }
}

/// Shortens names that would overflow a panel row.
///
/// Names longer than seventeen characters keep their first fifteen
/// characters followed by an ellipsis.
#[must_use]
pub fn display_name(name: &str) -> String {
    if name.chars().count() > DISPLAY_NAME_LIMIT {
        let mut shortened: String = name.chars().take(DISPLAY_NAME_KEPT).collect();
        shortened.push_str("...");
        shortened
    } else {
        name.to_owned()
    }
}

/// Input snapshot gathered by adapters before updating the scene.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FrameInput {
    /// Drawable surface size when it changed since the previous frame.
    pub surface: Option<SurfaceSize>,
    /// Whether the operator requested a synthetic test gift on this frame.
    pub inject_test_gift: bool,
    /// Whether the operator requested the bin counters to be cleared.
    pub reset_bins: bool,
}

/// Peg drawn as part of the static board.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScenePeg {
    /// Centre of the peg in pixels.
    pub position: Vec2,
    /// Radius of the peg in pixels.
    pub radius: f32,
}

/// Scoring bin drawn below the pegs.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneBin {
    /// Top-left corner of the bin.
    pub origin: Vec2,
    /// Width and height of the bin.
    pub size: Vec2,
    /// Fill color of the bin.
    pub color: Color,
    /// Score printed inside the bin.
    pub label: String,
}

/// Active token drawn as an avatar disc.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneToken {
    /// Identifier of the token.
    pub id: TokenId,
    /// Centre of the token in pixels.
    pub position: Vec2,
    /// Radius of the token in pixels.
    pub radius: f32,
    /// Avatar clipped into the disc.
    pub avatar: ImageRef,
}

/// Floating score label at its current animation state.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneLabel {
    /// Anchor of the label text.
    pub position: Vec2,
    /// Text of the label.
    pub text: String,
    /// Color of the text including the fade.
    pub color: Color,
}

impl SceneLabel {
    /// Projects a score label at simulation time `now`.
    #[must_use]
    pub fn from_score_label(label: &ScoreLabel, now: Duration, lifetime: Duration) -> Self {
        Self {
            position: Vec2::new(label.x, label.y - label.rise(now)),
            text: label.label.clone(),
            color: Color::from(label.color).with_alpha(label.opacity(now, lifetime)),
        }
    }
}

/// Small gift image shown at the right edge of a gift row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PanelBadge {
    /// Image of the gift.
    pub image: ImageRef,
    /// Amount text drawn beside the image.
    pub text: String,
}

/// Single row of a side panel.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelRow {
    /// Background fill of the row.
    pub background: Color,
    /// Rank marker drawn at the left edge, ranking rows only.
    pub rank: Option<String>,
    /// Avatar of the row's owner.
    pub avatar: ImageRef,
    /// Truncated owner name.
    pub title: String,
    /// Secondary line below the name.
    pub detail: String,
    /// Gift image with its amount, gift rows only.
    pub badge: Option<PanelBadge>,
}

/// Side panel with a heading and up to [`PANEL_ROWS`] rows.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelView {
    /// Heading drawn above the rows.
    pub heading: &'static str,
    /// Top-left corner of the first row.
    pub origin: Vec2,
    /// Rows in display order.
    pub rows: Vec<PanelRow>,
}

impl PanelView {
    /// Top-left corner of the row at `index`.
    #[must_use]
    pub fn row_origin(&self, index: usize) -> Vec2 {
        self.origin + Vec2::new(0.0, index as f32 * PANEL_ROW_SPACING)
    }
}

/// Builds the gift panel.
///
/// With gifts waiting, the head of the queue comes first followed by the
/// four most recent completions. Otherwise the five most recent completions
/// are shown.
#[must_use]
pub fn gift_panel(pending: &[GiftTicketSnapshot], history: &[GiftTicketSnapshot]) -> PanelView {
    let rows = pending
        .iter()
        .take(1)
        .chain(history.iter())
        .take(PANEL_ROWS)
        .zip(GIFT_ROW_BACKGROUNDS)
        .map(|(ticket, background)| gift_row(ticket, background))
        .collect();

    PanelView {
        heading: GIFT_PANEL_HEADING,
        origin: GIFT_PANEL_ORIGIN,
        rows,
    }
}

fn gift_row(ticket: &GiftTicketSnapshot, background: Color) -> PanelRow {
    let total = ticket.spawned + ticket.remaining;
    let badge = ticket.metadata.gift_image.as_ref().map(|image| {
        let amount = ticket
            .metadata
            .gift_amount
            .unwrap_or_else(|| i64::from(ticket.weight.get()));
        PanelBadge {
            image: image.clone(),
            text: format!("{amount}x"),
        }
    });

    PanelRow {
        background,
        rank: None,
        avatar: ticket.avatar.clone(),
        title: display_name(&ticket.owner),
        detail: format!("{}/{}", ticket.spawned, total),
        badge,
    }
}

/// Builds the ranking panel from a leaderboard sorted by descending score.
#[must_use]
pub fn ranking_panel(leaders: &[LeaderboardEntry]) -> PanelView {
    let rows = leaders
        .iter()
        .zip(RANKING_ROW_BACKGROUNDS)
        .enumerate()
        .map(|(index, (entry, background))| PanelRow {
            background,
            rank: Some(format!("#{}", index + 1)),
            avatar: entry.avatar.clone(),
            title: display_name(&entry.owner),
            detail: format!("{} points", entry.score),
            badge: None,
        })
        .collect();

    PanelView {
        heading: RANKING_PANEL_HEADING,
        origin: RANKING_PANEL_ORIGIN,
        rows,
    }
}

/// Describes the full frame to present.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Size of the drawable surface.
    pub surface: SurfaceSize,
    /// Static peg grid.
    pub pegs: Vec<ScenePeg>,
    /// Scoring bins.
    pub bins: Vec<SceneBin>,
    /// Active tokens.
    pub tokens: Vec<SceneToken>,
    /// Floating score labels.
    pub labels: Vec<SceneLabel>,
    /// Gift queue and history panel.
    pub gift_panel: PanelView,
    /// Leaderboard panel.
    pub ranking_panel: PanelView,
}

impl Scene {
    /// Creates an empty scene covering `surface`.
    #[must_use]
    pub fn new(surface: SurfaceSize) -> Self {
        Self {
            surface,
            pegs: Vec::new(),
            bins: Vec::new(),
            tokens: Vec::new(),
            labels: Vec::new(),
            gift_panel: gift_panel(&[], &[]),
            ranking_panel: ranking_panel(&[]),
        }
    }

    /// Every image the scene references, tokens first.
    pub fn images(&self) -> impl Iterator<Item = &ImageRef> {
        let rows = self
            .gift_panel
            .rows
            .iter()
            .chain(self.ranking_panel.rows.iter());
        self.tokens
            .iter()
            .map(|token| &token.avatar)
            .chain(rows.flat_map(|row| {
                std::iter::once(&row.avatar).chain(row.badge.as_ref().map(|badge| &badge.image))
            }))
    }
}

/// Presentation descriptor consumed by rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            scene,
        }
    }
}

/// Rendering backend capable of presenting Galton board scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the frame delta, per-frame
    /// input captured by the adapter, and rewrites the scene before it is
    /// rendered.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static;
}

#[cfg(test)]
mod tests {
    use super::*;
    use galton_board_core::{GiftMetadata, TicketId};
    use std::num::NonZeroU32;

    fn ticket(id: u64, owner: &str, spawned: u32, remaining: u32) -> GiftTicketSnapshot {
        GiftTicketSnapshot {
            id: TicketId::new(id),
            weight: NonZeroU32::new(spawned + remaining).expect("non-zero weight"),
            spawned,
            remaining,
            owner: owner.to_owned(),
            avatar: ImageRef::new(format!("{owner}.png")),
            metadata: GiftMetadata::default(),
        }
    }

    fn leader(owner: &str, score: u64) -> LeaderboardEntry {
        LeaderboardEntry {
            owner: owner.to_owned(),
            score,
            avatar: ImageRef::new(format!("{owner}.png")),
        }
    }

    #[test]
    fn display_name_keeps_short_names() {
        assert_eq!(display_name("ada"), "ada");
        assert_eq!(display_name("exactly17chars___"), "exactly17chars___");
    }

    #[test]
    fn display_name_truncates_long_names() {
        assert_eq!(display_name("a-very-long-nickname"), "a-very-long-nic...");
        assert_eq!(display_name("ééééééééééééééééééé"), "ééééééééééééééé...");
    }

    #[test]
    fn gift_panel_leads_with_the_queue_head() {
        let pending = vec![ticket(9, "head", 2, 3), ticket(10, "next", 0, 1)];
        let history: Vec<_> = (0..6)
            .rev()
            .map(|id| ticket(id, &format!("done{id}"), 1, 0))
            .collect();

        let panel = gift_panel(&pending, &history);

        assert_eq!(panel.heading, "GIFTS");
        assert_eq!(panel.rows.len(), 5);
        assert_eq!(panel.rows[0].title, "head");
        assert_eq!(panel.rows[0].detail, "2/5");
        assert_eq!(panel.rows[1].title, "done5");
        assert_eq!(panel.rows[4].title, "done2");
        assert_eq!(panel.rows[0].background, Color::from_rgb_u8(255, 255, 255));
        assert_eq!(panel.rows[4].background, Color::from_rgb_u8(0xc0, 0xc0, 0xc0));
    }

    #[test]
    fn gift_panel_without_queue_shows_recent_history() {
        let history = vec![ticket(2, "cy", 3, 0), ticket(1, "bob", 1, 0)];

        let panel = gift_panel(&[], &history);

        assert_eq!(panel.rows.len(), 2);
        assert_eq!(panel.rows[0].title, "cy");
        assert_eq!(panel.rows[0].detail, "3/3");
        assert!(gift_panel(&[], &[]).rows.is_empty());
    }

    #[test]
    fn gift_badge_prefers_the_declared_amount() {
        let mut with_amount = ticket(0, "ada", 0, 4);
        with_amount.metadata = GiftMetadata {
            gift_name: Some("Rose".to_owned()),
            gift_amount: Some(2),
            gift_image: Some(ImageRef::new("rose.png")),
        };
        let mut without_amount = ticket(1, "bob", 0, 4);
        without_amount.metadata.gift_image = Some(ImageRef::new("rose.png"));

        let panel = gift_panel(&[with_amount], &[without_amount]);

        assert_eq!(
            panel.rows[0].badge.as_ref().map(|badge| badge.text.as_str()),
            Some("2x")
        );
        assert_eq!(
            panel.rows[1].badge.as_ref().map(|badge| badge.text.as_str()),
            Some("4x")
        );
    }

    #[test]
    fn ranking_panel_shows_top_five_with_medals() {
        let leaders: Vec<_> = ["a", "b", "c", "d", "e", "f"]
            .iter()
            .enumerate()
            .map(|(index, owner)| leader(owner, 600 - index as u64 * 100))
            .collect();

        let panel = ranking_panel(&leaders);

        assert_eq!(panel.heading, "RANKING");
        assert_eq!(panel.rows.len(), 5);
        assert_eq!(panel.rows[0].rank.as_deref(), Some("#1"));
        assert_eq!(panel.rows[0].detail, "600 points");
        assert_eq!(panel.rows[0].background, Color::from_rgb_u8(0xff, 0xd7, 0x00));
        assert_eq!(panel.rows[1].background, Color::from_rgb_u8(0xc0, 0xc0, 0xc0));
        assert_eq!(panel.rows[2].background, Color::from_rgb_u8(0xcd, 0x7f, 0x32));
        assert_eq!(panel.rows[4].title, "e");
        assert_eq!(panel.row_origin(2), Vec2::new(1200.0, 240.0));
    }

    #[test]
    fn score_label_rises_and_fades() {
        let label = ScoreLabel {
            x: 100.0,
            y: 500.0,
            color: BinColor::from_rgb(0xeb, 0xc1, 0x3e),
            created_at: Duration::from_millis(1_000),
            label: "+100".to_owned(),
        };

        let scene_label = SceneLabel::from_score_label(
            &label,
            Duration::from_millis(1_300),
            Duration::from_millis(1_000),
        );

        assert!((scene_label.position.y - 490.0).abs() < 1e-3);
        assert!((scene_label.color.alpha - 0.7).abs() < 1e-3);
        assert_eq!(scene_label.text, "+100");
    }

    #[test]
    fn scene_images_cover_tokens_and_panels() {
        let mut scene = Scene::new(SurfaceSize::new(1280.0, 720.0));
        scene.tokens.push(SceneToken {
            id: TokenId::new(0),
            position: Vec2::ZERO,
            radius: 15.0,
            avatar: ImageRef::new("token.png"),
        });
        let mut gift = ticket(0, "ada", 1, 1);
        gift.metadata.gift_image = Some(ImageRef::new("rose.png"));
        scene.gift_panel = gift_panel(&[gift], &[]);
        scene.ranking_panel = ranking_panel(&[leader("bob", 5)]);

        let images: Vec<_> = scene.images().map(ImageRef::as_str).collect();

        assert_eq!(images, vec!["token.png", "ada.png", "rose.png", "bob.png"]);
    }
}
