#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for the Galton board overlay.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, which are unavailable in the containerised CI environment.
//! To keep `cargo test` usable everywhere we depend on macroquad without its
//! default `audio` feature.
//!
//! Avatars are fetched in the background through
//! [`galton_board_rendering::AvatarCache`]; tokens whose avatar is not ready
//! yet are drawn as solid red discs.

mod textures;

use self::textures::{decode_avatar, draw_stretched, AvatarTextures};
use anyhow::{Context, Result};
use galton_board_core::SurfaceSize;
use galton_board_rendering::{
    AvatarCache, FrameInput, HttpAvatarSource, PanelRow, PanelView, Presentation,
    RenderingBackend, Scene, SceneBin, SceneLabel, ScenePeg, SceneToken, PANEL_ROW_SIZE,
};
use glam::Vec2;
use macroquad::{
    color::{Color as MacroquadColor, BLACK, RED},
    input::{is_key_pressed, is_mouse_button_pressed, KeyCode, MouseButton},
    shapes::{draw_circle, draw_rectangle},
    text::{draw_text, measure_text},
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::info;

const PANEL_AVATAR_SIZE: f32 = 40.0;
const PANEL_BADGE_SIZE: f32 = 30.0;
const PANEL_HEADING_SIZE: f32 = 36.0;
const PANEL_TEXT_SIZE: f32 = 18.0;
const RANK_TEXT_SIZE: f32 = 24.0;
const BIN_TEXT_SIZE: f32 = 24.0;
const LABEL_TEXT_SIZE: f32 = 24.0;
const BIN_TEXT_COLOR: MacroquadColor = MacroquadColor::new(0.133, 0.133, 0.133, 1.0);

/// Snapshot of edge-triggered keyboard shortcuts observed during a single frame.
#[derive(Clone, Copy, Debug, Default)]
struct KeyboardShortcuts {
    /// `Q` or `Escape` to quit the render loop.
    quit_requested: bool,
    /// `Space` injects a synthetic test gift.
    inject_test_gift: bool,
    /// `R` clears the bin counters.
    reset_bins: bool,
}

impl KeyboardShortcuts {
    fn poll() -> Self {
        Self {
            quit_requested: is_key_pressed(KeyCode::Escape) || is_key_pressed(KeyCode::Q),
            inject_test_gift: is_key_pressed(KeyCode::Space),
            reset_bins: is_key_pressed(KeyCode::R),
        }
    }
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    show_fps: bool,
    window_size: (i32, i32),
    avatar_timeout: Duration,
}

impl Default for MacroquadBackend {
    fn default() -> Self {
        Self {
            swap_interval: None,
            show_fps: false,
            window_size: (1920, 1080),
            avatar_timeout: Duration::from_secs(8),
        }
    }
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }

    /// Configures whether the backend logs frame timing metrics once per second.
    #[must_use]
    pub fn with_show_fps(mut self, show: bool) -> Self {
        self.show_fps = show;
        self
    }

    /// Sets the initial window size in pixels.
    #[must_use]
    pub fn with_window_size(mut self, width: i32, height: i32) -> Self {
        self.window_size = (width, height);
        self
    }

    /// Sets how long a single avatar download may take.
    #[must_use]
    pub fn with_avatar_timeout(mut self, timeout: Duration) -> Self {
        self.avatar_timeout = timeout;
        self
    }
}

#[derive(Debug, Default)]
struct FpsCounter {
    elapsed: Duration,
    frames: u32,
    render_accum: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct FpsMetrics {
    per_second: f32,
    avg_render: Duration,
}

impl FpsCounter {
    /// Records a rendered frame and returns the averages once one second has elapsed.
    fn record_frame(&mut self, frame: Duration, render: Duration) -> Option<FpsMetrics> {
        self.elapsed += frame;
        self.frames = self.frames.saturating_add(1);
        self.render_accum += render;

        if self.elapsed < Duration::from_secs(1) {
            return None;
        }

        let metrics = FpsMetrics {
            per_second: self.frames as f32 / self.elapsed.as_secs_f32(),
            avg_render: self.render_accum / self.frames.max(1),
        };
        *self = Self::default();
        Some(metrics)
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) + 'static,
    {
        let Self {
            swap_interval,
            show_fps,
            window_size: (window_width, window_height),
            avatar_timeout,
        } = self;

        let Presentation {
            window_title,
            clear_color,
            scene,
        } = presentation;

        let source = HttpAvatarSource::new(avatar_timeout)
            .context("failed to initialise avatar downloader")?;

        let mut config = macroquad::window::Conf {
            window_title,
            window_width,
            window_height,
            window_resizable: true,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let mut avatars: AvatarCache<AvatarTextures> = AvatarCache::new(Arc::new(source));
            let mut last_surface: Option<SurfaceSize> = None;
            let background = to_macroquad_color(clear_color);
            let mut fps_counter = FpsCounter::default();

            loop {
                let keyboard = KeyboardShortcuts::poll();
                if keyboard.quit_requested {
                    break;
                }

                let surface = SurfaceSize::new(
                    macroquad::window::screen_width(),
                    macroquad::window::screen_height(),
                );
                let clicked = is_mouse_button_pressed(MouseButton::Left);
                let frame_input = gather_frame_input(last_surface, surface, clicked, keyboard);
                last_surface = Some(surface);

                let dt_seconds = macroquad::time::get_frame_time();
                let frame_dt = Duration::from_secs_f32(dt_seconds.max(0.0));
                update_scene(frame_dt, frame_input, &mut scene);

                for image in scene.images() {
                    avatars.request(image);
                }
                let _ = avatars.resolve(|_, bytes| decode_avatar(bytes));

                let render_start = Instant::now();
                macroquad::window::clear_background(background);
                draw_bins(&scene.bins);
                draw_pegs(&scene.pegs);
                draw_labels(&scene.labels);
                draw_tokens(&scene.tokens, &avatars);
                draw_panel(&scene.gift_panel, &avatars);
                draw_panel(&scene.ranking_panel, &avatars);
                let render_duration = render_start.elapsed();

                if let Some(FpsMetrics {
                    per_second,
                    avg_render,
                }) = fps_counter.record_frame(frame_dt, render_duration)
                {
                    if show_fps {
                        info!(
                            fps = per_second,
                            render_ms = avg_render.as_secs_f64() * 1_000.0,
                            tokens = scene.tokens.len(),
                            "frame timing"
                        );
                    }
                }

                macroquad::window::next_frame().await;
            }
        });

        Ok(())
    }
}

fn gather_frame_input(
    last_surface: Option<SurfaceSize>,
    surface: SurfaceSize,
    clicked: bool,
    keyboard: KeyboardShortcuts,
) -> FrameInput {
    FrameInput {
        surface: (last_surface != Some(surface)).then_some(surface),
        inject_test_gift: clicked || keyboard.inject_test_gift,
        reset_bins: keyboard.reset_bins,
    }
}

fn draw_bins(bins: &[SceneBin]) {
    for bin in bins {
        draw_rectangle(
            bin.origin.x,
            bin.origin.y,
            bin.size.x,
            bin.size.y,
            to_macroquad_color(bin.color),
        );
        draw_centered_text(
            &bin.label,
            Vec2::new(bin.origin.x + bin.size.x / 2.0, bin.origin.y + 40.0),
            BIN_TEXT_SIZE,
            BIN_TEXT_COLOR,
        );
    }
}

fn draw_pegs(pegs: &[ScenePeg]) {
    for peg in pegs {
        draw_circle(peg.position.x, peg.position.y, peg.radius, BLACK);
    }
}

fn draw_labels(labels: &[SceneLabel]) {
    for label in labels {
        draw_centered_text(
            &label.text,
            label.position,
            LABEL_TEXT_SIZE,
            to_macroquad_color(label.color),
        );
    }
}

fn draw_tokens(tokens: &[SceneToken], avatars: &AvatarCache<AvatarTextures>) {
    for token in tokens {
        match avatars.get(&token.avatar) {
            Some(textures) => draw_stretched(
                textures.round,
                token.position - Vec2::splat(token.radius),
                token.radius * 2.0,
            ),
            None => draw_circle(token.position.x, token.position.y, token.radius, RED),
        }
    }
}

/// Pixel anchors of the elements inside one panel row.
#[derive(Clone, Copy, Debug, PartialEq)]
struct RowSlots {
    rank: Option<Vec2>,
    avatar: Vec2,
    title: Vec2,
    detail: Vec2,
    badge_image: Vec2,
    badge_text_right: Vec2,
}

impl RowSlots {
    fn for_row(row: &PanelRow, origin: Vec2) -> Self {
        let (rank, avatar_x) = if row.rank.is_some() {
            (Some(origin + Vec2::new(30.0, PANEL_ROW_SIZE.y / 2.0)), 60.0)
        } else {
            (None, 10.0)
        };
        let text_x = avatar_x + PANEL_AVATAR_SIZE + 10.0;

        Self {
            rank,
            avatar: origin + Vec2::new(avatar_x, 10.0),
            title: origin + Vec2::new(text_x, 22.0),
            detail: origin + Vec2::new(text_x, 43.0),
            badge_image: origin + Vec2::new(PANEL_ROW_SIZE.x - PANEL_BADGE_SIZE - 10.0, 15.0),
            badge_text_right: origin + Vec2::new(PANEL_ROW_SIZE.x - PANEL_BADGE_SIZE - 25.0, 30.0),
        }
    }
}

fn draw_panel(panel: &PanelView, avatars: &AvatarCache<AvatarTextures>) {
    draw_text_line(
        panel.heading,
        panel.origin + Vec2::new(0.0, -40.0),
        PANEL_HEADING_SIZE,
        BLACK,
    );

    for (index, row) in panel.rows.iter().enumerate() {
        let origin = panel.row_origin(index);
        let slots = RowSlots::for_row(row, origin);

        draw_rectangle(
            origin.x,
            origin.y,
            PANEL_ROW_SIZE.x,
            PANEL_ROW_SIZE.y,
            to_macroquad_color(row.background),
        );
        if let (Some(rank), Some(anchor)) = (&row.rank, slots.rank) {
            draw_centered_text(rank, anchor, RANK_TEXT_SIZE, BLACK);
        }
        match avatars.get(&row.avatar) {
            Some(textures) => draw_stretched(textures.square, slots.avatar, PANEL_AVATAR_SIZE),
            None => draw_rectangle(
                slots.avatar.x,
                slots.avatar.y,
                PANEL_AVATAR_SIZE,
                PANEL_AVATAR_SIZE,
                RED,
            ),
        }
        draw_text_line(&row.title, slots.title, PANEL_TEXT_SIZE, BLACK);
        draw_text_line(&row.detail, slots.detail, PANEL_TEXT_SIZE, BLACK);

        if let Some(badge) = &row.badge {
            if let Some(textures) = avatars.get(&badge.image) {
                draw_stretched(textures.square, slots.badge_image, PANEL_BADGE_SIZE);
            }
            let width = measure_text(&badge.text, None, PANEL_TEXT_SIZE as u16, 1.0).width;
            draw_text_line(
                &badge.text,
                slots.badge_text_right - Vec2::new(width, 0.0),
                PANEL_TEXT_SIZE,
                BLACK,
            );
        }
    }
}

/// Draws `text` vertically centred on `anchor.y`, starting at `anchor.x`.
fn draw_text_line(text: &str, anchor: Vec2, size: f32, color: MacroquadColor) {
    let _ = draw_text(text, anchor.x, anchor.y + size / 3.0, size, color);
}

/// Draws `text` horizontally centred on `anchor.x`.
fn draw_centered_text(text: &str, anchor: Vec2, size: f32, color: MacroquadColor) {
    let width = measure_text(text, None, size as u16, 1.0).width;
    draw_text_line(text, anchor - Vec2::new(width / 2.0, 0.0), size, color);
}

fn to_macroquad_color(color: galton_board_rendering::Color) -> MacroquadColor {
    MacroquadColor::new(color.red, color.green, color.blue, color.alpha)
}
