//! Projects world snapshots into the backend-agnostic scene.

use galton_board_rendering::{
    gift_panel, ranking_panel, Color, Scene, SceneBin, SceneLabel, ScenePeg, SceneToken,
};
use galton_board_system_bootstrap::BoardLayout;
use galton_board_world::{query, World};
use glam::Vec2;

/// Background behind the board.
pub(crate) const CLEAR_COLOR: Color = Color::from_rgb_u8(0xdc, 0xdc, 0xdc);

/// Rewrites `scene` from the current world state.
pub(crate) fn populate(scene: &mut Scene, world: &World, layout: &BoardLayout) {
    let radius = query::geometry(world).token_size() / 2.0;
    let now = query::clock(world);
    let label_lifetime = query::config(world).score_label_duration();

    scene.surface = query::surface(world);
    scene.pegs = layout
        .pegs()
        .iter()
        .map(|peg| ScenePeg {
            position: Vec2::new(peg.x, peg.y),
            radius: peg.radius,
        })
        .collect();
    scene.bins = layout
        .bins()
        .iter()
        .map(|bin| SceneBin {
            origin: Vec2::new(bin.x, bin.y),
            size: Vec2::new(bin.width, bin.height),
            color: Color::from(bin.color),
            label: bin.score.to_string(),
        })
        .collect();
    scene.tokens = query::token_view(world)
        .iter()
        .map(|token| SceneToken {
            id: token.id,
            position: Vec2::new(token.display_x, token.display_y),
            radius,
            avatar: token.avatar.clone(),
        })
        .collect();
    scene.labels = query::score_labels(world)
        .iter()
        .map(|label| SceneLabel::from_score_label(label, now, label_lifetime))
        .collect();
    scene.gift_panel = gift_panel(&query::pending_gifts(world), &query::gift_history(world));
    scene.ranking_panel = ranking_panel(&query::leaderboard(world));
}
