use galton_board_core::{Command, SurfaceSize};
use galton_board_system_bootstrap::Bootstrap;
use galton_board_world::{self as world, query, World};

fn world_with_surface(width: f32, height: f32) -> World {
    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::ConfigureSurface {
            surface: SurfaceSize::new(width, height),
        },
        &mut events,
    );
    world
}

#[test]
fn banner_matches_world() {
    let world = World::new();
    assert_eq!(
        Bootstrap.welcome_banner(&world),
        query::welcome_banner(&world)
    );
}

#[test]
fn pegs_form_a_triangle() {
    let world = world_with_surface(1280.0, 1000.0);
    let layout = Bootstrap.board_layout(&world);

    assert_eq!(layout.pegs().len(), 55);
    let apex = layout.pegs()[0];
    assert_eq!((apex.row, apex.lane), (0, 0));
    assert_eq!((apex.x, apex.y), (640.0, 200.0));
    assert_eq!(apex.radius, 15.0);

    for peg in layout.pegs() {
        assert!(peg.lane.unsigned_abs() <= peg.row);
        assert_eq!((peg.lane + peg.row as i32) % 2, 0);
    }

    let last_row: Vec<i32> = layout
        .pegs()
        .iter()
        .filter(|peg| peg.row == 9)
        .map(|peg| peg.lane)
        .collect();
    assert_eq!(last_row, vec![-9, -7, -5, -3, -1, 1, 3, 5, 7, 9]);
}

#[test]
fn bins_tile_the_bottom_of_the_board() {
    let world = world_with_surface(1280.0, 1000.0);
    let layout = Bootstrap.board_layout(&world);
    let geometry = query::geometry(&world);

    assert_eq!(layout.bins().len(), 11);
    let first = layout.bins()[0];
    assert_eq!(first.x, 244.0);
    assert_eq!(first.y, 850.0);
    assert_eq!(first.width, 72.0);
    assert_eq!(first.height, 200.0);
    assert_eq!(first.score, 100);

    for pair in layout.bins().windows(2) {
        assert_eq!(pair[1].x - pair[0].x, 72.0);
    }

    for bin in layout.bins() {
        let centre = bin.x + bin.width / 2.0;
        assert_eq!(geometry.bin_index_at(centre, 1280.0), Some(bin.index));
    }
}
