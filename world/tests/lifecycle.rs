use std::{collections::HashMap, num::NonZeroU32, time::Duration};

use galton_board_core::{
    Command, DeferReason, Event, GiftMetadata, GiftRequest, ImageRef, SimulationConfig,
    SurfaceSize, TicketId, TokenPhase,
};
use galton_board_world::{self as world, query, World};

const FRAME: Duration = Duration::from_millis(16);

fn weight(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).expect("non-zero weight")
}

fn gift(value: u32, owner: &str) -> Command {
    Command::EnqueueGift {
        gift: GiftRequest::new(
            weight(value),
            Some(owner.to_owned()),
            Some(ImageRef::new(format!("{owner}.png"))),
            GiftMetadata::default(),
        ),
    }
}

fn spawn(value: u32, owner: &str) -> Command {
    Command::SpawnToken {
        avatar: ImageRef::new("token.png"),
        weight: weight(value),
        owner: owner.to_owned(),
    }
}

#[test]
fn single_token_runs_to_completion_and_scores_once() {
    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(&mut world, spawn(1, "ada"), &mut events);

    let mut landings = Vec::new();
    let mut retired = None;
    for _ in 0..5_000 {
        let mut frame = Vec::new();
        world::apply(&mut world, Command::Tick { dt: FRAME }, &mut frame);
        for event in frame {
            match event {
                Event::TokenLanded { bin, score, .. } => landings.push((bin, score)),
                Event::TokenRetired { scored, .. } => retired = Some(scored),
                _ => {}
            }
        }
        if retired.is_some() {
            break;
        }
    }

    assert_eq!(retired, Some(true), "token must retire after scoring");
    assert_eq!(landings.len(), 1);
    let (bin, score) = landings[0];
    let expected = query::scoring_table(&world)
        .slot(bin)
        .map(|slot| slot.score)
        .expect("landed bin exists");
    assert_eq!(score, expected);
    assert_eq!(query::score_for(&world, "ada"), Some(u64::from(score)));
    assert_eq!(query::bin_count(&world, bin), 1);
    assert!(query::token_view(&world).is_empty());
    assert_eq!(query::active_token_count(&world), 0);
}

#[test]
fn gift_of_five_spawns_five_tokens_in_sequence() {
    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(&mut world, gift(5, "ada"), &mut events);

    let mut spawned = Vec::new();
    for _ in 0..5 {
        let mut drained = Vec::new();
        world::apply(&mut world, Command::DrainGiftQueue, &mut drained);
        for event in &drained {
            if let Event::TokenSpawned { token, ticket, .. } = event {
                assert_eq!(*ticket, Some(TicketId::new(0)));
                spawned.push(*token);
            }
        }
        world::apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(1_000),
            },
            &mut events,
        );
    }

    assert_eq!(spawned.len(), 5);
    assert!(spawned.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(query::pending_gift_count(&world), 0);
    let history = query::gift_history(&world);
    assert_eq!(history.len(), 1);
    assert_eq!((history[0].spawned, history[0].remaining), (5, 0));
    assert_eq!(history[0].owner, "ada");
}

#[test]
fn exhausted_pool_defers_without_charging_the_ticket() {
    let config = SimulationConfig {
        pool_capacity: 3,
        ..SimulationConfig::default()
    };
    let mut world = World::from_config(config).expect("valid config");
    let mut events = Vec::new();
    for _ in 0..3 {
        world::apply(&mut world, spawn(1, "filler"), &mut events);
    }
    assert_eq!(query::active_token_count(&world), 3);

    world::apply(&mut world, gift(4, "ada"), &mut events);
    events.clear();
    world::apply(&mut world, Command::DrainGiftQueue, &mut events);

    assert_eq!(
        events,
        vec![Event::SpawnDeferred {
            ticket: TicketId::new(0),
            reason: DeferReason::PoolExhausted,
        }]
    );
    let pending = query::pending_gifts(&world);
    assert_eq!((pending[0].spawned, pending[0].remaining), (0, 4));
    assert_eq!(query::pool_capacity(&world), 3);
}

#[test]
fn throttle_holds_the_next_gift_after_a_completion() {
    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(&mut world, gift(1, "ada"), &mut events);
    world::apply(&mut world, gift(1, "bob"), &mut events);

    events.clear();
    world::apply(&mut world, Command::DrainGiftQueue, &mut events);
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::GiftCompleted { owner, .. } if owner == "ada")));

    world::apply(
        &mut world,
        Command::Tick {
            dt: Duration::from_millis(950),
        },
        &mut events,
    );
    events.clear();
    world::apply(&mut world, Command::DrainGiftQueue, &mut events);
    assert_eq!(
        events,
        vec![Event::SpawnDeferred {
            ticket: TicketId::new(1),
            reason: DeferReason::Throttled,
        }]
    );

    world::apply(
        &mut world,
        Command::Tick {
            dt: Duration::from_millis(50),
        },
        &mut events,
    );
    events.clear();
    world::apply(&mut world, Command::DrainGiftQueue, &mut events);
    assert!(events
        .iter()
        .any(|event| matches!(event, Event::TokenSpawned { owner, .. } if owner == "bob")));
}

#[test]
fn bursty_traffic_preserves_every_invariant() {
    let config = SimulationConfig {
        pool_capacity: 12,
        ..SimulationConfig::default()
    };
    let min_interval = config.min_completion_interval();
    let history_capacity = config.history_capacity;
    let mut world = World::from_config(config).expect("valid config");
    let mut events = Vec::new();
    world::apply(
        &mut world,
        Command::ConfigureSurface {
            surface: SurfaceSize::new(1280.0, 1000.0),
        },
        &mut events,
    );

    let owners = ["ada", "bob", "cy", "dee"];
    let weights = [3, 1, 7, 2, 9, 1, 4, 6];
    for (index, value) in weights.into_iter().enumerate() {
        world::apply(&mut world, gift(value, owners[index % owners.len()]), &mut events);
    }
    let expected_tokens: u32 = weights.iter().sum();

    let rows = query::geometry(&world).rows();
    let mut credited: HashMap<String, u64> = HashMap::new();
    let mut landed = 0u64;
    let mut spawned = 0u32;
    let mut last_completion: Option<Duration> = None;
    let mut current_ticket: Option<TicketId> = None;

    for frame in 0..40_000u32 {
        let mut produced = Vec::new();
        world::apply(&mut world, Command::Tick { dt: FRAME }, &mut produced);
        if frame % 3 == 0 {
            world::apply(&mut world, Command::DrainGiftQueue, &mut produced);
        }
        let now = query::clock(&world);

        for event in &produced {
            match event {
                Event::TokenSpawned {
                    ticket: Some(ticket),
                    ..
                } => {
                    spawned += 1;
                    if current_ticket != Some(*ticket) {
                        if let Some(completed_at) = last_completion {
                            assert!(now - completed_at >= min_interval);
                        }
                        current_ticket = Some(*ticket);
                    }
                }
                Event::GiftCompleted { .. } => last_completion = Some(now),
                Event::TokenLanded { owner, score, .. } => {
                    landed += 1;
                    *credited.entry(owner.clone()).or_default() += u64::from(*score);
                }
                _ => {}
            }
        }

        for token in query::token_view(&world).iter() {
            assert!(token.row <= rows);
            if matches!(token.phase, TokenPhase::Settling | TokenPhase::Bouncing) {
                assert!(token.lane.unsigned_abs() <= token.row);
            }
        }

        let pending = query::pending_gifts(&world);
        let history = query::gift_history(&world);
        assert!(history.len() <= history_capacity);
        for ticket in pending.iter().chain(history.iter()) {
            assert_eq!(ticket.spawned + ticket.remaining, ticket.weight.get());
        }
        for ticket in &history {
            assert_eq!(ticket.remaining, 0);
            assert!(pending.iter().all(|other| other.id != ticket.id));
        }
        assert!(history.windows(2).all(|pair| pair[0].id > pair[1].id));

        if spawned == expected_tokens && query::active_token_count(&world) == 0 {
            break;
        }
    }

    assert_eq!(spawned, expected_tokens);
    assert_eq!(query::active_token_count(&world), 0);
    assert_eq!(query::bin_total(&world), landed);
    assert_eq!(landed, u64::from(expected_tokens));
    for (owner, total) in credited {
        assert_eq!(query::score_for(&world, &owner), Some(total));
    }
}

#[test]
fn score_labels_expire_with_simulated_time() {
    let mut world = World::new();
    let mut events = Vec::new();
    world::apply(&mut world, spawn(1000, "ada"), &mut events);

    let mut landed = false;
    for _ in 0..1_000 {
        events.clear();
        world::apply(&mut world, Command::Tick { dt: FRAME }, &mut events);
        if events
            .iter()
            .any(|event| matches!(event, Event::TokenLanded { .. }))
        {
            landed = true;
            break;
        }
    }
    assert!(landed);
    assert_eq!(query::score_labels(&world).len(), 1);

    world::apply(
        &mut world,
        Command::Tick {
            dt: Duration::from_millis(1_001),
        },
        &mut events,
    );
    assert!(query::score_labels(&world).is_empty());
}
