//! Frame pump wiring the world, its systems and the gift feed together.

use std::{num::NonZeroU32, time::Duration};

use anyhow::{Context, Result};
use galton_board_core::{Command, Event, SimulationConfig, StatsReport};
use galton_board_rendering::FrameInput;
use galton_board_system_analytics::Analytics;
use galton_board_system_bootstrap::{BoardLayout, Bootstrap};
use galton_board_system_ingestion::{Config as IngestionConfig, Ingestion};
use galton_board_system_spawning::{Config as SpawningConfig, Spawning};
use galton_board_transport::{FeedEvent, GiftFeed};
use galton_board_world::{self as world, query, World};
use tracing::{debug, info};

/// Owns the authoritative world and advances it once per frame.
pub(crate) struct Simulation {
    world: World,
    spawning: Spawning,
    ingestion: Ingestion,
    analytics: Analytics,
    bootstrap: Bootstrap,
    layout: BoardLayout,
    feed: Option<GiftFeed>,
    latest_report: Option<StatsReport>,
}

impl Simulation {
    /// Builds the world and its systems from a validated configuration.
    pub(crate) fn new(config: SimulationConfig, feed: Option<GiftFeed>) -> Result<Self> {
        let test_gift_weight = NonZeroU32::new(config.test_gift_weight)
            .context("test gift weight must be positive")?;
        let spawning = Spawning::new(SpawningConfig::new(config.drain_period()));
        let ingestion = Ingestion::new(IngestionConfig::new(
            test_gift_weight,
            config.seed.rotate_left(32),
        ));
        let world = World::from_config(config).context("invalid simulation configuration")?;

        let bootstrap = Bootstrap::default();
        let layout = bootstrap.board_layout(&world);
        info!("{}", bootstrap.welcome_banner(&world));

        Ok(Self {
            world,
            spawning,
            ingestion,
            analytics: Analytics::new(),
            bootstrap,
            layout,
            feed,
            latest_report: None,
        })
    }

    /// Advances the simulation by one frame.
    pub(crate) fn step(&mut self, dt: Duration, input: &FrameInput) {
        let mut commands = Vec::new();
        if let Some(surface) = input.surface {
            commands.push(Command::ConfigureSurface { surface });
        }
        self.pull_feed(&mut commands);
        if input.inject_test_gift {
            self.ingestion.inject_test_gift(&mut commands);
        }
        if input.reset_bins {
            commands.push(Command::ResetBinHistory);
        }
        commands.push(Command::Tick { dt });

        let mut events = Vec::new();
        for command in commands {
            world::apply(&mut self.world, command, &mut events);
        }

        let mut drains = Vec::new();
        self.spawning.handle(
            &events,
            query::pending_gift_count(&self.world),
            &mut drains,
        );
        for command in drains {
            world::apply(&mut self.world, command, &mut events);
        }

        let world = &self.world;
        let mut published = Vec::new();
        self.analytics
            .handle(&events, || Some(query::stats_report(world)), &mut published);
        for event in published {
            if let Event::StatsPublished { report } = event {
                self.latest_report = Some(report);
            }
        }

        if events
            .iter()
            .any(|event| matches!(event, Event::SurfaceConfigured { .. }))
        {
            self.layout = self.bootstrap.board_layout(&self.world);
        }
    }

    fn pull_feed(&mut self, commands: &mut Vec<Command>) {
        let Some(feed) = &self.feed else {
            return;
        };

        let mut payloads = Vec::new();
        for event in feed.drain() {
            match event {
                FeedEvent::Payload(raw) => payloads.push(raw),
                FeedEvent::Connected => debug!("gift feed online"),
                FeedEvent::Disconnected => debug!("gift feed offline, queued gifts keep draining"),
            }
        }
        self.ingestion
            .handle(payloads.iter().map(String::as_str), commands);
    }

    /// The authoritative world.
    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Static board layout for the current surface.
    pub(crate) fn layout(&self) -> &BoardLayout {
        &self.layout
    }

    /// Most recent statistics published by the analytics system.
    pub(crate) fn latest_report(&self) -> Option<&StatsReport> {
        self.latest_report.as_ref()
    }
}
