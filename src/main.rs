#![allow(dead_code, clippy::similar_names)]
#![warn(clippy::shadow_reuse, clippy::shadow_same, clippy::builtin_type_shadow)]
mod common;
mod config;
mod console;
mod group_map;
mod http_handler;
mod keychain;
mod logger;
mod orbit_track;
mod presentation;
mod propagation;

use crate::common::sim_clock::{SimClock, SpeedLadder};
use crate::config::PlotConfig;
use crate::console::{ConsoleCommand, spawn_stdin_reader};
use crate::group_map::GroupMap;
use crate::keychain::Keychain;
use crate::presentation::{HeadlessScene, HoverEvent, HoverIntentHandler, PointerEvent};
use crate::propagation::GroupDispatcher;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{RwLock, mpsc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Half-extent of the headless view in scene units; the globe has radius 5.
const VIEW_RADIUS: f32 = 12.0;
const PICK_RADIUS: f32 = 0.08;
const CHANNEL_BUFFER: usize = 64;

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() {
    let config = PlotConfig::from_env().unwrap_or_else(|e| fatal!("Invalid configuration: {e}"));
    let keychain = Keychain::new(config).unwrap_or_else(|e| fatal!("Unable to set up the group source: {e}"));
    let config = keychain.config();

    let dispatcher = GroupDispatcher::start(config.workers, keychain.propagator())
        .unwrap_or_else(|e| fatal!("Unable to start propagation workers: {e}"));
    let scene = Arc::new(RwLock::new(HeadlessScene::new(VIEW_RADIUS, PICK_RADIUS)));
    let mut groups = GroupMap::new(
        dispatcher,
        keychain.source(),
        Arc::clone(&scene),
        config.tracks.clone(),
        config.bounds_refresh_ticks,
    );
    display_initial_groups(&mut groups, &config).await;

    let cancel = CancellationToken::new();
    let (pointer_tx, pointer_rx) = mpsc::channel(CHANNEL_BUFFER);
    let (hover_tx, mut hover_rx) = mpsc::channel(CHANNEL_BUFFER);
    let hover_driver = tokio::spawn(HoverIntentHandler::new(config.hover_interval).run(
        Arc::clone(&scene),
        pointer_rx,
        hover_tx,
        cancel.clone(),
    ));
    let mut console = spawn_stdin_reader(CHANNEL_BUFFER);
    let mut console_open = true;

    let mut clock = SimClock::new(Utc::now());
    let mut ladder = SpeedLadder::default();
    let mut frames = tokio::time::interval(config.frame_interval());
    frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats = tokio::time::interval(config.stats_interval);
    stats.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!("Running at {} Hz with {} worker(s)", config.refresh_rate, config.workers);

    loop {
        tokio::select! {
            _ = frames.tick() => {
                let instant = clock.sync(Utc::now());
                groups.tick(instant).await;
            }
            Some(hover_event) = hover_rx.recv() => {
                if let HoverEvent::Hover(target) = &hover_event {
                    if let Some(name) = groups.member_name(target) {
                        log!("Hovering {name} ({target})");
                    }
                }
                groups.on_hover(hover_event);
            }
            command = console.recv(), if console_open => {
                let Some(command) = command else {
                    info!("Console input closed");
                    console_open = false;
                    continue;
                };
                match command {
                    ConsoleCommand::Move(pos) => { let _ = pointer_tx.send(PointerEvent::Move(pos)).await; }
                    ConsoleCommand::Click(pos) => { let _ = pointer_tx.send(PointerEvent::Click(pos)).await; }
                    ConsoleCommand::Faster => match ladder.faster() {
                        Some(factor) => change_speed(&mut groups, &mut clock, factor, ladder.label()),
                        None => warn!("Already at the highest speed ({})", ladder.label()),
                    },
                    ConsoleCommand::Slower => match ladder.slower() {
                        Some(factor) => change_speed(&mut groups, &mut clock, factor, ladder.label()),
                        None => warn!("Already at the lowest speed ({})", ladder.label()),
                    },
                    ConsoleCommand::RealTime => {
                        ladder.reset();
                        clock.reset(Utc::now());
                        groups.reset();
                        log!("Back to real time");
                    }
                    ConsoleCommand::Show(name) => {
                        if let Err(e) = groups.display_by_name(&name).await {
                            error!("Unable to display {name}: {e}");
                        }
                    }
                    ConsoleCommand::Hide(name) => {
                        if let Err(e) = groups.hide_by_name(&name).await {
                            error!("Unable to hide {name}: {e}");
                        }
                    }
                    ConsoleCommand::Tracks(visible) => groups.set_tracks_visible(visible).await,
                    ConsoleCommand::Stats => log_stats(&groups, &scene, &clock).await,
                    ConsoleCommand::Quit => break,
                }
            }
            _ = stats.tick() => log_stats(&groups, &scene, &clock).await,
        }
    }

    cancel.cancel();
    if let Ok(handler) = hover_driver.await {
        info!("Hover driver ran {} hit test(s)", handler.hit_test_count());
    }
    groups.shutdown();
}

/// Displays the configured groups, or every listed group if none are configured.
async fn display_initial_groups(groups: &mut GroupMap<HeadlessScene>, config: &PlotConfig) {
    let names: Vec<String> = if config.groups.is_empty() {
        match groups.index().await {
            Ok(index) => index.iter().map(|(name, _)| name.to_string()).collect(),
            Err(e) => {
                error!("Unable to fetch the group index: {e}");
                return;
            }
        }
    } else {
        config.groups.clone()
    };
    for name in names {
        if let Err(e) = groups.display_by_name(&name).await {
            error!("Group {name} stays hidden: {e}");
        }
    }
}

fn change_speed(groups: &mut GroupMap<HeadlessScene>, clock: &mut SimClock, factor: f64, label: &str) {
    clock.set_speed(factor, Utc::now());
    groups.set_speed(factor);
    log!("Simulation speed {label}");
}

async fn log_stats(groups: &GroupMap<HeadlessScene>, scene: &RwLock<HeadlessScene>, clock: &SimClock) {
    let stats = scene.read().await.stats();
    log!(
        "{} at {:.0}x: {}/{} group(s) visible, {} valid instance(s), {} track(s), shown: {:?}",
        clock.instant().format("%Y-%m-%d %H:%M:%S"),
        clock.speed(),
        stats.visible_groups,
        stats.groups,
        stats.valid_instances,
        stats.tracks,
        groups.displayed_names()
    );
}
