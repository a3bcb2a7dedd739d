//! Mock presence actor -- keeps the location store populated.
//!
//! Generates a population around the configured origin, reports every
//! player once, then flips one player's online state each interval.
//! Marks the whole population offline on shutdown.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::actors::{Actor, ReconfigureOutcome};
use crate::bus::{BusReceiver, BusSender, PollError};
use crate::state::SystemState;
use playermap::{
    ActorState, ActorStatus, GeneratorSettings, LocationReport, MockPlayersSection, Player,
    PlayermapMessage, PopulationGenerator, PresenceEvent, presence_room,
};

/// Mock presence actor. Holds the section it was built from so
/// `reconfigure()` can tell when to restart.
pub struct MockPresenceActor {
    section: MockPlayersSection,
    settings: GeneratorSettings,
}

impl MockPresenceActor {
    pub fn new(section: MockPlayersSection, settings: GeneratorSettings) -> Self {
        Self { section, settings }
    }
}

impl Actor for MockPresenceActor {
    fn start(&self, _state: Arc<SystemState>, sender: BusSender, receiver: BusReceiver) {
        let seed = self.section.seed.unwrap_or_else(time_seed);
        let sim = Simulation::new(sender.actor_id(), &self.section, &self.settings, seed);
        let interval = Duration::from_secs(self.section.interval_secs.max(1));
        let thread_name = format!("mock:{}", sender.actor_id());

        if let Err(e) = std::thread::Builder::new()
            .name(thread_name)
            .spawn(move || run(sim, interval, sender, receiver))
        {
            tracing::error!("mock presence: failed to spawn thread: {e}");
        }
    }

    fn reconfigure(&self, state: &Arc<SystemState>, sender: &BusSender) -> ReconfigureOutcome {
        let snap = state.system.snapshot();
        let index = sender
            .actor_id()
            .strip_prefix("mock_players.")
            .unwrap_or_default();
        match snap.mock_players.get(index) {
            Some(section)
                if *section == self.section
                    && section.generator_settings(&snap.generator) == self.settings =>
            {
                ReconfigureOutcome::NoChange
            }
            _ => ReconfigureOutcome::RestartRequired,
        }
    }
}

fn time_seed() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

/// Simulated population state, separate from the thread for testing.
pub(crate) struct Simulation {
    reports: Vec<LocationReport>,
    rng: ChaCha8Rng,
}

impl Simulation {
    pub(crate) fn new(
        actor_id: &str,
        section: &MockPlayersSection,
        settings: &GeneratorSettings,
        seed: u64,
    ) -> Self {
        let players = PopulationGenerator::seeded(seed).generate(section.origin(), settings);
        Self {
            reports: players.iter().map(|p| report_for(actor_id, p)).collect(),
            // Offset so toggles don't replay the generator's stream.
            rng: ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
        }
    }

    /// One `Updated` per player.
    pub(crate) fn announce(&self) -> Vec<PresenceEvent> {
        self.reports.iter().map(updated).collect()
    }

    /// Flip one random player's online state. `None` for an empty population.
    pub(crate) fn step(&mut self) -> Option<PresenceEvent> {
        if self.reports.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..self.reports.len());
        let report = &mut self.reports[idx];
        report.is_online = !report.is_online;
        Some(if report.is_online {
            updated(report)
        } else {
            offline(report)
        })
    }

    /// `Offline` for everyone still online.
    pub(crate) fn retire(&mut self) -> Vec<PresenceEvent> {
        self.reports
            .iter_mut()
            .filter(|r| r.is_online)
            .map(|r| {
                r.is_online = false;
                offline(r)
            })
            .collect()
    }

    pub(crate) fn telemetry(&self) -> HashMap<String, String> {
        let online = self.reports.iter().filter(|r| r.is_online).count();
        HashMap::from([
            ("players".into(), self.reports.len().to_string()),
            ("online".into(), online.to_string()),
        ])
    }
}

fn report_for(actor_id: &str, player: &Player) -> LocationReport {
    LocationReport {
        user_id: format!("{actor_id}:{}", player.id),
        username: player.name.clone(),
        game: player.game.clone(),
        location: player.location,
        is_online: player.is_online,
        level: player.level,
        achievements: Some(player.achievements.clone()),
    }
}

fn room_of(report: &LocationReport) -> Option<String> {
    Some(presence_room(report.location.lat, report.location.lng))
}

fn updated(report: &LocationReport) -> PresenceEvent {
    PresenceEvent::Updated {
        room: room_of(report),
        report: report.clone(),
    }
}

fn offline(report: &LocationReport) -> PresenceEvent {
    PresenceEvent::Offline {
        room: room_of(report),
        user_id: report.user_id.clone(),
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn run(mut sim: Simulation, interval: Duration, sender: BusSender, mut receiver: BusReceiver) {
    let name = sender.actor_id().to_string();

    for event in sim.announce() {
        sender.send(PlayermapMessage::new(event));
    }
    sender.send(PlayermapMessage::new(ActorState::new(
        ActorStatus::Connected,
        sim.telemetry(),
    )));
    tracing::info!("mock presence '{name}': announced -- toggling every {interval:?}");

    let mut last_step = Instant::now();
    loop {
        // Drain; the actor only cares about shutdown.
        loop {
            match receiver.poll() {
                Err(PollError::Shutdown) => {
                    for event in sim.retire() {
                        sender.send(PlayermapMessage::new(event));
                    }
                    tracing::info!("mock presence '{name}': shutting down");
                    return;
                }
                Ok(None) => break,
                Ok(Some(_)) => {}
            }
        }

        if last_step.elapsed() >= interval {
            last_step = Instant::now();
            if let Some(event) = sim.step() {
                tracing::debug!("mock presence '{name}': {event:?}");
                sender.send(PlayermapMessage::new(event));
                sender.send(PlayermapMessage::new(ActorState::new(
                    ActorStatus::Connected,
                    sim.telemetry(),
                )));
            }
        }

        std::thread::sleep(Duration::from_millis(100));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(count: usize) -> MockPlayersSection {
        MockPlayersSection {
            name: "Simulated".into(),
            origin: None,
            count,
            radius_km: 5.0,
            interval_secs: 30,
            seed: Some(9),
        }
    }

    fn sim(count: usize) -> Simulation {
        let s = section(count);
        let settings = s.generator_settings(&GeneratorSettings::default());
        Simulation::new("mock_players.0", &s, &settings, 9)
    }

    #[test]
    fn announce_reports_everyone_in_their_room() {
        let sim = sim(12);
        let events = sim.announce();
        assert_eq!(events.len(), 12);
        for event in &events {
            let PresenceEvent::Updated { room, report } = event else {
                panic!("expected update");
            };
            assert!(report.user_id.starts_with("mock_players.0:player-"));
            assert_eq!(
                room.as_deref(),
                Some(presence_room(report.location.lat, report.location.lng).as_str())
            );
        }
    }

    #[test]
    fn step_toggles_and_is_deterministic() {
        let mut a = sim(10);
        let mut b = sim(10);
        let before: usize = a.telemetry()["online"].parse().unwrap();
        let event = a.step().unwrap();
        let after: usize = a.telemetry()["online"].parse().unwrap();
        match event {
            PresenceEvent::Updated { .. } => assert_eq!(after, before + 1),
            PresenceEvent::Offline { .. } => assert_eq!(after + 1, before),
            PresenceEvent::Recorded { .. } => panic!("unexpected record"),
        }
        for _ in 0..5 {
            a.step();
        }
        for _ in 0..6 {
            b.step();
        }
        assert_eq!(a.telemetry(), b.telemetry());
    }

    #[test]
    fn retire_takes_everyone_offline_once() {
        let mut sim = sim(10);
        let online: usize = sim.telemetry()["online"].parse().unwrap();
        assert_eq!(sim.retire().len(), online);
        assert!(sim.retire().is_empty());
        assert_eq!(sim.telemetry()["online"], "0");
    }

    #[test]
    fn empty_population_never_steps() {
        let mut sim = sim(0);
        assert!(sim.announce().is_empty());
        assert!(sim.step().is_none());
    }
}
