// Copyright (C) 2026 StarHuntingGames
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Phase cycle: start, advance, night resolution and vote eliminations.
//!
//! Every function here mutates only the given [`LiveGameState`]; persisting
//! the outcome is left to the caller. The win evaluator runs whenever a night
//! is resolved and after every lynch.

use std::collections::BTreeMap;

use chrono::Utc;
use mafia_common::{GameResult, Phase, PhaseKind};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    error::EngineError,
    state::{LiveGameState, MachineState},
    win::{WinRule, evaluate},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NightReport {
    pub killed: Option<String>,
    /// Set when the doctor's heal cancelled the kill.
    pub saved: Option<String>,
}

impl NightReport {
    pub fn narrative(&self) -> String {
        match (&self.killed, &self.saved) {
            (Some(killed), _) => format!("{killed} was killed during the night."),
            (None, Some(saved)) => {
                format!("The mafia struck at {saved}, but the doctor saved them. Nobody died.")
            }
            (None, None) => "The night was quiet. Nobody died.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Transition {
    pub night: Option<NightReport>,
    /// Player indices eliminated by this transition.
    pub eliminated: Vec<usize>,
    /// Present when this transition ended the game.
    pub result: Option<GameResult>,
    /// The stored phase was not in the catalog and the cycle restarted.
    pub restarted: bool,
}

/// Uninitialized -> first catalog phase, round 1.
pub fn start(state: &mut LiveGameState, phases: &[Phase]) -> Result<Transition, EngineError> {
    let first = phases.first().ok_or(EngineError::NoPhasesConfigured)?;
    match state.machine {
        MachineState::Running(_) => return Err(EngineError::AlreadyStarted),
        MachineState::Finished(_) => return Err(EngineError::AlreadyFinished),
        MachineState::Uninitialized => {}
    }

    state.round = 1;
    enter(state, first.clone());
    Ok(Transition::default())
}

pub fn advance(
    state: &mut LiveGameState,
    phases: &[Phase],
    rule: WinRule,
) -> Result<Transition, EngineError> {
    if phases.is_empty() {
        return Err(EngineError::NoPhasesConfigured);
    }

    let current = match &state.machine {
        MachineState::Finished(_) => return Err(EngineError::AlreadyFinished),
        MachineState::Uninitialized => return start(state, phases),
        MachineState::Running(phase) => phase.clone(),
    };

    let Some(index) = phases.iter().position(|phase| phase.name == current.name) else {
        warn!(
            session_id = %state.session_id,
            phase = %current.name,
            "current phase missing from catalog; restarting cycle"
        );
        enter(state, phases[0].clone());
        return Ok(Transition {
            restarted: true,
            ..Transition::default()
        });
    };

    let mut transition = Transition::default();
    if current.kind == PhaseKind::Night {
        let (report, killed) = resolve_night(state, &current);
        transition.night = Some(report);
        transition.eliminated.extend(killed);
        if let Some(result) = check_finish(state, rule) {
            transition.result = Some(result);
            return Ok(transition);
        }
    }

    let next = if index + 1 == phases.len() {
        state.round += 1;
        phases[0].clone()
    } else {
        phases[index + 1].clone()
    };
    debug!(
        session_id = %state.session_id,
        from = %current.name,
        to = %next.name,
        round = state.round,
        "phase advanced"
    );
    enter(state, next);
    Ok(transition)
}

/// Applies pending night actions. Returns the report and the index of the
/// player who died, if any.
pub fn resolve_night(state: &mut LiveGameState, night: &Phase) -> (NightReport, Option<usize>) {
    let kill = state.pending_kill.take();
    let heal = state.pending_heal.take();
    state.pending_check = None;

    let mut report = NightReport::default();
    let mut killed = None;
    if let Some(target) = kill {
        if heal == Some(target) {
            report.saved = Some(state.players[target].name.clone());
        } else if state.players[target].alive {
            state.eliminate(target, &night.name);
            report.killed = Some(state.players[target].name.clone());
            killed = Some(target);
        }
    }

    state.last_night_killed = report.killed.clone();
    (report, killed)
}

/// Vote-phase elimination. Runs the evaluator immediately afterwards.
pub fn lynch(
    state: &mut LiveGameState,
    target: usize,
    rule: WinRule,
) -> Result<Option<GameResult>, EngineError> {
    let phase = require_phase(state, PhaseKind::Vote, "lynch")?;
    if state.vote_resolved {
        return Err(EngineError::ActionUnavailable(
            "the town has already decided this round".to_string(),
        ));
    }
    if !state.players[target].alive {
        return Err(EngineError::TargetNotAlive(state.players[target].name.clone()));
    }

    state.eliminate(target, &phase.name);
    state.vote_resolved = true;
    Ok(check_finish(state, rule))
}

/// Runs the win evaluator and, on a winner, moves the machine to Finished and
/// builds the one-time result.
pub fn check_finish(state: &mut LiveGameState, rule: WinRule) -> Option<GameResult> {
    if state.is_finished() {
        return None;
    }

    let counts = state.faction_counts();
    let winner = evaluate(counts, rule)?;
    let result = GameResult {
        session_id: state.session_id.clone(),
        winner_side: winner,
        rounds_count: state.round,
        mafia_count: counts.mafia,
        town_count: counts.town,
    };

    state.machine = MachineState::Finished(winner);
    state.finished_at = Some(Utc::now());
    state.pending_kill = None;
    state.pending_heal = None;
    state.pending_check = None;
    state.result = Some(result.clone());
    Some(result)
}

/// The target with strictly the most votes, if there is one.
pub fn majority_target(votes: &BTreeMap<usize, usize>) -> Option<usize> {
    let mut tally: BTreeMap<usize, usize> = BTreeMap::new();
    for target in votes.values() {
        *tally.entry(*target).or_insert(0) += 1;
    }

    let top = tally.values().copied().max()?;
    let mut leaders = tally.iter().filter(|(_, count)| **count == top);
    let (leader, _) = leaders.next()?;
    if leaders.next().is_some() {
        return None;
    }
    Some(*leader)
}

/// Returns the current phase when it has the given kind.
pub fn require_phase(
    state: &LiveGameState,
    kind: PhaseKind,
    action: &'static str,
) -> Result<Phase, EngineError> {
    match &state.machine {
        MachineState::Finished(_) => Err(EngineError::AlreadyFinished),
        MachineState::Running(phase) if phase.kind == kind => Ok(phase.clone()),
        _ => Err(EngineError::WrongPhase {
            action,
            phase: state.phase_label(),
        }),
    }
}

fn enter(state: &mut LiveGameState, phase: Phase) {
    match phase.kind {
        PhaseKind::Night => {
            state.pending_kill = None;
            state.pending_heal = None;
            state.pending_check = None;
        }
        PhaseKind::Vote => {
            state.votes.clear();
            state.vote_resolved = false;
        }
        PhaseKind::Day | PhaseKind::Other => {}
    }
    state.machine = MachineState::Running(phase);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mafia_common::{Catalog, WinnerSide, default_catalog};

    fn seated(catalog: &Catalog, seats: &[(&str, &str)]) -> LiveGameState {
        let mode = catalog.default_mode().unwrap().clone();
        let mut state = LiveGameState::new("chat", mode, "host", seats.len());
        for (name, role) in seats {
            let index = state.add_player(name).unwrap();
            state.players[index].role = catalog.role_by_name(role).cloned();
        }
        state.roles_assigned = true;
        state
    }

    fn phase_name(state: &LiveGameState) -> Option<&str> {
        state.current_phase().map(|phase| phase.name.as_str())
    }

    #[test]
    fn four_advances_from_uninitialized_return_to_night_of_next_round() {
        let catalog = default_catalog();
        let mut state = seated(
            &catalog,
            &[("Alice", "Civilian"), ("Bob", "Mafia"), ("Carol", "Civilian")],
        );
        let rule = WinRule::ThreeFaction;

        advance(&mut state, catalog.phases(), rule).unwrap();
        assert_eq!((phase_name(&state), state.round), (Some("Night"), 1));
        advance(&mut state, catalog.phases(), rule).unwrap();
        assert_eq!((phase_name(&state), state.round), (Some("Day"), 1));
        advance(&mut state, catalog.phases(), rule).unwrap();
        assert_eq!((phase_name(&state), state.round), (Some("Vote"), 1));
        advance(&mut state, catalog.phases(), rule).unwrap();
        assert_eq!((phase_name(&state), state.round), (Some("Night"), 2));
    }

    #[test]
    fn heal_on_kill_target_cancels_the_kill() {
        let catalog = default_catalog();
        let mut state = seated(
            &catalog,
            &[
                ("Alice", "Civilian"),
                ("Bob", "Mafia"),
                ("Carol", "Doctor"),
                ("Dave", "Civilian"),
            ],
        );
        start(&mut state, catalog.phases()).unwrap();
        state.pending_kill = Some(0);
        state.pending_heal = Some(0);

        let transition = advance(&mut state, catalog.phases(), WinRule::ThreeFaction).unwrap();
        let report = transition.night.unwrap();
        assert!(state.players[0].alive);
        assert_eq!(report.killed, None);
        assert_eq!(report.saved.as_deref(), Some("Alice"));
        assert!(report.narrative().contains("Nobody died"));
        assert!(transition.eliminated.is_empty());
        assert_eq!(phase_name(&state), Some("Day"));
        assert_eq!(state.pending_kill, None);
        assert_eq!(state.pending_heal, None);
    }

    #[test]
    fn night_kill_records_phase_and_round() {
        let catalog = default_catalog();
        let mut state = seated(
            &catalog,
            &[
                ("Alice", "Civilian"),
                ("Bob", "Mafia"),
                ("Carol", "Civilian"),
                ("Dave", "Civilian"),
            ],
        );
        start(&mut state, catalog.phases()).unwrap();
        state.pending_kill = Some(2);
        state.pending_check = Some(1);

        let transition = advance(&mut state, catalog.phases(), WinRule::ThreeFaction).unwrap();
        assert_eq!(transition.eliminated, vec![2]);
        assert!(!state.players[2].alive);
        assert_eq!(state.players[2].fail_phase.as_deref(), Some("Night"));
        assert_eq!(state.players[2].fail_round, Some(1));
        assert_eq!(state.last_night_killed.as_deref(), Some("Carol"));
        assert_eq!(state.pending_check, None);
        assert!(transition.result.is_none());
    }

    #[test]
    fn night_kill_that_wins_finishes_instead_of_entering_day() {
        let catalog = default_catalog();
        let mut state = seated(&catalog, &[("Alice", "Civilian"), ("Bob", "Mafia")]);
        start(&mut state, catalog.phases()).unwrap();
        state.pending_kill = Some(0);

        let transition = advance(&mut state, catalog.phases(), WinRule::ThreeFaction).unwrap();
        let result = transition.result.unwrap();
        assert_eq!(result.winner_side, WinnerSide::Mafia);
        assert_eq!(result.rounds_count, 1);
        assert_eq!(result.mafia_count, 1);
        assert_eq!(result.town_count, 0);
        assert_eq!(state.machine, MachineState::Finished(WinnerSide::Mafia));
        assert!(state.finished_at.is_some());

        assert_eq!(
            advance(&mut state, catalog.phases(), WinRule::ThreeFaction).unwrap_err(),
            EngineError::AlreadyFinished
        );
    }

    #[test]
    fn decided_table_finishes_when_the_night_ends_without_a_death() {
        let catalog = default_catalog();
        let mut state = seated(
            &catalog,
            &[("Alice", "Civilian"), ("Bob", "Commissar"), ("Carol", "Civilian")],
        );
        start(&mut state, catalog.phases()).unwrap();

        let transition = advance(&mut state, catalog.phases(), WinRule::ThreeFaction).unwrap();
        assert!(transition.eliminated.is_empty());
        assert_eq!(transition.night.unwrap().killed, None);
        let result = transition.result.unwrap();
        assert_eq!(result.winner_side, WinnerSide::Town);
        assert_eq!(result.rounds_count, 1);
        assert_eq!(state.machine, MachineState::Finished(WinnerSide::Town));
    }

    #[test]
    fn lynch_evaluates_immediately() {
        let catalog = default_catalog();
        let mut state = seated(
            &catalog,
            &[("Alice", "Civilian"), ("Bob", "Mafia"), ("Carol", "Civilian")],
        );
        start(&mut state, catalog.phases()).unwrap();
        advance(&mut state, catalog.phases(), WinRule::ThreeFaction).unwrap();
        advance(&mut state, catalog.phases(), WinRule::ThreeFaction).unwrap();

        let result = lynch(&mut state, 1, WinRule::ThreeFaction).unwrap().unwrap();
        assert_eq!(result.winner_side, WinnerSide::Town);
        assert_eq!(state.players[1].fail_phase.as_deref(), Some("Vote"));
        assert!(state.is_finished());
    }

    #[test]
    fn lynch_outside_vote_phase_is_rejected() {
        let catalog = default_catalog();
        let mut state = seated(&catalog, &[("Alice", "Civilian"), ("Bob", "Mafia")]);
        start(&mut state, catalog.phases()).unwrap();
        assert!(matches!(
            lynch(&mut state, 0, WinRule::ThreeFaction),
            Err(EngineError::WrongPhase { action: "lynch", .. })
        ));
        assert!(state.players[0].alive);
    }

    #[test]
    fn only_one_lynch_per_vote_phase() {
        let catalog = default_catalog();
        let mut state = seated(
            &catalog,
            &[
                ("Alice", "Civilian"),
                ("Bob", "Mafia"),
                ("Carol", "Civilian"),
                ("Dave", "Mafia"),
                ("Erin", "Civilian"),
            ],
        );
        start(&mut state, catalog.phases()).unwrap();
        advance(&mut state, catalog.phases(), WinRule::ThreeFaction).unwrap();
        advance(&mut state, catalog.phases(), WinRule::ThreeFaction).unwrap();
        assert_eq!(lynch(&mut state, 0, WinRule::ThreeFaction).unwrap(), None);
        assert!(matches!(
            lynch(&mut state, 2, WinRule::ThreeFaction),
            Err(EngineError::ActionUnavailable(_))
        ));
    }

    #[test]
    fn stale_phase_restarts_cycle_without_changing_round() {
        let catalog = default_catalog();
        let mut state = seated(&catalog, &[("Alice", "Civilian"), ("Bob", "Mafia")]);
        state.round = 3;
        state.machine = MachineState::Running(Phase {
            name: "Twilight".to_string(),
            order: 9,
            kind: PhaseKind::Other,
        });

        let transition = advance(&mut state, catalog.phases(), WinRule::ThreeFaction).unwrap();
        assert!(transition.restarted);
        assert_eq!(phase_name(&state), Some("Night"));
        assert_eq!(state.round, 3);
    }

    #[test]
    fn empty_phase_catalog_cannot_start() {
        let catalog = default_catalog();
        let mut state = seated(&catalog, &[("Alice", "Civilian")]);
        assert_eq!(
            start(&mut state, &[]).unwrap_err(),
            EngineError::NoPhasesConfigured
        );
        assert_eq!(
            advance(&mut state, &[], WinRule::ThreeFaction).unwrap_err(),
            EngineError::NoPhasesConfigured
        );
        assert_eq!(state.machine, MachineState::Uninitialized);
    }

    #[test]
    fn start_twice_is_already_started() {
        let catalog = default_catalog();
        let mut state = seated(&catalog, &[("Alice", "Civilian")]);
        start(&mut state, catalog.phases()).unwrap();
        assert_eq!(
            start(&mut state, catalog.phases()).unwrap_err(),
            EngineError::AlreadyStarted
        );
    }

    #[test]
    fn majority_requires_a_unique_leader() {
        let votes = BTreeMap::from([(0, 2), (1, 2), (2, 0), (3, 1)]);
        assert_eq!(majority_target(&votes), Some(2));

        let tied = BTreeMap::from([(0, 2), (1, 2), (2, 0), (3, 0)]);
        assert_eq!(majority_target(&tied), None);

        assert_eq!(majority_target(&BTreeMap::new()), None);
    }
}
