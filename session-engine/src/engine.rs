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

//! Host command facade over the live registry.
//!
//! Each command locks one game, validates, mutates the live state and then
//! queues the resulting deltas for the durable store.

use std::{
    sync::{Arc, Mutex as StdMutex, PoisonError},
    time::Duration,
};

use mafia_common::{
    Catalog, DEFAULT_STORE_SYNC_TIMEOUT_MS, Faction, GameResult, GameVariant, PhaseKind,
    ROLE_COMMISSAR, ROLE_DOCTOR, RolesMode, SessionStatus, VoteRecord, WinTally, WinnerSide,
};
use rand::{SeedableRng, rngs::StdRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    assignment::plan_assignment,
    error::EngineError,
    phase::{self, NightReport, Transition},
    registry::LiveGameRegistry,
    role_pool::validate_player_count,
    state::{LiveGameState, MachineState},
    store::SessionStore,
    sync::{StoreSync, SyncOp},
    view::LiveGameView,
    win::WinRule,
};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub win_rule: WinRule,
    /// Bound on each store write and on the flush before the machine starts.
    pub sync_timeout: Duration,
    pub shuffle_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            win_rule: WinRule::default(),
            sync_timeout: Duration::from_millis(DEFAULT_STORE_SYNC_TIMEOUT_MS),
            shuffle_seed: None,
        }
    }
}

/// Commissar check outcome, shown to the host only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub target: String,
    pub seat: usize,
    pub is_mafia: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub message: String,
    /// Absent after a reset.
    pub state: Option<LiveGameView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub night: Option<NightReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GameResult>,
}

impl CommandOutcome {
    fn new(message: impl Into<String>, state: &LiveGameState) -> Self {
        Self {
            message: message.into(),
            state: Some(LiveGameView::from(state)),
            check: None,
            deck: None,
            night: None,
            result: None,
        }
    }
}

pub struct GameEngine {
    catalog: Arc<Catalog>,
    registry: Arc<LiveGameRegistry>,
    store: Arc<dyn SessionStore>,
    sync: StoreSync,
    config: EngineConfig,
    rng: StdMutex<StdRng>,
}

impl GameEngine {
    /// Must be called inside a tokio runtime; spawns the store sync worker.
    pub fn new(
        catalog: Arc<Catalog>,
        registry: Arc<LiveGameRegistry>,
        store: Arc<dyn SessionStore>,
        config: EngineConfig,
    ) -> Self {
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            catalog,
            registry,
            sync: StoreSync::spawn(store.clone(), config.sync_timeout),
            store,
            config,
            rng: StdMutex::new(rng),
        }
    }

    /// `mode` is a catalog mode name or id; the default mode when absent.
    pub async fn create_session(
        &self,
        conversation_id: &str,
        player_count: usize,
        mode: Option<&str>,
        host: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let mode = match mode {
            Some(name) => self
                .catalog
                .mode_by_name(name)
                .or_else(|| {
                    name.trim()
                        .parse()
                        .ok()
                        .and_then(|id| self.catalog.mode_by_id(id))
                })
                .ok_or_else(|| EngineError::UnknownMode(name.to_string()))?,
            None => self
                .catalog
                .default_mode()
                .ok_or_else(|| EngineError::UnknownMode("default".to_string()))?,
        };
        validate_player_count(mode, player_count)?;

        let state = LiveGameState::new(conversation_id, mode.clone(), host, player_count);
        let game = self.registry.insert(state).await?;
        let state = game.lock().await;
        self.sync.enqueue(SyncOp::SaveSession(state.session_record()));
        info!(
            conversation_id,
            session_id = %state.session_id,
            mode = %state.mode.name,
            player_count,
            "session created"
        );

        Ok(CommandOutcome::new(
            format!(
                "New {} game for {player_count} players. Seat the players to continue.",
                state.mode.name
            ),
            &state,
        ))
    }

    pub async fn add_player(
        &self,
        conversation_id: &str,
        name: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let game = self.registry.get(conversation_id).await?;
        let mut state = game.lock().await;
        if state.is_finished() {
            return Err(EngineError::AlreadyFinished);
        }
        if state.roles_assigned {
            return Err(EngineError::AlreadyAssigned);
        }
        if state.players.len() >= state.planned_count {
            return Err(EngineError::ActionUnavailable(format!(
                "the table is full ({} players)",
                state.planned_count
            )));
        }

        let index = state.add_player(name)?;
        self.sync.enqueue(SyncOp::SavePlayer(state.player_record(index)));

        let player = &state.players[index];
        let message = format!(
            "{} takes seat {} ({}/{}).",
            player.name,
            player.seat,
            state.players.len(),
            state.planned_count
        );
        Ok(CommandOutcome::new(message, &state))
    }

    /// Deals roles to every seated player and starts the phase machine.
    pub async fn assign_roles(
        &self,
        conversation_id: &str,
        roles_mode: RolesMode,
    ) -> Result<CommandOutcome, EngineError> {
        let game = self.registry.get(conversation_id).await?;
        let mut state = game.lock().await;
        if state.is_finished() {
            return Err(EngineError::AlreadyFinished);
        }
        if state.roles_assigned {
            return Err(EngineError::AlreadyAssigned);
        }
        if state.players.len() != state.planned_count {
            return Err(EngineError::InvalidPlayerCount {
                actual: state.players.len(),
                expected: format!("all {} planned players must be seated", state.planned_count),
            });
        }
        if self.catalog.phases().is_empty() {
            return Err(EngineError::NoPhasesConfigured);
        }

        let plan = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            plan_assignment(
                &state.mode,
                state.players.len(),
                &self.catalog,
                roles_mode,
                &mut *rng,
            )?
        };
        if plan.padded > 0 {
            warn!(
                session_id = %state.session_id,
                padded = plan.padded,
                "role pool was short; padded by cycling the catalog"
            );
        }

        for (player, role) in state.players.iter_mut().zip(plan.roles) {
            player.role = Some(role);
        }
        state.roles_assigned = true;
        state.roles_mode = roles_mode;
        self.sync.enqueue_all(
            (0..state.players.len()).map(|index| SyncOp::SavePlayer(state.player_record(index))),
        );
        if !self.sync.flush(self.config.sync_timeout).await {
            warn!(
                session_id = %state.session_id,
                "role bindings not confirmed by the store before start"
            );
        }

        phase::start(&mut state, self.catalog.phases())?;
        self.sync.enqueue(SyncOp::SaveSession(state.session_record()));
        info!(
            session_id = %state.session_id,
            roles_mode = ?roles_mode,
            "roles assigned; game started"
        );

        let mut outcome = CommandOutcome::new(
            format!(
                "Roles are dealt. {} of round {} begins.",
                state.phase_label(),
                state.round
            ),
            &state,
        );
        outcome.deck = plan.deck;
        Ok(outcome)
    }

    pub async fn start(&self, conversation_id: &str) -> Result<CommandOutcome, EngineError> {
        let game = self.registry.get(conversation_id).await?;
        let mut state = game.lock().await;
        if matches!(state.machine, MachineState::Uninitialized) && !state.roles_assigned {
            return Err(EngineError::RolesNotAssigned);
        }

        phase::start(&mut state, self.catalog.phases())?;
        self.sync.enqueue(SyncOp::SaveSession(state.session_record()));
        info!(session_id = %state.session_id, "game started");

        Ok(CommandOutcome::new(
            format!("{} of round {} begins.", state.phase_label(), state.round),
            &state,
        ))
    }

    /// Commissar check; one per night.
    pub async fn inspect(
        &self,
        conversation_id: &str,
        target: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let game = self.registry.get(conversation_id).await?;
        let mut state = game.lock().await;
        phase::require_phase(&state, PhaseKind::Night, "inspect")?;
        if !state.has_alive_role(ROLE_COMMISSAR) {
            return Err(EngineError::ActionUnavailable(
                "there is no living commissar".to_string(),
            ));
        }
        if state.pending_check.is_some() {
            return Err(EngineError::ActionUnavailable(
                "the commissar has already checked someone tonight".to_string(),
            ));
        }

        let index = state.resolve_alive_target(target)?;
        state.pending_check = Some(index);
        let player = &state.players[index];
        let check = CheckResult {
            target: player.name.clone(),
            seat: player.seat,
            is_mafia: player
                .role
                .as_ref()
                .is_some_and(|role| role.faction == Faction::Mafia),
        };

        let verdict = if check.is_mafia { "is" } else { "is not" };
        let mut outcome =
            CommandOutcome::new(format!("{} {verdict} mafia.", check.target), &state);
        outcome.check = Some(check);
        Ok(outcome)
    }

    /// Marks the mafia's target. The kill resolves when the night ends.
    pub async fn night_kill(
        &self,
        conversation_id: &str,
        target: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let game = self.registry.get(conversation_id).await?;
        let mut state = game.lock().await;
        phase::require_phase(&state, PhaseKind::Night, "kill")?;
        if state.faction_counts().mafia == 0 {
            return Err(EngineError::ActionUnavailable(
                "there is no living mafia".to_string(),
            ));
        }

        let index = state.resolve_alive_target(target)?;
        state.pending_kill = Some(index);
        let message = format!(
            "The mafia chose {}. Advance the phase to end the night.",
            state.players[index].name
        );
        Ok(CommandOutcome::new(message, &state))
    }

    pub async fn heal(
        &self,
        conversation_id: &str,
        target: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let game = self.registry.get(conversation_id).await?;
        let mut state = game.lock().await;
        phase::require_phase(&state, PhaseKind::Night, "heal")?;
        if state.game_mode() != GameVariant::Classic {
            return Err(EngineError::ActionUnavailable(
                "the doctor only plays in classic games".to_string(),
            ));
        }
        if !state.has_alive_role(ROLE_DOCTOR) {
            return Err(EngineError::ActionUnavailable(
                "there is no living doctor".to_string(),
            ));
        }

        let index = state.resolve_alive_target(target)?;
        state.pending_heal = Some(index);
        let message = format!("The doctor visits {}.", state.players[index].name);
        Ok(CommandOutcome::new(message, &state))
    }

    pub async fn advance_phase(
        &self,
        conversation_id: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let game = self.registry.get(conversation_id).await?;
        let mut state = game.lock().await;
        if matches!(state.machine, MachineState::Uninitialized) && !state.roles_assigned {
            return Err(EngineError::RolesNotAssigned);
        }

        let transition = phase::advance(&mut state, self.catalog.phases(), self.config.win_rule)?;
        self.sync_transition(&state, &transition);

        let mut lines = Vec::new();
        if let Some(report) = &transition.night {
            lines.push(report.narrative());
        }
        match &transition.result {
            Some(result) => lines.push(game_over_message(result)),
            None => lines.push(format!(
                "{} of round {} begins.",
                state.phase_label(),
                state.round
            )),
        }

        let mut outcome = CommandOutcome::new(lines.join(" "), &state);
        outcome.night = transition.night;
        outcome.result = transition.result;
        Ok(outcome)
    }

    /// One vote per living player per vote phase.
    pub async fn cast_vote(
        &self,
        conversation_id: &str,
        voter: &str,
        target: &str,
    ) -> Result<CommandOutcome, EngineError> {
        let game = self.registry.get(conversation_id).await?;
        let mut state = game.lock().await;
        let vote_phase = phase::require_phase(&state, PhaseKind::Vote, "vote")?;
        if state.vote_resolved {
            return Err(EngineError::ActionUnavailable(
                "the town has already decided this round".to_string(),
            ));
        }

        let voter = state.resolve_alive_target(voter)?;
        let target = state.resolve_alive_target(target)?;
        if voter == target {
            return Err(EngineError::ActionUnavailable(
                "players cannot vote for themselves".to_string(),
            ));
        }
        if state.votes.contains_key(&voter) {
            return Err(EngineError::ActionUnavailable(format!(
                "{} has already voted this round",
                state.players[voter].name
            )));
        }

        state.votes.insert(voter, target);
        self.sync.enqueue(SyncOp::RecordVote(VoteRecord {
            session_id: state.session_id.clone(),
            phase: vote_phase.name,
            round_number: state.round,
            voter: state.players[voter].id.clone(),
            target: state.players[target].id.clone(),
        }));

        let count = state.votes.values().filter(|voted| **voted == target).count();
        let message = format!(
            "{} votes for {} ({count} vote{}).",
            state.players[voter].name,
            state.players[target].name,
            if count == 1 { "" } else { "s" }
        );
        Ok(CommandOutcome::new(message, &state))
    }

    /// Eliminates the named player, or the unique vote leader when no target
    /// is given.
    pub async fn lynch(
        &self,
        conversation_id: &str,
        target: Option<&str>,
    ) -> Result<CommandOutcome, EngineError> {
        let game = self.registry.get(conversation_id).await?;
        let mut state = game.lock().await;
        phase::require_phase(&state, PhaseKind::Vote, "lynch")?;

        let index = match target {
            Some(target) => state.resolve_target(target)?,
            None => phase::majority_target(&state.votes).ok_or_else(|| {
                EngineError::ActionUnavailable(
                    "no single player has the most votes; name a target or advance".to_string(),
                )
            })?,
        };
        let result = phase::lynch(&mut state, index, self.config.win_rule)?;
        let transition = Transition {
            eliminated: vec![index],
            result,
            ..Transition::default()
        };
        self.sync_transition(&state, &transition);
        info!(
            session_id = %state.session_id,
            round = state.round,
            player = %state.players[index].name,
            "player lynched"
        );

        let mut message = format!("The town eliminated {}.", state.players[index].name);
        if let Some(result) = &transition.result {
            message.push(' ');
            message.push_str(&game_over_message(result));
        }
        let mut outcome = CommandOutcome::new(message, &state);
        outcome.result = transition.result;
        Ok(outcome)
    }

    /// Drops the live game. Unfinished sessions are recorded as cancelled.
    pub async fn reset(&self, conversation_id: &str) -> Result<CommandOutcome, EngineError> {
        let game = self
            .registry
            .remove(conversation_id)
            .await
            .ok_or_else(|| EngineError::SessionNotFound(conversation_id.to_string()))?;
        let state = game.lock().await;
        if !state.is_finished() {
            let mut record = state.session_record();
            record.status = SessionStatus::Cancelled;
            self.sync.enqueue(SyncOp::SaveSession(record));
        }
        info!(conversation_id, session_id = %state.session_id, "session reset");

        Ok(CommandOutcome {
            message: "The game was reset.".to_string(),
            state: None,
            check: None,
            deck: None,
            night: None,
            result: None,
        })
    }

    pub async fn snapshot(&self, conversation_id: &str) -> Result<LiveGameView, EngineError> {
        let game = self.registry.get(conversation_id).await?;
        let state = game.lock().await;
        Ok(LiveGameView::from(&*state))
    }

    /// Win tally over persisted results, after draining queued writes.
    pub async fn stats(&self) -> anyhow::Result<WinTally> {
        self.sync.flush(self.config.sync_timeout).await;
        self.store.win_tally().await
    }

    pub async fn flush_store_writes(&self, wait: Duration) -> bool {
        self.sync.flush(wait).await
    }

    fn sync_transition(&self, state: &LiveGameState, transition: &Transition) {
        self.sync.enqueue_all(
            transition
                .eliminated
                .iter()
                .map(|index| SyncOp::SavePlayer(state.player_record(*index))),
        );
        if let Some(result) = &transition.result {
            info!(
                session_id = %state.session_id,
                winner = ?result.winner_side,
                rounds = result.rounds_count,
                "game finished"
            );
            self.sync.enqueue(SyncOp::CreateResult(result.clone()));
        }
        self.sync.enqueue(SyncOp::SaveSession(state.session_record()));
    }
}

fn game_over_message(result: &GameResult) -> String {
    let side = match result.winner_side {
        WinnerSide::Mafia => "The mafia wins",
        WinnerSide::Town => "The town wins",
        WinnerSide::Maniac => "The maniac wins",
    };
    format!("Game over: {side} after {} rounds.", result.rounds_count)
}
