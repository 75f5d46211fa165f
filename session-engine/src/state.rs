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

//! Transient per-conversation game state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mafia_common::{
    ConversationId, GameResult, GameVariant, Mode, Phase, PlayerId, PlayerRecord, PlayerStatus,
    Role, RolesMode, SessionId, SessionRecord, SessionStatus, WinnerSide,
};
use uuid::Uuid;

use crate::{error::EngineError, win::FactionCounts};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineState {
    Uninitialized,
    Running(Phase),
    Finished(WinnerSide),
}

#[derive(Debug, Clone)]
pub struct LivePlayer {
    pub id: PlayerId,
    pub name: String,
    /// 1-based seat at the table.
    pub seat: usize,
    pub role: Option<Role>,
    pub alive: bool,
    pub fail_phase: Option<String>,
    pub fail_round: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct LiveGameState {
    pub conversation_id: ConversationId,
    pub session_id: SessionId,
    pub mode: Mode,
    pub host: String,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub planned_count: usize,
    pub players: Vec<LivePlayer>,
    pub roles_assigned: bool,
    pub roles_mode: RolesMode,
    pub machine: MachineState,
    pub round: u32,
    pub pending_kill: Option<usize>,
    pub pending_heal: Option<usize>,
    pub pending_check: Option<usize>,
    pub last_night_killed: Option<String>,
    /// voter index -> target index for the current vote phase.
    pub votes: BTreeMap<usize, usize>,
    pub vote_resolved: bool,
    pub result: Option<GameResult>,
}

impl LiveGameState {
    pub fn new(
        conversation_id: impl Into<ConversationId>,
        mode: Mode,
        host: impl Into<String>,
        planned_count: usize,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            session_id: Uuid::new_v4().to_string(),
            mode,
            host: host.into(),
            created_at: Utc::now(),
            finished_at: None,
            planned_count,
            players: Vec::new(),
            roles_assigned: false,
            roles_mode: RolesMode::None,
            machine: MachineState::Uninitialized,
            round: 0,
            pending_kill: None,
            pending_heal: None,
            pending_check: None,
            last_night_killed: None,
            votes: BTreeMap::new(),
            vote_resolved: false,
            result: None,
        }
    }

    pub fn game_mode(&self) -> GameVariant {
        self.mode.variant
    }

    pub fn status(&self) -> SessionStatus {
        match self.machine {
            MachineState::Uninitialized => SessionStatus::Planned,
            MachineState::Running(_) => SessionStatus::Active,
            MachineState::Finished(_) => SessionStatus::Finished,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.machine, MachineState::Finished(_))
    }

    pub fn current_phase(&self) -> Option<&Phase> {
        match &self.machine {
            MachineState::Running(phase) => Some(phase),
            _ => None,
        }
    }

    /// Human label for the current machine position.
    pub fn phase_label(&self) -> String {
        match &self.machine {
            MachineState::Uninitialized => "setup".to_string(),
            MachineState::Running(phase) => phase.name.clone(),
            MachineState::Finished(_) => "the end of the game".to_string(),
        }
    }

    pub fn add_player(&mut self, name: &str) -> Result<usize, EngineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::ActionUnavailable(
                "player name must not be empty".to_string(),
            ));
        }
        if self
            .players
            .iter()
            .any(|player| player.name.eq_ignore_ascii_case(name))
        {
            return Err(EngineError::DuplicatePlayer(name.to_string()));
        }

        self.players.push(LivePlayer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            seat: self.players.len() + 1,
            role: None,
            alive: true,
            fail_phase: None,
            fail_round: None,
        });
        Ok(self.players.len() - 1)
    }

    /// Resolves a target given as a player name (case-insensitive) or a
    /// 1-based seat number.
    pub fn resolve_target(&self, target: &str) -> Result<usize, EngineError> {
        let target = target.trim();
        if let Some(index) = self
            .players
            .iter()
            .position(|player| player.name.eq_ignore_ascii_case(target))
        {
            return Ok(index);
        }

        target
            .parse::<usize>()
            .ok()
            .and_then(|seat| self.players.iter().position(|player| player.seat == seat))
            .ok_or_else(|| EngineError::PlayerNotFound(target.to_string()))
    }

    pub fn resolve_alive_target(&self, target: &str) -> Result<usize, EngineError> {
        let index = self.resolve_target(target)?;
        if !self.players[index].alive {
            return Err(EngineError::TargetNotAlive(self.players[index].name.clone()));
        }
        Ok(index)
    }

    pub fn alive_roles(&self) -> impl Iterator<Item = Option<&Role>> {
        self.players
            .iter()
            .filter(|player| player.alive)
            .map(|player| player.role.as_ref())
    }

    pub fn faction_counts(&self) -> FactionCounts {
        FactionCounts::tally(self.alive_roles())
    }

    pub fn has_alive_role(&self, role_name: &str) -> bool {
        self.players.iter().any(|player| {
            player.alive
                && player
                    .role
                    .as_ref()
                    .is_some_and(|role| role.name.eq_ignore_ascii_case(role_name))
        })
    }

    pub fn eliminate(&mut self, index: usize, phase_name: &str) {
        let round = self.round;
        let player = &mut self.players[index];
        player.alive = false;
        player.fail_phase = Some(phase_name.to_string());
        player.fail_round = Some(round);
    }

    pub fn session_record(&self) -> SessionRecord {
        SessionRecord {
            id: self.session_id.clone(),
            mode: self.mode.name.clone(),
            host: self.host.clone(),
            status: self.status(),
            planned_player_count: self.planned_count,
            current_round: self.round,
            current_phase: self.current_phase().map(|phase| phase.name.clone()),
            created_at: self.created_at,
            finished_at: self.finished_at,
        }
    }

    pub fn player_record(&self, index: usize) -> PlayerRecord {
        let player = &self.players[index];
        PlayerRecord {
            id: player.id.clone(),
            session_id: self.session_id.clone(),
            name: player.name.clone(),
            role: player.role.as_ref().map(|role| role.name.clone()),
            status: if player.alive {
                PlayerStatus::Alive
            } else {
                PlayerStatus::Dead
            },
            seat_number: player.seat,
            fail_phase: player.fail_phase.clone(),
            fail_round: player.fail_round,
        }
    }
}
