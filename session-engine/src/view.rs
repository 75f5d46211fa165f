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

use mafia_common::{
    ConversationId, Faction, GameVariant, PhaseKind, ROLE_COMMISSAR, ROLE_DOCTOR, RolesMode,
    SessionId, SessionStatus, WinnerSide,
};
use serde::Serialize;

use crate::state::{LiveGameState, MachineState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostAction {
    AddPlayer,
    AssignRoles,
    Start,
    Inspect,
    NightKill,
    Heal,
    AdvancePhase,
    CastVote,
    Lynch,
    Reset,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub seat: usize,
    pub name: String,
    pub role: Option<String>,
    pub faction: Option<Faction>,
    pub alive: bool,
}

/// Host-facing snapshot of a live game.
#[derive(Debug, Clone, Serialize)]
pub struct LiveGameView {
    pub conversation_id: ConversationId,
    pub session_id: SessionId,
    pub mode: String,
    pub game_mode: GameVariant,
    pub status: SessionStatus,
    pub phase: Option<String>,
    pub round: u32,
    pub planned_count: usize,
    pub roles_assigned: bool,
    pub roles_mode: RolesMode,
    pub players: Vec<PlayerView>,
    pub last_night_killed: Option<String>,
    pub winner: Option<WinnerSide>,
    pub available_actions: Vec<HostAction>,
}

impl From<&LiveGameState> for LiveGameView {
    fn from(state: &LiveGameState) -> Self {
        Self {
            conversation_id: state.conversation_id.clone(),
            session_id: state.session_id.clone(),
            mode: state.mode.name.clone(),
            game_mode: state.game_mode(),
            status: state.status(),
            phase: state.current_phase().map(|phase| phase.name.clone()),
            round: state.round,
            planned_count: state.planned_count,
            roles_assigned: state.roles_assigned,
            roles_mode: state.roles_mode,
            players: state
                .players
                .iter()
                .map(|player| PlayerView {
                    seat: player.seat,
                    name: player.name.clone(),
                    role: player.role.as_ref().map(|role| role.name.clone()),
                    faction: player.role.as_ref().map(|role| role.faction),
                    alive: player.alive,
                })
                .collect(),
            last_night_killed: state.last_night_killed.clone(),
            winner: match state.machine {
                MachineState::Finished(winner) => Some(winner),
                _ => None,
            },
            available_actions: available_actions(state),
        }
    }
}

pub fn available_actions(state: &LiveGameState) -> Vec<HostAction> {
    let mut actions = Vec::new();
    match &state.machine {
        MachineState::Uninitialized => {
            if !state.roles_assigned && state.players.len() < state.planned_count {
                actions.push(HostAction::AddPlayer);
            }
            if !state.roles_assigned && state.players.len() == state.planned_count {
                actions.push(HostAction::AssignRoles);
            }
            if state.roles_assigned {
                actions.push(HostAction::Start);
            }
        }
        MachineState::Running(phase) => {
            match phase.kind {
                PhaseKind::Night => {
                    if state.has_alive_role(ROLE_COMMISSAR) && state.pending_check.is_none() {
                        actions.push(HostAction::Inspect);
                    }
                    if state.faction_counts().mafia > 0 {
                        actions.push(HostAction::NightKill);
                    }
                    if state.game_mode() == GameVariant::Classic
                        && state.has_alive_role(ROLE_DOCTOR)
                    {
                        actions.push(HostAction::Heal);
                    }
                }
                PhaseKind::Vote if !state.vote_resolved => {
                    actions.push(HostAction::CastVote);
                    actions.push(HostAction::Lynch);
                }
                _ => {}
            }
            actions.push(HostAction::AdvancePhase);
        }
        MachineState::Finished(_) => {}
    }
    actions.push(HostAction::Reset);
    actions
}
