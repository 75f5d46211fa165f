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

//! Engine error taxonomy shared by every host command.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid player count {actual}: {expected}")]
    InvalidPlayerCount { actual: usize, expected: String },

    #[error("roles are already assigned")]
    AlreadyAssigned,

    #[error("game is already finished")]
    AlreadyFinished,

    #[error("game is already started")]
    AlreadyStarted,

    #[error("no phases configured")]
    NoPhasesConfigured,

    #[error("role catalog is empty")]
    EmptyRoleCatalog,

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("player not found: {0}")]
    PlayerNotFound(String),

    #[error("player is not alive: {0}")]
    TargetNotAlive(String),

    #[error("player already seated: {0}")]
    DuplicatePlayer(String),

    #[error("no live session for conversation {0}")]
    SessionNotFound(String),

    #[error("{action} is not allowed during {phase}")]
    WrongPhase {
        action: &'static str,
        phase: String,
    },

    #[error("action unavailable: {0}")]
    ActionUnavailable(String),

    #[error("roles are not assigned yet")]
    RolesNotAssigned,

    #[error("persistence sync failed for {operation}: {message}")]
    PersistenceSyncFailed {
        operation: &'static str,
        message: String,
    },
}

impl EngineError {
    /// Stable machine-readable code for the command surface.
    pub fn reason_code(&self) -> &'static str {
        match self {
            EngineError::InvalidPlayerCount { .. } => "INVALID_PLAYER_COUNT",
            EngineError::AlreadyAssigned => "ALREADY_ASSIGNED",
            EngineError::AlreadyFinished => "ALREADY_FINISHED",
            EngineError::AlreadyStarted => "ALREADY_STARTED",
            EngineError::NoPhasesConfigured => "NO_PHASES_CONFIGURED",
            EngineError::EmptyRoleCatalog => "EMPTY_ROLE_CATALOG",
            EngineError::UnknownRole(_) => "UNKNOWN_ROLE",
            EngineError::UnknownMode(_) => "UNKNOWN_MODE",
            EngineError::PlayerNotFound(_) => "PLAYER_NOT_FOUND",
            EngineError::TargetNotAlive(_) => "TARGET_NOT_ALIVE",
            EngineError::DuplicatePlayer(_) => "DUPLICATE_PLAYER",
            EngineError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            EngineError::WrongPhase { .. } => "WRONG_PHASE",
            EngineError::ActionUnavailable(_) => "ACTION_UNAVAILABLE",
            EngineError::RolesNotAssigned => "ROLES_NOT_ASSIGNED",
            EngineError::PersistenceSyncFailed { .. } => "PERSISTENCE_SYNC_FAILED",
        }
    }

    /// Idempotency guards are reported as no-op notices rather than failures.
    pub fn is_notice(&self) -> bool {
        matches!(
            self,
            EngineError::AlreadyAssigned | EngineError::AlreadyFinished | EngineError::AlreadyStarted
        )
    }

    /// Configuration problems the host cannot fix from the table.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::NoPhasesConfigured
                | EngineError::EmptyRoleCatalog
                | EngineError::UnknownRole(_)
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            EngineError::InvalidPlayerCount { actual, expected } => {
                format!("This game cannot run with {actual} players ({expected}).")
            }
            EngineError::AlreadyAssigned => "Roles have already been dealt.".to_string(),
            EngineError::AlreadyFinished => "The game is already over.".to_string(),
            EngineError::AlreadyStarted => "The game is already running.".to_string(),
            EngineError::NoPhasesConfigured => {
                "No game phases are configured; ask the operator to fix the catalog.".to_string()
            }
            EngineError::EmptyRoleCatalog => {
                "No roles are configured; ask the operator to fix the catalog.".to_string()
            }
            EngineError::UnknownRole(name) => {
                format!("Role \"{name}\" is missing from the catalog.")
            }
            EngineError::UnknownMode(name) => format!("Unknown game mode \"{name}\"."),
            EngineError::PlayerNotFound(target) => format!("No player matches \"{target}\"."),
            EngineError::TargetNotAlive(name) => format!("{name} is already out of the game."),
            EngineError::DuplicatePlayer(name) => format!("{name} is already at the table."),
            EngineError::SessionNotFound(_) => {
                "There is no game here yet. Create a session first.".to_string()
            }
            EngineError::WrongPhase { action, phase } => {
                format!("You cannot {action} during {phase}.")
            }
            EngineError::ActionUnavailable(reason) => format!("Not available: {reason}."),
            EngineError::RolesNotAssigned => "Deal the roles first.".to_string(),
            EngineError::PersistenceSyncFailed { .. } => {
                "The game record could not be saved right now.".to_string()
            }
        }
    }
}
