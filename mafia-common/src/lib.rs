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

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const MIN_PLAYERS: usize = 6;
pub const MAX_PLAYERS: usize = 30;
pub const SPORT_PLAYER_COUNT: usize = 10;
pub const DEFAULT_STORE_SYNC_TIMEOUT_MS: u64 = 2000;

pub const ROLE_CIVILIAN: &str = "Civilian";
pub const ROLE_MAFIA: &str = "Mafia";
pub const ROLE_DON: &str = "Don";
pub const ROLE_COMMISSAR: &str = "Commissar";
pub const ROLE_DOCTOR: &str = "Doctor";
pub const ROLE_MANIAC: &str = "Maniac";
pub const ROLE_BEAUTY: &str = "Beauty";

pub type SessionId = String;
pub type PlayerId = String;
pub type ConversationId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Mafia,
    Town,
    ThirdParty,
}

impl Faction {
    /// Classification for catalog entries that do not declare a faction.
    pub fn infer_from_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("maniac") {
            Faction::ThirdParty
        } else if name.contains("mafia") || name.contains("don") {
            Faction::Mafia
        } else {
            Faction::Town
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    Classic,
    Sport,
}

impl GameVariant {
    pub fn infer_from_name(name: &str) -> Self {
        if name.to_lowercase().contains("sport") {
            GameVariant::Sport
        } else {
            GameVariant::Classic
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Planned,
    Active,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Alive,
    Dead,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Night,
    Day,
    Vote,
    Other,
}

impl PhaseKind {
    pub fn infer_from_name(name: &str) -> Self {
        let name = name.to_lowercase();
        if name.contains("night") {
            PhaseKind::Night
        } else if name.contains("vote") || name.contains("voting") {
            PhaseKind::Vote
        } else if name.contains("day") {
            PhaseKind::Day
        } else {
            PhaseKind::Other
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WinnerSide {
    Mafia,
    Town,
    Maniac,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RolesMode {
    Random,
    Cards,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: u32,
    pub name: String,
    pub is_unique: bool,
    pub turn_order: Option<i32>,
    pub faction: Faction,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mode {
    pub id: u32,
    pub name: String,
    pub min_players: usize,
    pub max_players: usize,
    pub variant: GameVariant,
}

impl Mode {
    /// A strict mode forces an exact headcount.
    pub fn is_strict(&self) -> bool {
        self.min_players == self.max_players
    }

    pub fn accepts(&self, player_count: usize) -> bool {
        (self.min_players..=self.max_players).contains(&player_count)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phase {
    pub name: String,
    pub order: i32,
    pub kind: PhaseKind,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub mode: String,
    pub host: String,
    pub status: SessionStatus,
    pub planned_player_count: usize,
    pub current_round: u32,
    pub current_phase: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub session_id: SessionId,
    pub name: String,
    pub role: Option<String>,
    pub status: PlayerStatus,
    pub seat_number: usize,
    pub fail_phase: Option<String>,
    pub fail_round: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameResult {
    pub session_id: SessionId,
    pub winner_side: WinnerSide,
    pub rounds_count: u32,
    pub mafia_count: usize,
    pub town_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRecord {
    pub session_id: SessionId,
    pub phase: String,
    pub round_number: u32,
    pub voter: PlayerId,
    pub target: PlayerId,
}

/// Aggregate win counts over all persisted results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WinTally {
    pub sessions_count: usize,
    pub mafia_wins: usize,
    pub town_wins: usize,
    pub maniac_wins: usize,
}

impl WinTally {
    pub fn record(&mut self, side: WinnerSide) {
        match side {
            WinnerSide::Mafia => self.mafia_wins += 1,
            WinnerSide::Town => self.town_wins += 1,
            WinnerSide::Maniac => self.maniac_wins += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub roles: Vec<RoleEntry>,
    #[serde(default)]
    pub modes: Vec<ModeEntry>,
    #[serde(default)]
    pub phases: Vec<PhaseEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleEntry {
    pub name: String,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub turn_order: Option<i32>,
    #[serde(default)]
    pub faction: Option<Faction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeEntry {
    pub name: String,
    pub min_players: usize,
    pub max_players: usize,
    #[serde(default)]
    pub variant: Option<GameVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhaseEntry {
    pub name: String,
    pub order: i32,
    #[serde(default)]
    pub kind: Option<PhaseKind>,
}

/// Read-only reference data: roles, modes and the phase cycle.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    roles: Vec<Role>,
    modes: Vec<Mode>,
    phases: Vec<Phase>,
}

impl Catalog {
    pub fn from_file(file: CatalogFile) -> Result<Self, String> {
        let roles = file
            .roles
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Role {
                id: index as u32 + 1,
                faction: entry
                    .faction
                    .unwrap_or_else(|| Faction::infer_from_name(&entry.name)),
                name: entry.name,
                is_unique: entry.is_unique,
                turn_order: entry.turn_order,
            })
            .collect();

        let mut modes = Vec::with_capacity(file.modes.len());
        for (index, entry) in file.modes.into_iter().enumerate() {
            if entry.min_players > entry.max_players {
                return Err(format!(
                    "mode {} has min_players {} above max_players {}",
                    entry.name, entry.min_players, entry.max_players
                ));
            }
            modes.push(Mode {
                id: index as u32 + 1,
                variant: entry
                    .variant
                    .unwrap_or_else(|| GameVariant::infer_from_name(&entry.name)),
                name: entry.name,
                min_players: entry.min_players,
                max_players: entry.max_players,
            });
        }

        let mut phases: Vec<Phase> = file
            .phases
            .into_iter()
            .map(|entry| Phase {
                kind: entry
                    .kind
                    .unwrap_or_else(|| PhaseKind::infer_from_name(&entry.name)),
                name: entry.name,
                order: entry.order,
            })
            .collect();
        phases.sort_by_key(|phase| phase.order);

        Ok(Self {
            roles,
            modes,
            phases,
        })
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, String> {
        let file = serde_yaml::from_str::<CatalogFile>(raw)
            .map_err(|error| format!("invalid catalog yaml: {error}"))?;
        Self::from_file(file)
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn modes(&self) -> &[Mode] {
        &self.modes
    }

    /// Phases ordered by sequence.
    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn role_by_name(&self, name: &str) -> Option<&Role> {
        self.roles
            .iter()
            .find(|role| role.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn mode_by_id(&self, id: u32) -> Option<&Mode> {
        self.modes.iter().find(|mode| mode.id == id)
    }

    pub fn mode_by_name(&self, name: &str) -> Option<&Mode> {
        self.modes
            .iter()
            .find(|mode| mode.name.eq_ignore_ascii_case(name.trim()))
    }

    pub fn default_mode(&self) -> Option<&Mode> {
        self.modes
            .iter()
            .find(|mode| mode.variant == GameVariant::Classic)
            .or_else(|| self.modes.first())
    }
}

pub fn default_catalog() -> Catalog {
    let role = |name: &str, is_unique: bool, turn_order: Option<i32>, faction: Faction| RoleEntry {
        name: name.to_string(),
        is_unique,
        turn_order,
        faction: Some(faction),
    };
    let file = CatalogFile {
        roles: vec![
            role(ROLE_CIVILIAN, false, None, Faction::Town),
            role(ROLE_MAFIA, false, Some(1), Faction::Mafia),
            role(ROLE_DON, true, Some(2), Faction::Mafia),
            role(ROLE_COMMISSAR, true, Some(3), Faction::Town),
            role(ROLE_DOCTOR, true, Some(4), Faction::Town),
            role(ROLE_MANIAC, true, Some(5), Faction::ThirdParty),
            role(ROLE_BEAUTY, true, Some(6), Faction::Town),
        ],
        modes: vec![
            ModeEntry {
                name: "Classic".to_string(),
                min_players: MIN_PLAYERS,
                max_players: MAX_PLAYERS,
                variant: Some(GameVariant::Classic),
            },
            ModeEntry {
                name: "Sport".to_string(),
                min_players: SPORT_PLAYER_COUNT,
                max_players: SPORT_PLAYER_COUNT,
                variant: Some(GameVariant::Sport),
            },
        ],
        phases: vec![
            PhaseEntry {
                name: "Night".to_string(),
                order: 1,
                kind: Some(PhaseKind::Night),
            },
            PhaseEntry {
                name: "Day".to_string(),
                order: 2,
                kind: Some(PhaseKind::Day),
            },
            PhaseEntry {
                name: "Vote".to_string(),
                order: 3,
                kind: Some(PhaseKind::Vote),
            },
        ],
    };

    // The built-in entries always satisfy min_players <= max_players.
    Catalog::from_file(file).unwrap_or_default()
}

/// Replace `${VAR_NAME}` patterns in a string with values from environment variables.
/// Unknown or unset variables are replaced with an empty string.
pub fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}
