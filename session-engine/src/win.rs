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

//! Win evaluation over the roles of living players.

use mafia_common::{Faction, Role, WinnerSide};
use serde::{Deserialize, Serialize};

/// Which rulebook decides the winner. Never chosen implicitly.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WinRule {
    /// Town, Mafia and Maniac each win only as the sole surviving faction.
    #[default]
    ThreeFaction,
    /// As above, plus Mafia wins outright once it matches Town in numbers.
    MafiaParity,
}

impl WinRule {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "three_faction" | "three-faction" | "strict" => Some(WinRule::ThreeFaction),
            "mafia_parity" | "mafia-parity" | "parity" => Some(WinRule::MafiaParity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FactionCounts {
    pub mafia: usize,
    pub town: usize,
    pub maniac: usize,
}

impl FactionCounts {
    /// Players without a role fall into the Town bucket.
    pub fn tally<'a>(roles: impl IntoIterator<Item = Option<&'a Role>>) -> Self {
        let mut counts = Self::default();
        for role in roles {
            match role.map(|role| role.faction).unwrap_or(Faction::Town) {
                Faction::Mafia => counts.mafia += 1,
                Faction::Town => counts.town += 1,
                Faction::ThirdParty => counts.maniac += 1,
            }
        }
        counts
    }
}

pub fn evaluate(counts: FactionCounts, rule: WinRule) -> Option<WinnerSide> {
    let FactionCounts {
        mafia,
        town,
        maniac,
    } = counts;

    if maniac > 0 && mafia == 0 && town == 0 {
        return Some(WinnerSide::Maniac);
    }
    if mafia == 0 && maniac == 0 && town > 0 {
        return Some(WinnerSide::Town);
    }
    if mafia > 0 && town == 0 && maniac == 0 {
        return Some(WinnerSide::Mafia);
    }

    match rule {
        WinRule::MafiaParity if mafia > 0 && maniac == 0 && mafia >= town => {
            Some(WinnerSide::Mafia)
        }
        _ => None,
    }
}

pub fn evaluate_roles<'a>(
    alive_roles: impl IntoIterator<Item = Option<&'a Role>>,
    rule: WinRule,
) -> Option<WinnerSide> {
    evaluate(FactionCounts::tally(alive_roles), rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(name: &str, faction: Faction) -> Role {
        Role {
            id: 0,
            name: name.to_string(),
            is_unique: false,
            turn_order: None,
            faction,
        }
    }

    fn counts(mafia: usize, town: usize, maniac: usize) -> FactionCounts {
        FactionCounts {
            mafia,
            town,
            maniac,
        }
    }

    #[test]
    fn three_faction_table() {
        let rule = WinRule::ThreeFaction;
        assert_eq!(evaluate(counts(2, 0, 0), rule), Some(WinnerSide::Mafia));
        assert_eq!(evaluate(counts(0, 3, 0), rule), Some(WinnerSide::Town));
        assert_eq!(evaluate(counts(0, 0, 1), rule), Some(WinnerSide::Maniac));
        assert_eq!(evaluate(counts(1, 1, 0), rule), None);
        assert_eq!(evaluate(counts(0, 2, 1), rule), None);
        assert_eq!(evaluate(counts(1, 0, 1), rule), None);
        assert_eq!(evaluate(counts(0, 0, 0), rule), None);
    }

    #[test]
    fn parity_rule_ends_game_when_mafia_matches_town() {
        let rule = WinRule::MafiaParity;
        assert_eq!(evaluate(counts(1, 1, 0), rule), Some(WinnerSide::Mafia));
        assert_eq!(evaluate(counts(2, 1, 0), rule), Some(WinnerSide::Mafia));
        assert_eq!(evaluate(counts(1, 2, 0), rule), None);
        assert_eq!(evaluate(counts(1, 1, 1), rule), None);
        assert_eq!(evaluate(counts(0, 3, 0), rule), Some(WinnerSide::Town));
    }

    #[test]
    fn tally_uses_explicit_faction_and_town_default() {
        let don = role("Don", Faction::Mafia);
        let maniac = role("Maniac", Faction::ThirdParty);
        let doctor = role("Doctor", Faction::Town);
        let tally = FactionCounts::tally([Some(&don), Some(&maniac), Some(&doctor), None]);
        assert_eq!(tally, counts(1, 2, 1));
    }

    #[test]
    fn faction_is_read_from_the_attribute_not_the_name() {
        let renamed = role("Godfather", Faction::Mafia);
        let misleading = role("Mafia hunter", Faction::Town);
        assert_eq!(
            evaluate_roles([Some(&renamed)], WinRule::ThreeFaction),
            Some(WinnerSide::Mafia)
        );
        assert_eq!(
            evaluate_roles([Some(&misleading)], WinRule::ThreeFaction),
            Some(WinnerSide::Town)
        );
    }

    #[test]
    fn evaluation_is_repeatable() {
        let mafia = role("Mafia", Faction::Mafia);
        let civilian = role("Civilian", Faction::Town);
        let alive = vec![Some(&mafia), Some(&civilian), Some(&civilian)];
        let first = evaluate_roles(alive.clone(), WinRule::ThreeFaction);
        let second = evaluate_roles(alive, WinRule::ThreeFaction);
        assert_eq!(first, second);
        assert_eq!(first, None);
    }

    #[test]
    fn parse_accepts_config_spellings() {
        assert_eq!(WinRule::parse("mafia_parity"), Some(WinRule::MafiaParity));
        assert_eq!(WinRule::parse(" Three-Faction "), Some(WinRule::ThreeFaction));
        assert_eq!(WinRule::parse("whatever"), None);
    }
}
