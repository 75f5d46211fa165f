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

//! Role pool construction for classic and sport tables.

use mafia_common::{
    Catalog, GameVariant, MIN_PLAYERS, Mode, ROLE_BEAUTY, ROLE_CIVILIAN, ROLE_COMMISSAR,
    ROLE_DOCTOR, ROLE_DON, ROLE_MAFIA, ROLE_MANIAC, Role, SPORT_PLAYER_COUNT,
};

use crate::error::EngineError;

pub const COMMISSAR_FROM: usize = 6;
pub const DOCTOR_FROM: usize = 8;
pub const DON_FROM: usize = 12;
pub const MANIAC_FROM: usize = 13;
pub const BEAUTY_FROM: usize = 14;

/// Roughly a quarter of the table, rounded half up, never fewer than two.
pub fn mafia_total(player_count: usize) -> usize {
    ((player_count + 2) / 4).max(2)
}

/// Classic pool: mafia (with a Don from 12 players), specials by headcount,
/// civilians for the rest. Falls back to cycling the whole catalog when the
/// catalog has neither mafia nor civilian roles.
pub fn build_role_pool(player_count: usize, catalog: &Catalog) -> Vec<Role> {
    let mafia = catalog.role_by_name(ROLE_MAFIA);
    let don = catalog.role_by_name(ROLE_DON);
    let civilian = catalog.role_by_name(ROLE_CIVILIAN);

    let mut pool: Vec<Role> = Vec::with_capacity(player_count);

    if mafia.is_some() || don.is_some() {
        let total = mafia_total(player_count);
        let don_slots = usize::from(don.is_some() && player_count >= DON_FROM);
        if let Some(mafia) = mafia {
            pool.extend(std::iter::repeat_n(mafia.clone(), total - don_slots));
        }
        if let Some(don) = don.filter(|_| don_slots == 1) {
            pool.push(don.clone());
        }
    }

    let specials = [
        (ROLE_COMMISSAR, COMMISSAR_FROM),
        (ROLE_DOCTOR, DOCTOR_FROM),
        (ROLE_MANIAC, MANIAC_FROM),
        (ROLE_BEAUTY, BEAUTY_FROM),
    ];
    for (name, from) in specials {
        if player_count >= from
            && let Some(role) = catalog.role_by_name(name)
        {
            pool.push(role.clone());
        }
    }

    if let Some(civilian) = civilian
        && pool.len() < player_count
    {
        let remaining = player_count - pool.len();
        pool.extend(std::iter::repeat_n(civilian.clone(), remaining));
    }

    if mafia.is_none() && don.is_none() && civilian.is_none() {
        return cycle_catalog(catalog, player_count);
    }

    pool.truncate(player_count);
    pool
}

/// Fixed 10-seat composition: 6 civilians, 1 commissar, 2 mafia, 1 don.
pub fn sport_role_pool(player_count: usize, catalog: &Catalog) -> Result<Vec<Role>, EngineError> {
    if player_count != SPORT_PLAYER_COUNT {
        return Err(EngineError::InvalidPlayerCount {
            actual: player_count,
            expected: format!("sport games need exactly {SPORT_PLAYER_COUNT}"),
        });
    }

    let lookup = |name: &str| {
        catalog
            .role_by_name(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownRole(name.to_string()))
    };
    let civilian = lookup(ROLE_CIVILIAN)?;
    let commissar = lookup(ROLE_COMMISSAR)?;
    let mafia = lookup(ROLE_MAFIA)?;
    let don = lookup(ROLE_DON)?;

    let mut pool = Vec::with_capacity(SPORT_PLAYER_COUNT);
    pool.extend(std::iter::repeat_n(civilian, 6));
    pool.push(commissar);
    pool.extend(std::iter::repeat_n(mafia, 2));
    pool.push(don);
    Ok(pool)
}

/// Validates the headcount for `mode` and returns the pool to deal from.
pub fn role_pool_for_mode(
    mode: &Mode,
    player_count: usize,
    catalog: &Catalog,
) -> Result<Vec<Role>, EngineError> {
    validate_player_count(mode, player_count)?;
    if catalog.roles().is_empty() {
        return Err(EngineError::EmptyRoleCatalog);
    }

    match mode.variant {
        GameVariant::Sport => sport_role_pool(player_count, catalog),
        GameVariant::Classic => Ok(build_role_pool(player_count, catalog)),
    }
}

pub fn validate_player_count(mode: &Mode, player_count: usize) -> Result<(), EngineError> {
    if mode.variant == GameVariant::Sport && player_count != SPORT_PLAYER_COUNT {
        return Err(EngineError::InvalidPlayerCount {
            actual: player_count,
            expected: format!("sport games need exactly {SPORT_PLAYER_COUNT}"),
        });
    }
    if player_count < MIN_PLAYERS {
        return Err(EngineError::InvalidPlayerCount {
            actual: player_count,
            expected: format!("at least {MIN_PLAYERS} are required"),
        });
    }
    if !mode.accepts(player_count) {
        let expected = if mode.is_strict() {
            format!("{} needs exactly {}", mode.name, mode.min_players)
        } else {
            format!(
                "{} allows {} to {}",
                mode.name, mode.min_players, mode.max_players
            )
        };
        return Err(EngineError::InvalidPlayerCount {
            actual: player_count,
            expected,
        });
    }
    Ok(())
}

/// Repeats the entire catalog in order until `len` roles are produced.
pub fn cycle_catalog(catalog: &Catalog, len: usize) -> Vec<Role> {
    catalog.roles().iter().cycle().take(len).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mafia_common::{CatalogFile, Faction, RoleEntry, default_catalog};

    fn count(pool: &[Role], name: &str) -> usize {
        pool.iter().filter(|role| role.name == name).count()
    }

    fn catalog_with(names: &[&str]) -> Catalog {
        Catalog::from_file(CatalogFile {
            roles: names
                .iter()
                .map(|name| RoleEntry {
                    name: name.to_string(),
                    is_unique: false,
                    turn_order: None,
                    faction: None,
                })
                .collect(),
            ..CatalogFile::default()
        })
        .unwrap()
    }

    #[test]
    fn mafia_total_rounds_half_up_with_floor_of_two() {
        assert_eq!(mafia_total(6), 2);
        assert_eq!(mafia_total(7), 2);
        assert_eq!(mafia_total(9), 2);
        assert_eq!(mafia_total(10), 3);
        assert_eq!(mafia_total(14), 4);
        assert_eq!(mafia_total(30), 8);
    }

    #[test]
    fn classic_pool_matches_headcount_rules_for_every_table_size() {
        let catalog = default_catalog();
        for n in 6..=30 {
            let pool = build_role_pool(n, &catalog);
            assert_eq!(pool.len(), n, "pool size for {n}");

            let mafia_faction = pool.iter().filter(|r| r.faction == Faction::Mafia).count();
            assert_eq!(mafia_faction, mafia_total(n), "mafia count for {n}");
            assert_eq!(count(&pool, ROLE_DON), usize::from(n >= 12), "don for {n}");
            assert_eq!(count(&pool, ROLE_COMMISSAR), 1, "commissar for {n}");
            assert_eq!(count(&pool, ROLE_DOCTOR), usize::from(n >= 8), "doctor for {n}");
            assert_eq!(count(&pool, ROLE_MANIAC), usize::from(n >= 13), "maniac for {n}");
            assert_eq!(count(&pool, ROLE_BEAUTY), usize::from(n >= 14), "beauty for {n}");
        }
    }

    #[test]
    fn classic_pool_for_twelve_players() {
        let pool = build_role_pool(12, &default_catalog());
        assert_eq!(count(&pool, ROLE_MAFIA), 2);
        assert_eq!(count(&pool, ROLE_DON), 1);
        assert_eq!(count(&pool, ROLE_COMMISSAR), 1);
        assert_eq!(count(&pool, ROLE_DOCTOR), 1);
        assert_eq!(count(&pool, ROLE_CIVILIAN), 7);
    }

    #[test]
    fn pool_is_truncated_when_specials_overflow() {
        let pool = build_role_pool(3, &default_catalog());
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn catalog_without_mafia_or_civilian_is_cycled() {
        let catalog = catalog_with(&["Doctor", "Commissar", "Maniac"]);
        let pool = build_role_pool(7, &catalog);
        let names: Vec<&str> = pool.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Doctor",
                "Commissar",
                "Maniac",
                "Doctor",
                "Commissar",
                "Maniac",
                "Doctor"
            ]
        );
    }

    #[test]
    fn empty_catalog_yields_empty_pool() {
        let catalog = Catalog::default();
        assert!(build_role_pool(8, &catalog).is_empty());
        let mode = default_catalog().default_mode().unwrap().clone();
        assert_eq!(
            role_pool_for_mode(&mode, 8, &catalog).unwrap_err(),
            EngineError::EmptyRoleCatalog
        );
    }

    #[test]
    fn sport_pool_has_fixed_composition() {
        let pool = sport_role_pool(10, &default_catalog()).unwrap();
        assert_eq!(pool.len(), 10);
        assert_eq!(count(&pool, ROLE_CIVILIAN), 6);
        assert_eq!(count(&pool, ROLE_COMMISSAR), 1);
        assert_eq!(count(&pool, ROLE_MAFIA), 2);
        assert_eq!(count(&pool, ROLE_DON), 1);
    }

    #[test]
    fn sport_pool_rejects_other_headcounts() {
        let catalog = default_catalog();
        for n in [9, 11] {
            assert!(matches!(
                sport_role_pool(n, &catalog),
                Err(EngineError::InvalidPlayerCount { actual, .. }) if actual == n
            ));
        }
    }

    #[test]
    fn sport_pool_reports_missing_role() {
        let catalog = catalog_with(&["Civilian", "Mafia", "Don"]);
        assert_eq!(
            sport_role_pool(10, &catalog).unwrap_err(),
            EngineError::UnknownRole(ROLE_COMMISSAR.to_string())
        );
    }

    #[test]
    fn classic_mode_enforces_global_minimum() {
        let catalog = default_catalog();
        let classic = catalog.default_mode().unwrap();
        assert!(matches!(
            role_pool_for_mode(classic, 5, &catalog),
            Err(EngineError::InvalidPlayerCount { actual: 5, .. })
        ));
        assert!(matches!(
            role_pool_for_mode(classic, 31, &catalog),
            Err(EngineError::InvalidPlayerCount { actual: 31, .. })
        ));
        assert_eq!(role_pool_for_mode(classic, 6, &catalog).unwrap().len(), 6);
    }
}
