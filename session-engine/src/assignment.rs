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

//! Binding shuffled roles to seated players.

use mafia_common::{Catalog, Mode, Role, RolesMode};
use rand::{Rng, seq::SliceRandom};

use crate::{
    error::EngineError,
    role_pool::{cycle_catalog, role_pool_for_mode},
};

#[derive(Debug, Clone)]
pub struct AssignmentPlan {
    /// Role for each player, indexed by seat order.
    pub roles: Vec<Role>,
    /// Card layout handed to the host when dealing physical cards.
    pub deck: Option<Vec<String>>,
    /// Number of roles borrowed from the catalog to cover a short pool.
    pub padded: usize,
}

pub fn plan_assignment<R: Rng + ?Sized>(
    mode: &Mode,
    player_count: usize,
    catalog: &Catalog,
    roles_mode: RolesMode,
    rng: &mut R,
) -> Result<AssignmentPlan, EngineError> {
    if roles_mode == RolesMode::None {
        return Err(EngineError::ActionUnavailable(
            "choose random or cards to deal roles".to_string(),
        ));
    }

    let mut pool = role_pool_for_mode(mode, player_count, catalog)?;
    if pool.is_empty() {
        return Err(EngineError::EmptyRoleCatalog);
    }

    let padded = player_count.saturating_sub(pool.len());
    if padded > 0 {
        pool.extend(cycle_catalog(catalog, padded));
    }

    let plan = match roles_mode {
        RolesMode::Cards => {
            pool.shuffle(rng);
            pool.truncate(player_count);
            AssignmentPlan {
                deck: Some(pool.iter().map(|role| role.name.clone()).collect()),
                roles: pool,
                padded,
            }
        }
        _ => AssignmentPlan {
            roles: shuffle_and_bind(player_count, pool, rng),
            deck: None,
            padded,
        },
    };
    Ok(plan)
}

/// Shuffles seats and roles independently, then zips them pairwise.
pub fn shuffle_and_bind<R: Rng + ?Sized>(
    player_count: usize,
    mut pool: Vec<Role>,
    rng: &mut R,
) -> Vec<Role> {
    let mut seats: Vec<usize> = (0..player_count).collect();
    seats.shuffle(rng);
    pool.shuffle(rng);

    let mut bound: Vec<Option<Role>> = vec![None; player_count];
    for (seat, role) in seats.into_iter().zip(pool) {
        bound[seat] = Some(role);
    }
    bound.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mafia_common::{ROLE_CIVILIAN, ROLE_COMMISSAR, ROLE_DON, ROLE_MAFIA, default_catalog};
    use rand::{SeedableRng, rngs::StdRng};
    use std::collections::HashMap;

    fn histogram(roles: &[Role]) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for role in roles {
            *counts.entry(role.name.clone()).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn sport_assignment_always_yields_fixed_ratio() {
        let catalog = default_catalog();
        let sport = catalog.mode_by_name("sport").unwrap().clone();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let plan = plan_assignment(&sport, 10, &catalog, RolesMode::Random, &mut rng).unwrap();
            let counts = histogram(&plan.roles);
            assert_eq!(plan.roles.len(), 10);
            assert_eq!(counts[ROLE_CIVILIAN], 6);
            assert_eq!(counts[ROLE_COMMISSAR], 1);
            assert_eq!(counts[ROLE_MAFIA], 2);
            assert_eq!(counts[ROLE_DON], 1);
        }
    }

    #[test]
    fn sport_assignment_rejects_nine_and_eleven() {
        let catalog = default_catalog();
        let sport = catalog.mode_by_name("sport").unwrap().clone();
        let mut rng = StdRng::seed_from_u64(7);
        for n in [9, 11] {
            let error = plan_assignment(&sport, n, &catalog, RolesMode::Random, &mut rng).unwrap_err();
            assert!(matches!(error, EngineError::InvalidPlayerCount { .. }));
        }
    }

    #[test]
    fn same_seed_gives_same_binding() {
        let catalog = default_catalog();
        let classic = catalog.default_mode().unwrap().clone();
        let first = plan_assignment(
            &classic,
            14,
            &catalog,
            RolesMode::Random,
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        let second = plan_assignment(
            &classic,
            14,
            &catalog,
            RolesMode::Random,
            &mut StdRng::seed_from_u64(42),
        )
        .unwrap();
        assert_eq!(first.roles, second.roles);
        assert_eq!(first.padded, 0);
    }

    #[test]
    fn binding_preserves_the_pool_multiset() {
        let catalog = default_catalog();
        let pool = crate::role_pool::build_role_pool(16, &catalog);
        let bound = shuffle_and_bind(16, pool.clone(), &mut StdRng::seed_from_u64(3));
        assert_eq!(histogram(&bound), histogram(&pool));
    }

    #[test]
    fn cards_mode_returns_deck_matching_seat_roles() {
        let catalog = default_catalog();
        let classic = catalog.default_mode().unwrap().clone();
        let plan = plan_assignment(
            &classic,
            8,
            &catalog,
            RolesMode::Cards,
            &mut StdRng::seed_from_u64(11),
        )
        .unwrap();
        let deck = plan.deck.unwrap();
        let seat_roles: Vec<String> = plan.roles.iter().map(|r| r.name.clone()).collect();
        assert_eq!(deck, seat_roles);
    }

    #[test]
    fn roles_mode_none_is_rejected() {
        let catalog = default_catalog();
        let classic = catalog.default_mode().unwrap().clone();
        let error = plan_assignment(
            &classic,
            8,
            &catalog,
            RolesMode::None,
            &mut StdRng::seed_from_u64(1),
        )
        .unwrap_err();
        assert!(matches!(error, EngineError::ActionUnavailable(_)));
    }
}
