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

//! Durable record seam. The live registry is authoritative; stores only
//! receive copies of state the engine has already committed in memory.

use std::collections::HashMap;

use anyhow::bail;
use async_trait::async_trait;
use mafia_common::{
    GameResult, PlayerRecord, PlayerStatus, SessionId, SessionRecord, VoteRecord, WinTally,
};
use tokio::sync::RwLock;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save_session(&self, session: &SessionRecord) -> anyhow::Result<()>;
    async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>>;

    /// Upsert keyed by player id.
    async fn save_player(&self, player: &PlayerRecord) -> anyhow::Result<()>;
    async fn list_players(&self, session_id: &str) -> anyhow::Result<Vec<PlayerRecord>>;

    async fn alive_players(&self, session_id: &str) -> anyhow::Result<Vec<PlayerRecord>> {
        Ok(self
            .list_players(session_id)
            .await?
            .into_iter()
            .filter(|player| player.status == PlayerStatus::Alive)
            .collect())
    }

    /// Results are written once per session.
    async fn create_result(&self, result: &GameResult) -> anyhow::Result<()>;
    async fn get_result(&self, session_id: &str) -> anyhow::Result<Option<GameResult>>;

    async fn record_vote(&self, vote: &VoteRecord) -> anyhow::Result<()>;
    async fn list_votes(&self, session_id: &str) -> anyhow::Result<Vec<VoteRecord>>;

    async fn win_tally(&self) -> anyhow::Result<WinTally>;
}

#[derive(Default)]
struct Tables {
    sessions: HashMap<SessionId, SessionRecord>,
    players: HashMap<SessionId, Vec<PlayerRecord>>,
    results: HashMap<SessionId, GameResult>,
    votes: HashMap<SessionId, Vec<VoteRecord>>,
}

/// Process-local store used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemorySessionStore {
    tables: RwLock<Tables>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save_session(&self, session: &SessionRecord) -> anyhow::Result<()> {
        self.tables
            .write()
            .await
            .sessions
            .insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        Ok(self.tables.read().await.sessions.get(session_id).cloned())
    }

    async fn save_player(&self, player: &PlayerRecord) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        let players = tables.players.entry(player.session_id.clone()).or_default();
        match players.iter_mut().find(|existing| existing.id == player.id) {
            Some(existing) => *existing = player.clone(),
            None => players.push(player.clone()),
        }
        Ok(())
    }

    async fn list_players(&self, session_id: &str) -> anyhow::Result<Vec<PlayerRecord>> {
        let mut players = self
            .tables
            .read()
            .await
            .players
            .get(session_id)
            .cloned()
            .unwrap_or_default();
        players.sort_by_key(|player| player.seat_number);
        Ok(players)
    }

    async fn create_result(&self, result: &GameResult) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if tables.results.contains_key(&result.session_id) {
            bail!("result for session {} already exists", result.session_id);
        }
        tables
            .results
            .insert(result.session_id.clone(), result.clone());
        Ok(())
    }

    async fn get_result(&self, session_id: &str) -> anyhow::Result<Option<GameResult>> {
        Ok(self.tables.read().await.results.get(session_id).cloned())
    }

    async fn record_vote(&self, vote: &VoteRecord) -> anyhow::Result<()> {
        self.tables
            .write()
            .await
            .votes
            .entry(vote.session_id.clone())
            .or_default()
            .push(vote.clone());
        Ok(())
    }

    async fn list_votes(&self, session_id: &str) -> anyhow::Result<Vec<VoteRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .votes
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn win_tally(&self) -> anyhow::Result<WinTally> {
        let tables = self.tables.read().await;
        let mut tally = WinTally {
            sessions_count: tables.sessions.len(),
            ..WinTally::default()
        };
        for result in tables.results.values() {
            tally.record(result.winner_side);
        }
        Ok(tally)
    }
}
