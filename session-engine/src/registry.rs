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

//! Conversation-keyed table of live games.

use std::{collections::HashMap, sync::Arc};

use mafia_common::ConversationId;
use tokio::sync::Mutex;

use crate::{error::EngineError, state::LiveGameState};

pub type SharedGame = Arc<Mutex<LiveGameState>>;

/// Outer lock guards the map only; each game carries its own lock so
/// commands on different conversations never wait on each other.
#[derive(Default)]
pub struct LiveGameRegistry {
    games: Mutex<HashMap<ConversationId, SharedGame>>,
}

impl LiveGameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new game. An unfinished game for the same conversation
    /// blocks the insert; a finished one is replaced.
    ///
    /// The existing game's lock is never awaited while the map is held.
    pub async fn insert(&self, state: LiveGameState) -> Result<SharedGame, EngineError> {
        let conversation_id = state.conversation_id.clone();
        let existing = self.games.lock().await.get(&conversation_id).cloned();
        if let Some(existing) = &existing
            && !existing.lock().await.is_finished()
        {
            return Err(EngineError::AlreadyStarted);
        }

        let mut games = self.games.lock().await;
        if let Some(current) = games.get(&conversation_id) {
            let unchanged = existing
                .as_ref()
                .is_some_and(|existing| Arc::ptr_eq(existing, current));
            if !unchanged {
                return Err(EngineError::AlreadyStarted);
            }
        }

        let game = Arc::new(Mutex::new(state));
        games.insert(conversation_id, game.clone());
        Ok(game)
    }

    pub async fn get(&self, conversation_id: &str) -> Result<SharedGame, EngineError> {
        self.games
            .lock()
            .await
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(conversation_id.to_string()))
    }

    pub async fn remove(&self, conversation_id: &str) -> Option<SharedGame> {
        self.games.lock().await.remove(conversation_id)
    }

    pub async fn contains(&self, conversation_id: &str) -> bool {
        self.games.lock().await.contains_key(conversation_id)
    }

    pub async fn len(&self) -> usize {
        self.games.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::MachineState;
    use std::time::Duration;
    use mafia_common::{WinnerSide, default_catalog};

    fn game(conversation_id: &str) -> LiveGameState {
        let mode = default_catalog().default_mode().unwrap().clone();
        LiveGameState::new(conversation_id, mode, "host", 6)
    }

    #[tokio::test]
    async fn second_unfinished_game_is_rejected() {
        let registry = LiveGameRegistry::new();
        registry.insert(game("chat-1")).await.unwrap();

        let err = registry.insert(game("chat-1")).await.unwrap_err();
        assert_eq!(err, EngineError::AlreadyStarted);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn finished_game_is_replaced() {
        let registry = LiveGameRegistry::new();
        let first = registry.insert(game("chat-1")).await.unwrap();
        let first_session = {
            let mut state = first.lock().await;
            state.machine = MachineState::Finished(WinnerSide::Town);
            state.session_id.clone()
        };

        let second = registry.insert(game("chat-1")).await.unwrap();
        let second_session = second.lock().await.session_id.clone();
        assert_ne!(first_session, second_session);

        let current = registry.get("chat-1").await.unwrap();
        assert_eq!(current.lock().await.session_id, second_session);
    }

    #[tokio::test]
    async fn conversations_are_independent() {
        let registry = LiveGameRegistry::new();
        registry.insert(game("chat-1")).await.unwrap();
        registry.insert(game("chat-2")).await.unwrap();
        assert_eq!(registry.len().await, 2);

        registry.remove("chat-1").await.unwrap();
        assert!(!registry.contains("chat-1").await);
        assert!(registry.contains("chat-2").await);
        assert_eq!(
            registry.get("chat-1").await.unwrap_err(),
            EngineError::SessionNotFound("chat-1".to_string())
        );
    }

    #[tokio::test]
    async fn busy_game_does_not_block_other_conversations() {
        let registry = Arc::new(LiveGameRegistry::new());
        let busy = registry.insert(game("chat-a")).await.unwrap();
        registry.insert(game("chat-b")).await.unwrap();

        let guard = busy.lock().await;
        let pending_insert = tokio::spawn({
            let registry = registry.clone();
            async move { registry.insert(game("chat-a")).await }
        });
        tokio::task::yield_now().await;

        let other = tokio::time::timeout(Duration::from_millis(500), registry.get("chat-b")).await;
        assert!(other.is_ok(), "chat-b lookup waited on chat-a's game lock");
        assert!(other.unwrap().is_ok());
        assert!(
            tokio::time::timeout(Duration::from_millis(500), registry.remove("chat-b"))
                .await
                .unwrap()
                .is_some()
        );

        drop(guard);
        assert_eq!(
            pending_insert.await.unwrap().unwrap_err(),
            EngineError::AlreadyStarted
        );
    }
}
