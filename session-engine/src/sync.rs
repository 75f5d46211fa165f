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

//! Write-behind replication of committed state into a [`SessionStore`].
//!
//! Writes are queued in commit order and applied by one background worker.
//! A failed or slow write is logged and dropped; it never reaches the
//! command that produced it.

use std::{sync::Arc, time::Duration};

use mafia_common::{GameResult, PlayerRecord, SessionRecord, VoteRecord};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::{error::EngineError, store::SessionStore};

#[derive(Debug, Clone)]
pub enum SyncOp {
    SaveSession(SessionRecord),
    SavePlayer(PlayerRecord),
    CreateResult(GameResult),
    RecordVote(VoteRecord),
}

impl SyncOp {
    pub fn operation(&self) -> &'static str {
        match self {
            SyncOp::SaveSession(_) => "save_session",
            SyncOp::SavePlayer(_) => "save_player",
            SyncOp::CreateResult(_) => "create_result",
            SyncOp::RecordVote(_) => "record_vote",
        }
    }

    async fn apply(&self, store: &dyn SessionStore) -> anyhow::Result<()> {
        match self {
            SyncOp::SaveSession(session) => store.save_session(session).await,
            SyncOp::SavePlayer(player) => store.save_player(player).await,
            SyncOp::CreateResult(result) => store.create_result(result).await,
            SyncOp::RecordVote(vote) => store.record_vote(vote).await,
        }
    }
}

enum Message {
    Write(SyncOp),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct StoreSync {
    tx: mpsc::UnboundedSender<Message>,
}

impl StoreSync {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn SessionStore>, write_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(store, write_timeout, rx));
        Self { tx }
    }

    pub fn enqueue(&self, op: SyncOp) {
        let operation = op.operation();
        if self.tx.send(Message::Write(op)).is_err() {
            let error = EngineError::PersistenceSyncFailed {
                operation,
                message: "sync worker stopped".to_string(),
            };
            warn!(error = %error, "dropping store write");
        }
    }

    pub fn enqueue_all(&self, ops: impl IntoIterator<Item = SyncOp>) {
        for op in ops {
            self.enqueue(op);
        }
    }

    /// Waits until every write queued before this call has been attempted.
    /// Returns false when `wait` elapses first.
    pub async fn flush(&self, wait: Duration) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Message::Flush(done_tx)).is_err() {
            return false;
        }
        matches!(tokio::time::timeout(wait, done_rx).await, Ok(Ok(())))
    }
}

async fn run_worker(
    store: Arc<dyn SessionStore>,
    write_timeout: Duration,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = rx.recv().await {
        match message {
            Message::Write(op) => apply_with_timeout(store.as_ref(), &op, write_timeout).await,
            Message::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    debug!("store sync worker stopped");
}

async fn apply_with_timeout(store: &dyn SessionStore, op: &SyncOp, write_timeout: Duration) {
    let operation = op.operation();
    let message = match tokio::time::timeout(write_timeout, op.apply(store)).await {
        Ok(Ok(())) => {
            debug!(operation, "store write applied");
            return;
        }
        Ok(Err(error)) => format!("{error:#}"),
        Err(_) => format!("timed out after {}ms", write_timeout.as_millis()),
    };
    let error = EngineError::PersistenceSyncFailed { operation, message };
    warn!(error = %error, "store write failed; live state is unaffected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySessionStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use mafia_common::{SessionStatus, WinTally, WinnerSide};

    fn session(id: &str, status: SessionStatus) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            mode: "Classic".to_string(),
            host: "host".to_string(),
            status,
            planned_player_count: 6,
            current_round: 0,
            current_phase: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    #[tokio::test]
    async fn writes_apply_in_queue_order() {
        let store = Arc::new(InMemorySessionStore::new());
        let sync = StoreSync::spawn(store.clone(), Duration::from_secs(1));

        sync.enqueue_all([
            SyncOp::SaveSession(session("s-1", SessionStatus::Planned)),
            SyncOp::SaveSession(session("s-1", SessionStatus::Active)),
            SyncOp::SaveSession(session("s-1", SessionStatus::Finished)),
        ]);
        assert!(sync.flush(Duration::from_secs(1)).await);

        let stored = store.get_session("s-1").await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Finished);
    }

    #[tokio::test]
    async fn failed_write_does_not_stop_later_writes() {
        let store = Arc::new(InMemorySessionStore::new());
        let sync = StoreSync::spawn(store.clone(), Duration::from_secs(1));
        let result = GameResult {
            session_id: "s-1".to_string(),
            winner_side: WinnerSide::Town,
            rounds_count: 1,
            mafia_count: 0,
            town_count: 4,
        };

        sync.enqueue(SyncOp::CreateResult(result.clone()));
        sync.enqueue(SyncOp::CreateResult(result));
        sync.enqueue(SyncOp::SaveSession(session("s-1", SessionStatus::Finished)));
        assert!(sync.flush(Duration::from_secs(1)).await);

        assert!(store.get_result("s-1").await.unwrap().is_some());
        assert!(store.get_session("s-1").await.unwrap().is_some());
    }

    struct StalledStore;

    #[async_trait]
    impl SessionStore for StalledStore {
        async fn save_session(&self, _session: &SessionRecord) -> anyhow::Result<()> {
            std::future::pending().await
        }
        async fn get_session(&self, _session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
            Ok(None)
        }
        async fn save_player(&self, _player: &PlayerRecord) -> anyhow::Result<()> {
            std::future::pending().await
        }
        async fn list_players(&self, _session_id: &str) -> anyhow::Result<Vec<PlayerRecord>> {
            Ok(Vec::new())
        }
        async fn create_result(&self, _result: &GameResult) -> anyhow::Result<()> {
            std::future::pending().await
        }
        async fn get_result(&self, _session_id: &str) -> anyhow::Result<Option<GameResult>> {
            Ok(None)
        }
        async fn record_vote(&self, _vote: &VoteRecord) -> anyhow::Result<()> {
            std::future::pending().await
        }
        async fn list_votes(&self, _session_id: &str) -> anyhow::Result<Vec<VoteRecord>> {
            Ok(Vec::new())
        }
        async fn win_tally(&self) -> anyhow::Result<WinTally> {
            Ok(WinTally::default())
        }
    }

    #[tokio::test]
    async fn stalled_store_is_bounded_by_write_timeout() {
        let sync = StoreSync::spawn(Arc::new(StalledStore), Duration::from_millis(20));
        sync.enqueue(SyncOp::SaveSession(session("s-1", SessionStatus::Planned)));
        sync.enqueue(SyncOp::SaveSession(session("s-1", SessionStatus::Active)));

        assert!(sync.flush(Duration::from_secs(2)).await);
    }

    #[tokio::test]
    async fn flush_reports_when_wait_elapses() {
        let sync = StoreSync::spawn(Arc::new(StalledStore), Duration::from_secs(5));
        sync.enqueue(SyncOp::SaveSession(session("s-1", SessionStatus::Planned)));

        assert!(!sync.flush(Duration::from_millis(20)).await);
    }
}
