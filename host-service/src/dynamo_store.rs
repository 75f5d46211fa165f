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

//! Single-table DynamoDB store. Every row lives under its session's
//! partition (`pk = SESSION#<id>`) and carries the record as a JSON `body`.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::{Client as DynamoClient, types::AttributeValue};
use mafia_common::{GameResult, PlayerRecord, SessionRecord, VoteRecord, WinTally};
use serde::{Serialize, de::DeserializeOwned};
use session_engine::SessionStore;
use uuid::Uuid;

use crate::config::DynamoSettings;

type Item = HashMap<String, AttributeValue>;

const ENTITY_SESSION: &str = "session";
const ENTITY_PLAYER: &str = "player";
const ENTITY_RESULT: &str = "result";
const ENTITY_VOTE: &str = "vote";

#[derive(Clone)]
pub struct DynamoSessionStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoSessionStore {
    pub async fn connect(settings: &DynamoSettings) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(endpoint) = &settings.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let config = loader.load().await;
        Self {
            client: DynamoClient::new(&config),
            table_name: settings.table_name.clone(),
        }
    }

    async fn put(&self, item: Item, context: &'static str) -> anyhow::Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .context(context)?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, pk: String, sk: &str) -> anyhow::Result<Option<T>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("pk", AttributeValue::S(pk))
            .key("sk", AttributeValue::S(sk.to_string()))
            .send()
            .await
            .context("failed to get item from sessions table")?;
        output.item().map(decode_body::<T>).transpose()
    }

    /// All rows of one session whose sort key starts with `prefix`.
    async fn query_prefix<T: DeserializeOwned>(
        &self,
        session_id: &str,
        prefix: &str,
    ) -> anyhow::Result<Vec<T>> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .key_condition_expression("pk = :pk AND begins_with(sk, :prefix)")
                .expression_attribute_values(":pk", AttributeValue::S(session_pk(session_id)))
                .expression_attribute_values(":prefix", AttributeValue::S(prefix.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .context("failed to query sessions table")?;
            for item in output.items() {
                records.push(decode_body(item)?);
            }
            match output.last_evaluated_key() {
                Some(key) => start_key = Some(key.clone()),
                None => return Ok(records),
            }
        }
    }
}

#[async_trait]
impl SessionStore for DynamoSessionStore {
    async fn save_session(&self, session: &SessionRecord) -> anyhow::Result<()> {
        let item = encode_item(session_pk(&session.id), "META".to_string(), ENTITY_SESSION, session)?;
        self.put(item, "failed to put session item").await
    }

    async fn get_session(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        self.get(session_pk(session_id), "META").await
    }

    async fn save_player(&self, player: &PlayerRecord) -> anyhow::Result<()> {
        let item = encode_item(
            session_pk(&player.session_id),
            format!("PLAYER#{}", player.id),
            ENTITY_PLAYER,
            player,
        )?;
        self.put(item, "failed to put player item").await
    }

    async fn list_players(&self, session_id: &str) -> anyhow::Result<Vec<PlayerRecord>> {
        let mut players: Vec<PlayerRecord> = self.query_prefix(session_id, "PLAYER#").await?;
        players.sort_by_key(|player| player.seat_number);
        Ok(players)
    }

    async fn create_result(&self, result: &GameResult) -> anyhow::Result<()> {
        let item = encode_item(
            session_pk(&result.session_id),
            "RESULT".to_string(),
            ENTITY_RESULT,
            result,
        )?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .condition_expression("attribute_not_exists(pk)")
            .send()
            .await
            .with_context(|| format!("failed to create result for session {}", result.session_id))?;
        Ok(())
    }

    async fn get_result(&self, session_id: &str) -> anyhow::Result<Option<GameResult>> {
        self.get(session_pk(session_id), "RESULT").await
    }

    async fn record_vote(&self, vote: &VoteRecord) -> anyhow::Result<()> {
        let item = encode_item(
            session_pk(&vote.session_id),
            vote_sk(vote.round_number),
            ENTITY_VOTE,
            vote,
        )?;
        self.put(item, "failed to put vote item").await
    }

    async fn list_votes(&self, session_id: &str) -> anyhow::Result<Vec<VoteRecord>> {
        self.query_prefix(session_id, "VOTE#").await
    }

    async fn win_tally(&self) -> anyhow::Result<WinTally> {
        let mut tally = WinTally::default();
        let mut start_key: Option<Item> = None;
        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("entity = :session OR entity = :result")
                .expression_attribute_values(":session", AttributeValue::S(ENTITY_SESSION.into()))
                .expression_attribute_values(":result", AttributeValue::S(ENTITY_RESULT.into()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .context("failed to scan sessions table")?;
            for item in output.items() {
                match item.get("entity").and_then(|value| value.as_s().ok()) {
                    Some(entity) if entity == ENTITY_SESSION => tally.sessions_count += 1,
                    Some(entity) if entity == ENTITY_RESULT => {
                        let result: GameResult = decode_body(item)?;
                        tally.record(result.winner_side);
                    }
                    _ => {}
                }
            }
            match output.last_evaluated_key() {
                Some(key) => start_key = Some(key.clone()),
                None => return Ok(tally),
            }
        }
    }
}

fn session_pk(session_id: &str) -> String {
    format!("SESSION#{session_id}")
}

/// Votes sort by round; the suffix keeps repeated votes distinct.
fn vote_sk(round_number: u32) -> String {
    format!("VOTE#{round_number:04}#{}", Uuid::new_v4())
}

fn encode_item<T: Serialize>(
    pk: String,
    sk: String,
    entity: &str,
    record: &T,
) -> anyhow::Result<Item> {
    let body = serde_json::to_string(record).context("failed to encode record body")?;
    let mut item = HashMap::new();
    item.insert("pk".to_string(), AttributeValue::S(pk));
    item.insert("sk".to_string(), AttributeValue::S(sk));
    item.insert("entity".to_string(), AttributeValue::S(entity.to_string()));
    item.insert("body".to_string(), AttributeValue::S(body));
    Ok(item)
}

fn decode_body<T: DeserializeOwned>(item: &Item) -> anyhow::Result<T> {
    let body = item
        .get("body")
        .and_then(|value| value.as_s().ok())
        .context("item has no body attribute")?;
    serde_json::from_str(body).context("failed to decode record body")
}
