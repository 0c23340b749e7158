use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::reactions;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = reactions)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: String,
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reactions)]
pub struct NewReaction<'a> {
    pub id: &'a str,
    pub message_id: &'a str,
    pub user_id: &'a str,
    pub emoji: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Outcome of toggling a reaction: whether it was added, and the message's full
/// reaction list afterwards.
#[derive(Debug, Clone)]
pub struct ReactionToggle {
    pub added: bool,
    pub reactions: Vec<Reaction>,
}
