use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::channels;

/// Name of the channel every workspace is created with. It cannot be renamed or deleted.
pub const GENERAL_CHANNEL: &str = "general";

pub const TYPE_PUBLIC: &str = "PUBLIC";
pub const TYPE_DM: &str = "DM";

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = channels)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub type_: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Name prefix of direct-message channels. Channel name validation cannot produce it.
const DM_PREFIX: &str = "DM:";

/// The channel name shared by both directions of a direct conversation.
pub fn dm_name(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{DM_PREFIX}{first}-{second}")
}

impl Channel {
    pub fn is_general(&self) -> bool {
        self.name == GENERAL_CHANNEL
    }

    pub fn is_dm(&self) -> bool {
        self.type_ == TYPE_DM
    }

    /// Public channels are listed to every member; a DM only to its two participants.
    pub fn visible_to(&self, user_id: &str) -> bool {
        if !self.is_dm() {
            return true;
        }
        self.name.strip_prefix(DM_PREFIX).is_some_and(|pair| {
            pair.strip_prefix(user_id).is_some_and(|rest| rest.starts_with('-'))
                || pair.strip_suffix(user_id).is_some_and(|rest| rest.ends_with('-'))
        })
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = channels)]
pub struct NewChannel<'a> {
    pub id: &'a str,
    pub workspace_id: &'a str,
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub type_: &'a str,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
