use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::db::schema::{workspace_members, workspaces};

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = workspaces)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A workspace as listed to one of its members.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    #[serde(flatten)]
    pub workspace: Workspace,
    /// The caller's role.
    pub role: String,
    pub member_count: i64,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = workspaces)]
pub struct NewWorkspace<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub created_at: DateTime<Utc>,
}

/// Member roles, stored as text.
pub mod role {
    pub const OWNER: &str = "OWNER";
    pub const MEMBER: &str = "MEMBER";
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = workspace_members)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMember {
    pub workspace_id: String,
    pub user_id: String,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = workspace_members)]
pub struct NewWorkspaceMember<'a> {
    pub workspace_id: &'a str,
    pub user_id: &'a str,
    pub role: &'a str,
    pub joined_at: DateTime<Utc>,
}
