use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, OptionalExtension};
use diesel_async::AsyncConnection;
use huddle_common::id::{prefix, prefixed_ulid};
use scoped_futures::ScopedFutureExt;

use crate::db::pool::DbPool;
use crate::db::schema::{channels, messages, reactions, workspace_members, workspaces};
use crate::models::channel::{Channel, NewChannel, GENERAL_CHANNEL, TYPE_DM, TYPE_PUBLIC};
use crate::models::message::{Message, NewMessage};
use crate::models::reaction::{NewReaction, Reaction, ReactionToggle};
use crate::models::workspace::{
    role, NewWorkspace, NewWorkspaceMember, Workspace, WorkspaceMember, WorkspaceSummary,
};

use super::{ChatStore, StoreError, StoreResult};

/// Postgres-backed `ChatStore`.
#[derive(Clone)]
pub struct PgChatStore {
    pool: DbPool,
}

impl PgChatStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Unique violations become [`StoreError::Conflict`].
fn conflict_on_unique(err: diesel::result::Error) -> StoreError {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            StoreError::Conflict
        }
        err => StoreError::Database(err),
    }
}

#[async_trait]
impl ChatStore for PgChatStore {
    async fn find_workspace(&self, workspace_id: &str) -> StoreResult<Option<Workspace>> {
        let mut conn = self.pool.get().await?;
        let workspace = diesel_async::RunQueryDsl::get_result(
            workspaces::table
                .find(workspace_id)
                .select(Workspace::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(workspace)
    }

    async fn is_workspace_member(&self, workspace_id: &str, user_id: &str) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let is_member: bool = diesel_async::RunQueryDsl::get_result(
            diesel::select(diesel::dsl::exists(
                workspace_members::table.find((workspace_id, user_id)),
            )),
            &mut conn,
        )
        .await?;
        Ok(is_member)
    }

    async fn find_channel(&self, channel_id: &str) -> StoreResult<Option<Channel>> {
        let mut conn = self.pool.get().await?;
        let channel = diesel_async::RunQueryDsl::get_result(
            channels::table.find(channel_id).select(Channel::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(channel)
    }

    async fn find_message(&self, message_id: &str) -> StoreResult<Option<Message>> {
        let mut conn = self.pool.get().await?;
        let message = diesel_async::RunQueryDsl::get_result(
            messages::table.find(message_id).select(Message::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(message)
    }

    async fn find_channel_accessible(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Channel>> {
        let mut conn = self.pool.get().await?;
        let channel = diesel_async::RunQueryDsl::get_result(
            channels::table
                .inner_join(
                    workspace_members::table
                        .on(workspace_members::workspace_id.eq(channels::workspace_id)),
                )
                .filter(channels::id.eq(channel_id))
                .filter(workspace_members::user_id.eq(user_id))
                .select(Channel::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(channel)
    }

    async fn find_thread_accessible(
        &self,
        message_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Message>> {
        let mut conn = self.pool.get().await?;
        let message = diesel_async::RunQueryDsl::get_result(
            messages::table
                .inner_join(channels::table)
                .inner_join(
                    workspace_members::table
                        .on(workspace_members::workspace_id.eq(channels::workspace_id)),
                )
                .filter(messages::id.eq(message_id))
                .filter(workspace_members::user_id.eq(user_id))
                .select(Message::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(message)
    }

    async fn find_general_channel(&self, workspace_id: &str) -> StoreResult<Option<Channel>> {
        let mut conn = self.pool.get().await?;
        let channel = diesel_async::RunQueryDsl::first(
            channels::table
                .filter(channels::workspace_id.eq(workspace_id))
                .filter(channels::name.eq(GENERAL_CHANNEL))
                .order((channels::created_at.asc(), channels::id.asc()))
                .select(Channel::as_select()),
            &mut conn,
        )
        .await
        .optional()?;
        Ok(channel)
    }

    async fn list_thread_replies(&self, root_message_id: &str) -> StoreResult<Vec<Message>> {
        let mut conn = self.pool.get().await?;
        let replies = diesel_async::RunQueryDsl::load(
            messages::table
                .filter(messages::parent_message_id.eq(root_message_id))
                .order((messages::created_at.asc(), messages::id.asc()))
                .select(Message::as_select()),
            &mut conn,
        )
        .await?;
        Ok(replies)
    }

    async fn list_channel_messages(&self, channel_id: &str, limit: i64) -> StoreResult<Vec<Message>> {
        let mut conn = self.pool.get().await?;
        let mut rows: Vec<Message> = diesel_async::RunQueryDsl::load(
            messages::table
                .filter(messages::channel_id.eq(channel_id))
                .filter(messages::parent_message_id.is_null())
                .order((messages::created_at.desc(), messages::id.desc()))
                .limit(limit)
                .select(Message::as_select()),
            &mut conn,
        )
        .await?;
        rows.reverse();
        Ok(rows)
    }

    async fn list_user_workspaces(&self, user_id: &str) -> StoreResult<Vec<WorkspaceSummary>> {
        let mut conn = self.pool.get().await?;
        let rows: Vec<(Workspace, String)> = diesel_async::RunQueryDsl::load(
            workspaces::table
                .inner_join(workspace_members::table)
                .filter(workspace_members::user_id.eq(user_id))
                .order((workspaces::name.asc(), workspaces::id.asc()))
                .select((Workspace::as_select(), workspace_members::role)),
            &mut conn,
        )
        .await?;

        let ids: Vec<&str> = rows.iter().map(|(w, _)| w.id.as_str()).collect();
        let counts: Vec<(String, i64)> = diesel_async::RunQueryDsl::load(
            workspace_members::table
                .filter(workspace_members::workspace_id.eq_any(ids))
                .group_by(workspace_members::workspace_id)
                .select((workspace_members::workspace_id, diesel::dsl::count_star())),
            &mut conn,
        )
        .await?;
        let counts: HashMap<String, i64> = counts.into_iter().collect();

        Ok(rows
            .into_iter()
            .map(|(workspace, role)| WorkspaceSummary {
                member_count: counts.get(&workspace.id).copied().unwrap_or(0),
                workspace,
                role,
            })
            .collect())
    }

    async fn list_workspace_channels(&self, workspace_id: &str) -> StoreResult<Vec<Channel>> {
        let mut conn = self.pool.get().await?;
        let rows = diesel_async::RunQueryDsl::load(
            channels::table
                .filter(channels::workspace_id.eq(workspace_id))
                .order((channels::created_at.asc(), channels::id.asc()))
                .select(Channel::as_select()),
            &mut conn,
        )
        .await?;
        Ok(rows)
    }

    async fn list_workspace_members(&self, workspace_id: &str) -> StoreResult<Vec<WorkspaceMember>> {
        let mut conn = self.pool.get().await?;
        let rows = diesel_async::RunQueryDsl::load(
            workspace_members::table
                .filter(workspace_members::workspace_id.eq(workspace_id))
                .order((workspace_members::joined_at.asc(), workspace_members::user_id.asc()))
                .select(WorkspaceMember::as_select()),
            &mut conn,
        )
        .await?;
        Ok(rows)
    }

    async fn create_workspace(&self, name: &str, owner_id: &str) -> StoreResult<Workspace> {
        let mut conn = self.pool.get().await?;
        let name = name.to_string();
        let owner_id = owner_id.to_string();

        // Transaction: workspace + owner membership + #general.
        let workspace = conn
            .transaction::<_, StoreError, _>(|conn| {
                async move {
                    let now = Utc::now();
                    let workspace_id = prefixed_ulid(prefix::WORKSPACE);
                    let channel_id = prefixed_ulid(prefix::CHANNEL);

                    let workspace: Workspace = diesel_async::RunQueryDsl::get_result(
                        diesel::insert_into(workspaces::table)
                            .values(NewWorkspace {
                                id: &workspace_id,
                                name: &name,
                                created_at: now,
                            })
                            .returning(Workspace::as_returning()),
                        conn,
                    )
                    .await?;

                    diesel_async::RunQueryDsl::execute(
                        diesel::insert_into(workspace_members::table).values(NewWorkspaceMember {
                            workspace_id: &workspace_id,
                            user_id: &owner_id,
                            role: role::OWNER,
                            joined_at: now,
                        }),
                        conn,
                    )
                    .await?;

                    diesel_async::RunQueryDsl::execute(
                        diesel::insert_into(channels::table).values(NewChannel {
                            id: &channel_id,
                            workspace_id: &workspace_id,
                            name: GENERAL_CHANNEL,
                            description: None,
                            type_: TYPE_PUBLIC,
                            created_at: now,
                            updated_at: now,
                        }),
                        conn,
                    )
                    .await?;

                    Ok(workspace)
                }
                .scope_boxed()
            })
            .await?;

        Ok(workspace)
    }

    async fn add_workspace_member(
        &self,
        workspace_id: &str,
        user_id: &str,
        role: &str,
    ) -> StoreResult<bool> {
        let mut conn = self.pool.get().await?;
        let inserted = diesel_async::RunQueryDsl::execute(
            diesel::insert_into(workspace_members::table)
                .values(NewWorkspaceMember {
                    workspace_id,
                    user_id,
                    role,
                    joined_at: Utc::now(),
                })
                .on_conflict_do_nothing(),
            &mut conn,
        )
        .await?;
        Ok(inserted > 0)
    }

    async fn create_channel(
        &self,
        workspace_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> StoreResult<Channel> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now();
        let channel_id = prefixed_ulid(prefix::CHANNEL);

        let channel = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(channels::table)
                .values(NewChannel {
                    id: &channel_id,
                    workspace_id,
                    name,
                    description,
                    type_: TYPE_PUBLIC,
                    created_at: now,
                    updated_at: now,
                })
                .returning(Channel::as_returning()),
            &mut conn,
        )
        .await
        .map_err(conflict_on_unique)?;
        Ok(channel)
    }

    async fn find_or_create_dm(
        &self,
        workspace_id: &str,
        name: &str,
    ) -> StoreResult<(Channel, bool)> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now();
        let channel_id = prefixed_ulid(prefix::CHANNEL);

        let created: Option<Channel> = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(channels::table)
                .values(NewChannel {
                    id: &channel_id,
                    workspace_id,
                    name,
                    description: None,
                    type_: TYPE_DM,
                    created_at: now,
                    updated_at: now,
                })
                .on_conflict((channels::workspace_id, channels::name))
                .do_nothing()
                .returning(Channel::as_returning()),
            &mut conn,
        )
        .await
        .optional()?;
        if let Some(channel) = created {
            return Ok((channel, true));
        }

        let existing: Channel = diesel_async::RunQueryDsl::get_result(
            channels::table
                .filter(channels::workspace_id.eq(workspace_id))
                .filter(channels::name.eq(name))
                .select(Channel::as_select()),
            &mut conn,
        )
        .await?;
        if !existing.is_dm() {
            return Err(StoreError::Conflict);
        }
        Ok((existing, false))
    }

    async fn rename_channel(&self, channel_id: &str, name: &str) -> StoreResult<Channel> {
        let mut conn = self.pool.get().await?;
        diesel_async::RunQueryDsl::get_result(
            diesel::update(channels::table.find(channel_id))
                .set((channels::name.eq(name), channels::updated_at.eq(Utc::now())))
                .returning(Channel::as_returning()),
            &mut conn,
        )
        .await
        .optional()
        .map_err(conflict_on_unique)?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_channel(&self, channel_id: &str) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        let deleted = diesel_async::RunQueryDsl::execute(
            diesel::delete(channels::table.find(channel_id)),
            &mut conn,
        )
        .await?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn create_message(
        &self,
        channel_id: &str,
        user_id: &str,
        content: &str,
        parent_message_id: Option<&str>,
    ) -> StoreResult<Message> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now();
        let message_id = prefixed_ulid(prefix::MESSAGE);

        let message = diesel_async::RunQueryDsl::get_result(
            diesel::insert_into(messages::table)
                .values(NewMessage {
                    id: &message_id,
                    channel_id,
                    user_id,
                    content,
                    parent_message_id,
                    created_at: now,
                    updated_at: now,
                })
                .returning(Message::as_returning()),
            &mut conn,
        )
        .await?;
        Ok(message)
    }

    async fn update_message(&self, message_id: &str, content: &str) -> StoreResult<Message> {
        let mut conn = self.pool.get().await?;
        diesel_async::RunQueryDsl::get_result(
            diesel::update(messages::table.find(message_id))
                .set((
                    messages::content.eq(content),
                    messages::updated_at.eq(Utc::now()),
                ))
                .returning(Message::as_returning()),
            &mut conn,
        )
        .await
        .optional()?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_message(&self, message_id: &str) -> StoreResult<()> {
        let mut conn = self.pool.get().await?;
        // Replies and reactions cascade in the schema.
        let deleted = diesel_async::RunQueryDsl::execute(
            diesel::delete(messages::table.find(message_id)),
            &mut conn,
        )
        .await?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn toggle_reaction(
        &self,
        message_id: &str,
        user_id: &str,
        emoji: &str,
    ) -> StoreResult<ReactionToggle> {
        let mut conn = self.pool.get().await?;
        let message_id = message_id.to_string();
        let user_id = user_id.to_string();
        let emoji = emoji.to_string();

        let toggle = conn
            .transaction::<_, StoreError, _>(|conn| {
                async move {
                    let existing: Option<String> = diesel_async::RunQueryDsl::get_result(
                        reactions::table
                            .filter(reactions::message_id.eq(&message_id))
                            .filter(reactions::user_id.eq(&user_id))
                            .filter(reactions::emoji.eq(&emoji))
                            .select(reactions::id),
                        conn,
                    )
                    .await
                    .optional()?;

                    let added = match existing {
                        Some(reaction_id) => {
                            diesel_async::RunQueryDsl::execute(
                                diesel::delete(reactions::table.find(reaction_id)),
                                conn,
                            )
                            .await?;
                            false
                        }
                        None => {
                            let reaction_id = prefixed_ulid(prefix::REACTION);
                            diesel_async::RunQueryDsl::execute(
                                diesel::insert_into(reactions::table)
                                    .values(NewReaction {
                                        id: &reaction_id,
                                        message_id: &message_id,
                                        user_id: &user_id,
                                        emoji: &emoji,
                                        created_at: Utc::now(),
                                    })
                                    .on_conflict_do_nothing(),
                                conn,
                            )
                            .await?;
                            true
                        }
                    };

                    let rows: Vec<Reaction> = diesel_async::RunQueryDsl::load(
                        reactions::table
                            .filter(reactions::message_id.eq(&message_id))
                            .order((reactions::created_at.asc(), reactions::id.asc()))
                            .select(Reaction::as_select()),
                        conn,
                    )
                    .await?;

                    Ok(ReactionToggle {
                        added,
                        reactions: rows,
                    })
                }
                .scope_boxed()
            })
            .await?;

        Ok(toggle)
    }
}
