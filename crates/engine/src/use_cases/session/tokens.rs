//! Token commands.

use mapkeep_domain::{
    describe_changes, Cell, DomainError, HistoryDetails, LevelId, MapEvent, PositionRef, Token,
    TokenId, TokenKind, TokenPatch,
};
use mapkeep_shared::TokenDraft;

use crate::api::connections::ClientRecord;

use super::error::CommandError;
use super::outbox::Outbox;
use super::state::{Change, Session};

fn label(token: &Token) -> String {
    if token.name.trim().is_empty() {
        format!("token {}", token.id)
    } else {
        token.name.clone()
    }
}

fn position(token: &Token) -> PositionRef {
    PositionRef {
        level_id: token.level_id.clone(),
        x: token.x,
        y: token.y,
    }
}

impl Session {
    pub(super) fn spawn_token(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        draft: TokenDraft,
    ) -> Result<(), CommandError> {
        let level = match &draft.level_id {
            Some(level_id) => self.state.location().level(level_id),
            None => self.state.location().levels.first(),
        }
        .ok_or_else(|| CommandError::validation("Unknown level"))?;
        let level_id = level.id.clone();
        let x = draft.x.unwrap_or(level.spawn.x);
        let y = draft.y.unwrap_or(level.spawn.y);

        let mut token = Token::new(
            draft.id.unwrap_or_default(),
            TokenKind::default(),
            level_id,
            x,
            y,
        );
        token.apply_patch(&draft.fields);

        let undo = self.capture_board(client);
        let events = self.state.spawn_token(token)?;
        let spawned = events.iter().find_map(|event| match event {
            MapEvent::TokenSpawned { token } => Some(token.clone()),
            _ => None,
        });
        let Some(spawned) = spawned else {
            return Ok(());
        };

        let change = Change::new("spawnToken", format!("Spawned {}", label(&spawned)), events)
            .details(HistoryDetails::target(spawned.id.as_str()).with_to(position(&spawned)))
            .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }

    pub(super) fn move_token(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        token_id: TokenId,
        level_id: Option<LevelId>,
        x: i32,
        y: i32,
    ) -> Result<(), CommandError> {
        self.ensure_token_access(client, &token_id)?;
        let before = self
            .state
            .token(&token_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("Token", token_id.as_str()))?;

        let undo = self.capture_board(client);
        let events = self.state.move_token(&token_id, level_id, x, y)?;
        let after = self.state.token(&token_id).map(position);

        let mut details = HistoryDetails::target(token_id.as_str()).with_from(position(&before));
        if let Some(to) = after {
            details = details.with_to(to);
        }
        let change = Change::new(
            "moveToken",
            format!("Moved {} to ({x}, {y})", label(&before)),
            events,
        )
        .details(details)
        .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }

    pub(super) fn update_token(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        token_id: TokenId,
        patch: TokenPatch,
    ) -> Result<(), CommandError> {
        self.ensure_token_access(client, &token_id)?;
        if !client.is_dm() && patch.touches_privileged_fields() {
            return Err(CommandError::Unauthorized);
        }

        let undo = self.capture_board(client);
        let (changes, events) = self.state.update_token(&token_id, &patch)?;
        if changes.is_empty() {
            return Ok(());
        }
        let name = self.state.token(&token_id).map(label).unwrap_or_default();
        let change = Change::new(
            "updateToken",
            format!("Updated {name}: {}", describe_changes(&changes)),
            events,
        )
        .details(HistoryDetails::target(token_id.as_str()).with_changes(changes))
        .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }

    pub(super) fn remove_token_at(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        level_id: LevelId,
        cell: Cell,
        token_id: Option<TokenId>,
    ) -> Result<(), CommandError> {
        let undo = self.capture_board(client);
        let removed = self
            .state
            .remove_token_at(&level_id, cell, token_id.as_ref())?;
        let change = Change::new(
            "removeToken",
            format!("Removed {}", label(&removed)),
            vec![MapEvent::TokenRemoved {
                token_id: removed.id.clone(),
            }],
        )
        .details(HistoryDetails::target(removed.id.as_str()).with_from(position(&removed)))
        .undo(undo);
        self.commit(out, client, change);
        Ok(())
    }

    pub(super) fn toggle_token_hidden(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        token_id: TokenId,
    ) -> Result<(), CommandError> {
        let hidden = self.state.toggle_token_hidden(&token_id)?;
        let change = Change::new(
            "toggleTokenHidden",
            "",
            vec![MapEvent::TokenHiddenToggled { token_id, hidden }],
        )
        .silent();
        self.commit(out, client, change);
        Ok(())
    }

    pub(super) fn reorder_token(
        &mut self,
        out: &mut Outbox,
        client: &ClientRecord,
        token_id: TokenId,
        z_index: i32,
    ) -> Result<(), CommandError> {
        self.state.reorder_token(&token_id, z_index)?;
        let change = Change::new(
            "reorderToken",
            "",
            vec![MapEvent::TokenReordered { token_id, z_index }],
        )
        .silent();
        self.commit(out, client, change);
        Ok(())
    }
}
