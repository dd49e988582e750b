// Local semantic actions (already translated from input devices) posted to the authority.

use crate::domain::{BlockRegistry, BlockTypeId, Direction, TileVector};
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::protocol::{ClickRequest, MaterialRequest, MoveRequest};
use crate::interface_adapters::state::AppState;
use crate::use_cases::AuthorityCommand;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use glam::Vec2;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

#[derive(Debug, PartialEq)]
pub enum ActionError {
    MissingBlock,
    UnknownBlock(String),
    NonFiniteDirection,
    AuthorityBusy,
    AuthorityClosed,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::MissingBlock => write!(f, "block is required when placing"),
            ActionError::UnknownBlock(name) => write!(f, "unknown block type: {name}"),
            ActionError::NonFiniteDirection => write!(f, "direction must be finite"),
            ActionError::AuthorityBusy => write!(f, "authority is busy"),
            ActionError::AuthorityClosed => write!(f, "authority is shutting down"),
        }
    }
}

impl ActionError {
    fn status(&self) -> StatusCode {
        match self {
            ActionError::MissingBlock
            | ActionError::UnknownBlock(_)
            | ActionError::NonFiniteDirection => StatusCode::BAD_REQUEST,
            ActionError::AuthorityBusy | ActionError::AuthorityClosed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl IntoResponse for ActionError {
    fn into_response(self) -> axum::response::Response {
        (
            self.status(),
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Turns a click payload into the command the world task applies.
/// Removal ignores the block name.
pub fn click_command(
    request: ClickRequest,
    registry: &BlockRegistry,
) -> Result<AuthorityCommand, ActionError> {
    let block_type = match (request.remove, request.block) {
        (true, _) => BlockTypeId::WALL,
        (false, None) => return Err(ActionError::MissingBlock),
        (false, Some(name)) => registry
            .find(name.trim())
            .ok_or(ActionError::UnknownBlock(name))?,
    };

    Ok(AuthorityCommand::MapClicked {
        position: TileVector::new(request.x, request.y),
        remove: request.remove,
        block_type,
        direction: request.direction.map(Direction::from).unwrap_or_default(),
    })
}

pub fn move_command(request: MoveRequest) -> Result<AuthorityCommand, ActionError> {
    let direction = Vec2::new(request.x, request.y);
    if !direction.is_finite() {
        return Err(ActionError::NonFiniteDirection);
    }
    Ok(AuthorityCommand::Move { direction })
}

fn submit(state: &AppState, command: AuthorityCommand) -> Result<StatusCode, ActionError> {
    // Never wait on the world task from a request handler.
    match state.commands.try_send(command) {
        Ok(()) => Ok(StatusCode::ACCEPTED),
        Err(TrySendError::Full(_)) => {
            warn!("command channel full; dropping action");
            Err(ActionError::AuthorityBusy)
        }
        Err(TrySendError::Closed(_)) => Err(ActionError::AuthorityClosed),
    }
}

pub async fn click_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ClickRequest>,
) -> impl IntoResponse {
    click_command(payload, &state.registry).and_then(|command| submit(&state, command))
}

pub async fn move_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MoveRequest>,
) -> impl IntoResponse {
    move_command(payload).and_then(|command| submit(&state, command))
}

pub async fn material_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<MaterialRequest>,
) -> impl IntoResponse {
    submit(
        &state,
        AuthorityCommand::AddMaterial {
            position: TileVector::new(payload.x, payload.y),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface_adapters::protocol::DirectionDto;

    fn click(block: Option<&str>, remove: bool) -> ClickRequest {
        ClickRequest {
            x: 3,
            y: 3,
            remove,
            block: block.map(str::to_string),
            direction: Some(DirectionDto::Left),
        }
    }

    #[test]
    fn when_click_names_a_known_block_then_command_carries_its_type() {
        let registry = BlockRegistry::default();
        let command = click_command(click(Some("conveyor"), false), &registry).unwrap();
        match command {
            AuthorityCommand::MapClicked {
                position,
                remove,
                block_type,
                direction,
            } => {
                assert_eq!(position, TileVector::new(3, 3));
                assert!(!remove);
                assert_eq!(block_type, BlockTypeId::CONVEYOR);
                assert_eq!(direction, Direction::Left);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn when_click_places_without_block_then_it_is_rejected() {
        let registry = BlockRegistry::default();
        assert_eq!(
            click_command(click(None, false), &registry).unwrap_err(),
            ActionError::MissingBlock
        );
    }

    #[test]
    fn when_click_names_unknown_block_then_it_is_rejected() {
        let registry = BlockRegistry::default();
        let err = click_command(click(Some("lava"), false), &registry).unwrap_err();
        assert_eq!(err, ActionError::UnknownBlock("lava".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn when_click_removes_then_block_name_is_not_needed() {
        let registry = BlockRegistry::default();
        assert!(click_command(click(None, true), &registry).is_ok());
    }

    #[test]
    fn when_move_is_not_finite_then_it_is_rejected() {
        let err = move_command(MoveRequest {
            x: f32::NAN,
            y: 0.0,
        })
        .unwrap_err();
        assert_eq!(err, ActionError::NonFiniteDirection);
    }

    #[test]
    fn when_command_channel_is_full_then_action_reports_busy() {
        let (commands, _rx) = tokio::sync::mpsc::channel(1);
        let state = AppState {
            commands,
            registry: Arc::new(BlockRegistry::default()),
        };
        let stop = AuthorityCommand::Move {
            direction: Vec2::ZERO,
        };
        assert_eq!(submit(&state, stop).unwrap(), StatusCode::ACCEPTED);

        let again = AuthorityCommand::Move {
            direction: Vec2::ZERO,
        };
        assert_eq!(submit(&state, again).unwrap_err(), ActionError::AuthorityBusy);
    }
}
