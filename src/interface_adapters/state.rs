use crate::domain::BlockRegistry;
use crate::use_cases::AuthorityCommand;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Clone)]
pub struct AppState {
    // Actions and observer joins flowing into the authority world task.
    pub commands: mpsc::Sender<AuthorityCommand>,
    // Shared read-only block table, used to resolve block names in actions.
    pub registry: Arc<BlockRegistry>,
}
