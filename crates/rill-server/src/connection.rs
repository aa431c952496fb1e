//! Per-connection editor state.

use rill_playground::{
    Cursor, EditorSnapshot, PipelineController, PublishedResult, ShareLinks,
};
use tokio::sync::watch;

use crate::AppState;
use crate::protocol::{ClientMessage, ServerMessage};

/// One connected editor: its own controller, session and queue.
pub struct Connection {
    controller: PipelineController,
    share: ShareLinks,
}

impl Connection {
    pub fn new(state: &AppState) -> Self {
        Self {
            controller: PipelineController::new(&state.playground),
            share: state.share.clone(),
        }
    }

    /// Results published by this connection's compiles.
    pub fn subscribe(&self) -> watch::Receiver<PublishedResult> {
        self.controller.subscribe()
    }

    pub fn controller(&self) -> &PipelineController {
        &self.controller
    }

    /// Apply a client message. Returns a direct reply, if the message has one.
    pub async fn handle(&mut self, msg: ClientMessage) -> Option<ServerMessage> {
        match msg {
            ClientMessage::Edit {
                source,
                row,
                column,
            } => {
                let snapshot = EditorSnapshot {
                    source,
                    cursor: Cursor::new(row, column),
                    stage: self.controller.snapshot().stage,
                };
                self.controller.update(snapshot);
                None
            }
            ClientMessage::SetSource { source } => {
                self.controller.set_source_text(source);
                None
            }
            ClientMessage::SetCursor { row, column } => {
                self.controller.set_cursor(Cursor::new(row, column));
                None
            }
            ClientMessage::SelectStage { stage } => {
                self.controller.select_stage(stage);
                None
            }
            ClientMessage::GetResult => Some(ServerMessage::Result(self.controller.latest())),
            ClientMessage::Share => {
                let link = self.share.share(&self.controller.snapshot().source).await;
                Some(ServerMessage::ShareLink {
                    url: link.url,
                    shortened: link.shortened,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_engine::PipelineStage;
    use rill_playground::{CompileStatus, PlaygroundConfig, ShareConfig};

    fn state() -> AppState {
        let playground = PlaygroundConfig {
            share: ShareConfig {
                shortener_url: None,
                ..ShareConfig::default()
            },
            ..PlaygroundConfig::default()
        };
        AppState::new(playground)
    }

    #[tokio::test]
    async fn test_edit_compiles_and_get_result_replies() {
        let mut connection = Connection::new(&state());
        let reply = connection
            .handle(ClientMessage::Edit {
                source: "print(40 + 2)".to_string(),
                row: 0,
                column: 0,
            })
            .await;
        assert!(reply.is_none());
        connection.controller().wait_idle().await;

        let Some(ServerMessage::Result(result)) = connection.handle(ClientMessage::GetResult).await
        else {
            panic!("expected a result");
        };
        assert_eq!(result.status, CompileStatus::Succeeded);
        assert_eq!(result.output, "42\n=> ()\n");
    }

    #[tokio::test]
    async fn test_cursor_is_one_based() {
        let mut connection = Connection::new(&state());
        connection
            .handle(ClientMessage::Edit {
                source: "let a = 1\nlet b = a".to_string(),
                row: 2,
                column: 9,
            })
            .await;
        connection.controller().wait_idle().await;
        let result = connection.controller().latest();
        assert_eq!(result.breakpoint_ranges.len(), 1);
        assert_eq!(result.breakpoint_ranges[0].start.row, 1);
        assert_eq!(result.breakpoint_ranges[0].start.column, 8);

        connection
            .handle(ClientMessage::SetCursor { row: 0, column: 9 })
            .await;
        connection.controller().wait_idle().await;
        assert!(connection.controller().latest().breakpoint_ranges.is_empty());
    }

    #[tokio::test]
    async fn test_stage_selection_keeps_source() {
        let mut connection = Connection::new(&state());
        connection
            .handle(ClientMessage::SetSource {
                source: "1 + 2".to_string(),
            })
            .await;
        connection
            .handle(ClientMessage::SelectStage {
                stage: PipelineStage::Syntax,
            })
            .await;
        connection.controller().wait_idle().await;

        let result = connection.controller().latest();
        assert_eq!(result.stage, PipelineStage::Syntax);
        assert_eq!(result.output, "Binary(+)\n  Integer(1)\n  Integer(2)\n");
    }

    #[tokio::test]
    async fn test_share_uses_current_source() {
        let mut connection = Connection::new(&state());
        connection
            .handle(ClientMessage::SetSource {
                source: "let shared = true".to_string(),
            })
            .await;
        let Some(ServerMessage::ShareLink { url, shortened }) =
            connection.handle(ClientMessage::Share).await
        else {
            panic!("expected a share link");
        };
        assert!(!shortened);
        assert_eq!(
            rill_playground::decode_share_link(&url).unwrap(),
            "let shared = true"
        );
    }
}
