//! WebSocket upgrade + message loop. Each connection owns a fresh workspace.
//! Client messages are parsed as JSON and forwarded to core logic. Most
//! requests get a single reply; generation and chat turns emit several.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use futures::StreamExt;
use tracing::{debug, error, info, instrument};

use crate::logic::*;
use crate::protocol::{to_workspace_out, ClientWsMessage, ServerWsMessage};
use crate::state::{AppState, SharedWorkspace};

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "mathgen", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  let (id, ws) = state.create_workspace().await;
  info!(target: "mathgen", workspace = %id, "WebSocket connected");

  let hello = state_message(&state, &ws).await;
  if send(&mut socket, &hello).await {
    while let Some(Ok(msg)) = socket.recv().await {
      match msg {
        Message::Text(txt) => {
          state.keep_alive(&id, &ws).await;
          let open = match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(incoming) => {
              debug!(target: "mathgen", "WS received: {:?}", &incoming);
              handle_client_ws(incoming, &state, &ws, &mut socket).await
            }
            Err(e) => send(&mut socket, &ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }).await,
          };
          if !open {
            break;
          }
        }
        Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
        Message::Close(_) => break,
        _ => {}
      }
    }
  }

  state.drop_workspace(&id).await;
  info!(target: "mathgen", workspace = %id, "WebSocket disconnected");
}

/// Serialize and send one message. Returns false once the socket is gone.
async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  match socket.send(Message::Text(out)).await {
    Ok(()) => true,
    Err(e) => {
      error!(target: "mathgen", error = %e, "WS send error");
      false
    }
  }
}

async fn state_message(state: &AppState, ws: &SharedWorkspace) -> ServerWsMessage {
  let w = ws.lock().await;
  ServerWsMessage::State { workspace: to_workspace_out(&w, &state.catalog) }
}

#[instrument(level = "info", skip(state, ws, socket))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, ws: &SharedWorkspace, socket: &mut WebSocket) -> bool {
  let reply = match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::GetState => state_message(state, ws).await,

    ClientWsMessage::UpdateConfig { patch } => {
      update_config(ws, patch).await;
      state_message(state, ws).await
    }

    ClientWsMessage::SelectChapters { chapter_ids } => {
      select_chapters(state, ws, chapter_ids).await;
      state_message(state, ws).await
    }

    ClientWsMessage::SelectTopics { topic_ids } => {
      select_topics(state, ws, topic_ids).await;
      state_message(state, ws).await
    }

    ClientWsMessage::UploadFile { file } => match upload_file(ws, &file).await {
      Ok(()) => state_message(state, ws).await,
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::RemoveFile => {
      remove_file(ws).await;
      state_message(state, ws).await
    }

    ClientWsMessage::Generate => {
      if !send(socket, &ServerWsMessage::GenerationStarted).await {
        return false;
      }
      match generate_exam(state, ws).await {
        Ok(result) => {
          info!(target: "exam", count = result.questions.len(), failed = result.alert.is_some(), "WS generate served");
          ServerWsMessage::Generated { result }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::ShowAnswers { show } => {
      set_show_answers(ws, show).await;
      ServerWsMessage::Exam { exam: exam_view(ws, None).await }
    }

    ClientWsMessage::GetExam => ServerWsMessage::Exam { exam: exam_view(ws, None).await },

    ClientWsMessage::ChatSend { text } => {
      let mut events = chat_send(state, ws.clone(), text);
      while let Some(ev) = events.next().await {
        let out = match ev {
          ChatEvent::Started(turn) => ServerWsMessage::ChatStarted { user: turn.user, placeholder_id: turn.placeholder_id },
          ChatEvent::Chunk { id, text } => ServerWsMessage::ChatChunk { id, text },
          ChatEvent::Done(message) => ServerWsMessage::ChatDone { message },
        };
        if !send(socket, &out).await {
          return false;
        }
      }
      return true;
    }

    ClientWsMessage::ChatReset => {
      chat_reset(state, ws).await;
      state_message(state, ws).await
    }
  };
  send(socket, &reply).await
}
