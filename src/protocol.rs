//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::chat::ChatStatus;
use crate::domain::{Chapter, ChatMessage, Difficulty, ExamMode, Question, Topic};
use crate::render::RenderedSection;
use crate::state::Workspace;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    GetState,
    UpdateConfig {
        #[serde(flatten)]
        patch: ConfigPatch,
    },
    SelectChapters {
        #[serde(rename = "chapterIds")]
        chapter_ids: Vec<String>,
    },
    SelectTopics {
        #[serde(rename = "topicIds")]
        topic_ids: Vec<String>,
    },
    UploadFile {
        #[serde(flatten)]
        file: FileIn,
    },
    RemoveFile,
    Generate,
    ShowAnswers {
        show: bool,
    },
    GetExam,
    ChatSend {
        text: String,
    },
    ChatReset,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    State {
        workspace: WorkspaceOut,
    },
    GenerationStarted,
    Generated {
        #[serde(flatten)]
        result: GenerateOut,
    },
    Exam {
        #[serde(flatten)]
        exam: ExamOut,
    },
    ChatStarted {
        user: ChatMessage,
        #[serde(rename = "placeholderId")]
        placeholder_id: String,
    },
    ChatChunk {
        id: String,
        text: String,
    },
    ChatDone {
        message: ChatMessage,
    },
    Error {
        message: String,
    },
}

//
// Request DTOs (HTTP bodies, also flattened into WS messages)
//

/// Partial configuration update. Missing fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub mode: Option<ExamMode>,
    #[serde(rename = "numMC")]
    pub num_mc: Option<u32>,
    #[serde(rename = "numTF")]
    pub num_tf: Option<u32>,
    pub num_short: Option<u32>,
    pub num_essay: Option<u32>,
    pub difficulty: Option<Difficulty>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaptersIn {
    pub chapter_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicsIn {
    pub topic_ids: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileIn {
    pub file_name: String,
    #[serde(default)]
    pub mime_type: String,
    pub data_base64: String,
}

impl std::fmt::Debug for FileIn {
    // Never dump the payload into logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileIn")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("data_len", &self.data_base64.len())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct AnswersIn {
    pub show: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExamQuery {
    pub answers: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ChatIn {
    pub text: String,
}

//
// Response DTOs
//

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigOut {
    pub mode: ExamMode,
    #[serde(rename = "numMC")]
    pub num_mc: u32,
    #[serde(rename = "numTF")]
    pub num_tf: u32,
    pub num_short: u32,
    pub num_essay: u32,
    pub difficulty: Difficulty,
    pub file_name: Option<String>,
    pub selected_chapters: Vec<String>,
    pub selected_topics: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOut {
    pub status: ChatStatus,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceOut {
    pub id: String,
    pub config: ConfigOut,
    pub available_topics: Vec<Topic>,
    pub questions: Vec<Question>,
    pub show_answers: bool,
    pub loading: bool,
    pub chat: ChatOut,
}

/// Snapshot of one workspace for the client.
pub fn to_workspace_out(w: &Workspace, catalog: &Catalog) -> WorkspaceOut {
    let c = &w.config;
    WorkspaceOut {
        id: w.id.clone(),
        config: ConfigOut {
            mode: c.mode,
            num_mc: c.num_mc,
            num_tf: c.num_tf,
            num_short: c.num_short,
            num_essay: c.num_essay,
            difficulty: c.difficulty,
            file_name: c.uploaded_file.as_ref().map(|f| f.name.clone()),
            selected_chapters: c.selected_chapters.clone(),
            selected_topics: c.selected_topics.clone(),
        },
        available_topics: catalog.available_topics(&c.selected_chapters).into_iter().cloned().collect(),
        questions: w.questions.clone(),
        show_answers: w.show_answers,
        loading: w.loading,
        chat: ChatOut { status: w.chat.status(), messages: w.chat.messages().to_vec() },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOut {
    pub questions: Vec<Question>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamOut {
    pub show_answers: bool,
    pub sections: Vec<RenderedSection>,
}

/// Result of an HTTP chat turn; `None` when the text was blank or a turn was
/// already streaming.
#[derive(Debug, Serialize)]
pub struct ChatReplyOut {
    pub message: Option<ChatMessage>,
}

#[derive(Serialize)]
pub struct CurriculumOut {
    pub chapters: Vec<Chapter>,
}

#[derive(Serialize)]
pub struct CreatedOut {
    pub id: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub model: Option<String>,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_messages_parse_with_flattened_bodies() {
        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"update_config","mode":"curriculum","numMC":5,"difficulty":"expert"}"#).unwrap();
        match m {
            ClientWsMessage::UpdateConfig { patch } => {
                assert_eq!(patch.mode, Some(ExamMode::Curriculum));
                assert_eq!(patch.num_mc, Some(5));
                assert_eq!(patch.num_tf, None);
                assert_eq!(patch.difficulty, Some(Difficulty::Expert));
            }
            other => panic!("unexpected {other:?}"),
        }

        let m: ClientWsMessage = serde_json::from_str(r#"{"type":"select_chapters","chapterIds":["c1"]}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::SelectChapters { chapter_ids } if chapter_ids == vec!["c1".to_string()]));

        let m: ClientWsMessage =
            serde_json::from_str(r#"{"type":"upload_file","fileName":"a.pdf","mimeType":"application/pdf","dataBase64":"JVBERg=="}"#).unwrap();
        assert!(matches!(m, ClientWsMessage::UploadFile { .. }));
    }

    #[test]
    fn server_messages_are_tagged() {
        let v = serde_json::to_value(ServerWsMessage::ChatChunk { id: "p".into(), text: "x".into() }).unwrap();
        assert_eq!(v["type"], "chat_chunk");
        let v = serde_json::to_value(ServerWsMessage::Generated { result: GenerateOut { questions: vec![], alert: None } }).unwrap();
        assert_eq!(v["type"], "generated");
        assert!(v.get("alert").is_none());
    }
}
