//! HTTP access to the objectives API: task moves and board fetches.

pub mod wire;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::{ObjectiveId, TaskId};
use wire::{BoardResponse, MoveRequest, MoveResult};

/// Status the server uses to refuse a completion that still needs a
/// self-evaluation.
pub const SELF_EVALUATION_REQUIRED_STATUS: u16 = 428;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum MoveError {
    #[error("task {task_id} needs a self-evaluation before it can be completed")]
    SelfEvaluationRequired { task_id: TaskId },
    #[error("server rejected the move with HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("move request timed out: {0}")]
    Timeout(String),
    #[error("move request failed: {0}")]
    Transport(String),
}

impl MoveError {
    pub fn is_self_evaluation_required(&self) -> bool {
        matches!(self, MoveError::SelfEvaluationRequired { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            MoveError::SelfEvaluationRequired { .. } => "SELF_EVALUATION_REQUIRED",
            MoveError::Http { .. } => "SERVER_HTTP_ERROR",
            MoveError::Timeout(_) => "SERVER_TIMEOUT",
            MoveError::Transport(_) => "SERVER_TRANSPORT_ERROR",
        }
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ApiError {
    #[error("server returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("request failed: {0}")]
    Transport(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Http { status: 404, .. } => "NOT_FOUND",
            ApiError::Http { .. } => "SERVER_HTTP_ERROR",
            ApiError::Timeout(_) => "SERVER_TIMEOUT",
            ApiError::Transport(_) => "SERVER_TRANSPORT_ERROR",
            ApiError::Decode(_) => "SERVER_CONTRACT_PARSE_ERROR",
        }
    }
}

#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn move_task(
        &self,
        objective_id: &ObjectiveId,
        request: &MoveRequest,
    ) -> Result<MoveResult, MoveError>;

    async fn fetch_board(
        &self,
        objective_id: &ObjectiveId,
        page_size: u32,
    ) -> Result<BoardResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api/v1".to_string(),
            token: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpBoardApi {
    client: Client,
    config: ApiConfig,
}

impl HttpBoardApi {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(env!("OBJECTIVE_BOARD_USER_AGENT"))
            .build()
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn objective_url(&self, objective_id: &ObjectiveId, suffix: &str) -> String {
        format!(
            "{}/objectives/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(objective_id.as_str()),
            suffix
        )
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.token.as_deref() {
            Some(token) if !token.is_empty() => builder.bearer_auth(token),
            _ => builder,
        }
    }
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn move_task(
        &self,
        objective_id: &ObjectiveId,
        request: &MoveRequest,
    ) -> Result<MoveResult, MoveError> {
        let url = self.objective_url(objective_id, "kanban/move");
        info!(
            %objective_id,
            task_id = %request.task_id,
            from_column = request.from_column.as_str(),
            to_column = request.to_column.as_str(),
            new_position = request.new_position,
            reason = request.reason.as_deref().unwrap_or(""),
            "sending task move"
        );

        let response = self
            .authorize(self.client.patch(&url))
            .json(request)
            .send()
            .await
            .map_err(map_move_transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_move_transport)?;

        debug!(task_id = %request.task_id, status, "move response received");
        classify_move_response(status, &body, &request.task_id)
    }

    async fn fetch_board(
        &self,
        objective_id: &ObjectiveId,
        page_size: u32,
    ) -> Result<BoardResponse, ApiError> {
        let url = format!(
            "{}?per_page={page_size}",
            self.objective_url(objective_id, "kanban")
        );
        debug!(%objective_id, %url, "fetching board");

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(map_fetch_transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_fetch_transport)?;

        if !(200..300).contains(&status) {
            return Err(ApiError::Http {
                status,
                body: body.trim().to_string(),
            });
        }

        serde_json::from_str(&body).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

/// Sorts a move response into success, self-evaluation gate, or failure.
/// Only the status code selects the self-evaluation branch.
pub fn classify_move_response(
    status: u16,
    body: &str,
    task_id: &TaskId,
) -> Result<MoveResult, MoveError> {
    if (200..300).contains(&status) {
        let result = serde_json::from_str::<MoveResult>(body).unwrap_or_else(|err| {
            if !body.trim().is_empty() {
                warn!(%task_id, error = %err, "move succeeded but response body was not understood");
            }
            MoveResult::default()
        });
        return Ok(result);
    }

    if status == SELF_EVALUATION_REQUIRED_STATUS {
        return Err(MoveError::SelfEvaluationRequired {
            task_id: task_id.clone(),
        });
    }

    Err(MoveError::Http {
        status,
        body: body.trim().to_string(),
    })
}

fn map_move_transport(err: reqwest::Error) -> MoveError {
    if err.is_timeout() {
        MoveError::Timeout(err.to_string())
    } else {
        MoveError::Transport(err.to_string())
    }
}

fn map_fetch_transport(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(err.to_string())
    } else {
        ApiError::Transport(err.to_string())
    }
}
