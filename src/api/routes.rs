//! HTTP route handlers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::types::{
    ChatReply, ChatRequest, CreateTaskRequest, ErrorResponse, HealthResponse, SessionView,
    TaskResponse,
};
use crate::agent::{Agent, AgentError, RunOptions};
use crate::conversation::Conversation;

/// One chat session. Turns run one at a time under the session's mutex.
pub struct Session {
    pub conversation: Conversation,
    pub created_at: DateTime<Utc>,
    pub last_active: Instant,
}

impl Session {
    fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            created_at: Utc::now(),
            last_active: Instant::now(),
        }
    }
}

type SessionMap = HashMap<Uuid, Arc<Mutex<Session>>>;

/// Shared application state.
pub struct AppState {
    pub agent: Arc<Agent>,
    pub sessions: RwLock<SessionMap>,
    session_ttl: Duration,
    max_sessions: usize,
}

impl AppState {
    pub fn new(agent: Arc<Agent>) -> Self {
        let config = agent.config();
        let session_ttl = Duration::from_secs(config.session_ttl_secs);
        let max_sessions = config.max_sessions.max(1);
        Self {
            agent,
            sessions: RwLock::new(HashMap::new()),
            session_ttl,
            max_sessions,
        }
    }

    /// Drop idle sessions, then make room for `incoming` more.
    async fn evict(&self, incoming: usize) {
        let mut sessions = self.sessions.write().await;
        let dropped = evict_sessions(
            &mut sessions,
            Instant::now(),
            self.session_ttl,
            self.max_sessions.saturating_sub(incoming),
        );
        if dropped > 0 {
            tracing::info!(dropped, remaining = sessions.len(), "Evicted chat sessions");
        }
    }
}

/// Remove sessions idle for longer than `ttl`, then the least recently
/// active ones until at most `keep` remain. A session whose lock is held is
/// mid-turn and counts as active. Returns how many were removed.
fn evict_sessions(sessions: &mut SessionMap, now: Instant, ttl: Duration, keep: usize) -> usize {
    let before = sessions.len();
    let mut by_activity: Vec<(Uuid, Instant)> = sessions
        .iter()
        .map(|(id, session)| {
            let last = session.try_lock().map(|s| s.last_active).unwrap_or(now);
            (*id, last)
        })
        .collect();

    by_activity.retain(|(id, last)| {
        let expired = now.saturating_duration_since(*last) > ttl;
        if expired {
            sessions.remove(id);
        }
        !expired
    });

    if by_activity.len() > keep {
        by_activity.sort_by_key(|(_, last)| *last);
        let excess = by_activity.len() - keep;
        for (id, _) in by_activity.into_iter().take(excess) {
            sessions.remove(&id);
        }
    }

    before - sessions.len()
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/tools", get(list_tools))
        .route("/api/chat", post(chat))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/tasks", post(create_task))
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn agent_error_response(err: AgentError) -> Response {
    let status = match &err {
        AgentError::Llm(_) | AgentError::EmptyResponse => StatusCode::BAD_GATEWAY,
        AgentError::Conversation(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!("Agent run failed: {}", err);
    error_response(status, err.to_string())
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.sessions.read().await.len(),
    })
}

async fn list_tools(State(state): State<Arc<AppState>>) -> Response {
    Json(state.agent.tools().list_tools()).into_response()
}

async fn chat(State(state): State<Arc<AppState>>, Json(req): Json<ChatRequest>) -> Response {
    if req.message.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "message must not be empty");
    }

    let options = RunOptions {
        model: req.model,
        events: None,
    };

    let Some(session_id) = req.session_id else {
        // The first turn runs before the session is stored, so a failed
        // start leaves nothing behind.
        let mut session = Session::new(state.agent.new_conversation());
        let outcome = match state
            .agent
            .continue_conversation_with(&mut session.conversation, &req.message, options)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return agent_error_response(e),
        };

        let id = Uuid::new_v4();
        let turns = session.conversation.len();
        session.last_active = Instant::now();
        state.evict(1).await;
        state
            .sessions
            .write()
            .await
            .insert(id, Arc::new(Mutex::new(session)));
        tracing::info!(session = %id, "Created chat session");

        return Json(ChatReply {
            session_id: id,
            response: outcome.response,
            status: outcome.status,
            iterations: outcome.iterations,
            turns,
        })
        .into_response();
    };

    state.evict(0).await;
    let Some(session) = state.sessions.read().await.get(&session_id).cloned() else {
        return error_response(StatusCode::NOT_FOUND, format!("unknown session {}", session_id));
    };

    let mut session = session.lock().await;
    session.last_active = Instant::now();
    let result = state
        .agent
        .continue_conversation_with(&mut session.conversation, &req.message, options)
        .await;
    session.last_active = Instant::now();
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => return agent_error_response(e),
    };

    Json(ChatReply {
        session_id,
        response: outcome.response,
        status: outcome.status,
        iterations: outcome.iterations,
        turns: session.conversation.len(),
    })
    .into_response()
}

async fn get_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    let Some(session) = state.sessions.read().await.get(&id).cloned() else {
        return error_response(StatusCode::NOT_FOUND, format!("unknown session {}", id));
    };
    let session = session.lock().await;
    Json(SessionView {
        id,
        created_at: session.created_at.to_rfc3339(),
        turns: session.conversation.messages().to_vec(),
    })
    .into_response()
}

async fn delete_session(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Response {
    match state.sessions.write().await.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => error_response(StatusCode::NOT_FOUND, format!("unknown session {}", id)),
    }
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTaskRequest>,
) -> Response {
    if req.task.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "task must not be empty");
    }

    let options = RunOptions {
        model: req.model,
        events: None,
    };
    match state.agent.run_task_with(&req.task, options).await {
        Ok(outcome) => Json(TaskResponse {
            status: outcome.status,
            response: outcome.response,
            iterations: outcome.iterations,
            usage: outcome.usage,
            log: outcome.log,
        })
        .into_response(),
        Err(e) => agent_error_response(e),
    }
}
