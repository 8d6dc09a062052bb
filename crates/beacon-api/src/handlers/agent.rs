use crate::error::ApiError;
use crate::handlers::AppState;
use axum::{extract::State, http::HeaderMap, Json};
use beacon_core::{now_sec, ChangeEvent};
use beacon_store::{NewAgent, NewHeartbeat};
use serde::{Deserialize, Serialize};

/// 注册请求
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub hostname: Option<String>,
    pub ip: Option<String>,
    pub os: Option<String>,
}

/// 注册响应：id 与承载令牌只在此时返回一次
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub agent_id: String,
    pub token: String,
}

/// 注册新 agent
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let name = require_field(req.name, "name")?;
    let hostname = require_field(req.hostname, "hostname")?;
    let ip = require_field(req.ip, "ip")?;
    let os = require_field(req.os, "os")?;

    let ts = now_sec();
    let agent = state
        .store
        .register_agent(
            NewAgent {
                name: name.clone(),
                hostname,
                ip,
                os,
            },
            ts,
        )
        .await?;

    state
        .store
        .append_event(
            ts,
            Some(&agent.id),
            "info",
            "register",
            &format!("agent registered: {}", name),
            None,
        )
        .await?;
    state.bus.publish(ChangeEvent::AgentRegistered {
        agent_id: agent.id.clone(),
        name,
        ts,
    });

    Ok(Json(RegisterResponse {
        agent_id: agent.id,
        token: agent.token,
    }))
}

/// 接收心跳（agent 承载令牌认证）
pub async fn heartbeat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(sample): Json<NewHeartbeat>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("unauthorized".to_string()))?;

    let agent = state
        .store
        .agent_by_token(token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("unauthorized".to_string()))?;

    let ts = now_sec();
    state.store.insert_heartbeat(&agent.id, ts, sample).await?;
    state.store.touch_agent(&agent.id, ts).await?;
    state
        .store
        .append_event(ts, Some(&agent.id), "info", "heartbeat", "heartbeat received", None)
        .await?;
    state.bus.publish(ChangeEvent::HeartbeatReceived {
        agent_id: agent.id,
        ts,
    });

    Ok(Json(serde_json::json!({ "ok": true })))
}

fn require_field(value: Option<String>, name: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("missing field: {}", name)))
}
