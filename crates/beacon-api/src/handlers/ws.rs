use crate::handlers::{AppState, ViewQuery};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use beacon_core::now_sec;
use beacon_hub::WsMessage;
use futures::{SinkExt, StreamExt};
use tracing::debug;

/// 升级为推送通道
///
/// 视图级别在升级时解析并固定，整个连接期间不变。
pub async fn upgrade(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(q): Query<ViewQuery>,
) -> Response {
    let ctx = state.view(&headers, q.token.as_deref());
    ws.on_upgrade(move |socket| handle_socket(state, socket, ctx.full))
}

async fn handle_socket(state: AppState, socket: WebSocket, full: bool) {
    let (viewer_id, mut rx) = state.hub.register(full).await;
    let now = now_sec();

    // 问候 + 按视图级别渲染的首帧快照
    state
        .hub
        .send_to(viewer_id, WsMessage::Hello { ts: now, full })
        .await;
    if let Ok(snapshot) = state.aggregator.snapshot(full, now).await {
        state
            .hub
            .send_to(viewer_id, WsMessage::NodeUpdate(snapshot))
            .await;
    }

    let (mut sender, mut receiver) = socket.split();

    // 出站：hub 消息序列化后写到连接；存活探测同时发协议层 ping
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let is_probe = matches!(message, WsMessage::Ping { .. });
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
            if is_probe && sender.send(Message::Ping(Vec::new())).await.is_err() {
                break;
            }
        }
        // hub 逐出或连接断开：关闭底层连接
        let _ = sender.close().await;
    });

    // 入站：pong 或任意文本视为存活确认
    while let Some(Ok(message)) = receiver.next().await {
        match message {
            Message::Pong(_) | Message::Text(_) => state.hub.confirm(viewer_id).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    debug!(viewer_id = %viewer_id, "WebSocket closed");
    state.hub.unregister(viewer_id).await;
    send_task.abort();
}
