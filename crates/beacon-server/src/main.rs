use anyhow::Result;
use beacon_alert::{AlertEngine, AlertNotifier, AlertThresholds};
use beacon_api::{create_router, AppState};
use beacon_auth::SessionAuth;
use beacon_config::{ConfigLoader, GlobalConfig, NotifyConfig};
use beacon_core::{now_sec, ChangeEvent, EventBus};
use beacon_hub::{BroadcastHub, EventNotice, WsMessage};
use beacon_node::NodeAggregator;
use beacon_notify::{Notifier, TelegramConfig, TelegramNotifier, WebhookConfig, WebhookNotifier};
use beacon_probe::ProviderProbe;
use beacon_retention::{RetentionManager, RetentionPolicy, TaskScheduler};
use beacon_store::TelemetryStore;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

/// 观察端存活扫描周期（秒）
const LIVENESS_INTERVAL_SEC: u64 = 10;
/// 告警通知周期：每 30 秒
const NOTIFIER_CRON: &str = "*/30 * * * * *";
/// 保留清扫周期：每 6 小时
const RETENTION_CRON: &str = "0 0 */6 * * *";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "beacon.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    info!("Starting BEACON monitor with config: {}", args.config);

    let config = ConfigLoader::new(&args.config).load()?;
    let state = build_state(&config).await?;

    spawn_broadcast_forwarder(state.clone());
    state.hub.clone().start_liveness(LIVENESS_INTERVAL_SEC);

    let mut scheduler = TaskScheduler::new().await?;
    let retention = state.retention.clone();
    scheduler
        .add_task("retention-sweep", RETENTION_CRON, move || {
            let retention = retention.clone();
            async move {
                retention.sweep(now_sec()).await?;
                Ok(())
            }
        })
        .await?;
    let notifier = state.notifier.clone();
    scheduler
        .add_task("alert-notifier", NOTIFIER_CRON, move || {
            let notifier = notifier.clone();
            async move {
                notifier.run_once(now_sec()).await?;
                Ok(())
            }
        })
        .await?;
    scheduler.start().await?;

    let token_state = if state.auth.token_required() { "enabled" } else { "disabled" };
    let notify_state = if state.notifier.is_enabled() { "enabled" } else { "disabled" };
    let provider_state = if state.notifier.provider_configured() {
        "configured"
    } else {
        "not-configured"
    };
    info!(
        port = config.server.port,
        db = %config.server.db_path,
        "BEACON server listening"
    );
    info!(
        dashboard_token = token_state,
        notify = notify_state,
        notify_provider = provider_state,
        "Access control and notification status"
    );

    let router = create_router(state);
    let listener =
        tokio::net::TcpListener::bind(("0.0.0.0", config.server.port)).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

/// 构建并注入全部组件
async fn build_state(config: &GlobalConfig) -> Result<AppState> {
    let db_url = format!("sqlite://{}?mode=rwc", config.server.db_path);
    let store = Arc::new(TelemetryStore::connect(&db_url).await?);
    store.init_schema().await?;

    let aggregator = Arc::new(NodeAggregator::new(
        store.clone(),
        config.monitor.offline_timeout_sec,
    ));

    let thresholds = AlertThresholds {
        cpu_high: config.alerts.cpu_high,
        mem_high: config.alerts.mem_high,
        disk_high: config.alerts.disk_high,
        stale_sec: config.effective_stale_sec(),
        offline_sec: config.monitor.offline_timeout_sec,
    };
    let alerts = Arc::new(AlertEngine::new(
        store.clone(),
        aggregator.clone(),
        thresholds,
    ));

    let notifier = Arc::new(AlertNotifier::new(
        alerts.clone(),
        store.clone(),
        build_notify_provider(&config.notify),
        config.notify.enabled,
        config.notify.min_interval_sec,
    ));

    let auth = Arc::new(SessionAuth::new(
        config.session_secret(),
        config.auth.session_ttl_sec,
        config.auth.admin_user.clone(),
        config.auth.admin_pass.clone(),
        config.auth.dashboard_token.clone(),
    ));

    Ok(AppState {
        store: store.clone(),
        aggregator,
        alerts,
        notifier,
        hub: Arc::new(BroadcastHub::new()),
        auth,
        probe: Arc::new(ProviderProbe::new(config.providers.clone())),
        retention: Arc::new(RetentionManager::new(
            store,
            RetentionPolicy::new(
                config.retention.events_days,
                config.retention.heartbeats_days,
            ),
        )),
        bus: EventBus::new(256),
        db_path: config.server.db_path.clone(),
        started_at: now_sec(),
    })
}

/// 选择外发通知渠道：Telegram 优先，其次通用 webhook
fn build_notify_provider(config: &NotifyConfig) -> Option<Arc<dyn Notifier>> {
    if let (Some(bot_token), Some(chat_id)) = (
        config.telegram_bot_token.clone().filter(|s| !s.is_empty()),
        config.telegram_chat_id.clone().filter(|s| !s.is_empty()),
    ) {
        return Some(Arc::new(TelegramNotifier::new(TelegramConfig {
            bot_token,
            chat_id,
        })));
    }
    if let Some(url) = config.webhook_url.clone().filter(|s| !s.is_empty()) {
        return Some(Arc::new(WebhookNotifier::new(WebhookConfig {
            url,
            headers: None,
        })));
    }
    None
}

/// 状态变更事件转发：采集入口发布，广播中心推送
///
/// 每次变更先推事件摘要，再以同一次读取为全部观察端渲染各自
/// 视图级别的节点快照。
fn spawn_broadcast_forwarder(state: AppState) {
    tokio::spawn(async move {
        let mut rx = state.bus.subscribe();
        loop {
            let event = match rx.recv().await {
                Ok(event) => event,
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    error!(skipped = skipped, "Broadcast forwarder lagged");
                    continue;
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            };

            state
                .hub
                .broadcast(WsMessage::EventNew(notice_for(&event)))
                .await;

            match state.aggregator.snapshot_pair(now_sec()).await {
                Ok((full, masked)) => state.hub.broadcast_snapshots(full, masked).await,
                Err(e) => error!(error = %e, "Failed to render broadcast snapshot"),
            }
        }
    });
}

fn notice_for(event: &ChangeEvent) -> EventNotice {
    match event {
        ChangeEvent::AgentRegistered { agent_id, name, ts } => EventNotice {
            ts: *ts,
            agent_id: Some(agent_id.clone()),
            level: "info".to_string(),
            event_type: "register".to_string(),
            message: format!("agent registered: {}", name),
        },
        ChangeEvent::HeartbeatReceived { agent_id, ts } => EventNotice {
            ts: *ts,
            agent_id: Some(agent_id.clone()),
            level: "info".to_string(),
            event_type: "heartbeat".to_string(),
            message: "heartbeat received".to_string(),
        },
    }
}
