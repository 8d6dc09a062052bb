use crate::entity::{agent, alert_state, event, heartbeat};
use crate::error::{Result, StoreError};
use crate::model::{AlertStatePatch, EventFilter, NewAgent, NewHeartbeat, Page};
use sea_orm::{
    ColumnTrait, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set, Statement,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 审计日志涵盖的事件类型
pub const AUDIT_EVENT_TYPES: [&str; 2] = ["admin_login", "admin_logout"];

/// 最近一次心跳查询：每个 agent 取 ts 最大的一行
const LATEST_HEARTBEATS_SQL: &str = r#"
SELECT h.* FROM heartbeats h
INNER JOIN (
    SELECT agent_id, MAX(ts) AS max_ts FROM heartbeats GROUP BY agent_id
) m ON h.agent_id = m.agent_id AND h.ts = m.max_ts
"#;

/// 遥测存储
///
/// 系统唯一的持久化共享资源：agent 注册表、心跳日志、事件日志与
/// 告警状态都经由这里读写。
pub struct TelemetryStore {
    db: Arc<DatabaseConnection>,
}

impl TelemetryStore {
    /// 连接数据库
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = Database::connect(database_url).await?;
        info!(database_url = %database_url, "Connected to telemetry store");
        Ok(Self { db: Arc::new(db) })
    }

    /// 复用既有连接（测试与组件共享场景）
    pub fn from_connection(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 获取数据库连接
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// 初始化表结构（幂等）
    pub async fn init_schema(&self) -> Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                id TEXT PRIMARY KEY,
                token TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                hostname TEXT,
                ip TEXT,
                os TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS heartbeats (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                agent_id TEXT NOT NULL,
                ts INTEGER NOT NULL,
                cpu_percent REAL,
                mem_used_bytes INTEGER,
                mem_total_bytes INTEGER,
                disk_used_bytes INTEGER,
                disk_total_bytes INTEGER,
                swap_used_bytes INTEGER,
                swap_total_bytes INTEGER,
                uptime_sec INTEGER,
                load_1m REAL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_heartbeats_agent_ts ON heartbeats(agent_id, ts DESC)",
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts INTEGER NOT NULL,
                agent_id TEXT,
                level TEXT NOT NULL,
                type TEXT NOT NULL,
                message TEXT NOT NULL,
                meta_json TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_events_ts ON events(ts DESC)",
            "CREATE INDEX IF NOT EXISTS idx_events_agent ON events(agent_id)",
            r#"
            CREATE TABLE IF NOT EXISTS alert_state (
                alert_id TEXT PRIMARY KEY,
                acked INTEGER NOT NULL DEFAULT 0,
                acked_at INTEGER,
                acked_by TEXT,
                silence_until INTEGER,
                last_notified_at INTEGER,
                updated_at INTEGER NOT NULL
            )
            "#,
        ];

        for sql in statements {
            self.db
                .execute(Statement::from_string(
                    DatabaseBackend::Sqlite,
                    sql.to_string(),
                ))
                .await?;
        }

        debug!("Telemetry store schema initialized");
        Ok(())
    }

    // ========== agent 注册表 ==========

    /// 注册新 agent，生成 id 与承载令牌
    pub async fn register_agent(&self, req: NewAgent, ts: i64) -> Result<agent::Model> {
        self.validate_agent(&req)?;

        let model = agent::Model {
            id: format!("agent_{}", uuid::Uuid::new_v4().simple()),
            token: format!("bcn_{}", uuid::Uuid::new_v4().simple()),
            name: req.name,
            hostname: Some(req.hostname),
            ip: Some(req.ip),
            os: Some(req.os),
            created_at: ts,
            updated_at: ts,
            enabled: 1,
        };

        let active: agent::ActiveModel = model.clone().into();
        agent::Entity::insert(active).exec(&*self.db).await?;

        info!(
            agent_id = %model.id,
            agent_name = %model.name,
            "Agent registered"
        );
        Ok(model)
    }

    /// 按承载令牌查找 agent（仅启用的）
    pub async fn agent_by_token(&self, token: &str) -> Result<Option<agent::Model>> {
        let found = agent::Entity::find()
            .filter(agent::Column::Token.eq(token))
            .filter(agent::Column::Enabled.eq(1))
            .one(&*self.db)
            .await?;
        Ok(found)
    }

    /// 所有启用的 agent
    pub async fn enabled_agents(&self) -> Result<Vec<agent::Model>> {
        let agents = agent::Entity::find()
            .filter(agent::Column::Enabled.eq(1))
            .all(&*self.db)
            .await?;
        Ok(agents)
    }

    /// 更新 agent 的活跃时间戳
    pub async fn touch_agent(&self, agent_id: &str, ts: i64) -> Result<()> {
        let active = agent::ActiveModel {
            id: Set(agent_id.to_string()),
            updated_at: Set(ts),
            ..Default::default()
        };
        match agent::Entity::update(active).exec(&*self.db).await {
            Ok(_) => Ok(()),
            Err(DbErr::RecordNotUpdated) => Err(StoreError::NotFound(agent_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// 停用 agent（不物理删除）
    pub async fn disable_agent(&self, agent_id: &str, ts: i64) -> Result<()> {
        let active = agent::ActiveModel {
            id: Set(agent_id.to_string()),
            enabled: Set(0),
            updated_at: Set(ts),
            ..Default::default()
        };
        match agent::Entity::update(active).exec(&*self.db).await {
            Ok(_) => {
                info!(agent_id = %agent_id, "Agent disabled");
                Ok(())
            }
            Err(DbErr::RecordNotUpdated) => Err(StoreError::NotFound(agent_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    // ========== 心跳日志 ==========

    /// 追加一条心跳样本
    pub async fn insert_heartbeat(
        &self,
        agent_id: &str,
        ts: i64,
        sample: NewHeartbeat,
    ) -> Result<()> {
        let active = heartbeat::ActiveModel {
            agent_id: Set(agent_id.to_string()),
            ts: Set(ts),
            cpu_percent: Set(sample.cpu_percent),
            mem_used_bytes: Set(sample.mem_used_bytes),
            mem_total_bytes: Set(sample.mem_total_bytes),
            disk_used_bytes: Set(sample.disk_used_bytes),
            disk_total_bytes: Set(sample.disk_total_bytes),
            swap_used_bytes: Set(sample.swap_used_bytes),
            swap_total_bytes: Set(sample.swap_total_bytes),
            uptime_sec: Set(sample.uptime_sec),
            load_1m: Set(sample.load_1m),
            ..Default::default()
        };
        heartbeat::Entity::insert(active).exec(&*self.db).await?;

        debug!(agent_id = %agent_id, ts = ts, "Heartbeat recorded");
        Ok(())
    }

    /// 每个 agent 的最近一条心跳
    pub async fn latest_heartbeats(&self) -> Result<Vec<heartbeat::Model>> {
        let stmt =
            Statement::from_string(DatabaseBackend::Sqlite, LATEST_HEARTBEATS_SQL.to_string());
        let rows = heartbeat::Entity::find()
            .from_raw_sql(stmt)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// 心跳总行数
    pub async fn heartbeat_count(&self) -> Result<u64> {
        Ok(heartbeat::Entity::find().count(&*self.db).await?)
    }

    /// 删除早于 cutoff 的心跳，返回删除行数
    pub async fn delete_heartbeats_before(&self, cutoff: i64) -> Result<u64> {
        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "DELETE FROM heartbeats WHERE ts < ?",
            vec![cutoff.into()],
        );
        let result = self.db.execute(stmt).await?;
        Ok(result.rows_affected())
    }

    // ========== 事件日志 ==========

    /// 追加一条事件
    pub async fn append_event(
        &self,
        ts: i64,
        agent_id: Option<&str>,
        level: &str,
        event_type: &str,
        message: &str,
        meta: Option<serde_json::Value>,
    ) -> Result<()> {
        let active = event::ActiveModel {
            ts: Set(ts),
            agent_id: Set(agent_id.map(|s| s.to_string())),
            level: Set(level.to_string()),
            event_type: Set(event_type.to_string()),
            message: Set(message.to_string()),
            meta_json: Set(meta.map(|m| m.to_string())),
            ..Default::default()
        };
        event::Entity::insert(active).exec(&*self.db).await?;
        Ok(())
    }

    /// 分页查询事件（可按级别/类型/agent 过滤，ts 倒序）
    pub async fn events_page(
        &self,
        filter: &EventFilter,
        page: u64,
        page_size: u64,
    ) -> Result<Page<event::Model>> {
        let query = Self::filtered_events(filter);
        let total = query.clone().count(&*self.db).await?;
        let items = query
            .order_by_desc(event::Column::Ts)
            .paginate(&*self.db, page_size)
            .fetch_page(page.saturating_sub(1))
            .await?;
        Ok(Page::new(page, page_size, total, items))
    }

    /// 分页查询审计日志（仅管理登录/登出事件）
    pub async fn audit_page(&self, page: u64, page_size: u64) -> Result<Page<event::Model>> {
        let query = event::Entity::find()
            .filter(event::Column::EventType.is_in(AUDIT_EVENT_TYPES));
        let total = query.clone().count(&*self.db).await?;
        let items = query
            .order_by_desc(event::Column::Ts)
            .paginate(&*self.db, page_size)
            .fetch_page(page.saturating_sub(1))
            .await?;
        Ok(Page::new(page, page_size, total, items))
    }

    /// 审计日志导出（最新 limit 条）
    pub async fn audit_export(&self, limit: u64) -> Result<Vec<event::Model>> {
        let rows = event::Entity::find()
            .filter(event::Column::EventType.is_in(AUDIT_EVENT_TYPES))
            .order_by_desc(event::Column::Ts)
            .limit(limit)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// 指定类型的最近一条事件
    pub async fn last_event_of_type(&self, event_type: &str) -> Result<Option<event::Model>> {
        let row = event::Entity::find()
            .filter(event::Column::EventType.eq(event_type))
            .order_by_desc(event::Column::Ts)
            .one(&*self.db)
            .await?;
        Ok(row)
    }

    /// 事件总行数
    pub async fn event_count(&self) -> Result<u64> {
        Ok(event::Entity::find().count(&*self.db).await?)
    }

    /// 删除早于 cutoff 的事件，返回删除行数
    pub async fn delete_events_before(&self, cutoff: i64) -> Result<u64> {
        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            "DELETE FROM events WHERE ts < ?",
            vec![cutoff.into()],
        );
        let result = self.db.execute(stmt).await?;
        Ok(result.rows_affected())
    }

    // ========== 告警状态 ==========

    /// 全部告警状态（alert_id -> 记录）
    pub async fn alert_states(&self) -> Result<HashMap<String, alert_state::Model>> {
        let rows = alert_state::Entity::find().all(&*self.db).await?;
        Ok(rows.into_iter().map(|r| (r.alert_id.clone(), r)).collect())
    }

    /// 单条告警状态
    pub async fn alert_state(&self, alert_id: &str) -> Result<Option<alert_state::Model>> {
        let row = alert_state::Entity::find_by_id(alert_id.to_string())
            .one(&*self.db)
            .await?;
        Ok(row)
    }

    /// 合并写入告警状态
    ///
    /// 不存在则以默认值懒创建；存在则仅覆盖 patch 中给出的字段，
    /// 其余字段保持既有值。
    pub async fn upsert_alert_state(
        &self,
        alert_id: &str,
        patch: AlertStatePatch,
        ts: i64,
    ) -> Result<alert_state::Model> {
        let prev = self.alert_state(alert_id).await?;

        let merged = alert_state::Model {
            alert_id: alert_id.to_string(),
            acked: patch
                .acked
                .map(i32::from)
                .or(prev.as_ref().map(|p| p.acked))
                .unwrap_or(0),
            acked_at: patch.acked_at.or(prev.as_ref().and_then(|p| p.acked_at)),
            acked_by: patch
                .acked_by
                .or(prev.as_ref().and_then(|p| p.acked_by.clone())),
            silence_until: patch
                .silence_until
                .or(prev.as_ref().and_then(|p| p.silence_until)),
            last_notified_at: patch
                .last_notified_at
                .or(prev.as_ref().and_then(|p| p.last_notified_at)),
            updated_at: ts,
        };

        let stmt = Statement::from_sql_and_values(
            DatabaseBackend::Sqlite,
            r#"
            INSERT INTO alert_state(alert_id, acked, acked_at, acked_by, silence_until, last_notified_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(alert_id) DO UPDATE SET
                acked=excluded.acked,
                acked_at=excluded.acked_at,
                acked_by=excluded.acked_by,
                silence_until=excluded.silence_until,
                last_notified_at=excluded.last_notified_at,
                updated_at=excluded.updated_at
            "#,
            vec![
                merged.alert_id.clone().into(),
                merged.acked.into(),
                merged.acked_at.into(),
                merged.acked_by.clone().into(),
                merged.silence_until.into(),
                merged.last_notified_at.into(),
                merged.updated_at.into(),
            ],
        );
        self.db.execute(stmt).await?;

        debug!(alert_id = %alert_id, "Alert state upserted");
        Ok(merged)
    }

    // ========== 私有辅助方法 ==========

    fn filtered_events(filter: &EventFilter) -> Select<event::Entity> {
        let mut query = event::Entity::find();
        if let Some(level) = &filter.level {
            query = query.filter(event::Column::Level.eq(level.as_str()));
        }
        if let Some(event_type) = &filter.event_type {
            query = query.filter(event::Column::EventType.eq(event_type.as_str()));
        }
        if let Some(agent_id) = &filter.agent_id {
            query = query.filter(event::Column::AgentId.eq(agent_id.as_str()));
        }
        query
    }

    fn validate_agent(&self, req: &NewAgent) -> Result<()> {
        if req.name.is_empty() {
            return Err(StoreError::validation("Agent name cannot be empty"));
        }
        if req.name.len() > 255 {
            return Err(StoreError::validation(
                "Agent name too long (max 255 characters)",
            ));
        }
        Ok(())
    }
}
