use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 采集端实体
///
/// 注册后永不物理删除，仅通过 enabled 置 0 停用。
pub mod agent {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "agents")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        #[sea_orm(unique)]
        pub token: String,
        pub name: String,
        pub hostname: Option<String>,
        pub ip: Option<String>,
        pub os: Option<String>,
        pub created_at: i64,
        pub updated_at: i64,
        pub enabled: i32,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::heartbeat::Entity")]
        Heartbeat,
    }

    impl Related<super::heartbeat::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Heartbeat.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// 心跳样本实体（append-only，按保留期清理）
pub mod heartbeat {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "heartbeats")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub agent_id: String,
        pub ts: i64,
        pub cpu_percent: Option<f64>,
        pub mem_used_bytes: Option<i64>,
        pub mem_total_bytes: Option<i64>,
        pub disk_used_bytes: Option<i64>,
        pub disk_total_bytes: Option<i64>,
        pub swap_used_bytes: Option<i64>,
        pub swap_total_bytes: Option<i64>,
        pub uptime_sec: Option<i64>,
        pub load_1m: Option<f64>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::agent::Entity",
            from = "Column::AgentId",
            to = "super::agent::Column::Id"
        )]
        Agent,
    }

    impl Related<super::agent::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Agent.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

/// 审计/日志事件实体（append-only，按保留期清理）
pub mod event {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "events")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub ts: i64,
        pub agent_id: Option<String>,
        pub level: String,
        #[sea_orm(column_name = "type")]
        #[serde(rename = "type")]
        pub event_type: String,
        pub message: String,
        pub meta_json: Option<String>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// 告警状态实体
///
/// 键为确定性告警标识 `"<agent_id>:<type>"`，须在条件反复出现与进程
/// 重启之间保持，因此不随保留期清理。
pub mod alert_state {
    use super::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
    #[sea_orm(table_name = "alert_state")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub alert_id: String,
        pub acked: i32,
        pub acked_at: Option<i64>,
        pub acked_by: Option<String>,
        pub silence_until: Option<i64>,
        pub last_notified_at: Option<i64>,
        pub updated_at: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
