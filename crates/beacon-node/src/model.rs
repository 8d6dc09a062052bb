use beacon_store::heartbeat;
use serde::{Deserialize, Serialize};

/// 节点最近一次上报的指标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
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

impl From<&heartbeat::Model> for NodeMetrics {
    fn from(hb: &heartbeat::Model) -> Self {
        Self {
            cpu_percent: hb.cpu_percent,
            mem_used_bytes: hb.mem_used_bytes,
            mem_total_bytes: hb.mem_total_bytes,
            disk_used_bytes: hb.disk_used_bytes,
            disk_total_bytes: hb.disk_total_bytes,
            swap_used_bytes: hb.swap_used_bytes,
            swap_total_bytes: hb.swap_total_bytes,
            uptime_sec: hb.uptime_sec,
            load_1m: hb.load_1m,
        }
    }
}

/// 逻辑节点视图（合并去重后，每台物理/虚拟主机一条）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeView {
    pub agent_id: String,
    pub name: String,
    pub hostname: Option<String>,
    pub ip: Option<String>,
    pub os: Option<String>,
    pub last_heartbeat_ts: i64,
    pub online: bool,
    pub metrics: Option<NodeMetrics>,
    /// 合并进该节点的原始 agent 数量
    pub merged_agents: usize,
    pub merged_names: Vec<String>,
}

/// 节点快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub nodes: Vec<NodeView>,
    pub ts: i64,
    pub masked: bool,
}

/// IP 脱敏：保留前两段
pub fn mask_ip(ip: Option<&str>) -> String {
    match ip {
        None | Some("") => "-".to_string(),
        Some(s) => {
            let parts: Vec<&str> = s.split('.').collect();
            if parts.len() == 4 {
                format!("{}.{}.*.*", parts[0], parts[1])
            } else {
                "***".to_string()
            }
        }
    }
}

/// 主机名脱敏：保留前两字符和末字符
pub fn mask_host(hostname: Option<&str>) -> String {
    match hostname {
        None | Some("") => "-".to_string(),
        Some(s) => {
            let chars: Vec<char> = s.chars().collect();
            if chars.len() <= 3 {
                format!("{}**", chars[0])
            } else {
                let head: String = chars[..2].iter().collect();
                format!("{}***{}", head, chars[chars.len() - 1])
            }
        }
    }
}

/// 显示名脱敏：保留首末字符
pub fn mask_name(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    match chars.len() {
        0 => "-".to_string(),
        1 | 2 => format!("{}*", chars[0]),
        _ => format!("{}***{}", chars[0], chars[chars.len() - 1]),
    }
}
