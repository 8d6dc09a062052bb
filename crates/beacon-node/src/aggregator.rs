use crate::model::{mask_host, mask_ip, mask_name, NodeMetrics, NodeSnapshot, NodeView};
use beacon_store::{agent, heartbeat, Result, TelemetryStore};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 节点聚合器
///
/// 读取启用的 agent 注册表与每个 agent 的最近心跳，合并同一台主机
/// 上的重复 agent，输出带在线状态的逻辑节点列表。
pub struct NodeAggregator {
    store: Arc<TelemetryStore>,
    offline_timeout_sec: i64,
}

impl NodeAggregator {
    pub fn new(store: Arc<TelemetryStore>, offline_timeout_sec: i64) -> Self {
        Self {
            store,
            offline_timeout_sec,
        }
    }

    pub fn offline_timeout_sec(&self) -> i64 {
        self.offline_timeout_sec
    }

    /// 生成当前节点快照
    ///
    /// `full = false` 时对标识字段脱敏；脱敏只作用于展示，分组与
    /// 在线判定始终基于原始值。
    pub async fn snapshot(&self, full: bool, now: i64) -> Result<NodeSnapshot> {
        let agents = self.store.enabled_agents().await?;
        let latest = self.store.latest_heartbeats().await?;

        let raw = build_raw_views(&agents, &latest, now, self.offline_timeout_sec);
        let mut nodes = merge_views(raw);
        if !full {
            mask_views(&mut nodes);
        }

        debug!(nodes = nodes.len(), masked = !full, "Node snapshot built");
        Ok(NodeSnapshot {
            nodes,
            ts: now,
            masked: !full,
        })
    }

    /// 一次底层读取同时渲染完整与脱敏两个级别
    ///
    /// 广播推送使用：保证同一轮推送里所有观察端看到同一份状态。
    pub async fn snapshot_pair(&self, now: i64) -> Result<(NodeSnapshot, NodeSnapshot)> {
        let agents = self.store.enabled_agents().await?;
        let latest = self.store.latest_heartbeats().await?;

        let raw = build_raw_views(&agents, &latest, now, self.offline_timeout_sec);
        let nodes = merge_views(raw);
        let mut masked_nodes = nodes.clone();
        mask_views(&mut masked_nodes);

        Ok((
            NodeSnapshot {
                nodes,
                ts: now,
                masked: false,
            },
            NodeSnapshot {
                nodes: masked_nodes,
                ts: now,
                masked: true,
            },
        ))
    }
}

/// 每个启用的 agent 一条原始视图
///
/// 没有任何心跳的 agent 以注册/更新时间兜底，仍会被列出。
pub fn build_raw_views(
    agents: &[agent::Model],
    latest: &[heartbeat::Model],
    now: i64,
    offline_timeout_sec: i64,
) -> Vec<NodeView> {
    let by_agent: HashMap<&str, &heartbeat::Model> =
        latest.iter().map(|h| (h.agent_id.as_str(), h)).collect();

    agents
        .iter()
        .map(|a| {
            let hb = by_agent.get(a.id.as_str());
            let last_ts = hb.map(|h| h.ts).unwrap_or(a.updated_at);
            // 阈值处取闭区间：恰好等于超时仍算在线
            let online = now - last_ts <= offline_timeout_sec;
            NodeView {
                agent_id: a.id.clone(),
                name: a.name.clone(),
                hostname: a.hostname.clone(),
                ip: a.ip.clone(),
                os: a.os.clone(),
                last_heartbeat_ts: last_ts,
                online,
                metrics: hb.map(|h| NodeMetrics::from(*h)),
                merged_agents: 1,
                merged_names: Vec::new(),
            }
        })
        .collect()
}

/// 合并重复主机：同 IP（缺省时同主机名，再缺省时按 agent id）归并为一个节点
pub fn merge_views(raw: Vec<NodeView>) -> Vec<NodeView> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<NodeView>> = HashMap::new();

    for view in raw {
        let key = group_key(&view);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(view);
    }

    order
        .into_iter()
        .map(|key| {
            let mut members = groups.remove(&key).unwrap_or_default();
            // 代表者：上报内存总量更大（采集更完整）优先，再按心跳时间
            members.sort_by(|a, b| {
                let am = a.metrics.as_ref().and_then(|m| m.mem_total_bytes).unwrap_or(0);
                let bm = b.metrics.as_ref().and_then(|m| m.mem_total_bytes).unwrap_or(0);
                bm.cmp(&am)
                    .then(b.last_heartbeat_ts.cmp(&a.last_heartbeat_ts))
            });

            let online = members.iter().any(|m| m.online);
            let merged_names: Vec<String> = members
                .iter()
                .map(|m| m.name.clone())
                .filter(|n| !n.is_empty())
                .collect();
            let merged_agents = members.len();

            let mut representative = members.swap_remove(0);
            representative.online = online;
            representative.merged_agents = merged_agents;
            representative.merged_names = merged_names;
            representative
        })
        .collect()
}

/// 分组键：IP 优先，占位值回退到主机名，再回退到 agent id
fn group_key(view: &NodeView) -> String {
    match view.ip.as_deref() {
        Some(ip) if !ip.is_empty() && ip != "-" => format!("ip:{}", ip),
        _ => match view.hostname.as_deref() {
            Some(host) if !host.is_empty() => format!("host:{}", host),
            _ => format!("host:{}", view.agent_id),
        },
    }
}

/// 标识字段脱敏（仅展示层，合并之后调用）
pub fn mask_views(nodes: &mut [NodeView]) {
    for node in nodes {
        node.name = mask_name(&node.name);
        node.hostname = Some(mask_host(node.hostname.as_deref()));
        node.ip = Some(mask_ip(node.ip.as_deref()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_store::{NewAgent, NewHeartbeat};

    fn test_agent(id: &str, name: &str, ip: Option<&str>, updated_at: i64) -> agent::Model {
        agent::Model {
            id: id.to_string(),
            token: format!("bcn_{}", id),
            name: name.to_string(),
            hostname: Some(format!("{}.local", name)),
            ip: ip.map(|s| s.to_string()),
            os: Some("linux".to_string()),
            created_at: updated_at,
            updated_at,
            enabled: 1,
        }
    }

    fn test_heartbeat(agent_id: &str, ts: i64, mem_total: Option<i64>) -> heartbeat::Model {
        heartbeat::Model {
            id: 0,
            agent_id: agent_id.to_string(),
            ts,
            cpu_percent: Some(10.0),
            mem_used_bytes: Some(1024),
            mem_total_bytes: mem_total,
            disk_used_bytes: None,
            disk_total_bytes: None,
            swap_used_bytes: None,
            swap_total_bytes: None,
            uptime_sec: Some(3600),
            load_1m: None,
        }
    }

    #[test]
    fn test_merge_same_ip_counts_members() {
        let agents = vec![
            test_agent("agent_1", "host-metal", Some("10.0.0.5"), 900),
            test_agent("agent_2", "host-docker", Some("10.0.0.5"), 900),
            test_agent("agent_3", "host-vm", Some("10.0.0.5"), 900),
        ];
        let latest = vec![
            test_heartbeat("agent_1", 1000, Some(64 << 30)),
            test_heartbeat("agent_2", 1010, Some(4 << 30)),
            test_heartbeat("agent_3", 990, None),
        ];

        let raw = build_raw_views(&agents, &latest, 1020, 45);
        let merged = merge_views(raw);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].merged_agents, 3);
        assert_eq!(merged[0].merged_names.len(), 3);
        // 内存总量最大者作为代表
        assert_eq!(merged[0].agent_id, "agent_1");

        // 输入顺序打乱后合并结果不变
        let raw = build_raw_views(&agents, &latest, 1020, 45);
        let mut shuffled = raw;
        shuffled.reverse();
        let merged2 = merge_views(shuffled);
        assert_eq!(merged2.len(), 1);
        assert_eq!(merged2[0].merged_agents, 3);
        assert_eq!(merged2[0].agent_id, "agent_1");
    }

    #[test]
    fn test_group_online_if_any_member_online() {
        let agents = vec![
            test_agent("agent_1", "a", Some("10.0.0.5"), 0),
            test_agent("agent_2", "b", Some("10.0.0.5"), 0),
        ];
        let latest = vec![
            test_heartbeat("agent_1", 100, None), // 早已超时
            test_heartbeat("agent_2", 990, None), // 在线
        ];

        let raw = build_raw_views(&agents, &latest, 1000, 45);
        assert!(!raw[0].online);
        assert!(raw[1].online);

        let merged = merge_views(raw);
        assert_eq!(merged.len(), 1);
        assert!(merged[0].online);
    }

    #[test]
    fn test_online_boundary_inclusive() {
        let agents = vec![test_agent("agent_1", "a", Some("10.0.0.5"), 0)];

        // 恰好在阈值上：在线
        let latest = vec![test_heartbeat("agent_1", 955, None)];
        let raw = build_raw_views(&agents, &latest, 1000, 45);
        assert!(raw[0].online);

        // 再过一秒：离线
        let raw = build_raw_views(&agents, &latest, 1001, 45);
        assert!(!raw[0].online);
    }

    #[test]
    fn test_agent_without_heartbeat_uses_updated_at() {
        let agents = vec![test_agent("agent_1", "fresh", Some("10.0.0.9"), 980)];
        let raw = build_raw_views(&agents, &[], 1000, 45);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].last_heartbeat_ts, 980);
        // 刚注册仍在窗口内
        assert!(raw[0].online);
        assert!(raw[0].metrics.is_none());

        let raw = build_raw_views(&agents, &[], 2000, 45);
        assert!(!raw[0].online);
    }

    #[test]
    fn test_fallback_grouping_keys() {
        let mut no_ip = test_agent("agent_1", "a", None, 900);
        no_ip.hostname = Some("shared-host".to_string());
        let mut dash_ip = test_agent("agent_2", "b", Some("-"), 900);
        dash_ip.hostname = Some("shared-host".to_string());
        let mut bare = test_agent("agent_3", "c", None, 900);
        bare.hostname = None;

        let raw = build_raw_views(&[no_ip, dash_ip, bare], &[], 910, 45);
        let merged = merge_views(raw);
        // 前两个按主机名归并，第三个回退到 agent id 自成一组
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].merged_agents, 2);
        assert_eq!(merged[1].merged_agents, 1);
    }

    #[test]
    fn test_masking_does_not_change_grouping() {
        let agents = vec![
            test_agent("agent_1", "alpha", Some("10.0.0.5"), 900),
            test_agent("agent_2", "beta", Some("10.0.0.5"), 900),
            test_agent("agent_3", "gamma", Some("10.0.0.6"), 900),
        ];
        let latest = vec![
            test_heartbeat("agent_1", 1000, Some(1024)),
            test_heartbeat("agent_2", 1010, None),
            test_heartbeat("agent_3", 1010, None),
        ];

        let full = merge_views(build_raw_views(&agents, &latest, 1020, 45));
        let mut masked = merge_views(build_raw_views(&agents, &latest, 1020, 45));
        mask_views(&mut masked);

        assert_eq!(full.len(), masked.len());
        for (f, m) in full.iter().zip(masked.iter()) {
            assert_eq!(f.online, m.online);
            assert_eq!(f.merged_agents, m.merged_agents);
            assert_ne!(f.ip, m.ip);
        }
        assert_eq!(masked[0].ip.as_deref(), Some("10.0.*.*"));
    }

    #[tokio::test]
    async fn test_snapshot_excludes_disabled_agents() {
        let store = Arc::new(
            TelemetryStore::connect("sqlite::memory:").await.unwrap(),
        );
        store.init_schema().await.unwrap();

        let a = store
            .register_agent(
                NewAgent {
                    name: "web-01".to_string(),
                    hostname: "web-01.local".to_string(),
                    ip: "192.168.1.10".to_string(),
                    os: "linux".to_string(),
                },
                1000,
            )
            .await
            .unwrap();
        let b = store
            .register_agent(
                NewAgent {
                    name: "db-01".to_string(),
                    hostname: "db-01.local".to_string(),
                    ip: "192.168.1.20".to_string(),
                    os: "linux".to_string(),
                },
                1000,
            )
            .await
            .unwrap();
        store
            .insert_heartbeat(&a.id, 1000, NewHeartbeat::default())
            .await
            .unwrap();
        store
            .insert_heartbeat(&b.id, 1000, NewHeartbeat::default())
            .await
            .unwrap();
        store.disable_agent(&b.id, 1001).await.unwrap();

        let aggregator = NodeAggregator::new(store, 45);
        let snapshot = aggregator.snapshot(true, 1010).await.unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].agent_id, a.id);
        assert!(!snapshot.masked);

        let masked = aggregator.snapshot(false, 1010).await.unwrap();
        assert!(masked.masked);
        assert_eq!(masked.nodes[0].ip.as_deref(), Some("192.168.*.*"));
    }
}
