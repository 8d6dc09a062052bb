use beacon_node::NodeView;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// 单个目标的探测超时；超时视为不健康而不是悬挂
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// 单次探测结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub healthy: bool,
    pub latency_ms: Option<i64>,
    pub status: Option<u16>,
}

impl ProbeResult {
    fn unhealthy() -> Self {
        Self {
            healthy: false,
            latency_ms: None,
            status: None,
        }
    }
}

/// 节点一行的 provider 可用性
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub healthy: bool,
    pub latency_ms: Option<i64>,
}

/// provider 可用性矩阵中的一行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeProviderStatus {
    pub agent_id: String,
    pub name: String,
    pub online: bool,
    pub providers: Vec<ProviderStatus>,
}

/// provider 健康探测器
///
/// 目标集合在进程启动时注入，探测结果不缓存跨重启。
pub struct ProviderProbe {
    targets: HashMap<String, String>,
    client: reqwest::Client,
}

impl ProviderProbe {
    pub fn new(targets: HashMap<String, String>) -> Self {
        Self {
            targets,
            client: reqwest::Client::new(),
        }
    }

    pub fn targets(&self) -> &HashMap<String, String> {
        &self.targets
    }

    /// 目标名称（固定顺序）
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.targets.keys().cloned().collect();
        names.sort();
        names
    }

    /// 探测所有目标一次
    pub async fn probe_all(&self) -> HashMap<String, ProbeResult> {
        let mut out = HashMap::new();
        for (name, url) in &self.targets {
            let start = Instant::now();
            let result = match self
                .client
                .get(url)
                .timeout(PROBE_TIMEOUT)
                .send()
                .await
            {
                Ok(resp) => ProbeResult {
                    healthy: resp.status().is_success(),
                    latency_ms: Some(start.elapsed().as_millis() as i64),
                    status: Some(resp.status().as_u16()),
                },
                Err(_) => ProbeResult::unhealthy(),
            };
            debug!(provider = %name, healthy = result.healthy, "Provider probed");
            out.insert(name.clone(), result);
        }
        out
    }

    /// 按节点展开的可用性矩阵：离线节点一律视为不可用
    pub fn matrix(
        &self,
        probes: &HashMap<String, ProbeResult>,
        nodes: &[NodeView],
    ) -> Vec<NodeProviderStatus> {
        let names = self.provider_names();
        nodes
            .iter()
            .map(|n| NodeProviderStatus {
                agent_id: n.agent_id.clone(),
                name: n.name.clone(),
                online: n.online,
                providers: names
                    .iter()
                    .map(|p| {
                        let probe = probes.get(p);
                        ProviderStatus {
                            provider: p.clone(),
                            healthy: n.online && probe.map(|r| r.healthy).unwrap_or(false),
                            latency_ms: if n.online {
                                probe.and_then(|r| r.latency_ms)
                            } else {
                                None
                            },
                        }
                    })
                    .collect(),
            })
            .collect()
    }
}
