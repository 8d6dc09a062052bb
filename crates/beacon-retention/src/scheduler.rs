use std::future::Future;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

/// 任务调度器
///
/// 周期任务（保留清扫、告警通知）注册于此。任务体内的失败只记录
/// 日志，单次迭代出错不会中断调度器或其他任务。
pub struct TaskScheduler {
    scheduler: JobScheduler,
}

impl TaskScheduler {
    /// 创建新的任务调度器
    pub async fn new() -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self { scheduler })
    }

    /// 注册周期任务
    ///
    /// `cron_expression` 为六段 cron（含秒）。
    pub async fn add_task<F, Fut>(
        &self,
        name: &str,
        cron_expression: &str,
        task: F,
    ) -> anyhow::Result<uuid::Uuid>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let task_name = name.to_string();

        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let task = task.clone();
            let task_name = task_name.clone();
            Box::pin(async move {
                if let Err(e) = task().await {
                    error!(task = %task_name, error = %e, "Scheduled task failed");
                }
            })
        })?;

        let job_id = self.scheduler.add(job).await?;
        info!(
            task_name = %name,
            cron = %cron_expression,
            job_id = %job_id,
            "Task scheduled"
        );
        Ok(job_id)
    }

    /// 启动调度器
    pub async fn start(&mut self) -> anyhow::Result<()> {
        self.scheduler.start().await?;
        info!("Task scheduler started");
        Ok(())
    }

    /// 停止调度器
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        self.scheduler.shutdown().await?;
        info!("Task scheduler stopped");
        Ok(())
    }
}
