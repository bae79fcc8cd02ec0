// ==========================================
// 供应商价目表管理系统 - 后台导入队列
// ==========================================
// 模型: tokio mpsc 通道 + 单个 worker（导入串行执行）
// 结果: 每个任务通过 oneshot 通道返回 ImportReport
// 退出: 所有发送端释放后 worker 自动结束
// ==========================================

use crate::domain::import::ImportReport;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::SupplierImporter;
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// 队列默认容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// 导入任务
#[derive(Debug, Clone)]
pub struct ImportJob {
    pub setting_id: i64,
    pub file_path: PathBuf,
}

struct QueuedJob {
    job: ImportJob,
    reply: oneshot::Sender<ImportResult<ImportReport>>,
}

// ==========================================
// ImportWorker - 单 worker 消费者
// ==========================================
struct ImportWorker {
    importer: Arc<dyn SupplierImporter>,
}

impl ImportWorker {
    async fn run(self, mut rx: mpsc::Receiver<QueuedJob>) {
        tracing::info!("导入队列 worker 启动");

        while let Some(QueuedJob { job, reply }) = rx.recv().await {
            let result = self
                .importer
                .import_file(job.setting_id, &job.file_path)
                .await;
            if let Err(e) = &result {
                tracing::error!(
                    setting_id = job.setting_id,
                    file = %job.file_path.display(),
                    error = %e,
                    "导入任务失败"
                );
            }
            if reply.send(result).is_err() {
                tracing::debug!(setting_id = job.setting_id, "调用方已放弃等待导入结果");
            }
        }

        tracing::info!("导入队列已关闭，worker 退出");
    }
}

// ==========================================
// ImportTaskQueue - 队列句柄
// ==========================================
pub struct ImportTaskQueue {
    tx: mpsc::Sender<QueuedJob>,
    worker: JoinHandle<()>,
}

impl ImportTaskQueue {
    /// 启动队列（需在 tokio 运行时内调用）
    pub fn start(importer: Arc<dyn SupplierImporter>, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(ImportWorker { importer }.run(rx));
        Self { tx, worker }
    }

    /// 提交任务，返回结果接收端
    pub async fn submit(
        &self,
        job: ImportJob,
    ) -> ImportResult<oneshot::Receiver<ImportResult<ImportReport>>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(QueuedJob { job, reply })
            .await
            .map_err(|_| ImportError::QueueClosed)?;
        Ok(rx)
    }

    /// 提交并等待结果
    pub async fn run(&self, job: ImportJob) -> ImportResult<ImportReport> {
        let rx = self.submit(job).await?;
        rx.await.map_err(|_| ImportError::QueueClosed)?
    }

    /// 批量提交并按提交顺序收集结果（执行仍是串行的）
    pub async fn run_all(&self, jobs: Vec<ImportJob>) -> Vec<ImportResult<ImportReport>> {
        let mut pending = Vec::with_capacity(jobs.len());
        for job in jobs {
            pending.push(self.submit(job).await);
        }
        join_all(pending.into_iter().map(|submitted| async move {
            match submitted {
                Ok(rx) => rx.await.unwrap_or(Err(ImportError::QueueClosed)),
                Err(e) => Err(e),
            }
        }))
        .await
    }

    /// 关闭队列并等待 worker 处理完已提交的任务
    pub async fn shutdown(self) -> ImportResult<()> {
        drop(self.tx);
        self.worker
            .await
            .map_err(|e| ImportError::InternalError(format!("导入 worker 异常退出: {}", e)))
    }
}
