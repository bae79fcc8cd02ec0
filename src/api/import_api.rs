// ==========================================
// 供应商价目表管理系统 - 导入 API
// ==========================================
// 职责: 导入配置(Setting/Link/Dict)维护、价目表导入（直接执行或进入后台队列）
// ==========================================

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::import::ImportReport;
use crate::domain::setting::Setting;
use crate::importer::{ImportJob, ImportTaskQueue, SupplierImporter};
use crate::repository::SettingRepository;

/// 导入API响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportApiResponse {
    pub batch_id: String,
    pub total_rows: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub dropped: usize,
    pub failed: usize,
    pub main_created: usize,
    pub main_updated: usize,
    pub stock_refreshed: usize,
    /// 截断后的错误摘要
    pub errors: Vec<String>,
    pub message: String,
    pub elapsed_ms: i64,
}

impl ImportApiResponse {
    fn from_report(report: &ImportReport, error_limit: usize) -> Self {
        let s = &report.summary;
        Self {
            batch_id: report.batch_id.clone(),
            total_rows: s.total_rows,
            created: s.created,
            updated: s.updated,
            skipped: s.skipped,
            dropped: s.dropped,
            failed: s.failed,
            main_created: s.main_created,
            main_updated: s.main_updated,
            stock_refreshed: s.stock_refreshed,
            errors: report.error_summary(error_limit),
            message: report.message(error_limit),
            elapsed_ms: report.elapsed_time.as_millis() as i64,
        }
    }
}

// ==========================================
// ImportApi
// ==========================================
pub struct ImportApi {
    importer: Arc<dyn SupplierImporter>,
    setting_repo: Arc<SettingRepository>,
    queue: ImportTaskQueue,
    error_summary_limit: usize,
}

impl ImportApi {
    /// 创建 ImportApi（需在 tokio 运行时内调用，会启动后台队列）
    pub fn new(
        importer: Arc<dyn SupplierImporter>,
        setting_repo: Arc<SettingRepository>,
        queue_capacity: usize,
        error_summary_limit: usize,
    ) -> Self {
        let queue = ImportTaskQueue::start(importer.clone(), queue_capacity);
        Self {
            importer,
            setting_repo,
            queue,
            error_summary_limit,
        }
    }

    // ==========================================
    // 导入配置
    // ==========================================

    /// 保存导入配置及其 Link/Dict，返回落库后的完整配置
    pub fn create_setting(&self, setting: &Setting) -> ApiResult<Setting> {
        if setting.name.trim().is_empty() {
            return Err(ApiError::InvalidInput("导入配置名称不能为空".to_string()));
        }

        let saved = self.setting_repo.create_setting(setting)?;
        for link in &setting.links {
            let stored = self.setting_repo.upsert_link(
                saved.id,
                link.key,
                link.column.as_deref(),
                link.initial.as_deref(),
            )?;
            for entry in &link.dict {
                self.setting_repo
                    .add_dict_entry(stored.id, &entry.key, &entry.value)?;
            }
        }

        self.get_setting(saved.id)
    }

    pub fn get_setting(&self, setting_id: i64) -> ApiResult<Setting> {
        self.setting_repo
            .find_with_links(setting_id)?
            .ok_or_else(|| ApiError::NotFound(format!("导入配置(id={})不存在", setting_id)))
    }

    pub fn delete_setting(&self, setting_id: i64) -> ApiResult<()> {
        if self.setting_repo.delete_setting(setting_id)? == 0 {
            return Err(ApiError::NotFound(format!("导入配置(id={})不存在", setting_id)));
        }
        Ok(())
    }

    // ==========================================
    // 导入
    // ==========================================

    /// 直接执行导入
    pub async fn import_file(&self, setting_id: i64, file_path: &Path) -> ApiResult<ImportApiResponse> {
        if file_path.as_os_str().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }
        let report = self.importer.import_file(setting_id, file_path).await?;
        Ok(ImportApiResponse::from_report(&report, self.error_summary_limit))
    }

    /// 经后台队列执行导入并等待结果
    pub async fn enqueue_import(
        &self,
        setting_id: i64,
        file_path: PathBuf,
    ) -> ApiResult<ImportApiResponse> {
        if file_path.as_os_str().is_empty() {
            return Err(ApiError::InvalidInput("文件路径不能为空".to_string()));
        }
        let report = self
            .queue
            .run(ImportJob {
                setting_id,
                file_path,
            })
            .await?;
        Ok(ImportApiResponse::from_report(&report, self.error_summary_limit))
    }

    /// 关闭后台队列
    pub async fn shutdown(self) -> ApiResult<()> {
        Ok(self.queue.shutdown().await?)
    }
}
