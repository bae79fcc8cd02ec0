// ==========================================
// 供应商价目表管理系统 - 品类解析器
// ==========================================
// 输入: "Tools > Power > Drills" 形式的原始路径
// 规则: 按分隔符切分、逐段 trim、忽略空段、超过最大层级截断
// 输出: 叶子节点；沿途节点按 (parent, name) 获取或创建，公共前缀复用
// ==========================================

use crate::domain::catalog::{Category, CATEGORY_PATH_SEPARATOR};
use crate::repository::{CatalogRepository, RepositoryResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

pub struct CategoryResolver {
    repo: Arc<CatalogRepository>,
    delimiter: String,
    max_depth: usize,
    cache: HashMap<String, Category>, // 规范路径 → 节点
}

impl CategoryResolver {
    pub fn new(repo: Arc<CatalogRepository>, delimiter: &str, max_depth: usize) -> Self {
        let delimiter = if delimiter.trim().is_empty() {
            ">".to_string()
        } else {
            delimiter.trim().to_string()
        };
        Self {
            repo,
            delimiter,
            max_depth: max_depth.max(1),
            cache: HashMap::new(),
        }
    }

    /// 切分原始路径为有效段
    pub fn split_path(&self, raw: &str) -> Vec<String> {
        let mut segments: Vec<String> = raw
            .split(self.delimiter.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if segments.len() > self.max_depth {
            warn!(
                path = raw,
                depth = segments.len(),
                max_depth = self.max_depth,
                "品类层级超出上限，已截断"
            );
            segments.truncate(self.max_depth);
        }
        segments
    }

    /// 解析为叶子节点；无有效段返回 None
    pub fn resolve(&mut self, raw: &str) -> RepositoryResult<Option<Category>> {
        let segments = self.split_path(raw);
        if segments.is_empty() {
            return Ok(None);
        }

        let mut parent: Option<Category> = None;
        let mut path = String::new();
        for segment in &segments {
            if !path.is_empty() {
                path.push_str(CATEGORY_PATH_SEPARATOR);
            }
            path.push_str(segment);

            let node = match self.cache.get(&path) {
                Some(node) => node.clone(),
                None => {
                    let node = match self.repo.find_category_by_path(&path)? {
                        Some(found) => found,
                        None => self
                            .repo
                            .get_or_create_category(segment, parent.as_ref(), &path)?,
                    };
                    self.cache.insert(path.clone(), node.clone());
                    node
                }
            };
            parent = Some(node);
        }
        Ok(parent)
    }

    /// 批量解析，返回 原始值(trim) → 叶子品类
    pub fn resolve_batch<'a, I>(&mut self, paths: I) -> RepositoryResult<HashMap<String, Category>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = HashMap::new();
        for raw in paths {
            let key = raw.trim();
            if resolved.contains_key(key) {
                continue;
            }
            if let Some(leaf) = self.resolve(raw)? {
                resolved.insert(key.to_string(), leaf);
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn repo() -> Arc<CatalogRepository> {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        Arc::new(CatalogRepository::from_connection(Arc::new(Mutex::new(conn))))
    }

    #[test]
    fn test_split_trims_and_skips_empty() {
        let resolver = CategoryResolver::new(repo(), ">", 10);
        assert_eq!(
            resolver.split_path(" Tools >> Power >  Drills "),
            vec!["Tools", "Power", "Drills"]
        );
        assert!(resolver.split_path(" > ").is_empty());
    }

    #[test]
    fn test_depth_is_capped() {
        let resolver = CategoryResolver::new(repo(), "/", 2);
        assert_eq!(resolver.split_path("a/b/c/d"), vec!["a", "b"]);
    }

    #[test]
    fn test_shared_prefix_reuses_nodes() {
        let repo = repo();
        let mut resolver = CategoryResolver::new(repo.clone(), ">", 10);

        let c = resolver.resolve("A > B > C").unwrap().unwrap();
        let d = resolver.resolve("A>B>D").unwrap().unwrap();

        assert_eq!(c.parent_id, d.parent_id);
        assert_eq!(c.depth, 3);
        assert_eq!(d.path, "A > B > D");
        assert_eq!(repo.count_categories().unwrap(), 4);

        let a = repo.find_category_by_path("A").unwrap().unwrap();
        let descendants = repo.find_category_descendants(&a).unwrap();
        assert_eq!(descendants.len(), 3);
    }
}
