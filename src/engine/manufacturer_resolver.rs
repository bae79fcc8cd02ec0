// ==========================================
// 供应商价目表管理系统 - 厂商解析器
// ==========================================
// 匹配顺序（命中即止）:
//   1. 规范名称精确匹配（忽略大小写）
//   2. 别名字典精确匹配（忽略大小写）
//   3. 模糊匹配（normalized Levenshtein ≥ 阈值）→ 写入别名
//   4. 创建新规范厂商
// 缓存: 一个导入批次内同一原始值只解析一次
// ==========================================

use crate::domain::catalog::Manufacturer;
use crate::repository::{CatalogRepository, RepositoryResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// 命中层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Alias,
    Fuzzy,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufacturerMatch {
    pub manufacturer_id: i64,
    pub tier: MatchTier,
}

/// 名称相似度（小写后的 normalized Levenshtein，0~1）
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

// ==========================================
// ManufacturerResolver
// ==========================================
pub struct ManufacturerResolver {
    repo: Arc<CatalogRepository>,
    threshold: f64,
    canonical: Vec<Manufacturer>,     // 按 id 升序
    by_name: HashMap<String, i64>,    // 小写名称 → id
    aliases: HashMap<String, i64>,    // 小写别名 → id
    cache: HashMap<String, ManufacturerMatch>,
}

impl ManufacturerResolver {
    /// 载入全部规范厂商与别名
    pub fn load(repo: Arc<CatalogRepository>, threshold: f64) -> RepositoryResult<Self> {
        let canonical = repo.list_manufacturers()?;
        let mut by_name = HashMap::new();
        for m in &canonical {
            by_name.entry(m.name.to_lowercase()).or_insert(m.id);
        }
        let aliases = repo
            .list_manufacturer_aliases()?
            .into_iter()
            .map(|a| (a.alias.to_lowercase(), a.manufacturer_id))
            .collect();

        Ok(Self {
            repo,
            threshold,
            canonical,
            by_name,
            aliases,
            cache: HashMap::new(),
        })
    }

    /// 解析单个原始厂商名；空白返回 None
    pub fn resolve(&mut self, raw: &str) -> RepositoryResult<Option<ManufacturerMatch>> {
        let name = raw.trim();
        if name.is_empty() {
            return Ok(None);
        }
        let key = name.to_lowercase();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Some(*hit));
        }

        let hit = self.resolve_uncached(name, &key)?;
        self.cache.insert(key, hit);
        Ok(Some(hit))
    }

    /// 批量解析，返回 原始值(trim) → 厂商 id
    pub fn resolve_batch<'a, I>(&mut self, names: I) -> RepositoryResult<HashMap<String, i64>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut resolved = HashMap::new();
        for raw in names {
            if let Some(hit) = self.resolve(raw)? {
                resolved.insert(raw.trim().to_string(), hit.manufacturer_id);
            }
        }
        Ok(resolved)
    }

    fn resolve_uncached(&mut self, name: &str, key: &str) -> RepositoryResult<ManufacturerMatch> {
        if let Some(&id) = self.by_name.get(key) {
            return Ok(ManufacturerMatch {
                manufacturer_id: id,
                tier: MatchTier::Exact,
            });
        }
        if let Some(&id) = self.aliases.get(key) {
            return Ok(ManufacturerMatch {
                manufacturer_id: id,
                tier: MatchTier::Alias,
            });
        }

        if let Some((best, score)) = self.best_fuzzy(key) {
            let alias = self.repo.create_manufacturer_alias(name, best.id)?;
            self.aliases.insert(key.to_string(), alias.manufacturer_id);
            info!(
                alias = name,
                manufacturer = %best.name,
                score,
                "厂商模糊匹配命中，已写入别名"
            );
            return Ok(ManufacturerMatch {
                manufacturer_id: alias.manufacturer_id,
                tier: MatchTier::Fuzzy,
            });
        }

        let created = self.repo.create_manufacturer(name)?;
        debug!(manufacturer_id = created.id, name, "新建厂商");
        self.by_name.insert(key.to_string(), created.id);
        self.canonical.push(created.clone());
        Ok(ManufacturerMatch {
            manufacturer_id: created.id,
            tier: MatchTier::Created,
        })
    }

    /// 得分最高者；同分取 id 较小者
    fn best_fuzzy(&self, key: &str) -> Option<(Manufacturer, f64)> {
        let mut best: Option<(&Manufacturer, f64)> = None;
        for m in &self.canonical {
            let score = similarity(key, &m.name);
            if score < self.threshold {
                continue;
            }
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((m, score));
            }
        }
        best.map(|(m, score)| (m.clone(), score))
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
    fn test_similarity_case_insensitive() {
        assert_eq!(similarity("BOSCH", "bosch"), 1.0);
        assert!(similarity("Makitta", "Makita") >= 0.85);
        assert!(similarity("Metabo", "Makita") < 0.85);
    }

    #[test]
    fn test_tiers_in_order() {
        let repo = repo();
        let bosch = repo.create_manufacturer("Bosch").unwrap();
        let makita = repo.create_manufacturer("Makita").unwrap();
        let mut resolver = ManufacturerResolver::load(repo.clone(), 0.85).unwrap();

        let exact = resolver.resolve("bosch").unwrap().unwrap();
        assert_eq!(exact.manufacturer_id, bosch.id);
        assert_eq!(exact.tier, MatchTier::Exact);

        let fuzzy = resolver.resolve("Makitta").unwrap().unwrap();
        assert_eq!(fuzzy.manufacturer_id, makita.id);
        assert_eq!(fuzzy.tier, MatchTier::Fuzzy);

        // 别名已落库，新的解析器直接走别名层
        let mut fresh = ManufacturerResolver::load(repo.clone(), 0.85).unwrap();
        let alias = fresh.resolve("MAKITTA").unwrap().unwrap();
        assert_eq!(alias.tier, MatchTier::Alias);
        assert_eq!(alias.manufacturer_id, makita.id);

        let created = fresh.resolve("Festool").unwrap().unwrap();
        assert_eq!(created.tier, MatchTier::Created);
        assert_eq!(repo.list_manufacturers().unwrap().len(), 3);
        assert_eq!(fresh.resolve("  ").unwrap(), None);
    }
}
