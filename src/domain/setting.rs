// ==========================================
// 供应商价目表管理系统 - 导入配置领域模型
// ==========================================
// 职责: Setting（列映射配置） / Link（字段 ↔ 列绑定） / DictEntry（值替换）
// 归属: Setting 级联拥有 Link，Link 级联拥有 DictEntry
// ==========================================

use crate::domain::types::FieldKey;
use serde::{Deserialize, Serialize};

// ==========================================
// Setting - 列映射配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub id: i64,
    pub name: String,
    pub supplier_id: i64,
    pub sheet_name: String,          // 空 = 取第一个工作表
    pub differ_by_name: bool,        // 以 (article, name) 区分商品
    pub priced_only: bool,           // 已映射的价格字段必须有值
    pub create_new: bool,            // 允许创建新商品
    pub update_main: bool,           // 同步更新主目录
    pub update_main_content: bool,   // 已有主商品也刷新名称/厂商
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Setting {
    pub fn link(&self, key: FieldKey) -> Option<&Link> {
        self.links.iter().find(|l| l.key == key)
    }
}

// ==========================================
// Link - 规范字段与表格列的绑定
// ==========================================
// 唯一键: (setting_id, key)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: i64,
    pub setting_id: i64,
    pub key: FieldKey,
    pub column: Option<String>,  // 表格列名，None = 仅使用默认值
    pub initial: Option<String>, // 默认值
    #[serde(default)]
    pub dict: Vec<DictEntry>,
}

impl Link {
    /// 字面值替换（整格精确匹配，不作正则）
    pub fn substitute<'a>(&'a self, value: &'a str) -> &'a str {
        self.dict
            .iter()
            .find(|entry| entry.key == value)
            .map(|entry| entry.value.as_str())
            .unwrap_or(value)
    }

    pub fn initial_value(&self) -> Option<&str> {
        self.initial
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
}

// ==========================================
// DictEntry - 值替换对
// ==========================================
// 唯一键: (link_id, key, value)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictEntry {
    pub id: i64,
    pub link_id: i64,
    pub key: String,   // 源值
    pub value: String, // 规范值
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_with_dict(entries: &[(&str, &str)]) -> Link {
        Link {
            id: 1,
            setting_id: 1,
            key: FieldKey::Manufacturer,
            column: Some("Brand".to_string()),
            initial: None,
            dict: entries
                .iter()
                .enumerate()
                .map(|(i, (k, v))| DictEntry {
                    id: i as i64 + 1,
                    link_id: 1,
                    key: k.to_string(),
                    value: v.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_substitute_is_literal() {
        let link = link_with_dict(&[("B.O.S.C.H.", "Bosch"), ("(Mak)", "Makita")]);
        assert_eq!(link.substitute("B.O.S.C.H."), "Bosch");
        assert_eq!(link.substitute("(Mak)"), "Makita");
        // 正则元字符不会被解释
        assert_eq!(link.substitute("BxOxSxCxHx"), "BxOxSxCxHx");
        // 仅整格匹配
        assert_eq!(link.substitute("(Mak) tools"), "(Mak) tools");
    }

    #[test]
    fn test_initial_value_blank_is_none() {
        let mut link = link_with_dict(&[]);
        link.initial = Some("   ".to_string());
        assert_eq!(link.initial_value(), None);
        link.initial = Some(" 5 ".to_string());
        assert_eq!(link.initial_value(), Some("5"));
    }
}
