use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Identity;

/// 占位记录中课程与年级的显示值
pub const PLACEHOLDER_VALUE: &str = "—";

/// 学生资料，`identity_id` 是所有缓存层的唯一键
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub identity_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// 由远程文档构造资料，文档 ID 优先于文档内容中的 `identityId`
    pub fn from_document(
        identity_id: &str,
        mut document: Map<String, Value>,
    ) -> Result<Self, serde_json::Error> {
        document.insert(
            "identityId".to_string(),
            Value::String(identity_id.to_string()),
        );
        serde_json::from_value(Value::Object(document))
    }

    /// 远程文档内容，不含 `identityId`（文档 ID 即为身份）
    pub fn to_document(&self) -> Map<String, Value> {
        let mut document = Map::new();
        document.insert("name".into(), Value::String(self.name.clone()));
        document.insert("email".into(), Value::String(self.email.clone()));
        document.insert("course".into(), Value::String(self.course.clone()));
        document.insert("year".into(), Value::String(self.year.clone()));
        if let Some(created_at) = self.created_at {
            document.insert(
                "createdAt".into(),
                Value::String(created_at.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)),
            );
        }
        document
    }

    /// 加入日期，缺失时显示 "N/A"
    pub fn joined_date(&self) -> String {
        self.created_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// 只根据认证信息合成的占位资料，从不写入任何缓存层
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placeholder {
    pub identity_id: String,
    pub name: String,
    pub course: String,
    pub year: String,
}

impl Placeholder {
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            identity_id: identity.uid.clone(),
            name: identity.label().to_string(),
            course: PLACEHOLDER_VALUE.to_string(),
            year: PLACEHOLDER_VALUE.to_string(),
        }
    }
}

/// 持久层编码
pub fn encode(profile: &Profile) -> Result<String, serde_json::Error> {
    serde_json::to_string(profile)
}

/// 持久层解码
pub fn decode(raw: &str) -> Result<Profile, serde_json::Error> {
    serde_json::from_str(raw)
}
