// src/model/targeting.rs

use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// 宿主应用与设备信息
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct AppInfo {
    pub bundle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

/// 定向参数，CDP 增强会往 `params` 里追加 key/value
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Targeting {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl Targeting {
    pub fn with_param(mut self, key: &str, value: &str) -> Self {
        self.params.insert(key.to_string(), value.to_string());
        self
    }
}
