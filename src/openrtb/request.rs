use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

use crate::adapters::NetworkId;
use crate::model::placements::{AdType, NativeRequirements};
use crate::model::privacy::Regs;
use crate::model::targeting::{AppInfo, Targeting};

/// 单个网络的 bidder token，key/value 形式
pub type TokenBundle = BTreeMap<String, String>;

/// 所有网络的 bidder token
pub type AdapterTokens = BTreeMap<NetworkId, TokenBundle>;

/// 发给竞价服务的请求
/// 构建后不再修改，唯一的例外是 CDP 增强（见 `AuctionClient::start_cdp_flow`）。
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BidRequest {
    pub id: String,
    pub imp: Vec<Imp>,
    pub app: App,
    pub user: User,
    #[serde(default)]
    pub regs: Regs,
    #[serde(default)]
    pub targeting: Targeting,
    #[serde(default)]
    pub ext: RequestExt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmax: Option<u64>,
}

/// 广告展示请求
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Imp {
    pub id: String,
    pub tagid: String,
    pub ad_type: AdType,
    pub bidfloor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmp: Option<Pmp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native: Option<NativeRequirements>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Pmp {
    pub deal_id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct App {
    #[serde(flatten)]
    pub info: AppInfo,
    pub publisher: Publisher,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Publisher {
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RequestExt {
    #[serde(default)]
    pub adapters: AdapterTokens,
}

impl BidRequest {
    /// 请求对应的广告位（tagid）
    pub fn placement_id(&self) -> Option<&str> {
        self.imp.first().map(|imp| imp.tagid.as_str())
    }

    pub fn ad_type(&self) -> Option<AdType> {
        self.imp.first().map(|imp| imp.ad_type)
    }

    pub fn floor(&self) -> Option<f64> {
        self.imp.first().map(|imp| imp.bidfloor)
    }
}
