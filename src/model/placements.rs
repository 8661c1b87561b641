// src/model/placements.rs

use serde::{Serialize, Deserialize};
use std::convert::TryFrom;
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum AdType {
    Banner = 1,
    Interstitial = 2,
    Rewarded = 3,
    Native = 4,
}

impl TryFrom<u8> for AdType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(AdType::Banner),
            2 => Ok(AdType::Interstitial),
            3 => Ok(AdType::Rewarded),
            4 => Ok(AdType::Native),
            _ => Err(format!("Invalid value for AdType: {}", value)),
        }
    }
}

impl From<AdType> for u8 {
    fn from(ad: AdType) -> Self {
        ad as u8
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdType::Banner => "banner",
            AdType::Interstitial => "interstitial",
            AdType::Rewarded => "rewarded",
            AdType::Native => "native",
        };
        f.write_str(name)
    }
}

/// 原生广告需要的素材描述
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct NativeRequirements {
    pub title: bool,
    pub icon: bool,
    pub main_image: bool,
    pub call_to_action: bool,
    /// 主图最小宽高（像素）
    pub main_image_min_w: Option<u32>,
    pub main_image_min_h: Option<u32>,
}

/// 广告位配置
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Placement {
    pub placement_id: String,                      // 广告位 ID（ad unit id）
    pub ad_type: AdType,                           // 广告位类型
    #[serde(default)]
    pub floor: f64,                                // 底价
    #[serde(default)]
    pub deal_id: Option<String>,                   // PMP deal
    #[serde(default)]
    pub native: Option<NativeRequirements>,        // 仅 native 广告位需要
    #[serde(default)]
    pub show_close_button: Option<bool>,           // 插屏/激励视频的关闭按钮
}

impl Placement {
    pub fn new(placement_id: &str, ad_type: AdType, floor: f64) -> Self {
        Self {
            placement_id: placement_id.to_string(),
            ad_type,
            floor,
            deal_id: None,
            native: None,
            show_close_button: None,
        }
    }
}
