use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 已知的广告网络
/// 竞价响应里的 `ext.adapter` 使用这里的字符串 id。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NetworkId {
    #[serde(rename = "admob")]
    AdMob,
    #[serde(rename = "applovin")]
    AppLovin,
    #[serde(rename = "chartboost")]
    Chartboost,
    #[serde(rename = "inmobi")]
    InMobi,
    #[serde(rename = "ironsource")]
    IronSource,
    #[serde(rename = "meta")]
    Meta,
    #[serde(rename = "mintegral")]
    Mintegral,
    #[serde(rename = "pangle")]
    Pangle,
    #[serde(rename = "unity")]
    UnityAds,
    #[serde(rename = "vungle")]
    Vungle,
}

impl NetworkId {
    /// 注册表扫描的固定网络列表
    pub const ALL: [NetworkId; 10] = [
        NetworkId::AdMob,
        NetworkId::AppLovin,
        NetworkId::Chartboost,
        NetworkId::InMobi,
        NetworkId::IronSource,
        NetworkId::Meta,
        NetworkId::Mintegral,
        NetworkId::Pangle,
        NetworkId::UnityAds,
        NetworkId::Vungle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkId::AdMob => "admob",
            NetworkId::AppLovin => "applovin",
            NetworkId::Chartboost => "chartboost",
            NetworkId::InMobi => "inmobi",
            NetworkId::IronSource => "ironsource",
            NetworkId::Meta => "meta",
            NetworkId::Mintegral => "mintegral",
            NetworkId::Pangle => "pangle",
            NetworkId::UnityAds => "unity",
            NetworkId::Vungle => "vungle",
        }
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        NetworkId::ALL
            .iter()
            .copied()
            .find(|network| network.as_str() == lower)
            .ok_or_else(|| format!("unknown ad network: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_ids_match_serde_names() {
        for network in NetworkId::ALL {
            let json = serde_json::to_string(&network).unwrap();
            assert_eq!(json, format!("\"{}\"", network.as_str()));
            assert_eq!(network.as_str().parse::<NetworkId>().unwrap(), network);
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!("AppLovin".parse::<NetworkId>().unwrap(), NetworkId::AppLovin);
        assert!("not-a-network".parse::<NetworkId>().is_err());
    }
}
