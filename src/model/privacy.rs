// src/model/privacy.rs

use serde::{Serialize, Deserialize};
use std::collections::HashMap;

/// 隐私设置
/// `None` 表示宿主应用没有显式设置过该项（对应 "was explicitly set" 标记）。
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PrivacySettings {
    pub consent: Option<bool>,
    pub do_not_sell: Option<bool>,
    pub age_restricted: Option<bool>,
}

impl PrivacySettings {
    pub fn with_consent(mut self, consent: bool) -> Self {
        self.consent = Some(consent);
        self
    }

    pub fn with_do_not_sell(mut self, do_not_sell: bool) -> Self {
        self.do_not_sell = Some(do_not_sell);
        self
    }

    pub fn with_age_restricted(mut self, age_restricted: bool) -> Self {
        self.age_restricted = Some(age_restricted);
        self
    }

    /// 转成广告网络初始化时使用的 key/value，未设置的项不会出现
    pub fn as_init_params(&self) -> HashMap<String, String> {
        let mut params = HashMap::new();
        if let Some(v) = self.consent {
            params.insert("consent".to_string(), v.to_string());
        }
        if let Some(v) = self.do_not_sell {
            params.insert("do_not_sell".to_string(), v.to_string());
        }
        if let Some(v) = self.age_restricted {
            params.insert("age_restricted".to_string(), v.to_string());
        }
        params
    }
}

/// 请求中的 regs 字段
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Regs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coppa: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gdpr_consent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub us_privacy: Option<String>,
}

impl From<&PrivacySettings> for Regs {
    fn from(p: &PrivacySettings) -> Self {
        Regs {
            coppa: p.age_restricted.map(u8::from),
            gdpr_consent: p.consent.map(u8::from),
            // IAB US privacy string: version, notice, opt-out, LSPA
            us_privacy: p
                .do_not_sell
                .map(|dns| format!("1-{}-", if dns { 'Y' } else { 'N' })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_flags_are_omitted() {
        let privacy = PrivacySettings::default().with_consent(true);
        let params = privacy.as_init_params();
        assert_eq!(params.get("consent").map(String::as_str), Some("true"));
        assert!(!params.contains_key("do_not_sell"));

        let regs = Regs::from(&privacy);
        assert_eq!(regs.gdpr_consent, Some(1));
        assert!(regs.coppa.is_none());
        assert_eq!(serde_json::to_string(&regs).unwrap(), r#"{"gdpr_consent":1}"#);
    }

    #[test]
    fn do_not_sell_maps_to_us_privacy() {
        let regs = Regs::from(&PrivacySettings::default().with_do_not_sell(true));
        assert_eq!(regs.us_privacy.as_deref(), Some("1-Y-"));
    }
}
