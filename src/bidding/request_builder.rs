// src/bidding/request_builder.rs

use crate::model::placements::{AdType, NativeRequirements};
use crate::model::privacy::{PrivacySettings, Regs};
use crate::model::targeting::{AppInfo, Targeting};
use crate::openrtb::request::{AdapterTokens, App, BidRequest, Imp, Pmp, Publisher, RequestExt, User};

/// 单次请求的参数
#[derive(Debug, Clone)]
pub struct BidRequestParams {
    pub ad_unit_id: String,
    pub stored_impression_id: String,
    pub ad_type: AdType,
    pub deal_id: Option<String>,
    pub floor: f64,
    pub publisher_id: String,
    pub user_id: String,
    pub adapter_tokens: AdapterTokens,
    pub native_requirements: Option<NativeRequirements>,
}

/// **竞价请求构建器**
/// 持有整个 SDK 生命周期内不变的应用、隐私和定向信息。
#[derive(Debug, Clone, Default)]
pub struct BidRequestBuilder {
    pub app: AppInfo,
    pub privacy: PrivacySettings,
    pub targeting: Targeting,
    pub tmax: Option<u64>,
}

impl BidRequestBuilder {
    pub fn new(app: AppInfo, privacy: PrivacySettings, targeting: Targeting) -> Self {
        Self { app, privacy, targeting, tmax: None }
    }

    pub fn with_tmax(mut self, tmax: Option<u64>) -> Self {
        self.tmax = tmax;
        self
    }

    /// 纯构造，不做 I/O；同样的输入得到同样的请求
    pub fn create_bid_request(&self, params: BidRequestParams) -> BidRequest {
        let BidRequestParams {
            ad_unit_id,
            stored_impression_id,
            ad_type,
            deal_id,
            floor,
            publisher_id,
            user_id,
            adapter_tokens,
            native_requirements,
        } = params;

        // native 素材要求只对 native 广告位有意义
        let native = match ad_type {
            AdType::Native => Some(native_requirements.unwrap_or_default()),
            _ => None,
        };

        BidRequest {
            id: stored_impression_id.clone(),
            imp: vec![Imp {
                id: stored_impression_id,
                tagid: ad_unit_id,
                ad_type,
                bidfloor: floor.max(0.0),
                pmp: deal_id.filter(|d| !d.is_empty()).map(|deal_id| Pmp { deal_id }),
                native,
            }],
            app: App {
                info: self.app.clone(),
                publisher: Publisher { id: publisher_id },
            },
            user: User { id: user_id },
            regs: Regs::from(&self.privacy),
            targeting: self.targeting.clone(),
            ext: RequestExt { adapters: adapter_tokens },
            tmax: self.tmax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::NetworkId;
    use proptest::prelude::*;

    fn params(ad_type: AdType, floor: f64, tokens: AdapterTokens) -> BidRequestParams {
        BidRequestParams {
            ad_unit_id: "level_end".to_string(),
            stored_impression_id: "imp-1".to_string(),
            ad_type,
            deal_id: Some("deal-9".to_string()),
            floor,
            publisher_id: "pub-1".to_string(),
            user_id: "user-1".to_string(),
            adapter_tokens: tokens,
            native_requirements: None,
        }
    }

    fn builder() -> BidRequestBuilder {
        BidRequestBuilder::new(
            AppInfo { bundle: "com.example.game".to_string(), ..Default::default() },
            PrivacySettings::default().with_consent(true),
            Targeting::default().with_param("level", "7"),
        )
    }

    #[test]
    fn builds_single_impression_request() {
        let request = builder().create_bid_request(params(AdType::Interstitial, 1.25, AdapterTokens::new()));
        assert_eq!(request.placement_id(), Some("level_end"));
        assert_eq!(request.imp[0].pmp.as_ref().unwrap().deal_id, "deal-9");
        assert!(request.imp[0].native.is_none());
        assert_eq!(request.regs.gdpr_consent, Some(1));
        assert_eq!(request.targeting.params["level"], "7");
        assert_eq!(request.app.publisher.id, "pub-1");
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let b = builder();
        let first = b.create_bid_request(params(AdType::Native, 0.3, AdapterTokens::new()));
        let second = b.create_bid_request(params(AdType::Native, 0.3, AdapterTokens::new()));
        assert_eq!(first, second);
        assert_eq!(first.imp[0].native, Some(NativeRequirements::default()));
    }

    fn ad_type_strategy() -> impl Strategy<Value = AdType> {
        prop_oneof![
            Just(AdType::Banner),
            Just(AdType::Interstitial),
            Just(AdType::Rewarded),
            Just(AdType::Native),
        ]
    }

    fn tokens_strategy() -> impl Strategy<Value = AdapterTokens> {
        prop::collection::btree_map(
            prop::sample::select(NetworkId::ALL.to_vec()),
            prop::collection::btree_map("[a-z_]{1,8}", "[A-Za-z0-9=+/]{0,24}", 0..4),
            0..5,
        )
    }

    proptest! {
        #[test]
        fn serialization_round_trip_keeps_request(
            ad_type in ad_type_strategy(),
            floor in (0u32..10_000).prop_map(|cents| f64::from(cents) / 100.0),
            tokens in tokens_strategy(),
        ) {
            let request = builder().create_bid_request(params(ad_type, floor, tokens.clone()));
            let json = serde_json::to_string(&request).unwrap();
            let decoded: BidRequest = serde_json::from_str(&json).unwrap();

            prop_assert_eq!(decoded.placement_id(), Some("level_end"));
            prop_assert_eq!(decoded.ad_type(), Some(ad_type));
            prop_assert_eq!(decoded.floor(), Some(floor));
            prop_assert_eq!(&decoded.ext.adapters, &tokens);
            prop_assert_eq!(decoded, request);
        }
    }
}
