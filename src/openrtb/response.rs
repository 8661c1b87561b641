use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::adapters::NetworkId;

/// 竞价服务返回的排序结果
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AuctionResponse {
    pub id: String,
    #[serde(default)]
    pub seatbid: Vec<SeatBid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cur: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SeatBid {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat: Option<String>,
    #[serde(default)]
    pub bid: Vec<Bid>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Bid {
    pub id: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,   // 创意内容：HTML / VAST / native JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nurl: Option<String>,  // win notice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burl: Option<String>,  // billing notice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dealid: Option<String>,
    pub ext: BidExt,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BidExt {
    /// 胜出的广告网络
    pub adapter: String,
    /// 排名，0 为最高
    #[serde(default)]
    pub rank: u32,
    #[serde(rename = "adapterExtras", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub adapter_extras: BTreeMap<String, Value>,
}

impl Bid {
    /// 解析出胜出网络，未知网络返回 None
    pub fn network(&self) -> Option<NetworkId> {
        NetworkId::from_str(&self.ext.adapter).ok()
    }

    pub fn rank(&self) -> u32 {
        self.ext.rank
    }
}

impl AuctionResponse {
    pub fn bid_count(&self) -> usize {
        self.seatbid.iter().map(|seat| seat.bid.len()).sum()
    }

    /// 把所有 seat 的 bid 摊平，按 rank 升序排列（同 rank 保持原顺序）
    pub fn into_ranked_bids(self) -> Vec<Bid> {
        let mut bids: Vec<Bid> = self
            .seatbid
            .into_iter()
            .flat_map(|seat| seat.bid.into_iter())
            .collect();
        bids.sort_by_key(|bid| bid.ext.rank);
        bids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_format_and_ranks_across_seats() {
        let body = r#"{
            "id": "auction-1",
            "seatbid": [
                {"seat": "s1", "bid": [
                    {"id": "b2", "price": 0.4, "ext": {"adapter": "unity", "rank": 2}}
                ]},
                {"bid": [
                    {"id": "b0", "price": 1.5, "adm": "<html></html>", "nurl": "https://n/${AUCTION_PRICE}",
                     "ext": {"adapter": "applovin", "rank": 0, "adapterExtras": {"placement": "x"}}},
                    {"id": "b1", "price": 0.9, "dealid": "deal-7", "ext": {"adapter": "mystery", "rank": 1}}
                ]}
            ]
        }"#;
        let response: AuctionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.bid_count(), 3);

        let bids = response.into_ranked_bids();
        let ids: Vec<&str> = bids.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["b0", "b1", "b2"]);
        assert_eq!(bids[0].network(), Some(NetworkId::AppLovin));
        assert_eq!(bids[0].ext.adapter_extras.get("placement"), Some(&Value::from("x")));
        assert_eq!(bids[1].network(), None);
        assert_eq!(bids[1].dealid.as_deref(), Some("deal-7"));
    }

    #[test]
    fn empty_envelope_has_no_bids() {
        let response: AuctionResponse =
            serde_json::from_str(r#"{"id":"a","seatbid":[{"seat":"s","bid":[]}]}"#).unwrap();
        assert_eq!(response.bid_count(), 0);
        assert!(response.into_ranked_bids().is_empty());
    }
}
