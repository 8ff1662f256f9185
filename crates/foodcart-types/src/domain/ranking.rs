use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::catalog::Restaurant;
use super::order::Order;

/// Distance from an order's delivery address to a candidate restaurant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Distance {
    Known { km: f64 },
    /// Geocoding or distance computation failed for this pair.
    Unknown { reason: String },
}

impl Distance {
    /// Kilometres rounded to metres.
    pub fn known(km: f64) -> Self {
        Distance::Known {
            km: (km * 1000.0).round() / 1000.0,
        }
    }

    pub fn km(&self) -> Option<f64> {
        match self {
            Distance::Known { km } => Some(*km),
            Distance::Unknown { .. } => None,
        }
    }

    /// Ascending by distance; unknown after every known distance and equal
    /// among themselves, so a stable sort keeps their relative order.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        match (self.km(), other.km()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCandidate {
    pub restaurant: Restaurant,
    pub distance: Distance,
}

/// One in-process order as staff see it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBoardEntry {
    pub order: Order,
    pub total_cents: i64,
    pub candidates: Vec<RankedCandidate>,
    pub ranking_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_distances_round_to_metres() {
        assert_eq!(Distance::known(2.00049).km(), Some(2.0));
        assert_eq!(Distance::known(2.0006).km(), Some(2.001));
    }

    #[test]
    fn unknown_sorts_after_known() {
        let unknown = Distance::Unknown {
            reason: "x".into(),
        };
        let near = Distance::known(1.0);
        let far = Distance::known(9.0);
        assert_eq!(near.rank_cmp(&far), Ordering::Less);
        assert_eq!(unknown.rank_cmp(&far), Ordering::Greater);
        assert_eq!(unknown.rank_cmp(&unknown.clone()), Ordering::Equal);
    }

    #[test]
    fn wire_shape_is_tagged() {
        let json = serde_json::to_value(Distance::known(2.5)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "known", "km": 2.5}));
    }
}
