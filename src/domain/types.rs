//! Identifier aliases and the opaque banner payload.

use serde_json::{Map, Value};

pub type BannerId = i64;
pub type TagId = i64;
pub type FeatureId = i64;

/// Banner payload: an arbitrary JSON object whose key order survives a round trip.
pub type Content = Map<String, Value>;

/// Zero is never issued as an id; callers use it to mean "no value supplied".
pub const UNSET_ID: i64 = 0;

pub fn is_unset(id: i64) -> bool {
    id == UNSET_ID
}
