//! Pure record extraction over an intercepted listing payload.
//!
//! No I/O happens here: the extractor walks the payload's listing array,
//! applies the validity predicate, and projects passing items into flat
//! records. Malformed individual items are skipped, never an error.

use serde::Serialize;
use serde_json::Value;

/// Sentinel written for any field the listing does not carry.
pub const NOT_AVAILABLE: &str = "N/A";

/// Promoted listings surface through a JSON-encoded exposure marker whose
/// tracking key contains this sentinel.
const PROMOTED_SENTINEL: &str = "recomhotellist";

/// One validated, flattened listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HotelRecord {
    pub name: String,
    pub star_rating: String,
    pub address: String,
    pub zone: String,
    pub longitude: String,
    pub latitude: String,
    pub score: String,
}

/// Result of extracting one payload.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Records passing the validity predicate, in payload order.
    pub records: Vec<HotelRecord>,
    /// Number of valid records (`records.len()`, kept as an explicit tally).
    pub valid_count: usize,
    /// Total items seen in the listing array, valid or not.
    pub total_items: usize,
}

/// Extract all valid records from a structurally valid payload.
pub fn extract(payload: &Value) -> Extraction {
    let mut out = Extraction::default();
    let Some(items) = payload
        .get("data")
        .and_then(|d| d.get("hotelList"))
        .and_then(Value::as_array)
    else {
        return out;
    };

    out.total_items = items.len();
    for item in items {
        if !is_valid_listing(item) {
            continue;
        }
        out.records.push(project(item));
        out.valid_count += 1;
    }
    out
}

/// A listing is valid iff name, address, and coordinate are all present and
/// non-empty, and it is not a promoted listing.
fn is_valid_listing(item: &Value) -> bool {
    let info = item.get("hotelInfo");
    let position = info.and_then(|i| i.get("positionInfo"));

    let name = info.and_then(|i| i.get("nameInfo")).and_then(|n| n.get("name"));
    let address = position.and_then(|p| p.get("address"));
    let coordinate = position.and_then(|p| p.get("mapCoordinate"));

    if !present(name) || !present(address) || !present(coordinate) {
        return false;
    }
    !is_promoted(item)
}

/// Whether a field carries a usable value (non-null, non-empty).
fn present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(_) => true,
    }
}

/// Decode the exposure side channel; an unreadable marker is treated as
/// not promoted rather than invalidating the record.
fn is_promoted(item: &Value) -> bool {
    let Some(raw) = item.get("data-exposure").and_then(Value::as_str) else {
        return false;
    };
    let Ok(exposure) = serde_json::from_str::<Value>(raw) else {
        return false;
    };
    exposure
        .get("ubtKey")
        .and_then(Value::as_str)
        .is_some_and(|key| key.contains(PROMOTED_SENTINEL))
}

fn project(item: &Value) -> HotelRecord {
    let info = item.get("hotelInfo");
    let position = info.and_then(|i| i.get("positionInfo"));
    let coordinate = position
        .and_then(|p| p.get("mapCoordinate"))
        .and_then(|c| c.get(0));

    HotelRecord {
        name: text(info.and_then(|i| i.get("nameInfo")).and_then(|n| n.get("name"))),
        star_rating: text(info.and_then(|i| i.get("hotelStar")).and_then(|s| s.get("star"))),
        address: text(position.and_then(|p| p.get("address"))),
        zone: text(position.and_then(|p| p.get("zoneNames")).and_then(|z| z.get(0))),
        longitude: text(coordinate.and_then(|c| c.get("longitude"))),
        latitude: text(coordinate.and_then(|c| c.get("latitude"))),
        score: text(
            info.and_then(|i| i.get("commentInfo"))
                .and_then(|c| c.get("commentScore")),
        ),
    }
}

/// Render an optional scalar as display text, `N/A` when missing or empty.
fn text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => NOT_AVAILABLE.to_string(),
        Some(Value::String(s)) if s.is_empty() => NOT_AVAILABLE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(name: &str, address: &str) -> Value {
        json!({
            "hotelInfo": {
                "nameInfo": { "name": name },
                "hotelStar": { "star": 4 },
                "positionInfo": {
                    "address": address,
                    "zoneNames": ["鼓楼区"],
                    "mapCoordinate": [{ "longitude": "118.77", "latitude": "32.06" }]
                },
                "commentInfo": { "commentScore": 4.7 }
            }
        })
    }

    fn payload(items: Vec<Value>) -> Value {
        json!({ "data": { "hotelList": items } })
    }

    #[test]
    fn test_extracts_complete_listing() {
        let extraction = extract(&payload(vec![listing("南京饭店", "中山北路")]));
        assert_eq!(extraction.valid_count, 1);
        assert_eq!(extraction.total_items, 1);

        let record = &extraction.records[0];
        assert_eq!(record.name, "南京饭店");
        assert_eq!(record.star_rating, "4");
        assert_eq!(record.address, "中山北路");
        assert_eq!(record.zone, "鼓楼区");
        assert_eq!(record.longitude, "118.77");
        assert_eq!(record.latitude, "32.06");
        assert_eq!(record.score, "4.7");
    }

    #[test]
    fn test_missing_address_excluded() {
        let mut item = listing("南京饭店", "中山北路");
        item["hotelInfo"]["positionInfo"]
            .as_object_mut()
            .unwrap()
            .remove("address");
        let extraction = extract(&payload(vec![item]));
        assert_eq!(extraction.valid_count, 0);
        assert_eq!(extraction.total_items, 1);
    }

    #[test]
    fn test_empty_coordinate_excluded() {
        let mut item = listing("南京饭店", "中山北路");
        item["hotelInfo"]["positionInfo"]["mapCoordinate"] = json!([]);
        let extraction = extract(&payload(vec![item]));
        assert_eq!(extraction.valid_count, 0);
    }

    #[test]
    fn test_empty_name_excluded() {
        let extraction = extract(&payload(vec![listing("", "中山北路")]));
        assert_eq!(extraction.valid_count, 0);
    }

    #[test]
    fn test_promoted_listing_excluded() {
        let mut item = listing("推广酒店", "中山北路");
        item["data-exposure"] =
            json!("{\"ubtKey\":\"htl.list.recomhotellist.click\"}");
        let extraction = extract(&payload(vec![item]));
        assert_eq!(extraction.valid_count, 0);
    }

    #[test]
    fn test_unreadable_exposure_kept() {
        let mut item = listing("南京饭店", "中山北路");
        item["data-exposure"] = json!("not json at all");
        let extraction = extract(&payload(vec![item]));
        assert_eq!(extraction.valid_count, 1);
    }

    #[test]
    fn test_missing_optional_fields_become_sentinel() {
        let item = json!({
            "hotelInfo": {
                "nameInfo": { "name": "简朴旅馆" },
                "positionInfo": {
                    "address": "某条路",
                    "mapCoordinate": [{}]
                }
            }
        });
        let extraction = extract(&payload(vec![item]));
        assert_eq!(extraction.valid_count, 1);

        let record = &extraction.records[0];
        assert_eq!(record.star_rating, NOT_AVAILABLE);
        assert_eq!(record.zone, NOT_AVAILABLE);
        assert_eq!(record.longitude, NOT_AVAILABLE);
        assert_eq!(record.latitude, NOT_AVAILABLE);
        assert_eq!(record.score, NOT_AVAILABLE);
    }

    #[test]
    fn test_malformed_item_skipped_not_fatal() {
        let extraction = extract(&payload(vec![
            json!("just a string"),
            json!(42),
            listing("真酒店", "真地址"),
        ]));
        assert_eq!(extraction.total_items, 3);
        assert_eq!(extraction.valid_count, 1);
        assert_eq!(extraction.records[0].name, "真酒店");
    }

    #[test]
    fn test_missing_listing_array_yields_nothing() {
        let extraction = extract(&json!({ "data": {} }));
        assert_eq!(extraction.valid_count, 0);
        assert_eq!(extraction.total_items, 0);
        assert!(extraction.records.is_empty());
    }
}
