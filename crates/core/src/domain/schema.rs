//! Declared schemas for upstream documents.
//!
//! Every integration states exactly where its list of items lives and which
//! keys feed each logical field. Nothing here walks a document looking for
//! things that resemble items: a path that does not resolve is a
//! [`SchemaMismatch`].

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use super::{extract, AstroEvent, CatalogItem, FeedImage};

pub const POSITION_LATITUDE: &[&str] = &["latitude", "lat"];
pub const POSITION_LONGITUDE: &[&str] = &["longitude", "lon", "lng"];
pub const POSITION_VELOCITY: &[&str] = &["velocity"];

/// The declared path did not lead to a list of items.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaMismatch {
    #[error("path segment `{segment}` not found in {path}")]
    MissingSegment { path: String, segment: String },
    #[error("value at {path} is not an array")]
    NotAnArray { path: String },
}

/// Location of the item array inside an upstream document.
///
/// Written as dot-separated object keys (`"items"`, `"data.results"`). The
/// empty path is the document root; a root object is then treated as a
/// single item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemsPath {
    segments: Vec<String>,
}

impl ItemsPath {
    /// Parses a dot-separated path. Empty segments are ignored.
    pub fn new(path: &str) -> Self {
        Self {
            segments: path
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resolves the path and returns the object members of the array.
    ///
    /// Array members that are not objects are skipped.
    pub fn resolve<'a>(&self, doc: &'a Value) -> Result<Vec<&'a Map<String, Value>>, SchemaMismatch> {
        let mut current = doc;
        for segment in &self.segments {
            current = current
                .as_object()
                .and_then(|obj| obj.get(segment))
                .ok_or_else(|| SchemaMismatch::MissingSegment {
                    path: self.to_string(),
                    segment: segment.clone(),
                })?;
        }

        match current {
            Value::Array(items) => Ok(items.iter().filter_map(Value::as_object).collect()),
            Value::Object(obj) if self.is_root() => Ok(vec![obj]),
            _ => Err(SchemaMismatch::NotAnArray {
                path: self.to_string(),
            }),
        }
    }
}

impl fmt::Display for ItemsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.segments.join("."))
        }
    }
}

/// Candidate keys for each logical catalog field.
#[derive(Debug, Clone, Copy)]
pub struct CatalogFields {
    pub dataset_id: &'static [&'static str],
    pub title: &'static [&'static str],
    pub status: &'static [&'static str],
    pub updated_at: &'static [&'static str],
}

pub const CATALOG_FIELDS: CatalogFields = CatalogFields {
    dataset_id: &["dataset_id", "id", "uuid"],
    title: &["title", "name", "label"],
    status: &["status", "state", "lifecycle"],
    updated_at: &["updated_at", "modified", "lastUpdated", "timestamp"],
};

impl CatalogFields {
    /// Maps one upstream item to a catalog record.
    ///
    /// The natural key may come back empty; the repository skips such rows.
    pub fn to_item(&self, doc: &Map<String, Value>) -> CatalogItem {
        CatalogItem::new(
            extract::first_string(doc, self.dataset_id),
            Value::Object(doc.clone()),
        )
        .with_title(extract::first_string(doc, self.title))
        .with_status(extract::first_string(doc, self.status))
        .with_updated_at(extract::first_timestamp(doc, self.updated_at))
    }
}

/// Candidate keys for an image entry in a feed document.
#[derive(Debug, Clone, Copy)]
pub struct FeedImageFields {
    pub url: &'static [&'static str],
    pub image_extensions: &'static [&'static str],
    pub observation: &'static [&'static str],
    pub program: &'static [&'static str],
    pub link: &'static [&'static str],
    pub details: &'static str,
}

pub const FEED_IMAGE_FIELDS: FeedImageFields = FeedImageFields {
    url: &[
        "thumbnail",
        "thumbnailUrl",
        "image",
        "img",
        "url",
        "href",
        "s3_url",
        "file_url",
    ],
    image_extensions: &[".jpg", ".jpeg", ".png"],
    observation: &["observation_id", "observationId", "id"],
    program: &["program"],
    link: &["location", "url", "href"],
    details: "details",
};

impl FeedImageFields {
    /// Maps one upstream item to an image, or `None` if it has no image URL.
    pub fn to_image(&self, doc: &Map<String, Value>) -> Option<FeedImage> {
        let url = self.image_url(doc)?;
        let details = doc.get(self.details).and_then(Value::as_object);

        let instruments: Vec<String> = details
            .and_then(|d| d.get("instruments"))
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|inst| match inst {
                        Value::Object(m) => m.get("instrument").and_then(Value::as_str),
                        Value::String(s) => Some(s.as_str()),
                        _ => None,
                    })
                    .filter(|s| !s.is_empty())
                    .map(str::to_uppercase)
                    .collect()
            })
            .unwrap_or_default();

        let suffix = details
            .and_then(|d| d.get("suffix"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let obs = extract::first_string(doc, self.observation);
        let program = extract::first_string(doc, self.program);
        let link = Some(extract::first_string(doc, self.link))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| url.clone());

        let caption = caption(&obs, &program, &suffix, &instruments);

        Some(FeedImage {
            url,
            obs,
            program,
            suffix,
            instruments,
            caption,
            link,
        })
    }

    fn image_url(&self, doc: &Map<String, Value>) -> Option<String> {
        self.url
            .iter()
            .filter_map(|key| doc.get(*key).and_then(Value::as_str))
            .find(|url| {
                let lower = url.to_lowercase();
                self.image_extensions.iter().any(|ext| lower.ends_with(ext))
            })
            .map(String::from)
    }
}

/// Candidate keys for an astronomy event entry.
#[derive(Debug, Clone, Copy)]
pub struct AstroEventFields {
    pub name: &'static [&'static str],
    pub kind: &'static [&'static str],
    pub when: &'static [&'static str],
    pub magnitude: &'static [&'static str],
    pub altitude: &'static [&'static str],
    pub details: &'static [&'static str],
}

pub const ASTRO_EVENT_FIELDS: AstroEventFields = AstroEventFields {
    name: &["name", "body", "object", "target"],
    kind: &["type", "event_type", "category", "kind"],
    when: &["time", "date", "occursAt", "peak", "instant"],
    magnitude: &["magnitude", "mag"],
    altitude: &["altitude"],
    details: &["note", "description"],
};

impl AstroEventFields {
    /// Maps one upstream entry to an event.
    ///
    /// Entries without a name, a type or a readable time are skipped.
    pub fn to_event(&self, doc: &Map<String, Value>) -> Option<AstroEvent> {
        let name = extract::first_string(doc, self.name);
        let kind = extract::first_string(doc, self.kind);
        if name.is_empty() || kind.is_empty() {
            return None;
        }
        let when = extract::first_timestamp(doc, self.when)?;

        Some(AstroEvent {
            name,
            kind,
            when,
            magnitude: extract::find_f64(doc, self.magnitude),
            altitude: extract::find_f64(doc, self.altitude),
            details: extract::first_string(doc, self.details),
        })
    }
}

fn caption(obs: &str, program: &str, suffix: &str, instruments: &[String]) -> String {
    let mut parts = Vec::new();
    if !obs.is_empty() {
        parts.push(obs.to_string());
    }
    if !program.is_empty() {
        parts.push(format!("P{}", program));
    }
    if !suffix.is_empty() {
        parts.push(suffix.to_string());
    }
    if !instruments.is_empty() {
        parts.push(instruments.join("/"));
    }
    parts.join(" · ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_resolve_top_level_array() {
        let doc = json!({"items": [{"id": "a"}, {"id": "b"}]});
        let items = ItemsPath::new("items").resolve(&doc).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_resolve_nested_path() {
        let doc = json!({"data": {"results": [{"id": "a"}]}});
        let items = ItemsPath::new("data.results").resolve(&doc).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_resolve_skips_non_object_members() {
        let doc = json!({"items": [{"id": "a"}, 3, "x", null, {"id": "b"}]});
        let items = ItemsPath::new("items").resolve(&doc).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn test_missing_segment_is_a_mismatch() {
        let doc = json!({"results": []});
        let err = ItemsPath::new("items").resolve(&doc).unwrap_err();
        assert_eq!(
            err,
            SchemaMismatch::MissingSegment {
                path: "items".to_string(),
                segment: "items".to_string()
            }
        );
    }

    #[test]
    fn test_no_recursive_search_for_items() {
        // Items buried one level deeper than declared are not found
        let doc = json!({"wrapper": {"items": [{"id": "a"}]}});
        assert!(ItemsPath::new("items").resolve(&doc).is_err());
    }

    #[test]
    fn test_non_array_is_a_mismatch() {
        let doc = json!({"items": {"id": "a"}});
        assert_eq!(
            ItemsPath::new("items").resolve(&doc).unwrap_err(),
            SchemaMismatch::NotAnArray {
                path: "items".to_string()
            }
        );
    }

    #[test]
    fn test_root_object_is_single_item() {
        let doc = json!({"id": "only"});
        let items = ItemsPath::root().resolve(&doc).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(ItemsPath::new("").to_string(), "<root>");
    }

    #[test]
    fn test_root_array() {
        let doc = json!([{"id": "a"}, {"id": "b"}]);
        assert_eq!(ItemsPath::root().resolve(&doc).unwrap().len(), 2);
    }

    #[test]
    fn test_catalog_fields_mapping() {
        let doc = json!({
            "uuid": "OSD-42",
            "name": "Plant growth",
            "lifecycle": "released",
            "lastUpdated": "2024-02-01T00:00:00Z"
        });
        let item = CATALOG_FIELDS.to_item(doc.as_object().unwrap());

        assert_eq!(item.dataset_id, "OSD-42");
        assert_eq!(item.title, "Plant growth");
        assert_eq!(item.status, "released");
        assert_eq!(
            item.updated_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(item.raw, doc);
    }

    #[test]
    fn test_catalog_fields_missing_values_default() {
        let item = CATALOG_FIELDS.to_item(json!({"foo": 1}).as_object().unwrap());
        assert!(item.has_empty_key());
        assert_eq!(item.title, "");
        assert_eq!(item.updated_at, None);
    }

    #[test]
    fn test_feed_image_full_mapping() {
        let doc = json!({
            "id": "jw02739-o001",
            "program": "2739",
            "location": "https://example.org/obs/1",
            "thumbnail": "https://example.org/img/1.JPG",
            "details": {
                "suffix": "_i2d",
                "instruments": [{"instrument": "nircam"}, "miri", {"instrument": ""}]
            }
        });
        let image = FEED_IMAGE_FIELDS.to_image(doc.as_object().unwrap()).unwrap();

        assert_eq!(image.url, "https://example.org/img/1.JPG");
        assert_eq!(image.obs, "jw02739-o001");
        assert_eq!(image.program, "2739");
        assert_eq!(image.suffix, "_i2d");
        assert_eq!(image.instruments, vec!["NIRCAM", "MIRI"]);
        assert_eq!(image.link, "https://example.org/obs/1");
        assert_eq!(image.caption, "jw02739-o001 · P2739 · _i2d · NIRCAM/MIRI");
    }

    #[test]
    fn test_feed_image_requires_image_extension() {
        let doc = json!({"url": "https://example.org/file.fits"});
        assert!(FEED_IMAGE_FIELDS.to_image(doc.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_astro_event_mapping() {
        let doc = json!({
            "body": "Moon",
            "event_type": "occultation",
            "peak": "2024-08-12 21:30:00",
            "mag": "-12.6",
            "description": "Occults Saturn"
        });
        let event = ASTRO_EVENT_FIELDS.to_event(doc.as_object().unwrap()).unwrap();

        assert_eq!(event.name, "Moon");
        assert_eq!(event.kind, "occultation");
        assert_eq!(event.when, Utc.with_ymd_and_hms(2024, 8, 12, 21, 30, 0).unwrap());
        assert_eq!(event.magnitude, Some(-12.6));
        assert_eq!(event.altitude, None);
        assert_eq!(event.details, "Occults Saturn");
    }

    #[test]
    fn test_astro_event_requires_name_type_and_time() {
        let no_type = json!({"name": "Mars", "date": "2024-08-13"});
        let no_time = json!({"name": "Mars", "type": "opposition", "date": "soon"});
        assert!(ASTRO_EVENT_FIELDS.to_event(no_type.as_object().unwrap()).is_none());
        assert!(ASTRO_EVENT_FIELDS.to_event(no_time.as_object().unwrap()).is_none());
    }

    #[test]
    fn test_feed_image_link_falls_back_to_url() {
        let doc = json!({"s3_url": "https://bucket/x.png"});
        let image = FEED_IMAGE_FIELDS.to_image(doc.as_object().unwrap()).unwrap();
        assert_eq!(image.link, "https://bucket/x.png");
        assert_eq!(image.caption, "");
    }
}
