//! Request body parsing for lifecycle operations.
//!
//! Bodies arrive as loose JSON objects. A required field is missing when it
//! is absent, null or an empty string; `size` may be sent as a JSON string or
//! number but must hold a positive integer.

use serde_json::{Map, Value, json};

use crate::error::LifecycleError;

pub type Body = Map<String, Value>;

/// Parsed `POST /volumes` body
#[derive(Debug, Clone, PartialEq)]
pub struct CreateVolume {
    pub name: String,
    pub size: i64,
    pub description: Option<String>,
    pub image_id: Option<String>,
    pub snapshot_id: Option<String>,
    pub metadata: Option<Value>,
}

/// Parsed `POST /volumes/snapshot` body
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotVolume {
    pub display_name: String,
    pub volume_id: String,
    pub size: i64,
    pub description: Option<String>,
    pub snapshot_id: Option<String>,
    pub metadata: Option<Value>,
}

/// Where a boot request takes its source from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Image(String),
    Snapshot(String),
    Volume(String),
}

/// Parsed `POST /volumes/boot` body
#[derive(Debug, Clone, PartialEq)]
pub struct BootVolume {
    pub name: String,
    pub size_id: String,
    pub source: SourceRef,
    /// Remaining body fields, forwarded to the provider
    pub extra: Body,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Required keys that are absent, null or empty, in the order given
pub fn missing_fields(body: &Body, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|key| body.get(**key).is_none_or(is_blank))
        .map(|key| key.to_string())
        .collect()
}

fn require(body: &Body, required: &[&str]) -> Result<(), LifecycleError> {
    let missing = missing_fields(body, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(LifecycleError::MissingFields(missing))
    }
}

/// Read a positive integer size from a JSON string or number
/// Largest size the `volumes.size` column holds
pub const MAX_SIZE_GB: i64 = i32::MAX as i64;

pub fn parse_size(value: &Value) -> Result<i64, LifecycleError> {
    let parsed = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match parsed {
        Some(size) if size > MAX_SIZE_GB => Err(LifecycleError::Validation {
            message: format!("Invalid size {}: must not exceed {} GB", value, MAX_SIZE_GB),
            details: Some(json!({
                "size": [format!("Ensure this value is less than or equal to {}.", MAX_SIZE_GB)]
            })),
        }),
        Some(size) if size > 0 => Ok(size),
        _ => Err(LifecycleError::Validation {
            message: format!("Invalid size {}: must be a positive integer", value),
            details: Some(json!({ "size": ["A positive integer is required."] })),
        }),
    }
}

/// Optional string field; blank values count as absent
fn optional_string(body: &Body, key: &str) -> Option<String> {
    match body.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn required_string(body: &Body, key: &str) -> String {
    optional_string(body, key).unwrap_or_default()
}

fn metadata(body: &Body) -> Option<Value> {
    body.get("metadata").filter(|value| !value.is_null()).cloned()
}

pub fn parse_create_volume(body: &Body) -> Result<CreateVolume, LifecycleError> {
    require(body, &["name", "size"])?;
    let size = parse_size(&body["size"])?;

    Ok(CreateVolume {
        name: required_string(body, "name"),
        size,
        description: optional_string(body, "description"),
        image_id: optional_string(body, "image_id").or_else(|| optional_string(body, "image")),
        snapshot_id: optional_string(body, "snapshot_id")
            .or_else(|| optional_string(body, "snapshot")),
        metadata: metadata(body),
    })
}

pub fn parse_snapshot_volume(body: &Body) -> Result<SnapshotVolume, LifecycleError> {
    require(body, &["display_name", "volume_id", "size"])?;
    let size = parse_size(&body["size"])?;

    Ok(SnapshotVolume {
        display_name: required_string(body, "display_name"),
        volume_id: required_string(body, "volume_id"),
        size,
        description: optional_string(body, "description"),
        snapshot_id: optional_string(body, "snapshot_id"),
        metadata: metadata(body),
    })
}

/// Parse a boot body. Source precedence: `image_id`, `snapshot_id`, body
/// `volume_id`, then the volume named in the path.
pub fn parse_boot_volume(
    mut body: Body,
    path_volume_id: Option<&str>,
) -> Result<BootVolume, LifecycleError> {
    require(&body, &["name", "size"])?;

    let name = required_string(&body, "name");
    let size_id = required_string(&body, "size");
    body.remove("name");
    body.remove("size");

    let image = optional_string(&body, "image_id");
    let snapshot = optional_string(&body, "snapshot_id");
    let volume = optional_string(&body, "volume_id");
    for key in ["image_id", "snapshot_id", "volume_id"] {
        body.remove(key);
    }

    let source = if let Some(id) = image {
        SourceRef::Image(id)
    } else if let Some(id) = snapshot {
        SourceRef::Snapshot(id)
    } else if let Some(id) = volume {
        SourceRef::Volume(id)
    } else if let Some(id) = path_volume_id.filter(|id| !id.trim().is_empty()) {
        SourceRef::Volume(id.to_string())
    } else {
        return Err(LifecycleError::MissingSource);
    };

    Ok(BootVolume {
        name,
        size_id,
        source,
        extra: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: Value) -> Body {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_fields_treats_blank_as_missing() {
        let data = body(json!({"name": "", "size": null, "other": 1}));
        assert_eq!(missing_fields(&data, &["name", "size"]), vec!["name", "size"]);

        let data = body(json!({"name": "v1", "size": 10}));
        assert!(missing_fields(&data, &["name", "size"]).is_empty());
    }

    #[test]
    fn test_size_accepts_strings_and_numbers() {
        assert_eq!(parse_size(&json!("10")).unwrap(), 10);
        assert_eq!(parse_size(&json!(10)).unwrap(), 10);
        assert_eq!(parse_size(&json!(" 7 ")).unwrap(), 7);
        assert!(parse_size(&json!("0")).is_err());
        assert!(parse_size(&json!(-3)).is_err());
        assert!(parse_size(&json!("ten")).is_err());
        assert!(parse_size(&json!(1.5)).is_err());
    }

    #[test]
    fn test_size_is_bounded_by_column_width() {
        assert_eq!(parse_size(&json!(MAX_SIZE_GB)).unwrap(), MAX_SIZE_GB);
        let err = parse_size(&json!("9223372036854775807")).unwrap_err();
        match err {
            LifecycleError::Validation { details, .. } => {
                assert!(details.unwrap()["size"].is_array())
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_create_volume_accepts_image_alias() {
        let parsed =
            parse_create_volume(&body(json!({"name": "v", "size": "999", "image": "img1"})))
                .unwrap();
        assert_eq!(parsed.image_id.as_deref(), Some("img1"));
        assert_eq!(parsed.size, 999);
    }

    #[test]
    fn test_create_volume_reports_missing_fields() {
        let err = parse_create_volume(&body(json!({"image": "img1"}))).unwrap_err();
        assert!(matches!(err, LifecycleError::MissingFields(ref f) if f == &["name", "size"]));
    }

    #[test]
    fn test_boot_source_precedence() {
        let all = json!({
            "name": "vm", "size": "m1.small",
            "image_id": "img", "snapshot_id": "snap", "volume_id": "vol"
        });
        let parsed = parse_boot_volume(body(all), Some("path-vol")).unwrap();
        assert_eq!(parsed.source, SourceRef::Image("img".into()));

        let no_image = json!({"name": "vm", "size": "m1.small", "snapshot_id": "snap", "volume_id": "vol"});
        let parsed = parse_boot_volume(body(no_image), Some("path-vol")).unwrap();
        assert_eq!(parsed.source, SourceRef::Snapshot("snap".into()));

        let body_volume = json!({"name": "vm", "size": "m1.small", "volume_id": "vol"});
        let parsed = parse_boot_volume(body(body_volume), Some("path-vol")).unwrap();
        assert_eq!(parsed.source, SourceRef::Volume("vol".into()));

        let path_only = json!({"name": "vm", "size": "m1.small"});
        let parsed = parse_boot_volume(body(path_only), Some("path-vol")).unwrap();
        assert_eq!(parsed.source, SourceRef::Volume("path-vol".into()));
    }

    #[test]
    fn test_boot_without_source_fails() {
        let err = parse_boot_volume(body(json!({"name": "vm", "size": "m1.small"})), None)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::MissingSource));
    }

    #[test]
    fn test_boot_forwards_remaining_fields() {
        let parsed = parse_boot_volume(
            body(json!({"name": "vm", "size": "m1.small", "image_id": "img", "key_name": "k"})),
            None,
        )
        .unwrap();
        assert_eq!(parsed.extra.len(), 1);
        assert_eq!(parsed.extra["key_name"], "k");
    }
}
