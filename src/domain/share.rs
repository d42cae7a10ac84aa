//! Share codes and file import/export of flows.
//!
//! The share format carries a reduced set of pose fields; the rest is
//! filled back in from the catalog on import. Imports are untrusted: the
//! payload is size-capped, stripped of dangerous keys, validated, and
//! sanitized before any flow is built.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::catalog::PoseCatalog;
use super::errors::{ImportError, ImportResult};
use super::models::{DEFAULT_DURATION, Flow, MAX_DURATION, Pose, Section, Side};

pub const MAX_IMPORT_BYTES: usize = 100 * 1024;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1000;
pub const MAX_IMPORT_POSES: usize = 500;

const DANGEROUS_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedPose {
    pub name: String,
    pub sanskrit: String,
    pub side: Side,
    pub duration: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedSection {
    pub name: String,
    pub asana_ids: Vec<usize>,
}

/// The portable form of a flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedFlow {
    pub name: String,
    pub description: String,
    pub time: u32,
    pub asanas: Vec<SharedPose>,
    pub sections: Vec<SharedSection>,
}

impl From<&Flow> for SharedFlow {
    fn from(flow: &Flow) -> Self {
        Self {
            name: flow.name.clone(),
            description: flow.description.clone(),
            time: flow.time,
            asanas: flow
                .poses()
                .iter()
                .map(|p| SharedPose {
                    name: p.name.clone(),
                    sanskrit: p.sanskrit.clone(),
                    side: p.side,
                    duration: p.duration,
                })
                .collect(),
            sections: flow
                .sections()
                .iter()
                .map(|s| SharedSection {
                    name: s.name.clone(),
                    asana_ids: s.asana_ids.clone(),
                })
                .collect(),
        }
    }
}

pub struct ShareCodec;

impl ShareCodec {
    /// Pretty JSON for `.flow` / `.json` downloads.
    pub fn to_json(flow: &Flow) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&SharedFlow::from(flow))
    }

    /// Base64 share code for copy and paste.
    pub fn encode(flow: &Flow) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(&SharedFlow::from(flow))?;
        Ok(STANDARD.encode(json))
    }

    /// Decodes a share code into a new flow.
    pub fn decode(code: &str, catalog: &PoseCatalog) -> ImportResult<Flow> {
        let code: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        check_size(code.len())?;
        let bytes = STANDARD.decode(code.as_bytes())?;
        let text = String::from_utf8(bytes)?;
        Self::from_json(&text, catalog)
    }

    /// Validates an exported JSON document and builds a new flow from it.
    pub fn from_json(text: &str, catalog: &PoseCatalog) -> ImportResult<Flow> {
        check_size(text.len())?;
        let mut value: Value = serde_json::from_str(text)?;
        strip_dangerous_keys(&mut value);
        let flow = build_flow(&value, catalog).inspect_err(|e| warn!(error = %e, "import rejected"))?;
        info!(flow = %flow.name, poses = flow.len(), "flow imported");
        Ok(flow)
    }
}

fn check_size(size: usize) -> ImportResult<()> {
    if size > MAX_IMPORT_BYTES {
        return Err(ImportError::TooLarge {
            size,
            limit: MAX_IMPORT_BYTES,
        });
    }
    Ok(())
}

/// Removes prototype-polluting keys at every depth.
pub fn strip_dangerous_keys(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !DANGEROUS_KEYS.contains(&key.as_str()));
            for child in map.values_mut() {
                strip_dangerous_keys(child);
            }
        }
        Value::Array(items) => {
            for child in items {
                strip_dangerous_keys(child);
            }
        }
        _ => {}
    }
}

/// Drops angle brackets, trims, and caps the length in characters.
pub fn sanitize_text(text: &str, max_len: usize) -> String {
    text.chars()
        .filter(|c| *c != '<' && *c != '>')
        .collect::<String>()
        .trim()
        .chars()
        .take(max_len)
        .collect()
}

fn text_field(object: &Map<String, Value>, key: &str, max_len: usize) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(|s| sanitize_text(s, max_len))
        .unwrap_or_default()
}

fn import_duration(value: Option<&Value>) -> u32 {
    match value {
        None => DEFAULT_DURATION,
        Some(v) => match v.as_f64() {
            Some(s) if s.is_finite() => s.round().clamp(0.0, MAX_DURATION as f64) as u32,
            _ => 0,
        },
    }
}

fn build_flow(value: &Value, catalog: &PoseCatalog) -> ImportResult<Flow> {
    let Some(root) = value.as_object() else {
        return Err(ImportError::Invalid(vec![
            "payload must be a JSON object".to_string(),
        ]));
    };

    let mut reasons = Vec::new();

    let name = text_field(root, "name", MAX_NAME_LEN);
    if name.is_empty() {
        reasons.push("missing required field 'name'".to_string());
    }

    let raw_poses = match root.get("asanas").and_then(Value::as_array) {
        Some(items) => items.as_slice(),
        None => {
            reasons.push("missing required field 'asanas' (array)".to_string());
            &[]
        }
    };
    if raw_poses.len() > MAX_IMPORT_POSES {
        reasons.push(format!(
            "too many poses: {} (limit {MAX_IMPORT_POSES})",
            raw_poses.len()
        ));
    }

    let mut poses = Vec::with_capacity(raw_poses.len());
    for (index, raw) in raw_poses.iter().enumerate().take(MAX_IMPORT_POSES) {
        let Some(object) = raw.as_object() else {
            reasons.push(format!("pose {}: not an object", index + 1));
            continue;
        };
        let pose_name = text_field(object, "name", MAX_NAME_LEN);
        if pose_name.is_empty() {
            reasons.push(format!("pose {}: missing name", index + 1));
            continue;
        }
        let mut pose = Pose::new(pose_name, import_duration(object.get("duration")));
        pose.sanskrit = text_field(object, "sanskrit", MAX_NAME_LEN);
        pose.side = Side::from(text_field(object, "side", 16).as_str());
        catalog.enrich(&mut pose);
        poses.push(pose);
    }

    if !reasons.is_empty() {
        return Err(ImportError::Invalid(reasons));
    }

    let sections = root
        .get("sections")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|object| {
                    let mut name = text_field(object, "name", MAX_NAME_LEN);
                    if name.is_empty() {
                        name = "Section".to_string();
                    }
                    let mut section = Section::new(name);
                    section.asana_ids = object
                        .get("asanaIds")
                        .and_then(Value::as_array)
                        .map(|ids| {
                            ids.iter()
                                .filter_map(Value::as_u64)
                                .filter_map(|id| usize::try_from(id).ok())
                                .collect()
                        })
                        .unwrap_or_default();
                    section
                })
                .collect()
        })
        .unwrap_or_default();

    let description = text_field(root, "description", MAX_DESCRIPTION_LEN);
    // normalization filters section positions to in-range, non-overlapping ones
    Ok(Flow::from_parts(name, description, poses, sections))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SortDirection;
    use serde_json::json;

    fn sample_flow() -> Flow {
        let catalog = PoseCatalog::builtin();
        let mut flow = Flow::new("Sunrise");
        flow.description = "Gentle start".to_string();
        for name in ["Mountain", "Chair", "Tree"] {
            let pose = catalog.get(name).unwrap().clone();
            flow.add_pose(pose, SortDirection::Descending);
        }
        flow.set_side(2, Side::Left).unwrap();
        flow.group_positions("Standing", &[0, 1]).unwrap();
        flow
    }

    #[test]
    fn test_share_code_round_trip() {
        let catalog = PoseCatalog::builtin();
        let flow = sample_flow();
        let code = ShareCodec::encode(&flow).unwrap();
        let imported = ShareCodec::decode(&code, &catalog).unwrap();

        assert_eq!(imported.name, "Sunrise");
        assert_eq!(imported.description, "Gentle start");
        assert_ne!(imported.flow_id, flow.flow_id);
        let names: Vec<&str> = imported.poses().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Mountain", "Chair", "Tree"]);
        assert_eq!(imported.poses()[2].side, Side::Left);
        assert_eq!(imported.poses()[0].sanskrit, "Tadasana");
        assert!(!imported.poses()[0].tags.is_empty());
        assert_eq!(imported.sections()[0].asana_ids, vec![0, 1]);
        assert_eq!(imported.time, flow.time);
    }

    #[test]
    fn test_share_code_tolerates_whitespace() {
        let catalog = PoseCatalog::builtin();
        let code = ShareCodec::encode(&sample_flow()).unwrap();
        let wrapped = format!("  {}\n{}  ", &code[..10], &code[10..]);
        assert!(ShareCodec::decode(&wrapped, &catalog).is_ok());
    }

    #[test]
    fn test_invalid_base64() {
        let catalog = PoseCatalog::builtin();
        assert!(matches!(
            ShareCodec::decode("not*base64!", &catalog),
            Err(ImportError::Decode(_))
        ));
    }

    #[test]
    fn test_missing_required_fields_are_listed() {
        let catalog = PoseCatalog::builtin();
        let err = ShareCodec::from_json(r#"{"description":"x"}"#, &catalog).unwrap_err();
        let ImportError::Invalid(reasons) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(reasons.len(), 2);
        assert!(reasons[0].contains("name"));
        assert!(reasons[1].contains("asanas"));
    }

    #[test]
    fn test_non_object_payload() {
        let catalog = PoseCatalog::builtin();
        assert!(matches!(
            ShareCodec::from_json("[1,2,3]", &catalog),
            Err(ImportError::Invalid(_))
        ));
    }

    #[test]
    fn test_oversized_payload() {
        let catalog = PoseCatalog::builtin();
        let big = "x".repeat(MAX_IMPORT_BYTES + 1);
        assert!(matches!(
            ShareCodec::from_json(&big, &catalog),
            Err(ImportError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_sanitizes_and_clamps() {
        let catalog = PoseCatalog::builtin();
        let payload = json!({
            "name": "<script>Evil</script> Flow",
            "description": "d".repeat(5000),
            "asanas": [
                {"name": "Mystery <b>", "duration": 9999},
                {"name": "Tree", "duration": -3},
                {"name": "Plank"}
            ],
            "sections": [
                {"name": "A", "asanaIds": [0, 1, 7]},
                {"name": "B", "asanaIds": [1, 2]}
            ]
        });
        let flow = ShareCodec::from_json(&payload.to_string(), &catalog).unwrap();

        assert_eq!(flow.name, "scriptEvil/script Flow");
        assert_eq!(flow.description.chars().count(), MAX_DESCRIPTION_LEN);
        assert_eq!(flow.poses()[0].name, "Mystery b");
        assert_eq!(flow.poses()[0].duration, MAX_DURATION);
        assert_eq!(flow.poses()[1].duration, 0);
        assert_eq!(flow.poses()[2].duration, DEFAULT_DURATION);
        assert_eq!(flow.sections()[0].asana_ids, vec![0, 1]);
        assert_eq!(flow.sections()[1].asana_ids, vec![2]);
        assert!(flow.is_consistent());
    }

    #[test]
    fn test_dangerous_keys_are_stripped() {
        let mut value = json!({
            "name": "x",
            "__proto__": {"polluted": true},
            "asanas": [{"name": "Tree", "constructor": {"prototype": 1}}]
        });
        strip_dangerous_keys(&mut value);
        assert!(value.get("__proto__").is_none());
        assert!(value["asanas"][0].get("constructor").is_none());
    }

    #[test]
    fn test_bad_pose_entries_abort_import() {
        let catalog = PoseCatalog::builtin();
        let payload = json!({"name": "x", "asanas": [{"name": "Tree"}, 5, {"duration": 3}]});
        let Err(ImportError::Invalid(reasons)) =
            ShareCodec::from_json(&payload.to_string(), &catalog)
        else {
            panic!("expected validation failure");
        };
        assert_eq!(reasons, vec!["pose 2: not an object", "pose 3: missing name"]);
    }

    #[test]
    fn test_to_json_is_reduced_shape() {
        let json = ShareCodec::to_json(&sample_flow()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert!(value["asanas"][0].get("image").is_none());
        assert_eq!(value["asanas"][2]["side"], "Left");
        assert_eq!(value["sections"][0]["asanaIds"], json!([0, 1]));
    }
}
