//! The read-only list of poses a flow can be built from.

use std::collections::BTreeSet;

use tracing::warn;

use super::models::Pose;

const BUILTIN_POSES: &str = include_str!("../../assets/poses.json");

/// Available poses, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct PoseCatalog {
    poses: Vec<Pose>,
}

impl PoseCatalog {
    /// The catalog shipped with the binary.
    pub fn builtin() -> Self {
        match Self::from_json(BUILTIN_POSES) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "built-in pose catalog is unreadable");
                Self::default()
            }
        }
    }

    /// Parses a JSON array of poses. Entries without a name are skipped.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut poses: Vec<Pose> = serde_json::from_str(json)?;
        poses.retain(|p| !p.name.trim().is_empty());
        Ok(Self { poses })
    }

    pub fn from_poses(poses: Vec<Pose>) -> Self {
        Self { poses }
    }

    pub fn poses(&self) -> &[Pose] {
        &self.poses
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Case-insensitive lookup by name.
    pub fn get(&self, name: &str) -> Option<&Pose> {
        let name = name.trim();
        self.poses.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Poses whose name, alternate name or tags contain `query`.
    pub fn search(&self, query: &str) -> Vec<&Pose> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return self.poses.iter().collect();
        }
        self.poses
            .iter()
            .filter(|p| {
                p.name.to_lowercase().contains(&query)
                    || p.sanskrit.to_lowercase().contains(&query)
                    || p.tags.iter().any(|t| t.to_lowercase().contains(&query))
            })
            .collect()
    }

    pub fn tags(&self) -> BTreeSet<String> {
        self.poses
            .iter()
            .flat_map(|p| p.tags.iter().map(|t| t.to_lowercase()))
            .collect()
    }

    pub fn with_tag(&self, tag: &str) -> Vec<&Pose> {
        self.poses.iter().filter(|p| p.has_tag(tag)).collect()
    }

    /// Catalog poses suggested to follow `pose`, in the order listed.
    pub fn suggestions_for(&self, pose: &Pose) -> Vec<&Pose> {
        pose.transitions_asana
            .iter()
            .filter_map(|name| self.get(name))
            .collect()
    }

    /// Fills display metadata of a pose from its catalog entry, keeping the
    /// fields that describe how it is held in the flow.
    pub fn enrich(&self, pose: &mut Pose) {
        let Some(entry) = self.get(&pose.name) else {
            return;
        };
        pose.name = entry.name.clone();
        if pose.sanskrit.is_empty() {
            pose.sanskrit = entry.sanskrit.clone();
        }
        pose.image = entry.image.clone();
        pose.description = entry.description.clone();
        pose.difficulty = entry.difficulty.clone();
        pose.tags = entry.tags.clone();
        pose.transitions_asana = entry.transitions_asana.clone();
        pose.chakra = entry.chakra.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Side;

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = PoseCatalog::builtin();
        assert!(catalog.len() > 30);
        assert!(catalog.get("mountain").is_some());
        assert!(catalog.poses().iter().all(|p| p.duration > 0));
    }

    #[test]
    fn test_search_matches_name_sanskrit_and_tags() {
        let catalog = PoseCatalog::builtin();
        assert!(catalog.search("tadasana").iter().any(|p| p.name == "Mountain"));
        assert!(catalog.search("WARRIOR").len() >= 3);
        assert!(catalog.search("hip opener").iter().any(|p| p.name == "Pigeon"));
        assert_eq!(catalog.search("").len(), catalog.len());
        assert!(catalog.search("no such pose").is_empty());
    }

    #[test]
    fn test_suggestions_follow_transitions() {
        let catalog = PoseCatalog::builtin();
        let plank = catalog.get("Plank").unwrap();
        let names: Vec<&str> = catalog
            .suggestions_for(plank)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Four-Limbed Staff", "Downward-Facing Dog", "Side Plank"]);
    }

    #[test]
    fn test_tags() {
        let catalog = PoseCatalog::builtin();
        assert!(catalog.tags().contains("balance"));
        assert!(catalog.with_tag("Balance").iter().any(|p| p.name == "Tree"));
    }

    #[test]
    fn test_enrich_keeps_flow_fields() {
        let catalog = PoseCatalog::builtin();
        let mut pose = Pose::new("tree", 42);
        pose.side = Side::Left;
        catalog.enrich(&mut pose);
        assert_eq!(pose.name, "Tree");
        assert_eq!(pose.sanskrit, "Vrksasana");
        assert_eq!(pose.duration, 42);
        assert_eq!(pose.side, Side::Left);
        assert!(!pose.tags.is_empty());
    }

    #[test]
    fn test_from_json_skips_unnamed() {
        let catalog = PoseCatalog::from_json(r#"[{"name":"A"},{"name":"  "}]"#).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(PoseCatalog::from_json("{}").is_err());
    }
}
