//! Drag-and-drop reordering of single poses and whole sections.
//!
//! Both moves capture which section each pose instance belongs to before
//! touching the sequence, move the poses, then rebuild every section's
//! positions by scanning the new order. Positions are never patched
//! incrementally during a move.

use std::collections::HashMap;

use tracing::debug;

use super::errors::{FlowError, FlowResult};
use super::models::{Flow, PoseUid, SectionId};

/// Where a dragged pose or section is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// Just before the pose currently at this position.
    Pose(usize),
    /// Just before the first pose of a section, joining it.
    SectionHeader(SectionId),
    /// After the last pose, ungrouped.
    End,
}

/// Slot a pose removed from `source` is reinserted at so that it lands
/// just before whatever was at `destination`.
///
/// Removing the source shifts later poses left by one, hence the `- 1`
/// when moving forward. `len` is the sequence length before removal.
pub fn insertion_slot(source: usize, destination: usize, len: usize) -> usize {
    let slot = if source < destination {
        destination - 1
    } else {
        destination
    };
    slot.min(len.saturating_sub(1))
}

impl Flow {
    fn capture_membership(&self) -> HashMap<PoseUid, usize> {
        let mut membership = HashMap::new();
        for (index, section) in self.sections.iter().enumerate() {
            for &position in &section.asana_ids {
                if let Some(pose) = self.asanas.get(position) {
                    membership.insert(pose.uid, index);
                }
            }
        }
        membership
    }

    fn rebuild_sections(&mut self, membership: &HashMap<PoseUid, usize>) {
        for section in &mut self.sections {
            section.asana_ids.clear();
        }
        for (position, pose) in self.asanas.iter().enumerate() {
            if let Some(&index) = membership.get(&pose.uid) {
                self.sections[index].asana_ids.push(position);
            }
        }
    }

    /// Moves one pose, returning its new position.
    ///
    /// The pose leaves its current section and joins the section of the
    /// drop target: the section of the pose it is dropped onto, the section
    /// whose header it is dropped onto, or none when dropped at the end.
    pub fn move_pose(&mut self, source: usize, target: DropTarget) -> FlowResult<usize> {
        let len = self.asanas.len();
        if source >= len {
            return Err(FlowError::PositionOutOfRange { position: source, len });
        }

        let (destination, destination_section) = match &target {
            DropTarget::Pose(position) => {
                let position = *position;
                if position >= len {
                    return Err(FlowError::PositionOutOfRange { position, len });
                }
                if position == source {
                    return Err(FlowError::SamePosition);
                }
                (position, self.section_index_of(position))
            }
            DropTarget::SectionHeader(id) => {
                let index = self
                    .section_index(id)
                    .ok_or_else(|| FlowError::UnknownSection(id.clone()))?;
                let section = &self.sections[index];
                if section.contains(source) {
                    return Err(FlowError::AlreadyInSection(section.name.clone()));
                }
                // an empty section adopts the pose where it stands
                let destination = section.first_position().unwrap_or(source);
                (destination, Some(index))
            }
            DropTarget::End => (len, None),
        };

        let slot = if destination == source {
            source
        } else {
            insertion_slot(source, destination, len)
        };

        let moved = self.asanas[source].uid;
        let mut membership = self.capture_membership();
        membership.remove(&moved);

        let pose = self.asanas.remove(source);
        self.asanas.insert(slot, pose);

        if let Some(index) = destination_section {
            membership.insert(moved, index);
        }
        self.rebuild_sections(&membership);
        self.touch();
        debug_assert!(self.is_consistent());

        debug!(flow = %self.flow_id, source, slot, "pose moved");
        Ok(slot)
    }

    /// Moves every pose of a section as one contiguous block, keeping their
    /// relative order. Returns the position of the block's first pose.
    ///
    /// Other sections keep their members by identity, whatever positions
    /// those members end up at.
    pub fn move_section(&mut self, id: &SectionId, target: DropTarget) -> FlowResult<usize> {
        let index = self
            .section_index(id)
            .ok_or_else(|| FlowError::UnknownSection(id.clone()))?;
        let mut positions = self.sections[index].asana_ids.clone();
        positions.sort_unstable();
        if positions.is_empty() {
            return Err(FlowError::EmptySection);
        }

        let len = self.asanas.len();
        let raw_target = match &target {
            DropTarget::Pose(position) => {
                let position = *position;
                if position >= len {
                    return Err(FlowError::PositionOutOfRange { position, len });
                }
                if positions.binary_search(&position).is_ok() {
                    return Err(FlowError::SameSection);
                }
                position
            }
            DropTarget::SectionHeader(other) => {
                let other_index = self
                    .section_index(other)
                    .ok_or_else(|| FlowError::UnknownSection(other.clone()))?;
                if other_index == index {
                    return Err(FlowError::SameSection);
                }
                self.sections[other_index].first_position().unwrap_or(len)
            }
            DropTarget::End => len,
        };

        let membership = self.capture_membership();

        let mut block = Vec::with_capacity(positions.len());
        for &position in positions.iter().rev() {
            block.push(self.asanas.remove(position));
        }
        block.reverse();

        let removed_before = positions.iter().filter(|&&p| p < raw_target).count();
        let insert_at = (raw_target - removed_before).min(self.asanas.len());
        self.asanas.splice(insert_at..insert_at, block);

        self.rebuild_sections(&membership);
        self.touch();
        debug_assert!(self.is_consistent());

        debug!(flow = %self.flow_id, section = %id, insert_at, "section moved");
        Ok(insert_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Pose, SortDirection};

    fn flow_of(names: &[&str]) -> Flow {
        let mut flow = Flow::new("Test");
        for name in names {
            flow.add_pose(Pose::new(*name, 7), SortDirection::Descending);
        }
        flow
    }

    fn names(flow: &Flow) -> Vec<&str> {
        flow.poses().iter().map(|p| p.name.as_str()).collect()
    }

    fn members(flow: &Flow, id: &SectionId) -> Vec<String> {
        flow.section(id)
            .unwrap()
            .asana_ids
            .iter()
            .map(|&p| flow.poses()[p].name.clone())
            .collect()
    }

    #[test]
    fn test_insertion_slot() {
        assert_eq!(insertion_slot(0, 3, 5), 2);
        assert_eq!(insertion_slot(3, 0, 5), 0);
        assert_eq!(insertion_slot(1, 5, 5), 4);
        assert_eq!(insertion_slot(4, 9, 5), 4);
    }

    #[test]
    fn test_move_forward_lands_before_target() {
        let mut flow = flow_of(&["A", "B", "C", "D"]);
        let slot = flow.move_pose(0, DropTarget::Pose(2)).unwrap();
        assert_eq!(slot, 1);
        assert_eq!(names(&flow), vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn test_move_backward_lands_before_target() {
        let mut flow = flow_of(&["A", "B", "C", "D"]);
        let slot = flow.move_pose(3, DropTarget::Pose(1)).unwrap();
        assert_eq!(slot, 1);
        assert_eq!(names(&flow), vec!["A", "D", "B", "C"]);
    }

    #[test]
    fn test_move_to_end() {
        let mut flow = flow_of(&["A", "B", "C"]);
        let id = flow.group_positions("One", &[0]).unwrap();
        flow.move_pose(0, DropTarget::End).unwrap();
        assert_eq!(names(&flow), vec!["B", "C", "A"]);
        assert!(flow.section(&id).unwrap().is_empty());
    }

    #[test]
    fn test_move_rejections_leave_flow_unchanged() {
        let mut flow = flow_of(&["A", "B", "C"]);
        let id = flow.group_positions("One", &[0, 1]).unwrap();

        assert_eq!(flow.move_pose(1, DropTarget::Pose(1)), Err(FlowError::SamePosition));
        assert_eq!(
            flow.move_pose(5, DropTarget::Pose(1)),
            Err(FlowError::PositionOutOfRange { position: 5, len: 3 })
        );
        assert_eq!(
            flow.move_pose(0, DropTarget::Pose(7)),
            Err(FlowError::PositionOutOfRange { position: 7, len: 3 })
        );
        assert_eq!(
            flow.move_pose(1, DropTarget::SectionHeader(id.clone())),
            Err(FlowError::AlreadyInSection("One".to_string()))
        );
        assert_eq!(names(&flow), vec!["A", "B", "C"]);
        assert_eq!(flow.section(&id).unwrap().asana_ids, vec![0, 1]);
    }

    #[test]
    fn test_move_into_section_by_dropping_on_member() {
        let mut flow = flow_of(&["A", "B", "C", "D"]);
        let id = flow.group_positions("Core", &[1, 2]).unwrap();
        flow.move_pose(3, DropTarget::Pose(2)).unwrap();
        assert_eq!(names(&flow), vec!["A", "B", "D", "C"]);
        assert_eq!(members(&flow, &id), vec!["B", "D", "C"]);
    }

    #[test]
    fn test_move_out_of_section_onto_ungrouped() {
        let mut flow = flow_of(&["A", "B", "C", "D"]);
        let id = flow.group_positions("Core", &[0, 1]).unwrap();
        flow.move_pose(0, DropTarget::Pose(3)).unwrap();
        assert_eq!(names(&flow), vec!["B", "C", "A", "D"]);
        assert_eq!(members(&flow, &id), vec!["B"]);
    }

    #[test]
    fn test_move_onto_section_header_becomes_first_member() {
        let mut flow = flow_of(&["A", "B", "C", "D"]);
        let id = flow.group_positions("Tail", &[2, 3]).unwrap();

        flow.move_pose(0, DropTarget::SectionHeader(id.clone())).unwrap();
        assert_eq!(names(&flow), vec!["B", "A", "C", "D"]);
        assert_eq!(members(&flow, &id), vec!["A", "C", "D"]);
    }

    #[test]
    fn test_move_onto_empty_section_header_keeps_place() {
        let mut flow = flow_of(&["A", "B", "C"]);
        let id = flow.create_section("Empty");
        flow.move_pose(1, DropTarget::SectionHeader(id.clone())).unwrap();
        assert_eq!(names(&flow), vec!["A", "B", "C"]);
        assert_eq!(members(&flow, &id), vec!["B"]);
    }

    #[test]
    fn test_move_keeps_other_sections_by_identity() {
        let mut flow = flow_of(&["A", "B", "C", "D", "E", "F"]);
        let first = flow.group_positions("First", &[0, 1]).unwrap();
        let last = flow.group_positions("Last", &[4, 5]).unwrap();

        flow.move_pose(5, DropTarget::Pose(0)).unwrap();
        assert_eq!(names(&flow), vec!["F", "A", "B", "C", "D", "E"]);
        assert_eq!(members(&flow, &first), vec!["F", "A", "B"]);
        assert_eq!(members(&flow, &last), vec!["E"]);
        assert!(flow.is_consistent());
    }

    #[test]
    fn test_move_and_back_restores_order() {
        let mut flow = flow_of(&["A", "B", "C", "D", "E"]);
        let original: Vec<String> = names(&flow).iter().map(|s| s.to_string()).collect();

        let slot = flow.move_pose(1, DropTarget::Pose(4)).unwrap();
        assert_eq!(names(&flow), vec!["A", "C", "D", "B", "E"]);
        // back in front of its old neighbour C
        let c = flow.poses().iter().position(|p| p.name == "C").unwrap();
        flow.move_pose(slot, DropTarget::Pose(c)).unwrap();
        assert_eq!(names(&flow), original);
    }

    #[test]
    fn test_section_block_move_before_first_pose() {
        let mut flow = flow_of(&["A", "B", "C", "D", "E", "F"]);
        let block = flow.group_positions("Block", &[2, 3, 5]).unwrap();
        let other = flow.group_positions("Other", &[1, 4]).unwrap();

        let start = flow.move_section(&block, DropTarget::Pose(0)).unwrap();
        assert_eq!(start, 0);
        assert_eq!(names(&flow), vec!["C", "D", "F", "A", "B", "E"]);
        assert_eq!(members(&flow, &block), vec!["C", "D", "F"]);
        assert_eq!(members(&flow, &other), vec!["B", "E"]);
        assert_eq!(flow.section(&block).unwrap().asana_ids, vec![0, 1, 2]);
        assert!(flow.is_consistent());
    }

    #[test]
    fn test_section_block_move_forward() {
        let mut flow = flow_of(&["A", "B", "C", "D", "E"]);
        let block = flow.group_positions("Block", &[0, 1]).unwrap();
        let start = flow.move_section(&block, DropTarget::Pose(4)).unwrap();
        assert_eq!(start, 2);
        assert_eq!(names(&flow), vec!["C", "D", "A", "B", "E"]);
        assert_eq!(members(&flow, &block), vec!["A", "B"]);
    }

    #[test]
    fn test_section_block_move_onto_section_header() {
        let mut flow = flow_of(&["A", "B", "C", "D", "E"]);
        let head = flow.group_positions("Head", &[1, 2]).unwrap();
        let tail = flow.group_positions("Tail", &[4]).unwrap();

        flow.move_section(&tail, DropTarget::SectionHeader(head.clone())).unwrap();
        assert_eq!(names(&flow), vec!["A", "E", "B", "C", "D"]);
        assert_eq!(members(&flow, &head), vec!["B", "C"]);
        assert_eq!(members(&flow, &tail), vec!["E"]);
    }

    #[test]
    fn test_section_block_move_to_end() {
        let mut flow = flow_of(&["A", "B", "C"]);
        let block = flow.group_positions("Block", &[0]).unwrap();
        assert_eq!(flow.move_section(&block, DropTarget::End).unwrap(), 2);
        assert_eq!(names(&flow), vec!["B", "C", "A"]);
    }

    #[test]
    fn test_section_move_rejections() {
        let mut flow = flow_of(&["A", "B", "C"]);
        let block = flow.group_positions("Block", &[0, 1]).unwrap();
        let empty = flow.create_section("Empty");

        assert_eq!(flow.move_section(&empty, DropTarget::Pose(0)), Err(FlowError::EmptySection));
        assert_eq!(flow.move_section(&block, DropTarget::Pose(1)), Err(FlowError::SameSection));
        assert_eq!(
            flow.move_section(&block, DropTarget::SectionHeader(block.clone())),
            Err(FlowError::SameSection)
        );
        assert_eq!(names(&flow), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_invariant_holds_under_mixed_operations() {
        let mut flow = flow_of(&["A", "B", "C", "D", "E", "F", "G", "H"]);
        let one = flow.group_positions("One", &[0, 3, 5]).unwrap();
        let two = flow.group_positions("Two", &[1, 6]).unwrap();

        // deterministic pseudo-random walk over the operation set
        let mut seed: u64 = 0x5eed;
        let mut next = |bound: usize| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) as usize) % bound.max(1)
        };

        for step in 0..400 {
            let len = flow.len();
            match step % 6 {
                0 => {
                    let _ = flow.move_pose(next(len), DropTarget::Pose(next(len)));
                }
                1 => {
                    let id = if next(2) == 0 { &one } else { &two };
                    let _ = flow.move_section(id, DropTarget::Pose(next(len)));
                }
                2 => {
                    flow.add_pose(Pose::new("N", 7), SortDirection::Ascending);
                }
                3 if len > 2 => {
                    let _ = flow.remove_at(next(len));
                }
                4 => {
                    let id = if next(2) == 0 { &one } else { &two };
                    let _ = flow.move_pose(next(len), DropTarget::SectionHeader(id.clone()));
                }
                _ => {
                    let _ = flow.add_to_section(&one, &[next(len)]);
                }
            }
            assert!(flow.is_consistent(), "invariant broken at step {step}");
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut flow = Flow::new("Scenario");
        for name in ["A", "B", "C", "D"] {
            flow.add_pose(Pose::new(name, 7), SortDirection::Ascending);
        }
        assert_eq!(names(&flow), vec!["D", "C", "B", "A"]);

        let warmup = flow.group_positions("Warmup", &[0, 1]).unwrap();
        assert_eq!(members(&flow, &warmup), vec!["D", "C"]);

        let a = 3;
        let b = 2;
        flow.move_pose(a, DropTarget::Pose(b)).unwrap();
        assert_eq!(names(&flow), vec!["D", "C", "A", "B"]);
        assert_eq!(members(&flow, &warmup), vec!["D", "C"]);
        assert_eq!(flow.time, 28);
    }
}
