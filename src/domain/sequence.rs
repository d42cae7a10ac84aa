//! Insert, remove and grouping operations on a flow's pose sequence.
//!
//! Every operation keeps section positions valid: inserting shifts later
//! positions up, removing drops the position and shifts later ones down,
//! and grouping refuses to put a pose in two sections.

use tracing::debug;

use super::errors::{FlowError, FlowResult};
use super::models::{clamp_duration, Flow, Pose, Section, SectionId, Side, SortDirection};

impl Flow {
    fn check_position(&self, position: usize) -> FlowResult<()> {
        if position < self.asanas.len() {
            Ok(())
        } else {
            Err(FlowError::PositionOutOfRange {
                position,
                len: self.asanas.len(),
            })
        }
    }

    fn after_mutation(&mut self) {
        self.calculate_total_duration();
        self.touch();
        debug_assert!(self.is_consistent());
    }

    /// Inserts a pose at the row shown first under `direction` and returns
    /// its position.
    pub fn add_pose(&mut self, pose: Pose, direction: SortDirection) -> usize {
        let position = match direction {
            SortDirection::Ascending => 0,
            SortDirection::Descending => self.asanas.len(),
        };
        self.insert_pose(position, pose);
        self.after_mutation();
        debug!(flow = %self.flow_id, position, "pose added");
        position
    }

    fn insert_pose(&mut self, position: usize, mut pose: Pose) {
        pose.uid = self.allocate_uid();
        pose.selected = false;
        pose.duration = clamp_duration(pose.duration);
        self.asanas.insert(position, pose);
        for section in &mut self.sections {
            for id in &mut section.asana_ids {
                if *id >= position {
                    *id += 1;
                }
            }
        }
    }

    /// Removes the pose at `position`, returning it.
    pub fn remove_at(&mut self, position: usize) -> FlowResult<Pose> {
        self.check_position(position)?;
        let pose = self.asanas.remove(position);
        for section in &mut self.sections {
            section.asana_ids.retain(|&id| id != position);
            for id in &mut section.asana_ids {
                if *id > position {
                    *id -= 1;
                }
            }
        }
        self.after_mutation();
        debug!(flow = %self.flow_id, position, pose = %pose.name, "pose removed");
        Ok(pose)
    }

    /// Removes every selected pose and returns how many were removed.
    pub fn remove_selected(&mut self) -> usize {
        let positions = self.selected_positions();
        for &position in positions.iter().rev() {
            // positions come from the current sequence, descending
            let _ = self.remove_at(position);
        }
        positions.len()
    }

    /// Inserts a copy of a pose right after it, in the same section.
    pub fn duplicate_at(&mut self, position: usize) -> FlowResult<usize> {
        self.check_position(position)?;
        let copy = self.asanas[position].clone();
        let section = self.section_index_of(position);
        let target = position + 1;
        self.insert_pose(target, copy);
        if let Some(index) = section {
            let ids = &mut self.sections[index].asana_ids;
            let slot = ids.partition_point(|&id| id < target);
            ids.insert(slot, target);
        }
        self.after_mutation();
        Ok(target)
    }

    /// Sets a pose's hold time, clipped to the accepted range.
    pub fn set_duration(&mut self, position: usize, seconds: u32) -> FlowResult<u32> {
        self.check_position(position)?;
        let seconds = clamp_duration(seconds);
        self.asanas[position].duration = seconds;
        self.after_mutation();
        Ok(seconds)
    }

    pub fn set_side(&mut self, position: usize, side: Side) -> FlowResult<()> {
        self.check_position(position)?;
        self.asanas[position].side = side;
        self.touch();
        Ok(())
    }

    pub fn toggle_selected(&mut self, position: usize) -> FlowResult<bool> {
        self.check_position(position)?;
        let pose = &mut self.asanas[position];
        pose.selected = !pose.selected;
        Ok(pose.selected)
    }

    pub fn selected_positions(&self) -> Vec<usize> {
        self.asanas
            .iter()
            .enumerate()
            .filter(|(_, pose)| pose.selected)
            .map(|(position, _)| position)
            .collect()
    }

    pub fn clear_selection(&mut self) {
        for pose in &mut self.asanas {
            pose.selected = false;
        }
    }

    /// Creates an empty section and returns its id.
    pub fn create_section(&mut self, name: impl Into<String>) -> SectionId {
        let section = Section::new(name);
        let id = section.id.clone();
        self.sections.push(section);
        self.touch();
        id
    }

    /// Adds positions to a section.
    ///
    /// Rejected as a whole if any position is out of range or already
    /// belongs to a section; nothing changes in that case.
    pub fn add_to_section(&mut self, id: &SectionId, positions: &[usize]) -> FlowResult<()> {
        let index = self
            .section_index(id)
            .ok_or_else(|| FlowError::UnknownSection(id.clone()))?;
        if positions.is_empty() {
            return Err(FlowError::NothingSelected);
        }
        for &position in positions {
            self.check_position(position)?;
            if let Some(owner) = self.section_of(position) {
                return Err(if owner.id == *id {
                    FlowError::AlreadyInSection(owner.name.clone())
                } else {
                    FlowError::AlreadyGrouped {
                        position,
                        section: owner.name.clone(),
                    }
                });
            }
        }

        let ids = &mut self.sections[index].asana_ids;
        ids.extend_from_slice(positions);
        ids.sort_unstable();
        ids.dedup();
        self.after_mutation();
        Ok(())
    }

    /// Creates a section holding `positions`; no section is created when
    /// any of them is already grouped.
    pub fn group_positions(
        &mut self,
        name: impl Into<String>,
        positions: &[usize],
    ) -> FlowResult<SectionId> {
        if positions.is_empty() {
            return Err(FlowError::NothingSelected);
        }
        for &position in positions {
            self.check_position(position)?;
            if let Some(owner) = self.section_of(position) {
                return Err(FlowError::AlreadyGrouped {
                    position,
                    section: owner.name.clone(),
                });
            }
        }
        let id = self.create_section(name);
        self.add_to_section(&id, positions)?;
        Ok(id)
    }

    /// Groups the selected poses into a new section and clears the selection.
    pub fn group_selected(&mut self, name: impl Into<String>) -> FlowResult<SectionId> {
        let positions = self.selected_positions();
        let id = self.group_positions(name, &positions)?;
        self.clear_selection();
        Ok(id)
    }

    /// Takes a pose out of its section. Returns false if it was ungrouped.
    pub fn remove_from_section(&mut self, position: usize) -> FlowResult<bool> {
        self.check_position(position)?;
        let Some(index) = self.section_index_of(position) else {
            return Ok(false);
        };
        self.sections[index].asana_ids.retain(|&id| id != position);
        self.after_mutation();
        Ok(true)
    }

    /// Deletes the grouping only; the poses stay in the flow.
    pub fn delete_section(&mut self, id: &SectionId) -> FlowResult<Section> {
        let index = self
            .section_index(id)
            .ok_or_else(|| FlowError::UnknownSection(id.clone()))?;
        let section = self.sections.remove(index);
        self.after_mutation();
        Ok(section)
    }

    pub fn rename_section(&mut self, id: &SectionId, name: impl Into<String>) -> FlowResult<()> {
        let index = self
            .section_index(id)
            .ok_or_else(|| FlowError::UnknownSection(id.clone()))?;
        self.sections[index].name = name.into();
        self.touch();
        Ok(())
    }

    pub fn toggle_collapsed(&mut self, id: &SectionId) -> FlowResult<bool> {
        let index = self
            .section_index(id)
            .ok_or_else(|| FlowError::UnknownSection(id.clone()))?;
        let section = &mut self.sections[index];
        section.collapsed = !section.collapsed;
        Ok(section.collapsed)
    }
}
