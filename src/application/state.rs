//! Application state for the terminal flow builder.
//!
//! `App` owns the flow library, the flow being edited and the practice
//! session, and turns key-level intents into flow operations. Rejected
//! operations become status notices and leave the flow untouched.

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::domain::{
    DropTarget, Flow, FlowError, MAX_DESCRIPTION_LEN, MAX_DURATION, MAX_NAME_LEN, MIN_DURATION,
    Pose, PoseCatalog, PracticeEvent, PracticeSession, SectionId, ShareCodec, SortDirection,
    sanitize_text,
};
use crate::infrastructure::{Config, FlowRepository};

/// Which value a text prompt is collecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptKind {
    FlowName,
    FlowDescription,
    /// Name for a new section built from the selected poses
    SectionName,
    RenameSection(SectionId),
    /// Exact hold time of the pose under the cursor
    Duration,
    ShareCode,
    ImportFile,
    ExportFile,
    ExportCsv,
    /// Catalog filter
    Search,
}

impl PromptKind {
    pub fn title(&self) -> &'static str {
        match self {
            PromptKind::FlowName => "Flow name",
            PromptKind::FlowDescription => "Flow description",
            PromptKind::SectionName => "New section name",
            PromptKind::RenameSection(_) => "Rename section",
            PromptKind::Duration => "Duration (seconds)",
            PromptKind::ShareCode => "Paste share code",
            PromptKind::ImportFile => "Import flow from file",
            PromptKind::ExportFile => "Export flow to file",
            PromptKind::ExportCsv => "Export practice sheet (CSV)",
            PromptKind::Search => "Search poses",
        }
    }
}

/// Represents the current mode of the application.
///
/// The mode decides how key presses are interpreted and which screen is
/// drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppMode {
    /// List of saved flows
    Library,
    /// Editing a flow: flow table on the left, pose catalog on the right
    Builder,
    /// Timed run through the flow being edited
    Practice,
    Help,
    /// A single-line text prompt is open
    Prompt(PromptKind),
    /// Waiting for confirmation before deleting a saved flow
    ConfirmDelete,
}

/// Which builder pane receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Flow,
    Catalog,
}

/// A pose or section picked up for a keyboard drag and drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grab {
    Pose(usize),
    Section(SectionId),
}

/// One row of the flow table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRow {
    /// Section header, by index into the flow's sections
    Header(usize),
    /// Pose, by position in the flow
    Pose(usize),
}

/// The flow being edited together with its view state.
///
/// The cursor indexes the rows produced by [`EditSession::display_rows`];
/// every flow operation works on canonical positions.
#[derive(Debug)]
pub struct EditSession {
    pub flow: Flow,
    pub sort: SortDirection,
    pub cursor: usize,
    pub grabbed: Option<Grab>,
    dirty_since: Option<Instant>,
}

impl EditSession {
    pub fn new(flow: Flow, sort: SortDirection) -> Self {
        Self {
            flow,
            sort,
            cursor: 0,
            grabbed: None,
            dirty_since: None,
        }
    }

    /// Rows in display order.
    ///
    /// A section's header is placed just before the first of its members
    /// shown, members of collapsed sections are hidden, and headers of
    /// empty sections come last.
    pub fn display_rows(&self) -> Vec<DisplayRow> {
        let len = self.flow.len();
        let order: Box<dyn Iterator<Item = usize>> = match self.sort {
            SortDirection::Ascending => Box::new(0..len),
            SortDirection::Descending => Box::new((0..len).rev()),
        };

        let sections = self.flow.sections();
        let mut header_shown = vec![false; sections.len()];
        let mut rows = Vec::with_capacity(len + sections.len());
        for position in order {
            match self.flow.section_index_of(position) {
                Some(index) => {
                    if !header_shown[index] {
                        header_shown[index] = true;
                        rows.push(DisplayRow::Header(index));
                    }
                    if !sections[index].collapsed {
                        rows.push(DisplayRow::Pose(position));
                    }
                }
                None => rows.push(DisplayRow::Pose(position)),
            }
        }
        for (index, shown) in header_shown.into_iter().enumerate() {
            if !shown {
                rows.push(DisplayRow::Header(index));
            }
        }
        rows
    }

    pub fn current_row(&self) -> Option<DisplayRow> {
        self.display_rows().get(self.cursor).copied()
    }

    /// Position of the pose under the cursor.
    pub fn current_position(&self) -> Option<usize> {
        match self.current_row() {
            Some(DisplayRow::Pose(position)) => Some(position),
            _ => None,
        }
    }

    /// The section under the cursor: the header itself, or the section of
    /// the pose.
    pub fn current_section(&self) -> Option<SectionId> {
        match self.current_row()? {
            DisplayRow::Header(index) => self.flow.sections().get(index).map(|s| s.id.clone()),
            DisplayRow::Pose(position) => self.flow.section_of(position).map(|s| s.id.clone()),
        }
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let rows = self.display_rows().len();
        if rows == 0 {
            self.cursor = 0;
            return;
        }
        let target = self.cursor as isize + delta;
        self.cursor = target.clamp(0, rows as isize - 1) as usize;
    }

    pub fn clamp_cursor(&mut self) {
        self.move_cursor(0);
    }

    /// Puts the cursor on a pose, or on its section header when the
    /// section is collapsed.
    pub fn focus_position(&mut self, position: usize) {
        let rows = self.display_rows();
        if let Some(row) = rows.iter().position(|r| *r == DisplayRow::Pose(position)) {
            self.cursor = row;
        } else if let Some(index) = self.flow.section_index_of(position) {
            if let Some(row) = rows.iter().position(|r| *r == DisplayRow::Header(index)) {
                self.cursor = row;
            }
        }
    }

    pub fn focus_section(&mut self, id: &SectionId) {
        let Some(index) = self.flow.sections().iter().position(|s| &s.id == id) else {
            return;
        };
        if let Some(row) = self
            .display_rows()
            .iter()
            .position(|r| *r == DisplayRow::Header(index))
        {
            self.cursor = row;
        }
    }

    /// Records an edit. Every edit restarts the auto-save delay.
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty_since = Some(now);
    }

    pub fn mark_clean(&mut self) {
        self.dirty_since = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    pub fn autosave_due(&self, now: Instant, delay: Duration) -> bool {
        self.dirty_since
            .is_some_and(|since| now.saturating_duration_since(since) >= delay)
    }
}

/// Main application state.
///
/// # Examples
///
/// ```
/// use tflow::application::{App, AppMode};
///
/// let app = App::default();
/// assert!(matches!(app.mode, AppMode::Library));
/// assert!(app.session.is_none());
/// ```
#[derive(Debug)]
pub struct App {
    pub config: Config,
    pub catalog: PoseCatalog,
    pub repository: FlowRepository,
    pub mode: AppMode,
    /// Mode to go back to when a prompt, help or practice closes
    pub return_mode: AppMode,
    /// Saved flows, as last read from storage
    pub library: Vec<Flow>,
    pub library_selected: usize,
    pub session: Option<EditSession>,
    pub practice: PracticeSession,
    pub focus: Focus,
    /// Current catalog filter
    pub catalog_query: String,
    pub catalog_selected: usize,
    /// Prompt input buffer
    pub input: String,
    /// Cursor position within the input buffer
    pub cursor_position: usize,
    pub help_scroll: usize,
    /// Temporary status message to display
    pub status_message: Option<String>,
    last_practice_tick: Option<Instant>,
}

impl Default for App {
    fn default() -> Self {
        Self::new(
            Config::default(),
            PoseCatalog::builtin(),
            FlowRepository::in_memory(),
        )
    }
}

impl App {
    pub fn new(config: Config, catalog: PoseCatalog, repository: FlowRepository) -> Self {
        let library = repository.load_all();
        let practice = PracticeSession::new(config.countdown_seconds);
        Self {
            config,
            catalog,
            repository,
            mode: AppMode::Library,
            return_mode: AppMode::Library,
            library,
            library_selected: 0,
            session: None,
            practice,
            focus: Focus::Flow,
            catalog_query: String::new(),
            catalog_selected: 0,
            input: String::new(),
            cursor_position: 0,
            help_scroll: 0,
            status_message: None,
            last_practice_tick: None,
        }
    }

    fn reject(&mut self, error: FlowError) {
        debug!(%error, "operation rejected");
        self.status_message = Some(error.to_string());
    }

    /// Runs an operation on the open session, marking it dirty on success
    /// and turning a rejection into a notice.
    fn edit<T>(&mut self, op: impl FnOnce(&mut EditSession) -> Result<T, FlowError>) -> Option<T> {
        let session = self.session.as_mut()?;
        match op(session) {
            Ok(value) => {
                session.mark_dirty(Instant::now());
                Some(value)
            }
            Err(error) => {
                self.reject(error);
                None
            }
        }
    }

    fn current_position(&self) -> Option<usize> {
        self.session.as_ref().and_then(EditSession::current_position)
    }

    // Library

    pub fn refresh_library(&mut self) {
        self.library = self.repository.load_all();
        if self.library_selected >= self.library.len() {
            self.library_selected = self.library.len().saturating_sub(1);
        }
    }

    pub fn library_move(&mut self, delta: isize) {
        if self.library.is_empty() {
            self.library_selected = 0;
            return;
        }
        let target = self.library_selected as isize + delta;
        self.library_selected = target.clamp(0, self.library.len() as isize - 1) as usize;
    }

    pub fn selected_library_flow(&self) -> Option<&Flow> {
        self.library.get(self.library_selected)
    }

    fn open_flow(&mut self, flow: Flow) {
        info!(flow = %flow.name, id = %flow.flow_id, "flow opened");
        let mut session = EditSession::new(flow, self.config.default_sort);
        session.clamp_cursor();
        self.session = Some(session);
        self.focus = Focus::Flow;
        self.mode = AppMode::Builder;
    }

    pub fn new_flow(&mut self) {
        self.open_flow(Flow::default());
        self.focus = Focus::Catalog;
        self.status_message = Some("New flow: pick poses from the catalog".to_string());
    }

    pub fn open_selected(&mut self) {
        match self.selected_library_flow().cloned() {
            Some(flow) => {
                self.status_message = None;
                self.open_flow(flow);
            }
            None => self.status_message = Some("No saved flows yet".to_string()),
        }
    }

    pub fn start_delete(&mut self) {
        if self.selected_library_flow().is_some() {
            self.mode = AppMode::ConfirmDelete;
        }
    }

    pub fn confirm_delete(&mut self) {
        self.mode = AppMode::Library;
        let Some(flow) = self.selected_library_flow() else {
            return;
        };
        let (flow_id, name) = (flow.flow_id.clone(), flow.name.clone());
        match self.repository.delete(&flow_id) {
            Ok(_) => {
                if self
                    .session
                    .as_ref()
                    .is_some_and(|s| s.flow.flow_id == flow_id)
                {
                    self.session = None;
                }
                self.status_message = Some(format!("Deleted '{}'", name));
            }
            Err(e) => {
                warn!(error = %e, "delete failed");
                self.status_message = Some(format!("Delete failed: {}", e));
            }
        }
        self.refresh_library();
    }

    pub fn cancel_delete(&mut self) {
        self.mode = AppMode::Library;
    }

    /// Saves the open flow if it has unsaved edits and goes back to the
    /// library.
    pub fn close_session(&mut self) {
        if self.session.as_ref().is_some_and(EditSession::is_dirty) {
            self.save_current();
        }
        self.session = None;
        self.mode = AppMode::Library;
        self.refresh_library();
    }

    /// Writes the open flow to storage. Returns whether it was saved.
    pub fn save_current(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match self.repository.save(&mut session.flow) {
            Ok(()) => {
                session.mark_clean();
                let name = session.flow.name.clone();
                self.refresh_library();
                self.status_message = Some(format!("Saved '{}'", name));
                true
            }
            Err(e) => {
                warn!(error = %e, "save failed");
                self.status_message = Some(format!("Save failed: {}", e));
                false
            }
        }
    }

    // Builder: catalog pane

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Flow => Focus::Catalog,
            Focus::Catalog => Focus::Flow,
        };
    }

    pub fn filtered_catalog(&self) -> Vec<&Pose> {
        self.catalog.search(&self.catalog_query)
    }

    pub fn catalog_move(&mut self, delta: isize) {
        let len = self.filtered_catalog().len();
        if len == 0 {
            self.catalog_selected = 0;
            return;
        }
        let target = self.catalog_selected as isize + delta;
        self.catalog_selected = target.clamp(0, len as isize - 1) as usize;
    }

    pub fn selected_catalog_pose(&self) -> Option<&Pose> {
        self.filtered_catalog().get(self.catalog_selected).copied()
    }

    pub fn add_selected_catalog_pose(&mut self) {
        match self.selected_catalog_pose().cloned() {
            Some(pose) => self.add_pose(pose),
            None => self.status_message = Some("No pose matches the search".to_string()),
        }
    }

    /// Adds a pose on the row shown first and puts the cursor on it.
    pub fn add_pose(&mut self, pose: Pose) {
        let name = pose.name.clone();
        let added = self.edit(|s| {
            let position = s.flow.add_pose(pose, s.sort);
            s.focus_position(position);
            Ok(position)
        });
        if added.is_some() {
            self.status_message = Some(format!("Added {}", name));
        }
    }

    // Builder: flow pane

    pub fn move_cursor(&mut self, delta: isize) {
        if let Some(session) = self.session.as_mut() {
            session.move_cursor(delta);
        }
    }

    pub fn toggle_selected_current(&mut self) {
        let Some(position) = self.current_position() else {
            return;
        };
        if let Some(session) = self.session.as_mut() {
            if let Err(e) = session.flow.toggle_selected(position) {
                self.reject(e);
            }
        }
    }

    pub fn remove_current(&mut self) {
        let Some(position) = self.current_position() else {
            return;
        };
        if let Some(pose) = self.edit(|s| {
            let pose = s.flow.remove_at(position)?;
            s.clamp_cursor();
            Ok(pose)
        }) {
            self.status_message = Some(format!("Removed {}", pose.name));
        }
    }

    pub fn remove_selected(&mut self) {
        let removed = self.edit(|s| {
            if s.flow.selected_positions().is_empty() {
                return Err(FlowError::NothingSelected);
            }
            let removed = s.flow.remove_selected();
            s.clamp_cursor();
            Ok(removed)
        });
        if let Some(count) = removed {
            self.status_message = Some(format!("Removed {} poses", count));
        }
    }

    pub fn duplicate_current(&mut self) {
        let Some(position) = self.current_position() else {
            return;
        };
        self.edit(|s| {
            let copy = s.flow.duplicate_at(position)?;
            s.focus_position(copy);
            Ok(copy)
        });
    }

    /// Changes the hold time of the pose under the cursor by `delta`
    /// seconds, within the accepted range.
    pub fn adjust_duration(&mut self, delta: i64) {
        let Some(position) = self.current_position() else {
            return;
        };
        let Some(current) = self
            .session
            .as_ref()
            .and_then(|s| s.flow.pose(position))
            .map(|p| p.duration)
        else {
            return;
        };
        let seconds = (current as i64 + delta).clamp(MIN_DURATION as i64, MAX_DURATION as i64);
        self.set_current_duration(seconds as u32);
    }

    pub fn set_current_duration(&mut self, seconds: u32) {
        let Some(position) = self.current_position() else {
            return;
        };
        self.edit(|s| s.flow.set_duration(position, seconds));
    }

    pub fn cycle_side_current(&mut self) {
        let Some(position) = self.current_position() else {
            return;
        };
        self.edit(|s| {
            let side = s
                .flow
                .pose(position)
                .map(|p| p.side.next())
                .unwrap_or_default();
            s.flow.set_side(position, side)
        });
    }

    /// Moves the pose under the cursor one row up or down on screen by
    /// dropping it before its neighbour. Like any drop, the pose joins the
    /// section of the pose it lands before.
    pub fn nudge_current(&mut self, up: bool) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(position) = session.current_position() else {
            return;
        };
        let len = session.flow.len();
        let backwards = match session.sort {
            SortDirection::Ascending => up,
            SortDirection::Descending => !up,
        };
        let target = if backwards {
            if position == 0 {
                return;
            }
            DropTarget::Pose(position - 1)
        } else if position + 2 < len {
            DropTarget::Pose(position + 2)
        } else if position + 1 < len {
            DropTarget::End
        } else {
            return;
        };
        self.edit(|s| {
            let slot = s.flow.move_pose(position, target)?;
            s.focus_position(slot);
            Ok(slot)
        });
    }

    /// Picks up the pose or section under the cursor.
    pub fn grab_current(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let (grab, label) = match session.current_row() {
            Some(DisplayRow::Pose(position)) => {
                let name = session
                    .flow
                    .pose(position)
                    .map(|p| p.name.clone())
                    .unwrap_or_default();
                (Grab::Pose(position), name)
            }
            Some(DisplayRow::Header(index)) => match session.flow.sections().get(index) {
                Some(section) => (Grab::Section(section.id.clone()), section.name.clone()),
                None => return,
            },
            None => return,
        };
        session.grabbed = Some(grab);
        self.status_message = Some(format!(
            "Moving {}: Enter drops before the cursor row, End drops at the end, Esc cancels",
            label
        ));
    }

    pub fn cancel_grab(&mut self) {
        if let Some(session) = self.session.as_mut() {
            if session.grabbed.take().is_some() {
                self.status_message = Some("Move cancelled".to_string());
            }
        }
    }

    pub fn is_grabbing(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.grabbed.is_some())
    }

    /// Drops the grabbed pose or section on the cursor row, or at the end
    /// of the flow.
    pub fn drop_grabbed(&mut self, at_end: bool) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(grab) = session.grabbed.take() else {
            return;
        };
        let target = if at_end {
            DropTarget::End
        } else {
            match session.current_row() {
                Some(DisplayRow::Pose(position)) => DropTarget::Pose(position),
                Some(DisplayRow::Header(index)) => match session.flow.sections().get(index) {
                    Some(section) => DropTarget::SectionHeader(section.id.clone()),
                    None => return,
                },
                None => return,
            }
        };

        let moved = self.edit(|s| match &grab {
            Grab::Pose(source) => {
                let slot = s.flow.move_pose(*source, target)?;
                s.focus_position(slot);
                Ok(())
            }
            Grab::Section(id) => {
                s.flow.move_section(id, target)?;
                s.focus_section(id);
                Ok(())
            }
        });
        if moved.is_some() {
            self.status_message = Some("Moved".to_string());
        }
    }

    pub fn start_group(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if session.flow.selected_positions().is_empty() {
            self.reject(FlowError::NothingSelected);
            return;
        }
        let name = format!("Section {}", session.flow.sections().len() + 1);
        self.open_prompt(PromptKind::SectionName, name);
    }

    pub fn group_selected(&mut self, name: &str) {
        let name = sanitize_text(name, MAX_NAME_LEN);
        let grouped = self.edit(|s| {
            let id = s.flow.group_selected(name)?;
            s.focus_section(&id);
            Ok(id)
        });
        if grouped.is_some() {
            self.status_message = Some("Section created".to_string());
        }
    }

    pub fn ungroup_current(&mut self) {
        let Some(position) = self.current_position() else {
            return;
        };
        match self.edit(|s| s.flow.remove_from_section(position)) {
            Some(true) => self.status_message = Some("Removed from section".to_string()),
            Some(false) => self.status_message = Some("Pose is not in a section".to_string()),
            None => {}
        }
    }

    /// Deletes the section whose header is under the cursor. Its poses stay.
    pub fn delete_current_section(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(DisplayRow::Header(index)) = session.current_row() else {
            self.status_message = Some("Move to a section header to delete it".to_string());
            return;
        };
        let Some(id) = session.flow.sections().get(index).map(|s| s.id.clone()) else {
            return;
        };
        if let Some(section) = self.edit(|s| {
            let section = s.flow.delete_section(&id)?;
            s.clamp_cursor();
            Ok(section)
        }) {
            self.status_message = Some(format!("Deleted section '{}'", section.name));
        }
    }

    pub fn start_rename_section(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let Some(id) = session.current_section() else {
            return;
        };
        let name = session
            .flow
            .section(&id)
            .map(|s| s.name.clone())
            .unwrap_or_default();
        self.open_prompt(PromptKind::RenameSection(id), name);
    }

    pub fn toggle_collapse_current(&mut self) {
        let Some(id) = self.session.as_ref().and_then(EditSession::current_section) else {
            return;
        };
        self.edit(|s| {
            let collapsed = s.flow.toggle_collapsed(&id)?;
            s.focus_section(&id);
            Ok(collapsed)
        });
    }

    pub fn toggle_sort(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let position = session.current_position();
        session.sort = session.sort.toggled();
        match position {
            Some(position) => session.focus_position(position),
            None => session.clamp_cursor(),
        }
        self.status_message = Some(format!("Sorted {}", session.sort.label()));
    }

    // Prompts

    pub fn open_prompt(&mut self, kind: PromptKind, initial: String) {
        if !matches!(self.mode, AppMode::Prompt(_)) {
            self.return_mode = self.mode.clone();
        }
        self.mode = AppMode::Prompt(kind);
        self.cursor_position = initial.len();
        self.input = initial;
        self.status_message = None;
    }

    pub fn cancel_prompt(&mut self) {
        self.mode = self.return_mode.clone();
        self.input.clear();
        self.cursor_position = 0;
    }

    fn close_prompt(&mut self) {
        self.cancel_prompt();
    }

    pub fn start_rename_flow(&mut self) {
        if let Some(name) = self.session.as_ref().map(|s| s.flow.name.clone()) {
            self.open_prompt(PromptKind::FlowName, name);
        }
    }

    pub fn start_edit_description(&mut self) {
        if let Some(description) = self.session.as_ref().map(|s| s.flow.description.clone()) {
            self.open_prompt(PromptKind::FlowDescription, description);
        }
    }

    pub fn start_duration_prompt(&mut self) {
        let Some(position) = self.current_position() else {
            return;
        };
        if let Some(pose) = self.session.as_ref().and_then(|s| s.flow.pose(position)) {
            self.open_prompt(PromptKind::Duration, pose.duration.to_string());
        }
    }

    pub fn start_search(&mut self) {
        self.focus = Focus::Catalog;
        self.open_prompt(PromptKind::Search, self.catalog_query.clone());
    }

    /// Opens the share-code prompt, prefilled with whatever was pasted.
    pub fn start_share_import(&mut self, pasted: Option<String>) {
        self.open_prompt(PromptKind::ShareCode, pasted.unwrap_or_default());
    }

    pub fn start_import_file(&mut self) {
        self.open_prompt(PromptKind::ImportFile, "flow.flow".to_string());
    }

    pub fn start_export_file(&mut self) {
        if let Some(stem) = self.export_stem() {
            self.open_prompt(PromptKind::ExportFile, format!("{}.flow", stem));
        }
    }

    pub fn start_csv_export(&mut self) {
        if let Some(stem) = self.export_stem() {
            self.open_prompt(PromptKind::ExportCsv, format!("{}.csv", stem));
        }
    }

    fn export_stem(&self) -> Option<String> {
        self.export_flow().map(|flow| file_stem(&flow.name))
    }

    /// The flow share and export operations act on: the open flow, or the
    /// selected one in the library.
    pub fn export_flow(&self) -> Option<&Flow> {
        match self.mode {
            AppMode::Library => self.selected_library_flow(),
            _ => self.session.as_ref().map(|s| &s.flow),
        }
    }

    /// Filename typed into a file prompt, or the default for that prompt.
    pub fn prompt_filename(&self) -> String {
        if !self.input.trim().is_empty() {
            return self.input.trim().to_string();
        }
        match &self.mode {
            AppMode::Prompt(PromptKind::ExportCsv) => "flow.csv".to_string(),
            _ => "flow.flow".to_string(),
        }
    }

    /// Applies a text prompt that does not need file or clipboard access.
    pub fn finish_prompt(&mut self) {
        let AppMode::Prompt(kind) = self.mode.clone() else {
            return;
        };
        let text = self.input.clone();
        self.close_prompt();

        match kind {
            PromptKind::FlowName => {
                let name = sanitize_text(&text, MAX_NAME_LEN);
                if name.is_empty() {
                    self.status_message = Some("Flow name cannot be empty".to_string());
                    return;
                }
                self.edit(|s| {
                    s.flow.name = name;
                    s.flow.touch();
                    Ok(())
                });
            }
            PromptKind::FlowDescription => {
                let description = sanitize_text(&text, MAX_DESCRIPTION_LEN);
                self.edit(|s| {
                    s.flow.description = description;
                    s.flow.touch();
                    Ok(())
                });
            }
            PromptKind::SectionName => self.group_selected(&text),
            PromptKind::RenameSection(id) => {
                let name = sanitize_text(&text, MAX_NAME_LEN);
                if name.is_empty() {
                    self.status_message = Some("Section name cannot be empty".to_string());
                    return;
                }
                self.edit(|s| s.flow.rename_section(&id, name));
            }
            PromptKind::Duration => match text.trim().parse::<u32>() {
                Ok(seconds) => self.set_current_duration(seconds),
                Err(_) => {
                    self.status_message = Some(format!("Not a number of seconds: {}", text.trim()))
                }
            },
            PromptKind::ShareCode => {
                let result = ShareCodec::decode(&text, &self.catalog).map_err(|e| e.to_string());
                self.set_import_result(result);
            }
            PromptKind::Search => {
                self.catalog_query = text.trim().to_string();
                self.catalog_selected = 0;
            }
            PromptKind::ImportFile | PromptKind::ExportFile | PromptKind::ExportCsv => {}
        }
    }

    /// Processes the result of a flow file export.
    pub fn set_export_result(&mut self, result: Result<String, String>) {
        self.close_prompt();
        match result {
            Ok(filename) => self.status_message = Some(format!("Exported to {}", filename)),
            Err(error) => self.status_message = Some(format!("Export failed: {}", error)),
        }
    }

    pub fn set_csv_export_result(&mut self, result: Result<String, String>) {
        self.close_prompt();
        match result {
            Ok(filename) => self.status_message = Some(format!("Practice sheet written to {}", filename)),
            Err(error) => self.status_message = Some(format!("Export failed: {}", error)),
        }
    }

    /// Processes an imported flow from a file or a share code. A valid flow
    /// is saved to the library and opened.
    pub fn set_import_result(&mut self, result: Result<Flow, String>) {
        if matches!(self.mode, AppMode::Prompt(_)) {
            self.close_prompt();
        }
        match result {
            Ok(mut flow) => {
                if let Err(e) = self.repository.save(&mut flow) {
                    warn!(error = %e, "imported flow could not be saved");
                }
                let message = format!("Imported '{}' ({} poses)", flow.name, flow.len());
                self.refresh_library();
                self.open_flow(flow);
                self.status_message = Some(message);
            }
            Err(error) => self.status_message = Some(format!("Import failed: {}", error)),
        }
    }

    /// Share code of the flow `export_flow` picks.
    pub fn share_code(&self) -> Result<String, String> {
        let flow = self.export_flow().ok_or("No flow to share")?;
        ShareCodec::encode(flow).map_err(|e| e.to_string())
    }

    pub fn set_share_copy_result(&mut self, result: Result<String, String>) {
        match result {
            Ok(code) => {
                self.status_message = Some(format!("Share code copied ({} characters)", code.len()))
            }
            Err(error) => self.status_message = Some(format!("Share failed: {}", error)),
        }
    }

    // Help

    pub fn open_help(&mut self) {
        self.return_mode = self.mode.clone();
        self.mode = AppMode::Help;
        self.help_scroll = 0;
    }

    pub fn close_help(&mut self) {
        self.mode = self.return_mode.clone();
    }

    // Practice

    /// Starts practicing the open flow, or the selected library flow.
    pub fn start_practice(&mut self, now: Instant) {
        if self.mode == AppMode::Library {
            let Some(flow) = self.selected_library_flow().cloned() else {
                self.status_message = Some("No saved flows yet".to_string());
                return;
            };
            self.open_flow(flow);
        }
        let Some(session) = self.session.as_ref() else {
            return;
        };
        match self.practice.start(&session.flow) {
            Ok(event) => {
                self.return_mode = AppMode::Builder;
                self.mode = AppMode::Practice;
                self.last_practice_tick = Some(now);
                self.status_message = None;
                self.handle_practice_event(event);
            }
            Err(e) => self.reject(e),
        }
    }

    fn handle_practice_event(&mut self, event: PracticeEvent) {
        match event {
            PracticeEvent::Completed => self.complete_practice(),
            PracticeEvent::PoseStarted(index) => debug!(index, "pose started"),
            PracticeEvent::Countdown(_) | PracticeEvent::Tick(_) | PracticeEvent::Nothing => {}
        }
    }

    /// Stamps the practiced flow and stores the stamp.
    fn complete_practice(&mut self) {
        self.last_practice_tick = None;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.flow.last_flowed = Some(Utc::now());
        match self.repository.save(&mut session.flow) {
            Ok(()) => session.mark_clean(),
            Err(e) => warn!(error = %e, "could not store practice time"),
        }
        let name = session.flow.name.clone();
        self.refresh_library();
        self.status_message = Some(format!("Completed '{}'. Namaste.", name));
    }

    pub fn practice_toggle_pause(&mut self, now: Instant) {
        let paused = self.practice.toggle_pause();
        self.last_practice_tick = Some(now);
        self.status_message = paused.then(|| "Paused".to_string());
    }

    pub fn practice_next(&mut self, now: Instant) {
        let event = self.practice.next();
        self.last_practice_tick = Some(now);
        self.handle_practice_event(event);
    }

    pub fn practice_previous(&mut self, now: Instant) {
        let event = self.practice.previous();
        self.last_practice_tick = Some(now);
        self.handle_practice_event(event);
    }

    pub fn practice_end(&mut self) {
        let event = self.practice.end();
        self.handle_practice_event(event);
    }

    /// Leaves the practice screen, tearing down any running timer.
    pub fn cancel_practice(&mut self) {
        if self.practice.is_running() {
            self.status_message = Some("Practice cancelled".to_string());
        }
        self.practice.cancel();
        self.last_practice_tick = None;
        self.mode = self.return_mode.clone();
    }

    /// Periodic work: whole seconds of practice time and the debounced
    /// auto-save.
    pub fn on_tick(&mut self, now: Instant) {
        if self.practice.is_running() {
            if self.practice.is_paused() {
                self.last_practice_tick = Some(now);
            } else if let Some(last) = self.last_practice_tick {
                let seconds = now.saturating_duration_since(last).as_secs();
                self.last_practice_tick = Some(last + Duration::from_secs(seconds));
                for _ in 0..seconds {
                    let event = self.practice.tick();
                    self.handle_practice_event(event);
                    if !self.practice.is_running() {
                        break;
                    }
                }
            }
        }

        let delay = Duration::from_millis(self.config.autosave_delay_ms);
        if self
            .session
            .as_ref()
            .is_some_and(|s| s.autosave_due(now, delay))
        {
            if self.save_current() {
                debug!("auto-saved");
            } else if let Some(session) = self.session.as_mut() {
                session.mark_dirty(now);
            }
        }
    }
}

/// Lowercase file stem made of the flow name's letters and digits.
fn file_stem(name: &str) -> String {
    let mut stem = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            stem.push(c.to_ascii_lowercase());
        } else if !stem.ends_with('-') {
            stem.push('-');
        }
    }
    let stem = stem.trim_matches('-');
    if stem.is_empty() {
        "flow".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PracticeState, Side};

    fn builder_app() -> App {
        let mut app = App::default();
        app.new_flow();
        app
    }

    /// Flow A, B, C, D in positions 0..4, shown ascending.
    fn abcd_app() -> App {
        let mut app = builder_app();
        for name in ["D", "C", "B", "A"] {
            app.add_pose(Pose::new(name, 7));
        }
        app
    }

    fn names(app: &App) -> Vec<String> {
        app.session
            .as_ref()
            .unwrap()
            .flow
            .poses()
            .iter()
            .map(|p| p.name.clone())
            .collect()
    }

    fn flow(app: &App) -> &Flow {
        &app.session.as_ref().unwrap().flow
    }

    fn cursor_to(app: &mut App, row: DisplayRow) {
        let session = app.session.as_mut().unwrap();
        session.cursor = session.display_rows().iter().position(|r| *r == row).unwrap();
    }

    #[test]
    fn test_app_default() {
        let app = App::default();
        assert!(matches!(app.mode, AppMode::Library));
        assert!(app.session.is_none());
        assert!(app.library.is_empty());
        assert!(app.status_message.is_none());
        assert!(app.input.is_empty());
        assert!(!app.catalog.is_empty());
    }

    #[test]
    fn test_new_flow_enters_builder() {
        let app = builder_app();
        assert!(matches!(app.mode, AppMode::Builder));
        assert_eq!(app.focus, Focus::Catalog);
        assert_eq!(flow(&app).name, "Untitled flow");
    }

    #[test]
    fn test_add_pose_lands_on_first_row() {
        let mut app = builder_app();
        app.add_pose(Pose::new("A", 7));
        app.add_pose(Pose::new("B", 7));
        assert_eq!(names(&app), vec!["B", "A"]);
        assert_eq!(app.session.as_ref().unwrap().current_position(), Some(0));

        app.toggle_sort();
        app.add_pose(Pose::new("C", 7));
        assert_eq!(names(&app), vec!["B", "A", "C"]);
        let session = app.session.as_ref().unwrap();
        assert_eq!(session.display_rows()[0], DisplayRow::Pose(2));
        assert_eq!(session.current_position(), Some(2));
    }

    #[test]
    fn test_add_selected_catalog_pose() {
        let mut app = builder_app();
        app.catalog_query = "vrksasana".to_string();
        app.add_selected_catalog_pose();
        assert_eq!(names(&app), vec!["Tree"]);
        assert_eq!(app.status_message.as_deref(), Some("Added Tree"));
    }

    #[test]
    fn test_display_rows_with_sections() {
        let mut app = abcd_app();
        let id = app
            .session
            .as_mut()
            .unwrap()
            .flow
            .group_positions("Middle", &[1, 2])
            .unwrap();
        let session = app.session.as_mut().unwrap();
        assert_eq!(
            session.display_rows(),
            vec![
                DisplayRow::Pose(0),
                DisplayRow::Header(0),
                DisplayRow::Pose(1),
                DisplayRow::Pose(2),
                DisplayRow::Pose(3),
            ]
        );

        session.flow.toggle_collapsed(&id).unwrap();
        assert_eq!(
            session.display_rows(),
            vec![DisplayRow::Pose(0), DisplayRow::Header(0), DisplayRow::Pose(3)]
        );

        session.sort = SortDirection::Descending;
        session.flow.toggle_collapsed(&id).unwrap();
        assert_eq!(
            session.display_rows(),
            vec![
                DisplayRow::Pose(3),
                DisplayRow::Header(0),
                DisplayRow::Pose(2),
                DisplayRow::Pose(1),
                DisplayRow::Pose(0),
            ]
        );
    }

    #[test]
    fn test_empty_section_header_is_listed_last() {
        let mut app = abcd_app();
        app.session.as_mut().unwrap().flow.create_section("Later");
        let rows = app.session.as_ref().unwrap().display_rows();
        assert_eq!(rows.last(), Some(&DisplayRow::Header(0)));
        assert_eq!(rows.len(), 5);
    }

    #[test]
    fn test_group_selected_via_prompt() {
        let mut app = abcd_app();
        for position in [1, 3] {
            cursor_to(&mut app, DisplayRow::Pose(position));
            app.toggle_selected_current();
        }
        app.start_group();
        assert_eq!(app.mode, AppMode::Prompt(PromptKind::SectionName));
        assert_eq!(app.input, "Section 1");

        app.input = "Twists".to_string();
        app.finish_prompt();
        assert_eq!(app.mode, AppMode::Builder);
        let section = &flow(&app).sections()[0];
        assert_eq!(section.name, "Twists");
        assert_eq!(section.asana_ids, vec![1, 3]);
        assert!(flow(&app).selected_positions().is_empty());
        assert!(app.session.as_ref().unwrap().is_dirty());
    }

    #[test]
    fn test_group_without_selection_is_rejected() {
        let mut app = abcd_app();
        app.start_group();
        assert_eq!(app.mode, AppMode::Builder);
        assert_eq!(app.status_message.as_deref(), Some("No poses selected"));
    }

    #[test]
    fn test_double_grouping_is_rejected_and_flow_unchanged() {
        let mut app = abcd_app();
        app.session
            .as_mut()
            .unwrap()
            .flow
            .group_positions("First", &[0, 1])
            .unwrap();
        for position in [1, 2] {
            cursor_to(&mut app, DisplayRow::Pose(position));
            app.toggle_selected_current();
        }
        app.group_selected("Second");

        assert_eq!(flow(&app).sections().len(), 1);
        assert_eq!(flow(&app).sections()[0].asana_ids, vec![0, 1]);
        assert!(app.status_message.unwrap().contains("already grouped"));
    }

    #[test]
    fn test_grab_and_drop_pose_on_header_joins_section() {
        let mut app = abcd_app();
        app.session
            .as_mut()
            .unwrap()
            .flow
            .group_positions("Pair", &[0, 1])
            .unwrap();

        cursor_to(&mut app, DisplayRow::Pose(3));
        app.grab_current();
        assert!(app.is_grabbing());
        cursor_to(&mut app, DisplayRow::Header(0));
        app.drop_grabbed(false);

        assert!(!app.is_grabbing());
        assert_eq!(names(&app), vec!["D", "A", "B", "C"]);
        assert_eq!(flow(&app).sections()[0].asana_ids, vec![0, 1, 2]);
        assert_eq!(app.session.as_ref().unwrap().current_position(), Some(0));
    }

    #[test]
    fn test_grab_and_drop_section_at_end() {
        let mut app = abcd_app();
        app.session
            .as_mut()
            .unwrap()
            .flow
            .group_positions("Pair", &[0, 1])
            .unwrap();
        cursor_to(&mut app, DisplayRow::Header(0));
        app.grab_current();
        app.drop_grabbed(true);

        assert_eq!(names(&app), vec!["C", "D", "A", "B"]);
        assert_eq!(flow(&app).sections()[0].asana_ids, vec![2, 3]);
        assert_eq!(
            app.session.as_ref().unwrap().current_row(),
            Some(DisplayRow::Header(0))
        );
    }

    #[test]
    fn test_dropping_pose_on_itself_is_rejected() {
        let mut app = abcd_app();
        cursor_to(&mut app, DisplayRow::Pose(2));
        app.grab_current();
        app.drop_grabbed(false);
        assert_eq!(names(&app), vec!["A", "B", "C", "D"]);
        assert_eq!(app.status_message.as_deref(), Some("Pose is already at that position"));
    }

    #[test]
    fn test_nudge_follows_screen_direction() {
        let mut app = abcd_app();
        cursor_to(&mut app, DisplayRow::Pose(2));
        app.nudge_current(true);
        assert_eq!(names(&app), vec!["A", "C", "B", "D"]);
        assert_eq!(app.session.as_ref().unwrap().current_position(), Some(1));

        app.toggle_sort();
        app.nudge_current(true);
        assert_eq!(names(&app), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn test_duration_editing() {
        let mut app = abcd_app();
        cursor_to(&mut app, DisplayRow::Pose(0));
        app.adjust_duration(8);
        assert_eq!(flow(&app).poses()[0].duration, 15);
        assert_eq!(flow(&app).time, 36);

        app.adjust_duration(-100);
        assert_eq!(flow(&app).poses()[0].duration, MIN_DURATION);

        app.start_duration_prompt();
        app.input = "900".to_string();
        app.finish_prompt();
        assert_eq!(flow(&app).poses()[0].duration, MAX_DURATION);

        app.start_duration_prompt();
        app.input = "soon".to_string();
        app.finish_prompt();
        assert_eq!(flow(&app).poses()[0].duration, MAX_DURATION);
        assert!(app.status_message.unwrap().contains("Not a number"));
    }

    #[test]
    fn test_side_and_duplicate() {
        let mut app = abcd_app();
        cursor_to(&mut app, DisplayRow::Pose(1));
        app.cycle_side_current();
        assert_eq!(flow(&app).poses()[1].side, Side::Left);
        app.duplicate_current();
        assert_eq!(names(&app), vec!["A", "B", "B", "C", "D"]);
        assert_eq!(flow(&app).poses()[2].side, Side::Left);
        assert_eq!(app.session.as_ref().unwrap().current_position(), Some(2));
    }

    #[test]
    fn test_remove_and_section_operations() {
        let mut app = abcd_app();
        app.session
            .as_mut()
            .unwrap()
            .flow
            .group_positions("Pair", &[1, 2])
            .unwrap();

        cursor_to(&mut app, DisplayRow::Pose(1));
        app.remove_current();
        assert_eq!(names(&app), vec!["A", "C", "D"]);
        assert_eq!(flow(&app).sections()[0].asana_ids, vec![1]);

        cursor_to(&mut app, DisplayRow::Header(0));
        app.start_rename_section();
        app.input = "Solo".to_string();
        app.finish_prompt();
        assert_eq!(flow(&app).sections()[0].name, "Solo");

        cursor_to(&mut app, DisplayRow::Pose(1));
        app.ungroup_current();
        assert!(flow(&app).sections()[0].is_empty());
        app.ungroup_current();
        assert_eq!(app.status_message.as_deref(), Some("Pose is not in a section"));

        cursor_to(&mut app, DisplayRow::Header(0));
        app.delete_current_section();
        assert!(flow(&app).sections().is_empty());
        assert_eq!(names(&app), vec!["A", "C", "D"]);
    }

    #[test]
    fn test_save_and_reopen_from_library() {
        let mut app = abcd_app();
        app.start_rename_flow();
        app.input = "Morning <b>".to_string();
        app.finish_prompt();
        assert!(app.save_current());
        assert!(!app.session.as_ref().unwrap().is_dirty());
        assert_eq!(app.library.len(), 1);
        assert_eq!(app.library[0].name, "Morning b");

        app.close_session();
        assert!(matches!(app.mode, AppMode::Library));
        app.open_selected();
        assert_eq!(names(&app), vec!["A", "B", "C", "D"]);
        assert_eq!(flow(&app).time, 28);
    }

    #[test]
    fn test_autosave_waits_for_quiet_period() {
        let mut app = abcd_app();
        assert!(app.library.is_empty());

        app.on_tick(Instant::now());
        assert!(app.library.is_empty());

        app.on_tick(Instant::now() + Duration::from_millis(app.config.autosave_delay_ms + 10));
        assert_eq!(app.library.len(), 1);
        assert!(!app.session.as_ref().unwrap().is_dirty());
    }

    #[test]
    fn test_delete_flow_needs_confirmation() {
        let mut app = abcd_app();
        app.save_current();
        app.close_session();

        app.start_delete();
        assert!(matches!(app.mode, AppMode::ConfirmDelete));
        app.cancel_delete();
        assert_eq!(app.library.len(), 1);

        app.start_delete();
        app.confirm_delete();
        assert!(app.library.is_empty());
        assert!(app.status_message.unwrap().starts_with("Deleted"));
    }

    #[test]
    fn test_practice_runs_to_completion_and_stamps_flow() {
        let mut app = builder_app();
        app.add_pose(Pose::new("A", 2));
        app.add_pose(Pose::new("B", 1));
        let start = Instant::now();
        app.start_practice(start);
        assert!(matches!(app.mode, AppMode::Practice));
        assert_eq!(app.practice.state(), PracticeState::Countdown(3));

        app.on_tick(start + Duration::from_secs(3));
        assert_eq!(app.practice.state(), PracticeState::PoseActive(0));

        app.on_tick(start + Duration::from_millis(3900));
        assert_eq!(app.practice.state(), PracticeState::PoseActive(0));

        app.on_tick(start + Duration::from_secs(10));
        assert_eq!(app.practice.state(), PracticeState::Complete);
        assert!(flow(&app).last_flowed.is_some());
        assert!(app.library[0].last_flowed.is_some());

        app.cancel_practice();
        assert!(matches!(app.mode, AppMode::Builder));
        app.cancel_practice();
        assert_eq!(app.practice.state(), PracticeState::Idle);
    }

    #[test]
    fn test_paused_practice_does_not_advance() {
        let mut app = abcd_app();
        let start = Instant::now();
        app.start_practice(start);
        app.practice_next(start);
        assert_eq!(app.practice.remaining(), Some(7));

        app.practice_toggle_pause(start);
        app.on_tick(start + Duration::from_secs(5));
        assert_eq!(app.practice.remaining(), Some(7));

        app.practice_toggle_pause(start + Duration::from_secs(5));
        app.on_tick(start + Duration::from_secs(7));
        assert_eq!(app.practice.remaining(), Some(5));
    }

    #[test]
    fn test_empty_flow_cannot_be_practiced() {
        let mut app = builder_app();
        app.start_practice(Instant::now());
        assert!(matches!(app.mode, AppMode::Builder));
        assert_eq!(app.status_message.as_deref(), Some("Flow has no poses to practice"));
    }

    #[test]
    fn test_share_code_import() {
        let mut source = abcd_app();
        source
            .session
            .as_mut()
            .unwrap()
            .flow
            .group_positions("Ends", &[0, 3])
            .unwrap();
        let code = source.share_code().unwrap();

        let mut app = App::default();
        app.start_share_import(Some(code));
        assert_eq!(app.mode, AppMode::Prompt(PromptKind::ShareCode));
        app.finish_prompt();

        assert!(matches!(app.mode, AppMode::Builder));
        assert_eq!(names(&app), vec!["A", "B", "C", "D"]);
        assert_eq!(flow(&app).sections()[0].asana_ids, vec![0, 3]);
        assert_eq!(app.library.len(), 1);
        assert!(app.status_message.unwrap().starts_with("Imported"));
    }

    #[test]
    fn test_bad_share_code_writes_nothing() {
        let mut app = App::default();
        app.start_share_import(Some("!!not base64!!".to_string()));
        app.finish_prompt();
        assert!(matches!(app.mode, AppMode::Library));
        assert!(app.library.is_empty());
        assert!(app.status_message.unwrap().starts_with("Import failed"));
    }

    #[test]
    fn test_prompt_cancel_restores_mode() {
        let mut app = abcd_app();
        app.start_rename_flow();
        app.cancel_prompt();
        assert!(matches!(app.mode, AppMode::Builder));
        assert!(app.input.is_empty());
        assert_eq!(flow(&app).name, "Untitled flow");
    }

    #[test]
    fn test_export_defaults_use_flow_name() {
        let mut app = abcd_app();
        app.session.as_mut().unwrap().flow.name = "Sun Salutation A!".to_string();
        app.start_export_file();
        assert_eq!(app.input, "sun-salutation-a.flow");
        app.cancel_prompt();
        app.start_csv_export();
        assert_eq!(app.input, "sun-salutation-a.csv");
        assert_eq!(file_stem("***"), "flow");
    }
}
