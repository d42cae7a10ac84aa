use crate::application::{App, AppMode, DisplayRow, EditSession, Focus, Grab};
use crate::domain::{Flow, PracticeSession, PracticeState};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, Gauge, List, ListItem, ListState, Paragraph, Row, Table,
        TableState, Wrap,
    },
    Frame,
};

pub fn render_ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    match screen(app) {
        AppMode::Builder => render_builder(f, app, chunks[1]),
        AppMode::Practice => render_practice(f, &app.practice, chunks[1]),
        _ => render_library(f, app, chunks[1]),
    }
    render_status_bar(f, app, chunks[2]);

    match app.mode {
        AppMode::Help => render_help_popup(f, app.help_scroll),
        AppMode::ConfirmDelete => render_confirm_popup(f, app),
        _ => {}
    }
}

/// The screen under any popup or prompt.
fn screen(app: &App) -> &AppMode {
    match app.mode {
        AppMode::Help | AppMode::Prompt(_) => &app.return_mode,
        _ => &app.mode,
    }
}

/// Seconds as `m:ss`.
pub fn format_duration(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let context = match (screen(app), app.session.as_ref()) {
        (AppMode::Builder | AppMode::Practice, Some(session)) => format!(
            "{} | {} poses | {}",
            session.flow.name,
            session.flow.len(),
            format_duration(session.flow.time)
        ),
        _ => format!("{} saved flows", app.library.len()),
    };
    let header = Paragraph::new(format!("tflow - Yoga Flow Builder | {}", context))
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(header, area);
}

fn render_library(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Saved flows");
    if app.library.is_empty() {
        let empty = Paragraph::new(
            "No saved flows.\n\nn: new flow | Ctrl+O: import a .flow file | Ctrl+V: paste a share code",
        )
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
        f.render_widget(empty, area);
        return;
    }

    let rows = app.library.iter().map(|flow| {
        Row::new(vec![
            Cell::from(flow.name.clone()),
            Cell::from(flow.len().to_string()),
            Cell::from(format_duration(flow.time)),
            Cell::from(
                flow.last_flowed
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "never".to_string()),
            ),
            Cell::from(flow.last_edited.format("%Y-%m-%d %H:%M").to_string()),
        ])
    });
    let header = Row::new(vec!["Name", "Poses", "Time", "Practiced", "Edited"])
        .style(Style::default().fg(Color::Yellow));
    let table = Table::new(
        rows,
        [
            Constraint::Min(20),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(11),
            Constraint::Length(17),
        ],
    )
    .header(header)
    .block(block)
    .column_spacing(1)
    .row_highlight_style(Style::default().bg(Color::Blue).fg(Color::White));

    let mut state = TableState::default().with_selected(Some(app.library_selected));
    f.render_stateful_widget(table, area, &mut state);
}

fn render_builder(f: &mut Frame, app: &App, area: Rect) {
    let Some(session) = app.session.as_ref() else {
        return;
    };
    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    render_flow_table(f, session, app.focus == Focus::Flow, panes[0]);
    render_catalog(f, app, panes[1]);
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default().borders(Borders::ALL).title(title).border_style(style)
}

fn render_flow_table(f: &mut Frame, session: &EditSession, focused: bool, area: Rect) {
    let flow = &session.flow;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let rows: Vec<Row> = session
        .display_rows()
        .into_iter()
        .map(|row| flow_row(flow, row, session.grabbed.as_ref()))
        .collect();
    let header = Row::new(vec!["#", "Pose", "Sanskrit", "Time"])
        .style(Style::default().fg(Color::Yellow));
    let title = format!(
        "{} | {} | sorted {}",
        flow.name,
        format_duration(flow.time),
        session.sort.label()
    );
    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Min(18),
            Constraint::Min(12),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(pane_block(title, focused))
    .column_spacing(1)
    .row_highlight_style(Style::default().bg(Color::Blue).fg(Color::White));

    let mut state = TableState::default().with_selected(Some(session.cursor));
    f.render_stateful_widget(table, chunks[0], &mut state);

    let description = if flow.description.is_empty() {
        "No description (i to add one)".to_string()
    } else {
        flow.description.clone()
    };
    let description = Paragraph::new(description)
        .block(Block::default().borders(Borders::ALL).title("Description"))
        .wrap(Wrap { trim: true });
    f.render_widget(description, chunks[1]);
}

fn flow_row(flow: &Flow, row: DisplayRow, grabbed: Option<&Grab>) -> Row<'static> {
    match row {
        DisplayRow::Header(index) => {
            let Some(section) = flow.sections().get(index) else {
                return Row::new(Vec::<Cell>::new());
            };
            let marker = if section.collapsed { "▸" } else { "▾" };
            let mut style = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
            if grabbed == Some(&Grab::Section(section.id.clone())) {
                style = style.fg(Color::Magenta);
            }
            Row::new(vec![
                Cell::from(marker),
                Cell::from(format!("{} ({})", section.name, section.asana_ids.len())),
                Cell::from(""),
                Cell::from(format_duration(flow.section_duration(&section.id))),
            ])
            .style(style)
        }
        DisplayRow::Pose(position) => {
            let Some(pose) = flow.pose(position) else {
                return Row::new(Vec::<Cell>::new());
            };
            let indent = if flow.section_of(position).is_some() { "  " } else { "" };
            let check = if pose.selected { "* " } else { "" };
            let mut style = Style::default();
            if pose.selected {
                style = style.fg(Color::Green);
            }
            if grabbed == Some(&Grab::Pose(position)) {
                style = style.fg(Color::Magenta).add_modifier(Modifier::BOLD);
            }
            Row::new(vec![
                Cell::from((position + 1).to_string()),
                Cell::from(format!("{}{}{}", indent, check, pose.display_name())),
                Cell::from(pose.sanskrit.clone()),
                Cell::from(format!("{}s", pose.duration)),
            ])
            .style(style)
        }
    }
}

fn render_catalog(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(9)])
        .split(area);

    let poses = app.filtered_catalog();
    let items: Vec<ListItem> = poses
        .iter()
        .map(|pose| {
            ListItem::new(Line::from(vec![
                Span::raw(pose.name.clone()),
                Span::styled(
                    format!("  {}s", pose.duration),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();
    let title = if app.catalog_query.is_empty() {
        format!("Catalog ({})", poses.len())
    } else {
        format!("Catalog: \"{}\" ({})", app.catalog_query, poses.len())
    };
    let list = List::new(items)
        .block(pane_block(title, app.focus == Focus::Catalog))
        .highlight_style(Style::default().bg(Color::Blue).fg(Color::White));
    let mut state = ListState::default().with_selected(Some(app.catalog_selected));
    f.render_stateful_widget(list, chunks[0], &mut state);

    let details = match app.selected_catalog_pose() {
        Some(pose) => {
            let suggestions: Vec<&str> = app
                .catalog
                .suggestions_for(pose)
                .iter()
                .map(|p| p.name.as_str())
                .collect();
            vec![
                Line::from(Span::styled(
                    pose.name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(format!("{} | {}", pose.sanskrit, pose.difficulty)),
                Line::from(format!("Tags: {}", pose.tags.join(", "))),
                Line::from(pose.description.clone()),
                Line::from(format!("Next: {}", suggestions.join(", "))),
            ]
        }
        None => vec![Line::from("No pose matches the search")],
    };
    let details = Paragraph::new(details)
        .block(Block::default().borders(Borders::ALL).title("Pose"))
        .wrap(Wrap { trim: true });
    f.render_widget(details, chunks[1]);
}

fn render_practice(f: &mut Frame, practice: &PracticeSession, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(if practice.is_paused() {
        "Practice (paused)"
    } else {
        "Practice"
    });
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Length(4),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Min(0),
        ])
        .split(inner);

    let bold = Style::default().add_modifier(Modifier::BOLD);
    match practice.state() {
        PracticeState::Idle => {
            f.render_widget(
                Paragraph::new("Not practicing").alignment(Alignment::Center),
                chunks[1],
            );
        }
        PracticeState::Countdown(seconds) => {
            let first = practice.upcoming_pose().map(|p| p.display_name()).unwrap_or_default();
            let text = vec![
                Line::from(Span::styled(format!("{}", seconds), bold.fg(Color::Yellow))),
                Line::from(format!("Get ready for {}", first)),
            ];
            f.render_widget(Paragraph::new(text).alignment(Alignment::Center), chunks[1]);
        }
        PracticeState::PoseActive(index) => {
            let Some(pose) = practice.current_pose() else {
                return;
            };
            let text = vec![
                Line::from(Span::styled(pose.display_name(), bold.fg(Color::Cyan))),
                Line::from(pose.sanskrit.clone()),
                Line::from(format!("Pose {} of {}", index + 1, practice.poses().len())),
            ];
            f.render_widget(Paragraph::new(text).alignment(Alignment::Center), chunks[1]);

            let remaining = practice.remaining().unwrap_or(0);
            let total = pose.duration.max(1);
            let ratio = f64::from(total.saturating_sub(remaining)) / f64::from(total);
            let gauge = Gauge::default()
                .block(Block::default().borders(Borders::ALL))
                .gauge_style(Style::default().fg(Color::Green))
                .ratio(ratio.clamp(0.0, 1.0))
                .label(format!("{} left", format_duration(remaining)));
            f.render_widget(gauge, chunks[2]);

            let next = practice
                .upcoming_pose()
                .map(|p| format!("Up next: {}", p.display_name()))
                .unwrap_or_else(|| "Last pose".to_string());
            let footer = vec![
                Line::from(next),
                Line::from(format!(
                    "Flow time left: {}",
                    format_duration(practice.remaining_total())
                )),
            ];
            f.render_widget(Paragraph::new(footer).alignment(Alignment::Center), chunks[3]);
        }
        PracticeState::Complete => {
            let text = vec![
                Line::from(Span::styled("Flow complete", bold.fg(Color::Green))),
                Line::from("Namaste"),
            ];
            f.render_widget(Paragraph::new(text).alignment(Alignment::Center), chunks[1]);
        }
    }
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let text = match &app.mode {
        AppMode::Prompt(kind) => format!(
            "{}: {} (Enter to confirm, Esc to cancel)",
            kind.title(),
            app.input
        ),
        AppMode::Help => "↑↓/jk: scroll | PgUp/PgDn: fast scroll | Home: top | Esc/q: close help".to_string(),
        AppMode::ConfirmDelete => "y: delete | n/Esc: keep".to_string(),
        mode => match &app.status_message {
            Some(status) => status.clone(),
            None => match mode {
                AppMode::Library => "Enter: open | n: new | p: practice | d: delete | Ctrl+Y: copy share code | ?: help | q: quit".to_string(),
                AppMode::Builder => "Tab: switch pane | a: add | m: move | Space: select | g: group | Ctrl+S: save | p: practice | ?: help | Esc: library".to_string(),
                _ => "Space: pause | →/n: next | ←/b: previous | e: end | Esc: stop".to_string(),
            },
        },
    };

    let style = match app.mode {
        AppMode::Prompt(_) => Style::default().fg(Color::Yellow),
        AppMode::Help => Style::default().fg(Color::Cyan),
        AppMode::ConfirmDelete => Style::default().fg(Color::Red),
        _ => Style::default(),
    };
    let status = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(style);
    f.render_widget(status, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn render_confirm_popup(f: &mut Frame, app: &App) {
    let Some(flow) = app.selected_library_flow() else {
        return;
    };
    let popup_area = centered(f.area(), 50, 5);
    f.render_widget(Clear, popup_area);
    let popup = Paragraph::new(format!("Delete '{}'?\n\ny: delete    n: keep", flow.name))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Delete flow")
                .style(Style::default().fg(Color::Red)),
        );
    f.render_widget(popup, popup_area);
}

fn render_help_popup(f: &mut Frame, scroll: usize) {
    let area = f.area();
    let popup_area = Rect {
        x: area.width / 10,
        y: area.height / 10,
        width: area.width * 4 / 5,
        height: area.height * 4 / 5,
    };

    f.render_widget(Clear, popup_area);

    let help_text = get_help_text();
    let help_lines: Vec<&str> = help_text.lines().collect();
    let visible_height = popup_area.height.saturating_sub(2) as usize;

    let start_line = scroll.min(help_lines.len().saturating_sub(visible_height));
    let end_line = (start_line + visible_height).min(help_lines.len());

    let visible_text = help_lines[start_line..end_line].join("\n");

    let help_widget = Paragraph::new(visible_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("tflow Help (Line {}/{})", start_line + 1, help_lines.len()))
                .style(Style::default().fg(Color::Cyan)),
        )
        .style(Style::default().fg(Color::White));

    f.render_widget(help_widget, popup_area);
}

fn get_help_text() -> String {
    r#"TFLOW KEYS

=== LIBRARY ===
↑↓ or j/k       Choose a saved flow
Enter           Open the flow in the builder
n               New flow
p               Practice the selected flow
d               Delete the selected flow (asks first)
Ctrl+O          Import a .flow or .json file
Ctrl+V          Import a share code (prefilled from the clipboard)
Ctrl+Y          Copy the selected flow's share code
q               Quit

=== BUILDER: FLOW PANE ===
↑↓ or j/k       Move the cursor
K / J           Move the pose one row up / down
m               Pick up the pose or section under the cursor
Enter           Drop it before the cursor row
                Dropped on a pose: joins that pose's section
                Dropped on a header: joins that section
End             Drop it at the end of the flow, ungrouped
Esc             Put it back
Space           Select / unselect a pose
g               Group the selected poses into a new section
u               Take the pose out of its section
c               Collapse / expand the section
r               Rename the section
x               Delete the section under the cursor (poses stay)
d               Remove the pose
D               Remove every selected pose
y               Duplicate the pose
+ / -           Hold one second longer / shorter
t               Type an exact hold time (1-300 seconds)
s               Cycle side: none, Left, Right
o               Toggle sort direction (new poses land on top)

=== BUILDER: CATALOG PANE ===
↑↓ or j/k       Choose a pose
Enter or a      Add it to the flow
/               Search by name, sanskrit name or tag

=== BUILDER: FLOW ===
Tab             Switch between flow and catalog
n               Rename the flow
i               Edit the description
p               Practice
Ctrl+S          Save now (edits are also saved after a short pause)
Ctrl+E          Export to a .flow file
Ctrl+W          Write a CSV practice sheet
Ctrl+Y          Copy the share code
Esc             Back to the library (saves unsaved edits)
q               Quit

=== PRACTICE ===
Space           Pause / resume
→ or n          Next pose
← or b          Previous pose
e               End the flow now
Esc             Stop and go back

=== HELP NAVIGATION ===
↑↓ or j/k       Scroll help text up/down one line
Page Up/Down    Scroll help text up/down 5 lines
Home            Jump to top of help text
Esc/F1/?/q      Close this help window"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Pose;
    use ratatui::{backend::TestBackend, Terminal};

    fn draw(app: &App) -> String {
        let backend = TestBackend::new(100, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| render_ui(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|line| line.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(300), "5:00");
    }

    #[test]
    fn test_library_screen() {
        let app = App::default();
        let screen = draw(&app);
        assert!(screen.contains("Saved flows"));
        assert!(screen.contains("No saved flows"));
    }

    #[test]
    fn test_builder_screen_shows_sections_and_totals() {
        let mut app = App::default();
        app.new_flow();
        app.add_pose(Pose::new("Warrior Two", 30));
        app.add_pose(Pose::new("Triangle", 15));
        app.session
            .as_mut()
            .unwrap()
            .flow
            .group_positions("Standing", &[0, 1])
            .unwrap();

        let screen = draw(&app);
        assert!(screen.contains("Standing (2)"));
        assert!(screen.contains("Warrior Two"));
        assert!(screen.contains("0:45"));
        assert!(screen.contains("Catalog"));
    }

    #[test]
    fn test_help_and_prompt_render_over_builder() {
        let mut app = App::default();
        app.new_flow();
        app.open_help();
        assert!(draw(&app).contains("TFLOW KEYS"));
        app.close_help();

        app.start_rename_flow();
        let screen = draw(&app);
        assert!(screen.contains("Flow name: Untitled flow"));
        assert!(screen.contains("sorted ascending"));
    }
}
