use super::{ProfileField, UiState, INTERESTS};
use crate::model::Stage;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

pub(super) fn draw(area: Rect, f: &mut Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(4),
        ])
        .split(area);

    draw_header(f, chunks[0], state);

    if state.wf.profile_visible() {
        let overlay = state.wf.stage() != Stage::Profile;
        draw_profile(f, chunks[1], state, overlay);
    } else {
        match state.wf.stage() {
            Stage::Profile => draw_profile(f, chunks[1], state, false),
            Stage::Shares => draw_shares(f, chunks[1], state),
            Stage::Matches => draw_matches(f, chunks[1], state),
        }
    }

    draw_status(f, chunks[2], state);
}

fn draw_header(f: &mut Frame, area: Rect, state: &UiState) {
    let selected = match state.wf.stage() {
        Stage::Profile => 0,
        Stage::Shares => 1,
        Stage::Matches => 2,
    };
    let titles = ["1 Profile", "2 Shares", "3 Matches"].map(Line::from);
    let tabs = Tabs::new(titles.to_vec())
        .select(selected)
        .highlight_style(Style::default().add_modifier(Modifier::BOLD).fg(Color::Magenta))
        .block(Block::default().borders(Borders::ALL).title("Co-Match"));
    f.render_widget(tabs, area);
}

fn field_row<'a>(selected: bool, label: &'a str, value: String) -> Line<'a> {
    let marker = if selected { "> " } else { "  " };
    let label_style = if selected {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    Line::from(vec![
        Span::raw(marker),
        Span::styled(format!("{label:<16}"), label_style),
        Span::raw(value),
    ])
}

fn pref_gender_label(value: u32) -> String {
    match value {
        2 => "any".to_string(),
        other => other.to_string(),
    }
}

fn draw_profile(f: &mut Frame, area: Rect, state: &UiState, overlay: bool) {
    let profile = state.wf.profile.record();
    let read_only = state.wf.profile.is_read_only();
    let cursor_on = |field: ProfileField| !read_only && !overlay && state.selected_field() == field;

    let mut lines: Vec<Line> = Vec::new();

    if read_only {
        let saved = state.wf.saved_utc().unwrap_or("unknown");
        lines.push(Line::from(Span::styled(
            format!("Read-only — saved {saved}"),
            Style::default().fg(Color::Gray),
        )));
        lines.push(Line::default());
    }

    lines.push(field_row(
        cursor_on(ProfileField::Age),
        "Age",
        profile.age.to_string(),
    ));
    lines.push(field_row(
        cursor_on(ProfileField::Gender),
        "Gender",
        format!("{} (0/1)", profile.gender),
    ));
    lines.push(field_row(
        cursor_on(ProfileField::Region),
        "Region",
        format!("{} (1-4)", profile.region),
    ));

    lines.push(field_row(
        cursor_on(ProfileField::Interests),
        "Interests",
        format!(
            "{} of {} selected",
            profile.interests.len(),
            crate::workflow::profile::REQUIRED_INTERESTS
        ),
    ));
    lines.extend(interest_rows(state, profile, read_only || overlay));

    lines.push(field_row(
        cursor_on(ProfileField::AgeMin),
        "Partner age min",
        profile.preferences.age_min.to_string(),
    ));
    lines.push(field_row(
        cursor_on(ProfileField::AgeMax),
        "Partner age max",
        profile.preferences.age_max.to_string(),
    ));
    lines.push(field_row(
        cursor_on(ProfileField::PrefGender),
        "Partner gender",
        pref_gender_label(profile.preferences.gender),
    ));

    if !read_only && !overlay {
        lines.push(Line::default());
        if state.wf.profile.can_submit() {
            lines.push(Line::from(Span::styled(
                "Enter: submit profile",
                Style::default().fg(Color::Green),
            )));
        } else {
            let remaining = state.wf.profile.interests_remaining();
            lines.push(Line::from(Span::styled(
                format!(
                    "Submit locked — select {remaining} more interest{}",
                    if remaining == 1 { "" } else { "s" }
                ),
                Style::default().fg(Color::DarkGray),
            )));
        }
    }

    let title = if overlay { "Profile (view)" } else { "Profile" };
    let body =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(body, area);
}

/// Catalog entries, four per row, with the selection cursor in reverse
/// video while the interests field is focused.
fn interest_rows<'a>(
    state: &UiState,
    profile: &crate::model::Profile,
    frozen: bool,
) -> Vec<Line<'a>> {
    let focused = !frozen && state.selected_field() == ProfileField::Interests;
    let mut rows = Vec::new();
    for chunk in INTERESTS.chunks(4) {
        let mut spans = vec![Span::raw("    ")];
        for (id, label) in chunk {
            let idx = INTERESTS.iter().position(|(i, _)| i == id).unwrap_or(0);
            let mark = if profile.interests.contains(id) {
                "[x]"
            } else {
                "[ ]"
            };
            let mut style = Style::default();
            if profile.interests.contains(id) {
                style = style.fg(Color::Green);
            }
            if focused && idx == state.interest_cursor {
                style = style.add_modifier(Modifier::REVERSED);
            }
            spans.push(Span::styled(format!("{mark} {label:<12}"), style));
        }
        rows.push(Line::from(spans));
    }
    rows
}

fn draw_shares(f: &mut Frame, area: Rect, state: &UiState) {
    let step = &state.wf.shares;
    let mut lines: Vec<Line> = Vec::new();

    let handle_value = if step.handle.is_empty() && !state.handle_editing {
        Span::styled("(not set — press h)", Style::default().fg(Color::DarkGray))
    } else if state.handle_editing {
        Span::styled(
            format!("{}▏ (Enter to finish)", step.handle),
            Style::default().fg(Color::Yellow),
        )
    } else {
        Span::raw(step.handle.clone())
    };
    lines.push(Line::from(vec![
        Span::styled("Public handle:  ", Style::default().fg(Color::Gray)),
        handle_value,
    ]));

    let shares_status = if step.generating {
        Span::styled("generating…", Style::default().fg(Color::Yellow))
    } else {
        match &step.shares {
            Some(set) => Span::styled(
                format!("{} shares ready (held in memory only)", set.len()),
                Style::default().fg(Color::Green),
            ),
            None => Span::styled("none — press g", Style::default().fg(Color::DarkGray)),
        }
    };
    lines.push(Line::from(vec![
        Span::styled("Shares:         ", Style::default().fg(Color::Gray)),
        shares_status,
    ]));

    let upload_status = if step.uploading {
        Span::styled("uploading…", Style::default().fg(Color::Yellow))
    } else if step.upload_complete {
        Span::styled("complete", Style::default().fg(Color::Green))
    } else {
        Span::styled("press u when ready", Style::default().fg(Color::DarkGray))
    };
    lines.push(Line::from(vec![
        Span::styled("Upload:         ", Style::default().fg(Color::Gray)),
        upload_status,
    ]));

    if let Some(error) = &step.error {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Error: {error} — retry available"),
            Style::default().fg(Color::Red),
        )));
    }

    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Shares never touch disk; restarting before upload requires regeneration.",
        Style::default().fg(Color::DarkGray),
    )));

    let body = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Shares"));
    f.render_widget(body, area);
}

fn draw_matches(f: &mut Frame, area: Rect, state: &UiState) {
    let step = &state.wf.matches;
    let mut lines: Vec<Line> = Vec::new();

    if step.in_flight {
        lines.push(Line::from(Span::styled(
            format!(
                "Computing matches… {}s elapsed (this can take a while)",
                step.elapsed_secs()
            ),
            Style::default().fg(Color::Yellow),
        )));
    } else if let Some(error) = &step.error {
        lines.push(Line::from(Span::styled(
            format!("Error: {error}"),
            Style::default().fg(Color::Red),
        )));
        lines.push(Line::default());
        lines.push(Line::from("Press r to try again."));
    } else {
        match &step.matches {
            None => {
                lines.push(Line::from("Press r to check for matches."));
            }
            Some(handles) if handles.is_empty() => {
                lines.push(Line::from(Span::styled(
                    "No matches yet",
                    Style::default().add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::default());
                lines.push(Line::from("Press r to check again later."));
            }
            Some(handles) => {
                for handle in handles {
                    lines.push(Line::from(vec![
                        Span::styled(
                            format!("@{handle}"),
                            Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                        ),
                        Span::raw("  — you have a match!"),
                    ]));
                }
            }
        }
    }

    let title = match &step.matches {
        Some(handles) if !handles.is_empty() => format!("Matches ({})", handles.len()),
        _ => "Matches".to_string(),
    };
    let body = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(body, area);
}

fn draw_status(f: &mut Frame, area: Rect, state: &UiState) {
    let help = if state.handle_editing {
        "type the handle · enter/esc finish"
    } else if state.wf.profile_visible() && state.wf.stage() != Stage::Profile {
        "v close profile view · q quit"
    } else {
        match state.wf.stage() {
            Stage::Profile => "↑/↓ field · ←/→ adjust · space toggle interest · enter submit · q quit",
            Stage::Shares => "h handle · g generate · u upload · v view profile · q quit",
            Stage::Matches => "r refresh · c copy matches · v view profile · q quit",
        }
    };

    let lines = vec![
        Line::from(Span::styled(
            state.info.clone(),
            Style::default().fg(Color::Yellow),
        )),
        Line::from(Span::styled(help, Style::default().fg(Color::Gray))),
    ];
    let status =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, area);
}
