//! Dashboard rendering using ratatui.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use super::app::App;

/// Render the dashboard.
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // plan header
            Constraint::Min(5),    // days
            Constraint::Length(8), // flights and stays
            Constraint::Length(1), // status bar
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    render_days(f, app, chunks[1]);
    render_bookings(f, app, chunks[2]);
    render_status_bar(f, app, chunks[3]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let plan = app.plan();
    let dates = match (plan.start_date, plan.end_date) {
        (Some(start), Some(end)) => format!("{start} to {end} ({} days)", plan.total_days),
        _ => "dates not set".to_string(),
    };
    let text = format!(
        " {} | {} | members: {}",
        plan.id,
        dates,
        plan.members.join(", ")
    );
    let header = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(" Plan "));
    f.render_widget(header, area);
}

fn render_days(f: &mut Frame, app: &App, area: Rect) {
    let plan = app.plan();

    let header_cells = ["Day", "Title", "Spots", ""]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells).height(1);

    let labels = app.day_labels();
    let rows = labels.iter().enumerate().map(|(i, label)| {
        let day = &plan.daily_plans[label];
        let spots = day
            .locations
            .iter()
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let mut flags = Vec::new();
        if day.completed {
            flags.push("done");
        }
        if plan.skipped_days.contains(label) {
            flags.push("skipped");
        }

        let style = if i == app.selected_day {
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD)
        } else if plan.skipped_days.contains(label) {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Row::new(vec![
            Cell::from(label.clone()),
            Cell::from(day.title.clone().unwrap_or_default()),
            Cell::from(spots),
            Cell::from(flags.join(", ")),
        ])
        .style(style)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Percentage(25),
            Constraint::Percentage(55),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(" Days "));

    f.render_widget(table, area);
}

fn render_bookings(f: &mut Frame, app: &App, area: Rect) {
    let plan = app.plan();

    let mut lines: Vec<Line> = Vec::new();
    for (heading, bookings) in [("Flights", &plan.flights), ("Stays", &plan.stays)] {
        if bookings.is_empty() {
            continue;
        }
        lines.push(Line::from(Span::styled(
            heading,
            Style::default().fg(Color::Yellow),
        )));
        for booking in bookings.values() {
            let details = serde_json::to_string(&booking.details).unwrap_or_default();
            lines.push(Line::from(format!(
                "  {} votes | {} comments | {}",
                booking.votes.len(),
                booking.comments.len(),
                details
            )));
        }
    }
    if lines.is_empty() {
        lines.push(Line::from("No flights or stays proposed yet."));
    }

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Bookings "));
    f.render_widget(paragraph, area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let status = app.sync_status();
    let (sync_text, sync_style) = if !status.live {
        ("offline", Style::default().fg(Color::Red))
    } else if status.dirty {
        ("syncing...", Style::default().fg(Color::Yellow))
    } else {
        ("saved", Style::default().fg(Color::Green))
    };

    let mut spans = vec![
        Span::styled(format!(" {sync_text} "), sync_style),
        Span::raw("| j/k move | d done | s skip | q quit"),
    ];
    if let Some(err) = &status.last_error {
        spans.push(Span::styled(
            format!(" | last error: {err}"),
            Style::default().fg(Color::Red),
        ));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
