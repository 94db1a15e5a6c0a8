use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};

use crate::controls::StatusSnapshot;

const TITLE: &str = "slotmix";
const CONTROLS_HELP: &str =
    "space=play/pause  ←/→=seek 5s  n=next (crossfade)  f=fade out  1-9=SE  -/+=master  [/]=pan  q=quit";

pub fn draw_status(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    status: &StatusSnapshot,
    effect_names: &[String],
    log_lines: &[String],
) {
    // Render the controls + status panels.
    let _ = terminal.draw(|f| {
        let status_height = status.text.lines().count() as u16 + 2;
        let effects_height = if effect_names.is_empty() {
            0
        } else {
            effect_names.len().min(9) as u16 + 2
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(1),
                Constraint::Length(3),
                Constraint::Length(status_height),
                Constraint::Length(effects_height),
                Constraint::Min(0),
            ])
            .split(f.size());

        let title = Paragraph::new(TITLE).style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        );
        f.render_widget(title, chunks[0]);

        let controls = Paragraph::new(CONTROLS_HELP)
            .style(Style::default().fg(Color::Blue))
            .block(Block::default().borders(Borders::ALL).title("Controls"));
        f.render_widget(controls, chunks[1]);

        let status_widget = Paragraph::new(status.text.as_str())
            .style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .block(Block::default().borders(Borders::ALL).title("Playback"));
        f.render_widget(status_widget, chunks[2]);

        if !effect_names.is_empty() {
            let effects_text = effect_names
                .iter()
                .take(9)
                .enumerate()
                .map(|(index, name)| format!("{}: {}", index + 1, name))
                .collect::<Vec<_>>()
                .join("\n");
            let effects_widget = Paragraph::new(effects_text)
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().borders(Borders::ALL).title("Sound effects"));
            f.render_widget(effects_widget, chunks[3]);
        }

        let log_height = chunks[4].height.saturating_sub(2) as usize;
        let start = log_lines.len().saturating_sub(log_height);
        let log_text = if log_lines.is_empty() {
            "No logs yet.".to_string()
        } else {
            log_lines[start..].join("\n")
        };

        let log_widget = Paragraph::new(log_text)
            .style(Style::default().fg(Color::DarkGray))
            .block(Block::default().borders(Borders::ALL).title("Logs"));
        f.render_widget(log_widget, chunks[4]);
    });
}
