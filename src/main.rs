use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use tracing::info;

use kp_oracle::config::OracleConfig;
use kp_oracle::fixtures::Fixture;
use kp_oracle::logging;
use kp_oracle::state::{AppState, Delta, ProviderCommand, apply_delta};
use kp_oracle::store::PredictionPhase;
use kp_oracle::tips::{Tip, TipVerdict, is_result_or_goals_tip, validate_for_fixture};
use kp_oracle::worker::spawn_provider;

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
}

impl App {
    fn new(state: AppState, cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state,
            should_quit: false,
            cmd_tx,
        }
    }

    fn send(&mut self, cmd: Option<ProviderCommand>) {
        let Some(cmd) = cmd else {
            return;
        };
        if let Some(tx) = self.cmd_tx.as_ref()
            && tx.send(cmd).is_err()
        {
            self.state.push_log("[WARN] Provider thread stopped");
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.help_overlay {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                self.state.help_overlay = false;
            }
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = true,
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Char('h') | KeyCode::Left => {
                let cmd = self.state.shift_date(-1);
                self.send(Some(cmd));
            }
            KeyCode::Char('l') | KeyCode::Right => {
                let cmd = self.state.shift_date(1);
                self.send(Some(cmd));
            }
            KeyCode::Char('f') => self.state.cycle_league_filter(),
            KeyCode::Char('a') | KeyCode::Enter => {
                let cmd = self.state.begin_league_analysis();
                self.send(cmd);
            }
            KeyCode::Char('r') => {
                let cmd = self.state.refresh();
                self.send(Some(cmd));
            }
            KeyCode::Char('t') => {
                let cmd = self.state.toggle_translation();
                self.send(cmd);
            }
            KeyCode::Char('c') => {
                if let Some(text) = self.state.selected_fixture().map(|f| f.copy_text()) {
                    self.state.push_log(format!("[INFO] {text}"));
                }
            }
            KeyCode::Esc => self.state.banner = None,
            _ => {}
        }
    }
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let cfg = OracleConfig::from_env();
    let log_path = logging::init(&cfg)?;
    let today = Local::now().date_naive();
    let date = cfg.start_date.unwrap_or(today);
    info!(%date, source = ?cfg.football.source, "starting");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    spawn_provider(cfg, tx, cmd_rx);

    let mut state = AppState::new(date, today);
    if let Some(path) = log_path {
        state.push_log(format!("[INFO] Logging to {}", path.display()));
    }
    let fetch = state.fetch_command(false);
    let mut app = App::new(state, Some(cmd_tx));
    app.send(Some(fetch));
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key);
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let state = &app.state;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(state))
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);
    render_fixture_list(frame, columns[0], state);
    render_prediction(frame, columns[1], state);

    let console = Paragraph::new(console_text(state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(
        "h/l Day | j/k Move | f League | a Analyze | t Translate | c Copy | r Refresh | ? Help | q Quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(footer, chunks[3]);

    let area = frame.size();
    if let Some(banner) = state.banner.as_deref() {
        render_banner(frame, area, banner);
    }
    if state.help_overlay {
        render_help_overlay(frame, area);
    }
}

fn header_text(state: &AppState) -> String {
    let usage = match state.usage {
        Some(u) => format!("AI {}/{}", u.used, u.limit),
        None => "AI -/-".to_string(),
    };
    let day = if state.date == state.today {
        "today".to_string()
    } else {
        state.date.format("%a").to_string()
    };
    format!(
        " KP ORACLE | {} ({day}) | {} | {usage}",
        state.date.format("%Y-%m-%d"),
        state.league_filter_label()
    )
}

fn render_fixture_list(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Fixtures").borders(Borders::ALL);
    let fixtures = state.filtered_fixtures();
    if fixtures.is_empty() {
        let msg = if state.fixtures_loading {
            "Loading fixtures..."
        } else {
            "No fixtures for this day"
        };
        let empty = Paragraph::new(msg)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let visible = area.height.saturating_sub(2) as usize;
    let (start, end) = visible_range(state.selected, fixtures.len(), visible);
    let mut lines = Vec::with_capacity(end - start);
    let mut last_league = None;
    for (idx, fixture) in fixtures.iter().enumerate().take(end).skip(start) {
        let league = fixture.league_label();
        if idx == start || last_league.as_ref() != Some(&league) {
            if lines.len() + 1 >= visible {
                break;
            }
            lines.push(Line::styled(
                league.clone(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ));
            last_league = Some(league);
        }
        let style = if idx == state.selected {
            Style::default().fg(Color::Black).bg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::styled(fixture_row(state, fixture), style));
    }
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn fixture_row(state: &AppState, fixture: &Fixture) -> String {
    let time = fixture
        .kickoff()
        .map(|k| k.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let score = match fixture.final_score() {
        Some(s) => format!("{}-{}", s.home, s.away),
        None => fixture.fixture.status.short.clone(),
    };
    let entry = state.prediction_for(fixture.id());
    let status = match entry.map(|p| p.phase()) {
        Some(PredictionPhase::Pending) => "…",
        Some(PredictionPhase::Resolved) => "●",
        Some(PredictionPhase::Failed) => "!",
        None => " ",
    };
    let tip = entry
        .and_then(|p| p.result.as_ref())
        .map(|p| {
            let verdict = validate_for_fixture(&p.safe_tip, fixture);
            format!(" | {} {}", p.safe_tip.value, verdict.symbol())
        })
        .unwrap_or_default();
    format!(
        "{status} {time} {} v {} {score}{tip}",
        fixture.teams.home.name, fixture.teams.away.name
    )
}

fn render_prediction(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default().title("Prediction").borders(Borders::ALL);
    let text = match state.selected_fixture() {
        Some(fixture) => prediction_text(state, fixture),
        None => "No fixture selected".to_string(),
    };
    let para = Paragraph::new(text).wrap(Wrap { trim: false }).block(block);
    frame.render_widget(para, area);
}

fn prediction_text(state: &AppState, fixture: &Fixture) -> String {
    let mut lines = vec![
        format!("{} v {}", fixture.teams.home.name, fixture.teams.away.name),
        fixture.league_label(),
    ];
    if let Some(score) = fixture.final_score() {
        let ht = score
            .halftime
            .map(|(h, a)| format!(" (HT {h}-{a})"))
            .unwrap_or_default();
        lines.push(format!("Final: {}-{}{ht}", score.home, score.away));
    }
    lines.push(String::new());

    let Some(entry) = state.prediction_for(fixture.id()) else {
        lines.push("Press a to analyze this league".to_string());
        return lines.join("\n");
    };
    match entry.phase() {
        PredictionPhase::Pending => lines.push("Consulting the chart...".to_string()),
        PredictionPhase::Failed => {
            lines.push(entry.error.clone().unwrap_or_default());
            lines.push("Press a to retry".to_string());
        }
        PredictionPhase::Resolved => {
            let Some(prediction) = entry.result.as_ref() else {
                return lines.join("\n");
            };
            lines.push(tip_line("Safe", &prediction.safe_tip, fixture));
            lines.push(tip_line("Value", &prediction.value_tip, fixture));
            for tip in &prediction.tips {
                lines.push(tip_line("", tip, fixture));
            }
            let score_hit = fixture
                .final_score()
                .map(|s| prediction.matches_correct_score(&s));
            let mark = match score_hit {
                Some(true) => TipVerdict::Correct.symbol(),
                Some(false) => TipVerdict::Incorrect.symbol(),
                None => "",
            };
            lines.push(format!(
                "Scores: {} {mark}",
                prediction.correct_scores.join(", ")
            ));
            lines.push(String::new());
            let analysis = if state.show_translation {
                match state.translations.get(&fixture.id()) {
                    Some(text) => text.as_str(),
                    None if state.translating.contains(&fixture.id()) => "Translating...",
                    None => prediction.analysis.as_str(),
                }
            } else {
                prediction.analysis.as_str()
            };
            lines.push(analysis.to_string());
        }
    }
    lines.join("\n")
}

fn tip_line(label: &str, tip: &Tip, fixture: &Fixture) -> String {
    let verdict = validate_for_fixture(tip, fixture);
    let label = if label.is_empty() {
        String::new()
    } else {
        format!("{label}: ")
    };
    let primary = if is_result_or_goals_tip(&tip.value) { "*" } else { " " };
    format!(
        "{} {primary}{label}{} {} ({}%)",
        verdict.symbol(),
        tip.bet,
        tip.value,
        tip.confidence
    )
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No alerts yet".to_string();
    }
    let skip = state.logs.len().saturating_sub(3);
    state
        .logs
        .iter()
        .skip(skip)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_banner(frame: &mut Frame, area: Rect, message: &str) {
    let popup_area = centered_rect(60, 20, area);
    frame.render_widget(Clear, popup_area);
    let banner = Paragraph::new(format!("{message}\n\nEsc to dismiss"))
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::Red))
        .block(Block::default().title("Notice").borders(Borders::ALL));
    frame.render_widget(banner, popup_area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "KP Oracle - Help",
        "",
        "  h/l or ←/→   Previous / next day",
        "  j/k or ↑/↓   Move",
        "  f            Cycle league filter",
        "  a / Enter    Analyze the selected league",
        "  t            Translate analysis",
        "  c            Copy line to console",
        "  r            Refresh fixtures",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Tips:  ✓ correct  ✗ incorrect  ? unknown  - not checkable",
        "       * result, double chance or goals market",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
