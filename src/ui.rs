use std::io;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use crossterm::{ExecutableCommand, execute};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Gauge, List, ListItem, ListState, Paragraph, Row, Table, TableState};
use ratatui::{Frame, Terminal};

use crate::app::{Dashboard, NoticeKind};
use crate::detail::{DetailIntent, Progress, Routed};
use crate::domain::{Task, Timesheet, TimesheetStatus, format_hours};
use crate::error::AppResult;
use crate::filter::{DateRangePreset, StatusFilter, TimesheetFilter, next_date_range};
use crate::form::{FormMode, OpenForm};
use crate::repository::TaskRepository;
use crate::table::{ViewMode, action_label};
use crate::validation::TaskField;

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const FORM_FIELDS: [TaskField; 5] = [
	TaskField::Date,
	TaskField::ProjectName,
	TaskField::TypeOfWork,
	TaskField::Description,
	TaskField::Hours,
];

pub async fn run_dashboard<R: TaskRepository>(dashboard: &mut Dashboard<R>) -> AppResult<()> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	let result = run_event_loop(&mut terminal, dashboard).await;

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

async fn run_event_loop<R: TaskRepository>(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	dashboard: &mut Dashboard<R>,
) -> AppResult<()> {
	let mut ui = UiState::default();

	loop {
		dashboard.tick().await;
		let rows = detail_rows(dashboard);
		ui.clamp(&rows);
		terminal.draw(|frame| draw_dashboard(frame, dashboard, &ui, &rows))?;

		if event::poll(StdDuration::from_millis(250))? {
			if let CEvent::Key(key) = event::read()? {
				if key.kind != KeyEventKind::Press {
					continue;
				}

				let should_quit = if let Overlay::Select(_) = &ui.overlay {
					handle_select_key(&mut ui, key.code, dashboard).await;
					false
				} else if dashboard.form().is_open() {
					handle_form_key(&mut ui, key.code, dashboard).await;
					false
				} else {
					match dashboard.mode() {
						ViewMode::Table => handle_table_key(&mut ui, key.code, dashboard).await,
						ViewMode::Detail => {
							handle_detail_key(&mut ui, key.code, dashboard, &rows).await;
							false
						}
					}
				};

				if should_quit {
					break;
				}
			}
		}
	}

	Ok(())
}

fn draw_dashboard<R: TaskRepository>(frame: &mut Frame, dashboard: &Dashboard<R>, ui: &UiState, rows: &[DetailRow]) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(3), Constraint::Min(10), Constraint::Length(5)])
		.split(frame.area());

	render_header(frame, layout[0], dashboard);
	match dashboard.mode() {
		ViewMode::Table => render_table_panel(frame, layout[1], dashboard),
		ViewMode::Detail => render_detail_panel(frame, layout[1], dashboard, ui, rows),
	}
	render_footer(frame, layout[2], dashboard);

	if let Some(form) = dashboard.form().current() {
		render_form_popup(frame, form, ui.form_focus, dashboard.form().is_submitting());
	}
	if let Overlay::Select(select) = &ui.overlay {
		render_select_popup(frame, select);
	}
}

fn render_header<R: TaskRepository>(frame: &mut Frame, area: Rect, dashboard: &Dashboard<R>) {
	let user = dashboard.context().user();
	let line = Line::from(vec![
		Span::styled("ticktock", Style::default().add_modifier(Modifier::BOLD)),
		Span::raw(format!(" | {} <{}>", user.name, user.email)),
		Span::styled(
			format!(" | {}", dashboard.backend()),
			Style::default().fg(Color::DarkGray),
		),
	]);
	let header = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
	frame.render_widget(header, area);
}

fn render_table_panel<R: TaskRepository>(frame: &mut Frame, area: Rect, dashboard: &Dashboard<R>) {
	let table = dashboard.table();
	let rows = table
		.page_rows()
		.iter()
		.map(|sheet| {
			Row::new(vec![
				Cell::from(sheet.week_number.to_string()),
				Cell::from(sheet.date_range()),
				Cell::from(Span::styled(sheet.status.as_str(), status_style(sheet.status))),
				Cell::from(format_hours(sheet.total_hours)),
				Cell::from(Span::styled(
					action_label(sheet.status),
					Style::default().fg(Color::Blue),
				)),
			])
		})
		.collect::<Vec<_>>();

	let mut title = format!(
		"Your Timesheets | {} | page {}/{} | {} rows, {} per page",
		table.filter().describe(),
		table.current_page(),
		table.total_pages(),
		table.total(),
		table.page_size()
	);
	if table.is_loading() {
		title.push_str(" | loading...");
	}

	let widget = Table::new(
		rows,
		[
			Constraint::Length(8),
			Constraint::Min(24),
			Constraint::Length(12),
			Constraint::Length(10),
			Constraint::Length(8),
		],
	)
	.header(
		Row::new(vec!["Week #", "Date", "Status", "Hours", "Action"])
			.style(Style::default().add_modifier(Modifier::BOLD)),
	)
	.block(
		Block::default()
			.borders(Borders::ALL)
			.border_style(border_style(true))
			.title(title),
	)
	.highlight_symbol(">> ")
	.row_highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = TableState::default();
	if !table.page_rows().is_empty() {
		state.select(Some(table.cursor()));
	}
	frame.render_stateful_widget(widget, area, &mut state);
}

fn render_detail_panel<R: TaskRepository>(
	frame: &mut Frame,
	area: Rect,
	dashboard: &Dashboard<R>,
	ui: &UiState,
	rows: &[DetailRow],
) {
	let detail = dashboard.detail();
	let Some(timesheet) = detail.timesheet() else {
		let empty = Paragraph::new("No timesheet selected. Press Esc to go back to the table.")
			.block(Block::default().borders(Borders::ALL).title("This week's timesheet"));
		frame.render_widget(empty, area);
		return;
	};

	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Length(3), Constraint::Min(5)])
		.split(area);

	let progress = detail.progress();
	let gauge = Gauge::default()
		.block(
			Block::default()
				.borders(Borders::ALL)
				.title(format!("Week {} | {}", timesheet.week_number, timesheet.date_range())),
		)
		.gauge_style(Style::default().fg(progress_color(progress)))
		.ratio(progress.percentage / 100.0)
		.label(format!("{} ({:.0}%)", progress.label(), progress.percentage));
	frame.render_widget(gauge, layout[0]);

	let items = rows
		.iter()
		.map(|row| match row {
			DetailRow::Day(date) => ListItem::new(Line::from(vec![
				Span::styled(
					date.format("%a %-d %b").to_string(),
					Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
				),
				Span::styled("  + add task", Style::default().fg(Color::DarkGray)),
			])),
			DetailRow::Task(task) => ListItem::new(Line::from(vec![
				Span::raw("    "),
				Span::raw(task.short_description()),
				Span::styled(
					format!("  {}", format_hours(u32::from(task.hours))),
					Style::default().fg(Color::Yellow),
				),
				Span::styled(
					format!("  {} | {}", task.project_name, task.type_of_work),
					Style::default().fg(Color::Blue),
				),
			])),
		})
		.collect::<Vec<_>>();

	let list = List::new(items)
		.block(
			Block::default()
				.borders(Borders::ALL)
				.border_style(border_style(true))
				.title("This week's timesheet"),
		)
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !rows.is_empty() {
		state.select(Some(ui.detail_cursor));
	}
	frame.render_stateful_widget(list, layout[1], &mut state);
}

fn render_footer<R: TaskRepository>(frame: &mut Frame, area: Rect, dashboard: &Dashboard<R>) {
	let shortcuts = if dashboard.form().is_open() {
		vec![
			Line::from("Tab/arrows field | Left/Right change option, day or hours | type to edit description"),
			Line::from("Enter save | Esc cancel | F2 dismiss message"),
		]
	} else {
		match dashboard.mode() {
			ViewMode::Table => vec![
				Line::from("j/k move | h/l page | Enter open week | s status | r date range | p page size"),
				Line::from("f/g cycle status/range | R refresh | x dismiss message | q quit"),
			],
			ViewMode::Detail => vec![
				Line::from("j/k move | Enter/a add on day | e edit task | d delete task"),
				Line::from("x dismiss message | Esc back to table"),
			],
		}
	};

	let mut lines = shortcuts;
	if let Some(notice) = dashboard.notice() {
		let style = match notice.kind {
			NoticeKind::Info => Style::default().fg(Color::Green),
			NoticeKind::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
		};
		lines.push(Line::from(Span::styled(notice.message.clone(), style)));
	}

	let footer = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn render_form_popup(frame: &mut Frame, form: &OpenForm, focus: TaskField, submitting: bool) {
	let area = centered_rect(64, 60, frame.area());
	frame.render_widget(Clear, area);

	let title = match form.mode {
		FormMode::Create => "Add New Entry",
		FormMode::Edit { .. } => "Edit Entry",
	};

	let mut lines = Vec::new();
	for field in FORM_FIELDS {
		let value = match field {
			TaskField::Date => form
				.draft
				.date
				.map(|date| date.format("%a %-d %B, %Y").to_string())
				.unwrap_or_else(|| "(none)".to_string()),
			TaskField::ProjectName => format!("< {} >", form.draft.project_name),
			TaskField::TypeOfWork => format!("< {} >", form.draft.type_of_work),
			TaskField::Description => format!("{}_", form.draft.description),
			TaskField::Hours => format!("- {} +", form.draft.hours),
			TaskField::Timesheet => String::new(),
		};
		let label_style = if field == focus {
			Style::default()
				.fg(FOCUSED_PANEL_BORDER_COLOR)
				.add_modifier(Modifier::BOLD)
		} else {
			Style::default()
		};
		lines.push(Line::from(vec![
			Span::styled(format!("{:<16}", field.label()), label_style),
			Span::raw(value),
		]));
		if let Some(message) = form.errors.get(field) {
			lines.push(Line::from(Span::styled(
				format!("{:<16}{message}", ""),
				Style::default().fg(Color::Red),
			)));
		}
	}

	if let Some(message) = form.errors.get(TaskField::Timesheet) {
		lines.push(Line::from(Span::styled(message.to_string(), Style::default().fg(Color::Red))));
	}
	lines.push(Line::from(""));
	if submitting {
		lines.push(Line::from(Span::styled("Saving...", Style::default().fg(Color::DarkGray))));
	}
	if let Some(failure) = &form.failure {
		lines.push(Line::from(Span::styled(
			failure.clone(),
			Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
		)));
	}

	let popup = Paragraph::new(lines).block(
		Block::default()
			.borders(Borders::ALL)
			.border_style(border_style(true))
			.title(title),
	);
	frame.render_widget(popup, area);
}

fn render_select_popup(frame: &mut Frame, select: &SelectState) {
	let area = centered_rect(50, 40, frame.area());
	frame.render_widget(Clear, area);

	let items = select
		.options
		.iter()
		.map(|option| ListItem::new(option.label.clone()).style(option.style))
		.collect::<Vec<_>>();

	let list = List::new(items)
		.block(Block::default().borders(Borders::ALL).title(select.title.clone()))
		.highlight_symbol(">> ")
		.highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR));

	let mut state = ListState::default();
	if !select.options.is_empty() {
		state.select(Some(select.selected.min(select.options.len() - 1)));
	}
	frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
	let popup_layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([
			Constraint::Percentage((100 - percent_y) / 2),
			Constraint::Percentage(percent_y),
			Constraint::Percentage((100 - percent_y) / 2),
		])
		.split(area);
	Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Percentage((100 - percent_x) / 2),
			Constraint::Percentage(percent_x),
			Constraint::Percentage((100 - percent_x) / 2),
		])
		.split(popup_layout[1])[1]
}

async fn handle_table_key<R: TaskRepository>(ui: &mut UiState, code: KeyCode, dashboard: &mut Dashboard<R>) -> bool {
	match code {
		KeyCode::Char('q') | KeyCode::Esc => return true,
		KeyCode::Up | KeyCode::Char('k') => dashboard.table_mut().move_cursor(-1),
		KeyCode::Down | KeyCode::Char('j') => dashboard.table_mut().move_cursor(1),
		KeyCode::Left | KeyCode::Char('h') => {
			dashboard.table_mut().prev_page();
		}
		KeyCode::Right | KeyCode::Char('l') => {
			dashboard.table_mut().next_page();
		}
		KeyCode::Char('p') => {
			dashboard.table_mut().cycle_page_size();
		}
		KeyCode::Char('s') => ui.overlay = Overlay::Select(build_status_select(dashboard.table().filter())),
		KeyCode::Char('r') => ui.overlay = Overlay::Select(build_range_select(dashboard.table().filter())),
		KeyCode::Char('f') => {
			let filter = dashboard.table().filter();
			dashboard.apply_filter(TimesheetFilter {
				status: filter.status.next(),
				..filter
			});
		}
		KeyCode::Char('g') => {
			let filter = dashboard.table().filter();
			dashboard.apply_filter(TimesheetFilter {
				date_range: next_date_range(filter.date_range),
				..filter
			});
		}
		KeyCode::Char('R') => dashboard.refresh(),
		KeyCode::Char('x') => dashboard.dismiss_notice(),
		KeyCode::Enter => {
			dashboard.open_selected().await;
			ui.detail_cursor = 0;
		}
		_ => {}
	}
	false
}

async fn handle_detail_key<R: TaskRepository>(
	ui: &mut UiState,
	code: KeyCode,
	dashboard: &mut Dashboard<R>,
	rows: &[DetailRow],
) {
	let current = rows.get(ui.detail_cursor);
	match code {
		KeyCode::Esc | KeyCode::Char('b') => dashboard.back_to_table().await,
		KeyCode::Up | KeyCode::Char('k') => ui.detail_cursor = ui.detail_cursor.saturating_sub(1),
		KeyCode::Down | KeyCode::Char('j') => {
			ui.detail_cursor = (ui.detail_cursor + 1).min(rows.len().saturating_sub(1));
		}
		KeyCode::Enter | KeyCode::Char('a') => {
			let date = current.map(DetailRow::date);
			if dashboard.route(DetailIntent::Add { date }) == Routed::FormOpened {
				ui.form_focus = TaskField::Description;
			}
		}
		KeyCode::Char('e') => {
			if let Some(DetailRow::Task(task)) = current {
				dashboard.route(DetailIntent::Edit(task.clone()));
				ui.form_focus = TaskField::Description;
			}
		}
		KeyCode::Char('d') => {
			if let Some(DetailRow::Task(task)) = current {
				if let Routed::AwaitingConfirmation { task_id } = dashboard.route(DetailIntent::Delete {
					task_id: task.id.clone(),
				}) {
					ui.overlay = Overlay::Select(build_delete_select(task, task_id));
				}
			}
		}
		KeyCode::Char('x') => dashboard.dismiss_notice(),
		_ => {}
	}
}

async fn handle_form_key<R: TaskRepository>(ui: &mut UiState, code: KeyCode, dashboard: &mut Dashboard<R>) {
	let focus = ui.form_focus;
	match code {
		KeyCode::Esc => dashboard.form_mut().cancel(),
		KeyCode::F(2) => dashboard.dismiss_notice(),
		KeyCode::Tab | KeyCode::Down => ui.form_focus = next_field(focus, 1),
		KeyCode::BackTab | KeyCode::Up => ui.form_focus = next_field(focus, -1),
		KeyCode::Left | KeyCode::Right => {
			let delta = if code == KeyCode::Left { -1 } else { 1 };
			let form = dashboard.form_mut();
			match focus {
				TaskField::Date => form.edit(TaskField::Date, |draft| {
					draft.date = draft.date.map(|date| date + Duration::days(delta as i64));
				}),
				TaskField::ProjectName | TaskField::TypeOfWork => form.cycle_option(focus, delta),
				TaskField::Hours if delta > 0 => form.increment_hours(),
				TaskField::Hours => form.decrement_hours(),
				TaskField::Description | TaskField::Timesheet => {}
			}
		}
		KeyCode::Char('+') if focus == TaskField::Hours => dashboard.form_mut().increment_hours(),
		KeyCode::Char('-') if focus == TaskField::Hours => dashboard.form_mut().decrement_hours(),
		KeyCode::Char(value) if focus == TaskField::Description => {
			dashboard
				.form_mut()
				.edit(TaskField::Description, |draft| draft.description.push(value));
		}
		KeyCode::Backspace if focus == TaskField::Description => {
			dashboard.form_mut().edit(TaskField::Description, |draft| {
				draft.description.pop();
			});
		}
		KeyCode::Enter => {
			dashboard.submit_form().await;
		}
		_ => {}
	}
}

async fn handle_select_key<R: TaskRepository>(ui: &mut UiState, code: KeyCode, dashboard: &mut Dashboard<R>) {
	match code {
		KeyCode::Esc => {
			if let Overlay::Select(SelectState {
				kind: SelectKind::ConfirmDelete,
				..
			}) = &ui.overlay
			{
				dashboard.cancel_delete();
			}
			ui.overlay = Overlay::None;
		}
		KeyCode::Up | KeyCode::Char('k') => {
			if let Overlay::Select(select) = &mut ui.overlay {
				select.move_selection(-1);
			}
		}
		KeyCode::Down | KeyCode::Char('j') => {
			if let Overlay::Select(select) = &mut ui.overlay {
				select.move_selection(1);
			}
		}
		KeyCode::Enter => {
			let select = match std::mem::replace(&mut ui.overlay, Overlay::None) {
				Overlay::Select(select) => select,
				Overlay::None => return,
			};
			submit_select(select, dashboard).await;
		}
		_ => {}
	}
}

async fn submit_select<R: TaskRepository>(select: SelectState, dashboard: &mut Dashboard<R>) {
	let Some(option) = select.selected_option() else {
		return;
	};

	match select.kind {
		SelectKind::Status => {
			let status = option
				.value
				.as_deref()
				.and_then(StatusFilter::parse)
				.unwrap_or_default();
			let filter = TimesheetFilter {
				status,
				..dashboard.table().filter()
			};
			dashboard.apply_filter(filter);
		}
		SelectKind::DateRange => {
			let date_range = option.value.as_deref().and_then(DateRangePreset::parse);
			let filter = TimesheetFilter {
				date_range,
				..dashboard.table().filter()
			};
			dashboard.apply_filter(filter);
		}
		SelectKind::ConfirmDelete => {
			if option.value.is_some() {
				dashboard.confirm_delete().await;
			} else {
				dashboard.cancel_delete();
			}
		}
	}
}

fn build_status_select(current: TimesheetFilter) -> SelectState {
	let mut options = vec![SelectOption::new("All statuses", Some(StatusFilter::All.as_str().to_string()), Style::default())];
	options.extend(TimesheetStatus::ALL.into_iter().map(|status| {
		SelectOption::new(status.as_str(), Some(status.as_str().to_string()), status_style(status))
	}));
	let mut select = SelectState::new("Filter by status", SelectKind::Status, options);
	select.selected = match current.status {
		StatusFilter::All => 0,
		StatusFilter::Only(status) => TimesheetStatus::ALL
			.iter()
			.position(|candidate| *candidate == status)
			.map_or(0, |index| index + 1),
	};
	select
}

fn build_range_select(current: TimesheetFilter) -> SelectState {
	let mut options = vec![SelectOption::new("All dates", None, Style::default())];
	let presets = [
		DateRangePreset::ThisWeek,
		DateRangePreset::LastWeek,
		DateRangePreset::ThisMonth,
	];
	options.extend(
		presets
			.into_iter()
			.map(|preset| SelectOption::new(preset.label(), Some(preset.as_str().to_string()), Style::default())),
	);
	let mut select = SelectState::new("Filter by date range", SelectKind::DateRange, options);
	select.selected = current
		.date_range
		.and_then(|range| presets.iter().position(|preset| *preset == range))
		.map_or(0, |index| index + 1);
	select
}

fn build_delete_select(task: &Task, task_id: String) -> SelectState {
	SelectState::new(
		format!("Delete \"{}\"?", task.short_description()),
		SelectKind::ConfirmDelete,
		vec![
			SelectOption::new("Cancel", None, Style::default()),
			SelectOption::new("Delete task", Some(task_id), Style::default().fg(Color::Red)),
		],
	)
}

fn detail_rows<R: TaskRepository>(dashboard: &Dashboard<R>) -> Vec<DetailRow> {
	let mut rows = Vec::new();
	for (date, tasks) in dashboard.detail().groups() {
		rows.push(DetailRow::Day(date));
		rows.extend(tasks.into_iter().map(DetailRow::Task));
	}
	rows
}

fn next_field(current: TaskField, delta: isize) -> TaskField {
	let index = FORM_FIELDS.iter().position(|field| *field == current).unwrap_or(0);
	let next = (index as isize + delta).rem_euclid(FORM_FIELDS.len() as isize) as usize;
	FORM_FIELDS[next]
}

fn status_style(status: TimesheetStatus) -> Style {
	let color = match status {
		TimesheetStatus::Completed => Color::Green,
		TimesheetStatus::Incomplete => Color::Yellow,
		TimesheetStatus::Missing => Color::Red,
	};
	Style::default().fg(color)
}

fn progress_color(progress: Progress) -> Color {
	if progress.percentage >= 100.0 {
		Color::Green
	} else {
		Color::Blue
	}
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default()
			.fg(FOCUSED_PANEL_BORDER_COLOR)
			.add_modifier(Modifier::BOLD)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

pub fn print_table_page(rows: &[Timesheet], page: usize, total_pages: usize, filter: &TimesheetFilter) {
	println!("timesheets | {} | page {page}/{total_pages}", filter.describe());
	if rows.is_empty() {
		println!("no timesheets match");
		return;
	}

	for sheet in rows {
		println!(
			"{:>3} | {} | {:<10} | {:>7} | {} | {}",
			sheet.week_number,
			sheet.id,
			sheet.status,
			format_hours(sheet.total_hours),
			action_label(sheet.status),
			sheet.date_range()
		);
	}
}

pub fn print_detail(timesheet: &Timesheet, groups: &[(NaiveDate, Vec<Task>)], progress: Progress) {
	println!(
		"week {} | {} | {} | {} ({:.0}%)",
		timesheet.week_number,
		timesheet.date_range(),
		timesheet.status,
		progress.label(),
		progress.percentage
	);

	for (date, tasks) in groups {
		println!("\n{}", date.format("%a %-d %b"));
		if tasks.is_empty() {
			println!("  (no tasks)");
		}
		for task in tasks {
			println!(
				"  {} | {} | {} | {} | {}",
				task.id,
				format_hours(u32::from(task.hours)),
				task.project_name,
				task.type_of_work,
				task.short_description()
			);
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DetailRow {
	Day(NaiveDate),
	Task(Task),
}

impl DetailRow {
	fn date(&self) -> NaiveDate {
		match self {
			DetailRow::Day(date) => *date,
			DetailRow::Task(task) => task.date,
		}
	}
}

#[derive(Debug, Clone)]
struct SelectState {
	title: String,
	options: Vec<SelectOption>,
	selected: usize,
	kind: SelectKind,
}

impl SelectState {
	fn new(title: impl Into<String>, kind: SelectKind, options: Vec<SelectOption>) -> Self {
		Self {
			title: title.into(),
			options,
			selected: 0,
			kind,
		}
	}

	fn move_selection(&mut self, delta: i32) {
		if self.options.is_empty() {
			self.selected = 0;
			return;
		}

		if delta > 0 {
			self.selected = (self.selected + delta as usize).min(self.options.len() - 1);
		} else {
			self.selected = self.selected.saturating_sub(delta.unsigned_abs() as usize);
		}
	}

	fn selected_option(&self) -> Option<&SelectOption> {
		self.options.get(self.selected)
	}
}

#[derive(Debug, Clone)]
struct SelectOption {
	label: String,
	value: Option<String>,
	style: Style,
}

impl SelectOption {
	fn new(label: impl Into<String>, value: Option<String>, style: Style) -> Self {
		Self {
			label: label.into(),
			value,
			style,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectKind {
	Status,
	DateRange,
	ConfirmDelete,
}

#[derive(Debug, Clone)]
enum Overlay {
	None,
	Select(SelectState),
}

#[derive(Debug, Clone)]
struct UiState {
	detail_cursor: usize,
	form_focus: TaskField,
	overlay: Overlay,
}

impl Default for UiState {
	fn default() -> Self {
		Self {
			detail_cursor: 0,
			form_focus: TaskField::Description,
			overlay: Overlay::None,
		}
	}
}

impl UiState {
	fn clamp(&mut self, rows: &[DetailRow]) {
		self.detail_cursor = self.detail_cursor.min(rows.len().saturating_sub(1));
	}
}

#[cfg(test)]
mod tests {
	use chrono::NaiveDate;

	use super::{DetailRow, SelectKind, TimesheetFilter, build_status_select, next_field};
	use crate::domain::TimesheetStatus;
	use crate::filter::StatusFilter;
	use crate::validation::TaskField;

	#[test]
	fn form_focus_wraps_both_ways() {
		assert_eq!(next_field(TaskField::Hours, 1), TaskField::Date);
		assert_eq!(next_field(TaskField::Date, -1), TaskField::Hours);
		assert_eq!(next_field(TaskField::ProjectName, 1), TaskField::TypeOfWork);
	}

	#[test]
	fn status_select_starts_on_current_filter() {
		let filter = TimesheetFilter {
			date_range: None,
			status: StatusFilter::Only(TimesheetStatus::Missing),
		};
		let select = build_status_select(filter);
		assert_eq!(select.kind, SelectKind::Status);
		assert_eq!(select.selected_option().map(|option| option.label.as_str()), Some("MISSING"));
	}

	#[test]
	fn day_rows_carry_their_date() {
		let day = NaiveDate::from_ymd_opt(2025, 9, 22).expect("valid date");
		assert_eq!(DetailRow::Day(day).date(), day);
	}
}
