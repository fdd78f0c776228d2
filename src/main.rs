mod app;
mod config;
mod detail;
mod domain;
mod error;
mod events;
mod filter;
mod form;
mod local;
mod remote;
mod repository;
mod session;
mod storage;
mod table;
mod tasks;
mod timesheets;
mod ui;
mod validation;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::app::Dashboard;
use crate::config::{BackendKind, Overrides, Settings};
use crate::detail::DetailView;
use crate::domain::{PROJECT_OPTIONS, Task, WORK_TYPE_OPTIONS, generate_id, seed_timesheets};
use crate::error::{AppError, AppResult};
use crate::events::EventBus;
use crate::filter::{DateRangePreset, StatusFilter, TimesheetFilter};
use crate::form::{FormRequest, SubmitOutcome, TaskForm};
use crate::local::LocalRepository;
use crate::remote::RemoteRepository;
use crate::repository::TaskRepository;
use crate::session::{AuthGuard, Context, Session, SessionFile, User};
use crate::storage::{DataFile, save_data};
use crate::table::TableView;
use crate::tasks::TaskStore;
use crate::timesheets::TimesheetStore;
use crate::ui::{print_detail, print_table_page, run_dashboard};
use crate::validation::TaskField;

const DEFAULT_LOG_FILTER: &str = "ticktock_timesheets=info";

#[derive(Debug, Parser)]
#[command(name = "ticktock", about = "Weekly timesheets in the terminal")]
struct Cli {
	#[arg(long, global = true)]
	data: Option<PathBuf>,
	#[arg(long, global = true)]
	config: Option<PathBuf>,
	#[arg(long, global = true, value_enum)]
	backend: Option<BackendKind>,
	#[arg(long, global = true)]
	api_url: Option<String>,
	#[arg(long, global = true)]
	page_size: Option<usize>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	Login {
		#[arg(long)]
		email: String,
		#[arg(long)]
		name: String,
		#[arg(long)]
		id: Option<String>,
	},
	Logout,
	Whoami,
	Init {
		#[arg(long, default_value_t = 12)]
		weeks: u32,
		#[arg(long)]
		force: bool,
	},
	Dashboard,
	List {
		#[arg(long)]
		status: Option<String>,
		#[arg(long)]
		range: Option<String>,
		#[arg(long, default_value_t = 1)]
		page: usize,
	},
	Show {
		#[arg(long)]
		timesheet: String,
	},
	Add {
		#[arg(long)]
		timesheet: String,
		#[arg(long)]
		date: String,
		#[arg(long)]
		project: String,
		#[arg(long)]
		work: String,
		#[arg(long)]
		description: String,
		#[arg(long)]
		hours: i32,
	},
	Edit {
		#[arg(long)]
		task: String,
		#[arg(long)]
		date: Option<String>,
		#[arg(long)]
		project: Option<String>,
		#[arg(long)]
		work: Option<String>,
		#[arg(long)]
		description: Option<String>,
		#[arg(long)]
		hours: Option<i32>,
	},
	Delete {
		#[arg(long)]
		task: String,
		#[arg(long)]
		yes: bool,
	},
	Options,
}

#[tokio::main]
async fn main() {
	if let Err(err) = run().await {
		match err {
			AppError::AuthRequired => eprintln!("sign in required: run `ticktock login`"),
			err => eprintln!("error: {err}"),
		}
		std::process::exit(1);
	}
}

async fn run() -> AppResult<()> {
	let cli = Cli::parse();
	let settings = Settings::load(
		cli.config,
		Overrides {
			data: cli.data,
			backend: cli.backend,
			api_url: cli.api_url,
			page_size: cli.page_size,
		},
	)?;
	let command = cli.command.unwrap_or(Command::Dashboard);
	init_logging(&settings, matches!(command, Command::Dashboard))?;

	let sessions = SessionFile::in_dir(&settings.state_dir);
	match command {
		Command::Login { email, name, id } => {
			let user = User {
				id: id.unwrap_or_else(generate_id),
				email,
				name,
			};
			sessions.save(&Session::signed_in(user.clone()))?;
			println!("signed in as {} <{}>", user.name, user.email);
		}
		Command::Logout => {
			sessions.clear()?;
			println!("signed out");
		}
		Command::Whoami => match sessions.load()? {
			Session {
				authenticated: true,
				user: Some(user),
			} => println!("{} <{}> ({})", user.name, user.email, user.id),
			_ => println!("not signed in"),
		},
		Command::Options => print_options(),
		command => {
			let ctx = AuthGuard::admit(&sessions.load()?, today(), settings.page_size)?;
			match settings.backend {
				BackendKind::Local => {
					if let Command::Init { weeks, force } = command {
						return init_data_file(&settings, &ctx, weeks, force);
					}
					let repo = LocalRepository::open(&settings.data_path)?;
					run_with(repo, ctx, command).await?;
				}
				BackendKind::Remote => {
					if let Command::Init { .. } = command {
						return Err(AppError::Config(
							"init seeds the local data file; drop --backend remote".to_string(),
						));
					}
					let repo = RemoteRepository::new(&settings.api_url, settings.request_timeout)?;
					run_with(repo, ctx, command).await?;
				}
			}
		}
	}

	Ok(())
}

fn init_logging(settings: &Settings, to_file: bool) -> AppResult<()> {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
	let builder = tracing_subscriber::fmt().with_env_filter(filter);

	// The dashboard owns the terminal, so its logs go to a file.
	if to_file {
		std::fs::create_dir_all(&settings.state_dir)?;
		let file = OpenOptions::new()
			.create(true)
			.append(true)
			.open(settings.log_path())?;
		builder.with_ansi(false).with_writer(Mutex::new(file)).init();
	} else {
		builder.with_writer(std::io::stderr).init();
	}
	Ok(())
}

fn today() -> NaiveDate {
	Local::now().date_naive()
}

fn init_data_file(settings: &Settings, ctx: &Context, weeks: u32, force: bool) -> AppResult<()> {
	let path = &settings.data_path;
	if path.exists() && !force {
		return Err(AppError::Config(format!(
			"data file already exists at {}; pass --force to reseed it",
			path.display()
		)));
	}

	let data = DataFile::with_timesheets(seed_timesheets(ctx.today(), weeks, Utc::now()));
	save_data(path, &data)?;
	tracing::info!(path = %path.display(), weeks, "Data file seeded");
	println!("initialized {weeks} weeks at {}", path.display());
	Ok(())
}

async fn run_with<R: TaskRepository>(repo: R, ctx: Context, command: Command) -> AppResult<()> {
	let events = EventBus::new();
	let timesheets = TimesheetStore::new(events.clone());
	let store = Arc::new(TaskStore::new(Arc::new(repo), timesheets, events));

	if let Command::Dashboard = command {
		let mut dashboard = Dashboard::new(ctx, store);
		dashboard.hydrate().await?;
		return run_dashboard(&mut dashboard).await;
	}

	if let Command::List { status, range, page } = command {
		let filter = parse_filter(status.as_deref(), range.as_deref())?;
		let mut table = TableView::new(&ctx, store.timesheets().clone(), store.subscribe());
		let ticket = table.apply_filter(filter);
		let rows = store.repository().fetch_timesheets(&ticket.filter, ctx.today()).await;
		table.complete_fetch(ticket, rows)?;
		table.select_page(page);
		print_table_page(table.page_rows(), table.current_page(), table.total_pages(), &table.filter());
		return Ok(());
	}

	let rows = store
		.repository()
		.fetch_timesheets(&TimesheetFilter::default(), ctx.today())
		.await?;
	store.timesheets().replace_all(rows);

	match command {
		Command::Show { timesheet } => {
			let selected = store.timesheets().get(&timesheet)?;
			let mut detail = DetailView::new(&ctx, Arc::clone(&store), store.subscribe());
			detail.select(Some(selected)).await?;
			let groups = detail.groups().into_iter().collect::<Vec<_>>();
			if let Some(current) = detail.timesheet() {
				print_detail(current, &groups, detail.progress());
			}
		}
		Command::Add {
			timesheet,
			date,
			project,
			work,
			description,
			hours,
		} => {
			let date = parse_day(&date)?;
			let mut form = TaskForm::new(&ctx, Arc::clone(&store));
			form.open(FormRequest::Create {
				timesheet_id: timesheet,
				date: Some(date),
			});
			fill_form(&mut form, None, Some(project), Some(work), Some(description), Some(hours));
			let task = submit(&mut form).await?;
			println!("created task {} on {}", task.id, task.date);
		}
		Command::Edit {
			task,
			date,
			project,
			work,
			description,
			hours,
		} => {
			let existing = store.locate(&task).await?;
			let date = date.as_deref().map(parse_day).transpose()?;
			let mut form = TaskForm::new(&ctx, Arc::clone(&store));
			form.open(FormRequest::Edit(existing));
			fill_form(&mut form, date, project, work, description, hours);
			let task = submit(&mut form).await?;
			println!("updated task {}", task.id);
		}
		Command::Delete { task, yes } => {
			let existing = store.locate(&task).await?;
			if !yes {
				println!(
					"not deleted: pass --yes to confirm removing \"{}\" ({} hrs)",
					existing.short_description(),
					existing.hours
				);
				return Ok(());
			}
			store.delete(&existing.id).await?;
			println!("deleted task {}", existing.id);
		}
		Command::Login { .. }
		| Command::Logout
		| Command::Whoami
		| Command::Init { .. }
		| Command::Dashboard
		| Command::List { .. }
		| Command::Options => {}
	}

	Ok(())
}

fn fill_form<R: TaskRepository>(
	form: &mut TaskForm<R>,
	date: Option<NaiveDate>,
	project: Option<String>,
	work: Option<String>,
	description: Option<String>,
	hours: Option<i32>,
) {
	if let Some(date) = date {
		form.edit(TaskField::Date, |draft| draft.date = Some(date));
	}
	if let Some(project) = project {
		form.edit(TaskField::ProjectName, |draft| draft.project_name = project);
	}
	if let Some(work) = work {
		form.edit(TaskField::TypeOfWork, |draft| draft.type_of_work = work);
	}
	if let Some(description) = description {
		form.edit(TaskField::Description, |draft| draft.description = description);
	}
	if let Some(hours) = hours {
		form.edit(TaskField::Hours, |draft| draft.hours = hours);
	}
}

async fn submit<R: TaskRepository>(form: &mut TaskForm<R>) -> AppResult<Task> {
	match form.submit().await {
		SubmitOutcome::Saved(task) => Ok(task),
		SubmitOutcome::Invalid => {
			let errors = form
				.current()
				.map(|open| open.errors.clone())
				.unwrap_or_default();
			Err(AppError::Validation(errors))
		}
		SubmitOutcome::Failed(message) => Err(AppError::Persistence(message)),
		SubmitOutcome::Ignored => Err(AppError::Persistence("form was not open".to_string())),
	}
}

fn parse_filter(status: Option<&str>, range: Option<&str>) -> AppResult<TimesheetFilter> {
	let status = match status {
		Some(raw) => StatusFilter::parse(raw)
			.ok_or_else(|| AppError::Config(format!("unknown status `{raw}`: use ALL, COMPLETED, INCOMPLETE or MISSING")))?,
		None => StatusFilter::All,
	};
	let date_range = match range {
		Some(raw) => Some(
			DateRangePreset::parse(raw)
				.ok_or_else(|| AppError::Config(format!("unknown range `{raw}`: use this-week, last-week or this-month")))?,
		),
		None => None,
	};
	Ok(TimesheetFilter { date_range, status })
}

fn parse_day(input: &str) -> AppResult<NaiveDate> {
	NaiveDate::parse_from_str(input, "%Y-%m-%d")
		.map_err(|err| AppError::Config(format!("invalid date `{input}` (expected YYYY-MM-DD): {err}")))
}

fn print_options() {
	println!("projects:");
	for project in PROJECT_OPTIONS {
		println!("  {project}");
	}
	println!("types of work:");
	for work in WORK_TYPE_OPTIONS {
		println!("  {work}");
	}
}
