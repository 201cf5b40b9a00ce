//! This module contains the main entrypoint to the holystone cli.

use anyhow::{format_err, Result};
use backtrace::Backtrace;
use clap::Clap;
use colored::Colorize;
use holystone_core::progress::Progress;
use holystone_tracking::Store;
use once_cell::sync::Lazy;
use std::{
	path::{Path, PathBuf},
	sync::Mutex,
};

#[derive(Clap)]
#[clap(
	about = "Clean the passenger survival table, split it, and track each run.",
	setting = clap::AppSettings::DisableHelpSubcommand,
)]
enum Options {
	#[clap(name = "process")]
	Process(Box<ProcessOptions>),
	#[clap(name = "app")]
	App(Box<AppOptions>),
}

#[derive(Clap, Debug)]
#[clap(about = "clean and split a csv file")]
#[clap(long_about = "clean a csv file, split it into partitions, and record the run")]
struct ProcessOptions {
	#[clap(short, long, about = "the path to your .csv file")]
	file: PathBuf,
	#[clap(short, long, about = "the path to a config file")]
	config: Option<PathBuf>,
	#[clap(short, long, about = "the path to write the cleaned .csv file to")]
	output: Option<PathBuf>,
	#[clap(
		long,
		env = "HOLYSTONE_TRACKING_DIR",
		about = "the directory of the tracking store"
	)]
	tracking_dir: Option<PathBuf>,
	#[clap(
		long,
		default_value = "passenger_survival",
		about = "the experiment to record the run under"
	)]
	experiment: String,
	#[clap(long = "no-progress", about = "disable progress output", parse(from_flag = std::ops::Not::not))]
	progress: bool,
}

#[derive(Clap)]
#[clap(about = "run the dashboard")]
#[clap(long_about = "run the dashboard web app that shows the most recent recorded run")]
struct AppOptions {
	#[clap(long, default_value = "0.0.0.0")]
	host: std::net::IpAddr,
	#[clap(long, env = "PORT", default_value = "8080")]
	port: u16,
	#[clap(
		long,
		env = "HOLYSTONE_TRACKING_DIR",
		about = "the directory of the tracking store"
	)]
	tracking_dir: Option<PathBuf>,
	#[clap(
		long,
		default_value = "passenger_survival",
		about = "the experiment to display"
	)]
	experiment: String,
}

fn main() {
	let options = Options::parse();
	let result = match options {
		Options::Process(options) => cli_process(*options),
		Options::App(options) => cli_app(*options),
	};
	if let Err(error) = result {
		eprintln!("{}: {}", "error".red().bold(), error);
		std::process::exit(1);
	}
}

fn cli_process(options: ProcessOptions) -> Result<()> {
	// Run the pipeline under `catch_unwind` with a custom panic hook, so a panic
	// message is never lost between the progress output and process exit.
	static PANIC_MESSAGE_AND_BACKTRACE: Lazy<Mutex<Option<(String, Backtrace)>>> =
		Lazy::new(|| Mutex::new(None));
	let hook = std::panic::take_hook();
	std::panic::set_hook(Box::new(|panic_info| {
		let value = (panic_info.to_string(), Backtrace::new());
		PANIC_MESSAGE_AND_BACKTRACE.lock().unwrap().replace(value);
	}));
	let show_progress = options.progress;
	let result = std::panic::catch_unwind(|| {
		holystone_core::process(&options.file, options.config.as_deref(), &mut |progress| {
			if show_progress {
				report_progress(&progress);
			}
		})
	});
	std::panic::set_hook(hook);
	let output = match result {
		Ok(result) => result,
		Err(_) => {
			let panic_info = PANIC_MESSAGE_AND_BACKTRACE.lock().unwrap();
			let (message, backtrace) = panic_info.as_ref().unwrap();
			Err(format_err!("{}\n{:?}", message, backtrace))
		}
	}?;

	// Retrieve the output path from the command line arguments or derive one from
	// the input file that does not overwrite an existing file.
	let output_path = match &options.output {
		Some(output) => output.clone(),
		None => {
			let dir = std::env::current_dir()?;
			let csv_file_name = options
				.file
				.file_stem()
				.and_then(|file_stem| file_stem.to_str())
				.ok_or_else(|| format_err!("bad file path {}", options.file.display()))?;
			available_path(&dir, &format!("{}_clean", csv_file_name), "csv")?
		}
	};
	output.dataframe.to_path(&output_path)?;

	// Record the run in the tracking store.
	let tracking_dir = resolve_tracking_dir(options.tracking_dir)?;
	let store = Store::open(&tracking_dir)?;
	let mut run = store.begin_run(&options.experiment)?;
	for (key, value) in output.summary.params.iter() {
		run.log_param(key.clone(), value.clone());
	}
	for (key, value) in output.summary.metrics.iter() {
		run.log_metric(key.clone(), *value);
	}
	run.log_artifact(&output_path)?;
	let record = run.finish()?;

	eprintln!("Training size: {}", output.train.nrows());
	eprintln!("Validation size: {}", output.validation.nrows());
	eprintln!("Test size: {}", output.test.nrows());
	eprintln!(
		"The cleaned table was written to {}.",
		output_path.display()
	);
	eprintln!(
		"Run {} was recorded under experiment \"{}\" in {}.",
		record.id,
		options.experiment,
		tracking_dir.display()
	);
	eprintln!("To view it in the dashboard, run `holystone app`.");

	Ok(())
}

fn cli_app(options: AppOptions) -> Result<()> {
	let tracking_dir = resolve_tracking_dir(options.tracking_dir)?;
	holystone_app::run(holystone_app::Options {
		host: options.host,
		port: options.port,
		tracking_dir,
		experiment: options.experiment,
	})
}

fn report_progress(progress: &Progress) {
	match progress {
		Progress::Loading(_) => eprintln!("{}", "loading".blue().bold()),
		Progress::Cleaning(step) => eprintln!("{} {}", "cleaning:".blue().bold(), step),
		Progress::ComputingStats => eprintln!("{}", "computing stats".blue().bold()),
		Progress::Splitting => eprintln!("{}", "splitting".blue().bold()),
	}
}

/// This function checks if a file with the given name and extension already exists at
/// the path `base`, and if it does, it appends " 1", " 2", etc. to it until it finds
/// a name that will not overwrite an existing file.
fn available_path(dir: &Path, name: &str, extension: &str) -> Result<PathBuf> {
	let mut i = 0;
	loop {
		let mut path = PathBuf::from(dir);
		let mut filename = String::new();
		filename.push_str(name);
		if i > 0 {
			filename.push(' ');
			filename.push_str(&i.to_string());
		}
		filename.push('.');
		filename.push_str(extension);
		path.push(filename);
		match std::fs::metadata(&path) {
			// If a file at the path does not exist, return the path.
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
				return Ok(path);
			}
			Err(error) => return Err(error.into()),
			// If a file at the path exists, try the next number.
			Ok(_) => {
				i += 1;
				continue;
			}
		}
	}
}

/// Retrieve the user data directory using the `dirs` crate.
fn data_dir() -> Result<PathBuf> {
	let data_dir = dirs::data_dir()
		.ok_or_else(|| format_err!("failed to find user data directory"))?;
	let holystone_data_dir = data_dir.join("holystone");
	std::fs::create_dir_all(&holystone_data_dir).map_err(|_| {
		format_err!(
			"failed to create holystone data directory in {}",
			holystone_data_dir.display()
		)
	})?;
	Ok(holystone_data_dir)
}

/// The tracking store location: the explicit flag or env var if given, otherwise a
/// `runs` directory in the user data directory.
fn resolve_tracking_dir(tracking_dir: Option<PathBuf>) -> Result<PathBuf> {
	match tracking_dir {
		Some(tracking_dir) => Ok(tracking_dir),
		None => Ok(data_dir()?.join("runs")),
	}
}
