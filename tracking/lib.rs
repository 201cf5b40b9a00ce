/*!
A file backed store for processing runs. Each run lives in its own directory under
`<root>/<experiment>/<run_id>/`, with the parameters and metrics in `run.json` and
copied artifact files in `artifacts/`. Lookups scan the experiment directory and skip
anything unreadable, so a half-written run never breaks the dashboard.
*/

use anyhow::{bail, format_err, Context, Result};
use chrono::{DateTime, Utc};
use holystone_util::id::Id;
use std::{
	collections::BTreeMap,
	path::{Path, PathBuf},
};

const RUN_FILE: &str = "run.json";
const ARTIFACTS_DIR: &str = "artifacts";

pub struct Store {
	root: PathBuf,
}

/// The persisted record of one processing run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunRecord {
	pub id: Id,
	pub experiment: String,
	pub start_time: DateTime<Utc>,
	pub end_time: Option<DateTime<Utc>>,
	pub params: BTreeMap<String, String>,
	pub metrics: BTreeMap<String, f64>,
	pub artifacts: Vec<String>,
}

/// A run in progress. Parameters, metrics, and artifacts accumulate in memory and on
/// disk; the record itself is written once by [`finish`](#method.finish).
pub struct Run {
	dir: PathBuf,
	record: RunRecord,
}

impl Store {
	pub fn open(root: &Path) -> Result<Self> {
		std::fs::create_dir_all(root)
			.with_context(|| format!("failed to create tracking store at {}", root.display()))?;
		Ok(Self {
			root: root.to_owned(),
		})
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn begin_run(&self, experiment: &str) -> Result<Run> {
		validate_experiment_name(experiment)?;
		let id = Id::new();
		let dir = self.root.join(experiment).join(id.to_string());
		std::fs::create_dir_all(dir.join(ARTIFACTS_DIR))
			.with_context(|| format!("failed to create run directory {}", dir.display()))?;
		Ok(Run {
			dir,
			record: RunRecord {
				id,
				experiment: experiment.to_owned(),
				start_time: Utc::now(),
				end_time: None,
				params: BTreeMap::new(),
				metrics: BTreeMap::new(),
				artifacts: Vec::new(),
			},
		})
	}

	/// All finished runs for the experiment, newest first. Run directories without a
	/// readable record are skipped.
	pub fn list_runs(&self, experiment: &str) -> Result<Vec<RunRecord>> {
		validate_experiment_name(experiment)?;
		let dir = self.root.join(experiment);
		let entries = match std::fs::read_dir(&dir) {
			Ok(entries) => entries,
			Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
				return Ok(Vec::new());
			}
			Err(error) => {
				return Err(error)
					.with_context(|| format!("failed to read {}", dir.display()));
			}
		};
		let mut records = Vec::new();
		for entry in entries {
			let entry = entry.with_context(|| format!("failed to read {}", dir.display()))?;
			match read_record(&entry.path().join(RUN_FILE)) {
				Ok(record) => records.push(record),
				Err(_) => continue,
			}
		}
		records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
		Ok(records)
	}

	pub fn latest_run(&self, experiment: &str) -> Result<Option<RunRecord>> {
		Ok(self.list_runs(experiment)?.into_iter().next())
	}

	/// The path of a file previously recorded with
	/// [`log_artifact`](struct.Run.html#method.log_artifact).
	pub fn artifact_path(&self, record: &RunRecord, file_name: &str) -> PathBuf {
		self.root
			.join(&record.experiment)
			.join(record.id.to_string())
			.join(ARTIFACTS_DIR)
			.join(file_name)
	}
}

impl Run {
	pub fn id(&self) -> Id {
		self.record.id
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn log_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.record.params.insert(key.into(), value.into());
	}

	pub fn log_metric(&mut self, key: impl Into<String>, value: f64) {
		self.record.metrics.insert(key.into(), value);
	}

	/// Copy the file into the run's artifacts directory and record its name.
	pub fn log_artifact(&mut self, path: &Path) -> Result<()> {
		let file_name = path
			.file_name()
			.and_then(|file_name| file_name.to_str())
			.ok_or_else(|| format_err!("bad artifact path {}", path.display()))?;
		let destination = self.dir.join(ARTIFACTS_DIR).join(file_name);
		std::fs::copy(path, &destination).with_context(|| {
			format!(
				"failed to copy artifact {} to {}",
				path.display(),
				destination.display()
			)
		})?;
		self.record.artifacts.push(file_name.to_owned());
		Ok(())
	}

	/// Stamp the end time, write the record, and return it.
	pub fn finish(mut self) -> Result<RunRecord> {
		self.record.end_time = Some(Utc::now());
		let path = self.dir.join(RUN_FILE);
		let json = serde_json::to_vec_pretty(&self.record)?;
		std::fs::write(&path, json)
			.with_context(|| format!("failed to write {}", path.display()))?;
		Ok(self.record)
	}
}

fn read_record(path: &Path) -> Result<RunRecord> {
	let json = std::fs::read_to_string(path)
		.with_context(|| format!("failed to read {}", path.display()))?;
	let record = serde_json::from_str(&json)
		.with_context(|| format!("failed to parse {}", path.display()))?;
	Ok(record)
}

fn validate_experiment_name(experiment: &str) -> Result<()> {
	if experiment.is_empty() {
		bail!("experiment name must not be empty");
	}
	if experiment
		.chars()
		.any(|c| c == '/' || c == '\\' || c == '\0')
		|| experiment == "." || experiment == ".."
	{
		bail!("invalid experiment name \"{}\"", experiment);
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_run_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let store = Store::open(dir.path()).unwrap();
		let mut run = store.begin_run("passenger_survival").unwrap();
		run.log_param("impute_Age", "median");
		run.log_metric("train_size", 571.0);
		let artifact_path = dir.path().join("cleaned.csv");
		std::fs::write(&artifact_path, "a,b\n1,2\n").unwrap();
		run.log_artifact(&artifact_path).unwrap();
		let record = run.finish().unwrap();
		assert!(record.end_time.is_some());

		let latest = store.latest_run("passenger_survival").unwrap().unwrap();
		assert_eq!(latest, record);
		assert_eq!(latest.params["impute_Age"], "median");
		assert_eq!(latest.metrics["train_size"], 571.0);
		assert_eq!(latest.artifacts, vec!["cleaned.csv".to_owned()]);
		let copied = store.artifact_path(&latest, "cleaned.csv");
		assert!(copied.exists());
		assert_eq!(std::fs::read_to_string(copied).unwrap(), "a,b\n1,2\n");
	}

	#[test]
	fn test_latest_run_empty() {
		let dir = tempfile::tempdir().unwrap();
		let store = Store::open(dir.path()).unwrap();
		assert!(store.latest_run("passenger_survival").unwrap().is_none());
	}

	#[test]
	fn test_latest_run_picks_newest() {
		let dir = tempfile::tempdir().unwrap();
		let store = Store::open(dir.path()).unwrap();
		let first = store.begin_run("exp").unwrap().finish().unwrap();
		std::thread::sleep(std::time::Duration::from_millis(10));
		let second = store.begin_run("exp").unwrap().finish().unwrap();
		assert!(second.start_time > first.start_time);
		let runs = store.list_runs("exp").unwrap();
		assert_eq!(runs.len(), 2);
		assert_eq!(runs[0].id, second.id);
		let latest = store.latest_run("exp").unwrap().unwrap();
		assert_eq!(latest.id, second.id);
	}

	#[test]
	fn test_unreadable_run_is_skipped() {
		let dir = tempfile::tempdir().unwrap();
		let store = Store::open(dir.path()).unwrap();
		let good = store.begin_run("exp").unwrap().finish().unwrap();
		// A run directory with a garbage record, as if the process died mid-write.
		let broken = dir.path().join("exp").join("not-a-run");
		std::fs::create_dir_all(&broken).unwrap();
		std::fs::write(broken.join("run.json"), "{ nope").unwrap();
		// And one that never wrote a record at all.
		let unfinished = store.begin_run("exp").unwrap();
		drop(unfinished);
		let runs = store.list_runs("exp").unwrap();
		assert_eq!(runs.len(), 1);
		assert_eq!(runs[0].id, good.id);
	}

	#[test]
	fn test_invalid_experiment_name() {
		let dir = tempfile::tempdir().unwrap();
		let store = Store::open(dir.path()).unwrap();
		assert!(store.begin_run("").is_err());
		assert!(store.begin_run("a/b").is_err());
		assert!(store.begin_run("..").is_err());
	}
}
