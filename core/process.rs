use crate::{
	clean::{self, CleanReport},
	config::{self, Config},
	progress::{CleanStep, Progress},
	split::{self, SplitOptions},
	stats::{self, StatsSettings},
};
use anyhow::{Context, Result};
use holystone_dataframe::{ColumnType, DataFrame, FromCsvOptions};
use holystone_util::progress_counter::ProgressCounter;
use itertools::Itertools;
use num_traits::ToPrimitive;
use std::{collections::BTreeMap, path::Path};

pub const DEFAULT_TARGET: &str = "Survived";
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_TEST_FRACTION: f32 = 0.2;
pub const DEFAULT_VALIDATION_FRACTION: f32 = 0.1;

#[derive(Debug)]
pub struct ProcessOutput {
	/// The full cleaned dataframe, before splitting.
	pub dataframe: DataFrame,
	pub train: DataFrame,
	pub validation: DataFrame,
	pub test: DataFrame,
	pub summary: RunSummary,
}

/// Everything worth recording about a run: the resolved parameters of each step and
/// the numeric results. The maps go to the tracking store as-is.
#[derive(Debug, serde::Serialize)]
pub struct RunSummary {
	pub params: BTreeMap<String, String>,
	pub metrics: BTreeMap<String, f64>,
}

pub fn process(
	file_path: &Path,
	config_path: Option<&Path>,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<ProcessOutput> {
	let config = load_config(config_path)?.unwrap_or_default();

	// Resolve the recipe, falling back to the built-in one for the passenger
	// survival table.
	let impute_steps = config.impute.clone().unwrap_or_else(default_impute);
	let encode_steps = config.encode.clone().unwrap_or_else(default_encode);
	let drop_column_names = config
		.drop_columns
		.clone()
		.unwrap_or_else(default_drop_columns);
	let trim_steps = config
		.trim_outliers
		.clone()
		.unwrap_or_else(default_trim_outliers);
	let standardize_names = config
		.standardize
		.clone()
		.unwrap_or_else(default_standardize);
	let target_column_name = config
		.target
		.clone()
		.unwrap_or_else(|| DEFAULT_TARGET.to_owned());
	let seed = match &config.shuffle {
		None | Some(config::Shuffle::Enabled(true)) => Some(DEFAULT_SEED),
		Some(config::Shuffle::Enabled(false)) => None,
		Some(config::Shuffle::Options { seed }) => Some(*seed),
	};
	let test_fraction = config.test_fraction.unwrap_or(DEFAULT_TEST_FRACTION);
	let validation_fraction = config
		.validation_fraction
		.unwrap_or(DEFAULT_VALIDATION_FRACTION);

	let mut dataframe = load_dataframe(file_path, &config, update_progress)?;
	let rows_read = dataframe.nrows();

	let mut report = CleanReport::default();
	update_progress(Progress::Cleaning(CleanStep::Impute));
	clean::impute(&mut dataframe, &impute_steps, &mut report)?;
	update_progress(Progress::Cleaning(CleanStep::Encode));
	clean::encode(&mut dataframe, &encode_steps)?;
	update_progress(Progress::Cleaning(CleanStep::DropColumns));
	clean::drop_columns(&mut dataframe, &drop_column_names)?;
	update_progress(Progress::Cleaning(CleanStep::TrimOutliers));
	clean::trim_outliers(&mut dataframe, &trim_steps, &mut report)?;
	update_progress(Progress::Cleaning(CleanStep::Standardize));
	clean::standardize(&mut dataframe, &standardize_names, &mut report)?;

	update_progress(Progress::ComputingStats);
	let stats_settings = StatsSettings::default();
	let column_stats = stats::Stats::compute(&dataframe.view(), &stats_settings)
		.finalize(&stats_settings);

	update_progress(Progress::Splitting);
	let split_options = SplitOptions {
		seed,
		test_fraction,
		validation_fraction,
	};
	let split::SplitOutput {
		train,
		validation,
		test,
	} = split::stratified_split(&dataframe, &target_column_name, &split_options)?;

	// Assemble the run record.
	let mut params = BTreeMap::new();
	for step in impute_steps.iter() {
		params.insert(
			format!("impute_{}", step.column),
			step.strategy.to_string(),
		);
	}
	for step in encode_steps.iter() {
		let codes = step
			.codes
			.iter()
			.map(|(option, code)| format!("{}={}", option, code))
			.join(",");
		params.insert(format!("encode_{}", step.column), codes);
	}
	params.insert(
		"drop_columns".to_owned(),
		drop_column_names.iter().join(","),
	);
	for step in trim_steps.iter() {
		params.insert(
			format!("trim_outliers_{}", step.column),
			format!("iqr:{}", step.iqr_multiplier.unwrap_or(1.5)),
		);
	}
	params.insert("standardize".to_owned(), standardize_names.iter().join(","));
	params.insert("target".to_owned(), target_column_name.clone());
	params.insert(
		"shuffle_seed".to_owned(),
		seed.map(|seed| seed.to_string())
			.unwrap_or_else(|| "none".to_owned()),
	);
	params.insert("test_fraction".to_owned(), test_fraction.to_string());
	params.insert(
		"validation_fraction".to_owned(),
		validation_fraction.to_string(),
	);

	let mut metrics = BTreeMap::new();
	metrics.insert("rows_read".to_owned(), rows_read.to_f64().unwrap());
	metrics.insert("rows_clean".to_owned(), dataframe.nrows().to_f64().unwrap());
	metrics.insert(
		"rows_dropped_missing".to_owned(),
		report.rows_dropped_missing.to_f64().unwrap(),
	);
	metrics.insert(
		"rows_dropped_outliers".to_owned(),
		report.rows_dropped_outliers.to_f64().unwrap(),
	);
	metrics.insert("train_size".to_owned(), train.nrows().to_f64().unwrap());
	metrics.insert(
		"validation_size".to_owned(),
		validation.nrows().to_f64().unwrap(),
	);
	metrics.insert("test_size".to_owned(), test.nrows().to_f64().unwrap());
	for imputed in report.imputed.iter() {
		metrics.insert(
			format!("imputed_{}", imputed.column),
			imputed.filled.to_f64().unwrap(),
		);
	}
	for bounds in report.trims.iter() {
		metrics.insert(
			format!("trim_lower_{}", bounds.column),
			bounds.lower.to_f64().unwrap(),
		);
		metrics.insert(
			format!("trim_upper_{}", bounds.column),
			bounds.upper.to_f64().unwrap(),
		);
	}
	for fit in report.scaler_fits.iter() {
		metrics.insert(
			format!("scale_mean_{}", fit.column),
			fit.mean.to_f64().unwrap(),
		);
		metrics.insert(
			format!("scale_std_{}", fit.column),
			fit.std.to_f64().unwrap(),
		);
	}
	for stats in column_stats.0.iter() {
		match stats {
			stats::ColumnStatsOutput::Number(stats) => {
				// A column with no finite values has NaN stats, which have no place
				// in a metrics map.
				if stats.mean.is_finite() && stats.std.is_finite() {
					metrics.insert(
						format!("mean_{}", stats.column_name),
						stats.mean.to_f64().unwrap(),
					);
					metrics.insert(
						format!("std_{}", stats.column_name),
						stats.std.to_f64().unwrap(),
					);
				}
			}
			stats::ColumnStatsOutput::Enum(stats) => {
				metrics.insert(
					format!("distinct_{}", stats.column_name),
					stats.unique_count.to_f64().unwrap(),
				);
			}
			stats::ColumnStatsOutput::Text(stats) => {
				metrics.insert(
					format!("distinct_{}", stats.column_name),
					stats.distinct_count.to_f64().unwrap(),
				);
			}
			stats::ColumnStatsOutput::Unknown(_) => {}
		}
	}
	// Per-partition label balance.
	for (partition_name, partition) in &[
		("train", &train),
		("validation", &validation),
		("test", &test),
	] {
		if let Some(column) = partition.column(&target_column_name) {
			if let Some(column) = column.as_enum() {
				let histogram =
					stats::EnumColumnStats::compute(&column.view(), &stats_settings)
						.finalize(&stats_settings)
						.histogram;
				for (option, count) in histogram {
					metrics.insert(
						format!("{}_label_{}", partition_name, option),
						count.to_f64().unwrap(),
					);
				}
			}
		}
	}

	let summary = RunSummary { params, metrics };
	Ok(ProcessOutput {
		dataframe,
		train,
		validation,
		test,
		summary,
	})
}

fn load_config(config_path: Option<&Path>) -> Result<Option<Config>> {
	if let Some(config_path) = config_path {
		let config = std::fs::read_to_string(config_path)
			.with_context(|| format!("failed to read config file {}", config_path.display()))?;
		let config = serde_yaml::from_str(&config)
			.with_context(|| format!("failed to parse config file {}", config_path.display()))?;
		Ok(Some(config))
	} else {
		Ok(None)
	}
}

fn load_dataframe(
	file_path: &Path,
	config: &Config,
	update_progress: &mut dyn FnMut(Progress),
) -> Result<DataFrame> {
	let len = std::fs::metadata(file_path)
		.with_context(|| format!("failed to read {}", file_path.display()))?
		.len();
	let progress_counter = ProgressCounter::new(len);
	update_progress(Progress::Loading(progress_counter.clone()));
	let column_types: Option<BTreeMap<String, holystone_dataframe::ColumnType>> =
		config.column_types.as_ref().map(|column_types| {
			column_types
				.iter()
				.map(|(column_name, column_type)| {
					let column_type = match column_type {
						config::ColumnType::Unknown => ColumnType::Unknown,
						config::ColumnType::Number => ColumnType::Number,
						config::ColumnType::Enum { options } => ColumnType::Enum {
							options: options.clone(),
						},
						config::ColumnType::Text => ColumnType::Text,
					};
					(column_name.clone(), column_type)
				})
				.collect()
		});
	let dataframe = DataFrame::from_path(
		file_path,
		FromCsvOptions {
			column_types,
			..Default::default()
		},
		|byte| progress_counter.set(byte),
	)?;
	Ok(dataframe)
}

/// The built-in recipe: fill ages with the median, drop rows without an embarkation
/// port, and label missing cabins.
fn default_impute() -> Vec<config::Impute> {
	vec![
		config::Impute {
			column: "Age".to_owned(),
			strategy: config::ImputeStrategy::Median,
		},
		config::Impute {
			column: "Embarked".to_owned(),
			strategy: config::ImputeStrategy::Drop,
		},
		config::Impute {
			column: "Cabin".to_owned(),
			strategy: config::ImputeStrategy::Constant {
				value: "Unknown".to_owned(),
			},
		},
	]
}

fn default_encode() -> Vec<config::Encode> {
	let mut sex_codes = BTreeMap::new();
	sex_codes.insert("male".to_owned(), 1);
	sex_codes.insert("female".to_owned(), 0);
	let mut embarked_codes = BTreeMap::new();
	embarked_codes.insert("S".to_owned(), 0);
	embarked_codes.insert("C".to_owned(), 1);
	embarked_codes.insert("Q".to_owned(), 2);
	vec![
		config::Encode {
			column: "Sex".to_owned(),
			codes: sex_codes,
		},
		config::Encode {
			column: "Embarked".to_owned(),
			codes: embarked_codes,
		},
	]
}

fn default_drop_columns() -> Vec<String> {
	vec!["Name".to_owned(), "Ticket".to_owned(), "Cabin".to_owned()]
}

fn default_trim_outliers() -> Vec<config::TrimOutliers> {
	vec![config::TrimOutliers {
		column: "Fare".to_owned(),
		iqr_multiplier: None,
	}]
}

fn default_standardize() -> Vec<String> {
	vec!["Age".to_owned(), "Fare".to_owned()]
}
