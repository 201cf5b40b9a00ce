use crate::config::{Encode, Impute, ImputeStrategy, TrimOutliers};
use crate::stats::{NumberColumnStats, StatsSettings};
use anyhow::{bail, format_err, Result};
use holystone_dataframe::*;
use holystone_metrics::MeanVariance;
use num_traits::ToPrimitive;
use std::num::NonZeroUsize;

/// What the cleaning steps did to the dataframe, for the run record.
#[derive(Clone, Debug, Default)]
pub struct CleanReport {
	pub rows_dropped_missing: usize,
	pub rows_dropped_outliers: usize,
	pub imputed: Vec<ImputedColumn>,
	pub trims: Vec<TrimBounds>,
	pub scaler_fits: Vec<ScalerFit>,
}

#[derive(Clone, Debug)]
pub struct ImputedColumn {
	pub column: String,
	pub filled: usize,
}

#[derive(Clone, Debug)]
pub struct TrimBounds {
	pub column: String,
	pub lower: f32,
	pub upper: f32,
	pub dropped: usize,
}

#[derive(Clone, Debug)]
pub struct ScalerFit {
	pub column: String,
	pub mean: f32,
	pub std: f32,
}

/// Fill or drop missing values, one step per configured column.
pub fn impute(dataframe: &mut DataFrame, steps: &[Impute], report: &mut CleanReport) -> Result<()> {
	for step in steps {
		match &step.strategy {
			ImputeStrategy::Median | ImputeStrategy::Mean => {
				let column = number_column_mut(dataframe, &step.column)?;
				let stats = NumberColumnStats::compute(&column.view(), &StatsSettings::default())
					.finalize(&StatsSettings::default());
				if stats.unique_count == 0 {
					bail!(
						"column \"{}\" has no finite values to impute from",
						step.column
					);
				}
				let fill = match step.strategy {
					ImputeStrategy::Median => stats.p50,
					_ => stats.mean,
				};
				let mut filled = 0;
				for value in column.data.iter_mut() {
					if value.is_nan() {
						*value = fill;
						filled += 1;
					}
				}
				report.imputed.push(ImputedColumn {
					column: step.column.clone(),
					filled,
				});
			}
			ImputeStrategy::Constant { value } => {
				let filled = impute_constant(dataframe, &step.column, value)?;
				report.imputed.push(ImputedColumn {
					column: step.column.clone(),
					filled,
				});
			}
			ImputeStrategy::Drop => {
				let keep = {
					let column = dataframe.column(&step.column).ok_or_else(|| {
						format_err!("did not find column \"{}\"", step.column)
					})?;
					missing_mask(column)?
				};
				let dropped = keep.iter().filter(|keep| !**keep).count();
				dataframe.retain_rows(&keep);
				report.rows_dropped_missing += dropped;
			}
		}
	}
	Ok(())
}

fn impute_constant(dataframe: &mut DataFrame, column_name: &str, value: &str) -> Result<usize> {
	let column = dataframe
		.column_mut(column_name)
		.ok_or_else(|| format_err!("did not find column \"{}\"", column_name))?;
	let mut filled = 0;
	match column {
		Column::Number(column) => {
			let fill: f32 = value.parse().map_err(|_| {
				format_err!(
					"constant \"{}\" is not a number, which column \"{}\" requires",
					value,
					column_name
				)
			})?;
			for cell in column.data.iter_mut() {
				if cell.is_nan() {
					*cell = fill;
					filled += 1;
				}
			}
		}
		Column::Enum(column) => {
			// Use the existing option, or append the sentinel as a new one.
			let code = match column.options.iter().position(|option| option == value) {
				Some(index) => NonZeroUsize::new(index + 1).unwrap(),
				None => {
					column.options.push(value.to_owned());
					NonZeroUsize::new(column.options.len()).unwrap()
				}
			};
			for cell in column.data.iter_mut() {
				if cell.is_none() {
					*cell = Some(code);
					filled += 1;
				}
			}
		}
		Column::Text(column) => {
			for cell in column.data.iter_mut() {
				if cell.is_empty() {
					*cell = value.to_owned();
					filled += 1;
				}
			}
		}
		Column::Unknown(_) => {
			bail!("column \"{}\" has no values to impute", column_name);
		}
	}
	Ok(filled)
}

fn missing_mask(column: &Column) -> Result<Vec<bool>> {
	match column {
		Column::Number(column) => Ok(column.data.iter().map(|value| !value.is_nan()).collect()),
		Column::Enum(column) => Ok(column.data.iter().map(|value| value.is_some()).collect()),
		Column::Text(column) => Ok(column.data.iter().map(|value| !value.is_empty()).collect()),
		Column::Unknown(column) => {
			bail!("column \"{}\" has no values to drop rows by", column.name)
		}
	}
}

/// Recode enum columns to number columns of integer codes using the configured
/// lookup tables. Every value must already be present and mapped, so imputation has
/// to run first.
pub fn encode(dataframe: &mut DataFrame, steps: &[Encode]) -> Result<()> {
	for step in steps {
		let index = dataframe
			.column_index(&step.column)
			.ok_or_else(|| format_err!("did not find column \"{}\"", step.column))?;
		let data = {
			let column = dataframe.columns[index].as_enum().ok_or_else(|| {
				format_err!("column \"{}\" is not a categorical column", step.column)
			})?;
			let code_for_option: Vec<Option<f32>> = column
				.options
				.iter()
				.map(|option| step.codes.get(option).map(|code| code.to_f32().unwrap()))
				.collect();
			let mut data = Vec::with_capacity(column.data.len());
			for (row, value) in column.data.iter().enumerate() {
				let option_index = value.ok_or_else(|| {
					format_err!(
						"column \"{}\" has a missing value at row {}; impute it before encoding",
						step.column,
						row
					)
				})?;
				let code = code_for_option[option_index.get() - 1].ok_or_else(|| {
					format_err!(
						"column \"{}\" value \"{}\" has no code in the encoding table",
						step.column,
						column.options[option_index.get() - 1]
					)
				})?;
				data.push(code);
			}
			data
		};
		dataframe.columns[index] = Column::Number(NumberColumn {
			name: step.column.clone(),
			data,
		});
	}
	Ok(())
}

/// Remove the named columns. Naming a column that does not exist is an error.
pub fn drop_columns(dataframe: &mut DataFrame, column_names: &[String]) -> Result<()> {
	for column_name in column_names {
		dataframe
			.remove_column(column_name)
			.ok_or_else(|| format_err!("did not find column \"{}\"", column_name))?;
	}
	Ok(())
}

/// Discard rows whose value falls outside `[Q1 - k * IQR, Q3 + k * IQR]`. The bounds
/// are inclusive; rows with a missing value never match and are dropped too.
pub fn trim_outliers(
	dataframe: &mut DataFrame,
	steps: &[TrimOutliers],
	report: &mut CleanReport,
) -> Result<()> {
	for step in steps {
		let (keep, lower, upper) = {
			let column = number_column(dataframe, &step.column)?;
			let stats = NumberColumnStats::compute(&column.view(), &StatsSettings::default())
				.finalize(&StatsSettings::default());
			if stats.unique_count == 0 {
				bail!(
					"column \"{}\" has no finite values to trim outliers from",
					step.column
				);
			}
			let multiplier = step.iqr_multiplier.unwrap_or(1.5);
			let iqr = stats.p75 - stats.p25;
			let lower = stats.p25 - multiplier * iqr;
			let upper = stats.p75 + multiplier * iqr;
			let keep: Vec<bool> = column
				.data
				.iter()
				.map(|value| *value >= lower && *value <= upper)
				.collect();
			(keep, lower, upper)
		};
		let dropped = keep.iter().filter(|keep| !**keep).count();
		dataframe.retain_rows(&keep);
		report.rows_dropped_outliers += dropped;
		report.trims.push(TrimBounds {
			column: step.column.clone(),
			lower,
			upper,
			dropped,
		});
	}
	Ok(())
}

/// Scale number columns to zero mean and unit variance, fitted on the values as they
/// are now, after trimming. A zero variance column maps to all zeros.
pub fn standardize(
	dataframe: &mut DataFrame,
	column_names: &[String],
	report: &mut CleanReport,
) -> Result<()> {
	for column_name in column_names {
		let column = number_column_mut(dataframe, column_name)?;
		let mean_variance = MeanVariance::compute(&column.data);
		if mean_variance.n == 0 {
			bail!(
				"column \"{}\" has no finite values to standardize",
				column_name
			);
		}
		for value in column.data.iter_mut() {
			*value = if value.is_nan() || mean_variance.variance == 0.0 {
				0.0
			} else {
				(*value - mean_variance.mean) / f32::sqrt(mean_variance.variance)
			};
		}
		report.scaler_fits.push(ScalerFit {
			column: column_name.clone(),
			mean: mean_variance.mean,
			std: mean_variance.variance.sqrt(),
		});
	}
	Ok(())
}

fn number_column<'a>(dataframe: &'a DataFrame, column_name: &str) -> Result<&'a NumberColumn> {
	dataframe
		.column(column_name)
		.ok_or_else(|| format_err!("did not find column \"{}\"", column_name))?
		.as_number()
		.ok_or_else(|| format_err!("column \"{}\" is not a number column", column_name))
}

fn number_column_mut<'a>(
	dataframe: &'a mut DataFrame,
	column_name: &str,
) -> Result<&'a mut NumberColumn> {
	dataframe
		.column_mut(column_name)
		.ok_or_else(|| format_err!("did not find column \"{}\"", column_name))?
		.as_number_mut()
		.ok_or_else(|| format_err!("column \"{}\" is not a number column", column_name))
}
