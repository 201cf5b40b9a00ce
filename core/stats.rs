use holystone_dataframe::*;
use holystone_metrics as metrics;
use holystone_util::finite::Finite;
use num_traits::ToPrimitive;
use std::{
	cmp::Ordering,
	collections::{BTreeMap, BTreeSet},
	num::NonZeroU64,
};

/// Per-column statistics over a dataframe. Number columns get quantiles and moments,
/// which back median imputation and outlier trimming.
#[derive(Clone, Debug)]
pub struct Stats(pub Vec<ColumnStats>);

#[derive(Clone, Debug)]
pub enum ColumnStats {
	Unknown(UnknownColumnStats),
	Number(NumberColumnStats),
	Enum(EnumColumnStats),
	Text(TextColumnStats),
}

#[derive(Clone, Debug)]
pub struct UnknownColumnStats {
	pub column_name: String,
	pub count: usize,
}

#[derive(Clone, Debug)]
pub struct NumberColumnStats {
	pub column_name: String,
	/// The total number of values.
	pub count: usize,
	/// The total number of finite values.
	pub valid_count: usize,
	/// The total number of values that were missing or failed to parse as finite.
	pub invalid_count: usize,
	/// Counts for each unique finite value.
	pub histogram: BTreeMap<Finite<f32>, usize>,
}

#[derive(Clone, Debug)]
pub struct EnumColumnStats {
	pub column_name: String,
	pub count: usize,
	pub options: Vec<String>,
	pub invalid_count: usize,
	/// Histogram indexed by code, with index 0 counting missing values.
	pub histogram: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct TextColumnStats {
	pub column_name: String,
	pub count: usize,
	pub unique_values: BTreeSet<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatsSettings {
	/// This is the maximum number of unique numeric values to keep in the output
	/// histogram.
	pub number_histogram_max_size: usize,
}

impl Default for StatsSettings {
	fn default() -> Self {
		Self {
			number_histogram_max_size: 100,
		}
	}
}

pub struct StatsOutput(pub Vec<ColumnStatsOutput>);

#[derive(Debug)]
pub enum ColumnStatsOutput {
	Unknown(UnknownColumnStatsOutput),
	Number(NumberColumnStatsOutput),
	Enum(EnumColumnStatsOutput),
	Text(TextColumnStatsOutput),
}

#[derive(Debug)]
pub struct UnknownColumnStatsOutput {
	pub column_name: String,
	pub count: u64,
}

#[derive(Debug)]
pub struct NumberColumnStatsOutput {
	pub column_name: String,
	pub count: u64,
	/// The histogram of unique values, or `None` if the column has more than
	/// [`number_histogram_max_size`](struct.StatsSettings.html#structfield.number_histogram_max_size)
	/// unique values.
	pub histogram: Option<Vec<(f32, u64)>>,
	pub unique_count: u64,
	pub invalid_count: u64,
	pub min: f32,
	pub max: f32,
	pub mean: f32,
	/// The population variance of the finite values.
	pub variance: f32,
	pub std: f32,
	pub p25: f32,
	pub p50: f32,
	pub p75: f32,
}

#[derive(Debug)]
pub struct EnumColumnStatsOutput {
	pub column_name: String,
	pub count: u64,
	pub histogram: Vec<(String, usize)>,
	pub invalid_count: usize,
	pub unique_count: usize,
}

#[derive(Debug)]
pub struct TextColumnStatsOutput {
	pub column_name: String,
	pub count: u64,
	pub distinct_count: u64,
}

impl Stats {
	pub fn compute(dataframe: &DataFrameView, settings: &StatsSettings) -> Self {
		let column_stats = dataframe
			.columns
			.iter()
			.map(|column| ColumnStats::compute(column, settings))
			.collect();
		Self(column_stats)
	}

	pub fn finalize(self, settings: &StatsSettings) -> StatsOutput {
		let column_stats = self
			.0
			.into_iter()
			.map(|column_stats| column_stats.finalize(settings))
			.collect();
		StatsOutput(column_stats)
	}
}

impl ColumnStats {
	pub fn compute(column: &ColumnView, settings: &StatsSettings) -> Self {
		match column {
			ColumnView::Unknown(column) => Self::Unknown(UnknownColumnStats {
				column_name: column.name.to_owned(),
				count: column.len,
			}),
			ColumnView::Number(column) => {
				Self::Number(NumberColumnStats::compute(column, settings))
			}
			ColumnView::Enum(column) => Self::Enum(EnumColumnStats::compute(column, settings)),
			ColumnView::Text(column) => Self::Text(TextColumnStats::compute(column, settings)),
		}
	}

	pub fn finalize(self, settings: &StatsSettings) -> ColumnStatsOutput {
		match self {
			Self::Unknown(stats) => ColumnStatsOutput::Unknown(UnknownColumnStatsOutput {
				column_name: stats.column_name,
				count: stats.count.to_u64().unwrap(),
			}),
			Self::Number(stats) => ColumnStatsOutput::Number(stats.finalize(settings)),
			Self::Enum(stats) => ColumnStatsOutput::Enum(stats.finalize(settings)),
			Self::Text(stats) => ColumnStatsOutput::Text(stats.finalize(settings)),
		}
	}
}

impl NumberColumnStats {
	pub fn compute(column: &NumberColumnView, _settings: &StatsSettings) -> Self {
		let mut stats = Self {
			column_name: column.name.to_owned(),
			count: column.data.len(),
			valid_count: 0,
			invalid_count: 0,
			histogram: BTreeMap::new(),
		};
		for value in column.data {
			// Finite values go in the histogram, everything else counts as invalid.
			if let Ok(value) = <Finite<f32>>::new(*value) {
				*stats.histogram.entry(value).or_insert(0) += 1;
				stats.valid_count += 1;
			} else {
				stats.invalid_count += 1;
			}
		}
		stats
	}

	pub fn finalize(self, settings: &StatsSettings) -> NumberColumnStatsOutput {
		let unique_count = self.histogram.len().to_u64().unwrap();
		let invalid_count = self.invalid_count.to_u64().unwrap();
		if self.histogram.is_empty() {
			return NumberColumnStatsOutput {
				column_name: self.column_name,
				count: self.count.to_u64().unwrap(),
				histogram: None,
				unique_count,
				invalid_count,
				min: std::f32::NAN,
				max: std::f32::NAN,
				mean: std::f32::NAN,
				variance: std::f32::NAN,
				std: std::f32::NAN,
				p25: std::f32::NAN,
				p50: std::f32::NAN,
				p75: std::f32::NAN,
			};
		}
		let histogram = if self.histogram.len() <= settings.number_histogram_max_size {
			Some(
				self.histogram
					.iter()
					.map(|(value, count)| (value.get(), count.to_u64().unwrap()))
					.collect(),
			)
		} else {
			None
		};
		let min = self.histogram.iter().next().unwrap().0.get();
		let max = self.histogram.iter().next_back().unwrap().0.get();
		let total_values_count = self.valid_count.to_f32().unwrap();
		let quantiles: Vec<f32> = vec![0.25, 0.50, 0.75];
		// The index of each quantile given the total number of finite values.
		let quantile_indexes: Vec<usize> = quantiles
			.iter()
			.map(|q| ((total_values_count - 1.0) * q).trunc().to_usize().unwrap())
			.collect();
		// The fractional part of the index, used to interpolate between two adjacent
		// values when the index is not an integer.
		let quantile_fracts: Vec<f32> = quantiles
			.iter()
			.map(|q| ((total_values_count - 1.0) * q).fract())
			.collect();
		let mut quantiles: Vec<Option<f32>> = vec![None; quantiles.len()];
		let mut current_count: usize = 0;
		let mut mean = 0.0;
		let mut m2 = 0.0;
		let mut iter = self.histogram.iter().peekable();
		while let Some((value, count)) = iter.next() {
			let value = value.get();
			let (new_mean, new_m2) = metrics::merge_mean_m2(
				current_count.to_u64().unwrap(),
				mean,
				m2,
				count.to_u64().unwrap(),
				value.to_f64().unwrap(),
				0.0,
			);
			mean = new_mean;
			m2 = new_m2;
			current_count += count;
			let unfilled = quantiles
				.iter_mut()
				.zip(quantile_indexes.iter().zip(quantile_fracts.iter()))
				.filter(|(quantile, (_, _))| quantile.is_none());
			for (quantile, (index, fract)) in unfilled {
				match (current_count - 1).cmp(index) {
					Ordering::Equal => {
						if *fract > 0.0 {
							// Interpolate between this value and the next one.
							let next_value = iter.peek().unwrap().0.get();
							*quantile = Some(value * (1.0 - fract) + next_value * fract);
						} else {
							*quantile = Some(value);
						}
					}
					Ordering::Greater => *quantile = Some(value),
					Ordering::Less => {}
				}
			}
		}
		let quantiles: Vec<f32> = quantiles.into_iter().map(|q| q.unwrap()).collect();
		let mean = mean.to_f32().unwrap();
		let variance = metrics::m2_to_variance(
			m2,
			NonZeroU64::new(current_count.to_u64().unwrap()).unwrap(),
		);
		NumberColumnStatsOutput {
			column_name: self.column_name,
			count: self.count.to_u64().unwrap(),
			histogram,
			unique_count,
			invalid_count,
			min,
			max,
			mean,
			variance,
			std: variance.sqrt(),
			p25: quantiles[0],
			p50: quantiles[1],
			p75: quantiles[2],
		}
	}
}

impl EnumColumnStats {
	pub fn compute(column: &EnumColumnView, _settings: &StatsSettings) -> Self {
		let mut histogram = vec![0; column.options.len() + 1];
		for value in column.data {
			let index = value.map(|value| value.get()).unwrap_or(0);
			histogram[index] += 1;
		}
		let invalid_count = histogram[0];
		Self {
			column_name: column.name.to_owned(),
			count: column.data.len(),
			options: column.options.to_vec(),
			invalid_count,
			histogram,
		}
	}

	pub fn finalize(self, _settings: &StatsSettings) -> EnumColumnStatsOutput {
		EnumColumnStatsOutput {
			column_name: self.column_name,
			count: self.count.to_u64().unwrap(),
			invalid_count: self.invalid_count,
			unique_count: self.options.len(),
			histogram: self
				.options
				.into_iter()
				.zip(self.histogram.into_iter().skip(1))
				.collect(),
		}
	}
}

impl TextColumnStats {
	pub fn compute(column: &TextColumnView, _settings: &StatsSettings) -> Self {
		let mut unique_values = BTreeSet::new();
		for value in column.data {
			if !unique_values.contains(value.as_str()) {
				unique_values.insert(value.clone());
			}
		}
		Self {
			column_name: column.name.to_owned(),
			count: column.data.len(),
			unique_values,
		}
	}

	pub fn finalize(self, _settings: &StatsSettings) -> TextColumnStatsOutput {
		TextColumnStatsOutput {
			column_name: self.column_name,
			count: self.count.to_u64().unwrap(),
			distinct_count: self.unique_values.len().to_u64().unwrap(),
		}
	}
}

impl ColumnStatsOutput {
	pub fn column_name(&self) -> &str {
		match self {
			Self::Unknown(stats) => &stats.column_name,
			Self::Number(stats) => &stats.column_name,
			Self::Enum(stats) => &stats.column_name,
			Self::Text(stats) => &stats.column_name,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::num::NonZeroUsize;

	fn number_stats(data: Vec<f32>) -> NumberColumnStatsOutput {
		let column = NumberColumn {
			name: "values".to_owned(),
			data,
		};
		NumberColumnStats::compute(&column.view(), &StatsSettings::default())
			.finalize(&StatsSettings::default())
	}

	#[test]
	fn test_number_quantiles_interpolate() {
		let output = number_stats(vec![1.0, 2.0, 3.0, 4.0]);
		assert_eq!(output.p25, 1.75);
		assert_eq!(output.p50, 2.5);
		assert_eq!(output.p75, 3.25);
		assert_eq!(output.min, 1.0);
		assert_eq!(output.max, 4.0);
	}

	#[test]
	fn test_number_quantiles_with_repeats() {
		let output = number_stats(vec![1.0, 5.0, 1.0]);
		assert_eq!(output.p50, 1.0);
		assert_eq!(output.unique_count, 2);
	}

	#[test]
	fn test_number_moments() {
		let output = number_stats(vec![0.0, 5.2, 1.3, 10.0]);
		assert!((output.mean - 4.125).abs() < 1e-4);
		assert!((output.variance - 15.166875).abs() < 1e-3);
		assert!((output.std - output.variance.sqrt()).abs() < 1e-6);
	}

	#[test]
	fn test_number_skips_nan() {
		let output = number_stats(vec![1.0, std::f32::NAN, 3.0]);
		assert_eq!(output.count, 3);
		assert_eq!(output.invalid_count, 1);
		assert_eq!(output.p50, 2.0);
	}

	#[test]
	fn test_number_empty() {
		let output = number_stats(vec![std::f32::NAN]);
		assert_eq!(output.unique_count, 0);
		assert!(output.p50.is_nan());
	}

	#[test]
	fn test_enum_histogram() {
		let column = EnumColumn {
			name: "port".to_owned(),
			options: vec!["C".to_owned(), "Q".to_owned(), "S".to_owned()],
			data: vec![
				NonZeroUsize::new(3),
				NonZeroUsize::new(3),
				NonZeroUsize::new(1),
				None,
			],
		};
		let output = EnumColumnStats::compute(&column.view(), &StatsSettings::default())
			.finalize(&StatsSettings::default());
		assert_eq!(output.invalid_count, 1);
		assert_eq!(
			output.histogram,
			vec![
				("C".to_owned(), 1),
				("Q".to_owned(), 0),
				("S".to_owned(), 2),
			],
		);
	}

	#[test]
	fn test_text_distinct() {
		let column = TextColumn {
			name: "cabin".to_owned(),
			data: vec!["C85".to_owned(), "C85".to_owned(), String::new()],
		};
		let output = TextColumnStats::compute(&column.view(), &StatsSettings::default())
			.finalize(&StatsSettings::default());
		assert_eq!(output.count, 3);
		assert_eq!(output.distinct_count, 2);
	}
}
