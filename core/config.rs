/*!
This module defines the `Config` struct, which is used to configure a processing run
with [`process`](../process/fn.process.html). Every field is optional: a missing field
falls back to the built-in recipe for the passenger survival table.
*/

use std::collections::BTreeMap;

#[derive(Debug, Default, serde::Deserialize)]
pub struct Config {
	pub column_types: Option<BTreeMap<String, ColumnType>>,
	pub impute: Option<Vec<Impute>>,
	pub encode: Option<Vec<Encode>>,
	pub drop_columns: Option<Vec<String>>,
	pub trim_outliers: Option<Vec<TrimOutliers>>,
	pub standardize: Option<Vec<String>>,
	pub target: Option<String>,
	pub shuffle: Option<Shuffle>,
	pub test_fraction: Option<f32>,
	pub validation_fraction: Option<f32>,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ColumnType {
	#[serde(rename = "unknown")]
	Unknown,
	#[serde(rename = "number")]
	Number,
	#[serde(rename = "enum")]
	Enum { options: Vec<String> },
	#[serde(rename = "text")]
	Text,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Impute {
	pub column: String,
	#[serde(flatten)]
	pub strategy: ImputeStrategy,
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(tag = "strategy")]
pub enum ImputeStrategy {
	/// Replace missing values in a number column with the column median.
	#[serde(rename = "median")]
	Median,
	/// Replace missing values in a number column with the column mean.
	#[serde(rename = "mean")]
	Mean,
	/// Replace missing values with a fixed value.
	#[serde(rename = "constant")]
	Constant { value: String },
	/// Remove the rows whose value is missing.
	#[serde(rename = "drop")]
	Drop,
}

impl std::fmt::Display for ImputeStrategy {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ImputeStrategy::Median => write!(f, "median"),
			ImputeStrategy::Mean => write!(f, "mean"),
			ImputeStrategy::Constant { value } => write!(f, "constant:{}", value),
			ImputeStrategy::Drop => write!(f, "drop"),
		}
	}
}

/// Recode an enum column to a number column of integer codes.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Encode {
	pub column: String,
	pub codes: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct TrimOutliers {
	pub column: String,
	pub iqr_multiplier: Option<f32>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
pub enum Shuffle {
	Enabled(bool),
	Options { seed: u64 },
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_parse() {
		let config = r#"
impute:
  - column: Age
    strategy: median
  - column: Cabin
    strategy: constant
    value: Unknown
  - column: Embarked
    strategy: drop
encode:
  - column: Sex
    codes:
      male: 1
      female: 0
trim_outliers:
  - column: Fare
standardize:
  - Age
  - Fare
shuffle:
  seed: 7
test_fraction: 0.3
validation_fraction: 0.5
"#;
		let config: Config = serde_yaml::from_str(config).unwrap();
		let impute = config.impute.unwrap();
		assert_eq!(impute.len(), 3);
		assert_eq!(impute[0].column, "Age");
		assert_eq!(impute[0].strategy, ImputeStrategy::Median);
		assert_eq!(
			impute[1].strategy,
			ImputeStrategy::Constant {
				value: "Unknown".to_owned()
			},
		);
		assert_eq!(impute[2].strategy, ImputeStrategy::Drop);
		let encode = config.encode.unwrap();
		assert_eq!(encode[0].codes.get("male"), Some(&1));
		let trim = config.trim_outliers.unwrap();
		assert_eq!(trim[0].iqr_multiplier, None);
		match config.shuffle.unwrap() {
			Shuffle::Options { seed } => assert_eq!(seed, 7),
			_ => panic!(),
		}
		assert_eq!(config.test_fraction, Some(0.3));
	}

	#[test]
	fn test_parse_shuffle_bool() {
		let config: Config = serde_yaml::from_str("shuffle: false\n").unwrap();
		match config.shuffle.unwrap() {
			Shuffle::Enabled(enabled) => assert!(!enabled),
			_ => panic!(),
		}
	}
}
