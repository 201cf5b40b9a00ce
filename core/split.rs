use anyhow::{bail, format_err, Result};
use holystone_dataframe::*;
use num_traits::ToPrimitive;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
pub struct SplitOptions {
	/// Seed for shuffling row order before splitting. `None` splits in file order.
	pub seed: Option<u64>,
	/// Fraction of each stratum that goes to the test partition.
	pub test_fraction: f32,
	/// Fraction of each stratum's remainder, after the test rows are taken, that
	/// goes to the validation partition.
	pub validation_fraction: f32,
}

#[derive(Debug)]
pub struct SplitOutput {
	pub train: DataFrame,
	pub validation: DataFrame,
	pub test: DataFrame,
}

/// Split the dataframe into train/validation/test partitions, stratified by the
/// target column so each partition keeps the same label balance. The target must be
/// an enum column with no missing values.
pub fn stratified_split(
	dataframe: &DataFrame,
	target_column_name: &str,
	options: &SplitOptions,
) -> Result<SplitOutput> {
	if !(options.test_fraction > 0.0 && options.test_fraction < 1.0) {
		bail!(
			"test_fraction must be between 0 and 1, got {}",
			options.test_fraction
		);
	}
	if !(options.validation_fraction > 0.0 && options.validation_fraction < 1.0) {
		bail!(
			"validation_fraction must be between 0 and 1, got {}",
			options.validation_fraction
		);
	}
	let target = dataframe
		.column(target_column_name)
		.ok_or_else(|| format_err!("did not find target column \"{}\"", target_column_name))?
		.as_enum()
		.ok_or_else(|| {
			format_err!(
				"target column \"{}\" must be a categorical column to stratify by",
				target_column_name
			)
		})?;

	// Group the row indices by target option.
	let mut strata: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
	for (index, value) in target.data.iter().enumerate() {
		match value {
			Some(code) => strata.entry(code.get()).or_insert_with(Vec::new).push(index),
			None => bail!(
				"target column \"{}\" has a missing value at row {}",
				target_column_name,
				index
			),
		}
	}

	if let Some(seed) = options.seed {
		let mut rng = Xoshiro256Plus::seed_from_u64(seed);
		for indices in strata.values_mut() {
			indices.shuffle(&mut rng);
		}
	}

	let mut train_indices = Vec::new();
	let mut validation_indices = Vec::new();
	let mut test_indices = Vec::new();
	for indices in strata.values() {
		let n = indices.len();
		let n_test = (options.test_fraction * n.to_f32().unwrap())
			.to_usize()
			.unwrap();
		let n_validation = (options.validation_fraction * (n - n_test).to_f32().unwrap())
			.to_usize()
			.unwrap();
		test_indices.extend_from_slice(&indices[0..n_test]);
		validation_indices.extend_from_slice(&indices[n_test..n_test + n_validation]);
		train_indices.extend_from_slice(&indices[n_test + n_validation..]);
	}
	// Restore file order within each partition.
	train_indices.sort_unstable();
	validation_indices.sort_unstable();
	test_indices.sort_unstable();

	Ok(SplitOutput {
		train: dataframe.take_rows(&train_indices),
		validation: dataframe.take_rows(&validation_indices),
		test: dataframe.take_rows(&test_indices),
	})
}

#[cfg(test)]
mod test {
	use super::*;
	use std::num::NonZeroUsize;

	fn labeled_frame(labels: &[usize]) -> DataFrame {
		DataFrame {
			columns: vec![
				Column::Number(NumberColumn {
					name: "value".to_owned(),
					data: (0..labels.len()).map(|index| index as f32).collect(),
				}),
				Column::Enum(EnumColumn {
					name: "label".to_owned(),
					options: vec!["0".to_owned(), "1".to_owned()],
					data: labels
						.iter()
						.map(|label| NonZeroUsize::new(label + 1))
						.collect(),
				}),
			],
		}
	}

	fn label_counts(dataframe: &DataFrame) -> (usize, usize) {
		let column = dataframe.column("label").unwrap().as_enum().unwrap();
		let zeros = column
			.data
			.iter()
			.filter(|value| **value == NonZeroUsize::new(1))
			.count();
		(zeros, column.data.len() - zeros)
	}

	#[test]
	fn test_stratified_counts() {
		// Five rows of each label; 40% test, then half of the remainder to
		// validation, leaves 2/1/2 per stratum.
		let dataframe = labeled_frame(&[0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
		let options = SplitOptions {
			seed: Some(42),
			test_fraction: 0.4,
			validation_fraction: 0.5,
		};
		let output = stratified_split(&dataframe, "label", &options).unwrap();
		assert_eq!(output.train.nrows(), 4);
		assert_eq!(output.validation.nrows(), 2);
		assert_eq!(output.test.nrows(), 4);
		assert_eq!(label_counts(&output.train), (2, 2));
		assert_eq!(label_counts(&output.validation), (1, 1));
		assert_eq!(label_counts(&output.test), (2, 2));
	}

	#[test]
	fn test_partitions_cover_all_rows_once() {
		let dataframe = labeled_frame(&[0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
		let options = SplitOptions {
			seed: Some(7),
			test_fraction: 0.25,
			validation_fraction: 0.25,
		};
		let output = stratified_split(&dataframe, "label", &options).unwrap();
		let mut values: Vec<f32> = Vec::new();
		for partition in &[&output.train, &output.validation, &output.test] {
			values.extend_from_slice(
				&partition.column("value").unwrap().as_number().unwrap().data,
			);
		}
		values.sort_by(|a, b| a.partial_cmp(b).unwrap());
		let expected: Vec<f32> = (0..12).map(|index| index as f32).collect();
		assert_eq!(values, expected);
	}

	#[test]
	fn test_deterministic_for_seed() {
		let dataframe = labeled_frame(&[0, 1, 0, 1, 0, 1, 0, 1]);
		let options = SplitOptions {
			seed: Some(42),
			test_fraction: 0.25,
			validation_fraction: 0.34,
		};
		let a = stratified_split(&dataframe, "label", &options).unwrap();
		let b = stratified_split(&dataframe, "label", &options).unwrap();
		assert_eq!(a.train, b.train);
		assert_eq!(a.validation, b.validation);
		assert_eq!(a.test, b.test);
	}

	#[test]
	fn test_missing_target_value_errors() {
		let mut dataframe = labeled_frame(&[0, 1, 0, 1]);
		dataframe
			.column_mut("label")
			.unwrap()
			.as_enum_mut()
			.unwrap()
			.data[2] = None;
		let options = SplitOptions {
			seed: Some(42),
			test_fraction: 0.25,
			validation_fraction: 0.25,
		};
		assert!(stratified_split(&dataframe, "label", &options).is_err());
	}

	#[test]
	fn test_non_enum_target_errors() {
		let dataframe = labeled_frame(&[0, 1]);
		let options = SplitOptions {
			seed: Some(42),
			test_fraction: 0.5,
			validation_fraction: 0.5,
		};
		assert!(stratified_split(&dataframe, "value", &options).is_err());
	}

	#[test]
	fn test_invalid_fraction_errors() {
		let dataframe = labeled_frame(&[0, 1]);
		let options = SplitOptions {
			seed: None,
			test_fraction: 1.0,
			validation_fraction: 0.5,
		};
		assert!(stratified_split(&dataframe, "label", &options).is_err());
	}

	#[test]
	fn test_tiny_stratum() {
		// A stratum with one row still splits: the row lands in train.
		let dataframe = labeled_frame(&[0, 0, 0, 0, 1]);
		let options = SplitOptions {
			seed: Some(42),
			test_fraction: 0.25,
			validation_fraction: 0.25,
		};
		let output = stratified_split(&dataframe, "label", &options).unwrap();
		let (_, ones_in_train) = label_counts(&output.train);
		assert_eq!(ones_in_train, 1);
		assert_eq!(
			output.train.nrows() + output.validation.nrows() + output.test.nrows(),
			5,
		);
	}
}
