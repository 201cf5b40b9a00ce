use crate::*;
use anyhow::Result;
use std::{
	collections::{BTreeMap, BTreeSet},
	path::Path,
};

#[derive(Clone)]
pub struct FromCsvOptions<'a> {
	/// Force the type of the named columns instead of inferring them.
	pub column_types: Option<BTreeMap<String, ColumnType>>,
	pub infer_options: InferOptions,
	pub invalid_values: &'a [&'a str],
}

impl<'a> Default for FromCsvOptions<'a> {
	fn default() -> Self {
		Self {
			column_types: None,
			infer_options: InferOptions::default(),
			invalid_values: DEFAULT_INVALID_VALUES,
		}
	}
}

#[derive(Clone, Debug)]
pub struct InferOptions {
	/// A column with more than this many unique values will never be inferred as an
	/// enum column.
	pub enum_max_unique_values: usize,
}

impl Default for InferOptions {
	fn default() -> Self {
		Self {
			enum_max_unique_values: 100,
		}
	}
}

/// These values mark a cell as missing.
pub const DEFAULT_INVALID_VALUES: &[&str] = &[
	"", "null", "NULL", "n/a", "N/A", "nan", "-nan", "NaN", "-NaN", "?",
];

impl DataFrame {
	pub fn from_path(path: &Path, options: FromCsvOptions, progress: impl Fn(u64)) -> Result<Self> {
		Self::from_csv(&mut csv::Reader::from_path(path)?, options, progress)
	}

	pub fn from_csv<R>(
		reader: &mut csv::Reader<R>,
		options: FromCsvOptions,
		progress: impl Fn(u64),
	) -> Result<Self>
	where
		R: std::io::Read + std::io::Seek,
	{
		let column_names: Vec<String> = reader
			.headers()?
			.into_iter()
			.map(|column_name| column_name.to_owned())
			.collect();
		let start_position = reader.position().clone();

		// Determine the type of each column, taking types forced in the options as-is
		// and collecting infer stats for the rest.
		enum Plan<'a> {
			Forced(ColumnType),
			Infer(InferStats<'a>),
		}
		let mut plans: Vec<Plan> = column_names
			.iter()
			.map(|column_name| {
				options
					.column_types
					.as_ref()
					.and_then(|column_types| column_types.get(column_name))
					.map(|column_type| Plan::Forced(column_type.clone()))
					.unwrap_or_else(|| {
						Plan::Infer(InferStats::new(
							&options.infer_options,
							options.invalid_values,
						))
					})
			})
			.collect();

		// The infer pass over the csv is only necessary if at least one column did not
		// have its type forced.
		let mut n_rows = None;
		if plans.iter().any(|plan| matches!(plan, Plan::Infer(_))) {
			let mut record = csv::StringRecord::new();
			let mut n_rows_read = 0;
			while reader.read_record(&mut record)? {
				n_rows_read += 1;
				for (index, plan) in plans.iter_mut().enumerate() {
					if let Plan::Infer(infer_stats) = plan {
						infer_stats.update(record.get(index).unwrap_or(""));
					}
				}
			}
			n_rows = Some(n_rows_read);
			// Return to the start of the csv to load the values.
			reader.seek(start_position)?;
		}
		let column_types: Vec<ColumnType> = plans
			.into_iter()
			.map(|plan| match plan {
				Plan::Forced(column_type) => column_type,
				Plan::Infer(infer_stats) => infer_stats.finalize(),
			})
			.collect();

		let mut dataframe = Self::new(column_names, column_types);
		// If an infer pass was done the row count is known, so reserve storage up front.
		if let Some(n_rows) = n_rows {
			for column in dataframe.columns.iter_mut() {
				match column {
					Column::Unknown(_) => {}
					Column::Number(column) => column.data.reserve_exact(n_rows),
					Column::Enum(column) => column.data.reserve_exact(n_rows),
					Column::Text(column) => column.data.reserve_exact(n_rows),
				}
			}
		}

		// Per-column lookup tables from option string to code.
		let lookups: Vec<Option<FnvHashMap<String, NonZeroUsize>>> = dataframe
			.columns
			.iter()
			.map(|column| match column {
				Column::Enum(column) => Some(
					column
						.options
						.iter()
						.enumerate()
						.map(|(index, option)| {
							(option.clone(), NonZeroUsize::new(index + 1).unwrap())
						})
						.collect(),
				),
				_ => None,
			})
			.collect();

		// Read each csv record and insert the values into the columns.
		let mut record = csv::ByteRecord::new();
		while reader.read_byte_record(&mut record)? {
			if let Some(position) = record.position() {
				progress(position.byte());
			}
			for ((column, lookup), value) in dataframe
				.columns
				.iter_mut()
				.zip(lookups.iter())
				.zip(record.iter())
			{
				match column {
					Column::Unknown(column) => {
						column.len += 1;
					}
					Column::Number(column) => {
						let value = match lexical::parse::<f32, &[u8]>(value) {
							Ok(value) if value.is_finite() => value,
							_ => std::f32::NAN,
						};
						column.data.push(value);
					}
					Column::Enum(column) => {
						let value = std::str::from_utf8(value)
							.ok()
							.and_then(|value| lookup.as_ref().unwrap().get(value).copied());
						column.data.push(value);
					}
					Column::Text(column) => {
						column.data.push(std::str::from_utf8(value)?.to_owned());
					}
				}
			}
		}
		Ok(dataframe)
	}
}

#[derive(Clone, Debug)]
pub struct InferStats<'a> {
	enum_max_unique_values: usize,
	invalid_values: &'a [&'a str],
	kind: InferKind,
	unique_values: Option<BTreeSet<String>>,
}

#[derive(PartialEq, Clone, Copy, Debug)]
enum InferKind {
	Unknown,
	Number,
	Enum,
	Text,
}

impl<'a> InferStats<'a> {
	pub fn new(infer_options: &InferOptions, invalid_values: &'a [&'a str]) -> Self {
		Self {
			enum_max_unique_values: infer_options.enum_max_unique_values,
			invalid_values,
			kind: InferKind::Unknown,
			unique_values: Some(BTreeSet::new()),
		}
	}

	pub fn update(&mut self, value: &str) {
		if self.invalid_values.contains(&value) {
			return;
		}
		if let Some(unique_values) = self.unique_values.as_mut() {
			if !unique_values.contains(value) {
				unique_values.insert(value.to_owned());
			}
			if unique_values.len() > self.enum_max_unique_values {
				self.unique_values = None;
			}
		}
		match self.kind {
			InferKind::Unknown | InferKind::Number => {
				if lexical::parse::<f32, &str>(value)
					.map(|value| value.is_finite())
					.unwrap_or(false)
				{
					self.kind = InferKind::Number;
				} else if self.unique_values.is_some() {
					self.kind = InferKind::Enum;
				} else {
					self.kind = InferKind::Text;
				}
			}
			InferKind::Enum => {
				if self.unique_values.is_none() {
					self.kind = InferKind::Text;
				}
			}
			InferKind::Text => {}
		}
	}

	pub fn finalize(self) -> ColumnType {
		match self.kind {
			InferKind::Unknown => ColumnType::Unknown,
			InferKind::Number => {
				// A numeric column whose only values are 0 and 1 is a label-like
				// column, so load it as an enum to make it stratifiable.
				if let Some(unique_values) = &self.unique_values {
					if unique_values.len() == 2
						&& unique_values.contains("0")
						&& unique_values.contains("1")
					{
						return ColumnType::Enum {
							options: vec!["0".to_owned(), "1".to_owned()],
						};
					}
				}
				ColumnType::Number
			}
			InferKind::Enum => ColumnType::Enum {
				options: self.unique_values.unwrap().into_iter().collect(),
			},
			InferKind::Text => ColumnType::Text,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn load(csv: &str, options: FromCsvOptions) -> DataFrame {
		DataFrame::from_csv(
			&mut csv::Reader::from_reader(std::io::Cursor::new(csv)),
			options,
			|_| {},
		)
		.unwrap()
	}

	#[test]
	fn test_infer() {
		let csv = "number,enum,text\n1,a,hello\n2,b,world\n2.5,a,again\n";
		let dataframe = load(
			csv,
			FromCsvOptions {
				infer_options: InferOptions {
					enum_max_unique_values: 2,
				},
				..Default::default()
			},
		);
		let expected = DataFrame {
			columns: vec![
				Column::Number(NumberColumn {
					name: "number".to_owned(),
					data: vec![1.0, 2.0, 2.5],
				}),
				Column::Enum(EnumColumn {
					name: "enum".to_owned(),
					options: vec!["a".to_owned(), "b".to_owned()],
					data: vec![
						NonZeroUsize::new(1),
						NonZeroUsize::new(2),
						NonZeroUsize::new(1),
					],
				}),
				Column::Text(TextColumn {
					name: "text".to_owned(),
					data: vec!["hello".to_owned(), "world".to_owned(), "again".to_owned()],
				}),
			],
		};
		assert_eq!(dataframe, expected);
	}

	#[test]
	fn test_forced_column_types() {
		let csv = "id,port\n1,S\n2,C\n";
		let mut column_types = BTreeMap::new();
		column_types.insert("id".to_owned(), ColumnType::Text);
		column_types.insert(
			"port".to_owned(),
			ColumnType::Enum {
				options: vec!["S".to_owned(), "C".to_owned(), "Q".to_owned()],
			},
		);
		let dataframe = load(
			csv,
			FromCsvOptions {
				column_types: Some(column_types),
				..Default::default()
			},
		);
		let expected = DataFrame {
			columns: vec![
				Column::Text(TextColumn {
					name: "id".to_owned(),
					data: vec!["1".to_owned(), "2".to_owned()],
				}),
				Column::Enum(EnumColumn {
					name: "port".to_owned(),
					options: vec!["S".to_owned(), "C".to_owned(), "Q".to_owned()],
					data: vec![NonZeroUsize::new(1), NonZeroUsize::new(2)],
				}),
			],
		};
		assert_eq!(dataframe, expected);
	}

	#[test]
	fn test_zero_one_column_becomes_enum() {
		let csv = "label\n0\n1\n0\n";
		let dataframe = load(csv, FromCsvOptions::default());
		let expected = DataFrame {
			columns: vec![Column::Enum(EnumColumn {
				name: "label".to_owned(),
				options: vec!["0".to_owned(), "1".to_owned()],
				data: vec![
					NonZeroUsize::new(1),
					NonZeroUsize::new(2),
					NonZeroUsize::new(1),
				],
			})],
		};
		assert_eq!(dataframe, expected);
	}

	#[test]
	fn test_missing_values() {
		let csv = "age,port\n22,S\n,C\nN/A,\n";
		let dataframe = load(csv, FromCsvOptions::default());
		let age = dataframe.column("age").unwrap().as_number().unwrap();
		assert_eq!(age.data[0], 22.0);
		assert!(age.data[1].is_nan());
		assert!(age.data[2].is_nan());
		let port = dataframe.column("port").unwrap().as_enum().unwrap();
		assert_eq!(port.options, vec!["C".to_owned(), "S".to_owned()]);
		assert_eq!(
			port.data,
			vec![NonZeroUsize::new(2), NonZeroUsize::new(1), None],
		);
	}
}
