/*!
This crate provides a basic implementation of dataframes, which are two dimensional
arrays of data where each column can have a different data type, like a spreadsheet.
It implements just the features the cleaning pipeline needs: typed columns, csv
loading and saving, and row selection.
*/

use fnv::FnvHashMap;
use std::num::NonZeroUsize;

pub mod load;
pub mod save;

pub use self::load::*;

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrame {
	pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataFrameView<'a> {
	pub columns: Vec<ColumnView<'a>>,
}

/// A column holds all the values for one field of the table. Missing values are
/// represented per type: `NaN` for numbers, `None` for enums, and the empty string
/// for text.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
	Unknown(UnknownColumn),
	Number(NumberColumn),
	Enum(EnumColumn),
	Text(TextColumn),
}

/// A column whose type could not be determined because it contained no valid values.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownColumn {
	pub name: String,
	pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberColumn {
	pub name: String,
	pub data: Vec<f32>,
}

/// Enum values are stored as 1-based indexes into `options`. `None` marks a value
/// that was missing or was not one of the options.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumColumn {
	pub name: String,
	pub options: Vec<String>,
	pub data: Vec<Option<NonZeroUsize>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextColumn {
	pub name: String,
	pub data: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnView<'a> {
	Unknown(UnknownColumnView<'a>),
	Number(NumberColumnView<'a>),
	Enum(EnumColumnView<'a>),
	Text(TextColumnView<'a>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownColumnView<'a> {
	pub name: &'a str,
	pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumberColumnView<'a> {
	pub name: &'a str,
	pub data: &'a [f32],
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumColumnView<'a> {
	pub name: &'a str,
	pub options: &'a [String],
	pub data: &'a [Option<NonZeroUsize>],
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextColumnView<'a> {
	pub name: &'a str,
	pub data: &'a [String],
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
	Unknown,
	Number,
	Enum { options: Vec<String> },
	Text,
}

impl DataFrame {
	pub fn new(column_names: Vec<String>, column_types: Vec<ColumnType>) -> Self {
		let columns = column_names
			.into_iter()
			.zip(column_types.into_iter())
			.map(|(column_name, column_type)| match column_type {
				ColumnType::Unknown => Column::Unknown(UnknownColumn::new(column_name)),
				ColumnType::Number => Column::Number(NumberColumn::new(column_name)),
				ColumnType::Enum { options } => Column::Enum(EnumColumn::new(column_name, options)),
				ColumnType::Text => Column::Text(TextColumn::new(column_name)),
			})
			.collect();
		Self { columns }
	}

	pub fn ncols(&self) -> usize {
		self.columns.len()
	}

	pub fn nrows(&self) -> usize {
		self.columns.first().map(|column| column.len()).unwrap_or(0)
	}

	pub fn view(&self) -> DataFrameView {
		let columns = self.columns.iter().map(|column| column.view()).collect();
		DataFrameView { columns }
	}

	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|column| column.name() == name)
	}

	pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
		self.columns.iter_mut().find(|column| column.name() == name)
	}

	pub fn column_index(&self, name: &str) -> Option<usize> {
		self.columns.iter().position(|column| column.name() == name)
	}

	/// Remove the column with the given name and return it, or `None` if there is no
	/// such column.
	pub fn remove_column(&mut self, name: &str) -> Option<Column> {
		let index = self.column_index(name)?;
		Some(self.columns.remove(index))
	}

	/// Build a new dataframe containing the rows at `indices`, in that order. Indices
	/// may repeat and must be in bounds.
	pub fn take_rows(&self, indices: &[usize]) -> Self {
		let columns = self
			.columns
			.iter()
			.map(|column| match column {
				Column::Unknown(column) => Column::Unknown(UnknownColumn {
					name: column.name.clone(),
					len: indices.len(),
				}),
				Column::Number(column) => Column::Number(NumberColumn {
					name: column.name.clone(),
					data: indices.iter().map(|index| column.data[*index]).collect(),
				}),
				Column::Enum(column) => Column::Enum(EnumColumn {
					name: column.name.clone(),
					options: column.options.clone(),
					data: indices.iter().map(|index| column.data[*index]).collect(),
				}),
				Column::Text(column) => Column::Text(TextColumn {
					name: column.name.clone(),
					data: indices
						.iter()
						.map(|index| column.data[*index].clone())
						.collect(),
				}),
			})
			.collect();
		Self { columns }
	}

	/// Keep only the rows whose entry in `keep` is true. `keep` must have one entry
	/// per row.
	pub fn retain_rows(&mut self, keep: &[bool]) {
		assert_eq!(keep.len(), self.nrows());
		let kept = keep.iter().filter(|keep| **keep).count();
		for column in self.columns.iter_mut() {
			match column {
				Column::Unknown(column) => column.len = kept,
				Column::Number(column) => {
					let mut iter = keep.iter();
					column.data.retain(|_| *iter.next().unwrap());
				}
				Column::Enum(column) => {
					let mut iter = keep.iter();
					column.data.retain(|_| *iter.next().unwrap());
				}
				Column::Text(column) => {
					let mut iter = keep.iter();
					column.data.retain(|_| *iter.next().unwrap());
				}
			}
		}
	}
}

impl Column {
	pub fn len(&self) -> usize {
		match self {
			Self::Unknown(column) => column.len,
			Self::Number(column) => column.data.len(),
			Self::Enum(column) => column.data.len(),
			Self::Text(column) => column.data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Unknown(column) => column.name.as_str(),
			Self::Number(column) => column.name.as_str(),
			Self::Enum(column) => column.name.as_str(),
			Self::Text(column) => column.name.as_str(),
		}
	}

	pub fn as_number(&self) -> Option<&NumberColumn> {
		match self {
			Self::Number(column) => Some(column),
			_ => None,
		}
	}

	pub fn as_number_mut(&mut self) -> Option<&mut NumberColumn> {
		match self {
			Self::Number(column) => Some(column),
			_ => None,
		}
	}

	pub fn as_enum(&self) -> Option<&EnumColumn> {
		match self {
			Self::Enum(column) => Some(column),
			_ => None,
		}
	}

	pub fn as_enum_mut(&mut self) -> Option<&mut EnumColumn> {
		match self {
			Self::Enum(column) => Some(column),
			_ => None,
		}
	}

	pub fn as_text(&self) -> Option<&TextColumn> {
		match self {
			Self::Text(column) => Some(column),
			_ => None,
		}
	}

	pub fn as_text_mut(&mut self) -> Option<&mut TextColumn> {
		match self {
			Self::Text(column) => Some(column),
			_ => None,
		}
	}

	pub fn view(&self) -> ColumnView {
		match self {
			Self::Unknown(column) => ColumnView::Unknown(column.view()),
			Self::Number(column) => ColumnView::Number(column.view()),
			Self::Enum(column) => ColumnView::Enum(column.view()),
			Self::Text(column) => ColumnView::Text(column.view()),
		}
	}
}

impl UnknownColumn {
	pub fn new(name: String) -> Self {
		Self { name, len: 0 }
	}

	pub fn view(&self) -> UnknownColumnView {
		UnknownColumnView {
			name: &self.name,
			len: self.len,
		}
	}
}

impl NumberColumn {
	pub fn new(name: String) -> Self {
		Self {
			name,
			data: Vec::new(),
		}
	}

	pub fn view(&self) -> NumberColumnView {
		NumberColumnView {
			name: &self.name,
			data: &self.data,
		}
	}
}

impl EnumColumn {
	pub fn new(name: String, options: Vec<String>) -> Self {
		Self {
			name,
			options,
			data: Vec::new(),
		}
	}

	pub fn view(&self) -> EnumColumnView {
		EnumColumnView {
			name: &self.name,
			options: &self.options,
			data: &self.data,
		}
	}

	/// A lookup table from option to its 1-based code.
	pub fn options_map(&self) -> FnvHashMap<&str, NonZeroUsize> {
		self.options
			.iter()
			.enumerate()
			.map(|(index, option)| {
				(option.as_str(), NonZeroUsize::new(index + 1).unwrap())
			})
			.collect()
	}

	/// The option string for a stored code.
	pub fn option(&self, code: Option<NonZeroUsize>) -> Option<&str> {
		code.map(|code| self.options[code.get() - 1].as_str())
	}
}

impl TextColumn {
	pub fn new(name: String) -> Self {
		Self {
			name,
			data: Vec::new(),
		}
	}

	pub fn view(&self) -> TextColumnView {
		TextColumnView {
			name: &self.name,
			data: &self.data,
		}
	}
}

impl<'a> DataFrameView<'a> {
	pub fn ncols(&self) -> usize {
		self.columns.len()
	}

	pub fn nrows(&self) -> usize {
		self.columns.first().map(|column| column.len()).unwrap_or(0)
	}

	pub fn column(&self, name: &str) -> Option<&ColumnView<'a>> {
		self.columns.iter().find(|column| column.name() == name)
	}
}

impl<'a> ColumnView<'a> {
	pub fn len(&self) -> usize {
		match self {
			Self::Unknown(column) => column.len,
			Self::Number(column) => column.data.len(),
			Self::Enum(column) => column.data.len(),
			Self::Text(column) => column.data.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn name(&self) -> &str {
		match self {
			Self::Unknown(column) => column.name,
			Self::Number(column) => column.name,
			Self::Enum(column) => column.name,
			Self::Text(column) => column.name,
		}
	}

	pub fn as_number(&self) -> Option<&NumberColumnView<'a>> {
		match self {
			Self::Number(column) => Some(column),
			_ => None,
		}
	}

	pub fn as_enum(&self) -> Option<&EnumColumnView<'a>> {
		match self {
			Self::Enum(column) => Some(column),
			_ => None,
		}
	}

	pub fn as_text(&self) -> Option<&TextColumnView<'a>> {
		match self {
			Self::Text(column) => Some(column),
			_ => None,
		}
	}
}
