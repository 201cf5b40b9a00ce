use crate::*;
use anyhow::Result;
use std::path::Path;

impl DataFrame {
	pub fn to_path(&self, path: &Path) -> Result<()> {
		let mut writer = csv::Writer::from_path(path)?;
		self.to_csv(&mut writer)?;
		writer.flush()?;
		Ok(())
	}

	/// Write the dataframe as csv: a header row of column names, then one record per
	/// row. Missing values render as empty cells, enum values render their option
	/// string, and whole numbers render without a fractional part.
	pub fn to_csv<W>(&self, writer: &mut csv::Writer<W>) -> Result<()>
	where
		W: std::io::Write,
	{
		writer.write_record(self.columns.iter().map(|column| column.name()))?;
		let mut record: Vec<String> = Vec::with_capacity(self.ncols());
		for index in 0..self.nrows() {
			record.clear();
			for column in self.columns.iter() {
				let cell = match column {
					Column::Unknown(_) => String::new(),
					Column::Number(column) => render_number(column.data[index]),
					Column::Enum(column) => column
						.option(column.data[index])
						.map(|option| option.to_owned())
						.unwrap_or_default(),
					Column::Text(column) => column.data[index].clone(),
				};
				record.push(cell);
			}
			writer.write_record(record.iter())?;
		}
		Ok(())
	}
}

fn render_number(value: f32) -> String {
	if value.is_nan() {
		String::new()
	} else if value.fract() == 0.0 && value.abs() < 1e7 {
		(value as i64).to_string()
	} else {
		lexical::to_string(value)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::num::NonZeroUsize;

	#[test]
	fn test_to_csv() {
		let dataframe = DataFrame {
			columns: vec![
				Column::Number(NumberColumn {
					name: "age".to_owned(),
					data: vec![22.0, std::f32::NAN, 26.5],
				}),
				Column::Enum(EnumColumn {
					name: "port".to_owned(),
					options: vec!["C".to_owned(), "S".to_owned()],
					data: vec![NonZeroUsize::new(2), NonZeroUsize::new(1), None],
				}),
				Column::Text(TextColumn {
					name: "note".to_owned(),
					data: vec!["x".to_owned(), String::new(), "y, z".to_owned()],
				}),
			],
		};
		let mut writer = csv::Writer::from_writer(Vec::new());
		dataframe.to_csv(&mut writer).unwrap();
		let written = String::from_utf8(writer.into_inner().unwrap()).unwrap();
		assert_eq!(written, "age,port,note\n22,S,x\n,C,\n26.5,,\"y, z\"\n");
	}

	#[test]
	fn test_roundtrip() {
		let dataframe = DataFrame {
			columns: vec![
				Column::Number(NumberColumn {
					name: "fare".to_owned(),
					data: vec![7.25, 71.5],
				}),
				Column::Enum(EnumColumn {
					name: "sex".to_owned(),
					options: vec!["female".to_owned(), "male".to_owned()],
					data: vec![NonZeroUsize::new(2), NonZeroUsize::new(1)],
				}),
			],
		};
		let mut writer = csv::Writer::from_writer(Vec::new());
		dataframe.to_csv(&mut writer).unwrap();
		let written = writer.into_inner().unwrap();
		let reloaded = DataFrame::from_csv(
			&mut csv::Reader::from_reader(std::io::Cursor::new(written)),
			FromCsvOptions::default(),
			|_| {},
		)
		.unwrap();
		assert_eq!(
			reloaded.column("fare").unwrap().as_number().unwrap().data,
			vec![7.25, 71.5],
		);
		assert_eq!(
			reloaded.column("sex").unwrap().as_enum().unwrap().options,
			vec!["female".to_owned(), "male".to_owned()],
		);
	}
}
