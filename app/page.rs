use holystone_tracking::RunRecord;

/// The first rows of a run's cleaned csv artifact, shown on the dashboard.
#[derive(Clone, Debug)]
pub struct ArtifactPreview {
	pub file_name: String,
	pub header: Vec<String>,
	pub rows: Vec<Vec<String>>,
}

const TRAIN_COLOR: &str = "#3498db";
const VALIDATION_COLOR: &str = "#f39c12";
const TEST_COLOR: &str = "#2ecc71";

const STYLE: &str = "\
body { font-family: sans-serif; margin: 2rem auto; max-width: 48rem; color: #222; }\n\
h1 { font-size: 1.4rem; }\n\
h2 { font-size: 1.1rem; margin-top: 2rem; }\n\
table { border-collapse: collapse; }\n\
td, th { border: 1px solid #ccc; padding: 0.25rem 0.75rem; text-align: left; }\n\
pre { background: #f5f5f5; padding: 1rem; overflow-x: auto; }\n\
.chart { display: flex; align-items: center; gap: 2rem; }\n\
.legend { list-style: none; padding: 0; }\n\
.legend li { margin: 0.25rem 0; }\n\
.swatch { display: inline-block; width: 0.8rem; height: 0.8rem; margin-right: 0.5rem; }\n\
.empty { color: #666; }\n";

/// Render the dashboard page for the most recent run, or an explicit empty state
/// when the experiment has no recorded runs.
pub fn render_index(
	experiment: &str,
	record: Option<&RunRecord>,
	preview: Option<&ArtifactPreview>,
) -> String {
	let mut html = String::new();
	html.push_str("<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
	html.push_str(&format!(
		"<title>holystone — {}</title>\n",
		escape(experiment)
	));
	html.push_str("<style>\n");
	html.push_str(STYLE);
	html.push_str("</style>\n</head>\n<body>\n");
	html.push_str(&format!("<h1>Latest run — {}</h1>\n", escape(experiment)));
	match record {
		None => {
			html.push_str(
				"<p class=\"empty\">No runs have been recorded for this experiment yet. \
				 Run <code>holystone process</code> first.</p>\n",
			);
		}
		Some(record) => render_record(&mut html, record, preview),
	}
	html.push_str("</body>\n</html>\n");
	html
}

fn render_record(html: &mut String, record: &RunRecord, preview: Option<&ArtifactPreview>) {
	html.push_str(&format!(
		"<p>Run <code>{}</code>, started {}.</p>\n",
		record.id,
		record.start_time.to_rfc3339(),
	));

	let metric = |key: &str| record.metrics.get(key).copied().unwrap_or(0.0);
	let slices = [
		("Train", metric("train_size"), TRAIN_COLOR),
		("Validation", metric("validation_size"), VALIDATION_COLOR),
		("Test", metric("test_size"), TEST_COLOR),
	];
	let total: f64 = slices.iter().map(|(_, value, _)| value).sum();
	html.push_str("<h2>Partition sizes</h2>\n");
	if total > 0.0 {
		html.push_str("<div class=\"chart\">\n");
		html.push_str(&pie_chart(&slices, total));
		html.push_str("<ul class=\"legend\">\n");
		for (label, value, color) in slices.iter() {
			html.push_str(&format!(
				"<li><span class=\"swatch\" style=\"background:{}\"></span>{} — {} ({:.1}%)</li>\n",
				color,
				label,
				*value as u64,
				100.0 * value / total,
			));
		}
		html.push_str("</ul>\n</div>\n");
	} else {
		html.push_str("<p class=\"empty\">The run recorded no partition sizes.</p>\n");
	}

	if let Some(preview) = preview {
		html.push_str(&format!(
			"<h2>Cleaned table — first rows of <code>{}</code></h2>\n",
			escape(&preview.file_name),
		));
		html.push_str("<table>\n<tr>");
		for column_name in preview.header.iter() {
			html.push_str(&format!("<th>{}</th>", escape(column_name)));
		}
		html.push_str("</tr>\n");
		for row in preview.rows.iter() {
			html.push_str("<tr>");
			for cell in row.iter() {
				html.push_str(&format!("<td>{}</td>", escape(cell)));
			}
			html.push_str("</tr>\n");
		}
		html.push_str("</table>\n");
	}

	html.push_str("<h2>Parameters</h2>\n<pre>");
	let params_json = serde_json::to_string_pretty(&record.params).unwrap_or_default();
	html.push_str(&escape(&params_json));
	html.push_str("</pre>\n");

	html.push_str("<h2>Metrics</h2>\n<table>\n<tr><th>metric</th><th>value</th></tr>\n");
	for (key, value) in record.metrics.iter() {
		html.push_str(&format!(
			"<tr><td>{}</td><td>{}</td></tr>\n",
			escape(key),
			value,
		));
	}
	html.push_str("</table>\n");

	if !record.artifacts.is_empty() {
		html.push_str("<h2>Artifacts</h2>\n<ul>\n");
		for artifact in record.artifacts.iter() {
			html.push_str(&format!("<li><code>{}</code></li>\n", escape(artifact)));
		}
		html.push_str("</ul>\n");
	}
}

fn pie_chart(slices: &[(&str, f64, &str)], total: f64) -> String {
	const CX: f64 = 100.0;
	const CY: f64 = 100.0;
	const R: f64 = 90.0;
	let tau = 2.0 * std::f64::consts::PI;
	let mut svg = String::from(
		"<svg width=\"200\" height=\"200\" viewBox=\"0 0 200 200\" role=\"img\">\n",
	);
	// Start at twelve o'clock and go clockwise.
	let mut start = -0.25 * tau;
	for (label, value, color) in slices {
		if *value <= 0.0 {
			continue;
		}
		let fraction = value / total;
		if fraction >= 0.9999 {
			svg.push_str(&format!(
				"<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{}\"><title>{}</title></circle>\n",
				CX, CY, R, color, label,
			));
			break;
		}
		let end = start + fraction * tau;
		let (x1, y1) = (CX + R * start.cos(), CY + R * start.sin());
		let (x2, y2) = (CX + R * end.cos(), CY + R * end.sin());
		let large_arc = if fraction > 0.5 { 1 } else { 0 };
		svg.push_str(&format!(
			"<path d=\"M {:.2} {:.2} L {:.2} {:.2} A {:.2} {:.2} 0 {} 1 {:.2} {:.2} Z\" \
			 fill=\"{}\"><title>{} — {:.1}%</title></path>\n",
			CX,
			CY,
			x1,
			y1,
			R,
			R,
			large_arc,
			x2,
			y2,
			color,
			label,
			100.0 * fraction,
		));
		start = end;
	}
	svg.push_str("</svg>\n");
	svg
}

fn escape(value: &str) -> String {
	let mut escaped = String::with_capacity(value.len());
	for c in value.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			_ => escaped.push(c),
		}
	}
	escaped
}

#[cfg(test)]
mod test {
	use super::*;
	use chrono::Utc;
	use holystone_util::id::Id;
	use std::collections::BTreeMap;

	fn test_record() -> RunRecord {
		let mut params = BTreeMap::new();
		params.insert("impute_Age".to_owned(), "median".to_owned());
		let mut metrics = BTreeMap::new();
		metrics.insert("train_size".to_owned(), 8.0);
		metrics.insert("validation_size".to_owned(), 0.0);
		metrics.insert("test_size".to_owned(), 2.0);
		RunRecord {
			id: Id::new(),
			experiment: "passenger_survival".to_owned(),
			start_time: Utc::now(),
			end_time: Some(Utc::now()),
			params,
			metrics,
			artifacts: vec!["cleaned.csv".to_owned()],
		}
	}

	#[test]
	fn test_render_record() {
		let record = test_record();
		let html = render_index("passenger_survival", Some(&record), None);
		assert!(html.contains("<svg"));
		// Two slices: the zero-sized validation partition draws nothing.
		assert_eq!(html.matches("<path").count(), 2);
		assert!(html.contains("Train — 8 (80.0%)"));
		assert!(html.contains("Validation — 0 (0.0%)"));
		assert!(html.contains("impute_Age"));
		assert!(html.contains("cleaned.csv"));
		assert!(html.contains(&record.id.to_string()));
	}

	#[test]
	fn test_render_empty_state() {
		let html = render_index("passenger_survival", None, None);
		assert!(html.contains("No runs have been recorded"));
		assert!(!html.contains("<svg"));
	}

	#[test]
	fn test_render_preview_table() {
		let record = test_record();
		let preview = ArtifactPreview {
			file_name: "cleaned.csv".to_owned(),
			header: vec!["Age".to_owned(), "Fare".to_owned()],
			rows: vec![
				vec!["-0.5".to_owned(), "0.3".to_owned()],
				vec!["1.2".to_owned(), "-0.7".to_owned()],
			],
		};
		let html = render_index("passenger_survival", Some(&record), Some(&preview));
		assert!(html.contains("first rows of <code>cleaned.csv</code>"));
		assert!(html.contains("<th>Age</th><th>Fare</th>"));
		assert!(html.contains("<td>-0.5</td><td>0.3</td>"));
	}

	#[test]
	fn test_render_single_partition_draws_circle() {
		let mut record = test_record();
		record.metrics.insert("validation_size".to_owned(), 0.0);
		record.metrics.insert("test_size".to_owned(), 0.0);
		let html = render_index("passenger_survival", Some(&record), None);
		assert!(html.contains("<circle"));
		assert_eq!(html.matches("<path").count(), 0);
	}

	#[test]
	fn test_escapes_markup() {
		let mut record = test_record();
		record
			.params
			.insert("note".to_owned(), "<script>alert(1)</script>".to_owned());
		let html = render_index("passenger_survival", Some(&record), None);
		assert!(!html.contains("<script>"));
		assert!(html.contains("&lt;script&gt;"));
	}
}
