use holystone_util::progress_counter::ProgressCounter;

/// The stages of a processing run, in the order they happen. The byte counter in
/// `Loading` tracks progress through the csv file.
#[derive(Clone, Debug)]
pub enum Progress {
	Loading(ProgressCounter),
	Cleaning(CleanStep),
	ComputingStats,
	Splitting,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CleanStep {
	Impute,
	Encode,
	DropColumns,
	TrimOutliers,
	Standardize,
}

impl std::fmt::Display for CleanStep {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			CleanStep::Impute => write!(f, "imputing missing values"),
			CleanStep::Encode => write!(f, "encoding categorical columns"),
			CleanStep::DropColumns => write!(f, "dropping columns"),
			CleanStep::TrimOutliers => write!(f, "trimming outliers"),
			CleanStep::Standardize => write!(f, "standardizing columns"),
		}
	}
}
