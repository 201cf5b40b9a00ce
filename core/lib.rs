/*!
This crate implements the cleaning pipeline for the passenger survival table: load,
impute, encode, drop, trim outliers, standardize, then a stratified
train/validation/test split. The [`process`](process/fn.process.html) function runs
the whole pipeline and returns the cleaned dataframe, the partitions, and a summary
of parameters and metrics for the tracking store.
*/

pub mod clean;
pub mod config;
pub mod process;
pub mod progress;
pub mod split;
pub mod stats;

pub use self::process::{process, ProcessOutput, RunSummary};
pub use self::progress::Progress;
