pub mod console;
pub mod diagnostics;
pub mod json;

pub use diagnostics::{diagnose, Category, Diagnostics, ReportHeader, ReportPaths};
