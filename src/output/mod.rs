mod console;
pub mod json;

pub use console::{print_check_results, print_report, print_summary, print_threshold_results};
pub use json::{ReportTarget, print_json, write_json};
