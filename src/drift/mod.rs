mod detector;
mod report;

pub use detector::compare;
pub use report::DriftReport;
