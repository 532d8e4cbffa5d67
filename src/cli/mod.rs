pub mod report;
pub mod setup;
pub mod ui;

pub use report::OutputFormat;
