//! Aggregation engine: declarative fields, categories, histograms

pub mod categories;
pub mod engine;
pub mod fields;
pub mod histogram;

pub use categories::{select_categories, Category, CategoryKind};
pub use engine::{Aggregator, Report};
pub use fields::{fields_for, FieldMode, ReportField};
pub use histogram::{build_histograms, Histogram};
