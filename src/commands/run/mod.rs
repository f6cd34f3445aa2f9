mod catalog;
mod import;
mod pipeline;
mod provision;
mod report;
mod run;
mod schema;
mod script;

pub use run::run;
pub(crate) use pipeline::table_counts;
