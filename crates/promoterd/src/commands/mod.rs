pub mod build;
pub mod dedup;
pub mod run;
