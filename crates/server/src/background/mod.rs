//! Background tasks that run alongside ingestion.

pub mod retention;
