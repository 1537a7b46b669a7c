//! Abstract screening pipeline for systematic reviews.
//!
//! Screens research-article abstracts against reviewer-defined inclusion
//! criteria via an external LLM completion service, driven by stateless
//! invocations coordinated entirely through SQLite.

pub mod api;
pub mod config;
pub mod db;
pub mod llm;
pub mod pipeline;
