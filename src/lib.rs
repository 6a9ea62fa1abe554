#![allow(non_snake_case)]

pub mod config;
pub mod data_model;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod retry;
pub mod service;
pub mod utils;
pub mod worker_logic;

pub use error::{CaptionError, Result};
pub use events::{RunSummary, WorkerEvent};
pub use worker_logic::TaskQueueWorker;
