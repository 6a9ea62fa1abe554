// src/pipeline/mod.rs

pub mod readers;
pub mod writers;
