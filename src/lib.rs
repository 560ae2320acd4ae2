// src/lib.rs

//! News archive scraper library

pub mod engine;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
