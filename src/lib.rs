//! manualscrape - resumable text extraction from paginated manual viewers.
//!
//! Drives a headless browser through each page of an online manual, pulls
//! the text layer (or OCRs the page image when there is none), and writes
//! one text file per manual. Progress is checkpointed page by page so an
//! interrupted run resumes where it stopped.

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod ocr;
pub mod scrapers;
pub mod services;
pub mod storage;
