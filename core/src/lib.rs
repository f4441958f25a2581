//! Core library for the nutrisnap nutrition tracker.
//!
//! [`models`] holds the record shapes and the validation step applied to
//! incoming payloads, [`nutrition`] the derived display values, and
//! [`storage`] / [`db`] the persistence contract with its in-memory and
//! `SQLite` backends.

pub mod db;
pub mod models;
pub mod nutrition;
pub mod storage;
