// src/handlers/mod.rs

pub mod exams;
pub mod sessions;
