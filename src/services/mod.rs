// src/services/mod.rs

pub mod clock;
pub mod locks;
pub mod review;
pub mod scoring;
pub mod session_service;

pub use session_service::ExamSessionService;
