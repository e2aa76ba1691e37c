//! egui screens for the gear reviews client.

pub mod app;

pub use app::GearReviewsApp;
