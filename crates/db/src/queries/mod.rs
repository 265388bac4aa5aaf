pub mod alerts;
pub mod history;
pub mod metrics;
pub mod preferences;
pub mod tracked_urls;
