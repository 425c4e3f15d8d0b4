pub mod settings;

pub use chrono;
