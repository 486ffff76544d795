pub mod logging;

pub use logging::{format_duration, format_time, truncate_text};
