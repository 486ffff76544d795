pub mod credential_loader;
pub mod item_loader;

pub use credential_loader::{extract_credentials, load_credentials};
pub use item_loader::{load_items, parse_json_items, parse_toml_items};
