pub mod health;
pub mod recommendations;
pub mod search_history;

pub use health::{health_check, home};
pub use recommendations::recommendations_config;
pub use search_history::get_search_history;
