pub mod actions;
pub mod clock;
pub mod config;
pub mod conversation;
pub mod error;
pub mod history;
pub mod observation;
pub mod parser;
pub mod reducer;
pub mod state;

pub use actions::*;
pub use clock::*;
pub use config::*;
pub use conversation::*;
pub use error::*;
pub use history::*;
pub use observation::*;
pub use parser::*;
pub use reducer::*;
pub use state::*;
