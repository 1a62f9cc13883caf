pub mod document;
pub mod engine;
pub mod error;
pub mod mutator;
pub mod stream;

pub use document::*;
pub use engine::*;
pub use error::*;
pub use mutator::*;
pub use stream::*;
