pub mod document;
pub mod enums;
pub mod owner;

pub use document::*;
pub use enums::*;
pub use owner::*;
