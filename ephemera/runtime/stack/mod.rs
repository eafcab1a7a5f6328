mod roots;

pub use roots::{RootId, RootSet};
