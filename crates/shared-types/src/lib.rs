pub mod error;
pub mod feature_flags;

pub mod analysis;
pub mod case;
pub mod common;
pub mod document;
pub mod history;
pub mod subscription;
pub mod user;

pub use error::*;
pub use feature_flags::*;

pub use analysis::*;
pub use case::*;
pub use common::*;
pub use document::*;
pub use history::*;
pub use subscription::*;
pub use user::*;
