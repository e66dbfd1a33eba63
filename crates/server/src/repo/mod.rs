pub mod analysis;
pub mod case;
pub mod document;
pub mod history;
pub mod subscription;
pub mod user;
