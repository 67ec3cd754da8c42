mod store;
mod tables;

pub use store::Store;
pub use tables::TableKind;
