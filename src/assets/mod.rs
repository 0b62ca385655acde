//! Asset classification and admission rules

mod category;
mod filter;

pub use category::AssetCategory;
pub use filter::AssetFilter;
