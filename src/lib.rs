pub mod app;
pub mod config;
pub mod error;
pub mod export;
pub mod live;
pub mod pose;
pub mod render;
pub mod tracker;
pub mod video;

#[cfg(test)]
pub(crate) mod test_support;
