pub mod browse;
pub mod health;
pub mod items;
pub mod libraries;
pub mod scan;
pub mod stream;
pub mod thumbs;
