pub mod azure;
pub mod backend;
pub mod content_type;
pub mod migrate;
pub mod s3;
pub mod selector;

mod signing;
