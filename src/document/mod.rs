pub mod compositor;
pub mod fonts;
pub mod model;
pub mod pdf;
pub mod plan;
