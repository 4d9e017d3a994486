pub mod locator;
pub mod normalize;
pub mod reference;
