mod header;
pub mod utils;

pub use header::draw_header;
