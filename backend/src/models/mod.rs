pub mod historic;
pub mod occupancy;
pub mod requests;
pub mod time;

pub use historic::*;
pub use occupancy::*;
pub use requests::*;
pub use time::*;
