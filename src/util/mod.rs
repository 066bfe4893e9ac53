mod arc_eq;
pub use arc_eq::{ArcEq};

mod moves;
pub use moves::{moves};
