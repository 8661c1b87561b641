pub mod placements;
pub mod privacy;
pub mod targeting;
