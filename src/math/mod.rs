pub mod fixed_point;
pub mod full_math;
pub mod utils;
