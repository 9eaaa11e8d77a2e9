pub mod solver;
pub mod sparse;
pub mod stepsize;
pub mod transient;
