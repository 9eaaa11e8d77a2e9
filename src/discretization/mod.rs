pub mod generator;
pub mod mesh;
pub mod subdomain;
