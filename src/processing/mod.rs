pub mod csv_writer;
pub mod export;
pub mod flux;
pub mod summary;
