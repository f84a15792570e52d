pub mod csv_reader;
pub mod csv_writer;
pub mod percent_diff;
pub mod rate_limiter;
