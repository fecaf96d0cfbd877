//! Pure reshaping steps shared by the jobs.

pub mod csv_out;
pub mod identifiers;
pub mod split;
pub mod timezone;

pub use csv_out::{write_csv, write_csv_to};
pub use identifiers::{id_from_uri, uri_segment};
pub use split::{extract_join_rows, split_delimited, unique_tokens, JoinExtraction};
pub use timezone::{convert_timestamp, format_local, parse_utc, to_local};
