mod data_types;
mod errors;
