// Asset register
pub mod asset_number;
pub mod assets;
pub mod csv;

// People and reference data
pub mod employees;
pub mod lookups;
pub mod users;

// Audit and lending workflows
pub mod check_outs;
pub mod so_sessions;
