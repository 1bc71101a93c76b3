pub(crate) mod analytics_cache;
pub(crate) mod evaluations;
pub(crate) mod questions;
pub(crate) mod submissions;
