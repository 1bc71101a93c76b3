pub(crate) mod analytics;
pub(crate) mod inference;
pub(crate) mod provider;
pub(crate) mod translate;
