pub(crate) mod evaluate;
pub(crate) mod scheduler;
