pub(crate) mod likely;
pub(crate) mod thread_check;
