pub(crate) const SHELL: &str = "#shell";
pub(crate) const FEED: &str = "#feed";
pub(crate) const TOAST_STACK: &str = "#toast-stack";
