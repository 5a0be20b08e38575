use crate::error::SessionError;
use crate::results::PageData;
use std::future::Future;
use url::Url;

/// Base trait for anything that can turn a URL into a visited page
pub trait Fetcher: Send + Sync {
    /// Make sure the backing renderer is usable before a traversal starts
    ///
    /// Failing here aborts the whole request rather than every page.
    fn prepare(&self) -> impl Future<Output = Result<(), SessionError>> + Send {
        async { Ok(()) }
    }

    /// Visit `url` and extract it
    ///
    /// Never fails: problems are recorded in the returned page's `error`.
    fn fetch(&self, url: &Url) -> impl Future<Output = PageData> + Send;
}
