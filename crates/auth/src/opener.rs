use consolectl_types::{ConsoleError, Result};

/// Sends the user to the authorization URL.
pub trait UrlOpener: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the URL could not be handed to a browser. The
    /// caller then prints it for the user to open by hand.
    fn open(&self, url: &str) -> Result<()>;
}

/// The platform's default browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) -> Result<()> {
        open::that(url)
            .map_err(|e| ConsoleError::InteractiveLogin(format!("failed to launch browser: {e}")))
    }
}

impl<F> UrlOpener for F
where
    F: Fn(&str) -> Result<()> + Send + Sync,
{
    fn open(&self, url: &str) -> Result<()> {
        self(url)
    }
}

/// Open `url`, falling back to printing it.
pub(crate) fn launch(opener: &dyn UrlOpener, url: &str) {
    eprintln!("Opening browser to log in: {url}");
    if let Err(e) = opener.open(url) {
        tracing::warn!(error = %e, "could not open a browser");
        eprintln!("Please open the following URL manually to complete login:");
        eprintln!("{url}");
    }
}
