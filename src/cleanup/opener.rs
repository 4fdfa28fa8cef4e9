use anyhow::{Result, anyhow};
use log::debug;

/// Receives unsubscribe links after a sender's mail has been deleted.
pub trait LinkOpener {
    fn open(&mut self, link: &str) -> Result<()>;
}

/// Opens links in the system browser.
pub struct BrowserOpener;

impl LinkOpener for BrowserOpener {
    fn open(&mut self, link: &str) -> Result<()> {
        debug!("opening {link} in browser");
        open::that(link).map_err(|e| anyhow!("could not open {link}: {e}"))?;
        println!("Please check your browser for the unsubscribe page.");
        Ok(())
    }
}

/// Prints links for the user to follow by hand.
pub struct PrintOpener;

impl LinkOpener for PrintOpener {
    fn open(&mut self, link: &str) -> Result<()> {
        println!("Unsubscribe here: {link}");
        Ok(())
    }
}
