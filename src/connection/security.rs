//! Hosting page security context and mixed-content remediation

use serde::Serialize;
use url::Url;

use crate::{Result, TimingError};

/// Read-only view of the transport security of the page hosting the client.
///
/// Consulted before every connect: a page served over an encrypted origin
/// cannot open the bridge's plain `ws://` stream.
pub trait SecurityContext: Send + Sync {
    /// Whether the hosting page was loaded over an encrypted origin.
    fn is_secure_origin(&self) -> bool;

    /// URL of the hosting page, when known.
    fn page_url(&self) -> Option<Url> {
        None
    }
}

/// Security context derived from the hosting page URL.
///
/// A context without a page (a native client) is never secure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    url: Option<Url>,
}

impl PageContext {
    /// Context for a client that is not hosted in a page.
    pub fn native() -> Self {
        Self::default()
    }

    pub fn from_url(url: Url) -> Self {
        Self { url: Some(url) }
    }

    pub fn parse(page_url: &str) -> Result<Self> {
        let url = Url::parse(page_url)
            .map_err(|e| TimingError::config(format!("invalid page_url '{page_url}': {e}")))?;
        Ok(Self::from_url(url))
    }
}

impl SecurityContext for PageContext {
    fn is_secure_origin(&self) -> bool {
        self.url.as_ref().is_some_and(|url| url.scheme().eq_ignore_ascii_case("https"))
    }

    fn page_url(&self) -> Option<Url> {
        self.url.clone()
    }
}

/// Action offered to the user alongside an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Remediation {
    pub label: String,

    /// Where following the action leads, when known
    pub target: Option<Url>,
}

impl Remediation {
    /// Reload the hosting page over plain HTTP.
    pub fn switch_to_insecure(page: Option<&Url>) -> Self {
        let target = page.and_then(|url| {
            let mut insecure = url.clone();
            insecure.set_scheme("http").ok()?;
            Some(insecure)
        });

        Self { label: "Switch to HTTP".to_string(), target }
    }
}
