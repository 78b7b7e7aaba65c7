// Element-query facade for the e2e test harness.
//
// The harness owns the actual browser-automation backend; page objects in
// this module only need the four operations below. Tests drive them with
// stub DOM implementations.

pub mod popup_menu;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Shared handle to a located element.
pub type ElementRef = Arc<dyn Element>;

/// The two query styles the page objects use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    XPath(String),
    Class(String),
}

impl Selector {
    pub fn xpath(expr: impl Into<String>) -> Self {
        Selector::XPath(expr.into())
    }

    pub fn class(name: impl Into<String>) -> Self {
        Selector::Class(name.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::XPath(expr) => write!(f, "xpath:{}", expr),
            Selector::Class(name) => write!(f, "class:{}", name),
        }
    }
}

#[derive(Debug, Error)]
pub enum ElementError {
    #[error("Failed to find menu item by name: \"{0}\"")]
    MenuItemNotFound(String),

    #[error("Timed out waiting for element: {0}")]
    WaitTimeout(String),

    /// Error surfaced by the underlying automation backend.
    #[error("{0}")]
    Backend(String),
}

/// Minimal element surface required by the page objects.
#[async_trait]
pub trait Element: Send + Sync + fmt::Debug {
    /// All visible matches for `selector`, scoped to this element, in
    /// document order.
    async fn find_all(&self, selector: &Selector) -> Result<Vec<ElementRef>, ElementError>;

    async fn text(&self) -> Result<String, ElementError>;

    async fn click(&self) -> Result<(), ElementError>;

    /// Immediate parent, or None at the document root.
    async fn parent(&self) -> Result<Option<ElementRef>, ElementError>;
}

/// The harness's standard wait timeout.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(10);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Poll `scope` until `selector` yields a match; fail with `WaitTimeout`
/// when the harness's standard wait elapses first.
pub async fn wait_until_present(
    scope: &ElementRef,
    selector: &Selector,
) -> Result<ElementRef, ElementError> {
    wait_until_present_within(scope, selector, WAIT_TIMEOUT).await
}

pub async fn wait_until_present_within(
    scope: &ElementRef,
    selector: &Selector,
    timeout: Duration,
) -> Result<ElementRef, ElementError> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        if let Some(element) = scope.find_all(selector).await?.into_iter().next() {
            return Ok(element);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(ElementError::WaitTimeout(selector.to_string()));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Quote a string as an XPath literal. XPath 1.0 has no escape syntax, so a
/// value containing both quote kinds must be assembled with concat().
pub fn escape_xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }

    let mut parts = Vec::new();
    for (i, chunk) in value.split('\'').enumerate() {
        if i > 0 {
            parts.push("\"'\"".to_string());
        }
        if !chunk.is_empty() {
            parts.push(format!("'{}'", chunk));
        }
    }
    format!("concat({})", parts.join(", "))
}
