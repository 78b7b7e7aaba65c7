// Page object for the global popup menu widget.

use super::{
    escape_xpath_literal, wait_until_present, ElementError, ElementRef, Selector, WAIT_TIMEOUT,
};

/// Selector of the topmost popup element.
pub const POPUP_MENU_XPATH: &str = r#"//ul[contains(@class, "menu-popup-top")]"#;

const TITLE_XPATH: &str = ".//h3";
const ITEM_XPATH: &str = "./li/a";
const NESTED_MENU_CLASS: &str = "menu-popup";

/// Labels to follow through a (possibly nested) popup menu.
pub struct MenuPath<'a>(Vec<&'a str>);

impl<'a> From<&'a str> for MenuPath<'a> {
    fn from(label: &'a str) -> Self {
        MenuPath(vec![label])
    }
}

impl<'a> From<&'a [&'a str]> for MenuPath<'a> {
    fn from(labels: &'a [&'a str]) -> Self {
        MenuPath(labels.to_vec())
    }
}

impl<'a, const N: usize> From<[&'a str; N]> for MenuPath<'a> {
    fn from(labels: [&'a str; N]) -> Self {
        MenuPath(labels.to_vec())
    }
}

impl<'a> From<Vec<&'a str>> for MenuPath<'a> {
    fn from(labels: Vec<&'a str>) -> Self {
        MenuPath(labels)
    }
}

/// The global popup menu. A thin facade over the element handle; holds no
/// other state.
#[derive(Clone, Debug)]
pub struct PopupMenuElement {
    element: ElementRef,
}

impl PopupMenuElement {
    /// Locate the topmost popup on the page, waiting for it to appear.
    pub async fn find(page: &ElementRef) -> Result<Self, ElementError> {
        let element = wait_until_present(page, &Selector::xpath(POPUP_MENU_XPATH)).await?;
        Ok(Self { element })
    }

    pub fn from_element(element: ElementRef) -> Self {
        Self { element }
    }

    /// Popup titles as text, in document order.
    pub async fn titles(&self) -> Result<Vec<String>, ElementError> {
        let mut titles = Vec::new();
        for heading in self.element.find_all(&Selector::xpath(TITLE_XPATH)).await? {
            titles.push(heading.text().await?);
        }
        Ok(titles)
    }

    /// Clickable menu items, in document order.
    pub async fn items(&self) -> Result<Vec<ElementRef>, ElementError> {
        self.element.find_all(&Selector::xpath(ITEM_XPATH)).await
    }

    /// Whether some item's text contains `text` (case-sensitive substring).
    pub async fn has_item(&self, text: &str) -> Result<bool, ElementError> {
        for item in self.items().await? {
            if item.text().await?.contains(text) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Click through `path`, descending into the nested popup that appears
    /// under the clicked item after each non-final label. Labels match item
    /// text exactly; a missing item is a hard failure.
    pub async fn select<'a, P: Into<MenuPath<'a>>>(&self, path: P) -> Result<&Self, ElementError> {
        let labels = path.into().0;
        let mut current = self.clone();

        for (i, label) in labels.iter().enumerate() {
            let selector = Selector::xpath(format!(
                "./li/a[text()={}]",
                escape_xpath_literal(label)
            ));
            let item = current
                .element
                .find_all(&selector)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| ElementError::MenuItemNotFound(label.to_string()))?;

            item.click().await?;

            if i + 1 < labels.len() {
                current = PopupMenuElement {
                    element: nested_menu_of(&item).await?,
                };
            }
        }

        Ok(self)
    }

    /// Alias for `select`.
    pub async fn fill<'a, P: Into<MenuPath<'a>>>(&self, path: P) -> Result<&Self, ElementError> {
        self.select(path).await
    }
}

/// Wait for the nested popup revealed by clicking `item`, searching the
/// item's ancestry nearest-first.
async fn nested_menu_of(item: &ElementRef) -> Result<ElementRef, ElementError> {
    let selector = Selector::class(NESTED_MENU_CLASS);
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;

    loop {
        let mut ancestor = item.parent().await?;
        while let Some(scope) = ancestor {
            if let Some(menu) = scope.find_all(&selector).await?.into_iter().next() {
                return Ok(menu);
            }
            ancestor = scope.parent().await?;
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(ElementError::WaitTimeout(selector.to_string()));
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
}
