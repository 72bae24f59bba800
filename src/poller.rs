use crate::checkpoint::PollWindow;
use crate::error::Result;
use crate::models::{Item, ItemKind};
use crate::platform::PlatformApi;
use std::sync::Arc;
use tracing::info;

/// Reduces newly created platform objects to `{name, page}` items.
pub struct ChangePoller {
    platform: Arc<dyn PlatformApi>,
}

impl ChangePoller {
    pub fn new(platform: Arc<dyn PlatformApi>) -> Self {
        Self { platform }
    }

    /// Items of `kind` created in `window`, in API order. Errors propagate.
    pub async fn poll(&self, kind: ItemKind, window: &PollWindow) -> Result<Vec<Item>> {
        let records = self.platform.recent_items(kind, window).await?;
        let items: Vec<Item> = records.iter().map(Item::from_record).collect();
        info!(
            "{} new {} between {} and {}",
            items.len(),
            kind,
            window.start,
            window.end
        );
        Ok(items)
    }
}
