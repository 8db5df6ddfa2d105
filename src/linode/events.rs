//! Account event log endpoints.

use crate::error::Result;
use crate::provider::OpContext;

use super::client::LinodeClient;
use super::filter::Filter;
use super::types::{Event, Page};

impl LinodeClient {
    /// Lists the first page of events matching `filter`.
    ///
    /// Pollers only need the newest matches, so no further pages are read.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_recent_events(&self, ctx: &OpContext, filter: &Filter) -> Result<Vec<Event>> {
        let page: Page<Event> = self.list_page(ctx, "account/events", Some(filter), 1).await?;
        Ok(page.data)
    }

    /// Gets an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_event(&self, ctx: &OpContext, event_id: i64) -> Result<Event> {
        self.get(ctx, &format!("account/events/{event_id}")).await
    }
}
