//! Alarms and events raised by the engine, one page at a time.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::api::InventoryApi;
use crate::engine::Engine;
use crate::paging::{Alarm, Event, ListFilter, Page, PageState};

pub struct Monitoring {
    inventory: Arc<dyn InventoryApi>,
    engine: Arc<Engine>,
}

impl Monitoring {
    pub fn new(inventory: Arc<dyn InventoryApi>, engine: Arc<Engine>) -> Self {
        Self { inventory, engine }
    }

    fn filter(&self, state: &PageState) -> Result<ListFilter> {
        let source = self
            .engine
            .engine_id()
            .context("resolve engine managed object")?
            .context("Analytics Engine is currently not started. Try again later ...")?;
        Ok(ListFilter {
            source_id: Some(source),
            ..state.to_filter()
        })
    }

    pub fn alarms(&self, state: &PageState) -> Result<Page<Alarm>> {
        let filter = self.filter(state)?;
        self.inventory.list_alarms(&filter)
    }

    pub fn events(&self, state: &PageState) -> Result<Page<Event>> {
        let filter = self.filter(state)?;
        self.inventory.list_events(&filter)
    }
}
