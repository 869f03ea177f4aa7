//! Inventory, binary storage and monitoring list endpoints.

use super::*;

use crate::api::InventoryApi;
use crate::model::{EXTENSION_FRAGMENT, Extension};
use crate::paging::{Alarm, Event, ListFilter, Page};

#[derive(serde::Deserialize)]
struct ManagedObject {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedObjectCollection {
    #[serde(default)]
    managed_objects: Vec<ManagedObject>,
}

#[derive(Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    #[serde(default)]
    current_page: Option<u32>,
    #[serde(default)]
    total_pages: Option<u32>,
}

#[derive(serde::Deserialize)]
struct AlarmCollection {
    #[serde(default)]
    alarms: Vec<Alarm>,
    #[serde(default)]
    statistics: Option<Statistics>,
}

#[derive(serde::Deserialize)]
struct EventCollection {
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default)]
    statistics: Option<Statistics>,
}

#[derive(serde::Deserialize)]
struct CreatedBinary {
    id: String,
}

fn page_of<T>(items: Vec<T>, stats: Option<Statistics>, filter: &ListFilter) -> Page<T> {
    let stats = stats.unwrap_or_default();
    Page {
        items,
        current_page: stats.current_page.or(filter.page).unwrap_or(1),
        total_pages: stats.total_pages,
    }
}

impl InventoryApi for PlatformClient {
    fn list_extensions(&self, filter: &ListFilter) -> Result<Vec<Extension>> {
        let mut query = filter.query_pairs();
        query.push(("fragmentType", EXTENSION_FRAGMENT.to_string()));
        if filter.page_size.is_none() {
            query.push(("pageSize", "100".to_string()));
        }
        let resp = self
            .authed(self.client.get(self.url("inventory/managedObjects")))
            .query(&query)
            .send()
            .context("list extensions")?;
        let coll: ManagedObjectCollection = self
            .ensure_ok(resp, "list extensions")?
            .json()
            .context("parse managed objects")?;
        Ok(coll
            .managed_objects
            .into_iter()
            .map(|mo| Extension {
                id: mo.id,
                name: mo.name,
                ..Extension::default()
            })
            .collect())
    }

    fn upload_extension(&self, name: &str, archive: Vec<u8>) -> Result<String> {
        let mut object = serde_json::json!({
            "name": format!("{}.zip", name),
            "type": "application/zip",
        });
        object[EXTENSION_FRAGMENT] = serde_json::Value::String(name.to_string());
        let file = reqwest::blocking::multipart::Part::bytes(archive)
            .file_name(format!("{}.zip", name))
            .mime_str("application/zip")
            .context("archive mime type")?;
        let form = reqwest::blocking::multipart::Form::new()
            .text("object", object.to_string())
            .part("file", file);
        let resp = self
            .authed(self.client.post(self.url("inventory/binaries")))
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .with_context(|| format!("upload extension {}", name))?;
        let created: CreatedBinary = self
            .ensure_ok(resp, "upload extension")?
            .json()
            .context("parse created binary")?;
        Ok(created.id)
    }

    fn delete_extension(&self, id: &str) -> Result<()> {
        let resp = self
            .authed(
                self.client
                    .delete(self.url(&format!("inventory/binaries/{}", id))),
            )
            .send()
            .with_context(|| format!("delete extension {}", id))?;
        self.ensure_ok(resp, "delete extension")?;
        Ok(())
    }

    fn download_extension(&self, id: &str) -> Result<Vec<u8>> {
        let resp = self
            .authed(self.client.get(self.url(&format!("inventory/binaries/{}", id))))
            .send()
            .with_context(|| format!("download extension {}", id))?;
        Ok(self
            .ensure_ok(resp, "download extension")?
            .bytes()
            .context("read extension bytes")?
            .to_vec())
    }

    fn list_alarms(&self, filter: &ListFilter) -> Result<Page<Alarm>> {
        let resp = self
            .authed(self.client.get(self.url("alarm/alarms")))
            .query(&filter.query_pairs())
            .send()
            .context("list alarms")?;
        let coll: AlarmCollection = self
            .ensure_ok(resp, "list alarms")?
            .json()
            .context("parse alarms")?;
        Ok(page_of(coll.alarms, coll.statistics, filter))
    }

    fn list_events(&self, filter: &ListFilter) -> Result<Page<Event>> {
        let resp = self
            .authed(self.client.get(self.url("event/events")))
            .query(&filter.query_pairs())
            .send()
            .context("list events")?;
        let coll: EventCollection = self
            .ensure_ok(resp, "list events")?
            .json()
            .context("parse events")?;
        Ok(page_of(coll.events, coll.statistics, filter))
    }
}
