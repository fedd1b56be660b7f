use std::sync::Arc;

use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::queries;
use crate::models::{Combo, MenuItem, Resource};
use crate::services::cache::ReferenceCache;

pub const TAG_RESOURCES: &str = "resources";
pub const TAG_COMBOS: &str = "combos";
pub const TAG_MENU: &str = "menu";

/// Reference data lookups, fronted by a [`ReferenceCache`].
#[derive(Clone)]
pub struct Catalog {
    cache: Arc<dyn ReferenceCache>,
}

impl Catalog {
    pub fn new(cache: Arc<dyn ReferenceCache>) -> Self {
        Self { cache }
    }

    pub fn resource(&self, conn: &Connection, id: &str) -> anyhow::Result<Option<Resource>> {
        self.read_through(
            &format!("resource:{id}"),
            |r: &Resource| vec![TAG_RESOURCES.to_string(), format!("location:{}", r.location_id)],
            || queries::get_resource(conn, id),
        )
    }

    pub fn combo(&self, conn: &Connection, id: &str) -> anyhow::Result<Option<Combo>> {
        self.read_through(
            &format!("combo:{id}"),
            |_: &Combo| vec![TAG_COMBOS.to_string()],
            || queries::get_combo(conn, id),
        )
    }

    pub fn menu_item(&self, conn: &Connection, id: &str) -> anyhow::Result<Option<MenuItem>> {
        self.read_through(
            &format!("menu:{id}"),
            |_: &MenuItem| vec![TAG_MENU.to_string()],
            || queries::get_menu_item(conn, id),
        )
    }

    pub fn invalidate(&self, tag: &str) -> usize {
        let dropped = self.cache.invalidate_tag(tag);
        tracing::info!(tag, dropped, "catalog cache invalidated");
        dropped
    }

    fn read_through<T, F, L>(&self, key: &str, tags: F, load: L) -> anyhow::Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: Fn(&T) -> Vec<String>,
        L: FnOnce() -> anyhow::Result<Option<T>>,
    {
        if let Some(hit) = self.cache.get(key) {
            match serde_json::from_value(hit) {
                Ok(value) => return Ok(Some(value)),
                Err(e) => tracing::warn!(key, error = %e, "discarding unreadable cache entry"),
            }
        }

        let loaded = load()?;
        if let Some(value) = &loaded {
            let tags = tags(value);
            let tag_refs: Vec<&str> = tags.iter().map(String::as_str).collect();
            self.cache.set(key, serde_json::to_value(value)?, &tag_refs);
        }
        Ok(loaded)
    }
}
