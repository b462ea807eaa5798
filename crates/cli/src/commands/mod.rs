pub(crate) mod forms;
pub(crate) mod history;
pub(crate) mod sessions;
pub(crate) mod translate;

use formtrans_history::JsonlHistoryStore;
use formtrans_schema::FileRegistry;

use crate::settings::Settings;

pub(crate) fn open_registry(settings: &Settings) -> FileRegistry {
    FileRegistry::new(&settings.registry.path)
}

pub(crate) async fn open_history(settings: &Settings) -> Result<JsonlHistoryStore, String> {
    JsonlHistoryStore::open(&settings.history.path)
        .await
        .map_err(|e| e.to_string())
}
