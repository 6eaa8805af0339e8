//! Device info fields and screen detection.

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    fields::{encode_field_names, Screen},
    session::SniClient,
};

impl SniClient {
    /// Values for the known names in `names`, in request order.
    pub async fn get_fields<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<String>> {
        let uri = self.require_session()?;
        let fields = encode_field_names(names);
        if fields.is_empty() {
            return Err(Error::NoValidFields);
        }
        debug!("fetch {} field(s) from {uri}", fields.len());
        self.inner
            .backend
            .fetch_fields(&uri, fields)
            .await
            .map_err(Error::rpc("FetchFields"))
    }

    /// Whether the device sits in its menu or runs a game. Falls back to
    /// `Menu` on any failure, since reset actions are gated on this.
    pub async fn current_screen(&self) -> Screen {
        match self.get_fields(&["RomFileName"]).await {
            Ok(values) => match values.first() {
                Some(rom) => Screen::classify(rom),
                None => {
                    warn!("current screen: device returned no RomFileName");
                    Screen::Menu
                }
            },
            Err(err) => {
                warn!("current screen: {err}");
                Screen::Menu
            }
        }
    }
}
