//! Reset commands. Callers check the device's `ResetSystem` / `ResetToMenu`
//! capability first; these only require a session.

use crate::{
    error::{Error, Result},
    session::SniClient,
};

impl SniClient {
    pub async fn reset_system(&self) -> Result<()> {
        let uri = self.require_session()?;
        self.inner
            .backend
            .reset_system(&uri)
            .await
            .map_err(Error::rpc("ResetSystem"))
    }

    pub async fn reset_to_menu(&self) -> Result<()> {
        let uri = self.require_session()?;
        self.inner
            .backend
            .reset_to_menu(&uri)
            .await
            .map_err(Error::rpc("ResetToMenu"))
    }
}
