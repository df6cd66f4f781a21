use std::fmt;
use std::sync::Arc;

use crate::assets::{AssetResolver, ReferenceTableAssets};
use crate::config::Settings;
use crate::connection::Connection;
use crate::error::Result;
use crate::overlay::{OverlayResolver, ParentPointerOverlays};
use crate::persist::SqliteConnection;
use crate::query::QueryBuilder;

/// The collaborators an entity talks to: the connection, the asset
/// resolver and the overlay resolver.
///
/// Cloning is cheap and every clone shares the same collaborators.
#[derive(Clone)]
pub struct Database {
    connection: Arc<dyn Connection>,
    assets: Arc<dyn AssetResolver>,
    overlays: Arc<dyn OverlayResolver>,
}

impl Database {
    pub fn new(
        connection: Arc<dyn Connection>,
        assets: Arc<dyn AssetResolver>,
        overlays: Arc<dyn OverlayResolver>,
    ) -> Self {
        Self {
            connection,
            assets,
            overlays,
        }
    }
    /// Uses the table-backed asset and overlay resolvers on top of
    /// `connection`.
    pub fn with_connection(connection: Arc<dyn Connection>, settings: &Settings) -> Self {
        let assets = ReferenceTableAssets::new(Arc::clone(&connection), settings.assets.clone());
        let overlays = ParentPointerOverlays::new(Arc::clone(&connection), settings.overlay.clone());
        Self::new(connection, Arc::new(assets), Arc::new(overlays))
    }
    /// Opens the SQLite database the settings point at.
    pub fn open(settings: &Settings) -> Result<Self> {
        let connection = SqliteConnection::open(&settings.database.persistence_mode())?;
        Ok(Self::with_connection(Arc::new(connection), settings))
    }
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }
    pub fn assets(&self) -> &dyn AssetResolver {
        self.assets.as_ref()
    }
    pub fn overlays(&self) -> &dyn OverlayResolver {
        self.overlays.as_ref()
    }
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self.connection())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
