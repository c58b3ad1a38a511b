//! OLE DB provider.
//!
//! OLE DB itself is a COM interface with no portable client. The providers
//! operators point this tool at (SQLOLEDB, SQLNCLI, MSOLEDBSQL) all speak TDS
//! to SQL Server, so their connection strings are rewritten and opened over
//! the same TDS client as the SqlClient provider.

use crate::config::ProviderKind;
use crate::db::connection_string::oledb_to_ado;
use crate::db::sqlclient::open_tds;
use crate::db::{Connection, ProviderAdapter};
use crate::error::Result;
use async_trait::async_trait;
use tracing::debug;

/// OLE DB provider (`-type OleDb`).
#[derive(Debug, Default)]
pub struct OleDbProvider;

impl OleDbProvider {
    /// Creates a new OLE DB provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl ProviderAdapter for OleDbProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OleDb
    }

    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        let ado = oledb_to_ado(connection_string)?;
        debug!("Opening OLE DB connection over TDS");
        let connection = open_tds(&ado).await?;
        Ok(Box::new(connection))
    }
}
