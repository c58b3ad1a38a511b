//! SQL Server provider over TDS.
//!
//! Provides the `SqlClientProvider` that implements the provider traits for
//! SQL Server using tiberius, with ADO.NET-style connection strings. The
//! OLE DB and ODBC providers reuse [`open_tds`] once they have rewritten
//! their connection strings.

use crate::config::ProviderKind;
use crate::db::connection_string::ConnectionString;
use crate::db::{
    before_deadline, with_command_timeout, with_connect_timeout, BufferedResult, Command, Connection,
    ProviderAdapter, ResultSet, Row, RowCursor, Value,
};
use crate::error::{DbTestError, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use tiberius::{Client, ColumnData, Config, FromSql, QueryItem, QueryStream};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server provider (`-type SqlClient`).
#[derive(Debug, Default)]
pub struct SqlClientProvider;

impl SqlClientProvider {
    /// Creates a new SQL Server provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl ProviderAdapter for SqlClientProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::SqlClient
    }

    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        let connection = open_tds(connection_string).await?;
        Ok(Box::new(connection))
    }
}

/// Opens a TDS connection from an ADO.NET connection string.
pub(crate) async fn open_tds(connection_string: &str) -> Result<TdsConnection> {
    let parsed = ConnectionString::parse(connection_string)?;
    let connect_timeout = parsed.connect_timeout()?;

    let config = Config::from_ado_string(connection_string)
        .map_err(|e| DbTestError::connection_with("Invalid connection string.", e))?;

    let addr = config.get_addr();
    debug!("Connecting to {}", addr);

    let client = with_connect_timeout(connect_timeout, async {
        let tcp = TcpStream::connect(addr.as_str())
            .await
            .map_err(|e| DbTestError::connection_with(format!("Cannot connect to {addr}."), e))?;
        tcp.set_nodelay(true)
            .map_err(|e| DbTestError::connection_with("Failed to configure the socket.", e))?;

        Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| map_connection_error(e, &addr))
    })
    .await?;

    Ok(TdsConnection { client })
}

/// An open TDS connection.
pub(crate) struct TdsConnection {
    client: TdsClient,
}

#[async_trait(?Send)]
impl Connection for TdsConnection {
    async fn execute_non_query(&mut self, command: &Command) -> Result<()> {
        let client = &mut self.client;
        with_command_timeout(command.timeout, async {
            let result = client
                .execute(command.text.clone(), &[])
                .await
                .map_err(map_command_error)?;
            debug!("{} rows affected", result.total());
            Ok(())
        })
        .await
    }

    async fn execute_reader<'a>(&'a mut self, command: &Command) -> Result<Box<dyn RowCursor + 'a>> {
        let client = &mut self.client;
        let text = command.text.clone();
        let deadline = command.deadline();
        let stream = before_deadline(deadline, async move {
            client
                .simple_query(text)
                .await
                .map_err(map_command_error)
        })
        .await?;
        Ok(Box::new(TdsCursor {
            stream,
            deadline,
            exhausted: false,
        }))
    }

    async fn fill_buffered(&mut self, command: &Command) -> Result<BufferedResult> {
        let client = &mut self.client;
        with_command_timeout(command.timeout, async {
            let mut stream = client
                .simple_query(command.text.clone())
                .await
                .map_err(map_command_error)?;

            let mut result_sets: Vec<ResultSet> = Vec::new();
            while let Some(item) = stream.try_next().await.map_err(map_command_error)? {
                match item {
                    QueryItem::Metadata(meta) => {
                        let columns = meta.columns().iter().map(|c| c.name().to_string()).collect();
                        result_sets.push(ResultSet::new(columns));
                    }
                    QueryItem::Row(row) => {
                        let values: Row = row.into_iter().map(convert_value).collect();
                        match result_sets.last_mut() {
                            Some(set) => set.rows.push(values),
                            None => {
                                return Err(DbTestError::internal(
                                    "Row received before result metadata.",
                                ))
                            }
                        }
                    }
                }
            }
            Ok(BufferedResult::new(result_sets))
        })
        .await
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client
            .close()
            .await
            .map_err(|e| DbTestError::connection_with("Failed to close the connection.", e))
    }
}

/// Forward-only reader over a TDS result stream.
struct TdsCursor<'a> {
    stream: QueryStream<'a>,
    /// The command timeout covers the drain as well as the first packet.
    deadline: Option<Instant>,
    exhausted: bool,
}

#[async_trait(?Send)]
impl RowCursor for TdsCursor<'_> {
    async fn advance(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let stream = &mut self.stream;
        while let Some(item) = before_deadline(self.deadline, async {
            stream.try_next().await.map_err(map_command_error)
        })
        .await?
        {
            if let QueryItem::Row(row) = item {
                if row.result_index() == 0 {
                    return Ok(true);
                }
            }
            // Later result sets are drained without being counted
        }
        self.exhausted = true;
        Ok(false)
    }
}

/// Converts a TDS column value into a display-ready value.
fn convert_value(data: ColumnData<'static>) -> Value {
    match data {
        ColumnData::U8(v) => v.map(i64::from).into(),
        ColumnData::I16(v) => v.map(i64::from).into(),
        ColumnData::I32(v) => v.map(i64::from).into(),
        ColumnData::I64(v) => v.into(),
        ColumnData::F32(v) => v.map(f64::from).into(),
        ColumnData::F64(v) => v.into(),
        ColumnData::Bit(v) => v.into(),
        ColumnData::String(v) => v.map(|s| s.into_owned()).into(),
        ColumnData::Guid(v) => v.map(|g| g.to_string()).into(),
        ColumnData::Binary(v) => v.map(|b| b.into_owned()).into(),
        ColumnData::Numeric(v) => v.map(|n| n.to_string()).into(),
        ColumnData::Xml(v) => v.map(|x| x.into_owned().into_string()).into(),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            temporal::<chrono::NaiveDateTime>(&data, "%Y-%m-%d %H:%M:%S%.f")
        }
        ColumnData::Date(_) => temporal::<chrono::NaiveDate>(&data, "%Y-%m-%d"),
        ColumnData::Time(_) => temporal::<chrono::NaiveTime>(&data, "%H:%M:%S%.f"),
        ColumnData::DateTimeOffset(_) => {
            temporal::<chrono::DateTime<chrono::FixedOffset>>(&data, "%Y-%m-%d %H:%M:%S%.f %:z")
        }
    }
}

fn temporal<'a, T>(data: &'a ColumnData<'static>, format: &str) -> Value
where
    T: FromSql<'a> + FormatTemporal,
{
    match T::from_sql(data) {
        Ok(Some(value)) => Value::String(value.format_with(format)),
        Ok(None) => Value::Null,
        Err(e) => Value::String(format!("<{e}>")),
    }
}

/// chrono types that render with a format string.
trait FormatTemporal {
    fn format_with(&self, format: &str) -> String;
}

impl FormatTemporal for chrono::NaiveDateTime {
    fn format_with(&self, format: &str) -> String {
        self.format(format).to_string()
    }
}

impl FormatTemporal for chrono::NaiveDate {
    fn format_with(&self, format: &str) -> String {
        self.format(format).to_string()
    }
}

impl FormatTemporal for chrono::NaiveTime {
    fn format_with(&self, format: &str) -> String {
        self.format(format).to_string()
    }
}

impl FormatTemporal for chrono::DateTime<chrono::FixedOffset> {
    fn format_with(&self, format: &str) -> String {
        self.format(format).to_string()
    }
}

/// Maps tiberius connection errors to operator-friendly messages.
fn map_connection_error(error: tiberius::error::Error, addr: &str) -> DbTestError {
    let message = match &error {
        tiberius::error::Error::Server(token) if token.code() == 18456 => {
            format!("Login failed on {addr}. Check the user name and password.")
        }
        tiberius::error::Error::Server(token) => token.message().to_string(),
        tiberius::error::Error::Tls(_) => format!(
            "TLS negotiation with {addr} failed. Add 'TrustServerCertificate=true' if the server uses a self-signed certificate."
        ),
        tiberius::error::Error::Routing { host, port } => {
            format!("The server redirected the connection to {host}:{port}.")
        }
        _ => format!("Cannot connect to {addr}."),
    };
    DbTestError::connection_with(message, error)
}

/// Maps tiberius execution errors, keeping the server's own message.
fn map_command_error(error: tiberius::error::Error) -> DbTestError {
    let message = match &error {
        tiberius::error::Error::Server(token) => format!(
            "{} (error {}, state {}, line {})",
            token.message(),
            token.code(),
            token.state(),
            token.line()
        ),
        other => other.to_string(),
    };
    DbTestError::command_with(message, error)
}
