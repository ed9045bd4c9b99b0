//! Traced database connections.
//!
//! Query functions call `conn.traced()` and every statement runs inside a
//! `db.query` or `db.execute` debug span carrying the SQL and parameter count.

use std::future::Future;
use std::pin::Pin;

use tokio_postgres::types::ToSql;
use tokio_postgres::{Error, Row};
use tracing::Instrument;

type Params<'a> = &'a [&'a (dyn ToSql + Sync)];

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// Wrapper that logs every statement run through it.
///
/// ```ignore
/// use canopeum_db::ConnectionExt;
///
/// let conn = db.get().await?;
/// let rows = conn.traced().query("SELECT id FROM site WHERE is_public", &[]).await?;
/// ```
pub struct TracedConn<'a, C: Connection + ?Sized> {
    conn: &'a C,
}

impl<'a, C: Connection + ?Sized> TracedConn<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Execute a statement, returning the number of rows affected.
    pub async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, Error> {
        let span = tracing::debug_span!(
            "db.execute",
            sql = %sql,
            params = params.len(),
            affected = tracing::field::Empty,
        );
        let affected = self
            .conn
            .execute(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("affected", affected);
        Ok(affected)
    }

    /// Execute a query, returning all rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, Error> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        let rows = self
            .conn
            .query(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", rows.len());
        Ok(rows)
    }

    /// Execute a query, returning at most one row.
    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, Error> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        let row = self
            .conn
            .query_opt(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("rows", u64::from(row.is_some()));
        Ok(row)
    }

    /// Execute a query, returning exactly one row.
    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Row, Error> {
        let span = tracing::debug_span!("db.query", sql = %sql, params = params.len(), rows = 1u64);
        self.conn.query_one(sql, params).instrument(span).await
    }
}

/// Extension trait to get a traced wrapper from a connection.
pub trait ConnectionExt: Connection {
    fn traced(&self) -> TracedConn<'_, Self> {
        TracedConn::new(self)
    }
}

impl<C: Connection + ?Sized> ConnectionExt for C {}

/// Anything statements can run on.
///
/// Implemented for plain and pooled clients and for both kinds of
/// transaction, so query functions work the same inside and outside one.
pub trait Connection: Send + Sync {
    fn execute<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, u64>;

    fn query<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, Vec<Row>>;

    fn query_opt<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, Option<Row>>;

    fn query_one<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, Row>;
}

/// Delegate every `Connection` method to a `tokio_postgres` client-like value.
macro_rules! delegate_connection {
    ($ty:ty, |$this:ident| $client:expr) => {
        impl Connection for $ty {
            fn execute<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, u64> {
                let $this = self;
                Box::pin($client.execute(sql, params))
            }

            fn query<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, Vec<Row>> {
                let $this = self;
                Box::pin($client.query(sql, params))
            }

            fn query_opt<'a>(
                &'a self,
                sql: &'a str,
                params: Params<'a>,
            ) -> BoxFuture<'a, Option<Row>> {
                let $this = self;
                Box::pin($client.query_opt(sql, params))
            }

            fn query_one<'a>(&'a self, sql: &'a str, params: Params<'a>) -> BoxFuture<'a, Row> {
                let $this = self;
                Box::pin($client.query_one(sql, params))
            }
        }
    };
}

delegate_connection!(tokio_postgres::Client, |client| client);
delegate_connection!(tokio_postgres::Transaction<'_>, |tx| tx);
delegate_connection!(deadpool_postgres::Object, |object| as_client(object));
delegate_connection!(deadpool_postgres::Transaction<'_>, |tx| as_transaction(tx));

fn as_client(object: &deadpool_postgres::Object) -> &tokio_postgres::Client {
    object
}

fn as_transaction<'t, 'c>(
    tx: &'t deadpool_postgres::Transaction<'c>,
) -> &'t tokio_postgres::Transaction<'c> {
    tx
}
