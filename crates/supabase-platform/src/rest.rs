//! PostgREST table access.
//!
//! Filters use PostgREST's `column=op.value` query syntax; [`eq`] builds the
//! common equality case. Writes ask for `return=minimal`: callers learn about
//! the new state from the change feed, not from the write response.

use crate::client::PlatformClient;
use crate::error::PlatformResult;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;

/// `eq.<value>` filter operand.
pub fn eq(value: impl Display) -> String {
    format!("eq.{value}")
}

impl PlatformClient {
    fn rest_url(&self, table: &str) -> String {
        self.endpoint(&format!("/rest/v1/{table}"))
    }

    /// `GET /rest/v1/<table>?<query>`
    pub async fn select<T>(
        &self,
        table: &str,
        query: &[(&str, String)],
        access_token: &str,
    ) -> PlatformResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let request = self
            .request(Method::GET, &self.rest_url(table), Some(access_token))
            .header("Accept", "application/json")
            .query(query);

        let rows: Vec<T> = self.send(request, "select").await?.json().await?;
        tracing::debug!(table, rows = rows.len(), "select complete");
        Ok(rows)
    }

    /// `POST /rest/v1/<table>`
    pub async fn insert<B>(&self, table: &str, row: &B, access_token: &str) -> PlatformResult<()>
    where
        B: Serialize + ?Sized,
    {
        let request = self
            .request(Method::POST, &self.rest_url(table), Some(access_token))
            .header("Prefer", "return=minimal")
            .json(row);

        self.send(request, "insert").await?;
        tracing::debug!(table, "insert complete");
        Ok(())
    }

    /// `PATCH /rest/v1/<table>?<filters>`
    pub async fn update<B>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        patch: &B,
        access_token: &str,
    ) -> PlatformResult<()>
    where
        B: Serialize + ?Sized,
    {
        let request = self
            .request(Method::PATCH, &self.rest_url(table), Some(access_token))
            .header("Prefer", "return=minimal")
            .query(filters)
            .json(patch);

        self.send(request, "update").await?;
        tracing::debug!(table, "update complete");
        Ok(())
    }

    /// `DELETE /rest/v1/<table>?<filters>`
    pub async fn delete(
        &self,
        table: &str,
        filters: &[(&str, String)],
        access_token: &str,
    ) -> PlatformResult<()> {
        let request = self
            .request(Method::DELETE, &self.rest_url(table), Some(access_token))
            .header("Prefer", "return=minimal")
            .query(filters);

        self.send(request, "delete").await?;
        tracing::debug!(table, "delete complete");
        Ok(())
    }
}
