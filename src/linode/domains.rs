//! Domain and DNS record endpoints.

use crate::error::Result;
use crate::provider::OpContext;

use super::client::LinodeClient;
use super::filter::Filter;
use super::types::{Domain, DomainOptions, DomainRecord, DomainRecordOptions};

impl LinodeClient {
    /// Lists domains matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn list_domains(&self, ctx: &OpContext, filter: Option<&Filter>) -> Result<Vec<Domain>> {
        self.list(ctx, "domains", filter).await
    }

    /// Gets a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_domain(&self, ctx: &OpContext, domain_id: i64) -> Result<Domain> {
        self.get(ctx, &format!("domains/{domain_id}")).await
    }

    /// Creates a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_domain(&self, ctx: &OpContext, opts: &DomainOptions) -> Result<Domain> {
        self.post(ctx, "domains", opts).await
    }

    /// Updates a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_domain(&self, ctx: &OpContext, domain_id: i64, opts: &DomainOptions) -> Result<Domain> {
        self.put(ctx, &format!("domains/{domain_id}"), opts).await
    }

    /// Deletes a domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_domain(&self, ctx: &OpContext, domain_id: i64) -> Result<()> {
        self.delete(ctx, &format!("domains/{domain_id}")).await
    }

    /// Gets a DNS record.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn get_domain_record(&self, ctx: &OpContext, domain_id: i64, record_id: i64) -> Result<DomainRecord> {
        self.get(ctx, &format!("domains/{domain_id}/records/{record_id}"))
            .await
    }

    /// Creates a DNS record.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn create_domain_record(
        &self,
        ctx: &OpContext,
        domain_id: i64,
        opts: &DomainRecordOptions,
    ) -> Result<DomainRecord> {
        self.post(ctx, &format!("domains/{domain_id}/records"), opts).await
    }

    /// Updates a DNS record.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn update_domain_record(
        &self,
        ctx: &OpContext,
        domain_id: i64,
        record_id: i64,
        opts: &DomainRecordOptions,
    ) -> Result<DomainRecord> {
        self.put(ctx, &format!("domains/{domain_id}/records/{record_id}"), opts)
            .await
    }

    /// Deletes a DNS record.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    pub async fn delete_domain_record(&self, ctx: &OpContext, domain_id: i64, record_id: i64) -> Result<()> {
        self.delete(ctx, &format!("domains/{domain_id}/records/{record_id}"))
            .await
    }
}
