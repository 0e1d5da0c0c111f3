//! Identity of the site an execution context serves.

use std::str::FromStr;

use sitectx_result::{Error, Result};
use sitectx_types::{DrClusterId, HostId, PartitionId, SiteId};

pub const SITE_ID_ENV: &str = "SITECTX_SITE_ID";
pub const PARTITION_ID_ENV: &str = "SITECTX_PARTITION_ID";
pub const HOST_ID_ENV: &str = "SITECTX_HOST_ID";
pub const HOSTNAME_ENV: &str = "SITECTX_HOSTNAME";
pub const DR_CLUSTER_ID_ENV: &str = "SITECTX_DR_CLUSTER_ID";

/// Construction-time identity of an [`ExecutionContext`](crate::ExecutionContext).
///
/// Everything here is fixed for the life of the context except the partition
/// id, which the engine may assign later through
/// [`ExecutionContext::set_partition_id`](crate::ExecutionContext::set_partition_id).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextConfig {
    pub site_id: SiteId,
    pub partition_id: PartitionId,
    pub host_id: HostId,
    pub hostname: String,
    pub dr_cluster_id: DrClusterId,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            site_id: 0,
            partition_id: 0,
            host_id: 0,
            hostname: "localhost".to_string(),
            dr_cluster_id: 0,
        }
    }
}

impl ContextConfig {
    pub fn with_site_id(mut self, site_id: SiteId) -> Self {
        self.site_id = site_id;
        self
    }

    pub fn with_partition_id(mut self, partition_id: PartitionId) -> Self {
        self.partition_id = partition_id;
        self
    }

    pub fn with_host_id(mut self, host_id: HostId) -> Self {
        self.host_id = host_id;
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_dr_cluster_id(mut self, dr_cluster_id: DrClusterId) -> Self {
        self.dr_cluster_id = dr_cluster_id;
        self
    }

    /// Read overrides from the `SITECTX_*` environment variables, falling back
    /// to [`ContextConfig::default`] for unset ones.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ContextConfig::from_env`] with a caller-supplied lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(site_id) = parse_var(&lookup, SITE_ID_ENV)? {
            config.site_id = site_id;
        }
        if let Some(partition_id) = parse_var(&lookup, PARTITION_ID_ENV)? {
            config.partition_id = partition_id;
        }
        if let Some(host_id) = parse_var(&lookup, HOST_ID_ENV)? {
            config.host_id = host_id;
        }
        if let Some(hostname) = lookup(HOSTNAME_ENV) {
            config.hostname = hostname;
        }
        if let Some(dr_cluster_id) = parse_var(&lookup, DR_CLUSTER_ID_ENV)? {
            config.dr_cluster_id = dr_cluster_id;
        }
        Ok(config)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|err| {
            Error::InvalidArgumentError(format!("{key}={raw:?} is not valid: {err}"))
        }),
    }
}
