//! Azure Resource Manager adapter
//!
//! Implements the governance core's [`ResourceClient`](crate::resource::ResourceClient)
//! boundary over the ARM REST API.
//!
//! # Module Structure
//!
//! - [`auth`] - Bearer tokens from the environment or the Azure CLI
//! - [`client`] - Subscription-scoped client and URL helpers
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use azgov::azure::client::AzureClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = AzureClient::new("00000000-0000-0000-0000-000000000000")?;
//!     let groups = client.get(&client.resource_groups_url()).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
