//! The create/dispose contract a pool calls into

use async_trait::async_trait;

/// Creates and tears down the resources held by a [`Pool`](crate::Pool).
///
/// The pool never looks inside a resource. Creation failures abort only the
/// creation slot that produced them; the deficit is retried on the next
/// reconciliation.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use lendpool::Manage;
///
/// struct Counter;
///
/// #[async_trait]
/// impl Manage for Counter {
///     type Resource = u32;
///     type Error = std::io::Error;
///
///     async fn create(&self) -> Result<u32, Self::Error> {
///         Ok(0)
///     }
///
///     async fn dispose(&self, _resource: u32) -> Result<(), Self::Error> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Manage: Send + Sync + 'static {
    /// The pooled resource type
    type Resource: Send + 'static;

    /// Error returned by `create` and `dispose`
    type Error: std::error::Error + Send + Sync + 'static;

    /// Build a new resource
    async fn create(&self) -> Result<Self::Resource, Self::Error>;

    /// Tear a resource down; called at most once per resource
    async fn dispose(&self, resource: Self::Resource) -> Result<(), Self::Error>;
}
