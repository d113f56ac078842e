use super::*;
use crate::config::ThrottleConfig;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::warn;

pub type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Builds the process-wide limiter from config.
pub fn build_limiter(config: &ThrottleConfig) -> Arc<DirectRateLimiter> {
    let period = config.min_interval().max(Duration::from_millis(1));
    let burst = NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

/// Paces every mutating call made through the wrapped platform and bounds
/// each call with a timeout. Reads are only bounded by the timeout.
///
/// All guild operations in the process should share one limiter so that
/// the platform's global budget is respected.
pub struct Throttled<P> {
    inner: P,
    limiter: Arc<DirectRateLimiter>,
    call_timeout: Duration,
}

impl<P: GuildPlatform> Throttled<P> {
    pub fn new(inner: P, limiter: Arc<DirectRateLimiter>, call_timeout: Duration) -> Self {
        Self {
            inner,
            limiter,
            call_timeout,
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = PlatformResult<T>>) -> PlatformResult<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Discord call timed out after {:?}", self.call_timeout);
                Err(PlatformError::Timeout(self.call_timeout))
            }
        }
    }

    async fn paced<T>(&self, call: impl Future<Output = PlatformResult<T>>) -> PlatformResult<T> {
        self.limiter.until_ready().await;
        self.bounded(call).await
    }
}

#[async_trait]
impl<P: GuildPlatform> GuildPlatform for Throttled<P> {
    async fn fetch_view(&self) -> PlatformResult<GuildView> {
        self.bounded(self.inner.fetch_view()).await
    }

    async fn fetch_members(
        &self,
        user_ids: &[Id<UserMarker>],
    ) -> PlatformResult<HashSet<Id<UserMarker>>> {
        self.bounded(self.inner.fetch_members(user_ids)).await
    }

    async fn create_role(&self, role: &NewRole<'_>) -> PlatformResult<LiveRole> {
        self.paced(self.inner.create_role(role)).await
    }

    async fn create_channel(&self, channel: &NewChannel<'_>) -> PlatformResult<LiveChannel> {
        self.paced(self.inner.create_channel(channel)).await
    }

    async fn set_overwrites(
        &self,
        channel_id: Id<ChannelMarker>,
        overwrites: &[Overwrite],
    ) -> PlatformResult<()> {
        self.paced(self.inner.set_overwrites(channel_id, overwrites))
            .await
    }
}
