//! Wall-clock synchronization against the manifest's UTCTiming sources.
//!
//! Live timing math is only as good as the local clock; the MPD may name
//! time servers to correct it. The computed offset is kept, not applied to
//! the system clock.

use chrono::{DateTime, TimeDelta, Utc};
use url::Url;

use crate::error::{DashlingError, DashlingResult};
use crate::model::{UtcTimingMethod, UtcTimingSource};
use crate::xlink::ManifestFetch;

#[derive(Debug, Clone, Default)]
pub struct Clock {
    /// How much the local clock is behind the remote clock.
    offset: TimeDelta,
}

impl Clock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.offset
    }

    pub fn offset(&self) -> TimeDelta {
        self.offset
    }

    fn set_time(
        &mut self,
        remote_now: DateTime<Utc>,
        before_request: DateTime<Utc>,
        after_request: DateTime<Utc>,
    ) {
        // The remote timestamp was taken somewhere between the two local
        // observations; assume the middle of the round trip.
        let rtt = after_request - before_request;
        let server_now = remote_now + rtt / 2;
        self.offset = server_now - after_request;
        tracing::info!(
            offset_milliseconds = %self.offset.num_milliseconds(),
            "Clock synchronized to {remote_now}"
        );
    }

    /// Try each timing source in manifest order until one succeeds. An empty
    /// source list falls back to the local clock with a warning; a list where
    /// every source fails is an error.
    pub async fn sync<F>(&mut self, sources: &[UtcTimingSource], fetcher: &F) -> DashlingResult<()>
    where
        F: ManifestFetch,
    {
        if sources.is_empty() {
            tracing::warn!("No UTCTiming elements found in MPD, using local time");
            self.offset = TimeDelta::zero();
            return Ok(());
        }

        let mut last_error: Option<DashlingError> = None;
        for source in sources {
            match self.sync_one(source, fetcher).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(method = ?source.method, error = %e, "Time sync source failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            DashlingError::InvalidTimingSchema("all time sync methods failed".to_string())
        }))
    }

    async fn sync_one<F>(&mut self, source: &UtcTimingSource, fetcher: &F) -> DashlingResult<()>
    where
        F: ManifestFetch,
    {
        match source.method {
            UtcTimingMethod::HttpXsdate | UtcTimingMethod::HttpIso => {
                let url = source.values.first().ok_or_else(|| {
                    DashlingError::InvalidTimingSchema("missing time server URL".to_string())
                })?;
                let url = Url::parse(url)?;

                let before_request = Utc::now();
                let body = fetcher.fetch(url, None).await?;
                let after_request = Utc::now();

                let text = std::str::from_utf8(&body).map_err(|_| {
                    DashlingError::InvalidTimingSchema("time response is not UTF-8".to_string())
                })?;
                let remote = parse_iso8601_instant(text.trim())?;
                self.set_time(remote, before_request, after_request);
                Ok(())
            }
            UtcTimingMethod::Direct => {
                let value = source.values.first().ok_or_else(|| {
                    DashlingError::InvalidTimingSchema("missing direct time value".to_string())
                })?;
                let now = Utc::now();
                let remote = parse_iso8601_instant(value)?;
                self.set_time(remote, now, now);
                Ok(())
            }
            method => Err(DashlingError::InvalidTimingSchema(format!(
                "unsupported time sync method {method:?}"
            ))),
        }
    }
}

fn parse_iso8601_instant(text: &str) -> DashlingResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Allow a bare Z suffix without fractional seconds, which is not
            // strictly RFC 3339 but common for xsdate servers.
            DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%SZ").map(|dt| dt.with_timezone(&Utc))
        })
        .map_err(|e| DashlingError::InvalidTimingSchema(format!("bad time value {text:?}: {e}")))
}
