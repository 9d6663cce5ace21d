//! External reference (xlink) resolution.
//!
//! Nodes carrying `xlink:href` are placeholders for XML fetched elsewhere.
//! `actuate="onLoad"` references are resolved in a batch pass right after
//! the manifest is built: placeholder positions are collected first, the
//! fragments are fetched concurrently, and the splices are applied in
//! document order afterwards, so the sibling list is never mutated while it
//! is being walked. `actuate="onRequest"` references are only resolved
//! through the explicit per-node entry points.
//!
//! A fetch or parse failure drops the placeholder and keeps its siblings; an
//! abandoned (cancelled) pass leaves every placeholder intact for a retry.

use bytes::Bytes;
use reqwest::header;
use url::Url;

use crate::builder::{self, BuilderOptions};
use crate::error::{DashlingError, DashlingResult};
use crate::model::{
    AdaptationSet, AddressingDescriptor, Mpd, Period, SegmentList, XlinkActuate, XlinkRef,
};
use crate::url::merge_baseurls;
use crate::xml::{self, XmlNode};

/// ISO/IEC 23009-1 5.5.3: a reference that resolves to nothing; the carrying
/// node is removed outright.
pub const RESOLVE_TO_ZERO: &str = "urn:mpeg:dash:resolve-to-zero:2013";

/// The network capability this library consumes. Only manifest-sized
/// payloads travel through it (xlink fragments, time server responses);
/// media segments are the downstream pipeline's business.
pub trait ManifestFetch {
    fn fetch(
        &self,
        url: Url,
        referrer: Option<&Url>,
    ) -> impl std::future::Future<Output = DashlingResult<Bytes>> + Send;
}

/// reqwest-backed [`ManifestFetch`].
#[derive(Clone, Default)]
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ManifestFetch for HttpFetch {
    fn fetch(
        &self,
        url: Url,
        referrer: Option<&Url>,
    ) -> impl std::future::Future<Output = DashlingResult<Bytes>> + Send {
        let mut request = self.client.get(url).header(
            header::ACCEPT,
            "application/dash+xml,video/vnd.mpeg.dash.mpd",
        );
        if let Some(referrer) = referrer {
            request = request.header(header::REFERER, referrer.as_str());
        }
        async move {
            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(DashlingError::HttpError(response.status()));
            }
            Ok(response.bytes().await?)
        }
    }
}

/// What one fetched reference resolved to.
enum Resolved<T> {
    /// `resolve-to-zero`: delete the placeholder, splice nothing.
    Zero,
    Nodes(Vec<T>),
}

/// Resolve every `onLoad` reference in the tree: Periods first, then
/// AdaptationSets within each Period, then SegmentLists. Returns whether
/// anything was spliced, so the caller knows to re-run timeline resolution.
pub async fn resolve_on_load<F>(
    mpd: &mut Mpd,
    base_url: &Url,
    manifest_url: &Url,
    fetcher: &F,
    options: &BuilderOptions,
) -> DashlingResult<bool>
where
    F: ManifestFetch,
{
    let mut changed = resolve_on_load_periods(mpd, base_url, manifest_url, fetcher, options).await?;
    for period in &mut mpd.periods {
        changed |=
            resolve_on_load_adaptation_sets(period, base_url, manifest_url, fetcher, options)
                .await?;
        changed |= resolve_on_load_segment_lists(period, base_url, manifest_url, fetcher).await?;
    }
    Ok(changed)
}

async fn resolve_on_load_periods<F>(
    mpd: &mut Mpd,
    base_url: &Url,
    manifest_url: &Url,
    fetcher: &F,
    options: &BuilderOptions,
) -> DashlingResult<bool>
where
    F: ManifestFetch,
{
    // Collect first, then fetch, then splice: the list is never mutated
    // while it is being walked.
    let pending: Vec<(usize, XlinkRef)> = mpd
        .periods
        .iter()
        .enumerate()
        .filter_map(|(index, period)| match &period.xlink {
            Some(xlink) if xlink.actuate == XlinkActuate::OnLoad => {
                Some((index, xlink.clone()))
            }
            _ => None,
        })
        .collect();
    if pending.is_empty() {
        return Ok(false);
    }

    let fetches = pending
        .iter()
        .map(|(_, xlink)| fetch_fragment(fetcher, base_url, manifest_url, xlink));
    let results = futures::future::join_all(fetches).await;

    // Splice back-to-front so earlier indices stay valid.
    for ((index, xlink), result) in pending.into_iter().zip(results).rev() {
        let replacement = match result {
            Ok(Resolved::Zero) => Vec::new(),
            Ok(Resolved::Nodes(nodes)) => nodes
                .iter()
                .filter_map(|node| match builder::build_external_period(node, options) {
                    Ok(period) => Some(period),
                    Err(e) => {
                        tracing::warn!(href = %xlink.href, error = %e, "Dropping bad external Period");
                        None
                    }
                })
                .collect(),
            Err(e) => {
                tracing::warn!(href = %xlink.href, error = %e, "Failed to resolve external Period");
                Vec::new()
            }
        };
        mpd.periods.splice(index..=index, replacement);
    }
    Ok(true)
}

async fn resolve_on_load_adaptation_sets<F>(
    period: &mut Period,
    base_url: &Url,
    manifest_url: &Url,
    fetcher: &F,
    options: &BuilderOptions,
) -> DashlingResult<bool>
where
    F: ManifestFetch,
{
    let pending: Vec<(usize, XlinkRef)> = period
        .adaptation_sets
        .iter()
        .enumerate()
        .filter_map(|(index, set)| match &set.xlink {
            Some(xlink) if xlink.actuate == XlinkActuate::OnLoad => {
                Some((index, xlink.clone()))
            }
            _ => None,
        })
        .collect();
    if pending.is_empty() {
        return Ok(false);
    }

    let fetches = pending
        .iter()
        .map(|(_, xlink)| fetch_fragment(fetcher, base_url, manifest_url, xlink));
    let results = futures::future::join_all(fetches).await;

    for ((index, xlink), result) in pending.into_iter().zip(results).rev() {
        let replacement: Vec<AdaptationSet> = match result {
            Ok(Resolved::Zero) => Vec::new(),
            Ok(Resolved::Nodes(nodes)) => nodes
                .iter()
                .filter(|node| node.name == "AdaptationSet")
                .filter_map(
                    |node| match builder::build_external_adaptation_set(
                        node,
                        period.bitstream_switching,
                        options,
                    ) {
                        Ok(set) => Some(set),
                        Err(e) => {
                            tracing::warn!(href = %xlink.href, error = %e, "Dropping bad external AdaptationSet");
                            None
                        }
                    },
                )
                .collect(),
            Err(e) => {
                tracing::warn!(href = %xlink.href, error = %e, "Failed to resolve external AdaptationSet");
                Vec::new()
            }
        };
        period.adaptation_sets.splice(index..=index, replacement);
    }
    Ok(true)
}

async fn resolve_on_load_segment_lists<F>(
    period: &mut Period,
    base_url: &Url,
    manifest_url: &Url,
    fetcher: &F,
) -> DashlingResult<bool>
where
    F: ManifestFetch,
{
    let mut changed = false;

    let mut slots: Vec<&mut Option<AddressingDescriptor>> = Vec::new();
    slots.push(&mut period.addressing);
    for set in &mut period.adaptation_sets {
        slots.push(&mut set.addressing);
        for representation in &mut set.representations {
            slots.push(&mut representation.addressing);
        }
    }

    for slot in slots {
        let Some(AddressingDescriptor::List(list)) = slot else {
            continue;
        };
        let Some(xlink) = list.xlink.clone() else {
            continue;
        };
        if xlink.actuate != XlinkActuate::OnLoad {
            continue;
        }

        changed = true;
        match resolve_segment_list(fetcher, base_url, manifest_url, &xlink).await {
            Ok(Some(replacement)) => *slot = Some(AddressingDescriptor::List(replacement)),
            Ok(None) => *slot = None,
            Err(e) => {
                tracing::warn!(href = %xlink.href, error = %e, "Failed to resolve external SegmentList");
                *slot = None;
            }
        }
    }

    Ok(changed)
}

/// Resolve one externally-referenced SegmentList on request (`None` means
/// the reference resolved to zero). The caller replaces its node.
pub async fn resolve_segment_list<F>(
    fetcher: &F,
    base_url: &Url,
    manifest_url: &Url,
    xlink: &XlinkRef,
) -> DashlingResult<Option<SegmentList>>
where
    F: ManifestFetch,
{
    match fetch_fragment(fetcher, base_url, manifest_url, xlink).await? {
        Resolved::Zero => Ok(None),
        Resolved::Nodes(nodes) => {
            let node = nodes
                .iter()
                .find(|node| node.name == "SegmentList")
                .ok_or_else(|| {
                    DashlingError::MpdParsing(
                        "external reference did not contain a SegmentList".to_string(),
                    )
                })?;
            let mut list = builder::build_external_segment_list(node)?;
            // The replacement must not chain to another reference.
            list.xlink = None;
            Ok(Some(list))
        }
    }
}

/// Resolve one Period's reference on request; the returned Periods replace
/// the placeholder (empty for resolve-to-zero).
pub async fn resolve_periods_on_request<F>(
    fetcher: &F,
    base_url: &Url,
    manifest_url: &Url,
    xlink: &XlinkRef,
    options: &BuilderOptions,
) -> DashlingResult<Vec<Period>>
where
    F: ManifestFetch,
{
    match fetch_fragment(fetcher, base_url, manifest_url, xlink).await? {
        Resolved::Zero => Ok(Vec::new()),
        Resolved::Nodes(nodes) => nodes
            .iter()
            .filter(|node| node.name == "Period")
            .map(|node| builder::build_external_period(node, options))
            .collect(),
    }
}

async fn fetch_fragment<F>(
    fetcher: &F,
    base_url: &Url,
    manifest_url: &Url,
    xlink: &XlinkRef,
) -> DashlingResult<Resolved<XmlNode>>
where
    F: ManifestFetch,
{
    if xlink.href == RESOLVE_TO_ZERO {
        return Ok(Resolved::Zero);
    }

    let url = merge_baseurls(base_url, &xlink.href)?;
    tracing::debug!(url = %url, "Fetching external reference");
    let bytes = fetcher.fetch(url, Some(manifest_url)).await?;

    // The reply may be a bare run of sibling elements without a document
    // root, e.g. several Period elements back to back.
    Ok(Resolved::Nodes(xml::parse_fragment(&bytes)?))
}
