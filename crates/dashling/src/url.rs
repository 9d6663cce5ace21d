use url::Url;

use crate::error::DashlingResult;
use crate::model::BaseUrl;

pub(crate) fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("file://")
        || s.starts_with("ftp://")
}

pub(crate) fn merge_baseurls(current: &Url, new: &str) -> DashlingResult<Url> {
    if is_absolute_url(new) {
        Ok(Url::parse(new)?)
    } else {
        // We are careful to merge the query portion of the current URL (which is either the
        // original manifest URL, or the URL that it redirected to, or the value of a BaseURL
        // element in the manifest) with the new URL. But if the new URL already has a query string,
        // it takes precedence.
        //
        // Examples
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=secret, /video42.mp4) =>
        //   https://example.com/video42.mp4?auth=secret
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=old, /video42.mp4?auth=new) =>
        //   https://example.com/video42.mp4?auth=new
        let mut merged = current.join(new)?;
        if merged.query().is_none() {
            merged.set_query(current.query());
        }
        Ok(merged)
    }
}

/// Apply the first BaseURL of a level, if any. DASH allows several BaseURL
/// alternatives per level; like most players this library always follows the
/// first one.
pub(crate) fn apply_base_urls(current: &Url, urls: &[BaseUrl]) -> DashlingResult<Url> {
    match urls.first() {
        Some(base) => merge_baseurls(current, &base.url),
        None => Ok(current.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_baseurls() {
        let manifest = Url::parse("https://example.com/live/manifest.mpd?auth=secret").unwrap();

        let merged = merge_baseurls(&manifest, "media/").unwrap();
        assert_eq!(merged.as_str(), "https://example.com/live/media/?auth=secret");

        let merged = merge_baseurls(&manifest, "/video42.mp4?auth=new").unwrap();
        assert_eq!(merged.as_str(), "https://example.com/video42.mp4?auth=new");

        let merged = merge_baseurls(&manifest, "https://cdn.example.com/a.mp4").unwrap();
        assert_eq!(merged.as_str(), "https://cdn.example.com/a.mp4");
    }
}
