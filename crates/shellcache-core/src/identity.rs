//! Request identity used to key cache entries

use url::Url;

/// Normalized, method-less key for a request URL.
///
/// The absolute URL including origin and query, with the fragment removed.
pub fn request_identity(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// Whether `url` shares its origin with `base`
pub fn is_same_origin(url: &Url, base: &Url) -> bool {
    url.origin() == base.origin()
}
