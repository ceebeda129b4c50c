//! Public and callback route detection

use crate::models::Route;
use crate::settings::{OidcClientConfig, PublicRoutePredicate, StoreSettings};
use crate::utils::strings::trim_trailing_slash;
use url::Url;

/// Path of a callback URI relative to the application's route base
///
/// `http://host/app/oidc-callback` with route base `/app/` yields
/// `/oidc-callback`. A trailing slash is dropped. Returns `None` when no URI
/// is configured.
#[must_use]
pub fn get_oidc_callback_path(callback_uri: Option<&str>, route_base: &str) -> Option<String> {
    let callback_uri = callback_uri.filter(|uri| !uri.is_empty())?;
    let route_base = normalized_route_base(route_base);

    // `host:port/path` parses as a URL with scheme `host`, so only absolute URIs go through `Url`
    let parsed = callback_uri
        .contains("://")
        .then(|| Url::parse(callback_uri).ok())
        .flatten();
    let path = match parsed {
        Some(url) => url.path().to_string(),
        // everything from the first slash past the scheme
        None => {
            let host_and_path = callback_uri
                .split_once("://")
                .map_or(callback_uri, |(_, rest)| rest);
            host_and_path
                .find('/')
                .map_or_else(String::new, |index| host_and_path[index..].to_string())
        }
    };

    let relative = match path.strip_prefix(route_base.as_str()) {
        Some(rest) => format!("/{rest}"),
        None => path,
    };

    Some(trim_trailing_slash(&relative).to_string())
}

fn normalized_route_base(route_base: &str) -> String {
    let mut base = if route_base.starts_with('/') {
        route_base.to_string()
    } else {
        format!("/{route_base}")
    };
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

/// Route classification derived from the client config and store settings
#[derive(Clone)]
pub struct RouteMatcher {
    callback_paths: Vec<String>,
    public_route_paths: Vec<String>,
    is_public_route: Option<PublicRoutePredicate>,
}

impl RouteMatcher {
    #[must_use]
    pub fn new(config: &OidcClientConfig, settings: &StoreSettings) -> Self {
        let route_base = settings.route_base();
        let callback_paths = [
            config.redirect_uri(),
            config.popup_redirect_uri(),
            config.silent_redirect_uri(),
        ]
        .into_iter()
        .filter_map(|uri| get_oidc_callback_path(uri, route_base))
        .collect();

        let public_route_paths = settings
            .public_route_paths
            .iter()
            .map(|path| trim_trailing_slash(path).to_string())
            .collect();

        Self {
            callback_paths,
            public_route_paths,
            is_public_route: settings.is_public_route.clone(),
        }
    }

    #[must_use]
    pub fn callback_paths(&self) -> &[String] {
        &self.callback_paths
    }

    /// Public by meta flag, by configured path, or by the caller's predicate
    #[must_use]
    pub fn is_public(&self, route: &Route) -> bool {
        if route.meta.is_public() {
            return true;
        }

        let path = trim_trailing_slash(&route.path);
        if self.public_route_paths.iter().any(|public| public == path) {
            return true;
        }

        self.is_public_route
            .as_ref()
            .is_some_and(|predicate| predicate(route))
    }

    /// Callback by meta flag or by matching one of the callback paths
    #[must_use]
    pub fn is_oidc_callback(&self, route: &Route) -> bool {
        if route.meta.is_oidc_callback() {
            return true;
        }

        if route.path.is_empty() {
            return false;
        }

        let path = trim_trailing_slash(&route.path);
        self.callback_paths.iter().any(|callback| callback == path)
    }
}
