use std::net::IpAddr;
use std::time::Duration;

use reqwest::{Client, ClientBuilder, redirect::Policy};

fn has_proxy_env() -> bool {
    [
        "HTTPS_PROXY",
        "https_proxy",
        "HTTP_PROXY",
        "http_proxy",
        "ALL_PROXY",
        "all_proxy",
    ]
    .iter()
    .any(|k| std::env::var(k).is_ok_and(|v| !v.trim().is_empty()))
}

// 逗号分隔的域名后缀，匹配的上游不走系统代理
fn extra_bypass_suffixes() -> Vec<String> {
    std::env::var("GATEWAY_NO_PROXY_HOSTS")
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn should_bypass_proxy_impl(url: &str, proxy_env_present: bool, suffixes: &[String]) -> bool {
    if !proxy_env_present {
        return false;
    }
    let Ok(u) = reqwest::Url::parse(url) else {
        return false;
    };
    let Some(host) = u.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase();

    if host == "localhost" || host.ends_with(".localhost") {
        return true;
    }
    if let Ok(ip) = host.parse::<IpAddr>()
        && ip.is_loopback()
    {
        return true;
    }
    suffixes
        .iter()
        .any(|s| host == *s || host.ends_with(&format!(".{s}")))
}

pub fn should_bypass_proxy_for_url(url: &str) -> bool {
    should_bypass_proxy_impl(url, has_proxy_env(), &extra_bypass_suffixes())
}

fn base_builder(connect_timeout: Duration) -> ClientBuilder {
    Client::builder()
        .redirect(Policy::none())
        .connect_timeout(connect_timeout)
}

/// Shared upstream clients. Timeouts per attempt are applied by the caller,
/// so neither client carries an overall request timeout.
#[derive(Clone)]
pub struct HttpClients {
    proxied: Client,
    direct: Client,
}

impl HttpClients {
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            proxied: base_builder(connect_timeout).build()?,
            direct: base_builder(connect_timeout).no_proxy().build()?,
        })
    }

    pub fn for_url(&self, url: &str) -> &Client {
        if should_bypass_proxy_for_url(url) {
            &self.direct
        } else {
            &self.proxied
        }
    }
}
