use super::ConnectOptions;
use std::collections::BTreeMap;

/// `key=value` pairs into a map; entries without `=` are skipped.
pub fn parse_connect_kv(pairs: &[String]) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    for p in pairs {
        if let Some((k, v)) = p.split_once('=') {
            params.insert(k.trim().to_string(), v.trim().to_string());
        }
    }
    params
}

pub fn connect_options(
    bootstrap_servers: &str,
    topic: &str,
    params: BTreeMap<String, String>,
) -> ConnectOptions {
    ConnectOptions {
        bootstrap_servers: bootstrap_servers.to_string(),
        topic: topic.to_string(),
        params,
    }
}
