use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;

use crate::parsing::{parse_bool, parse_duration};
use crate::types::Config;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_INTERVAL: &str = "10s";
pub const DEFAULT_CERT_FILE: &str = "/var/lib/kubelet/pki/kubelet-client-current.pem";
pub const DEFAULT_K8S_LOCAL_API: &str = "https://127.0.0.1:10250";

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let port: u16 = match env.get_var("LSE_PORT") {
        Some(v) => v.trim().parse().context("Invalid LSE_PORT")?,
        None => DEFAULT_PORT,
    };

    let debug = env.get_var("LSE_DEBUG").map(|v| parse_bool(&v)).unwrap_or(false);
    let json_log = env.get_var("LSE_JSON_LOG").map(|v| parse_bool(&v)).unwrap_or(false);

    let interval_raw = env
        .get_var("LSE_INTERVAL")
        .unwrap_or_else(|| DEFAULT_INTERVAL.to_string());
    let interval = parse_duration(&interval_raw)
        .ok_or_else(|| anyhow!("Invalid LSE_INTERVAL: {:?}", interval_raw))?;
    if interval.is_zero() {
        return Err(anyhow!("LSE_INTERVAL must be greater than zero"));
    }

    // A fetch may never outlive the interval, otherwise a hung kubelet stalls the loop.
    let timeout = match env.get_var("LSE_TIMEOUT") {
        Some(raw) => {
            let t = parse_duration(&raw).ok_or_else(|| anyhow!("Invalid LSE_TIMEOUT: {:?}", raw))?;
            if t.is_zero() {
                return Err(anyhow!("LSE_TIMEOUT must be greater than zero"));
            }
            t.min(interval)
        }
        None => interval,
    };

    let node_name = env
        .get_var("LSE_NODE_NAME")
        .filter(|v| !v.trim().is_empty())
        .or_else(|| env.get_var("NODE_NAME"))
        .map(|v| v.trim().to_string())
        .unwrap_or_default();

    let cert_file = env
        .get_var("LSE_CERT_FILE")
        .unwrap_or_else(|| DEFAULT_CERT_FILE.to_string());
    let key_file = env
        .get_var("LSE_KEY_FILE")
        .unwrap_or_else(|| DEFAULT_CERT_FILE.to_string());

    let k8s_local_api = env
        .get_var("LSE_K8S_LOCAL_API")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_K8S_LOCAL_API.to_string());
    if !(k8s_local_api.starts_with("https://") || k8s_local_api.starts_with("http://")) {
        return Err(anyhow!("LSE_K8S_LOCAL_API must be an http(s) URL, got {:?}", k8s_local_api));
    }

    let metrics_prefix = env
        .get_var("LSE_METRICS_PREFIX")
        .map(|v| v.trim().trim_end_matches('_').to_string())
        .unwrap_or_default();

    let uid_label = env.get_var("LSE_UID_LABEL").map(|v| parse_bool(&v)).unwrap_or(false);

    let stale_cycles: u32 = match env.get_var("LSE_STALE_CYCLES") {
        Some(v) => v.trim().parse().context("Invalid LSE_STALE_CYCLES")?,
        None => 0,
    };

    Ok(Config {
        port,
        debug,
        json_log,
        interval,
        timeout,
        node_name,
        cert_file,
        key_file,
        k8s_local_api,
        metrics_prefix,
        uid_label,
        stale_cycles,
    })
}
