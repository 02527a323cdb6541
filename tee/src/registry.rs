use std::collections::HashMap;
use std::sync::RwLock;

use ceres_lib::types::TeeRole;

#[derive(Debug, Clone, PartialEq)]
pub struct TeeInfo {
    pub endpoint: String,
    pub role: TeeRole,
}

/// Bring an endpoint into `host:port` form: strip the scheme, strip one
/// trailing slash, default the port to `:80` (http or bare) or `:443`
/// (https). Applying it twice is the same as applying it once.
pub fn normalize_endpoint(endpoint: &str) -> String {
    if let Some(rest) = endpoint.strip_prefix("http://") {
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.contains(':') {
            rest.to_string()
        } else {
            format!("{rest}:80")
        }
    } else if let Some(rest) = endpoint.strip_prefix("https://") {
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        if rest.contains(':') {
            rest.to_string()
        } else {
            format!("{rest}:443")
        }
    } else if endpoint.contains(':') {
        endpoint.to_string()
    } else {
        format!("{endpoint}:80")
    }
}

/// In-memory table of known TEE workers, keyed by work account.
#[derive(Default)]
pub struct TeeRegistry {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Manually configured endpoints, consulted ahead of discovered ones.
    priority: Vec<String>,
    workers: HashMap<String, TeeInfo>,
}

impl TeeRegistry {
    pub fn new(priority_endpoints: Vec<String>) -> Self {
        let priority = priority_endpoints
            .iter()
            .map(|e| normalize_endpoint(e))
            .collect();
        Self {
            inner: RwLock::new(Inner {
                priority,
                workers: HashMap::new(),
            }),
        }
    }

    /// Insert or update a worker. The endpoint is normalized on the way in.
    pub fn save(&self, work_account: &str, endpoint: &str, role: TeeRole) {
        let info = TeeInfo {
            endpoint: normalize_endpoint(endpoint),
            role,
        };
        let mut inner = self.inner.write().unwrap();
        inner.workers.insert(work_account.to_string(), info);
    }

    pub fn get(&self, work_account: &str) -> Option<TeeInfo> {
        self.inner.read().unwrap().workers.get(work_account).cloned()
    }

    pub fn work_account_by_endpoint(&self, endpoint: &str) -> Option<String> {
        let inner = self.inner.read().unwrap();
        inner
            .workers
            .iter()
            .find(|(_, info)| info.endpoint == endpoint)
            .map(|(account, _)| account.clone())
    }

    pub fn delete(&self, work_account: &str) {
        self.inner.write().unwrap().workers.remove(work_account);
    }

    pub fn all_work_accounts(&self) -> Vec<String> {
        self.inner.read().unwrap().workers.keys().cloned().collect()
    }

    /// Priority endpoints first, then every discovered worker.
    pub fn all_endpoints(&self) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        let mut out = inner.priority.clone();
        out.extend(inner.workers.values().map(|info| info.endpoint.clone()));
        out
    }

    /// Workers that can verify proofs: Full ∪ Verifier.
    pub fn verifier_endpoints(&self) -> Vec<String> {
        self.endpoints_by(|role| matches!(role, TeeRole::Full | TeeRole::Verifier))
    }

    /// Workers that can mark tags: Full ∪ Marker.
    pub fn marker_endpoints(&self) -> Vec<String> {
        self.endpoints_by(|role| matches!(role, TeeRole::Full | TeeRole::Marker))
    }

    fn endpoints_by(&self, keep: impl Fn(TeeRole) -> bool) -> Vec<String> {
        let inner = self.inner.read().unwrap();
        let mut out = inner.priority.clone();
        out.extend(
            inner
                .workers
                .values()
                .filter(|info| keep(info.role))
                .map(|info| info.endpoint.clone()),
        );
        out
    }
}
