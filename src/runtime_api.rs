// src/runtime_api.rs
use anyhow::{anyhow, Context, Result};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::Props;
use crate::models::{ActionSpec, Activation, ActivationLogs, Operation, Package, Trigger};

/// Hands a composed action to the service.
#[async_trait::async_trait]
pub trait ActionSubmitter {
    async fn submit(&self, op: Operation, spec: &ActionSpec) -> Result<Value>;
}

#[derive(Clone)]
pub struct Client {
    base: String,
    namespace: String,
    auth: Option<(String, String)>,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base: impl Into<String>, namespace: impl Into<String>, auth: Option<&str>) -> Self {
        let auth = auth.map(|a| match a.split_once(':') {
            Some((user, pass)) => (user.to_string(), pass.to_string()),
            None => (a.to_string(), String::new()),
        });
        Self {
            base: base.into(),
            namespace: namespace.into(),
            auth,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_props(props: &Props) -> Result<Self> {
        let auth = props.require_auth()?;
        Ok(Self::new(&props.apihost, &props.namespace, Some(auth)))
    }

    /// `{base}/api/v1/namespaces/{ns}/{collection}[/{name...}]`
    fn url(&self, namespace: Option<&str>, collection: &str, name: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base).with_context(|| format!("invalid apihost '{}'", self.base))?;
        let (ns, path) = match name {
            Some(n) => {
                let (ns, path) = split_qualified(n);
                (ns.or(namespace), Some(path))
            }
            None => (namespace, None),
        };
        {
            let mut segs = url
                .path_segments_mut()
                .map_err(|_| anyhow!("apihost '{}' cannot carry a path", self.base))?;
            segs.pop_if_empty()
                .extend(["api", "v1", "namespaces", ns.unwrap_or(&self.namespace), collection]);
            if let Some(path) = path {
                segs.extend(path.split('/').filter(|s| !s.is_empty()));
            }
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        tracing::debug!(%method, %url, "runtime api request");
        let req = self.http.request(method, url).header(ACCEPT, "application/json");
        match &self.auth {
            Some((user, pass)) => req.basic_auth(user, Some(pass)),
            None => req,
        }
    }

    pub async fn put_action(&self, op: Operation, spec: &ActionSpec) -> Result<Value> {
        let url = self.url(None, "actions", Some(&spec.name))?;
        let overwrite = matches!(op, Operation::Update).to_string();
        let req = self
            .request(reqwest::Method::PUT, url)
            .query(&[("overwrite", overwrite.as_str())])
            .json(spec);
        send_json(req).await
    }

    pub async fn list_packages(&self, namespace: Option<&str>, limit: Option<u32>, skip: Option<u32>) -> Result<Vec<Package>> {
        let url = self.url(namespace, "packages", None)?;
        let req = self.request(reqwest::Method::GET, url).query(&paging(limit, skip));
        send_json(req).await
    }

    pub async fn list_triggers(&self, limit: Option<u32>, skip: Option<u32>) -> Result<Vec<Trigger>> {
        let url = self.url(None, "triggers", None)?;
        let req = self.request(reqwest::Method::GET, url).query(&paging(limit, skip));
        send_json(req).await
    }

    pub async fn get_trigger(&self, name: &str) -> Result<Trigger> {
        let url = self.url(None, "triggers", Some(name))?;
        send_json(self.request(reqwest::Method::GET, url)).await
    }

    pub async fn list_activations(&self, limit: u32, name: Option<&str>) -> Result<Vec<Activation>> {
        let url = self.url(None, "activations", None)?;
        let mut query = paging(Some(limit), Some(0));
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        send_json(self.request(reqwest::Method::GET, url).query(&query)).await
    }

    pub async fn activation_logs(&self, activation_id: &str) -> Result<ActivationLogs> {
        let mut url = self.url(None, "activations", Some(activation_id))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("apihost '{}' cannot carry a path", self.base))?
            .push("logs");
        send_json(self.request(reqwest::Method::GET, url)).await
    }
}

#[async_trait::async_trait]
impl ActionSubmitter for Client {
    async fn submit(&self, op: Operation, spec: &ActionSpec) -> Result<Value> {
        self.put_action(op, spec).await
    }
}

fn paging(limit: Option<u32>, skip: Option<u32>) -> Vec<(&'static str, String)> {
    let mut q = Vec::new();
    if let Some(limit) = limit {
        q.push(("limit", limit.to_string()));
    }
    if let Some(skip) = skip {
        q.push(("skip", skip.to_string()));
    }
    q
}

async fn send_json<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T> {
    let res = req.send().await?;
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("{status}: {}", service_error(&body));
    }
    res.json().await.context("decoding runtime api response")
}

/// Prefer the service's `error` field over the raw body.
fn service_error(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

/// `/ns/pkg/action` -> (`ns`, `pkg/action`); relative names keep the client namespace.
pub fn split_qualified(name: &str) -> (Option<&str>, &str) {
    match name.strip_prefix('/') {
        Some(rest) => match rest.split_once('/') {
            Some((ns, path)) => (Some(ns), path),
            None => (None, rest),
        },
        None => (None, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = Client::new("https://test.example.com", "_", Some("user:secret"));
        assert_eq!(client.base, "https://test.example.com");
        assert_eq!(client.namespace, "_");
        assert_eq!(client.auth, Some(("user".to_string(), "secret".to_string())));
    }

    #[test]
    fn test_client_from_props_requires_auth() {
        let props = Props { apihost: "https://x".into(), auth: None, namespace: "_".into() };
        assert!(Client::from_props(&props).is_err());
    }

    #[test]
    fn test_action_url() {
        let client = Client::new("https://runtime.example.com/", "my-ns", None);
        let url = client.url(None, "actions", Some("pkg/hello")).unwrap();
        assert_eq!(url.as_str(), "https://runtime.example.com/api/v1/namespaces/my-ns/actions/pkg/hello");
    }

    #[test]
    fn test_qualified_name_overrides_namespace() {
        let client = Client::new("https://runtime.example.com", "my-ns", None);
        let url = client.url(None, "actions", Some("/other/hello")).unwrap();
        assert_eq!(url.as_str(), "https://runtime.example.com/api/v1/namespaces/other/actions/hello");
    }

    #[test]
    fn test_collection_url_with_namespace_arg() {
        let client = Client::new("https://runtime.example.com", "_", None);
        let url = client.url(Some("team"), "packages", None).unwrap();
        assert_eq!(url.as_str(), "https://runtime.example.com/api/v1/namespaces/team/packages");
    }

    #[test]
    fn test_split_qualified() {
        assert_eq!(split_qualified("hello"), (None, "hello"));
        assert_eq!(split_qualified("pkg/hello"), (None, "pkg/hello"));
        assert_eq!(split_qualified("/ns/pkg/hello"), (Some("ns"), "pkg/hello"));
        assert_eq!(split_qualified("/hello"), (None, "hello"));
    }

    #[test]
    fn test_service_error() {
        assert_eq!(service_error(r#"{"error":"The requested resource does not exist.","code":"x"}"#), "The requested resource does not exist.");
        assert_eq!(service_error("plain failure"), "plain failure");
    }

    #[test]
    fn test_paging() {
        assert!(paging(None, None).is_empty());
        assert_eq!(paging(Some(30), Some(2)), vec![("limit", "30".to_string()), ("skip", "2".to_string())]);
    }
}
