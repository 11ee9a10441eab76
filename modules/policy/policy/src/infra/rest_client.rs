//! REST implementation of the policy and account clients.

use std::sync::Arc;

use async_trait::async_trait;
use http::Method;
use policy_sdk::{
    Account, AccountClient, ListLinks, ListOptions, Page, Policy, PolicyClient, PolicyClientError,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::transport::{RequestOptions, Transport, TransportResponse};

const POLICIES_PATH: &str = "/policies";
const ACCOUNTS_PATH: &str = "/accounts";
const NEXT_PAGE_TOKEN: &str = "nextPageToken";

#[derive(Debug, Deserialize)]
struct PolicyListResponse {
    #[serde(default)]
    items: Vec<Policy>,
    #[serde(default)]
    links: Option<ListLinks>,
}

#[derive(Debug, Deserialize)]
struct AccountListResponse {
    #[serde(default)]
    accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: String,
}

/// Policy and account API client over a [`Transport`].
#[derive(Clone)]
pub struct RestPolicyClient {
    transport: Arc<dyn Transport>,
}

impl RestPolicyClient {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<TransportResponse, PolicyClientError> {
        let response = self.transport.request(method, path, body, options).await?;
        check_response(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        options: RequestOptions,
    ) -> Result<T, PolicyClientError> {
        let response = self.send(method, path, body, options).await?;
        Ok(serde_json::from_slice(&response.body)?)
    }
}

fn check_response(response: TransportResponse) -> Result<TransportResponse, PolicyClientError> {
    if response.is_success() {
        return Ok(response);
    }
    let message = serde_json::from_slice::<ApiErrorBody>(&response.body)
        .map(|body| body.error)
        .unwrap_or_else(|_| {
            response
                .status
                .canonical_reason()
                .unwrap_or("unexpected API response")
                .to_owned()
        });
    Err(PolicyClientError::api(response.status.as_u16(), message))
}

fn policy_path(name: &str) -> String {
    format!("{POLICIES_PATH}/{}", urlencoding::encode(name))
}

fn list_path(options: &ListOptions) -> Result<String, PolicyClientError> {
    let query = serde_urlencoded::to_string(options)
        .map_err(|e| PolicyClientError::transport(format!("invalid list options: {e}")))?;
    if query.is_empty() {
        Ok(POLICIES_PATH.to_owned())
    } else {
        Ok(format!("{POLICIES_PATH}?{query}"))
    }
}

/// The `nextPageToken` query parameter of the `next` link, if any.
fn next_page_token(links: Option<&ListLinks>) -> Option<String> {
    let next = links?.next.as_deref()?;
    let url = match Url::parse(next) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse("http://localhost/").ok()?.join(next).ok()?
        }
        Err(_) => return None,
    };
    url.query_pairs()
        .find(|(key, _)| key == NEXT_PAGE_TOKEN)
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl PolicyClient for RestPolicyClient {
    async fn list(&self, options: ListOptions) -> Result<Page<Policy>, PolicyClientError> {
        let path = list_path(&options)?;
        let response: PolicyListResponse = self
            .send_json(Method::GET, &path, None, RequestOptions::default())
            .await?;
        Ok(Page {
            next_page_token: next_page_token(response.links.as_ref()),
            items: response.items,
        })
    }

    async fn create(&self, policy: &Policy) -> Result<Policy, PolicyClientError> {
        let body = serde_json::to_value(policy)?;
        self.send_json(Method::POST, POLICIES_PATH, Some(&body), RequestOptions::default())
            .await
    }

    async fn get(&self, name: &str) -> Result<Policy, PolicyClientError> {
        self.send_json(Method::GET, &policy_path(name), None, RequestOptions::default())
            .await
    }

    async fn update(&self, name: &str, policy: &Policy) -> Result<Policy, PolicyClientError> {
        let body = serde_json::to_value(policy)?;
        self.send_json(
            Method::PUT,
            &policy_path(name),
            Some(&body),
            RequestOptions::default(),
        )
        .await
    }

    async fn delete(&self, name: &str) -> Result<(), PolicyClientError> {
        self.send(Method::DELETE, &policy_path(name), None, RequestOptions::default())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountClient for RestPolicyClient {
    async fn list_accounts(&self) -> Result<Vec<Account>, PolicyClientError> {
        let response: AccountListResponse = self
            .send_json(
                Method::GET,
                ACCOUNTS_PATH,
                None,
                RequestOptions { omit_account: true },
            )
            .await?;
        Ok(response.accounts)
    }
}
