use std::marker::PhantomData;

use futures::{future::LocalBoxFuture, FutureExt};
use reqwest::{Client, RequestBuilder, Response};

use super::{Gateway, GatewayError};
use crate::{Entity, GatewayConfig};

/// A [`Gateway`] for a JSON REST API.
///
/// | operation | request                      |
/// | --------- | ---------------------------- |
/// | `list`    | `GET {base_url}/{feature}`      |
/// | `create`  | `POST {base_url}/{feature}`     |
/// | `update`  | `PUT {base_url}/{feature}/{id}` |
/// | `delete`  | `DELETE {base_url}/{feature}/{id}` |
pub struct HttpGateway<T> {
    client: Client,
    config: GatewayConfig,
    feature: String,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: Entity> HttpGateway<T> {
    pub fn new(config: GatewayConfig, feature: impl Into<String>) -> Result<Self, GatewayError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(from_reqwest)?;
        Ok(Self {
            client,
            config,
            feature: feature.into(),
            _phantom: PhantomData,
        })
    }

    fn url(&self, id: Option<&str>) -> String {
        self.config.url(&self.feature, id)
    }
}

async fn send(request: RequestBuilder) -> Result<Response, GatewayError> {
    let response = request.send().await.map_err(from_reqwest)?;
    let status = response.status();
    if !status.is_success() {
        return Err(GatewayError::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
        ));
    }
    Ok(response)
}

fn from_reqwest(e: reqwest::Error) -> GatewayError {
    match e.status() {
        Some(status) => GatewayError::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
        ),
        None => GatewayError::transport(e.to_string()),
    }
}

impl<T: Entity> Gateway<T> for HttpGateway<T> {
    fn list(&self) -> LocalBoxFuture<'_, Result<Vec<T>, GatewayError>> {
        async move {
            let response = send(self.client.get(self.url(None))).await?;
            response.json().await.map_err(from_reqwest)
        }
        .boxed_local()
    }

    fn create<'a>(&'a self, draft: &'a T::Draft) -> LocalBoxFuture<'a, Result<T, GatewayError>> {
        async move {
            let response = send(self.client.post(self.url(None)).json(draft)).await?;
            response.json().await.map_err(from_reqwest)
        }
        .boxed_local()
    }

    fn update<'a>(&'a self, entity: &'a T) -> LocalBoxFuture<'a, Result<T, GatewayError>> {
        async move {
            let url = self.url(Some(entity.id()));
            let response = send(self.client.put(url).json(entity)).await?;
            response.json().await.map_err(from_reqwest)
        }
        .boxed_local()
    }

    fn delete<'a>(&'a self, id: &'a str) -> LocalBoxFuture<'a, Result<(), GatewayError>> {
        async move {
            send(self.client.delete(self.url(Some(id)))).await?;
            Ok(())
        }
        .boxed_local()
    }
}
