use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use crate::{
    config::GatewayConfig,
    CalculatedOrder,
    GatewayApiError,
    Money,
    OrderPayload,
    PaymentRefund,
    RemoteCustomer,
    RemoteOrder,
};

#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

#[derive(Deserialize)]
struct OrderResponse {
    order: Option<RemoteOrder>,
}

#[derive(Deserialize)]
struct CalculateResponse {
    order: Option<CalculatedOrder>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(3);
        let bearer = HeaderValue::from_str(format!("Bearer {}", config.access_token.reveal()).as_str())
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        let version = HeaderValue::from_str(config.api_version.as_str())
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert("Square-Version", version);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| GatewayApiError::RestResponseError(e.to_string()))?;
            Err(GatewayApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v2{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Asks the gateway to price the given payload without creating anything.
    pub async fn calculate_order(
        &self,
        payload: &OrderPayload,
        idempotency_key: &str,
    ) -> Result<CalculatedOrder, GatewayApiError> {
        let body = json!({ "order": payload, "idempotency_key": idempotency_key });
        debug!("Calculating order for reference {}", payload.reference_id);
        let result = self.rest_query::<CalculateResponse, _>(Method::POST, "/orders/calculate", Some(body)).await?;
        result.order.ok_or(GatewayApiError::EmptyResponse)
    }

    pub async fn create_order(
        &self,
        payload: &OrderPayload,
        idempotency_key: &str,
    ) -> Result<RemoteOrder, GatewayApiError> {
        let body = json!({ "order": payload, "idempotency_key": idempotency_key });
        debug!("Creating order for reference {}", payload.reference_id);
        let result = self.rest_query::<OrderResponse, _>(Method::POST, "/orders", Some(body)).await?;
        let order = result.order.ok_or(GatewayApiError::EmptyResponse)?;
        info!("Created remote order {} (v{}) for reference {}", order.id, order.version, payload.reference_id);
        Ok(order)
    }

    pub async fn update_order(
        &self,
        order_id: &str,
        payload: &OrderPayload,
        idempotency_key: &str,
    ) -> Result<RemoteOrder, GatewayApiError> {
        let body = json!({ "order": payload, "idempotency_key": idempotency_key });
        let path = format!("/orders/{order_id}");
        debug!("Updating remote order {order_id} at version {:?}", payload.version);
        let result = self.rest_query::<OrderResponse, _>(Method::PUT, &path, Some(body)).await?;
        let order = result.order.ok_or(GatewayApiError::EmptyResponse)?;
        info!("Updated remote order {order_id}. Now at v{}", order.version);
        Ok(order)
    }

    pub async fn get_order(&self, order_id: &str) -> Result<RemoteOrder, GatewayApiError> {
        let path = format!("/orders/{order_id}");
        debug!("Fetching remote order {order_id}");
        let result = self.rest_query::<OrderResponse, ()>(Method::GET, &path, None).await?;
        result.order.ok_or(GatewayApiError::EmptyResponse)
    }

    pub async fn get_customer(&self, customer_id: &str) -> Result<RemoteCustomer, GatewayApiError> {
        #[derive(Deserialize)]
        struct CustomerResponse {
            customer: Option<RemoteCustomer>,
        }
        let path = format!("/customers/{customer_id}");
        debug!("Fetching customer {customer_id}");
        let result = self.rest_query::<CustomerResponse, ()>(Method::GET, &path, None).await?;
        result.customer.ok_or(GatewayApiError::EmptyResponse)
    }

    pub async fn refund_payment(
        &self,
        idempotency_key: &str,
        payment_id: &str,
        amount: &Money,
    ) -> Result<PaymentRefund, GatewayApiError> {
        #[derive(Deserialize)]
        struct RefundResponse {
            refund: Option<PaymentRefund>,
        }
        let body = json!({
            "idempotency_key": idempotency_key,
            "payment_id": payment_id,
            "amount_money": amount,
        });
        debug!("Requesting refund of {} {} for payment {payment_id}", amount.amount, amount.currency);
        let result = self.rest_query::<RefundResponse, _>(Method::POST, "/refunds", Some(body)).await?;
        let refund = result.refund.ok_or(GatewayApiError::EmptyResponse)?;
        info!("Refund {} for payment {payment_id} is {}", refund.id, refund.status);
        Ok(refund)
    }
}
