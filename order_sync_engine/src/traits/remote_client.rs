use gateway_tools::{
    CalculatedOrder,
    GatewayApi,
    GatewayApiError,
    Money,
    OrderPayload,
    PaymentRefund,
    RemoteCustomer,
    RemoteOrder,
};

/// The gateway operations the engine depends on.
#[allow(async_fn_in_trait)]
pub trait RemoteClient: Clone {
    /// Prices `payload` without creating anything on the gateway.
    async fn calculate(&self, payload: &OrderPayload, idempotency_key: &str)
        -> Result<CalculatedOrder, GatewayApiError>;

    /// Creates a new remote order when `id` is `None`, otherwise updates the existing one. Updates must carry the
    /// last known `version` in the payload.
    async fn upsert_order(
        &self,
        id: Option<&str>,
        payload: &OrderPayload,
        idempotency_key: &str,
    ) -> Result<RemoteOrder, GatewayApiError>;

    async fn get_order(&self, id: &str) -> Result<RemoteOrder, GatewayApiError>;

    async fn get_customer(&self, id: &str) -> Result<RemoteCustomer, GatewayApiError>;

    async fn refund(
        &self,
        idempotency_key: &str,
        payment_id: &str,
        amount: &Money,
    ) -> Result<PaymentRefund, GatewayApiError>;
}

impl RemoteClient for GatewayApi {
    async fn calculate(
        &self,
        payload: &OrderPayload,
        idempotency_key: &str,
    ) -> Result<CalculatedOrder, GatewayApiError> {
        self.calculate_order(payload, idempotency_key).await
    }

    async fn upsert_order(
        &self,
        id: Option<&str>,
        payload: &OrderPayload,
        idempotency_key: &str,
    ) -> Result<RemoteOrder, GatewayApiError> {
        match id {
            Some(id) => self.update_order(id, payload, idempotency_key).await,
            None => self.create_order(payload, idempotency_key).await,
        }
    }

    async fn get_order(&self, id: &str) -> Result<RemoteOrder, GatewayApiError> {
        GatewayApi::get_order(self, id).await
    }

    async fn get_customer(&self, id: &str) -> Result<RemoteCustomer, GatewayApiError> {
        GatewayApi::get_customer(self, id).await
    }

    async fn refund(
        &self,
        idempotency_key: &str,
        payment_id: &str,
        amount: &Money,
    ) -> Result<PaymentRefund, GatewayApiError> {
        self.refund_payment(idempotency_key, payment_id, amount).await
    }
}
