mod api;
mod config;
mod error;

mod data_objects;
pub mod helpers;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use data_objects::{
    CalculatedOrder,
    Metadata,
    Money,
    NetAmounts,
    OrderPayload,
    PaymentRefund,
    RemoteCustomer,
    RemoteDiscount,
    RemoteLineItem,
    RemoteOrder,
    RemoteRefund,
    RemoteServiceCharge,
    RemoteTax,
    Tender,
    WebhookData,
    WebhookEvent,
};
pub use error::GatewayApiError;
