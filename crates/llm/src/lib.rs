use std::sync::Arc;

mod chatbase;
mod endpoint;
mod gateway;
mod notice;

pub use chatbase::{CHATBASE_ENDPOINT_ID, ChatbaseEndpoint, DEFAULT_CHATBASE_ENDPOINT};
pub use endpoint::{
    ChatRequest, ChatbotEndpoint, EndpointConfig, EndpointError, EndpointResult,
    RequestMetadata, WireMessage, WireRole,
};
pub use gateway::{MessageGateway, Reply};
pub use notice::{CONNECTION_FAILED_NOTICE, Notice, NoticeKind, Notifier, SEND_FAILED_NOTICE};

pub fn create_endpoint(config: EndpointConfig) -> EndpointResult<Arc<dyn ChatbotEndpoint>> {
    Ok(Arc::new(ChatbaseEndpoint::new(config)?))
}
