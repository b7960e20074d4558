#[cfg(feature = "lambda")]
use base64::{engine::general_purpose, Engine as _};
#[cfg(feature = "lambda")]
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
#[cfg(feature = "lambda")]
use scan_chef::utils::{logger, validation::Validate};
#[cfg(feature = "lambda")]
use scan_chef::{
    ChefError, FunctionConfig, FunctionRequest, FunctionResponse, GenerationFunction,
    OpenAiProvider,
};
#[cfg(feature = "lambda")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "lambda")]
use std::collections::HashMap;
#[cfg(feature = "lambda")]
use std::sync::Arc;

/// API Gateway / function URL proxy event (payload v1 or v2).
#[cfg(feature = "lambda")]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    pub http_method: Option<String>,
    pub request_context: Option<RequestContext>,
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[cfg(feature = "lambda")]
#[derive(Debug, Deserialize)]
pub struct RequestContext {
    pub http: Option<HttpContext>,
}

#[cfg(feature = "lambda")]
#[derive(Debug, Deserialize)]
pub struct HttpContext {
    pub method: String,
}

#[cfg(feature = "lambda")]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

#[cfg(feature = "lambda")]
impl TryFrom<ProxyRequest> for FunctionRequest {
    type Error = ChefError;

    fn try_from(event: ProxyRequest) -> Result<Self, ChefError> {
        let body = match event.body {
            Some(raw) if event.is_base64_encoded => Some(decode_body(&raw)?),
            other => other,
        };
        let method = event
            .http_method
            .or_else(|| {
                event
                    .request_context
                    .and_then(|ctx| ctx.http)
                    .map(|http| http.method)
            })
            .unwrap_or_else(|| "POST".to_string());

        Ok(FunctionRequest { method, body })
    }
}

#[cfg(feature = "lambda")]
fn decode_body(raw: &str) -> Result<String, ChefError> {
    let bytes = general_purpose::STANDARD
        .decode(raw.trim())
        .map_err(|e| ChefError::InvalidRequest {
            message: format!("body is not valid base64: {}", e),
        })?;
    String::from_utf8(bytes).map_err(|_| ChefError::InvalidRequest {
        message: "body is not UTF-8 text".to_string(),
    })
}

#[cfg(feature = "lambda")]
impl From<FunctionResponse> for ProxyResponse {
    fn from(response: FunctionResponse) -> Self {
        Self {
            status_code: response.status,
            headers: response.headers.into_iter().collect(),
            body: response.body,
            is_base64_encoded: false,
        }
    }
}

#[cfg(feature = "lambda")]
async fn function_handler(
    function: Arc<GenerationFunction<OpenAiProvider>>,
    event: LambdaEvent<ProxyRequest>,
) -> Result<ProxyResponse, Error> {
    let request = match FunctionRequest::try_from(event.payload) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Rejected undecodable request: {}", e);
            return Ok(FunctionResponse::from_error(&e).into());
        }
    };
    tracing::info!("Handling {} request", request.method);

    let response = function.handle(&request).await;
    tracing::info!("Responded with status {}", response.status);
    Ok(response.into())
}

#[cfg(feature = "lambda")]
#[tokio::main]
async fn main() -> Result<(), Error> {
    logger::init_lambda_logger();

    let config = FunctionConfig::load()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
    config
        .validate()
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

    let function = Arc::new(GenerationFunction::new(OpenAiProvider::new(&config)));

    run(service_fn(move |event| {
        let function = Arc::clone(&function);
        async move { function_handler(function, event).await }
    }))
    .await
}
