//! Service description and registration glue.
//!
//! # Responsibilities
//! - Describe an RPC service structurally (package, service, version,
//!   contract, per-method verb and path overrides)
//! - Check implementations against the full contract before anything
//!   is installed
//! - Build one route per method whose handler runs the dispatch
//!   pipeline: collect body, decode, invoke, encode exactly once
//!
//! # Design Decisions
//! - Conformance is a capability set the implementation advertises, and
//!   every missing method is reported in one error
//! - The decode step fails fast: an undecodable body produces an error
//!   response without the implementation ever running
//! - Route building is separate from installation so registration can
//!   stay all-or-nothing at the table

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

use crate::context::RequestContext;
use crate::routing::RouteSpec;
use crate::rpc::codec::MessageCodec;
use crate::rpc::error::ServiceError;

/// Strategy producing the route path for a described method.
pub type PathFormat = fn(version: &str, package: &str, service: &str, method: &str) -> String;

/// Default path format: `/v1/pkg.Service/Method`.
pub fn default_path_format(version: &str, package: &str, service: &str, method: &str) -> String {
    format!("/{version}/{package}.{service}/{method}")
}

/// Capability set advertised by a service implementation.
///
/// Registration checks the description's full contract against this set
/// and rejects the service before any route exists when a method is
/// missing.
pub trait Capabilities {
    /// Whether the implementation provides the named method.
    fn provides(&self, method: &str) -> bool;
}

/// Dispatch function installed for one method.
///
/// Receives the shared implementation, the already derived context, the
/// raw request and the server's codec.
pub type MethodHandler<S> = Arc<
    dyn Fn(
            Arc<S>,
            RequestContext,
            Request<Body>,
            Arc<dyn MessageCodec>,
        ) -> BoxFuture<'static, Response>
        + Send
        + Sync,
>;

/// Description of one method of a service.
pub struct MethodDescription<S> {
    pub(crate) name: String,
    pub(crate) http_method: Option<Method>,
    pub(crate) http_path: Option<String>,
    pub(crate) handler: MethodHandler<S>,
}

impl<S> MethodDescription<S> {
    /// Describe a method by name with its dispatch function.
    pub fn new(name: impl Into<String>, handler: MethodHandler<S>) -> Self {
        Self {
            name: name.into(),
            http_method: None,
            http_path: None,
            handler,
        }
    }

    /// Override the HTTP verb for this method only.
    pub fn http_method(mut self, method: Method) -> Self {
        self.http_method = Some(method);
        self
    }

    /// Override the full route path for this method only.
    pub fn http_path(mut self, path: impl Into<String>) -> Self {
        self.http_path = Some(path.into());
        self
    }

    /// The described method name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Structural description of an RPC service.
pub struct ServiceDescription<S> {
    pub(crate) package: String,
    pub(crate) service: String,
    pub(crate) version: String,
    pub(crate) default_method: Method,
    pub(crate) contract: Vec<String>,
    pub(crate) methods: Vec<MethodDescription<S>>,
}

impl<S> ServiceDescription<S> {
    /// Describe a service. The version defaults to `"v1"` and the
    /// default verb to `POST`.
    pub fn new(package: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            service: service.into(),
            version: "v1".to_string(),
            default_method: Method::POST,
            contract: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Override the version segment of generated paths.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Override the verb used by methods without their own.
    pub fn default_method(mut self, method: Method) -> Self {
        self.default_method = method;
        self
    }

    /// Declare the full method-name contract. When unset, the declared
    /// methods themselves form the contract.
    pub fn contract<I, T>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.contract = names.into_iter().map(Into::into).collect();
        self
    }

    /// Add a method description.
    pub fn method(mut self, method: MethodDescription<S>) -> Self {
        self.methods.push(method);
        self
    }

    /// `package.Service` as used in paths and errors.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.package, self.service)
    }

    fn contract_names(&self) -> Vec<&str> {
        if self.contract.is_empty() {
            self.methods.iter().map(|m| m.name.as_str()).collect()
        } else {
            self.contract.iter().map(String::as_str).collect()
        }
    }
}

/// Error returned when service registration is rejected.
///
/// Registration is all-or-nothing: on any error the route table is left
/// exactly as it was.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The implementation does not provide every contract method.
    #[error("implementation {implementation} does not satisfy {service}: missing {}", .missing.join(", "))]
    Conformance {
        /// Qualified service name from the description.
        service: String,
        /// Implementation type that failed the check.
        implementation: &'static str,
        /// Every contract method the implementation lacks.
        missing: Vec<String>,
    },
}

/// Build the dispatch pipeline for one unary method.
///
/// The produced handler collects the body under the context's read
/// budget, decodes it through the codec, converts to the typed input,
/// invokes the method and encodes the outcome. Decode failures return
/// before the method runs; the codec encodes exactly once either way.
pub fn unary<S, In, Out, F, Fut>(method: F) -> MethodHandler<S>
where
    S: Send + Sync + 'static,
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + 'static,
    F: Fn(Arc<S>, RequestContext, In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, ServiceError>> + Send + 'static,
{
    let method = Arc::new(method);
    Arc::new(move |service, ctx, req, codec| {
        let method = Arc::clone(&method);
        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let collected = match tokio::time::timeout(
                ctx.read_timeout(),
                axum::body::to_bytes(body, usize::MAX),
            )
            .await
            {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(err)) => {
                    return codec.encode_response(Err(ServiceError::invalid_message(format!(
                        "reading request body: {err}"
                    ))));
                }
                Err(_) => {
                    return codec.encode_response(Err(ServiceError::deadline_exceeded(
                        "request body read timed out",
                    )));
                }
            };

            let value = match codec.decode_request(&parts, &collected) {
                Ok(value) => value,
                Err(err) => return codec.encode_response(Err(err)),
            };
            let input: In = match serde_json::from_value(value) {
                Ok(input) => input,
                Err(err) => return codec.encode_response(Err(ServiceError::from(err))),
            };

            let outcome = match method(service, ctx, input).await {
                Ok(out) => match serde_json::to_value(&out) {
                    Ok(value) => Ok(value),
                    Err(err) => Err(ServiceError::internal(format!(
                        "encoding response message: {err}"
                    ))),
                },
                Err(err) => Err(err),
            };
            codec.encode_response(outcome)
        })
    })
}

/// Check conformance and build one route spec per described method.
///
/// Nothing is installed here; the server appends the returned specs to
/// its table in one step, which keeps registration atomic.
pub(crate) fn build_routes<S>(
    desc: ServiceDescription<S>,
    implementation: S,
    codec: Arc<dyn MessageCodec>,
    path_format: PathFormat,
) -> Result<Vec<RouteSpec>, RegisterError>
where
    S: Capabilities + Send + Sync + 'static,
{
    let missing: Vec<String> = desc
        .contract_names()
        .iter()
        .filter(|name| !implementation.provides(name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(RegisterError::Conformance {
            service: desc.qualified_name(),
            implementation: std::any::type_name::<S>(),
            missing,
        });
    }

    let service = Arc::new(implementation);
    let mut specs = Vec::with_capacity(desc.methods.len());
    for method in desc.methods {
        let path = method.http_path.clone().unwrap_or_else(|| {
            path_format(&desc.version, &desc.package, &desc.service, &method.name)
        });
        let verb = method
            .http_method
            .clone()
            .unwrap_or_else(|| desc.default_method.clone());

        let service = Arc::clone(&service);
        let codec = Arc::clone(&codec);
        let handler = method.handler;
        let glue = move |req: Request<Body>| {
            let service = Arc::clone(&service);
            let codec = Arc::clone(&codec);
            let handler = Arc::clone(&handler);
            async move {
                let ctx = match RequestContext::of(&req) {
                    Some(ctx) => ctx.clone(),
                    None => {
                        return codec.encode_response(Err(ServiceError::internal(
                            "request context missing",
                        )));
                    }
                };
                let ctx = codec.derive_context(&req, ctx);
                handler(service, ctx, req, Arc::clone(&codec)).await
            }
        };

        specs.push(
            RouteSpec::new()
                .pattern(path)
                .methods([verb.as_str()])
                .handler(glue),
        );
    }
    Ok(specs)
}
