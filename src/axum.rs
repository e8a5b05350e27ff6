//! Axum integration utilities.
//!
//! [`TenantLayer`] resolves the tenant from the `Host` header, [`GuardLayer`]
//! protects a route subtree and [`PageContext`] is an extractor for pages.
//! Both the guard and the extractor read [`AuthProviders`] from the request
//! extensions, typically inserted with `axum::Extension`.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::context::{AuthProviders, PageContext};
use crate::guard::{Guard, GuardOutcome};
use crate::resolver::TenantResolver;
use crate::role::Area;
use crate::types::TenantSlug;

use ::axum::body::Body;
use ::axum::extract::FromRequestParts;
use ::axum::http::request::Parts;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::http::header::{HOST, LOCATION};
use ::http::{HeaderMap, HeaderValue, Uri};
use ::tower::{Layer, Service};

/// Tenant resolved from the request host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTenant(pub Option<TenantSlug>);

/// Middleware layer inserting [`ResolvedTenant`] into every request.
#[derive(Debug, Clone)]
pub struct TenantLayer {
    resolver: Arc<TenantResolver>,
}

impl TenantLayer {
    /// Resolves tenants with `resolver`.
    pub fn new(resolver: TenantResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }
}

impl<S> Layer<S> for TenantLayer {
    type Service = TenantService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TenantService {
            inner,
            resolver: self.resolver.clone(),
        }
    }
}

/// Middleware service that resolves the tenant before calling `S`.
#[derive(Debug, Clone)]
pub struct TenantService<S> {
    inner: S,
    resolver: Arc<TenantResolver>,
}

impl<S> Service<Request<Body>> for TenantService<S>
where
    S: Service<Request<Body>, Response = Response>,
{
    type Response = Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let tenant = request_authority(req.headers(), req.uri())
            .and_then(|authority| self.resolver.resolve_authority(&authority));
        req.extensions_mut().insert(ResolvedTenant(tenant));
        self.inner.call(req)
    }
}

/// Host header, or the URI authority for absolute-form requests.
fn request_authority(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|authority| authority.as_str().to_string()))
}

/// Middleware layer applying a [`Guard`] to a route subtree.
#[derive(Debug, Clone)]
pub struct GuardLayer {
    guard: Arc<Guard>,
}

impl GuardLayer {
    /// Wraps routes with `guard`.
    pub fn new(guard: Guard) -> Self {
        Self {
            guard: Arc::new(guard),
        }
    }
}

impl<Inner> Layer<Inner> for GuardLayer {
    type Service = GuardService<Inner>;

    fn layer(&self, inner: Inner) -> Self::Service {
        GuardService {
            inner,
            guard: self.guard.clone(),
        }
    }
}

/// Middleware service that enforces a [`Guard`].
#[derive(Debug, Clone)]
pub struct GuardService<Inner> {
    inner: Inner,
    guard: Arc<Guard>,
}

impl<Inner> Service<Request<Body>> for GuardService<Inner>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let guard = self.guard.clone();

        Box::pin(async move {
            let outcome = match guard_outcome(&guard, req.extensions()) {
                Ok(outcome) => outcome,
                Err(rejection) => return Ok(rejection.into_response()),
            };
            match outcome {
                GuardOutcome::Render => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                GuardOutcome::Loading => Ok((StatusCode::OK, "loading").into_response()),
                GuardOutcome::Redirect(redirect) => Ok(see_other(&redirect.to)),
            }
        })
    }
}

fn guard_outcome(
    guard: &Guard,
    extensions: &::http::Extensions,
) -> Result<GuardOutcome, GateRejection> {
    let providers = extensions
        .get::<AuthProviders>()
        .ok_or_else(|| GateRejection::internal("auth providers missing"))?;
    let handle = providers
        .for_area(guard.area())
        .map_err(|err| GateRejection::internal(err.to_string()))?;
    let tenant = match guard.area() {
        Area::Platform => None,
        Area::Tenant => request_tenant(extensions).or_else(|| handle.resolved_tenant()),
    };
    let outcome = guard.decide(
        handle.is_loading(),
        handle.principal().as_ref(),
        tenant.as_ref(),
    );
    tracing::debug!(area = %guard.area(), outcome = ?outcome, "request guarded");
    Ok(outcome)
}

fn request_tenant(extensions: &::http::Extensions) -> Option<TenantSlug> {
    extensions
        .get::<ResolvedTenant>()
        .and_then(|resolved| resolved.0.clone())
}

fn see_other(to: &str) -> Response {
    match HeaderValue::from_str(to) {
        Ok(location) => (StatusCode::SEE_OTHER, [(LOCATION, location)]).into_response(),
        Err(_) => GateRejection::internal("invalid redirect target").into_response(),
    }
}

/// Rejection type for the guard and extractors.
#[derive(Debug)]
pub struct GateRejection {
    status: StatusCode,
    message: String,
}

impl GateRejection {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// HTTP status sent for this rejection.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

impl<S> FromRequestParts<S> for PageContext
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let providers = parts
            .extensions
            .get::<AuthProviders>()
            .ok_or_else(|| GateRejection::internal("auth providers missing"))?;
        let area = providers
            .config()
            .area_of(parts.uri.path())
            .ok_or_else(|| GateRejection {
                status: StatusCode::NOT_FOUND,
                message: "no area for path".to_string(),
            })?;
        let handle = providers
            .for_area(area)
            .map_err(|err| GateRejection::internal(err.to_string()))?;
        let principal = handle.principal().ok_or_else(|| GateRejection {
            status: StatusCode::UNAUTHORIZED,
            message: "not signed in".to_string(),
        })?;
        let tenant = match area {
            Area::Platform => None,
            Area::Tenant => request_tenant(&parts.extensions).or_else(|| handle.resolved_tenant()),
        };
        Ok(PageContext::new(principal, tenant))
    }
}

#[cfg(all(test, feature = "memory-store"))]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::context::{AuthContext, AuthHandle};
    use crate::directory::UserDirectory;
    use crate::location::MemoryLocation;
    use crate::memory_directory::MemoryDirectory;
    use crate::permission::Permission;
    use crate::service::AuthService;
    use crate::session::SessionStore;
    use crate::storage::{BackendChain, MemoryBackend};
    use crate::types::Email;
    use ::axum::Router;
    use ::axum::routing::get;
    use ::tower::ServiceExt;

    fn providers(url: &str, signed_in: bool, init: bool) -> AuthProviders {
        let config = Arc::new(GateConfig::default());
        let location = Arc::new(MemoryLocation::parse(url).unwrap());
        let session = Arc::new(SessionStore::new(
            BackendChain::session_then_persistent(
                MemoryBackend::new("session"),
                MemoryBackend::new("local"),
            ),
            location,
            &config,
        ));
        let directory = MemoryDirectory::demo().unwrap();
        if signed_in {
            let email = Email::try_from("admin@empresaA.com").unwrap();
            let principal = futures::executor::block_on(directory.verify(&email, ""))
                .unwrap()
                .unwrap();
            session.save(&principal).unwrap();
        }
        let mut providers = AuthProviders::new(config.clone());
        for area in [Area::Platform, Area::Tenant] {
            let service = AuthService::new(area, directory.clone(), session.clone(), config.clone());
            let context: Arc<dyn AuthHandle> = Arc::new(AuthContext::new(service));
            if init {
                context.init();
            }
            providers = providers.provide(context);
        }
        providers
    }

    async fn events(page: PageContext) -> String {
        let can_validate = page.has_permission(&Permission::try_from("events:validate").unwrap());
        format!(
            "{}:{}",
            page.tenant_slug().map(|slug| slug.as_str()).unwrap_or("-"),
            can_validate
        )
    }

    fn app(providers: Option<AuthProviders>) -> Router {
        let config = GateConfig::default();
        let router = Router::new()
            .route("/s/events", get(events))
            .layer(GuardLayer::new(Guard::tenant(&config)))
            .layer(TenantLayer::new(TenantResolver::from_config(&config)));
        match providers {
            Some(providers) => router.layer(::axum::Extension(providers)),
            None => router,
        }
    }

    fn request(host: &str) -> Request<Body> {
        Request::builder()
            .uri("/s/events")
            .header(HOST, host)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = ::axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn signed_out_request_should_redirect_to_login() {
        let providers = providers("http://empresaa.localhost/s/events", false, true);
        let response = app(Some(providers))
            .oneshot(request("empresaa.localhost:3000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/s/login");
    }

    #[tokio::test]
    async fn signed_in_request_should_reach_page() {
        let providers = providers("http://empresaa.localhost/s/events", true, true);
        let response = app(Some(providers))
            .oneshot(request("empresaa.localhost:3000"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "empresaa:true");
    }

    #[tokio::test]
    async fn host_of_other_tenant_should_be_unauthorized() {
        let providers = providers("http://empresaa.localhost/s/events", true, true);
        let response = app(Some(providers))
            .oneshot(request("empresab.localhost"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(LOCATION).unwrap(), "/unauthorized");
    }

    #[tokio::test]
    async fn loading_context_should_render_placeholder() {
        let providers = providers("http://empresaa.localhost/s/events", true, false);
        let response = app(Some(providers))
            .oneshot(request("empresaa.localhost"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "loading");
    }

    #[tokio::test]
    async fn missing_providers_should_be_server_error() {
        let response = app(None)
            .oneshot(request("empresaa.localhost"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn authority_should_fall_back_to_uri() {
        let uri: Uri = "http://empresab.localhost:8080/s".parse().unwrap();
        assert_eq!(
            request_authority(&HeaderMap::new(), &uri).as_deref(),
            Some("empresab.localhost:8080")
        );
    }
}
