use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::{
    Error,
    auth::{ADMIN, CredentialStore},
    util::get_header,
};

pub const ADMIN_TOKEN_HEADER: &str = "admin-token";
pub const USER_TOKEN_HEADER: &str = "user-token";

/// Lets a request through only when its `admin-token` header verifies as the
/// administrator credential.
#[derive(Clone)]
pub struct AdminLayer {
    store: Arc<CredentialStore>,
}

impl AdminLayer {
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }
}

impl<S> Layer<S> for AdminLayer {
    type Service = AdminMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AdminMiddleware {
            inner,
            store: self.store.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AdminMiddleware<S> {
    inner: S,
    store: Arc<CredentialStore>,
}

impl<S> Service<Request> for AdminMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = AdminFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let Some(secret) = get_header(req.headers(), ADMIN_TOKEN_HEADER) else {
            return AdminFuture::rejected(Error::unauthorized(ADMIN, "missing admin-token header"));
        };
        if self.store.verify(&secret, ADMIN) {
            AdminFuture::Authorized {
                inner: self.inner.call(req),
            }
        } else {
            warn!("rejected request with invalid admin token");
            AdminFuture::rejected(Error::unauthorized(ADMIN, "invalid admin token"))
        }
    }
}

pin_project! {
    #[project = AdminFutureProj]
    pub enum AdminFuture<F> {
        Authorized {
            #[pin]
            inner: F,
        },
        Rejected {
            response: Option<Response>,
        },
    }
}

impl<F> AdminFuture<F> {
    fn rejected(error: Error) -> Self {
        Self::Rejected {
            response: Some(error.into_response()),
        }
    }
}

impl<F, E> Future for AdminFuture<F>
where
    F: Future<Output = Result<Response, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            AdminFutureProj::Authorized { inner } => inner.poll(cx),
            AdminFutureProj::Rejected { response } => {
                let response = response.take().expect("AdminFuture polled after completion");
                Poll::Ready(Ok(response))
            }
        }
    }
}
