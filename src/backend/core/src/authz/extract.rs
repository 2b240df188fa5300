//! Axum integration: the current actor as an extractor.
//!
//! Authentication middleware inserts an [`Actor`] into the request extensions;
//! handlers take [`CurrentActor`] and hand it to
//! [`Authorizer::service`](super::service::Authorizer::service).

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;

use super::model::Actor;

/// The authenticated actor of a request, or `None` for anonymous requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentActor(pub Option<Actor>);

impl CurrentActor {
    pub fn into_inner(self) -> Option<Actor> {
        self.0
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Actor>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::model::ActorId;
    use axum::http::Request;

    #[tokio::test]
    async fn test_reads_actor_from_extensions() {
        let actor = Actor::new(ActorId::random());
        let mut request = Request::builder().uri("/").body(()).unwrap();
        request.extensions_mut().insert(actor.clone());
        let (mut parts, _) = request.into_parts();

        let CurrentActor(found) = CurrentActor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(found, Some(actor));
    }

    #[tokio::test]
    async fn test_anonymous_request() {
        let request = Request::builder().uri("/").body(()).unwrap();
        let (mut parts, _) = request.into_parts();

        let current = CurrentActor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(current.into_inner(), None);
    }
}
