/// Authorization bridge tests.
///
/// Collaborators are mockall doubles; no host middleware is involved.
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_graphql::Value;
    use async_graphql::dynamic::{Field, FieldFuture, Object, Schema, TypeRef};

    use crate::auth::{
        ACCESS_DENIED, Ability, AuthError, AuthHook, MockAuthenticator, MockPolicy, authorized,
        check,
    };
    use crate::context::RequestContext;

    fn authenticator(authenticated: bool) -> Arc<MockAuthenticator> {
        let mut auth = MockAuthenticator::new();
        auth.expect_check().returning(move || Ok(authenticated));
        Arc::new(auth)
    }

    fn denying(denied: &'static str) -> Arc<MockPolicy> {
        let mut policy = MockPolicy::new();
        policy
            .expect_denies()
            .returning(move |ability| Ok(ability.name() == denied));
        Arc::new(policy)
    }

    // ─── check() ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn missing_authenticator_fails_closed() {
        let ctx = RequestContext::default();

        let err = check(&ctx, &[]).await.unwrap_err();

        assert!(matches!(err, AuthError::UnavailableFeature("authenticator")));
    }

    #[tokio::test]
    async fn unauthenticated_request_is_denied() {
        let mut policy = MockPolicy::new();
        policy.expect_denies().never();
        let ctx = RequestContext::with_auth_and_policy(authenticator(false), Arc::new(policy));

        let allowed = check(&ctx, &[Ability::new("posts.create")]).await.unwrap();

        assert!(!allowed);
    }

    #[tokio::test]
    async fn authenticated_without_abilities_is_allowed() {
        let ctx = RequestContext::with_auth(authenticator(true));

        assert!(check(&ctx, &[]).await.unwrap());
    }

    #[tokio::test]
    async fn abilities_without_policy_fail_closed() {
        let ctx = RequestContext::with_auth(authenticator(true));

        let err = check(&ctx, &[Ability::new("posts.create")])
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::UnavailableFeature("policy")));
    }

    #[tokio::test]
    async fn all_abilities_must_be_allowed() {
        let ctx = RequestContext::with_auth_and_policy(authenticator(true), denying("posts.delete"));

        let allowed = check(
            &ctx,
            &[Ability::new("posts.create"), Ability::new("posts.update")],
        )
        .await
        .unwrap();
        assert!(allowed);

        let allowed = check(
            &ctx,
            &[Ability::new("posts.create"), Ability::new("posts.delete")],
        )
        .await
        .unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn collaborator_errors_propagate() {
        let mut auth = MockAuthenticator::new();
        auth.expect_check()
            .returning(|| Err("session store unreachable".into()));
        let ctx = RequestContext::with_auth(Arc::new(auth));

        let err = check(&ctx, &[]).await.unwrap_err();

        assert!(matches!(err, AuthError::Collaborator(_)));
    }

    // ─── authorized() field wrapper ───────────────────────────────────────────

    fn secret_schema() -> Schema {
        let query = Object::new("Query").field(Field::new(
            "secret",
            TypeRef::named(TypeRef::STRING),
            authorized([Ability::new("secrets.read")], |_| {
                FieldFuture::new(async { Ok::<_, async_graphql::Error>(Some(Value::from("s3cr3t"))) })
            }),
        ));
        Schema::build("Query", None, None)
            .register(query)
            .data(AuthHook::default())
            .finish()
            .unwrap()
    }

    #[tokio::test]
    async fn authorized_field_resolves_when_allowed() {
        let ctx = RequestContext::with_auth_and_policy(authenticator(true), denying("nothing"));

        let res = secret_schema()
            .execute(async_graphql::Request::new("{ secret }").data(ctx))
            .await;

        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(
            res.data.into_json().unwrap(),
            serde_json::json!({ "secret": "s3cr3t" })
        );
    }

    #[tokio::test]
    async fn authorized_field_reports_access_denied() {
        let ctx = RequestContext::with_auth_and_policy(authenticator(true), denying("secrets.read"));

        let res = secret_schema()
            .execute(async_graphql::Request::new("{ secret }").data(ctx))
            .await;

        assert_eq!(res.errors.len(), 1);
        assert_eq!(res.errors[0].message, ACCESS_DENIED);
    }

    #[tokio::test]
    async fn authorized_field_without_request_context_is_an_error() {
        let res = secret_schema()
            .execute(async_graphql::Request::new("{ secret }"))
            .await;

        assert_eq!(res.errors.len(), 1);
    }
}
