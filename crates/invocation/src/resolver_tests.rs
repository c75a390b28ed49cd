use super::*;
use crate::testing::InMemoryRegistry;

const USER_SERVICE: &str = "com.example.user.UserInfoRpcService";

fn provider(host: &str, port: u16) -> String {
    format!("dubbo%3A%2F%2F{host}%3A{port}%2F{USER_SERVICE}%3Fanyhost%3Dtrue%26side%3Dprovider")
}

async fn opened(registry: InMemoryRegistry) -> ServiceResolver<InMemoryRegistry> {
    let mut resolver = ServiceResolver::new(registry);
    resolver.open().await.unwrap();
    resolver
}

#[tokio::test]
async fn test_resolve_returns_providers_in_registry_order() {
    let nodes = [
        provider("10.0.0.1", 20880),
        provider("10.0.0.2", 20881),
        provider("10.0.0.3", 20882),
    ];
    let names: Vec<&str> = nodes.iter().map(String::as_str).collect();
    let resolver = opened(InMemoryRegistry::new().with_service(USER_SERVICE, &names)).await;

    let providers = resolver.resolve("UserInfoRpcService").await.unwrap();

    let authorities: Vec<String> = providers.iter().map(ProviderAddress::authority).collect();
    assert_eq!(
        authorities,
        ["10.0.0.1:20880", "10.0.0.2:20881", "10.0.0.3:20882"]
    );
    assert_eq!(providers[1].host(), "10.0.0.2");
}

#[tokio::test]
async fn test_resolve_accepts_fully_qualified_name() {
    let node = provider("10.0.0.1", 20880);
    let resolver = opened(InMemoryRegistry::new().with_service(USER_SERVICE, &[node.as_str()])).await;

    let providers = resolver.resolve(USER_SERVICE).await.unwrap();

    assert_eq!(providers.len(), 1);
    assert!(providers[0].raw_uri().starts_with("dubbo://10.0.0.1:20880/"));
}

#[tokio::test]
async fn test_unknown_short_name() {
    let node = provider("10.0.0.1", 20880);
    let resolver = opened(InMemoryRegistry::new().with_service(USER_SERVICE, &[node.as_str()])).await;

    let reads_before = resolver.client.calls().lock().unwrap().reads;

    let err = resolver.resolve("OrderService").await.unwrap_err();

    assert!(matches!(err, ResolveError::UnknownService { ref name } if name == "OrderService"));
    assert_eq!(resolver.client.calls().lock().unwrap().reads, reads_before);
}

#[tokio::test]
async fn test_qualified_name_not_registered() {
    let resolver = opened(InMemoryRegistry::new()).await;

    let err = resolver.resolve("com.example.Missing").await.unwrap_err();

    assert!(matches!(
        err,
        ResolveError::ServiceNotAvailable {
            reason: Unavailability::NotRegistered,
            ..
        }
    ));
}

#[tokio::test]
async fn test_service_without_providers_node() {
    let registry = InMemoryRegistry::new().with_service_without_providers(USER_SERVICE);
    let resolver = opened(registry).await;

    let err = resolver.resolve("UserInfoRpcService").await.unwrap_err();

    assert!(matches!(
        err,
        ResolveError::ServiceNotAvailable {
            reason: Unavailability::NoProviders,
            ..
        }
    ));
}

#[tokio::test]
async fn test_empty_providers_node_is_no_providers() {
    let resolver = opened(InMemoryRegistry::new().with_service(USER_SERVICE, &[])).await;

    let err = resolver.resolve(USER_SERVICE).await.unwrap_err();

    match err {
        ResolveError::ServiceNotAvailable { service, reason } => {
            assert_eq!(service, USER_SERVICE);
            assert_eq!(reason, Unavailability::NoProviders);
        }
        other => panic!("expected ServiceNotAvailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_provider_fails_resolution() {
    let good = provider("10.0.0.1", 20880);
    let registry = InMemoryRegistry::new().with_service(USER_SERVICE, &[good.as_str(), "garbage"]);
    let resolver = opened(registry).await;

    let err = resolver.resolve(USER_SERVICE).await.unwrap_err();

    assert!(matches!(err, ResolveError::MalformedProvider(ref e) if e.raw == "garbage"));
}

#[tokio::test]
async fn test_non_numeric_port_fails_resolution() {
    let bad = format!("dubbo%3A%2F%2F10.0.0.1%3Aabc%2F{USER_SERVICE}%3Fside%3Dprovider");
    let registry = InMemoryRegistry::new().with_service(USER_SERVICE, &[bad.as_str()]);
    let resolver = opened(registry).await;

    let err = resolver.resolve("UserInfoRpcService").await.unwrap_err();

    assert!(matches!(err, ResolveError::MalformedProvider(ref e) if e.raw == bad));
}

#[tokio::test]
async fn test_short_name_collision_later_service_wins() {
    let registry = InMemoryRegistry::new()
        .with_service("com.example.a.UserService", &[])
        .with_service("com.example.b.UserService", &[]);
    let resolver = opened(registry).await;

    assert_eq!(
        resolver.qualify("UserService").unwrap(),
        "com.example.b.UserService"
    );
    let services = resolver.services();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].short_name, "UserService");
}

#[tokio::test]
async fn test_services_lists_short_and_qualified_names() {
    let registry = InMemoryRegistry::new()
        .with_service("com.example.order.OrderService", &[])
        .with_service(USER_SERVICE, &[]);
    let resolver = opened(registry).await;

    let services = resolver.services();

    assert_eq!(
        services,
        vec![
            ServiceDescriptor {
                short_name: "OrderService".to_string(),
                fully_qualified_name: "com.example.order.OrderService".to_string(),
            },
            ServiceDescriptor {
                short_name: "UserInfoRpcService".to_string(),
                fully_qualified_name: USER_SERVICE.to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn test_missing_root_means_no_services() {
    let resolver = opened(InMemoryRegistry::new()).await;
    assert!(resolver.services().is_empty());
    assert!(resolver.is_open());
}

#[tokio::test]
async fn test_resolve_before_open_is_not_open() {
    let resolver = ServiceResolver::new(InMemoryRegistry::new().with_service(USER_SERVICE, &[]));

    let err = resolver.resolve(USER_SERVICE).await.unwrap_err();

    assert!(matches!(err, ResolveError::Registry(RegistryError::NotOpen)));
}

#[tokio::test]
async fn test_open_and_close_are_idempotent() {
    let registry = InMemoryRegistry::new().with_service(USER_SERVICE, &[]);
    let calls = registry.calls();
    let mut resolver = ServiceResolver::new(registry);

    resolver.close().await.unwrap();
    resolver.open().await.unwrap();
    resolver.open().await.unwrap();
    resolver.close().await.unwrap();
    resolver.close().await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.connects, 1);
    assert_eq!(calls.disconnects, 1);
    assert!(!resolver.is_open());
}

#[tokio::test]
async fn test_open_propagates_connect_failure() {
    let mut resolver = ServiceResolver::new(InMemoryRegistry::new().failing_connect());

    let err = resolver.open().await.unwrap_err();

    assert!(matches!(
        err,
        ResolveError::Registry(RegistryError::Transport { operation: "connect", .. })
    ));
    assert!(!resolver.is_open());
}
