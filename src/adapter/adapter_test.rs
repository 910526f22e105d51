use super::*;
use std::sync::Arc;

struct NoopAdapter(&'static str);

#[async_trait]
impl Adapter for NoopAdapter {
    fn id(&self) -> &str {
        self.0
    }

    async fn execute(
        &self,
        inputs: HashMap<String, Value>,
        _ctx: &ExecutionContext,
    ) -> Result<HashMap<String, Value>> {
        Ok(inputs)
    }

    fn manifest(&self) -> Option<ToolManifest> {
        None
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

struct FailingCloseAdapter;

#[async_trait]
impl Adapter for FailingCloseAdapter {
    fn id(&self) -> &str {
        "failing-close"
    }

    async fn execute(
        &self,
        inputs: HashMap<String, Value>,
        _ctx: &ExecutionContext,
    ) -> Result<HashMap<String, Value>> {
        Ok(inputs)
    }

    fn manifest(&self) -> Option<ToolManifest> {
        None
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    async fn close(&self) -> Result<()> {
        Err(crate::BeemFlowError::adapter("cannot close"))
    }
}

#[test]
fn register_and_get_round_trip() {
    let registry = AdapterRegistry::new();
    registry.register(Arc::new(NoopAdapter("a")));

    assert!(registry.get("a").is_some());
    assert!(registry.get("missing").is_none());
}

#[test]
fn registering_the_same_id_twice_replaces_it() {
    let registry = AdapterRegistry::new();
    registry.register(Arc::new(NoopAdapter("a")));
    registry.register(Arc::new(NoopAdapter("a")));

    assert_eq!(registry.all().len(), 1);
}

#[test]
fn all_returns_every_registered_adapter() {
    let registry = AdapterRegistry::new();
    registry.register(Arc::new(NoopAdapter("a")));
    registry.register(Arc::new(NoopAdapter("b")));

    let mut ids: Vec<&str> = registry.all().iter().map(|a| a.id()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["a", "b"]);
}

#[tokio::test]
async fn close_all_closes_every_adapter_and_surfaces_the_first_error() {
    let registry = AdapterRegistry::new();
    registry.register(Arc::new(NoopAdapter("a")));
    registry.register(Arc::new(FailingCloseAdapter));

    let err = registry.close_all().await.unwrap_err();
    assert!(err.to_string().contains("cannot close"));
}

#[tokio::test]
async fn close_all_succeeds_when_every_adapter_closes_cleanly() {
    let registry = AdapterRegistry::new();
    registry.register(Arc::new(NoopAdapter("a")));
    registry.register(Arc::new(NoopAdapter("b")));

    assert!(registry.close_all().await.is_ok());
}
