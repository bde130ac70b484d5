
use async_trait::async_trait;
use memograph::prelude::*;
use memograph::storage::StoredSnapshot;
use memograph::transaction::OriginalValues;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Forwards to an in-memory unit of work and counts every stage call.
struct RecordingStore {
    inner: InMemoryStore,
    stage_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl EntityStore for RecordingStore {
    async fn fetch_snapshot(
        &self,
        key: &EntityKey,
        scope: FetchScope,
    ) -> Result<Option<StoredSnapshot>> {
        self.inner.fetch_snapshot(key, scope).await
    }

    async fn find_by_id(&self, key: &EntityKey) -> Result<Option<EntityRef>> {
        self.inner.find_by_id(key).await
    }

    async fn stage_insert(&self, entity: &EntityRef, generate_id: bool) -> Result<()> {
        self.stage_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.stage_insert(entity, generate_id).await
    }

    async fn stage_update(&self, entity: &EntityRef, original: OriginalValues) -> Result<()> {
        self.stage_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.stage_update(entity, original).await
    }

    async fn stage_delete(&self, key: &EntityKey) -> Result<()> {
        self.stage_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.stage_delete(key).await
    }

    async fn stage_delete_relationship(
        &self,
        owner: &EntityKey,
        property: &str,
        related: &EntityKey,
    ) -> Result<()> {
        self.stage_calls.fetch_add(1, Ordering::SeqCst);
        self.inner
            .stage_delete_relationship(owner, property, related)
            .await
    }

    async fn staged_len(&self) -> usize {
        self.inner.staged_len().await
    }

    async fn discard(&self) -> Result<()> {
        self.inner.discard().await
    }

    async fn commit(&self) -> Result<usize> {
        self.inner.commit().await
    }
}

/// `Root -> Shallow(no id)`, `Root -> A -> Mid(no id)`, `Root -> A -> B -> Deep(no id)`.
fn layered_registry() -> SchemaRegistry {
    SchemaRegistry::builder()
        .entity(
            EntitySchema::new("Depth1")
                .id(IdDescriptor::integer())
                .aggregate_root()
                .reference("shallow", "Shallow"),
        )
        .entity(
            EntitySchema::new("Depth2")
                .id(IdDescriptor::integer())
                .aggregate_root()
                .reference("a", "A"),
        )
        .entity(
            EntitySchema::new("Depth3")
                .id(IdDescriptor::integer())
                .aggregate_root()
                .collection("items", "B"),
        )
        .entity(EntitySchema::new("A").id(IdDescriptor::integer()).reference("mid", "Mid"))
        .entity(EntitySchema::new("B").id(IdDescriptor::integer()).reference("c", "C"))
        .entity(EntitySchema::new("C").id(IdDescriptor::integer()).collection("deep", "Deep"))
        .entity(EntitySchema::new("Shallow"))
        .entity(EntitySchema::new("Mid"))
        .entity(EntitySchema::new("Deep"))
        .build()
        .unwrap()
}

fn recording_context(
    registry: SchemaRegistry,
    descriptor: ContextDescriptor,
) -> (DomainContext, Arc<AtomicUsize>) {
    let classifier =
        Arc::new(OwnershipClassifier::classify(Arc::new(registry), &descriptor).unwrap());
    let stage_calls = Arc::new(AtomicUsize::new(0));
    let store = RecordingStore {
        inner: InMemoryDatabase::new().into_shared().store(),
        stage_calls: stage_calls.clone(),
    };
    (DomainContext::new(classifier, Arc::new(store)), stage_calls)
}

fn layered_context() -> (DomainContext, Arc<AtomicUsize>) {
    let descriptor = ContextDescriptor::new("layers")
        .expose("d1", "Depth1")
        .expose("d2", "Depth2")
        .expose("d3", "Depth3");
    recording_context(layered_registry(), descriptor)
}

#[tokio::test]
async fn test_unidentifiable_type_rejected_at_every_depth() {
    let (ctx, stage_calls) = layered_context();

    let cases = [
        ("Depth1", "'Shallow'", "Depth1.shallow"),
        ("Depth2", "'Mid'", "Depth2.a.mid"),
        ("Depth3", "'Deep'", "Depth3.items.c.deep"),
    ];
    for (root_type, culprit, path) in cases {
        // no instance of the culprit exists; the schema alone decides
        let root = ctx.create(root_type, |_| {}).unwrap();
        let err = ctx.save(&root).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration, "{root_type}");
        let message = err.to_string();
        assert!(message.contains(culprit), "{message}");
        assert!(message.contains(path), "{message}");
    }
    assert_eq!(stage_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unidentifiable_type_cannot_be_created() {
    let (ctx, _) = layered_context();
    let err = ctx.create("Deep", |_| {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[tokio::test]
async fn test_shape_violation_deep_in_graph_stages_nothing() {
    let (ctx, stage_calls) = recording_context(shop::registry(), shop::context());

    let o = shop::order("bad");
    let l = shop::line(1);
    // a Note where a Product is declared
    l.write().unwrap().set_reference("product", Some(shop::note("imposter")));
    o.write().unwrap().set_collection("lines", vec![shop::line(2), l]);

    let err = ctx.save(&o).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("Line.product"), "{err}");
    assert_eq!(stage_calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx.store().staged_len().await, 0);
}

#[tokio::test]
async fn test_wrong_id_kind_and_missing_natural_key_are_rejected() {
    let (ctx, stage_calls) = recording_context(shop::registry(), shop::context());

    let o = shop::order("ids");
    o.write()
        .unwrap()
        .set_reference("customer", Some(EntityRef::new(EntityRecord::new("Customer", "ada"))));
    let err = ctx.save(&o).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let keyless = ctx.create("Product", |_| {}).unwrap();
    let err = ctx.save(&keyless).await.unwrap_err();
    assert!(err.to_string().contains("no key set"), "{err}");
    assert_eq!(stage_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_undeclared_relation_strict_and_lenient() {
    let o = shop::order("extra");
    o.write().unwrap().push("gifts", shop::note("surprise"));

    let (strict, _) = recording_context(shop::registry(), shop::context());
    let err = strict.save(&o).await.unwrap_err();
    assert!(err.to_string().contains("Order.gifts"), "{err}");

    let db = InMemoryDatabase::new().into_shared();
    let lenient = DomainContext::with_config(
        shop::classifier(),
        Arc::new(db.store()),
        ContextConfig::new("lenient").lenient_relations(),
    );
    let summary = lenient.save(&o).await.unwrap();
    assert_eq!(summary.inserts, 1);
    lenient.commit().await.unwrap();
    assert_eq!(db.row_count("Note").await, 0);
}

#[tokio::test]
async fn test_schema_setup_errors() {
    let unknown_target = SchemaRegistry::builder()
        .entity(EntitySchema::new("Order").id(IdDescriptor::integer()).reference("who", "Nobody"))
        .build();
    assert!(matches!(unknown_target, Err(GraphError::Configuration(_))));

    let registry = Arc::new(layered_registry());
    let exposes_unidentifiable = ContextDescriptor::new("bad").expose("notes", "Deep");
    assert!(OwnershipClassifier::classify(registry.clone(), &exposes_unidentifiable).is_err());

    // marker without exposure: a dependent in this context
    let hidden = ContextDescriptor::new("narrow").expose("d1", "Depth1");
    let classifier = OwnershipClassifier::classify(registry, &hidden).unwrap();
    assert!(classifier.is_aggregate_root("Depth1"));
    assert!(!classifier.is_aggregate_root("Depth2"));
}
