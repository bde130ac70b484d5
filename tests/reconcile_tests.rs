
use memograph::prelude::*;
use memograph::transaction::Change;
use shop::{Shop, address, customer, key, line, note, order, persist, product};

#[tokio::test]
async fn test_resave_of_unchanged_graph_commits_nothing() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("first");
    let l1 = line(1);
    let l2 = line(2);
    l1.write().unwrap().set_reference("product", Some(product("sku-1")));
    l2.write().unwrap().push("notes", note("fragile"));
    {
        let mut record = o.write().unwrap();
        record.set_reference("customer", Some(customer("ada")));
        record.set_collection("lines", vec![l1.clone(), l2.clone()]);
        record.set_reference("shipping", Some(address("Oslo")));
    }

    let first = ctx.save(&o).await.unwrap();
    assert_eq!(first.inserts, 7);
    assert!(ctx.commit().await.unwrap() > 0);

    let second = ctx.save(&o).await.unwrap();
    assert!(second.only_updates());
    assert_eq!(second.updates, 7);
    assert_eq!(ctx.commit().await.unwrap(), 0);
}

#[tokio::test]
async fn test_self_reference_terminates() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("loop");
    o.write().unwrap().set_reference("next", Some(o.clone()));

    let plan = ctx.plan(&o).await.unwrap();
    assert_eq!(plan.changes().len(), 1);
    assert_eq!(plan.passes(&key(&o)), 1);

    persist(&ctx, &o).await.unwrap();
    let id = o.id().unwrap();
    assert_eq!(
        shop.db.relation_targets(&key(&o), "next").await,
        vec![EntityKey::new("Order", id)]
    );

    let plan = ctx.plan(&o).await.unwrap();
    assert_eq!(plan.passes(&key(&o)), 1);
    assert_eq!(plan.summary().total(), 1);
}

#[tokio::test]
async fn test_two_entity_cycle_reconciles_each_once() {
    let shop = Shop::new();
    let ctx = shop.context();

    let a = order("a");
    let b = address("Bergen");
    a.write().unwrap().set_reference("shipping", Some(b.clone()));
    b.write().unwrap().set_reference("order", Some(a.clone()));

    let plan = ctx.plan(&a).await.unwrap();
    assert_eq!(plan.summary().inserts, 2);

    persist(&ctx, &a).await.unwrap();
    let plan = ctx.plan(&a).await.unwrap();
    assert_eq!(plan.passes(&key(&a)), 1);
    assert_eq!(plan.passes(&key(&b)), 1);
    assert_eq!(plan.state_of(&key(&b)), Some(EntityState::MatchedUpdate));
    assert!(plan.summary().only_updates());
}

#[tokio::test]
async fn test_distinct_new_entities_are_not_conflated() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("many");
    o.write()
        .unwrap()
        .set_collection("lines", vec![line(1), line(2), line(3)]);

    let summary = ctx.save(&o).await.unwrap();
    assert_eq!(summary.inserts, 4);
    ctx.commit().await.unwrap();
    assert_eq!(shop.db.row_count("Line").await, 3);
}

#[tokio::test]
async fn test_removed_dependent_is_deleted() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("lines");
    let d1 = line(1);
    let d2 = line(2);
    o.write()
        .unwrap()
        .set_collection("lines", vec![d1.clone(), d2.clone()]);
    persist(&ctx, &o).await.unwrap();
    let gone = key(&d2);

    o.write().unwrap().set_collection("lines", vec![d1.clone()]);
    let plan = ctx.plan(&o).await.unwrap();
    assert_eq!(plan.state_of(&gone), Some(EntityState::OrphanedDependent));
    assert!(
        plan.changes()
            .iter()
            .any(|c| matches!(c, Change::Delete { key } if key == &gone))
    );
    assert!(!plan.changes().iter().any(
        |c| matches!(c, Change::DeleteRelationship { related, .. } if related == &gone)
    ));

    persist(&ctx, &o).await.unwrap();
    assert!(!shop.db.contains(&gone).await);
    assert_eq!(
        shop.db.relation_targets(&key(&o), "lines").await,
        vec![key(&d1)]
    );
}

#[tokio::test]
async fn test_replaced_aggregate_root_keeps_its_row() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("customer swap");
    let u1 = customer("u1");
    o.write().unwrap().set_reference("customer", Some(u1.clone()));
    persist(&ctx, &o).await.unwrap();

    let u2 = customer("u2");
    o.write().unwrap().set_reference("customer", Some(u2.clone()));
    let plan = ctx.plan(&o).await.unwrap();
    assert_eq!(plan.state_of(&key(&u1)), Some(EntityState::OrphanedRootReference));
    assert_eq!(plan.summary().deletes, 0);

    persist(&ctx, &o).await.unwrap();
    assert!(shop.db.contains(&key(&u1)).await);
    assert_eq!(
        shop.db.relation_targets(&key(&o), "customer").await,
        vec![key(&u2)]
    );
}

#[tokio::test]
async fn test_cleared_reference_to_root_drops_only_the_edge() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("no customer");
    let u = customer("u");
    o.write().unwrap().set_reference("customer", Some(u.clone()));
    persist(&ctx, &o).await.unwrap();

    o.write().unwrap().set_reference("customer", None);
    let summary = ctx.save(&o).await.unwrap();
    assert_eq!(summary.relationship_deletes, 1);
    assert_eq!(ctx.commit().await.unwrap(), 1);

    assert!(shop.db.contains(&key(&u)).await);
    assert!(shop.db.relation_targets(&key(&o), "customer").await.is_empty());
}

#[tokio::test]
async fn test_cleared_dependent_reference_deletes_it() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("no shipping");
    let a = address("Turku");
    o.write().unwrap().set_reference("shipping", Some(a.clone()));
    persist(&ctx, &o).await.unwrap();

    o.write().unwrap().set_reference("shipping", None);
    persist(&ctx, &o).await.unwrap();
    assert!(!shop.db.contains(&key(&a)).await);
    assert_eq!(shop.db.row_count("Address").await, 0);
}

#[tokio::test]
async fn test_unset_id_inserts_and_natural_key_without_row_inserts_with_key() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("mixed");
    let l = line(1);
    let p = product("sku-9");
    l.write().unwrap().set_reference("product", Some(p.clone()));
    o.write().unwrap().push("lines", l.clone());

    let plan = ctx.plan(&o).await.unwrap();
    assert_eq!(plan.state_of(&key(&p)), Some(EntityState::New));
    let generated: Vec<bool> = plan
        .changes()
        .iter()
        .filter_map(|c| match c {
            Change::Insert { generate_id, .. } => Some(*generate_id),
            _ => None,
        })
        .collect();
    assert_eq!(generated, vec![true, true, false]);

    persist(&ctx, &o).await.unwrap();
    assert_eq!(p.id().unwrap(), EntityId::from("sku-9"));
    assert!(shop.db.contains(&EntityKey::new("Product", "sku-9")).await);

    // a fresh instance carrying the stored key is an update
    let again = product("sku-9");
    let plan = ctx.plan(&again).await.unwrap();
    assert_eq!(plan.state_of(&key(&again)), Some(EntityState::MatchedUpdate));
}

#[tokio::test]
async fn test_moved_dependent_is_not_deleted() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("move");
    let l1 = line(1);
    let l2 = line(2);
    let n = note("travels");
    l1.write().unwrap().push("notes", n.clone());
    o.write()
        .unwrap()
        .set_collection("lines", vec![l1.clone(), l2.clone()]);
    persist(&ctx, &o).await.unwrap();

    l1.write().unwrap().set_collection("notes", Vec::new());
    l2.write().unwrap().push("notes", n.clone());
    let summary = ctx.save(&o).await.unwrap();
    assert_eq!(summary.deletes, 0);
    assert_eq!(summary.relationship_deletes, 1);
    ctx.commit().await.unwrap();

    assert!(shop.db.contains(&key(&n)).await);
    assert!(shop.db.relation_targets(&key(&l1), "notes").await.is_empty());
    assert_eq!(shop.db.relation_targets(&key(&l2), "notes").await, vec![key(&n)]);
}

#[tokio::test]
async fn test_orphaned_dependent_cascades_to_its_own_dependents() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("cascade");
    let l = line(1);
    let p = product("sku-2");
    let n1 = note("one");
    let n2 = note("two");
    {
        let mut record = l.write().unwrap();
        record.set_reference("product", Some(p.clone()));
        record.set_collection("notes", vec![n1.clone(), n2.clone()]);
    }
    o.write().unwrap().push("lines", l.clone());
    persist(&ctx, &o).await.unwrap();

    o.write().unwrap().set_collection("lines", Vec::new());
    let plan = ctx.plan(&o).await.unwrap();
    let deleted: Vec<EntityKey> = plan
        .changes()
        .iter()
        .filter_map(|c| match c {
            Change::Delete { key } => Some(key.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(deleted, vec![key(&n1), key(&n2), key(&l)]);
    assert_eq!(plan.state_of(&key(&p)), Some(EntityState::OrphanedRootReference));
    assert_eq!(plan.summary().relationship_deletes, 0);

    assert_eq!(persist(&ctx, &o).await.unwrap(), 3);
    assert_eq!(shop.db.row_count("Line").await, 0);
    assert_eq!(shop.db.row_count("Note").await, 0);
    assert!(shop.db.contains(&key(&p)).await);
}

#[tokio::test]
async fn test_cascade_keeps_a_dependent_that_moved_elsewhere() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("move then drop");
    let l1 = line(1);
    let l2 = line(2);
    let n = note("survivor");
    l1.write().unwrap().push("notes", n.clone());
    o.write()
        .unwrap()
        .set_collection("lines", vec![l1.clone(), l2.clone()]);
    persist(&ctx, &o).await.unwrap();

    l2.write().unwrap().push("notes", n.clone());
    o.write().unwrap().set_collection("lines", vec![l2.clone()]);
    let summary = ctx.save(&o).await.unwrap();
    assert_eq!(summary.deletes, 1);
    assert_eq!(summary.relationship_deletes, 0);
    ctx.commit().await.unwrap();

    assert!(!shop.db.contains(&key(&l1)).await);
    assert!(shop.db.contains(&key(&n)).await);
    assert_eq!(shop.db.relation_targets(&key(&l2), "notes").await, vec![key(&n)]);
}

#[tokio::test]
async fn test_shared_entity_is_reconciled_once() {
    let shop = Shop::new();
    let ctx = shop.context();

    let o = order("diamond");
    let l1 = line(1);
    let l2 = line(2);
    let p = product("sku-shared");
    l1.write().unwrap().set_reference("product", Some(p.clone()));
    l2.write().unwrap().set_reference("product", Some(p.clone()));
    o.write()
        .unwrap()
        .set_collection("lines", vec![l1.clone(), l2.clone()]);

    let plan = ctx.plan(&o).await.unwrap();
    assert_eq!(plan.passes(&key(&p)), 1);
    assert_eq!(plan.summary().inserts, 4);
}
