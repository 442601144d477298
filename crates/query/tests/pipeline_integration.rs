//! Integration tests for query pipelines over the in-memory data source.

mod common;

use common::{context, shop};
use quarry_core::{Error, Value};
use quarry_query::{Comparator, Constraint, Query, TableQuery, WritableQuery};
use std::cell::Cell;
use std::rc::Rc;

fn quantities(query: &TableQuery) -> Vec<i64> {
    query
        .rows()
        .unwrap()
        .snapshot()
        .iter()
        .map(|row| row.get_by_name("qty").unwrap().as_i64().unwrap())
        .collect()
}

#[test]
fn test_constraint_narrows_and_widens() {
    let db = shop();
    for (name, qty) in [("b", 5), ("c", 8)] {
        db.insert("items", vec![Value::Null, name.into(), Value::Int32(qty)])
            .unwrap();
    }
    let ctx = context(&db);
    let items = TableQuery::new(&ctx, "items").unwrap();
    assert_eq!(quantities(&items), vec![3, 5, 8]);

    let gt = Constraint::new("qty", Comparator::Gt, 4);
    items.add_constraint(gt.clone()).unwrap();
    assert_eq!(quantities(&items), vec![5, 8]);

    items.remove_constraint(&gt).unwrap();
    assert_eq!(quantities(&items), vec![3, 5, 8]);
}

#[test]
fn test_publish_invalidates_each_subscriber_once() {
    let db = shop();
    let ctx = context(&db);
    let both = Query::new(&ctx, "SELECT * FROM items", ["items", "stock"]).unwrap();
    let stock = Query::new(&ctx, "SELECT * FROM items", ["stock"]).unwrap();
    let unrelated = Query::new(&ctx, "SELECT * FROM items", ["orders"]).unwrap();
    for query in [&both, &stock, &unrelated] {
        query.rows().unwrap();
    }

    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    both.on_rows_changed(move |_| counter.set(counter.get() + 1))
        .unwrap();

    let invalidated = ctx.publish(None, ["items", "stock", "items"]).unwrap();
    assert_eq!(invalidated, 2);
    assert_eq!(fired.get(), 1);

    let graph = ctx.graph();
    assert_eq!(graph.rebuild_count(both.cursor_node()), 2);
    assert_eq!(graph.rebuild_count(stock.cursor_node()), 2);
    assert_eq!(graph.rebuild_count(unrelated.cursor_node()), 1);
}

#[test]
fn test_refresh_always_includes_own_cursor() {
    let db = shop();
    let ctx = context(&db);
    let lonely = Query::new(&ctx, "SELECT * FROM items", Vec::<&str>::new()).unwrap();
    lonely.rows().unwrap();
    assert_eq!(lonely.refresh().unwrap(), 1);
    assert_eq!(ctx.graph().rebuild_count(lonely.cursor_node()), 2);
}

#[test]
fn test_commit_refreshes_other_queries_on_table() {
    let db = shop();
    let ctx = context(&db);
    let editor = WritableQuery::new(&ctx, "items", false).unwrap();
    let viewer = TableQuery::new(&ctx, "items").unwrap();
    assert_eq!(quantities(&viewer), vec![3]);

    let row = editor.rows().unwrap().get(0).unwrap();
    row.set_entry_by_name("qty", 11).unwrap();
    assert!(row.commit().unwrap().is_committed());

    assert_eq!(quantities(&viewer), vec![11]);
}

#[test]
fn test_lost_connection_reconnects_lazily() {
    let db = shop();
    let ctx = context(&db);
    let items = TableQuery::new(&ctx, "items").unwrap();
    let rows = items.rows().unwrap();
    let first_cursor = items.cursor().unwrap();
    assert_eq!(db.connect_count(), 1);

    db.drop_connections();
    db.insert("items", vec![Value::Null, "b".into(), Value::Int32(1)])
        .unwrap();
    assert_eq!(db.connect_count(), 1);

    assert_eq!(items.rows().unwrap().len(), 2);
    assert_eq!(db.connect_count(), 2);
    assert!(rows.ptr_eq(&items.rows().unwrap()));
    assert!(!Rc::ptr_eq(&first_cursor, &items.cursor().unwrap()));
}

#[test]
fn test_connection_failure_surfaces_and_recovers() {
    let db = shop();
    let ctx = context(&db);
    let items = TableQuery::new(&ctx, "items").unwrap();
    items.rows().unwrap();

    db.drop_connections();
    db.refuse_connections(true);
    let err = items.rows().unwrap_err();
    assert!(matches!(err.root_cause(), Error::Connection { .. }));

    db.refuse_connections(false);
    assert_eq!(items.rows().unwrap().len(), 1);
}

#[test]
fn test_dropping_a_query_releases_its_nodes() {
    let db = shop();
    let ctx = context(&db);
    let connection = ctx.connection_node();
    {
        let items = TableQuery::new(&ctx, "items").unwrap();
        items.rows().unwrap();
        assert_eq!(ctx.graph().dependents(connection).len(), 1);
        let cursor = items.cursor().unwrap();
        drop(items);
        assert!(quarry_storage::Cursor::is_closed(&*cursor));
    }
    assert!(ctx.graph().dependents(connection).is_empty());
    assert_eq!(ctx.channels().subscriber_count("items"), 0);
}

#[test]
fn test_metadata_listener_sees_columns() {
    let db = shop();
    let ctx = context(&db);
    let items = TableQuery::new(&ctx, "items").unwrap();
    items.rows().unwrap();

    let seen = Rc::new(Cell::new(0));
    let sink = seen.clone();
    let id = items
        .on_metadata_changed(move |columns| sink.set(columns.len()))
        .unwrap();
    items.refresh().unwrap();
    assert_eq!(seen.get(), 3);
    assert!(items.remove_metadata_listener(id));
    assert!(!items.remove_metadata_listener(id));
}

#[test]
fn test_constraint_change_re_executes_channel_peers() {
    let db = shop();
    let ctx = context(&db);
    let narrowed = TableQuery::new(&ctx, "items").unwrap();
    let peer = TableQuery::new(&ctx, "items").unwrap();
    let other = Query::new(&ctx, "SELECT * FROM items", ["orders"]).unwrap();
    for query in [&narrowed, &peer] {
        query.rows().unwrap();
    }
    other.rows().unwrap();
    let graph = ctx.graph();
    assert_eq!(graph.rebuild_count(peer.cursor_node()), 1);

    narrowed
        .add_constraint(Constraint::new("qty", Comparator::Gt, 4))
        .unwrap();
    assert!(narrowed.rows().unwrap().is_empty());
    assert_eq!(graph.rebuild_count(narrowed.cursor_node()), 2);
    assert_eq!(graph.rebuild_count(peer.cursor_node()), 2);
    assert_eq!(graph.rebuild_count(other.cursor_node()), 1);

    // An explicit refresh still reaches each subscriber exactly once.
    assert_eq!(narrowed.refresh().unwrap(), 2);
    assert_eq!(graph.rebuild_count(narrowed.cursor_node()), 3);
    assert_eq!(graph.rebuild_count(peer.cursor_node()), 3);
}

#[test]
fn test_reconnect_re_executes_channel_peers() {
    let db = shop();
    let ctx = context(&db);
    let first = TableQuery::new(&ctx, "items").unwrap();
    let second = TableQuery::new(&ctx, "items").unwrap();
    first.rows().unwrap();
    second.rows().unwrap();

    db.drop_connections();
    first.rows().unwrap();
    let graph = ctx.graph();
    assert_eq!(graph.rebuild_count(first.cursor_node()), 2);
    assert_eq!(graph.rebuild_count(second.cursor_node()), 2);
    assert!(!quarry_storage::Cursor::is_closed(&*second.cursor().unwrap()));
}
