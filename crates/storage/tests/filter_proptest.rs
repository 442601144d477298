//! Property tests checking that query filters agree with a direct scan.

use proptest::prelude::*;
use quarry_core::schema::TableBuilder;
use quarry_core::{ColumnKind, Value};
use quarry_storage::{Connection, ConnectionConfig, Connector, Cursor, MemoryDatabase, Statement};

fn stock(quantities: &[Option<i32>]) -> MemoryDatabase {
    let db = MemoryDatabase::new("shop");
    db.create_table(
        TableBuilder::new("items")
            .unwrap()
            .add_column("id", ColumnKind::Integer)
            .unwrap()
            .add_column("qty", ColumnKind::Integer)
            .unwrap()
            .add_primary_key(&["id"], true)
            .unwrap()
            .build()
            .unwrap(),
    )
    .unwrap();
    for qty in quantities {
        db.insert("items", vec![Value::Null, Value::from(*qty)]).unwrap();
    }
    db
}

fn select_ids(db: &MemoryDatabase, text: &str) -> Vec<i64> {
    let cursor = db
        .connect(&ConnectionConfig::new("localhost", 0, "shop", "sa"))
        .unwrap()
        .create_statement()
        .unwrap()
        .execute_query(text)
        .unwrap();
    let mut ids = Vec::new();
    while cursor.next().unwrap() {
        ids.push(cursor.get(1).unwrap().as_i64().unwrap());
    }
    ids
}

const OPERATORS: [&str; 6] = ["<", "<=", "=", "<>", ">=", ">"];

fn holds(operator: usize, a: i32, b: i32) -> bool {
    match operator {
        0 => a < b,
        1 => a <= b,
        2 => a == b,
        3 => a != b,
        4 => a >= b,
        _ => a > b,
    }
}

proptest! {
    #[test]
    fn prop_filter_matches_scan(
        quantities in prop::collection::vec(prop::option::of(-5i32..5), 0..20),
        operator in 0usize..6,
        threshold in -5i32..5,
    ) {
        let db = stock(&quantities);
        let text = format!(
            "SELECT * FROM items WHERE qty {} '{}' AND TRUE",
            OPERATORS[operator], threshold
        );

        let expected: Vec<i64> = quantities
            .iter()
            .enumerate()
            .filter(|(_, qty)| qty.map_or(false, |q| holds(operator, q, threshold)))
            .map(|(i, _)| i as i64 + 1)
            .collect();
        prop_assert_eq!(select_ids(&db, &text), expected);
    }

    #[test]
    fn prop_false_term_selects_nothing(
        quantities in prop::collection::vec(prop::option::of(-5i32..5), 0..20),
    ) {
        let db = stock(&quantities);
        prop_assert!(select_ids(&db, "SELECT * FROM items WHERE TRUE AND FALSE").is_empty());
        prop_assert_eq!(select_ids(&db, "SELECT * FROM items").len(), quantities.len());
    }
}
