//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use quarry_core::schema::TableBuilder;
use quarry_core::{ColumnKind, Value};
use quarry_query::{Context, ContextBuilder};
use quarry_storage::{ConnectionConfig, MemoryDatabase, StaticConfig};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Routes tracing output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 3, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

/// `items(id PK, name, qty)` holding `(1, "a", 3)`.
pub fn shop() -> MemoryDatabase {
    init_tracing();
    let db = MemoryDatabase::new("shop");
    db.create_table(
        TableBuilder::new("items")
            .unwrap()
            .add_column("id", ColumnKind::Integer)
            .unwrap()
            .add_column("name", ColumnKind::Text)
            .unwrap()
            .add_column("qty", ColumnKind::Integer)
            .unwrap()
            .add_primary_key(&["id"], true)
            .unwrap()
            .build()
            .unwrap(),
    )
    .unwrap();
    db.insert("items", vec![Value::Null, "a".into(), Value::Int32(3)])
        .unwrap();
    db
}

/// Customers, appointments with audit columns, and one user.
pub fn clinic() -> MemoryDatabase {
    init_tracing();
    let db = MemoryDatabase::new("clinic");
    db.create_table(
        TableBuilder::new("customers")
            .unwrap()
            .add_column("Customer_ID", ColumnKind::Integer)
            .unwrap()
            .add_column("Customer_Name", ColumnKind::Text)
            .unwrap()
            .add_column("Last_Update", ColumnKind::Timestamp)
            .unwrap()
            .add_column("Last_Updated_By", ColumnKind::Text)
            .unwrap()
            .add_primary_key(&["Customer_ID"], true)
            .unwrap()
            .build()
            .unwrap(),
    )
    .unwrap();
    db.create_table(
        TableBuilder::new("appointments")
            .unwrap()
            .add_column("Appointment_ID", ColumnKind::Integer)
            .unwrap()
            .add_column("Title", ColumnKind::Text)
            .unwrap()
            .add_column(
                "Customer_ID",
                ColumnKind::ForeignKey {
                    table: "customers".into(),
                },
            )
            .unwrap()
            .add_column("Start", ColumnKind::Timestamp)
            .unwrap()
            .add_column("End", ColumnKind::Timestamp)
            .unwrap()
            .add_column("Create_Date", ColumnKind::Timestamp)
            .unwrap()
            .add_column("Created_By", ColumnKind::Text)
            .unwrap()
            .add_column("Last_Update", ColumnKind::Timestamp)
            .unwrap()
            .add_column("Last_Updated_By", ColumnKind::Text)
            .unwrap()
            .add_primary_key(&["Appointment_ID"], true)
            .unwrap()
            .build()
            .unwrap(),
    )
    .unwrap();
    db.create_table(
        TableBuilder::new("users")
            .unwrap()
            .add_column("User_ID", ColumnKind::Integer)
            .unwrap()
            .add_column("User_Name", ColumnKind::Text)
            .unwrap()
            .add_column("Password", ColumnKind::Text)
            .unwrap()
            .add_primary_key(&["User_ID"], true)
            .unwrap()
            .build()
            .unwrap(),
    )
    .unwrap();

    db.insert("users", vec![Value::Null, "test".into(), "test".into()])
        .unwrap();
    for name in ["Ada", "Grace"] {
        db.insert(
            "customers",
            vec![Value::Null, name.into(), Value::Null, Value::Null],
        )
        .unwrap();
    }
    // Ada: 09:00-10:00 and 13:00-14:00 on the 2nd. Grace: 09:00-10:00.
    for (title, customer, start, end) in [
        ("Checkup", 1, at(2, 9, 0), at(2, 10, 0)),
        ("Follow-up", 1, at(2, 13, 0), at(2, 14, 0)),
        ("Intake", 2, at(2, 9, 0), at(2, 10, 0)),
    ] {
        db.insert(
            "appointments",
            vec![
                Value::Null,
                title.into(),
                Value::Int32(customer),
                start.into(),
                end.into(),
                Value::Null,
                Value::Null,
                Value::Null,
                Value::Null,
            ],
        )
        .unwrap();
    }
    db
}

/// A context on `db` with a fixed clock.
pub fn context(db: &MemoryDatabase) -> Rc<Context> {
    ContextBuilder::new(db.clone())
        .config(StaticConfig(ConnectionConfig::new("localhost", 0, db.name(), "sa")))
        .clock(|| at(1, 12, 0))
        .build()
        .unwrap()
}
