//! End-to-end coverage of the six concrete scenarios from spec §8, driven
//! entirely through the crate's public surface (`execute_sql`/`collect`).

use futures::TryStreamExt;
use rill_sql::exec::{CancelSignal, TableProvider};
use rill_sql::row::Row;
use rill_sql::source::memory::InMemoryTable;
use rill_sql::source::DataSource;
use rill_sql::value::DataValue;
use rill_sql::{collect, ExecuteSqlOptions};
use std::collections::HashMap;
use std::sync::Arc;

fn users_table() -> Arc<dyn TableProvider> {
    let mut rows = Vec::new();
    for (id, name, age) in [(1, "Alice", 30.0), (2, "Bob", 25.0), (3, "Charlie", 35.0)] {
        let mut row = Row::new();
        row.push("id", DataValue::Number(id as f64));
        row.push("name", DataValue::String(name.to_string()));
        row.push("age", DataValue::Number(age));
        rows.push(row);
    }
    let mut tables: HashMap<String, Arc<dyn DataSource>> = HashMap::new();
    tables.insert("users".to_string(), Arc::new(InMemoryTable::new(rows)));
    Arc::new(tables)
}

#[tokio::test]
async fn scenario_1_filter_and_order_by() {
    let options = ExecuteSqlOptions::new(users_table());
    let rows = collect(rill_sql::execute_sql(
        "SELECT name FROM users WHERE age > 28 ORDER BY age",
        options,
    ))
    .await
    .unwrap();
    let names: Vec<_> = rows.iter().map(|r| r.get("name").cloned().unwrap()).collect();
    assert_eq!(
        names,
        vec![
            DataValue::String("Alice".to_string()),
            DataValue::String("Charlie".to_string()),
        ]
    );
}

#[tokio::test]
async fn scenario_2_count_star() {
    let options = ExecuteSqlOptions::new(users_table());
    let rows = collect(rill_sql::execute_sql("SELECT COUNT(*) AS c FROM users", options))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("c"), Some(&DataValue::Number(3.0)));
}

fn users_with_duplicate_cities() -> Arc<dyn TableProvider> {
    let mut rows = Vec::new();
    for city in ["NYC", "NYC", "LA"] {
        let mut row = Row::new();
        row.push("city", DataValue::String(city.to_string()));
        rows.push(row);
    }
    let mut tables: HashMap<String, Arc<dyn DataSource>> = HashMap::new();
    tables.insert("users".to_string(), Arc::new(InMemoryTable::new(rows)));
    Arc::new(tables)
}

#[tokio::test]
async fn scenario_3_group_by_having() {
    let options = ExecuteSqlOptions::new(users_with_duplicate_cities());
    let rows = collect(rill_sql::execute_sql(
        "SELECT city, COUNT(*) AS n FROM users GROUP BY city HAVING COUNT(*) > 1",
        options,
    ))
    .await
    .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("city"), Some(&DataValue::String("NYC".to_string())));
    assert_eq!(rows[0].get("n"), Some(&DataValue::Number(2.0)));
}

fn users_and_orders() -> Arc<dyn TableProvider> {
    let mut user_rows = Vec::new();
    for (id, name) in [(1, "Alice"), (9, "Zed")] {
        let mut row = Row::new();
        row.push("id", DataValue::Number(id as f64));
        row.push("name", DataValue::String(name.to_string()));
        user_rows.push(row);
    }
    let mut order_rows = Vec::new();
    for (user_id, amount) in [(1, 10.0), (1, 20.0), (9, 5.0)] {
        let mut row = Row::new();
        row.push("user_id", DataValue::Number(user_id as f64));
        row.push("amount", DataValue::Number(amount));
        order_rows.push(row);
    }
    let mut tables: HashMap<String, Arc<dyn DataSource>> = HashMap::new();
    tables.insert("users".to_string(), Arc::new(InMemoryTable::new(user_rows)));
    tables.insert("orders".to_string(), Arc::new(InMemoryTable::new(order_rows)));
    Arc::new(tables)
}

#[tokio::test]
async fn scenario_4_inner_join_only_matches() {
    let options = ExecuteSqlOptions::new(users_and_orders());
    let rows = collect(rill_sql::execute_sql(
        "SELECT * FROM users JOIN orders ON users.id = orders.user_id",
        options,
    ))
    .await
    .unwrap();
    assert_eq!(rows.len(), 2);
    for row in &rows {
        assert_eq!(row.get("users.name"), Some(&DataValue::String("Alice".to_string())));
    }
    let amounts: Vec<_> = rows
        .iter()
        .map(|r| match r.get("orders.amount") {
            Some(DataValue::Number(n)) => *n,
            other => panic!("expected a number, got {other:?}"),
        })
        .collect();
    assert!(amounts.contains(&10.0));
    assert!(amounts.contains(&20.0));
}

fn table_with_array(name: &str, column: &str, value: DataValue) -> Arc<dyn TableProvider> {
    let mut row = Row::new();
    row.push(column, value);
    let mut tables: HashMap<String, Arc<dyn DataSource>> = HashMap::new();
    tables.insert(name.to_string(), Arc::new(InMemoryTable::new(vec![row])));
    Arc::new(tables)
}

#[tokio::test]
async fn scenario_5_array_sort_does_not_mutate_source() {
    let items = DataValue::Array(vec![
        DataValue::Number(3.0),
        DataValue::Null,
        DataValue::Number(1.0),
        DataValue::Null,
        DataValue::Number(2.0),
    ]);
    let options = ExecuteSqlOptions::new(table_with_array("t", "items", items.clone()));
    let rows = collect(rill_sql::execute_sql("SELECT ARRAY_SORT(items) AS s FROM t", options))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("s"),
        Some(&DataValue::Array(vec![
            DataValue::Number(1.0),
            DataValue::Number(2.0),
            DataValue::Number(3.0),
            DataValue::Null,
            DataValue::Null,
        ]))
    );

    // the source array itself is untouched by the sort
    let mut tables: HashMap<String, Arc<dyn DataSource>> = HashMap::new();
    let mut row = Row::new();
    row.push("items", items.clone());
    tables.insert("t".to_string(), Arc::new(InMemoryTable::new(vec![row])));
    let options2 = ExecuteSqlOptions::new(Arc::new(tables));
    let raw = collect(rill_sql::execute_sql("SELECT items FROM t", options2))
        .await
        .unwrap();
    assert_eq!(raw[0].get("items"), Some(&items));
}

#[tokio::test]
async fn scenario_6_cast_object_to_string_unquotes_bigint() {
    let info = DataValue::Object(
        [
            ("id".to_string(), serde_json::json!(1)),
            ("name".to_string(), serde_json::json!("Alice")),
            ("age".to_string(), serde_json::json!(30)),
        ]
        .into_iter()
        .collect(),
    );

    let options = ExecuteSqlOptions::new(table_with_array("t", "info", info));
    let rows = collect(rill_sql::execute_sql("SELECT CAST(info AS STRING) AS s FROM t", options))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    match rows[0].get("s") {
        Some(DataValue::String(s)) => {
            assert!(s.contains("\"name\":\"Alice\""));
            assert!(s.contains("\"age\":30"));
            assert!(!s.contains("\"age\":\"30\""));
        }
        other => panic!("expected a string, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_stops_the_stream() {
    let signal = CancelSignal::new();
    signal.trip();
    let mut options = ExecuteSqlOptions::new(users_table());
    options.signal = signal;
    let result = rill_sql::execute_sql("SELECT * FROM users", options)
        .try_collect::<Vec<_>>()
        .await;
    assert!(result.is_err());
}
