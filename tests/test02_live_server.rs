//! Runs against a real server when `MSSQL_FLUENT_TEST_CONNECTION` holds a
//! connection string; otherwise every test returns early.

use mssql_fluent::prelude::*;

fn connection_string() -> Option<String> {
    std::env::var("MSSQL_FLUENT_TEST_CONNECTION")
        .ok()
        .filter(|cs| !cs.trim().is_empty())
}

fn mars_statement(cs: &str) -> SqlServerStatement {
    SqlServerStatementBuilder::from_connection_string(cs)
        .unwrap()
        .with_mars()
        .build()
        .unwrap()
}

#[tokio::test]
async fn normal_statement_closes_after_each_call() {
    let Some(cs) = connection_string() else { return };
    let mut statement = SqlServerStatementBuilder::from_connection_string(&cs)
        .unwrap()
        .build()
        .unwrap();

    let sum = statement
        .set_sql("SELECT @A + @B")
        .add_in_parameter("A", 40i32)
        .add_in_parameter("B", 2i32)
        .scalar_i32()
        .await
        .unwrap();
    assert_eq!(sum, Some(42));
    assert!(!statement.is_connected());

    let missing = statement
        .set_sql("SELECT 1 WHERE 1 = 0")
        .scalar_i32()
        .await
        .unwrap();
    assert_eq!(missing, None);
}

#[tokio::test]
async fn output_parameters_and_row_count() {
    let Some(cs) = connection_string() else { return };
    let mut statement = mars_statement(&cs);

    let inserted = statement
        .set_sql("DECLARE @Department TABLE (Id int); INSERT INTO @Department VALUES (1), (2), (3)")
        .execute()
        .await
        .unwrap();
    assert_eq!(inserted, 3);

    let updated = statement
        .set_sql(
            "DECLARE @Department TABLE (Id int PRIMARY KEY, Name nvarchar(50) NULL);
             INSERT INTO @Department VALUES (1, N'Engineering'), (2, NULL), (3, NULL);
             SELECT @First = Name FROM @Department WHERE Id = 1;
             UPDATE @Department SET Name = @Name WHERE Id >= @Id",
        )
        .add_in_string("Name", "Tool Design", 50)
        .add_in_parameter("Id", 2i32)
        .add_out_string("First", 50)
        .execute()
        .await
        .unwrap();
    // @@ROWCOUNT of the UPDATE, not the sum
    assert_eq!(updated, 2);
    assert_eq!(statement.get_string("First").unwrap(), "Engineering");

    let name = statement
        .set_sql("SELECT @Name = N'Sales' WHERE @Id = 1")
        .add_in_parameter("Id", 1i32)
        .add_out_string("Name", 50)
        .scalar_string()
        .await
        .unwrap();
    // the output epilogue is not a caller-visible result set
    assert_eq!(name, None);
    assert_eq!(statement.get_string("Name").unwrap(), "Sales");

    statement.close().await;
}

#[tokio::test]
async fn mars_runs_nested_commands_while_reading() {
    let Some(cs) = connection_string() else { return };
    let mut statement = mars_statement(&cs);

    let mut reader = statement
        .set_sql("SELECT Id FROM (VALUES (1), (2), (3)) AS T(Id) ORDER BY Id")
        .execute_reader()
        .await
        .unwrap();

    statement
        .set_sql("SELECT @Id * 10")
        .add_in_parameter("Id", NumericType::Int32);
    let mut products = Vec::new();
    while reader.read() {
        let id = reader.get_i32(0).unwrap();
        let product = statement
            .set_parameter("Id", id)
            .scalar_i32()
            .await
            .unwrap();
        products.push(product.unwrap_or_default());
    }
    assert_eq!(products, [10, 20, 30]);
    assert!(statement.is_connected());
    statement.close().await;
}

#[tokio::test]
async fn prepared_statement_keeps_its_connection() {
    let Some(cs) = connection_string() else { return };
    let mut statement = SqlServerStatementBuilder::from_connection_string(&cs)
        .unwrap()
        .build()
        .unwrap();

    statement
        .set_sql("SELECT @Value * 2")
        .add_in_parameter("Value", NumericType::Int64);
    statement.prepare().await.unwrap();
    assert!(statement.is_connected());

    for value in [1i64, 5, 21] {
        let doubled = statement
            .set_parameter("Value", value)
            .scalar_i64()
            .await
            .unwrap();
        assert_eq!(doubled, Some(value * 2));
    }
    assert!(statement.is_connected());

    // the schema is frozen
    statement.add_in_parameter("Other", 1i32);
    assert!(statement.scalar_i64().await.is_err());
    statement.close().await;
}

#[tokio::test]
async fn server_errors_are_classified() {
    let Some(cs) = connection_string() else { return };
    let mut statement = mars_statement(&cs);

    let err = statement
        .set_sql(
            "DECLARE @Shift TABLE (ShiftID tinyint PRIMARY KEY);
             INSERT INTO @Shift VALUES (@Id);
             INSERT INTO @Shift VALUES (@Id)",
        )
        .add_in_parameter("Id", 1u8)
        .execute()
        .await
        .unwrap_err();
    assert!(err.is_constraint(ConstraintKind::PrimaryKey), "{err}");

    let err = statement
        .set_sql("RAISERROR('Department is locked', 16, 1)")
        .execute()
        .await
        .unwrap_err();
    assert!(matches!(err, SqlServerError::Custom(_)), "{err}");

    statement.close().await;
}

#[tokio::test]
async fn typed_values_round_trip() {
    let Some(cs) = connection_string() else { return };
    let mut statement = mars_statement(&cs);

    let sets = statement
        .set_sql("SELECT @Flag AS Flag, @Price AS Price, @Photo AS Photo, @Missing AS Missing; SELECT 1 AS Second")
        .add_in_parameter("Flag", true)
        .add_in_decimal("Price", rust_decimal::Decimal::new(1999, 2), 10, 2)
        .add_in_parameter("Photo", vec![0xFFu8, 0xD8])
        .add_in_parameter("Missing", NumericType::DateTime)
        .query_all()
        .await
        .unwrap();
    assert_eq!(sets.len(), 2);

    let row = &sets[0].results[0];
    assert_eq!(row.try_get::<bool>("Flag").unwrap(), Some(true));
    assert_eq!(
        row.try_get::<rust_decimal::Decimal>("Price").unwrap(),
        Some(rust_decimal::Decimal::new(1999, 2))
    );
    assert_eq!(row.try_get::<Vec<u8>>("Photo").unwrap(), Some(vec![0xFF, 0xD8]));
    assert_eq!(row.try_get::<chrono::NaiveDateTime>("Missing").unwrap(), None);

    let xml = statement
        .set_sql("SELECT TOP (2) n AS [@n] FROM (VALUES (1), (2)) AS T(n) FOR XML PATH('row')")
        .scalar_xml()
        .await
        .unwrap();
    assert_eq!(xml.as_deref(), Some(r#"<row n="1"/><row n="2"/>"#));

    statement.close().await;
}
