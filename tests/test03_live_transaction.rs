//! Transaction lifecycle against a real server; skipped unless
//! `MSSQL_FLUENT_TEST_CONNECTION` is set.

use mssql_fluent::prelude::*;

fn builder() -> Option<SqlServerTransactionBuilder> {
    let cs = std::env::var("MSSQL_FLUENT_TEST_CONNECTION").ok()?;
    Some(SqlServerTransactionBuilder::from_connection_string(&cs).unwrap())
}

#[tokio::test]
async fn table_type_and_parameter_roll_back_together() {
    let Some(builder) = builder() else { return };
    let mut transaction = builder.build().unwrap();

    transaction
        .set_sql("CREATE TYPE dbo.MssqlFluentIds AS TABLE (Id int NOT NULL, Label nvarchar(20) NULL)")
        .execute()
        .await
        .unwrap();
    assert!(transaction.in_transaction());

    let mut table = DataTable::new();
    for id in 1..=1500 {
        table.add_row(vec![RowValues::Int(id), RowValues::Null]).unwrap();
    }
    let total = transaction
        .set_sql("SELECT SUM(CAST(Id AS bigint)) FROM @Ids WHERE Label IS NULL")
        .add_in_table("Ids", "dbo.MssqlFluentIds", table)
        .scalar_i64()
        .await
        .unwrap();
    assert_eq!(total, Some(1500 * 1501 / 2));

    transaction.rollback().await.unwrap();

    // the type went away with the rollback
    let mut check = builder.build().unwrap();
    let exists = check
        .set_sql("SELECT COUNT(*) FROM sys.types WHERE name = 'MssqlFluentIds'")
        .scalar_i32()
        .await
        .unwrap();
    assert_eq!(exists, Some(0));
    check.commit().await.unwrap();
}

#[tokio::test]
async fn commit_keeps_work_on_the_same_connection() {
    let Some(builder) = builder() else { return };
    let mut transaction = builder.build().unwrap();

    // global temp tables outlive the batch that creates them
    transaction
        .set_sql("CREATE TABLE ##MssqlFluentAudit (Id int IDENTITY PRIMARY KEY, Note nvarchar(50))")
        .execute()
        .await
        .unwrap();
    let id = transaction
        .set_sql("INSERT INTO ##MssqlFluentAudit (Note) OUTPUT INSERTED.Id VALUES (@Note)")
        .add_in_string("Note", "created", 50)
        .scalar_i32()
        .await
        .unwrap();
    assert_eq!(id, Some(1));

    let count = transaction
        .set_sql("SELECT COUNT(*) FROM ##MssqlFluentAudit")
        .scalar_i32()
        .await
        .unwrap();
    assert_eq!(count, Some(1));
    transaction.commit().await.unwrap();
}

#[tokio::test]
async fn unused_transaction_finishes_without_connecting() {
    let Some(builder) = builder() else { return };
    let transaction = builder.build().unwrap();
    assert!(!transaction.is_connected());
    transaction.commit().await.unwrap();
}
