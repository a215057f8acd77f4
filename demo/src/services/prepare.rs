use async_trait::async_trait;
use mssql_fluent::prelude::*;

const INSERT_DEPARTMENT_HISTORY: &str = "
    INSERT INTO HumanResources.EmployeeDepartmentHistory
        (BusinessEntityID, DepartmentID, ShiftID, StartDate, ModifiedDate)
    VALUES
        (@BusinessEntityID, @DepartmentID, 3, CONVERT(date, GETDATE()), GETDATE())
";

const DELETE_DEPARTMENT_HISTORY: &str = "
    DELETE FROM HumanResources.EmployeeDepartmentHistory
    WHERE BusinessEntityID = @BusinessEntityID AND DepartmentID = @DepartmentID AND ShiftID = 3
";

#[async_trait]
pub(crate) trait PrepareService {
    /// Run one prepared insert per employee; returns the rows inserted.
    async fn insert(&self, department_id: i16, business_entity_ids: &[i32]) -> Result<usize>;
    /// Run one prepared delete per employee; returns the rows deleted.
    async fn delete(&self, department_id: i16, business_entity_ids: &[i32]) -> Result<usize>;
}

/// Night-shift history rows written with a prepared statement.
pub(crate) struct DepartmentHistoryService {
    builder: SqlServerStatementBuilder,
}

impl DepartmentHistoryService {
    pub(crate) fn new(builder: SqlServerStatementBuilder) -> Self {
        Self { builder }
    }

    async fn run_prepared(
        &self,
        sql: &str,
        department_id: i16,
        business_entity_ids: &[i32],
    ) -> Result<usize> {
        let mut statement = self.builder.build()?;
        statement
            .set_sql(sql)
            .add_in_parameter("BusinessEntityID", NumericType::Int32)
            .add_in_parameter("DepartmentID", department_id);
        statement.prepare().await?;

        let mut total = 0;
        for &id in business_entity_ids {
            total += statement
                .set_parameter("BusinessEntityID", id)
                .execute()
                .await?;
        }
        statement.close().await;
        Ok(total)
    }
}

#[async_trait]
impl PrepareService for DepartmentHistoryService {
    async fn insert(&self, department_id: i16, business_entity_ids: &[i32]) -> Result<usize> {
        self.run_prepared(INSERT_DEPARTMENT_HISTORY, department_id, business_entity_ids)
            .await
    }

    async fn delete(&self, department_id: i16, business_entity_ids: &[i32]) -> Result<usize> {
        self.run_prepared(DELETE_DEPARTMENT_HISTORY, department_id, business_entity_ids)
            .await
    }
}
