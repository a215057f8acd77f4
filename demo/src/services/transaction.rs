use async_trait::async_trait;
use mssql_fluent::prelude::*;
use tracing::warn;

use crate::models::{Department, EmployeeDepartmentHistory};

const INSERT_DEPARTMENT: &str = "
    INSERT INTO HumanResources.Department
        ([Name], GroupName, ModifiedDate)
    OUTPUT INSERTED.DepartmentID
    VALUES
        (@Name, @GroupName, @ModifiedDate)
";

const INSERT_DEPARTMENT_HISTORY: &str = "
    INSERT INTO HumanResources.EmployeeDepartmentHistory
        (BusinessEntityID, DepartmentID, ShiftID, StartDate, ModifiedDate)
    VALUES
        (@BusinessEntityID, @DepartmentID, @ShiftID, CONVERT(date, GETDATE()), GETDATE())
";

const DELETE_DEPARTMENT_HISTORY: &str = "
    DELETE FROM HumanResources.EmployeeDepartmentHistory
    WHERE DepartmentID = @DepartmentID
";

const DELETE_DEPARTMENT: &str = "
    DELETE FROM HumanResources.Department
    WHERE DepartmentID = @DepartmentID
";

#[async_trait]
pub(crate) trait TransactionService<T> {
    /// Insert the item and its dependent rows atomically; returns the new key.
    async fn create(&self, item: &T) -> Result<i32>;
    /// Delete the item and its dependent rows atomically.
    async fn delete(&self, item: &T) -> Result<()>;
}

/// Department plus history rows, committed or rolled back together.
pub(crate) struct DepartmentTransactionService {
    builder: SqlServerTransactionBuilder,
}

impl DepartmentTransactionService {
    pub(crate) fn new(builder: SqlServerTransactionBuilder) -> Self {
        Self { builder }
    }
}

async fn rollback_after(transaction: SqlServerTransaction, err: SqlServerError) -> SqlServerError {
    if let Err(rollback_err) = transaction.rollback().await {
        warn!("rollback failed: {rollback_err}");
    }
    err
}

async fn insert_department(
    transaction: &mut SqlServerTransaction,
    department: &Department,
) -> Result<i32> {
    let id = transaction
        .set_sql(INSERT_DEPARTMENT)
        .add_in_string("Name", department.name.as_deref(), 50)
        .add_in_string("GroupName", department.group_name.as_deref(), 50)
        .add_in_parameter("ModifiedDate", department.modified_date)
        .scalar_i32()
        .await?
        .unwrap_or_default();
    if id <= 0 {
        return Ok(id);
    }

    let history = EmployeeDepartmentHistory {
        business_entity_id: 1,
        department_id: id,
        shift_id: 1,
    };
    transaction
        .set_sql(INSERT_DEPARTMENT_HISTORY)
        .add_in_parameter("BusinessEntityID", history.business_entity_id)
        .add_in_parameter("DepartmentID", history.department_id)
        .add_in_parameter("ShiftID", history.shift_id)
        .execute()
        .await?;
    Ok(id)
}

async fn delete_department(transaction: &mut SqlServerTransaction, id: i32) -> Result<usize> {
    let history = transaction
        .set_sql(DELETE_DEPARTMENT_HISTORY)
        .add_in_parameter("DepartmentID", id)
        .execute()
        .await?;
    transaction
        .set_sql(DELETE_DEPARTMENT)
        .add_in_parameter("DepartmentID", id)
        .execute()
        .await?;
    Ok(history)
}

#[async_trait]
impl TransactionService<Department> for DepartmentTransactionService {
    async fn create(&self, department: &Department) -> Result<i32> {
        let mut transaction = self.builder.build()?;
        match insert_department(&mut transaction, department).await {
            Ok(id) if id > 0 => {
                transaction.commit().await?;
                Ok(id)
            }
            Ok(id) => {
                transaction.rollback().await?;
                Ok(id)
            }
            Err(err) => Err(rollback_after(transaction, err).await),
        }
    }

    async fn delete(&self, department: &Department) -> Result<()> {
        let mut transaction = self.builder.build()?;
        match delete_department(&mut transaction, department.id).await {
            Ok(_) => transaction.commit().await,
            Err(err) => Err(rollback_after(transaction, err).await),
        }
    }
}
