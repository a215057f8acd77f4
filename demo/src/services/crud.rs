use async_trait::async_trait;
use mssql_fluent::prelude::*;

use crate::models::Department;

const INSERT_DEPARTMENT: &str = "
    INSERT INTO HumanResources.Department
        ([Name], GroupName, ModifiedDate)
    OUTPUT INSERTED.DepartmentID
    VALUES
        (@Name, @GroupName, @ModifiedDate)
";

const SELECT_DEPARTMENT: &str = "
    SELECT
        @Name = [Name],
        @GroupName = GroupName,
        @ModifiedDate = ModifiedDate
    FROM HumanResources.Department
    WHERE DepartmentID = @DepartmentID
";

const UPDATE_DEPARTMENT: &str = "
    UPDATE HumanResources.Department SET
        [Name] = @Name,
        GroupName = @GroupName,
        ModifiedDate = @ModifiedDate
    WHERE DepartmentID = @DepartmentID
";

const DELETE_DEPARTMENT: &str = "
    DELETE FROM HumanResources.Department
    WHERE DepartmentID = @DepartmentID
";

#[async_trait]
pub(crate) trait CrudService<T> {
    /// Insert and return the new key.
    async fn create(&self, item: &T) -> Result<i32>;
    async fn read(&self, id: i32) -> Result<T>;
    async fn update(&self, item: &T) -> Result<()>;
    async fn delete(&self, id: i32) -> Result<()>;
}

/// Department CRUD through plain statements, one connection per call.
pub(crate) struct DepartmentCrudService {
    builder: SqlServerStatementBuilder,
}

impl DepartmentCrudService {
    pub(crate) fn new(builder: SqlServerStatementBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl CrudService<Department> for DepartmentCrudService {
    async fn create(&self, department: &Department) -> Result<i32> {
        let mut statement = self.builder.build()?;
        let id = statement
            .set_sql(INSERT_DEPARTMENT)
            .add_in_string("Name", department.name.as_deref(), 50)
            .add_in_string("GroupName", department.group_name.as_deref(), 50)
            .add_in_parameter("ModifiedDate", department.modified_date)
            .scalar_i32()
            .await?;
        Ok(id.unwrap_or_default())
    }

    async fn read(&self, id: i32) -> Result<Department> {
        let mut statement = self.builder.build()?;
        statement
            .set_sql(SELECT_DEPARTMENT)
            .add_in_parameter("DepartmentID", id)
            .add_out_string("Name", 50)
            .add_out_string("GroupName", 50)
            .add_out_parameter("ModifiedDate", NumericType::DateTime)
            .execute()
            .await?;

        Ok(Department {
            id,
            name: Some(statement.get_string("Name")?),
            group_name: Some(statement.get_string("GroupName")?),
            modified_date: statement.get_date_time("ModifiedDate")?,
            shifts: None,
        })
    }

    async fn update(&self, department: &Department) -> Result<()> {
        let mut statement = self.builder.build()?;
        statement
            .set_sql(UPDATE_DEPARTMENT)
            .add_in_string("Name", department.name.as_deref(), 50)
            .add_in_string("GroupName", department.group_name.as_deref(), 50)
            .add_in_parameter("ModifiedDate", department.modified_date)
            .add_in_parameter("DepartmentID", department.id)
            .execute()
            .await?;
        Ok(())
    }

    async fn delete(&self, id: i32) -> Result<()> {
        let mut statement = self.builder.build()?;
        statement
            .set_sql(DELETE_DEPARTMENT)
            .add_in_parameter("DepartmentID", id)
            .execute()
            .await?;
        Ok(())
    }
}
