use async_trait::async_trait;
use mssql_fluent::prelude::*;
use tracing::debug;

use crate::models::{Department, Shift};

const SELECT_DEPARTMENT: &str = "
    SELECT
        DepartmentID,
        [Name],
        GroupName,
        ModifiedDate
    FROM HumanResources.Department
    WHERE GroupName = @GroupName
";

const SELECT_SHIFT: &str = "
    SELECT DISTINCT
        S.ShiftID,
        S.[Name]
    FROM HumanResources.[Shift] S
    INNER JOIN HumanResources.EmployeeDepartmentHistory EDH
    ON S.ShiftID = EDH.ShiftID
    WHERE EDH.DepartmentID = @DepartmentID
";

#[async_trait]
pub(crate) trait MarsService<T> {
    async fn read(&self, group_name: &str) -> Result<Vec<T>>;
}

/// Departments of a group with their shifts, the shifts queried on the same
/// connection while the departments are still being read.
pub(crate) struct DepartmentShiftService {
    builder: SqlServerStatementBuilder,
}

impl DepartmentShiftService {
    pub(crate) fn new(builder: SqlServerStatementBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl MarsService<Department> for DepartmentShiftService {
    async fn read(&self, group_name: &str) -> Result<Vec<Department>> {
        let mut statement = self.builder.with_mars().build()?;

        let mut reader = statement
            .set_sql(SELECT_DEPARTMENT)
            .add_in_string("GroupName", group_name, 50)
            .execute_reader()
            .await?;
        let ord_id = reader.get_ordinal("DepartmentID")?;
        let ord_name = reader.get_ordinal("Name")?;
        let ord_group_name = reader.get_ordinal("GroupName")?;
        let ord_modified_date = reader.get_ordinal("ModifiedDate")?;

        statement
            .set_sql(SELECT_SHIFT)
            .add_in_parameter("DepartmentID", NumericType::Int16);

        let mut departments = Vec::new();
        while reader.read() {
            let department_id = reader.get_i16(ord_id)?;
            let mut shifts = Vec::new();

            statement
                .set_parameter("DepartmentID", department_id)
                .read(
                    |shift| Ok((shift.get_ordinal("ShiftID")?, shift.get_ordinal("Name")?)),
                    |ord: &(usize, usize), shift: &DataReader| {
                        shifts.push(Shift {
                            id: shift.get_byte(ord.0)?,
                            name: shift.get_string(ord.1)?,
                        });
                        Ok(())
                    },
                )
                .await?;
            debug!(department_id, shifts = shifts.len(), "shifts loaded");

            departments.push(Department {
                id: i32::from(department_id),
                name: Some(reader.get_string(ord_name)?),
                group_name: Some(reader.get_string(ord_group_name)?),
                modified_date: reader.get_date_time(ord_modified_date)?,
                shifts: Some(shifts),
            });
        }

        statement.close().await;
        Ok(departments)
    }
}
