use async_trait::async_trait;
use mssql_fluent::prelude::*;

use crate::models::Hierarchy;

const GET_MANAGER_EMPLOYEES: &str = "uspGetManagerEmployees";

#[async_trait]
pub(crate) trait ReadService<T> {
    async fn read(&self, id: i32) -> Result<Vec<T>>;
}

struct HierarchyOrdinals {
    id: usize,
    recursion_level: usize,
    organization_node: usize,
    manager_first_name: usize,
    manager_last_name: usize,
    first_name: usize,
    last_name: usize,
}

impl HierarchyOrdinals {
    fn lookup(reader: &DataReader) -> Result<Self> {
        Ok(Self {
            id: reader.get_ordinal("BusinessEntityID")?,
            recursion_level: reader.get_ordinal("RecursionLevel")?,
            organization_node: reader.get_ordinal("OrganizationNode")?,
            manager_first_name: reader.get_ordinal("ManagerFirstName")?,
            manager_last_name: reader.get_ordinal("ManagerLastName")?,
            first_name: reader.get_ordinal("FirstName")?,
            last_name: reader.get_ordinal("LastName")?,
        })
    }
}

/// Stored procedure read through `setter`/`filler` callbacks.
pub(crate) struct HierarchyService {
    builder: SqlServerStatementBuilder,
}

impl HierarchyService {
    pub(crate) fn new(builder: SqlServerStatementBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl ReadService<Hierarchy> for HierarchyService {
    async fn read(&self, id: i32) -> Result<Vec<Hierarchy>> {
        let mut hierarchies = Vec::new();
        let mut statement = self.builder.build()?;

        statement
            .set_stored_procedure(GET_MANAGER_EMPLOYEES)
            .add_in_parameter("BusinessEntityID", id)
            .read(HierarchyOrdinals::lookup, |ord, reader| {
                hierarchies.push(Hierarchy {
                    id: reader.get_i32(ord.id)?,
                    recursion_level: reader.get_i32(ord.recursion_level)?,
                    organization_node: reader.get_string(ord.organization_node)?,
                    manager_first_name: reader.get_string(ord.manager_first_name)?,
                    manager_last_name: reader.get_string(ord.manager_last_name)?,
                    first_name: reader.get_string(ord.first_name)?,
                    last_name: reader.get_string(ord.last_name)?,
                });
                Ok(())
            })
            .await?;

        Ok(hierarchies)
    }
}
