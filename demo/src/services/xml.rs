use async_trait::async_trait;
use mssql_fluent::prelude::*;

use crate::models::StoreSurvey;

const FIND_DEMOGRAPHICS: &str = "
    SELECT Demographics FROM Sales.Store
    WHERE BusinessEntityID = @BusinessEntityID
";

const SELECT_DEMOGRAPHICS: &str = "
    SELECT Demographics FROM Sales.Store
    WHERE SalesPersonID = @SalesPersonID
";

const UPDATE_DEMOGRAPHICS: &str = "
    UPDATE Sales.Store
        SET Demographics = @Demographics
    WHERE SalesPersonID = @SalesPersonID
";

#[async_trait]
pub(crate) trait XmlService {
    /// Survey of one store, `None` when the store does not exist.
    async fn find(&self, business_entity_id: i32) -> Result<Option<StoreSurvey>>;
    /// Surveys of every store of a sales person.
    async fn read(&self, sales_person_id: i32) -> Result<Vec<StoreSurvey>>;
    /// Replace the survey of every store of a sales person.
    async fn update(&self, sales_person_id: i32, survey: &StoreSurvey) -> Result<usize>;
}

/// `Sales.Store.Demographics` read and written as XML text.
pub(crate) struct StoreSurveyService {
    builder: SqlServerStatementBuilder,
}

impl StoreSurveyService {
    pub(crate) fn new(builder: SqlServerStatementBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl XmlService for StoreSurveyService {
    async fn find(&self, business_entity_id: i32) -> Result<Option<StoreSurvey>> {
        let xml = self
            .builder
            .build()?
            .set_sql(FIND_DEMOGRAPHICS)
            .add_in_parameter("BusinessEntityID", business_entity_id)
            .scalar_xml()
            .await?;
        Ok(xml.as_deref().map(StoreSurvey::from_xml))
    }

    async fn read(&self, sales_person_id: i32) -> Result<Vec<StoreSurvey>> {
        let mut surveys = Vec::new();
        let mut statement = self.builder.build()?;
        statement
            .set_sql(SELECT_DEMOGRAPHICS)
            .add_in_parameter("SalesPersonID", sales_person_id)
            .read(
                |reader| reader.get_ordinal("Demographics"),
                |&ord: &usize, reader: &DataReader| {
                    if let Some(xml) = reader.get_or_null::<String>(ord)? {
                        surveys.push(StoreSurvey::from_xml(&xml));
                    }
                    Ok(())
                },
            )
            .await?;
        Ok(surveys)
    }

    async fn update(&self, sales_person_id: i32, survey: &StoreSurvey) -> Result<usize> {
        self.builder
            .build()?
            .set_sql(UPDATE_DEMOGRAPHICS)
            .add_in_xml("Demographics", survey.to_xml())
            .add_in_parameter("SalesPersonID", sales_person_id)
            .execute()
            .await
    }
}
